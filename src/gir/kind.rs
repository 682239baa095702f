use strum::IntoStaticStr;

/// The kind of a GIR element.
///
/// Each variant corresponds to one element tag of the GIR format. The
/// canonical tag name is rendered in kebab-case, with the namespaced tags
/// special-cased the way they appear in GIR files (`c:include`,
/// `doc:format`, `glib:boxed`, `glib:signal`).
///
/// Metadata rule selectors (`#method`, `#glib:signal`, ...) are compared
/// against these tag names, see [`crate::metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
#[allow(missing_docs)]
pub enum ElementKind {
    Alias,
    Array,
    Attribute,
    Bitfield,
    #[strum(serialize = "glib:boxed")]
    Boxed,
    Callback,
    #[strum(serialize = "c:include")]
    CInclude,
    Class,
    Constant,
    Constructor,
    Doc,
    DocDeprecated,
    #[strum(serialize = "doc:format")]
    DocFormat,
    Docsection,
    DocVersion,
    Enumeration,
    Field,
    Function,
    FunctionMacro,
    Include,
    /// The receiver parameter of a method
    InstanceParameter,
    Interface,
    Member,
    Method,
    Namespace,
    Package,
    Parameter,
    /// The `<parameters>` container of a callable; transparent to rule
    /// matching, see [`ElementKind::is_transparent`]
    Parameters,
    Property,
    Record,
    Repository,
    ReturnValue,
    #[strum(serialize = "glib:signal")]
    Signal,
    SourcePosition,
    Type,
    Union,
    Varargs,
    VirtualMethod,
}

impl ElementKind {
    /// The canonical GIR tag name for this element kind.
    ///
    /// ```rust
    /// use girscope::gir::ElementKind;
    ///
    /// assert_eq!(ElementKind::VirtualMethod.tag_name(), "virtual-method");
    /// assert_eq!(ElementKind::CInclude.tag_name(), "c:include");
    /// ```
    #[must_use]
    pub fn tag_name(self) -> &'static str {
        self.into()
    }

    /// Whether this element declares a registered type that can be looked up
    /// by name within a namespace (used to resolve reparent targets and
    /// cross-namespace type references).
    #[must_use]
    pub fn is_registered_type(self) -> bool {
        matches!(
            self,
            ElementKind::Alias
                | ElementKind::Bitfield
                | ElementKind::Boxed
                | ElementKind::Callback
                | ElementKind::Class
                | ElementKind::Enumeration
                | ElementKind::Interface
                | ElementKind::Record
                | ElementKind::Union
        )
    }

    /// Whether rule matching descends transparently into this element,
    /// exposing its children at the same nesting level as named siblings.
    ///
    /// Only the parameters container behaves this way: `Foo.bar.baz` can
    /// address a parameter `baz` of callable `bar` without naming the
    /// intermediate `<parameters>` element.
    #[must_use]
    pub fn is_transparent(self) -> bool {
        self == ElementKind::Parameters
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag_name())
    }
}
