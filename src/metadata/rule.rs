use indexmap::IndexMap;

/// One metadata rule: a name pattern, an optional element-kind selector, an
/// ordered argument map and nested child rules.
///
/// Rules form a forest. A root rule's children are its *relative* rules
/// (written on following lines with a leading `.`), each of which applies
/// to the node set matched by the root rule — independently of the other
/// relative rules. A dotted pattern on one line (`Foo.bar.baz args`) parses
/// into the same shape: a chain of single-child rules.
///
/// Rules are built once — by [`crate::metadata::Parser`] or
/// programmatically — and are immutable afterwards.
///
/// # Examples
///
/// ```rust
/// use girscope::metadata::Rule;
///
/// // Equivalent to the metadata line "Button#class deprecated=1"
/// let rule = Rule::new("Button")
///     .with_selector("class")
///     .with_arg("deprecated", "1");
///
/// assert_eq!(rule.glob(), "Button");
/// assert_eq!(rule.selector(), Some("class"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rule {
    glob: String,
    selector: Option<String>,
    args: IndexMap<String, Option<String>>,
    children: Vec<Rule>,
}

impl Rule {
    /// Create a rule matching the given glob pattern, with no selector,
    /// arguments or children.
    pub fn new(glob: impl Into<String>) -> Self {
        Self {
            glob: glob.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_parts(
        glob: String,
        selector: Option<String>,
        args: IndexMap<String, Option<String>>,
        children: Vec<Rule>,
    ) -> Self {
        Self {
            glob,
            selector,
            args,
            children,
        }
    }

    /// Restrict the rule to elements with the given tag name.
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Add an argument with a value.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), Some(value.into()));
        self
    }

    /// Add a flag argument without a value. When applied, flags default to
    /// the value `"1"` (boolean true).
    #[must_use]
    pub fn with_flag(mut self, key: impl Into<String>) -> Self {
        self.args.insert(key.into(), None);
        self
    }

    /// Add a nested rule, scoped to this rule's match set.
    #[must_use]
    pub fn with_child(mut self, child: Rule) -> Self {
        self.children.push(child);
        self
    }

    /// The glob pattern matched against child names.
    #[must_use]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// The element-kind selector, if any.
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// The argument map, in file order. `None` values are flags that
    /// default to `"1"` when applied.
    #[must_use]
    pub fn args(&self) -> &IndexMap<String, Option<String>> {
        &self.args
    }

    /// Nested rules, applied to this rule's match set.
    #[must_use]
    pub fn children(&self) -> &[Rule] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let rule = Rule::new("get_*")
            .with_selector("method")
            .with_flag("skip")
            .with_arg("name", "fetch_{{value}}")
            .with_child(Rule::new("*").with_flag("nullable"));

        assert_eq!(rule.glob(), "get_*");
        assert_eq!(rule.selector(), Some("method"));
        assert_eq!(rule.args().get("skip"), Some(&None));
        assert_eq!(
            rule.args().get("name"),
            Some(&Some("fetch_{{value}}".to_string()))
        );
        assert_eq!(rule.children().len(), 1);
    }

    #[test]
    fn test_args_keep_insertion_order() {
        let rule = Rule::new("x")
            .with_flag("c")
            .with_flag("a")
            .with_flag("b");
        let keys: Vec<_> = rule.args().keys().cloned().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
