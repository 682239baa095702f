use std::fmt;

use indexmap::IndexMap;

use crate::gir::{ElementKind, Platforms};

/// Handle identifying a node within a [`crate::gir::Library`] arena.
///
/// Node identity is a plain index: cheap to copy, valid for the lifetime of
/// the library that produced it. All structural data lives in the library;
/// the handle only names it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw index value
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single element of the attributed GIR tree.
///
/// A node is a tag kind plus an ordered attribute map, an ordered child
/// list, a platform mask and a parent back-reference. Attribute order and
/// child order are semantically significant (parameter order, member
/// declaration order), which is why the attribute map is an [`IndexMap`].
///
/// The child list is exclusively owned by this node; moving a node between
/// parents goes through [`crate::gir::Library::reparent`], which removes it
/// from the former parent and appends it to the new one in one operation.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: ElementKind,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) platforms: Platforms,
}

impl Node {
    pub(crate) fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            platforms: Platforms::all(),
        }
    }

    /// The element kind of this node.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The node's attribute map, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Look up an attribute as an integer. Returns `None` when the attribute
    /// is absent or not a valid integer.
    #[must_use]
    pub fn attr_int(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(|v| v.parse().ok())
    }

    /// Look up an attribute as a boolean. The GIR convention renders true as
    /// `"1"`; anything else is false. Absent attributes use the default.
    #[must_use]
    pub fn attr_bool(&self, key: &str, default: bool) -> bool {
        match self.attr(key) {
            Some(value) => value == "1",
            None => default,
        }
    }

    /// Set an attribute value, replacing any previous value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Remove an attribute, preserving the order of the remaining entries.
    /// Returns the previous value, if any.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        self.attributes.shift_remove(key)
    }

    /// The name this node is matched under by metadata rules: the `name`
    /// attribute, except for boxed types which are matched by `glib:name`.
    #[must_use]
    pub fn match_name(&self) -> Option<&str> {
        if self.kind == ElementKind::Boxed {
            self.attr("glib:name")
        } else {
            self.attr("name")
        }
    }

    /// Whether this element is marked introspectable (default true).
    #[must_use]
    pub fn introspectable(&self) -> bool {
        self.attr_bool("introspectable", true)
    }

    /// Whether this element is marked deprecated (default false).
    #[must_use]
    pub fn deprecated(&self) -> bool {
        self.attr_bool("deprecated", false)
    }

    /// The version this element was introduced in, if annotated.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.attr("version")
    }

    /// The children of this node, in declaration order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The parent of this node, if it is attached to a tree.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The platform mask of this node.
    #[must_use]
    pub fn platforms(&self) -> Platforms {
        self.platforms
    }

    /// Restrict the platform mask of this node.
    pub fn set_platforms(&mut self, platforms: Platforms) {
        self.platforms = platforms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_accessors() {
        let mut node = Node::new(ElementKind::Method);
        node.set_attr("name", "get_value");
        node.set_attr("deprecated", "1");
        node.set_attr("destroy", "2");

        assert_eq!(node.attr("name"), Some("get_value"));
        assert_eq!(node.attr("missing"), None);
        assert!(node.deprecated());
        assert!(node.introspectable());
        assert_eq!(node.attr_int("destroy"), Some(2));
        assert_eq!(node.attr_int("name"), None);
    }

    #[test]
    fn test_remove_attr_keeps_order() {
        let mut node = Node::new(ElementKind::Class);
        node.set_attr("a", "1");
        node.set_attr("b", "2");
        node.set_attr("c", "3");
        node.remove_attr("b");

        let keys: Vec<_> = node.attributes().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_match_name_boxed() {
        let mut boxed = Node::new(ElementKind::Boxed);
        boxed.set_attr("glib:name", "Variant");
        assert_eq!(boxed.match_name(), Some("Variant"));

        let mut class = Node::new(ElementKind::Class);
        class.set_attr("name", "Button");
        class.set_attr("glib:name", "GtkButton");
        assert_eq!(class.match_name(), Some("Button"));
    }
}
