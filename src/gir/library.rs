use indexmap::IndexMap;

use crate::gir::{ElementKind, Node, NodeId};

/// Arena owning every node of one or more parsed GIR repositories.
///
/// All structural operations on the tree go through the library: node
/// creation, attachment, detachment and reparenting. Handles ([`NodeId`])
/// remain valid for the lifetime of the library; detached subtrees keep
/// their storage and can be re-attached later.
///
/// A library typically holds several repositories (one per GIR file), so
/// cross-namespace operations — reparenting a type into another namespace,
/// resolving a `Ns.Type` reference — stay within one arena.
///
/// # Examples
///
/// ```rust
/// use girscope::gir::{ElementKind, Library};
///
/// let mut library = Library::new();
/// let repository = library.add_repository();
/// let namespace = library.add_child(repository, ElementKind::Namespace);
/// library.node_mut(namespace).set_attr("name", "Gtk");
///
/// let class = library.add_child(namespace, ElementKind::Class);
/// library.node_mut(class).set_attr("name", "Button");
///
/// assert_eq!(library.lookup_type(namespace, "Button"), Some(class));
/// ```
#[derive(Debug, Default)]
pub struct Library {
    nodes: Vec<Node>,
    repositories: Vec<NodeId>,
}

impl Library {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new repository root node.
    pub fn add_repository(&mut self) -> NodeId {
        let id = self.alloc(Node::new(ElementKind::Repository));
        self.repositories.push(id);
        id
    }

    /// The repository roots of this library, in load order.
    #[must_use]
    pub fn repositories(&self) -> &[NodeId] {
        &self.repositories
    }

    /// Creates a detached node of the given kind.
    pub fn add_node(&mut self, kind: ElementKind) -> NodeId {
        self.alloc(Node::new(kind))
    }

    /// Creates a node of the given kind and appends it to `parent`.
    pub fn add_child(&mut self, parent: NodeId, kind: ElementKind) -> NodeId {
        let child = self.add_node(kind);
        self.append_child(parent, child);
        child
    }

    /// Creates a node with the given attributes and appends it to `parent`.
    ///
    /// Convenience for building trees in patches and tests.
    pub fn add_child_with<K, V>(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> NodeId
    where
        K: Into<String>,
        V: Into<String>,
    {
        let child = self.add_child(parent, kind);
        let attrs: IndexMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.nodes[child.index()].attributes = attrs;
        child
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not originate from this library.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not originate from this library.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Appends `child` to `parent`'s child list and updates the parent
    /// back-reference. The child must currently be detached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.index()].parent.is_none());
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Detaches `child` from its parent, preserving sibling order. The node
    /// and its subtree remain allocated and can be re-attached.
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.index()].parent.take() {
            let siblings = &mut self.nodes[parent.index()].children;
            siblings.retain(|&c| c != child);
        }
    }

    /// Moves `node` from its current parent to `new_parent`, appending it to
    /// the new parent's child list. The subtree below `node` is unaffected;
    /// the total node count of the library does not change.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) {
        self.detach(node);
        self.append_child(new_parent, node);
    }

    /// The nearest enclosing namespace of `id` (including `id` itself).
    #[must_use]
    pub fn namespace_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestor_of_kind(id, ElementKind::Namespace)
    }

    /// The repository root owning `id` (including `id` itself).
    #[must_use]
    pub fn repository_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestor_of_kind(id, ElementKind::Repository)
    }

    fn ancestor_of_kind(&self, id: NodeId, kind: ElementKind) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.nodes[node.index()].kind == kind {
                return Some(node);
            }
            current = self.nodes[node.index()].parent;
        }
        None
    }

    /// Find a namespace by name across all repositories.
    #[must_use]
    pub fn lookup_namespace(&self, name: &str) -> Option<NodeId> {
        for &repository in &self.repositories {
            for &child in self.nodes[repository.index()].children() {
                let node = &self.nodes[child.index()];
                if node.kind == ElementKind::Namespace && node.attr("name") == Some(name) {
                    return Some(child);
                }
            }
        }
        None
    }

    /// Find a registered type by name.
    ///
    /// A plain `Name` is looked up among the registered types of
    /// `namespace`; a dotted `Ns.Name` is resolved against the named
    /// namespace of this library instead. Returns `None` when the type (or
    /// the dotted namespace) does not exist — absence is a normal value
    /// here, not an error.
    #[must_use]
    pub fn lookup_type(&self, namespace: NodeId, name: &str) -> Option<NodeId> {
        let (ns, type_name) = match name.split_once('.') {
            Some((ns_name, rest)) => (self.lookup_namespace(ns_name)?, rest),
            None => (namespace, name),
        };

        self.nodes[ns.index()]
            .children()
            .iter()
            .copied()
            .find(|&child| {
                let node = &self.nodes[child.index()];
                node.kind.is_registered_type() && node.attr("name") == Some(type_name)
            })
    }

    /// Number of nodes in the subtree rooted at `id` (including `id`).
    #[must_use]
    pub fn subtree_len(&self, id: NodeId) -> usize {
        let mut count = 1;
        for &child in self.nodes[id.index()].children() {
            count += self.subtree_len(child);
        }
        count
    }

    /// Total number of allocated nodes, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the library holds no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("library node capacity exceeded"));
        self.nodes.push(node);
        id
    }
}
