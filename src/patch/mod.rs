//! Programmatic patches for the GIR model.
//!
//! Where the metadata DSL ([`crate::metadata`]) covers declarative
//! attribute corrections, patches express structural edits in code: adding
//! missing elements, removing broken ones, rewriting signatures. Each patch
//! is a pure transform of one top-level element, optionally keyed on the
//! enclosing namespace name; registered patches are folded over every
//! namespace member in registration order.
//!
//! The per-library patch catalogs themselves live with the generator that
//! uses this crate; this module only defines the engine and the shared
//! edit helpers.

use crate::gir::{ElementKind, Library, NodeId};

/// A correction applied to the GIR model before code generation.
///
/// Implementations must be pure tree transforms: inspect the element,
/// mutate it (or not) through the library, and return. Patches see the
/// tree as left by previously registered patches.
pub trait Patch {
    /// Apply this patch to one top-level element of a namespace.
    ///
    /// `namespace` is the name of the enclosing namespace, letting one
    /// patch implementation serve several libraries while only acting on
    /// the one it targets.
    fn patch(&self, library: &mut Library, element: NodeId, namespace: &str);
}

/// Apply every registered patch to every namespace member of the library,
/// in registration order.
///
/// Each patch runs over the namespace node itself first (so patches can add
/// new types), then over each of the namespace's members.
pub fn apply_patches(patches: &[&dyn Patch], library: &mut Library) {
    let repositories: Vec<NodeId> = library.repositories().to_vec();
    for repository in repositories {
        let namespaces: Vec<NodeId> = library
            .node(repository)
            .children()
            .iter()
            .copied()
            .filter(|&c| library.node(c).kind() == ElementKind::Namespace)
            .collect();

        for namespace in namespaces {
            let name = library
                .node(namespace)
                .attr("name")
                .unwrap_or_default()
                .to_string();

            for patch in patches {
                patch.patch(library, namespace, &name);
            }

            let members: Vec<NodeId> = library.node(namespace).children().to_vec();
            for member in members {
                for patch in patches {
                    patch.patch(library, member, &name);
                }
            }
        }
    }
}

/// Detach every child of `parent` with the given kind whose attribute `key`
/// equals `value`.
pub fn remove_children(
    library: &mut Library,
    parent: NodeId,
    kind: ElementKind,
    key: &str,
    value: &str,
) {
    let doomed: Vec<NodeId> = library
        .node(parent)
        .children()
        .iter()
        .copied()
        .filter(|&child| {
            let node = library.node(child);
            node.kind() == kind && node.attr(key) == Some(value)
        })
        .collect();

    for child in doomed {
        library.detach(child);
    }
}

/// Create a new child of `parent` with the given kind and attributes.
pub fn add_child<K, V>(
    library: &mut Library,
    parent: NodeId,
    kind: ElementKind,
    attributes: impl IntoIterator<Item = (K, V)>,
) -> NodeId
where
    K: Into<String>,
    V: Into<String>,
{
    library.add_child_with(parent, kind, attributes)
}

/// Remove the leading instance parameter of a callable and renumber the
/// positional parameter references that become stale.
///
/// The `closure` and `destroy` attributes on parameters and on the return
/// value address sibling parameters by position; dropping the instance
/// parameter shifts every position down by one, so each index is
/// decremented along with the removal. Callables without an instance
/// parameter are left untouched.
pub fn strip_instance_parameter(library: &mut Library, callable: NodeId) {
    let Some(params) = find_child(library, callable, ElementKind::Parameters) else {
        return;
    };

    let Some(&first) = library.node(params).children().first() else {
        return;
    };
    if library.node(first).kind() != ElementKind::InstanceParameter {
        return;
    }

    library.detach(first);

    let remaining: Vec<NodeId> = library.node(params).children().to_vec();
    for parameter in remaining {
        shift_position_attrs(library, parameter);
    }
    if let Some(return_value) = find_child(library, callable, ElementKind::ReturnValue) {
        shift_position_attrs(library, return_value);
    }
}

fn find_child(library: &Library, parent: NodeId, kind: ElementKind) -> Option<NodeId> {
    library
        .node(parent)
        .children()
        .iter()
        .copied()
        .find(|&c| library.node(c).kind() == kind)
}

fn shift_position_attrs(library: &mut Library, node: NodeId) {
    for key in ["closure", "destroy"] {
        if let Some(index) = library.node(node).attr_int(key) {
            if index > 0 {
                library.node_mut(node).set_attr(key, (index - 1).to_string());
            }
        }
    }
}
