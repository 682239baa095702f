//! Applies parsed metadata rules to a GIR tree.
//!
//! Rules are matched from the repository roots downwards: a top-level
//! pattern names a namespace, nested patterns name members within the
//! matched set. Matching descends transparently into `<parameters>`
//! containers so parameters can be addressed at the same nesting level as
//! named children of a callable.
//!
//! All per-rule failures — uncompilable patterns, rules that match
//! nothing, unresolvable reparent targets — are reported to the shared
//! [`Diagnostics`] container and degrade to no-ops; applying a rule forest
//! never fails as a whole.

use crate::diagnostics::{DiagnosticCategory, Diagnostics};
use crate::gir::{Library, NodeId};
use crate::metadata::{Glob, Rule};

/// Argument key that relocates matched nodes to a different parent instead
/// of setting an attribute. The value names the target: first resolved as a
/// registered type in the node's namespace, then as a whole namespace.
pub const REPARENT_KEY: &str = "girscope-parent";

/// Placeholder that substitution values may contain; it is replaced with
/// the attribute's previous value, so `name=foo_{{value}}` applied to a
/// node named `bar` renames it to `foo_bar`.
const PLACEHOLDER: &str = "{{value}}";

/// Apply a rule forest to a library, starting from its repository roots.
///
/// Rules are applied in order; later rules observe the mutations made by
/// earlier ones.
pub fn apply(rules: &[Rule], library: &mut Library, diagnostics: &Diagnostics) {
    let roots: Vec<NodeId> = library.repositories().to_vec();
    for rule in rules {
        process_rule(rule, &roots, library, diagnostics);
    }
}

fn process_rule(rule: &Rule, nodes: &[NodeId], library: &mut Library, diagnostics: &Diagnostics) {
    let glob = match Glob::metadata(rule.glob()) {
        Ok(glob) => glob,
        Err(err) => {
            diagnostics.error(DiagnosticCategory::Glob, err.to_string());
            Glob::never()
        }
    };

    // Collect all gir nodes matching this rule
    let matched = match_rule(&glob, rule.selector(), nodes, library);

    if matched.is_empty() {
        diagnostics.warning(
            DiagnosticCategory::Rule,
            format!("Rule '{}' does not match anything", rule.glob()),
        );
    }

    // Update attributes from the rule arguments. An argument without a
    // value defaults to "1" (boolean true).
    for (key, value) in rule.args() {
        let value = value.as_deref().unwrap_or("1");
        set_attribute(&matched, key, value, library, diagnostics);
    }

    // Apply nested rules to the matched node set
    for child in rule.children() {
        process_rule(child, &matched, library, diagnostics);
    }
}

fn match_rule(
    glob: &Glob,
    selector: Option<&str>,
    nodes: &[NodeId],
    library: &Library,
) -> Vec<NodeId> {
    let mut result = Vec::new();
    for &node in nodes {
        for &child in library.node(node).children() {
            // Descend into the transparent <parameters> container
            if library.node(child).kind().is_transparent() {
                result.extend(match_rule(glob, selector, &[child], library));
            }

            let candidate = library.node(child);
            if glob.matches(candidate.match_name())
                && selector.is_none_or(|s| s == candidate.kind().tag_name())
            {
                result.push(child);
            }
        }
    }
    result
}

/// Set an attribute value on the given nodes. The value `"()"` removes the
/// attribute, and [`REPARENT_KEY`] relocates the nodes instead.
fn set_attribute(
    nodes: &[NodeId],
    key: &str,
    value: &str,
    library: &mut Library,
    diagnostics: &Diagnostics,
) {
    for &node in nodes {
        if key == REPARENT_KEY {
            reparent(node, value, library, diagnostics);
        } else if value == "()" {
            library.node_mut(node).remove_attr(key);
        } else {
            let new_value = apply_pattern(library.node(node).attr(key), value);
            library.node_mut(node).set_attr(key, new_value);
        }
    }
}

// Literal values replace the old attribute value; values containing the
// {{value}} placeholder splice the old value into the new one.
fn apply_pattern(original: Option<&str>, argument: &str) -> String {
    match original {
        Some(old) if argument.contains(PLACEHOLDER) => argument.replace(PLACEHOLDER, old),
        _ => argument.to_string(),
    }
}

// Move a gir node to another parent node.
fn reparent(node: NodeId, to: &str, library: &mut Library, diagnostics: &Diagnostics) {
    let target = library
        .namespace_of(node)
        .and_then(|namespace| library.lookup_type(namespace, to))
        .or_else(|| library.lookup_namespace(to));

    match target {
        Some(target) => library.reparent(node, target),
        None => diagnostics.warning(
            DiagnosticCategory::Reparent,
            format!("Type or namespace '{to}' not found"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gir::ElementKind;

    fn gtk_library() -> (Library, NodeId) {
        let mut library = Library::new();
        let repository = library.add_repository();
        let namespace = library.add_child_with(
            repository,
            ElementKind::Namespace,
            [("name", "Foo"), ("version", "1.0")],
        );
        (library, namespace)
    }

    fn parse_and_apply(
        contents: &str,
        library: &mut Library,
    ) -> Diagnostics {
        let diagnostics = Diagnostics::new();
        let rules = crate::metadata::Parser::new("Foo-1.0.metadata", contents, &diagnostics).parse();
        apply(&rules, library, &diagnostics);
        diagnostics
    }

    #[test]
    fn test_dotted_rule_sets_flag() {
        let (mut library, namespace) = gtk_library();
        let target = library.add_child_with(namespace, ElementKind::Function, [("name", "bar_baz")]);

        let diagnostics = parse_and_apply("Foo.bar_baz skip", &mut library);

        assert_eq!(library.node(target).attr("skip"), Some("1"));
        assert!(!diagnostics.has_warnings());
    }

    #[test]
    fn test_unmatched_rule_warns() {
        let (mut library, _) = gtk_library();
        let diagnostics = parse_and_apply("Foo.no_such_child skip", &mut library);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("'no_such_child' does not match anything")));
    }

    #[test]
    fn test_selector_filters_by_tag() {
        let (mut library, namespace) = gtk_library();
        let class = library.add_child_with(namespace, ElementKind::Class, [("name", "Widget")]);
        let m1 = library.add_child_with(class, ElementKind::Method, [("name", "alpha")]);
        let m2 = library.add_child_with(class, ElementKind::Method, [("name", "beta")]);
        let prop = library.add_child_with(class, ElementKind::Property, [("name", "gamma")]);

        parse_and_apply("Widget.*#method deprecated=0", &mut library);

        assert_eq!(library.node(m1).attr("deprecated"), Some("0"));
        assert_eq!(library.node(m2).attr("deprecated"), Some("0"));
        assert_eq!(library.node(prop).attr("deprecated"), None);
    }

    #[test]
    fn test_bare_star_matches_nameless_nodes() {
        let (mut library, namespace) = gtk_library();
        let class = library.add_child_with(namespace, ElementKind::Class, [("name", "Widget")]);
        let doc = library.add_child(class, ElementKind::Doc); // no name attribute

        parse_and_apply("Widget.* touched=1", &mut library);

        assert_eq!(library.node(doc).attr("touched"), Some("1"));
    }

    #[test]
    fn test_value_substitution_pattern() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "bar")]);

        parse_and_apply("Foo.bar name=foo_{{value}}", &mut library);

        assert_eq!(library.node(func).attr("name"), Some("foo_bar"));
    }

    #[test]
    fn test_substitution_without_previous_value_is_literal() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "bar")]);

        parse_and_apply("Foo.bar moved-to=x_{{value}}", &mut library);

        // No previous "moved-to" value to splice in
        assert_eq!(library.node(func).attr("moved-to"), Some("x_{{value}}"));
    }

    #[test]
    fn test_unset_attribute_with_parens() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(
            namespace,
            ElementKind::Function,
            [("name", "bar"), ("moved-to", "elsewhere")],
        );

        parse_and_apply("Foo.bar moved-to=\"()\"", &mut library);

        assert_eq!(library.node(func).attr("moved-to"), None);
    }

    #[test]
    fn test_attribute_set_is_idempotent() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "bar")]);

        parse_and_apply("Foo.bar version=2", &mut library);
        let first = library.node(func).attr("version").map(str::to_string);
        parse_and_apply("Foo.bar version=2", &mut library);

        assert_eq!(library.node(func).attr("version"), first.as_deref());
    }

    #[test]
    fn test_parameters_are_matched_transparently() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "run")]);
        let params = library.add_child(func, ElementKind::Parameters);
        let param =
            library.add_child_with(params, ElementKind::Parameter, [("name", "user_data")]);

        parse_and_apply("Foo.run.user_data nullable=1", &mut library);

        assert_eq!(library.node(param).attr("nullable"), Some("1"));
    }

    #[test]
    fn test_relative_rules_scope_to_root_match() {
        let (mut library, namespace) = gtk_library();
        let a = library.add_child_with(namespace, ElementKind::Class, [("name", "Alpha")]);
        let a_m = library.add_child_with(a, ElementKind::Method, [("name", "go")]);
        let b = library.add_child_with(namespace, ElementKind::Class, [("name", "Beta")]);
        let b_m = library.add_child_with(b, ElementKind::Method, [("name", "go")]);

        parse_and_apply("Foo.Alpha\n.go skip", &mut library);

        assert_eq!(library.node(a_m).attr("skip"), Some("1"));
        assert_eq!(library.node(b_m).attr("skip"), None);
    }

    #[test]
    fn test_reparent_preserves_node_count() {
        let (mut library, namespace) = gtk_library();
        let repository = library.repositories()[0];
        let source = library.add_child_with(namespace, ElementKind::Record, [("name", "Inner")]);
        library.add_child_with(source, ElementKind::Field, [("name", "data")]);
        let target = library.add_child_with(namespace, ElementKind::Class, [("name", "Outer")]);

        let before = library.subtree_len(repository);
        parse_and_apply("Foo.Inner girscope-parent=Outer", &mut library);
        let after = library.subtree_len(repository);

        assert_eq!(before, after);
        assert_eq!(library.node(source).parent(), Some(target));
    }

    #[test]
    fn test_reparent_to_namespace() {
        let (mut library, namespace) = gtk_library();
        let repository = library.repositories()[0];
        let other =
            library.add_child_with(repository, ElementKind::Namespace, [("name", "FooUtil")]);
        let rec = library.add_child_with(namespace, ElementKind::Record, [("name", "Helper")]);

        parse_and_apply("Foo.Helper girscope-parent=FooUtil", &mut library);

        assert_eq!(library.node(rec).parent(), Some(other));
    }

    #[test]
    fn test_reparent_unknown_target_warns() {
        let (mut library, namespace) = gtk_library();
        let rec = library.add_child_with(namespace, ElementKind::Record, [("name", "Helper")]);

        let diagnostics = parse_and_apply("Foo.Helper girscope-parent=Nowhere", &mut library);

        assert_eq!(library.node(rec).parent(), Some(namespace));
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("'Nowhere' not found")));
    }

    #[test]
    fn test_invalid_glob_reports_and_continues() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "ok")]);

        let diagnostics = parse_and_apply("Foo.broken( skip\nFoo.ok fine=1", &mut library);

        assert!(diagnostics.has_errors());
        assert_eq!(library.node(func).attr("fine"), Some("1"));
    }

    #[test]
    fn test_later_rules_see_earlier_mutations() {
        let (mut library, namespace) = gtk_library();
        let func = library.add_child_with(namespace, ElementKind::Function, [("name", "old")]);

        parse_and_apply("Foo.old name=new\nFoo.new marked=1", &mut library);

        assert_eq!(library.node(func).attr("name"), Some("new"));
        assert_eq!(library.node(func).attr("marked"), Some("1"));
    }
}
