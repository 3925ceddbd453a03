//! Kind-level relationship graph
//!
//! Two distinct edge sets are derived from the registry:
//!
//! - *Traversal* edges (predecessor/successor) drive the extractor's
//!   top-down walk: parent-of-child and primary-of-composite.
//! - *Dependency* edges drive publish ordering and SKU inference: traversal
//!   edges plus composite secondaries, reference targets, and the
//!   policy-to-named-value edge.
//!
//! Both are computed once per process from the static kind table.

use once_cell::sync::Lazy;

use crate::kind::ResourceKind;

/// Dependencies of each kind, indexed by discriminant.
static DEPENDENCIES: Lazy<Vec<Vec<ResourceKind>>> = Lazy::new(|| {
    ResourceKind::ALL
        .iter()
        .map(|kind| {
            let mut deps = Vec::new();
            let mut push = |dep: ResourceKind| {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            };
            if let Some(parent) = kind.parent() {
                push(parent);
            }
            if let Some(composite) = kind.composite() {
                push(composite.primary);
                push(composite.secondary);
            }
            for (target, _) in kind.reference_properties() {
                push(target);
            }
            // Policies may reference named values in their XML bodies.
            if kind.is_policy() {
                push(ResourceKind::NamedValue);
            }
            deps
        })
        .collect()
});

/// Traversal successors of each kind, indexed by discriminant.
static SUCCESSORS: Lazy<Vec<Vec<ResourceKind>>> = Lazy::new(|| {
    let mut successors: Vec<Vec<ResourceKind>> = ResourceKind::ALL.iter().map(|_| Vec::new()).collect();
    for kind in ResourceKind::ALL {
        if let Some(predecessor) = kind.predecessor() {
            successors[predecessor as usize].push(*kind);
        }
    }
    successors
});

/// Kinds with no traversal predecessor; the roots of the extractor forest.
static ROOTS: Lazy<Vec<ResourceKind>> = Lazy::new(|| {
    ResourceKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.predecessor().is_none())
        .collect()
});

/// All kinds ordered so that every dependency precedes its dependents.
static TOPOLOGICAL: Lazy<Vec<ResourceKind>> = Lazy::new(|| {
    let mut order: Vec<ResourceKind> = Vec::with_capacity(ResourceKind::ALL.len());
    let mut emitted = vec![false; ResourceKind::ALL.len()];
    while order.len() < ResourceKind::ALL.len() {
        let mut progressed = false;
        for kind in ResourceKind::ALL {
            if emitted[*kind as usize] {
                continue;
            }
            let ready = dependencies_of(*kind)
                .iter()
                .all(|dep| emitted[*dep as usize]);
            if ready {
                emitted[*kind as usize] = true;
                order.push(*kind);
                progressed = true;
            }
        }
        if !progressed {
            panic!("resource kind registry contains a dependency cycle");
        }
    }
    order
});

/// Dependency edges of `kind`, per the registry derivation rules.
pub fn dependencies_of(kind: ResourceKind) -> &'static [ResourceKind] {
    &DEPENDENCIES[kind as usize]
}

/// Traversal successors of `kind` (inverse of [`ResourceKind::predecessor`]).
pub fn successors_of(kind: ResourceKind) -> &'static [ResourceKind] {
    &SUCCESSORS[kind as usize]
}

/// Root kinds of the extractor traversal forest.
pub fn roots() -> &'static [ResourceKind] {
    &ROOTS
}

/// Dependency-respecting order over every kind.
pub fn topological_order() -> &'static [ResourceKind] {
    &TOPOLOGICAL
}

/// Most-dependent-first order; used to try the most specific kind first when
/// recognising files.
pub fn reverse_topological_order() -> impl Iterator<Item = ResourceKind> {
    TOPOLOGICAL.iter().rev().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceKind::*;

    #[test]
    fn children_depend_on_their_parent() {
        assert!(dependencies_of(ApiRelease).contains(&Api));
        assert!(dependencies_of(WorkspaceNamedValue).contains(&Workspace));
    }

    #[test]
    fn composites_depend_on_both_sides() {
        let deps = dependencies_of(ProductApi);
        assert!(deps.contains(&Product));
        assert!(deps.contains(&Api));
    }

    #[test]
    fn references_become_dependencies() {
        assert!(dependencies_of(Api).contains(&VersionSet));
        assert!(dependencies_of(Diagnostic).contains(&Logger));
        assert!(dependencies_of(Subscription).contains(&Product));
    }

    #[test]
    fn every_policy_kind_depends_on_named_values() {
        for kind in ResourceKind::ALL {
            if kind.is_policy() {
                assert!(
                    dependencies_of(*kind).contains(&NamedValue),
                    "{kind:?} must depend on NamedValue"
                );
            }
        }
    }

    #[test]
    fn roots_have_no_predecessor() {
        for kind in roots() {
            assert!(kind.predecessor().is_none());
        }
        assert!(roots().contains(&Api));
        assert!(roots().contains(&Workspace));
        assert!(!roots().contains(&ApiPolicy));
        assert!(!roots().contains(&ProductApi));
    }

    #[test]
    fn successors_invert_predecessors() {
        for kind in ResourceKind::ALL {
            for successor in successors_of(*kind) {
                assert_eq!(successor.predecessor(), Some(*kind));
            }
            if let Some(predecessor) = kind.predecessor() {
                assert!(successors_of(predecessor).contains(kind));
            }
        }
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let order = topological_order();
        assert_eq!(order.len(), ResourceKind::ALL.len());
        let position = |kind: ResourceKind| order.iter().position(|k| *k == kind).unwrap();
        for kind in ResourceKind::ALL {
            for dep in dependencies_of(*kind) {
                assert!(
                    position(*dep) < position(*kind),
                    "{dep:?} must precede {kind:?}"
                );
            }
        }
    }

    #[test]
    fn reverse_order_tries_dependents_first() {
        let mut reversed = reverse_topological_order();
        let api_policy = reversed.position(|k| k == ApiPolicy).unwrap();
        let api = reverse_topological_order().position(|k| k == Api).unwrap();
        assert!(api_policy < api);
    }
}
