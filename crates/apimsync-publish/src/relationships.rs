//! Resource relationships
//!
//! Scans a snapshot into a resource set and a predecessor/successor
//! multimap: child-to-parent, composite-to-both-sides, reference edges
//! resolved by longest ancestor prefix, and revision-to-root edges. The
//! result is validated for closure, mutuality, and acyclicity before any
//! ordering decision is taken from it.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use apimsync_core::dto::last_segment;
use apimsync_core::json::get_path;
use apimsync_core::{revision, ParentChain, ResourceKey, ResourceKind, ResourceName};

use crate::error::{PublishError, Result};
use crate::fileops::FileOps;
use crate::parser::{parse_service_file, ParsedFile};

/// Every resource found in a snapshot, by key.
#[derive(Debug, Default)]
pub struct ResourceSet {
    files: HashMap<ResourceKey, ParsedFile>,
}

impl ResourceSet {
    pub fn get(&self, key: &ResourceKey) -> Option<&ParsedFile> {
        self.files.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.files.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.files.keys()
    }

    fn insert(&mut self, parsed: ParsedFile) {
        // An API can surface through both its information file and its
        // specification file; keep the entry that carries a DTO.
        match self.files.get(&parsed.key) {
            Some(existing) if existing.dto.is_some() => {}
            _ => {
                self.files.insert(parsed.key.clone(), parsed);
            }
        }
    }
}

/// Predecessor/successor multimaps over the keys of one snapshot.
#[derive(Debug, Default)]
pub struct Relationships {
    predecessors: HashMap<ResourceKey, HashSet<ResourceKey>>,
    successors: HashMap<ResourceKey, HashSet<ResourceKey>>,
}

impl Relationships {
    pub fn predecessors_of(&self, key: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.predecessors.get(key).into_iter().flatten()
    }

    pub fn successors_of(&self, key: &ResourceKey) -> impl Iterator<Item = &ResourceKey> {
        self.successors.get(key).into_iter().flatten()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.predecessors.keys()
    }

    fn register(&mut self, key: &ResourceKey) {
        self.predecessors.entry(key.clone()).or_default();
        self.successors.entry(key.clone()).or_default();
    }

    fn add_edge(&mut self, predecessor: ResourceKey, successor: ResourceKey) {
        self.register(&predecessor);
        self.register(&successor);
        self.successors
            .get_mut(&predecessor)
            .expect("registered above")
            .insert(successor.clone());
        self.predecessors
            .get_mut(&successor)
            .expect("registered above")
            .insert(predecessor);
    }

    /// Closure, mutuality, and acyclicity. Failures are aggregated into one
    /// error listing every underlying cause.
    pub fn validate(&self) -> Result<()> {
        let mut messages = Vec::new();

        for (key, others) in &self.predecessors {
            for other in others {
                if !self.predecessors.contains_key(other) || !self.successors.contains_key(other) {
                    messages.push(format!("{other} is referenced by {key} but not registered"));
                } else if !self.successors[other].contains(key) {
                    messages.push(format!(
                        "{other} precedes {key} but the successor edge is missing"
                    ));
                }
            }
        }
        for (key, others) in &self.successors {
            for other in others {
                if !self.predecessors.contains_key(other) || !self.successors.contains_key(other) {
                    messages.push(format!("{other} is referenced by {key} but not registered"));
                } else if !self.predecessors[other].contains(key) {
                    messages.push(format!(
                        "{key} precedes {other} but the predecessor edge is missing"
                    ));
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            let rendered: Vec<String> = cycle.iter().map(ResourceKey::canonical).collect();
            messages.push(format!("cycle detected: {}", rendered.join(" -> ")));
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(PublishError::RelationshipValidation { messages })
        }
    }

    /// Depth-first search over successor edges with white/grey/black
    /// colouring; a grey re-entry yields the cycle path from the first
    /// occurrence of the re-entered key.
    fn find_cycle(&self) -> Option<Vec<ResourceKey>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Colour {
            Grey,
            Black,
        }

        fn visit<'a>(
            graph: &'a Relationships,
            key: &'a ResourceKey,
            colours: &mut HashMap<&'a ResourceKey, Colour>,
            path: &mut Vec<&'a ResourceKey>,
        ) -> Option<Vec<ResourceKey>> {
            match colours.get(key) {
                Some(Colour::Black) => return None,
                Some(Colour::Grey) => {
                    let start = path
                        .iter()
                        .position(|visited| *visited == key)
                        .expect("grey keys are on the path");
                    let mut cycle: Vec<ResourceKey> =
                        path[start..].iter().map(|k| (*k).clone()).collect();
                    cycle.push(key.clone());
                    return Some(cycle);
                }
                None => {}
            }
            colours.insert(key, Colour::Grey);
            path.push(key);
            for successor in graph.successors_of(key) {
                if let Some(cycle) = visit(graph, successor, colours, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            colours.insert(key, Colour::Black);
            None
        }

        let mut colours = HashMap::new();
        for key in self.successors.keys() {
            if !colours.contains_key(key) {
                let mut path = Vec::new();
                if let Some(cycle) = visit(self, key, &mut colours, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

/// Ancestor kinds of `kind`, outermost first.
fn predecessor_hierarchy(kind: ResourceKind) -> Vec<ResourceKind> {
    let mut chain = Vec::new();
    let mut current = kind.predecessor();
    while let Some(kind) = current {
        chain.push(kind);
        current = kind.predecessor();
    }
    chain.reverse();
    chain
}

/// The referenced kind's parent chain: the longest prefix of `parents`
/// matching its predecessor hierarchy.
fn reference_parents(parents: &ParentChain, referenced: ResourceKind) -> ParentChain {
    let hierarchy = predecessor_hierarchy(referenced);
    let mut depth = 0;
    for ((chain_kind, _), expected) in parents.iter().zip(hierarchy.iter()) {
        if chain_kind != expected {
            break;
        }
        depth += 1;
    }
    parents.prefix(depth)
}

/// Whether an id addresses the expected collection (`…/<collection>/<name>`).
fn id_addresses(id: &str, kind: ResourceKind) -> bool {
    let trimmed = id.trim_end_matches('/');
    let mut segments = trimmed.rsplit('/');
    segments.next();
    segments
        .next()
        .is_some_and(|collection| collection.eq_ignore_ascii_case(kind.collection_uri_path()))
}

/// Register a key together with its whole ancestor chain, so ordering flows
/// through intermediate keys even when they have no file of their own
/// (operations in particular).
fn register_ancestry(relationships: &mut Relationships, key: &ResourceKey) {
    relationships.register(key);
    if let Some(parent) = key.parent_key() {
        relationships.add_edge(parent.clone(), key.clone());
        register_ancestry(relationships, &parent);
    }
}

fn emit_edges(
    relationships: &mut Relationships,
    key: &ResourceKey,
    dto: Option<&Value>,
) -> Result<()> {
    if key.kind.is_child() || key.kind.is_composite() {
        register_ancestry(relationships, key);
    } else {
        relationships.register(key);
    }

    if let Some(composite) = key.kind.composite() {
        let secondary_name = match composite.link_property {
            Some(property) => {
                let id_path = format!("properties.{property}");
                let id = dto.and_then(|dto| get_path(dto, &id_path)).and_then(Value::as_str);
                match id {
                    Some(id) => ResourceName::new(last_segment(id)?)?,
                    None => {
                        return Err(PublishError::MissingLinkProperty {
                            path: key.canonical().into(),
                            property: property.to_string(),
                        })
                    }
                }
            }
            None => key.name.clone(),
        };
        let secondary_key = ResourceKey::new(
            composite.secondary,
            secondary_name,
            reference_parents(&key.parents, composite.secondary),
        );
        register_ancestry(relationships, &secondary_key);
        relationships.add_edge(secondary_key, key.clone());
    }

    if let Some(dto) = dto {
        for (referenced, property_path) in key.kind.reference_properties() {
            let Some(Value::String(id)) = get_path(dto, property_path) else {
                continue;
            };
            if !id_addresses(id, referenced) {
                continue;
            }
            let referenced_key = ResourceKey::new(
                referenced,
                ResourceName::new(last_segment(id)?)?,
                reference_parents(&key.parents, referenced),
            );
            register_ancestry(relationships, &referenced_key);
            relationships.add_edge(referenced_key, key.clone());
        }
    }

    // A revision depends on its root API.
    if key.kind.supports_revisions() && !revision::is_root_name(key.name.as_str()) {
        let root_key = ResourceKey::new(
            key.kind,
            ResourceName::new(revision::root_name(key.name.as_str()))?,
            key.parents.clone(),
        );
        relationships.add_edge(root_key, key.clone());
    }

    Ok(())
}

/// Scan a snapshot into its resource set and validated relationships.
pub async fn build(ops: &dyn FileOps) -> Result<(ResourceSet, Relationships)> {
    let mut resources = ResourceSet::default();
    for path in ops.service_files().await? {
        if let Some(parsed) = parse_service_file(ops, &path).await? {
            resources.insert(parsed);
        }
    }

    let mut relationships = Relationships::default();
    for parsed in resources.files.values() {
        emit_edges(&mut relationships, &parsed.key, parsed.dto.as_ref())?;
    }
    relationships.validate()?;
    Ok((resources, relationships))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileops::LiveFs;
    use serde_json::json;

    fn rn(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    async fn build_tree(files: &[(&str, String)]) -> (ResourceSet, Relationships) {
        let temp = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let absolute = temp.path().join(path);
            std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
            std::fs::write(absolute, contents).unwrap();
        }
        build(&LiveFs::new(temp.path())).await.unwrap()
    }

    #[tokio::test]
    async fn edges_are_mutual_and_closed() {
        let (_, relationships) = build_tree(&[
            (
                "apis/petstore/apiInformation.json",
                json!({"properties": {"displayName": "p", "apiVersionSetId": "/apiVersionSets/vs1"}})
                    .to_string(),
            ),
            (
                "version sets/vs1/versionSetInformation.json",
                json!({"properties": {"displayName": "vs1"}}).to_string(),
            ),
            ("apis/petstore/policy.xml", "<policies/>".to_string()),
        ])
        .await;

        let api = ResourceKey::root(ResourceKind::Api, rn("petstore"));
        let version_set = ResourceKey::root(ResourceKind::VersionSet, rn("vs1"));
        let policy = ResourceKey::new(
            ResourceKind::ApiPolicy,
            rn("policy"),
            ParentChain::empty().append(ResourceKind::Api, rn("petstore")),
        );

        let api_predecessors: Vec<_> = relationships.predecessors_of(&api).collect();
        assert!(api_predecessors.contains(&&version_set));
        let vs_successors: Vec<_> = relationships.successors_of(&version_set).collect();
        assert!(vs_successors.contains(&&api));
        let policy_predecessors: Vec<_> = relationships.predecessors_of(&policy).collect();
        assert!(policy_predecessors.contains(&&api));
        relationships.validate().unwrap();
    }

    #[tokio::test]
    async fn link_edges_reach_primary_and_secondary() {
        let (_, relationships) = build_tree(&[
            (
                "products/starter/productInformation.json",
                json!({"properties": {"displayName": "Starter"}}).to_string(),
            ),
            (
                "products/starter/apis/petstore/productApiInformation.json",
                json!({"name": "l1", "properties": {"apiId": "/apis/petstore"}}).to_string(),
            ),
        ])
        .await;

        let link = ResourceKey::new(
            ResourceKind::ProductApi,
            rn("l1"),
            ParentChain::empty().append(ResourceKind::Product, rn("starter")),
        );
        let predecessors: HashSet<_> = relationships.predecessors_of(&link).cloned().collect();
        assert!(predecessors.contains(&ResourceKey::root(ResourceKind::Product, rn("starter"))));
        assert!(predecessors.contains(&ResourceKey::root(ResourceKind::Api, rn("petstore"))));
    }

    #[tokio::test]
    async fn revisions_depend_on_their_root() {
        let (_, relationships) = build_tree(&[
            (
                "apis/petstore/apiInformation.json",
                json!({"properties": {"apiRevision": "1"}}).to_string(),
            ),
            (
                "apis/petstore;rev=2/apiInformation.json",
                json!({"properties": {"apiRevision": "2"}}).to_string(),
            ),
        ])
        .await;

        let root = ResourceKey::root(ResourceKind::Api, rn("petstore"));
        let revisioned = ResourceKey::root(ResourceKind::Api, rn("petstore;rev=2"));
        let predecessors: Vec<_> = relationships.predecessors_of(&revisioned).collect();
        assert!(predecessors.contains(&&root));
    }

    #[tokio::test]
    async fn subscription_scopes_only_bind_product_ids() {
        let (_, relationships) = build_tree(&[(
            "subscriptions/s1/subscriptionInformation.json",
            json!({"properties": {"scope": "/apis/petstore"}}).to_string(),
        )])
        .await;
        let subscription = ResourceKey::root(ResourceKind::Subscription, rn("s1"));
        assert_eq!(relationships.predecessors_of(&subscription).count(), 0);
    }

    #[test]
    fn cycles_report_the_path() {
        let mut relationships = Relationships::default();
        let a = ResourceKey::root(ResourceKind::Product, rn("a"));
        let b = ResourceKey::root(ResourceKind::Product, rn("b"));
        let c = ResourceKey::root(ResourceKind::Product, rn("c"));
        relationships.add_edge(a.clone(), b.clone());
        relationships.add_edge(b.clone(), c.clone());
        relationships.add_edge(c.clone(), b.clone());

        let error = relationships.validate().unwrap_err();
        let PublishError::RelationshipValidation { messages } = error else {
            panic!("expected a validation error");
        };
        // The reported path covers only the cycle, never the entry chain.
        let cycle = messages.iter().find(|m| m.starts_with("cycle")).unwrap();
        assert!(cycle.contains("/products/b"));
        assert!(cycle.contains("/products/c"));
        assert!(cycle.contains(" -> "));
        assert!(!cycle.contains("/products/a"));
    }

    #[test]
    fn reference_parents_take_the_longest_matching_prefix() {
        let parents = ParentChain::empty()
            .append(ResourceKind::Workspace, rn("ws1"))
            .append(ResourceKind::WorkspaceProduct, rn("p1"));
        let scoped = reference_parents(&parents, ResourceKind::WorkspaceGroup);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped.last().unwrap().0, ResourceKind::Workspace);

        let rootward = reference_parents(&parents, ResourceKind::VersionSet);
        assert!(rootward.is_empty());
    }
}
