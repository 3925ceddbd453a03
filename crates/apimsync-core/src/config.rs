//! Hierarchical inclusion/override configuration
//!
//! The configuration file is a YAML/JSON tree of nested lists keyed by the
//! plural nouns of child kinds. Each list item is either a bare name or a
//! single-key mapping whose body holds both child sections and per-resource
//! overrides. Lookups collapse revisioned API names to their root name, so
//! all revisions of an API share one inclusion decision.
//!
//! Two-level memoisation: one cell for the parsed document, one cell per
//! parent-chain prefix for the section at that scope.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{CoreError, Result};
use crate::json::remove_path;
use crate::name::{ParentChain, ResourceKey, ResourceName};
use crate::revision;

/// Lazily loaded configuration document with scoped-section caching.
pub struct Configuration {
    path: Option<PathBuf>,
    document: OnceCell<Option<Value>>,
    sections: DashMap<ParentChain, Arc<OnceCell<Option<Value>>>>,
}

impl Configuration {
    /// Configuration backed by an optional YAML/JSON file.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        Self {
            path,
            document: OnceCell::new(),
            sections: DashMap::new(),
        }
    }

    /// An empty configuration: every lookup answers `None`.
    pub fn empty() -> Self {
        Self::from_path(None)
    }

    /// In-memory configuration, mainly for tests.
    pub fn from_value(document: Value) -> Self {
        let cell = OnceCell::new();
        cell.set(Some(document)).expect("fresh cell");
        Self {
            path: None,
            document: cell,
            sections: DashMap::new(),
        }
    }

    async fn document(&self) -> Result<Option<&Value>> {
        let document = self
            .document
            .get_or_try_init(|| async {
                let Some(path) = &self.path else {
                    return Ok::<_, CoreError>(None);
                };
                let contents = tokio::fs::read_to_string(path).await?;
                let value: Value = serde_yaml::from_str(&contents)?;
                Ok(Some(value))
            })
            .await?;
        Ok(document.as_ref())
    }

    /// The configuration section scoped to `parents`, walking one plural
    /// section and one named item per ancestor. Cached per prefix.
    async fn section_for(&self, parents: &ParentChain) -> Result<Option<Value>> {
        let collapsed = collapse_revisions(parents);
        let mut current = self.document().await?.cloned();
        for depth in 1..=collapsed.len() {
            let prefix = collapsed.prefix(depth);
            let cell = self
                .sections
                .entry(prefix.clone())
                .or_default()
                .clone();
            let parent_section = current.take();
            let (kind, name) = prefix.last().expect("non-empty prefix").clone();
            current = cell
                .get_or_try_init(|| async move {
                    Ok::<_, CoreError>(descend(parent_section.as_ref(), kind.plural(), &name))
                })
                .await?
                .clone();
        }
        Ok(current)
    }

    /// `Some(included)` when the kind has a list at this scope, `None` when
    /// the configuration is silent (callers treat that as "include").
    pub async fn resource_is_included(&self, key: &ResourceKey) -> Result<Option<bool>> {
        let Some(section) = self.section_for(&key.parents).await? else {
            return Ok(None);
        };
        let Some(listed) = section.get(key.kind.plural()) else {
            return Ok(None);
        };
        let items = listed.as_array().ok_or_else(|| CoreError::InvalidConfiguration {
            message: format!("section '{}' must be a list", key.kind.plural()),
        })?;
        let collapse = key.kind.supports_revisions();
        Ok(Some(items.iter().any(|item| {
            item_name(item).is_some_and(|candidate| name_matches(candidate, &key.name, collapse))
        })))
    }

    /// The JSON object configured for this resource, to be merged into its
    /// DTO at publish time. Revision identity is never configuration-driven:
    /// API overrides lose `apiRevision` and `isCurrent`.
    pub async fn override_for(&self, key: &ResourceKey) -> Result<Option<Value>> {
        let Some(section) = self.section_for(&key.parents).await? else {
            return Ok(None);
        };
        let Some(items) = section.get(key.kind.plural()).and_then(Value::as_array) else {
            return Ok(None);
        };
        let collapse = key.kind.supports_revisions();
        let body = items.iter().find_map(|item| {
            let map = item.as_object()?;
            if map.len() != 1 {
                return None;
            }
            let (candidate, body) = map.iter().next()?;
            name_matches(candidate, &key.name, collapse).then(|| body.clone())
        });
        Ok(body.map(|mut body| {
            if key.kind.supports_revisions() {
                remove_path(&mut body, "properties.apiRevision");
                remove_path(&mut body, "properties.isCurrent");
            }
            body
        }))
    }
}

/// Ancestors named `root;rev=k` collapse to `root` before any lookup.
fn collapse_revisions(parents: &ParentChain) -> ParentChain {
    let mut collapsed = ParentChain::empty();
    for (kind, name) in parents.iter() {
        let name = if kind.supports_revisions() {
            ResourceName::new(revision::root_name(name.as_str()))
                .expect("root of a valid name is valid")
        } else {
            name.clone()
        };
        collapsed = collapsed.append(*kind, name);
    }
    collapsed
}

fn descend(section: Option<&Value>, plural: &str, name: &ResourceName) -> Option<Value> {
    let items = section?.get(plural)?.as_array()?;
    items.iter().find_map(|item| {
        let map = item.as_object()?;
        if map.len() != 1 {
            return None;
        }
        let (candidate, body) = map.iter().next()?;
        name_matches(candidate, name, false).then(|| body.clone())
    })
}

/// A list item's name: its string value, or its single mapping key.
fn item_name(item: &Value) -> Option<&str> {
    match item {
        Value::String(name) => Some(name),
        Value::Object(map) if map.len() == 1 => map.keys().next().map(String::as_str),
        _ => None,
    }
}

fn name_matches(candidate: &str, name: &ResourceName, collapse_revision: bool) -> bool {
    if candidate.eq_ignore_ascii_case(name.as_str()) {
        return true;
    }
    collapse_revision && candidate.eq_ignore_ascii_case(revision::root_name(name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind::*;
    use serde_json::json;

    fn rn(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    fn config() -> Configuration {
        let yaml = r#"
apis:
  - petstore:
      diagnostics:
        - applicationinsights
  - orders:
      properties:
        displayName: Orders (configured)
products:
  - starter
namedValues: []
"#;
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Configuration::from_value(value)
    }

    #[tokio::test]
    async fn absent_section_answers_none() {
        let config = config();
        let key = ResourceKey::root(Backend, rn("b1"));
        assert_eq!(config.resource_is_included(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_configuration_answers_none() {
        let config = Configuration::empty();
        let key = ResourceKey::root(Api, rn("petstore"));
        assert_eq!(config.resource_is_included(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn membership_is_decided_at_the_scope() {
        let config = config();
        assert_eq!(
            config
                .resource_is_included(&ResourceKey::root(Product, rn("starter")))
                .await
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            config
                .resource_is_included(&ResourceKey::root(Product, rn("unlimited")))
                .await
                .unwrap(),
            Some(false)
        );
        // An empty list excludes everything of that kind.
        assert_eq!(
            config
                .resource_is_included(&ResourceKey::root(NamedValue, rn("nv1")))
                .await
                .unwrap(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn nested_scopes_walk_named_items() {
        let config = config();
        let parents = ParentChain::empty().append(Api, rn("petstore"));
        let included = ResourceKey::new(ApiDiagnostic, rn("applicationinsights"), parents.clone());
        let excluded = ResourceKey::new(ApiDiagnostic, rn("azuremonitor"), parents);
        assert_eq!(config.resource_is_included(&included).await.unwrap(), Some(true));
        assert_eq!(config.resource_is_included(&excluded).await.unwrap(), Some(false));

        // No diagnostics section is declared under `orders`.
        let orders = ParentChain::empty().append(Api, rn("orders"));
        let silent = ResourceKey::new(ApiDiagnostic, rn("applicationinsights"), orders);
        assert_eq!(config.resource_is_included(&silent).await.unwrap(), None);
    }

    #[tokio::test]
    async fn api_revisions_share_the_root_decision() {
        let config = config();
        let root = ResourceKey::root(Api, rn("petstore"));
        let revisioned = ResourceKey::root(Api, rn("petstore;rev=2"));
        assert_eq!(config.resource_is_included(&root).await.unwrap(), Some(true));
        assert_eq!(config.resource_is_included(&revisioned).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn revisioned_api_ancestors_collapse_on_the_path_walk() {
        let config = config();
        let parents = ParentChain::empty().append(Api, rn("petstore;rev=3"));
        let key = ResourceKey::new(ApiDiagnostic, rn("applicationinsights"), parents);
        assert_eq!(config.resource_is_included(&key).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn override_returns_the_item_body() {
        let config = config();
        let key = ResourceKey::root(Api, rn("orders"));
        let body = config.override_for(&key).await.unwrap().unwrap();
        assert_eq!(
            body,
            json!({"properties": {"displayName": "Orders (configured)"}})
        );
        assert!(config
            .override_for(&ResourceKey::root(Api, rn("missing")))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn api_overrides_never_rewrite_revision_identity() {
        let yaml = r#"
apis:
  - petstore:
      properties:
        apiRevision: "7"
        isCurrent: false
        description: configured
"#;
        let config = Configuration::from_value(serde_yaml::from_str(yaml).unwrap());
        let body = config
            .override_for(&ResourceKey::root(Api, rn("petstore")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body, json!({"properties": {"description": "configured"}}));
    }

    #[tokio::test]
    async fn malformed_sections_are_input_errors() {
        let config = Configuration::from_value(json!({"products": {"starter": {}}}));
        let key = ResourceKey::root(Product, rn("starter"));
        assert!(config.resource_is_included(&key).await.is_err());
    }
}
