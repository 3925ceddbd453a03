//! Resource identity values
//!
//! [`ResourceName`] compares and hashes case-insensitively; APIM treats
//! `Api1` and `api1` as the same resource. [`ParentChain`] and
//! [`ResourceKey`] are immutable values usable as map keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::kind::ResourceKind;

/// A non-empty resource name with case-insensitive equality.
#[derive(Debug, Clone)]
pub struct ResourceName(Arc<str>);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidName {
                message: "resource names must not be empty or whitespace".to_string(),
            });
        }
        Ok(Self(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ResourceName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ResourceName {}

impl Hash for ResourceName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl PartialEq<str> for ResourceName {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ResourceName {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// Ordered ancestors of a resource, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParentChain {
    links: Vec<(ResourceKind, ResourceName)>,
}

impl ParentChain {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn append(&self, kind: ResourceKind, name: ResourceName) -> Self {
        let mut links = self.links.clone();
        links.push((kind, name));
        Self { links }
    }

    pub fn prepend(&self, kind: ResourceKind, name: ResourceName) -> Self {
        let mut links = Vec::with_capacity(self.links.len() + 1);
        links.push((kind, name));
        links.extend(self.links.iter().cloned());
        Self { links }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ResourceKind, ResourceName)> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Innermost ancestor, if any.
    pub fn last(&self) -> Option<&(ResourceKind, ResourceName)> {
        self.links.last()
    }

    /// The chain without its innermost ancestor.
    pub fn parent(&self) -> Option<(Self, ResourceKind, ResourceName)> {
        let mut links = self.links.clone();
        links.pop().map(|(kind, name)| (Self { links }, kind, name))
    }

    /// The first `len` ancestors.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            links: self.links.iter().take(len).cloned().collect(),
        }
    }
}

/// `(kind, name, parent chain)` — an addressable resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub parents: ParentChain,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: ResourceName, parents: ParentChain) -> Self {
        Self { kind, name, parents }
    }

    pub fn root(kind: ResourceKind, name: ResourceName) -> Self {
        Self::new(kind, name, ParentChain::empty())
    }

    /// Canonical string form, `/{collectionPath}/{name}` per ancestry level.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (kind, name) in self.parents.iter() {
            out.push('/');
            out.push_str(kind.collection_uri_path());
            out.push('/');
            out.push_str(name.as_str());
        }
        out.push('/');
        out.push_str(self.kind.collection_uri_path());
        out.push('/');
        out.push_str(self.name.as_str());
        out
    }

    /// The key of this resource's innermost ancestor, if it has one.
    pub fn parent_key(&self) -> Option<ResourceKey> {
        self.parents
            .parent()
            .map(|(rest, kind, name)| ResourceKey::new(kind, name, rest))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn name(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    #[test]
    fn rejects_empty_and_whitespace_names() {
        assert!(ResourceName::new("").is_err());
        assert!(ResourceName::new("   ").is_err());
        assert!(ResourceName::new("api1").is_ok());
    }

    #[test]
    fn name_equality_ignores_case() {
        assert_eq!(name("Api1"), name("api1"));
        assert_ne!(name("api1"), name("api2"));
    }

    #[test]
    fn names_hash_case_insensitively() {
        let mut map = HashMap::new();
        map.insert(name("MyApi"), 1);
        assert_eq!(map.get(&name("myapi")), Some(&1));
    }

    #[test]
    fn chain_append_and_prefix() {
        let chain = ParentChain::empty()
            .append(ResourceKind::Workspace, name("ws1"))
            .append(ResourceKind::WorkspaceProduct, name("p1"));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.prefix(1).last().unwrap().1, name("ws1"));
        assert_eq!(chain.prefix(0), ParentChain::empty());
    }

    #[test]
    fn canonical_form_walks_ancestry() {
        let key = ResourceKey::new(
            ResourceKind::ApiOperationPolicy,
            name("policy"),
            ParentChain::empty()
                .append(ResourceKind::Api, name("api1"))
                .append(ResourceKind::ApiOperation, name("getPets")),
        );
        assert_eq!(
            key.canonical(),
            "/apis/api1/operations/getPets/policies/policy"
        );
    }

    #[test]
    fn parent_key_peels_the_innermost_ancestor() {
        let key = ResourceKey::new(
            ResourceKind::ApiPolicy,
            name("policy"),
            ParentChain::empty().append(ResourceKind::Api, name("api1")),
        );
        let parent = key.parent_key().unwrap();
        assert_eq!(parent.kind, ResourceKind::Api);
        assert_eq!(parent.name, name("api1"));
        assert!(parent.parents.is_empty());
        assert!(parent.parent_key().is_none());
    }

    #[test]
    fn keys_with_differently_cased_names_collide() {
        let a = ResourceKey::root(ResourceKind::Product, name("P1"));
        let b = ResourceKey::root(ResourceKind::Product, name("p1"));
        assert_eq!(a, b);
    }
}
