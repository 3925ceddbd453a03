//! File-to-resource recognition
//!
//! Maps a service-relative file path to the resource it represents by trying
//! every kind's on-disk shape, most specific (reverse-topological) first. A
//! path that matches more than one kind is a fatal input error.

use std::path::{Path, PathBuf};

use serde_json::Value;

use apimsync_core::dto::last_segment;
use apimsync_core::json::get_path;
use apimsync_core::{graph, ApiSpecification, ParentChain, PolicyPlacement, ResourceKey, ResourceKind, ResourceName};

use crate::error::{PublishError, Result};
use crate::fileops::FileOps;

/// A recognised file: the resource it belongs to, and its raw DTO for kinds
/// with an information file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub key: ResourceKey,
    pub path: PathBuf,
    pub dto: Option<Value>,
}

/// Ancestor kinds of `kind`, outermost first.
fn hierarchy(kind: ResourceKind) -> Vec<ResourceKind> {
    let mut chain = Vec::new();
    let mut current = kind.predecessor();
    while let Some(kind) = current {
        chain.push(kind);
        current = kind.predecessor();
    }
    chain.reverse();
    chain
}

/// Check the leading `<collection dir>/<name>` pairs against the kind's
/// ancestor hierarchy and build the parent chain.
fn match_ancestry(components: &[&str], ancestors: &[ResourceKind]) -> Option<ParentChain> {
    let mut parents = ParentChain::empty();
    for (index, ancestor) in ancestors.iter().enumerate() {
        let dir = components.get(index * 2)?;
        let name = components.get(index * 2 + 1)?;
        if *dir != ancestor.collection_dir()? {
            return None;
        }
        parents = parents.append(*ancestor, ResourceName::new(*name).ok()?);
    }
    Some(parents)
}

async fn match_kind(
    ops: &dyn FileOps,
    kind: ResourceKind,
    path: &Path,
    components: &[&str],
) -> Result<Option<ParsedFile>> {
    let ancestors = hierarchy(kind);
    let depth = ancestors.len() * 2;

    // Information files: <ancestry>/<collection dir>/<instance>/<file>.
    if let Some(file_name) = kind.file_name() {
        if components.len() == depth + 3
            && components[depth + 2] == file_name
            && Some(components[depth]) == kind.collection_dir()
        {
            if let Some(parents) = match_ancestry(components, &ancestors) {
                let instance = components[depth + 1];
                let raw = ops.read_file(path).await?.ok_or_else(|| {
                    PublishError::MissingSource {
                        key: path.display().to_string(),
                    }
                })?;
                let dto: Value = serde_json::from_slice(&raw)?;
                let name = if let Some(property) = kind.link_property() {
                    resolve_link_name(path, &dto, instance, property)?
                } else {
                    instance.to_string()
                };
                return Ok(Some(ParsedFile {
                    key: ResourceKey::new(kind, ResourceName::new(name)?, parents),
                    path: path.to_path_buf(),
                    dto: Some(dto),
                }));
            }
        }
    }

    // Policy XML bodies.
    match kind.policy_placement() {
        Some(PolicyPlacement::Fragment) => {
            if components.len() == depth + 3
                && components[depth + 2] == "policy.xml"
                && Some(components[depth]) == kind.collection_dir()
            {
                if let Some(parents) = match_ancestry(components, &ancestors) {
                    return Ok(Some(ParsedFile {
                        key: ResourceKey::new(
                            kind,
                            ResourceName::new(components[depth + 1])?,
                            parents,
                        ),
                        path: path.to_path_buf(),
                        dto: None,
                    }));
                }
            }
        }
        Some(PolicyPlacement::PerParent | PolicyPlacement::ServiceRoot) => {
            if components.len() == depth + 1 {
                if let Some(stem) = components[depth].strip_suffix(".xml") {
                    if let Some(parents) = match_ancestry(components, &ancestors) {
                        return Ok(Some(ParsedFile {
                            key: ResourceKey::new(kind, ResourceName::new(stem)?, parents),
                            path: path.to_path_buf(),
                            dto: None,
                        }));
                    }
                }
            }
        }
        None => {}
    }

    // API specification files map to their API.
    if kind.supports_revisions()
        && components.len() == depth + 3
        && Some(components[depth]) == kind.collection_dir()
        && ApiSpecification::from_file_name(components[depth + 2]).is_some()
    {
        if let Some(parents) = match_ancestry(components, &ancestors) {
            return Ok(Some(ParsedFile {
                key: ResourceKey::new(kind, ResourceName::new(components[depth + 1])?, parents),
                path: path.to_path_buf(),
                dto: None,
            }));
        }
    }

    Ok(None)
}

/// A link's own name comes from its DTO; the directory must carry the
/// secondary's name.
fn resolve_link_name(
    path: &Path,
    dto: &Value,
    directory_name: &str,
    property: &str,
) -> Result<String> {
    let id_path = format!("properties.{property}");
    let Some(Value::String(id)) = get_path(dto, &id_path) else {
        return Err(PublishError::MissingLinkProperty {
            path: path.to_path_buf(),
            property: property.to_string(),
        });
    };
    let secondary = last_segment(id).map_err(PublishError::Core)?;
    if !secondary.eq_ignore_ascii_case(directory_name) {
        return Err(PublishError::LinkSecondaryMismatch {
            path: path.to_path_buf(),
            expected: directory_name.to_string(),
            found: secondary.to_string(),
        });
    }
    let name = match dto.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => directory_name.to_string(),
    };
    Ok(name)
}

/// Recognise one service-relative file. `None` for files the tools do not
/// own; ambiguity across kinds is fatal.
pub async fn parse_service_file(ops: &dyn FileOps, path: &Path) -> Result<Option<ParsedFile>> {
    let components: Option<Vec<&str>> = path
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    let Some(components) = components else {
        return Ok(None);
    };
    if components.is_empty() {
        return Ok(None);
    }

    let mut matches: Vec<ParsedFile> = Vec::new();
    for kind in graph::reverse_topological_order() {
        if let Some(parsed) = match_kind(ops, kind, path, &components).await? {
            matches.push(parsed);
        }
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(PublishError::AmbiguousFile {
            path: path.to_path_buf(),
            kinds: matches.iter().map(|m| m.key.kind.to_string()).collect(),
        }),
    }
}
