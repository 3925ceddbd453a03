//! Canonical layout
//!
//! Maps `(kind, name, parent chain)` to on-disk paths under the service
//! directory and to management URIs under the service URL. Pure functions;
//! nothing here touches the filesystem or the network.

use std::path::{Path, PathBuf};

use url::Url;

use crate::kind::{PolicyPlacement, ResourceKind};
use crate::name::{ParentChain, ResourceKey, ResourceName};
use crate::spec_format::ApiSpecification;

/// Directory of the parent scope: the service directory extended by each
/// ancestor's `<collection dir>/<name>`. `None` when an ancestor kind has no
/// on-disk directory.
pub fn scope_directory(service_dir: &Path, parents: &ParentChain) -> Option<PathBuf> {
    let mut path = service_dir.to_path_buf();
    for (kind, name) in parents.iter() {
        path.push(kind.collection_dir()?);
        path.push(name.as_str());
    }
    Some(path)
}

/// `<scope>/<collection dir>` for kinds that occupy a subtree.
pub fn collection_directory(
    service_dir: &Path,
    kind: ResourceKind,
    parents: &ParentChain,
) -> Option<PathBuf> {
    let mut path = scope_directory(service_dir, parents)?;
    path.push(kind.collection_dir()?);
    Some(path)
}

/// Per-instance directory. For link kinds the directory carries the
/// *secondary* resource's name; pass it through `dir_name`.
pub fn instance_directory_named(
    service_dir: &Path,
    kind: ResourceKind,
    parents: &ParentChain,
    dir_name: &str,
) -> Option<PathBuf> {
    let mut path = collection_directory(service_dir, kind, parents)?;
    path.push(dir_name);
    Some(path)
}

/// Per-instance directory for non-link kinds, named after the key itself.
pub fn instance_directory(service_dir: &Path, key: &ResourceKey) -> Option<PathBuf> {
    debug_assert!(!key.kind.is_link(), "link directories are named after the secondary");
    instance_directory_named(service_dir, key.kind, &key.parents, key.name.as_str())
}

/// Information file path for non-link kinds.
pub fn information_file(service_dir: &Path, key: &ResourceKey) -> Option<PathBuf> {
    let mut path = instance_directory(service_dir, key)?;
    path.push(key.kind.file_name()?);
    Some(path)
}

/// Information file path for a link kind, under the secondary's name.
pub fn link_information_file(
    service_dir: &Path,
    key: &ResourceKey,
    secondary_name: &ResourceName,
) -> Option<PathBuf> {
    let mut path =
        instance_directory_named(service_dir, key.kind, &key.parents, secondary_name.as_str())?;
    path.push(key.kind.file_name()?);
    Some(path)
}

/// Side file carrying a policy's raw XML body.
pub fn policy_file(service_dir: &Path, key: &ResourceKey) -> Option<PathBuf> {
    match key.kind.policy_placement()? {
        PolicyPlacement::Fragment => {
            let mut path = instance_directory(service_dir, key)?;
            path.push("policy.xml");
            Some(path)
        }
        PolicyPlacement::PerParent => {
            let mut path = scope_directory(service_dir, &key.parents)?;
            path.push(format!("{}.xml", key.name));
            Some(path)
        }
        PolicyPlacement::ServiceRoot => {
            let mut path = service_dir.to_path_buf();
            path.push(format!("{}.xml", key.name));
            Some(path)
        }
    }
}

/// Specification file inside an API's instance directory.
pub fn specification_file(
    service_dir: &Path,
    api_key: &ResourceKey,
    specification: ApiSpecification,
) -> Option<PathBuf> {
    let mut path = instance_directory(service_dir, api_key)?;
    path.push(specification.file_name());
    Some(path)
}

/// Collection URI: service URL + ancestor segments + the kind's segment.
///
/// Segments go through `Url`'s path-segment encoding, so resource names with
/// reserved characters stay intact on the wire.
pub fn collection_uri(service_url: &Url, kind: ResourceKind, parents: &ParentChain) -> Url {
    let mut uri = service_url.clone();
    {
        let mut segments = uri
            .path_segments_mut()
            .expect("management URLs are base URLs");
        segments.pop_if_empty();
        for (parent_kind, parent_name) in parents.iter() {
            segments.push(parent_kind.collection_uri_path());
            segments.push(parent_name.as_str());
        }
        segments.push(kind.collection_uri_path());
    }
    uri
}

/// Element URI: the collection URI plus the resource name.
pub fn element_uri(service_url: &Url, key: &ResourceKey) -> Url {
    let uri = collection_uri(service_url, key.kind, &key.parents);
    append_segments(&uri, &[key.name.as_str()])
}

/// `uri` extended by further path segments, each percent-encoded.
pub fn append_segments(uri: &Url, segments: &[&str]) -> Url {
    let mut extended = uri.clone();
    {
        let mut path = extended
            .path_segments_mut()
            .expect("management URLs are base URLs");
        path.pop_if_empty();
        path.extend(segments);
    }
    extended
}
