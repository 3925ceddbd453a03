//! Artefact writing
//!
//! Persists information files, policy XML bodies, and API specification
//! documents at their canonical paths, creating directories as needed.
//! Information files are written pretty-printed with a trailing newline so
//! the tree diffs cleanly under git.

use std::path::{Path, PathBuf};

use serde_json::Value;

use apimsync_core::{layout, ApiSpecification, ResourceKey, ResourceName};

use crate::error::{ExtractError, Result};

async fn write(path: PathBuf, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, contents).await?;
    Ok(())
}

fn missing_path(key: &ResourceKey) -> ExtractError {
    ExtractError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("no canonical path for {key}"),
    ))
}

/// Overwrite the information file with canonical JSON. For link kinds the
/// instance directory carries the secondary's name.
pub async fn write_information_file(
    service_dir: &Path,
    key: &ResourceKey,
    dto: &Value,
    link_secondary: Option<&ResourceName>,
) -> Result<()> {
    let path = match link_secondary {
        Some(secondary) => layout::link_information_file(service_dir, key, secondary),
        None => layout::information_file(service_dir, key),
    }
    .ok_or_else(|| missing_path(key))?;
    let mut contents = serde_json::to_string_pretty(dto)?;
    contents.push('\n');
    write(path, contents.as_bytes()).await
}

/// Write a policy's raw XML body to its side file.
pub async fn write_policy_file(service_dir: &Path, key: &ResourceKey, xml: &str) -> Result<()> {
    let path = layout::policy_file(service_dir, key).ok_or_else(|| missing_path(key))?;
    write(path, xml.as_bytes()).await
}

/// Write an API specification document with the variant's extension.
pub async fn write_specification_file(
    service_dir: &Path,
    key: &ResourceKey,
    specification: ApiSpecification,
    contents: &str,
) -> Result<()> {
    let path = layout::specification_file(service_dir, key, specification)
        .ok_or_else(|| missing_path(key))?;
    write(path, contents.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimsync_core::ResourceKind;
    use serde_json::json;

    fn rn(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    #[tokio::test]
    async fn information_files_end_with_a_newline() {
        let temp = tempfile::tempdir().unwrap();
        let key = ResourceKey::root(ResourceKind::Product, rn("p1"));
        write_information_file(temp.path(), &key, &json!({"properties": {}}), None)
            .await
            .unwrap();
        let written =
            std::fs::read_to_string(temp.path().join("products/p1/productInformation.json"))
                .unwrap();
        assert!(written.ends_with("}\n"));
    }

    #[tokio::test]
    async fn link_files_land_under_the_secondary() {
        let temp = tempfile::tempdir().unwrap();
        let key = ResourceKey::new(
            ResourceKind::ProductApi,
            rn("l1"),
            apimsync_core::ParentChain::empty().append(ResourceKind::Product, rn("starter")),
        );
        write_information_file(
            temp.path(),
            &key,
            &json!({"name": "l1", "properties": {"apiId": "/apis/petstore"}}),
            Some(&rn("petstore")),
        )
        .await
        .unwrap();
        assert!(temp
            .path()
            .join("products/starter/apis/petstore/productApiInformation.json")
            .exists());
    }

    #[tokio::test]
    async fn policy_bodies_are_written_verbatim() {
        let temp = tempfile::tempdir().unwrap();
        let key = ResourceKey::root(ResourceKind::PolicyFragment, rn("f1"));
        let xml = "<fragment>\n  <set-header name=\"x\" />\n</fragment>";
        write_policy_file(temp.path(), &key, xml).await.unwrap();
        let written =
            std::fs::read_to_string(temp.path().join("policy fragments/f1/policy.xml")).unwrap();
        assert_eq!(written, xml);
    }
}
