//! API revision semantics
//!
//! A root-named API whose `apiRevision` differs from the service is never
//! overwritten in place: a fresh revision is created from the current one and
//! flipped current through a one-shot release (the "make current" dance),
//! after which the main DTO is PUT.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use apimsync_core::json::get_path;
use apimsync_core::{layout, revision, ResourceKey, ResourceKind};

use crate::client::ApimClient;
use crate::error::{ApimError, Result};

/// API write operations with a memoised current-revision cache.
pub struct ApiWriter {
    client: ApimClient,
    current_revisions: DashMap<String, Arc<OnceCell<Option<u32>>>>,
}

fn revision_number(dto: &Value) -> Option<u32> {
    match get_path(dto, "properties.apiRevision") {
        Some(Value::String(revision)) => revision.parse().ok(),
        Some(Value::Number(revision)) => revision.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

impl ApiWriter {
    pub fn new(client: ApimClient) -> Self {
        Self {
            client,
            current_revisions: DashMap::new(),
        }
    }

    pub fn client(&self) -> &ApimClient {
        &self.client
    }

    /// Revision number of the currently-current revision of a root-named
    /// API, `None` when the API does not exist. Memoised per API.
    pub async fn current_revision(&self, root_key: &ResourceKey) -> Result<Option<u32>> {
        let uri = layout::element_uri(self.client.service_url(), root_key);
        let cell = self
            .current_revisions
            .entry(uri.to_string())
            .or_default()
            .clone();
        let current = cell
            .get_or_try_init(|| async {
                let existing = self.client.get_optional_json(uri.as_str()).await?;
                Ok::<_, ApimError>(existing.as_ref().and_then(revision_number))
            })
            .await?;
        Ok(*current)
    }

    /// Whether a revisioned name (`root;rev=n`) denotes the revision that is
    /// currently current on the service. Root names answer `false`.
    pub async fn revision_is_current(&self, key: &ResourceKey) -> Result<bool> {
        let Some((root, number)) = revision::parse(key.name.as_str())? else {
            return Ok(false);
        };
        let root_key = ResourceKey::new(
            key.kind,
            apimsync_core::ResourceName::new(root)?,
            key.parents.clone(),
        );
        Ok(self.current_revision(&root_key).await? == Some(number))
    }

    /// PUT an API, creating a new revision through the make-current dance
    /// when a root-named API changes revision number.
    pub async fn put_api(&self, key: &ResourceKey, dto: &Value) -> Result<()> {
        let uri = layout::element_uri(self.client.service_url(), key);
        let mut dto = dto.clone();

        if revision::is_root_name(key.name.as_str()) {
            let existing = self.client.get_optional_json(uri.as_str()).await?;
            if let Some(existing) = &existing {
                let on_service = revision_number(existing);
                let incoming = revision_number(&dto);
                if let (Some(on_service), Some(incoming)) = (on_service, incoming) {
                    if on_service != incoming {
                        self.make_revision_current(key, incoming).await?;
                    }
                }
                if key.kind == ResourceKind::WorkspaceApi {
                    carry_forward(&mut dto, existing);
                }
            }
        }

        self.client.put_json(uri.as_str(), &dto).await?;
        Ok(())
    }

    /// Create `root;rev=n` from the current revision and flip it current via
    /// a one-shot release that is deleted immediately afterwards.
    async fn make_revision_current(&self, root_key: &ResourceKey, number: u32) -> Result<()> {
        let revisioned_name = revision::combine(root_key.name.as_str(), number)?;
        let revisioned_key = ResourceKey::new(
            root_key.kind,
            apimsync_core::ResourceName::new(revisioned_name)?,
            root_key.parents.clone(),
        );
        let revision_uri = layout::element_uri(self.client.service_url(), &revisioned_key);
        let source_api_id = root_key.canonical();
        tracing::info!(api = %root_key, revision = number, "creating revision");
        self.client
            .put_json(
                revision_uri.as_str(),
                &json!({
                    "properties": {
                        "apiRevision": number.to_string(),
                        "sourceApiId": source_api_id,
                    }
                }),
            )
            .await?;

        let release_kind = root_key
            .kind
            .release_kind()
            .expect("revisioned kinds have a release kind");
        let release_name = format!("apimsync-set-current-{:08x}", rand::random::<u32>());
        let release_key = ResourceKey::new(
            release_kind,
            apimsync_core::ResourceName::new(release_name)?,
            root_key
                .parents
                .append(root_key.kind, root_key.name.clone()),
        );
        let release_uri = layout::element_uri(self.client.service_url(), &release_key);
        let api_id = format!("{source_api_id};rev={number}");
        self.client
            .put_json(release_uri.as_str(), &json!({"properties": {"apiId": api_id}}))
            .await?;
        // The release exists only to flip "current"; the revision stays.
        self.client.delete(release_uri.as_str(), true, true).await
    }
}

/// Workspace APIs preserve identity-bearing properties across revisions when
/// the incoming DTO omits them.
fn carry_forward(dto: &mut Value, existing: &Value) {
    for path in ["properties.type", "properties.path", "properties.protocols"] {
        if get_path(dto, path).is_none() {
            if let Some(value) = get_path(existing, path) {
                apimsync_core::json::set_path(dto, path, value.clone());
            }
        }
    }
}
