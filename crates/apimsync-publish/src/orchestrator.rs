//! Publisher orchestration
//!
//! Computes the set of resources to process (the whole tree, or just what a
//! commit touched), decides put/delete per key, and drives both directions
//! through per-key memoised futures: puts run after their predecessors,
//! deletes run after their dependents. Keys outside the processing set are
//! traversed as ordering no-ops.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::Instrument;
use url::Url;

use apimsync_apim::{specs, ApiWriter};
use apimsync_core::json::{deep_merge, get_path};
use apimsync_core::{dto, layout, ApiSpecification, Configuration, ResourceKey, ResourceKind};

use crate::error::{PublishError, Result};
use crate::fileops::{ChangeStatus, FileOps};
use crate::parser::parse_service_file;
use crate::relationships::{self, Relationships, ResourceSet};

/// Snapshot pair the publisher works from.
pub struct PublishSources {
    /// The tree being published (live directory or HEAD commit).
    pub current: Arc<dyn FileOps>,
    /// The tree before the commit; empty on a full publish.
    pub previous: Arc<dyn FileOps>,
    /// Files the commit touched; `None` publishes the whole tree.
    pub changed: Option<Vec<(ChangeStatus, std::path::PathBuf)>>,
}

pub struct Publisher {
    api_writer: ApiWriter,
    configuration: Configuration,
}

impl Publisher {
    pub fn new(api_writer: ApiWriter, configuration: Configuration) -> Self {
        Self {
            api_writer,
            configuration,
        }
    }

    pub async fn run(&self, sources: PublishSources) -> Result<()> {
        let (current_set, current_relationships) =
            relationships::build(sources.current.as_ref()).await?;
        let (_previous_set, previous_relationships) =
            relationships::build(sources.previous.as_ref()).await?;

        let targets = match &sources.changed {
            None => current_set.keys().cloned().collect::<HashSet<_>>(),
            Some(changed) => {
                let mut targets = HashSet::new();
                for (status, path) in changed {
                    let ops: &dyn FileOps = match status {
                        ChangeStatus::Deleted => sources.previous.as_ref(),
                        ChangeStatus::Written => sources.current.as_ref(),
                    };
                    if let Some(parsed) = parse_service_file(ops, path).await? {
                        targets.insert(parsed.key);
                    }
                }
                targets
            }
        };

        tracing::info!(resources = targets.len(), "publishing");
        let driver = Driver {
            api_writer: &self.api_writer,
            configuration: &self.configuration,
            current: sources.current.as_ref(),
            current_set,
            current_relationships,
            previous_relationships,
            targets,
            cells: DashMap::new(),
        };
        try_join_all(driver.targets.iter().map(|key| driver.process(key.clone()))).await?;
        tracing::info!("publish finished");
        Ok(())
    }
}

struct Driver<'a> {
    api_writer: &'a ApiWriter,
    configuration: &'a Configuration,
    current: &'a dyn FileOps,
    current_set: ResourceSet,
    current_relationships: Relationships,
    previous_relationships: Relationships,
    targets: HashSet<ResourceKey>,
    cells: DashMap<ResourceKey, Arc<OnceCell<()>>>,
}

impl<'a> Driver<'a> {
    /// Process a key at most once, after everything that must precede it.
    fn process<'s>(&'s self, key: ResourceKey) -> BoxFuture<'s, Result<()>> {
        async move {
            let cell = self.cells.entry(key.clone()).or_default().clone();
            cell.get_or_try_init(|| async {
                if self.current_set.contains(&key) {
                    let predecessors: Vec<_> = self
                        .current_relationships
                        .predecessors_of(&key)
                        .cloned()
                        .collect();
                    try_join_all(predecessors.into_iter().map(|p| self.process(p))).await?;
                    if self.targets.contains(&key) {
                        let span = tracing::info_span!("put", resource = %key);
                        self.put_resource(&key).instrument(span).await?;
                    }
                } else {
                    let dependents: Vec<_> = self
                        .previous_relationships
                        .successors_of(&key)
                        .cloned()
                        .collect();
                    try_join_all(dependents.into_iter().map(|s| self.process(s))).await?;
                    if self.targets.contains(&key) {
                        let span = tracing::info_span!("delete", resource = %key);
                        self.delete_resource(&key).instrument(span).await?;
                    }
                }
                Ok(())
            })
            .await
            .map(|_| ())
        }
        .boxed()
    }

    async fn read_current(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        self.current.read_file(path).await
    }

    /// Assemble the DTO to PUT: information file and/or policy XML, run
    /// through the kind's schema, with the configuration override merged on
    /// top.
    async fn assemble_dto(&self, key: &ResourceKey) -> Result<Value> {
        let raw = if key.kind.is_policy() {
            let xml_path = layout::policy_file(Path::new(""), key)
                .ok_or_else(|| PublishError::MissingSource {
                    key: key.to_string(),
                })?;
            let xml = self.read_current(&xml_path).await?.ok_or_else(|| {
                PublishError::MissingSource {
                    key: key.to_string(),
                }
            })?;
            let xml = String::from_utf8_lossy(&xml).into_owned();
            let information = self.current_set.get(key).and_then(|parsed| parsed.dto.clone());
            dto::policy_envelope(&xml, information.as_ref())
        } else {
            self.current_set
                .get(key)
                .and_then(|parsed| parsed.dto.clone())
                .ok_or_else(|| PublishError::MissingSource {
                    key: key.to_string(),
                })?
        };

        let mut normalized = match dto::normalize(key.kind, &raw) {
            Ok(normalized) => normalized,
            // API-shaped kinds must not be blocked from PUT by a schema
            // mismatch; fall back to the raw DTO.
            Err(e)
                if matches!(
                    key.kind,
                    ResourceKind::Api
                        | ResourceKind::WorkspaceApi
                        | ResourceKind::ApiRelease
                        | ResourceKind::WorkspaceApiRelease
                ) =>
            {
                tracing::warn!(resource = %key, error = %e, "using raw DTO after schema mismatch");
                raw
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(override_body) = self.configuration.override_for(key).await? {
            deep_merge(&mut normalized, &override_body);
        }
        Ok(normalized)
    }

    fn element_uri(&self, key: &ResourceKey) -> Url {
        layout::element_uri(self.api_writer.client().service_url(), key)
    }

    async fn put_resource(&self, key: &ResourceKey) -> Result<()> {
        if key.kind.is_reserved_name(key.name.as_str()) {
            tracing::warn!(resource = %key, "skipping reserved resource");
            return Ok(());
        }
        let dto = self.assemble_dto(key).await?;

        if secret_without_value(key.kind, &dto) {
            tracing::warn!(
                resource = %key,
                "skipping secret named value with no value or key vault reference"
            );
            return Ok(());
        }

        match key.kind {
            ResourceKind::Api | ResourceKind::WorkspaceApi => {
                self.api_writer.put_api(key, &dto).await?;
                self.put_specification_if_present(key).await?;
            }
            ResourceKind::Product | ResourceKind::WorkspaceProduct => {
                let uri = self.element_uri(key);
                let existed = self
                    .api_writer
                    .client()
                    .get_optional_json(uri.as_str())
                    .await?
                    .is_some();
                self.api_writer.client().put_json(uri.as_str(), &dto).await?;
                if !existed {
                    self.delete_auto_created_companions(key).await?;
                }
            }
            ResourceKind::ApiRelease | ResourceKind::WorkspaceApiRelease => {
                let mut dto = dto;
                let api_id = key
                    .parent_key()
                    .expect("releases live under an API")
                    .canonical();
                apimsync_core::json::set_path(&mut dto, "properties.apiId", Value::String(api_id));
                self.api_writer
                    .client()
                    .put_json(self.element_uri(key).as_str(), &dto)
                    .await?;
            }
            _ => {
                self.api_writer
                    .client()
                    .put_json(self.element_uri(key).as_str(), &dto)
                    .await?;
            }
        }
        Ok(())
    }

    /// Upload the API's specification file when the tree carries one.
    async fn put_specification_if_present(&self, key: &ResourceKey) -> Result<()> {
        for specification in [
            ApiSpecification::GraphQl,
            ApiSpecification::Wadl,
            ApiSpecification::Wsdl,
            ApiSpecification::OpenApi {
                format: apimsync_core::OpenApiFormat::Json,
                version: apimsync_core::OpenApiVersion::V3,
            },
            ApiSpecification::OpenApi {
                format: apimsync_core::OpenApiFormat::Yaml,
                version: apimsync_core::OpenApiVersion::V3,
            },
        ] {
            let Some(path) = layout::specification_file(Path::new(""), key, specification) else {
                continue;
            };
            if let Some(contents) = self.read_current(&path).await? {
                let contents = String::from_utf8_lossy(&contents).into_owned();
                specs::put_specification(self.api_writer.client(), key, specification, &contents)
                    .await?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Creating a product also creates subscriptions and group links on the
    /// service side; a fresh product PUT removes them so the tree stays the
    /// source of truth.
    async fn delete_auto_created_companions(&self, key: &ResourceKey) -> Result<()> {
        let client = self.api_writer.client();
        let scope_suffix = format!("/products/{}", key.name).to_ascii_lowercase();

        let subscriptions_uri = layout::collection_uri(
            client.service_url(),
            ResourceKind::Subscription,
            &key.parents,
        );
        for subscription in client.list_collection(subscriptions_uri.as_str()).await? {
            let Some(name) = subscription.get("name").and_then(Value::as_str) else {
                continue;
            };
            if ResourceKind::Subscription.is_reserved_name(name) {
                continue;
            }
            let scoped = get_path(&subscription, "properties.scope")
                .and_then(Value::as_str)
                .is_some_and(|scope| scope.to_ascii_lowercase().ends_with(&scope_suffix));
            if scoped {
                tracing::info!(resource = %key, subscription = name, "removing auto-created subscription");
                let subscription_uri = layout::append_segments(&subscriptions_uri, &[name]);
                client.delete(subscription_uri.as_str(), true, true).await?;
            }
        }

        let group_link_kind = match key.kind {
            ResourceKind::WorkspaceProduct => ResourceKind::WorkspaceProductGroup,
            _ => ResourceKind::ProductGroup,
        };
        let groups_uri = layout::collection_uri(
            client.service_url(),
            group_link_kind,
            &key.parents.append(key.kind, key.name.clone()),
        );
        for group in client.list_collection(groups_uri.as_str()).await? {
            if let Some(name) = group.get("name").and_then(Value::as_str) {
                tracing::info!(resource = %key, group = name, "removing auto-created group link");
                let group_uri = layout::append_segments(&groups_uri, &[name]);
                client.delete(group_uri.as_str(), true, true).await?;
            }
        }
        Ok(())
    }

    async fn delete_resource(&self, key: &ResourceKey) -> Result<()> {
        if key.kind.is_reserved_name(key.name.as_str()) {
            tracing::warn!(resource = %key, "skipping reserved resource");
            return Ok(());
        }
        if key.kind.supports_revisions() && self.api_writer.revision_is_current(key).await? {
            // The folder went away because this revision became current; the
            // root name now owns it.
            tracing::info!(resource = %key, "skipping delete of the current revision");
            return Ok(());
        }
        self.api_writer
            .client()
            .delete(self.element_uri(key).as_str(), true, true)
            .await
            .map_err(Into::into)
    }
}

/// Secret named values without a value or key vault reference cannot be
/// round-tripped; publishing them would wipe the secret.
fn secret_without_value(kind: ResourceKind, dto: &Value) -> bool {
    if !matches!(
        kind,
        ResourceKind::NamedValue | ResourceKind::WorkspaceNamedValue
    ) {
        return false;
    }
    let secret = matches!(get_path(dto, "properties.secret"), Some(Value::Bool(true)));
    let has_value = matches!(get_path(dto, "properties.value"), Some(Value::String(_)));
    let has_key_vault = matches!(
        get_path(dto, "properties.keyVault.secretIdentifier"),
        Some(Value::String(_))
    );
    secret && !has_value && !has_key_vault
}
