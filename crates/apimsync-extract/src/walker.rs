//! Extractor traversal
//!
//! A parallel top-down walk over the traversal forest: every root kind in
//! parallel, every instance in parallel, successors recursed inside the
//! parent's future. Kinds the SKU does not support are skipped with a
//! warning, configuration-excluded and reserved resources are filtered, and
//! artefacts are written before any successor is processed.

use std::path::PathBuf;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tracing::Instrument;

use apimsync_apim::{specs, ApimClient, SkuOracle};
use apimsync_core::dto::{self, last_segment};
use apimsync_core::json::get_path;
use apimsync_core::{
    graph, layout, revision, ApiSpecification, Configuration, ParentChain, ResourceKey,
    ResourceKind, ResourceName,
};

use crate::error::{ExtractError, Result};
use crate::writer;

pub struct Extractor {
    client: ApimClient,
    sku: SkuOracle,
    configuration: Configuration,
    service_dir: PathBuf,
    default_format: ApiSpecification,
}

impl Extractor {
    pub fn new(
        client: ApimClient,
        configuration: Configuration,
        service_dir: impl Into<PathBuf>,
        default_format: ApiSpecification,
    ) -> Self {
        let sku = SkuOracle::new(client.clone());
        Self {
            client,
            sku,
            configuration,
            service_dir: service_dir.into(),
            default_format,
        }
    }

    pub async fn run(&self) -> Result<()> {
        tracing::info!(directory = %self.service_dir.display(), "extracting service");
        try_join_all(
            graph::roots()
                .iter()
                .map(|kind| self.process_kind(*kind, ParentChain::empty())),
        )
        .await?;
        tracing::info!("extraction finished");
        Ok(())
    }

    fn process_kind(&self, kind: ResourceKind, parents: ParentChain) -> BoxFuture<'_, Result<()>> {
        async move {
            if !self.sku.is_supported(kind).await? {
                tracing::warn!(kind = %kind, "skipping kind unsupported by the service SKU");
                return Ok(());
            }
            let listing = self.list(kind, &parents).await?;
            try_join_all(listing.into_iter().map(|(name, dto)| {
                let parents = parents.clone();
                async move {
                    let key = ResourceKey::new(kind, name, parents);
                    let span = tracing::info_span!("extract", resource = %key);
                    self.process_instance(key, dto).instrument(span).await
                }
            }))
            .await?;
            Ok(())
        }
        .boxed()
    }

    async fn process_instance(&self, key: ResourceKey, dto: Option<Value>) -> Result<()> {
        if !self.should_extract(&key).await? {
            return Ok(());
        }
        self.write_artifacts(&key, dto.as_ref()).await?;

        let parents = key.parents.append(key.kind, key.name.clone());
        let release_kind = key.kind.release_kind();
        let is_revisioned = !revision::is_root_name(key.name.as_str());
        try_join_all(
            graph::successors_of(key.kind)
                .iter()
                .filter(|successor| {
                    // Releases live only under the current API.
                    !(is_revisioned && Some(**successor) == release_kind)
                })
                .map(|successor| self.process_kind(*successor, parents.clone())),
        )
        .await?;
        Ok(())
    }

    /// Names (and DTOs, for kinds that have one) at this collection.
    async fn list(
        &self,
        kind: ResourceKind,
        parents: &ParentChain,
    ) -> Result<Vec<(ResourceName, Option<Value>)>> {
        let collection_uri = layout::collection_uri(self.client.service_url(), kind, parents);
        let items = self.client.list_collection(collection_uri.as_str()).await?;
        let mut listing = Vec::with_capacity(items.len());
        for item in items {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::UnnamedEntry {
                    uri: collection_uri.to_string(),
                })?;
            let name = ResourceName::new(name)?;
            if !kind.has_dto() {
                listing.push((name, None));
                continue;
            }
            let dto = if kind.is_policy() {
                // List entries omit the raw XML; re-read each policy.
                let element_uri = layout::append_segments(&collection_uri, &[name.as_str()]);
                match self
                    .client
                    .get_optional_json_with(element_uri.as_str(), &[("format", "rawxml")])
                    .await?
                {
                    Some(full) => dto::normalize(kind, &full)?,
                    None => continue,
                }
            } else {
                dto::normalize(kind, &item)?
            };
            listing.push((name, Some(dto)));
        }
        Ok(listing)
    }

    async fn should_extract(&self, key: &ResourceKey) -> Result<bool> {
        if key.kind.is_reserved_name(key.name.as_str()) {
            tracing::debug!(resource = %key, "skipping service-owned resource");
            return Ok(false);
        }
        match self.configuration.resource_is_included(key).await? {
            Some(false) => {
                tracing::warn!(resource = %key, "skipping resource excluded by configuration");
                Ok(false)
            }
            Some(true) | None => Ok(true),
        }
    }

    async fn write_artifacts(&self, key: &ResourceKey, dto: Option<&Value>) -> Result<()> {
        let Some(dto) = dto else {
            return Ok(());
        };

        if key.kind.has_information_file() {
            let mut shaped = dto.clone();
            dto::apply_write_formatters(key.kind, &mut shaped, &key.name);
            let secondary = match key.kind.link_property() {
                Some(property) => {
                    let id = get_path(&shaped, &format!("properties.{property}"))
                        .and_then(Value::as_str)
                        .unwrap_or(key.name.as_str());
                    Some(ResourceName::new(last_segment(id)?)?)
                }
                None => None,
            };
            writer::write_information_file(&self.service_dir, key, &shaped, secondary.as_ref())
                .await?;
        }

        if key.kind.is_policy() {
            let xml = dto::policy_body(dto)?;
            writer::write_policy_file(&self.service_dir, key, &xml).await?;
        }

        if key.kind.supports_revisions() {
            if let Some((specification, contents)) =
                specs::get_specification(&self.client, key, dto, self.default_format).await?
            {
                writer::write_specification_file(&self.service_dir, key, specification, &contents)
                    .await?;
            }
        }
        Ok(())
    }
}
