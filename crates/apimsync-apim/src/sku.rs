//! SKU support oracle
//!
//! Not every pricing tier offers every resource kind (workspaces and
//! gateways in particular). Root kinds are probed once with a collection
//! GET and the error fingerprint is classified; non-root kinds inherit
//! support from their dependencies. Answers are memoised for the process
//! lifetime and concurrent callers share a single probe per kind.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::OnceCell;

use apimsync_core::{graph, layout, ParentChain, ResourceKind};

use crate::client::ApimClient;
use crate::error::Result;

pub struct SkuOracle {
    client: ApimClient,
    cache: DashMap<ResourceKind, Arc<OnceCell<bool>>>,
}

impl SkuOracle {
    pub fn new(client: ApimClient) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Whether the service's SKU supports this kind.
    pub fn is_supported(&self, kind: ResourceKind) -> BoxFuture<'_, Result<bool>> {
        async move {
            let cell = self.cache.entry(kind).or_default().clone();
            let supported = cell
                .get_or_try_init(|| self.probe(kind))
                .await?;
            Ok(*supported)
        }
        .boxed()
    }

    async fn probe(&self, kind: ResourceKind) -> Result<bool> {
        if kind.predecessor().is_none() {
            return self.probe_collection(kind).await;
        }
        // Non-root kinds are supported iff every dependency is.
        for dependency in graph::dependencies_of(kind) {
            if !self.is_supported(*dependency).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn probe_collection(&self, kind: ResourceKind) -> Result<bool> {
        let uri = layout::collection_uri(self.client.service_url(), kind, &ParentChain::empty());
        match self.client.get_json(uri.as_str()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_sku_unsupported() => {
                tracing::debug!(kind = %kind, "kind not supported by the service SKU");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn oracle(server: &MockServer) -> SkuOracle {
        SkuOracle::new(ApimClient::new(format!("{}/svc", server.uri()), "token").unwrap())
    }

    #[tokio::test]
    async fn successful_probe_means_supported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&server)
            .await;
        let oracle = oracle(&server).await;
        assert!(oracle.is_supported(ResourceKind::Product).await.unwrap());
    }

    #[tokio::test]
    async fn pricing_tier_errors_classify_as_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/workspaces"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"code":"MethodNotAllowedInPricingTier"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;
        let oracle = oracle(&server).await;
        assert!(!oracle.is_supported(ResourceKind::Workspace).await.unwrap());
        // Memoised: the second lookup must not probe again (expect(1) above).
        assert!(!oracle.is_supported(ResourceKind::Workspace).await.unwrap());
        // Children of an unsupported kind are unsupported too.
        assert!(!oracle
            .is_supported(ResourceKind::WorkspaceNamedValue)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unclassified_errors_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/gateways"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let oracle = oracle(&server).await;
        assert!(oracle.is_supported(ResourceKind::Gateway).await.is_err());
    }

    #[tokio::test]
    async fn non_root_kinds_inherit_from_dependencies() {
        let server = MockServer::start().await;
        for collection in ["apis", "products", "namedValues"] {
            Mock::given(method("GET"))
                .and(path(format!("/svc/{collection}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
                .mount(&server)
                .await;
        }
        let oracle = oracle(&server).await;
        assert!(oracle.is_supported(ResourceKind::ProductApi).await.unwrap());
        assert!(oracle.is_supported(ResourceKind::ApiPolicy).await.unwrap());
    }
}
