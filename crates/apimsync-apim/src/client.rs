//! Low-level APIM management client
//!
//! A thin wrapper around `reqwest` that speaks the management conventions:
//! `api-version` on every request, `value[]`/`nextLink` pagination,
//! 404-tolerant optional GETs, and `location`-polled long-running deletes.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::{ApimError, Result};

pub const DEFAULT_API_VERSION: &str = "2022-08-01";

const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(2);
const COMPLETION_POLL_ATTEMPTS: u32 = 60;

/// Authenticated client bound to one service instance. Deliberately not
/// `Debug`; it holds the bearer token.
#[derive(Clone)]
pub struct ApimClient {
    http: reqwest::Client,
    service_url: Url,
    api_version: String,
    bearer_token: String,
}

impl ApimClient {
    pub fn new(service_url: impl reqwest::IntoUrl, bearer_token: impl Into<String>) -> Result<Self> {
        let mut service_url = service_url.into_url()?;
        if service_url.cannot_be_a_base() {
            return Err(ApimError::InvalidServiceUrl {
                url: service_url.to_string(),
            });
        }
        if let Ok(mut segments) = service_url.path_segments_mut() {
            segments.pop_if_empty();
        }
        Ok(Self {
            http: reqwest::Client::new(),
            service_url,
            api_version: DEFAULT_API_VERSION.to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Management URL of the service itself.
    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    fn request(&self, method: reqwest::Method, uri: &str, query: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, uri)
            .bearer_auth(&self.bearer_token);
        // Continuation links already carry their full query string.
        if !uri.contains("api-version=") {
            builder = builder.query(&[("api-version", self.api_version.as_str())]);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(ApimError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }

    /// GET returning the parsed JSON body. Non-success is an error.
    pub async fn get_json(&self, uri: &str) -> Result<Value> {
        self.get_json_with(uri, &[]).await
    }

    pub async fn get_json_with(&self, uri: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self.send(self.request(reqwest::Method::GET, uri, query)).await?;
        Ok(response.json().await?)
    }

    /// GET with optional semantics: 404 answers `None`.
    pub async fn get_optional_json(&self, uri: &str) -> Result<Option<Value>> {
        self.get_optional_json_with(uri, &[]).await
    }

    pub async fn get_optional_json_with(
        &self,
        uri: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        match self.get_json_with(uri, query).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Existence probe; 404 answers `false`.
    pub async fn exists(&self, uri: &str) -> Result<bool> {
        match self.send(self.request(reqwest::Method::HEAD, uri, &[])).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List a collection, following `nextLink` continuations.
    pub async fn list_collection(&self, uri: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(uri.to_string());
        while let Some(page_uri) = next {
            let page = self.get_json(&page_uri).await?;
            let values = page
                .get("value")
                .and_then(Value::as_array)
                .ok_or_else(|| ApimError::UnexpectedResponse {
                    url: page_uri.clone(),
                    message: "collection response has no 'value' array".to_string(),
                })?;
            items.extend(values.iter().cloned());
            next = page
                .get("nextLink")
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
        }
        Ok(items)
    }

    /// PUT a JSON body, returning the response body when there is one.
    pub async fn put_json(&self, uri: &str, body: &Value) -> Result<Option<Value>> {
        self.put_json_with(uri, body, &[]).await
    }

    pub async fn put_json_with(
        &self,
        uri: &str,
        body: &Value,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>> {
        let response = self
            .send(self.request(reqwest::Method::PUT, uri, query).json(body))
            .await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(response.json().await.ok())
    }

    /// DELETE, optionally tolerating 404 and waiting for the long-running
    /// operation advertised through the `location` header to settle.
    pub async fn delete(&self, uri: &str, ignore_not_found: bool, wait_for_completion: bool) -> Result<()> {
        let response = match self.send(self.request(reqwest::Method::DELETE, uri, &[])).await {
            Ok(response) => response,
            Err(e) if ignore_not_found && e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if !wait_for_completion {
            return Ok(());
        }
        let Some(location) = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
        else {
            return Ok(());
        };
        self.wait_for_operation(&location).await
    }

    async fn wait_for_operation(&self, location: &str) -> Result<()> {
        for _ in 0..COMPLETION_POLL_ATTEMPTS {
            let response = self
                .send(self.request(reqwest::Method::GET, location, &[]))
                .await;
            match response {
                Ok(response) if response.status() == reqwest::StatusCode::ACCEPTED => {
                    tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
                }
                Ok(_) => return Ok(()),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Err(ApimError::OperationPending {
            url: location.to_string(),
            attempts: COMPLETION_POLL_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ApimClient {
        ApimClient::new(format!("{}/service", server.uri()), "token").unwrap()
    }

    #[tokio::test]
    async fn optional_get_absorbs_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/products/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = client(&server).await;
        let uri = format!("{}/products/missing", client.service_url());
        assert!(client.get_optional_json(&uri).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn requests_carry_the_api_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/products"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server).await;
        let uri = format!("{}/products", client.service_url());
        assert!(client.list_collection(&uri).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_follows_next_links() {
        let server = MockServer::start().await;
        let next = format!(
            "{}/service/apis?api-version={}&$skip=1",
            server.uri(),
            DEFAULT_API_VERSION
        );
        Mock::given(method("GET"))
            .and(path("/service/apis"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": [{"name": "a"}], "nextLink": next})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/service/apis"))
            .and(query_param("$skip", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "b"}]})))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server).await;
        let uri = format!("{}/apis", client.service_url());
        let items = client.list_collection(&uri).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn delete_tolerates_404_when_asked() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/service/backends/b1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = client(&server).await;
        let uri = format!("{}/backends/b1", client.service_url());
        assert!(client.delete(&uri, true, true).await.is_ok());
        assert!(client.delete(&uri, false, true).await.is_err());
    }

    #[tokio::test]
    async fn delete_polls_the_location_header() {
        let server = MockServer::start().await;
        let location = format!("{}/operations/op1", server.uri());
        Mock::given(method("DELETE"))
            .and(path("/service/apis/a1"))
            .respond_with(ResponseTemplate::new(202).insert_header("location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server).await;
        let uri = format!("{}/apis/a1", client.service_url());
        client.delete(&uri, false, true).await.unwrap();
    }
}
