//! API specification transfer
//!
//! The management endpoint exports most specification formats through a
//! short-lived download link; GraphQL schemas live on a `graphql` schema
//! child instead. Imports go through the API PUT endpoint, except GraphQL
//! which writes the schema child.

use serde_json::{json, Value};

use apimsync_core::json::get_path;
use apimsync_core::{layout, ApiSpecification, OpenApiFormat, OpenApiVersion, ResourceKey};

use crate::client::ApimClient;
use crate::error::{ApimError, Result};

const GRAPHQL_SCHEMA_CONTENT_TYPE: &str = "application/vnd.ms-azure-apim.graphql.schema";

fn export_format(specification: ApiSpecification) -> &'static str {
    match specification {
        ApiSpecification::Wadl => "wadl-link",
        ApiSpecification::Wsdl => "wsdl-link",
        // The service exports OpenAPI v2 as JSON only.
        ApiSpecification::OpenApi {
            version: OpenApiVersion::V2,
            ..
        } => "swagger-link",
        ApiSpecification::OpenApi {
            version: OpenApiVersion::V3,
            format: OpenApiFormat::Json,
        } => "openapi+json-link",
        ApiSpecification::OpenApi {
            version: OpenApiVersion::V3,
            format: OpenApiFormat::Yaml,
        } => "openapi-link",
        ApiSpecification::GraphQl => unreachable!("GraphQL schemas are not exported by link"),
    }
}

fn import_format(version: OpenApiVersion, format: OpenApiFormat) -> &'static str {
    match (version, format) {
        (OpenApiVersion::V2, OpenApiFormat::Json) => "swagger+json",
        (OpenApiVersion::V2, OpenApiFormat::Yaml) => "swagger+yaml",
        (OpenApiVersion::V3, OpenApiFormat::Json) => "openapi+json",
        (OpenApiVersion::V3, OpenApiFormat::Yaml) => "openapi+yaml",
    }
}

/// Pick the specification variant for an API based on its `type`.
pub fn specification_for_api_type(api_type: Option<&str>, default: ApiSpecification) -> Option<ApiSpecification> {
    match api_type.unwrap_or("http") {
        t if t.eq_ignore_ascii_case("soap") => Some(ApiSpecification::Wsdl),
        t if t.eq_ignore_ascii_case("graphql") => Some(ApiSpecification::GraphQl),
        t if t.eq_ignore_ascii_case("websocket") => None,
        _ => Some(default),
    }
}

fn graphql_schema_uri(client: &ApimClient, api_key: &ResourceKey) -> url::Url {
    layout::append_segments(
        &layout::element_uri(client.service_url(), api_key),
        &["schemas", "graphql"],
    )
}

/// Download an API's specification. `None` when the API type has no
/// exportable specification or the schema child is absent.
pub async fn get_specification(
    client: &ApimClient,
    api_key: &ResourceKey,
    api_dto: &Value,
    default: ApiSpecification,
) -> Result<Option<(ApiSpecification, String)>> {
    let api_type = get_path(api_dto, "properties.type").and_then(Value::as_str);
    let Some(specification) = specification_for_api_type(api_type, default) else {
        return Ok(None);
    };

    if specification == ApiSpecification::GraphQl {
        let uri = graphql_schema_uri(client, api_key);
        let Some(schema) = client.get_optional_json(uri.as_str()).await? else {
            return Ok(None);
        };
        let Some(Value::String(contents)) = get_path(&schema, "properties.document.value") else {
            return Ok(None);
        };
        return Ok(Some((specification, contents.clone())));
    }

    let api_uri = layout::element_uri(client.service_url(), api_key);
    let export = client
        .get_json_with(
            api_uri.as_str(),
            &[("format", export_format(specification)), ("export", "true")],
        )
        .await?;
    let Some(Value::String(link)) = get_path(&export, "value.link") else {
        return Err(ApimError::UnexpectedResponse {
            url: api_uri.to_string(),
            message: "specification export returned no download link".to_string(),
        });
    };

    // Export links are pre-signed; fetch them without credentials.
    let download = reqwest::Client::new().get(link.as_str()).send().await?;
    let status = download.status();
    if !status.is_success() {
        return Err(ApimError::Status {
            status: status.as_u16(),
            url: link.clone(),
            body: download.text().await.unwrap_or_default(),
        });
    }
    let mut contents = download.text().await?;

    // The v2 export is JSON; a YAML request means transcoding it ourselves.
    if let ApiSpecification::OpenApi {
        version: OpenApiVersion::V2,
        format: OpenApiFormat::Yaml,
    } = specification
    {
        let document: Value = serde_json::from_str(&contents)?;
        contents = serde_yaml::to_string(&document)?;
    }

    Ok(Some((specification, contents)))
}

/// Upload a specification document for an API.
pub async fn put_specification(
    client: &ApimClient,
    api_key: &ResourceKey,
    specification: ApiSpecification,
    contents: &str,
) -> Result<()> {
    let api_uri = layout::element_uri(client.service_url(), api_key);
    match specification {
        ApiSpecification::GraphQl => {
            let uri = graphql_schema_uri(client, api_key);
            client
                .put_json(
                    uri.as_str(),
                    &json!({
                        "properties": {
                            "contentType": GRAPHQL_SCHEMA_CONTENT_TYPE,
                            "document": {"value": contents},
                        }
                    }),
                )
                .await?;
        }
        ApiSpecification::Wadl => {
            client
                .put_json_with(
                    api_uri.as_str(),
                    &json!({"properties": {"format": "wadl-xml", "value": contents}}),
                    &[("import", "true")],
                )
                .await?;
        }
        ApiSpecification::Wsdl => {
            client
                .put_json_with(
                    api_uri.as_str(),
                    &json!({
                        "properties": {"format": "wsdl", "value": contents, "apiType": "soap"}
                    }),
                    &[("import", "true")],
                )
                .await?;
        }
        ApiSpecification::OpenApi { format, version } => {
            client
                .put_json(
                    api_uri.as_str(),
                    &json!({
                        "properties": {"format": import_format(version, format), "value": contents}
                    }),
                )
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimsync_core::{ResourceKind, ResourceName};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_key() -> ResourceKey {
        ResourceKey::root(ResourceKind::Api, ResourceName::new("petstore").unwrap())
    }

    #[test]
    fn api_type_picks_the_variant() {
        let default = ApiSpecification::default();
        assert_eq!(
            specification_for_api_type(Some("soap"), default),
            Some(ApiSpecification::Wsdl)
        );
        assert_eq!(
            specification_for_api_type(Some("graphql"), default),
            Some(ApiSpecification::GraphQl)
        );
        assert_eq!(specification_for_api_type(Some("websocket"), default), None);
        assert_eq!(specification_for_api_type(None, default), Some(default));
        assert_eq!(specification_for_api_type(Some("http"), default), Some(default));
    }

    #[tokio::test]
    async fn export_downloads_through_the_link() {
        let server = MockServer::start().await;
        let link = format!("{}/downloads/spec", server.uri());
        Mock::given(method("GET"))
            .and(path("/svc/apis/petstore"))
            .and(query_param("format", "openapi-link"))
            .and(query_param("export", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": {"link": link}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/downloads/spec"))
            .respond_with(ResponseTemplate::new(200).set_body_string("openapi: 3.0.1\n"))
            .mount(&server)
            .await;

        let client = ApimClient::new(format!("{}/svc", server.uri()), "token").unwrap();
        let dto = json!({"properties": {"type": "http"}});
        let (spec, contents) =
            get_specification(&client, &api_key(), &dto, ApiSpecification::default())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(spec, ApiSpecification::default());
        assert_eq!(contents, "openapi: 3.0.1\n");
    }

    #[tokio::test]
    async fn v2_yaml_requests_transcode_the_json_export() {
        let server = MockServer::start().await;
        let link = format!("{}/downloads/spec", server.uri());
        Mock::given(method("GET"))
            .and(path("/svc/apis/petstore"))
            .and(query_param("format", "swagger-link"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": {"link": link}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/downloads/spec"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"swagger":"2.0","info":{"title":"p"}}"#),
            )
            .mount(&server)
            .await;

        let client = ApimClient::new(format!("{}/svc", server.uri()), "token").unwrap();
        let requested = ApiSpecification::OpenApi {
            format: OpenApiFormat::Yaml,
            version: OpenApiVersion::V2,
        };
        let dto = json!({"properties": {}});
        let (_, contents) = get_specification(&client, &api_key(), &dto, requested)
            .await
            .unwrap()
            .unwrap();
        assert!(contents.contains("swagger: '2.0'") || contents.contains("swagger: \"2.0\""));
    }

    #[tokio::test]
    async fn graphql_schemas_come_from_the_schema_child() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/apis/petstore/schemas/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"document": {"value": "type Query { pets: [String] }"}}
            })))
            .mount(&server)
            .await;

        let client = ApimClient::new(format!("{}/svc", server.uri()), "token").unwrap();
        let dto = json!({"properties": {"type": "graphql"}});
        let (spec, contents) =
            get_specification(&client, &api_key(), &dto, ApiSpecification::default())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(spec, ApiSpecification::GraphQl);
        assert!(contents.contains("type Query"));
    }

    #[tokio::test]
    async fn wsdl_import_marks_the_api_as_soap() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/svc/apis/petstore"))
            .and(query_param("import", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let client = ApimClient::new(format!("{}/svc", server.uri()), "token").unwrap();
        put_specification(&client, &api_key(), ApiSpecification::Wsdl, "<wsdl/>")
            .await
            .unwrap();
    }
}
