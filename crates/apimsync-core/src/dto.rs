//! DTO normalization
//!
//! Wire JSON is round-tripped through typed serde models keyed by the kind's
//! [`DtoFamily`]: unknown fields are dropped, missing required fields fail.
//! The on-write formatters reshape normalized DTOs before they are persisted
//! as information files, and the policy helpers split and reassemble the
//! `{format, value}` envelope around the side-stored XML body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::json::{deep_merge, get_path, remove_path, set_path};
use crate::kind::{DtoFamily, ResourceKind};
use crate::name::ResourceName;

const SERVICE_MARKER: &str = "Microsoft.ApiManagement/service/";

// ---------------------------------------------------------------------------
// Typed DTO families
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedValueDto {
    pub properties: NamedValueProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedValueProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault: Option<KeyVaultContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultContract {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDto {
    pub properties: TagProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagProperties {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSetDto {
    pub properties: VersionSetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSetProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning_scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_query_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDto {
    pub properties: BackendProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerDto {
    pub properties: LoggerProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerProperties {
    pub logger_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_buffered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticDto {
    pub properties: DiagnosticProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticProperties {
    pub logger_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_correlation_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDto {
    pub properties: GatewayProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_data: Option<Value>,
}

/// The `{format, value}` policy envelope. Both sides are optional on disk:
/// fragments side-store the XML and drop both properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDto {
    pub properties: PolicyProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDto {
    pub properties: ProductProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDto {
    pub properties: GroupProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDto {
    pub properties: SubscriptionProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_tracing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDto {
    pub properties: ApiProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_settings: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_key_parameter_names: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_api_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReleaseDto {
    pub properties: ApiReleaseProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReleaseProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Fixed shape for link kinds: the secondary's id lives in `properties`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: LinkProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDto {
    pub properties: WorkspaceProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn round_trip<T>(kind: ResourceKind, dto: &Value) -> Result<Value>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(dto.clone()).map_err(|e| CoreError::Schema {
        kind: kind.to_string(),
        message: e.to_string(),
    })?;
    serde_json::to_value(&typed).map_err(|e| CoreError::Schema {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

/// Round-trip `dto` through the kind's typed schema.
///
/// Unknown fields are dropped; missing required fields fail. Idempotent:
/// normalizing a normalized DTO is a no-op.
pub fn normalize(kind: ResourceKind, dto: &Value) -> Result<Value> {
    if !dto.is_object() {
        return Err(CoreError::NotJsonObject {
            found: json_type_name(dto).to_string(),
        });
    }
    let family = kind.dto_family().ok_or_else(|| CoreError::Schema {
        kind: kind.to_string(),
        message: "kind has no DTO schema".to_string(),
    })?;
    match family {
        DtoFamily::NamedValue => round_trip::<NamedValueDto>(kind, dto),
        DtoFamily::Tag => round_trip::<TagDto>(kind, dto),
        DtoFamily::VersionSet => round_trip::<VersionSetDto>(kind, dto),
        DtoFamily::Backend => round_trip::<BackendDto>(kind, dto),
        DtoFamily::Logger => round_trip::<LoggerDto>(kind, dto),
        DtoFamily::Diagnostic => round_trip::<DiagnosticDto>(kind, dto),
        DtoFamily::Gateway => round_trip::<GatewayDto>(kind, dto),
        DtoFamily::Policy => round_trip::<PolicyDto>(kind, dto),
        DtoFamily::Product => round_trip::<ProductDto>(kind, dto),
        DtoFamily::Group => round_trip::<GroupDto>(kind, dto),
        DtoFamily::Subscription => round_trip::<SubscriptionDto>(kind, dto),
        DtoFamily::Api => round_trip::<ApiDto>(kind, dto),
        DtoFamily::ApiRelease => round_trip::<ApiReleaseDto>(kind, dto),
        DtoFamily::Link => round_trip::<LinkDto>(kind, dto),
        DtoFamily::Workspace => round_trip::<WorkspaceDto>(kind, dto),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Resource id handling
// ---------------------------------------------------------------------------

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Rewrite an ARM-absolute resource id to its service-relative form.
///
/// Strips everything up to and including the `Microsoft.ApiManagement/service/`
/// marker and the service-name segment that follows it. Ids without the
/// marker pass through unchanged.
pub fn to_relative_id(id: &str) -> String {
    if id.is_empty() {
        return String::new();
    }
    let Some(marker_start) = find_case_insensitive(id, SERVICE_MARKER) else {
        return id.to_string();
    };
    let after_marker = &id[marker_start + SERVICE_MARKER.len()..];
    match after_marker.find('/') {
        Some(slash) => format!("/{}", &after_marker[slash + 1..]),
        // Only the service name remains; the id addresses the service itself.
        None => "/".to_string(),
    }
}

/// Last `/`-segment of a resource id; how link secondaries are named.
pub fn last_segment(id: &str) -> Result<&str> {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| CoreError::MalformedReferenceId {
            id: id.to_string(),
            message: "id has no name segment".to_string(),
        })
}

// ---------------------------------------------------------------------------
// On-write formatters
// ---------------------------------------------------------------------------

fn rewrite_id_at(dto: &mut Value, path: &str) {
    let relative = match get_path(dto, path) {
        Some(Value::String(id)) => to_relative_id(id),
        _ => return,
    };
    set_path(dto, path, Value::String(relative));
}

/// Reshape a normalized DTO before it is written as an information file.
pub fn apply_write_formatters(kind: ResourceKind, dto: &mut Value, name: &ResourceName) {
    if let Some(property) = kind.link_property() {
        let path = format!("properties.{property}");
        rewrite_id_at(dto, &path);
        set_path(dto, "name", Value::String(name.as_str().to_string()));
    }

    for (_, property_path) in kind.reference_properties() {
        rewrite_id_at(dto, property_path);
    }

    // Fragment bodies are side-stored; the envelope never reaches disk.
    if matches!(
        kind,
        ResourceKind::PolicyFragment | ResourceKind::WorkspacePolicyFragment
    ) {
        remove_path(dto, "properties.format");
        remove_path(dto, "properties.value");
    }

    if kind.supports_revisions() {
        let keeps_service_url = matches!(
            get_path(dto, "properties.type"),
            Some(Value::String(api_type))
                if api_type.eq_ignore_ascii_case("websocket")
                    || api_type.eq_ignore_ascii_case("graphql")
        );
        if !keeps_service_url {
            remove_path(dto, "properties.serviceUrl");
        }
    }
}

// ---------------------------------------------------------------------------
// Policy envelope
// ---------------------------------------------------------------------------

/// The raw XML body carried in `properties.value`.
pub fn policy_body(dto: &Value) -> Result<String> {
    match get_path(dto, "properties.value") {
        Some(Value::String(xml)) => Ok(xml.clone()),
        _ => Err(CoreError::MissingProperty {
            path: "properties.value".to_string(),
        }),
    }
}

/// Reconstitute the wire envelope from a side-stored XML body, merging in an
/// optional information file DTO (the information file wins on overlap).
pub fn policy_envelope(xml: &str, information: Option<&Value>) -> Value {
    let mut envelope = serde_json::json!({
        "properties": {
            "format": "rawxml",
            "value": xml,
        }
    });
    if let Some(information) = information {
        deep_merge(&mut envelope, information);
    }
    envelope
}
