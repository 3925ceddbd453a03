//! API specification formats

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiVersion {
    V2,
    V3,
}

/// The specification document attached to an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSpecification {
    GraphQl,
    Wadl,
    Wsdl,
    OpenApi {
        format: OpenApiFormat,
        version: OpenApiVersion,
    },
}

impl Default for ApiSpecification {
    fn default() -> Self {
        ApiSpecification::OpenApi {
            format: OpenApiFormat::Yaml,
            version: OpenApiVersion::V3,
        }
    }
}

impl ApiSpecification {
    /// On-disk file extension; exactly one per variant.
    pub fn file_extension(self) -> &'static str {
        match self {
            ApiSpecification::GraphQl => "graphql",
            ApiSpecification::Wadl => "wadl",
            ApiSpecification::Wsdl => "wsdl",
            ApiSpecification::OpenApi {
                format: OpenApiFormat::Json,
                ..
            } => "json",
            ApiSpecification::OpenApi {
                format: OpenApiFormat::Yaml,
                ..
            } => "yaml",
        }
    }

    /// Specification file name inside an API's instance directory.
    pub fn file_name(self) -> String {
        format!("specification.{}", self.file_extension())
    }

    /// Recognise a specification file name.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        match file_name {
            "specification.graphql" => Some(ApiSpecification::GraphQl),
            "specification.wadl" => Some(ApiSpecification::Wadl),
            "specification.wsdl" => Some(ApiSpecification::Wsdl),
            "specification.json" => Some(ApiSpecification::OpenApi {
                format: OpenApiFormat::Json,
                version: OpenApiVersion::V3,
            }),
            "specification.yaml" => Some(ApiSpecification::OpenApi {
                format: OpenApiFormat::Yaml,
                version: OpenApiVersion::V3,
            }),
            _ => None,
        }
    }

    /// Parse the `API_SPECIFICATION_FORMAT` setting. Only extractor default
    /// formats are accepted; SOAP and GraphQL are chosen by API type.
    pub fn from_default_format(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "wadl" => Ok(ApiSpecification::Wadl),
            "json" | "openapiv3json" => Ok(ApiSpecification::OpenApi {
                format: OpenApiFormat::Json,
                version: OpenApiVersion::V3,
            }),
            "yaml" | "openapiv3yaml" => Ok(ApiSpecification::OpenApi {
                format: OpenApiFormat::Yaml,
                version: OpenApiVersion::V3,
            }),
            "openapiv2json" => Ok(ApiSpecification::OpenApi {
                format: OpenApiFormat::Json,
                version: OpenApiVersion::V2,
            }),
            "openapiv2yaml" => Ok(ApiSpecification::OpenApi {
                format: OpenApiFormat::Yaml,
                version: OpenApiVersion::V2,
            }),
            other => Err(CoreError::InvalidConfiguration {
                message: format!("unknown API specification format '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_extension_per_variant() {
        assert_eq!(ApiSpecification::GraphQl.file_name(), "specification.graphql");
        assert_eq!(ApiSpecification::Wsdl.file_name(), "specification.wsdl");
        assert_eq!(ApiSpecification::default().file_name(), "specification.yaml");
    }

    #[test]
    fn file_names_round_trip() {
        for spec in [
            ApiSpecification::GraphQl,
            ApiSpecification::Wadl,
            ApiSpecification::Wsdl,
            ApiSpecification::default(),
        ] {
            assert_eq!(ApiSpecification::from_file_name(&spec.file_name()), Some(spec));
        }
        assert_eq!(ApiSpecification::from_file_name("apiInformation.json"), None);
    }

    #[test]
    fn default_format_parsing() {
        assert_eq!(
            ApiSpecification::from_default_format("OpenApiV2Json").unwrap(),
            ApiSpecification::OpenApi {
                format: OpenApiFormat::Json,
                version: OpenApiVersion::V2
            }
        );
        assert_eq!(
            ApiSpecification::from_default_format("yaml").unwrap(),
            ApiSpecification::default()
        );
        assert!(ApiSpecification::from_default_format("wsdl").is_err());
    }
}
