//! Confluent-compatible schema registry client
//!
//! Speaks the subjects/versions REST API shared by Confluent Schema Registry
//! and Apicurio's compatibility layer.

use super::{RegisteredSchema, SchemaRegistryClient};
use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use topicmesh_core::SchemaFormat;

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Connection settings for a Confluent-compatible registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfluentConfig {
    /// Base URL, e.g. `http://localhost:8081`
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConfluentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }
}

#[derive(Debug, Serialize)]
struct RegisterSchemaRequest<'a> {
    schema: &'a str,
    #[serde(rename = "schemaType")]
    schema_type: String,
}

#[derive(Debug, Deserialize)]
struct RegisterSchemaResponse {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct SubjectVersionResponse {
    subject: String,
    version: u32,
    id: u32,
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: u32,
    #[serde(default)]
    message: String,
}

/// Subject-not-found code of the Confluent API
const SUBJECT_NOT_FOUND: u32 = 40401;

/// HTTP [`SchemaRegistryClient`]
pub struct ConfluentRegistry {
    client: Client,
    base_url: String,
}

impl ConfluentRegistry {
    pub fn new(config: &ConfluentConfig) -> RegistryResult<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            use base64::Engine;
            use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

            let credentials = format!("{username}:{password}");
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);

            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Basic {encoded}"))
                    .map_err(|e| RegistryError::Config(e.to_string()))?,
            );
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| RegistryError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_error(status: StatusCode, body: &str) -> RegistryError {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) if err.error_code == SUBJECT_NOT_FOUND => {
                RegistryError::SubjectNotFound(err.message)
            }
            Ok(err) => RegistryError::Api {
                status: status.as_u16(),
                message: err.message,
            },
            Err(_) => RegistryError::Api {
                status: status.as_u16(),
                message: body.to_string(),
            },
        }
    }
}

fn parse_format(schema_type: Option<&str>) -> SchemaFormat {
    // the registry omits schemaType for Avro
    match schema_type {
        Some("JSON") => SchemaFormat::Json,
        Some("PROTOBUF") => SchemaFormat::Protobuf,
        _ => SchemaFormat::Avro,
    }
}

#[async_trait]
impl SchemaRegistryClient for ConfluentRegistry {
    async fn list_subjects(&self) -> RegistryResult<Vec<String>> {
        let url = format!("{}/subjects", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Accept", CONTENT_TYPE)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        Ok(response.json().await?)
    }

    async fn latest(&self, subject: &str) -> RegistryResult<Option<RegisteredSchema>> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let response = self
            .client
            .get(&url)
            .header("Accept", CONTENT_TYPE)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let result: SubjectVersionResponse = response.json().await?;
        Ok(Some(RegisteredSchema {
            subject: result.subject,
            id: result.id,
            version: result.version,
            format: parse_format(result.schema_type.as_deref()),
            schema: result.schema,
        }))
    }

    async fn register(
        &self,
        subject: &str,
        format: SchemaFormat,
        schema: &str,
    ) -> RegistryResult<u32> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let request = RegisterSchemaRequest {
            schema,
            schema_type: format.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", CONTENT_TYPE)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let result: RegisterSchemaResponse = response.json().await?;
        tracing::info!(subject = %subject, schema_id = result.id, "Registered schema");
        Ok(result.id)
    }
}
