//! OpenCTI platform access: observable lookup and bundle submission

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::models::{Bundle, Observable, ObservableType};

const READ_OBSERVABLE_QUERY: &str = r#"
    query StixCyberObservable($id: String!) {
        stixCyberObservable(id: $id) {
            id
            entity_type
            observable_value
        }
    }
"#;

const BUNDLE_PUSH_MUTATION: &str = r#"
    mutation StixBundlePush($connectorId: String!, $bundle: String!) {
        stixBundlePush(connectorId: $connectorId, bundle: $bundle)
    }
"#;

/// Operations a connector needs from the platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// Read an observable by its platform id
    async fn read_observable(&self, id: &str) -> Result<Option<Observable>>;

    /// Submit a bundle for import, returning how many bundles were accepted
    async fn send_bundle(&self, bundle: &Bundle) -> Result<usize>;
}

/// Errors raised by the GraphQL transport
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("GraphQL response has no data")]
    MissingData,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadObservableData {
    stix_cyber_observable: Option<ObservableNode>,
}

#[derive(Debug, Deserialize)]
struct ObservableNode {
    id: String,
    entity_type: String,
    observable_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundlePushData {
    stix_bundle_push: Option<Value>,
}

/// GraphQL client for an OpenCTI instance
#[derive(Clone)]
pub struct OpenCtiClient {
    client: Client,
    endpoint: Url,
    token: String,
    connector_id: String,
}

impl OpenCtiClient {
    /// Create a new platform client
    pub fn new(base_url: &str, token: String, connector_id: String) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid OpenCTI URL: {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("graphql")
            .context("Failed to build OpenCTI GraphQL endpoint")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            token,
            connector_id,
        })
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, PlatformError> {
        let response = self.client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }

        let body: GraphQlResponse<T> = response.json().await?;

        if !body.errors.is_empty() {
            let messages = body.errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PlatformError::GraphQl(messages));
        }

        body.data.ok_or(PlatformError::MissingData)
    }
}

#[async_trait]
impl Platform for OpenCtiClient {
    async fn read_observable(&self, id: &str) -> Result<Option<Observable>> {
        let data: ReadObservableData = self
            .query(READ_OBSERVABLE_QUERY, json!({ "id": id }))
            .await
            .with_context(|| format!("Failed to read observable {}", id))?;

        Ok(data.stix_cyber_observable.map(|node| Observable {
            id: node.id,
            entity_type: ObservableType::from(node.entity_type.as_str()),
            value: node.observable_value.unwrap_or_default(),
        }))
    }

    async fn send_bundle(&self, bundle: &Bundle) -> Result<usize> {
        let serialized = serde_json::to_string(bundle).context("Failed to serialize bundle")?;

        let data: BundlePushData = self
            .query(
                BUNDLE_PUSH_MUTATION,
                json!({ "connectorId": self.connector_id, "bundle": serialized }),
            )
            .await
            .with_context(|| format!("Failed to push bundle {}", bundle.id))?;

        match data.stix_bundle_push {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(0),
            Some(_) => Ok(1),
        }
    }
}
