//! ChainPatrol domain reputation provider

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::enrichment::{or_none, EnrichmentProvider};
use crate::models::ioc_utils::normalize_domain;
use crate::models::{NoteDraft, Observable, ObservableType};

const CHAINPATROL_API_URL: &str = "https://app.chainpatrol.io";

/// ChainPatrol asset details response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetails {
    pub status: String,
    pub reason: Option<String>,
    pub report_url: Option<String>,
}

/// ChainPatrol enrichment provider
pub struct ChainPatrolProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ChainPatrolProvider {
    /// Create a new ChainPatrol provider against the public API
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, CHAINPATROL_API_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up an asset (domain) in ChainPatrol
    pub async fn asset_details(&self, content: &str) -> Result<AssetDetails> {
        let response = self.client
            .post(format!("{}/api/v2/asset/details", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "content": content }))
            .send()
            .await
            .context("Failed to send request to ChainPatrol")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("ChainPatrol API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse ChainPatrol response")
    }
}

/// Format asset details into note text
pub fn format_note(details: &AssetDetails) -> NoteDraft {
    let reason = or_none(details.reason.as_deref());
    let report_url = or_none(details.report_url.as_deref());

    let content = match details.status.as_str() {
        "BLOCKED" => format!("({}) -  Chainpatrol Report: {}", reason, report_url),
        "ALLOWED" => format!("Chainpatrol Report: {}", report_url),
        _ => format!("({})", reason),
    };

    NoteDraft {
        abstract_text: format!("Result: {}", details.status),
        content,
    }
}

#[async_trait]
impl EnrichmentProvider for ChainPatrolProvider {
    fn name(&self) -> &'static str {
        "chainpatrol"
    }

    fn scope(&self) -> ObservableType {
        ObservableType::DomainName
    }

    async fn enrich(&self, observable: &Observable) -> Result<NoteDraft> {
        let domain = normalize_domain(&observable.value)?;
        let details = self.asset_details(&domain).await?;

        tracing::debug!(domain = %domain, status = %details.status, "ChainPatrol verdict");

        Ok(format_note(&details))
    }
}
