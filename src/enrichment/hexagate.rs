//! Hexagate wallet risk provider

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::enrichment::{or_none, EnrichmentProvider, NONE};
use crate::models::ioc_utils::{checksum_address, parse_wallet_address};
use crate::models::{NoteDraft, Observable, ObservableType};

const HEXAGATE_API_URL: &str = "https://api.hexagate.com";

/// Hexagate address analysis
#[derive(Debug, Deserialize)]
pub struct AddressAnalysis {
    pub name: Option<String>,
    pub risk_level: Option<String>,
    #[serde(rename = "type")]
    pub address_type: Option<String>,
    #[serde(default)]
    pub security_issues: Vec<SecurityIssue>,
}

#[derive(Debug, Deserialize)]
pub struct SecurityIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub risk_level: String,
    #[serde(default)]
    pub extra_details: Vec<String>,
}

/// Hexagate enrichment provider
pub struct HexagateProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HexagateProvider {
    /// Create a new Hexagate provider against the public API
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, HEXAGATE_API_URL.to_string())
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

    /// Analyze an Ethereum mainnet address
    pub async fn analyze_address(&self, address: &str) -> Result<AddressAnalysis> {
        let response = self.client
            .post(format!("{}/api/v1/ethereum/mainnet/address/analyze", self.base_url))
            .header("X-Hexagate-Api-Key", &self.api_key)
            .json(&json!({ "address": address }))
            .send()
            .await
            .context("Failed to send request to Hexagate")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hexagate API error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Hexagate response")
    }
}

/// Format an analysis into note text. LOW issues are left out.
pub fn format_note(analysis: &AddressAnalysis) -> NoteDraft {
    let abstract_text = format!(
        "Name: {}, Risk: {}, Type: {}",
        or_none(analysis.name.as_deref()),
        or_none(analysis.risk_level.as_deref()),
        or_none(analysis.address_type.as_deref()),
    );

    let sections: Vec<String> = analysis
        .security_issues
        .iter()
        .filter(|issue| issue.risk_level != "LOW")
        .map(|issue| {
            let extra: String = issue
                .extra_details
                .iter()
                .map(|d| format!(" {}", d))
                .collect();
            format!("{}\n\nRisk: {}\n\n{}", issue.issue_type, issue.risk_level, extra)
        })
        .collect();

    let content = if sections.is_empty() {
        NONE.to_string()
    } else {
        sections.join("\n\n")
    };

    NoteDraft {
        abstract_text,
        content,
    }
}

#[async_trait]
impl EnrichmentProvider for HexagateProvider {
    fn name(&self) -> &'static str {
        "hexagate"
    }

    fn scope(&self) -> ObservableType {
        ObservableType::CryptocurrencyWallet
    }

    async fn enrich(&self, observable: &Observable) -> Result<NoteDraft> {
        let address = checksum_address(&parse_wallet_address(&observable.value)?);
        let analysis = self.analyze_address(&address).await?;

        tracing::debug!(
            address = %address,
            issues = analysis.security_issues.len(),
            "Hexagate analysis received"
        );

        Ok(format_note(&analysis))
    }
}
