//! Core data models for enrichment connectors

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::Validate;

pub mod ioc_utils;

/// Observable types the platform can ask us to enrich
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservableType {
    DomainName,
    CryptocurrencyWallet,
    Other(String),
}

impl ObservableType {
    pub fn as_str(&self) -> &str {
        match self {
            ObservableType::DomainName => "Domain-Name",
            ObservableType::CryptocurrencyWallet => "Cryptocurrency-Wallet",
            ObservableType::Other(other) => other,
        }
    }
}

impl From<&str> for ObservableType {
    fn from(entity_type: &str) -> Self {
        match entity_type {
            "Domain-Name" => ObservableType::DomainName,
            "Cryptocurrency-Wallet" => ObservableType::CryptocurrencyWallet,
            other => ObservableType::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ObservableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable as read back from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observable {
    pub id: String,
    pub entity_type: ObservableType,
    pub value: String,
}

/// Enrichment notification delivered to a connector
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EnrichmentRequest {
    #[validate(length(min = 1, max = 256))]
    pub entity_id: String,
}

/// Vendor-specific note text, before it is wrapped into STIX
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub abstract_text: String,
    pub content: String,
}

/// Traffic light protocol for sharing
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Tlp {
    White, // Public
    Green, // Community
    Amber, // Limited
    Red,   // Restricted
}

impl Tlp {
    /// STIX marking-definition id of the TLP level
    pub fn marking_id(&self) -> &'static str {
        match self {
            Tlp::White => "marking-definition--613f2e26-407d-48c7-9eca-b8e91df99dc9",
            Tlp::Green => "marking-definition--34098fce-860f-48ae-8e50-ebd3cc5e41da",
            Tlp::Amber => "marking-definition--f88d31f6-486f-44da-b317-01333bde0b82",
            Tlp::Red => "marking-definition--5e57c739-391a-4eb3-b6be-7d15ca92d5ed",
        }
    }
}

fn rfc3339_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// STIX 2.1 note attached to an observable
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    #[serde(rename = "type")]
    pub object_type: &'static str,
    pub spec_version: &'static str,
    pub id: String,
    #[serde(serialize_with = "rfc3339_millis")]
    pub created: DateTime<Utc>,
    #[serde(serialize_with = "rfc3339_millis")]
    pub modified: DateTime<Utc>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_ref: Option<String>,
    pub object_refs: Vec<String>,
    pub object_marking_refs: Vec<String>,
}

impl Note {
    /// Build a note about `entity_id` from a vendor draft
    pub fn new(draft: NoteDraft, entity_id: &str, author_id: Option<&str>, tlp: Tlp) -> Self {
        let now = Utc::now();
        Self {
            object_type: "note",
            spec_version: "2.1",
            id: format!("note--{}", Uuid::new_v4()),
            created: now,
            modified: now,
            abstract_text: draft.abstract_text,
            content: draft.content,
            created_by_ref: author_id.map(str::to_string),
            object_refs: vec![entity_id.to_string()],
            object_marking_refs: vec![tlp.marking_id().to_string()],
        }
    }
}

/// STIX bundle submitted to the platform
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub object_type: &'static str,
    pub id: String,
    pub objects: Vec<Note>,
}

impl Bundle {
    pub fn new(objects: Vec<Note>) -> Self {
        Self {
            object_type: "bundle",
            id: format!("bundle--{}", Uuid::new_v4()),
            objects,
        }
    }
}

/// Result of processing one enrichment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EnrichmentOutcome {
    Enriched { bundles_sent: usize },
    Skipped { entity_type: String },
}
