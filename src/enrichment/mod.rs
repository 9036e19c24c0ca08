//! Enrichment connectors for threat intelligence observables

pub mod chainpatrol;
pub mod ens;
pub mod etherscan;
pub mod hexagate;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::{
    Bundle, EnrichmentOutcome, EnrichmentRequest, Note, NoteDraft, Observable, ObservableType, Tlp,
};
use crate::platform::Platform;

/// Rendering used in notes for a value the vendor did not return
pub(crate) const NONE: &str = "None";

pub(crate) fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}

/// Trait for enrichment providers
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &'static str;

    /// Observable type this provider enriches
    fn scope(&self) -> ObservableType;

    /// Check if this provider can enrich the given observable type
    fn supports(&self, observable_type: &ObservableType) -> bool {
        self.scope() == *observable_type
    }

    /// Query the vendor and format the note text
    async fn enrich(&self, observable: &Observable) -> Result<NoteDraft>;
}

/// A single enrichment connector: one provider publishing notes to the platform
pub struct Connector {
    provider: Box<dyn EnrichmentProvider>,
    platform: Arc<dyn Platform>,
    author_id: Option<String>,
    marking: Tlp,
}

impl Connector {
    pub fn new(
        provider: Box<dyn EnrichmentProvider>,
        platform: Arc<dyn Platform>,
        author_id: Option<String>,
        marking: Tlp,
    ) -> Self {
        Self {
            provider,
            platform,
            author_id,
            marking,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn scope(&self) -> ObservableType {
        self.provider.scope()
    }

    /// Handle one enrichment notification end to end
    pub async fn process_message(&self, request: &EnrichmentRequest) -> Result<EnrichmentOutcome> {
        let entity_id = request.entity_id.as_str();

        let observable = self
            .platform
            .read_observable(entity_id)
            .await?
            .with_context(|| format!("Observable {} not found on the platform", entity_id))?;

        if !self.provider.supports(&observable.entity_type) {
            tracing::error!(
                provider = self.provider.name(),
                entity_type = %observable.entity_type,
                "wrong type process data: {:?}",
                request
            );
            return Ok(EnrichmentOutcome::Skipped {
                entity_type: observable.entity_type.to_string(),
            });
        }

        tracing::info!(
            provider = self.provider.name(),
            observable_id = %observable.id,
            "Retrieving data on {}",
            observable.value
        );

        let draft = self
            .provider
            .enrich(&observable)
            .await
            .with_context(|| format!("{} enrichment failed for {}", self.provider.name(), observable.value))?;

        let note = Note::new(draft, entity_id, self.author_id.as_deref(), self.marking);
        let bundle = Bundle::new(vec![note]);

        let bundles_sent = self.platform.send_bundle(&bundle).await?;
        tracing::info!(
            provider = self.provider.name(),
            bundle_id = %bundle.id,
            "Sent {} stix bundle(s) for worker import",
            bundles_sent
        );

        Ok(EnrichmentOutcome::Enriched { bundles_sent })
    }
}
