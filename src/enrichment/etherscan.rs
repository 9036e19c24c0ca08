//! Etherscan-style wallet provider: contract detection and ENS naming over JSON-RPC

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

use crate::enrichment::ens::{Ens, EthRpcClient};
use crate::enrichment::{or_none, EnrichmentProvider};
use crate::models::ioc_utils::{checksum_address, parse_wallet_address};
use crate::models::{NoteDraft, Observable, ObservableType};

/// What the chain says about a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletProfile {
    pub name: Option<String>,
    pub is_contract: bool,
    pub owner: Option<Address>,
}

/// Etherscan enrichment provider
pub struct EtherscanProvider {
    rpc: EthRpcClient,
    ens: Ens,
}

impl EtherscanProvider {
    pub fn new(rpc_url: String, registry: Address) -> Result<Self> {
        let rpc = EthRpcClient::new(rpc_url)?;
        let ens = Ens::new(rpc.clone(), registry);
        Ok(Self { rpc, ens })
    }

    /// Collect contract status, primary ENS name and its owner
    pub async fn profile(&self, address: Address) -> Result<WalletProfile> {
        let code = self.rpc.get_code(address).await?;
        let name = self.ens.name(address).await?;

        let owner = match &name {
            Some(name) => self.ens.owner(name).await?,
            None => None,
        };

        Ok(WalletProfile {
            name,
            is_contract: !code.is_empty(),
            owner,
        })
    }
}

/// Format a wallet profile into note text
pub fn format_note(profile: &WalletProfile) -> NoteDraft {
    let name = or_none(profile.name.as_deref());
    let owner = profile.owner.as_ref().map(checksum_address);
    let contract = if profile.is_contract { "True" } else { "False" };

    NoteDraft {
        abstract_text: format!("Name: {}", name),
        content: format!(
            "Name: {}, Contract: {}, Owner: {}",
            name,
            contract,
            or_none(owner.as_deref())
        ),
    }
}

#[async_trait]
impl EnrichmentProvider for EtherscanProvider {
    fn name(&self) -> &'static str {
        "etherscan"
    }

    fn scope(&self) -> ObservableType {
        ObservableType::CryptocurrencyWallet
    }

    async fn enrich(&self, observable: &Observable) -> Result<NoteDraft> {
        let address = parse_wallet_address(&observable.value)?;
        let profile = self.profile(address).await?;

        tracing::debug!(
            address = %checksum_address(&address),
            is_contract = profile.is_contract,
            name = ?profile.name,
            "Wallet profile resolved"
        );

        Ok(format_note(&profile))
    }
}
