//! Ethereum JSON-RPC access and ENS name resolution

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::{sol, SolCall};
use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

/// Mainnet ENS registry
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

sol! {
    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
        function owner(bytes32 node) external view returns (address);
    }

    interface IEnsResolver {
        function name(bytes32 node) external view returns (string);
        function addr(bytes32 node) external view returns (address);
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Minimal Ethereum JSON-RPC client
#[derive(Clone)]
pub struct EthRpcClient {
    client: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl EthRpcClient {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Vec<u8>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self.client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} to RPC endpoint", method))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("RPC endpoint error: {} - {}", status, body);
        }

        let body: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(err) = body.error {
            bail!("{} failed ({}): {}", method, err.code, err.message);
        }

        let result = body.result.unwrap_or_default();
        let digits = result.strip_prefix("0x").unwrap_or(&result);
        hex::decode(digits).with_context(|| format!("Invalid hex in {} result", method))
    }

    /// Deployed bytecode at an address (empty for externally owned accounts)
    pub async fn get_code(&self, address: Address) -> Result<Vec<u8>> {
        self.request("eth_getCode", json!([hex_address(&address), "latest"]))
            .await
    }

    /// Read-only contract call against the latest block
    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        self.request(
            "eth_call",
            json!([{ "to": hex_address(&to), "data": format!("0x{}", hex::encode(data)) }, "latest"]),
        )
        .await
    }
}

/// ENS lookups through the registry contract
#[derive(Clone)]
pub struct Ens {
    rpc: EthRpcClient,
    registry: Address,
}

impl Ens {
    pub fn new(rpc: EthRpcClient, registry: Address) -> Self {
        Self { rpc, registry }
    }

    /// Typed `eth_call`; an empty return means the target has no code
    async fn eth_call<C: SolCall>(&self, to: Address, call: &C) -> Result<Option<C::Return>> {
        let ret = self.rpc.call(to, &call.abi_encode()).await?;
        if ret.is_empty() {
            return Ok(None);
        }

        let decoded = C::abi_decode_returns_validate(&ret)
            .with_context(|| format!("Invalid {} return data", C::SIGNATURE))?;
        Ok(Some(decoded))
    }

    async fn resolver(&self, node: B256) -> Result<Option<Address>> {
        let resolver = self
            .eth_call(self.registry, &IEnsRegistry::resolverCall { node })
            .await?;
        Ok(resolver.filter(|a| !a.is_zero()))
    }

    /// Forward resolution of a name to an address
    pub async fn address(&self, name: &str) -> Result<Option<Address>> {
        let node = namehash(name);
        let Some(resolver) = self.resolver(node).await? else {
            return Ok(None);
        };

        let address = self.eth_call(resolver, &IEnsResolver::addrCall { node }).await?;
        Ok(address.filter(|a| !a.is_zero()))
    }

    /// Primary name of an address, only if it resolves back to the same address
    pub async fn name(&self, address: Address) -> Result<Option<String>> {
        let node = namehash(&reverse_name(&address));
        let Some(resolver) = self.resolver(node).await? else {
            return Ok(None);
        };

        let name = match self.eth_call(resolver, &IEnsResolver::nameCall { node }).await? {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };

        if self.address(&name).await? != Some(address) {
            tracing::debug!(name = %name, "Reverse record does not resolve back to the address");
            return Ok(None);
        }

        Ok(Some(name))
    }

    /// Registry owner of a name
    pub async fn owner(&self, name: &str) -> Result<Option<Address>> {
        let owner = self
            .eth_call(self.registry, &IEnsRegistry::ownerCall { node: namehash(name) })
            .await?;
        Ok(owner.filter(|a| !a.is_zero()))
    }
}

fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// ENS namehash (EIP-137)
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }

    for label in name.to_lowercase().rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        node = keccak256(buf);
    }
    node
}

/// Reverse-registrar name of an address
pub fn reverse_name(address: &Address) -> String {
    format!("{}.addr.reverse", hex::encode(address.as_slice()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Matches a JSON-RPC request by method, target contract and call selector
    pub(crate) struct RpcCall {
        pub method: &'static str,
        pub to: Option<Address>,
        pub selector: Option<[u8; 4]>,
    }

    impl Match for RpcCall {
        fn matches(&self, request: &Request) -> bool {
            let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
                return false;
            };
            if body["method"] != self.method {
                return false;
            }
            let call = &body["params"][0];
            if let Some(to) = self.to {
                if call["to"].as_str() != Some(hex_address(&to).as_str()) {
                    return false;
                }
            }
            if let Some(selector) = self.selector {
                let prefix = format!("0x{}", hex::encode(selector));
                if !call["data"].as_str().is_some_and(|d| d.starts_with(&prefix)) {
                    return false;
                }
            }
            true
        }
    }

    pub(crate) fn encode_address(address: Address) -> String {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        format!("0x{}", hex::encode(word))
    }

    pub(crate) fn encode_string(value: &str) -> String {
        let mut out = vec![0u8; 64];
        out[31] = 0x20;
        out[56..64].copy_from_slice(&(value.len() as u64).to_be_bytes());
        let mut data = value.as_bytes().to_vec();
        data.resize(value.len().div_ceil(32) * 32, 0);
        out.extend(data);
        format!("0x{}", hex::encode(out))
    }

    #[test]
    fn namehash_matches_eip137_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            hex::encode(namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn selectors_match_ens_abi() {
        assert_eq!(hex::encode(IEnsRegistry::resolverCall::SELECTOR), "0178b8bf");
        assert_eq!(hex::encode(IEnsRegistry::ownerCall::SELECTOR), "02571be3");
        assert_eq!(hex::encode(IEnsResolver::nameCall::SELECTOR), "691f3431");
        assert_eq!(hex::encode(IEnsResolver::addrCall::SELECTOR), "3b3b57de");
    }

    #[test]
    fn call_data_is_selector_then_node() {
        let node = namehash("vitalik.eth");
        let data = IEnsRegistry::resolverCall { node }.abi_encode();
        assert_eq!(&data[..4], IEnsRegistry::resolverCall::SELECTOR.as_slice());
        assert_eq!(&data[4..], node.as_slice());
    }

    #[test]
    fn reverse_name_is_lowercase_hex() {
        let address = Address::from([0xAB; 20]);
        assert_eq!(
            reverse_name(&address),
            "abababababababababababababababababababab.addr.reverse"
        );
    }

    fn rpc_result(result: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    async fn ens(server: &MockServer) -> Ens {
        Ens::new(EthRpcClient::new(server.uri()).unwrap(), Address::from([0x0e; 20]))
    }

    #[tokio::test]
    async fn decodes_owner_address() {
        let server = MockServer::start().await;
        let owner = Address::from([0x11; 20]);
        Mock::given(method("POST"))
            .and(RpcCall {
                method: "eth_call",
                to: Some(Address::from([0x0e; 20])),
                selector: Some(IEnsRegistry::ownerCall::SELECTOR),
            })
            .respond_with(rpc_result(encode_address(owner)))
            .mount(&server)
            .await;

        assert_eq!(ens(&server).await.owner("vitalik.eth").await.unwrap(), Some(owner));
    }

    #[tokio::test]
    async fn empty_return_data_means_no_owner() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rpc_result("0x".to_string()))
            .mount(&server)
            .await;

        assert_eq!(ens(&server).await.owner("vitalik.eth").await.unwrap(), None);
    }

    #[tokio::test]
    async fn address_word_with_dirty_upper_bytes_is_rejected() {
        let server = MockServer::start().await;
        let mut word = [0u8; 32];
        word[0] = 0xff;
        word[12..].copy_from_slice(&[0x11; 20]);
        Mock::given(method("POST"))
            .respond_with(rpc_result(format!("0x{}", hex::encode(word))))
            .mount(&server)
            .await;

        let err = ens(&server).await.owner("vitalik.eth").await.unwrap_err();
        assert!(format!("{:#}", err).contains("owner(bytes32)"));
    }

    #[tokio::test]
    async fn truncated_string_return_is_rejected() {
        let server = MockServer::start().await;
        let resolver = Address::from([0x42; 20]);
        Mock::given(method("POST"))
            .and(RpcCall {
                method: "eth_call",
                to: None,
                selector: Some(IEnsRegistry::resolverCall::SELECTOR),
            })
            .respond_with(rpc_result(encode_address(resolver)))
            .mount(&server)
            .await;

        let mut bytes = vec![0u8; 64];
        bytes[31] = 0x20;
        bytes[63] = 50;
        Mock::given(method("POST"))
            .and(RpcCall {
                method: "eth_call",
                to: Some(resolver),
                selector: Some(IEnsResolver::nameCall::SELECTOR),
            })
            .respond_with(rpc_result(format!("0x{}", hex::encode(bytes))))
            .mount(&server)
            .await;

        let err = ens(&server).await.name(Address::from([0x11; 20])).await.unwrap_err();
        assert!(format!("{:#}", err).contains("name(bytes32)"));
    }
}
