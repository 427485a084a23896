//! JSON-RPC backed chain access.
//!
//! Transactions are sent with `eth_sendTransaction` from node-managed
//! accounts, so no key material ever passes through this crate.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256, U64};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
    abi::encode_init_code,
    artifacts::ArtifactStore,
    bootstrap::{ChainWriter, UnitCall},
    registry::{DeployRequest, DeployedUnit, UnitDeployer},
    rpc,
};

/// The subset of a transaction receipt we look at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }
}

/// A chain reached over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcChain {
    client: reqwest::Client,
    url: Url,
    artifacts: ArtifactStore,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl RpcChain {
    pub fn new(
        url: Url,
        artifacts: ArtifactStore,
        rpc_timeout: Duration,
        confirmation_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client(rpc_timeout)?,
            url,
            artifacts,
            confirmation_timeout,
            poll_interval: rpc::DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        rpc::json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// Accounts managed by the node.
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.call("eth_accounts", vec![]).await
    }

    /// The chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    /// Send a transaction and wait until it is mined.
    ///
    /// Fails if the node rejects it or if it reverted.
    async fn transact(
        &self,
        from: Address,
        to: Option<Address>,
        data: &Bytes,
        value: Option<U256>,
    ) -> Result<TransactionReceipt> {
        let tx_hash: B256 = self
            .call(
                "eth_sendTransaction",
                vec![transaction_request(from, to, data, value)],
            )
            .await
            .context("Transaction was rejected")?;

        tracing::debug!(%tx_hash, %from, ?to, "Transaction sent, waiting for confirmation");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            anyhow::bail!("Transaction {} reverted", receipt.transaction_hash);
        }

        Ok(receipt)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let name = format!("receipt of {tx_hash}");
        let fetch = || async move {
            self.call::<Option<TransactionReceipt>>(
                "eth_getTransactionReceipt",
                vec![json!(tx_hash)],
            )
            .await
        };
        rpc::poll_until(&name, self.confirmation_timeout, self.poll_interval, fetch).await
    }
}

impl UnitDeployer for RpcChain {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployedUnit> {
        let artifact = self.artifacts.load(&request.name)?;
        let init_code = encode_init_code(&artifact.bytecode, &request.args);

        let receipt = self
            .transact(request.from, None, &init_code, request.value)
            .await
            .with_context(|| format!("Deployment transaction of {} failed", request.name))?;

        let address = receipt.contract_address.with_context(|| {
            format!(
                "Receipt {} of {} has no contract address",
                receipt.transaction_hash, request.name
            )
        })?;

        Ok(DeployedUnit {
            address,
            transaction_hash: Some(receipt.transaction_hash),
            code_hash: Some(artifact.code_hash()),
        })
    }

    fn code_hash(&self, name: &str) -> Result<Option<String>> {
        Ok(Some(self.artifacts.load(name)?.code_hash()))
    }
}

impl ChainWriter for RpcChain {
    async fn set_native_balance(&self, target: Address, amount: U256) -> Result<()> {
        // Hardhat answers `true`, anvil answers `null`.
        let _: Value = self
            .call("hardhat_setBalance", set_balance_params(target, amount))
            .await
            .with_context(|| format!("Failed to set native balance of {target}"))?;
        Ok(())
    }

    async fn send(&self, call: &UnitCall) -> Result<B256> {
        let receipt = self
            .transact(call.from, Some(call.to), &call.data, call.value)
            .await?;
        Ok(receipt.transaction_hash)
    }

    async fn read(&self, to: Address, data: &Bytes) -> Result<Bytes> {
        self.call(
            "eth_call",
            vec![json!({ "to": to, "data": data }), json!("latest")],
        )
        .await
    }
}

/// The `eth_sendTransaction` object. `to` is left out for deployments and
/// `value` is a hex quantity.
fn transaction_request(
    from: Address,
    to: Option<Address>,
    data: &Bytes,
    value: Option<U256>,
) -> Value {
    let mut tx = Map::new();
    tx.insert("from".to_string(), json!(from));
    if let Some(to) = to {
        tx.insert("to".to_string(), json!(to));
    }
    tx.insert("data".to_string(), json!(data));
    if let Some(value) = value {
        tx.insert("value".to_string(), json!(format!("{value:#x}")));
    }
    Value::Object(tx)
}

fn set_balance_params(target: Address, amount: U256) -> Vec<Value> {
    vec![json!(target), json!(format!("{amount:#x}"))]
}
