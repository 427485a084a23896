//! An in-memory chain standing in for a JSON-RPC node.
//!
//! It deploys units at sequential addresses and simulates just enough of Corn
//! and CornDEX (balances, allowances, pool initialization) for the bootstrap
//! sequence to be checked end to end.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use cornfield_deploy::{
    ChainWriter, DeployRequest, DeployedUnit, UnitCall, UnitDeployer,
    abi::{calldata_address, calldata_uint, selector},
    units::{EXCHANGE, ExchangeUnit, TOKEN, TokenUnit},
};

/// The signing account used by every test.
pub const DEPLOYER: Address = Address::repeat_byte(0xde);

/// A bootstrap operation observed by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    SetBalance,
    MintTo,
    Approve,
    Init,
}

#[derive(Debug, Default)]
pub struct ChainState {
    pub deployments: Vec<DeployRequest>,
    pub addresses: HashMap<String, Address>,
    pub native_balances: HashMap<Address, U256>,
    pub token_balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    /// `(token_amount, native_value)` of every successful `init`.
    pub pool_inits: Vec<(U256, U256)>,
    pub ops: Vec<Op>,
}

impl ChainState {
    pub fn deployed_names(&self) -> Vec<&str> {
        self.deployments.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn token_balance(&self, owner: Address) -> U256 {
        self.token_balances.get(&owner).copied().unwrap_or_default()
    }

    fn unit(&self, name: &str) -> Option<Address> {
        self.addresses.get(name).copied()
    }
}

#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
    /// Deployments of this unit revert.
    pub fail_deploy: Option<String>,
    /// Calls to the function with this signature revert.
    pub fail_call: Option<&'static str>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_deploy(name: &str) -> Self {
        Self {
            fail_deploy: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_call(signature: &'static str) -> Self {
        Self {
            fail_call: Some(signature),
            ..Default::default()
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    fn tx_hash(state: &ChainState) -> B256 {
        B256::with_last_byte((state.deployments.len() + state.ops.len()) as u8)
    }
}

impl UnitDeployer for MockChain {
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployedUnit> {
        if self.fail_deploy.as_deref() == Some(request.name.as_str()) {
            anyhow::bail!("execution reverted: {} constructor failed", request.name);
        }

        let mut state = self.state();
        state.deployments.push(request.clone());
        let address = Address::with_last_byte(state.deployments.len() as u8);
        state.addresses.insert(request.name.clone(), address);

        Ok(DeployedUnit {
            address,
            transaction_hash: Some(Self::tx_hash(&state)),
            code_hash: Some(format!("{:064x}", state.deployments.len())),
        })
    }
}

impl ChainWriter for MockChain {
    async fn set_native_balance(&self, target: Address, amount: U256) -> Result<()> {
        let mut state = self.state();
        state.native_balances.insert(target, amount);
        state.ops.push(Op::SetBalance);
        Ok(())
    }

    async fn send(&self, call: &UnitCall) -> Result<B256> {
        let function: [u8; 4] = call
            .data
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .context("calldata shorter than a selector")?;

        if let Some(signature) = self.fail_call {
            if function == selector(signature) {
                anyhow::bail!("execution reverted: {signature}");
            }
        }

        let mut state = self.state();
        let token = state.unit(TOKEN);
        let exchange = state.unit(EXCHANGE);

        if Some(call.to) == token && function == selector(TokenUnit::MINT_TO) {
            let to = calldata_address(&call.data, 0).context("missing recipient")?;
            let amount = calldata_uint(&call.data, 1).context("missing amount")?;
            *state.token_balances.entry(to).or_default() += amount;
            state.ops.push(Op::MintTo);
        } else if Some(call.to) == token && function == selector(TokenUnit::APPROVE) {
            let spender = calldata_address(&call.data, 0).context("missing spender")?;
            let amount = calldata_uint(&call.data, 1).context("missing amount")?;
            state.allowances.insert((call.from, spender), amount);
            state.ops.push(Op::Approve);
        } else if Some(call.to) == exchange && function == selector(ExchangeUnit::INIT) {
            let exchange = call.to;
            let amount = calldata_uint(&call.data, 0).context("missing token amount")?;
            let value = call.value.unwrap_or_default();

            if !state.token_balance(exchange).is_zero() {
                anyhow::bail!("execution reverted: already initialized");
            }
            let allowance = state
                .allowances
                .get(&(call.from, exchange))
                .copied()
                .unwrap_or_default();
            if allowance < amount {
                anyhow::bail!("execution reverted: insufficient allowance");
            }
            if state.token_balance(call.from) < amount {
                anyhow::bail!("execution reverted: insufficient balance");
            }

            *state.token_balances.entry(call.from).or_default() -= amount;
            *state.token_balances.entry(exchange).or_default() += amount;
            *state.allowances.entry((call.from, exchange)).or_default() -= amount;
            *state.native_balances.entry(exchange).or_default() += value;
            state.pool_inits.push((amount, value));
            state.ops.push(Op::Init);
        } else {
            anyhow::bail!("execution reverted: no such function on {}", call.to);
        }

        Ok(Self::tx_hash(&state))
    }

    async fn read(&self, to: Address, data: &Bytes) -> Result<Bytes> {
        let state = self.state();
        if Some(to) != state.unit(TOKEN) || !data.starts_with(&selector(TokenUnit::BALANCE_OF)) {
            anyhow::bail!("execution reverted: unsupported read on {to}");
        }

        let owner = calldata_address(data, 0).context("missing owner")?;
        Ok(Bytes::from(state.token_balance(owner).to_be_bytes::<32>().to_vec()))
    }
}

/// Route crate logs to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
