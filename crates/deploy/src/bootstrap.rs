//! Local-only seeding of balances, allowances and pool liquidity.
//!
//! The bootstrap runs after every core and auxiliary unit is resolved, and
//! only when the network is classified as [`Mode::LocalDevelopment`]:
//!
//! ```text
//! NotStarted --(local)--> Seeding --(all actions ok)--> Ready
//! NotStarted --(production-like)--> Skipped
//! ```
//!
//! A failing action aborts the run in `Seeding`. Nothing is undone and a
//! re-run replays the sequence from the first action.

use std::{fmt, future::Future};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    abi::decode_uint,
    network::{Mode, NetworkContext},
    orchestrator::ResolvedUnits,
    units::{EXCHANGE, ExchangeUnit, LENDING, PRICE_MOVER, TOKEN, TokenUnit},
};

/// Wei per whole unit (18 decimals), for both the native currency and Corn.
pub const WEI_PER_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Native balance given to the price mover helper.
pub const DEFAULT_PRICE_MOVER_NATIVE_BALANCE: u64 = 10_000;
/// Corn minted to the price mover helper.
pub const DEFAULT_PRICE_MOVER_TOKENS: u64 = 10_000;
/// Corn minted to the lending unit as borrowable liquidity.
pub const DEFAULT_LENDING_TOKENS: u64 = 10_000;
/// Corn minted to the deployer.
pub const DEFAULT_DEPLOYER_TOKENS: u64 = 1_000;
/// Corn approved to the exchange and used as the pool's token reserve.
pub const DEFAULT_POOL_TOKENS: u64 = 1_000;
/// Native value paired with the pool's token reserve.
pub const DEFAULT_POOL_NATIVE_VALUE: u64 = 1;

/// Convert whole units to wei.
pub fn to_wei(units: u64) -> U256 {
    U256::from(units) * WEI_PER_UNIT
}

/// Bootstrap amounts, in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub price_mover_native_balance: u64,
    pub price_mover_tokens: u64,
    pub lending_tokens: u64,
    pub deployer_tokens: u64,
    pub pool_tokens: u64,
    pub pool_native_value: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            price_mover_native_balance: DEFAULT_PRICE_MOVER_NATIVE_BALANCE,
            price_mover_tokens: DEFAULT_PRICE_MOVER_TOKENS,
            lending_tokens: DEFAULT_LENDING_TOKENS,
            deployer_tokens: DEFAULT_DEPLOYER_TOKENS,
            pool_tokens: DEFAULT_POOL_TOKENS,
            pool_native_value: DEFAULT_POOL_NATIVE_VALUE,
        }
    }
}

/// One seeding operation. Amounts are in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapAction {
    /// Overwrite the native balance of `target`.
    FundAddress { target: Address, amount: U256 },
    /// `Corn.mintTo(to, amount)`.
    MintTokens { to: Address, amount: U256 },
    /// `Corn.approve(spender, amount)` from the deployer.
    ApproveAllowance { spender: Address, amount: U256 },
    /// `CornDEX.init(token_amount)` with `native_value` attached.
    InitializePool {
        token_amount: U256,
        native_value: U256,
    },
}

impl BootstrapAction {
    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FundAddress { .. } => "fund",
            Self::MintTokens { .. } => "mint",
            Self::ApproveAllowance { .. } => "approve",
            Self::InitializePool { .. } => "init-pool",
        }
    }
}

impl fmt::Display for BootstrapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FundAddress { target, amount } => {
                write!(f, "set native balance of {target} to {amount} wei")
            }
            Self::MintTokens { to, amount } => write!(f, "mint {amount} Corn wei to {to}"),
            Self::ApproveAllowance { spender, amount } => {
                write!(f, "approve {spender} for {amount} Corn wei")
            }
            Self::InitializePool {
                token_amount,
                native_value,
            } => write!(
                f,
                "initialize pool with {token_amount} Corn wei and {native_value} native wei"
            ),
        }
    }
}

/// Where the bootstrap stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BootstrapState {
    NotStarted,
    Seeding,
    Ready,
    Skipped,
}

/// A state-changing call from the deployer to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCall {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

/// Issues the bootstrap's transactions and reads.
///
/// `send` must block until the transaction is confirmed and fail if it reverted.
pub trait ChainWriter: Send + Sync {
    /// Overwrite the native balance of an account (development networks only).
    fn set_native_balance(
        &self,
        target: Address,
        amount: U256,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Send a call and wait for its confirmation.
    fn send(&self, call: &UnitCall) -> impl Future<Output = Result<B256>> + Send;

    /// Execute a read-only call against the latest state.
    fn read(&self, to: Address, data: &Bytes) -> impl Future<Output = Result<Bytes>> + Send;
}

impl<T: ChainWriter> ChainWriter for &T {
    fn set_native_balance(
        &self,
        target: Address,
        amount: U256,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).set_native_balance(target, amount)
    }

    fn send(&self, call: &UnitCall) -> impl Future<Output = Result<B256>> + Send {
        (**self).send(call)
    }

    fn read(&self, to: Address, data: &Bytes) -> impl Future<Output = Result<Bytes>> + Send {
        (**self).read(to, data)
    }
}

/// Runs the fixed seeding sequence.
#[derive(Debug, Clone, Default)]
pub struct Bootstrapper {
    config: BootstrapConfig,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// The actions for the given units, in execution order.
    ///
    /// Fails if any unit the sequence touches is not resolved.
    pub fn plan(
        &self,
        units: &ResolvedUnits,
        ctx: &NetworkContext,
    ) -> Result<Vec<BootstrapAction>> {
        let price_mover = units.address(PRICE_MOVER)?;
        let lending = units.address(LENDING)?;
        let exchange = units.address(EXCHANGE)?;
        units.address(TOKEN)?;

        let pool_tokens = to_wei(self.config.pool_tokens);

        Ok(vec![
            BootstrapAction::FundAddress {
                target: price_mover,
                amount: to_wei(self.config.price_mover_native_balance),
            },
            BootstrapAction::MintTokens {
                to: price_mover,
                amount: to_wei(self.config.price_mover_tokens),
            },
            BootstrapAction::MintTokens {
                to: lending,
                amount: to_wei(self.config.lending_tokens),
            },
            BootstrapAction::MintTokens {
                to: ctx.deployer,
                amount: to_wei(self.config.deployer_tokens),
            },
            BootstrapAction::ApproveAllowance {
                spender: exchange,
                amount: pool_tokens,
            },
            BootstrapAction::InitializePool {
                token_amount: pool_tokens,
                native_value: to_wei(self.config.pool_native_value),
            },
        ])
    }

    /// Run the bootstrap for `ctx`'s mode.
    ///
    /// Production-like networks are skipped without touching the chain.
    pub async fn run<C: ChainWriter>(
        &self,
        chain: &C,
        units: &ResolvedUnits,
        ctx: &NetworkContext,
    ) -> Result<BootstrapState> {
        let mut state = BootstrapState::NotStarted;
        tracing::debug!(%state, mode = %ctx.mode, "Classifying bootstrap");

        if ctx.mode != Mode::LocalDevelopment {
            state = BootstrapState::Skipped;
            tracing::info!(
                network = %ctx.network,
                %state,
                "Not a local network, bootstrap skipped"
            );
            return Ok(state);
        }

        let actions = self
            .plan(units, ctx)
            .context("Bootstrap prerequisites missing")?;
        let token = TokenUnit {
            address: units.address(TOKEN)?,
        };
        let exchange = ExchangeUnit {
            address: units.address(EXCHANGE)?,
        };

        state = BootstrapState::Seeding;
        tracing::info!(
            network = %ctx.network,
            %state,
            actions = actions.len(),
            "Seeding local network"
        );

        for (index, action) in actions.iter().enumerate() {
            let step = index + 1;
            tracing::info!(step, action = %action, "Bootstrap action");

            self.execute(chain, action, &token, &exchange, ctx)
                .await
                .with_context(|| format!("Bootstrap action {} ({}) failed", step, action.kind()))?;
        }

        state = BootstrapState::Ready;
        tracing::info!(network = %ctx.network, %state, "Local network seeded");
        Ok(state)
    }

    async fn execute<C: ChainWriter>(
        &self,
        chain: &C,
        action: &BootstrapAction,
        token: &TokenUnit,
        exchange: &ExchangeUnit,
        ctx: &NetworkContext,
    ) -> Result<()> {
        let call = match *action {
            BootstrapAction::FundAddress { target, amount } => {
                return chain.set_native_balance(target, amount).await;
            }
            BootstrapAction::MintTokens { to, amount } => UnitCall {
                from: ctx.deployer,
                to: token.address,
                data: token.mint_to(to, amount),
                value: None,
            },
            BootstrapAction::ApproveAllowance { spender, amount } => UnitCall {
                from: ctx.deployer,
                to: token.address,
                data: token.approve(spender, amount),
                value: None,
            },
            BootstrapAction::InitializePool {
                token_amount,
                native_value,
            } => {
                // CornDEX has no initialized flag, so a non-zero Corn balance
                // stands in for it. Corn sent to the exchange by any other
                // means also makes this skip `init` until the suite is
                // redeployed with `--reset`.
                let reserves = decode_uint(
                    &chain
                        .read(token.address, &token.balance_of(exchange.address))
                        .await
                        .context("Failed to read exchange token reserves")?,
                )?;

                if !reserves.is_zero() {
                    tracing::info!(
                        exchange = %exchange.address,
                        %reserves,
                        "Pool already holds reserves, skipping initialization"
                    );
                    return Ok(());
                }

                UnitCall {
                    from: ctx.deployer,
                    to: exchange.address,
                    data: exchange.init(token_amount),
                    value: Some(native_value),
                }
            }
        };

        let tx_hash = chain.send(&call).await?;
        tracing::debug!(%tx_hash, to = %call.to, "Bootstrap transaction confirmed");
        Ok(())
    }

    /// Human-readable outline of the sequence, before any unit is resolved.
    pub fn outline(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            format!(
                "set native balance of {PRICE_MOVER} to {} native",
                c.price_mover_native_balance
            ),
            format!("mint {} {TOKEN} to {PRICE_MOVER}", c.price_mover_tokens),
            format!("mint {} {TOKEN} to {LENDING}", c.lending_tokens),
            format!("mint {} {TOKEN} to the deployer", c.deployer_tokens),
            format!("approve {EXCHANGE} for {} {TOKEN}", c.pool_tokens),
            format!(
                "initialize {EXCHANGE} pool with {} {TOKEN} and {} native",
                c.pool_tokens, c.pool_native_value
            ),
        ]
    }
}
