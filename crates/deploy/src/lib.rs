//! cornfield-deploy - Deployment library for the Corn lending suite.
//!
//! This crate deploys the Corn token, the CornDEX exchange and the Lending
//! market in dependency order, reusing whatever a network already has recorded.
//! On the local development network it also deploys the testing helpers and
//! seeds balances, allowances and pool liquidity.

pub mod abi;
pub mod artifacts;
pub mod bootstrap;
pub mod chain;
mod deployment;
pub mod network;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod units;

pub use artifacts::{Artifact, ArtifactStore};
pub use bootstrap::{
    BootstrapAction, BootstrapConfig, BootstrapState, Bootstrapper, ChainWriter, UnitCall,
};
pub use chain::RpcChain;
pub use deployment::{
    CONFIG_FILENAME, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_RPC_TIMEOUT_SECS,
    DEFAULT_RPC_URL, DeploymentConfig, DeploymentSummary, DryRunReport, PlannedStep,
    deploy_suite, dry_run,
};
pub use network::{LOCAL_NETWORK, Mode, NetworkContext};
pub use orchestrator::{Orchestrator, ResolvedUnits};
pub use plan::{ConstructorArg, DependencyPlan, DeploymentStep, auxiliary_plan, core_plan};
pub use registry::{DeployRequest, DeployedUnit, DeploymentRegistry, Resolution, UnitDeployer};
pub use store::{DeploymentRecord, DeploymentStore, FileStore, MemoryStore};
