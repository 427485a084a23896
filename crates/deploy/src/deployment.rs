use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use comfy_table::Table;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    artifacts::ArtifactStore,
    bootstrap::{BootstrapConfig, BootstrapState, Bootstrapper, ChainWriter},
    chain::RpcChain,
    network::{LOCAL_NETWORK, Mode, NetworkContext},
    orchestrator::{Orchestrator, ResolvedUnits},
    plan::{auxiliary_plan, core_plan},
    registry::{DeploymentRegistry, UnitDeployer},
    store::{DeploymentStore, FileStore},
};

/// The default name for the cornfield configuration file.
pub const CONFIG_FILENAME: &str = "Cornfield.toml";

/// Default JSON-RPC endpoint (a local Hardhat or anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545/";

/// Default time to wait for a transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 60;

/// Default timeout of a single RPC request.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Everything needed to deploy the suite to one network.
///
/// Can be serialized to/from TOML format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// The target network identity. Only [`LOCAL_NETWORK`] is seeded.
    pub network: String,
    /// JSON-RPC endpoint of the network.
    pub rpc_url: Url,
    /// Signing account. Defaults to the node's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Directory holding the compiled unit artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory holding one record directory per network.
    pub deployments_dir: PathBuf,
    pub confirmation_timeout_secs: u64,
    pub rpc_timeout_secs: u64,
    /// Amounts used when seeding a local network.
    pub bootstrap: BootstrapConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            network: LOCAL_NETWORK.to_string(),
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is a valid URL"),
            deployer: None,
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_dir: PathBuf::from("deployments"),
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl DeploymentConfig {
    /// Resolve a config location: a directory points at its [`CONFIG_FILENAME`].
    pub fn config_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        }
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployment config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from a directory holding one.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        let config_path = Self::config_path(path);
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// The record directory of the configured network.
    pub fn records_dir(&self) -> PathBuf {
        self.deployments_dir.join(&self.network)
    }

    pub fn mode(&self) -> Mode {
        Mode::classify(&self.network)
    }

    fn chain(&self) -> Result<RpcChain> {
        RpcChain::new(
            self.rpc_url.clone(),
            ArtifactStore::new(&self.artifacts_dir),
            Duration::from_secs(self.rpc_timeout_secs),
            Duration::from_secs(self.confirmation_timeout_secs),
        )
    }

    /// Deploy the suite to the configured network.
    ///
    /// With `reset`, the network's records are wiped first and every unit is
    /// deployed again. The effective configuration is saved next to the
    /// records once the run succeeds.
    pub async fn deploy(self, reset: bool) -> Result<DeploymentSummary> {
        let mut store = FileStore::open(&self.deployments_dir, &self.network)?;
        if reset {
            store.reset()?;
        }

        let chain = self.chain()?;
        let chain_id = chain
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach {} at {}", self.network, self.rpc_url))?;

        let deployer = match self.deployer {
            Some(deployer) => deployer,
            None => chain
                .accounts()
                .await?
                .first()
                .copied()
                .context("The node exposes no accounts, set `deployer` explicitly")?,
        };

        let ctx = NetworkContext::new(&self.network, deployer);

        tracing::info!(
            network = %ctx.network,
            chain_id,
            rpc_url = %self.rpc_url,
            deployer = %ctx.deployer,
            mode = %ctx.mode,
            records = %store.dir().display(),
            "Starting deployment..."
        );

        let config_path = store.dir().join(CONFIG_FILENAME);
        let summary = deploy_suite(&chain, store, &ctx, &Bootstrapper::new(self.bootstrap)).await?;

        self.save_to_file(&config_path)?;

        Ok(summary)
    }

    /// Describe what [`DeploymentConfig::deploy`] would do, from the records only.
    pub fn dry_run(&self) -> Result<DryRunReport> {
        let store = FileStore::open(&self.deployments_dir, &self.network)?;
        dry_run(&store, &Bootstrapper::new(self.bootstrap))
    }
}

/// Deploy the core units, then on a local network the auxiliary units and the
/// bootstrap sequence.
///
/// Stops at the first failure. Units recorded before it are reused by the next
/// run.
pub async fn deploy_suite<C, S>(
    chain: &C,
    store: S,
    ctx: &NetworkContext,
    bootstrapper: &Bootstrapper,
) -> Result<DeploymentSummary>
where
    C: UnitDeployer + ChainWriter,
    S: DeploymentStore,
{
    let mut orchestrator = Orchestrator::new(DeploymentRegistry::new(chain, store));

    tracing::info!(network = %ctx.network, mode = %ctx.mode, "Resolving core units...");
    let mut units = orchestrator.run(&core_plan(), ctx).await?;

    if ctx.is_local_development() {
        tracing::info!(network = %ctx.network, "Resolving auxiliary units...");
        units = orchestrator.extend(&auxiliary_plan(), ctx, units).await?;
    } else {
        tracing::info!(network = %ctx.network, "Not a local network, auxiliary units skipped");
    }

    let bootstrap = bootstrapper.run(chain, &units, ctx).await?;

    tracing::info!(
        network = %ctx.network,
        units = units.len(),
        %bootstrap,
        "✓ Deployment complete!"
    );

    Ok(DeploymentSummary {
        network: ctx.network.clone(),
        mode: ctx.mode,
        units,
        bootstrap,
    })
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub network: String,
    pub mode: Mode,
    pub units: ResolvedUnits,
    pub bootstrap: BootstrapState,
}

impl DeploymentSummary {
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Unit", "Address", "Status"]);

        for record in self.units.ordered() {
            let status = if self.units.is_fresh(&record.name) {
                "deployed"
            } else {
                "reused"
            };
            table.add_row(vec![
                record.name.clone(),
                record.address.to_string(),
                status.to_string(),
            ]);
        }

        table
    }
}

impl fmt::Display for DeploymentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.to_table())?;
        writeln!(f, "network:   {} ({})", self.network, self.mode)?;
        write!(f, "bootstrap: {}", self.bootstrap)
    }
}

/// A planned step, with the address already recorded for it if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub name: String,
    pub args: String,
    pub recorded: Option<Address>,
}

/// What a run would do on a network, computed without network I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    pub network: String,
    pub mode: Mode,
    pub steps: Vec<PlannedStep>,
    /// Bootstrap outline, empty when the bootstrap would be skipped.
    pub bootstrap: Vec<String>,
}

impl DryRunReport {
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Step", "Unit", "Arguments", "Recorded"]);

        for (index, step) in self.steps.iter().enumerate() {
            table.add_row(vec![
                index.to_string(),
                step.name.clone(),
                step.args.clone(),
                step.recorded
                    .map(|address| address.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }

        table
    }
}

impl fmt::Display for DryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "network: {} ({})", self.network, self.mode)?;
        writeln!(f, "{}", self.to_table())?;

        if self.bootstrap.is_empty() {
            return write!(f, "bootstrap: skipped");
        }

        write!(f, "bootstrap:")?;
        for (index, action) in self.bootstrap.iter().enumerate() {
            write!(f, "\n  {}. {}", index + 1, action)?;
        }
        Ok(())
    }
}

/// Validate the plans for `store`'s network and list them against its records.
pub fn dry_run<S: DeploymentStore>(store: &S, bootstrapper: &Bootstrapper) -> Result<DryRunReport> {
    let mode = Mode::classify(store.network());

    let core = core_plan();
    core.validate(std::iter::empty())
        .context("Invalid core plan")?;

    let mut steps: Vec<_> = core.steps().to_vec();
    if mode.is_local() {
        let auxiliary = auxiliary_plan();
        auxiliary
            .validate(core.names())
            .context("Invalid auxiliary plan")?;
        steps.extend(auxiliary.steps().iter().cloned());
    }

    let steps = steps
        .into_iter()
        .map(|step| {
            let recorded = store.get(&step.name)?.map(|record| record.address);
            let args = step
                .args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Ok(PlannedStep {
                name: step.name,
                args,
                recorded,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let bootstrap = if mode.is_local() {
        bootstrapper.outline()
    } else {
        Vec::new()
    };

    Ok(DryRunReport {
        network: store.network().to_string(),
        mode,
        steps,
        bootstrap,
    })
}
