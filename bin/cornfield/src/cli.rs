use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use cornfield_deploy::{CONFIG_FILENAME, DeploymentConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

/// Prefix of the environment variables overriding configuration keys.
const ENV_PREFIX: &str = "CORNFIELD_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum NetworkPreset {
    /// The local development node, the only network that gets seeded.
    Localhost,
    Sepolia,
    #[strum(default)]
    Custom(String),
}

impl NetworkPreset {
    pub fn to_network_name(&self) -> String {
        match self {
            NetworkPreset::Localhost => "localhost".to_string(),
            NetworkPreset::Sepolia => "sepolia".to_string(),
            NetworkPreset::Custom(name) => name.clone(),
        }
    }
}

#[derive(Parser)]
#[command(name = "cornfield")]
#[command(author, version, about = "Deploy the Corn lending suite")]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "CORNFIELD_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Cornfield.toml configuration file, or a directory holding one.
    ///
    /// If not provided, ./Cornfield.toml is used when present.
    #[arg(long, alias = "conf", env = "CORNFIELD_CONFIG")]
    pub config: Option<PathBuf>,

    /// The target network. Only `localhost` gets the testing helpers and the
    /// bootstrap sequence.
    #[arg(short, long)]
    pub network: Option<NetworkPreset>,

    /// The JSON-RPC endpoint of the target network.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// The signing account. Defaults to the node's first account.
    #[arg(long)]
    pub deployer: Option<Address>,

    /// The directory holding compiled artifacts.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// The directory holding deployment records.
    #[arg(long)]
    pub deployments: Option<PathBuf>,

    /// Forget every recorded deployment of the network and deploy from scratch.
    #[arg(long, env = "CORNFIELD_RESET", default_value_t = false)]
    pub reset: bool,

    /// Print the plan and the recorded addresses without touching the network.
    #[arg(long, env = "CORNFIELD_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,
}

/// Configuration keys set on the command line.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rpc_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployer: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployments_dir: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            network: self.network.as_ref().map(NetworkPreset::to_network_name),
            rpc_url: self.rpc_url.clone(),
            deployer: self.deployer,
            artifacts_dir: self.artifacts.clone(),
            deployments_dir: self.deployments.clone(),
        }
    }

    /// Build the effective configuration.
    ///
    /// Later layers win: defaults, the TOML file, `CORNFIELD_*` variables
    /// (`__` separates nested keys, e.g. `CORNFIELD_BOOTSTRAP__POOL_TOKENS`),
    /// then command line flags.
    pub fn load_config(&self) -> Result<DeploymentConfig> {
        let toml = match &self.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file or directory not found: {}",
                        path.display()
                    );
                }
                Some(DeploymentConfig::config_path(path))
            }
            None => Some(PathBuf::from(CONFIG_FILENAME)).filter(|path| path.exists()),
        };

        let config = layered_config(toml.as_deref(), self.overrides())?;

        tracing::debug!(
            config_file = ?toml,
            network = %config.network,
            rpc_url = %config.rpc_url,
            "Configuration resolved"
        );

        Ok(config)
    }
}

fn layered_config(toml: Option<&Path>, overrides: CliOverrides) -> Result<DeploymentConfig> {
    let mut figment = Figment::from(Serialized::defaults(DeploymentConfig::default()));

    if let Some(path) = toml {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["verbosity", "config", "reset", "dry_run"])
                .split("__"),
        )
        .merge(Serialized::defaults(overrides))
        .extract()
        .context("Failed to build configuration")
}
