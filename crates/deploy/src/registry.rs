//! Idempotent deploy-or-fetch of units.

use std::future::Future;

use alloy_core::primitives::{Address, B256, U256};
use anyhow::Result;

use crate::{
    abi::ResolvedArg,
    store::{DeploymentRecord, DeploymentStore},
};

/// A request to deploy one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub name: String,
    pub args: Vec<ResolvedArg>,
    /// Native value sent with the deployment.
    pub value: Option<U256>,
    /// The signing account.
    pub from: Address,
}

/// A unit freshly deployed and confirmed by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedUnit {
    pub address: Address,
    pub transaction_hash: Option<B256>,
    pub code_hash: Option<String>,
}

/// Performs actual deployments.
///
/// Implementations must block until the network confirms the deployment and
/// must fail if it reverted. They are never asked to deploy a unit that is
/// already recorded.
pub trait UnitDeployer: Send + Sync {
    /// Deploy a unit and wait for its confirmation.
    fn deploy(&self, request: &DeployRequest) -> impl Future<Output = Result<DeployedUnit>> + Send;

    /// The code hash the unit would be deployed with right now, if known.
    ///
    /// Used to warn when a recorded unit no longer matches its artifact.
    fn code_hash(&self, name: &str) -> Result<Option<String>> {
        let _ = name;
        Ok(None)
    }
}

impl<T: UnitDeployer> UnitDeployer for &T {
    fn deploy(&self, request: &DeployRequest) -> impl Future<Output = Result<DeployedUnit>> + Send {
        (**self).deploy(request)
    }

    fn code_hash(&self, name: &str) -> Result<Option<String>> {
        (**self).code_hash(name)
    }
}

/// Outcome of [`DeploymentRegistry::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: DeploymentRecord,
    /// `false` when the record already existed and was returned unchanged.
    pub newly_deployed: bool,
}

/// Deploy-or-fetch over a record store bound to one network.
///
/// `resolve` takes `&mut self`, so check-then-deploy can never interleave for
/// a given registry.
#[derive(Debug)]
pub struct DeploymentRegistry<D, S> {
    deployer: D,
    store: S,
}

impl<D, S> DeploymentRegistry<D, S>
where
    D: UnitDeployer,
    S: DeploymentStore,
{
    pub fn new(deployer: D, store: S) -> Self {
        Self { deployer, store }
    }

    /// The network this registry records deployments for.
    pub fn network(&self) -> &str {
        self.store.network()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Return the recorded instance of `request.name`, or deploy it.
    ///
    /// Constructor arguments are ignored when a record exists. Deployment
    /// failures propagate unchanged and nothing is recorded for them.
    pub async fn resolve(&mut self, request: DeployRequest) -> Result<Resolution> {
        if let Some(record) = self.store.get(&request.name)? {
            self.warn_on_code_drift(&record);

            tracing::info!(
                unit = %record.name,
                address = %record.address,
                network = %self.store.network(),
                "Reusing recorded deployment"
            );

            return Ok(Resolution {
                record,
                newly_deployed: false,
            });
        }

        tracing::debug!(unit = %request.name, args = ?request.args, "Deploying unit");

        let deployed = self.deployer.deploy(&request).await?;

        let record = DeploymentRecord {
            name: request.name,
            address: deployed.address,
            args: request.args,
            transaction_hash: deployed.transaction_hash,
            code_hash: deployed.code_hash,
            deployed_at: chrono::Utc::now().timestamp(),
        };

        self.store.insert(record.clone())?;

        tracing::info!(
            unit = %record.name,
            address = %record.address,
            tx_hash = ?record.transaction_hash,
            network = %self.store.network(),
            "Unit deployed"
        );

        Ok(Resolution {
            record,
            newly_deployed: true,
        })
    }

    fn warn_on_code_drift(&self, record: &DeploymentRecord) {
        let current = match self.deployer.code_hash(&record.name) {
            Ok(current) => current,
            Err(e) => {
                tracing::debug!(unit = %record.name, error = %e, "Could not hash current artifact");
                return;
            }
        };

        if let (Some(current), Some(recorded)) = (current, record.code_hash.as_ref()) {
            if &current != recorded {
                tracing::warn!(
                    unit = %record.name,
                    recorded = %recorded,
                    current = %current,
                    "Artifact changed since deployment, keeping the recorded instance"
                );
            }
        }
    }
}
