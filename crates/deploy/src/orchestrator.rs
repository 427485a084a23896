//! Sequential execution of deployment plans.

use std::collections::{BTreeMap, BTreeSet};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use derive_more::Deref;

use crate::{
    network::NetworkContext,
    plan::DependencyPlan,
    registry::{DeployRequest, DeploymentRegistry, Resolution, UnitDeployer},
    store::{DeploymentRecord, DeploymentStore},
};

/// Units resolved so far in a run, by name.
#[derive(Debug, Clone, Default, Deref)]
pub struct ResolvedUnits {
    #[deref]
    records: BTreeMap<String, DeploymentRecord>,
    /// Resolution order.
    order: Vec<String>,
    /// Units deployed by this run rather than reused.
    fresh: BTreeSet<String>,
}

impl ResolvedUnits {
    /// Add a resolution. Re-inserting a name keeps its original position.
    pub fn insert(&mut self, resolution: Resolution) {
        let name = resolution.record.name.clone();
        if resolution.newly_deployed {
            self.fresh.insert(name.clone());
        }
        if self.records.insert(name.clone(), resolution.record).is_none() {
            self.order.push(name);
        }
    }

    /// Address of a resolved unit.
    pub fn address(&self, name: &str) -> Result<Address> {
        self.records
            .get(name)
            .map(|record| record.address)
            .with_context(|| format!("Unit {} has not been resolved", name))
    }

    /// Whether `name` was deployed during this run.
    pub fn is_fresh(&self, name: &str) -> bool {
        self.fresh.contains(name)
    }

    /// Records in resolution order.
    pub fn ordered(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.order.iter().filter_map(|name| self.records.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Runs plans against a [`DeploymentRegistry`].
#[derive(Debug)]
pub struct Orchestrator<D, S> {
    registry: DeploymentRegistry<D, S>,
}

impl<D, S> Orchestrator<D, S>
where
    D: UnitDeployer,
    S: DeploymentStore,
{
    pub fn new(registry: DeploymentRegistry<D, S>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DeploymentRegistry<D, S> {
        &self.registry
    }

    pub fn into_registry(self) -> DeploymentRegistry<D, S> {
        self.registry
    }

    /// Run `plan` from scratch.
    pub async fn run(
        &mut self,
        plan: &DependencyPlan,
        ctx: &NetworkContext,
    ) -> Result<ResolvedUnits> {
        self.extend(plan, ctx, ResolvedUnits::default()).await
    }

    /// Run `plan` on top of already resolved `units`, which later steps may
    /// reference.
    ///
    /// Steps execute strictly in order and the run stops at the first
    /// failure. Units resolved before the failure stay deployed and are
    /// picked up from the registry by the next run.
    pub async fn extend(
        &mut self,
        plan: &DependencyPlan,
        ctx: &NetworkContext,
        mut units: ResolvedUnits,
    ) -> Result<ResolvedUnits> {
        if ctx.network != self.registry.network() {
            anyhow::bail!(
                "Registry records network {} but the run targets {}",
                self.registry.network(),
                ctx.network
            );
        }

        plan.validate(units.names())
            .context("Invalid deployment plan")?;

        for (index, step) in plan.steps().iter().enumerate() {
            let args = step.resolve_args(&units, ctx)?;

            tracing::info!(
                step = index,
                unit = %step.name,
                args = %args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                "Resolving unit"
            );

            let request = DeployRequest {
                name: step.name.clone(),
                args,
                value: step.value,
                from: ctx.deployer,
            };

            let resolution = self
                .registry
                .resolve(request)
                .await
                .with_context(|| format!("Failed to deploy unit {}", step.name))?;

            units.insert(resolution);
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy_core::primitives::{B256, U256};

    use super::*;
    use crate::{
        abi::ResolvedArg,
        plan::{DeploymentStep, core_plan},
        registry::DeployedUnit,
        store::MemoryStore,
        units::{EXCHANGE, LENDING, TOKEN},
    };

    #[derive(Default)]
    struct SequentialDeployer {
        requests: Mutex<Vec<DeployRequest>>,
        fail_on: Option<&'static str>,
    }

    impl UnitDeployer for SequentialDeployer {
        async fn deploy(&self, request: &DeployRequest) -> Result<DeployedUnit> {
            if self.fail_on == Some(request.name.as_str()) {
                anyhow::bail!("insufficient funds for gas");
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(DeployedUnit {
                address: Address::with_last_byte(requests.len() as u8),
                transaction_hash: Some(B256::ZERO),
                code_hash: None,
            })
        }
    }

    fn ctx() -> NetworkContext {
        NetworkContext::new("localhost", Address::repeat_byte(0xde))
    }

    #[tokio::test]
    async fn test_core_plan_wires_addresses() {
        let deployer = SequentialDeployer::default();
        let registry = DeploymentRegistry::new(&deployer, MemoryStore::new("localhost"));
        let mut orchestrator = Orchestrator::new(registry);

        let units = orchestrator.run(&core_plan(), &ctx()).await.unwrap();

        let token = units.address(TOKEN).unwrap();
        let exchange = units.address(EXCHANGE).unwrap();

        assert_eq!(units[EXCHANGE].args, vec![ResolvedArg::Address(token)]);
        assert_eq!(
            units[LENDING].args,
            vec![ResolvedArg::Address(exchange), ResolvedArg::Address(token)]
        );
        assert_eq!(
            units.names().collect::<Vec<_>>(),
            vec![TOKEN, EXCHANGE, LENDING]
        );
        assert!(units.is_fresh(LENDING));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let deployer = SequentialDeployer {
            fail_on: Some(EXCHANGE),
            ..Default::default()
        };
        let store = MemoryStore::new("localhost");
        let registry = DeploymentRegistry::new(&deployer, store.clone());
        let mut orchestrator = Orchestrator::new(registry);

        let err = orchestrator.run(&core_plan(), &ctx()).await.unwrap_err();

        assert!(
            format!("{err:#}").contains("Failed to deploy unit CornDEX"),
            "{err:#}"
        );
        let deployed: Vec<String> = deployer
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(deployed, vec![TOKEN]);
        assert!(store.get(TOKEN).unwrap().is_some());
        assert!(store.get(LENDING).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_value_and_deployer_args_are_forwarded() {
        let deployer = SequentialDeployer::default();
        let registry = DeploymentRegistry::new(&deployer, MemoryStore::new("localhost"));
        let mut orchestrator = Orchestrator::new(registry);

        let step = DeploymentStep::new("Vault")
            .with_arg(crate::plan::ConstructorArg::Deployer)
            .with_value(U256::from(5u64));
        let plan = DependencyPlan::new().step(step);
        orchestrator.run(&plan, &ctx()).await.unwrap();

        let requests = deployer.requests.lock().unwrap();
        assert_eq!(requests[0].value, Some(U256::from(5u64)));
        assert_eq!(requests[0].args, vec![ResolvedArg::Address(ctx().deployer)]);
        assert_eq!(requests[0].from, ctx().deployer);
    }

    #[tokio::test]
    async fn test_invalid_plan_deploys_nothing() {
        let deployer = SequentialDeployer::default();
        let registry = DeploymentRegistry::new(&deployer, MemoryStore::new("localhost"));
        let mut orchestrator = Orchestrator::new(registry);

        let plan = DependencyPlan::new()
            .step(DeploymentStep::new("A"))
            .step(DeploymentStep::new("B").with_unit("C"));

        assert!(orchestrator.run(&plan, &ctx()).await.is_err());
        assert!(deployer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_mismatch_is_rejected() {
        let deployer = SequentialDeployer::default();
        let registry = DeploymentRegistry::new(&deployer, MemoryStore::new("sepolia"));
        let mut orchestrator = Orchestrator::new(registry);

        assert!(orchestrator.run(&core_plan(), &ctx()).await.is_err());
    }
}
