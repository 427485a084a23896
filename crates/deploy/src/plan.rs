//! Declarative deployment plans.
//!
//! A [`DependencyPlan`] is an ordered list of [`DeploymentStep`]s. A step's
//! constructor arguments may reference the address of any strictly earlier
//! step (or of a unit resolved before the plan runs), which makes the plan a
//! topologically ordered DAG.

use std::{collections::HashSet, fmt};

use alloy_core::primitives::U256;
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    abi::ResolvedArg,
    network::NetworkContext,
    orchestrator::ResolvedUnits,
    units::{EXCHANGE, FLASH_LOAN_LIQUIDATOR, LENDING, LEVERAGE, PRICE_MOVER, TOKEN},
};

/// A constructor argument, possibly referring to an earlier step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructorArg {
    /// A literal value.
    Literal(ResolvedArg),
    /// The address of a previously resolved unit.
    Unit(String),
    /// The deploying account.
    Deployer,
}

impl ConstructorArg {
    pub fn unit(name: impl Into<String>) -> Self {
        Self::Unit(name.into())
    }

    /// Resolve against the units accumulated so far.
    pub fn resolve(
        &self,
        units: &ResolvedUnits,
        ctx: &NetworkContext,
    ) -> anyhow::Result<ResolvedArg> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Unit(name) => units.address(name).map(ResolvedArg::Address),
            Self::Deployer => Ok(ResolvedArg::Address(ctx.deployer)),
        }
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Unit(name) => write!(f, "<{name}>"),
            Self::Deployer => write!(f, "<deployer>"),
        }
    }
}

/// One unit to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// Unit name, also the artifact name and the record key.
    pub name: String,
    /// Constructor arguments in declaration order.
    pub args: Vec<ConstructorArg>,
    /// Native value sent with the deployment transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl DeploymentStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            value: None,
        }
    }

    /// Append a reference to an earlier unit's address.
    pub fn with_unit(mut self, name: impl Into<String>) -> Self {
        self.args.push(ConstructorArg::unit(name));
        self
    }

    /// Append an arbitrary argument.
    pub fn with_arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Send native value with the deployment.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Names of the units this step depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Unit(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Resolve every argument against the units accumulated so far.
    pub fn resolve_args(
        &self,
        units: &ResolvedUnits,
        ctx: &NetworkContext,
    ) -> anyhow::Result<Vec<ResolvedArg>> {
        self.args
            .iter()
            .map(|arg| arg.resolve(units, ctx))
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("Failed to resolve constructor arguments of {}", self.name))
    }
}

/// An ordered list of deployment steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyPlan {
    steps: Vec<DeploymentStep>,
}

impl DependencyPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the plan.
    pub fn step(mut self, step: DeploymentStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name.as_str())
    }

    /// Check that step names are unique and that every reference points at
    /// an earlier step or at one of the `resolved` units.
    pub fn validate<'a>(&self, resolved: impl IntoIterator<Item = &'a str>) -> anyhow::Result<()> {
        let mut known: HashSet<&str> = resolved.into_iter().collect();

        for (index, step) in self.steps.iter().enumerate() {
            for dependency in step.dependencies() {
                if dependency == step.name {
                    anyhow::bail!("Step {} ({}) references itself", index, step.name);
                }
                if !known.contains(dependency) {
                    anyhow::bail!(
                        "Step {} ({}) references {} which is not resolved before it",
                        index,
                        step.name,
                        dependency
                    );
                }
            }

            if !known.insert(step.name.as_str()) {
                anyhow::bail!("Unit {} appears more than once", step.name);
            }
        }

        Ok(())
    }
}

/// Corn, then the exchange wired to Corn, then lending wired to both.
pub fn core_plan() -> DependencyPlan {
    DependencyPlan::new()
        .step(DeploymentStep::new(TOKEN))
        .step(DeploymentStep::new(EXCHANGE).with_unit(TOKEN))
        .step(
            DeploymentStep::new(LENDING)
                .with_unit(EXCHANGE)
                .with_unit(TOKEN),
        )
}

/// Helper units for local testing. Depends on every unit of [`core_plan`].
pub fn auxiliary_plan() -> DependencyPlan {
    DependencyPlan::new()
        .step(
            DeploymentStep::new(PRICE_MOVER)
                .with_unit(EXCHANGE)
                .with_unit(TOKEN),
        )
        .step(
            DeploymentStep::new(FLASH_LOAN_LIQUIDATOR)
                .with_unit(LENDING)
                .with_unit(EXCHANGE)
                .with_unit(TOKEN),
        )
        .step(
            DeploymentStep::new(LEVERAGE)
                .with_unit(LENDING)
                .with_unit(EXCHANGE)
                .with_unit(TOKEN),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{AUXILIARY_UNITS, CORE_UNITS};

    const NONE: [&str; 0] = [];

    #[test]
    fn test_core_plan_is_valid_on_its_own() {
        let plan = core_plan();
        plan.validate(NONE).unwrap();
        assert_eq!(plan.names().collect::<Vec<_>>(), CORE_UNITS.to_vec());
    }

    #[test]
    fn test_auxiliary_plan_needs_core_units() {
        let plan = auxiliary_plan();
        assert!(plan.validate(NONE).is_err());
        plan.validate(CORE_UNITS).unwrap();
        assert_eq!(plan.names().collect::<Vec<_>>(), AUXILIARY_UNITS.to_vec());
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let plan = DependencyPlan::new()
            .step(DeploymentStep::new("A").with_unit("B"))
            .step(DeploymentStep::new("B"));

        let err = plan.validate(NONE).unwrap_err();
        assert!(err.to_string().contains("references B"), "{err}");
    }

    #[test]
    fn test_duplicate_and_self_reference_are_rejected() {
        let duplicate = DependencyPlan::new()
            .step(DeploymentStep::new("A"))
            .step(DeploymentStep::new("A"));
        assert!(duplicate.validate(NONE).is_err());

        let step = DeploymentStep::new("A").with_unit("A");
        let cyclic = DependencyPlan::new().step(step);
        assert!(cyclic.validate(NONE).is_err());
    }

    #[test]
    fn test_core_plan_wiring() {
        let plan = core_plan();
        let deps: Vec<Vec<&str>> = plan
            .steps()
            .iter()
            .map(|step| step.dependencies().collect())
            .collect();

        assert_eq!(deps, vec![vec![], vec![TOKEN], vec![EXCHANGE, TOKEN]]);
    }

    #[test]
    fn test_arg_display() {
        assert_eq!(ConstructorArg::unit(TOKEN).to_string(), "<Corn>");
        assert_eq!(ConstructorArg::Deployer.to_string(), "<deployer>");
        assert_eq!(
            ConstructorArg::Literal(ResolvedArg::Uint(U256::from(7u64))).to_string(),
            "7"
        );
    }
}
