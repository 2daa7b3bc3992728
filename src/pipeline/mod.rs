mod steps;

pub use steps::{
    EnsureDeployment, EnsureNamespace, EnsureService, FetchSecrets,
    PopulateConfig,
};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::cluster::ClusterFactory;
use crate::context::RunContext;
use crate::error::ProvisionError;

/// One stage of a provisioning run. Metadata mirrors what the invoking host
/// displays to operators; dependencies are resolved locally instead of
/// trusting an external scheduler's string matching.
#[async_trait]
pub trait Step: Send + Sync {
    fn title(&self) -> &'static str;
    fn description(&self) -> &'static str {
        ""
    }
    /// Titles of upstream steps this one must run after.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }
    async fn run(&self, ctx: &mut RunContext) -> Result<(), ProvisionError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("duplicate step title '{0}'")]
    DuplicateTitle(String),

    #[error("dependency cycle involving step '{0}'")]
    Cycle(String),
}

/// An ordered sequence of steps, resolved once from the declared
/// dependencies. Execution is strictly sequential and fail-closed: the
/// first error halts the run and is returned unchanged.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.titles())
            .finish()
    }
}

impl Pipeline {
    /// Resolves the step graph into a linear order. Among steps whose
    /// dependencies are satisfied, registration order is preserved.
    pub fn resolve(
        steps: Vec<Box<dyn Step>>,
    ) -> Result<Self, PipelineError> {
        let n = steps.len();
        let mut index: HashMap<&'static str, usize> = HashMap::with_capacity(n);
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.title(), i).is_some() {
                return Err(PipelineError::DuplicateTitle(
                    step.title().to_string(),
                ));
            }
        }

        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, step) in steps.iter().enumerate() {
            for dep in step.depends_on() {
                let j = *index.get(dep).ok_or_else(|| {
                    PipelineError::UnknownDependency {
                        step: step.title().to_string(),
                        dependency: dep.to_string(),
                    }
                })?;
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while order.len() < n {
            let before = order.len();
            for i in 0..n {
                if !placed[i] && indegree[i] == 0 {
                    placed[i] = true;
                    order.push(i);
                    for &k in &dependents[i] {
                        indegree[k] -= 1;
                    }
                }
            }
            if order.len() == before {
                let stuck = (0..n)
                    .find(|&i| !placed[i])
                    .map(|i| steps[i].title().to_string())
                    .unwrap_or_default();
                return Err(PipelineError::Cycle(stuck));
            }
        }

        let mut slots: Vec<Option<Box<dyn Step>>> =
            steps.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .map(|i| slots[i].take().expect("each slot taken once"))
            .collect();
        Ok(Self { steps: ordered })
    }

    /// Titles in execution order.
    pub fn titles(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.title()).collect()
    }

    pub async fn run(
        &self,
        ctx: &mut RunContext,
    ) -> Result<(), ProvisionError> {
        for step in &self.steps {
            info!(
                step = step.title(),
                description = step.description(),
                "pipeline: step starting"
            );
            if let Err(e) = step.run(ctx).await {
                error!(
                    step = step.title(),
                    error = %e,
                    "pipeline: step failed; halting run"
                );
                return Err(e);
            }
            info!(step = step.title(), "pipeline: step complete");
        }
        Ok(())
    }
}

/// The standard five-step provisioning pipeline.
pub fn standard(
    factory: Arc<dyn ClusterFactory>,
) -> Result<Pipeline, PipelineError> {
    Pipeline::resolve(vec![
        Box::new(FetchSecrets),
        Box::new(PopulateConfig::new(factory)),
        Box::new(EnsureNamespace),
        Box::new(EnsureDeployment),
        Box::new(EnsureService),
    ])
}
