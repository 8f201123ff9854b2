// Executor - Runs the stage graph sequentially and merges each stage's output
use super::graph::StateGraph;
use super::state::PipelineState;
use crate::error::{StageError, StoreError};
use async_trait::async_trait;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

/// Receives stage boundaries so callers can publish progress
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// `completed` stages are done out of `planned` for this run
    async fn stage_started(&self, stage: &str, completed: usize, planned: usize) -> Result<(), StoreError>;

    async fn stage_completed(&self, stage: &str, completed: usize, planned: usize) -> Result<(), StoreError>;
}

/// Sink that ignores progress
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn stage_started(&self, _stage: &str, _completed: usize, _planned: usize) -> Result<(), StoreError> {
        Ok(())
    }

    async fn stage_completed(&self, _stage: &str, _completed: usize, _planned: usize) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Failures of the executor itself, as opposed to a stage reporting an error
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("node '{0}' not found in graph")]
    UnknownNode(String),

    #[error("exceeded max iterations: {0}")]
    IterationLimit(usize),

    #[error("failed to record progress: {0}")]
    Progress(#[from] StoreError),
}

/// Workflow executor config
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_iterations: usize,
    /// Per-stage time limit; `None` lets a stage run as long as it needs
    pub stage_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 32,
            stage_timeout: None,
        }
    }
}

/// Workflow executor
pub struct WorkflowExecutor {
    graph: StateGraph,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(graph: StateGraph, config: ExecutorConfig) -> Self {
        Self { graph, config }
    }

    /// Number of stages a run of `state` is expected to execute
    pub fn planned_stages(&self, state: &PipelineState) -> usize {
        self.graph.planned_path(state).len()
    }

    /// Run the graph to the end or to the first stage error.
    ///
    /// A stage error is not an `Err` here: it is recorded on `state.error` and the
    /// run stops without invoking later stages. `Err` is reserved for failures of
    /// the executor itself.
    pub async fn run(
        &self,
        mut state: PipelineState,
        progress: &dyn ProgressSink,
    ) -> Result<PipelineState, ExecutorError> {
        let planned = self.planned_stages(&state);
        info!(job_id = %state.job_id, mode = state.mode.as_str(), planned, "🚀 Starting workflow execution");

        let mut current_node = self.graph.entry_point().to_string();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.config.max_iterations {
                warn!("⚠️ Workflow hit iteration limit: {}", self.config.max_iterations);
                return Err(ExecutorError::IterationLimit(self.config.max_iterations));
            }

            let node = self
                .graph
                .get_node(&current_node)
                .ok_or_else(|| ExecutorError::UnknownNode(current_node.clone()))?;

            info!(job_id = %state.job_id, stage = %node.id, "📍 Step {}: {}", iteration, node.description);
            state.set_current_node(&node.id);
            let done = state.completed_nodes.len();
            progress.stage_started(&node.id, done, planned).await?;

            match self.execute_stage(node, &state).await {
                Ok(mut update) => {
                    let dropped = update.retain_owned(node.stage.outputs());
                    if !dropped.is_empty() {
                        warn!(stage = %node.id, ?dropped, "Stage returned fields it does not own; ignoring them");
                    }
                    state.apply_update(update);
                    state.mark_completed(&node.id);
                    progress
                        .stage_completed(&node.id, state.completed_nodes.len(), planned)
                        .await?;
                }
                Err(e) => {
                    error!(job_id = %state.job_id, stage = %node.id, "❌ Stage failed: {}", e);
                    state.record_failure(&node.id, &e);
                    break;
                }
            }

            match self.graph.get_next_node(&current_node, &state) {
                Some(next) => current_node = next,
                None => {
                    info!("🏁 Reached end node");
                    break;
                }
            }
        }

        info!(
            job_id = %state.job_id,
            failed = state.is_failed(),
            "🎬 Workflow execution finished (iterations: {})",
            iteration
        );
        Ok(state)
    }

    async fn execute_stage(
        &self,
        node: &super::graph::Node,
        state: &PipelineState,
    ) -> Result<super::state::StateUpdate, StageError> {
        match self.config.stage_timeout {
            None => node.stage.execute(state).await,
            Some(limit) => match timeout(limit, node.stage.execute(state)).await {
                Ok(result) => result,
                Err(_) => Err(StageError::UpstreamProvider(format!(
                    "stage '{}' timed out after {}s",
                    node.id,
                    limit.as_secs()
                ))),
            },
        }
    }
}

/// Builder for workflow executor
#[derive(Default)]
pub struct ExecutorBuilder {
    graph: Option<StateGraph>,
    config: ExecutorConfig,
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, graph: StateGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn stage_timeout(mut self, limit: Duration) -> Self {
        self.config.stage_timeout = Some(limit);
        self
    }

    pub fn build(self) -> Result<WorkflowExecutor, String> {
        let graph = self.graph.ok_or("Graph not set")?;
        Ok(WorkflowExecutor::new(graph, self.config))
    }
}
