// Workflow orchestration module - stage graph, sequencing, and merge semantics
pub mod assembler;
pub mod campaign_workflow;
pub mod executor;
pub mod graph;
pub mod router;
pub mod state;

pub use assembler::{assemble, CampaignResult, PipelineOutcome};
pub use campaign_workflow::CampaignWorkflows;
pub use executor::{ExecutorError, ProgressSink, WorkflowExecutor};
pub use state::{CampaignInput, PipelineMode, PipelineState};
