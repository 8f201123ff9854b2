// Router - Conditional routing and decision logic
use super::graph::RouterFunction;
use super::state::{PipelineMode, PipelineState};
use std::sync::Arc;

type Condition = Box<dyn Fn(&PipelineState) -> bool + Send + Sync>;

/// Continue to `target` only for runs in one of `modes`; otherwise end the run.
pub fn mode_router(target: &str, modes: &[PipelineMode]) -> RouterFunction {
    RouterBuilder::new()
        .when(conditions::mode_in(modes.to_vec()), target)
        .build()
}

/// Custom router builder
#[derive(Default)]
pub struct RouterBuilder {
    conditions: Vec<(Condition, String)>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add condition with target node
    pub fn when<F>(mut self, condition: F, target: &str) -> Self
    where
        F: Fn(&PipelineState) -> bool + Send + Sync + 'static,
    {
        self.conditions.push((Box::new(condition), target.to_string()));
        self
    }

    /// First matching condition wins; no match ends the run.
    pub fn build(self) -> RouterFunction {
        Arc::new(move |state: &PipelineState| {
            self.conditions
                .iter()
                .find(|(condition, _)| condition(state))
                .map(|(_, target)| target.clone())
        })
    }
}

/// Predefined condition helpers
pub mod conditions {
    use super::*;

    pub fn mode_in(modes: Vec<PipelineMode>) -> impl Fn(&PipelineState) -> bool + Send + Sync {
        move |state: &PipelineState| modes.contains(&state.mode)
    }
}
