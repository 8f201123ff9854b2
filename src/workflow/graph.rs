// StateGraph - Named stages and the edges between them
use super::state::{PipelineState, StateField, StateUpdate};
use crate::error::StageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One pipeline stage. Stages read the accumulated state and return only the
/// fields they own; they never see or call each other.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn execute(&self, state: &PipelineState) -> Result<StateUpdate, StageError>;

    /// Fields this stage is allowed to write
    fn outputs(&self) -> &'static [StateField];
}

/// Conditional routing function - decides next node, `None` ends the run
pub type RouterFunction = Arc<dyn Fn(&PipelineState) -> Option<String> + Send + Sync>;

/// Edge types
#[derive(Clone)]
pub enum EdgeType {
    /// Fixed edge (always follows this path)
    Fixed(String),
    /// Conditional edge (router function decides)
    Conditional(RouterFunction),
}

impl std::fmt::Debug for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeType::Fixed(target) => write!(f, "Fixed({})", target),
            EdgeType::Conditional(_) => write!(f, "Conditional(<router>)"),
        }
    }
}

/// Graph node
pub struct Node {
    pub id: String,
    pub stage: Arc<dyn Stage>,
    pub description: String,
}

/// StateGraph - The workflow graph. Only constructible through [`StateGraphBuilder`],
/// so every graph in circulation has passed `compile`.
pub struct StateGraph {
    nodes: HashMap<String, Node>,
    /// Edges: node_id -> EdgeType
    edges: HashMap<String, EdgeType>,
    entry_point: String,
}

impl StateGraph {
    /// Validate entry point and fixed edges
    fn compile(
        nodes: HashMap<String, Node>,
        edges: HashMap<String, EdgeType>,
        entry_point: Option<String>,
    ) -> Result<Self, String> {
        let entry_point = entry_point.ok_or("No entry point set")?;
        if !nodes.contains_key(&entry_point) {
            return Err(format!("Entry point node '{}' does not exist", entry_point));
        }

        for (from, edge) in &edges {
            if !nodes.contains_key(from) {
                return Err(format!("Edge from non-existent node: {}", from));
            }
            if let EdgeType::Fixed(to) = edge {
                if !nodes.contains_key(to) {
                    return Err(format!("Edge to non-existent node: {}", to));
                }
            }
        }

        let graph = Self {
            nodes,
            edges,
            entry_point,
        };

        if graph.has_fixed_cycle() {
            return Err("Graph contains a cycle of fixed edges".to_string());
        }

        tracing::debug!("StateGraph compiled: {} nodes, {} edges", graph.nodes.len(), graph.edges.len());
        Ok(graph)
    }

    /// Fixed-edge cycle check. Conditional edges are guarded at runtime by the
    /// executor's iteration cap.
    fn has_fixed_cycle(&self) -> bool {
        for start in self.nodes.keys() {
            let mut current = start.as_str();
            let mut steps = 0;
            while let Some(EdgeType::Fixed(next)) = self.edges.get(current) {
                steps += 1;
                if next == start || steps > self.nodes.len() {
                    return true;
                }
                current = next;
            }
        }
        false
    }

    /// Get next node based on current state
    pub fn get_next_node(&self, current_node: &str, state: &PipelineState) -> Option<String> {
        match self.edges.get(current_node) {
            Some(EdgeType::Fixed(target)) => Some(target.clone()),
            Some(EdgeType::Conditional(router)) => router(state),
            None => None,
        }
    }

    /// Nodes a run starting from `state` is expected to visit, assuming routers
    /// decide on fields already present (such as the mode).
    pub fn planned_path(&self, state: &PipelineState) -> Vec<String> {
        let mut path = vec![self.entry_point.clone()];
        let mut current = self.entry_point.clone();
        while let Some(next) = self.get_next_node(&current, state) {
            if path.len() >= self.nodes.len() || !self.nodes.contains_key(&next) {
                break;
            }
            path.push(next.clone());
            current = next;
        }
        path
    }

    pub fn get_node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Builder pattern for StateGraph
#[derive(Default)]
pub struct StateGraphBuilder {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, EdgeType>,
    entry_point: Option<String>,
}

impl StateGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, id: &str, stage: Arc<dyn Stage>, description: &str) -> Self {
        self.nodes.insert(
            id.to_string(),
            Node {
                id: id.to_string(),
                stage,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.edges.insert(from.to_string(), EdgeType::Fixed(to.to_string()));
        self
    }

    pub fn add_conditional_edge(mut self, from: &str, router: RouterFunction) -> Self {
        self.edges.insert(from.to_string(), EdgeType::Conditional(router));
        self
    }

    pub fn set_entry_point(mut self, node_id: &str) -> Self {
        self.entry_point = Some(node_id.to_string());
        self
    }

    pub fn build(self) -> Result<StateGraph, String> {
        StateGraph::compile(self.nodes, self.edges, self.entry_point)
    }
}
