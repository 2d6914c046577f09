//! Wire records exchanged with the solver.
//!
//! One JSON object per line in each direction, tagged by `"type"`.

use crate::env_config::{Action, Algorithm, Cell, EnvironmentConfig, RewardSchedule, SolverParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Replace the solver's environment and algorithm.
    Initialize {
        #[serde(flatten)]
        env: EnvironmentSpec,
        algorithm: Algorithm,
        #[serde(default)]
        params: SolverParams,
    },
    RunToConvergence,
    StepOnce,
    GetIteration {
        iteration: u32,
    },
    /// Move the solver-side agent one step using the policy of `iteration`.
    EnvironmentStep {
        iteration: u32,
        state: Cell,
        action: Action,
    },
    ResetAgent,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Initialize { .. } => "Initialize",
            Request::RunToConvergence => "RunToConvergence",
            Request::StepOnce => "StepOnce",
            Request::GetIteration { .. } => "GetIteration",
            Request::EnvironmentStep { .. } => "EnvironmentStep",
            Request::ResetAgent => "ResetAgent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Initialized {
        env: EnvironmentEcho,
        #[serde(flatten)]
        snapshot: SnapshotPayload,
    },
    RunComplete {
        #[serde(flatten)]
        snapshot: SnapshotPayload,
        total_iterations: u32,
    },
    Stepped {
        #[serde(flatten)]
        snapshot: SnapshotPayload,
        total_iterations: u32,
        current_iteration: u32,
        converged: bool,
    },
    Iteration {
        iteration: u32,
        #[serde(flatten)]
        snapshot: SnapshotPayload,
    },
    AgentMoved {
        action: Action,
        reward: f64,
        state: Cell,
        done: bool,
    },
    AgentReset {
        state: Cell,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Initialized { .. } => "Initialized",
            Response::RunComplete { .. } => "RunComplete",
            Response::Stepped { .. } => "Stepped",
            Response::Iteration { .. } => "Iteration",
            Response::AgentMoved { .. } => "AgentMoved",
            Response::AgentReset { .. } => "AgentReset",
            Response::Error { .. } => "Error",
        }
    }
}

/// Environment as the solver expects it in `Initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub env_size: [u32; 2],
    pub start_state: Cell,
    pub target_state: Cell,
    #[serde(default)]
    pub forbidden_states: Vec<Cell>,
    pub action_space: Vec<Action>,
    #[serde(default)]
    pub rewards: RewardSchedule,
}

impl From<&EnvironmentConfig> for EnvironmentSpec {
    fn from(cfg: &EnvironmentConfig) -> Self {
        Self {
            env_size: [cfg.width(), cfg.height()],
            start_state: cfg.start(),
            target_state: cfg.target(),
            forbidden_states: cfg.forbidden().to_vec(),
            action_space: cfg.actions().to_vec(),
            rewards: cfg.rewards(),
        }
    }
}

/// Environment echoed back by `Initialized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentEcho {
    pub env_size: [u32; 2],
    pub start_state: Cell,
    pub target_state: Cell,
    #[serde(default)]
    pub forbidden_states: Vec<Cell>,
    pub num_states: usize,
    pub action_space: Vec<Action>,
}

/// Values + policy (+ action values) for one iteration, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub state_values: Vec<f64>,
    pub policy: Vec<PolicyEntry>,
    #[serde(default)]
    pub action_values: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub state_idx: usize,
    pub best_action_idx: usize,
    pub action: Action,
    /// Per-action probabilities, when the solver sends them.
    #[serde(default)]
    pub policy: Vec<f64>,
}
