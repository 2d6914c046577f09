//! In-process solver and renderer for the integration tests.
#![allow(dead_code)]

use gridmdp::client::GridClient;
use gridmdp::config::ClientConfig;
use gridmdp::env_config::{Action, Cell, EnvironmentConfig, SolverParams};
use gridmdp::error::ClientError;
use gridmdp::hover::ActionValueTable;
use gridmdp::protocol::{EnvironmentEcho, PolicyEntry, Request, Response, SnapshotPayload};
use gridmdp::render::RenderAdapter;
use gridmdp::session::{DriverKind, SessionState};
use gridmdp::solver::SolverClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Client over a fresh [`FakeSolver`] whose runs stop after `max_iterations`.
pub fn client(max_iterations: u32) -> (GridClient<FakeSolver>, Arc<RecordingRenderer>) {
    let mut config = ClientConfig::default();
    config.params.max_iterations = max_iterations;
    let renderer = Arc::new(RecordingRenderer::default());
    let client = GridClient::new(FakeSolver::new(), renderer.clone(), &config);
    (client, renderer)
}

/// Holds one request of a kind until released.
#[derive(Default)]
pub struct Gate {
    arrived: Notify,
    release: Notify,
}

impl Gate {
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct Model {
    env: Option<EnvironmentConfig>,
    params: SolverParams,
    history: Vec<SnapshotPayload>,
    revealed: usize,
}

/// Deterministic value-iteration solver with the grid rules of the real one:
/// leaving the grid or entering a forbidden cell keeps the agent in place
/// with the forbidden reward, entering the target pays the target reward.
#[derive(Default)]
pub struct FakeSolver {
    model: Mutex<Model>,
    calls: Mutex<Vec<&'static str>>,
    fetched: Mutex<Vec<u32>>,
    gates: Mutex<HashMap<&'static str, Arc<Gate>>>,
    overrides: Mutex<HashMap<&'static str, Result<Response, ClientError>>>,
}

impl FakeSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next request of `kind` waits for [`Gate::release`].
    pub fn hold(&self, kind: &'static str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(kind, Arc::clone(&gate));
        gate
    }

    /// The next request of `kind` gets `reply` instead of the real answer.
    pub fn override_next(&self, kind: &'static str, reply: Result<Response, ClientError>) {
        self.overrides.lock().unwrap().insert(kind, reply);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.calls().iter().filter(|k| **k == kind).count()
    }

    /// Iterations requested through `GetIteration`, in order.
    pub fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }

    fn handle(&self, request: Request) -> Response {
        let mut m = self.model.lock().unwrap();
        match request {
            Request::Initialize { env, params, .. } => {
                let mut b = EnvironmentConfig::builder()
                    .size(env.env_size[0] as i64, env.env_size[1] as i64)
                    .start(env.start_state.x as i64, env.start_state.y as i64)
                    .target(env.target_state.x as i64, env.target_state.y as i64)
                    .actions(env.action_space.clone())
                    .rewards(env.rewards)
                    .clear_forbidden();
                for c in &env.forbidden_states {
                    if let Err(e) = b.add_forbidden(c.x as i64, c.y as i64) {
                        return error(e.to_string());
                    }
                }
                let cfg = match b.build() {
                    Ok(cfg) => cfg,
                    Err(e) => return error(e.to_string()),
                };
                let n = cfg.num_states();
                let zeros = vec![vec![0.0; cfg.actions().len()]; n];
                let baseline = payload(&cfg, &vec![0.0; n], &vec![0; n], zeros);
                let echo = EnvironmentEcho {
                    env_size: [cfg.width(), cfg.height()],
                    start_state: cfg.start(),
                    target_state: cfg.target(),
                    forbidden_states: cfg.forbidden().to_vec(),
                    num_states: n,
                    action_space: cfg.actions().to_vec(),
                };
                m.history = value_iteration(&cfg, params);
                m.revealed = 0;
                m.params = params;
                m.env = Some(cfg);
                Response::Initialized {
                    env: echo,
                    snapshot: baseline,
                }
            }
            Request::RunToConvergence => {
                if m.env.is_none() {
                    return error("Environment not initialized");
                }
                m.revealed = m.history.len();
                Response::RunComplete {
                    snapshot: m.history[m.revealed - 1].clone(),
                    total_iterations: m.revealed as u32,
                }
            }
            Request::StepOnce => {
                if m.env.is_none() {
                    return error("Environment not initialized");
                }
                if m.revealed == m.history.len() {
                    return error("Already converged");
                }
                m.revealed += 1;
                let total = m.revealed as u32;
                Response::Stepped {
                    snapshot: m.history[m.revealed - 1].clone(),
                    total_iterations: total,
                    current_iteration: total,
                    converged: m.revealed == m.history.len(),
                }
            }
            Request::GetIteration { iteration } => {
                self.fetched.lock().unwrap().push(iteration);
                let i = iteration as usize;
                if i == 0 || i > m.revealed {
                    return error(format!("Iteration {iteration} not recorded"));
                }
                Response::Iteration {
                    iteration,
                    snapshot: m.history[i - 1].clone(),
                }
            }
            Request::EnvironmentStep { state, action, .. } => {
                let Some(env) = &m.env else {
                    return error("Environment not initialized");
                };
                let (next, reward) = transition(env, state, action);
                Response::AgentMoved {
                    action,
                    reward,
                    state: next,
                    done: next == env.target(),
                }
            }
            Request::ResetAgent => match &m.env {
                Some(env) => Response::AgentReset { state: env.start() },
                None => error("Environment not initialized"),
            },
        }
    }
}

impl SolverClient for FakeSolver {
    async fn call(&self, request: Request) -> Result<Response, ClientError> {
        let kind = request.kind();
        self.calls.lock().unwrap().push(kind);

        // The reply is computed on arrival; a held request only delays delivery.
        let replaced = self.overrides.lock().unwrap().remove(kind);
        let reply = match replaced {
            Some(reply) => reply,
            None => Ok(self.handle(request)),
        };

        let gate = self.gates.lock().unwrap().remove(kind);
        if let Some(gate) = gate {
            gate.arrived.notify_one();
            gate.release.notified().await;
        }
        reply
    }
}

fn error(message: impl Into<String>) -> Response {
    Response::Error {
        message: message.into(),
    }
}

pub fn transition(env: &EnvironmentConfig, state: Cell, action: Action) -> (Cell, f64) {
    let r = env.rewards();
    let [dx, dy] = action.vector();
    let Some(next) = env.cell_at(state.x as i64 + dx as i64, state.y as i64 + dy as i64) else {
        return (state, r.forbidden);
    };
    if next == env.target() {
        (next, r.target)
    } else if env.is_forbidden(next) {
        (state, r.forbidden)
    } else {
        (next, r.step)
    }
}

fn value_iteration(env: &EnvironmentConfig, params: SolverParams) -> Vec<SnapshotPayload> {
    let n = env.num_states();
    let actions = env.actions();
    let mut values = vec![0.0; n];
    let mut history = Vec::new();

    for _ in 0..params.max_iterations.max(1) {
        let q: Vec<Vec<f64>> = (0..n)
            .map(|s| {
                let cell = env.cell_of(s).unwrap();
                actions
                    .iter()
                    .map(|&a| {
                        let (next, reward) = transition(env, cell, a);
                        reward + params.gamma * values[env.state_index(next).unwrap()]
                    })
                    .collect()
            })
            .collect();
        let best: Vec<usize> = q.iter().map(|row| first_max(row)).collect();
        let previous: f64 = values.iter().sum();
        values = q.iter().zip(&best).map(|(row, &b)| row[b]).collect();
        history.push(payload(env, &values, &best, q));

        if (values.iter().sum::<f64>() - previous).abs() < params.theta {
            break;
        }
    }
    history
}

fn first_max(row: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

fn payload(
    env: &EnvironmentConfig,
    values: &[f64],
    best: &[usize],
    q: Vec<Vec<f64>>,
) -> SnapshotPayload {
    let k = env.actions().len();
    SnapshotPayload {
        state_values: values.to_vec(),
        policy: best
            .iter()
            .enumerate()
            .map(|(s, &b)| PolicyEntry {
                state_idx: s,
                best_action_idx: b,
                action: env.actions()[b],
                policy: (0..k).map(|a| if a == b { 1.0 } else { 0.0 }).collect(),
            })
            .collect(),
        action_values: Some(q),
    }
}

/// What the renderer saw on one redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub generation: u64,
    pub iteration: u32,
    pub total: u32,
    pub agent: Option<Cell>,
    pub driver: Option<DriverKind>,
}

#[derive(Default)]
pub struct RecordingRenderer {
    frames: Mutex<Vec<Frame>>,
    notices: Mutex<Vec<String>>,
    overlays: Mutex<Vec<Option<ActionValueTable>>>,
}

impl RecordingRenderer {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn overlays(&self) -> Vec<Option<ActionValueTable>> {
        self.overlays.lock().unwrap().clone()
    }
}

impl RenderAdapter for RecordingRenderer {
    fn redraw(&self, state: &SessionState) {
        self.frames.lock().unwrap().push(Frame {
            generation: state.generation(),
            iteration: state.current_iteration(),
            total: state.total_iterations(),
            agent: state.agent_position(),
            driver: state.driver(),
        });
    }

    fn overlay(&self, table: Option<&ActionValueTable>) {
        self.overlays.lock().unwrap().push(table.cloned());
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}
