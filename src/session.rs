//! The single source of truth for what the client displays.
//!
//! Every actor reads [`SessionState`] and submits whole replacements through
//! the commit methods below. A commit carries the ticket handed out when its
//! request began; the ticket is rejected with [`ClientError::Stale`] when
//!
//! - the environment was re-initialized since (dead generation),
//! - the request slot it held was released or taken over, or
//! - it was issued by a driver that has been stopped since.
//!
//! Rejected commits leave the state untouched.

use crate::env_config::{Cell, EnvironmentConfig};
use crate::error::ClientError;
use crate::snapshot::SolverSnapshot;
use hashbrown::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub type SharedSession = Arc<RwLock<SessionState>>;

/// The two scheduled actors that may own the agent/iteration display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Simulation,
    Animation,
}

impl DriverKind {
    pub fn label(self) -> &'static str {
        match self {
            DriverKind::Simulation => "simulation",
            DriverKind::Animation => "animation",
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveDriver {
    kind: DriverKind,
    epoch: u64,
    token: CancellationToken,
}

/// Who issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A direct user action. Its commit stops any running driver.
    User,
    /// A scheduled tick. Its commit requires the driver to still be running.
    Driver(DriverKind, u64),
}

/// Proof that a history request (navigate / step / run) may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    seq: u64,
    origin: Origin,
    total_at_begin: u32,
}

impl Ticket {
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// `totalIterations` when the request began.
    pub fn total_at_begin(&self) -> u32 {
        self.total_at_begin
    }
}

/// Proof that an agent request (environment step / reset) may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTicket {
    generation: u64,
    seq: u64,
    origin: Origin,
    iteration: u32,
}

impl AgentTicket {
    /// Iteration whose policy the request uses.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }
}

/// Result of applying one agent move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStep {
    pub position: Cell,
    pub reward: f64,
    pub done: bool,
    /// The move ended a running simulation.
    pub stopped: bool,
}

#[derive(Debug, Default)]
pub struct SessionState {
    env: Option<Arc<EnvironmentConfig>>,
    generation: u64,
    seq: u64,
    pending_init: Option<u64>,

    baseline: Option<Arc<SolverSnapshot>>,
    total_iterations: u32,
    current_iteration: u32,
    displayed: Option<Arc<SolverSnapshot>>,
    cache: HashMap<u32, Arc<SolverSnapshot>>,
    converged: bool,

    agent: Option<Cell>,
    trajectory: Vec<Cell>,
    last_reward: Option<f64>,

    driver: Option<ActiveDriver>,
    driver_epoch: u64,

    history_slot: Option<u64>,
    agent_slot: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSession {
        Arc::new(RwLock::new(Self::new()))
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn environment(&self) -> Option<&Arc<EnvironmentConfig>> {
        self.env.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn total_iterations(&self) -> u32 {
        self.total_iterations
    }

    /// 0 means no recorded iteration is displayed.
    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    /// Snapshot of the displayed iteration.
    pub fn snapshot(&self) -> Option<&Arc<SolverSnapshot>> {
        self.displayed.as_ref()
    }

    /// What the renderer draws: the displayed iteration, else the baseline
    /// returned by initialize.
    pub fn drawn_snapshot(&self) -> Option<&Arc<SolverSnapshot>> {
        self.displayed.as_ref().or(self.baseline.as_ref())
    }

    pub fn cached(&self, iteration: u32) -> Option<&Arc<SolverSnapshot>> {
        self.cache.get(&iteration)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn agent_position(&self) -> Option<Cell> {
        self.agent
    }

    pub fn trajectory(&self) -> &[Cell] {
        &self.trajectory
    }

    pub fn last_reward(&self) -> Option<f64> {
        self.last_reward
    }

    pub fn driver(&self) -> Option<DriverKind> {
        self.driver.as_ref().map(|d| d.kind)
    }

    pub fn simulation_running(&self) -> bool {
        self.driver() == Some(DriverKind::Simulation)
    }

    pub fn animation_running(&self) -> bool {
        self.driver() == Some(DriverKind::Animation)
    }

    pub fn history_request_in_flight(&self) -> bool {
        self.history_slot.is_some()
    }

    pub fn agent_request_in_flight(&self) -> bool {
        self.agent_slot.is_some()
    }

    pub fn require_environment(&self) -> Result<Arc<EnvironmentConfig>, ClientError> {
        self.env.clone().ok_or(ClientError::NotInitialized)
    }

    // ── Environment ──────────────────────────────────────────────────────

    /// Marks an initialize as the newest one; earlier ones in flight lose.
    pub fn begin_initialize(&mut self) -> u64 {
        self.seq += 1;
        self.pending_init = Some(self.seq);
        self.seq
    }

    pub fn abandon_initialize(&mut self, seq: u64) {
        if self.pending_init == Some(seq) {
            self.pending_init = None;
        }
    }

    /// Replaces the environment and everything derived from it.
    pub fn replace_environment(
        &mut self,
        seq: u64,
        env: EnvironmentConfig,
        baseline: SolverSnapshot,
    ) -> Result<(), ClientError> {
        if self.pending_init != Some(seq) {
            return Err(ClientError::Stale);
        }
        self.stop_driver();

        let start = env.start();
        self.generation += 1;
        self.pending_init = None;
        self.env = Some(Arc::new(env));
        self.baseline = Some(Arc::new(baseline));
        self.total_iterations = 0;
        self.current_iteration = 0;
        self.displayed = None;
        self.cache.clear();
        self.converged = false;
        self.agent = Some(start);
        self.trajectory = vec![start];
        self.last_reward = None;
        self.history_slot = None;
        self.agent_slot = None;
        info!("Environment replaced (generation {})", self.generation);
        Ok(())
    }

    // ── History (navigate / step / run) ─────────────────────────────────

    pub fn begin_history(&mut self, origin: Origin) -> Result<Ticket, ClientError> {
        if self.env.is_none() {
            return Err(ClientError::NotInitialized);
        }
        self.check_origin(origin)?;
        if self.history_slot.is_some() {
            return Err(ClientError::Busy);
        }
        self.seq += 1;
        self.history_slot = Some(self.seq);
        Ok(Ticket {
            generation: self.generation,
            seq: self.seq,
            origin,
            total_at_begin: self.total_iterations,
        })
    }

    /// Releases the slot after a failed request.
    pub fn abandon_history(&mut self, ticket: Ticket) {
        if self.history_slot == Some(ticket.seq) && ticket.generation == self.generation {
            self.history_slot = None;
        }
    }

    /// Shows an already recorded iteration.
    pub fn display_iteration(
        &mut self,
        ticket: Ticket,
        snapshot: Arc<SolverSnapshot>,
    ) -> Result<(), ClientError> {
        self.admit(ticket)?;
        let n = snapshot.iteration();
        if n == 0 || n > self.total_iterations {
            self.history_slot = None;
            return Err(ClientError::OutOfRange {
                requested: n as i64,
                total: self.total_iterations,
            });
        }
        self.cache.insert(n, Arc::clone(&snapshot));
        self.show(ticket, snapshot);
        Ok(())
    }

    /// Appends one iteration produced by a single solver step.
    pub fn extend_history(
        &mut self,
        ticket: Ticket,
        snapshot: SolverSnapshot,
        converged: bool,
    ) -> Result<(), ClientError> {
        self.admit(ticket)?;
        let expected = ticket.total_at_begin + 1;
        if snapshot.iteration() != expected || self.total_iterations != ticket.total_at_begin {
            self.history_slot = None;
            return Err(ClientError::Contract(format!(
                "step produced iteration {}, expected {expected}",
                snapshot.iteration()
            )));
        }
        let snapshot = Arc::new(snapshot);
        self.total_iterations = expected;
        self.converged = converged;
        self.cache.insert(expected, Arc::clone(&snapshot));
        self.show(ticket, snapshot);
        Ok(())
    }

    /// Replaces the whole history with a fresh run of `total` iterations whose
    /// last snapshot is `last`.
    pub fn replace_history(
        &mut self,
        ticket: Ticket,
        last: SolverSnapshot,
        total: u32,
    ) -> Result<(), ClientError> {
        self.admit(ticket)?;
        if total == 0 || last.iteration() != total {
            self.history_slot = None;
            return Err(ClientError::Contract(format!(
                "run reported {total} iterations but returned iteration {}",
                last.iteration()
            )));
        }
        let last = Arc::new(last);
        self.cache.clear();
        self.cache.insert(total, Arc::clone(&last));
        self.total_iterations = total;
        self.converged = true;
        self.show(ticket, last);
        Ok(())
    }

    fn admit(&mut self, ticket: Ticket) -> Result<(), ClientError> {
        let live = ticket.generation == self.generation && self.history_slot == Some(ticket.seq);
        if !live {
            debug!("Discarding history response (seq {})", ticket.seq);
            return Err(ClientError::Stale);
        }
        if let Err(e) = self.check_origin(ticket.origin) {
            self.history_slot = None;
            return Err(e);
        }
        Ok(())
    }

    fn show(&mut self, ticket: Ticket, snapshot: Arc<SolverSnapshot>) {
        if ticket.origin == Origin::User {
            self.stop_driver();
        }
        self.current_iteration = snapshot.iteration();
        self.displayed = Some(snapshot);
        self.history_slot = None;
        self.reset_agent_to_start();
    }

    fn reset_agent_to_start(&mut self) {
        if let Some(env) = &self.env {
            let start = env.start();
            self.agent = Some(start);
            self.trajectory = vec![start];
        }
        self.last_reward = None;
        // The policy changed underneath any in-flight move.
        self.agent_slot = None;
    }

    // ── Agent (environment step / reset) ────────────────────────────────

    pub fn begin_agent_request(&mut self, origin: Origin) -> Result<AgentTicket, ClientError> {
        if self.env.is_none() {
            return Err(ClientError::NotInitialized);
        }
        self.check_origin(origin)?;
        if self.agent_slot.is_some() {
            return Err(ClientError::Busy);
        }
        self.seq += 1;
        self.agent_slot = Some(self.seq);
        Ok(AgentTicket {
            generation: self.generation,
            seq: self.seq,
            origin,
            iteration: self.current_iteration,
        })
    }

    /// Takes the agent slot for a user reset. A running simulation is stopped
    /// and any move still in flight is orphaned.
    pub fn begin_agent_reset(&mut self) -> Result<AgentTicket, ClientError> {
        if self.env.is_none() {
            return Err(ClientError::NotInitialized);
        }
        if self.simulation_running() {
            self.stop_driver();
        }
        self.agent_slot = None;
        self.begin_agent_request(Origin::User)
    }

    pub fn abandon_agent_request(&mut self, ticket: AgentTicket) {
        if self.agent_slot == Some(ticket.seq) && ticket.generation == self.generation {
            self.agent_slot = None;
        }
    }

    fn admit_agent(&mut self, ticket: AgentTicket) -> Result<(), ClientError> {
        let live = ticket.generation == self.generation
            && self.agent_slot == Some(ticket.seq)
            && ticket.iteration == self.current_iteration;
        if !live {
            debug!("Discarding agent response (seq {})", ticket.seq);
            return Err(ClientError::Stale);
        }
        if let Err(e) = self.check_origin(ticket.origin) {
            self.agent_slot = None;
            return Err(e);
        }
        Ok(())
    }

    pub fn apply_agent_step(
        &mut self,
        ticket: AgentTicket,
        position: Cell,
        reward: f64,
        done: bool,
    ) -> Result<AgentStep, ClientError> {
        self.admit_agent(ticket)?;
        self.agent_slot = None;
        self.agent = Some(position);
        self.trajectory.push(position);
        self.last_reward = Some(reward);

        let stopped = done && self.simulation_running();
        if stopped {
            self.stop_driver();
            info!("Agent reached a terminal cell at {}", position);
        }
        Ok(AgentStep {
            position,
            reward,
            done,
            stopped,
        })
    }

    pub fn apply_agent_reset(
        &mut self,
        ticket: AgentTicket,
        position: Cell,
    ) -> Result<(), ClientError> {
        self.admit_agent(ticket)?;
        if self.simulation_running() {
            self.stop_driver();
        }
        self.agent_slot = None;
        self.agent = Some(position);
        self.trajectory = vec![position];
        self.last_reward = None;
        Ok(())
    }

    // ── Drivers ──────────────────────────────────────────────────────────

    /// Hands the display to `kind`, stopping whichever driver held it.
    pub fn start_driver(&mut self, kind: DriverKind) -> (u64, CancellationToken) {
        self.stop_driver();
        self.driver_epoch += 1;
        let token = CancellationToken::new();
        self.driver = Some(ActiveDriver {
            kind,
            epoch: self.driver_epoch,
            token: token.clone(),
        });
        info!("{} started (epoch {})", kind.label(), self.driver_epoch);
        (self.driver_epoch, token)
    }

    /// Stops the active driver, if any; returns which one was stopped.
    pub fn stop_driver(&mut self) -> Option<DriverKind> {
        let d = self.driver.take()?;
        d.token.cancel();
        info!("{} stopped (epoch {})", d.kind.label(), d.epoch);
        Some(d.kind)
    }

    /// Stops the driver only if it is `kind` with `epoch`.
    pub fn stop_driver_if(&mut self, kind: DriverKind, epoch: u64) -> bool {
        if self.driver_alive(kind, epoch) {
            self.stop_driver();
            true
        } else {
            false
        }
    }

    pub fn driver_alive(&self, kind: DriverKind, epoch: u64) -> bool {
        self.driver
            .as_ref()
            .is_some_and(|d| d.kind == kind && d.epoch == epoch)
    }

    /// `Stale` for a driver origin whose driver has been stopped.
    pub fn check_origin(&self, origin: Origin) -> Result<(), ClientError> {
        match origin {
            Origin::User => Ok(()),
            Origin::Driver(kind, epoch) if self.driver_alive(kind, epoch) => Ok(()),
            Origin::Driver(..) => Err(ClientError::Stale),
        }
    }
}
