//! Replaying the displayed policy with the solver-side agent.

use crate::client::Context;
use crate::env_config::{Cell, EnvironmentConfig};
use crate::error::ClientError;
use crate::protocol::{Request, Response};
use crate::session::{AgentStep, DriverKind, Origin};
use crate::solver::{unexpected, SolverClient};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KIND: DriverKind = DriverKind::Simulation;

pub struct SimulationController<S> {
    ctx: Context<S>,
}

impl<S: SolverClient> SimulationController<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    pub async fn is_running(&self) -> bool {
        self.ctx.session.read().await.simulation_running()
    }

    /// Toggles the replay. Returns whether it is running afterwards.
    ///
    /// Starting stops the animation. The agent then moves once per
    /// simulation interval until it reaches a terminal cell or is stopped.
    pub async fn start(&self) -> Result<bool, ClientError> {
        let started = self
            .ctx
            .commit(|s| {
                if s.simulation_running() {
                    s.stop_driver();
                    return Ok(None);
                }
                s.require_environment()?;
                if s.snapshot().is_none() {
                    return Err(ClientError::NoPolicy);
                }
                Ok(Some(s.start_driver(KIND)))
            })
            .await?;

        match started {
            Some((epoch, token)) => {
                tokio::spawn(drive(self.ctx.clone(), epoch, token));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns whether a running replay was stopped. An in-flight move is
    /// discarded when it arrives.
    pub async fn stop(&self) -> bool {
        self.ctx
            .commit(|s| {
                if s.simulation_running() {
                    s.stop_driver();
                    Ok(())
                } else {
                    Err(ClientError::Stale)
                }
            })
            .await
            .is_ok()
    }

    /// Moves the agent one step along the displayed policy.
    pub async fn step_agent(&self) -> Result<AgentStep, ClientError> {
        advance(&self.ctx, Origin::User).await
    }

    /// Puts the agent back where the solver says it starts.
    pub async fn reset_agent(&self) -> Result<Cell, ClientError> {
        let (ticket, env) = {
            let mut s = self.ctx.session.write().await;
            let ticket = s.begin_agent_reset()?;
            (ticket, s.require_environment()?)
        };

        let cell = match self.reset(&env).await {
            Ok(c) => c,
            Err(e) => {
                self.ctx.session.write().await.abandon_agent_request(ticket);
                return Err(e);
            }
        };
        self.ctx
            .commit(|s| s.apply_agent_reset(ticket, cell))
            .await?;
        Ok(cell)
    }

    async fn reset(&self, env: &EnvironmentConfig) -> Result<Cell, ClientError> {
        match self.ctx.request(Request::ResetAgent).await? {
            Response::AgentReset { state } => in_bounds(env, state),
            other => Err(unexpected("AgentReset", &other)),
        }
    }
}

async fn drive<S: SolverClient>(ctx: Context<S>, epoch: u64, token: CancellationToken) {
    let mut ticker = interval(ctx.simulation_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first move waits one interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match advance(&ctx, Origin::Driver(KIND, epoch)).await {
            Ok(step) if step.done => break,
            Ok(_) => {}
            Err(ClientError::Busy) => debug!("Simulation tick skipped: agent request in flight"),
            Err(ClientError::Stale) => break,
            Err(e) => {
                warn!("Simulation stopped: {}", e);
                ctx.renderer.notify(&format!("Simulation stopped: {e}"));
                ctx.stop_driver_if(KIND, epoch).await;
                break;
            }
        }
    }
    debug!("Simulation loop (epoch {}) exited", epoch);
}

/// One policy move on behalf of `origin`.
async fn advance<S: SolverClient>(
    ctx: &Context<S>,
    origin: Origin,
) -> Result<AgentStep, ClientError> {
    let (ticket, env, request) = {
        let mut s = ctx.session.write().await;
        let env = s.require_environment()?;
        s.check_origin(origin)?;
        if origin == Origin::User && s.driver().is_some() {
            return Err(ClientError::DriverActive);
        }
        let snapshot = s.snapshot().cloned().ok_or(ClientError::NoPolicy)?;
        let position = s.agent_position().unwrap_or(env.start());
        let action = snapshot.action_at(&env, position).ok_or_else(|| {
            ClientError::Contract(format!("no policy entry for {position}"))
        })?;
        let ticket = s.begin_agent_request(origin)?;
        let request = Request::EnvironmentStep {
            iteration: ticket.iteration(),
            state: position,
            action,
        };
        (ticket, env, request)
    };

    let (cell, reward, done) = match moved(ctx, &env, request).await {
        Ok(r) => r,
        Err(e) => {
            ctx.session.write().await.abandon_agent_request(ticket);
            return Err(e);
        }
    };
    let step = ctx
        .commit(|s| s.apply_agent_step(ticket, cell, reward, done))
        .await?;
    if step.stopped {
        info!("Simulation finished at {}", step.position);
    }
    Ok(step)
}

async fn moved<S: SolverClient>(
    ctx: &Context<S>,
    env: &EnvironmentConfig,
    request: Request,
) -> Result<(Cell, f64, bool), ClientError> {
    match ctx.request(request).await? {
        Response::AgentMoved {
            state,
            reward,
            done,
            ..
        } => {
            if !reward.is_finite() {
                return Err(ClientError::Contract("reward is not finite".into()));
            }
            Ok((in_bounds(env, state)?, reward, done))
        }
        other => Err(unexpected("AgentMoved", &other)),
    }
}

fn in_bounds(env: &EnvironmentConfig, cell: Cell) -> Result<Cell, ClientError> {
    env.cell_at(cell.x as i64, cell.y as i64)
        .ok_or_else(|| ClientError::Contract(format!("agent cell {cell} is off the grid")))
}

