//! Advancing the solver: one iteration at a time or straight to convergence.

use crate::client::Context;
use crate::env_config::EnvironmentConfig;
use crate::error::ClientError;
use crate::protocol::{Request, Response};
use crate::session::{Origin, Ticket};
use crate::snapshot::SolverSnapshot;
use crate::solver::{unexpected, SolverClient};
use tracing::info;

/// Outcome of a successful [`StepRunner::step_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub iteration: u32,
    pub converged: bool,
}

pub struct StepRunner<S> {
    ctx: Context<S>,
}

impl<S: SolverClient> StepRunner<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Records and displays exactly one more iteration.
    pub async fn step_once(&self) -> Result<StepOutcome, ClientError> {
        let (ticket, env) = {
            let mut s = self.ctx.session.write().await;
            let env = s.require_environment()?;
            if s.converged() {
                return Err(ClientError::Converged(s.total_iterations()));
            }
            (s.begin_history(Origin::User)?, env)
        };

        let (snapshot, converged) = match self.stepped(&env, ticket).await {
            Ok(r) => r,
            Err(e) => {
                self.ctx.session.write().await.abandon_history(ticket);
                return Err(e);
            }
        };
        let iteration = snapshot.iteration();
        self.ctx
            .commit(|s| s.extend_history(ticket, snapshot, converged))
            .await?;
        if converged {
            info!("Converged after {} iterations", iteration);
        }
        Ok(StepOutcome {
            iteration,
            converged,
        })
    }

    /// Replaces the recorded history with a complete run and displays its
    /// last iteration. Returns the number of iterations.
    pub async fn run_to_convergence(&self) -> Result<u32, ClientError> {
        let (ticket, env) = {
            let mut s = self.ctx.session.write().await;
            let env = s.require_environment()?;
            (s.begin_history(Origin::User)?, env)
        };

        let (snapshot, total) = match self.ran(&env).await {
            Ok(r) => r,
            Err(e) => {
                self.ctx.session.write().await.abandon_history(ticket);
                return Err(e);
            }
        };
        self.ctx
            .commit(|s| s.replace_history(ticket, snapshot, total))
            .await?;
        info!("Run finished after {} iterations", total);
        Ok(total)
    }

    async fn stepped(
        &self,
        env: &EnvironmentConfig,
        ticket: Ticket,
    ) -> Result<(SolverSnapshot, bool), ClientError> {
        match self.ctx.request(Request::StepOnce).await? {
            Response::Stepped {
                snapshot,
                total_iterations,
                current_iteration,
                converged,
            } => {
                let expected = ticket.total_at_begin() + 1;
                if total_iterations != expected || current_iteration != total_iterations {
                    return Err(ClientError::Contract(format!(
                        "step reported iteration {current_iteration} of {total_iterations}, expected {expected}"
                    )));
                }
                let snapshot = SolverSnapshot::from_payload(total_iterations, snapshot, env)?;
                Ok((snapshot, converged))
            }
            other => Err(unexpected("Stepped", &other)),
        }
    }

    async fn ran(&self, env: &EnvironmentConfig) -> Result<(SolverSnapshot, u32), ClientError> {
        match self.ctx.request(Request::RunToConvergence).await? {
            Response::RunComplete {
                snapshot,
                total_iterations,
            } => {
                if total_iterations == 0 {
                    return Err(ClientError::Contract(
                        "run reported zero iterations".into(),
                    ));
                }
                let snapshot = SolverSnapshot::from_payload(total_iterations, snapshot, env)?;
                Ok((snapshot, total_iterations))
            }
            other => Err(unexpected("RunComplete", &other)),
        }
    }
}
