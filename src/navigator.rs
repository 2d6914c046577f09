//! Moving the display between recorded iterations.

use crate::client::Context;
use crate::env_config::EnvironmentConfig;
use crate::error::ClientError;
use crate::protocol::{Request, Response};
use crate::session::Origin;
use crate::snapshot::SolverSnapshot;
use crate::solver::{unexpected, SolverClient};
use std::sync::Arc;
use tracing::debug;

pub struct Navigator<S> {
    ctx: Context<S>,
}

impl<S: SolverClient> Navigator<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    /// Shows iteration `n`, fetching it if it is not cached. Stops any driver
    /// and puts the agent back on the start cell.
    pub async fn go_to(&self, n: i64) -> Result<u32, ClientError> {
        show(&self.ctx, n, Origin::User).await
    }

    /// `Ok(None)` when already at the first iteration or nothing is recorded.
    pub async fn previous(&self) -> Result<Option<u32>, ClientError> {
        let current = self.ctx.session.read().await.current_iteration();
        if current <= 1 {
            return Ok(None);
        }
        self.go_to(current as i64 - 1).await.map(Some)
    }

    /// `Ok(None)` when already at the last iteration or nothing is recorded.
    pub async fn next(&self) -> Result<Option<u32>, ClientError> {
        let (current, total) = {
            let s = self.ctx.session.read().await;
            (s.current_iteration(), s.total_iterations())
        };
        if current >= total {
            return Ok(None);
        }
        self.go_to(current as i64 + 1).await.map(Some)
    }
}

/// Parses an iteration number typed by the user.
pub fn parse_target(text: &str) -> Result<i64, ClientError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ClientError::InvalidIteration(text.to_string()))
}

/// Displays iteration `n` on behalf of `origin`. Shared with the animation
/// driver.
pub(crate) async fn show<S: SolverClient>(
    ctx: &Context<S>,
    n: i64,
    origin: Origin,
) -> Result<u32, ClientError> {
    let (ticket, cached, env) = {
        let mut s = ctx.session.write().await;
        let env = s.require_environment()?;
        s.check_origin(origin)?;
        let total = s.total_iterations();
        if n < 1 || n > total as i64 {
            return Err(ClientError::OutOfRange {
                requested: n,
                total,
            });
        }
        let ticket = s.begin_history(origin)?;
        (ticket, s.cached(n as u32).cloned(), env)
    };
    let n = n as u32;

    let snapshot = match cached {
        Some(snapshot) => {
            debug!("Iteration {} served from cache", n);
            snapshot
        }
        None => match fetch(ctx, &env, n).await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                ctx.session.write().await.abandon_history(ticket);
                return Err(e);
            }
        },
    };
    ctx.commit(|s| s.display_iteration(ticket, snapshot)).await?;
    Ok(n)
}

async fn fetch<S: SolverClient>(
    ctx: &Context<S>,
    env: &EnvironmentConfig,
    n: u32,
) -> Result<SolverSnapshot, ClientError> {
    match ctx.request(Request::GetIteration { iteration: n }).await? {
        Response::Iteration {
            iteration,
            snapshot,
        } if iteration == n => SolverSnapshot::from_payload(n, snapshot, env),
        Response::Iteration { iteration, .. } => Err(ClientError::Contract(format!(
            "asked for iteration {n}, got {iteration}"
        ))),
        other => Err(unexpected("Iteration", &other)),
    }
}
