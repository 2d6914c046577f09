//! Sweeping the display through every recorded iteration once.

use crate::client::Context;
use crate::error::ClientError;
use crate::navigator::show;
use crate::session::{DriverKind, Origin};
use crate::solver::SolverClient;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const KIND: DriverKind = DriverKind::Animation;

pub struct AnimationPlayer<S> {
    ctx: Context<S>,
}

impl<S: SolverClient> AnimationPlayer<S> {
    pub(crate) fn new(ctx: Context<S>) -> Self {
        Self { ctx }
    }

    pub async fn is_playing(&self) -> bool {
        self.ctx.session.read().await.animation_running()
    }

    /// Toggles the sweep. Returns whether it is playing afterwards.
    ///
    /// Starting stops the simulation, shows iteration 1 right away and then
    /// the next iteration every animation interval, stopping after the last.
    pub async fn start(&self) -> Result<bool, ClientError> {
        let started = self
            .ctx
            .commit(|s| {
                if s.animation_running() {
                    s.stop_driver();
                    return Ok(None);
                }
                s.require_environment()?;
                if s.total_iterations() == 0 {
                    return Err(ClientError::NoIterations);
                }
                Ok(Some(s.start_driver(KIND)))
            })
            .await?;

        match started {
            Some((epoch, token)) => {
                tokio::spawn(play(self.ctx.clone(), epoch, token));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns whether a running sweep was stopped.
    pub async fn stop(&self) -> bool {
        self.ctx
            .commit(|s| {
                if s.animation_running() {
                    s.stop_driver();
                    Ok(())
                } else {
                    Err(ClientError::Stale)
                }
            })
            .await
            .is_ok()
    }
}

async fn play<S: SolverClient>(ctx: Context<S>, epoch: u64, token: CancellationToken) {
    let origin = Origin::Driver(KIND, epoch);
    let mut ticker = interval(ctx.animation_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next: u32 = 1;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match show(&ctx, next as i64, origin).await {
            Ok(shown) => {
                let total = ctx.session.read().await.total_iterations();
                if shown >= total {
                    info!("Animation finished at iteration {}", shown);
                    ctx.stop_driver_if(KIND, epoch).await;
                    break;
                }
                next = shown + 1;
            }
            // Retried with the same iteration on the next tick.
            Err(ClientError::Busy) => debug!("Animation tick deferred: request in flight"),
            Err(ClientError::Stale) => break,
            Err(e) => {
                warn!("Animation stopped: {}", e);
                ctx.renderer.notify(&format!("Animation stopped: {e}"));
                ctx.stop_driver_if(KIND, epoch).await;
                break;
            }
        }
    }
    debug!("Animation loop (epoch {}) exited", epoch);
}
