//! Entry point that owns the session, the solver and the renderer.

use crate::animation::AnimationPlayer;
use crate::config::ClientConfig;
use crate::controls::Controls;
use crate::env_config::{Algorithm, EnvironmentConfig, SolverParams};
use crate::error::ClientError;
use crate::hover::{self, ActionValueTable};
use crate::navigator::Navigator;
use crate::protocol::{EnvironmentEcho, EnvironmentSpec, Request, Response};
use crate::render::RenderAdapter;
use crate::session::{DriverKind, SessionState, SharedSession};
use crate::simulation::SimulationController;
use crate::snapshot::SolverSnapshot;
use crate::solver::{exchange, unexpected, SolverClient};
use crate::step_runner::StepRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Handles shared by every component and every spawned driver.
pub(crate) struct Context<S> {
    pub(crate) solver: Arc<S>,
    pub(crate) renderer: Arc<dyn RenderAdapter>,
    pub(crate) session: SharedSession,
    pub(crate) simulation_interval: Duration,
    pub(crate) animation_interval: Duration,
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Self {
            solver: Arc::clone(&self.solver),
            renderer: Arc::clone(&self.renderer),
            session: Arc::clone(&self.session),
            simulation_interval: self.simulation_interval,
            animation_interval: self.animation_interval,
        }
    }
}

impl<S: SolverClient> Context<S> {
    /// Applies `f` under the write lock and redraws from the committed state
    /// if it succeeded.
    pub(crate) async fn commit<T>(
        &self,
        f: impl FnOnce(&mut SessionState) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let mut guard = self.session.write().await;
        let out = f(&mut guard);
        let guard = guard.downgrade();
        if out.is_ok() {
            self.renderer.redraw(&guard);
        }
        out
    }

    pub(crate) async fn request(&self, request: Request) -> Result<Response, ClientError> {
        exchange(&*self.solver, request).await
    }

    /// Stops `kind` if it is still the driver started at `epoch`. Redraws
    /// only when it was.
    pub(crate) async fn stop_driver_if(&self, kind: DriverKind, epoch: u64) -> bool {
        let mut guard = self.session.write().await;
        let stopped = guard.stop_driver_if(kind, epoch);
        let guard = guard.downgrade();
        if stopped {
            self.renderer.redraw(&guard);
        }
        stopped
    }
}

pub struct GridClient<S> {
    ctx: Context<S>,
    params: SolverParams,
}

impl<S: SolverClient> GridClient<S> {
    pub fn new(solver: S, renderer: Arc<dyn RenderAdapter>, config: &ClientConfig) -> Self {
        Self {
            ctx: Context {
                solver: Arc::new(solver),
                renderer,
                session: SessionState::shared(),
                simulation_interval: config.simulation_interval(),
                animation_interval: config.animation_interval(),
            },
            params: config.params,
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.ctx.session)
    }

    pub fn solver(&self) -> &S {
        &self.ctx.solver
    }

    pub fn params(&self) -> SolverParams {
        self.params
    }

    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    pub fn navigator(&self) -> Navigator<S> {
        Navigator::new(self.ctx.clone())
    }

    pub fn step_runner(&self) -> StepRunner<S> {
        StepRunner::new(self.ctx.clone())
    }

    pub fn simulation(&self) -> SimulationController<S> {
        SimulationController::new(self.ctx.clone())
    }

    pub fn animation(&self) -> AnimationPlayer<S> {
        AnimationPlayer::new(self.ctx.clone())
    }

    pub async fn controls(&self) -> Controls {
        Controls::from_state(&*self.ctx.session.read().await)
    }

    /// Action values under grid cell `(x, y)`; also pushed to the renderer's
    /// overlay.
    pub async fn hover(&self, x: i64, y: i64) -> Option<ActionValueTable> {
        let table = hover::inspect(&*self.ctx.session.read().await, x, y);
        self.ctx.renderer.overlay(table.as_ref());
        table
    }

    /// Replaces the solver's environment and resets every derived piece of
    /// state. Running drivers are stopped before the request goes out.
    pub async fn initialize(
        &self,
        env: EnvironmentConfig,
        algorithm: Algorithm,
    ) -> Result<(), ClientError> {
        let seq = {
            let mut s = self.ctx.session.write().await;
            s.stop_driver();
            s.begin_initialize()
        };
        info!(
            "Initializing {}x{} grid with {}",
            env.width(),
            env.height(),
            algorithm.label()
        );

        let request = Request::Initialize {
            env: EnvironmentSpec::from(&env),
            algorithm,
            params: self.params,
        };
        let baseline = match self.initialized(&env, request).await {
            Ok(b) => b,
            Err(e) => {
                self.ctx.session.write().await.abandon_initialize(seq);
                return Err(e);
            }
        };
        self.ctx
            .commit(|s| s.replace_environment(seq, env, baseline))
            .await
    }

    async fn initialized(
        &self,
        env: &EnvironmentConfig,
        request: Request,
    ) -> Result<SolverSnapshot, ClientError> {
        match self.ctx.request(request).await? {
            Response::Initialized { env: echo, snapshot } => {
                check_echo(env, &echo)?;
                SolverSnapshot::from_payload(0, snapshot, env)
            }
            other => Err(unexpected("Initialized", &other)),
        }
    }
}

fn check_echo(env: &EnvironmentConfig, echo: &EnvironmentEcho) -> Result<(), ClientError> {
    let mut forbidden = echo.forbidden_states.clone();
    forbidden.sort_by_key(|c| (c.y, c.x));

    let matches = echo.env_size == [env.width(), env.height()]
        && echo.start_state == env.start()
        && echo.target_state == env.target()
        && forbidden == env.forbidden()
        && echo.num_states == env.num_states()
        && echo.action_space == env.actions();
    if matches {
        Ok(())
    } else {
        Err(ClientError::Contract(
            "solver echoed a different environment".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_config::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Offline;

    impl SolverClient for Offline {
        async fn call(&self, _request: Request) -> Result<Response, ClientError> {
            Err(ClientError::Transport("offline".into()))
        }
    }

    #[derive(Default)]
    struct CountingRenderer(AtomicUsize);

    impl RenderAdapter for CountingRenderer {
        fn redraw(&self, _state: &SessionState) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context(renderer: Arc<CountingRenderer>) -> Context<Offline> {
        Context {
            solver: Arc::new(Offline),
            renderer,
            session: SessionState::shared(),
            simulation_interval: Duration::from_millis(500),
            animation_interval: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn stopping_a_replaced_driver_changes_nothing_and_draws_nothing() {
        let renderer = Arc::new(CountingRenderer::default());
        let ctx = context(Arc::clone(&renderer));
        let (old, _) = ctx.session.write().await.start_driver(DriverKind::Animation);
        let (epoch, token) = ctx.session.write().await.start_driver(DriverKind::Simulation);

        assert!(!ctx.stop_driver_if(DriverKind::Animation, old).await);
        assert!(!ctx.stop_driver_if(DriverKind::Simulation, old).await);
        assert_eq!(renderer.0.load(Ordering::SeqCst), 0);
        assert_eq!(
            ctx.session.read().await.driver(),
            Some(DriverKind::Simulation)
        );

        assert!(ctx.stop_driver_if(DriverKind::Simulation, epoch).await);
        assert!(token.is_cancelled());
        assert_eq!(renderer.0.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.session.read().await.driver(), None);

        assert!(!ctx.stop_driver_if(DriverKind::Simulation, epoch).await);
        assert_eq!(renderer.0.load(Ordering::SeqCst), 1);
    }

    fn echo_of(env: &EnvironmentConfig) -> EnvironmentEcho {
        EnvironmentEcho {
            env_size: [env.width(), env.height()],
            start_state: env.start(),
            target_state: env.target(),
            forbidden_states: env.forbidden().iter().rev().copied().collect(),
            num_states: env.num_states(),
            action_space: env.actions().to_vec(),
        }
    }

    #[test]
    fn echo_order_of_forbidden_cells_does_not_matter() {
        let env = EnvironmentConfig::default();
        assert!(check_echo(&env, &echo_of(&env)).is_ok());
    }

    #[test]
    fn echo_mismatch_is_a_contract_violation() {
        let env = EnvironmentConfig::default();
        let mut echo = echo_of(&env);
        echo.target_state = Cell::new(3, 4);
        assert!(matches!(
            check_echo(&env, &echo),
            Err(ClientError::Contract(_))
        ));

        let mut echo = echo_of(&env);
        echo.num_states = 24;
        assert!(check_echo(&env, &echo).is_err());
    }
}
