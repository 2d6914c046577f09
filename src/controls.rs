//! Which user operations are currently available.
//!
//! Front ends grey out controls from this instead of re-deriving the rules.
//! Anything allowed here may still fail on the network; anything disallowed
//! here would be rejected locally anyway.

use crate::session::SessionState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub can_initialize: bool,
    pub can_run: bool,
    pub can_step: bool,
    pub can_previous: bool,
    pub can_next: bool,
    pub can_go_to: bool,
    /// Start or stop the policy replay.
    pub can_simulate: bool,
    pub can_step_agent: bool,
    /// Start or stop the iteration sweep.
    pub can_animate: bool,
    pub can_reset_agent: bool,
    pub simulation_running: bool,
    pub animation_running: bool,
}

impl Controls {
    pub fn from_state(state: &SessionState) -> Self {
        let initialized = state.environment().is_some();
        let history_free = initialized && !state.history_request_in_flight();
        let total = state.total_iterations();
        let current = state.current_iteration();
        let has_policy = state.snapshot().is_some();
        let simulation_running = state.simulation_running();
        let animation_running = state.animation_running();

        Self {
            can_initialize: true,
            can_run: history_free,
            can_step: history_free && !state.converged(),
            can_previous: history_free && current > 1,
            can_next: history_free && total > 0 && current < total,
            can_go_to: history_free && total > 0,
            can_simulate: simulation_running || has_policy,
            can_step_agent: has_policy
                && state.driver().is_none()
                && !state.agent_request_in_flight(),
            can_animate: animation_running || total > 0,
            can_reset_agent: initialized,
            simulation_running,
            animation_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_config::EnvironmentConfig;
    use crate::session::{DriverKind, Origin};
    use crate::snapshot::test_support::snapshot;

    fn initialized() -> SessionState {
        let env = EnvironmentConfig::default();
        let mut s = SessionState::new();
        let seq = s.begin_initialize();
        s.replace_environment(seq, env.clone(), snapshot(&env, 0))
            .unwrap();
        s
    }

    #[test]
    fn nothing_but_initialize_before_an_environment_exists() {
        let c = Controls::from_state(&SessionState::new());
        assert_eq!(
            c,
            Controls {
                can_initialize: true,
                ..Controls::default()
            }
        );
    }

    #[test]
    fn fresh_environment_can_run_and_step_only() {
        let c = Controls::from_state(&initialized());
        assert!(c.can_run && c.can_step && c.can_reset_agent);
        assert!(!c.can_previous && !c.can_next && !c.can_go_to);
        assert!(!c.can_simulate && !c.can_step_agent && !c.can_animate);
    }

    #[test]
    fn converged_run_disables_stepping_and_bounds_navigation() {
        let env = EnvironmentConfig::default();
        let mut s = initialized();
        let t = s.begin_history(Origin::User).unwrap();
        s.replace_history(t, snapshot(&env, 6), 6).unwrap();

        let c = Controls::from_state(&s);
        assert!(!c.can_step);
        assert!(c.can_previous && !c.can_next && c.can_go_to);
        assert!(c.can_simulate && c.can_step_agent && c.can_animate);

        let t = s.begin_history(Origin::User).unwrap();
        let busy = Controls::from_state(&s);
        assert!(!busy.can_run && !busy.can_go_to && !busy.can_previous);
        s.abandon_history(t);
    }

    #[test]
    fn running_driver_blocks_manual_agent_steps() {
        let env = EnvironmentConfig::default();
        let mut s = initialized();
        let t = s.begin_history(Origin::User).unwrap();
        s.replace_history(t, snapshot(&env, 2), 2).unwrap();
        s.start_driver(DriverKind::Simulation);

        let c = Controls::from_state(&s);
        assert!(c.simulation_running && c.can_simulate);
        assert!(!c.can_step_agent);
    }
}
