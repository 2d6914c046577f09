//! Validated per-iteration solver output.

use crate::env_config::{Action, Cell, EnvironmentConfig};
use crate::error::ClientError;
use crate::protocol::SnapshotPayload;

/// Values, greedy policy and optional action values for one iteration.
///
/// Iteration 0 is the baseline the solver returns on initialize; recorded
/// iterations start at 1. Snapshots are replaced, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSnapshot {
    iteration: u32,
    values: Vec<f64>,
    policy: Vec<Action>,
    action_values: Option<Vec<Vec<f64>>>,
}

impl SolverSnapshot {
    /// Checks a payload against the environment it claims to describe.
    pub fn from_payload(
        iteration: u32,
        payload: SnapshotPayload,
        env: &EnvironmentConfig,
    ) -> Result<Self, ClientError> {
        let n = env.num_states();
        let actions = env.actions();

        if payload.state_values.len() != n {
            return Err(contract(format!(
                "iteration {iteration}: {} state values for {n} states",
                payload.state_values.len()
            )));
        }
        if let Some(i) = payload.state_values.iter().position(|v| !v.is_finite()) {
            return Err(contract(format!(
                "iteration {iteration}: state value {i} is not finite"
            )));
        }
        if payload.policy.len() != n {
            return Err(contract(format!(
                "iteration {iteration}: {} policy entries for {n} states",
                payload.policy.len()
            )));
        }

        let mut policy = Vec::with_capacity(n);
        for (i, entry) in payload.policy.iter().enumerate() {
            if entry.state_idx != i {
                return Err(contract(format!(
                    "policy entry {i} describes state {}",
                    entry.state_idx
                )));
            }
            match actions.get(entry.best_action_idx) {
                Some(a) if *a == entry.action => policy.push(entry.action),
                Some(a) => {
                    return Err(contract(format!(
                        "state {i}: action index {} is {} but vector says {}",
                        entry.best_action_idx,
                        a.name(),
                        entry.action.name()
                    )))
                }
                None => {
                    return Err(contract(format!(
                        "state {i}: action index {} outside {} actions",
                        entry.best_action_idx,
                        actions.len()
                    )))
                }
            }
        }

        if let Some(rows) = &payload.action_values {
            if rows.len() != n {
                return Err(contract(format!(
                    "iteration {iteration}: {} action-value rows for {n} states",
                    rows.len()
                )));
            }
            for (i, row) in rows.iter().enumerate() {
                if row.len() != actions.len() {
                    return Err(contract(format!(
                        "state {i}: {} action values for {} actions",
                        row.len(),
                        actions.len()
                    )));
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(contract(format!("state {i}: action value is not finite")));
                }
            }
        }

        Ok(Self {
            iteration,
            values: payload.state_values,
            policy,
            action_values: payload.action_values,
        })
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn policy(&self) -> &[Action] {
        &self.policy
    }

    pub fn has_action_values(&self) -> bool {
        self.action_values.is_some()
    }

    pub fn value_at(&self, env: &EnvironmentConfig, cell: Cell) -> Option<f64> {
        env.state_index(cell).and_then(|i| self.values.get(i).copied())
    }

    pub fn action_at(&self, env: &EnvironmentConfig, cell: Cell) -> Option<Action> {
        env.state_index(cell).and_then(|i| self.policy.get(i).copied())
    }

    pub fn action_values_at(&self, env: &EnvironmentConfig, cell: Cell) -> Option<&[f64]> {
        let i = env.state_index(cell)?;
        self.action_values.as_ref()?.get(i).map(Vec::as_slice)
    }
}

fn contract(msg: String) -> ClientError {
    ClientError::Contract(msg)
}
