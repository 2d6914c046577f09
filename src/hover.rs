//! Per-cell action-value tables for the hover overlay.
//!
//! Everything here is a pure read of [`SessionState`]; nothing is sent to the
//! solver and nothing is written back.

use crate::env_config::{Action, Cell};
use crate::session::SessionState;
use std::fmt;

/// Pointer-to-cell mapping for a grid drawn at `offset` with square cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub offset_x: f64,
    pub offset_y: f64,
    pub cell_size: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            offset_x: 50.0,
            offset_y: 50.0,
            cell_size: 80.0,
        }
    }
}

impl GridLayout {
    /// Grid coordinates under the pointer. May be outside the grid.
    pub fn cell_at(&self, px: f64, py: f64) -> (i64, i64) {
        if self.cell_size <= 0.0 {
            return (-1, -1);
        }
        let x = ((px - self.offset_x) / self.cell_size).floor();
        let y = ((py - self.offset_y) / self.cell_size).floor();
        (x as i64, y as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSign {
    Positive,
    Negative,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionValueRow {
    pub action: Action,
    pub value: f64,
}

impl ActionValueRow {
    pub fn sign(&self) -> ValueSign {
        if self.value > 0.0 {
            ValueSign::Positive
        } else if self.value < 0.0 {
            ValueSign::Negative
        } else {
            ValueSign::Zero
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionValueTable {
    pub cell: Cell,
    /// Iteration the values belong to (0 = baseline).
    pub iteration: u32,
    /// One row per configured action, in configured order.
    pub rows: Vec<ActionValueRow>,
    /// The policy's choice for this cell.
    pub best: Option<Action>,
}

impl fmt::Display for ActionValueTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State {}", self.cell)?;
        writeln!(f, "Action values (Q):")?;
        for row in &self.rows {
            let mark = if self.best == Some(row.action) { '*' } else { ' ' };
            writeln!(
                f,
                "{mark} {:<5} {} {:>8.3}",
                row.action.name(),
                row.action.arrow(),
                row.value
            )?;
        }
        Ok(())
    }
}

/// Table for grid cell `(x, y)`, or `None` when the cell is off the grid or
/// the drawn snapshot carries no action values.
pub fn inspect(state: &SessionState, x: i64, y: i64) -> Option<ActionValueTable> {
    let env = state.environment()?;
    let cell = env.cell_at(x, y)?;
    let snapshot = state.drawn_snapshot()?;
    let values = snapshot.action_values_at(env, cell)?;

    let rows = env
        .actions()
        .iter()
        .zip(values)
        .map(|(&action, &value)| ActionValueRow { action, value })
        .collect();
    Some(ActionValueTable {
        cell,
        iteration: snapshot.iteration(),
        rows,
        best: snapshot.action_at(env, cell),
    })
}
