//! Grid-world environment parameters.
//!
//! An [`EnvironmentConfig`] can only be obtained through
//! [`EnvironmentConfigBuilder::build`], so every config handed to the session
//! has already passed local validation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A grid cell; `x` is the column, `y` the row (row 0 at the top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<[u32; 2]> for Cell {
    fn from(v: [u32; 2]) -> Self {
        Cell::new(v[0], v[1])
    }
}

impl From<Cell> for [u32; 2] {
    fn from(c: Cell) -> Self {
        [c.x, c.y]
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Agent move, encoded on the wire as a displacement vector `[dx, dy]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 2]", into = "[i32; 2]")]
pub enum Action {
    Down,
    Right,
    Up,
    Left,
    Stay,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::Down,
            Action::Right,
            Action::Up,
            Action::Left,
            Action::Stay,
        ]
    }

    pub fn vector(self) -> [i32; 2] {
        match self {
            Action::Down => [0, 1],
            Action::Right => [1, 0],
            Action::Up => [0, -1],
            Action::Left => [-1, 0],
            Action::Stay => [0, 0],
        }
    }

    pub fn from_vector(v: [i32; 2]) -> Option<Self> {
        match v {
            [0, 1] => Some(Action::Down),
            [1, 0] => Some(Action::Right),
            [0, -1] => Some(Action::Up),
            [-1, 0] => Some(Action::Left),
            [0, 0] => Some(Action::Stay),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Down => "DOWN",
            Action::Right => "RIGHT",
            Action::Up => "UP",
            Action::Left => "LEFT",
            Action::Stay => "STAY",
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Action::Down => '↓',
            Action::Right => '→',
            Action::Up => '↑',
            Action::Left => '←',
            Action::Stay => '○',
        }
    }
}

impl TryFrom<[i32; 2]> for Action {
    type Error = String;

    fn try_from(v: [i32; 2]) -> Result<Self, Self::Error> {
        Action::from_vector(v).ok_or_else(|| format!("unknown action vector [{}, {}]", v[0], v[1]))
    }
}

impl From<Action> for [i32; 2] {
    fn from(a: Action) -> Self {
        a.vector()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    ValueIteration,
    PolicyIteration,
    TruncatedPolicyIteration,
    MonteCarlo,
}

impl Algorithm {
    pub fn label(self) -> &'static str {
        match self {
            Algorithm::ValueIteration => "value_iteration",
            Algorithm::PolicyIteration => "policy_iteration",
            Algorithm::TruncatedPolicyIteration => "truncated_policy_iteration",
            Algorithm::MonteCarlo => "monte_carlo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Algorithm::ValueIteration => "Value iteration",
            Algorithm::PolicyIteration => "Policy iteration",
            Algorithm::TruncatedPolicyIteration => "Truncated policy iteration",
            Algorithm::MonteCarlo => "Monte Carlo",
        }
    }

    pub fn all() -> &'static [Algorithm] {
        &[
            Algorithm::ValueIteration,
            Algorithm::PolicyIteration,
            Algorithm::TruncatedPolicyIteration,
            Algorithm::MonteCarlo,
        ]
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Algorithm::all()
            .iter()
            .copied()
            .find(|a| a.label() == wanted)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

/// Solver hyper-parameters sent along with `Initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_theta")]
    pub theta: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_gamma() -> f64 {
    0.9
}

fn default_theta() -> f64 {
    0.001
}

fn default_max_iterations() -> u32 {
    100
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            theta: default_theta(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Immediate rewards the solver's environment hands out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardSchedule {
    #[serde(default = "default_target_reward")]
    pub target: f64,
    #[serde(default = "default_forbidden_reward")]
    pub forbidden: f64,
    #[serde(default)]
    pub step: f64,
}

fn default_target_reward() -> f64 {
    1.0
}

fn default_forbidden_reward() -> f64 {
    -1.0
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            target: default_target_reward(),
            forbidden: default_forbidden_reward(),
            step: 0.0,
        }
    }
}

/// Validated grid-world parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    width: u32,
    height: u32,
    start: Cell,
    target: Cell,
    forbidden: Vec<Cell>,
    actions: Vec<Action>,
    rewards: RewardSchedule,
}

impl EnvironmentConfig {
    pub fn builder() -> EnvironmentConfigBuilder {
        EnvironmentConfigBuilder::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn target(&self) -> Cell {
        self.target
    }

    /// Forbidden cells in row-major order.
    pub fn forbidden(&self) -> &[Cell] {
        &self.forbidden
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn rewards(&self) -> RewardSchedule {
        self.rewards
    }

    pub fn num_states(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_forbidden(&self, cell: Cell) -> bool {
        self.forbidden.binary_search_by_key(&(cell.y, cell.x), |c| (c.y, c.x)).is_ok()
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    pub fn cell_at(&self, x: i64, y: i64) -> Option<Cell> {
        self.contains(x, y).then(|| Cell::new(x as u32, y as u32))
    }

    /// Row-major state index, as the solver numbers states.
    pub fn state_index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell.x as i64, cell.y as i64)
            .then(|| cell.y as usize * self.width as usize + cell.x as usize)
    }

    pub fn cell_of(&self, state: usize) -> Option<Cell> {
        (state < self.num_states()).then(|| {
            let w = self.width as usize;
            Cell::new((state % w) as u32, (state / w) as u32)
        })
    }

    pub fn action_index(&self, action: Action) -> Option<usize> {
        self.actions.iter().position(|a| *a == action)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            start: Cell::new(0, 0),
            target: Cell::new(4, 4),
            forbidden: vec![Cell::new(2, 1), Cell::new(1, 3), Cell::new(3, 3)],
            actions: Action::all().to_vec(),
            rewards: RewardSchedule::default(),
        }
    }
}

/// Largest grid accepted, in cells.
pub const MAX_STATES: usize = 1 << 20;

/// Pending form values. Coordinates are signed so that bad user input is
/// reported as a bounds error instead of wrapping.
#[derive(Debug, Clone)]
pub struct EnvironmentConfigBuilder {
    width: i64,
    height: i64,
    start: (i64, i64),
    target: (i64, i64),
    forbidden: Vec<(i64, i64)>,
    actions: Vec<Action>,
    rewards: RewardSchedule,
}

impl Default for EnvironmentConfigBuilder {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            start: (0, 0),
            target: (4, 4),
            forbidden: vec![(2, 1), (3, 3), (1, 3)],
            actions: Action::all().to_vec(),
            rewards: RewardSchedule::default(),
        }
    }
}

impl EnvironmentConfigBuilder {
    /// Starts from an existing config, e.g. to edit the current environment.
    pub fn from_config(cfg: &EnvironmentConfig) -> Self {
        Self {
            width: cfg.width as i64,
            height: cfg.height as i64,
            start: (cfg.start.x as i64, cfg.start.y as i64),
            target: (cfg.target.x as i64, cfg.target.y as i64),
            forbidden: cfg
                .forbidden
                .iter()
                .map(|c| (c.x as i64, c.y as i64))
                .collect(),
            actions: cfg.actions.clone(),
            rewards: cfg.rewards,
        }
    }

    pub fn size(mut self, width: i64, height: i64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn start(mut self, x: i64, y: i64) -> Self {
        self.start = (x, y);
        self
    }

    pub fn target(mut self, x: i64, y: i64) -> Self {
        self.target = (x, y);
        self
    }

    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn rewards(mut self, rewards: RewardSchedule) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn clear_forbidden(mut self) -> Self {
        self.forbidden.clear();
        self
    }

    pub fn forbidden_cells(&self) -> &[(i64, i64)] {
        &self.forbidden
    }

    /// Adds a forbidden cell, checked against the current size, start and
    /// target right away.
    pub fn add_forbidden(&mut self, x: i64, y: i64) -> Result<(), ConfigError> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return Err(ConfigError::ForbiddenOutOfBounds {
                x,
                y,
                width: u32::try_from(self.width.max(0)).unwrap_or(u32::MAX),
                height: u32::try_from(self.height.max(0)).unwrap_or(u32::MAX),
            });
        }
        if self.forbidden.contains(&(x, y)) {
            return Err(ConfigError::DuplicateForbidden { x, y });
        }
        if (x, y) == self.start {
            return Err(ConfigError::ForbiddenOnStart);
        }
        if (x, y) == self.target {
            return Err(ConfigError::ForbiddenOnTarget);
        }
        self.forbidden.push((x, y));
        Ok(())
    }

    /// Returns whether the cell was listed.
    pub fn remove_forbidden(&mut self, x: i64, y: i64) -> bool {
        let before = self.forbidden.len();
        self.forbidden.retain(|c| *c != (x, y));
        self.forbidden.len() != before
    }

    pub fn build(&self) -> Result<EnvironmentConfig, ConfigError> {
        if self.width < 2 || self.height < 2 {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        let too_large = ConfigError::GridTooLarge {
            width: self.width,
            height: self.height,
            max: MAX_STATES,
        };
        match self.width.checked_mul(self.height) {
            Some(n) if n <= MAX_STATES as i64 => {}
            _ => return Err(too_large),
        }
        let (Ok(width), Ok(height)) = (u32::try_from(self.width), u32::try_from(self.height))
        else {
            return Err(too_large);
        };
        let in_bounds =
            |(x, y): (i64, i64)| x >= 0 && y >= 0 && x < self.width && y < self.height;

        if !in_bounds(self.start) {
            return Err(ConfigError::StartOutOfBounds {
                x: self.start.0,
                y: self.start.1,
                width,
                height,
            });
        }
        if !in_bounds(self.target) {
            return Err(ConfigError::TargetOutOfBounds {
                x: self.target.0,
                y: self.target.1,
                width,
                height,
            });
        }
        if self.start == self.target {
            return Err(ConfigError::StartEqualsTarget);
        }

        let mut forbidden: Vec<Cell> = Vec::with_capacity(self.forbidden.len());
        for &(x, y) in &self.forbidden {
            if !in_bounds((x, y)) {
                return Err(ConfigError::ForbiddenOutOfBounds {
                    x,
                    y,
                    width,
                    height,
                });
            }
            if (x, y) == self.start {
                return Err(ConfigError::ForbiddenOnStart);
            }
            if (x, y) == self.target {
                return Err(ConfigError::ForbiddenOnTarget);
            }
            let cell = Cell::new(x as u32, y as u32);
            if forbidden.contains(&cell) {
                return Err(ConfigError::DuplicateForbidden { x, y });
            }
            forbidden.push(cell);
        }
        forbidden.sort_by_key(|c| (c.y, c.x));

        if self.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        for (i, a) in self.actions.iter().enumerate() {
            if self.actions[..i].contains(a) {
                return Err(ConfigError::DuplicateAction(a.name()));
            }
        }

        Ok(EnvironmentConfig {
            width,
            height,
            start: Cell::new(self.start.0 as u32, self.start.1 as u32),
            target: Cell::new(self.target.0 as u32, self.target.1 as u32),
            forbidden,
            actions: self.actions.clone(),
            rewards: self.rewards,
        })
    }
}

/// Parses one coordinate typed by the user.
pub fn parse_coordinate(text: &str) -> Result<i64, ConfigError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidCoordinate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_matches_default_config() {
        let built = EnvironmentConfig::builder().build().unwrap();
        assert_eq!(built, EnvironmentConfig::default());
        assert_eq!(built.num_states(), 25);
        assert!(built.is_forbidden(Cell::new(3, 3)));
        assert!(!built.is_forbidden(Cell::new(0, 0)));
    }

    #[test]
    fn rejects_small_grids_and_bad_endpoints() {
        let b = EnvironmentConfig::builder();
        assert_eq!(
            b.clone().size(1, 5).build(),
            Err(ConfigError::GridTooSmall {
                width: 1,
                height: 5
            })
        );
        assert!(matches!(
            b.clone().start(-1, 0).build(),
            Err(ConfigError::StartOutOfBounds { .. })
        ));
        assert!(matches!(
            b.clone().target(5, 0).build(),
            Err(ConfigError::TargetOutOfBounds { .. })
        ));
        assert_eq!(
            b.clone().target(0, 0).build(),
            Err(ConfigError::StartEqualsTarget)
        );
    }

    #[test]
    fn rejects_grids_wider_than_u32_or_too_many_cells() {
        let b = EnvironmentConfig::builder().clear_forbidden().start(0, 0);
        let wide = (1_i64 << 32) + 3;
        assert_eq!(
            b.clone().size(wide, 2).target(10, 1).build(),
            Err(ConfigError::GridTooLarge {
                width: wide,
                height: 2,
                max: MAX_STATES
            })
        );
        assert!(matches!(
            b.clone().size(2, wide).target(1, 10).build(),
            Err(ConfigError::GridTooLarge { .. })
        ));
        assert!(matches!(
            b.clone().size(i64::MAX, i64::MAX).target(1, 1).build(),
            Err(ConfigError::GridTooLarge { .. })
        ));
        assert!(matches!(
            b.clone().size(1025, 1024).target(1, 1).build(),
            Err(ConfigError::GridTooLarge { .. })
        ));

        let largest = b.size(1024, 1024).target(1023, 1023).build().unwrap();
        assert_eq!(largest.num_states(), MAX_STATES);
        assert!(largest.state_index(largest.target()).is_some());
    }

    #[test]
    fn forbidden_cells_are_checked_on_add_and_on_build() {
        let mut b = EnvironmentConfig::builder().clear_forbidden();
        assert_eq!(b.add_forbidden(0, 0), Err(ConfigError::ForbiddenOnStart));
        assert_eq!(b.add_forbidden(4, 4), Err(ConfigError::ForbiddenOnTarget));
        assert!(matches!(
            b.add_forbidden(7, 1),
            Err(ConfigError::ForbiddenOutOfBounds { .. })
        ));
        b.add_forbidden(2, 2).unwrap();
        assert_eq!(
            b.add_forbidden(2, 2),
            Err(ConfigError::DuplicateForbidden { x: 2, y: 2 })
        );

        // Moving the start onto an existing forbidden cell is caught at build time.
        let moved = b.clone().start(2, 2);
        assert_eq!(moved.build(), Err(ConfigError::ForbiddenOnStart));

        // Shrinking the grid strands the forbidden cell.
        let shrunk = b.clone().size(2, 2).target(1, 1);
        assert!(matches!(
            shrunk.build(),
            Err(ConfigError::ForbiddenOutOfBounds { x: 2, y: 2, .. })
        ));

        assert!(b.remove_forbidden(2, 2));
        assert!(!b.remove_forbidden(2, 2));
        assert!(b.build().unwrap().forbidden().is_empty());
    }

    #[test]
    fn action_set_must_be_non_empty_and_distinct() {
        let b = EnvironmentConfig::builder();
        assert_eq!(b.clone().actions(vec![]).build(), Err(ConfigError::NoActions));
        assert_eq!(
            b.clone().actions(vec![Action::Up, Action::Up]).build(),
            Err(ConfigError::DuplicateAction("UP"))
        );
        let cfg = b.actions(vec![Action::Right, Action::Down]).build().unwrap();
        assert_eq!(cfg.action_index(Action::Down), Some(1));
        assert_eq!(cfg.action_index(Action::Stay), None);
    }

    #[test]
    fn state_index_is_row_major() {
        let cfg = EnvironmentConfig::builder()
            .size(4, 3)
            .target(3, 2)
            .clear_forbidden()
            .build()
            .unwrap();
        assert_eq!(cfg.state_index(Cell::new(1, 2)), Some(9));
        assert_eq!(cfg.cell_of(9), Some(Cell::new(1, 2)));
        assert_eq!(cfg.cell_of(12), None);
        assert_eq!(cfg.cell_at(-1, 0), None);
    }

    #[test]
    fn action_vectors_round_trip_through_the_wire_encoding() {
        for a in Action::all() {
            assert_eq!(Action::from_vector(a.vector()), Some(*a));
        }
        assert_eq!(Action::from_vector([1, 1]), None);
        let json = serde_json::to_string(&Action::Left).unwrap();
        assert_eq!(json, "[-1,0]");
        assert!(serde_json::from_str::<Action>("[2,0]").is_err());
    }

    #[test]
    fn algorithm_parses_wire_and_dashed_names() {
        assert_eq!(
            "policy-iteration".parse::<Algorithm>(),
            Ok(Algorithm::PolicyIteration)
        );
        assert_eq!(
            "monte_carlo".parse::<Algorithm>(),
            Ok(Algorithm::MonteCarlo)
        );
        assert!("sarsa".parse::<Algorithm>().is_err());
        assert_eq!(
            serde_json::to_string(&Algorithm::TruncatedPolicyIteration).unwrap(),
            "\"truncated_policy_iteration\""
        );
    }

    #[test]
    fn non_numeric_coordinates_are_rejected() {
        assert_eq!(parse_coordinate(" 3 "), Ok(3));
        assert_eq!(
            parse_coordinate("x"),
            Err(ConfigError::InvalidCoordinate("x".to_string()))
        );
    }
}
