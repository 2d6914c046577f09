//! # gridmdp
//!
//! Client-side session state machine for inspecting grid-world MDP solver runs.
//!
//! The solver (value iteration, policy iteration, truncated policy iteration,
//! Monte Carlo) lives in a separate process and is reached through
//! [`solver::SolverClient`]. This crate owns everything on the client side of
//! that seam: which run, which iteration and which agent position are shown,
//! and the ordering of every asynchronous round trip that may change them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gridmdp::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let config = ClientConfig::default();
//! let solver = TcpSolverClient::new(&config);
//! let client = GridClient::new(solver, Arc::new(NullRenderer), &config);
//!
//! let env = EnvironmentConfig::builder().build()?;
//! client.initialize(env, Algorithm::ValueIteration).await?;
//! let total = client.step_runner().run_to_convergence().await?;
//! client.navigator().go_to(1).await?;
//! client.animation().start().await?;
//! # let _ = total;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`env_config`]: grid parameters, actions, validation
//! - [`snapshot`]: validated per-iteration solver data
//! - [`protocol`]: wire records exchanged with the solver
//! - [`solver`]: the solver seam and its TCP implementation
//! - [`session`]: the single source of truth for what is displayed
//! - [`navigator`], [`step_runner`], [`simulation`], [`animation`]: the actors
//! - [`hover`], [`controls`]: read-only derivations for the UI
//! - [`render`]: the redraw seam
//! - [`config`]: client settings and paths

pub mod animation;
pub mod client;
pub mod config;
pub mod controls;
pub mod env_config;
pub mod error;
pub mod hover;
pub mod navigator;
pub mod protocol;
pub mod render;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod solver;
pub mod step_runner;

/// Prelude module for convenient imports.
///
/// ```
/// use gridmdp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::GridClient;
    pub use crate::config::{AppPaths, ClientConfig};
    pub use crate::controls::Controls;
    pub use crate::env_config::{
        Action, Algorithm, Cell, EnvironmentConfig, EnvironmentConfigBuilder, RewardSchedule,
        SolverParams,
    };
    pub use crate::error::{ClientError, ConfigError};
    pub use crate::hover::{ActionValueTable, GridLayout};
    pub use crate::render::{NullRenderer, RenderAdapter};
    pub use crate::session::{DriverKind, SessionState, SharedSession};
    pub use crate::snapshot::SolverSnapshot;
    pub use crate::solver::{SolverClient, TcpSolverClient};
}
