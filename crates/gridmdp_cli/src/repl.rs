//! Line commands read from stdin.

use gridmdp::env_config::{parse_coordinate, Algorithm, EnvironmentConfigBuilder};
use gridmdp::error::ClientError;
use gridmdp::navigator::parse_target;
use gridmdp::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Size(i64, i64),
    Start(i64, i64),
    Target(i64, i64),
    Forbid(i64, i64),
    Unforbid(i64, i64),
    Algo(Algorithm),
    Init,
    Run,
    Step,
    GoTo(i64),
    Prev,
    Next,
    Simulate,
    StepAgent,
    Play,
    Reset,
    Hover(i64, i64),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Environment:
  size <w> <h>          grid size (applied on init)
  start <x> <y>         start cell
  target <x> <y>        target cell
  forbid <x> <y>        add a forbidden cell
  unforbid <x> <y>      remove a forbidden cell
  algo <name>           value_iteration | policy_iteration | truncated_policy_iteration | monte_carlo
  init                  send the environment to the solver
Solver:
  run                   run to convergence
  step                  one more iteration
  goto <n> | prev | next
Agent:
  sim                   start/stop the policy replay
  simstep               move the agent once
  reset                 put the agent back on the start cell
  play                  start/stop the iteration sweep
Other:
  hover <x> <y>         action values of a cell
  status | help | quit";

impl Command {
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(None);
        };

        let pair = |args: &[&str]| -> Result<(i64, i64), String> {
            match args {
                [x, y] => Ok((
                    parse_coordinate(x).map_err(|e| e.to_string())?,
                    parse_coordinate(y).map_err(|e| e.to_string())?,
                )),
                _ => Err(format!("`{head}` takes two numbers")),
            }
        };

        let cmd = match head.to_ascii_lowercase().as_str() {
            "size" => pair(args).map(|(w, h)| Command::Size(w, h))?,
            "start" => pair(args).map(|(x, y)| Command::Start(x, y))?,
            "target" => pair(args).map(|(x, y)| Command::Target(x, y))?,
            "forbid" => pair(args).map(|(x, y)| Command::Forbid(x, y))?,
            "unforbid" => pair(args).map(|(x, y)| Command::Unforbid(x, y))?,
            "hover" => pair(args).map(|(x, y)| Command::Hover(x, y))?,
            "algo" => match args {
                [name] => Command::Algo(name.parse().map_err(|e: ConfigError| e.to_string())?),
                _ => return Err("`algo` takes one name".into()),
            },
            "goto" => match args {
                [n] => Command::GoTo(parse_target(n).map_err(|e| e.to_string())?),
                _ => return Err("`goto` takes one iteration number".into()),
            },
            "init" => Command::Init,
            "run" => Command::Run,
            "step" => Command::Step,
            "prev" => Command::Prev,
            "next" => Command::Next,
            "sim" => Command::Simulate,
            "simstep" => Command::StepAgent,
            "play" => Command::Play,
            "reset" => Command::Reset,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command `{other}` (try `help`)")),
        };
        Ok(Some(cmd))
    }
}

/// Pending environment edits plus the client they are applied to.
pub struct Repl<S> {
    client: GridClient<S>,
    pending: EnvironmentConfigBuilder,
    algorithm: Algorithm,
}

impl<S: SolverClient> Repl<S> {
    pub fn new(client: GridClient<S>, algorithm: Algorithm) -> Self {
        Self {
            client,
            pending: EnvironmentConfig::builder(),
            algorithm,
        }
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let cmd = match Command::parse(&line) {
                Ok(Some(cmd)) => cmd,
                Ok(None) => continue,
                Err(msg) => {
                    eprintln!("{msg}");
                    continue;
                }
            };
            if cmd == Command::Quit {
                break;
            }
            if let Err(e) = self.execute(cmd).await {
                eprintln!("error: {e}");
            }
        }
        debug!("stdin closed");
        Ok(())
    }

    async fn execute(&mut self, cmd: Command) -> Result<(), ClientError> {
        match cmd {
            Command::Size(w, h) => self.pending = self.pending.clone().size(w, h),
            Command::Start(x, y) => self.pending = self.pending.clone().start(x, y),
            Command::Target(x, y) => self.pending = self.pending.clone().target(x, y),
            Command::Forbid(x, y) => self.pending.add_forbidden(x, y)?,
            Command::Unforbid(x, y) => {
                if !self.pending.remove_forbidden(x, y) {
                    println!("({x}, {y}) was not forbidden");
                }
            }
            Command::Algo(a) => {
                self.algorithm = a;
                println!("algorithm: {}", a.display_name());
            }
            Command::Init => {
                let env = self.pending.build()?;
                self.client.initialize(env, self.algorithm).await?;
            }
            Command::Run => {
                let n = self.client.step_runner().run_to_convergence().await?;
                println!("converged after {n} iterations");
            }
            Command::Step => {
                let out = self.client.step_runner().step_once().await?;
                if out.converged {
                    println!("converged at iteration {}", out.iteration);
                }
            }
            Command::GoTo(n) => {
                self.client.navigator().go_to(n).await?;
            }
            Command::Prev => {
                if self.client.navigator().previous().await?.is_none() {
                    println!("already at the first iteration");
                }
            }
            Command::Next => {
                if self.client.navigator().next().await?.is_none() {
                    println!("already at the last iteration");
                }
            }
            Command::Simulate => {
                let running = self.client.simulation().start().await?;
                println!("simulation {}", if running { "started" } else { "stopped" });
            }
            Command::StepAgent => {
                let step = self.client.simulation().step_agent().await?;
                if step.done {
                    println!("agent reached {}", step.position);
                }
            }
            Command::Reset => {
                self.client.simulation().reset_agent().await?;
            }
            Command::Play => {
                let playing = self.client.animation().start().await?;
                println!("animation {}", if playing { "started" } else { "stopped" });
            }
            Command::Hover(x, y) => {
                self.client.hover(x, y).await;
            }
            Command::Status => self.status().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn status(&self) {
        let session = self.client.session();
        let s = session.read().await;
        println!("{}", crate::text_render::render(&s));
        let c = Controls::from_state(&s);
        let mut enabled = Vec::new();
        for (on, name) in [
            (c.can_run, "run"),
            (c.can_step, "step"),
            (c.can_previous, "prev"),
            (c.can_next, "next"),
            (c.can_go_to, "goto"),
            (c.can_simulate, "sim"),
            (c.can_step_agent, "simstep"),
            (c.can_animate, "play"),
            (c.can_reset_agent, "reset"),
        ] {
            if on {
                enabled.push(name);
            }
        }
        println!("pending forbidden cells: {:?}", self.pending.forbidden_cells());
        println!("available: init {}", enabled.join(" "));
    }
}
