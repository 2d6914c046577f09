//! Plain-text drawing of the session.

use gridmdp::hover::ActionValueTable;
use gridmdp::render::RenderAdapter;
use gridmdp::session::SessionState;
use std::fmt::Write as _;

/// Prints the grid to stdout after every committed change.
#[derive(Debug, Default)]
pub struct TextRenderer;

impl RenderAdapter for TextRenderer {
    fn redraw(&self, state: &SessionState) {
        println!("{}", render(state));
    }

    fn overlay(&self, table: Option<&ActionValueTable>) {
        match table {
            Some(t) => print!("{t}"),
            None => println!("(no action values here)"),
        }
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Status line, then one row per grid row:
/// `S` start, `T` target, `#` forbidden, `@` agent, otherwise the policy
/// arrow of the drawn snapshot, or `.` when there is none.
pub fn render(state: &SessionState) -> String {
    let Some(env) = state.environment() else {
        return "(no environment; use `init`)".to_string();
    };
    let drawn = state.drawn_snapshot();
    let mut out = String::new();

    let _ = write!(
        out,
        "iteration {}/{}",
        state.current_iteration(),
        state.total_iterations()
    );
    if state.converged() {
        out.push_str(" converged");
    }
    if let Some(kind) = state.driver() {
        let _ = write!(out, " [{}]", kind.label());
    }
    if let Some(agent) = state.agent_position() {
        let _ = write!(out, " agent {agent}");
    }
    if let Some(r) = state.last_reward() {
        let _ = write!(out, " reward {r:+.1}");
    }
    out.push('\n');

    for y in 0..env.height() {
        for x in 0..env.width() {
            let cell = gridmdp::env_config::Cell::new(x, y);
            let glyph = if state.agent_position() == Some(cell) {
                '@'
            } else if env.is_forbidden(cell) {
                '#'
            } else if cell == env.target() {
                'T'
            } else if cell == env.start() {
                'S'
            } else {
                drawn
                    .and_then(|s| s.action_at(env, cell))
                    .map(|a| a.arrow())
                    .unwrap_or('.')
            };
            let value = drawn.and_then(|s| s.value_at(env, cell));
            match value {
                Some(v) => {
                    let _ = write!(out, " {glyph}{v:>6.2}");
                }
                None => {
                    let _ = write!(out, " {glyph}");
                }
            }
        }
        out.push('\n');
    }
    out
}
