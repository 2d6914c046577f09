//! Drawing seam. The library decides *when* to draw; implementations decide
//! *how*.

use crate::hover::ActionValueTable;
use crate::session::SessionState;

pub trait RenderAdapter: Send + Sync + 'static {
    /// Called after every committed state change, with the committed state.
    fn redraw(&self, state: &SessionState);

    /// Shows or clears the hover table.
    fn overlay(&self, _table: Option<&ActionValueTable>) {}

    /// User-visible message, e.g. why a scheduled driver stopped.
    fn notify(&self, _message: &str) {}
}

/// Draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl RenderAdapter for NullRenderer {
    fn redraw(&self, _state: &SessionState) {}
}
