pub mod messages;

pub use messages::{Message, MessageLevel, MessageQueue};

/// Which views are currently shown. Hidden views skip their per-frame work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFlags {
    pub viewport: bool,
    pub ray_tracing: bool,
}

impl Default for ViewFlags {
    fn default() -> Self {
        Self {
            viewport: true,
            ray_tracing: false,
        }
    }
}
