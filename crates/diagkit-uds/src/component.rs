//! Logical ECU components on the bus.

use serde::{Deserialize, Serialize};

/// A logical ECU/module: requests go to `send_id`, replies come back on
/// `reply_id`. Defined at configuration time and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Stable identifier used in configuration and logs.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Bus identifier for tester -> ECU frames.
    pub send_id: u32,
    /// Bus identifier for ECU -> tester frames.
    pub reply_id: u32,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, send_id: u32, reply_id: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            send_id,
            reply_id,
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (0x{:X} -> 0x{:X})",
            self.id, self.send_id, self.reply_id
        )
    }
}
