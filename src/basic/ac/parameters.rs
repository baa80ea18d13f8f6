use serde::{Deserialize, Serialize};

/// Options of the AC equation system assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcEquationSystemCreationParameters {
    /// Create a phase shift variable on every branch, not only on phase shifters.
    pub force_a1_var: bool,
    /// Attach current magnitude terms to both sides of every branch.
    pub monitor_current: bool,
    /// Allow several slack buses sharing the active power mismatch.
    pub distributed_slack: bool,
}

impl AcEquationSystemCreationParameters {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
