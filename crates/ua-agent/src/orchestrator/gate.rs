//! Desired-version change gate

/// What a newly observed desired version means for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No baseline existed yet; the version becomes the baseline
    Seed,
    /// Same version as the baseline
    Unchanged,
    /// The desired version was removed; nothing to upgrade to
    Cleared,
    /// A different non-empty version replaced a non-empty baseline
    Trigger { previous: String },
}

impl GateDecision {
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger { .. })
    }
}

/// Tracks the last observed desired version
///
/// Every observation replaces the baseline, whatever the decision, so an
/// upgrade fires exactly once per distinct version change.
#[derive(Debug, Clone, Default)]
pub struct ConfigGate {
    last_triggered: String,
}

impl ConfigGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current baseline; empty before the first observation
    pub fn last_triggered(&self) -> &str {
        &self.last_triggered
    }

    /// Record `desired` as the new baseline and report whether it triggers
    pub fn observe(&mut self, desired: &str) -> GateDecision {
        let previous = std::mem::replace(&mut self.last_triggered, desired.to_string());

        if previous.is_empty() {
            GateDecision::Seed
        } else if desired.is_empty() {
            GateDecision::Cleared
        } else if previous == desired {
            GateDecision::Unchanged
        } else {
            GateDecision::Trigger { previous }
        }
    }
}
