//! Builder lifecycle
//!
//! `build` advances through the phases in order; driving an operation outside
//! its legal phase is a programming error, not an input condition.

use serde::{Deserialize, Serialize};

/// Phases of a one-shot PAG build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildPhase {
    Fresh,
    Initialized,
    GlobalsWalked,
    InstructionsWalked,
    SanityChecked,
    Done,
}

impl BuildPhase {
    /// The phase that legally follows this one
    pub fn successor(self) -> BuildPhase {
        match self {
            BuildPhase::Fresh => BuildPhase::Initialized,
            BuildPhase::Initialized => BuildPhase::GlobalsWalked,
            BuildPhase::GlobalsWalked => BuildPhase::InstructionsWalked,
            BuildPhase::InstructionsWalked => BuildPhase::SanityChecked,
            BuildPhase::SanityChecked => BuildPhase::Done,
            BuildPhase::Done => BuildPhase::Done,
        }
    }

    /// Advance to `to`, asserting the transition is the legal successor
    pub fn advance(&mut self, to: BuildPhase) {
        assert_eq!(
            self.successor(),
            to,
            "illegal build phase transition {:?} -> {:?}",
            self,
            to
        );
        *self = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_advance_in_order() {
        let mut phase = BuildPhase::Fresh;
        phase.advance(BuildPhase::Initialized);
        phase.advance(BuildPhase::GlobalsWalked);
        phase.advance(BuildPhase::InstructionsWalked);
        phase.advance(BuildPhase::SanityChecked);
        phase.advance(BuildPhase::Done);
        assert_eq!(phase, BuildPhase::Done);
    }

    #[test]
    #[should_panic(expected = "illegal build phase transition")]
    fn test_skipping_a_phase_is_fatal() {
        let mut phase = BuildPhase::Fresh;
        phase.advance(BuildPhase::GlobalsWalked);
    }
}
