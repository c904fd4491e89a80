use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SynthesisStage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStage {
    Negotiating,
    Resolving,
    Building,
    Synthesizing,
    Committing,
    Publishing,
    Done,
    Failed,
}

impl SynthesisStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, SynthesisStage::Done | SynthesisStage::Failed)
    }
}

impl fmt::Display for SynthesisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SynthesisStage::Negotiating => "Negotiating",
            SynthesisStage::Resolving => "Resolving",
            SynthesisStage::Building => "Building",
            SynthesisStage::Synthesizing => "Synthesizing",
            SynthesisStage::Committing => "Committing",
            SynthesisStage::Publishing => "Publishing",
            SynthesisStage::Done => "Done",
            SynthesisStage::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage transition: {from} -> {to}")]
pub struct StageError {
    pub from: SynthesisStage,
    pub to: SynthesisStage,
}

// ---------------------------------------------------------------------------
// SynthesisStateMachine
// ---------------------------------------------------------------------------

/// Stage tracker for one synthesis attempt.
#[derive(Debug, Clone)]
pub struct SynthesisStateMachine {
    current: SynthesisStage,
    history: Vec<SynthesisStage>,
}

impl SynthesisStateMachine {
    /// Start in `Negotiating`.
    pub fn new() -> Self {
        Self {
            current: SynthesisStage::Negotiating,
            history: vec![SynthesisStage::Negotiating],
        }
    }

    pub fn state(&self) -> SynthesisStage {
        self.current
    }

    /// Every stage entered so far, in order.
    pub fn history(&self) -> &[SynthesisStage] {
        &self.history
    }

    /// Move to `next`.
    ///
    /// Valid transitions:
    /// - Negotiating  -> Resolving | Building
    /// - Resolving    -> Building
    /// - Building     -> Synthesizing | Done (no changes)
    /// - Synthesizing -> Committing
    /// - Committing   -> Publishing
    /// - Publishing   -> Done
    /// - any non-terminal stage -> Failed
    pub fn transition(&mut self, next: SynthesisStage) -> Result<SynthesisStage, StageError> {
        use SynthesisStage::*;

        let allowed = match (self.current, next) {
            (from, Failed) => !from.is_terminal(),
            (Negotiating, Resolving | Building) => true,
            (Resolving, Building) => true,
            (Building, Synthesizing | Done) => true,
            (Synthesizing, Committing) => true,
            (Committing, Publishing) => true,
            (Publishing, Done) => true,
            _ => false,
        };

        if !allowed {
            return Err(StageError {
                from: self.current,
                to: next,
            });
        }

        self.current = next;
        self.history.push(next);
        Ok(next)
    }
}

impl Default for SynthesisStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SynthesisStage::*;

    #[test]
    fn full_path_without_resolving() {
        let mut sm = SynthesisStateMachine::new();
        for stage in [Building, Synthesizing, Committing, Publishing, Done] {
            sm.transition(stage).unwrap();
        }
        assert_eq!(
            sm.history(),
            &[Negotiating, Building, Synthesizing, Committing, Publishing, Done]
        );
    }

    #[test]
    fn no_changes_short_circuits_to_done() {
        let mut sm = SynthesisStateMachine::new();
        sm.transition(Resolving).unwrap();
        sm.transition(Building).unwrap();
        assert_eq!(sm.transition(Done).unwrap(), Done);
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut sm = SynthesisStateMachine::new();
        let err = sm.transition(Committing).unwrap_err();
        assert_eq!(err.from, Negotiating);
        assert_eq!(err.to, Committing);
        assert_eq!(sm.state(), Negotiating);
    }

    #[test]
    fn terminal_stages_are_final() {
        let mut sm = SynthesisStateMachine::new();
        sm.transition(Failed).unwrap();
        assert!(sm.transition(Failed).is_err());
        assert!(sm.transition(Building).is_err());
    }

    #[test]
    fn display_labels() {
        assert_eq!(Synthesizing.to_string(), "Synthesizing");
        assert_eq!(Failed.to_string(), "Failed");
    }
}
