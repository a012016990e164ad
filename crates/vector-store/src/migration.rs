use crate::error::{Result, VectorStoreError};
use serde::{Deserialize, Serialize};

/// Phase of a two-phase schema cutover. Transitions are operator-driven and
/// strictly forward; in-flight queries keep succeeding against the old
/// collection until `Cutover`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CutoverState {
    /// Only the old collection exists and serves reads and writes.
    Old,
    /// Writes land in both collections; reads still come from the old one.
    ShadowWriting,
    /// Reads and writes have moved to the shadow collection.
    Cutover,
    /// The old collection has been dropped.
    OldRetired,
}

/// Schema migration between a source collection and its shadow replacement
/// (e.g. a new vector dimensionality). Never an in-place alter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionMigration {
    pub old: String,
    pub shadow: String,
    pub state: CutoverState,
}

impl CollectionMigration {
    pub fn new(old: impl Into<String>, shadow: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            shadow: shadow.into(),
            state: CutoverState::Old,
        }
    }

    /// Advance to the next state. Only the forward single-step transitions
    /// are legal.
    pub fn advance(&mut self, to: CutoverState) -> Result<()> {
        let legal = matches!(
            (self.state, to),
            (CutoverState::Old, CutoverState::ShadowWriting)
                | (CutoverState::ShadowWriting, CutoverState::Cutover)
                | (CutoverState::Cutover, CutoverState::OldRetired)
        );
        if !legal {
            return Err(VectorStoreError::InvalidTransition(format!(
                "{:?} -> {to:?}",
                self.state
            )));
        }
        log::info!(
            "Migration {} -> {}: {:?} -> {to:?}",
            self.old,
            self.shadow,
            self.state
        );
        self.state = to;
        Ok(())
    }

    /// Collections that must receive writes in the current state.
    #[must_use]
    pub fn write_targets(&self) -> Vec<&str> {
        match self.state {
            CutoverState::Old => vec![self.old.as_str()],
            CutoverState::ShadowWriting => vec![self.old.as_str(), self.shadow.as_str()],
            CutoverState::Cutover | CutoverState::OldRetired => vec![self.shadow.as_str()],
        }
    }

    /// Collection queries should read from in the current state.
    #[must_use]
    pub fn read_target(&self) -> &str {
        match self.state {
            CutoverState::Old | CutoverState::ShadowWriting => self.old.as_str(),
            CutoverState::Cutover | CutoverState::OldRetired => self.shadow.as_str(),
        }
    }
}
