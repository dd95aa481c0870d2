//! Lifecycle stage of a stored object.

use serde::Serialize;

/// Where an object sits in the two-phase upload, derived from which records
/// exist on disk rather than from a persisted status field.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectState {
    /// No metadata record exists for the key.
    Missing,
    /// Registered, payload not uploaded yet.
    Pending,
    /// Metadata and payload are both present.
    Complete,
}

impl ObjectState {
    pub fn from_presence(has_info: bool, has_bin: bool) -> Self {
        match (has_info, has_bin) {
            (false, _) => ObjectState::Missing,
            (true, false) => ObjectState::Pending,
            (true, true) => ObjectState::Complete,
        }
    }
}
