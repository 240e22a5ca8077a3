//! Healthcare Professional types

use serde::{Deserialize, Serialize};

/// A registered Healthcare Professional.
///
/// The name is unique and case-sensitive; it is the sole lookup key used by
/// the chat orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hcp {
    pub id: i32,
    pub name: String,
    pub specialty: Option<String>,
    pub contact_info: Option<String>,
}

/// Payload for registering a new HCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHcp {
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
}
