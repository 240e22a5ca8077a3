//! crm-core: Shared domain types for the HCP CRM backend
//!
//! This crate provides the types used across the server: healthcare
//! professionals, interactions, partial-update patches, and sentiment.

pub mod hcp;
pub mod interaction;
pub mod sentiment;

pub use hcp::{Hcp, NewHcp};
pub use interaction::{Interaction, InteractionPatch, NewInteraction};
pub use sentiment::{ParseSentimentError, Sentiment};
