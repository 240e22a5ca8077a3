//! Narrow read/write gateway consumed by the AI orchestrator.
//!
//! The orchestrator only ever needs these five operations; keeping them
//! behind a trait lets tests substitute an in-memory store.

use deadpool_postgres::Pool;

use crm_core::{Hcp, Interaction, InteractionPatch, NewHcp, NewInteraction};

use super::{HcpRepository, InteractionRepository};
use crate::error::AppError;

pub trait RecordStore: Send + Sync {
    /// Look up an HCP by its unique display name.
    fn find_hcp_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Hcp>, AppError>> + Send;

    /// Register a new HCP.
    fn create_hcp(&self, new: &NewHcp) -> impl Future<Output = Result<Hcp, AppError>> + Send;

    /// Most recent interaction for the named HCP.
    fn find_most_recent_interaction(
        &self,
        hcp_name: &str,
    ) -> impl Future<Output = Result<Option<Interaction>, AppError>> + Send;

    /// Log a new interaction.
    fn create_interaction(
        &self,
        new: &NewInteraction,
    ) -> impl Future<Output = Result<Interaction, AppError>> + Send;

    /// Partial update; None signals the id was not found.
    fn update_interaction(
        &self,
        id: i32,
        patch: &InteractionPatch,
    ) -> impl Future<Output = Result<Option<Interaction>, AppError>> + Send;
}

/// Postgres-backed record store
#[derive(Clone)]
pub struct PgStore {
    hcps: HcpRepository,
    interactions: InteractionRepository,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            hcps: HcpRepository::new(pool.clone()),
            interactions: InteractionRepository::new(pool),
        }
    }
}

impl RecordStore for PgStore {
    async fn find_hcp_by_name(&self, name: &str) -> Result<Option<Hcp>, AppError> {
        self.hcps.find_by_name(name).await
    }

    async fn create_hcp(&self, new: &NewHcp) -> Result<Hcp, AppError> {
        self.hcps.create(new).await
    }

    async fn find_most_recent_interaction(
        &self,
        hcp_name: &str,
    ) -> Result<Option<Interaction>, AppError> {
        self.interactions.most_recent_by_hcp_name(hcp_name).await
    }

    async fn create_interaction(&self, new: &NewInteraction) -> Result<Interaction, AppError> {
        self.interactions.create(new).await
    }

    async fn update_interaction(
        &self,
        id: i32,
        patch: &InteractionPatch,
    ) -> Result<Option<Interaction>, AppError> {
        self.interactions.update(id, patch).await
    }
}
