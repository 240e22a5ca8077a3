//! Interaction resource HTTP handlers, including the chat and agent endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};

use crm_core::{InteractionPatch, NewInteraction, Sentiment};

use super::hcps::ListParams;
use crate::ai::chat::ChatOutcome;
use crate::ai::{self, GroqClient};
use crate::db::{HcpRepository, InteractionRepository, PgStore};
use crate::error::AppError;

/// Request body for the chat endpoint
#[derive(Deserialize)]
pub struct ChatRequest {
    pub raw_text_input: String,
    /// HCP selected in the chat UI; kept for wire compatibility, the
    /// orchestrator resolves the name from the message itself.
    #[allow(dead_code)]
    pub hcp_name: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub hcp_sentiment: Option<Sentiment>,
}

/// Request body for the agent endpoint
#[derive(Deserialize)]
pub struct AgentRequest {
    pub message: String,
}

/// Response body for the agent endpoint
#[derive(Serialize)]
pub struct AgentResponse {
    pub response: String,
}

/// POST /api/v1/interactions - Log a new interaction
pub async fn create(
    State(pool): State<Pool>,
    Json(body): Json<NewInteraction>,
) -> Result<impl IntoResponse, AppError> {
    let hcps = HcpRepository::new(pool.clone());
    if hcps.get(body.hcp_id).await?.is_none() {
        return Err(AppError::NotFound("HCP not found".to_string()));
    }

    let repo = InteractionRepository::new(pool);
    let interaction = repo.create(&body).await?;
    tracing::info!(interaction_id = interaction.id, "Interaction logged");
    Ok(Json(interaction))
}

/// PUT /api/v1/interactions/{id} - Partially update an interaction
pub async fn update(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
    Json(body): Json<InteractionPatch>,
) -> Result<impl IntoResponse, AppError> {
    let repo = InteractionRepository::new(pool);

    match repo.update(id, &body).await? {
        Some(interaction) => Ok(Json(interaction)),
        None => Err(AppError::NotFound("Interaction not found".to_string())),
    }
}

/// GET /api/v1/interactions - List interactions
pub async fn list(
    State(pool): State<Pool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo = InteractionRepository::new(pool);
    let interactions = repo.list(params.skip, params.limit).await?;
    Ok(Json(interactions))
}

/// GET /api/v1/interactions/{id} - Read an interaction
pub async fn read(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let repo = InteractionRepository::new(pool);

    match repo.get(id).await? {
        Some(interaction) => Ok(Json(interaction)),
        None => Err(AppError::NotFound("Interaction not found".to_string())),
    }
}

/// POST /api/v1/interactions/chat - Log or edit an interaction from free text
///
/// Runs the extraction/summarization orchestrator; failures surface as
/// `{"status": "error", ...}` rather than HTTP errors.
pub async fn chat(
    State(pool): State<Pool>,
    Extension(model): Extension<Option<GroqClient>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, AppError> {
    let model =
        model.ok_or_else(|| AppError::Internal("GROQ_API_KEY not configured".to_string()))?;

    tracing::info!(message = %body.raw_text_input, "Chat request");

    let store = PgStore::new(pool);
    let outcome = ai::chat::process(&model, &store, &body.raw_text_input).await;
    Ok(Json(outcome))
}

/// POST /api/v1/interactions/agent - Multi-tool agent over the record store
///
/// The model chooses among the five catalog operations, with the two-step
/// HCP-name-correction flow driven by the loop's routing.
pub async fn agent_chat(
    State(pool): State<Pool>,
    Extension(model): Extension<Option<GroqClient>>,
    Json(body): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let model =
        model.ok_or_else(|| AppError::Internal("GROQ_API_KEY not configured".to_string()))?;

    tracing::info!(message = %body.message, "Agent request");

    let store = PgStore::new(pool);
    let response = ai::agent::run(&model, &store, &body.message)
        .await
        .map_err(|e| AppError::Internal(format!("Agent failed: {e}")))?;

    Ok(Json(AgentResponse { response }))
}
