use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crm_core::{Hcp, Interaction, InteractionPatch, NewHcp, NewInteraction};

use crate::error::AppError;

const HCP_COLUMNS: &str = "id, name, specialty, contact_info";

const INTERACTION_COLUMNS: &str = "id, hcp_id, interaction_type, interaction_date, \
     interaction_time, attendees, topics_discussed, materials_shared, \
     samples_distributed, hcp_sentiment, outcomes, follow_up_actions, \
     summary, raw_text_input";

fn hcp_from_row(row: &Row) -> Hcp {
    Hcp {
        id: row.get("id"),
        name: row.get("name"),
        specialty: row.get("specialty"),
        contact_info: row.get("contact_info"),
    }
}

fn interaction_from_row(row: &Row) -> Interaction {
    let sentiment: String = row.get("hcp_sentiment");
    Interaction {
        id: row.get("id"),
        hcp_id: row.get("hcp_id"),
        interaction_type: row.get("interaction_type"),
        interaction_date: row.get("interaction_date"),
        interaction_time: row.get("interaction_time"),
        attendees: row.get("attendees"),
        topics_discussed: row.get("topics_discussed"),
        materials_shared: row.get("materials_shared"),
        samples_distributed: row.get("samples_distributed"),
        hcp_sentiment: sentiment.parse().unwrap_or_default(),
        outcomes: row.get("outcomes"),
        follow_up_actions: row.get("follow_up_actions"),
        summary: row.get("summary"),
        raw_text_input: row.get("raw_text_input"),
    }
}

/// Repository for HCP CRUD operations
#[derive(Clone)]
pub struct HcpRepository {
    pool: Pool,
}

impl HcpRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Register a new HCP
    pub async fn create(&self, new: &NewHcp) -> Result<Hcp, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO hcps (name, specialty, contact_info) \
                     VALUES ($1, $2, $3) RETURNING {HCP_COLUMNS}"
                ),
                &[&new.name, &new.specialty, &new.contact_info],
            )
            .await?;
        Ok(hcp_from_row(&row))
    }

    /// Get an HCP by id
    pub async fn get(&self, id: i32) -> Result<Option<Hcp>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {HCP_COLUMNS} FROM hcps WHERE id = $1"),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(hcp_from_row))
    }

    /// Look up an HCP by its unique display name (case-sensitive)
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Hcp>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {HCP_COLUMNS} FROM hcps WHERE name = $1"),
                &[&name],
            )
            .await?;
        Ok(row.as_ref().map(hcp_from_row))
    }

    /// List HCPs with offset pagination
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Hcp>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {HCP_COLUMNS} FROM hcps ORDER BY id OFFSET $1 LIMIT $2"),
                &[&skip, &limit],
            )
            .await?;
        Ok(rows.iter().map(hcp_from_row).collect())
    }
}

/// Repository for Interaction CRUD operations
#[derive(Clone)]
pub struct InteractionRepository {
    pool: Pool,
}

impl InteractionRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Log a new interaction
    pub async fn create(&self, new: &NewInteraction) -> Result<Interaction, AppError> {
        let client = self.pool.get().await?;
        let sentiment = new.hcp_sentiment.to_string();
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO interactions (hcp_id, interaction_type, \
                     interaction_date, interaction_time, attendees, \
                     topics_discussed, materials_shared, samples_distributed, \
                     hcp_sentiment, outcomes, follow_up_actions, summary, \
                     raw_text_input) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                     RETURNING {INTERACTION_COLUMNS}"
                ),
                &[
                    &new.hcp_id,
                    &new.interaction_type,
                    &new.interaction_date,
                    &new.interaction_time,
                    &new.attendees,
                    &new.topics_discussed,
                    &new.materials_shared,
                    &new.samples_distributed,
                    &sentiment,
                    &new.outcomes,
                    &new.follow_up_actions,
                    &new.summary,
                    &new.raw_text_input,
                ],
            )
            .await?;
        Ok(interaction_from_row(&row))
    }

    /// Get an interaction by id
    pub async fn get(&self, id: i32) -> Result<Option<Interaction>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {INTERACTION_COLUMNS} FROM interactions WHERE id = $1"),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(interaction_from_row))
    }

    /// List interactions with offset pagination
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Interaction>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {INTERACTION_COLUMNS} FROM interactions \
                     ORDER BY id OFFSET $1 LIMIT $2"
                ),
                &[&skip, &limit],
            )
            .await?;
        Ok(rows.iter().map(interaction_from_row).collect())
    }

    /// Most recent interaction for the named HCP, newest date first
    pub async fn most_recent_by_hcp_name(
        &self,
        hcp_name: &str,
    ) -> Result<Option<Interaction>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {cols} FROM interactions i \
                     JOIN hcps h ON h.id = i.hcp_id \
                     WHERE h.name = $1 \
                     ORDER BY i.interaction_date DESC, i.id DESC LIMIT 1",
                    cols = INTERACTION_COLUMNS
                        .split(", ")
                        .map(|c| format!("i.{c}"))
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                &[&hcp_name],
            )
            .await?;
        Ok(row.as_ref().map(interaction_from_row))
    }

    /// Partial update: only the patch's present fields are written.
    /// Returns None when no interaction has the given id.
    pub async fn update(
        &self,
        id: i32,
        patch: &InteractionPatch,
    ) -> Result<Option<Interaction>, AppError> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        let sentiment = patch.hcp_sentiment.map(|s| s.to_string());
        let (sql, params) = update_statement(&id, patch, &sentiment);

        let client = self.pool.get().await?;
        let row = client.query_opt(&sql, &params).await?;
        Ok(row.as_ref().map(interaction_from_row))
    }
}

/// Build the dynamic UPDATE statement for a patch.
///
/// Parameters are pushed in the same order the SET clauses are emitted, with
/// the row id appended last.
fn update_statement<'a>(
    id: &'a i32,
    patch: &'a InteractionPatch,
    sentiment: &'a Option<String>,
) -> (String, Vec<&'a (dyn ToSql + Sync)>) {
    let mut sets: Vec<String> = Vec::new();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

    macro_rules! set {
        ($field:expr, $column:literal) => {
            if let Some(value) = $field {
                params.push(value);
                sets.push(format!(concat!($column, " = ${}"), params.len()));
            }
        };
    }

    set!(&patch.hcp_id, "hcp_id");
    set!(&patch.interaction_type, "interaction_type");
    set!(&patch.interaction_date, "interaction_date");
    set!(&patch.interaction_time, "interaction_time");
    set!(&patch.attendees, "attendees");
    set!(&patch.topics_discussed, "topics_discussed");
    set!(&patch.materials_shared, "materials_shared");
    set!(&patch.samples_distributed, "samples_distributed");
    set!(sentiment, "hcp_sentiment");
    set!(&patch.outcomes, "outcomes");
    set!(&patch.follow_up_actions, "follow_up_actions");
    set!(&patch.summary, "summary");
    set!(&patch.raw_text_input, "raw_text_input");

    params.push(id);
    let sql = format!(
        "UPDATE interactions SET {} WHERE id = ${} RETURNING {INTERACTION_COLUMNS}",
        sets.join(", "),
        params.len(),
    );
    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_core::Sentiment;

    #[test]
    fn update_statement_includes_only_present_fields() {
        let id = 42;
        let patch = InteractionPatch {
            hcp_id: Some(7),
            topics_discussed: Some("Pricing".to_string()),
            summary: Some("A summary".to_string()),
            ..Default::default()
        };
        let (sql, params) = update_statement(&id, &patch, &None);

        assert!(sql.contains("hcp_id = $1"));
        assert!(sql.contains("topics_discussed = $2"));
        assert!(sql.contains("summary = $3"));
        assert!(sql.contains("WHERE id = $4"));
        assert!(!sql.contains("attendees"));
        assert!(!sql.contains("interaction_date"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn update_statement_binds_sentiment_as_text() {
        let id = 1;
        let patch = InteractionPatch {
            hcp_sentiment: Some(Sentiment::Positive),
            ..Default::default()
        };
        let sentiment = patch.hcp_sentiment.map(|s| s.to_string());
        let (sql, params) = update_statement(&id, &patch, &sentiment);

        assert!(sql.contains("hcp_sentiment = $1"));
        assert!(sql.contains("WHERE id = $2"));
        assert_eq!(params.len(), 2);
    }
}
