//! In-process fakes for orchestrator tests: a scripted model and an
//! in-memory record store.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use crm_core::{Hcp, Interaction, InteractionPatch, NewHcp, NewInteraction, Sentiment};

use super::client::{ChatMessage, ChatModel, ModelReply, ToolDef};
use crate::db::RecordStore;
use crate::error::AppError;

/// Scripted model: pops one reply per `complete` call.
pub struct FakeModel {
    replies: Mutex<VecDeque<Result<ModelReply, String>>>,
    /// When set, every call sleeps forever instead of replying.
    stalled: bool,
}

impl FakeModel {
    pub fn new(replies: impl IntoIterator<Item = ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            stalled: false,
        }
    }

    /// Text-only replies, in call order.
    pub fn with_text<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(texts.into_iter().map(|t| ModelReply {
            content: Some(t.to_string()),
            tool_calls: Vec::new(),
        }))
    }

    /// Every call fails with the given transport error.
    pub fn failing(error: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error.to_string())])),
            stalled: false,
        }
    }

    /// Every call hangs until the caller's timeout fires.
    pub fn stalled() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            stalled: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl ChatModel for FakeModel {
    async fn complete(
        &self,
        _system: Option<&str>,
        _messages: Vec<ChatMessage>,
        _tools: Option<Vec<ToolDef>>,
    ) -> Result<ModelReply, String> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(e),
            None => Err("FakeModel: no scripted reply left".to_string()),
        }
    }
}

/// In-memory record store tracking every write.
pub struct MemoryStore {
    hcps: Mutex<Vec<Hcp>>,
    interactions: Mutex<Vec<Interaction>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            hcps: Mutex::new(Vec::new()),
            interactions: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed an HCP directly, bypassing the write counter.
    pub fn add_hcp(&self, name: &str) -> i32 {
        let mut hcps = self.hcps.lock().unwrap();
        let id = hcps.len() as i32 + 1;
        hcps.push(Hcp {
            id,
            name: name.to_string(),
            specialty: None,
            contact_info: None,
        });
        id
    }

    /// Seed an interaction directly, bypassing the write counter.
    pub fn add_interaction(&self, hcp_id: i32, date: &str) -> i32 {
        let mut interactions = self.interactions.lock().unwrap();
        let id = interactions.len() as i32 + 1;
        interactions.push(Interaction {
            id,
            hcp_id,
            interaction_type: "Meeting".to_string(),
            interaction_date: date.parse::<NaiveDate>().unwrap(),
            interaction_time: "09:00".to_string(),
            attendees: None,
            topics_discussed: None,
            materials_shared: None,
            samples_distributed: None,
            hcp_sentiment: Sentiment::Neutral,
            outcomes: None,
            follow_up_actions: None,
            summary: None,
            raw_text_input: None,
        });
        id
    }

    pub fn hcp_id(&self, name: &str) -> Option<i32> {
        self.hcps
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.id)
    }

    pub fn get_interaction(&self, id: i32) -> Option<Interaction> {
        self.interactions
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    /// Number of create/update calls made through the gateway.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryStore {
    async fn find_hcp_by_name(&self, name: &str) -> Result<Option<Hcp>, AppError> {
        Ok(self
            .hcps
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.name == name)
            .cloned())
    }

    async fn create_hcp(&self, new: &NewHcp) -> Result<Hcp, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut hcps = self.hcps.lock().unwrap();
        let hcp = Hcp {
            id: hcps.len() as i32 + 1,
            name: new.name.clone(),
            specialty: new.specialty.clone(),
            contact_info: new.contact_info.clone(),
        };
        hcps.push(hcp.clone());
        Ok(hcp)
    }

    async fn find_most_recent_interaction(
        &self,
        hcp_name: &str,
    ) -> Result<Option<Interaction>, AppError> {
        let Some(hcp_id) = self.hcp_id(hcp_name) else {
            return Ok(None);
        };
        Ok(self
            .interactions
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.hcp_id == hcp_id)
            .max_by_key(|i| (i.interaction_date, i.id))
            .cloned())
    }

    async fn create_interaction(&self, new: &NewInteraction) -> Result<Interaction, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut interactions = self.interactions.lock().unwrap();
        let interaction = Interaction {
            id: interactions.len() as i32 + 1,
            hcp_id: new.hcp_id,
            interaction_type: new.interaction_type.clone(),
            interaction_date: new.interaction_date,
            interaction_time: new.interaction_time.clone(),
            attendees: new.attendees.clone(),
            topics_discussed: new.topics_discussed.clone(),
            materials_shared: new.materials_shared.clone(),
            samples_distributed: new.samples_distributed.clone(),
            hcp_sentiment: new.hcp_sentiment,
            outcomes: new.outcomes.clone(),
            follow_up_actions: new.follow_up_actions.clone(),
            summary: new.summary.clone(),
            raw_text_input: new.raw_text_input.clone(),
        };
        interactions.push(interaction.clone());
        Ok(interaction)
    }

    async fn update_interaction(
        &self,
        id: i32,
        patch: &InteractionPatch,
    ) -> Result<Option<Interaction>, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut interactions = self.interactions.lock().unwrap();
        match interactions.iter_mut().find(|i| i.id == id) {
            Some(interaction) => {
                patch.apply_to(interaction);
                Ok(Some(interaction.clone()))
            }
            None => Ok(None),
        }
    }
}
