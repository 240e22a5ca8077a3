//! Tool-calling agent over the record store.
//!
//! A two-node cycle: invoke the model with the accumulated history, execute
//! whatever tools it requests, and decide from the most recent tool result
//! whether to hand control back to the model or stop. The multi-step
//! HCP-name-correction flow (find old interaction -> find new HCP -> edit)
//! is driven entirely by that routing decision plus correlation state
//! injected back into the conversation as synthetic context messages.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Value as JsonValue, json};

use crm_core::{Interaction, InteractionPatch, NewHcp, NewInteraction, Sentiment, interaction};

use super::client::{ChatMessage, ChatModel, ToolDef};
use super::error::ChatError;
use super::summarizer;
use crate::db::RecordStore;

const SYSTEM_PROMPT: &str = "You are an AI assistant for a life science field representative. \
Your primary goal is to help log and manage interactions with Healthcare Professionals (HCPs).
You can perform the following actions:
1. Log a new interaction: use the `log_interaction` tool.
2. Create a new HCP: use the `create_hcp` tool.
3. Edit an existing interaction: use the `edit_interaction` tool.
   - If the user provides an interaction id (e.g. \"Edit interaction 123...\"), use it directly with `edit_interaction`.
   - If the user wants to correct an HCP's name in a recent interaction (e.g. \"It should be Dr. Vernika not Dr. Vaniya\"):
     - Step 1: call `get_most_recent_interaction_by_hcp_name` with the incorrect/old HCP name to get the interaction id.
     - Step 2: call `get_hcp_by_name` with the new/correct HCP name to get its id.
     - Step 3: call `edit_interaction` with the interaction id from step 1 and the hcp_id from step 2.
4. Look up the most recent interaction for an HCP: use `get_most_recent_interaction_by_hcp_name`.
5. Look up an HCP's id by name: use `get_hcp_by_name`.
Always try to extract all necessary information from the user's request. If you need more information, ask specific questions. \
If you log or edit successfully, confirm it to the user.";

/// Maximum agentic loop iterations to prevent runaway
const MAX_ITERATIONS: u32 = 10;

static CORRECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)should be (Dr\.?\s?\w+)").unwrap());

/// The closed catalog of operations the model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    CreateHcp,
    LogInteraction,
    EditInteraction,
    GetMostRecentInteractionByHcpName,
    GetHcpByName,
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::CreateHcp => "create_hcp",
            ToolKind::LogInteraction => "log_interaction",
            ToolKind::EditInteraction => "edit_interaction",
            ToolKind::GetMostRecentInteractionByHcpName => {
                "get_most_recent_interaction_by_hcp_name"
            }
            ToolKind::GetHcpByName => "get_hcp_by_name",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create_hcp" => Some(ToolKind::CreateHcp),
            "log_interaction" => Some(ToolKind::LogInteraction),
            "edit_interaction" => Some(ToolKind::EditInteraction),
            "get_most_recent_interaction_by_hcp_name" => {
                Some(ToolKind::GetMostRecentInteractionByHcpName)
            }
            "get_hcp_by_name" => Some(ToolKind::GetHcpByName),
            _ => None,
        }
    }

    fn definition(self) -> ToolDef {
        match self {
            ToolKind::CreateHcp => ToolDef::function(
                self.name(),
                "Creates a new Healthcare Professional in the database.",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "The full name of the Healthcare Professional."},
                        "specialty": {"type": "string", "description": "The medical specialty of the HCP (e.g. 'Cardiology')."},
                        "contact_info": {"type": "string", "description": "Contact details for the HCP (e.g. email, phone number)."}
                    },
                    "required": ["name"],
                    "additionalProperties": false
                }),
            ),
            ToolKind::LogInteraction => ToolDef::function(
                self.name(),
                "Logs an interaction with an existing Healthcare Professional.",
                json!({
                    "type": "object",
                    "properties": {
                        "hcp_name": {"type": "string", "description": "The name of the HCP the interaction was with."},
                        "interaction_type": {"type": "string", "description": "Type of interaction (e.g. 'Meeting', 'Call', 'Email')."},
                        "interaction_date": {"type": "string", "description": "Date of the interaction in YYYY-MM-DD format."},
                        "interaction_time": {"type": "string", "description": "Time of the interaction in HH:MM format (24-hour)."},
                        "attendees": {"type": "string", "description": "Comma-separated names of other attendees, if any."},
                        "topics_discussed": {"type": "string", "description": "Key topics discussed during the interaction."},
                        "materials_shared": {"type": "string", "description": "Materials or documents shared with the HCP."},
                        "samples_distributed": {"type": "string", "description": "Samples of products distributed."},
                        "hcp_sentiment": {"type": "string", "description": "Observed sentiment of the HCP ('Positive', 'Neutral', 'Negative')."},
                        "outcomes": {"type": "string", "description": "Key outcomes, agreements, or decisions."},
                        "follow_up_actions": {"type": "string", "description": "Required follow-up actions."},
                        "summary": {"type": "string", "description": "A concise summary of the interaction."}
                    },
                    "required": ["hcp_name"],
                    "additionalProperties": false
                }),
            ),
            ToolKind::EditInteraction => ToolDef::function(
                self.name(),
                "Edits an existing interaction. Requires interaction_id and the fields to update.",
                json!({
                    "type": "object",
                    "properties": {
                        "interaction_id": {"type": "integer", "description": "The ID of the interaction to be edited."},
                        "hcp_id": {"type": "integer", "description": "The ID of the new HCP to link this interaction to, if changing HCP name."},
                        "interaction_type": {"type": "string", "description": "New type of interaction."},
                        "interaction_date": {"type": "string", "description": "New date of the interaction in YYYY-MM-DD format."},
                        "interaction_time": {"type": "string", "description": "New time of the interaction in HH:MM format (24-hour)."},
                        "attendees": {"type": "string", "description": "Updated comma-separated names of other attendees."},
                        "topics_discussed": {"type": "string", "description": "Updated key topics discussed."},
                        "materials_shared": {"type": "string", "description": "Updated materials or documents shared."},
                        "samples_distributed": {"type": "string", "description": "Updated samples distributed."},
                        "hcp_sentiment": {"type": "string", "description": "Updated HCP sentiment ('Positive', 'Neutral', 'Negative')."},
                        "outcomes": {"type": "string", "description": "Key outcomes, agreements, or decisions."},
                        "follow_up_actions": {"type": "string", "description": "Updated required follow-up actions."},
                        "summary": {"type": "string", "description": "Updated concise summary of the interaction."}
                    },
                    "required": ["interaction_id"],
                    "additionalProperties": false
                }),
            ),
            ToolKind::GetMostRecentInteractionByHcpName => ToolDef::function(
                self.name(),
                "Gets the most recent interaction for a given HCP name. Useful for finding \
                 interaction IDs when the user provides an HCP name for editing.",
                json!({
                    "type": "object",
                    "properties": {
                        "hcp_name": {"type": "string", "description": "The name of the HCP to look up the most recent interaction for."}
                    },
                    "required": ["hcp_name"],
                    "additionalProperties": false
                }),
            ),
            ToolKind::GetHcpByName => ToolDef::function(
                self.name(),
                "Gets an HCP's details by their name. Useful for finding an HCP's ID.",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "The full name of the HCP."}
                    },
                    "required": ["name"],
                    "additionalProperties": false
                }),
            ),
        }
    }
}

fn tool_definitions() -> Vec<ToolDef> {
    [
        ToolKind::CreateHcp,
        ToolKind::LogInteraction,
        ToolKind::EditInteraction,
        ToolKind::GetMostRecentInteractionByHcpName,
        ToolKind::GetHcpByName,
    ]
    .into_iter()
    .map(ToolKind::definition)
    .collect()
}

/// Where the loop goes after processing a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextNode {
    Model,
    End,
}

/// Per-request agent state: conversation plus the correlation fields of the
/// two-step HCP-name-correction flow.
struct AgentState {
    messages: Vec<ChatMessage>,
    user_input: String,
    found_interaction_id: Option<i32>,
    hcp_id_for_edit: Option<i32>,
    old_hcp_name: Option<String>,
    new_hcp_name: Option<String>,
}

impl AgentState {
    fn new(user_input: &str) -> Self {
        Self {
            messages: vec![ChatMessage::user(user_input)],
            user_input: user_input.to_string(),
            found_interaction_id: None,
            hcp_id_for_edit: None,
            old_hcp_name: None,
            new_hcp_name: None,
        }
    }

    /// Synthetic context messages carrying correlation state between steps.
    fn context_messages(&self) -> Vec<ChatMessage> {
        let mut context = Vec::new();
        if let Some(id) = self.found_interaction_id {
            context.push(ChatMessage::assistant(format!(
                "Tool context: Previous step found interaction ID: {id}"
            )));
        }
        if let Some(id) = self.hcp_id_for_edit {
            context.push(ChatMessage::assistant(format!(
                "Tool context: Previous step found new HCP ID: {id}"
            )));
        }
        if let Some(name) = &self.old_hcp_name {
            context.push(ChatMessage::assistant(format!(
                "Tool context: Old HCP name: {name}"
            )));
        }
        if let Some(name) = &self.new_hcp_name {
            context.push(ChatMessage::assistant(format!(
                "Tool context: New HCP name: {name}"
            )));
        }
        context
    }

    /// Capture correlation state from a successful lookup result.
    fn absorb(&mut self, tool: ToolKind, args: &JsonValue, output: &str) {
        let Ok(parsed) = serde_json::from_str::<JsonValue>(output) else {
            return;
        };
        if parsed.get("status").and_then(|s| s.as_str()) != Some("success") {
            return;
        }

        match tool {
            ToolKind::GetMostRecentInteractionByHcpName => {
                if let Some(id) = parsed
                    .get("interaction_object")
                    .and_then(|o| o.get("id"))
                    .and_then(|v| v.as_i64())
                {
                    self.found_interaction_id = Some(id as i32);
                    self.old_hcp_name = args
                        .get("hcp_name")
                        .and_then(|v| v.as_str())
                        .map(String::from);
                    if let Some(name) = correction_target(&self.user_input) {
                        self.new_hcp_name = Some(name);
                    }
                }
            }
            ToolKind::GetHcpByName => {
                if let Some(id) = parsed.get("hcp_id").and_then(|v| v.as_i64()) {
                    self.hcp_id_for_edit = Some(id as i32);
                }
            }
            _ => {}
        }
    }
}

/// Intended new HCP name in a correction request ("... should be Dr. X").
///
/// Known limitation: a heuristic over the original message with no fallback
/// when the phrasing differs; the model then has to ask.
pub fn correction_target(text: &str) -> Option<String> {
    CORRECTION_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Decide the next node from the most recent tool result.
///
/// The two correlation-producing lookups hand control back to the model so
/// it can issue the next call; any other definitive result terminates the
/// loop, as does anything unparseable.
fn route_after_tool(tool: ToolKind, output: &str) -> NextNode {
    let Ok(parsed) = serde_json::from_str::<JsonValue>(output) else {
        return NextNode::End;
    };
    let status = parsed.get("status").and_then(|s| s.as_str());

    match (tool, status) {
        (ToolKind::GetMostRecentInteractionByHcpName, Some("success")) => NextNode::Model,
        (ToolKind::GetHcpByName, Some("success")) => NextNode::Model,
        (_, Some("success" | "error")) => NextNode::End,
        _ => NextNode::End,
    }
}

/// Run the agent loop to completion.
pub async fn run(
    model: &impl ChatModel,
    store: &impl RecordStore,
    user_input: &str,
) -> Result<String, ChatError> {
    let mut state = AgentState::new(user_input);

    for iteration in 0..MAX_ITERATIONS {
        let mut outbound = state.context_messages();
        outbound.extend(state.messages.iter().cloned());

        let reply = model
            .complete(Some(SYSTEM_PROMPT), outbound, Some(tool_definitions()))
            .await
            .map_err(ChatError::Unexpected)?;

        tracing::debug!(
            iteration = iteration,
            tool_calls = reply.tool_calls.len(),
            "Agent loop iteration"
        );

        // No tool requested: the model's text is the final answer.
        if reply.tool_calls.is_empty() {
            return Ok(reply.content.unwrap_or_default());
        }

        state.messages.push(ChatMessage::assistant_tool_calls(
            reply.content.clone(),
            reply.tool_calls.clone(),
        ));

        let mut next = NextNode::End;
        let mut last_output = String::new();
        for call in &reply.tool_calls {
            let output = match ToolKind::from_name(&call.function.name) {
                Some(tool) => {
                    tracing::info!(tool = %call.function.name, "Executing agent tool");
                    let args: JsonValue = serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| json!({}));
                    let output = execute_tool(model, store, tool, &args, user_input).await;
                    state.absorb(tool, &args, &output);
                    next = route_after_tool(tool, &output);
                    output
                }
                None => {
                    next = NextNode::End;
                    format!("Tool '{}' not found or implemented.", call.function.name)
                }
            };
            last_output = output.clone();
            state
                .messages
                .push(ChatMessage::tool(call.id.clone(), call.function.name.clone(), output));
        }

        if next == NextNode::End {
            return Ok(final_message(&last_output));
        }
    }

    Err(ChatError::Unexpected(
        "agent loop exceeded maximum iterations".to_string(),
    ))
}

/// User-facing text for a terminal tool result.
fn final_message(output: &str) -> String {
    serde_json::from_str::<JsonValue>(output)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| output.to_string())
}

/// Execute one tool invocation against the record store.
async fn execute_tool(
    model: &impl ChatModel,
    store: &impl RecordStore,
    tool: ToolKind,
    args: &JsonValue,
    user_input: &str,
) -> String {
    let output = match tool {
        ToolKind::CreateHcp => execute_create_hcp(store, args).await,
        ToolKind::LogInteraction => execute_log_interaction(model, store, args, user_input).await,
        ToolKind::EditInteraction => execute_edit_interaction(store, args).await,
        ToolKind::GetMostRecentInteractionByHcpName => {
            execute_get_most_recent(store, args).await
        }
        ToolKind::GetHcpByName => execute_get_hcp_by_name(store, args).await,
    };
    output.to_string()
}

async fn execute_create_hcp(store: &impl RecordStore, args: &JsonValue) -> JsonValue {
    let Some(name) = str_arg(args, "name") else {
        return error_output("Missing required argument: name");
    };
    let new = NewHcp {
        name,
        specialty: str_arg(args, "specialty"),
        contact_info: str_arg(args, "contact_info"),
    };
    match store.create_hcp(&new).await {
        Ok(hcp) => json!({
            "status": "success",
            "message": format!("HCP '{}' created with ID {}.", hcp.name, hcp.id),
            "hcp": serde_json::to_value(&hcp).unwrap_or(JsonValue::Null),
        }),
        Err(e) => error_output(&format!("Failed to create HCP: {e}")),
    }
}

async fn execute_log_interaction(
    model: &impl ChatModel,
    store: &impl RecordStore,
    args: &JsonValue,
    user_input: &str,
) -> JsonValue {
    let Some(hcp_name) = str_arg(args, "hcp_name") else {
        return error_output("Missing required argument: hcp_name");
    };
    let hcp = match store.find_hcp_by_name(&hcp_name).await {
        Ok(Some(hcp)) => hcp,
        Ok(None) => return error_output(&format!("HCP '{hcp_name}' not found")),
        Err(e) => return error_output(&e.to_string()),
    };

    let interaction_date = match str_arg(args, "interaction_date") {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return error_output(&format!(
                    "Invalid date format for interaction_date: {raw}"
                ));
            }
        },
        None => interaction::today(),
    };

    // The model often omits the summary; fill it in with a dedicated
    // summarization call over the original message.
    let summary = match str_arg(args, "summary") {
        Some(summary) => summary,
        None => summarizer::summarize_for_log(model, user_input).await,
    };

    let new = NewInteraction {
        hcp_id: hcp.id,
        interaction_type: str_arg(args, "interaction_type")
            .unwrap_or_else(interaction::default_interaction_type),
        interaction_date,
        interaction_time: str_arg(args, "interaction_time")
            .unwrap_or_else(interaction::now_hhmm),
        attendees: str_arg(args, "attendees"),
        topics_discussed: str_arg(args, "topics_discussed"),
        materials_shared: str_arg(args, "materials_shared"),
        samples_distributed: str_arg(args, "samples_distributed"),
        hcp_sentiment: sentiment_arg(args),
        outcomes: str_arg(args, "outcomes"),
        follow_up_actions: str_arg(args, "follow_up_actions"),
        summary: Some(summary),
        raw_text_input: Some(
            str_arg(args, "raw_text_input").unwrap_or_else(|| user_input.to_string()),
        ),
    };

    match store.create_interaction(&new).await {
        Ok(created) => json!({
            "status": "success",
            "message": format!("Interaction logged for {hcp_name}"),
            "interaction_object": interaction_value(&created),
        }),
        Err(e) => error_output(&e.to_string()),
    }
}

async fn execute_edit_interaction(store: &impl RecordStore, args: &JsonValue) -> JsonValue {
    let Some(interaction_id) = args
        .get("interaction_id")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
    else {
        return error_output("Missing required argument: interaction_id");
    };

    let interaction_date = match str_arg(args, "interaction_date") {
        Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                return error_output(&format!(
                    "Invalid date format for interaction_date: {raw}"
                ));
            }
        },
        None => None,
    };

    let patch = InteractionPatch {
        hcp_id: args.get("hcp_id").and_then(|v| v.as_i64()).map(|v| v as i32),
        interaction_type: str_arg(args, "interaction_type"),
        interaction_date,
        interaction_time: str_arg(args, "interaction_time"),
        attendees: str_arg(args, "attendees"),
        topics_discussed: str_arg(args, "topics_discussed"),
        materials_shared: str_arg(args, "materials_shared"),
        samples_distributed: str_arg(args, "samples_distributed"),
        hcp_sentiment: str_arg(args, "hcp_sentiment")
            .as_deref()
            .and_then(Sentiment::classify),
        outcomes: str_arg(args, "outcomes"),
        follow_up_actions: str_arg(args, "follow_up_actions"),
        summary: str_arg(args, "summary"),
        raw_text_input: None,
    };

    match store.update_interaction(interaction_id, &patch).await {
        Ok(Some(updated)) => json!({
            "status": "success",
            "message": format!("Interaction {} updated successfully!", updated.id),
            "interaction_object": interaction_value(&updated),
        }),
        Ok(None) => error_output(&format!("Interaction with ID {interaction_id} not found.")),
        Err(e) => error_output(&format!(
            "Failed to update interaction {interaction_id}: {e}"
        )),
    }
}

async fn execute_get_most_recent(store: &impl RecordStore, args: &JsonValue) -> JsonValue {
    let Some(hcp_name) = str_arg(args, "hcp_name") else {
        return error_output("Missing required argument: hcp_name");
    };
    match store.find_most_recent_interaction(&hcp_name).await {
        Ok(Some(found)) => json!({
            "status": "success",
            "message": format!("Found interaction {} for {hcp_name}.", found.id),
            "interaction_object": interaction_value(&found),
        }),
        Ok(None) => error_output(&format!(
            "No recent interaction found for HCP '{hcp_name}'."
        )),
        Err(e) => error_output(&e.to_string()),
    }
}

async fn execute_get_hcp_by_name(store: &impl RecordStore, args: &JsonValue) -> JsonValue {
    let Some(name) = str_arg(args, "name") else {
        return error_output("Missing required argument: name");
    };
    match store.find_hcp_by_name(&name).await {
        Ok(Some(hcp)) => json!({
            "status": "success",
            "message": format!("Found HCP '{}' with ID {}.", hcp.name, hcp.id),
            "hcp_id": hcp.id,
        }),
        Ok(None) => error_output(&format!("HCP '{name}' not found. Please create HCP first.")),
        Err(e) => error_output(&e.to_string()),
    }
}

fn str_arg(args: &JsonValue, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

fn sentiment_arg(args: &JsonValue) -> Sentiment {
    str_arg(args, "hcp_sentiment")
        .as_deref()
        .and_then(Sentiment::classify)
        .unwrap_or_default()
}

fn interaction_value(interaction: &Interaction) -> JsonValue {
    serde_json::to_value(interaction).unwrap_or(JsonValue::Null)
}

fn error_output(message: &str) -> JsonValue {
    json!({"status": "error", "message": message})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::{FunctionCall, ModelReply, ToolCall};
    use crate::ai::testing::{FakeModel, MemoryStore};

    fn tool_reply(name: &str, arguments: JsonValue) -> ModelReply {
        ModelReply {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call-{name}"),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
        }
    }

    #[test]
    fn routing_loops_on_successful_lookups_and_stops_otherwise() {
        let success_lookup = r#"{"status": "success", "message": "found"}"#;
        let failure = r#"{"status": "error", "message": "nope"}"#;

        assert_eq!(
            route_after_tool(ToolKind::GetMostRecentInteractionByHcpName, success_lookup),
            NextNode::Model
        );
        assert_eq!(
            route_after_tool(ToolKind::GetHcpByName, success_lookup),
            NextNode::Model
        );
        assert_eq!(
            route_after_tool(ToolKind::GetMostRecentInteractionByHcpName, failure),
            NextNode::End
        );
        assert_eq!(
            route_after_tool(ToolKind::EditInteraction, success_lookup),
            NextNode::End
        );
        assert_eq!(
            route_after_tool(ToolKind::LogInteraction, failure),
            NextNode::End
        );
    }

    #[test]
    fn routing_terminates_on_unparseable_output() {
        assert_eq!(
            route_after_tool(ToolKind::GetHcpByName, "not json at all"),
            NextNode::End
        );
        assert_eq!(
            route_after_tool(ToolKind::GetHcpByName, r#"{"no_status": true}"#),
            NextNode::End
        );
    }

    #[test]
    fn correction_target_matches_should_be_phrasing() {
        assert_eq!(
            correction_target("It should be Dr. Vernika not Dr. Vaniya").as_deref(),
            Some("Dr. Vernika")
        );
        assert_eq!(correction_target("please fix the name"), None);
    }

    #[tokio::test]
    async fn plain_text_reply_ends_the_loop() {
        let store = MemoryStore::new();
        let model = FakeModel::with_text(["Which HCP do you mean?"]);

        let answer = run(&model, &store, "edit something").await.unwrap();

        assert_eq!(answer, "Which HCP do you mean?");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn name_correction_runs_the_three_step_choreography() {
        let store = MemoryStore::new();
        let old_hcp = store.add_hcp("Dr. Vaniya");
        let new_hcp = store.add_hcp("Dr. Vernika");
        let interaction_id = store.add_interaction(old_hcp, "2025-05-20");

        let model = FakeModel::new([
            tool_reply(
                "get_most_recent_interaction_by_hcp_name",
                json!({"hcp_name": "Dr. Vaniya"}),
            ),
            tool_reply("get_hcp_by_name", json!({"name": "Dr. Vernika"})),
            tool_reply(
                "edit_interaction",
                json!({"interaction_id": interaction_id, "hcp_id": new_hcp}),
            ),
        ]);

        let answer = run(
            &model,
            &store,
            "The last interaction should be Dr. Vernika not Dr. Vaniya",
        )
        .await
        .unwrap();

        assert_eq!(
            answer,
            format!("Interaction {interaction_id} updated successfully!")
        );
        assert_eq!(store.get_interaction(interaction_id).unwrap().hcp_id, new_hcp);
        // All three scripted replies were consumed, none more requested.
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn failed_lookup_is_terminal() {
        let store = MemoryStore::new();
        let model = FakeModel::new([tool_reply(
            "get_most_recent_interaction_by_hcp_name",
            json!({"hcp_name": "Dr. Unknown"}),
        )]);

        let answer = run(&model, &store, "fix Dr. Unknown's last visit")
            .await
            .unwrap();

        assert_eq!(answer, "No recent interaction found for HCP 'Dr. Unknown'.");
    }

    #[tokio::test]
    async fn log_interaction_fills_missing_summary_from_model() {
        let store = MemoryStore::new();
        let hcp = store.add_hcp("Dr. Adams");

        let model = FakeModel::new([
            tool_reply(
                "log_interaction",
                json!({"hcp_name": "Dr. Adams", "topics_discussed": "Product X"}),
            ),
            // Consumed by the summarizer inside the tool execution.
            ModelReply {
                content: Some("Auto summary".to_string()),
                tool_calls: Vec::new(),
            },
        ]);

        let answer = run(&model, &store, "met Dr. Adams about Product X")
            .await
            .unwrap();

        assert_eq!(answer, "Interaction logged for Dr. Adams");
        let created = store.get_interaction(1).unwrap();
        assert_eq!(created.hcp_id, hcp);
        assert_eq!(created.summary.as_deref(), Some("Auto summary"));
        assert_eq!(
            created.raw_text_input.as_deref(),
            Some("met Dr. Adams about Product X")
        );
    }

    #[tokio::test]
    async fn unknown_tool_terminates_with_plain_text() {
        let store = MemoryStore::new();
        let model = FakeModel::new([tool_reply("drop_database", json!({}))]);

        let answer = run(&model, &store, "anything").await.unwrap();

        assert_eq!(answer, "Tool 'drop_database' not found or implemented.");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn runaway_lookups_hit_the_iteration_cap() {
        let store = MemoryStore::new();
        store.add_hcp("Dr. Loop");

        let replies: Vec<ModelReply> = (0..MAX_ITERATIONS)
            .map(|_| tool_reply("get_hcp_by_name", json!({"name": "Dr. Loop"})))
            .collect();
        let model = FakeModel::new(replies);

        let err = run(&model, &store, "loop forever").await.unwrap_err();

        assert!(err.to_string().contains("maximum iterations"));
    }
}
