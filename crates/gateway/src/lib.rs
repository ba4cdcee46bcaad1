//! HTTP gateway for Wegweiser.
//!
//! Exposes the advisory loop as a stateless chat endpoint:
//!
//! - `POST /chat`  — run one loop invocation over wire-supplied history
//! - `GET  /health` — liveness probe
//!
//! The server holds no session state. Every request carries the full
//! chat history and the conversation is rebuilt from it, run, and
//! discarded; a suspension is continued by echoing back the
//! `tool_call_id` from the previous response together with the human's
//! answer in `user_input`.
//!
//! CORS is fully open. The gateway is a development-stage surface meant
//! to sit behind whatever frontend is being prototyped against it.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use wegweiser_agent::{AgentLoop, Classified, LoopOutcome, classify, system_prompt};
use wegweiser_config::{AppConfig, Protocol};
use wegweiser_core::error::Error;
use wegweiser_core::message::{Conversation, Message, MessageToolCall};
use wegweiser_core::provider::Provider;
use wegweiser_core::tool::ToolRegistry;
use wegweiser_tools::HUMAN_FEEDBACK_TOOL_NAME;

/// Reply sent when the loop hits its cycle bound without terminating.
const EXHAUSTED_REPLY: &str =
    "I could not finish my research within the allowed number of steps. \
     Please try again with a narrower question.";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: AgentLoop,
    pub config: AppConfig,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    // Open CORS on purpose: the gateway serves whichever prototype
    // frontend is pointed at it, from any origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = wegweiser_providers::build_from_config(&config)
        .ok_or("no provider configured — set OPENAI_API_KEY or openai_api_key in config")?;
    let tavily_key = config.tavily_api_key.clone().unwrap_or_default();
    let tools = Arc::new(wegweiser_tools::default_registry(tavily_key));

    let prompt = config
        .system_prompt_override
        .clone()
        .unwrap_or_else(|| system_prompt(&config.protocol));

    let agent = AgentLoop::new(
        provider,
        &config.default_model,
        config.default_temperature,
        tools,
        prompt,
    )
    .with_max_cycles(config.max_cycles)
    .with_max_tokens(config.default_max_tokens);

    let state = Arc::new(GatewayState { agent, config });
    let router = build_router(state);

    info!(%addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

// ── Wire types ────────────────────────────────────────────────────────────

/// One prior turn of the chat, as the frontend stores it. Only the text
/// of human and assistant turns crosses the wire; tool traffic stays
/// server-side within a single request.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Human,
    Ai,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The new human turn — or, when `tool_call_id` is set, the answer
    /// to the question the agent asked.
    pub user_input: String,

    /// Prior turns, oldest first.
    #[serde(default)]
    pub chat_history: Vec<HistoryItem>,

    /// Echo of the `tool_call_id` from a suspended response.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// A string for plain answers and questions; a JSON object when the
    /// agent produced structured recommendations.
    pub response: serde_json::Value,

    /// Present iff the agent is waiting on the human. The client sends it
    /// back unchanged to resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!(
        history_len = payload.chat_history.len(),
        resuming = payload.tool_call_id.is_some(),
        "chat request"
    );

    let mut conversation = rebuild_conversation(&payload);

    let outcome = state.agent.run(&mut conversation).await.map_err(|e| {
        error!(error = %e, "control loop failed");
        let status = match &e {
            Error::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let response = match outcome {
        LoopOutcome::Completed(content) => {
            let response = match classify(&content, &state.config.protocol) {
                Classified::Structured(set) => {
                    serde_json::to_value(set).unwrap_or(serde_json::Value::String(content))
                }
                Classified::Final(text)
                | Classified::Question(text)
                | Classified::Intermediate(text) => {
                    // Under the markers protocol the client interprets
                    // [PAUSE_FOR_INPUT] / [TASK_COMPLETE] itself, so the
                    // raw content crosses the wire unmodified. Stripping
                    // would make a pending question indistinguishable
                    // from a terminal answer.
                    let text = match state.config.protocol {
                        Protocol::Markers => content,
                        Protocol::ToolCalls => text,
                    };
                    serde_json::Value::String(text)
                }
            };
            ChatResponse {
                response,
                tool_call_id: None,
            }
        }
        LoopOutcome::Suspended {
            question,
            tool_call_id,
        } => ChatResponse {
            response: serde_json::Value::String(question),
            tool_call_id: Some(tool_call_id),
        },
        LoopOutcome::Exhausted => ChatResponse {
            response: serde_json::Value::String(EXHAUSTED_REPLY.into()),
            tool_call_id: None,
        },
    };

    Ok(Json(response))
}

/// Rebuild a server-side conversation from the wire history.
///
/// When the request resumes a suspension, the wire history does not
/// carry the assistant's tool call (only text crosses the wire), so the
/// call is reconstructed under the echoed id and immediately resolved
/// with the human's answer. The loop then sees a fully-answered
/// conversation and takes its next model step.
fn rebuild_conversation(payload: &ChatRequest) -> Conversation {
    let mut conversation = Conversation::new();

    for item in &payload.chat_history {
        let message = match item.kind {
            HistoryKind::Human => Message::user(&item.content),
            HistoryKind::Ai => Message::assistant(&item.content),
        };
        conversation.push(message);
    }

    match &payload.tool_call_id {
        Some(call_id) => {
            let question = conversation
                .messages
                .iter()
                .rev()
                .find(|m| m.role == wegweiser_core::message::Role::Assistant)
                .map(|m| m.content.clone())
                .unwrap_or_default();

            let mut asking = Message::assistant("");
            asking.tool_calls = vec![MessageToolCall {
                id: call_id.clone(),
                name: HUMAN_FEEDBACK_TOOL_NAME.to_string(),
                arguments: serde_json::json!({ "question": question }).to_string(),
            }];
            // The last history item is the question the frontend already
            // displayed; the reconstructed call replaces it as the
            // canonical form of that turn.
            if conversation
                .messages
                .last()
                .is_some_and(|m| m.role == wegweiser_core::message::Role::Assistant)
            {
                conversation.messages.pop();
            }
            conversation.push(asking);
            conversation.push(Message::tool_result(call_id, &payload.user_input));
        }
        None => {
            conversation.push(Message::user(&payload.user_input));
        }
    }

    conversation
}

/// Build a gateway state around an already-constructed provider and
/// registry. Used by tests and embedders that manage their own wiring.
pub fn state_with(
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AppConfig,
) -> SharedState {
    let prompt = config
        .system_prompt_override
        .clone()
        .unwrap_or_else(|| system_prompt(&config.protocol));
    let agent = AgentLoop::new(
        provider,
        &config.default_model,
        config.default_temperature,
        tools,
        prompt,
    )
    .with_max_cycles(config.max_cycles)
    .with_max_tokens(config.default_max_tokens);
    Arc::new(GatewayState { agent, config })
}
