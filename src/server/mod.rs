//! A2A JSON-RPC server
//!
//! Exposes the agent card, a JSON-RPC endpoint for `message/send`,
//! `message/stream`, `tasks/get` and `tasks/cancel`, and a health check.
//! Tasks live in memory for the lifetime of the process.

pub mod a2a;

use crate::agent::RiskAgent;
use crate::repl::{help_text, Command};
use a2a::{
    codes, AgentCard, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, MessageSendParams,
    Task, TaskQueryParams, JSONRPC_VERSION,
};
use axum::{
    body::Bytes,
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{channel::mpsc, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tasks kept in memory before the oldest finished ones are evicted
pub const DEFAULT_TASK_CAPACITY: usize = 1024;

#[derive(Default)]
struct TaskMap {
    tasks: HashMap<String, Task>,
    /// Task ids in insertion order
    order: VecDeque<String>,
}

/// In-memory task store, bounded by evicting the oldest finished tasks.
/// Tasks still running are never evicted.
pub struct TaskStore {
    inner: Mutex<TaskMap>,
    capacity: usize,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TASK_CAPACITY)
    }
}

impl TaskStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TaskMap::default()),
            capacity,
        }
    }

    pub async fn save(&self, task: &Task) {
        let mut map = self.inner.lock().await;
        if map.tasks.insert(task.id.clone(), task.clone()).is_none() {
            map.order.push_back(task.id.clone());
        }

        let mut excess = map.tasks.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        let TaskMap { tasks, order } = &mut *map;
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = tasks
                .get(id)
                .map_or(true, |t| t.status.state.is_terminal());
            if finished {
                tasks.remove(id);
                excess -= 1;
            }
            !finished
        });
        debug!(tasks = tasks.len(), "Evicted finished tasks");
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.inner.lock().await.tasks.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }
}

/// Shared server state
pub struct ServerState {
    pub agent: Arc<RiskAgent>,
    pub card: AgentCard,
    pub tasks: TaskStore,
}

impl ServerState {
    pub fn new(agent: Arc<RiskAgent>) -> Self {
        let card = AgentCard::new(agent.config().server.public_url());
        Self {
            agent,
            card,
            tasks: TaskStore::default(),
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    agent: Arc<RiskAgent>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::Result<()> {
    let state = Arc::new(ServerState::new(agent));
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::Error::Server(format!("Failed to bind {}: {}", addr, e)))?;
    info!(addr = %addr, url = %state.card.url, "Starting A2A server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::Error::Server(e.to_string()))?;

    info!("A2A server stopped");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn agent_card(State(state): State<Arc<ServerState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

async fn handle_rpc(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice::<Value>(&body) {
        Err(e) => {
            return rpc_error(None, JsonRpcError::new(codes::PARSE_ERROR, e.to_string()));
        }
        Ok(value) => {
            let id = value
                .get("id")
                .cloned()
                .and_then(|id| serde_json::from_value(id).ok());
            match serde_json::from_value(value) {
                Ok(request) => request,
                Err(e) => {
                    return rpc_error(id, JsonRpcError::new(codes::INVALID_REQUEST, e.to_string()))
                }
            }
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return rpc_error(
            request.id,
            JsonRpcError::new(codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        );
    }

    debug!(method = %request.method, "A2A request");
    let id = request.id.clone();

    if request.method == "message/stream" {
        return match params::<MessageSendParams>(request.params) {
            Ok(params) => stream_message(state, id, params).into_response(),
            Err(e) => rpc_error(id, e),
        };
    }

    match dispatch(&state, request).await {
        Ok(result) => Json(JsonRpcResponse::success(id, result)).into_response(),
        Err(e) => rpc_error(id, e),
    }
}

/// Handle every non-streaming method
pub async fn dispatch(state: &ServerState, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
    match request.method.as_str() {
        "message/send" => {
            let params: MessageSendParams = params(request.params)?;
            let task = send_message(state, params).await?;
            to_value(&task)
        }
        "tasks/get" => {
            let query: TaskQueryParams = params(request.params)?;
            let task = state
                .tasks
                .get(&query.id)
                .await
                .ok_or_else(|| JsonRpcError::task_not_found(&query.id))?;
            to_value(&task.with_history_length(query.history_length))
        }
        "tasks/cancel" => {
            let query: TaskQueryParams = params(request.params)?;
            match state.tasks.get(&query.id).await {
                Some(_) => Err(JsonRpcError::task_not_cancelable(&query.id)),
                None => Err(JsonRpcError::task_not_found(&query.id)),
            }
        }
        other => Err(JsonRpcError::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        )),
    }
}

async fn send_message(state: &ServerState, params: MessageSendParams) -> Result<Task, JsonRpcError> {
    let text = user_text(&params)?;
    let mut task = Task::submitted(&params.message);
    task.working();
    state.tasks.save(&task).await;
    info!(task = %task.id, "Task started");

    match run_request(&state.agent, &text).await {
        Ok(output) => {
            task.complete(output);
        }
        Err(e) => {
            warn!(task = %task.id, error = %e, "Task failed");
            task.fail(&e.to_string());
        }
    }
    state.tasks.save(&task).await;
    Ok(task)
}

fn stream_message(
    state: Arc<ServerState>,
    id: Option<JsonRpcId>,
    params: MessageSendParams,
) -> Response {
    let text = match user_text(&params) {
        Ok(text) => text,
        Err(e) => return rpc_error(id, e),
    };

    let (tx, rx) = mpsc::unbounded::<Value>();
    let mut task = Task::submitted(&params.message);
    let event_id = id.clone();

    tokio::spawn(async move {
        let envelope = |result: Value| {
            serde_json::to_value(JsonRpcResponse::success(event_id.clone(), result))
                .unwrap_or(Value::Null)
        };

        let _ = tx.unbounded_send(envelope(json!(task)));
        let working = task.working();
        state.tasks.save(&task).await;
        let _ = tx.unbounded_send(envelope(json!(working)));

        match run_request(&state.agent, &text).await {
            Ok(output) => {
                let artifact = task.complete(output);
                state.tasks.save(&task).await;
                let _ = tx.unbounded_send(envelope(json!(artifact)));
                let done = a2a::TaskStatusUpdateEvent::new(&task, true);
                let _ = tx.unbounded_send(envelope(json!(done)));
            }
            Err(e) => {
                warn!(task = %task.id, error = %e, "Streaming task failed");
                let failed = task.fail(&e.to_string());
                state.tasks.save(&task).await;
                let _ = tx.unbounded_send(envelope(json!(failed)));
            }
        }
    });

    let events = rx.map(|value| Event::default().json_data(value));
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Route the message text like a REPL line
async fn run_request(agent: &RiskAgent, text: &str) -> crate::Result<String> {
    match Command::parse_line(text) {
        Command::Analyze(address) => Ok(agent.analyze(&address).await?.render_markdown()),
        Command::Quick(address) => Ok(agent.quick(&address).await?.render_markdown()),
        Command::Holders(address) => agent.holders(&address).await,
        Command::Trending => agent.trending().await,
        Command::Help => Ok(help_text()),
        Command::Chat(message) => agent.chat(&message).await,
        Command::Quit | Command::Empty => agent.chat(text).await,
    }
}

fn user_text(params: &MessageSendParams) -> Result<String, JsonRpcError> {
    let text = params.message.text();
    if text.trim().is_empty() {
        return Err(JsonRpcError::new(
            codes::INVALID_PARAMS,
            "message has no text parts",
        ));
    }
    Ok(text)
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(value).map_err(|e| JsonRpcError::new(codes::INVALID_PARAMS, e.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(codes::INTERNAL_ERROR, e.to_string()))
}

fn rpc_error(id: Option<JsonRpcId>, error: JsonRpcError) -> Response {
    Json(JsonRpcResponse::failure(id, error)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::tests::ScriptedModel;
    use crate::llm::{LlmError, ModelResponse};
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    async fn state(responses: Vec<Result<ModelResponse, LlmError>>) -> Arc<ServerState> {
        let mut agent = RiskAgent::with_backends(
            Config::default(),
            Arc::new(ScriptedModel::new(responses)),
            Arc::new(FixtureMarket::healthy()),
        );
        agent.initialize().await.unwrap();
        Arc::new(ServerState::new(Arc::new(agent)))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "req-1",
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    fn send_params(text: &str) -> Value {
        json!({
            "message": {
                "role": "user",
                "parts": [{ "kind": "text", "text": text }],
                "messageId": "m1",
                "kind": "message"
            }
        })
    }

    fn user_message(text: &str) -> a2a::Message {
        serde_json::from_value(send_params(text)["message"].clone()).unwrap()
    }

    #[tokio::test]
    async fn task_store_evicts_oldest_finished_tasks() {
        let store = TaskStore::with_capacity(2);

        let mut running = Task::submitted(&user_message("analyze a"));
        running.working();
        store.save(&running).await;

        let mut finished = Vec::new();
        for text in ["quick b", "quick c", "quick d"] {
            let mut task = Task::submitted(&user_message(text));
            task.complete("done".to_string());
            store.save(&task).await;
            finished.push(task.id);
        }

        assert_eq!(store.len().await, 2);
        assert!(store.get(&running.id).await.is_some());
        assert!(store.get(&finished[0]).await.is_none());
        assert!(store.get(&finished[1]).await.is_none());
        assert!(store.get(&finished[2]).await.is_some());
    }

    #[tokio::test]
    async fn send_completes_task_and_stores_it() {
        let state = state(vec![Ok(ModelResponse::text("Top tokens: SOL"))]).await;

        let result = dispatch(&state, request("message/send", send_params("trending")))
            .await
            .unwrap();
        assert_eq!(result["status"]["state"], "completed");
        assert_eq!(result["artifacts"][0]["parts"][0]["text"], "Top tokens: SOL");

        let id = result["id"].as_str().unwrap().to_string();
        let fetched = dispatch(&state, request("tasks/get", json!({ "id": id })))
            .await
            .unwrap();
        assert_eq!(fetched, result);
        assert_eq!(state.tasks.len().await, 1);
    }

    #[tokio::test]
    async fn quick_command_needs_no_model() {
        let state = state(vec![]).await;
        let text = format!("quick {}", addresses::SOL);
        let result = dispatch(&state, request("message/send", send_params(&text)))
            .await
            .unwrap();
        let output = result["artifacts"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(output.contains("Token Overview: SOL"));
    }

    #[tokio::test]
    async fn agent_errors_fail_the_task() {
        let state = state(vec![]).await;
        let result = dispatch(&state, request("message/send", send_params("analyze nope")))
            .await
            .unwrap();
        assert_eq!(result["status"]["state"], "failed");
        assert!(result["status"]["message"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid token address"));
    }

    #[tokio::test]
    async fn cancel_is_not_supported() {
        let state = state(vec![Ok(ModelResponse::text("done"))]).await;
        let task = dispatch(&state, request("message/send", send_params("hello")))
            .await
            .unwrap();

        let err = dispatch(&state, request("tasks/cancel", json!({ "id": task["id"] })))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::TASK_NOT_CANCELABLE);

        let err = dispatch(&state, request("tasks/cancel", json!({ "id": "missing" })))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn protocol_errors() {
        let state = state(vec![]).await;
        let err = dispatch(&state, request("tasks/resubscribe", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);

        let err = dispatch(&state, request("message/send", json!({ "message": "hi" })))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);

        let err = dispatch(&state, request("message/send", send_params("  ")))
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn http_endpoints_over_a_live_listener() {
        let state = state(vec![Ok(ModelResponse::text("pong"))]).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let card: Value = client
            .get(format!("{}/.well-known/agent-card.json", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(card["name"], "DeFi Risk Assessment Agent");
        assert_eq!(card["skills"].as_array().unwrap().len(), 3);

        let health = client.get(format!("{}/health", base)).send().await.unwrap();
        assert!(health.status().is_success());

        let parse_error: Value = client
            .post(&base)
            .body("{not json")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(parse_error["error"]["code"], codes::PARSE_ERROR);

        let response: Value = client
            .post(&base)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "message/send",
                "params": send_params("ping"),
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["artifacts"][0]["parts"][0]["text"], "pong");
    }

    #[tokio::test]
    async fn stream_emits_working_artifact_and_completed() {
        let state = state(vec![Ok(ModelResponse::text("streamed"))]).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let body = reqwest::Client::new()
            .post(format!("http://{}/", addr))
            .json(&json!({
                "jsonrpc": "2.0",
                "id": "s1",
                "method": "message/stream",
                "params": send_params("hello"),
            }))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let events: Vec<Value> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).unwrap())
            .collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0]["result"]["kind"], "task");
        assert_eq!(events[1]["result"]["status"]["state"], "working");
        assert_eq!(events[2]["result"]["artifact"]["parts"][0]["text"], "streamed");
        assert_eq!(events[3]["result"]["status"]["state"], "completed");
        assert_eq!(events[3]["result"]["final"], true);
        assert_eq!(events[3]["id"], "s1");
    }
}
