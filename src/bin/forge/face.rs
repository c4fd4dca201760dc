use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use scenario_forge::{Framework, GeneratedArtifact, NormalizedHistory, Platform};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

/// Events streamed to clients via SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    ScenarioStarted { number: usize, title: String },
    Step { number: usize, description: String },
    StepError { message: String },
    ScenarioComplete { summary: String },
    RunError { message: String },
    Thinking,
    Ready,
}

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::ScenarioStarted { .. } => "scenario_started",
            AgentEvent::Step { .. } => "step",
            AgentEvent::StepError { .. } => "step_error",
            AgentEvent::ScenarioComplete { .. } => "scenario_complete",
            AgentEvent::RunError { .. } => "run_error",
            AgentEvent::Thinking => "thinking",
            AgentEvent::Ready => "ready",
        }
    }

    fn to_sse_event(&self) -> Event {
        Event::default()
            .event(self.name())
            .data(serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string()))
    }
}

pub type Reply<T> = oneshot::Sender<Result<T, String>>;

/// Work handed to the command loop that owns the session store and the browser.
pub enum Command {
    Author {
        story: String,
        platform: Platform,
        reply: Reply<String>,
    },
    Execute { gherkin: String, reply: Reply<Arc<NormalizedHistory>> },
    Generate { framework: Framework, reply: Reply<GeneratedArtifact> },
    History { reply: Reply<Option<Arc<NormalizedHistory>>> },
}

struct AppState {
    cmd_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<AgentEvent>,
}

#[derive(Deserialize)]
struct StoryPayload {
    story: String,
    #[serde(default)]
    platform: Platform,
}

#[derive(Deserialize)]
struct GherkinPayload {
    gherkin: String,
}

#[derive(Deserialize)]
struct GeneratePayload {
    framework: String,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

/// Bind the API on the first free port from `port`. Returns the shared channels.
pub async fn start_server(
    port: u16,
) -> anyhow::Result<(mpsc::Receiver<Command>, broadcast::Sender<AgentEvent>)> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(1);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);

    let state = Arc::new(AppState {
        cmd_tx,
        event_tx: event_tx.clone(),
    });

    let app = Router::new()
        .route("/frameworks", get(frameworks_handler))
        .route("/gherkin", post(gherkin_handler))
        .route("/execute", post(execute_handler))
        .route("/generate", post(generate_handler))
        .route("/history", get(history_handler))
        .route("/events", get(sse_handler))
        .with_state(state);

    // Try the requested port, fall back to the next nine if in use
    let mut bound = None;
    for p in port..port.saturating_add(10) {
        if let Ok(l) = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", p)).await {
            bound = Some((l, p));
            break;
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow::anyhow!("Could not bind to any port {}-{}", port, port.saturating_add(9))
    })?;

    info!("API running at http://localhost:{}", port);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("server stopped: {}", e);
        }
    });

    Ok((cmd_rx, event_tx))
}

async fn dispatch<T>(
    state: &AppState,
    build: impl FnOnce(Reply<T>) -> Command,
) -> Result<T, (StatusCode, Json<Value>)> {
    let (reply, rx) = oneshot::channel();
    state
        .cmd_tx
        .send(build(reply))
        .await
        .map_err(|_| api_error(StatusCode::SERVICE_UNAVAILABLE, "command loop stopped"))?;
    rx.await
        .map_err(|_| api_error(StatusCode::SERVICE_UNAVAILABLE, "command dropped"))?
        .map_err(|message| api_error(StatusCode::UNPROCESSABLE_ENTITY, message))
}

async fn frameworks_handler() -> Json<Value> {
    let frameworks: Vec<Value> = Framework::ALL
        .iter()
        .map(|f| {
            json!({
                "id": f.id(),
                "name": f.display_name(),
                "extension": f.file_extension(),
                "syntax": f.syntax_hint(),
                "platform": f.platform(),
            })
        })
        .collect();
    Json(json!({ "frameworks": frameworks }))
}

async fn gherkin_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StoryPayload>,
) -> ApiResult {
    info!("POST /gherkin ({} chars)", payload.story.len());
    let gherkin = dispatch(&state, |reply| Command::Author {
        story: payload.story,
        platform: payload.platform,
        reply,
    })
    .await?;
    Ok(Json(json!({ "gherkin": gherkin })))
}

async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GherkinPayload>,
) -> ApiResult {
    info!("POST /execute");
    let history = dispatch(&state, |reply| Command::Execute {
        gherkin: payload.gherkin,
        reply,
    })
    .await?;
    Ok(Json(json!(&*history)))
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GeneratePayload>,
) -> ApiResult {
    info!("POST /generate: {}", payload.framework);
    let framework = Framework::lookup(&payload.framework)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let artifact = dispatch(&state, |reply| Command::Generate { framework, reply }).await?;
    Ok(Json(json!({
        "filename": artifact.filename,
        "language": framework.syntax_hint(),
        "code": artifact.code,
    })))
}

async fn history_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    match dispatch(&state, |reply| Command::History { reply }).await? {
        Some(history) => Ok(Json(json!(&*history))),
        None => Err(api_error(StatusCode::NOT_FOUND, "no execution history yet")),
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<AgentEvent, _>| match result {
            Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
            Err(_) => None,
        });
    Sse::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = AgentEvent::Step {
            number: 2,
            description: "Click { index: 7 }".to_string(),
        };
        assert_eq!(event.name(), "step");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "step", "number": 2, "description": "Click { index: 7 }"})
        );
    }

    #[tokio::test]
    async fn framework_listing_is_the_registry() {
        let Json(body) = frameworks_handler().await;
        let names: Vec<&str> = body["frameworks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), Framework::ALL.len());
        assert!(names.contains(&"Cypress (JavaScript)"));
    }

    #[test]
    fn story_platform_defaults_to_web() {
        let web: StoryPayload = serde_json::from_value(json!({"story": "log in"})).unwrap();
        assert_eq!(web.platform, Platform::Web);
        let mobile: StoryPayload =
            serde_json::from_value(json!({"story": "log in", "platform": "mobile"})).unwrap();
        assert_eq!(mobile.platform, Platform::Mobile);
    }
}
