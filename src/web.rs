use crate::{
    app::{App, AppError},
    eid::Eid,
    ingest::UploadReport,
    session::{SessionDetail, SessionSummary},
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Audio windows and lecture notes both fit comfortably below this.
const BODY_LIMIT: usize = 25 * 1024 * 1024;

type SharedState = Arc<App>;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/recording", post(set_recording))
        .route("/api/transcribe", post(transcribe))
        .route("/api/upload", post(upload))
        .route("/api/chat", post(chat))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(app)
}

async fn serve(app: App, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");

    axum::serve(listener, router(Arc::new(app)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down, waiting for in-flight requests");
}

pub fn start_daemon(app: App, addr: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(app, addr))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::Validation(_) | AppError::InvalidChunking(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::External { .. } => {
                log::error!("{:?}", self.0);
                StatusCode::BAD_GATEWAY
            }
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AppError::Other(_) => {
                log::error!("{:?}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn bad_request(message: impl Into<String>) -> HttpError {
    HttpError(AppError::validation(message))
}

/// Cancels in-flight provider calls if the client goes away.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

async fn list_sessions(State(app): State<SharedState>) -> Json<Vec<SessionSummary>> {
    Json(app.registry().summaries())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    name: Option<String>,
    class_name: Option<String>,
}

async fn create_session(
    State(app): State<SharedState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<Json<Value>, HttpError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let session = app.create_session(payload.name.as_deref(), payload.class_name.as_deref())?;

    Ok(Json(json!({
        "id": session.id,
        "name": session.name,
        "className": session.class_name,
    })))
}

async fn get_session(
    State(app): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, HttpError> {
    let id = Eid::from(id);
    app.registry()
        .detail(&id)
        .map(Json)
        .ok_or(HttpError(AppError::SessionNotFound(id)))
}

async fn delete_session(State(app): State<SharedState>, Path(id): Path<String>) -> Json<Value> {
    app.registry().delete_session(&Eid::from(id));
    Json(json!({"ok": true}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingRequest {
    is_recording: bool,
}

async fn set_recording(
    State(app): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<RecordingRequest>,
) -> Result<Json<Value>, HttpError> {
    let id = Eid::from(id);
    if !app.registry().set_recording(&id, payload.is_recording) {
        return Err(HttpError(AppError::SessionNotFound(id)));
    }
    Ok(Json(json!({"ok": true})))
}

/// Multipart fields shared by the transcribe and upload forms.
#[derive(Debug, Default)]
struct UploadForm {
    session_id: Option<String>,
    file: Option<(String, Vec<u8>)>,
    timestamp: Option<String>,
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, HttpError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed form: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "sessionId" => {
                form.session_id = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?)
            }
            "timestamp" => {
                form.timestamp = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?)
            }
            n if n == file_field => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
                form.file = Some((filename, bytes.to_vec()));
            }
            other => log::debug!("ignoring form field {other}"),
        }
    }

    Ok(form)
}

async fn transcribe(
    State(app): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Value>, HttpError> {
    let form = read_form(multipart, "audio").await?;
    let (Some(session_id), Some((filename, audio))) = (form.session_id, form.file) else {
        return Err(bad_request("Missing audio or sessionId"));
    };

    let timestamp = form
        .timestamp
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    let filename = if filename.is_empty() {
        "audio.webm".to_string()
    } else {
        filename
    };

    let (cancel, _guard) = request_token();
    let segment = app
        .ingest
        .append_transcript(&Eid::from(session_id), audio, &filename, timestamp, &cancel)
        .await?;

    Ok(Json(match segment {
        Some(segment) => json!({
            "id": segment.id,
            "text": segment.text,
            "timestamp": segment.timestamp,
        }),
        None => json!({"text": "", "id": null}),
    }))
}

async fn upload(
    State(app): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<UploadReport>, HttpError> {
    let form = read_form(multipart, "file").await?;
    let (Some(session_id), Some((filename, bytes))) = (form.session_id, form.file) else {
        return Err(bad_request("Missing file or sessionId"));
    };

    let (cancel, _guard) = request_token();
    let report = app
        .ingest
        .ingest_document(&Eid::from(session_id), &filename, bytes, &cancel)
        .await?;

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    session_id: Option<String>,
    message: Option<String>,
}

async fn chat(
    State(app): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<Value>, HttpError> {
    let (Some(session_id), Some(message)) = (payload.session_id, payload.message) else {
        return Err(bad_request("Missing sessionId or message"));
    };

    let (cancel, _guard) = request_token();
    let reply = app
        .assistant
        .ask(&Eid::from(session_id), &message, &cancel)
        .await?;

    Ok(Json(json!({
        "id": reply.id,
        "role": reply.role,
        "content": reply.content,
    })))
}
