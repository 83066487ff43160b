use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use doc_chat::config::Settings;
use doc_chat::files::FileStore;
use doc_chat::llm::{ChatClient, CompletionModel};
use doc_chat::models::{
    ChatRequest, ChatResponse, DeleteRequest, FileInfo, PipelineStatus, StatusMessage,
};
use doc_chat::rag::{Embedder, RagPipeline, RemoteEmbedder};

struct AppState {
    /// Swappable pipeline handle: chat takes a read lock and clones the
    /// Arc, so in-flight turns keep the old instance alive across a swap.
    pipeline: RwLock<Arc<RagPipeline>>,
    file_store: FileStore,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn CompletionModel>,
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenv::dotenv().ok();
    let settings = Settings::from_env()?;

    let file_store = FileStore::new(settings.upload_dir.clone())?;
    let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(
        settings.api_base.clone(),
        settings.api_key.clone(),
        settings.embedding_model.clone(),
    ));
    let llm: Arc<dyn CompletionModel> = Arc::new(ChatClient::new(
        settings.api_base.clone(),
        settings.api_key.clone(),
        settings.chat_model.clone(),
        settings.temperature,
    ));

    tracing::info!("Building initial pipeline from {}", file_store.root().display());
    let pipeline = RagPipeline::build(
        file_store.root(),
        &settings,
        embedder.clone(),
        llm.clone(),
    )
    .await?;

    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState {
        pipeline: RwLock::new(Arc::new(pipeline)),
        file_store,
        embedder,
        llm,
        settings,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(chat_handler))
        .route(
            "/api/files",
            get(list_files_handler)
                .post(upload_handler)
                .delete(delete_handler),
        )
        .route("/api/status", get(status_handler))
        .route("/api/health", get(health_check))
        .fallback_service(ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("doc-chat listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build a replacement pipeline from the current folder contents and swap
/// it in. The build runs outside the lock; a failure leaves the previous
/// pipeline serving.
async fn rebuild_pipeline(state: &AppState) -> Result<()> {
    let replacement = RagPipeline::build(
        state.file_store.root(),
        &state.settings,
        state.embedder.clone(),
        state.llm.clone(),
    )
    .await?;
    *state.pipeline.write().await = Arc::new(replacement);
    tracing::info!("Pipeline replaced after folder change");
    Ok(())
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let pipeline = state.pipeline.read().await.clone();

    let outcome = pipeline.answer(&request.message).await.map_err(|e| {
        tracing::error!("Chat turn failed: {}", e);
        (StatusCode::BAD_GATEWAY, format!("Chat error: {}", e))
    })?;

    Ok(Json(ChatResponse {
        answer: outcome.answer,
        sources: outcome.sources,
    }))
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<StatusMessage>, (StatusCode, String)> {
    let mut statuses = Vec::new();
    let mut saved_any = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)))?;

        match state.file_store.save(&file_name, &bytes) {
            Ok(path) => {
                saved_any = true;
                statuses.push(format!("File uploaded to: {}", path.display()));
            }
            Err(e) => statuses.push(e),
        }
    }

    if !saved_any && statuses.is_empty() {
        return Ok(Json(StatusMessage {
            status: "No file uploaded".to_string(),
        }));
    }

    if saved_any {
        rebuild_pipeline(&state).await.map_err(|e| {
            tracing::error!("Rebuild after upload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Uploaded, but rebuild failed: {}", e),
            )
        })?;
    }

    Ok(Json(StatusMessage {
        status: statuses.join("\n"),
    }))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<StatusMessage>, (StatusCode, String)> {
    let mut messages = Vec::new();
    let mut removed_any = false;

    for path in &request.paths {
        match state.file_store.remove(path) {
            Ok(name) => {
                removed_any = true;
                messages.push(format!("Deleted: {}", name));
            }
            Err(e) => messages.push(format!("Error deleting {}: {}", path, e)),
        }
    }

    if removed_any {
        rebuild_pipeline(&state).await.map_err(|e| {
            tracing::error!("Rebuild after delete failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Deleted, but rebuild failed: {}", e),
            )
        })?;
    }

    Ok(Json(StatusMessage {
        status: messages.join("\n"),
    }))
}

async fn list_files_handler(State(state): State<Arc<AppState>>) -> Json<Vec<FileInfo>> {
    Json(state.file_store.list(state.settings.plain_text_files))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<PipelineStatus> {
    let pipeline = state.pipeline.read().await.clone();
    let stats = pipeline.stats().clone();

    Json(PipelineStatus {
        total_files: stats.total_files,
        failed_files: stats.failed_files,
        total_chunks: stats.total_chunks,
        index_entries: pipeline.index_len(),
        memory_turns: pipeline.memory_len().await,
        built_at: stats.built_at,
        upload_dir: state.file_store.root().display().to_string(),
    })
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
