use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use puzzle_core::{
    is_known_category, regenerate_grids, render_variants, GameDefinition, GameId, GameRound,
    GameStatus, ImageAsset, ImageId, OutputFormat, PhaseDurations, RenderOptions, Variant,
    VariantUrls,
};
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

pub mod config;
pub mod sessions;
pub mod storage;

use config::Config;
use sessions::{ServerMessage, SessionRecord, SessionSummary};
use storage::{BlobStore, StorageError};

const IDEMPOTENCY_HEADER: &str = "idempotency-key";

#[derive(Clone)]
pub struct AppState {
    pub(crate) catalog: Arc<RwLock<Catalog>>,
    pub(crate) sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    pub(crate) channels: Arc<RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>>,
    pub(crate) blobs: BlobStore,
    pub(crate) render: RenderOptions,
    pub(crate) tick_interval: Duration,
    pub(crate) max_upload_bytes: usize,
    pub(crate) session_grace: Duration,
    pub(crate) idle_session_ttl: Duration,
    persist_path: Option<PathBuf>,
}

impl Default for AppState {
    fn default() -> Self {
        let config = Config::default();
        Self {
            catalog: Arc::new(RwLock::new(Catalog::default())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            blobs: BlobStore::in_memory(config.public_base_url.clone()),
            render: config.render_options(),
            tick_interval: config.tick_interval,
            max_upload_bytes: config.max_upload_bytes,
            session_grace: config.session_grace,
            idle_session_ttl: config.idle_session_ttl,
            persist_path: None,
        }
    }
}

impl AppState {
    pub async fn from_config(config: &Config) -> Self {
        let blobs = match &config.blob_dir {
            Some(dir) => BlobStore::on_disk(dir, config.public_base_url.clone()),
            None => BlobStore::in_memory(config.public_base_url.clone()),
        };
        let state = Self {
            blobs,
            render: config.render_options(),
            tick_interval: config.tick_interval,
            max_upload_bytes: config.max_upload_bytes,
            session_grace: config.session_grace,
            idle_session_ttl: config.idle_session_ttl,
            ..Self::default()
        };
        match &config.persist_path {
            Some(path) => state.with_persistence(path.clone()).await,
            None => state,
        }
    }

    pub async fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.persist_path = Some(path.clone());
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Catalog>(&bytes) {
                Ok(saved) => {
                    info!(
                        images = saved.images.len(),
                        games = saved.games.len(),
                        "loaded catalog from {}",
                        path.display()
                    );
                    *self.catalog.write().await = saved;
                }
                Err(err) => warn!("ignoring unreadable catalog {}: {err}", path.display()),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("cannot read catalog {}: {err}", path.display()),
        }
        self
    }

    pub(crate) async fn persist(&self) {
        if let Some(path) = &self.persist_path {
            let snapshot = {
                let catalog = self.catalog.read().await;
                catalog.clone()
            };
            if let Ok(json) = serde_json::to_vec_pretty(&snapshot) {
                if let Err(err) = tokio::fs::write(path, json).await {
                    warn!("persist error: {err}");
                }
            }
        }
    }

    pub(crate) async fn log_session(&self, summary: SessionSummary) {
        info!(
            session = %summary.session_id,
            score = summary.score,
            total = summary.total_rounds,
            "session completed"
        );
        self.catalog.write().await.session_log.push(summary);
        self.persist().await;
    }
}

/// Everything that outlives a request: images, games, used idempotency keys
/// and the log of finished sessions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub images: HashMap<ImageId, ImageAsset>,
    pub games: HashMap<GameId, GameDefinition>,
    #[serde(default)]
    pub idempotency: HashMap<String, ImageId>,
    #[serde(default)]
    pub session_log: Vec<SessionSummary>,
}

impl Catalog {
    fn image_for_key(&self, key: Option<&str>) -> Option<&ImageAsset> {
        key.and_then(|key| self.idempotency.get(key))
            .and_then(|id| self.images.get(id))
    }
}

pub fn app(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/images", get(list_images).post(upload_image))
        .route(
            "/images/:id",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/images/:id/regenerate", post(regenerate_image))
        .route("/blobs/*key", get(get_blob))
        .route("/games", get(list_games).post(create_game))
        .route(
            "/games/:id",
            get(get_game).put(update_game).delete(delete_game),
        )
        .route("/games/:id/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            get(sessions::get_session).delete(sessions::abandon_session),
        )
        .route("/sessions/:id/start", post(sessions::start_session))
        .route("/sessions/:id/guess", post(sessions::submit_guess))
        .route("/sessions/:id/restart", post(sessions::restart_session))
        .route("/ws/sessions/:id", get(sessions::ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Deserialize)]
struct UploadParams {
    name: String,
    category: String,
    format: Option<String>,
    #[serde(default)]
    published: bool,
    /// Comma separated.
    tags: Option<String>,
}

fn parse_tags(raw: Option<&str>) -> Vec<String> {
    clean_tags(raw.unwrap_or_default().split(','))
}

// Trimmed, non-empty, first spelling wins among case-insensitive duplicates.
fn clean_tags<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    tags
}

async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> impl IntoResponse {
    let name = params.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }
    if !is_known_category(&params.category) {
        return (StatusCode::BAD_REQUEST, "unknown category").into_response();
    }
    let format = match params.format.as_deref().map(str::parse::<OutputFormat>) {
        None => state.render.format,
        Some(Ok(format)) => format,
        Some(Err(err)) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "no image provided").into_response();
    }

    let key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);
    if let Some(existing) = state.catalog.read().await.image_for_key(key.as_deref()) {
        return (StatusCode::OK, Json(existing.clone())).into_response();
    }

    let options = RenderOptions {
        format,
        ..state.render
    };
    let rendered = match tokio::task::spawn_blocking(move || {
        render_variants(&body, &options, &mut thread_rng())
    })
    .await
    {
        Ok(Ok(rendered)) => rendered,
        Ok(Err(err)) => {
            warn!("rejected upload {name:?}: {err}");
            return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response();
        }
        Err(err) => {
            warn!("render task failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "render failed").into_response();
        }
    };

    let image_id = Uuid::new_v4().to_string();
    let stored = futures::try_join!(
        store_variant(&state.blobs, Variant::Original, &image_id, format, rendered.original),
        store_variant(&state.blobs, Variant::Grid15, &image_id, format, rendered.grids.grid15),
        store_variant(&state.blobs, Variant::Grid10, &image_id, format, rendered.grids.grid10),
        store_variant(&state.blobs, Variant::Grid5, &image_id, format, rendered.grids.grid5),
    );
    let (original_url, grid15_url, grid10_url, grid5_url) = match stored {
        Ok(urls) => urls,
        Err(err) => {
            warn!("storing variants of {image_id} failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage failed").into_response();
        }
    };

    let asset = ImageAsset {
        id: image_id.clone(),
        name: name.to_string(),
        category: params.category.clone(),
        urls: VariantUrls {
            original_url,
            grid15_url,
            grid10_url,
            grid5_url,
        },
        published: params.published,
        created_at: now_millis(),
        tags: parse_tags(params.tags.as_deref()),
    };

    {
        let mut catalog = state.catalog.write().await;
        // A concurrent upload with the same key may have landed first.
        if let Some(existing) = catalog.image_for_key(key.as_deref()) {
            return (StatusCode::OK, Json(existing.clone())).into_response();
        }
        catalog.images.insert(image_id.clone(), asset.clone());
        if let Some(key) = key {
            catalog.idempotency.insert(key, image_id.clone());
        }
    }
    state.persist().await;

    info!(
        image = %image_id,
        width = rendered.width,
        height = rendered.height,
        "stored puzzle image"
    );
    (StatusCode::CREATED, Json(asset)).into_response()
}

async fn store_variant(
    blobs: &BlobStore,
    variant: Variant,
    image_id: &str,
    format: OutputFormat,
    bytes: Vec<u8>,
) -> Result<String, StorageError> {
    // A fresh suffix per render keeps every stored blob write-once.
    let key = format!(
        "{}/{image_id}-{}.{}",
        variant.as_str(),
        Uuid::new_v4().simple(),
        format.extension()
    );
    blobs.put(&key, bytes).await
}

async fn get_image(State(state): State<AppState>, Path(image_id): Path<String>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let Some(image) = catalog.images.get(&image_id) else {
        return (StatusCode::NOT_FOUND, "image not found").into_response();
    };
    (StatusCode::OK, Json(image.clone())).into_response()
}

#[derive(Deserialize)]
struct ImageFilter {
    category: Option<String>,
    published: Option<bool>,
}

async fn list_images(
    State(state): State<AppState>,
    Query(filter): Query<ImageFilter>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let mut images: Vec<ImageAsset> = catalog
        .images
        .values()
        .filter(|image| {
            filter
                .category
                .as_deref()
                .map_or(true, |category| image.category == category)
        })
        .filter(|image| filter.published.map_or(true, |p| image.published == p))
        .cloned()
        .collect();
    // Newest first.
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    Json(images)
}

#[derive(Deserialize)]
struct UpdateImageRequest {
    name: Option<String>,
    category: Option<String>,
    published: Option<bool>,
    tags: Option<Vec<String>>,
}

/// Edits catalog metadata only; the stored renditions are untouched. Sessions
/// already planned keep the answer they were built with.
async fn update_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Json(payload): Json<UpdateImageRequest>,
) -> impl IntoResponse {
    let name = payload.name.as_deref().map(str::trim);
    if name == Some("") {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }
    if let Some(category) = &payload.category {
        if !is_known_category(category) {
            return (StatusCode::BAD_REQUEST, "unknown category").into_response();
        }
    }

    let updated = {
        let mut catalog = state.catalog.write().await;
        let Some(image) = catalog.images.get_mut(&image_id) else {
            return (StatusCode::NOT_FOUND, "image not found").into_response();
        };
        if let Some(name) = name {
            image.name = name.to_string();
        }
        if let Some(category) = payload.category {
            image.category = category;
        }
        if let Some(published) = payload.published {
            image.published = published;
        }
        if let Some(tags) = &payload.tags {
            image.tags = clean_tags(tags.iter().map(String::as_str));
        }
        image.clone()
    };
    state.persist().await;

    info!(image = %image_id, "updated image");
    (StatusCode::OK, Json(updated)).into_response()
}

async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> impl IntoResponse {
    let removed = {
        let mut catalog = state.catalog.write().await;
        if let Some(game) = catalog
            .games
            .values()
            .find(|game| game.rounds.iter().any(|round| round.image_id == image_id))
        {
            return (
                StatusCode::CONFLICT,
                format!("image is used by game {}", game.id),
            )
                .into_response();
        }
        let Some(image) = catalog.images.remove(&image_id) else {
            return (StatusCode::NOT_FOUND, "image not found").into_response();
        };
        catalog.idempotency.retain(|_, id| *id != image_id);
        image
    };
    state.persist().await;

    for variant in Variant::ALL {
        let Some(key) = state.blobs.key_for_url(removed.urls.url(variant)) else {
            continue;
        };
        if let Err(err) = state.blobs.delete(key).await {
            warn!("deleting {key} of {image_id} failed: {err}");
        }
    }

    info!(image = %image_id, "deleted image");
    StatusCode::NO_CONTENT.into_response()
}

async fn regenerate_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> impl IntoResponse {
    let Some(image) = state.catalog.read().await.images.get(&image_id).cloned() else {
        return (StatusCode::NOT_FOUND, "image not found").into_response();
    };
    let Some(original_key) = state.blobs.key_for_url(&image.urls.original_url) else {
        return (StatusCode::CONFLICT, "original is not held by this store").into_response();
    };
    let original = match state.blobs.get(original_key).await {
        Ok(blob) => blob,
        Err(StorageError::NotFound(_)) => {
            return (StatusCode::NOT_FOUND, "original blob missing").into_response()
        }
        Err(err) => {
            warn!("reading original of {image_id} failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage failed").into_response();
        }
    };

    let options = RenderOptions {
        format: OutputFormat::from_content_type(original.content_type)
            .unwrap_or(state.render.format),
        ..state.render
    };
    let grids = match tokio::task::spawn_blocking(move || {
        regenerate_grids(&original.bytes, &options, &mut thread_rng())
    })
    .await
    {
        Ok(Ok(grids)) => grids,
        Ok(Err(err)) => {
            warn!("regenerating {image_id} failed: {err}");
            return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response();
        }
        Err(err) => {
            warn!("render task failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "render failed").into_response();
        }
    };

    let format = options.format;
    let stored = futures::try_join!(
        store_variant(&state.blobs, Variant::Grid15, &image_id, format, grids.grid15),
        store_variant(&state.blobs, Variant::Grid10, &image_id, format, grids.grid10),
        store_variant(&state.blobs, Variant::Grid5, &image_id, format, grids.grid5),
    );
    let (grid15_url, grid10_url, grid5_url) = match stored {
        Ok(urls) => urls,
        Err(err) => {
            warn!("storing grids of {image_id} failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage failed").into_response();
        }
    };

    let updated = {
        let mut catalog = state.catalog.write().await;
        let Some(image) = catalog.images.get_mut(&image_id) else {
            return (StatusCode::NOT_FOUND, "image not found").into_response();
        };
        image.urls.grid15_url = grid15_url;
        image.urls.grid10_url = grid10_url;
        image.urls.grid5_url = grid5_url;
        image.clone()
    };
    state.persist().await;

    info!(image = %image_id, "regenerated grids");
    (StatusCode::OK, Json(updated)).into_response()
}

async fn get_blob(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    match state.blobs.get(&key).await {
        Ok(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, blob.content_type)],
            blob.bytes,
        )
            .into_response(),
        Err(StorageError::NotFound(_)) | Err(StorageError::InvalidKey(_)) => {
            (StatusCode::NOT_FOUND, "blob not found").into_response()
        }
        Err(err) => {
            warn!("reading blob {key} failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage failed").into_response()
        }
    }
}

#[derive(Deserialize)]
struct GameRequest {
    title: String,
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    randomize_order: bool,
    #[serde(default)]
    status: GameStatus,
    #[serde(default)]
    settings: PhaseDurations,
    image_ids: Vec<ImageId>,
}

impl GameRequest {
    // Trimmed title and description, or the rejection to send back.
    fn validate(&self, catalog: &Catalog) -> Result<(String, String), (StatusCode, String)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "title required".to_string()));
        }
        if !is_known_category(&self.category) {
            return Err((StatusCode::BAD_REQUEST, "unknown category".to_string()));
        }
        if self.image_ids.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "at least one image required".to_string(),
            ));
        }
        if let Some(missing) = self
            .image_ids
            .iter()
            .find(|id| !catalog.images.contains_key(*id))
        {
            return Err((StatusCode::BAD_REQUEST, format!("image {missing} not found")));
        }
        Ok((title.to_string(), self.description.trim().to_string()))
    }

    fn rounds(&self) -> Vec<GameRound> {
        self.image_ids
            .iter()
            .zip(0..)
            .map(|(image_id, sequence)| GameRound {
                image_id: image_id.clone(),
                sequence,
            })
            .collect()
    }
}

async fn create_game(
    State(state): State<AppState>,
    Json(payload): Json<GameRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    let (title, description) = match payload.validate(&catalog) {
        Ok(fields) => fields,
        Err(rejection) => return rejection.into_response(),
    };

    let game = GameDefinition {
        id: Uuid::new_v4().to_string(),
        title,
        category: payload.category.clone(),
        description,
        randomize_order: payload.randomize_order,
        status: payload.status,
        settings: payload.settings,
        rounds: payload.rounds(),
        created_at: now_millis(),
    };
    catalog.games.insert(game.id.clone(), game.clone());
    drop(catalog);
    state.persist().await;

    info!(game = %game.id, rounds = game.rounds.len(), "created game");
    (StatusCode::CREATED, Json(game)).into_response()
}

/// Replaces everything but the id and creation time. Running sessions keep
/// the rounds they were planned with.
async fn update_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(payload): Json<GameRequest>,
) -> impl IntoResponse {
    let mut catalog = state.catalog.write().await;
    if !catalog.games.contains_key(&game_id) {
        return (StatusCode::NOT_FOUND, "game not found").into_response();
    }
    let (title, description) = match payload.validate(&catalog) {
        Ok(fields) => fields,
        Err(rejection) => return rejection.into_response(),
    };
    let Some(game) = catalog.games.get_mut(&game_id) else {
        return (StatusCode::NOT_FOUND, "game not found").into_response();
    };
    game.title = title;
    game.category = payload.category.clone();
    game.description = description;
    game.randomize_order = payload.randomize_order;
    game.status = payload.status;
    game.settings = payload.settings;
    game.rounds = payload.rounds();
    let updated = game.clone();
    drop(catalog);
    state.persist().await;

    info!(game = %game_id, "updated game");
    (StatusCode::OK, Json(updated)).into_response()
}

async fn delete_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    if state.catalog.write().await.games.remove(&game_id).is_none() {
        return (StatusCode::NOT_FOUND, "game not found").into_response();
    }
    state.persist().await;

    info!(game = %game_id, "deleted game");
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct GameFilter {
    status: Option<GameStatus>,
    category: Option<String>,
}

async fn list_games(
    State(state): State<AppState>,
    Query(filter): Query<GameFilter>,
) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let mut games: Vec<GameDefinition> = catalog
        .games
        .values()
        .filter(|game| filter.status.map_or(true, |status| game.status == status))
        .filter(|game| {
            filter
                .category
                .as_deref()
                .map_or(true, |category| game.category == category)
        })
        .cloned()
        .collect();
    games.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    Json(games)
}

async fn get_game(State(state): State<AppState>, Path(game_id): Path<String>) -> impl IntoResponse {
    let catalog = state.catalog.read().await;
    let Some(game) = catalog.games.get(&game_id) else {
        return (StatusCode::NOT_FOUND, "game not found").into_response();
    };
    (StatusCode::OK, Json(game.clone())).into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    pub async fn json_body(res: axum::response::Response) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn raw_body(res: axum::response::Response) -> Vec<u8> {
        res.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255])
        });
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Body,
    ) -> axum::response::Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn upload(app: &Router, name: &str) -> serde_json::Value {
        let res = send(
            app,
            Method::POST,
            &format!("/images?name={name}&category=Guess%20the%20Movie&format=png"),
            Body::from(png(60, 40)),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        json_body(res).await
    }

    pub async fn create_game(app: &Router, image_ids: &[&str], settings: serde_json::Value) -> String {
        let res = send(
            app,
            Method::POST,
            "/games",
            Body::from(
                serde_json::json!({
                    "title": "Film night",
                    "category": "Guess the Movie",
                    "settings": settings,
                    "image_ids": image_ids,
                })
                .to_string(),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        json_body(res).await["id"].as_str().unwrap().to_string()
    }
}
