#![forbid(unsafe_code)]

//! Axum front end for the VidTube services.
//!
//! Every handler follows the same shape: parse ids and query values, read the
//! acting user from the `x-user-id` header set by the authentication gateway,
//! call one service and wrap the result in the JSON envelope. Stored assets
//! are streamed back from the asset root with byte-range support.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, Path as AxumPath, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use clap::Parser;
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    signal,
};
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vidtube::{
    assets::{AssetKind, LocalAssetStore, is_safe_segment},
    config::{RuntimeOverrides, resolve_runtime_settings},
    error::DomainError,
    identity::{Actor, IDENTITY_HEADER},
    ids::{ChannelId, CommentId, TweetId, UserId, VideoId},
    models::{DurationRange, SortOrder, TextMatch, VideoFilter, VideoSort, VideoSortField},
    pagination::PageRequest,
    services::{Services, VideoChanges, VideoDraft, non_blank},
    store::Store,
};

const API_PREFIX: &str = "/api/v1";

// Upper bound on a single request body; uploads are streamed to disk.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "backend", about = "VidTube REST API server")]
struct ServerArgs {
    /// SQLite database file (overrides DATABASE_PATH).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Directory for stored assets and upload staging (overrides ASSET_ROOT).
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Prefix for returned asset URLs (overrides PUBLIC_BASE_URL).
    #[arg(long)]
    public_base_url: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,

    /// Alternate `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl ServerArgs {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            database_path: self.db_path,
            asset_root: self.asset_root,
            public_base_url: self.public_base_url,
            port: self.port,
            host: self.host,
            env_path: self.env_file,
        }
    }
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/VIDTUBE_HOST")
}

/// Shared state handed to every handler.
///
/// * `services` holds the domain logic, all bound to one store.
/// * `assets` knows where uploads are staged and where stored files live.
#[derive(Clone)]
struct AppState {
    services: Services,
    assets: Arc<LocalAssetStore>,
}

impl AppState {
    fn new(store: Store, assets: LocalAssetStore) -> Self {
        let assets = Arc::new(assets);
        Self {
            services: Services::new(store, assets.clone()),
            assets,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    success: bool,
    status_code: u16,
    data: T,
    message: String,
}

fn respond<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    let body = ApiResponse {
        success: status.is_success(),
        status_code: status.as_u16(),
        data,
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Logs the cause and hides it from the client.
    fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Internal(cause) => Self::internal(format!("{cause:#}")),
            other => Self {
                status: StatusCode::from_u16(other.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message: other.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "statusCode": self.status.as_u16(),
            "message": self.message,
            "errors": [],
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = resolve_runtime_settings(ServerArgs::parse().into_overrides())?;
    let host = parse_host_arg(&settings.host)?;

    let store = Store::open(&settings.database_path)
        .await
        .with_context(|| format!("opening database {}", settings.database_path.display()))?;
    let assets = LocalAssetStore::new(&settings.asset_root, &settings.public_base_url);
    assets.prepare().await.context("preparing asset root")?;

    let app = build_router(AppState::new(store, assets));

    let addr = SocketAddr::new(host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(%addr, assets = %settings.public_base_url, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still terminates.
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/videos", get(list_videos).post(publish_video))
        .route(
            "/videos/{video_id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/videos/toggle/publish/{video_id}", patch(toggle_publish))
        .route("/comments/{video_id}", get(list_comments).post(add_comment))
        .route(
            "/comments/c/{comment_id}",
            patch(update_comment).delete(delete_comment),
        )
        .route("/tweets", post(create_tweet))
        .route("/tweets/me", get(my_tweets))
        .route("/tweets/user/{user_id}", get(user_tweets))
        .route("/tweets/{tweet_id}", patch(update_tweet).delete(delete_tweet))
        .route("/likes/toggle/v/{video_id}", post(toggle_video_like))
        .route("/likes/toggle/c/{comment_id}", post(toggle_comment_like))
        .route("/likes/toggle/t/{tweet_id}", post(toggle_tweet_like))
        .route("/likes/videos", get(liked_videos))
        .route(
            "/subscriptions/c/{channel_id}",
            post(toggle_subscription).get(channel_subscribers),
        )
        .route("/subscriptions/u", get(my_subscriptions))
        .route("/dashboard/stats", get(channel_stats))
        .route("/dashboard/videos", get(channel_videos));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/assets/{kind}/{file}", get(serve_asset))
        .fallback(not_found_fallback)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found_fallback(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

fn actor(headers: &HeaderMap) -> Actor {
    Actor::from_header(
        headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::from_raw(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListQuery {
    page: Option<String>,
    limit: Option<String>,
    query: Option<String>,
    user_id: Option<String>,
    sort_by: Option<String>,
    sort_type: Option<String>,
    sort_order: Option<String>,
    min_duration: Option<String>,
    max_duration: Option<String>,
}

impl VideoListQuery {
    fn filter(&self) -> ApiResult<VideoFilter> {
        let owner = match non_blank(self.user_id.as_deref()) {
            Some(raw) => Some(UserId::parse(raw)?),
            None => None,
        };
        Ok(VideoFilter {
            owner,
            text: self.query.as_deref().and_then(TextMatch::new),
            duration: DurationRange {
                min: parse_duration_bound("minDuration", self.min_duration.as_deref())?,
                max: parse_duration_bound("maxDuration", self.max_duration.as_deref())?,
            },
            published: None,
        })
    }

    fn sort(&self) -> ApiResult<VideoSort> {
        let field = match non_blank(self.sort_by.as_deref()) {
            Some(raw) => VideoSortField::parse(raw)?,
            None => VideoSortField::default(),
        };
        let order = self
            .sort_type
            .as_deref()
            .or(self.sort_order.as_deref())
            .map(SortOrder::parse)
            .unwrap_or_default();
        Ok(VideoSort { field, order })
    }

    fn page(&self) -> PageRequest {
        PageRequest::from_raw(self.page.as_deref(), self.limit.as_deref())
    }
}

fn parse_duration_bound(name: &str, raw: Option<&str>) -> ApiResult<Option<f64>> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(ApiError::bad_request(format!(
            "{name} must be a non-negative number"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    content: Option<String>,
}

/// A multipart body with its file parts written to the staging directory.
/// The temp files are removed when this is dropped.
#[derive(Default)]
struct StagedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, NamedTempFile>,
}

impl StagedForm {
    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(NamedTempFile::path)
    }
}

async fn stage_multipart(mut multipart: Multipart, staging: &Path) -> ApiResult<StagedForm> {
    let mut form = StagedForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|err| ApiError::bad_request(err.body_text()))?;
            form.fields.insert(name, value);
            continue;
        };
        if file_name.trim().is_empty() {
            continue;
        }

        let suffix = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let staged = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(staging)
            .map_err(ApiError::internal)?;
        let mut out = File::from_std(staged.reopen().map_err(ApiError::internal)?);
        let mut written = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?
        {
            out.write_all(&chunk).await.map_err(ApiError::internal)?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(ApiError::internal)?;
        if written > 0 {
            form.files.insert(name, staged);
        }
    }
    Ok(form)
}

async fn healthcheck() -> Response {
    respond(StatusCode::OK, json!({ "status": "OK" }), "Health check passed")
}

async fn list_videos(
    State(state): State<AppState>,
    query: Result<Query<VideoListQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let page = state
        .services
        .videos
        .list_videos(query.filter()?, query.sort()?, query.page())
        .await?;
    Ok(respond(StatusCode::OK, page, "Videos fetched successfully"))
}

async fn publish_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let actor = actor(&headers);
    actor.require()?;
    let form = stage_multipart(multipart?, &state.assets.staging_dir()).await?;
    let video = state
        .services
        .videos
        .publish_video(
            actor,
            VideoDraft {
                title: form.text("title"),
                description: form.text("description"),
                video_file: form.file("videoFile"),
                thumbnail: form.file("thumbnail"),
            },
        )
        .await?;
    Ok(respond(
        StatusCode::CREATED,
        video,
        "Video published successfully",
    ))
}

async fn get_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    let video = state.services.videos.get_video(actor(&headers), id).await?;
    Ok(respond(StatusCode::OK, video, "Video fetched successfully"))
}

async fn update_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    let actor = actor(&headers);
    actor.require()?;
    let form = stage_multipart(multipart?, &state.assets.staging_dir()).await?;
    let video = state
        .services
        .videos
        .update_video(
            actor,
            id,
            VideoChanges {
                title: form.text("title"),
                description: form.text("description"),
                thumbnail: form.file("thumbnail"),
            },
        )
        .await?;
    Ok(respond(StatusCode::OK, video, "Video updated successfully"))
}

async fn delete_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    state.services.videos.delete_video(actor(&headers), id).await?;
    Ok(respond(StatusCode::OK, json!({}), "Video deleted successfully"))
}

async fn toggle_publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    let video = state
        .services
        .videos
        .toggle_publish(actor(&headers), id)
        .await?;
    Ok(respond(
        StatusCode::OK,
        video,
        "Video publish status toggled successfully",
    ))
}

async fn list_comments(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let id = VideoId::parse(&video_id)?;
    let page = state.services.comments.list(id, query.request()).await?;
    Ok(respond(StatusCode::OK, page, "Comments fetched successfully"))
}

async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
    body: Result<Json<ContentBody>, JsonRejection>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    let Json(body) = body?;
    let comment = state
        .services
        .comments
        .add(actor(&headers), id, body.content.as_deref())
        .await?;
    Ok(respond(
        StatusCode::CREATED,
        comment,
        "Comment added successfully",
    ))
}

async fn update_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(comment_id): AxumPath<String>,
    body: Result<Json<ContentBody>, JsonRejection>,
) -> ApiResult<Response> {
    let id = CommentId::parse(&comment_id)?;
    let Json(body) = body?;
    let edit = state
        .services
        .comments
        .update(actor(&headers), id, body.content.as_deref())
        .await?;
    Ok(respond(StatusCode::OK, edit, "Comment updated successfully"))
}

async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(comment_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = CommentId::parse(&comment_id)?;
    state.services.comments.delete(actor(&headers), id).await?;
    Ok(respond(
        StatusCode::OK,
        json!({}),
        "Comment deleted successfully",
    ))
}

async fn create_tweet(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ContentBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let tweet = state
        .services
        .tweets
        .create(actor(&headers), body.content.as_deref())
        .await?;
    Ok(respond(StatusCode::CREATED, tweet, "Tweet created successfully"))
}

async fn my_tweets(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let page = state
        .services
        .tweets
        .list_mine(actor(&headers), query.request())
        .await?;
    Ok(respond(StatusCode::OK, page, "Tweets fetched successfully"))
}

async fn user_tweets(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let user = UserId::parse(&user_id)?;
    let page = state
        .services
        .tweets
        .list_by_user(user, query.request())
        .await?;
    Ok(respond(StatusCode::OK, page, "Tweets fetched successfully"))
}

async fn update_tweet(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(tweet_id): AxumPath<String>,
    body: Result<Json<ContentBody>, JsonRejection>,
) -> ApiResult<Response> {
    let id = TweetId::parse(&tweet_id)?;
    let Json(body) = body?;
    let tweet = state
        .services
        .tweets
        .update(actor(&headers), id, body.content.as_deref())
        .await?;
    Ok(respond(StatusCode::OK, tweet, "Tweet updated successfully"))
}

async fn delete_tweet(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(tweet_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = TweetId::parse(&tweet_id)?;
    state.services.tweets.delete(actor(&headers), id).await?;
    Ok(respond(StatusCode::OK, json!({}), "Tweet deleted successfully"))
}

async fn toggle_video_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(video_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = VideoId::parse(&video_id)?;
    let toggle = state
        .services
        .likes
        .toggle_video_like(actor(&headers), id)
        .await?;
    Ok(respond(StatusCode::OK, toggle, like_message(toggle.is_liked)))
}

async fn toggle_comment_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(comment_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = CommentId::parse(&comment_id)?;
    let toggle = state
        .services
        .likes
        .toggle_comment_like(actor(&headers), id)
        .await?;
    Ok(respond(StatusCode::OK, toggle, like_message(toggle.is_liked)))
}

async fn toggle_tweet_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(tweet_id): AxumPath<String>,
) -> ApiResult<Response> {
    let id = TweetId::parse(&tweet_id)?;
    let toggle = state
        .services
        .likes
        .toggle_tweet_like(actor(&headers), id)
        .await?;
    Ok(respond(StatusCode::OK, toggle, like_message(toggle.is_liked)))
}

fn like_message(is_liked: bool) -> &'static str {
    if is_liked {
        "Liked successfully"
    } else {
        "Like removed successfully"
    }
}

async fn liked_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let page = state
        .services
        .likes
        .liked_videos(actor(&headers), query.request())
        .await?;
    Ok(respond(
        StatusCode::OK,
        page,
        "Liked videos fetched successfully",
    ))
}

async fn toggle_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(channel_id): AxumPath<String>,
) -> ApiResult<Response> {
    let actor = actor(&headers);
    actor.require()?;
    let channel = ChannelId::parse(&channel_id)?;
    let toggle = state.services.subscriptions.toggle(actor, channel).await?;
    Ok(if toggle.subscribed {
        respond(StatusCode::CREATED, toggle, "Subscribed successfully")
    } else {
        respond(StatusCode::OK, toggle, "Unsubscribed successfully")
    })
}

async fn channel_subscribers(
    State(state): State<AppState>,
    AxumPath(channel_id): AxumPath<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let channel = ChannelId::parse(&channel_id)?;
    let page = state
        .services
        .subscriptions
        .list_subscribers(channel, query.request())
        .await?;
    Ok(respond(
        StatusCode::OK,
        page,
        "Subscribers fetched successfully",
    ))
}

async fn my_subscriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let page = state
        .services
        .subscriptions
        .list_subscriptions(actor(&headers), query.request())
        .await?;
    Ok(respond(
        StatusCode::OK,
        page,
        "Subscribed channels fetched successfully",
    ))
}

async fn channel_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let stats = state
        .services
        .dashboard
        .channel_stats(actor(&headers))
        .await?;
    Ok(respond(
        StatusCode::OK,
        stats,
        "Channel stats fetched successfully",
    ))
}

async fn channel_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let page = state
        .services
        .dashboard
        .channel_videos(actor(&headers), query.request())
        .await?;
    Ok(respond(
        StatusCode::OK,
        page,
        "Channel videos fetched successfully",
    ))
}

async fn serve_asset(
    State(state): State<AppState>,
    AxumPath((kind, file)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let kind = AssetKind::from_slug(&kind).ok_or_else(|| ApiError::not_found("asset not found"))?;
    if !is_safe_segment(&file) {
        return Err(ApiError::not_found("asset not found"));
    }
    let path = state
        .assets
        .resolve(kind, &file)
        .ok_or_else(|| ApiError::not_found("asset not found"))?;
    stream_file(path, &headers).await
}

fn header_value(value: String) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&value).map_err(ApiError::internal)
}

async fn stream_file(path: PathBuf, headers: &HeaderMap) -> ApiResult<Response> {
    let mut file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("asset not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("asset not found"))?
        .len();

    let range = headers
        .get(header::RANGE)
        .map_or(ByteRange::Full, |value| parse_range_header(value, size));

    let mut response = match range {
        ByteRange::Unsatisfiable => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            response
                .headers_mut()
                .insert(header::CONTENT_RANGE, header_value(format!("bytes */{size}"))?);
            response
        }
        ByteRange::Partial { start, end } => {
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(ApiError::internal)?;
            let stream = ReaderStream::new(file.take(length));
            let mut response = Body::from_stream(stream).into_response();
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let content_range = header_value(format!("bytes {start}-{end}/{size}"))?;
            let out = response.headers_mut();
            out.insert(header::CONTENT_RANGE, content_range);
            out.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            response
        }
        ByteRange::Full => {
            let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            response
        }
    };

    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = HeaderValue::from_str(mime.as_ref())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

/// What a `Range` header asks of a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// No usable range; send the whole file.
    Full,
    /// Inclusive byte offsets, already clamped to the file.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Single `bytes=` ranges only. Other units, multi-range lists and malformed
/// values fall back to the full body.
fn parse_range_header(value: &HeaderValue, size: u64) -> ByteRange {
    let Some(spec) = value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().strip_prefix("bytes="))
        .map(str::trim)
    else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return ByteRange::Full;
    };
    let last_byte = size.saturating_sub(1);

    let bounds = match (first.trim(), last.trim()) {
        ("", "") => return ByteRange::Full,
        // "-N": the final N bytes.
        ("", suffix) => match suffix.parse::<u64>() {
            Ok(0) => return ByteRange::Unsatisfiable,
            Ok(len) => (size.saturating_sub(len), last_byte),
            Err(_) => return ByteRange::Full,
        },
        (start, "") => match start.parse::<u64>() {
            Ok(start) => (start, last_byte),
            Err(_) => return ByteRange::Full,
        },
        (start, end) => match (start.parse::<u64>(), end.parse::<u64>()) {
            (Ok(start), Ok(end)) if start <= end => (start, end.min(last_byte)),
            _ => return ByteRange::Full,
        },
    };

    match bounds {
        (start, _) if size == 0 || start >= size => ByteRange::Unsatisfiable,
        (start, end) => ByteRange::Partial { start, end },
    }
}
