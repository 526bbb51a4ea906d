//! HTTP API server
//!
//! Exposes the sync service as JSON endpoints on a configurable bind
//! address. One task per connection; graceful shutdown through a
//! cancellation token.
//!
//! ## Routes
//!
//! | Method | Path                   | Operation                          |
//! |--------|------------------------|------------------------------------|
//! | GET    | /api/syncs             | list subscriptions                 |
//! | POST   | /api/syncs             | register a subscription            |
//! | GET    | /api/syncs/summary     | dashboard summaries                |
//! | POST   | /api/sync/start        | run the initial crawl              |
//! | POST   | /api/sync/poll         | poll one or all subscriptions      |
//! | GET    | /api/tree?syncId=...   | assembled nested tree              |
//! | POST   | /api/drive/preview     | store-free folder preview          |
//! | POST   | /api/drive/verify      | verify a pasted folder link        |
//!
//! The caller's identity arrives in the `x-user-id` header; session
//! management itself is outside this service.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use drivemirror_core::domain::{ExternalId, PageBudget, SubscriptionId, UserId};
use drivemirror_core::ports::tree_provider::ITreeProvider;
use drivemirror_drive::link::extract_folder_id;
use drivemirror_sync::{ServiceError, StatusClass, SyncService};

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSyncRequest {
    drive_folder_id: ExternalId,
    drive_folder_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSyncRequest {
    sync_id: SubscriptionId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PollRequest {
    sync_id: Option<SubscriptionId>,
    page_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    folder_id: ExternalId,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    url: String,
}

// ============================================================================
// Server
// ============================================================================

/// Shared state handed to every request handler
pub struct ApiContext {
    /// The sync service facade
    pub service: Arc<SyncService>,
    /// Direct provider access for the link-verification probe
    pub provider: Arc<dyn ITreeProvider>,
    /// Whether a Drive access token is configured; mutating routes are
    /// rejected as unauthorized without one
    pub authorized: bool,
    /// Page budget applied when a poll request does not specify one
    pub default_page_budget: u32,
}

/// HTTP server exposing the sync API
pub struct ApiServer {
    ctx: Arc<ApiContext>,
    addr: SocketAddr,
}

impl ApiServer {
    /// Creates a new `ApiServer`.
    ///
    /// # Arguments
    /// * `ctx` - Shared handler state
    /// * `endpoint` - Address to bind, e.g. `"127.0.0.1:8787"`
    pub fn new(ctx: ApiContext, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self {
            ctx: Arc::new(ctx),
            addr,
        })
    }

    /// Starts the HTTP server. This future runs until the provided
    /// cancellation token is triggered.
    pub async fn run(&self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "API server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, _) = result?;
                    let io = TokioIo::new(stream);
                    let ctx = Arc::clone(&self.ctx);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let ctx = Arc::clone(&ctx);
                            async move { handle_request(req, ctx).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("API server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(payload)))
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

fn service_error_response(err: &ServiceError) -> Response<Full<Bytes>> {
    let status = match err.status_class() {
        StatusClass::Unauthorized => StatusCode::UNAUTHORIZED,
        StatusClass::Forbidden => StatusCode::FORBIDDEN,
        StatusClass::NotFound => StatusCode::NOT_FOUND,
        StatusClass::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

/// Parses the caller's user id from the `x-user-id` header
fn caller_id(req: &Request<Incoming>) -> Option<UserId> {
    req.headers()
        .get("x-user-id")?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Extracts a query parameter from the request URI
fn query_param(req: &Request<Incoming>, name: &str) -> Option<String> {
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Collects and deserializes a JSON request body
async fn read_json<T: serde::de::DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<Full<Bytes>>> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            ))
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid request body: {e}"),
        )
    })
}

// ============================================================================
// Request dispatch
// ============================================================================

/// Handle a single HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ApiContext>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "Handling request");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/api/syncs") => list_syncs(&ctx).await,
        (&Method::POST, "/api/syncs") => create_sync(req, &ctx).await,
        (&Method::GET, "/api/syncs/summary") => summaries(&ctx).await,
        (&Method::POST, "/api/sync/start") => start_sync(req, &ctx).await,
        (&Method::POST, "/api/sync/poll") => poll(req, &ctx).await,
        (&Method::GET, "/api/tree") => tree(&req, &ctx).await,
        (&Method::POST, "/api/drive/preview") => preview(req, &ctx).await,
        (&Method::POST, "/api/drive/verify") => verify(req, &ctx).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

async fn list_syncs(ctx: &ApiContext) -> Response<Full<Bytes>> {
    match ctx.service.list_subscriptions().await {
        Ok(subscriptions) => json_response(StatusCode::OK, &subscriptions),
        Err(err) => service_error_response(&err),
    }
}

async fn create_sync(req: Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    let Some(user) = caller_id(&req) else {
        return error_response(StatusCode::UNAUTHORIZED, "Missing x-user-id header");
    };

    let body: CreateSyncRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match ctx
        .service
        .create_subscription(user, body.drive_folder_id, body.drive_folder_name)
        .await
    {
        Ok(subscription) => json_response(StatusCode::OK, &subscription),
        Err(err) => service_error_response(&err),
    }
}

async fn summaries(ctx: &ApiContext) -> Response<Full<Bytes>> {
    match ctx.service.summaries().await {
        Ok(items) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "items": items }),
        ),
        Err(err) => service_error_response(&err),
    }
}

async fn start_sync(req: Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    if !ctx.authorized {
        return error_response(StatusCode::UNAUTHORIZED, "Drive access token not configured");
    }

    let Some(user) = caller_id(&req) else {
        return error_response(StatusCode::UNAUTHORIZED, "Missing x-user-id header");
    };

    let body: StartSyncRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match ctx.service.start_sync(&body.sync_id, &user).await {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "inserted": outcome.inserted_rows }),
        ),
        Err(err) => service_error_response(&err),
    }
}

async fn poll(req: Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    if !ctx.authorized {
        return error_response(StatusCode::UNAUTHORIZED, "Drive access token not configured");
    }

    let body: PollRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let budget = PageBudget::new(body.page_limit.unwrap_or(ctx.default_page_budget));

    let results = match body.sync_id {
        Some(sync_id) => ctx
            .service
            .poll(&sync_id, budget)
            .await
            .map(|report| vec![report]),
        None => ctx.service.poll_all(budget).await,
    };

    match results {
        Ok(reports) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "results": reports }),
        ),
        Err(err) => service_error_response(&err),
    }
}

async fn tree(req: &Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    let Some(sync_id) = query_param(req, "syncId") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing syncId parameter");
    };

    let sync_id: SubscriptionId = match sync_id.parse() {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid syncId parameter"),
    };

    match ctx.service.tree(&sync_id).await {
        Ok(tree) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "tree": tree }),
        ),
        Err(err) => service_error_response(&err),
    }
}

async fn preview(req: Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    if !ctx.authorized {
        return error_response(StatusCode::UNAUTHORIZED, "Drive access token not configured");
    }

    let body: PreviewRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    match ctx.service.preview(&body.folder_id).await {
        Ok(tree) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "tree": tree }),
        ),
        Err(err) => service_error_response(&err),
    }
}

async fn verify(req: Request<Incoming>, ctx: &ApiContext) -> Response<Full<Bytes>> {
    let body: VerifyRequest = match read_json(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let Some(folder_id) = extract_folder_id(&body.url) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid folder link");
    };

    if !ctx.authorized {
        return json_response(
            StatusCode::OK,
            &serde_json::json!({
                "ok": false,
                "folderId": folder_id,
                "name": "Google Drive Folder",
                "reason": "no_access_token",
            }),
        );
    }

    // Probe the folder's metadata to confirm the caller can see it
    match ctx.provider.node_metadata(&folder_id).await {
        Ok(meta) => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "ok": true,
                "folderId": folder_id,
                "name": meta.name,
            }),
        ),
        Err(err) => {
            debug!(error = %format!("{err:#}"), "Folder verification probe failed");
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "ok": false,
                    "folderId": folder_id,
                    "name": "Google Drive Folder",
                    "reason": "provider_error",
                }),
            )
        }
    }
}
