//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each request body is
//! collected once, capped at `--max-body-bytes`, and handed to
//! [`routes::dispatch`] as an [`ApiRequest`].

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::AuthGate;
use crate::config::Args;
use crate::routes::{self, ApiRequest, BoxBody};
use crate::services::{AccountService, ConsoleNotifier, Notifier, RoadmapGenerator};
use crate::store::{MemoryUserRepository, ProgressStore, UserRepository};
use crate::types::{CallistoError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Bearer-token check for protected routes
    pub gate: AuthGate,
    pub accounts: AccountService,
    pub store: ProgressStore,
    pub roadmap: RoadmapGenerator,
    /// `mongodb` or `memory`, reported by /health
    pub persistence: &'static str,
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from already-connected collaborators
    pub fn with_services(
        args: Args,
        users: Arc<dyn UserRepository>,
        store: ProgressStore,
        notifier: Arc<dyn Notifier>,
        roadmap: RoadmapGenerator,
        persistence: &'static str,
    ) -> Result<Self> {
        let jwt = args.jwt_validator()?;
        let delivery_required = args.mail_configured();
        let accounts = AccountService::new(users, jwt.clone(), notifier, delivery_required);

        Ok(Self {
            gate: AuthGate::new(jwt),
            accounts,
            store,
            roadmap,
            persistence,
            started_at: Instant::now(),
            args,
        })
    }

    /// Time allowed for one request. Roadmap routes get the request
    /// deadline on top of a full pass over the model candidates.
    pub fn request_deadline(&self, req: &ApiRequest) -> Duration {
        let base = self.args.request_timeout();
        if !routes::calls_model(req) {
            return base;
        }
        match self.roadmap.chain_budget() {
            Some(chain) => base.saturating_add(chain),
            None => base,
        }
    }

    /// In-memory repositories, console notifier and the given roadmap
    /// generator. Used for dev mode without MongoDB and for tests.
    pub fn in_memory(args: Args, roadmap: RoadmapGenerator) -> Result<Self> {
        Self::with_services(
            args,
            Arc::new(MemoryUserRepository::new()),
            ProgressStore::in_memory(),
            Arc::new(ConsoleNotifier),
            roadmap,
            "memory",
        )
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Callisto listening on {} as instance {}",
        state.args.listen, state.args.instance_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - error details are returned to clients");
    }
    info!(
        persistence = state.persistence,
        mail = state.accounts.notifier_kind(),
        roadmap = state.roadmap.is_configured(),
        "Collaborators ready"
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect the body, enforcing the configured size cap
async fn read_body(body: Incoming, max_bytes: usize) -> std::result::Result<Bytes, CallistoError> {
    Limited::new(body, max_bytes)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                CallistoError::validation("Request body too large")
            } else {
                CallistoError::validation(format!("Failed to read body: {}", e))
            }
        })
}

/// Route a buffered request under its deadline
pub async fn respond(state: &AppState, req: ApiRequest) -> Response<BoxBody> {
    let deadline = state.request_deadline(&req);
    let method = req.method.clone();
    let path = req.path.clone();

    match tokio::time::timeout(deadline, routes::dispatch(state, req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("{} {} timed out after {:?}", method, path, deadline);
            routes::json_response(
                StatusCode::GATEWAY_TIMEOUT,
                &routes::ErrorResponse {
                    error: "Request timed out".into(),
                    code: "TIMEOUT",
                    details: None,
                },
            )
        }
    }
}

/// Buffer one request and route it
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let body = match read_body(body, state.args.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("[{}] {} {} rejected: {}", addr, method, path, e);
            return Ok(routes::error_response(&e, state.args.dev_mode));
        }
    };

    let api_req = ApiRequest {
        method: parts.method,
        path: path.clone(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };

    let response = respond(&state, api_req).await;

    let status = response.status();
    if status.is_server_error() || status.is_client_error() {
        warn!(
            "[{}] {} {} -> {} ({:?})",
            addr,
            method,
            path,
            status.as_u16(),
            started.elapsed()
        );
    } else {
        debug!(
            "[{}] {} {} -> {} ({:?})",
            addr,
            method,
            path,
            status.as_u16(),
            started.elapsed()
        );
    }

    Ok(response)
}
