//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection, and a
//! hand-written router.

use bytes::Bytes;
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::{authenticate, JwtValidator};
use crate::config::Args;
use crate::db::{deadline_exceeded, Deadline, Store};
use crate::routes::{self, empty_response, error_response, BoxBody};
use crate::types::ChainhubError;

const REQUEST_ID_HEADER: &str = "x-request-id";
const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Database handle, cloned into blocking store tasks
    pub store: Store,
    /// Session token issuer and verifier
    pub jwt: JwtValidator,
}

impl AppState {
    /// Build state from validated configuration and an opened store
    pub fn new(args: Args, store: Store) -> Result<Self, ChainhubError> {
        let jwt = JwtValidator::new(args.jwt_secret())?;
        Ok(Self { args, store, jwt })
    }

    /// Run a store operation on the blocking pool under the request deadline.
    ///
    /// Missing the deadline fails the request with no retry. Work still
    /// queued for the connection is abandoned and never runs; work already
    /// running is interrupted at the deadline and its outcome is reported.
    pub async fn run_store<F, T>(&self, op: F) -> Result<T, ChainhubError>
    where
        F: FnOnce(&Store) -> Result<T, ChainhubError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.args.request_timeout();
        let deadline = Arc::new(Deadline::after(timeout));
        let store = self.store.with_deadline(Arc::clone(&deadline));
        let mut task = tokio::task::spawn_blocking(move || op(&store));

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined?,
            Err(_) if deadline.abandon() => {
                warn!(
                    "Store operation abandoned after {} ms",
                    self.args.request_timeout_ms
                );
                Err(deadline_exceeded())
            }
            // Already holds the connection; it stops at the deadline
            Err(_) => task.await?,
        }
    }
}

/// Start the HTTP server on the configured address, until Ctrl-C
pub async fn run(state: Arc<AppState>) -> Result<(), ChainhubError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await
}

/// Accept connections on `listener` until `shutdown` completes
pub async fn serve<S>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: S,
) -> Result<(), ChainhubError>
where
    S: Future<Output = ()>,
{
    info!("Chainhub listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, req).await }
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
}

/// Handle one request: tag it with a request id, route it, add CORS headers
pub async fn handle_request<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<Response<BoxBody>, hyper::Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let started = Instant::now();

    let mut response = route(&state, req).instrument(span.clone()).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    match HeaderValue::from_str(&state.args.frontend_url) {
        Ok(origin) => {
            headers.insert("access-control-allow-origin", origin);
            headers.insert("vary", HeaderValue::from_static("Origin"));
        }
        Err(_) => error!("FRONTEND_URL is not a valid header value"),
    }

    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        )
    });
    Ok(response)
}

/// Known paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Signup,
    Login,
    Health,
    Ready,
    Me,
    Tree(&'a str),
    Links,
    Link(&'a str),
    Unknown,
}

impl Route<'_> {
    /// Routes whose handlers act for an authenticated caller
    fn requires_auth(&self) -> bool {
        matches!(self, Route::Me | Route::Links | Route::Link(_))
    }
}

fn match_route(path: &str) -> Route<'_> {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };

    match trimmed {
        "/signup" => Route::Signup,
        "/login" => Route::Login,
        "/health" | "/healthz" => Route::Health,
        "/ready" | "/readyz" => Route::Ready,
        "/me" => Route::Me,
        "/links" => Route::Links,
        p => {
            if let Some(username) = p.strip_prefix("/tree/") {
                if !username.contains('/') {
                    return Route::Tree(username);
                }
            }
            if let Some(id) = p.strip_prefix("/links/") {
                if !id.contains('/') {
                    return Route::Link(id);
                }
            }
            Route::Unknown
        }
    }
}

/// Route incoming HTTP requests
async fn route<B>(state: &AppState, mut req: Request<B>) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // CORS preflight
    if req.method() == Method::OPTIONS {
        return preflight_response();
    }

    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let route = match_route(&path);

    if route.requires_auth() {
        if let Err(e) = authenticate(&state.jwt, &mut req) {
            return error_response(&e);
        }
    }

    let result = match (method, route) {
        (Method::POST, Route::Signup) => routes::handle_signup(state, req).await,
        (Method::POST, Route::Login) => routes::handle_login(state, req).await,
        (Method::GET, Route::Health) => Ok(routes::health_check()),
        (Method::GET, Route::Ready) => Ok(routes::readiness_check(state).await),
        (Method::GET, Route::Tree(username)) => routes::handle_get_tree(state, username).await,
        (Method::GET, Route::Me) => routes::handle_me(state, req).await,
        (Method::GET, Route::Links) => routes::handle_list_links(state, req).await,
        (Method::POST, Route::Links) => routes::handle_create_link(state, req).await,
        (Method::PUT, Route::Link(id)) => routes::handle_update_link(state, req, id).await,
        (Method::DELETE, Route::Link(id)) => routes::handle_delete_link(state, req, id).await,
        (_, Route::Unknown) => Err(ChainhubError::NotFound("not found".into())),
        _ => return method_not_allowed(),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

/// CORS preflight response
fn preflight_response() -> Response<BoxBody> {
    let mut response = empty_response(StatusCode::NO_CONTENT);
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert("access-control-max-age", HeaderValue::from_static("86400"));
    response
}

fn method_not_allowed() -> Response<BoxBody> {
    let mut response = routes::json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "method not allowed" }),
    );
    response
        .headers_mut()
        .insert("allow", HeaderValue::from_static(ALLOWED_METHODS));
    response
}
