//! HTTP routes for managing links (authenticated)
//!
//! - GET    /links?username=  - All links on the caller's tree
//! - POST   /links            - Add a link to a tree the caller owns
//! - PUT    /links/{id}       - Replace a link the caller owns
//! - DELETE /links/{id}       - Remove a link the caller owns
//!
//! The router resolves the caller before any of these run. A link or
//! tree owned by someone else is reported exactly like a missing one.

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{caller_of, CallerId};
use crate::db::{links, Link, LinkInput};
use crate::routes::{json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::types::ChainhubError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListLinksQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    #[serde(default)]
    pub tree_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub position: i64,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub position: i64,
    pub is_active: bool,
}

impl From<Link> for LinkResponse {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
            position: link.position,
            is_active: link.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkListResponse {
    pub links: Vec<LinkResponse>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

// =============================================================================
// Helpers
// =============================================================================

fn require_caller<B>(req: &Request<B>) -> Result<CallerId, ChainhubError> {
    caller_of(req).ok_or_else(|| ChainhubError::Unauthorized("missing or invalid token".into()))
}

/// Parse a link id path segment; only positive integers are ids
pub fn parse_link_id(raw: &str) -> Result<i64, ChainhubError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ChainhubError::InvalidInput("invalid link id".into())),
    }
}

fn link_input(title: &str, url: &str, position: i64, is_active: bool) -> Result<LinkInput, ChainhubError> {
    let title = title.trim();
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return Err(ChainhubError::InvalidInput("title and url are required".into()));
    }

    Ok(LinkInput {
        title: title.to_string(),
        url: url.to_string(),
        position,
        is_active,
    })
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /links?username=
pub async fn handle_list_links<B>(
    state: &AppState,
    req: Request<B>,
) -> Result<Response<BoxBody>, ChainhubError> {
    let caller = require_caller(&req)?;

    let query: ListLinksQuery = serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|_| ChainhubError::InvalidInput("invalid query string".into()))?;
    let username = query.username.trim().to_string();
    if username.is_empty() {
        return Err(ChainhubError::InvalidInput("username is required".into()));
    }

    let owned = state
        .run_store(move |store| {
            store.with_conn(|conn| links::list_links_for_owner(conn, &username, caller.0))
        })
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &LinkListResponse {
            links: owned.into_iter().map(LinkResponse::from).collect(),
        },
    ))
}

/// POST /links
pub async fn handle_create_link<B>(
    state: &AppState,
    req: Request<B>,
) -> Result<Response<BoxBody>, ChainhubError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let caller = require_caller(&req)?;
    let body: CreateLinkRequest = parse_json_body(req.into_body()).await?;

    if body.tree_id <= 0 {
        return Err(ChainhubError::InvalidInput("tree_id is required".into()));
    }
    let input = link_input(
        &body.title,
        &body.url,
        body.position,
        body.is_active.unwrap_or(true),
    )?;

    let tree_id = body.tree_id;
    let link = state
        .run_store(move |store| {
            store.with_conn(|conn| links::create_owned_link(conn, tree_id, caller.0, &input))
        })
        .await?;

    info!(user_id = caller.0, link_id = link.id, "Link created");
    Ok(json_response(StatusCode::CREATED, &LinkResponse::from(link)))
}

/// PUT /links/{id}
pub async fn handle_update_link<B>(
    state: &AppState,
    req: Request<B>,
    raw_id: &str,
) -> Result<Response<BoxBody>, ChainhubError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let caller = require_caller(&req)?;
    let link_id = parse_link_id(raw_id)?;
    let body: UpdateLinkRequest = parse_json_body(req.into_body()).await?;
    let input = link_input(&body.title, &body.url, body.position, body.is_active)?;

    let link = state
        .run_store(move |store| {
            store.with_conn(|conn| links::update_link(conn, link_id, caller.0, &input))
        })
        .await?;

    info!(user_id = caller.0, link_id, "Link updated");
    Ok(json_response(StatusCode::OK, &LinkResponse::from(link)))
}

/// DELETE /links/{id}
pub async fn handle_delete_link<B>(
    state: &AppState,
    req: Request<B>,
    raw_id: &str,
) -> Result<Response<BoxBody>, ChainhubError> {
    let caller = require_caller(&req)?;
    let link_id = parse_link_id(raw_id)?;

    state
        .run_store(move |store| store.with_conn(|conn| links::delete_link(conn, link_id, caller.0)))
        .await?;

    info!(user_id = caller.0, link_id, "Link deleted");
    Ok(json_response(StatusCode::OK, &DeletedResponse { deleted: true }))
}
