//! Public tree page: GET /tree/{username}

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::db::{links, trees};
use crate::routes::links::LinkResponse;
use crate::routes::{json_response, BoxBody};
use crate::server::AppState;
use crate::types::ChainhubError;

#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub id: i64,
    pub username: String,
    pub title: String,
    pub links: Vec<LinkResponse>,
}

/// GET /tree/{username}
///
/// `raw_username` is the path segment as sent, still percent-encoded.
/// Only active links are listed. No authentication.
pub async fn handle_get_tree(
    state: &AppState,
    raw_username: &str,
) -> Result<Response<BoxBody>, ChainhubError> {
    let username = urlencoding::decode(raw_username)
        .map_err(|_| ChainhubError::InvalidInput("invalid username encoding".into()))?
        .into_owned();
    if username.is_empty() {
        return Err(ChainhubError::InvalidInput("username is required".into()));
    }

    let lookup = username.clone();
    let (tree, active) = state
        .run_store(move |store| {
            store.with_conn(|conn| {
                let tree = trees::get_tree_by_username(conn, &lookup)?;
                let active = links::list_active_links(conn, tree.id)?;
                Ok((tree, active))
            })
        })
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &TreeResponse {
            id: tree.id,
            username,
            title: tree.title,
            links: active.into_iter().map(LinkResponse::from).collect(),
        },
    ))
}
