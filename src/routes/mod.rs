//! HTTP routes for Chainhub
//!
//! Handlers return `Result<Response<BoxBody>, ChainhubError>`; the server
//! turns an error into a JSON `{"error": ...}` body with the matching
//! status.

pub mod auth_routes;
pub mod health;
pub mod links;
pub mod tree;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::types::ChainhubError;

pub use auth_routes::{handle_login, handle_me, handle_signup};
pub use health::{health_check, readiness_check};
pub use links::{handle_create_link, handle_delete_link, handle_list_links, handle_update_link};
pub use tree::handle_get_tree;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest request body accepted, in bytes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_response(status: StatusCode) -> Response<BoxBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    match serde_json::to_vec(body) {
        Ok(json) => {
            let mut response = Response::new(full_body(json));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            error_response(&ChainhubError::Internal(e.to_string()))
        }
    }
}

/// JSON error response carrying only the public message
pub fn error_response(err: &ChainhubError) -> Response<BoxBody> {
    match err {
        ChainhubError::Internal(_) | ChainhubError::Config(_) => error!("{}", err),
        _ => debug!("{}", err),
    }

    let message = err.public_message();
    let json = serde_json::to_vec(&ErrorBody { error: &message })
        .unwrap_or_else(|_| br#"{"error":"internal server error"}"#.to_vec());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = err.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Read a JSON body of at most [`MAX_BODY_BYTES`]
pub async fn parse_json_body<T, B>(body: B) -> Result<T, ChainhubError>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ChainhubError::InvalidInput("request body too large".into())
            } else {
                ChainhubError::InvalidInput("failed to read request body".into())
            }
        })?;

    serde_json::from_slice(&collected.to_bytes())
        .map_err(|_| ChainhubError::InvalidInput("invalid JSON body".into()))
}
