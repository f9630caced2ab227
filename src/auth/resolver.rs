//! Inbound identity resolution
//!
//! Turns the `Authorization` header of a request into the caller's
//! identity id. Resolution happens once per request, before any handler
//! runs, and the result travels in the request's extensions.

use hyper::header::AUTHORIZATION;
use hyper::Request;
use tracing::warn;

use crate::auth::JwtValidator;
use crate::types::ChainhubError;

/// Authorization scheme accepted on inbound requests
const BEARER_SCHEME: &str = "Bearer";

/// Identity id of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub i64);

/// Extract token from an Authorization header value.
///
/// Accepts `<Scheme> <token>` where the scheme matches `Bearer` in any
/// case and exactly one token follows a single space. Anything else is
/// treated as absent.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let (scheme, token) = auth_header?.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token)
}

/// Resolve the caller of `req` and attach the identity to its extensions.
///
/// A missing or malformed header fails without attempting verification.
pub fn authenticate<B>(jwt: &JwtValidator, req: &mut Request<B>) -> Result<CallerId, ChainhubError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(header)
        .ok_or_else(|| ChainhubError::Unauthorized("missing or invalid token".into()))?;

    let caller = match jwt.verify_token(token) {
        Ok(subject) => CallerId(subject),
        Err(err) => {
            warn!("Rejected request with invalid token: {} {}", req.method(), req.uri().path());
            return Err(err);
        }
    };

    req.extensions_mut().insert(caller);
    Ok(caller)
}

/// Identity previously attached by [`authenticate`]
pub fn caller_of<B>(req: &Request<B>) -> Option<CallerId> {
    req.extensions().get::<CallerId>().copied()
}
