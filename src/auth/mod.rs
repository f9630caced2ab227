//! Authentication for Chainhub
//!
//! Provides:
//! - Password hashing with Argon2
//! - JWT session token generation and validation
//! - Resolution of the calling identity from the Authorization header

pub mod jwt;
pub mod password;
pub mod resolver;

pub use jwt::{Claims, JwtValidator, TOKEN_TTL_SECONDS};
pub use password::{hash_password, verify_dummy, verify_password, MIN_PASSWORD_LEN};
pub use resolver::{authenticate, caller_of, extract_token_from_header, CallerId};
