//! Chainhub - link-in-bio pages with owner-only editing
//!
//! Each user owns one public tree of ordered links. Anyone can read the
//! active links of a tree by username; only the owner can list, add,
//! change or remove them.
//!
//! ## Layers
//!
//! - **auth**: Argon2 password hashing, HS256 session tokens, and
//!   resolution of the caller from the `Authorization` header
//! - **db**: SQLite store whose private reads and writes carry the owner
//!   id in the same statement as the effect
//! - **routes** / **server**: JSON over hyper http1

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::ChainhubError;
