//! Shared types for Chainhub

mod error;

pub use error::ChainhubError;
