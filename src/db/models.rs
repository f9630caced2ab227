//! Row types for users, trees and links

use chrono::{DateTime, Utc};
use rusqlite::Row;

/// An account. Email and username are unique when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) const COLUMNS: &'static str =
        "id, email, username, password_hash, wallet_address, created_at";

    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            wallet_address: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// A user's public page. Each user owns at most one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Tree {
    pub(crate) const COLUMNS: &'static str = "id, user_id, title, created_at";

    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// A titled URL on a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: i64,
    pub tree_id: i64,
    pub title: String,
    pub url: String,
    pub position: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub(crate) const COLUMNS: &'static str =
        "id, tree_id, title, url, position, is_active, created_at";

    pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            tree_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            position: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

/// Writable fields of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInput {
    pub title: String,
    pub url: String,
    pub position: i64,
    pub is_active: bool,
}
