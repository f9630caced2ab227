//! User operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::db::models::{Tree, User};
use crate::db::{is_unique_violation, trees};
use crate::types::ChainhubError;

/// Insert a user.
///
/// The insert is attempted directly and a UNIQUE violation on email or
/// username becomes `Duplicate`; there is no check-then-insert.
pub fn create_user(
    conn: &Connection,
    email: &str,
    username: &str,
    password_hash: &str,
) -> Result<User, ChainhubError> {
    let sql = format!(
        "INSERT INTO users (email, username, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING {}",
        User::COLUMNS
    );

    conn.query_row(
        &sql,
        params![email, username, password_hash, Utc::now()],
        User::from_row,
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            debug!("Duplicate signup for {} / {}", email, username);
            ChainhubError::Duplicate("email or username already in use".into())
        } else {
            ChainhubError::from(e)
        }
    })
}

/// Create a user and their tree in one transaction
pub fn register_user(
    conn: &mut Connection,
    email: &str,
    username: &str,
    password_hash: &str,
    tree_title: &str,
) -> Result<(User, Tree), ChainhubError> {
    let tx = conn.transaction()?;

    let user = create_user(&tx, email, username, password_hash)?;
    let tree = trees::create_tree(&tx, user.id, tree_title)?;

    tx.commit()?;
    Ok((user, tree))
}

/// Find a user whose email or username equals `identifier`.
///
/// An email match wins if the identifier happens to be one user's email
/// and another user's username.
pub fn get_user_by_email_or_username(
    conn: &Connection,
    identifier: &str,
) -> Result<User, ChainhubError> {
    let sql = format!(
        "SELECT {} FROM users
         WHERE email = ?1 OR username = ?1
         ORDER BY (email = ?1) DESC
         LIMIT 1",
        User::COLUMNS
    );

    conn.query_row(&sql, params![identifier], User::from_row)
        .optional()?
        .ok_or_else(|| ChainhubError::NotFound("user not found".into()))
}

/// Get a user by id
pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<User, ChainhubError> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);

    conn.query_row(&sql, params![id], User::from_row)
        .optional()?
        .ok_or_else(|| ChainhubError::NotFound("user not found".into()))
}
