//! Tree operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Tree;
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::types::ChainhubError;

/// Create the tree for `user_id`. A user may own only one.
pub fn create_tree(conn: &Connection, user_id: i64, title: &str) -> Result<Tree, ChainhubError> {
    let sql = format!(
        "INSERT INTO trees (user_id, title, created_at)
         VALUES (?1, ?2, ?3)
         RETURNING {}",
        Tree::COLUMNS
    );

    conn.query_row(&sql, params![user_id, title, Utc::now()], Tree::from_row)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ChainhubError::Duplicate("user already has a tree".into())
            } else if is_foreign_key_violation(&e) {
                ChainhubError::NotFound("user not found".into())
            } else {
                ChainhubError::from(e)
            }
        })
}

/// Get the tree of the user with this exact username
pub fn get_tree_by_username(conn: &Connection, username: &str) -> Result<Tree, ChainhubError> {
    conn.query_row(
        "SELECT t.id, t.user_id, t.title, t.created_at
         FROM trees t
         JOIN users u ON u.id = t.user_id
         WHERE u.username = ?1
         ORDER BY t.id
         LIMIT 1",
        params![username],
        Tree::from_row,
    )
    .optional()?
    .ok_or_else(|| ChainhubError::NotFound("tree not found".into()))
}

/// Check whether `tree_id` exists and is owned by `user_id`
pub fn tree_belongs_to_user(
    conn: &Connection,
    tree_id: i64,
    user_id: i64,
) -> Result<bool, ChainhubError> {
    let owned: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM trees WHERE id = ?1 AND user_id = ?2)",
        params![tree_id, user_id],
        |row| row.get(0),
    )?;
    Ok(owned)
}
