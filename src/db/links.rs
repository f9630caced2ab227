//! Link operations
//!
//! Public reads go through [`list_active_links`]. Everything else is scoped
//! to an owner: the owner id is part of the SQL predicate, and a miss is
//! reported as `NotFound` whether the row is absent or belongs to someone
//! else.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Link, LinkInput};
use crate::types::ChainhubError;

/// Active links of a tree, ordered by `(position, id)`
pub fn list_active_links(conn: &Connection, tree_id: i64) -> Result<Vec<Link>, ChainhubError> {
    let sql = format!(
        "SELECT {} FROM links
         WHERE tree_id = ?1 AND is_active = 1
         ORDER BY position ASC, id ASC",
        Link::COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let links = stmt
        .query_map(params![tree_id], Link::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(links)
}

/// All links, active or not, on the tree of `username`, provided that tree
/// is owned by `user_id`
pub fn list_links_for_owner(
    conn: &Connection,
    username: &str,
    user_id: i64,
) -> Result<Vec<Link>, ChainhubError> {
    // One row per link, or a single row of NULL link columns when the
    // owned tree is empty. No rows at all means no owned tree.
    let mut stmt = conn.prepare(
        "SELECT l.id, l.tree_id, l.title, l.url, l.position, l.is_active, l.created_at
         FROM trees t
         JOIN users u ON u.id = t.user_id
         LEFT JOIN links l ON l.tree_id = t.id
         WHERE t.user_id = ?1 AND u.username = ?2
         ORDER BY l.position ASC, l.id ASC",
    )?;

    let rows = stmt
        .query_map(params![user_id, username], |row| {
            let id: Option<i64> = row.get(0)?;
            match id {
                Some(_) => Link::from_row(row).map(Some),
                None => Ok(None),
            }
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Err(ChainhubError::NotFound("tree not found".into()));
    }

    Ok(rows.into_iter().flatten().collect())
}

/// Insert a link without checking ownership.
///
/// Only call this after [`crate::db::trees::tree_belongs_to_user`] has
/// returned true for the caller; [`create_owned_link`] does both at once.
pub fn create_link(
    conn: &Connection,
    tree_id: i64,
    input: &LinkInput,
) -> Result<Link, ChainhubError> {
    let sql = format!(
        "INSERT INTO links (tree_id, title, url, position, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING {}",
        Link::COLUMNS
    );

    let link = conn.query_row(
        &sql,
        params![
            tree_id,
            input.title,
            input.url,
            input.position,
            input.is_active,
            Utc::now()
        ],
        Link::from_row,
    )?;

    Ok(link)
}

/// Insert a link only if `tree_id` is owned by `user_id`
pub fn create_owned_link(
    conn: &Connection,
    tree_id: i64,
    user_id: i64,
    input: &LinkInput,
) -> Result<Link, ChainhubError> {
    let sql = format!(
        "INSERT INTO links (tree_id, title, url, position, is_active, created_at)
         SELECT id, ?3, ?4, ?5, ?6, ?7 FROM trees WHERE id = ?1 AND user_id = ?2
         RETURNING {}",
        Link::COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            tree_id,
            user_id,
            input.title,
            input.url,
            input.position,
            input.is_active,
            Utc::now()
        ],
        Link::from_row,
    )
    .optional()?
    .ok_or_else(|| ChainhubError::NotFound("tree not found".into()))
}

/// Overwrite a link owned by `user_id`
pub fn update_link(
    conn: &Connection,
    link_id: i64,
    user_id: i64,
    input: &LinkInput,
) -> Result<Link, ChainhubError> {
    let sql = format!(
        "UPDATE links
         SET title = ?3, url = ?4, position = ?5, is_active = ?6
         WHERE id = ?1
           AND tree_id IN (SELECT id FROM trees WHERE user_id = ?2)
         RETURNING {}",
        Link::COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            link_id,
            user_id,
            input.title,
            input.url,
            input.position,
            input.is_active
        ],
        Link::from_row,
    )
    .optional()?
    .ok_or_else(|| ChainhubError::NotFound("link not found".into()))
}

/// Delete a link owned by `user_id`
pub fn delete_link(conn: &Connection, link_id: i64, user_id: i64) -> Result<(), ChainhubError> {
    let affected = conn.execute(
        "DELETE FROM links
         WHERE id = ?1
           AND tree_id IN (SELECT id FROM trees WHERE user_id = ?2)",
        params![link_id, user_id],
    )?;

    if affected == 0 {
        return Err(ChainhubError::NotFound("link not found".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::trees::tree_belongs_to_user;
    use crate::db::users::register_user;
    use crate::db::Store;

    struct Owner {
        user_id: i64,
        tree_id: i64,
    }

    fn owner(store: &Store, email: &str, username: &str) -> Owner {
        let (user, tree) = store
            .with_conn_mut(|conn| register_user(conn, email, username, "hash", "tree"))
            .unwrap();
        Owner {
            user_id: user.id,
            tree_id: tree.id,
        }
    }

    fn input(title: &str, position: i64, is_active: bool) -> LinkInput {
        LinkInput {
            title: title.to_string(),
            url: format!("https://{}.example", title.to_lowercase()),
            position,
            is_active,
        }
    }

    #[test]
    fn test_active_links_only_and_ordered() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let links = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("B", 1, true))?;
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Hidden", 0, false))?;
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("A", 1, true))?;
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("First", 0, true))?;
                list_active_links(conn, alice.tree_id)
            })
            .unwrap();

        let titles: Vec<_> = links.iter().map(|l| l.title.as_str()).collect();
        // Equal positions fall back to insertion id
        assert_eq!(titles, vec!["First", "B", "A"]);
        assert!(links.iter().all(|l| l.is_active));
    }

    #[test]
    fn test_owner_listing_includes_inactive() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let links = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("On", 1, true))?;
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Off", 0, false))?;
                list_links_for_owner(conn, "alice", alice.user_id)
            })
            .unwrap();

        let titles: Vec<_> = links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Off", "On"]);
    }

    #[test]
    fn test_owner_listing_of_empty_tree() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let links = store
            .with_conn(|conn| list_links_for_owner(conn, "alice", alice.user_id))
            .unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_owner_listing_hides_other_trees() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");
        let bob = owner(&store, "b@x.com", "bob");

        store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Mine", 0, true))?;
                Ok(())
            })
            .unwrap();

        let foreign = store
            .with_conn(|conn| list_links_for_owner(conn, "alice", bob.user_id))
            .unwrap_err();
        let missing = store
            .with_conn(|conn| list_links_for_owner(conn, "nobody", bob.user_id))
            .unwrap_err();

        assert!(matches!(foreign, ChainhubError::NotFound(_)));
        assert!(matches!(missing, ChainhubError::NotFound(_)));
        assert_eq!(foreign.public_message(), missing.public_message());
    }

    #[test]
    fn test_create_owned_link_rejects_foreign_tree() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");
        let bob = owner(&store, "b@x.com", "bob");

        let err = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, bob.user_id, &input("Sneaky", 0, true))
            })
            .unwrap_err();
        assert!(matches!(err, ChainhubError::NotFound(_)));

        let err = store
            .with_conn(|conn| create_owned_link(conn, 9999, bob.user_id, &input("X", 0, true)))
            .unwrap_err();
        assert!(matches!(err, ChainhubError::NotFound(_)));

        let count = store
            .with_conn(|conn| list_active_links(conn, alice.tree_id))
            .unwrap()
            .len();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_guarded_create_link() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let link = store
            .with_conn(|conn| {
                assert!(tree_belongs_to_user(conn, alice.tree_id, alice.user_id)?);
                create_link(conn, alice.tree_id, &input("Site", 0, true))
            })
            .unwrap();
        assert_eq!(link.tree_id, alice.tree_id);
        assert_eq!(link.url, "https://site.example");
        assert!(link.is_active);
    }

    #[test]
    fn test_update_link_by_owner() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let created = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Old", 0, true))
            })
            .unwrap();

        let updated = store
            .with_conn(|conn| {
                update_link(conn, created.id, alice.user_id, &input("New", 3, false))
            })
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "New");
        assert_eq!(updated.position, 3);
        assert!(!updated.is_active);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn test_wrong_owner_cannot_update_or_delete() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");
        let bob = owner(&store, "b@x.com", "bob");

        let link = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Site", 0, true))
            })
            .unwrap();

        let err = store
            .with_conn(|conn| update_link(conn, link.id, bob.user_id, &input("Pwned", 0, true)))
            .unwrap_err();
        assert!(matches!(err, ChainhubError::NotFound(_)));

        let err = store
            .with_conn(|conn| delete_link(conn, link.id, bob.user_id))
            .unwrap_err();
        assert!(matches!(err, ChainhubError::NotFound(_)));

        let links = store
            .with_conn(|conn| list_active_links(conn, alice.tree_id))
            .unwrap();
        assert_eq!(links, vec![link]);
    }

    #[test]
    fn test_delete_link() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner(&store, "a@x.com", "alice");

        let link = store
            .with_conn(|conn| {
                create_owned_link(conn, alice.tree_id, alice.user_id, &input("Site", 0, true))
            })
            .unwrap();

        store
            .with_conn(|conn| delete_link(conn, link.id, alice.user_id))
            .unwrap();

        // Second delete finds nothing
        let err = store
            .with_conn(|conn| delete_link(conn, link.id, alice.user_id))
            .unwrap_err();
        assert!(matches!(err, ChainhubError::NotFound(_)));
    }
}
