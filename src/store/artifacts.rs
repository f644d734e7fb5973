//! Generated artifacts, the public gallery and like bookkeeping.

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::models::{Artifact, Stats};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub struct NewArtifact<'a> {
    pub owner_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub prompt: &'a str,
    pub code: &'a str,
    pub is_public: bool,
}

/// Owner edits; `None` leaves the field as is.
#[derive(Debug, Default, Clone)]
pub struct ArtifactUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

const NEWEST_FIRST: &str = "created_at DESC, rowid DESC";
const GALLERY_ORDER: &str = "likes DESC, created_at DESC, rowid DESC";

pub fn create(pool: &DbPool, new: &NewArtifact<'_>) -> AppResult<String> {
    let id = new_id();
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO artifacts (id, owner_id, name, description, prompt, code, is_public, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.owner_id,
            new.name,
            new.description,
            new.prompt,
            new.code,
            new.is_public,
            now_timestamp()
        ],
    )?;
    tracing::info!(artifact_id = %id, owner_id = new.owner_id, "Artifact created");
    Ok(id)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> AppResult<Option<Artifact>> {
    let conn = pool.get()?;
    let artifact = conn
        .query_row(
            &format!("SELECT {} FROM artifacts WHERE id = ?1", Artifact::COLUMNS),
            params![id],
            Artifact::from_row,
        )
        .optional()?;
    Ok(artifact)
}

pub fn list_by_owner(pool: &DbPool, owner_id: &str) -> AppResult<Vec<Artifact>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM artifacts WHERE owner_id = ?1 ORDER BY {}",
        Artifact::COLUMNS,
        NEWEST_FIRST
    ))?;
    let rows = stmt
        .query_map(params![owner_id], Artifact::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Public artifacts, most liked first, then newest.
pub fn list_public(pool: &DbPool, limit: Option<usize>) -> AppResult<Vec<Artifact>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM artifacts WHERE is_public = 1 ORDER BY {} LIMIT ?1",
        Artifact::COLUMNS,
        GALLERY_ORDER
    ))?;
    // LIMIT -1 is unbounded in SQLite
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let rows = stmt
        .query_map(params![limit], Artifact::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Case-insensitive substring match on name or description over public
/// artifacts, in gallery order. Matching is done here rather than with
/// SQL `LIKE`, which only folds ASCII, so the scan reads just the matched
/// columns and full rows are loaded for the hits alone.
pub fn search(pool: &DbPool, query: &str, limit: Option<usize>) -> AppResult<Vec<Artifact>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return list_public(pool, limit);
    }
    let cap = limit.unwrap_or(usize::MAX);

    let conn = pool.get()?;
    let mut scan = conn.prepare(&format!(
        "SELECT id, name, description FROM artifacts WHERE is_public = 1 ORDER BY {}",
        GALLERY_ORDER
    ))?;
    let mut rows = scan.query([])?;
    let mut hits = Vec::new();
    while hits.len() < cap {
        let Some(row) = rows.next()? else { break };
        let name: String = row.get(1)?;
        let description: String = row.get(2)?;
        if name.to_lowercase().contains(&needle) || description.to_lowercase().contains(&needle) {
            hits.push(row.get::<_, String>(0)?);
        }
    }
    drop(rows);

    let mut fetch = conn.prepare(&format!(
        "SELECT {} FROM artifacts WHERE id = ?1",
        Artifact::COLUMNS
    ))?;
    let mut found = Vec::with_capacity(hits.len());
    for id in &hits {
        // Deleted between the scan and the fetch
        if let Some(artifact) = fetch.query_row(params![id], Artifact::from_row).optional()? {
            found.push(artifact);
        }
    }
    Ok(found)
}

/// Flip `account_id`'s like on an artifact. Returns `true` when the like was
/// added, `false` when it was removed.
///
/// Relation and counter change in one IMMEDIATE transaction, so concurrent
/// togglers serialize on the write lock and the counter always equals the
/// number of like rows.
pub fn toggle_like(pool: &DbPool, artifact_id: &str, account_id: &str) -> AppResult<bool> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM artifacts WHERE id = ?1",
        params![artifact_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound);
    }

    let removed = tx.execute(
        "DELETE FROM likes WHERE artifact_id = ?1 AND account_id = ?2",
        params![artifact_id, account_id],
    )?;

    let added = if removed == 1 {
        tx.execute(
            "UPDATE artifacts SET likes = likes - 1 WHERE id = ?1",
            params![artifact_id],
        )?;
        false
    } else {
        tx.execute(
            "INSERT INTO likes (artifact_id, account_id) VALUES (?1, ?2)",
            params![artifact_id, account_id],
        )?;
        tx.execute(
            "UPDATE artifacts SET likes = likes + 1 WHERE id = ?1",
            params![artifact_id],
        )?;
        true
    };

    tx.commit()?;
    tracing::debug!(artifact_id, account_id, added, "Like toggled");
    Ok(added)
}

pub fn has_liked(pool: &DbPool, artifact_id: &str, account_id: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let liked = conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE artifact_id = ?1 AND account_id = ?2",
        params![artifact_id, account_id],
        |row| row.get(0),
    )?;
    Ok(liked)
}

pub fn record_view(pool: &DbPool, id: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE artifacts SET views = views + 1 WHERE id = ?1",
        params![id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Apply owner edits. Non-owners get `Forbidden`.
pub fn update(
    pool: &DbPool,
    id: &str,
    owner_id: &str,
    changes: &ArtifactUpdate,
) -> AppResult<Artifact> {
    let artifact = get_by_id(pool, id)?.ok_or(AppError::NotFound)?;
    if artifact.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".into()));
        }
    }

    {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE artifacts SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                is_public = COALESCE(?4, is_public)
             WHERE id = ?1",
            params![
                id,
                changes.name.as_deref().map(str::trim),
                changes.description,
                changes.is_public
            ],
        )?;
    }

    get_by_id(pool, id)?.ok_or(AppError::NotFound)
}

/// Remove an artifact together with its likes.
pub fn delete(pool: &DbPool, id: &str) -> AppResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM likes WHERE artifact_id = ?1", params![id])?;
    let rows = tx.execute("DELETE FROM artifacts WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    tx.commit()?;
    tracing::info!(artifact_id = id, "Artifact deleted");
    Ok(())
}

pub fn stats(pool: &DbPool) -> AppResult<Stats> {
    let conn = pool.get()?;
    let stats = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM accounts),
            (SELECT COUNT(*) FROM artifacts),
            (SELECT COUNT(*) FROM artifacts WHERE is_public = 1),
            (SELECT COALESCE(SUM(likes), 0) FROM artifacts)",
        [],
        |row| {
            Ok(Stats {
                total_accounts: row.get(0)?,
                total_artifacts: row.get(1)?,
                public_artifacts: row.get(2)?,
                total_likes: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::accounts::{register, test_config};

    fn owner(pool: &DbPool, email: &str) -> String {
        register(pool, &test_config(), email, "pw", "").unwrap().id
    }

    fn make(pool: &DbPool, owner_id: &str, name: &str, is_public: bool) -> String {
        create(
            pool,
            &NewArtifact {
                owner_id,
                name,
                description: "",
                prompt: "make something",
                code: "import streamlit as st",
                is_public,
            },
        )
        .unwrap()
    }

    fn names(artifacts: &[Artifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn create_and_get_round_trip() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let id = make(&pool, &alice, "Calculator", true);

        let artifact = get_by_id(&pool, &id).unwrap().unwrap();
        assert_eq!(artifact.owner_id, alice);
        assert_eq!(artifact.name, "Calculator");
        assert!(artifact.is_public);
        assert_eq!(artifact.likes, 0);
        assert_eq!(artifact.views, 0);
        assert!(get_by_id(&pool, "missing").unwrap().is_none());
    }

    #[test]
    fn list_by_owner_is_newest_first() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        make(&pool, &alice, "First", false);
        make(&pool, &alice, "Second", true);
        make(&pool, &bob, "Other", true);

        let mine = list_by_owner(&pool, &alice).unwrap();
        assert_eq!(names(&mine), vec!["Second", "First"]);
    }

    #[test]
    fn list_public_orders_by_likes_then_newest() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let old = make(&pool, &alice, "Old", true);
        make(&pool, &alice, "New", true);
        make(&pool, &alice, "Hidden", false);

        assert_eq!(names(&list_public(&pool, None).unwrap()), vec!["New", "Old"]);

        toggle_like(&pool, &old, &bob).unwrap();
        assert_eq!(names(&list_public(&pool, None).unwrap()), vec!["Old", "New"]);
        assert_eq!(names(&list_public(&pool, Some(1)).unwrap()), vec!["Old"]);
    }

    #[test]
    fn search_excludes_private_matches() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        make(&pool, &alice, "Calculator", true);
        make(&pool, &alice, "Todo", true);
        make(&pool, &alice, "Calc Pro", false);

        let found = search(&pool, "calc", None).unwrap();
        assert_eq!(names(&found), vec!["Calculator"]);
    }

    #[test]
    fn search_caps_results_in_gallery_order() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let liked = make(&pool, &alice, "Calc One", true);
        make(&pool, &alice, "Calc Two", true);
        make(&pool, &alice, "Calc Three", true);
        toggle_like(&pool, &liked, &bob).unwrap();

        assert_eq!(
            names(&search(&pool, "CALC", Some(2)).unwrap()),
            vec!["Calc One", "Calc Three"]
        );
        assert!(search(&pool, "calc", Some(0)).unwrap().is_empty());
    }

    #[test]
    fn search_matches_description_and_folds_unicode() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        create(
            &pool,
            &NewArtifact {
                owner_id: &alice,
                name: "Tracker",
                description: "ÖDEME planı",
                prompt: "",
                code: "pass",
                is_public: true,
            },
        )
        .unwrap();

        let found = search(&pool, "ödeme", None).unwrap();
        assert_eq!(names(&found), vec!["Tracker"]);
        assert_eq!(found[0].code, "pass");
        assert!(search(&pool, "nothing", None).unwrap().is_empty());
        assert_eq!(search(&pool, "  ", None).unwrap().len(), 1);
    }

    #[test]
    fn toggle_like_twice_restores_count() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let id = make(&pool, &alice, "Calculator", true);

        assert!(toggle_like(&pool, &id, &bob).unwrap());
        assert_eq!(get_by_id(&pool, &id).unwrap().unwrap().likes, 1);
        assert!(has_liked(&pool, &id, &bob).unwrap());

        assert!(!toggle_like(&pool, &id, &bob).unwrap());
        assert_eq!(get_by_id(&pool, &id).unwrap().unwrap().likes, 0);
        assert!(!has_liked(&pool, &id, &bob).unwrap());
    }

    #[test]
    fn likes_count_distinct_accounts() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let id = make(&pool, &alice, "Calculator", true);

        toggle_like(&pool, &id, &alice).unwrap();
        toggle_like(&pool, &id, &bob).unwrap();
        assert_eq!(get_by_id(&pool, &id).unwrap().unwrap().likes, 2);
    }

    #[test]
    fn toggle_like_on_missing_artifact_is_not_found() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        assert!(matches!(
            toggle_like(&pool, "missing", &alice),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn delete_removes_artifact_and_likes() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let id = make(&pool, &alice, "Calculator", true);
        toggle_like(&pool, &id, &bob).unwrap();

        delete(&pool, &id).unwrap();
        assert!(get_by_id(&pool, &id).unwrap().is_none());
        assert!(!has_liked(&pool, &id, &bob).unwrap());
        assert!(matches!(delete(&pool, &id), Err(AppError::NotFound)));
    }

    #[test]
    fn update_is_owner_only() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let id = make(&pool, &alice, "Draft", false);

        let changes = ArtifactUpdate {
            name: Some("Budget Planner".into()),
            description: None,
            is_public: Some(true),
        };
        assert!(matches!(
            update(&pool, &id, &bob, &changes),
            Err(AppError::Forbidden)
        ));

        let updated = update(&pool, &id, &alice, &changes).unwrap();
        assert_eq!(updated.name, "Budget Planner");
        assert!(updated.is_public);
        assert_eq!(updated.description, "");
    }

    #[test]
    fn record_view_and_stats() {
        let pool = test_pool();
        let alice = owner(&pool, "alice@example.com");
        let bob = owner(&pool, "bob@example.com");
        let id = make(&pool, &alice, "Calculator", true);
        make(&pool, &alice, "Private", false);

        record_view(&pool, &id).unwrap();
        record_view(&pool, &id).unwrap();
        toggle_like(&pool, &id, &bob).unwrap();
        assert_eq!(get_by_id(&pool, &id).unwrap().unwrap().views, 2);

        assert_eq!(
            stats(&pool).unwrap(),
            Stats {
                total_accounts: 2,
                total_artifacts: 2,
                public_artifacts: 1,
                total_likes: 1,
            }
        );

        let summary = crate::store::accounts::profile_summary(&pool, &alice).unwrap();
        assert_eq!(summary.artifact_count, 2);
        assert_eq!(summary.total_likes, 1);
        assert_eq!(summary.total_views, 2);
    }
}
