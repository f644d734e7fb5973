//! Account records: identity, password material, credit balance and plan.
//!
//! Balance mutation belongs to [`crate::ledger`]; `adjust_balance` here is
//! the raw primitive it builds on.

use rusqlite::{params, OptionalExtension};

use crate::config::AccountsConfig;
use crate::db::models::{Account, ProfileSummary};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create an account with the welcome balance and no pro plan.
pub fn register(
    pool: &DbPool,
    config: &AccountsConfig,
    email: &str,
    password: &str,
    display_name: &str,
) -> AppResult<Account> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let display_name = match display_name.trim() {
        "" => email.split('@').next().unwrap_or_default().to_string(),
        name => name.to_string(),
    };

    if get_by_email(pool, &email)?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = bcrypt::hash(password, config.password_cost)?;
    let account = Account {
        id: new_id(),
        email,
        display_name,
        password_hash,
        credits: config.welcome_credits,
        is_pro: false,
        created_at: now_timestamp(),
    };

    let conn = pool.get()?;
    let inserted = conn.execute(
        "INSERT INTO accounts (id, email, display_name, password_hash, credits, is_pro, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            account.id,
            account.email,
            account.display_name,
            account.password_hash,
            account.credits,
            account.is_pro,
            account.created_at
        ],
    );

    match inserted {
        Ok(_) => {
            tracing::info!(account_id = %account.id, "Registered account");
            Ok(account)
        }
        // Lost a race with a concurrent registration for the same email
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(AppError::DuplicateEmail)
        }
        Err(e) => Err(e.into()),
    }
}

/// Verify an email/password pair. Unknown email and wrong password are
/// indistinguishable to the caller.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> AppResult<Account> {
    let account = get_by_email(pool, &normalize_email(email))?
        .ok_or(AppError::InvalidCredentials)?;

    if bcrypt::verify(password, &account.password_hash)? {
        Ok(account)
    } else {
        tracing::debug!(account_id = %account.id, "Password mismatch");
        Err(AppError::InvalidCredentials)
    }
}

pub fn get_by_id(pool: &DbPool, id: &str) -> AppResult<Option<Account>> {
    let conn = pool.get()?;
    let account = conn
        .query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", Account::COLUMNS),
            params![id],
            Account::from_row,
        )
        .optional()?;
    Ok(account)
}

fn get_by_email(pool: &DbPool, email: &str) -> AppResult<Option<Account>> {
    let conn = pool.get()?;
    let account = conn
        .query_row(
            &format!("SELECT {} FROM accounts WHERE email = ?1", Account::COLUMNS),
            params![email],
            Account::from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn set_pro_flag(pool: &DbPool, id: &str, is_pro: bool) -> AppResult<()> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE accounts SET is_pro = ?2 WHERE id = ?1",
        params![id, is_pro],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!(account_id = %id, is_pro, "Updated plan");
    Ok(())
}

/// Unconditionally add `delta` to the balance. Negative deltas that would
/// take the balance below zero are rejected by the schema.
pub fn adjust_balance(pool: &DbPool, id: &str, delta: i64) -> AppResult<()> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE accounts SET credits = credits + ?2 WHERE id = ?1",
        params![id, delta],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn profile_summary(pool: &DbPool, id: &str) -> AppResult<ProfileSummary> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT a.credits, a.is_pro,
                COUNT(p.id), COALESCE(SUM(p.likes), 0), COALESCE(SUM(p.views), 0)
         FROM accounts a
         LEFT JOIN artifacts p ON p.owner_id = a.id
         WHERE a.id = ?1
         GROUP BY a.id",
        params![id],
        |row| {
            Ok(ProfileSummary {
                credits: row.get(0)?,
                is_pro: row.get(1)?,
                artifact_count: row.get(2)?,
                total_likes: row.get(3)?,
                total_views: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

#[cfg(test)]
pub(crate) fn test_config() -> AccountsConfig {
    AccountsConfig {
        welcome_credits: 10,
        password_cost: 4,
    }
}
