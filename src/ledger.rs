//! Credit ledger: check-and-decrement and refund against the account balance.

use rusqlite::{params, OptionalExtension};

use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::store::accounts;

/// How a consume request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Balance was decremented; a failed operation must refund it.
    Charged,
    /// Pro-plan account, balance untouched.
    Unmetered,
    /// Balance too low, nothing changed.
    Refused,
}

impl Consumption {
    pub fn granted(self) -> bool {
        !matches!(self, Consumption::Refused)
    }
}

/// Consume `amount` credits if the account can afford it.
///
/// The decrement is one conditional UPDATE so concurrent callers on the same
/// account can never both spend the last credit.
pub fn try_consume(pool: &DbPool, account_id: &str, amount: i64) -> AppResult<Consumption> {
    let conn = pool.get()?;
    let charged = conn.execute(
        "UPDATE accounts SET credits = credits - ?2
         WHERE id = ?1 AND is_pro = 0 AND credits >= ?2",
        params![account_id, amount],
    )?;

    if charged == 1 {
        tracing::debug!(account_id, amount, "Credit consumed");
        return Ok(Consumption::Charged);
    }

    let is_pro: Option<bool> = conn
        .query_row(
            "SELECT is_pro FROM accounts WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .optional()?;

    match is_pro {
        Some(true) => Ok(Consumption::Unmetered),
        Some(false) => {
            tracing::info!(account_id, amount, "Credit refused");
            Ok(Consumption::Refused)
        }
        None => Err(AppError::NotFound),
    }
}

/// Give `amount` credits back. Pro accounts are credited too; the extra
/// balance is harmless since it is never consulted for them.
pub fn refund(pool: &DbPool, account_id: &str, amount: i64) -> AppResult<()> {
    accounts::adjust_balance(pool, account_id, amount)?;
    tracing::info!(account_id, amount, "Credit refunded");
    Ok(())
}
