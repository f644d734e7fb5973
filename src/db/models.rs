use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub credits: i64,
    pub is_pro: bool,
    pub created_at: String,
}

impl Account {
    pub(crate) const COLUMNS: &'static str =
        "id, email, display_name, password_hash, credits, is_pro, created_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            password_hash: row.get(3)?,
            credits: row.get(4)?,
            is_pro: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub code: String,
    pub is_public: bool,
    pub likes: i64,
    pub views: i64,
    pub created_at: String,
}

impl Artifact {
    pub(crate) const COLUMNS: &'static str =
        "id, owner_id, name, description, prompt, code, is_public, likes, views, created_at";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Artifact {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            prompt: row.get(4)?,
            code: row.get(5)?,
            is_public: row.get(6)?,
            likes: row.get(7)?,
            views: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// Dashboard figures for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    pub credits: i64,
    pub is_pro: bool,
    pub artifact_count: i64,
    pub total_likes: i64,
    pub total_views: i64,
}

/// Site-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total_accounts: i64,
    pub total_artifacts: i64,
    pub public_artifacts: i64,
    pub total_likes: i64,
}
