use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account holder. Registration and authentication live outside this service;
/// the row only anchors wallets and orders.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
}
