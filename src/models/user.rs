use sqlx::FromRow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub user_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}
