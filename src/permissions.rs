use crate::{db::Db, errors::ApiError};
use sqlx::Row;

pub async fn require_admin(db: &Db, user_id: &str) -> Result<(), ApiError> {
    let row = sqlx::query("SELECT is_admin FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&db.0)
        .await?;

    match row {
        Some(r) if r.get::<bool, _>("is_admin") => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}
