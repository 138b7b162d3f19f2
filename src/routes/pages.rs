use crate::{db::Db, errors::ApiError};
use actix_web::{HttpResponse, web};
use sqlx::Row;

const PREVIEW_LEN: usize = 150;

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_LEN {
        let cut: String = content.chars().take(PREVIEW_LEN).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

/// Home-page payload: the five most recent forum comments with their
/// author and parent post, previews capped at 150 chars.
pub async fn home_data(db: web::Data<Db>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query(
        "SELECT c.id, c.content, c.created_at,
                u.id AS author_id, u.name AS author_name,
                p.id AS post_id, p.title AS post_title
         FROM comments c
         INNER JOIN users u ON u.id = c.user_id
         INNER JOIN posts p ON p.id = c.post_id
         ORDER BY c.created_at DESC LIMIT 5",
    )
    .fetch_all(&db.0)
    .await?;

    let comments: Vec<_> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.get::<String, _>("id"),
                "content": preview(&r.get::<String, _>("content")),
                "author": {
                    "id": r.get::<String, _>("author_id"),
                    "name": r.get::<String, _>("author_name"),
                },
                "post": {
                    "id": r.get::<String, _>("post_id"),
                    "title": r.get::<String, _>("post_title"),
                },
                "created_at": r.get::<chrono::DateTime<chrono::Utc>, _>("created_at"),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "recent_comments": comments })))
}
