use crate::{auth::AuthUser, db::Db, errors::ApiError};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use sqlx::Row;

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn post_json(row: &sqlx::sqlite::SqliteRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.get::<String, _>("id"),
        "title": row.get::<String, _>("title"),
        "content": row.get::<String, _>("content"),
        "category": row.get::<String, _>("category"),
        "author": {
            "id": row.get::<String, _>("author_id"),
            "name": row.get::<String, _>("author_name"),
        },
        "created_at": row.get::<chrono::DateTime<Utc>, _>("created_at"),
        "likes_count": row.get::<i64, _>("likes_count"),
        "comments_count": row.get::<i64, _>("comments_count"),
        "image_url": row.get::<Option<String>, _>("image_url"),
    })
}

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.category, p.image_url, p.created_at,
       u.id AS author_id, u.name AS author_name,
       (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
       (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count";

pub async fn list_posts(
    db: web::Data<Db>,
    q: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = q.page.unwrap_or(1).max(1);
    let per_page = q.per_page.unwrap_or(10).clamp(1, 100);

    let mut where_sql = String::from("WHERE 1=1");
    if q.category.is_some() {
        where_sql.push_str(" AND p.category = ?");
    }
    if q.search.is_some() {
        where_sql.push_str(" AND (p.title LIKE ? OR p.content LIKE ?)");
    }

    let count_sql = format!("SELECT COUNT(*) AS total FROM posts p {where_sql}");
    let mut count_q = sqlx::query(&count_sql);
    if let Some(cat) = &q.category {
        count_q = count_q.bind(cat);
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{search}%");
        count_q = count_q.bind(pattern.clone()).bind(pattern);
    }
    let total: i64 = count_q.fetch_one(&db.0).await?.get("total");

    let list_sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p INNER JOIN users u ON u.id = p.user_id
         {where_sql} ORDER BY p.created_at DESC LIMIT ? OFFSET ?"
    );
    let mut list_q = sqlx::query(&list_sql);
    if let Some(cat) = &q.category {
        list_q = list_q.bind(cat);
    }
    if let Some(search) = &q.search {
        let pattern = format!("%{search}%");
        list_q = list_q.bind(pattern.clone()).bind(pattern);
    }
    let rows = list_q
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&db.0)
        .await?;

    let posts: Vec<_> = rows.iter().map(post_json).collect();
    let pages = if total == 0 { 0 } else { (total + per_page - 1) / per_page };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "posts": posts,
        "pagination": {
            "page": page,
            "per_page": per_page,
            "total": total,
            "pages": pages,
            "has_next": page < pages,
            "has_prev": page > 1,
        }
    })))
}

pub async fn get_post(
    db: web::Data<Db>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let post_id = path.into_inner();
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p INNER JOIN users u ON u.id = p.user_id WHERE p.id = ?"
    );
    let row = sqlx::query(&sql)
        .bind(&post_id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;

    let comment_rows = sqlx::query(
        "SELECT c.id, c.content, c.created_at, u.id AS author_id, u.name AS author_name
         FROM comments c INNER JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ? ORDER BY c.created_at ASC",
    )
    .bind(&post_id)
    .fetch_all(&db.0)
    .await?;

    let comments: Vec<_> = comment_rows
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.get::<String, _>("id"),
                "content": c.get::<String, _>("content"),
                "author": {
                    "id": c.get::<String, _>("author_id"),
                    "name": c.get::<String, _>("author_name"),
                },
                "created_at": c.get::<chrono::DateTime<Utc>, _>("created_at"),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "post": post_json(&row),
        "comments": comments,
    })))
}

#[derive(Deserialize)]
pub struct CreatePostReq {
    pub title: String,
    pub content: String,
    pub category: String,
    pub image_url: Option<String>,
}

pub async fn create_post(
    db: web::Data<Db>,
    user: AuthUser,
    body: web::Json<CreatePostReq>,
) -> Result<HttpResponse, ApiError> {
    if body.title.trim().is_empty() || body.content.trim().is_empty() || body.category.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "title, content and category are required".into(),
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO posts(id, user_id, category, title, content, image_url, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&user.user_id)
    .bind(body.category.trim())
    .bind(body.title.trim())
    .bind(&body.content)
    .bind(&body.image_url)
    .bind(now)
    .execute(&db.0)
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id, "created_at": now })))
}

#[derive(Deserialize)]
pub struct CommentReq {
    pub content: String,
}

pub async fn add_comment(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<CommentReq>,
) -> Result<HttpResponse, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    let post_id = path.into_inner();
    let post = sqlx::query("SELECT id FROM posts WHERE id = ?")
        .bind(&post_id)
        .fetch_optional(&db.0)
        .await?;
    if post.is_none() {
        return Err(ApiError::NotFound);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO comments(id, post_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&post_id)
    .bind(&user.user_id)
    .bind(&body.content)
    .bind(now)
    .execute(&db.0)
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id, "created_at": now })))
}

/// One like per (user, post); a second like takes the first one back.
pub async fn toggle_like(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let post_id = path.into_inner();
    let post = sqlx::query("SELECT id FROM posts WHERE id = ?")
        .bind(&post_id)
        .fetch_optional(&db.0)
        .await?;
    if post.is_none() {
        return Err(ApiError::NotFound);
    }

    let existing = sqlx::query("SELECT id FROM likes WHERE user_id = ? AND post_id = ?")
        .bind(&user.user_id)
        .bind(&post_id)
        .fetch_optional(&db.0)
        .await?;

    let liked = match existing {
        Some(row) => {
            sqlx::query("DELETE FROM likes WHERE id = ?")
                .bind(row.get::<String, _>("id"))
                .execute(&db.0)
                .await?;
            false
        }
        None => {
            sqlx::query("INSERT INTO likes(id, user_id, post_id) VALUES (?, ?, ?)")
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(&user.user_id)
                .bind(&post_id)
                .execute(&db.0)
                .await?;
            true
        }
    };

    let likes_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM likes WHERE post_id = ?")
        .bind(&post_id)
        .fetch_one(&db.0)
        .await?
        .get("c");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "liked": liked,
        "likes_count": likes_count,
    })))
}
