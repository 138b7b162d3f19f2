use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use futures_util::TryStreamExt as _;
use serde::Deserialize;
use sqlx::Row;

use crate::{
    auth::AuthUser,
    config::Config,
    db::Db,
    errors::ApiError,
    models::event::Event,
    permissions::require_admin,
    routes::events::event_from_row,
    routes::files::{remove_image, save_image_field},
};

fn truncate(content: &str, max: usize) -> String {
    if content.chars().count() > max {
        let cut: String = content.chars().take(max).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

pub async fn stats(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;

    let count = |table: &str| format!("SELECT COUNT(*) AS c FROM {table}");
    let total_users: i64 = sqlx::query(&count("users")).fetch_one(&db.0).await?.get("c");
    let total_posts: i64 = sqlx::query(&count("posts")).fetch_one(&db.0).await?.get("c");
    let total_comments: i64 = sqlx::query(&count("comments")).fetch_one(&db.0).await?.get("c");
    let total_events: i64 = sqlx::query(&count("events")).fetch_one(&db.0).await?.get("c");

    let recent_posts = sqlx::query(
        "SELECT p.id, p.title, p.created_at, u.name AS author
         FROM posts p INNER JOIN users u ON u.id = p.user_id
         ORDER BY p.created_at DESC LIMIT 5",
    )
    .fetch_all(&db.0)
    .await?;
    let recent_comments = sqlx::query(
        "SELECT c.id, c.content, c.created_at, u.name AS author
         FROM comments c INNER JOIN users u ON u.id = c.user_id
         ORDER BY c.created_at DESC LIMIT 5",
    )
    .fetch_all(&db.0)
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "totals": {
            "users": total_users,
            "posts": total_posts,
            "comments": total_comments,
            "events": total_events,
        },
        "recent_posts": recent_posts.iter().map(|r| serde_json::json!({
            "id": r.get::<String, _>("id"),
            "title": r.get::<String, _>("title"),
            "author": r.get::<String, _>("author"),
            "created_at": r.get::<chrono::DateTime<Utc>, _>("created_at"),
        })).collect::<Vec<_>>(),
        "recent_comments": recent_comments.iter().map(|r| serde_json::json!({
            "id": r.get::<String, _>("id"),
            "content": truncate(&r.get::<String, _>("content"), 100),
            "author": r.get::<String, _>("author"),
            "created_at": r.get::<chrono::DateTime<Utc>, _>("created_at"),
        })).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
pub struct ModerationQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

pub async fn list_posts(
    db: web::Data<Db>,
    user: AuthUser,
    q: web::Query<ModerationQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;

    let mut sql = String::from(
        "SELECT p.id, p.title, p.content, p.category, p.created_at, u.name AS author,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count
         FROM posts p INNER JOIN users u ON u.id = p.user_id WHERE 1=1",
    );
    if q.search.is_some() {
        sql.push_str(" AND (p.title LIKE ? OR p.content LIKE ?)");
    }
    if q.category.is_some() {
        sql.push_str(" AND p.category = ?");
    }
    sql.push_str(" ORDER BY p.created_at DESC");

    let mut query = sqlx::query(&sql);
    if let Some(search) = &q.search {
        let pattern = format!("%{search}%");
        query = query.bind(pattern.clone()).bind(pattern);
    }
    if let Some(cat) = &q.category {
        query = query.bind(cat);
    }
    let rows = query.fetch_all(&db.0).await?;

    let posts: Vec<_> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.get::<String, _>("id"),
                "title": r.get::<String, _>("title"),
                "content": truncate(&r.get::<String, _>("content"), 100),
                "category": r.get::<String, _>("category"),
                "author": r.get::<String, _>("author"),
                "created_at": r.get::<chrono::DateTime<Utc>, _>("created_at"),
                "likes_count": r.get::<i64, _>("likes_count"),
                "comments_count": r.get::<i64, _>("comments_count"),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "posts": posts })))
}

#[derive(Deserialize)]
pub struct UpdatePostReq {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

pub async fn update_post(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdatePostReq>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    let res = sqlx::query(
        "UPDATE posts SET title = COALESCE(?, title), content = COALESCE(?, content), category = COALESCE(?, category) WHERE id = ?",
    )
    .bind(&body.title)
    .bind(&body.content)
    .bind(&body.category)
    .bind(&id)
    .execute(&db.0)
    .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    log::info!("AdminAction: update_post admin_id={} post_id={}", user.user_id, id);
    Ok(HttpResponse::Ok().finish())
}

pub async fn delete_post(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    // comments and likes go with the post via FK cascade
    let res = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(&id)
        .execute(&db.0)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    log::info!("AdminAction: delete_post admin_id={} post_id={}", user.user_id, id);
    Ok(HttpResponse::Ok().finish())
}

pub async fn list_comments(
    db: web::Data<Db>,
    user: AuthUser,
    q: web::Query<ModerationQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;

    let mut sql = String::from(
        "SELECT c.id, c.content, c.created_at, u.name AS author, p.title AS post_title
         FROM comments c
         INNER JOIN users u ON u.id = c.user_id
         INNER JOIN posts p ON p.id = c.post_id
         WHERE 1=1",
    );
    if q.search.is_some() {
        sql.push_str(" AND c.content LIKE ?");
    }
    sql.push_str(" ORDER BY c.created_at DESC");

    let mut query = sqlx::query(&sql);
    if let Some(search) = &q.search {
        query = query.bind(format!("%{search}%"));
    }
    let rows = query.fetch_all(&db.0).await?;

    let comments: Vec<_> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.get::<String, _>("id"),
                "content": truncate(&r.get::<String, _>("content"), 100),
                "author": r.get::<String, _>("author"),
                "post_title": r.get::<String, _>("post_title"),
                "created_at": r.get::<chrono::DateTime<Utc>, _>("created_at"),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "comments": comments })))
}

#[derive(Deserialize)]
pub struct UpdateCommentReq {
    pub content: String,
}

pub async fn update_comment(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateCommentReq>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    let id = path.into_inner();
    let res = sqlx::query("UPDATE comments SET content = ? WHERE id = ?")
        .bind(&body.content)
        .bind(&id)
        .execute(&db.0)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().finish())
}

pub async fn delete_comment(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    let res = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(&id)
        .execute(&db.0)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    log::info!("AdminAction: delete_comment admin_id={} comment_id={}", user.user_id, id);
    Ok(HttpResponse::Ok().finish())
}

// --- events ---

pub async fn list_events(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let rows = sqlx::query(
        "SELECT id, title, description, event_date, event_time, image_url, presenter, event_url, is_archived, created_by, created_at
         FROM events ORDER BY event_date ASC, event_time ASC",
    )
    .fetch_all(&db.0)
    .await?;
    let events: Vec<Event> = rows.iter().map(event_from_row).collect();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "events": events })))
}

#[derive(Default)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_time: Option<NaiveTime>,
    pub presenter: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
}

pub(crate) async fn insert_event(
    db: &Db,
    created_by: &str,
    ev: NewEvent,
) -> Result<String, ApiError> {
    if ev.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title required".into()));
    }
    let date = ev
        .event_date
        .ok_or_else(|| ApiError::BadRequest("event_date required".into()))?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO events(id, title, description, event_date, event_time, image_url, presenter, event_url, is_archived, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(ev.title.trim())
    .bind(&ev.description)
    .bind(date)
    .bind(ev.event_time)
    .bind(&ev.image_url)
    .bind(&ev.presenter)
    .bind(&ev.event_url)
    .bind(created_by)
    .bind(Utc::now())
    .execute(&db.0)
    .await?;
    Ok(id)
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("event_date must be YYYY-MM-DD".into()))
}

fn parse_time(s: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest("event_time must be HH:MM".into()))
}

/// Multipart form: text fields plus an optional image part, matching the
/// admin panel's create-event form.
pub async fn create_event(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    user: AuthUser,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;

    let mut ev = NewEvent::default();
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|s| s.to_string()))
            .unwrap_or_default();

        if name == "image" {
            ev.image_url = Some(save_image_field(&cfg, field).await?);
            continue;
        }

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|_| ApiError::BadRequest("upload read error".into()))?
        {
            data.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(data)
            .map_err(|_| ApiError::BadRequest("form fields must be utf-8".into()))?;
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }

        match name.as_str() {
            "title" => ev.title = value,
            "description" => ev.description = Some(value),
            "event_date" => ev.event_date = Some(parse_date(&value)?),
            "event_time" => ev.event_time = Some(parse_time(&value)?),
            "presenter" => ev.presenter = Some(value),
            "event_url" => ev.event_url = Some(value),
            _ => {}
        }
    }

    let id = insert_event(&db, &user.user_id, ev).await?;
    log::info!("AdminAction: create_event admin_id={} event_id={}", user.user_id, id);
    Ok(HttpResponse::Created().json(serde_json::json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct UpdateEventReq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_time: Option<NaiveTime>,
    pub presenter: Option<String>,
    pub event_url: Option<String>,
    pub is_archived: Option<bool>,
}

pub async fn update_event(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateEventReq>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    let res = sqlx::query(
        "UPDATE events SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            event_date = COALESCE(?, event_date),
            event_time = COALESCE(?, event_time),
            presenter = COALESCE(?, presenter),
            event_url = COALESCE(?, event_url),
            is_archived = COALESCE(?, is_archived)
         WHERE id = ?",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(body.event_date)
    .bind(body.event_time)
    .bind(&body.presenter)
    .bind(&body.event_url)
    .bind(body.is_archived)
    .bind(&id)
    .execute(&db.0)
    .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().finish())
}

/// Replace an event's image; the previous file is removed from disk.
pub async fn upload_event_image(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    let row = sqlx::query("SELECT image_url FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    let old: Option<String> = row.get("image_url");

    let mut image_url: Option<String> = None;
    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        image_url = Some(save_image_field(&cfg, field).await?);
        break;
    }
    let image_url = image_url.ok_or(ApiError::BadRequest("no file part".into()))?;

    sqlx::query("UPDATE events SET image_url = ? WHERE id = ?")
        .bind(&image_url)
        .bind(&id)
        .execute(&db.0)
        .await?;
    if let Some(old) = old {
        remove_image(&cfg, &old);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "image_url": image_url })))
}

pub async fn delete_event(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let id = path.into_inner();
    let row = sqlx::query("SELECT image_url FROM events WHERE id = ?")
        .bind(&id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    let image_url: Option<String> = row.get("image_url");

    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(&id)
        .execute(&db.0)
        .await?;
    if let Some(url) = image_url {
        remove_image(&cfg, &url);
    }
    log::info!("AdminAction: delete_event admin_id={} event_id={}", user.user_id, id);
    Ok(HttpResponse::Ok().finish())
}

/// FullCalendar feed for the admin events view.
pub async fn events_calendar(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    require_admin(&db, &user.user_id).await?;
    let rows = sqlx::query(
        "SELECT id, title, description, event_date, event_time, image_url, presenter, event_url, is_archived, created_by, created_at FROM events",
    )
    .fetch_all(&db.0)
    .await?;

    let entries: Vec<_> = rows
        .iter()
        .map(|r| {
            let ev = event_from_row(r);
            serde_json::json!({
                "id": ev.id,
                "title": ev.title,
                "start": ev.start_datetime().format("%Y-%m-%dT%H:%M:%S").to_string(),
                "description": ev.description,
                "allDay": ev.event_time.is_none(),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}
