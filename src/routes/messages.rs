use crate::{
    auth::AuthUser, db::Db, errors::ApiError, models::message::Message,
    models::user::PublicUser, ws::session::mark_conversation_read,
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::Row;

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        is_read: row.get("is_read"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    }
}

/// One entry per conversation partner, newest activity first.
pub async fn list_conversations(
    db: web::Data<Db>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let peer_rows = sqlx::query(
        "SELECT DISTINCT CASE WHEN sender_id = ? THEN receiver_id ELSE sender_id END AS peer_id
         FROM messages WHERE sender_id = ? OR receiver_id = ?",
    )
    .bind(&user.user_id)
    .bind(&user.user_id)
    .bind(&user.user_id)
    .fetch_all(&db.0)
    .await?;

    // Sorted on the parsed timestamp, not its JSON text: whole-second
    // values serialize without a fractional part and compare wrong as
    // strings against subsecond ones.
    let mut conversations: Vec<(Option<DateTime<Utc>>, serde_json::Value)> = Vec::new();
    for peer_row in peer_rows {
        let peer_id: String = peer_row.get("peer_id");
        let peer = sqlx::query("SELECT id, name FROM users WHERE id = ?")
            .bind(&peer_id)
            .fetch_optional(&db.0)
            .await?;
        let Some(peer) = peer else { continue };

        let latest = sqlx::query(
            "SELECT id, sender_id, receiver_id, content, is_read, read_at, created_at
             FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&user.user_id)
        .bind(&peer_id)
        .bind(&peer_id)
        .bind(&user.user_id)
        .fetch_optional(&db.0)
        .await?;

        let unread_count: i64 = sqlx::query(
            "SELECT COUNT(*) AS c FROM messages WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(&peer_id)
        .bind(&user.user_id)
        .fetch_one(&db.0)
        .await?
        .get("c");

        let latest = latest.map(|row| message_from_row(&row));
        let latest_at = latest.as_ref().map(|m| m.created_at);
        let latest_json = latest.map(|m| {
            serde_json::json!({
                "content": m.content,
                "created_at": m.created_at,
                "is_from_me": m.sender_id == user.user_id,
            })
        });

        let peer = PublicUser {
            id: peer.get("id"),
            name: peer.get("name"),
        };
        conversations.push((
            latest_at,
            serde_json::json!({
                "user": peer,
                "latest_message": latest_json,
                "unread_count": unread_count,
            }),
        ));
    }

    conversations.sort_by(|a, b| b.0.cmp(&a.0));
    let conversations: Vec<_> = conversations.into_iter().map(|(_, c)| c).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "conversations": conversations })))
}

/// All messages between the caller and the other user, oldest first.
/// Viewing a conversation marks its incoming messages read.
pub async fn get_conversation(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let other_id = path.into_inner();
    let other = sqlx::query("SELECT id, name FROM users WHERE id = ?")
        .bind(&other_id)
        .fetch_optional(&db.0)
        .await?;
    let other = other.ok_or(ApiError::NotFound)?;

    mark_conversation_read(&db, &user.user_id, &other_id).await?;

    let rows = sqlx::query(
        "SELECT id, sender_id, receiver_id, content, is_read, read_at, created_at
         FROM messages
         WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
         ORDER BY created_at ASC",
    )
    .bind(&user.user_id)
    .bind(&other_id)
    .bind(&other_id)
    .bind(&user.user_id)
    .fetch_all(&db.0)
    .await?;

    let messages: Vec<_> = rows
        .iter()
        .map(|row| {
            let m = message_from_row(row);
            let is_from_me = m.sender_id == user.user_id;
            let mut v = serde_json::to_value(m).unwrap_or_default();
            v["is_from_me"] = serde_json::Value::from(is_from_me);
            v
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "other_user": PublicUser {
            id: other.get("id"),
            name: other.get("name"),
        },
        "messages": messages,
    })))
}

#[derive(Deserialize)]
pub struct SendReq {
    pub content: String,
}

/// Plain REST send, used when the realtime channel is not connected.
pub async fn send_message(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<SendReq>,
) -> Result<HttpResponse, ApiError> {
    let receiver_id = path.into_inner();
    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content required".into()));
    }
    if receiver_id == user.user_id {
        return Err(ApiError::BadRequest(
            "you cannot send messages to yourself".into(),
        ));
    }
    let recipient = sqlx::query("SELECT id FROM users WHERE id = ?")
        .bind(&receiver_id)
        .fetch_optional(&db.0)
        .await?;
    if recipient.is_none() {
        return Err(ApiError::NotFound);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO messages(id, sender_id, receiver_id, content, is_read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(&user.user_id)
    .bind(&receiver_id)
    .bind(content)
    .bind(now)
    .execute(&db.0)
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message_data": {
            "id": id,
            "content": content,
            "sender_id": user.user_id,
            "receiver_id": receiver_id,
            "created_at": now,
            "is_from_me": true,
        }
    })))
}

pub async fn unread_count(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS c FROM messages WHERE receiver_id = ? AND is_read = 0",
    )
    .bind(&user.user_id)
    .fetch_one(&db.0)
    .await?
    .get("c");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count })))
}

/// Either participant may delete a message; exactly one row goes away.
pub async fn delete_message(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row = sqlx::query("SELECT sender_id, receiver_id FROM messages WHERE id = ?")
        .bind(&id)
        .fetch_optional(&db.0)
        .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    let sender_id: String = row.get("sender_id");
    let receiver_id: String = row.get("receiver_id");
    if user.user_id != sender_id && user.user_id != receiver_id {
        return Err(ApiError::Forbidden);
    }

    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(&id)
        .execute(&db.0)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

pub async fn delete_conversation(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let other_id = path.into_inner();
    let res = sqlx::query(
        "DELETE FROM messages WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)",
    )
    .bind(&user.user_id)
    .bind(&other_id)
    .bind(&other_id)
    .bind(&user.user_id)
    .execute(&db.0)
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "deleted": res.rows_affected(),
    })))
}
