//! Shared fixtures for the in-module tests.

use crate::db::Db;
use crate::ws::server::SessionText;
use actix::{Actor, Context, Handler, Message};
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// Stand-in for a websocket session: records every frame pushed to it.
pub struct Collector {
    received: Arc<Mutex<Vec<String>>>,
}

impl Actor for Collector {
    type Context = Context<Self>;
}

impl Handler<SessionText> for Collector {
    type Result = ();
    fn handle(&mut self, msg: SessionText, _: &mut Context<Self>) {
        self.received.lock().unwrap().push(msg.0);
    }
}

/// No-op message; awaiting it drains everything queued before it.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Flush;

impl Handler<Flush> for Collector {
    type Result = ();
    fn handle(&mut self, _: Flush, _: &mut Context<Self>) {}
}

pub fn collector() -> (actix::Addr<Collector>, Arc<Mutex<Vec<String>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let addr = Collector {
        received: received.clone(),
    }
    .start();
    (addr, received)
}

pub async fn seed_user(db: &Db, name: &str, email: &str, is_admin: bool) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users(id, name, email, password_hash, status, is_member, is_admin, created_at)
         VALUES (?, ?, ?, 'x', 'student', 0, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(email)
    .bind(is_admin)
    .bind(Utc::now())
    .execute(&db.0)
    .await
    .expect("seed user");
    id
}

pub async fn seed_post(db: &Db, user_id: &str, category: &str, title: &str, content: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO posts(id, user_id, category, title, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(category)
    .bind(title)
    .bind(content)
    .bind(Utc::now())
    .execute(&db.0)
    .await
    .expect("seed post");
    id
}

pub async fn seed_comment(db: &Db, post_id: &str, user_id: &str, content: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO comments(id, post_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .bind(Utc::now())
    .execute(&db.0)
    .await
    .expect("seed comment");
    id
}

pub async fn seed_event(
    db: &Db,
    created_by: &str,
    title: &str,
    date: chrono::NaiveDate,
    time: Option<chrono::NaiveTime>,
    archived: bool,
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO events(id, title, event_date, event_time, is_archived, created_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(title)
    .bind(date)
    .bind(time)
    .bind(archived)
    .bind(created_by)
    .bind(Utc::now())
    .execute(&db.0)
    .await
    .expect("seed event");
    id
}
