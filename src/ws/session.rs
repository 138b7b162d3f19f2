use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Handler, StreamHandler, WrapFuture,
};
use actix_web::{Error, HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::server::{ChatServer, Connect, Disconnect, SendToUser, SessionText};
use crate::{auth, config::Config, db::Db};

pub async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    srv: web::Data<Addr<ChatServer>>,
) -> Result<HttpResponse, Error> {
    let token = req
        .query_string()
        .split('&')
        .find_map(|kv| kv.split_once('='))
        .filter(|(k, _)| *k == "token")
        .map(|(_, v)| v.to_string());

    let claims = match token {
        Some(t) => auth::verify_access_token(&t, &cfg)
            .map_err(|_| actix_web::error::ErrorUnauthorized("bad token"))?,
        None => return Err(actix_web::error::ErrorUnauthorized("missing token")),
    };
    let user_id = claims.sub;

    let row = sqlx::query("SELECT name FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&db.0)
        .await
        .map_err(|_| actix_web::error::ErrorInternalServerError("db error"))?;
    let user_name: String = match row {
        Some(r) => r.get("name"),
        None => return Err(actix_web::error::ErrorUnauthorized("unknown user")),
    };

    let session = WsSession {
        session_id: uuid::Uuid::new_v4().to_string(),
        user_id,
        user_name,
        joined: false,
        server: srv.get_ref().clone(),
        db: db.get_ref().clone(),
    };
    ws::start(session, &req, stream)
}

pub struct WsSession {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub joined: bool,
    pub server: Addr<ChatServer>,
    pub db: Db,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn stopped(&mut self, _: &mut Self::Context) {
        if self.joined {
            self.server.do_send(Disconnect {
                session_id: self.session_id.clone(),
                user_id: self.user_id.clone(),
            });
        }
    }
}

impl Handler<SessionText> for WsSession {
    type Result = ();
    fn handle(&mut self, msg: SessionText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// Wire format of client-to-server events. Extra fields the web client
/// sends (e.g. sender_id on typing events) are ignored unless validated.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientEvent {
    Join {
        user_id: Option<String>,
    },
    SendMessage {
        sender_id: String,
        receiver_id: String,
        content: String,
    },
    TypingStart {
        receiver_id: String,
    },
    TypingStop {
        receiver_id: String,
    },
    MarkRead {
        other_user_id: String,
    },
    Ping,
}

fn error_frame(message: &str) -> String {
    serde_json::json!({"type": "error", "message": message}).to_string()
}

/// Persist a chat message, push `new_message` to every session in the
/// receiver's room, and hand back the `message_sent` echo for the sending
/// session alone. The sender's other sessions intentionally get nothing:
/// the echo is a per-connection UI confirmation, not a broadcast.
pub(crate) async fn deliver_message(
    db: &Db,
    server: &Addr<ChatServer>,
    sender_id: &str,
    sender_name: &str,
    receiver_id: &str,
    content: &str,
) -> Result<String, String> {
    let content = content.trim();
    if content.is_empty() {
        return Err("message content required".into());
    }
    if receiver_id == sender_id {
        return Err("cannot message yourself".into());
    }

    let receiver = sqlx::query("SELECT 1 FROM users WHERE id = ?")
        .bind(receiver_id)
        .fetch_optional(&db.0)
        .await
        .map_err(internal)?;
    if receiver.is_none() {
        return Err("unknown receiver".into());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO messages(id, sender_id, receiver_id, content, is_read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(sender_id)
    .bind(receiver_id)
    .bind(content)
    .bind(now)
    .execute(&db.0)
    .await
    .map_err(internal)?;

    let base = serde_json::json!({
        "id": id,
        "sender_id": sender_id,
        "receiver_id": receiver_id,
        "content": content,
        "is_read": false,
        "read_at": serde_json::Value::Null,
        "created_at": now,
        "sender_name": sender_name,
    });

    let mut to_receiver = base.clone();
    to_receiver["type"] = serde_json::Value::from("new_message");
    server.do_send(SendToUser {
        user_id: receiver_id.to_string(),
        payload: to_receiver.to_string(),
    });

    let mut echo = base;
    echo["type"] = serde_json::Value::from("message_sent");
    Ok(echo.to_string())
}

fn internal(e: sqlx::Error) -> String {
    log::error!("db error: {e:?}");
    "internal error".into()
}

/// Flip every unread message from `other_user_id` to `reader_id` to read,
/// stamping one shared read_at. Returns the affected ids, None when the
/// batch was empty.
pub(crate) async fn mark_conversation_read(
    db: &Db,
    reader_id: &str,
    other_user_id: &str,
) -> Result<Option<(Vec<String>, DateTime<Utc>)>, sqlx::Error> {
    // One statement, so the reported ids are exactly the rows flipped
    // even when a message lands for this pair mid-call.
    let now = Utc::now();
    let rows = sqlx::query(
        "UPDATE messages SET is_read = 1, read_at = ?
         WHERE sender_id = ? AND receiver_id = ? AND is_read = 0
         RETURNING id",
    )
    .bind(now)
    .bind(other_user_id)
    .bind(reader_id)
    .fetch_all(&db.0)
    .await?;
    if rows.is_empty() {
        return Ok(None);
    }
    let ids: Vec<String> = rows.into_iter().map(|r| r.get("id")).collect();

    Ok(Some((ids, now)))
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                let ev = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ev) => ev,
                    Err(_) => {
                        ctx.text(error_frame("unrecognized event"));
                        return;
                    }
                };
                match ev {
                    ClientEvent::Join { user_id } => {
                        if user_id.as_deref().is_some_and(|u| u != self.user_id) {
                            ctx.text(error_frame("cannot join another user's room"));
                            return;
                        }
                        self.joined = true;
                        self.server.do_send(Connect {
                            session_id: self.session_id.clone(),
                            user_id: self.user_id.clone(),
                            addr: ctx.address().recipient(),
                        });
                        ctx.text(
                            serde_json::json!({
                                "type": "joined",
                                "room": format!("user_{}", self.user_id),
                            })
                            .to_string(),
                        );
                    }
                    ClientEvent::SendMessage {
                        sender_id,
                        receiver_id,
                        content,
                    } => {
                        if sender_id != self.user_id {
                            ctx.text(error_frame("sender does not match session"));
                            return;
                        }
                        let db = self.db.clone();
                        let server = self.server.clone();
                        let sender = self.user_id.clone();
                        let sender_name = self.user_name.clone();
                        let fut = async move {
                            deliver_message(&db, &server, &sender, &sender_name, &receiver_id, &content)
                                .await
                        };
                        ctx.spawn(fut.into_actor(self).map(|res, _, ctx| match res {
                            Ok(echo) => ctx.text(echo),
                            Err(msg) => ctx.text(error_frame(&msg)),
                        }));
                    }
                    ClientEvent::TypingStart { receiver_id } => {
                        let payload = serde_json::json!({
                            "type": "typing_started",
                            "user_id": self.user_id,
                            "user_name": self.user_name,
                        })
                        .to_string();
                        self.server.do_send(SendToUser {
                            user_id: receiver_id,
                            payload,
                        });
                    }
                    ClientEvent::TypingStop { receiver_id } => {
                        let payload = serde_json::json!({
                            "type": "typing_stopped",
                            "user_id": self.user_id,
                        })
                        .to_string();
                        self.server.do_send(SendToUser {
                            user_id: receiver_id,
                            payload,
                        });
                    }
                    ClientEvent::MarkRead { other_user_id } => {
                        let db = self.db.clone();
                        let server = self.server.clone();
                        let reader = self.user_id.clone();
                        let fut = async move {
                            match mark_conversation_read(&db, &reader, &other_user_id).await {
                                Ok(Some((ids, read_at))) => {
                                    let payload = serde_json::json!({
                                        "type": "messages_read",
                                        "reader_id": reader,
                                        "message_ids": ids,
                                        "read_at": read_at,
                                    })
                                    .to_string();
                                    server.do_send(SendToUser {
                                        user_id: other_user_id,
                                        payload,
                                    });
                                    Ok(())
                                }
                                Ok(None) => Ok(()),
                                Err(e) => {
                                    log::error!("mark_read failed: {e:?}");
                                    Err("internal error".to_string())
                                }
                            }
                        };
                        ctx.spawn(fut.into_actor(self).map(|res, _, ctx| {
                            if let Err(msg) = res {
                                ctx.text(error_frame(&msg));
                            }
                        }));
                    }
                    ClientEvent::Ping => {
                        ctx.text(r#"{"type":"pong"}"#);
                    }
                }
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(_)) => ctx.stop(),
            _ => {}
        }
    }
}
