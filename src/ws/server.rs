use actix::{Actor, Context, Handler, Message, Recipient};
use std::collections::{HashMap, HashSet};

/// Raw text frame pushed down a session's websocket.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct SessionText(pub String);

/// Routing hub for the chat channel. Each user has one room holding every
/// open session of theirs; events addressed to a user fan out to all of
/// their connections.
pub struct ChatServer {
    sessions: HashMap<String, Recipient<SessionText>>,
    rooms: HashMap<String, HashSet<String>>,
}

impl ChatServer {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            rooms: HashMap::new(),
        }
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub session_id: String,
    pub user_id: String,
    pub addr: Recipient<SessionText>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SendToUser {
    pub user_id: String,
    pub payload: String,
}

impl Handler<Connect> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.sessions.insert(msg.session_id.clone(), msg.addr);
        self.rooms
            .entry(msg.user_id)
            .or_default()
            .insert(msg.session_id);
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        self.sessions.remove(&msg.session_id);
        if let Some(room) = self.rooms.get_mut(&msg.user_id) {
            room.remove(&msg.session_id);
            if room.is_empty() {
                self.rooms.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<SendToUser> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: SendToUser, _: &mut Context<Self>) {
        let Some(room) = self.rooms.get(&msg.user_id) else {
            return;
        };
        for session_id in room {
            if let Some(addr) = self.sessions.get(session_id) {
                addr.do_send(SessionText(msg.payload.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{collector, Flush};

    #[actix_web::test]
    async fn send_to_user_reaches_every_session_of_that_user_only() {
        let server = ChatServer::new().start();
        let (alice_a, alice_a_rx) = collector();
        let (alice_b, alice_b_rx) = collector();
        let (bob, bob_rx) = collector();

        server
            .send(Connect {
                session_id: "s1".into(),
                user_id: "alice".into(),
                addr: alice_a.clone().recipient(),
            })
            .await
            .unwrap();
        server
            .send(Connect {
                session_id: "s2".into(),
                user_id: "alice".into(),
                addr: alice_b.clone().recipient(),
            })
            .await
            .unwrap();
        server
            .send(Connect {
                session_id: "s3".into(),
                user_id: "bob".into(),
                addr: bob.clone().recipient(),
            })
            .await
            .unwrap();

        server
            .send(SendToUser {
                user_id: "alice".into(),
                payload: "hello".into(),
            })
            .await
            .unwrap();

        // Mailboxes are FIFO, so a flushed no-op proves delivery happened.
        alice_a.send(Flush).await.unwrap();
        alice_b.send(Flush).await.unwrap();
        bob.send(Flush).await.unwrap();

        assert_eq!(*alice_a_rx.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*alice_b_rx.lock().unwrap(), vec!["hello".to_string()]);
        assert!(bob_rx.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn disconnect_removes_one_session() {
        let server = ChatServer::new().start();
        let (a, a_rx) = collector();
        let (b, b_rx) = collector();

        server
            .send(Connect {
                session_id: "s1".into(),
                user_id: "alice".into(),
                addr: a.clone().recipient(),
            })
            .await
            .unwrap();
        server
            .send(Connect {
                session_id: "s2".into(),
                user_id: "alice".into(),
                addr: b.clone().recipient(),
            })
            .await
            .unwrap();
        server
            .send(Disconnect {
                session_id: "s1".into(),
                user_id: "alice".into(),
            })
            .await
            .unwrap();

        server
            .send(SendToUser {
                user_id: "alice".into(),
                payload: "still here".into(),
            })
            .await
            .unwrap();

        a.send(Flush).await.unwrap();
        b.send(Flush).await.unwrap();

        assert!(a_rx.lock().unwrap().is_empty());
        assert_eq!(*b_rx.lock().unwrap(), vec!["still here".to_string()]);
    }

    #[actix_web::test]
    async fn send_to_unknown_user_is_a_noop() {
        let server = ChatServer::new().start();
        server
            .send(SendToUser {
                user_id: "nobody".into(),
                payload: "lost".into(),
            })
            .await
            .unwrap();
    }
}
