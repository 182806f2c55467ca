/// WebSocket handler for realtime presence and timer updates.
/// Tracks which live connection belongs to which (group, user) pair and fans
/// notifications out to a group's subscribers.

use crate::db::DbPool;
use crate::membership::MembershipEngine;
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Presence tracker and broadcast hub shared by all connections.
///
/// The maps mirror the durable membership state but are not a source of truth
/// for it: entries live for the duration of a connection, and the membership
/// engine must have authorized a user before `join` records them. One live
/// session per user is assumed; a newer `join` silently supersedes the
/// previous session (last-writer-wins).
pub struct WsServer {
    /// session id -> outbox for that connection
    pub clients: Arc<RwLock<HashMap<String, tokio::sync::mpsc::UnboundedSender<String>>>>,
    /// group id -> (session id -> user id)
    pub group_sessions: Arc<RwLock<HashMap<i64, HashMap<String, i64>>>>,
    /// user id -> current session id
    pub user_sessions: Arc<RwLock<HashMap<i64, String>>>,
    pub pool: DbPool,
}

impl WsServer {
    pub fn new(pool: DbPool) -> Self {
        WsServer {
            clients: Arc::new(RwLock::new(HashMap::new())),
            group_sessions: Arc::new(RwLock::new(HashMap::new())),
            user_sessions: Arc::new(RwLock::new(HashMap::new())),
            pool,
        }
    }

    /// Register a client connection
    pub async fn register(
        &self,
        session_id: String,
        tx: tokio::sync::mpsc::UnboundedSender<String>,
    ) {
        let mut clients = self.clients.write().await;
        clients.insert(session_id, tx);
    }

    /// Unregister a client connection and sweep its presence entries.
    /// This is the self-healing path: whatever membership changes were missed
    /// while the socket was up, the disconnect clears the session everywhere.
    pub async fn unregister(&self, session_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(session_id);
        drop(clients);

        let mut groups = self.group_sessions.write().await;
        for sessions in groups.values_mut() {
            sessions.remove(session_id);
        }
        groups.retain(|_, sessions| !sessions.is_empty());
        drop(groups);

        let mut users = self.user_sessions.write().await;
        users.retain(|_, sid| sid.as_str() != session_id);
    }

    /// Record a session as present in a group.
    /// No authorization happens here; the caller has already validated the
    /// membership. If the user had an earlier session it is evicted from
    /// every group bucket first, so at most one session per user is tracked.
    pub async fn join(&self, group_id: i64, session_id: String, user_id: i64) {
        let mut groups = self.group_sessions.write().await;
        let mut users = self.user_sessions.write().await;

        if let Some(old_session) = users.insert(user_id, session_id.clone()) {
            if old_session != session_id {
                for sessions in groups.values_mut() {
                    sessions.remove(&old_session);
                }
                groups.retain(|_, sessions| !sessions.is_empty());
            }
        }

        groups
            .entry(group_id)
            .or_default()
            .insert(session_id, user_id);
    }

    /// Drop a session from a group; empty group buckets are garbage
    /// collected. A no-op when the session is not tracked.
    pub async fn leave_by_session(&self, group_id: i64, session_id: &str) {
        let mut groups = self.group_sessions.write().await;
        let mut users = self.user_sessions.write().await;

        if let Some(sessions) = groups.get_mut(&group_id) {
            if let Some(user_id) = sessions.remove(session_id) {
                if users.get(&user_id).map(String::as_str) == Some(session_id) {
                    users.remove(&user_id);
                }
            }
            if sessions.is_empty() {
                groups.remove(&group_id);
            }
        }
    }

    /// Resolve the user's current session and drop it from the group.
    /// A no-op when the user has no tracked session.
    pub async fn leave_by_user(&self, group_id: i64, user_id: i64) {
        let session_id = {
            let users = self.user_sessions.read().await;
            users.get(&user_id).cloned()
        };

        if let Some(session_id) = session_id {
            self.leave_by_session(group_id, &session_id).await;
        }
    }

    /// Groups the user currently has a live session in.
    /// Scans every bucket, O(total sessions); fine at this fleet size, but a
    /// reverse user -> groups index belongs here before scaling up.
    pub async fn groups_for(&self, user_id: i64) -> Vec<i64> {
        let groups = self.group_sessions.read().await;
        groups
            .iter()
            .filter(|(_, sessions)| sessions.values().any(|uid| *uid == user_id))
            .map(|(group_id, _)| *group_id)
            .collect()
    }

    /// Send a frame to one session, if it is still connected.
    pub async fn send_to_session(&self, session_id: &str, message: &str) {
        let clients = self.clients.read().await;
        if let Some(tx) = clients.get(session_id) {
            if let Err(e) = tx.send(message.to_string()) {
                log::warn!("Failed to send to session {}: {}", session_id, e);
            }
        }
    }

    /// Fan a message out to every session subscribed to the group.
    /// Delivery failures are logged per subscriber and never abort the rest.
    pub async fn broadcast_to_group(&self, group_id: i64, message: &str) {
        let groups = self.group_sessions.read().await;
        if let Some(sessions) = groups.get(&group_id) {
            let clients = self.clients.read().await;
            for session_id in sessions.keys() {
                match clients.get(session_id) {
                    Some(tx) => {
                        if let Err(e) = tx.send(message.to_string()) {
                            log::warn!(
                                "Failed to deliver to session {} in group {}: {}",
                                session_id,
                                group_id,
                                e
                            );
                        }
                    }
                    None => {
                        log::warn!("Session {} tracked in group {} has no outbox", session_id, group_id);
                    }
                }
            }
        }
    }

    /// Broadcast a timer update for a user to their group's topic.
    pub async fn send_timer_update(
        &self,
        user_id: i64,
        username: &str,
        group_id: i64,
        status: &str,
        duration: &str,
        start_time: &str,
    ) {
        let message = json!({
            "type": "TIMER_UPDATE",
            "userId": user_id,
            "username": username,
            "groupId": group_id,
            "status": status,
            "duration": duration,
            "startTime": start_time,
        })
        .to_string();

        self.broadcast_to_group(group_id, &message).await;
    }
}

/// WebSocket actor for an individual client connection
pub struct WsActor {
    pub session_id: String,
    pub user_id: i64,
    pub username: String,
    pub server: web::Data<WsServer>,
}

impl Actor for WsActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!(
            "WebSocket connection started: {} (user {})",
            self.session_id,
            self.user_id
        );
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let addr = ctx.address();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                addr.do_send(OutgoingMessage(msg));
            }
        });

        let server = self.server.clone();
        let session_id = self.session_id.clone();
        let fut = async move {
            server.register(session_id, tx).await;
        };
        let _ = actix::spawn(fut);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!(
            "WebSocket connection stopped: {} (user {})",
            self.session_id,
            self.user_id
        );
        let server = self.server.clone();
        let session_id = self.session_id.clone();
        let fut = async move {
            server.unregister(&session_id).await;
        };
        let _ = actix::spawn(fut);
    }
}

impl WsActor {
    /// Handle a `join` action: validate the membership against the durable
    /// state, then record presence. The tracker itself trusts its caller, so
    /// the check lives here.
    fn handle_join(&self, group_id: i64) {
        let server = self.server.clone();
        let session_id = self.session_id.clone();
        let user_id = self.user_id;
        actix::spawn(async move {
            match MembershipEngine::is_active_member(&server.pool, user_id, group_id).await {
                Ok(true) => {
                    server.join(group_id, session_id, user_id).await;
                    log::info!("User {} joined group {} presence", user_id, group_id);
                }
                Ok(false) => {
                    log::warn!(
                        "User {} tried to join group {} without an active membership",
                        user_id,
                        group_id
                    );
                    let frame = json!({
                        "error": "not an active member of this group"
                    })
                    .to_string();
                    server.send_to_session(&session_id, &frame).await;
                }
                Err(e) => {
                    log::error!("Membership check failed: {}", e);
                }
            }
        });
    }

    fn handle_leave(&self, group_id: i64) {
        let server = self.server.clone();
        let user_id = self.user_id;
        actix::spawn(async move {
            server.leave_by_user(group_id, user_id).await;
        });
    }

    fn handle_timer(&self, group_id: i64, status: String, duration: String, start_time: String) {
        let server = self.server.clone();
        let session_id = self.session_id.clone();
        let user_id = self.user_id;
        let username = self.username.clone();
        actix::spawn(async move {
            match MembershipEngine::is_active_member(&server.pool, user_id, group_id).await {
                Ok(true) => {
                    server
                        .send_timer_update(
                            user_id, &username, group_id, &status, &duration, &start_time,
                        )
                        .await;
                }
                Ok(false) => {
                    let frame = json!({
                        "error": "not an active member of this group"
                    })
                    .to_string();
                    server.send_to_session(&session_id, &frame).await;
                }
                Err(e) => {
                    log::error!("Membership check failed: {}", e);
                }
            }
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                let value: serde_json::Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        log::error!("Failed to parse WebSocket message: {}", e);
                        ctx.text(json!({"error": "Invalid message format"}).to_string());
                        return;
                    }
                };

                let action = value.get("action").and_then(|a| a.as_str());
                let group_id = value.get("group_id").and_then(|g| g.as_i64());

                match (action, group_id) {
                    (Some("join"), Some(group_id)) => self.handle_join(group_id),
                    (Some("leave"), Some(group_id)) => self.handle_leave(group_id),
                    (Some("timer"), Some(group_id)) => {
                        let field = |name: &str| {
                            value
                                .get(name)
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string()
                        };
                        self.handle_timer(
                            group_id,
                            field("status"),
                            field("duration"),
                            field("start_time"),
                        );
                    }
                    (Some(other), _) => {
                        log::warn!("Unknown action: {}", other);
                        ctx.text(json!({"error": "Unknown action"}).to_string());
                    }
                    (None, _) => {
                        ctx.text(json!({"error": "Missing action"}).to_string());
                    }
                }
            }
            Ok(ws::Message::Ping(bytes)) => {
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Close(_)) => {
                ctx.stop();
            }
            Err(e) => {
                log::error!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct OutgoingMessage(String);

impl Handler<OutgoingMessage> for WsActor {
    type Result = ();

    fn handle(&mut self, msg: OutgoingMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// WebSocket connection handler. The token is resolved before the upgrade;
/// an unknown token is refused with 401.
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    token: web::Path<String>,
    server: web::Data<WsServer>,
) -> actix_web::Result<HttpResponse> {
    let user = match crate::auth::resolve_user(&server.pool, &token).await {
        Ok(user) => user,
        Err(_) => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "error": "invalid token"
            })));
        }
    };

    let actor = WsActor {
        session_id: format!("{}_{}", user.username, uuid::Uuid::new_v4()),
        user_id: user.id,
        username: user.username,
        server: server.clone(),
    };

    let resp = ws::start(actor, &req, stream)?;
    Ok(resp)
}
