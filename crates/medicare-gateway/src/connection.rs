use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use medicare_db::Database;
use medicare_types::api::Claims;
use medicare_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscriptions = Arc<RwLock<HashSet<Uuid>>>;

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// relay invalidation events for the patients the client subscribed to.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let claims = match wait_for_identify(&mut receiver, &db, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };
    let user_id = claims.sub;

    info!("{} ({}) connected to gateway", claims.email, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        role: claims.role,
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    dispatcher.connection_opened(user_id).await;
    run_connection_loop(sender, receiver, &dispatcher, db, user_id).await;
    dispatcher.connection_closed(user_id).await;

    info!("{} ({}) disconnected from gateway", claims.email, user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
) {
    let mut broadcast_rx = dispatcher.subscribe();

    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward matching broadcasts to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let Some(patient_id) = event.patient_id() else { continue };
                    if !send_subscriptions.read().await.contains(&patient_id) {
                        continue;
                    }

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&db, user_id, cmd, &subscriptions).await,
                    Err(e) => {
                        warn!("{} bad command: {} -- raw: {}", user_id, e, preview(&text));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn handle_command(db: &Arc<Database>, user_id: Uuid, cmd: GatewayCommand, subscriptions: &Subscriptions) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { patient_ids } => {
            let requested = patient_ids.len();
            let allowed = allowed_patients(db.clone(), user_id, patient_ids).await;
            info!(
                "{} subscribing to {} of {} requested patients",
                user_id,
                allowed.len(),
                requested
            );
            *subscriptions.write().await = allowed;
        }
    }
}

async fn allowed_patients(db: Arc<Database>, user_id: Uuid, patient_ids: Vec<Uuid>) -> HashSet<Uuid> {
    let result = tokio::task::spawn_blocking(move || {
        let uid = user_id.to_string();
        patient_ids
            .into_iter()
            .filter(|pid| match db.can_access_patient(&uid, &pid.to_string()) {
                Ok(allowed) => allowed,
                Err(e) => {
                    warn!("Access check for patient {} failed: {}", pid, e);
                    false
                }
            })
            .collect::<HashSet<_>>()
    })
    .await;

    result.unwrap_or_else(|e| {
        warn!("spawn_blocking join error: {}", e);
        HashSet::new()
    })
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    db: &Arc<Database>,
    jwt_secret: &str,
) -> Option<Claims> {
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                    return decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()
                    .map(|data| data.claims);
                }
            }
        }
        None
    });

    let claims = identify.await.ok().flatten()?;

    // The token must still belong to a live session.
    let db = db.clone();
    let jti = claims.jti.to_string();
    let session = tokio::task::spawn_blocking(move || db.get_session(&jti)).await.ok()?.ok()??;
    if session.revoked_at.is_some() {
        warn!("{} tried to identify with a revoked session", claims.sub);
        return None;
    }

    Some(claims)
}

/// First 200 characters of a client message, for logs.
fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| warn!("Failed to encode gateway event: {}", e))?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
