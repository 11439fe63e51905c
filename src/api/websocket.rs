//! WebSocket handler for live battles
//!
//! One connection drives at most one battle at a time. Closing the
//! socket abandons the battle and stores the character as it stands.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::AppState;
use crate::catalog::MonsterRecord;
use crate::character::Character;
use crate::combat::{
    Battle, BattleEvent, BattleOutcome, BattleStep, Decision, Monster, TurnReport,
};

/// A connected client
#[derive(Debug)]
pub struct PlayerSession {
    pub connection_id: String,
    /// Battle this connection is driving, if any
    pub battle_id: Option<String>,
    pub sender: mpsc::Sender<ServerMessage>,
}

/// Connection manager for all active WebSocket connections
#[derive(Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<String, PlayerSession>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session
    pub async fn register(&self, session: PlayerSession) {
        let id = session.connection_id.clone();
        self.sessions.write().await.insert(id, session);
    }

    /// Remove a session, returning it
    pub async fn unregister(&self, connection_id: &str) -> Option<PlayerSession> {
        self.sessions.write().await.remove(connection_id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Battle a connection is driving
    pub async fn battle_of(&self, connection_id: &str) -> Option<String> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .and_then(|s| s.battle_id.clone())
    }

    pub async fn set_battle(&self, connection_id: &str, battle_id: Option<String>) {
        if let Some(session) = self.sessions.write().await.get_mut(connection_id) {
            session.battle_id = battle_id;
        }
    }

    /// Send a message to one connection
    pub async fn send_to(&self, connection_id: &str, msg: ServerMessage) {
        let sender = self
            .sessions
            .read()
            .await
            .get(connection_id)
            .map(|s| s.sender.clone());
        if let Some(sender) = sender {
            if sender.send(msg).await.is_err() {
                warn!("Failed to send message to connection {}", connection_id);
            }
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect
    Welcome { connection_id: String },
    /// Progress of a running battle and what it waits on next
    Battle {
        battle_id: String,
        events: Vec<BattleEvent>,
        decision: Decision,
    },
    /// Battle over; the character as it was stored
    Finished {
        battle_id: String,
        events: Vec<BattleEvent>,
        outcome: BattleOutcome,
        character: Character,
    },
    Error { message: String },
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Fight a named monster, or a random one
    StartBattle {
        character: String,
        #[serde(default)]
        monster: Option<String>,
    },
    /// Answer to the pending decision
    Input { text: String },
    /// Leave the current battle
    Flee,
    /// Keep the connection alive
    Ping,
}

/// Handle WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);
    let connection_id = uuid::Uuid::new_v4().to_string();

    info!("WebSocket connected: {}", connection_id);

    state
        .connections
        .register(PlayerSession {
            connection_id: connection_id.clone(),
            battle_id: None,
            sender: tx,
        })
        .await;

    let welcome = ServerMessage::Welcome {
        connection_id: connection_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&state, &connection_id, client_msg).await;
                            }
                            Err(e) => {
                                debug!("Unparseable message from {}: {}", connection_id, e);
                                state
                                    .connections
                                    .send_to(&connection_id, error_message(format!("invalid message: {}", e)))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    // Abandon any battle left running
    if let Some(battle_id) = state.connections.battle_of(&connection_id).await {
        match state.battles.abandon(&battle_id).await {
            Ok((outcome, character)) => {
                info!(
                    "Battle {} abandoned on disconnect ({})",
                    battle_id, outcome
                );
                if let Err(e) = state.characters.save(&character).await {
                    warn!("Failed to save {} after disconnect: {}", character.name, e);
                }
            }
            Err(e) => debug!("Nothing to abandon for {}: {}", battle_id, e),
        }
    }

    state.connections.unregister(&connection_id).await;
    info!("WebSocket disconnected: {}", connection_id);
}

fn error_message(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

/// Handle a message from the client
async fn handle_client_message(state: &AppState, connection_id: &str, msg: ClientMessage) {
    let reply = match msg {
        ClientMessage::StartBattle { character, monster } => {
            if let Some(battle_id) = state.connections.battle_of(connection_id).await {
                error_message(format!("already in battle {}", battle_id))
            } else {
                match start_battle(state, &character, monster.as_deref()).await {
                    Ok((battle_id, report)) => {
                        state
                            .connections
                            .set_battle(connection_id, Some(battle_id.clone()))
                            .await;
                        ServerMessage::Battle {
                            battle_id,
                            events: report.events,
                            decision: report.decision,
                        }
                    }
                    Err(message) => error_message(message),
                }
            }
        }
        ClientMessage::Input { text } => match state.connections.battle_of(connection_id).await {
            Some(battle_id) => match state.battles.submit(&battle_id, &text).await {
                Ok(BattleStep::Continue(report)) => ServerMessage::Battle {
                    battle_id,
                    events: report.events,
                    decision: report.decision,
                },
                Ok(BattleStep::Finished {
                    report,
                    outcome,
                    character,
                }) => finish(state, connection_id, battle_id, report.events, outcome, character)
                    .await,
                Err(e) => error_message(e.to_string()),
            },
            None => error_message("not in a battle"),
        },
        ClientMessage::Flee => match state.connections.battle_of(connection_id).await {
            Some(battle_id) => match state.battles.abandon(&battle_id).await {
                Ok((outcome, character)) => {
                    let events = match outcome {
                        BattleOutcome::Fled => vec![BattleEvent::Fled],
                        _ => Vec::new(),
                    };
                    finish(state, connection_id, battle_id, events, outcome, character).await
                }
                Err(e) => error_message(e.to_string()),
            },
            None => error_message("not in a battle"),
        },
        ClientMessage::Ping => return,
    };

    state.connections.send_to(connection_id, reply).await;
}

/// Claim the character, pick the monster and register the battle
async fn start_battle(
    state: &AppState,
    character_name: &str,
    monster_name: Option<&str>,
) -> Result<(String, TurnReport), String> {
    // Held until the battle is registered; dropped early on any failure
    let _claim = state
        .battles
        .claim(character_name)
        .await
        .map_err(|e| e.to_string())?;

    prepare_battle(state, character_name, monster_name).await
}

async fn prepare_battle(
    state: &AppState,
    character_name: &str,
    monster_name: Option<&str>,
) -> Result<(String, TurnReport), String> {
    let character = state
        .characters
        .load(character_name)
        .await
        .map_err(|e| e.to_string())?;

    let record: MonsterRecord = match monster_name {
        Some(name) => state
            .catalog
            .get_monster(name)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("unknown monster: {}", name))?,
        None => state
            .catalog
            .fetch_random_monster()
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no encounter: the catalog has no monsters".to_string())?,
    };

    let catalog = state
        .catalog
        .snapshot_for(&character)
        .await
        .map_err(|e| e.to_string())?;

    let battle = Battle::new(
        character,
        Monster::from_record(&record),
        catalog,
        state.dice.roller(),
        state.rules.progression(),
    )
    .map_err(|e| e.to_string())?;

    let battle_id = battle.id().to_string();
    let report = state
        .battles
        .start(battle)
        .await
        .map_err(|e| e.to_string())?;

    Ok((battle_id, report))
}

/// Store the character a finished battle handed back
async fn finish(
    state: &AppState,
    connection_id: &str,
    battle_id: String,
    events: Vec<BattleEvent>,
    outcome: BattleOutcome,
    character: Character,
) -> ServerMessage {
    state.connections.set_battle(connection_id, None).await;

    if let Err(e) = state.characters.save(&character).await {
        warn!("Failed to save {} after battle {}: {}", character.name, battle_id, e);
        return error_message(format!("battle ended but saving failed: {}", e));
    }

    info!("Battle {} finished: {} {}", battle_id, character.name, outcome);
    ServerMessage::Finished {
        battle_id,
        events,
        outcome,
        character,
    }
}
