//! Common test utilities - CampaignTest harness for end-to-end testing

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use campaignd::{Config, Server};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Test harness that spawns a real campaignd server on a random port
pub struct CampaignTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl CampaignTest {
    /// Start a new test server instance with an in-memory database
    pub async fn start() -> Result<Self> {
        Self::with_config(Config {
            dice_seed: Some(7),
            ..Config::default()
        })
        .await
    }

    pub async fn with_config(mut config: Config) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        config.bind_addr = addr;

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.serve(listener).await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Get direct access to the database for test setup/assertions
    pub fn db(&self) -> Arc<campaignd::db::Database> {
        self.server.db()
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }

    /// Create a character with its creation points spent on the given attributes
    pub async fn create_character(&self, name: &str, points: &[&str]) -> Result<Value> {
        let resp = self
            .post(
                "/characters",
                &json!({ "name": name, "class": "Fighter", "points": points }),
            )
            .await?;
        anyhow::ensure!(
            resp.status() == 201,
            "character creation failed: {}",
            resp.status()
        );
        Ok(resp.json().await?)
    }

    /// Add a monster that any attack hits and kills
    pub async fn add_pushover_monster(&self, name: &str, experience: u32, gold: i32) -> Result<()> {
        let resp = self
            .post(
                "/catalog/monsters",
                &json!({
                    "name": name,
                    "max_health": 1,
                    "attack_bonus": 0,
                    "damage_dice": "1d2",
                    "defense": 1,
                    "experience": experience,
                    "gold": gold,
                }),
            )
            .await?;
        anyhow::ensure!(resp.status() == 201, "monster creation failed");
        Ok(())
    }

    /// Wait until no battles are running
    pub async fn wait_for_no_battles(&self) -> Result<()> {
        for _ in 0..50 {
            let root: Value = self.get("/").await?.json().await?;
            if root["battles"] == 0 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("battles still running")
    }

    /// Get the WebSocket URL for the server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect to the WebSocket endpoint and consume the welcome message
    pub async fn connect_ws(&self) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url()).await?;
        let (write, read) = ws_stream.split();
        let mut client = WsClient { write, read };

        let welcome = client.recv_json_timeout(Duration::from_secs(2)).await?;
        anyhow::ensure!(welcome["type"] == "welcome", "expected welcome, got {}", welcome);
        Ok(client)
    }
}

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WsClient {
    /// Send a raw JSON message
    pub async fn send_json(&mut self, msg: &Value) -> Result<()> {
        self.write
            .send(Message::Text(msg.to_string().into()))
            .await?;
        Ok(())
    }

    /// Start a battle, against a random monster when `monster` is None
    pub async fn start_battle(&mut self, character: &str, monster: Option<&str>) -> Result<Value> {
        self.send_json(&json!({
            "type": "start_battle",
            "character": character,
            "monster": monster,
        }))
        .await?;
        self.recv_json_timeout(Duration::from_secs(2)).await
    }

    /// Answer the pending decision
    pub async fn input(&mut self, text: &str) -> Result<Value> {
        self.send_json(&json!({ "type": "input", "text": text }))
            .await?;
        self.recv_json_timeout(Duration::from_secs(2)).await
    }

    pub async fn flee(&mut self) -> Result<Value> {
        self.send_json(&json!({ "type": "flee" })).await?;
        self.recv_json_timeout(Duration::from_secs(2)).await
    }

    /// Send a ping message
    pub async fn send_ping(&mut self) -> Result<()> {
        self.send_json(&json!({ "type": "ping" })).await
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue, // Skip binary/ping/pong frames
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

impl Drop for CampaignTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}
