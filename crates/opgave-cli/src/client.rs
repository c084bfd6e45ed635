use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Session cookies persisted between CLI invocations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    /// Load a session file; any unreadable state means "signed out"
    pub fn load(path: &Path) -> Session {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    fn cookie_header(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(access) = &self.access_token {
            parts.push(format!("{}={}", ACCESS_TOKEN_COOKIE, access));
        }
        if let Some(refresh) = &self.refresh_token {
            parts.push(format!("{}={}", REFRESH_TOKEN_COOKIE, refresh));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// Name/value of a Set-Cookie header, attributes dropped
pub fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

enum GateState {
    Idle,
    /// A refresh is in flight; queued continuations wake in arrival order
    Refreshing(Vec<oneshot::Sender<bool>>),
}

pub enum GateTicket {
    /// This caller performs the refresh and must settle the gate
    Leader,
    /// Another refresh is in flight; await its outcome
    Follower(oneshot::Receiver<bool>),
}

/// De-duplicates concurrent refresh attempts. The first 401 becomes the
/// leader; requests that 401 while the refresh is in flight queue up and are
/// replayed (or rejected) together once it settles.
pub struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    pub async fn enter(&self) -> GateTicket {
        let mut state = self.state.lock().await;
        match &mut *state {
            GateState::Idle => {
                *state = GateState::Refreshing(Vec::new());
                GateTicket::Leader
            }
            GateState::Refreshing(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                GateTicket::Follower(rx)
            }
        }
    }

    /// Leader reports the outcome; waiters are released in FIFO order and the
    /// gate returns to idle.
    pub async fn settle(&self, ok: bool) {
        let mut state = self.state.lock().await;
        if let GateState::Refreshing(waiters) = std::mem::replace(&mut *state, GateState::Idle) {
            for tx in waiters {
                let _ = tx.send(ok);
            }
        }
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for the Opgave server. Carries the session cookies and
/// performs at most one silent refresh per request on 401.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Arc<str>,
    session_path: PathBuf,
    session: Mutex<Session>,
    gate: RefreshGate,
}

impl ApiClient {
    pub fn new(base_url: &str, session_path: PathBuf) -> Self {
        let session = Session::load(&session_path);
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::from(base_url.trim_end_matches('/')),
            session_path,
            session: Mutex::new(session),
            gate: RefreshGate::new(),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(reqwest::Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(reqwest::Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(reqwest::Method::DELETE, path, None).await
    }

    /// Issue a request; on 401 outside the auth routes, refresh once
    /// (de-duplicated through the gate) and replay. A failed refresh
    /// surfaces as a session-expired error.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut resp = self.send(method.clone(), path, body).await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED && !path.starts_with("/auth/") {
            if !self.refresh().await? {
                bail!("Session expired, please sign in again");
            }
            resp = self.send(method, path, body).await?;
        }

        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            bail!("{} ({})", message, status);
        }
        Ok(body)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(cookie) = self.session.lock().await.cookie_header() {
            req = req.header(reqwest::header::COOKIE, cookie);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        self.absorb_cookies(&resp).await?;
        Ok(resp)
    }

    /// Capture rotated session cookies from Set-Cookie response headers
    async fn absorb_cookies(&self, resp: &reqwest::Response) -> Result<()> {
        let mut changed = false;
        let mut session = self.session.lock().await;
        for header in resp.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let Some((name, value)) = parse_set_cookie(raw) else {
                continue;
            };
            let slot = match name.as_str() {
                ACCESS_TOKEN_COOKIE => &mut session.access_token,
                REFRESH_TOKEN_COOKIE => &mut session.refresh_token,
                _ => continue,
            };
            *slot = if value.is_empty() { None } else { Some(value) };
            changed = true;
        }
        if changed {
            session.save(&self.session_path)?;
        }
        Ok(())
    }

    /// One refresh at a time; concurrent callers queue behind the leader
    async fn refresh(&self) -> Result<bool> {
        match self.gate.enter().await {
            GateTicket::Leader => {
                let ok = match self.send(reqwest::Method::POST, "/auth/refresh", None).await {
                    Ok(resp) => resp.status().is_success(),
                    Err(_) => false,
                };
                self.gate.settle(ok).await;
                Ok(ok)
            }
            GateTicket::Follower(rx) => Ok(rx.await.unwrap_or(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie() {
        let parsed = parse_set_cookie("access_token=abc; Path=/; Max-Age=900; SameSite=Strict");
        assert_eq!(parsed, Some(("access_token".to_string(), "abc".to_string())));

        let parsed = parse_set_cookie("refresh_token=; Path=/; Max-Age=0");
        assert_eq!(parsed, Some(("refresh_token".to_string(), String::new())));

        assert!(parse_set_cookie("garbage-without-equals").is_none());
    }

    #[test]
    fn test_session_cookie_header() {
        let session = Session::default();
        assert!(session.cookie_header().is_none());

        let session = Session {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
        };
        assert_eq!(
            session.cookie_header().as_deref(),
            Some("access_token=a; refresh_token=r")
        );
    }

    #[test]
    fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = Session {
            access_token: Some("tok".to_string()),
            refresh_token: None,
        };
        session.save(&path).unwrap();

        let loaded = Session::load(&path);
        assert_eq!(loaded.access_token.as_deref(), Some("tok"));
        assert!(loaded.refresh_token.is_none());

        // a missing file is just an empty session
        let empty = Session::load(&dir.path().join("missing.json"));
        assert!(empty.access_token.is_none());
    }

    #[tokio::test]
    async fn test_gate_single_caller_leads_then_resets() {
        let gate = RefreshGate::new();

        assert!(matches!(gate.enter().await, GateTicket::Leader));
        gate.settle(true).await;

        // settled gate is idle again; the next 401 elects a new leader
        assert!(matches!(gate.enter().await, GateTicket::Leader));
        gate.settle(false).await;
    }

    #[tokio::test]
    async fn test_gate_queues_followers_and_broadcasts_outcome() {
        let gate = RefreshGate::new();

        let GateTicket::Leader = gate.enter().await else {
            panic!("first caller must lead");
        };
        let GateTicket::Follower(rx1) = gate.enter().await else {
            panic!("second caller must wait");
        };
        let GateTicket::Follower(rx2) = gate.enter().await else {
            panic!("third caller must wait");
        };

        gate.settle(true).await;
        assert!(rx1.await.unwrap());
        assert!(rx2.await.unwrap());
    }

    #[tokio::test]
    async fn test_gate_failed_refresh_rejects_all_waiters() {
        let gate = RefreshGate::new();

        let GateTicket::Leader = gate.enter().await else {
            panic!("first caller must lead");
        };
        let GateTicket::Follower(rx) = gate.enter().await else {
            panic!("second caller must wait");
        };

        gate.settle(false).await;
        assert!(!rx.await.unwrap());
    }
}
