//! External ledger recorder.
//!
//! The backend keeps its own copy of every balance change. Delivery is
//! best-effort: the local ledger has already committed the change before the
//! recorder is called, and a failed delivery is only logged.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ledger::EntryKind;
use crate::config::RecorderConfig;

/// One balance change as reported to the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    #[serde(skip)]
    pub kind: EntryKind,
    pub user_id: u64,
    pub amount: u64,
    pub reason: String,
    pub balance_before: u64,
    pub balance_after: u64,
}

/// Sink for ledger events.
#[async_trait]
pub trait LedgerRecorder: Send + Sync {
    /// Recorder name (for logging)
    fn name(&self) -> &str;

    /// Deliver one event. Errors are logged by the caller, never retried.
    async fn record(&self, event: &LedgerEvent) -> Result<()>;
}

/// Response body of the credits endpoints
#[derive(Debug, Deserialize)]
struct RecorderResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Posts events to `/api/credits/deduct` and `/api/credits/add`
pub struct HttpLedgerRecorder {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpLedgerRecorder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        let mut recorder = Self::new(&config.base_url);
        if let Some(ref token_env) = config.token_env {
            match std::env::var(token_env) {
                Ok(token) if !token.is_empty() => recorder.token = Some(token),
                _ => {
                    tracing::warn!(
                        env_var = %token_env,
                        "Recorder token environment variable is not set or empty"
                    );
                }
            }
        }
        recorder
    }

    fn endpoint(&self, kind: EntryKind) -> String {
        let path = match kind {
            EntryKind::Spend => "deduct",
            EntryKind::Earn => "add",
        };
        format!("{}/api/credits/{}", self.base_url, path)
    }
}

#[async_trait]
impl LedgerRecorder for HttpLedgerRecorder {
    fn name(&self) -> &str {
        "http"
    }

    async fn record(&self, event: &LedgerEvent) -> Result<()> {
        let mut request = self.client.post(self.endpoint(event.kind)).json(event);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("recorder returned status {}", status));
        }

        // The backend reports business failures in the body with a 200
        let body = response.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<RecorderResponse>(&body) {
            if !parsed.success {
                return Err(anyhow!(
                    "recorder rejected event: {}",
                    parsed.message.unwrap_or_default()
                ));
            }
        }

        tracing::debug!(
            recorder = %self.name(),
            amount = event.amount,
            balance_after = event.balance_after,
            "Ledger event recorded"
        );
        Ok(())
    }
}
