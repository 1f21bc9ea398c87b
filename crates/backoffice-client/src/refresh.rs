//! Single-flight access token renewal.
//!
//! However many requests observe an expired access token at once, exactly one
//! refresh exchange goes out. Everyone else waits in a queue and is resolved
//! with the outcome of that one exchange.

use crate::credentials::CredentialStore;
use crate::error_message::normalize_error;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Notified when the session cannot be renewed and the user must log in again.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

/// Listener that ignores session expiry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionListener;

impl SessionListener for NoopSessionListener {
    fn session_expired(&self) {}
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Callers suspended on the in-flight refresh, in arrival order.
#[derive(Debug, Default)]
struct WaiterQueue {
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
}

impl WaiterQueue {
    fn push(&mut self, waiter: oneshot::Sender<Option<String>>) {
        self.waiters.push_back(waiter);
    }

    fn len(&self) -> usize {
        self.waiters.len()
    }

    fn resolve(self, access: Option<String>) {
        for waiter in self.waiters {
            // A waiter whose request was dropped has nobody left to tell.
            let _ = waiter.send(access.clone());
        }
    }
}

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing(WaiterQueue),
}

pub(crate) struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    listener: Arc<dyn SessionListener>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        http: reqwest::Client,
        refresh_url: String,
        store: Arc<dyn CredentialStore>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            http,
            refresh_url,
            store,
            listener,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing(_))
    }

    /// Obtain a fresh access token after a request carrying `stale` was
    /// rejected.
    ///
    /// Returns `None` when renewal failed; by then both credentials are
    /// cleared and the session listener has been notified once for the whole
    /// cycle. With no credentials stored at all there is nothing to renew:
    /// `None` comes back without a cycle and without a notification.
    pub(crate) async fn refresh(self: &Arc<Self>, stale: Option<&str>) -> Option<String> {
        let outcome = {
            let mut state = self.state.lock();

            if matches!(*state, RefreshState::Idle) {
                match (self.store.access(), stale) {
                    // Renewed after the rejected request went out.
                    (Some(current), _) if stale != Some(current.as_str()) => {
                        tracing::debug!("Access token already renewed, retrying without refresh");
                        return Some(current);
                    },
                    // Nothing to renew: the session already ended, or never began.
                    (None, _) if self.store.refresh().is_none() => {
                        tracing::debug!("No stored credentials, skipping token refresh");
                        return None;
                    },
                    _ => {},
                }
            }

            let (tx, rx) = oneshot::channel();
            match &mut *state {
                RefreshState::Refreshing(queue) => {
                    queue.push(tx);
                    tracing::debug!("Joining in-flight token refresh ({} waiting)", queue.len());
                },
                idle @ RefreshState::Idle => {
                    let mut queue = WaiterQueue::default();
                    queue.push(tx);
                    *idle = RefreshState::Refreshing(queue);

                    // Detached so the exchange completes even if this caller goes away.
                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.run_exchange().await });
                },
            }
            rx
        };

        outcome.await.unwrap_or(None)
    }

    async fn run_exchange(&self) {
        let access = match self.exchange().await {
            Ok(tokens) => {
                match tokens.refresh.as_deref() {
                    Some(rotated) => self.store.set_pair(&tokens.access, rotated),
                    None => self.store.set_access(&tokens.access),
                }
                tracing::info!("Access token refreshed");
                Some(tokens.access)
            },
            Err(e) => {
                tracing::warn!("Token refresh failed, ending session: {}", e);
                self.store.clear();
                None
            },
        };

        let queue = match std::mem::take(&mut *self.state.lock()) {
            RefreshState::Refreshing(queue) => queue,
            RefreshState::Idle => WaiterQueue::default(),
        };

        if access.is_none() {
            self.listener.session_expired();
        }
        queue.resolve(access);
    }

    async fn exchange(&self) -> Result<RefreshResponse, String> {
        let refresh = self
            .store
            .refresh()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| "no refresh token stored".to_string())?;

        let resp = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(|e| format!("Network error: {}", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.ok();
            return Err(normalize_error(status, body.as_deref()));
        }

        resp.json::<RefreshResponse>()
            .await
            .map_err(|e| format!("Invalid refresh response: {}", e))
    }
}
