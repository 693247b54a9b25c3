//! Login coordination for private clients.
//!
//! At most one login is in flight per client. Concurrent callers share its
//! outcome through a [`OnceSignal`], so every caller sees the same success or
//! failure. A reconnect parks the connection's topics as a pending record
//! that a successful login replays and a failed one discards.

use std::collections::HashMap;
use std::sync::Arc;
use streamx_core::error::{Error, Result};
use streamx_core::parser_utils::milliseconds;
use streamx_core::signal::OnceSignal;
use streamx_core::ws_client::ConnId;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::Inner;
use super::client::WsClient;
use crate::bybit::BybitAuth;
use crate::bybit::parser::{OpFailure, WsEnvelope};

/// Why a login did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// The venue answered with a failure.
    Rejected(OpFailure),
    /// No answer before the login deadline.
    TimedOut,
    /// The auth frame could not be written.
    Transport(String),
}

impl LoginFailure {
    /// Converts to the error taxonomy.
    pub fn to_error(&self) -> Error {
        match self {
            Self::Rejected(failure) => failure.to_error(),
            Self::TimedOut => Error::timeout("ws login timeout"),
            Self::Transport(message) => Error::runtime(message.clone()),
        }
    }
}

/// Result shared by every waiter of one login.
pub type LoginOutcome = std::result::Result<(), LoginFailure>;

/// Observable login state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No login has succeeded since the last reconnect.
    Unauthenticated,
    /// A login is in flight.
    Pending {
        /// Callers currently blocked on it.
        waiters: usize,
    },
    /// Logged in.
    Authenticated,
}

enum AuthState {
    Unauthenticated,
    Pending(OnceSignal<LoginOutcome>),
    Authenticated,
}

/// Topics a dropped private connection carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingReconnect {
    pub(crate) conn: ConnId,
    pub(crate) topics: Vec<String>,
}

struct AuthSlot {
    state: AuthState,
    reconnect: Option<PendingReconnect>,
}

impl Default for AuthSlot {
    fn default() -> Self {
        Self {
            state: AuthState::Unauthenticated,
            reconnect: None,
        }
    }
}

/// What a login call has to do.
pub(crate) enum Begin {
    Authenticated,
    /// Another login is in flight; wait for it.
    Wait(OnceSignal<LoginOutcome>),
    /// Send an auth frame and resolve this signal.
    Send(OnceSignal<LoginOutcome>),
}

/// Per-client auth state and pending reconnect records, under one lock.
#[derive(Default)]
pub(crate) struct AuthCoordinator {
    slots: Mutex<HashMap<String, AuthSlot>>,
}

impl AuthCoordinator {
    pub(crate) async fn status(&self, key: &str) -> AuthStatus {
        match self.slots.lock().await.get(key).map(|slot| &slot.state) {
            Some(AuthState::Authenticated) => AuthStatus::Authenticated,
            Some(AuthState::Pending(signal)) => AuthStatus::Pending {
                waiters: signal.waiters(),
            },
            Some(AuthState::Unauthenticated) | None => AuthStatus::Unauthenticated,
        }
    }

    /// Claims the login of `key`. With `force` a frame is sent even when one
    /// is in flight; the in-flight signal is reused so its waiters resolve
    /// with the new answer.
    pub(crate) async fn begin(&self, key: &str, force: bool) -> Begin {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key.to_string()).or_default();
        match &slot.state {
            AuthState::Authenticated => Begin::Authenticated,
            AuthState::Pending(signal) if force => Begin::Send(signal.clone()),
            AuthState::Pending(signal) => Begin::Wait(signal.clone()),
            AuthState::Unauthenticated => {
                let signal = OnceSignal::new();
                slot.state = AuthState::Pending(signal.clone());
                Begin::Send(signal)
            }
        }
    }

    /// Gives up on the login resolved by `signal`: resets the state if that
    /// login is still the current one, publishes `failure` to its waiters and
    /// drops any pending reconnect record.
    pub(crate) async fn abandon(
        &self,
        key: &str,
        signal: &OnceSignal<LoginOutcome>,
        failure: LoginFailure,
    ) -> Option<PendingReconnect> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(key)?;
        if matches!(&slot.state, AuthState::Pending(current) if current.same_as(signal)) {
            slot.state = AuthState::Unauthenticated;
        }
        signal.publish(Err(failure));
        slot.reconnect.take()
    }

    /// Records a reconnect of a private connection. An authenticated client
    /// falls back to unauthenticated; an in-flight login stays in flight.
    pub(crate) async fn mark_reconnecting(&self, key: &str, record: PendingReconnect) {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key.to_string()).or_default();
        if matches!(slot.state, AuthState::Authenticated) {
            slot.state = AuthState::Unauthenticated;
        }
        if let Some(old) = slot.reconnect.replace(record) {
            debug!(client = key, conn = old.conn, "replacing pending resubscription");
        }
    }

    /// Applies a login answer and hands back the pending reconnect record,
    /// which the caller replays on success and discards on failure.
    pub(crate) async fn complete(&self, key: &str, outcome: LoginOutcome) -> Option<PendingReconnect> {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(key.to_string()).or_default();
        let previous = std::mem::replace(
            &mut slot.state,
            if outcome.is_ok() {
                AuthState::Authenticated
            } else {
                AuthState::Unauthenticated
            },
        );
        match previous {
            AuthState::Pending(signal) => {
                signal.publish(outcome);
            }
            AuthState::Authenticated if outcome.is_err() => {
                slot.state = AuthState::Authenticated;
                warn!(client = key, "ignoring auth failure for an authenticated client");
                return None;
            }
            _ => {}
        }
        slot.reconnect.take()
    }
}

impl Inner {
    /// Logs `client` in, sharing any login already in flight.
    ///
    /// The auth frame goes on `conn` when given, otherwise on a connection
    /// acquired from the transport.
    #[instrument(skip(self, client), fields(client = %client.key))]
    pub(crate) async fn login(
        self: &Arc<Self>,
        client: &Arc<WsClient>,
        conn: Option<ConnId>,
        force: bool,
    ) -> Result<()> {
        let signal = match self.auth.begin(&client.key, force).await {
            Begin::Authenticated => return Ok(()),
            Begin::Wait(signal) => {
                return match signal.wait(self.config.login_timeout).await {
                    Some(outcome) => outcome.map_err(|f| f.to_error()),
                    None => Err(Error::timeout("ws login timeout (waiting)")),
                };
            }
            Begin::Send(signal) => signal,
        };

        if let Err(e) = self.send_auth(client, conn).await {
            let failure = LoginFailure::Transport(e.to_string());
            if self.auth.abandon(&client.key, &signal, failure).await.is_some() {
                warn!(client = %client.key, "login failed, pending resubscription dropped");
            }
            return Err(e);
        }

        match signal.wait(self.config.login_timeout).await {
            Some(outcome) => outcome.map_err(|f| f.to_error()),
            None => {
                if self
                    .auth
                    .abandon(&client.key, &signal, LoginFailure::TimedOut)
                    .await
                    .is_some()
                {
                    warn!(client = %client.key, "login timed out, pending resubscription dropped");
                }
                Err(Error::timeout("ws login timeout"))
            }
        }
    }

    async fn send_auth(&self, client: &WsClient, conn: Option<ConnId>) -> Result<()> {
        let credentials = self.credentials(&client.account)?;
        let expires = milliseconds() + self.config.auth_expiry_ms;
        let frame = BybitAuth::new(credentials).ws_auth_frame(expires)?;
        let conn = match conn {
            Some(conn) => conn,
            None => client.transport.acquire(&[]).await?,
        };
        debug!(client = %client.key, conn, "sending auth frame");
        client.transport.write(conn, &frame).await
    }

    /// Handles an `auth` op reply.
    pub(crate) async fn on_auth_reply(self: &Arc<Self>, client: &Arc<WsClient>, env: &WsEnvelope) {
        let outcome = env.op_result().map_err(LoginFailure::Rejected);
        let record = self.auth.complete(&client.key, outcome.clone()).await;
        match (outcome, record) {
            (Ok(()), Some(record)) => {
                info!(client = %client.key, conn = record.conn, topics = record.topics.len(), "ws authenticated, restoring subscriptions");
                self.spawn_replay(Arc::clone(client), record);
            }
            (Ok(()), None) => info!(client = %client.key, "ws authenticated"),
            (Err(failure), record) => {
                warn!(client = %client.key, error = %failure.to_error(), "ws login rejected");
                if let Some(record) = record {
                    warn!(client = %client.key, conn = record.conn, topics = ?record.topics, "dropping pending resubscription");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(conn: ConnId) -> PendingReconnect {
        PendingReconnect {
            conn,
            topics: vec!["wallet".to_string()],
        }
    }

    // ==================== State Machine Tests ====================

    #[tokio::test]
    async fn test_second_begin_waits_on_same_signal() {
        let auth = AuthCoordinator::default();
        let Begin::Send(first) = auth.begin("private/a", false).await else {
            panic!("first login should send");
        };
        let Begin::Wait(second) = auth.begin("private/a", false).await else {
            panic!("second login should wait");
        };
        assert!(first.same_as(&second));
        assert!(matches!(auth.status("private/a").await, AuthStatus::Pending { .. }));
    }

    #[tokio::test]
    async fn test_complete_success_publishes_and_returns_record() {
        let auth = AuthCoordinator::default();
        let Begin::Send(signal) = auth.begin("k", false).await else {
            panic!("expected send");
        };
        auth.mark_reconnecting("k", record(3)).await;
        let taken = auth.complete("k", Ok(())).await;
        assert_eq!(taken, Some(record(3)));
        assert_eq!(signal.wait(Duration::from_millis(10)).await, Some(Ok(())));
        assert_eq!(auth.status("k").await, AuthStatus::Authenticated);
        assert!(matches!(auth.begin("k", false).await, Begin::Authenticated));
        assert_eq!(auth.complete("k", Ok(())).await, None);
    }

    #[tokio::test]
    async fn test_failure_resets_to_unauthenticated() {
        let auth = AuthCoordinator::default();
        let Begin::Send(signal) = auth.begin("k", false).await else {
            panic!("expected send");
        };
        let failure = LoginFailure::Rejected(OpFailure {
            code: None,
            message: "bad".to_string(),
        });
        auth.complete("k", Err(failure.clone())).await;
        assert_eq!(signal.peek(), Some(Err(failure)));
        assert_eq!(auth.status("k").await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_reconnect_keeps_in_flight_signal() {
        let auth = AuthCoordinator::default();
        let Begin::Send(signal) = auth.begin("k", false).await else {
            panic!("expected send");
        };
        auth.mark_reconnecting("k", record(1)).await;
        let Begin::Send(forced) = auth.begin("k", true).await else {
            panic!("forced login should send");
        };
        assert!(signal.same_as(&forced));
    }

    #[tokio::test]
    async fn test_reconnect_drops_authenticated() {
        let auth = AuthCoordinator::default();
        auth.begin("k", false).await;
        auth.complete("k", Ok(())).await;
        auth.mark_reconnecting("k", record(1)).await;
        assert_eq!(auth.status("k").await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_abandon_only_resets_current_login() {
        let auth = AuthCoordinator::default();
        let Begin::Send(stale) = auth.begin("k", false).await else {
            panic!("expected send");
        };
        auth.complete("k", Ok(())).await;
        auth.mark_reconnecting("k", record(1)).await;
        let Begin::Send(_current) = auth.begin("k", false).await else {
            panic!("expected send");
        };
        auth.abandon("k", &stale, LoginFailure::TimedOut).await;
        assert!(matches!(auth.status("k").await, AuthStatus::Pending { .. }));
    }

    #[test]
    fn test_login_failure_errors() {
        assert!(LoginFailure::TimedOut.to_error().is_timeout());
        assert!(matches!(
            LoginFailure::Transport("closed".into()).to_error(),
            Error::Runtime(_)
        ));
        let rejected = LoginFailure::Rejected(OpFailure {
            code: Some(10003),
            message: "invalid key".into(),
        });
        assert!(rejected.to_error().as_authentication().is_some());
    }
}
