//! The session manager: authentication state machine for both principal
//! kinds, plus the operations and guarded setters around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;

use vitrina_client::ApiClient;
use vitrina_core::envelope::AuthPayload;
use vitrina_core::error::TransportError;
use vitrina_core::{AuthStatus, Envelope, Principal, PrincipalKind};
use vitrina_store::{Store, keys};

use crate::clock::{Clock, SystemClock};
use crate::scheduler::{RefreshScheduler, SchedulerConfig};
use crate::state::SessionState;

/// Outcome of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No network call was issued: another refresh was already in flight,
    /// there was no token to renew, or the session was torn down while the
    /// call was resolving.
    Skipped,
    /// Token, expiry and principal were replaced.
    Renewed,
    /// Transient failure; the scheduler retries on its next tick.
    RetryLater,
    /// The backend rejected the credential; the session was torn down and
    /// the scheduler cancelled.
    Terminated,
}

/// Owns the session for one storefront backend.
///
/// All auth state lives behind this manager: callers never mutate the
/// session directly, they call the operations below and read the
/// accessors. Expected failures (bad credentials, expired session,
/// validation) are returned as failure envelopes, never raised.
pub struct SessionManager {
    state: Arc<SessionState>,
    api: Arc<ApiClient>,
    store: Store,
    clock: Arc<dyn Clock>,
    scheduler: RefreshScheduler,
    refresh_in_flight: AtomicBool,
    /// Handed to the scheduler task so it never keeps the manager alive.
    weak_self: Weak<SessionManager>,
}

impl SessionManager {
    /// Restore a session from the store and wire a transport client to it.
    pub fn new(base_url: impl Into<String>, store: Store) -> anyhow::Result<Arc<Self>> {
        Self::with_parts(
            base_url,
            store,
            Arc::new(SystemClock),
            SchedulerConfig::default(),
        )
    }

    /// Full constructor for hosts and tests that inject the clock or tune
    /// the scheduler cadence.
    pub fn with_parts(
        base_url: impl Into<String>,
        store: Store,
        clock: Arc<dyn Clock>,
        scheduler: SchedulerConfig,
    ) -> anyhow::Result<Arc<Self>> {
        let state = Arc::new(SessionState::restore(&store));
        let api = Arc::new(ApiClient::new(base_url, state.clone())?);

        Ok(Arc::new_cyclic(|weak| Self {
            state,
            api,
            store,
            clock: clock.clone(),
            scheduler: RefreshScheduler::new(scheduler, clock),
            refresh_in_flight: AtomicBool::new(false),
            weak_self: weak.clone(),
        }))
    }

    /// The call-and-normalize transport entry point, for entity wrappers
    /// that share this session.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // Accessors ------------------------------------------------------------

    /// Token present and not past its expiry. Staleness is considered here;
    /// callers need no separate expiry check for sensitive operations.
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated_at(self.clock.now_ms())
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.state.principal()
    }

    pub fn kind(&self) -> PrincipalKind {
        self.state.kind()
    }

    pub fn token(&self) -> Option<String> {
        self.state.token()
    }

    /// Absolute expiry instant, epoch milliseconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.state.expires_at()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.status()
    }

    /// Message of the last envelope any operation resolved with.
    pub fn last_message(&self) -> String {
        self.state.last_message()
    }

    pub fn validation_errors(&self) -> Vec<String> {
        self.state.validation_errors()
    }

    pub fn refresh_scheduler_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    // Guarded setters -------------------------------------------------------
    // Each is a no-op, store write included, when the new value equals the
    // current one.

    pub fn set_token(&self, token: Option<String>) {
        if self.state.replace_token(token.clone()) {
            match token {
                Some(token) => self.store.set(keys::TOKEN, &token),
                None => self.store.remove(keys::TOKEN),
            }
        }
    }

    pub fn set_principal(&self, principal: Option<Principal>) {
        if self.state.replace_principal(principal.clone()) {
            match principal {
                Some(principal) => self.store.set(keys::CURRENT_USER, &principal),
                None => self.store.remove(keys::CURRENT_USER),
            }
        }
    }

    /// Compute and persist the absolute expiry from a lifetime in seconds.
    pub fn set_expiration(&self, expires_in_secs: i64) {
        let expires_at = self.clock.now_ms() + expires_in_secs * 1000;
        if self.state.replace_expires_at(Some(expires_at)) {
            self.store.set(keys::EXPIRES_AT, &expires_at);
        }
    }

    pub fn set_kind(&self, kind: PrincipalKind) {
        if self.state.replace_kind(kind) {
            self.store.set(keys::USER_TYPE, kind.as_str());
        }
    }

    // Operations ------------------------------------------------------------

    /// Authenticate as `kind`. On success the refresh scheduler is armed.
    pub async fn login<B: Serialize + ?Sized>(
        &self,
        credentials: &B,
        kind: PrincipalKind,
    ) -> Envelope {
        self.authenticate("login", credentials, kind).await
    }

    /// Register a new principal of `kind`. Arms the scheduler the same way
    /// `login` does whenever the response carries a token.
    pub async fn register<B: Serialize + ?Sized>(
        &self,
        payload: &B,
        kind: PrincipalKind,
    ) -> Envelope {
        self.authenticate("register", payload, kind).await
    }

    async fn authenticate<B: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &B,
        kind: PrincipalKind,
    ) -> Envelope {
        // A new authentication supersedes the previous session: bump the
        // epoch so a completion still resolving against it is discarded as
        // stale, and drop the old token so none is held in `Authenticating`.
        self.state.bump_epoch();
        self.set_token(None);
        self.state.reset_transients();
        self.set_kind(kind);
        self.state.set_status(AuthStatus::Authenticating);
        let epoch = self.state.epoch();

        let envelope = self
            .api
            .post(&format!("{}/auth/{action}", kind.route_prefix()), body)
            .await;

        if self.state.epoch() != epoch {
            tracing::debug!(action, "discarding auth outcome from a torn-down session");
            return envelope;
        }
        self.state.record_envelope(&envelope);

        if envelope.success {
            match envelope.decode_data::<AuthPayload>() {
                Ok(payload) => {
                    self.apply_auth_payload(payload);
                    self.state.set_status(AuthStatus::Authenticated);
                    self.scheduler.start(self.weak_self.clone());
                }
                Err(err) => {
                    tracing::warn!(action, "undecodable auth payload: {err:?}");
                    self.clear_session();
                }
            }
        } else {
            self.clear_session();
        }

        envelope
    }

    /// Best-effort remote logout. Local teardown runs in both outcomes: a
    /// transport failure never leaves a half-alive session behind.
    pub async fn logout(&self) -> Envelope {
        let prefix = self.state.kind().route_prefix();
        let envelope = self.api.post_empty(&format!("{prefix}/auth/logout")).await;

        if !envelope.success {
            tracing::warn!(
                message = %envelope.message,
                "remote logout failed; clearing local session anyway"
            );
        }
        self.state.record_envelope(&envelope);
        self.teardown();

        envelope
    }

    /// Renew the token using the current one. At most one refresh is in
    /// flight at any time: a second trigger — scheduler tick or caller —
    /// returns [`RefreshOutcome::Skipped`] without a network call.
    pub async fn refresh(&self) -> RefreshOutcome {
        if self.refresh_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("refresh already in flight");
            return RefreshOutcome::Skipped;
        }
        let outcome = self.refresh_inner().await;
        self.refresh_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn refresh_inner(&self) -> RefreshOutcome {
        if self.state.token().is_none() {
            return RefreshOutcome::Skipped;
        }

        let epoch = self.state.epoch();
        let prefix = self.state.kind().route_prefix();
        self.state.set_status(AuthStatus::Refreshing);

        let envelope = self.api.post_empty(&format!("{prefix}/auth/refresh")).await;

        if self.state.epoch() != epoch {
            tracing::debug!("discarding refresh outcome from a torn-down session");
            return RefreshOutcome::Skipped;
        }
        self.state.record_envelope(&envelope);

        if envelope.success {
            match envelope.decode_data::<AuthPayload>() {
                Ok(payload) => {
                    self.apply_auth_payload(payload);
                    self.state.set_status(AuthStatus::Authenticated);
                    RefreshOutcome::Renewed
                }
                Err(err) => {
                    tracing::warn!("undecodable refresh payload: {err:?}");
                    self.state.set_status(AuthStatus::Authenticated);
                    RefreshOutcome::RetryLater
                }
            }
        } else {
            match TransportError::from_envelope(&envelope) {
                Some(TransportError::Http { status: 401 | 403 }) => {
                    tracing::warn!(
                        status = envelope.status,
                        "refresh rejected; tearing down session"
                    );
                    self.teardown();
                    RefreshOutcome::Terminated
                }
                _ => {
                    // Transient (connectivity, timeout, 5xx): keep the
                    // session, the scheduler retries on its next tick.
                    self.state.set_status(AuthStatus::Authenticated);
                    RefreshOutcome::RetryLater
                }
            }
        }
    }

    /// Repopulate the principal from the backend. Token and expiry are
    /// untouched.
    pub async fn fetch_identity(&self) -> Envelope {
        let epoch = self.state.epoch();
        let prefix = self.state.kind().route_prefix();

        let envelope = self.api.post_empty(&format!("{prefix}/auth/me")).await;

        if self.state.epoch() != epoch {
            return envelope;
        }
        self.state.record_envelope(&envelope);

        if envelope.success {
            match envelope.decode_data::<Principal>() {
                Ok(principal) => self.set_principal(Some(principal)),
                Err(err) => tracing::warn!("undecodable identity payload: {err:?}"),
            }
        }

        envelope
    }

    // Storefront-only operations -------------------------------------------
    // Email verification and password recovery exist only under the
    // storefront prefix. They mutate nothing beyond the transient envelope
    // mirror.

    pub async fn verify_email<B: Serialize + ?Sized>(&self, payload: &B) -> Envelope {
        self.storefront("verify-email", payload).await
    }

    pub async fn resend_verification<B: Serialize + ?Sized>(&self, payload: &B) -> Envelope {
        self.storefront("resend-verification", payload).await
    }

    pub async fn forgot_password<B: Serialize + ?Sized>(&self, payload: &B) -> Envelope {
        self.storefront("forgot-password", payload).await
    }

    pub async fn reset_password<B: Serialize + ?Sized>(&self, payload: &B) -> Envelope {
        self.storefront("reset-password", payload).await
    }

    async fn storefront<B: Serialize + ?Sized>(&self, action: &str, payload: &B) -> Envelope {
        let envelope = self.api.post(&format!("/client/auth/{action}"), payload).await;
        self.state.record_envelope(&envelope);
        envelope
    }

    // Internals -------------------------------------------------------------

    fn apply_auth_payload(&self, payload: AuthPayload) {
        self.set_token(Some(payload.token));
        if let Some(expires_in) = payload.expires_in {
            self.set_expiration(expires_in);
        }
        self.set_principal(Some(payload.user));
    }

    /// Null the session fields, remove them from the store (`userType` is
    /// kept as a preference), cancel the scheduler.
    fn clear_session(&self) {
        self.scheduler.stop();
        self.set_token(None);
        self.set_principal(None);
        if self.state.replace_expires_at(None) {
            self.store.remove(keys::EXPIRES_AT);
        }
        self.state.set_status(AuthStatus::LoggedOut);
    }

    /// Full teardown: clear the session and bump the epoch so in-flight
    /// completions from the old session are discarded when they land.
    fn teardown(&self) {
        self.clear_session();
        self.state.bump_epoch();
    }
}
