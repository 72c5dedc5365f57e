//! Shared session context.
//!
//! One lock owns every mutable session field; the epoch counter increments
//! on teardown so completions that land after a logout are recognizably
//! stale and discarded instead of resurrecting dead state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vitrina_core::{AuthStatus, BearerSource, Envelope, Principal, PrincipalKind};
use vitrina_store::{Store, keys};

#[derive(Debug, Clone)]
pub(crate) struct SessionFields {
    pub kind: PrincipalKind,
    pub token: Option<String>,
    /// Absolute expiry instant, epoch milliseconds.
    pub expires_at: Option<i64>,
    pub principal: Option<Principal>,
    pub status: AuthStatus,
    /// Transient mirror of the last envelope.
    pub success: bool,
    pub message: String,
    pub validation_errors: Vec<String>,
}

pub(crate) struct SessionState {
    fields: RwLock<SessionFields>,
    epoch: AtomicU64,
}

impl SessionState {
    /// Construct from persisted values, or empty when nothing was stored.
    /// A restored token starts the session as `Authenticated`; staleness is
    /// decided at read time by `is_authenticated_at`, not here.
    pub(crate) fn restore(store: &Store) -> Self {
        let kind = store
            .get::<String>(keys::USER_TYPE)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(PrincipalKind::User);
        let token: Option<String> = store.get(keys::TOKEN);
        let status = if token.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        };

        Self {
            fields: RwLock::new(SessionFields {
                kind,
                token,
                expires_at: store.get(keys::EXPIRES_AT),
                principal: store.get(keys::CURRENT_USER),
                status,
                success: false,
                message: String::new(),
                validation_errors: Vec::new(),
            }),
            epoch: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionFields> {
        self.fields.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionFields> {
        self.fields.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn kind(&self) -> PrincipalKind {
        self.read().kind
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub(crate) fn expires_at(&self) -> Option<i64> {
        self.read().expires_at
    }

    pub(crate) fn principal(&self) -> Option<Principal> {
        self.read().principal.clone()
    }

    pub(crate) fn status(&self) -> AuthStatus {
        self.read().status
    }

    pub(crate) fn last_message(&self) -> String {
        self.read().message.clone()
    }

    pub(crate) fn validation_errors(&self) -> Vec<String> {
        self.read().validation_errors.clone()
    }

    pub(crate) fn set_status(&self, status: AuthStatus) {
        self.write().status = status;
    }

    /// Token present and not past its expiry at `now_ms`.
    pub(crate) fn is_authenticated_at(&self, now_ms: i64) -> bool {
        let fields = self.read();
        fields.token.is_some() && fields.expires_at.is_none_or(|at| at > now_ms)
    }

    // Replace-if-changed mutators backing the guarded setters. Each returns
    // whether the value actually changed, so the caller persists at most
    // once per change.

    pub(crate) fn replace_token(&self, token: Option<String>) -> bool {
        let mut fields = self.write();
        if fields.token == token {
            return false;
        }
        fields.token = token;
        true
    }

    pub(crate) fn replace_expires_at(&self, expires_at: Option<i64>) -> bool {
        let mut fields = self.write();
        if fields.expires_at == expires_at {
            return false;
        }
        fields.expires_at = expires_at;
        true
    }

    pub(crate) fn replace_principal(&self, principal: Option<Principal>) -> bool {
        let mut fields = self.write();
        if fields.principal == principal {
            return false;
        }
        fields.principal = principal;
        true
    }

    pub(crate) fn replace_kind(&self, kind: PrincipalKind) -> bool {
        let mut fields = self.write();
        if fields.kind == kind {
            return false;
        }
        fields.kind = kind;
        true
    }

    /// Clear the transient fields before a fresh auth attempt.
    pub(crate) fn reset_transients(&self) {
        let mut fields = self.write();
        fields.success = false;
        fields.message.clear();
        fields.validation_errors.clear();
    }

    /// Mirror the envelope a call resolved with onto the session.
    pub(crate) fn record_envelope(&self, envelope: &Envelope) {
        let mut fields = self.write();
        fields.success = envelope.success;
        fields.message = envelope.message.clone();
        fields.validation_errors = envelope.validation_errors.clone();
    }
}

impl BearerSource for SessionState {
    fn bearer_token(&self) -> Option<String> {
        self.read().token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vitrina_store::MemoryMedium;

    fn empty_state() -> SessionState {
        SessionState::restore(&Store::new(Arc::new(MemoryMedium::new())))
    }

    #[test]
    fn empty_store_restores_an_anonymous_user_session() {
        let state = empty_state();
        assert_eq!(state.kind(), PrincipalKind::User);
        assert_eq!(state.status(), AuthStatus::Anonymous);
        assert_eq!(state.token(), None);
        assert!(!state.is_authenticated_at(0));
    }

    #[test]
    fn persisted_session_restores_authenticated() {
        let store = Store::new(Arc::new(MemoryMedium::new()));
        store.set(keys::TOKEN, "tok-9");
        store.set(keys::USER_TYPE, "client");
        store.set(keys::EXPIRES_AT, &2_000_i64);

        let state = SessionState::restore(&store);
        assert_eq!(state.kind(), PrincipalKind::Client);
        assert_eq!(state.status(), AuthStatus::Authenticated);
        assert!(state.is_authenticated_at(1_999));
        // Stale expiry means unauthenticated, even with a token present.
        assert!(!state.is_authenticated_at(2_000));
    }

    #[test]
    fn unknown_persisted_kind_falls_back_to_user() {
        let store = Store::new(Arc::new(MemoryMedium::new()));
        store.set(keys::USER_TYPE, "superadmin");

        assert_eq!(SessionState::restore(&store).kind(), PrincipalKind::User);
    }

    #[test]
    fn replace_mutators_report_change() {
        let state = empty_state();
        assert!(state.replace_token(Some("t".into())));
        assert!(!state.replace_token(Some("t".into())));
        assert!(state.replace_token(None));

        assert!(state.replace_kind(PrincipalKind::Client));
        assert!(!state.replace_kind(PrincipalKind::Client));

        assert!(state.replace_expires_at(Some(5)));
        assert!(!state.replace_expires_at(Some(5)));
    }

    #[test]
    fn missing_expiry_counts_as_not_stale() {
        let state = empty_state();
        state.replace_token(Some("t".into()));
        assert!(state.is_authenticated_at(i64::MAX));
    }
}
