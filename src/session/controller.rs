//! Client-side session state machine.
//!
//! A user counts as authenticated only once the primary backend has issued a
//! credential *and* the identity directory has confirmed the user exists.
//! Every failure is recovered here and surfaced through [`SessionController::message`]
//! and the state; nothing is returned as an error to the caller.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::backend::{IdentityDirectory, PasswordReset, PrimaryBackend};
use super::storage::CredentialStorage;
use crate::config::LogoutPolicy;
use crate::errors::{BackendError, INVALID_TOKEN_MESSAGE};
use crate::identity::{Credential, LocalIdentity, RemoteIdentity};

pub const RESET_LINK_SENT_MESSAGE: &str = "an email will be sent to you";
pub const PASSWORD_UPDATED_MESSAGE: &str = "password updated successfully";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing known yet; `start` has not run.
    Unresolved,
    /// A credential is being checked with the primary backend.
    Validating,
    Unauthenticated,
    /// The primary backend accepted the user; the directory has not confirmed it.
    LocalOnly { local: LocalIdentity },
    Authenticated {
        local: LocalIdentity,
        remote: RemoteIdentity,
    },
}

impl SessionState {
    pub fn kind(&self) -> SessionStateKind {
        match self {
            SessionState::Unresolved => SessionStateKind::Unresolved,
            SessionState::Validating => SessionStateKind::Validating,
            SessionState::Unauthenticated => SessionStateKind::Unauthenticated,
            SessionState::LocalOnly { .. } => SessionStateKind::LocalOnly,
            SessionState::Authenticated { .. } => SessionStateKind::Authenticated,
        }
    }

    pub fn local_identity(&self) -> Option<&LocalIdentity> {
        match self {
            SessionState::LocalOnly { local } | SessionState::Authenticated { local, .. } => {
                Some(local)
            }
            _ => None,
        }
    }
}

/// Payload-free tag of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateKind {
    Unresolved,
    Validating,
    Unauthenticated,
    LocalOnly,
    Authenticated,
}

impl std::fmt::Display for SessionStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStateKind::Unresolved => "unresolved",
            SessionStateKind::Validating => "validating",
            SessionStateKind::Unauthenticated => "unauthenticated",
            SessionStateKind::LocalOnly => "local_only",
            SessionStateKind::Authenticated => "authenticated",
        };
        f.write_str(s)
    }
}

/// What consumers observe through [`SessionController::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionStateKind,
    pub authenticated: bool,
    pub loading: bool,
    pub message: String,
    pub render_ready: bool,
}

pub struct SessionController {
    primary: Arc<dyn PrimaryBackend>,
    directory: Arc<dyn IdentityDirectory>,
    storage: Arc<dyn CredentialStorage>,
    logout_policy: LogoutPolicy,
    state: SessionState,
    /// Bearer for the next outgoing call. Replaced wholesale, never shared.
    bearer: Option<Credential>,
    message: String,
    loading: bool,
    /// True while a stored credential from a previous run is being validated.
    resuming: bool,
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        primary: Arc<dyn PrimaryBackend>,
        directory: Arc<dyn IdentityDirectory>,
        storage: Arc<dyn CredentialStorage>,
    ) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot {
            state: SessionStateKind::Unresolved,
            authenticated: false,
            loading: false,
            message: String::new(),
            render_ready: false,
        });
        Self {
            primary,
            directory,
            storage,
            logout_policy: LogoutPolicy::default(),
            state: SessionState::Unresolved,
            bearer: None,
            message: String::new(),
            loading: false,
            resuming: false,
            tx,
        }
    }

    pub fn with_logout_policy(mut self, policy: LogoutPolicy) -> Self {
        self.logout_policy = policy;
        self
    }

    /// Resume the session from storage, if a credential was stored.
    pub async fn start(&mut self) {
        let stored = match self.storage.load() {
            Ok(stored) => stored.filter(|c| !c.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored credential");
                None
            }
        };

        let Some(credential) = stored else {
            self.bearer = None;
            self.loading = false;
            self.transition(SessionState::Unauthenticated);
            return;
        };

        self.loading = true;
        self.resuming = true;
        self.transition(SessionState::Validating);

        let result = self.primary.whoami(&credential).await;
        self.loading = false;
        self.resuming = false;

        match result {
            Ok(identity) => {
                if !self.accept_identity(identity).await {
                    self.clear_storage();
                }
            }
            Err(e) => {
                tracing::info!(error = %e, "stored credential rejected");
                self.clear_storage();
                self.bearer = None;
                self.transition(SessionState::Unauthenticated);
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) {
        self.message.clear();
        self.loading = true;
        self.transition(SessionState::Validating);

        let result = self.primary.login(email, password).await;
        self.loading = false;

        match result {
            Ok(identity) => {
                self.accept_identity(identity).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "login failed");
                self.bearer = None;
                self.message = e.user_message();
                self.transition(SessionState::Unauthenticated);
            }
        }
    }

    /// Adopt an identity issued by the primary backend, then ask the
    /// directory to confirm it. Returns false when the identity carries no
    /// usable credential.
    pub async fn accept_identity(&mut self, identity: LocalIdentity) -> bool {
        let Some(credential) = identity.usable_credential().cloned() else {
            tracing::warn!(user = %identity.name, "issued identity carries no credential");
            self.bearer = None;
            self.message = INVALID_TOKEN_MESSAGE.to_string();
            self.transition(SessionState::Unauthenticated);
            return false;
        };

        if let Err(e) = self.storage.save(&credential) {
            tracing::warn!(error = %e, "failed to persist credential");
        }
        self.bearer = Some(credential);
        self.transition(SessionState::LocalOnly { local: identity });
        self.refresh_remote_identity().await;
        true
    }

    /// Fetch the directory record for the current local identity.
    ///
    /// Returns whether the session is authenticated afterwards. A failure is
    /// logged and leaves the state as it was; retrying is up to the caller.
    pub async fn refresh_remote_identity(&mut self) -> bool {
        let Some(local) = self.state.local_identity().cloned() else {
            return false;
        };

        match self
            .directory
            .fetch_user(&local.authority, &local.name, self.bearer.as_ref())
            .await
        {
            Ok(remote) => {
                tracing::info!(user = %local.name, authority = %local.authority, "session authenticated");
                self.transition(SessionState::Authenticated { local, remote });
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user = %local.name,
                    authority = %local.authority,
                    "identity directory lookup failed"
                );
                self.is_authenticated()
            }
        }
    }

    /// End the session. Identities are dropped whatever the backend says.
    pub async fn logout(&mut self) {
        let bearer = self.bearer.take();
        let result = self.primary.logout(bearer.as_ref()).await;

        match result {
            Ok(()) => {
                self.message.clear();
                self.clear_storage();
            }
            Err(e) => {
                tracing::warn!(error = %e, policy = %self.logout_policy, "logout failed");
                self.message = e.user_message();
                if self.logout_policy == LogoutPolicy::ClearOnFailure {
                    self.clear_storage();
                }
            }
        }
        self.transition(SessionState::Unauthenticated);
    }

    pub async fn send_reset_link(&mut self, email: &str) -> bool {
        self.loading = true;
        self.publish();
        let result = self.primary.send_reset_link(email).await;
        self.finish_pass_through(result, RESET_LINK_SENT_MESSAGE)
    }

    pub async fn reset_password(&mut self, reset: &PasswordReset) -> bool {
        self.loading = true;
        self.publish();
        let result = self.primary.reset_password(reset).await;
        self.finish_pass_through(result, PASSWORD_UPDATED_MESSAGE)
    }

    fn finish_pass_through(&mut self, result: Result<(), BackendError>, success: &str) -> bool {
        self.loading = false;
        let ok = match result {
            Ok(()) => {
                self.message = success.to_string();
                true
            }
            Err(e) => {
                self.message = e.user_message();
                false
            }
        };
        self.publish();
        ok
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn local_identity(&self) -> Option<&LocalIdentity> {
        self.state.local_identity()
    }

    pub fn remote_identity(&self) -> Option<&RemoteIdentity> {
        match &self.state {
            SessionState::Authenticated { remote, .. } => Some(remote),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// False until `start` has run and while a stored credential is still
    /// being validated.
    pub fn should_render(&self) -> bool {
        !self.resuming && self.state != SessionState::Unresolved
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn is_guest(&self) -> bool {
        !self.is_authenticated()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.kind(),
            authenticated: self.is_authenticated(),
            loading: self.loading,
            message: self.message.clone(),
            render_ready: self.should_render(),
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state.kind(), to = %next.kind(), "session transition");
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear stored credential");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn identity(token: Option<&str>) -> LocalIdentity {
        LocalIdentity {
            name: "alice".into(),
            email: "alice@example.org".into(),
            authority: "lab".into(),
            credential: token.map(Credential::new),
            extra: Default::default(),
        }
    }

    fn remote() -> RemoteIdentity {
        RemoteIdentity::new(json!({"metadata": {"name": "alice"}}))
    }

    struct MockPrimary {
        login: Result<LocalIdentity, BackendError>,
        whoami: Result<LocalIdentity, BackendError>,
        logout: Result<(), BackendError>,
        pass_through: Result<(), BackendError>,
        calls: Mutex<Vec<String>>,
        bearers: Mutex<Vec<Option<Credential>>>,
        /// When set, whoami records the snapshot visible while it is in flight.
        observer: Mutex<Option<watch::Receiver<SessionSnapshot>>>,
        seen_during_whoami: Mutex<Option<SessionSnapshot>>,
    }

    impl MockPrimary {
        fn ok() -> Self {
            Self {
                login: Ok(identity(Some("abc"))),
                whoami: Ok(identity(Some("abc"))),
                logout: Ok(()),
                pass_through: Ok(()),
                calls: Mutex::new(Vec::new()),
                bearers: Mutex::new(Vec::new()),
                observer: Mutex::new(None),
                seen_during_whoami: Mutex::new(None),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn note(&self, call: &str, bearer: Option<&Credential>) {
            self.calls.lock().unwrap().push(call.to_string());
            self.bearers.lock().unwrap().push(bearer.cloned());
        }
    }

    #[async_trait]
    impl PrimaryBackend for MockPrimary {
        async fn login(&self, _email: &str, _password: &str) -> Result<LocalIdentity, BackendError> {
            self.note("login", None);
            self.login.clone()
        }

        async fn whoami(&self, bearer: &Credential) -> Result<LocalIdentity, BackendError> {
            self.note("whoami", Some(bearer));
            if let Some(rx) = self.observer.lock().unwrap().as_ref() {
                *self.seen_during_whoami.lock().unwrap() = Some(rx.borrow().clone());
            }
            self.whoami.clone()
        }

        async fn logout(&self, bearer: Option<&Credential>) -> Result<(), BackendError> {
            self.note("logout", bearer);
            self.logout.clone()
        }

        async fn send_reset_link(&self, _email: &str) -> Result<(), BackendError> {
            self.note("send_reset_link", None);
            self.pass_through.clone()
        }

        async fn reset_password(&self, _reset: &PasswordReset) -> Result<(), BackendError> {
            self.note("reset_password", None);
            self.pass_through.clone()
        }
    }

    struct MockDirectory {
        result: Mutex<Result<RemoteIdentity, BackendError>>,
        requests: Mutex<Vec<(String, String, Option<Credential>)>>,
    }

    impl MockDirectory {
        fn returning(result: Result<RemoteIdentity, BackendError>) -> Self {
            Self {
                result: Mutex::new(result),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn set(&self, result: Result<RemoteIdentity, BackendError>) {
            *self.result.lock().unwrap() = result;
        }
    }

    #[async_trait]
    impl IdentityDirectory for MockDirectory {
        async fn fetch_user(
            &self,
            authority: &str,
            name: &str,
            bearer: Option<&Credential>,
        ) -> Result<RemoteIdentity, BackendError> {
            self.requests
                .lock()
                .unwrap()
                .push((authority.to_string(), name.to_string(), bearer.cloned()));
            self.result.lock().unwrap().clone()
        }
    }

    struct Harness {
        primary: Arc<MockPrimary>,
        directory: Arc<MockDirectory>,
        storage: Arc<MemoryStorage>,
        controller: SessionController,
    }

    fn harness(primary: MockPrimary, directory: MockDirectory, storage: MemoryStorage) -> Harness {
        let primary = Arc::new(primary);
        let directory = Arc::new(directory);
        let storage = Arc::new(storage);
        let controller = SessionController::new(primary.clone(), directory.clone(), storage.clone());
        Harness {
            primary,
            directory,
            storage,
            controller,
        }
    }

    fn default_harness() -> Harness {
        harness(
            MockPrimary::ok(),
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::new(),
        )
    }

    fn unreachable() -> BackendError {
        BackendError::Unreachable("connection refused".into())
    }

    #[tokio::test]
    async fn test_initial_state_is_unresolved_guest() {
        let h = default_harness();
        assert_eq!(h.controller.state(), &SessionState::Unresolved);
        assert!(h.controller.is_guest());
        assert!(!h.controller.is_loading());
    }

    #[tokio::test]
    async fn test_start_without_stored_credential_makes_no_calls() {
        let mut h = default_harness();
        h.controller.start().await;
        assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
        assert!(!h.controller.is_loading());
        assert!(h.controller.should_render());
        assert!(h.primary.calls().is_empty());
        assert!(h.directory.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_with_valid_stored_credential_authenticates() {
        let mut h = harness(
            MockPrimary::ok(),
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("abc")),
        );
        h.controller.start().await;
        assert!(h.controller.is_authenticated());
        assert_eq!(
            h.primary.bearers.lock().unwrap()[0],
            Some(Credential::new("abc"))
        );
        assert_eq!(h.controller.remote_identity(), Some(&remote()));
    }

    #[tokio::test]
    async fn test_start_with_rejected_credential_clears_storage() {
        let primary = MockPrimary {
            whoami: Err(BackendError::Response {
                status: 401,
                message: "Unauthenticated.".into(),
            }),
            ..MockPrimary::ok()
        };
        let mut h = harness(
            primary,
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("stale")),
        );
        h.controller.start().await;
        assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
        assert!(h.storage.load().unwrap().is_none());
        assert!(!h.controller.is_loading());
        assert!(h.controller.should_render());
        assert_eq!(h.controller.message(), "");
    }

    #[tokio::test]
    async fn test_start_with_identity_lacking_credential_clears_storage() {
        let primary = MockPrimary {
            whoami: Ok(identity(None)),
            ..MockPrimary::ok()
        };
        let mut h = harness(
            primary,
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("abc")),
        );
        h.controller.start().await;
        assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
        assert_eq!(h.controller.message(), INVALID_TOKEN_MESSAGE);
        assert!(h.storage.load().unwrap().is_none());

        h.controller.start().await;
        assert_eq!(h.primary.calls(), vec!["whoami".to_string()]);
    }

    #[tokio::test]
    async fn test_nothing_renders_before_start() {
        let h = harness(
            MockPrimary::ok(),
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("abc")),
        );
        assert!(!h.controller.should_render());
        assert!(!h.controller.subscribe().borrow().render_ready);
        assert!(!h.controller.snapshot().render_ready);
    }

    #[tokio::test]
    async fn test_render_guard_holds_while_stored_credential_validates() {
        let mut h = harness(
            MockPrimary::ok(),
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("abc")),
        );
        *h.primary.observer.lock().unwrap() = Some(h.controller.subscribe());
        h.controller.start().await;

        let during = h.primary.seen_during_whoami.lock().unwrap().clone().unwrap();
        assert_eq!(during.state, SessionStateKind::Validating);
        assert!(during.loading);
        assert!(!during.render_ready);

        let after = h.controller.snapshot();
        assert!(after.render_ready);
        assert!(!after.loading);
        assert!(h.controller.should_render());
    }

    #[tokio::test]
    async fn test_start_with_unreachable_backend_also_clears_storage() {
        let primary = MockPrimary {
            whoami: Err(unreachable()),
            ..MockPrimary::ok()
        };
        let mut h = harness(
            primary,
            MockDirectory::returning(Ok(remote())),
            MemoryStorage::with_credential(Credential::new("abc")),
        );
        h.controller.start().await;
        assert!(h.storage.load().unwrap().is_none());
        assert!(h.controller.is_guest());
    }

    #[tokio::test]
    async fn test_login_then_fetch_authenticates() {
        let mut h = default_harness();
        h.controller.login("alice@example.org", "secret").await;

        assert!(h.controller.is_authenticated());
        assert_eq!(h.storage.load().unwrap(), Some(Credential::new("abc")));
        let requests = h.directory.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            ("lab".to_string(), "alice".to_string(), Some(Credential::new("abc")))
        );
    }

    #[tokio::test]
    async fn test_directory_failure_leaves_local_only() {
        let mut h = harness(
            MockPrimary::ok(),
            MockDirectory::returning(Err(BackendError::Response {
                status: 404,
                message: "users \"alice\" not found".into(),
            })),
            MemoryStorage::new(),
        );
        h.controller.login("alice@example.org", "secret").await;

        assert!(matches!(h.controller.state(), SessionState::LocalOnly { .. }));
        assert!(!h.controller.is_authenticated());
        assert_eq!(h.controller.message(), "");
        assert_eq!(h.directory.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_directory_recovers() {
        let mut h = harness(
            MockPrimary::ok(),
            MockDirectory::returning(Err(unreachable())),
            MemoryStorage::new(),
        );
        h.controller.login("alice@example.org", "secret").await;
        assert!(!h.controller.is_authenticated());

        h.directory.set(Ok(remote()));
        assert!(h.controller.refresh_remote_identity().await);
        assert!(h.controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_local_identity_is_noop() {
        let mut h = default_harness();
        assert!(!h.controller.refresh_remote_identity().await);
        assert!(h.directory.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identity_without_credential_is_invalid_token() {
        let primary = MockPrimary {
            login: Ok(identity(None)),
            ..MockPrimary::ok()
        };
        let mut h = harness(primary, MockDirectory::returning(Ok(remote())), MemoryStorage::new());
        h.controller.login("alice@example.org", "secret").await;

        assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
        assert_eq!(h.controller.message(), "invalid token");
        assert!(h.storage.load().unwrap().is_none());
        assert!(h.directory.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identity_with_empty_credential_is_invalid_token() {
        let mut h = default_harness();
        h.controller.accept_identity(identity(Some(""))).await;
        assert_eq!(h.controller.message(), INVALID_TOKEN_MESSAGE);
        assert!(h.storage.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failure_messages_follow_three_tiers() {
        let cases = [
            (
                BackendError::Response {
                    status: 422,
                    message: "These credentials do not match our records.".into(),
                },
                "These credentials do not match our records.",
            ),
            (
                BackendError::Response {
                    status: 500,
                    message: String::new(),
                },
                "",
            ),
            (unreachable(), "server is not responding, try later"),
            (BackendError::ClientConstruction("bad url".into()), "client error"),
        ];
        for (error, expected) in cases {
            let primary = MockPrimary {
                login: Err(error),
                ..MockPrimary::ok()
            };
            let mut h = harness(primary, MockDirectory::returning(Ok(remote())), MemoryStorage::new());
            h.controller.login("alice@example.org", "wrong").await;
            assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
            assert_eq!(h.controller.message(), expected);
            assert!(!h.controller.is_loading());
        }
    }

    #[tokio::test]
    async fn test_new_login_attempt_clears_previous_message() {
        let mut h = default_harness();
        h.controller.accept_identity(identity(None)).await;
        assert_eq!(h.controller.message(), "invalid token");
        h.controller.login("alice@example.org", "secret").await;
        assert_eq!(h.controller.message(), "");
    }

    #[tokio::test]
    async fn test_logout_success_clears_identity_and_storage() {
        let mut h = default_harness();
        h.controller.login("alice@example.org", "secret").await;
        h.controller.logout().await;

        assert_eq!(h.controller.state(), &SessionState::Unauthenticated);
        assert!(h.controller.local_identity().is_none());
        assert!(h.storage.load().unwrap().is_none());
        let bearers = h.primary.bearers.lock().unwrap();
        assert_eq!(bearers.last().unwrap(), &Some(Credential::new("abc")));
    }

    #[tokio::test]
    async fn test_logout_failure_retains_stored_credential_by_default() {
        let primary = MockPrimary {
            logout: Err(unreachable()),
            ..MockPrimary::ok()
        };
        let mut h = harness(primary, MockDirectory::returning(Ok(remote())), MemoryStorage::new());
        h.controller.login("alice@example.org", "secret").await;
        h.controller.logout().await;

        assert!(h.controller.local_identity().is_none());
        assert!(h.controller.is_guest());
        assert_eq!(h.controller.message(), "server is not responding, try later");
        assert_eq!(h.storage.load().unwrap(), Some(Credential::new("abc")));
    }

    #[tokio::test]
    async fn test_logout_failure_clears_storage_when_configured() {
        let primary = Arc::new(MockPrimary {
            logout: Err(BackendError::Response {
                status: 500,
                message: "Server Error".into(),
            }),
            ..MockPrimary::ok()
        });
        let storage = Arc::new(MemoryStorage::new());
        let mut controller = SessionController::new(
            primary,
            Arc::new(MockDirectory::returning(Ok(remote()))),
            storage.clone(),
        )
        .with_logout_policy(LogoutPolicy::ClearOnFailure);

        controller.login("alice@example.org", "secret").await;
        controller.logout().await;

        assert_eq!(controller.message(), "Server Error");
        assert!(storage.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bearer_is_not_reused_after_logout() {
        let mut h = default_harness();
        h.controller.login("alice@example.org", "secret").await;
        h.controller.logout().await;
        h.controller.logout().await;

        let bearers = h.primary.bearers.lock().unwrap();
        assert_eq!(bearers.last().unwrap(), &None);
    }

    #[tokio::test]
    async fn test_pass_through_messages() {
        let mut h = default_harness();
        assert!(h.controller.send_reset_link("alice@example.org").await);
        assert_eq!(h.controller.message(), RESET_LINK_SENT_MESSAGE);

        let reset = PasswordReset {
            email: "alice@example.org".into(),
            token: "t".into(),
            password: "p".into(),
            password_confirmation: "p".into(),
        };
        assert!(h.controller.reset_password(&reset).await);
        assert_eq!(h.controller.message(), PASSWORD_UPDATED_MESSAGE);
        assert_eq!(h.controller.state(), &SessionState::Unresolved);
    }

    #[tokio::test]
    async fn test_pass_through_failure_uses_three_tier_message() {
        let primary = MockPrimary {
            pass_through: Err(BackendError::ClientConstruction("bad".into())),
            ..MockPrimary::ok()
        };
        let mut h = harness(primary, MockDirectory::returning(Ok(remote())), MemoryStorage::new());
        assert!(!h.controller.send_reset_link("alice@example.org").await);
        assert_eq!(h.controller.message(), "client error");
        assert!(!h.controller.is_loading());
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot() {
        let mut h = default_harness();
        let rx = h.controller.subscribe();
        h.controller.login("alice@example.org", "secret").await;

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.state, SessionStateKind::Authenticated);
        assert!(snapshot.authenticated);
        assert!(!snapshot.loading);
        assert!(snapshot.render_ready);
        assert_eq!(snapshot, h.controller.snapshot());
    }
}
