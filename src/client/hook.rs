//! Reactive session state for a UI shell.
//!
//! [`SessionHook`] derives the signed-in [`Session`] from the stored access
//! token and publishes it on a `watch` channel. Views subscribe and redraw on
//! every change; navigation to the login page goes through a [`Navigator`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::api::{AuthApi, LoginResponse, Registration};
use super::error::{ClientError, Result};
use super::refresh::RefreshCoordinator;
use super::session::{Session, session_from_token};
use crate::identity::User;

/// Route shown when the user has to sign in.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

/// Routes the UI to another page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator publishing the requested path on a watch channel.
pub struct WatchNavigator {
    tx: watch::Sender<Option<String>>,
}

impl WatchNavigator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// Last path navigated to.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }
}

impl Default for WatchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for WatchNavigator {
    fn navigate(&self, path: &str) {
        self.tx.send_replace(Some(path.to_string()));
    }
}

/// Authentication state as seen by views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Resolution in progress; views should not redirect yet.
    Loading,
    Authenticated(Session),
    Unauthenticated,
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }
}

pub struct SessionHook {
    coordinator: Arc<RefreshCoordinator>,
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    state: watch::Sender<AuthState>,
}

impl SessionHook {
    /// Starts in [`AuthState::Loading`]; call [`SessionHook::mount`] to resolve.
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _rx) = watch::channel(AuthState::Loading);
        Self {
            coordinator,
            api,
            navigator,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            state,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Resolve the initial state from storage.
    pub async fn mount(&self) -> AuthState {
        self.refresh_session().await
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Re-derive the session, renewing the access token when needed.
    pub async fn refresh_session(&self) -> AuthState {
        self.state.send_replace(AuthState::Loading);

        let state = match self.coordinator.ensure_valid_token().await {
            Some(token) => match session_from_token(&token) {
                Some(session) => AuthState::Authenticated(session),
                None => AuthState::Unauthenticated,
            },
            None => AuthState::Unauthenticated,
        };
        self.state.send_replace(state.clone());
        state
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let response = self.api.login(email, password).await?;
        let session = self.adopt(response)?;
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Session> {
        let response = self.api.register(registration).await?;
        let session = self.adopt(response)?;
        info!(user_id = %session.user.id, "Registered and signed in");
        Ok(session)
    }

    /// Sign out locally and on the server, then go to the login page.
    ///
    /// The server call is best effort; local state is cleared regardless.
    pub async fn logout(&self) {
        let store = self.coordinator.store();
        if let Some(token) = store.get() {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        self.coordinator.reset();
        store.clear();
        self.state.send_replace(AuthState::Unauthenticated);
        self.navigator.navigate(&self.login_path);
    }

    /// Redirect to login once resolution finished without a session.
    ///
    /// Returns whether the caller may render protected content.
    pub fn require_auth(&self) -> bool {
        match &*self.state.borrow() {
            AuthState::Authenticated(_) => true,
            AuthState::Loading => false,
            AuthState::Unauthenticated => {
                self.navigator.navigate(&self.login_path);
                false
            }
        }
    }

    fn adopt(&self, response: LoginResponse) -> Result<Session> {
        let Some(session) = session_from_token(&response.access_token) else {
            return Err(ClientError::MalformedToken);
        };

        self.coordinator.reset();
        self.coordinator.store().set(&response.access_token);
        self.state
            .send_replace(AuthState::Authenticated(session.clone()));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::client::store::{MemoryTokenStore, TokenStore};
    use crate::client::testing::{
        MockAuthApi, RenewalOutcome, TEST_PASSWORD, test_user, token_expiring_in,
    };

    struct Fixture {
        store: Arc<MemoryTokenStore>,
        api: Arc<MockAuthApi>,
        navigator: Arc<WatchNavigator>,
        hook: SessionHook,
    }

    fn fixture(store: MemoryTokenStore, api: MockAuthApi) -> Fixture {
        let store = Arc::new(store);
        let api = Arc::new(api);
        let navigator = Arc::new(WatchNavigator::new());
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), api.clone()));
        let hook = SessionHook::new(coordinator, api.clone(), navigator.clone());
        Fixture {
            store,
            api,
            navigator,
            hook,
        }
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());
        assert!(f.hook.state().is_loading());
        assert!(!f.hook.require_auth());
        assert_eq!(f.navigator.current(), None);
    }

    #[tokio::test]
    async fn test_mount_without_token_is_unauthenticated() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());

        let state = f.hook.mount().await;

        assert!(!state.is_loading());
        assert!(!state.is_authenticated());
        assert!(state.user().is_none());
        assert_eq!(f.api.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_mount_with_valid_token() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(3600)),
            MockAuthApi::new(),
        );

        let state = f.hook.mount().await;

        assert_eq!(state.user(), Some(&test_user()));
        assert!(f.hook.require_auth());
    }

    #[tokio::test]
    async fn test_mount_with_expired_token_renews() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(-5)),
            MockAuthApi::new(),
        );

        let state = f.hook.mount().await;

        assert!(state.is_authenticated());
        assert_eq!(f.api.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_mount_with_rejected_renewal_redirects() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(-5)),
            MockAuthApi::new().with_renewal(RenewalOutcome::Unauthorized),
        );

        assert!(!f.hook.mount().await.is_authenticated());
        assert_eq!(f.store.get(), None);
        assert!(!f.hook.require_auth());
        assert_eq!(f.navigator.current().as_deref(), Some(DEFAULT_LOGIN_PATH));
    }

    #[tokio::test]
    async fn test_login_publishes_session() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());
        let mut rx = f.hook.subscribe();

        let session = f
            .hook
            .login(&test_user().email, TEST_PASSWORD)
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().session(), Some(&session));
        assert_eq!(f.store.get(), Some(session.access_token));
    }

    #[tokio::test]
    async fn test_login_failure_keeps_state() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());
        f.hook.mount().await;

        let err = f.hook.login(&test_user().email, "wrong").await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication(_)));
        assert!(!f.hook.state().is_authenticated());
        assert_eq!(f.store.get(), None);
    }

    #[tokio::test]
    async fn test_register_conflict_surfaces_message() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());
        let registration = Registration {
            email: test_user().email,
            password: "hunter22".into(),
            name: "Dup".into(),
            role: None,
        };

        let err = f.hook.register(&registration).await.unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "a user with this email already exists");
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(3600)),
            MockAuthApi::new().with_failing_logout(),
        );
        f.hook.mount().await;

        f.hook.logout().await;

        assert_eq!(f.api.logout_calls(), 1);
        assert_eq!(f.store.get(), None);
        assert_eq!(f.hook.state(), AuthState::Unauthenticated);
        assert_eq!(f.navigator.current().as_deref(), Some(DEFAULT_LOGIN_PATH));
    }

    #[tokio::test]
    async fn test_logout_during_background_renewal_stays_signed_out() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(60)),
            MockAuthApi::new().with_delay(Duration::from_millis(50)),
        );
        // Inside the renewal window: mount starts a background renewal.
        assert!(f.hook.mount().await.is_authenticated());

        f.hook.logout().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(f.store.get(), None);
        assert!(!f.hook.refresh_session().await.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_during_background_renewal_keeps_new_token() {
        let f = fixture(
            MemoryTokenStore::with_token(token_expiring_in(60)),
            MockAuthApi::new().with_delay(Duration::from_millis(50)),
        );
        f.hook.mount().await;

        let session = f
            .hook
            .login(&test_user().email, TEST_PASSWORD)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(f.store.get(), Some(session.access_token));
    }

    #[tokio::test]
    async fn test_custom_login_path() {
        let f = fixture(MemoryTokenStore::new(), MockAuthApi::new());
        let hook = f.hook.with_login_path("/signin");

        hook.mount().await;
        hook.require_auth();

        assert_eq!(f.navigator.current().as_deref(), Some("/signin"));
    }
}
