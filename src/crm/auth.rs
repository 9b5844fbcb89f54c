//! Minimal session layer: password accounts, bearer tokens and a broadcast
//! stream of sign-in / sign-out events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::repository::{CrmStore, NewProfile};
use crate::errors::CrmError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub account_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    SignedIn(Session),
    /// One token ended. `last_session` is true when the account has no
    /// other live token left.
    SignedOut {
        account_id: String,
        token: String,
        last_session: bool,
    },
}

pub struct SessionStore {
    store: Arc<dyn CrmStore>,
    sessions: Mutex<HashMap<String, Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Create a profile and sign it in. The store makes the first account
    /// ever registered admin and rejects duplicate emails atomically.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Session, CrmError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CrmError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let password_hash = hash_password(password)?;
        let profile = self
            .store
            .create_profile(NewProfile {
                email: email.clone(),
                name: name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
                role: None,
                password_hash,
            })
            .await?;

        info!(account_id = %profile.id, "Account registered");
        Ok(self.open_session(profile.id, profile.email))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, CrmError> {
        let email = normalize_email(email)?;
        let profile = self
            .store
            .find_profile_by_email(&email)
            .await?
            .ok_or(CrmError::InvalidCredentials)?;
        if !verify_password(password, &profile.password_hash) {
            warn!(account_id = %profile.id, "Rejected login attempt");
            return Err(CrmError::InvalidCredentials);
        }
        Ok(self.open_session(profile.id, profile.email))
    }

    /// End a session. Returns false when the token was not known.
    pub fn logout(&self, token: &str) -> Result<bool, CrmError> {
        let mut sessions = self.sessions.lock().map_err(|_| CrmError::LockPoisoned)?;
        let Some(session) = sessions.remove(token) else {
            return Ok(false);
        };
        let last_session = !sessions
            .values()
            .any(|s| s.account_id == session.account_id);
        drop(sessions);

        info!(account_id = %session.account_id, last_session, "Signed out");
        let _ = self.events.send(SessionEvent::SignedOut {
            account_id: session.account_id,
            token: session.token,
            last_session,
        });
        Ok(true)
    }

    pub fn resolve(&self, token: &str) -> Result<Session, CrmError> {
        self.sessions
            .lock()
            .map_err(|_| CrmError::LockPoisoned)?
            .get(token)
            .cloned()
            .ok_or(CrmError::Unauthorized)
    }

    /// Drop every session of an account, e.g. after its profile was removed.
    pub fn revoke_account(&self, account_id: &str) -> Result<usize, CrmError> {
        let mut sessions = self.sessions.lock().map_err(|_| CrmError::LockPoisoned)?;
        let tokens: Vec<String> = sessions
            .values()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.token.clone())
            .collect();
        for token in &tokens {
            sessions.remove(token);
        }
        drop(sessions);
        for token in &tokens {
            let _ = self.events.send(SessionEvent::SignedOut {
                account_id: account_id.to_string(),
                token: token.clone(),
                last_session: true,
            });
        }
        Ok(tokens.len())
    }

    fn open_session(&self, account_id: String, email: String) -> Session {
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            account_id,
            email,
        };
        match self.sessions.lock() {
            Ok(mut sessions) => {
                sessions.insert(session.token.clone(), session.clone());
            }
            Err(poisoned) => {
                poisoned
                    .into_inner()
                    .insert(session.token.clone(), session.clone());
            }
        }
        let _ = self.events.send(SessionEvent::SignedIn(session.clone()));
        session
    }
}

fn normalize_email(email: &str) -> Result<String, CrmError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(CrmError::Validation(format!(
            "Invalid email address: {}",
            email
        ))),
    }
}

/// Argon2id with a random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String, CrmError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CrmError::Database(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// False for a wrong password and for hashes that cannot sign in at all,
/// such as the empty hash of roster-only profiles.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            warn!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::db::{CrmDb, DbHandle};
    use crate::crm::repository::{ProfileRepository, SqliteStore};

    fn sessions() -> (SessionStore, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new(DbHandle::new(
            CrmDb::new_in_memory().unwrap(),
        )));
        (SessionStore::new(store.clone()), store)
    }

    #[test]
    fn test_hash_password_is_salted_phc() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(verify_password("secret", &a));
        assert!(verify_password("secret", &b));
        assert!(!verify_password("Secret", &a));
    }

    #[test]
    fn test_unusable_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("password", ""));
        assert!(!verify_password("password", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_roster_profile_cannot_sign_in() {
        let (auth, store) = sessions();
        store
            .create_profile(NewProfile {
                email: "roster@fera.io".into(),
                name: None,
                role: Some("sales".into()),
                password_hash: String::new(),
            })
            .await
            .unwrap();
        assert!(matches!(
            auth.login("roster@fera.io", "").await,
            Err(CrmError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (auth, store) = sessions();
        let session = auth
            .register("Alex@Fera.io", "hunter22", Some("Alex"))
            .await
            .unwrap();
        assert_eq!(session.email, "alex@fera.io");
        assert_eq!(auth.resolve(&session.token).unwrap(), session);

        let profile = store.get_profile(&session.account_id).await.unwrap().unwrap();
        assert_eq!(profile.role.as_deref(), Some("admin"));
        assert_ne!(profile.password_hash, "hunter22");
        assert!(profile.password_hash.starts_with("$argon2id$"));

        let again = auth.login("alex@fera.io", "hunter22").await.unwrap();
        assert_eq!(again.account_id, session.account_id);
        assert_ne!(again.token, session.token);
    }

    #[tokio::test]
    async fn test_second_account_is_not_admin() {
        let (auth, store) = sessions();
        auth.register("a@fera.io", "password", None).await.unwrap();
        let second = auth.register("b@fera.io", "password", None).await.unwrap();
        let profile = store.get_profile(&second.account_id).await.unwrap().unwrap();
        assert!(profile.role.is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (auth, _) = sessions();
        auth.register("a@fera.io", "password", None).await.unwrap();
        assert!(matches!(
            auth.login("a@fera.io", "wrong-one").await,
            Err(CrmError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@fera.io", "password").await,
            Err(CrmError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (auth, _) = sessions();
        assert!(matches!(
            auth.register("not-an-email", "password", None).await,
            Err(CrmError::Validation(_))
        ));
        assert!(matches!(
            auth.register("a@fera.io", "123", None).await,
            Err(CrmError::Validation(_))
        ));
        auth.register("a@fera.io", "password", None).await.unwrap();
        assert!(matches!(
            auth.register("A@fera.io", "password", None).await,
            Err(CrmError::EmailTaken { .. })
        ));
    }

    #[tokio::test]
    async fn test_logout_publishes_event() {
        let (auth, _) = sessions();
        let session = auth.register("a@fera.io", "password", None).await.unwrap();
        let mut rx = auth.subscribe();

        assert!(auth.logout(&session.token).unwrap());
        match rx.recv().await.unwrap() {
            SessionEvent::SignedOut {
                account_id,
                token,
                last_session,
            } => {
                assert_eq!(account_id, session.account_id);
                assert_eq!(token, session.token);
                assert!(last_session);
            }
            other => panic!("Expected SignedOut, got {:?}", other),
        }
        assert!(matches!(
            auth.resolve(&session.token),
            Err(CrmError::Unauthorized)
        ));
        assert!(!auth.logout(&session.token).unwrap());
    }

    #[tokio::test]
    async fn test_revoke_account_drops_all_tokens() {
        let (auth, _) = sessions();
        let s1 = auth.register("a@fera.io", "password", None).await.unwrap();
        let s2 = auth.login("a@fera.io", "password").await.unwrap();
        let mut rx = auth.subscribe();
        assert_eq!(auth.revoke_account(&s1.account_id).unwrap(), 2);
        assert!(auth.resolve(&s1.token).is_err());
        assert!(auth.resolve(&s2.token).is_err());

        let mut ended = Vec::new();
        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                SessionEvent::SignedOut {
                    token,
                    last_session,
                    ..
                } => {
                    assert!(last_session);
                    ended.push(token);
                }
                other => panic!("Expected SignedOut, got {:?}", other),
            }
        }
        ended.sort();
        let mut expected = vec![s1.token, s2.token];
        expected.sort();
        assert_eq!(ended, expected);
    }

    #[tokio::test]
    async fn test_logout_of_one_tab_keeps_other_sessions() {
        let (auth, _) = sessions();
        let s1 = auth.register("a@fera.io", "password", None).await.unwrap();
        let s2 = auth.login("a@fera.io", "password").await.unwrap();
        let mut rx = auth.subscribe();

        assert!(auth.logout(&s1.token).unwrap());
        match rx.recv().await.unwrap() {
            SessionEvent::SignedOut {
                token,
                last_session,
                ..
            } => {
                assert_eq!(token, s1.token);
                assert!(!last_session);
            }
            other => panic!("Expected SignedOut, got {:?}", other),
        }
        assert_eq!(auth.resolve(&s2.token).unwrap(), s2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_same_email() {
        let (auth, store) = sessions();
        let auth = Arc::new(auth);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move { auth.register("race@fera.io", "password", None).await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CrmError::EmailTaken { email }) => assert_eq!(email, "race@fera.io"),
                Err(other) => panic!("Expected EmailTaken, got {:?}", other),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list_profiles().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_registrations_yield_one_admin() {
        let (auth, store) = sessions();
        let auth = Arc::new(auth);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.register(&format!("user{}@fera.io", i), "password", None)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let profiles = store.list_profiles().await.unwrap();
        assert_eq!(profiles.len(), 4);
        let admins = profiles
            .iter()
            .filter(|p| p.role.as_deref() == Some("admin"))
            .count();
        assert_eq!(admins, 1);
    }
}
