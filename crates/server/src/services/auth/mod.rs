//! Account activation and credential authentication.
//!
//! [`AuthenticationService`] orchestrates the three public operations -
//! registration, activation, and authentication - over abstract stores,
//! the notifier, and the token signer.

mod error;
mod manager;

pub use error::AuthError;
pub use manager::AuthenticationManager;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng as SaltRng},
};
use chrono::{Duration, Utc};
use rand::{Rng as _, TryRngCore as _, rngs::OsRng};

use gatehouse_core::Email;

use crate::db::{ActivationTokenStore, CredentialStore, RepositoryError, RoleStore};
use crate::models::token::NewActivationToken;
use crate::models::user::{NewUser, User};
use crate::services::email::{EmailTemplate, Notifier};
use crate::services::jwt::{JwtService, SessionClaims};

/// Name of the role granted to every newly registered account.
const DEFAULT_ROLE: &str = "USER";

/// Subject line of the activation email.
const ACTIVATION_SUBJECT: &str = "Activate your account";

/// Activation-flow settings.
#[derive(Debug, Clone)]
pub struct ActivationSettings {
    /// Frontend URL where the code is entered, embedded in the email.
    pub activation_url: String,
    /// How long an issued code stays valid.
    pub token_validity: Duration,
    /// Number of digits in a generated code.
    pub code_length: usize,
}

/// Registration input. Field validation happens at the request boundary
/// before this struct is constructed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: Email,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Orchestrates registration, activation, and authentication.
pub struct AuthenticationService {
    users: Arc<dyn CredentialStore>,
    roles: Arc<dyn RoleStore>,
    tokens: Arc<dyn ActivationTokenStore>,
    notifier: Arc<dyn Notifier>,
    manager: AuthenticationManager,
    jwt: JwtService,
    settings: ActivationSettings,
}

impl AuthenticationService {
    /// Create a new service over the given collaborators.
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        roles: Arc<dyn RoleStore>,
        tokens: Arc<dyn ActivationTokenStore>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtService,
        settings: ActivationSettings,
    ) -> Self {
        let manager = AuthenticationManager::new(users.clone());
        Self {
            users,
            roles,
            tokens,
            notifier,
            manager,
            jwt,
            settings,
        }
    }

    /// Register a new account.
    ///
    /// Creates a disabled user holding the default role, issues an
    /// activation token, and schedules the activation email. The code
    /// is only ever delivered out of band - it is not returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RoleNotFound` if the default role is missing
    /// from the store (a deployment defect), `AuthError::Repository` on
    /// store failures, and `AuthError::Notification` if the activation
    /// email cannot be scheduled.
    pub async fn register(&self, registration: Registration) -> Result<(), AuthError> {
        let role = self
            .roles
            .find_by_name(DEFAULT_ROLE)
            .await?
            .ok_or_else(|| AuthError::RoleNotFound(DEFAULT_ROLE.to_owned()))?;

        let password_hash = hash_password(&registration.password)?;

        let user = self
            .users
            .save(NewUser {
                email: registration.email,
                password_hash,
                first_name: registration.first_name,
                last_name: registration.last_name,
                enabled: false,
                account_locked: false,
                roles: vec![role],
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");

        self.send_activation_email(&user).await
    }

    /// Consume an activation code.
    ///
    /// On success the account is enabled and the token consumed, in that
    /// order. An expired code triggers re-issuance: a fresh token is
    /// saved and mailed to the same user, and the call still fails with
    /// `AuthError::TokenExpired` so the caller knows to use the new code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenNotFound`, `AuthError::TokenAlreadyValidated`,
    /// or `AuthError::TokenExpired` per the state machine; store and
    /// notifier failures propagate.
    pub async fn activate(&self, code: &str) -> Result<(), AuthError> {
        let token = self
            .tokens
            .find_by_code(code)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if token.validated_at.is_some() {
            return Err(AuthError::TokenAlreadyValidated);
        }

        let now = Utc::now();
        let mut user = self.users.find_by_id(token.user_id).await?.ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "token {} references missing user {}",
                token.id, token.user_id
            ))
        })?;

        if token.is_expired(now) {
            // The stale token stays expired for good; the user gets a
            // fresh code with a fresh window.
            tracing::info!(user_id = %user.id, "activation code expired, re-issuing");
            self.send_activation_email(&user).await?;
            return Err(AuthError::TokenExpired);
        }

        // Enable the user before consuming the token so a failed second
        // write cannot leave a validated token on a disabled account.
        user.enabled = true;
        self.users.update(&user).await?;

        match self.tokens.mark_validated(token.id, now).await {
            Err(RepositoryError::Conflict(_)) => Err(AuthError::TokenAlreadyValidated),
            other => {
                tracing::info!(user_id = %user.id, "account activated");
                other.map_err(AuthError::from)
            }
        }
    }

    /// Exchange credentials for a signed session token.
    ///
    /// Credential verification is delegated to the
    /// [`AuthenticationManager`]; on success the claims (email, role
    /// names, display name) are assembled and signed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BadCredentials`, `AuthError::AccountDisabled`,
    /// or `AuthError::AccountLocked` from verification, and
    /// `AuthError::Jwt` if signing fails.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self.manager.authenticate(email, password).await?;

        let claims = SessionClaims {
            email: user.email.to_string(),
            roles: user.role_names(),
            fullname: user.full_name(),
        };
        let token = self.jwt.generate_token(claims, &user)?;

        tracing::info!(user_id = %user.id, "user authenticated");
        Ok(token)
    }

    async fn send_activation_email(&self, user: &User) -> Result<(), AuthError> {
        let code = self.issue_activation_token(user).await?;

        self.notifier
            .send(
                &user.email,
                &user.full_name(),
                EmailTemplate::ActivateAccount,
                &self.settings.activation_url,
                &code,
                ACTIVATION_SUBJECT,
            )
            .await?;

        Ok(())
    }

    /// Issue a fresh activation token for `user` and return its code.
    ///
    /// No uniqueness is enforced across outstanding codes; concurrently
    /// issued tokens are all independently valid until consumed or
    /// expired.
    async fn issue_activation_token(&self, user: &User) -> Result<String, AuthError> {
        let code = generate_activation_code(self.settings.code_length);
        let now = Utc::now();

        self.tokens
            .save(NewActivationToken {
                code: code.clone(),
                created_at: now,
                expires_at: now + self.settings.token_validity,
                user_id: user.id,
            })
            .await?;

        Ok(code)
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut SaltRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Generate a fixed-length numeric activation code.
///
/// Each digit is drawn independently and uniformly from the operating
/// system CSPRNG. Codes are short-lived shared secrets; a seeded
/// general-purpose PRNG is not acceptable here.
fn generate_activation_code(length: usize) -> String {
    let mut rng = OsRng.unwrap_err();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::*;
    use crate::db::memory::{
        MemoryActivationTokenStore, MemoryCredentialStore, MemoryRoleStore,
    };
    use crate::services::email::NotificationError;

    #[derive(Debug, Clone)]
    struct SentEmail {
        to: String,
        display_name: String,
        code: String,
    }

    /// Notifier double that records every scheduled email.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<SentEmail>>,
        failing: AtomicBool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            to: &Email,
            display_name: &str,
            _template: EmailTemplate,
            _activation_url: &str,
            activation_code: &str,
            _subject: &str,
        ) -> Result<(), NotificationError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(NotificationError::InvalidAddress(to.to_string()));
            }

            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                display_name: display_name.to_owned(),
                code: activation_code.to_owned(),
            });
            Ok(())
        }
    }

    struct Harness {
        service: AuthenticationService,
        users: Arc<MemoryCredentialStore>,
        tokens: Arc<MemoryActivationTokenStore>,
        notifier: Arc<RecordingNotifier>,
        jwt: JwtService,
    }

    const TEST_SECRET: &str = "a-test-only-signing-secret-of-decent-length";

    fn harness() -> Harness {
        harness_with_roles(MemoryRoleStore::with_roles(&["USER"]))
    }

    fn harness_with_roles(roles: MemoryRoleStore) -> Harness {
        let users = Arc::new(MemoryCredentialStore::new());
        let tokens = Arc::new(MemoryActivationTokenStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let service = AuthenticationService::new(
            users.clone(),
            Arc::new(roles),
            tokens.clone(),
            notifier.clone(),
            JwtService::new(
                SecretString::from(TEST_SECRET.to_owned()),
                Duration::minutes(60),
            ),
            ActivationSettings {
                activation_url: "https://example.com/activate".to_owned(),
                token_validity: Duration::minutes(15),
                code_length: 6,
            },
        );

        Harness {
            service,
            users,
            tokens,
            notifier,
            jwt: JwtService::new(
                SecretString::from(TEST_SECRET.to_owned()),
                Duration::minutes(60),
            ),
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: Email::parse(email).unwrap(),
            password: "correct horse".to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
        }
    }

    #[test]
    fn test_activation_code_format() {
        for _ in 0..100 {
            let code = generate_activation_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_activation_code_honors_length() {
        assert_eq!(generate_activation_code(4).len(), 4);
        assert_eq!(generate_activation_code(8).len(), 8);
    }

    #[tokio::test]
    async fn test_register_creates_disabled_user_token_and_notification() {
        let h = harness();

        h.service.register(registration("ada@example.com")).await.unwrap();

        let user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .expect("user persisted");
        assert!(!user.enabled);
        assert!(!user.account_locked);
        assert_eq!(user.role_names(), vec!["USER".to_owned()]);

        let tokens = h.tokens.all();
        assert_eq!(tokens.len(), 1);
        let token = &tokens[0];
        assert!(token.validated_at.is_none());
        assert_eq!(token.user_id, user.id);
        assert_eq!(token.expires_at, token.created_at + Duration::minutes(15));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].display_name, "Ada Lovelace");
        assert_eq!(sent[0].code, token.code);
        assert_eq!(sent[0].code.len(), 6);
    }

    #[tokio::test]
    async fn test_register_without_role_is_a_config_error() {
        let h = harness_with_roles(MemoryRoleStore::empty());

        let err = h
            .service
            .register(registration("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RoleNotFound(ref name) if name == "USER"));
        assert!(h.tokens.all().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_register_notification_failure_propagates() {
        let h = harness();
        h.notifier.set_failing(true);

        let err = h
            .service
            .register(registration("ada@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Notification(_)));
    }

    #[tokio::test]
    async fn test_activate_enables_user_and_consumes_token_once() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let code = h.notifier.sent()[0].code.clone();

        h.service.activate(&code).await.unwrap();

        let user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(user.enabled);

        let tokens = h.tokens.all();
        assert!(tokens[0].validated_at.is_some());

        // replaying the consumed code must fail
        let err = h.service.activate(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenAlreadyValidated));
    }

    #[tokio::test]
    async fn test_activate_unknown_code_mutates_nothing() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();

        let err = h.service.activate("000000").await.unwrap_err();

        assert!(matches!(err, AuthError::TokenNotFound));
        assert_eq!(h.tokens.all().len(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
        let user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(!user.enabled);
    }

    #[tokio::test]
    async fn test_activate_expired_code_reissues_and_fresh_code_works() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let first_code = h.notifier.sent()[0].code.clone();

        h.tokens.force_expire(&first_code);

        let err = h.service.activate(&first_code).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));

        // the stale token is never revived or retroactively validated,
        // and the re-issue is a distinct token
        let tokens = h.tokens.all();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].validated_at.is_none());
        assert_ne!(tokens[1].id, tokens[0].id);

        // the user is still disabled and got exactly one more email
        let user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(!user.enabled);
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);

        // the fresh token has a fresh window and a fresh code path
        let second_code = sent[1].code.clone();
        assert!(tokens[1].expires_at > Utc::now());

        h.service.activate(&second_code).await.unwrap();
        let user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(user.enabled);
    }

    #[tokio::test]
    async fn test_activate_expired_resend_failure_propagates() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let code = h.notifier.sent()[0].code.clone();

        h.tokens.force_expire(&code);
        h.notifier.set_failing(true);

        let err = h.service.activate(&code).await.unwrap_err();
        assert!(matches!(err, AuthError::Notification(_)));
    }

    #[tokio::test]
    async fn test_authenticate_returns_signed_claims() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let code = h.notifier.sent()[0].code.clone();
        h.service.activate(&code).await.unwrap();

        let token = h
            .service
            .authenticate("ada@example.com", "correct horse")
            .await
            .unwrap();

        let claims = h.jwt.decode_token(&token).unwrap();
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.roles, vec!["USER".to_owned()]);
        assert_eq!(claims.fullname, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let code = h.notifier.sent()[0].code.clone();
        h.service.activate(&code).await.unwrap();

        let err = h
            .service
            .authenticate("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_email() {
        let h = harness();

        let err = h
            .service
            .authenticate("nobody@example.com", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
    }

    #[tokio::test]
    async fn test_disabled_account_never_authenticates() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();

        // correct password, but the account was never activated
        let err = h
            .service
            .authenticate("ada@example.com", "correct horse")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled));
    }

    #[tokio::test]
    async fn test_locked_account_reported_even_with_wrong_password() {
        let h = harness();
        h.service.register(registration("ada@example.com")).await.unwrap();
        let code = h.notifier.sent()[0].code.clone();
        h.service.activate(&code).await.unwrap();

        let mut user = h
            .users
            .find_by_email(&Email::parse("ada@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        user.account_locked = true;
        h.users.update(&user).await.unwrap();

        let err = h
            .service
            .authenticate("ada@example.com", "correct horse")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked));

        let err = h
            .service
            .authenticate("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked));
    }
}
