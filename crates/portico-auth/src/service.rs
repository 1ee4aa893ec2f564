//! Account lifecycle and session management.
//!
//! [`AccountService`] owns the credential checks, the failed-login
//! lockout policy, and session issue/refresh/revoke. Login and logout
//! emit audit events directly because the HTTP layer cannot see which
//! account a failed attempt was aimed at.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use portico_audit::{AuditRecorder, NetworkContext};
use portico_core::AuthConfig;

use crate::error::AuthError;
use crate::model::{Session, User, UserStatus};
use crate::password::{hash_password, verify_password};
use crate::store::AuthStore;

/// Account and session operations backed by an [`AuthStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AuthStore>,
    recorder: AuditRecorder,
    policy: AuthConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn AuthStore>, recorder: AuditRecorder, policy: AuthConfig) -> Self {
        Self {
            store,
            recorder,
            policy,
        }
    }

    /// Create a new account in `pending_verification`.
    ///
    /// The email is trimmed and lowercased before storage so lookups are
    /// case-insensitive by construction.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let password_hash = hash_password(password)?;
        let user = User::new(email, password_hash);
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "registered account");
        Ok(user)
    }

    /// Verify credentials and issue a session.
    ///
    /// Order matters: the lockout gate runs before the password check so
    /// a locked account rejects even the correct password, and the
    /// status gate runs after it so callers cannot probe account states
    /// with arbitrary passwords. Every failure path emits a login
    /// failure audit event with the reason.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        net: &NetworkContext,
    ) -> Result<(User, Session), AuthError> {
        let email = normalize_email(email);
        let now = Utc::now();

        let Some(mut user) = self.store.user_by_email(&email).await? else {
            self.recorder.login_failed(Some(&email), "unknown email", net);
            return Err(AuthError::InvalidCredentials);
        };

        if user.is_locked(now) {
            self.recorder.login_failed(Some(&email), "account locked", net);
            return Err(AuthError::AccountLocked);
        }

        if !verify_password(password, &user.password_hash)? {
            user.failed_login_attempts += 1;
            if user.failed_login_attempts >= self.policy.max_failed_logins {
                user.locked_until = Some(now + Duration::minutes(self.policy.lockout_minutes));
                user.failed_login_attempts = 0;
                tracing::warn!(
                    user_id = %user.id,
                    minutes = self.policy.lockout_minutes,
                    "locking account after repeated failed logins"
                );
            }
            user.updated_at = now;
            self.store.update_user(&user).await?;
            self.recorder
                .login_failed(Some(&email), "invalid credentials", net);
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(err) = status_gate(&user) {
            self.recorder
                .login_failed(Some(&email), user.status.as_str(), net);
            return Err(err);
        }

        user.failed_login_attempts = 0;
        user.locked_until = None;
        user.last_login_at = Some(now);
        user.updated_at = now;
        self.store.update_user(&user).await?;

        let session = Session::issue(
            user.id,
            Duration::minutes(self.policy.session_ttl_minutes),
            Duration::minutes(self.policy.refresh_ttl_minutes),
            Some(net.ip.clone()),
            net.user_agent.clone(),
        );
        self.store.insert_session(&session).await?;

        self.recorder.login_succeeded(user.id, None, net);
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok((user, session))
    }

    /// Resolve a bearer token to its user.
    ///
    /// Expired sessions are deleted on sight, best effort. Only `active`
    /// accounts authenticate; suspending a user cuts off their existing
    /// sessions at the next request.
    pub async fn authenticate(&self, token: &str) -> Result<(User, Session), AuthError> {
        let Some(session) = self.store.session_by_token(token).await? else {
            return Err(AuthError::SessionInvalid);
        };

        let now = Utc::now();
        if session.is_expired(now) {
            if let Err(err) = self.store.delete_session(session.id).await {
                tracing::warn!(error = %err, "failed to drop expired session");
            }
            return Err(AuthError::SessionExpired);
        }

        let Some(user) = self.store.user_by_id(session.user_id).await? else {
            return Err(AuthError::SessionInvalid);
        };
        status_gate(&user)?;

        Ok((user, session))
    }

    /// Exchange a refresh token for a new session pair.
    ///
    /// Rotation is single use: the old session is deleted before the new
    /// one is returned, so a replayed refresh token reads as invalid.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        net: &NetworkContext,
    ) -> Result<(User, Session), AuthError> {
        let Some(session) = self.store.session_by_refresh_token(refresh_token).await? else {
            return Err(AuthError::SessionInvalid);
        };

        let now = Utc::now();
        if session.is_refresh_expired(now) {
            if let Err(err) = self.store.delete_session(session.id).await {
                tracing::warn!(error = %err, "failed to drop expired session");
            }
            return Err(AuthError::SessionExpired);
        }

        let Some(user) = self.store.user_by_id(session.user_id).await? else {
            return Err(AuthError::SessionInvalid);
        };
        status_gate(&user)?;

        self.store.delete_session(session.id).await?;
        let next = Session::issue(
            user.id,
            Duration::minutes(self.policy.session_ttl_minutes),
            Duration::minutes(self.policy.refresh_ttl_minutes),
            Some(net.ip.clone()),
            net.user_agent.clone(),
        );
        self.store.insert_session(&next).await?;

        tracing::debug!(user_id = %user.id, "rotated session");
        Ok((user, next))
    }

    /// Revoke the session behind a bearer token. Unknown tokens are a
    /// no-op so repeated logouts cannot fail.
    pub async fn logout(&self, token: &str, net: &NetworkContext) -> Result<(), AuthError> {
        let Some(session) = self.store.session_by_token(token).await? else {
            return Ok(());
        };
        self.store.delete_session(session.id).await?;
        self.recorder.logged_out(session.user_id, net);
        tracing::info!(user_id = %session.user_id, "logged out");
        Ok(())
    }

    /// Mark an email address verified. A `pending_verification` account
    /// becomes `active`; other statuses keep their status and only gain
    /// the verified flag.
    pub async fn verify_email(&self, user_id: Uuid) -> Result<User, AuthError> {
        let Some(mut user) = self.store.user_by_id(user_id).await? else {
            return Err(AuthError::NotFound(format!("user {user_id}")));
        };
        user.email_verified = true;
        if user.status == UserStatus::PendingVerification {
            user.status = UserStatus::Active;
        }
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    /// Administrative status change. Setting `active` also clears any
    /// lockout, so it doubles as a manual unlock.
    pub async fn set_status(&self, user_id: Uuid, status: UserStatus) -> Result<User, AuthError> {
        let Some(mut user) = self.store.user_by_id(user_id).await? else {
            return Err(AuthError::NotFound(format!("user {user_id}")));
        };
        user.status = status;
        if status == UserStatus::Active {
            user.locked_until = None;
            user.failed_login_attempts = 0;
        }
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, status = %user.status, "account status updated");
        Ok(user)
    }

    /// Drop sessions whose refresh window has passed. Called on an
    /// interval by the server.
    pub async fn sweep_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.store.purge_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired sessions");
        }
        Ok(removed)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn status_gate(user: &User) -> Result<(), AuthError> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::PendingVerification => Err(AuthError::AccountNotVerified),
        UserStatus::Inactive | UserStatus::Suspended => {
            Err(AuthError::AccountDisabled(user.status.as_str().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAuthStore;
    use portico_audit::{AuditAction, AuditFilter, AuditOutcome, AuditStore, MemoryStore, RecordDetail};

    const PASSWORD: &str = "correct horse battery staple";

    struct Fixture {
        store: Arc<MemoryAuthStore>,
        audit: Arc<MemoryStore>,
        service: AccountService,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_policy(AuthConfig {
                max_failed_logins: 3,
                ..AuthConfig::default()
            })
        }

        fn with_policy(policy: AuthConfig) -> Self {
            let store = Arc::new(MemoryAuthStore::new());
            let audit = Arc::new(MemoryStore::new());
            let recorder = AuditRecorder::new(audit.clone(), 64);
            let service = AccountService::new(store.clone(), recorder, policy);
            Self {
                store,
                audit,
                service,
            }
        }

        async fn active_user(&self, email: &str) -> User {
            let user = self.service.register(email, PASSWORD).await.unwrap();
            self.service.verify_email(user.id).await.unwrap()
        }

        async fn login_records(&self) -> Vec<portico_audit::AuditRecord> {
            self.service.recorder.flush().await;
            self.audit
                .query(AuditFilter {
                    action: Some(AuditAction::Login),
                    ..AuditFilter::default()
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_unverified_account_cannot_login() {
        let fx = Fixture::new();
        fx.service.register("new@example.com", PASSWORD).await.unwrap();

        let err = fx
            .service
            .login("new@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountNotVerified));
    }

    #[tokio::test]
    async fn test_login_issues_session_and_records_success() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;

        let (logged_in, session) = fx
            .service
            .login("Lender@Example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login_at.is_some());

        let (via_token, _) = fx.service.authenticate(&session.token).await.unwrap();
        assert_eq!(via_token.id, user.id);

        let records = fx.login_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::Success);
        assert_eq!(records[0].actor_id, Some(user.id));
    }

    #[tokio::test]
    async fn test_unknown_email_and_bad_password_look_alike() {
        let fx = Fixture::new();
        fx.active_user("real@example.com").await;

        let a = fx
            .service
            .login("ghost@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap_err();
        let b = fx
            .service
            .login("real@example.com", "wrong", &NetworkContext::unknown())
            .await
            .unwrap_err();
        assert!(matches!(a, AuthError::InvalidCredentials));
        assert!(matches!(b, AuthError::InvalidCredentials));

        // The audit trail still distinguishes the two reasons.
        let records = fx.login_records().await;
        let reasons: Vec<_> = records
            .iter()
            .filter_map(|r| match &r.detail {
                RecordDetail::Auth(auth) => auth.reason.clone(),
                _ => None,
            })
            .collect();
        assert!(reasons.contains(&"unknown email".to_string()));
        assert!(reasons.contains(&"invalid credentials".to_string()));
    }

    #[tokio::test]
    async fn test_lockout_blocks_correct_password() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;

        for _ in 0..3 {
            let err = fx
                .service
                .login("lender@example.com", "wrong", &NetworkContext::unknown())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        let stored = fx.store.user_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.locked_until.is_some());
        assert_eq!(stored.failed_login_attempts, 0);

        let err = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked));
    }

    #[tokio::test]
    async fn test_lockout_expires_with_window() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;

        let mut stored = fx.store.user_by_id(user.id).await.unwrap().unwrap();
        stored.locked_until = Some(Utc::now() - Duration::minutes(1));
        fx.store.update_user(&stored).await.unwrap();

        let (logged_in, _) = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();
        assert!(logged_in.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_failure_counter_resets_on_success() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;

        for _ in 0..2 {
            let _ = fx
                .service
                .login("lender@example.com", "wrong", &NetworkContext::unknown())
                .await;
        }
        assert_eq!(
            fx.store
                .user_by_id(user.id)
                .await
                .unwrap()
                .unwrap()
                .failed_login_attempts,
            2
        );

        fx.service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();
        assert_eq!(
            fx.store
                .user_by_id(user.id)
                .await
                .unwrap()
                .unwrap()
                .failed_login_attempts,
            0
        );
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let fx = Fixture::new();
        fx.active_user("lender@example.com").await;
        let (_, session) = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();

        let (_, next) = fx
            .service
            .refresh(&session.refresh_token, &NetworkContext::unknown())
            .await
            .unwrap();
        assert_ne!(next.token, session.token);

        // The old pair is gone in both directions.
        let err = fx.service.authenticate(&session.token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
        let err = fx
            .service
            .refresh(&session.refresh_token, &NetworkContext::unknown())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));

        fx.service.authenticate(&next.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_audited() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;
        let (_, session) = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();

        fx.service
            .logout(&session.token, &NetworkContext::unknown())
            .await
            .unwrap();
        fx.service
            .logout(&session.token, &NetworkContext::unknown())
            .await
            .unwrap();

        let err = fx.service.authenticate(&session.token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));

        fx.service.recorder.flush().await;
        let records = fx
            .audit
            .query(AuditFilter {
                action: Some(AuditAction::Logout),
                ..AuditFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor_id, Some(user.id));
    }

    #[tokio::test]
    async fn test_suspension_cuts_off_existing_sessions() {
        let fx = Fixture::new();
        let user = fx.active_user("lender@example.com").await;
        let (_, session) = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap();

        fx.service
            .set_status(user.id, UserStatus::Suspended)
            .await
            .unwrap();

        let err = fx.service.authenticate(&session.token).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled(_)));

        let err = fx
            .service
            .login("lender@example.com", PASSWORD, &NetworkContext::unknown())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountDisabled(_)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let fx = Fixture::new();
        fx.service.register("one@example.com", PASSWORD).await.unwrap();
        let err = fx
            .service
            .register(" One@Example.COM ", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }
}
