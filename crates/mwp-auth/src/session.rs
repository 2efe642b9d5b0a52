//! Login sessions
//!
//! A session is valid while its last activity is within the idle timeout.
//! Every successful authentication moves `last_activity` forward.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mwp_core::config::AuthConfig;
use mwp_core::traits::Id;
use mwp_db::{Repository, SessionRepository, UserRepository};
use mwp_models::{NewSession, Session, User};

use crate::password::verify_password;
use crate::token::{generate_token, new_session_id, token_digest};
use crate::{AuthError, AuthResult};

/// Where a login comes from
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Result of a successful login
///
/// `token` is the only copy of the bearer token; the stored session holds its digest.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub session: Session,
    pub user: User,
}

/// The user behind a valid token
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub session: Session,
}

/// Issues, checks and revokes sessions
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<dyn SessionRepository>, config: &AuthConfig) -> Self {
        Self {
            users,
            sessions,
            idle_timeout: Duration::minutes(config.session_idle_timeout_minutes),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Check credentials and open a session
    pub async fn login(&self, employee_id: &str, password: &str, client: ClientInfo) -> AuthResult<LoginGrant> {
        let user = match self.users.find_by_employee_id(employee_id).await? {
            Some(user) if verify_password(password, &user.password) => user,
            _ => {
                tracing::warn!(employee_id, "Rejected login");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = generate_token();
        let session = self
            .sessions
            .create(NewSession {
                session_id: new_session_id(),
                user_id: user.id,
                token: token_digest(&token),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            })
            .await?;

        tracing::info!(user_id = user.id, session_id = %session.session_id, "Opened session");
        Ok(LoginGrant { token, session, user })
    }

    /// Resolve a bearer token to its user, expiring idle sessions
    pub async fn authenticate(&self, token: &str) -> AuthResult<Authenticated> {
        let mut session = self
            .sessions
            .find_by_token(&token_digest(token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let now = Utc::now();
        if session.is_expired(now, self.idle_timeout) {
            match self.sessions.delete(session.id).await {
                Ok(()) => {}
                // Already removed by a concurrent logout or purge
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(session_id = %session.session_id, "Session expired");
            return Err(AuthError::SessionExpired);
        }

        self.sessions.touch(session.id, now).await?;
        session.last_activity = now;

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(Authenticated { user, session })
    }

    /// Close the session behind a token; false when there was none
    pub async fn logout(&self, token: &str) -> AuthResult<bool> {
        let Some(session) = self.sessions.find_by_token(&token_digest(token)).await? else {
            return Ok(false);
        };

        match self.sessions.delete(session.id).await {
            Ok(()) => {
                tracing::info!(user_id = session.user_id, session_id = %session.session_id, "Closed session");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Close every session of a user
    pub async fn logout_everywhere(&self, user_id: Id) -> AuthResult<u64> {
        let removed = self.sessions.delete_for_user(user_id).await?;
        tracing::info!(user_id, removed, "Closed all sessions");
        Ok(removed)
    }

    /// Delete sessions idle for longer than the timeout
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        let cutoff = Utc::now() - self.idle_timeout;
        let removed = self.sessions.delete_inactive_since(cutoff).await?;
        tracing::info!(removed, "Purged expired sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use mwp_core::config::{AppConfig, DeletePolicy};
    use mwp_db::{Repositories, SessionFilter};
    use mwp_models::NewUser;

    async fn setup() -> (Repositories, SessionManager) {
        let repos = Repositories::in_memory(DeletePolicy::default());
        let hash = hash_password("s3cret-pass").unwrap();
        repos.users.create(NewUser::new("EMP001", hash)).await.unwrap();

        let manager = SessionManager::new(
            repos.users.clone(),
            repos.sessions.clone(),
            &AppConfig::default().auth,
        );
        (repos, manager)
    }

    #[tokio::test]
    async fn test_login_stores_digest_only() {
        let (repos, manager) = setup().await;
        let grant = manager
            .login("EMP001", "s3cret-pass", ClientInfo::new("10.0.0.1", "cli"))
            .await
            .unwrap();

        assert_eq!(grant.user.employee_id, "EMP001");
        assert_ne!(grant.session.token, grant.token);
        assert_eq!(grant.session.token, token_digest(&grant.token));
        assert!(repos.sessions.find_by_token(&grant.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_, manager) = setup().await;
        let wrong = manager.login("EMP001", "nope", ClientInfo::default()).await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        let unknown = manager.login("EMP404", "s3cret-pass", ClientInfo::default()).await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_and_logout() {
        let (_, manager) = setup().await;
        let grant = manager
            .login("EMP001", "s3cret-pass", ClientInfo::default())
            .await
            .unwrap();

        let auth = manager.authenticate(&grant.token).await.unwrap();
        assert_eq!(auth.user.id, grant.user.id);
        assert!(auth.session.last_activity >= grant.session.last_activity);

        assert!(manager.logout(&grant.token).await.unwrap());
        assert!(!manager.logout(&grant.token).await.unwrap());
        assert!(matches!(
            manager.authenticate(&grant.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_idle_session_expires() {
        let (repos, manager) = setup().await;
        let grant = manager
            .login("EMP001", "s3cret-pass", ClientInfo::default())
            .await
            .unwrap();

        let stale = Utc::now() - manager.idle_timeout() - Duration::minutes(1);
        repos.sessions.touch(grant.session.id, stale).await.unwrap();

        assert!(matches!(
            manager.authenticate(&grant.token).await,
            Err(AuthError::SessionExpired)
        ));
        assert!(repos.sessions.find_by_id(grant.session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_and_logout_everywhere() {
        let (repos, manager) = setup().await;
        let first = manager
            .login("EMP001", "s3cret-pass", ClientInfo::default())
            .await
            .unwrap();
        manager
            .login("EMP001", "s3cret-pass", ClientInfo::default())
            .await
            .unwrap();
        manager
            .login("EMP001", "s3cret-pass", ClientInfo::default())
            .await
            .unwrap();

        let stale = Utc::now() - Duration::hours(2);
        repos.sessions.touch(first.session.id, stale).await.unwrap();

        assert_eq!(manager.purge_expired().await.unwrap(), 1);
        assert_eq!(manager.logout_everywhere(first.user.id).await.unwrap(), 2);
        assert_eq!(repos.sessions.count(&SessionFilter::default()).await.unwrap(), 0);
    }
}
