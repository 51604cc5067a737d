//! Server-side sessions
//!
//! A session binds a random id to an account and role. The client only ever
//! holds `id.signature` in an HttpOnly cookie; everything else stays in the
//! backend. Sessions expire after a fixed window of inactivity and every
//! successful lookup slides that window forward.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bson::doc;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::Role;
use crate::db::schemas::{AccountDoc, SessionDoc, SESSION_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{PortalError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sid";

/// Cookie attributes
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub name: String,
    /// `Secure` plus `SameSite=None` for cross-site frontends;
    /// `SameSite=Lax` without `Secure` for plain-http development
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: SESSION_COOKIE.to_string(),
            secure: true,
        }
    }
}

/// Everything the session service needs, built once at startup
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl: Duration,
    pub cookie: CookiePolicy,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>, ttl: Duration, secure: bool) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            cookie: CookiePolicy {
                secure,
                ..CookiePolicy::default()
            },
        }
    }

    fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::minutes(20))
    }

    /// Expiry for a session last used at `now`, clamped to the latest representable time
    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl_chrono())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl From<SessionDoc> for Session {
    fn from(doc: SessionDoc) -> Self {
        Self {
            id: doc.id,
            account_id: doc.account_id,
            name: doc.name,
            role: doc.role,
            created_at: doc.metadata.created_at.unwrap_or(doc.last_access),
            last_access: doc.last_access,
            expires_at: doc.expires_at,
        }
    }
}

/// Storage for session records
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn insert(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    /// Slide the expiry window
    async fn touch(&self, id: &str, last_access: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()>;
    async fn remove(&self, id: &str) -> Result<()>;
    /// Drop every session belonging to an account, returning how many were removed
    async fn remove_for_account(&self, account_id: &str) -> Result<usize>;
    /// Drop expired sessions, returning how many were removed
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// In-memory session backend (dev mode and tests)
#[derive(Default)]
pub struct MemorySessionBackend {
    sessions: DashMap<String, Session>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn insert(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn touch(&self, id: &str, last_access: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()> {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.last_access = last_access;
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn remove_for_account(&self, account_id: &str) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.account_id != account_id);
        Ok(before - self.sessions.len())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(before - self.sessions.len())
    }
}

/// MongoDB session backend (the `sessions` collection)
pub struct MongoSessionBackend {
    collection: MongoCollection<SessionDoc>,
}

impl MongoSessionBackend {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<SessionDoc>(SESSION_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl SessionBackend for MongoSessionBackend {
    async fn insert(&self, session: Session) -> Result<()> {
        let doc = SessionDoc {
            id: session.id,
            metadata: Default::default(),
            account_id: session.account_id,
            name: session.name,
            role: session.role,
            expires_at: session.expires_at,
            last_access: session.last_access,
        };
        self.collection.insert_one(doc).await
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id })
            .await?
            .map(Session::from))
    }

    async fn touch(&self, id: &str, last_access: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "last_access": bson::DateTime::from_chrono(last_access),
                    "expires_at": bson::DateTime::from_chrono(expires_at),
                }},
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.collection.delete_one(doc! { "_id": id }).await
    }

    async fn remove_for_account(&self, account_id: &str) -> Result<usize> {
        let removed = self
            .collection
            .delete_many(doc! { "account_id": account_id })
            .await?;
        Ok(removed as usize)
    }

    async fn remove_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        // The TTL index on expires_at does this server-side
        Ok(0)
    }
}

/// Issues, resolves and revokes sessions
pub struct SessionService {
    config: SessionConfig,
    backend: Arc<dyn SessionBackend>,
}

impl SessionService {
    pub fn new(config: SessionConfig, backend: Arc<dyn SessionBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session for an account, returning it with its cookie token
    pub async fn login(&self, account: &AccountDoc) -> Result<(Session, String)> {
        self.login_at(account, Utc::now()).await
    }

    pub async fn login_at(&self, account: &AccountDoc, now: DateTime<Utc>) -> Result<(Session, String)> {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let id = hex::encode(raw);

        let session = Session {
            id: id.clone(),
            account_id: account.id.clone(),
            name: account.name.clone(),
            role: account.role,
            created_at: now,
            last_access: now,
            expires_at: self.config.expiry_from(now),
        };

        self.backend.insert(session.clone()).await?;
        let token = self.sign(&id)?;

        info!(account = %account.id, role = %account.role, "Session opened");
        Ok((session, token))
    }

    /// Resolve a cookie token to a live session, extending its expiry
    pub async fn resolve(&self, token: &str) -> Result<Session> {
        self.resolve_at(token, Utc::now()).await
    }

    pub async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let id = self.verify(token).ok_or(PortalError::SessionExpired)?;

        let mut session = self
            .backend
            .get(&id)
            .await?
            .ok_or(PortalError::SessionExpired)?;

        if session.is_expired_at(now) {
            debug!(session = %id, "Session expired");
            self.backend.remove(&id).await?;
            return Err(PortalError::SessionExpired);
        }

        session.last_access = now;
        session.expires_at = self.config.expiry_from(now);
        self.backend
            .touch(&id, session.last_access, session.expires_at)
            .await?;

        Ok(session)
    }

    /// Revoke the session behind a token, if any
    pub async fn logout(&self, token: &str) -> Result<()> {
        if let Some(id) = self.verify(token) {
            self.backend.remove(&id).await?;
            info!(session = %id, "Session closed");
        }
        Ok(())
    }

    /// Revoke every session an account holds
    pub async fn revoke_account(&self, account_id: &str) -> Result<usize> {
        let removed = self.backend.remove_for_account(account_id).await?;
        if removed > 0 {
            info!(account = %account_id, removed, "Sessions revoked");
        }
        Ok(removed)
    }

    /// Remove expired sessions from the backend
    pub async fn cleanup(&self) -> Result<usize> {
        self.backend.remove_expired(Utc::now()).await
    }

    /// `Set-Cookie` value carrying a session token
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie_with(token, self.config.ttl.as_secs())
    }

    /// `Set-Cookie` value that deletes the session cookie
    pub fn clear_cookie(&self) -> String {
        self.cookie_with("", 0)
    }

    fn cookie_with(&self, value: &str, max_age: u64) -> String {
        let policy = &self.config.cookie;
        let site = if policy.secure {
            "SameSite=None; Secure"
        } else {
            "SameSite=Lax"
        };
        format!(
            "{}={}; Path=/; HttpOnly; {}; Max-Age={}",
            policy.name, value, site, max_age
        )
    }

    /// Pull the session token out of a `Cookie` header
    pub fn token_from_cookie_header(&self, header: Option<&str>) -> Option<String> {
        let name = &self.config.cookie.name;
        header?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| PortalError::Internal(format!("Invalid session secret: {e}")))
    }

    fn sign(&self, id: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(id.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", id, signature))
    }

    /// Check the token signature, returning the session id
    fn verify(&self, token: &str) -> Option<String> {
        let (id, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(id.as_bytes());
        match mac.verify_slice(&signature) {
            Ok(()) => Some(id.to_string()),
            Err(_) => {
                warn!("Rejected session cookie with bad signature");
                None
            }
        }
    }
}

/// Periodically drop expired sessions from the backend
pub fn spawn_cleanup_task(service: Arc<SessionService>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            match service.cleanup().await {
                Ok(removed) if removed > 0 => {
                    debug!("Session cleanup: removed {} expired sessions", removed)
                }
                Ok(_) => {}
                Err(e) => warn!("Session cleanup failed: {}", e),
            }
        }
    });
    info!("Session cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SessionService {
        SessionService::new(
            SessionConfig::new("test-secret-value", Duration::from_secs(20 * 60), true),
            Arc::new(MemorySessionBackend::new()),
        )
    }

    fn officer() -> AccountDoc {
        AccountDoc::new("officer@city.gov", "Ravi".into(), "hash".into(), Role::Officer)
    }

    #[tokio::test]
    async fn test_login_then_resolve() {
        let sessions = service();
        let (session, token) = sessions.login(&officer()).await.unwrap();

        let resolved = sessions.resolve(&token).await.unwrap();
        assert_eq!(resolved.id, session.id);
        assert_eq!(resolved.role, Role::Officer);
        assert_eq!(resolved.name, "Ravi");
    }

    #[tokio::test]
    async fn test_session_expires_after_inactivity() {
        let sessions = service();
        let start = Utc::now();
        let (_, token) = sessions.login_at(&officer(), start).await.unwrap();

        let later = start + chrono::Duration::minutes(21);
        let err = sessions.resolve_at(&token, later).await.unwrap_err();
        assert!(matches!(err, PortalError::SessionExpired));

        // Expired sessions are gone for good
        let err = sessions.resolve_at(&token, start).await.unwrap_err();
        assert!(matches!(err, PortalError::SessionExpired));
    }

    #[tokio::test]
    async fn test_activity_slides_the_window() {
        let sessions = service();
        let start = Utc::now();
        let (_, token) = sessions.login_at(&officer(), start).await.unwrap();

        let t1 = start + chrono::Duration::minutes(15);
        sessions.resolve_at(&token, t1).await.unwrap();

        // 30 minutes after login but only 15 after last access
        let t2 = start + chrono::Duration::minutes(30);
        let session = sessions.resolve_at(&token, t2).await.unwrap();
        assert_eq!(session.expires_at, t2 + chrono::Duration::minutes(20));
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let sessions = service();
        let (_, token) = sessions.login(&officer()).await.unwrap();

        let (id, _) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", id, URL_SAFE_NO_PAD.encode([0u8; 32]));
        assert!(sessions.resolve(&forged).await.is_err());
        assert!(sessions.resolve(id).await.is_err());
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let sessions = service();
        let (_, token) = sessions.login(&officer()).await.unwrap();

        let other = SessionService::new(
            SessionConfig::new("another-secret", Duration::from_secs(1200), true),
            Arc::new(MemorySessionBackend::new()),
        );
        assert!(other.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_revokes() {
        let sessions = service();
        let (_, token) = sessions.login(&officer()).await.unwrap();
        sessions.logout(&token).await.unwrap();
        assert!(sessions.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_account_ends_all_its_sessions() {
        let backend = Arc::new(MemorySessionBackend::new());
        let sessions = SessionService::new(
            SessionConfig::new("s", Duration::from_secs(1200), true),
            backend.clone(),
        );
        let ravi = officer();
        let meena = AccountDoc::new("meena@city.gov", "Meena".into(), "hash".into(), Role::Officer);
        let (_, desk) = sessions.login(&ravi).await.unwrap();
        let (_, phone) = sessions.login(&ravi).await.unwrap();
        let (_, other) = sessions.login(&meena).await.unwrap();

        assert_eq!(sessions.revoke_account(&ravi.id).await.unwrap(), 2);
        assert!(sessions.resolve(&desk).await.is_err());
        assert!(sessions.resolve(&phone).await.is_err());
        assert!(sessions.resolve(&other).await.is_ok());
        assert_eq!(sessions.revoke_account(&ravi.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let backend = Arc::new(MemorySessionBackend::new());
        let sessions = SessionService::new(
            SessionConfig::new("s", Duration::from_secs(1200), true),
            backend.clone(),
        );
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        sessions.login_at(&officer(), long_ago).await.unwrap();
        sessions.login(&officer()).await.unwrap();

        assert_eq!(backend.len(), 2);
        assert_eq!(sessions.cleanup().await.unwrap(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_ttl_does_not_overflow() {
        let sessions = SessionService::new(
            SessionConfig::new("s", Duration::from_secs(u64::MAX), true),
            Arc::new(MemorySessionBackend::new()),
        );
        let (session, token) = sessions.login(&officer()).await.unwrap();
        assert!(session.expires_at > session.created_at);
        assert!(sessions.resolve(&token).await.is_ok());
    }

    #[test]
    fn test_cookie_attributes() {
        let sessions = service();
        let cookie = sessions.session_cookie("abc.def");
        assert!(cookie.starts_with("sid=abc.def;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=None; Secure"));
        assert!(cookie.contains("Max-Age=1200"));

        assert!(sessions.clear_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_insecure_cookie_for_local_http() {
        let sessions = SessionService::new(
            SessionConfig::new("s", Duration::from_secs(60), false),
            Arc::new(MemorySessionBackend::new()),
        );
        let cookie = sessions.session_cookie("t");
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_token_extraction_from_cookie_header() {
        let sessions = service();
        assert_eq!(
            sessions.token_from_cookie_header(Some("theme=dark; sid=abc.def; lang=en")),
            Some("abc.def".to_string())
        );
        assert_eq!(sessions.token_from_cookie_header(Some("theme=dark")), None);
        assert_eq!(sessions.token_from_cookie_header(Some("sid=")), None);
        assert_eq!(sessions.token_from_cookie_header(None), None);
    }
}
