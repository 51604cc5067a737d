//! Account store and credential checks
//!
//! Citizens register themselves; officers are created by an admin; the first
//! admin is seeded from configuration at startup.

use async_trait::async_trait;
use bson::doc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, validate_new_password, verify_password, Role};
use crate::db::schemas::{normalize_email, AccountDoc, AccountSummary, ACCOUNT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{PortalError, Result};

/// Same message for every credential failure
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Persistence for accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; a taken email is `Conflict`
    async fn insert(&self, account: AccountDoc) -> Result<()>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>>;

    async fn get(&self, id: &str) -> Result<Option<AccountDoc>>;

    /// Active accounts with `role`, ordered by name
    async fn list_by_role(&self, role: Role) -> Result<Vec<AccountDoc>>;

    /// Mark an account inactive and soft-deleted; false if it was not live
    async fn deactivate(&self, id: &str) -> Result<bool>;
}

// =============================================================================
// MongoDB backend
// =============================================================================

pub struct MongoAccountStore {
    collection: MongoCollection<AccountDoc>,
}

impl MongoAccountStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: mongo.collection(ACCOUNT_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn insert(&self, account: AccountDoc) -> Result<()> {
        self.collection.insert_one(account).await.map_err(|e| match e {
            PortalError::Conflict(_) => {
                PortalError::Conflict("An account with this email already exists".into())
            }
            other => other,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>> {
        self.collection
            .find_one(doc! { "email": normalize_email(email) })
            .await
    }

    async fn get(&self, id: &str) -> Result<Option<AccountDoc>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<AccountDoc>> {
        self.collection
            .find_many(
                doc! { "role": role.as_str(), "is_active": true },
                Some(doc! { "name": 1 }),
            )
            .await
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "is_active": false } })
            .await?;
        let result = self.collection.soft_delete(doc! { "_id": id }).await?;
        Ok(result.modified_count > 0)
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
pub struct MemoryAccountStore {
    /// Keyed by account id
    accounts: DashMap<String, AccountDoc>,
    /// Normalized email -> account id
    emails: DashMap<String, String>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, id: &str) -> Option<AccountDoc> {
        self.accounts
            .get(id)
            .filter(|a| !a.metadata.is_deleted)
            .map(|a| a.value().clone())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, mut account: AccountDoc) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.emails.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(PortalError::Conflict(
                "An account with this email already exists".into(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(account.id.clone());
                account.metadata.touch();
                self.accounts.insert(account.id.clone(), account);
                Ok(())
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountDoc>> {
        let id = self.emails.get(&normalize_email(email)).map(|id| id.value().clone());
        Ok(id.and_then(|id| self.live(&id)))
    }

    async fn get(&self, id: &str) -> Result<Option<AccountDoc>> {
        Ok(self.live(id))
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<AccountDoc>> {
        let mut out: Vec<AccountDoc> = self
            .accounts
            .iter()
            .filter(|a| a.role == role && a.is_active && !a.metadata.is_deleted)
            .map(|a| a.value().clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        let Some(mut account) = self.accounts.get_mut(id) else {
            return Ok(false);
        };
        if account.metadata.is_deleted {
            return Ok(false);
        }
        account.is_active = false;
        account.metadata.is_deleted = true;
        account.metadata.deleted_at = Some(chrono::Utc::now());
        account.metadata.touch();
        Ok(true)
    }
}

// =============================================================================
// Account service
// =============================================================================

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: Option<String>,
}

/// Registration, login and officer management
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Register a citizen
    pub async fn register(&self, input: NewAccount) -> Result<AccountDoc> {
        self.create(input, Role::Citizen).await
    }

    /// Create an officer account (admin operation)
    pub async fn create_officer(&self, input: NewAccount) -> Result<AccountDoc> {
        self.create(input, Role::Officer).await
    }

    async fn create(&self, input: NewAccount, role: Role) -> Result<AccountDoc> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(PortalError::Validation("Name is required".into()));
        }
        let email = normalize_email(&input.email);
        if !is_plausible_email(&email) {
            return Err(PortalError::Validation("A valid email is required".into()));
        }
        validate_new_password(&input.password)?;

        let mut account = AccountDoc::new(&email, name.to_string(), hash_password(&input.password)?, role);
        account.department = input
            .department
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        self.store.insert(account.clone()).await?;
        info!(account = %account.id, role = %role, "Account created");
        Ok(account)
    }

    /// Check credentials for a role-specific login
    ///
    /// Unknown email, wrong password, wrong role and inactive accounts all fail
    /// with the same `Unauthorized` message.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<AccountDoc> {
        let Some(account) = self.store.find_by_email(email).await? else {
            return Err(PortalError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if account.role != role || !account.is_active {
            warn!(account = %account.id, role = %role, "Login refused for role");
            return Err(PortalError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        if !verify_password(password, &account.password_hash)? {
            warn!(account = %account.id, "Wrong password");
            return Err(PortalError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        Ok(account)
    }

    /// Active officer by id
    pub async fn active_officer(&self, id: &str) -> Result<AccountDoc> {
        match self.store.get(id).await? {
            Some(account) if account.role == Role::Officer && account.is_active => Ok(account),
            _ => Err(PortalError::NotFound(format!("Officer {} not found", id))),
        }
    }

    pub async fn list_officers(&self) -> Result<Vec<AccountSummary>> {
        Ok(self
            .store
            .list_by_role(Role::Officer)
            .await?
            .iter()
            .map(AccountDoc::summary)
            .collect())
    }

    /// Deactivate an officer; other roles are left alone
    pub async fn deactivate_officer(&self, id: &str) -> Result<()> {
        self.active_officer(id).await?;
        if !self.store.deactivate(id).await? {
            return Err(PortalError::NotFound(format!("Officer {} not found", id)));
        }
        info!(officer = %id, "Officer deactivated");
        Ok(())
    }

    /// Create the configured admin unless the email is already taken
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<()> {
        if self.store.find_by_email(email).await?.is_some() {
            info!(email = %normalize_email(email), "Admin account already present");
            return Ok(());
        }

        self.create(
            NewAccount {
                name: "Administrator".into(),
                email: email.to_string(),
                password: password.to_string(),
                department: None,
            },
            Role::Admin,
        )
        .await?;
        info!(email = %normalize_email(email), "Seeded admin account");
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}
