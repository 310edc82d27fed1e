//! # Persistence Boundary
//!
//! Account and settings data are owned by an external collaborator. Handlers
//! only see the [`DataStore`] trait; [`MemoryStore`] is the in-process
//! implementation used by default and in tests.

use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;

use crate::utils::sync::{read, write};

pub type PlayerId = u32;

/// Public identity of a logged in player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
}

/// Stored account record.
#[derive(Debug, Clone)]
pub struct Account {
    pub player: Player,
    pub email: String,
    pub password: String,
    /// Token accepted by silent login
    pub session_token: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Queries the handlers make against persistent storage.
pub trait DataStore: Send + Sync {
    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    fn load_account(&self, id: PlayerId) -> StoreResult<Option<Account>>;

    fn load_settings(&self, id: PlayerId) -> StoreResult<BTreeMap<String, String>>;

    fn save_setting(&self, id: PlayerId, key: &str, value: &str) -> StoreResult<()>;

    /// Named client configuration section, `None` when unknown.
    fn load_client_config(&self, name: &str) -> StoreResult<Option<BTreeMap<String, String>>>;
}

/// In-memory [`DataStore`].
#[derive(Debug)]
pub struct MemoryStore {
    next_id: AtomicU32,
    available: AtomicBool,
    accounts: RwLock<HashMap<PlayerId, Account>>,
    settings: RwLock<HashMap<PlayerId, BTreeMap<String, String>>>,
    client_configs: RwLock<HashMap<String, BTreeMap<String, String>>>,
    token_seed: RandomState,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            available: AtomicBool::new(true),
            accounts: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            client_configs: RwLock::new(HashMap::new()),
            token_seed: RandomState::new(),
        }
    }

    /// Register an account and return the stored record.
    pub fn add_account(&self, email: &str, password: &str, display_name: &str) -> Account {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let account = Account {
            player: Player {
                id,
                display_name: display_name.to_string(),
            },
            email: email.to_string(),
            password: password.to_string(),
            session_token: self.make_token(id, email),
        };
        write(&self.accounts).insert(id, account.clone());
        debug!(player_id = id, "Account registered");
        account
    }

    pub fn set_client_config(&self, name: &str, values: BTreeMap<String, String>) {
        write(&self.client_configs).insert(name.to_string(), values);
    }

    /// Toggle simulated outage; every query fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }

    fn make_token(&self, id: PlayerId, email: &str) -> String {
        let mut hasher = self.token_seed.build_hasher();
        id.hash(&mut hasher);
        email.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl DataStore for MemoryStore {
    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_available()?;
        Ok(read(&self.accounts)
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn load_account(&self, id: PlayerId) -> StoreResult<Option<Account>> {
        self.check_available()?;
        Ok(read(&self.accounts).get(&id).cloned())
    }

    fn load_settings(&self, id: PlayerId) -> StoreResult<BTreeMap<String, String>> {
        self.check_available()?;
        Ok(read(&self.settings).get(&id).cloned().unwrap_or_default())
    }

    fn save_setting(&self, id: PlayerId, key: &str, value: &str) -> StoreResult<()> {
        self.check_available()?;
        write(&self.settings)
            .entry(id)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load_client_config(&self, name: &str) -> StoreResult<Option<BTreeMap<String, String>>> {
        self.check_available()?;
        Ok(read(&self.client_configs).get(name).cloned())
    }
}
