use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::authz::Role;
use crate::directory::AccountDirectory;
use crate::errors::AppResult;

const DEFAULT_ROLE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct CachedRole {
    role: Role,
    fetched_at: Instant,
}

/// Resolves "what role is this authenticated identity acting with" for the
/// permission checks. The answer is total: an unknown or deactivated account
/// acts as GUEST.
///
/// Lookups go through a TTL cache; `invalidate` is called on login, logout
/// and role change, so a change takes effect on the next resolution rather
/// than instantaneously across in-flight requests.
pub struct SessionAuthContext {
    directory: Arc<dyn AccountDirectory>,
    ttl: Duration,
    cache: RwLock<HashMap<Uuid, CachedRole>>,
}

impl SessionAuthContext {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self::with_ttl(directory, DEFAULT_ROLE_TTL)
    }

    pub fn with_ttl(directory: Arc<dyn AccountDirectory>, ttl: Duration) -> Self {
        Self {
            directory,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn current_role(&self, account_id: Uuid) -> AppResult<Role> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&account_id) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.role);
                }
            }
        }

        let role = match self.directory.find_by_id(account_id).await? {
            Some(account) if account.active => account.role,
            _ => Role::Guest,
        };

        let mut cache = self.cache.write().await;
        cache.insert(
            account_id,
            CachedRole {
                role,
                fetched_at: Instant::now(),
            },
        );

        Ok(role)
    }

    pub async fn invalidate(&self, account_id: Uuid) {
        let mut cache = self.cache.write().await;
        cache.remove(&account_id);
    }
}
