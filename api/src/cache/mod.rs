use crate::utils::AppResult;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Thin Redis wrapper shared by the rate limiter, the recurring generator's
/// `ProcessedEvent` dedup store, and the reminder/chat surfaces. Generic
/// get/set/delete rather than a dozen bespoke methods — callers own key
/// shape, this owns connection plumbing and (de)serialization.
#[derive(Clone)]
pub struct CacheClient {
    manager: ConnectionManager,
}

impl CacheClient {
    pub async fn new(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self { manager })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let deserialized = serde_json::from_str(&v).map_err(|e| {
                    crate::utils::AppError::Internal(format!(
                        "failed to deserialize cache value: {e}"
                    ))
                })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let serialized = serde_json::to_string(value).map_err(|e| {
            crate::utils::AppError::Internal(format!("failed to serialize cache value: {e}"))
        })?;

        if let Some(ttl) = ttl {
            conn.set_ex::<_, _, ()>(key, serialized, ttl.as_secs()).await?;
        } else {
            conn.set::<_, _, ()>(key, serialized).await?;
        }

        Ok(())
    }

    /// `SET key value NX EX ttl` — true iff this call created the key. Used
    /// by the recurring generator to treat "check, then mark processed" as a
    /// single atomic step rather than two round trips racing a replica.
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(ttl.as_secs() as usize));
        let result: Option<String> = conn.set_options(key, value, opts).await?;
        Ok(result.is_some())
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    pub async fn delete_pattern(&self, pattern: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = conn.keys(pattern).await?;

        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }

        Ok(())
    }

    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    pub async fn increment(&self, key: &str) -> AppResult<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.manager.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64).await?;
        Ok(())
    }
}

pub fn cache_key(prefix: &str, id: &str) -> String {
    format!("{prefix}:{id}")
}

pub fn user_cache_key(user_id: &str, entity: &str, id: &str) -> String {
    format!("user:{user_id}:{entity}:{id}")
}
