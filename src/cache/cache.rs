use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{CacheError, Error};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> Into<String> for &CacheKey<T> {
    fn into(self) -> String {
        match self._type {
            CacheKeyType::TagList => format!("tags-{}", self._value.to_string()),
            CacheKeyType::IngredientList => format!("ingredients-{}", self._value.to_string()),
            CacheKeyType::RevokedToken => format!("revoked-token-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheKeyType {
    TagList,
    IngredientList,
    RevokedToken,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(key: &CacheKey<T>) -> CacheLifetime {
        match key._type {
            CacheKeyType::TagList => CacheLifetime::BindTagCache,
            CacheKeyType::IngredientList => CacheLifetime::BindIngredientCache,
            CacheKeyType::RevokedToken => CacheLifetime::Infinite,
        }
    }
}

// Cache - wrappers

/// A cached value stays valid while the generation key it was stored under is unchanged.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheLifetime {
    Infinite,
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> Option<&'static str> {
        match self {
            CacheLifetime::Infinite => None,
            CacheLifetime::BindTagCache => Some("tag-cache-key"),
            CacheLifetime::BindIngredientCache => Some("ingredient-cache-key"),
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, Error> {
        match self.bind_key() {
            Some(key) => get_cache_value::<&str, String>(key, cache).await,
            None => Ok(None),
        }
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        Ok(bind == &self.get_cache_bind(cache).await?)
    }

    /// Rotates the generation key, orphaning every value bound to it.
    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), Error> {
        if let Some(key) = self.bind_key() {
            let bind = uuid::Uuid::new_v4().to_string();
            log::trace!("> Rotating {key} to {bind}");
            set_cache_value(key, bind, cache).await?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: Serialize + DeserializeOwned + Send + Sync + Clone> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, Error> {
        self._lifetime.validate_cache_bind(&self._bind, cache).await
    }

    /// Returns the cached value, or stores and returns what `callback` produces.
    /// Cache failures are logged and never fail the request.
    pub async fn get_or<F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<T, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let name = key.to_string();
        let value = match get_cache_value::<&str, RedisValue<T>>(&name, cache).await {
            Ok(value) => value,
            Err(_) => {
                log::error!("> Failed to read cached value. Deleting {}", &name);
                if let Err(e) = delete_cache_value(&name, cache).await {
                    log::error!("> Failed to delete cached value! {e}");
                }
                None
            }
        };

        if let Some(value) = value {
            log::trace!("> Found {name}");
            match value.validate(cache).await {
                Ok(true) => return Ok(value.value),
                Ok(false) => log::trace!("> Invalidated {name}"),
                Err(e) => log::error!("> Could not validate {name}: {e}"),
            }
        }

        log::trace!("> Fetching {name}");
        let fresh = callback().await?;
        let lifetime: CacheLifetime = (&key).into();
        match RedisValue::new(fresh.clone(), lifetime, cache).await {
            Ok(value) => {
                if let Err(e) = set_cache_value(&name, value, cache).await {
                    log::error!("{e:?}");
                }
            }
            Err(e) => log::error!("{e:?}"),
        }

        Ok(fresh)
    }
}

/// Reads through the cache when one is configured.
pub async fn get_or_fetch<T, F, Fut>(
    key: CacheKey<&'static str>,
    cache: Option<MultiplexedConnection>,
    callback: F,
) -> Result<T, Error>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    match cache {
        Some(mut cache) => RedisValue::get_or(key, &mut cache, callback).await,
        None => callback().await,
    }
}

pub async fn invalidate(lifetime: CacheLifetime, cache: Option<MultiplexedConnection>) {
    if let Some(mut cache) = cache {
        if let Err(e) = lifetime.invalidate(&mut cache).await {
            log::error!("> Failed to invalidate {lifetime:?}: {e}");
        }
    }
}

// Cache - token revocation

pub async fn revoke_token(
    token_id: &str,
    ttl_seconds: u64,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let key = CacheKeyType::RevokedToken.new(token_id);
    let _: () = cache
        .set_ex(key.to_string(), 1, ttl_seconds)
        .await
        .map_err(CacheError::from)?;

    Ok(())
}

pub async fn is_token_revoked(
    token_id: &str,
    cache: &mut MultiplexedConnection,
) -> Result<bool, Error> {
    let key = CacheKeyType::RevokedToken.new(token_id);
    let exists: bool = cache
        .exists(key.to_string())
        .await
        .map_err(CacheError::from)?;

    Ok(exists)
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.set(key, value).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}
