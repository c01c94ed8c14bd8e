use std::time::Duration;

use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::{AsyncCommands, Script};

use super::WindowCount;

// Sets the expiry on the first hit (or if a previous expiry was lost) so the
// window is fixed from the first request, and reports the remaining TTL.
const INCR_WITH_WINDOW_LUA: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

#[derive(Clone, Debug)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn from_url(redis_url: &str) -> anyhow::Result<Self> {
        let config = Config::from_url(redis_url);
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("failed to create redis pool: {e}"))?;

        Ok(Self { pool })
    }

    async fn conn(&self) -> anyhow::Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("failed to get redis connection: {e}"))
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("redis PING failed: {e}"))?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        let value = conn
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| anyhow::anyhow!("redis GET failed for key `{key}`: {e}"))?;

        Ok(value)
    }

    pub async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;

        conn.set_ex::<_, _, ()>(key, value, ttl_seconds.max(1))
            .await
            .map_err(|e| anyhow::anyhow!("redis SETEX failed for key `{key}`: {e}"))?;

        Ok(())
    }

    pub async fn del(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;

        let removed = conn
            .del::<_, u64>(key)
            .await
            .map_err(|e| anyhow::anyhow!("redis DEL failed for key `{key}`: {e}"))?;

        Ok(removed > 0)
    }

    pub async fn incr(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;

        conn.incr::<_, _, u64>(key, 1_u64)
            .await
            .map_err(|e| anyhow::anyhow!("redis INCR failed for key `{key}`: {e}"))
    }

    pub async fn get_counter(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;

        let value = conn
            .get::<_, Option<u64>>(key)
            .await
            .map_err(|e| anyhow::anyhow!("redis GET failed for counter `{key}`: {e}"))?;

        Ok(value.unwrap_or(0))
    }

    pub async fn incr_with_window(&self, key: &str, window: Duration) -> anyhow::Result<WindowCount> {
        let mut conn = self.conn().await?;
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);

        let (count, ttl_ms): (u64, i64) = Script::new(INCR_WITH_WINDOW_LUA)
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("redis rate-limit script failed for key `{key}`: {e}"))?;

        Ok(WindowCount {
            count,
            ttl: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0)),
        })
    }

    pub async fn lpush(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;

        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| anyhow::anyhow!("redis LPUSH failed for key `{key}`: {e}"))?;

        Ok(())
    }

    pub async fn llen(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.conn().await?;

        conn.llen::<_, u64>(key)
            .await
            .map_err(|e| anyhow::anyhow!("redis LLEN failed for key `{key}`: {e}"))
    }

    pub async fn lrange(&self, key: &str, start: u64, end: u64) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let start = isize::try_from(start).unwrap_or(isize::MAX);
        let end = isize::try_from(end).unwrap_or(isize::MAX);

        conn.lrange::<_, Vec<String>>(key, start, end)
            .await
            .map_err(|e| anyhow::anyhow!("redis LRANGE failed for key `{key}`: {e}"))
    }

    pub async fn lrem_first(&self, key: &str, value: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;

        let removed = conn
            .lrem::<_, _, i64>(key, 1, value)
            .await
            .map_err(|e| anyhow::anyhow!("redis LREM failed for key `{key}`: {e}"))?;

        Ok(removed > 0)
    }
}
