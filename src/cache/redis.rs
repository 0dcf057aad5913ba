//! Redis resolution cache
//!
//! - tier 1: `{prefix}ip:{addr}`，`SET EX`
//! - tier 2 (v4): `{prefix}ranges:v4`，score = 起始地址 (u32)，member = `cc|prefix|start`
//! - tier 2 (v6): `{prefix}ranges:v6`，score 全为 0，按字典序排序，
//!   member = `{32 位十六进制起始地址}|cc|prefix`
//!
//! 重建时先写入 staging key，再在一个原子 pipeline 里 EXPIRE + RENAME，
//! 读者看到的始终是完整的旧索引或完整的新索引。

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use crate::cache::range_index::{RangeIndex, contains};
use crate::cache::traits::ResolutionCache;
use crate::config::CacheConfig;
use crate::declare_resolution_cache_plugin;
use crate::errors::{IpLocatorError, Result};
use crate::rir::RangeSet;

declare_resolution_cache_plugin!("redis", RedisResolutionCache);

/// 每个 ZADD 的成员数
const ZADD_CHUNK: usize = 1000;

pub struct RedisResolutionCache {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
    ttl: u64,
}

impl RedisResolutionCache {
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        let redis_config = &config.redis;

        let client = redis::Client::open(redis_config.url.clone()).map_err(|e| {
            IpLocatorError::cache_connection(format!(
                "Invalid Redis URL {}: {}",
                redis_config.url, e
            ))
        })?;

        let cache = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: redis_config.key_prefix.clone(),
            ttl: config.ttl_secs.max(1),
        };

        // 启动时测试 Redis 连接
        let mut conn = cache.get_connection().await.map_err(|e| {
            error!(
                "Failed to connect to Redis: {}. Check Redis server status and URL: {}",
                e, redis_config.url
            );
            IpLocatorError::from(e)
        })?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(
            "RedisResolutionCache created with prefix: '{}', TTL: {}s, ping: {}",
            cache.key_prefix, cache.ttl, pong
        );

        Ok(cache)
    }

    /// 获取或建立持久连接
    async fn get_connection(
        &self,
    ) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    /// 出错时重置连接并转换错误
    async fn fail(&self, e: redis::RedisError) -> IpLocatorError {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            self.reset_connection().await;
        }
        IpLocatorError::from(e)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        match self.get_connection().await {
            Ok(c) => Ok(c),
            Err(e) => {
                self.reset_connection().await;
                Err(IpLocatorError::from(e))
            }
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn hot_key(&self, ip: &str) -> String {
        self.make_key(&format!("ip:{}", ip))
    }

    fn index_key(&self, family: &str) -> String {
        self.make_key(&format!("ranges:{}", family))
    }

    fn staging_key(&self, family: &str) -> String {
        self.make_key(&format!("ranges:{}:staging", family))
    }

    async fn lookup_v4(
        &self,
        conn: &mut MultiplexedConnection,
        addr: Ipv4Addr,
    ) -> Result<Option<String>> {
        let key = self.index_key("v4");
        let members: Vec<String> = match conn
            .zrevrangebyscore_limit(&key, u32::from(addr), "-inf", 0, 1)
            .await
        {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e).await),
        };
        Ok(members
            .first()
            .and_then(|m| decode_v4_member(m))
            .filter(|(start, prefix, _)| contains(IpAddr::V4(*start), *prefix, IpAddr::V4(addr)))
            .map(|(_, _, cc)| cc))
    }

    async fn lookup_v6(
        &self,
        conn: &mut MultiplexedConnection,
        addr: Ipv6Addr,
    ) -> Result<Option<String>> {
        let key = self.index_key("v6");
        // 同一起始地址的成员都排在 "{hex}|\x7f" 之前
        let max = format!("[{:032x}|\x7f", u128::from(addr));
        let members: Vec<String> = match conn.zrevrangebylex_limit(&key, max, "-", 0, 1).await {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e).await),
        };
        Ok(members
            .first()
            .and_then(|m| decode_v6_member(m))
            .filter(|(start, prefix, _)| contains(IpAddr::V6(*start), *prefix, IpAddr::V6(addr)))
            .map(|(_, _, cc)| cc))
    }

    /// 写入 staging，再原子地替换正式 key
    async fn swap_in<M: redis::ToRedisArgs + Send + Sync>(
        &self,
        conn: &mut MultiplexedConnection,
        family: &str,
        members: &[(f64, M)],
    ) -> Result<()> {
        let live = self.index_key(family);
        let staging = self.staging_key(family);

        let result: redis::RedisResult<()> = async {
            let _: () = conn.del(&staging).await?;
            for chunk in members.chunks(ZADD_CHUNK) {
                let _: () = staging_chunk_pipe(&staging, chunk, self.ttl)
                    .query_async(&mut *conn)
                    .await?;
            }

            let mut pipe = redis::pipe();
            pipe.atomic();
            if members.is_empty() {
                pipe.del(&live).ignore();
            } else {
                pipe.expire(&staging, self.ttl as i64)
                    .ignore()
                    .rename(&staging, &live)
                    .ignore();
            }
            pipe.query_async(&mut *conn).await
        }
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                // 尽力清理；失败时 staging 也会随 TTL 过期
                let cleanup: redis::RedisResult<()> = conn.del(&staging).await;
                if let Err(del_err) = cleanup {
                    debug!("Failed to drop {} after error: {}", staging, del_err);
                }
                Err(self.fail(e).await)
            }
        }
    }
}

/// 单个 ZADD 分块；每次写入都刷新 staging 的 TTL，中途失败不会留下永久 key
fn staging_chunk_pipe<M: redis::ToRedisArgs>(
    staging: &str,
    chunk: &[(f64, M)],
    ttl: u64,
) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .zadd_multiple(staging, chunk)
        .ignore()
        .expire(staging, ttl as i64)
        .ignore();
    pipe
}

fn encode_v4_member(start: u32, cc: &str, prefix: u8) -> String {
    format!("{}|{}|{}", cc, prefix, start)
}

fn decode_v4_member(member: &str) -> Option<(Ipv4Addr, u8, String)> {
    let mut parts = member.split('|');
    let cc = parts.next()?;
    let prefix: u8 = parts.next()?.parse().ok()?;
    let start: u32 = parts.next()?.parse().ok()?;
    Some((Ipv4Addr::from(start), prefix, cc.to_string()))
}

fn encode_v6_member(start: u128, cc: &str, prefix: u8) -> String {
    format!("{:032x}|{}|{}", start, cc, prefix)
}

fn decode_v6_member(member: &str) -> Option<(Ipv6Addr, u8, String)> {
    let mut parts = member.split('|');
    let start = u128::from_str_radix(parts.next()?, 16).ok()?;
    let cc = parts.next()?;
    let prefix: u8 = parts.next()?.parse().ok()?;
    Some((Ipv6Addr::from(start), prefix, cc.to_string()))
}

#[async_trait]
impl ResolutionCache for RedisResolutionCache {
    async fn get_hot(&self, ip: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(self.hot_key(ip)).await {
            Ok(value) => {
                trace!("Redis hot-IP lookup {} -> {:?}", ip, value);
                Ok(value)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn set_hot(&self, ip: &str, country_code: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        match conn
            .set_ex::<String, &str, ()>(self.hot_key(ip), country_code, self.ttl)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn rebuild_range_index(&self, set: &RangeSet) -> Result<()> {
        // 先在本地去重，保证同一起始地址只保留最具体的 Range
        let index = RangeIndex::build(set);
        let v4: Vec<(f64, String)> = index
            .iter_v4()
            .map(|(start, e)| {
                (
                    start as f64,
                    encode_v4_member(start, &e.country_code, e.prefix_len),
                )
            })
            .collect();
        let v6: Vec<(f64, String)> = index
            .iter_v6()
            .map(|(start, e)| (0.0, encode_v6_member(start, &e.country_code, e.prefix_len)))
            .collect();

        let mut conn = self.connection().await?;
        self.swap_in(&mut conn, "v4", &v4).await?;
        self.swap_in(&mut conn, "v6", &v6).await?;

        debug!(
            "Rebuilt Redis range index: {} v4, {} v6 entries",
            v4.len(),
            v6.len()
        );
        Ok(())
    }

    async fn lookup_range_index(&self, addr: IpAddr) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        match addr {
            IpAddr::V4(v4) => self.lookup_v4(&mut conn, v4).await,
            IpAddr::V6(v6) => self.lookup_v6(&mut conn, v6).await,
        }
    }

    fn cache_type(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_member_round_trip() {
        let member = encode_v4_member(0xC0A8_0000, "US", 16);
        assert_eq!(member, "US|16|3232235520");
        let (start, prefix, cc) = decode_v4_member(&member).unwrap();
        assert_eq!(start, Ipv4Addr::new(192, 168, 0, 0));
        assert_eq!(prefix, 16);
        assert_eq!(cc, "US");
    }

    #[test]
    fn test_v6_members_sort_by_address() {
        let a = encode_v6_member(u128::from("2001:db8::".parse::<Ipv6Addr>().unwrap()), "CA", 32);
        let b = encode_v6_member(u128::from("2001:db9::".parse::<Ipv6Addr>().unwrap()), "US", 32);
        assert!(a < b);

        // 查询上界覆盖同一起始地址的成员
        let max = format!("{:032x}|\x7f", u128::from("2001:db8::".parse::<Ipv6Addr>().unwrap()));
        assert!(a < max);
        assert!(b > max);

        let (start, prefix, cc) = decode_v6_member(&a).unwrap();
        assert_eq!(start.to_string(), "2001:db8::");
        assert_eq!(prefix, 32);
        assert_eq!(cc, "CA");
    }

    #[test]
    fn test_staging_chunk_sets_expiry() {
        let members = vec![(16_777_216f64, encode_v4_member(16_777_216, "AU", 24))];
        let packed = staging_chunk_pipe("ipl:ranges:v4:staging", &members, 300).get_packed_pipeline();
        let text = String::from_utf8_lossy(&packed);

        let zadd = text.find("ZADD").unwrap();
        let expire = text.find("EXPIRE").unwrap();
        assert!(zadd < expire);
        assert!(text.contains("MULTI"));
        assert!(text.contains("ipl:ranges:v4:staging"));
        assert!(text.contains("300"));
    }

    #[test]
    fn test_malformed_members_are_ignored() {
        assert!(decode_v4_member("US|abc|1").is_none());
        assert!(decode_v6_member("zz|CA|32").is_none());
    }
}
