//! RIR 数据源下载
//!
//! 每个数据源最多尝试 `max_attempts` 次，第 n 次重试前等待 n × retry_unit。
//! 单次尝试要么完整成功，要么整体失败。
//! ureq 是同步客户端，请求与逐行解析都在 spawn_blocking 中执行。

use std::io::{BufRead, Read};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use ureq::Agent;

use super::models::{AddressFamily, FeedBatch};
use super::parser::{LineOutcome, parse_line};
use crate::config::{FeedSource, FetcherConfig};
use crate::errors::{IpLocatorError, Result};

/// 每解析多少行检查一次取消信号
const CANCEL_CHECK_LINES: u64 = 4096;

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// 下载并解析一个数据源
    async fn fetch(&self, source: &FeedSource, cancel: &CancellationToken) -> Result<FeedBatch>;
}

/// 基于 ureq 的 HTTP 下载器
pub struct HttpFeedFetcher {
    agent: Agent,
    user_agent: String,
    max_attempts: u32,
    retry_unit: Duration,
    max_line_bytes: usize,
}

impl HttpFeedFetcher {
    pub fn new(config: &FetcherConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_unit: Duration::from_secs(config.retry_delay_secs),
            max_line_bytes: config.max_line_bytes,
        }
    }

    /// 覆盖重试等待单位（测试中用毫秒级）
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 单次尝试：请求 + 流式解析（同步，在 spawn_blocking 中调用）
    fn fetch_once_sync(
        agent: Agent,
        url: String,
        user_agent: String,
        max_line_bytes: usize,
        cancel: CancellationToken,
    ) -> Result<FeedBatch> {
        let resp = agent
            .get(&url)
            .header("User-Agent", &user_agent)
            .call()
            .map_err(|e| IpLocatorError::feed_fetch(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IpLocatorError::feed_fetch(format!(
                "unexpected status {}",
                status
            )));
        }

        let reader = std::io::BufReader::new(resp.into_body().into_reader());
        parse_feed(reader, max_line_bytes, &cancel)
    }

    async fn fetch_once(&self, source: &FeedSource, cancel: &CancellationToken) -> Result<FeedBatch> {
        let agent = self.agent.clone();
        let url = source.url.clone();
        let user_agent = self.user_agent.clone();
        let max_line_bytes = self.max_line_bytes;
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            Self::fetch_once_sync(agent, url, user_agent, max_line_bytes, cancel)
        })
        .await
        .map_err(|e| IpLocatorError::feed_fetch(format!("fetch task failed: {}", e)))?
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &FeedSource, cancel: &CancellationToken) -> Result<FeedBatch> {
        let mut last_error: Option<IpLocatorError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.retry_unit * attempt;
                debug!(
                    "Retrying {} in {:?} (attempt {}/{})",
                    source.name,
                    delay,
                    attempt + 1,
                    self.max_attempts
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(IpLocatorError::cancelled(format!(
                            "fetch of {} cancelled during backoff",
                            source.name
                        )));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                return Err(IpLocatorError::cancelled(format!(
                    "fetch of {} cancelled",
                    source.name
                )));
            }

            match self.fetch_once(source, cancel).await {
                Ok(batch) => {
                    info!(
                        "Fetched {}: {} ranges (v4={}, v6={}, skipped={}, errors={})",
                        source.name,
                        batch.ranges.len(),
                        batch.stats.ipv4,
                        batch.stats.ipv6,
                        batch.stats.skipped,
                        batch.stats.parse_errors
                    );
                    return Ok(batch);
                }
                Err(e @ IpLocatorError::Cancelled(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.max_attempts,
                        source.name,
                        e.message()
                    );
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.message().to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(IpLocatorError::feed_fetch(format!(
            "source {} ({}) failed after {} attempts: {}",
            source.name, source.url, self.max_attempts, last
        )))
    }
}

/// 逐行解析一个完整的 feed
///
/// 单行超过 `max_line_bytes` 视为流错误；非 UTF-8 行计为解析错误。
pub fn parse_feed<R: BufRead>(
    mut reader: R,
    max_line_bytes: usize,
    cancel: &CancellationToken,
) -> Result<FeedBatch> {
    let mut batch = FeedBatch::default();
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let limit = max_line_bytes as u64 + 1;

    loop {
        buf.clear();
        let read = Read::take(&mut reader, limit)
            .read_until(b'\n', &mut buf)
            .map_err(|e| IpLocatorError::feed_fetch(format!("read error: {}", e)))?;
        if read == 0 {
            break;
        }

        let content = match buf.last() {
            Some(b'\n') => &buf[..buf.len() - 1],
            _ => &buf[..],
        };
        if content.len() > max_line_bytes {
            return Err(IpLocatorError::feed_fetch(format!(
                "line {} exceeds {} bytes",
                batch.stats.lines + 1,
                max_line_bytes
            )));
        }

        batch.stats.lines += 1;
        if batch.stats.lines % CANCEL_CHECK_LINES == 0 && cancel.is_cancelled() {
            return Err(IpLocatorError::cancelled("feed parsing cancelled"));
        }

        let line = match std::str::from_utf8(content) {
            Ok(l) => l,
            Err(_) => {
                batch.stats.parse_errors += 1;
                trace!("Line {} is not valid UTF-8", batch.stats.lines);
                continue;
            }
        };

        match parse_line(line) {
            LineOutcome::Range(range) => {
                match range.family {
                    AddressFamily::V4 => batch.stats.ipv4 += 1,
                    AddressFamily::V6 => batch.stats.ipv6 += 1,
                }
                batch.ranges.push(range);
            }
            LineOutcome::Skipped(_) => batch.stats.skipped += 1,
            LineOutcome::Invalid(e) => {
                batch.stats.parse_errors += 1;
                trace!("Line {}: {}", batch.stats.lines, e);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(IpLocatorError::cancelled("feed parsing cancelled"));
    }

    Ok(batch)
}

/// 解析本地文件（CLI `parse` 子命令）
pub fn parse_feed_file<P: AsRef<Path>>(path: P, max_line_bytes: usize) -> Result<FeedBatch> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| {
        IpLocatorError::file_operation(format!(
            "Failed to open {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    parse_feed(
        std::io::BufReader::new(file),
        max_line_bytes,
        &CancellationToken::new(),
    )
}
