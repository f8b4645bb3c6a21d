//! Client configuration
//!
//! # 环境变量
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | GYM_DEDUP_INTERVAL_MS | 5000 | 重新验证的去重窗口(毫秒) |
//! | GYM_MIN_REFRESH_INTERVAL_MS | 1000 | 自动刷新最小间隔(毫秒) |
//! | GYM_DAY_CHECK_INTERVAL_MS | 60000 | 跨日检查间隔(毫秒) |
//! | GYM_NOTICE_CAPACITY | 64 | 提示通道容量 |
//! | GYM_STORE_URL | http://localhost:54321 | 远端存储地址 |
//! | GYM_STORE_API_KEY | (空) | 存储 API key |
//! | GYM_SERVICE_URL | http://localhost:3000 | 支付链接/推荐服务地址 |
//! | GYM_REQUEST_TIMEOUT_SECS | 30 | HTTP 请求超时(秒) |

use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Reconciling cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// `revalidate()` reuses a snapshot fetched within this window
    pub dedup_interval: Duration,
    /// Minimum gap between two change-triggered refreshes
    pub min_refresh_interval: Duration,
    /// How often the resync worker checks whether the business date changed
    pub day_check_interval: Duration,
    /// Capacity of the notice broadcast channel
    pub notice_capacity: usize,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self {
            dedup_interval: Duration::from_millis(5000),
            min_refresh_interval: Duration::from_millis(1000),
            day_check_interval: Duration::from_secs(60),
            notice_capacity: 64,
        }
    }

    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            dedup_interval: env_parse("GYM_DEDUP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.dedup_interval),
            min_refresh_interval: env_parse("GYM_MIN_REFRESH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_refresh_interval),
            day_check_interval: env_parse("GYM_DAY_CHECK_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.day_check_interval),
            notice_capacity: env_parse::<usize>("GYM_NOTICE_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.notice_capacity),
        }
    }

    pub fn with_dedup_interval(mut self, interval: Duration) -> Self {
        self.dedup_interval = interval;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn with_day_check_interval(mut self, interval: Duration) -> Self {
        self.day_check_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote store (PostgREST style) connection settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL, e.g. "https://xyz.supabase.co"
    pub base_url: String,
    /// Project API key sent as `apikey`
    pub api_key: String,
    /// Bearer token of the signed-in session
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            token: None,
            timeout: 30,
        }
    }

    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GYM_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:54321".into()),
            api_key: std::env::var("GYM_STORE_API_KEY").unwrap_or_default(),
            token: None,
            timeout: env_parse("GYM_REQUEST_TIMEOUT_SECS").unwrap_or(30),
        }
    }

    /// Set the session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }
}

/// Payment-link / recommendation service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout: u64,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
        }
    }

    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GYM_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            timeout: env_parse("GYM_REQUEST_TIMEOUT_SECS").unwrap_or(30),
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
