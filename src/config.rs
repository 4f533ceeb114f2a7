use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Default lottery seeded at startup
#[derive(Debug, Clone)]
pub struct LotteryDefaults {
    pub code: String,
    pub name: String,
    pub period_seconds: i32,
    pub lock_ahead_seconds: i32,
}

/// Draw result provider polling
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub url: String,
    pub poll_seconds: u64,
    pub timeout_secs: u64,
    /// Offset applied to naive provider timestamps (provider clock is UTC+8)
    pub source_utc_offset_seconds: i32,
}

/// Periodic job cadence and misfire grace windows
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub window_tick_seconds: u64,
    pub settlement_interval_seconds: u64,
    pub collector_grace_secs: u64,
    pub window_tick_grace_secs: u64,
    pub settlement_grace_secs: u64,
}

/// Settlement engine tuning
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub batch_limit: i64,
}

/// Projection cache sizing
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub history_cap: usize,
    pub current_round_ttl_secs: u64,
}

/// Order placement policy
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub max_selections: usize,
    /// Advance freshly inserted orders straight to awaiting-settlement
    pub auto_advance: bool,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log_level: String,
    pub log_format: String,
    pub environment: String,
    pub lottery: LotteryDefaults,
    pub collector: CollectorConfig,
    pub scheduler: SchedulerConfig,
    pub settlement: SettlementConfig,
    pub cache: CacheConfig,
    pub orders: OrderConfig,
}

/// Parse an optional env var, falling back to `default` when absent or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32);
        let acquire_timeout_secs = env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64);
        let idle_timeout_secs = env_or("DATABASE_IDLE_TIMEOUT_SECS", 600u64); // 10 minutes
        let max_lifetime_secs = env_or("DATABASE_MAX_LIFETIME_SECS", 1800u64); // 30 minutes
        let test_before_acquire = env_or("DATABASE_TEST_BEFORE_ACQUIRE", true);

        // Validate configuration
        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/sum28".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl Default for LotteryDefaults {
    fn default() -> Self {
        Self {
            code: "jnd28".to_string(),
            name: "Canada 28".to_string(),
            period_seconds: 210,
            lock_ahead_seconds: 3,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            url: "https://cs00.vip/data/last/jnd28.json".to_string(),
            poll_seconds: 5,
            timeout_secs: 10,
            source_utc_offset_seconds: 8 * 3600,
        }
    }
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_tick_seconds: 1,
            settlement_interval_seconds: 2,
            collector_grace_secs: 10,
            window_tick_grace_secs: 5,
            settlement_grace_secs: 10,
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { batch_limit: 200 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            history_cap: 200,
            current_round_ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn current_round_ttl(&self) -> Duration {
        Duration::from_secs(self.current_round_ttl_secs)
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            max_selections: 10,
            auto_advance: true,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        let lottery_defaults = LotteryDefaults::default();
        let lottery = LotteryDefaults {
            code: env::var("LOTTERY_DEFAULT_CODE").unwrap_or(lottery_defaults.code),
            name: env::var("LOTTERY_DEFAULT_NAME").unwrap_or(lottery_defaults.name),
            period_seconds: env_or("LOTTERY_DEFAULT_PERIOD_SECONDS", lottery_defaults.period_seconds),
            lock_ahead_seconds: env_or("BET_LOCK_AHEAD_SECONDS", lottery_defaults.lock_ahead_seconds),
        };

        if lottery.period_seconds <= 0 {
            return Err("LOTTERY_DEFAULT_PERIOD_SECONDS must be greater than 0".to_string());
        }
        if lottery.lock_ahead_seconds < 0 || lottery.lock_ahead_seconds >= lottery.period_seconds {
            return Err(
                "BET_LOCK_AHEAD_SECONDS must be non-negative and shorter than the period".to_string(),
            );
        }

        let collector_defaults = CollectorConfig::default();
        let collector = CollectorConfig {
            url: env::var("COLLECTOR_URL").unwrap_or(collector_defaults.url),
            poll_seconds: env_or("COLLECTOR_POLL_SECONDS", collector_defaults.poll_seconds),
            timeout_secs: env_or("COLLECTOR_TIMEOUT_SECS", collector_defaults.timeout_secs),
            source_utc_offset_seconds: env_or(
                "DRAW_SOURCE_UTC_OFFSET_SECONDS",
                collector_defaults.source_utc_offset_seconds,
            ),
        };

        if collector.poll_seconds == 0 {
            return Err("COLLECTOR_POLL_SECONDS must be greater than 0".to_string());
        }
        if collector.source_utc_offset_seconds.abs() >= 24 * 3600 {
            return Err("DRAW_SOURCE_UTC_OFFSET_SECONDS must be within one day".to_string());
        }

        let scheduler_defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            window_tick_seconds: env_or("WINDOW_TICK_SECONDS", scheduler_defaults.window_tick_seconds),
            settlement_interval_seconds: env_or(
                "SETTLEMENT_INTERVAL_SECONDS",
                scheduler_defaults.settlement_interval_seconds,
            ),
            ..scheduler_defaults
        };

        if scheduler.window_tick_seconds == 0 || scheduler.settlement_interval_seconds == 0 {
            return Err("Scheduler intervals must be greater than 0".to_string());
        }

        let settlement = SettlementConfig {
            batch_limit: env_or("SETTLEMENT_BATCH_LIMIT", SettlementConfig::default().batch_limit),
        };
        if settlement.batch_limit <= 0 {
            return Err("SETTLEMENT_BATCH_LIMIT must be greater than 0".to_string());
        }

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            history_cap: env_or("HISTORY_CAP", cache_defaults.history_cap),
            current_round_ttl_secs: env_or(
                "CURRENT_ROUND_TTL_SECONDS",
                cache_defaults.current_round_ttl_secs,
            ),
        };
        if cache.history_cap == 0 {
            return Err("HISTORY_CAP must be greater than 0".to_string());
        }

        let order_defaults = OrderConfig::default();
        let orders = OrderConfig {
            max_selections: env_or("ORDER_MAX_SELECTIONS", order_defaults.max_selections),
            auto_advance: env_or("ORDER_AUTO_ADVANCE", order_defaults.auto_advance),
        };
        if orders.max_selections == 0 {
            return Err("ORDER_MAX_SELECTIONS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            environment: environment.to_lowercase(),
            lottery,
            collector,
            scheduler,
            settlement,
            cache,
            orders,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Whether logs should be emitted as JSON lines
    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            environment: "development".to_string(),
            lottery: LotteryDefaults::default(),
            collector: CollectorConfig::default(),
            scheduler: SchedulerConfig::default(),
            settlement: SettlementConfig::default(),
            cache: CacheConfig::default(),
            orders: OrderConfig::default(),
        }
    }
}
