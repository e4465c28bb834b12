use serde::Deserialize;
use std::{fs, io, time::Duration};
use time::UtcOffset;
use volume_client::domain::PeriodToken;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MONEY_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Offset used to compute "current window" boundaries.
    pub utc_offset_minutes: i32,
    /// Row cap for the raw listing routes.
    pub recent_limit: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            utc_offset_minutes: 0,
            recent_limit: 50,
        }
    }
}

impl ServerConfig {
    pub fn utc_offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes.saturating_mul(60))
            .map_err(|e| anyhow::anyhow!("invalid server.utc_offset_minutes: {e}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 100,
            min_connections: 5,
            max_lifetime_secs: 60 * 60,
            idle_timeout_secs: 15 * 60,
            acquire_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Maximum number of buckets returned per period.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeriodsConfig {
    pub second: i64,
    pub minute: i64,
    pub hour: i64,
    pub day: i64,
    pub week: i64,
    pub month: i64,
    pub year: i64,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            second: 60,
            minute: 60,
            hour: 24,
            day: 30,
            week: 21,
            month: 12,
            year: 10,
        }
    }
}

impl PeriodsConfig {
    pub fn row_limit(&self, period: PeriodToken) -> i64 {
        match period {
            PeriodToken::Second => self.second,
            PeriodToken::Minute => self.minute,
            PeriodToken::Hour => self.hour,
            PeriodToken::Day => self.day,
            PeriodToken::Week => self.week,
            PeriodToken::Month => self.month,
            PeriodToken::Year => self.year,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoneyConfig {
    pub multiplier: f64,
}

impl Default for MoneyConfig {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MONEY_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PopulateConfig {
    /// Mounts `POST /populate-volumes` when set.
    pub enabled: bool,
    /// Fixed number of days before today to fill, not calendar years: 365
    /// stops one day short of the same date last year when the span holds a
    /// February 29th. Today is always included.
    pub days: u32,
    pub per_day: u32,
    pub max_value: f64,
    pub concurrency: usize,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            days: 365,
            per_day: 100,
            max_value: 100.0,
            concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub periods: PeriodsConfig,
    pub money: MoneyConfig,
    pub populate: PopulateConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from the TOML file named by `VOLUME_CONFIG` (falling back to
    /// `volume-service.toml`), then apply `DATABASE_URL` / `PORT`.
    ///
    /// The default file may be absent; an explicitly named one may not.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let explicit = env::var("VOLUME_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "volume-service.toml".to_string());

        let mut cfg = match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound && explicit.is_none() => Self::default(),
            Err(e) => return Err(anyhow::anyhow!("failed to read config '{path}': {e}")),
        };

        cfg.apply_env_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make every request on a route fail or come back empty.
    pub fn validate(&self) -> anyhow::Result<()> {
        for period in PeriodToken::ALL {
            let limit = self.periods.row_limit(period);
            if limit < 1 {
                anyhow::bail!("periods.{period} must be at least 1, got {limit}");
            }
        }

        if self.server.recent_limit < 1 {
            anyhow::bail!("server.recent_limit must be at least 1, got {}", self.server.recent_limit);
        }

        if self.populate.concurrency < 1 {
            anyhow::bail!("populate.concurrency must be at least 1");
        }

        if !self.money.multiplier.is_finite() {
            anyhow::bail!("money.multiplier must be a finite number");
        }

        self.server.utc_offset()?;
        Ok(())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database.url = url;
        }

        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{port}': {e}"))?;
        }

        Ok(())
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        if self.database.url.is_empty() {
            anyhow::bail!("database url missing: set DATABASE_URL or database.url");
        }
        Ok(&self.database.url)
    }
}
