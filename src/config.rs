use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Moderation configuration: denylist, link patterns, strike policy
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Case-insensitive substring denylist
    pub denylist: Vec<String>,
    /// Regex patterns flagging links, domains and platform handles
    pub link_patterns: Vec<String>,
    /// Strikes before a suspension is issued
    pub strike_threshold: u32,
    /// Suspension length in hours
    pub suspension_hours: i64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub moderation: ModerationConfig,
    pub log_level: String,
    pub environment: String,
    /// Transport id of the administrator reviewing payment claims
    pub admin_id: i64,
    /// Card number shown to users buying credits
    pub payment_card: String,
    /// Price of revealing a chat partner's profile
    pub reveal_cost: i64,
    /// Advertised credit packages, smallest first
    pub credit_packages: Vec<i64>,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://anonchat.db?mode=rwc".to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

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
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://anonchat.db?mode=rwc".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl ModerationConfig {
    /// Create moderation config from environment variables
    ///
    /// `DENYLIST` is comma-separated; `LINK_PATTERNS` is semicolon-separated
    /// because regex repetition bounds contain commas.
    pub fn from_env() -> Result<Self, String> {
        let denylist = env::var("DENYLIST")
            .map(|s| {
                s.split(',')
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let link_patterns = env::var("LINK_PATTERNS")
            .map(|s| {
                s.split(';')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(Self::default_link_patterns);

        let strike_threshold = env::var("STRIKE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        let suspension_hours = env::var("SUSPENSION_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);

        if strike_threshold == 0 {
            return Err("STRIKE_THRESHOLD must be greater than 0".to_string());
        }

        if suspension_hours <= 0 {
            return Err("SUSPENSION_HOURS must be greater than 0".to_string());
        }

        Ok(Self {
            denylist,
            link_patterns,
            strike_threshold,
            suspension_hours,
        })
    }

    /// Built-in link patterns: raw URLs, bare domains, t.me links and
    /// platform handles (@ followed by at least 5 word characters)
    pub fn default_link_patterns() -> Vec<String> {
        vec![
            r"https?://\S+".to_string(),
            r"www\.\S+".to_string(),
            r"t\.me/\S+".to_string(),
            r"@[A-Za-z0-9_]{5,}".to_string(),
        ]
    }

    /// Get suspension length as a chrono duration
    pub fn suspension_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.suspension_hours)
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            denylist: Vec::new(),
            link_patterns: Self::default_link_patterns(),
            strike_threshold: 3,
            suspension_hours: 24,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let moderation = ModerationConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let admin_id = env::var("ADMIN_ID")
            .map_err(|_| "ADMIN_ID environment variable is required")?
            .parse::<i64>()
            .map_err(|_| "ADMIN_ID must be a numeric transport id".to_string())?;

        let payment_card = env::var("PAYMENT_CARD").unwrap_or_else(|_| "0000 0000 0000 0000".to_string());

        let reveal_cost = env::var("REVEAL_COST")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(50);

        let credit_packages = env::var("CREDIT_PACKAGES")
            .map(|s| {
                s.split(',')
                    .filter_map(|p| p.trim().parse::<i64>().ok())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec![100, 200, 500]);

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
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

        if reveal_cost <= 0 {
            return Err("REVEAL_COST must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            moderation,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
            admin_id,
            payment_card,
            reveal_cost,
            credit_packages,
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

    /// Smallest advertised credit package, used as the provisional claim amount
    pub fn smallest_package(&self) -> i64 {
        self.credit_packages.iter().copied().min().unwrap_or(100)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            moderation: ModerationConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            admin_id: 0,
            payment_card: "0000 0000 0000 0000".to_string(),
            reveal_cost: 50,
            credit_packages: vec![100, 200, 500],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout_secs, 30);
    }

    #[test]
    fn test_moderation_config_default() {
        let config = ModerationConfig::default();
        assert_eq!(config.strike_threshold, 3);
        assert_eq!(config.suspension_hours, 24);
        assert_eq!(config.link_patterns.len(), 4);
        assert!(config.denylist.is_empty());
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.reveal_cost, 50);
        assert_eq!(config.smallest_package(), 100);
        assert!(config.is_development());
        assert!(!config.is_production());
    }
}
