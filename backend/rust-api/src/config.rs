use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// How an attempt that runs out of time is graded.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredGradingPolicy {
    /// Grade whatever was staged before the deadline (zero if nothing was).
    #[default]
    GradeStaged,
    /// Always a zero-score fail.
    ZeroScore,
}

impl FromStr for ExpiredGradingPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "grade_staged" => Ok(ExpiredGradingPolicy::GradeStaged),
            "zero_score" => Ok(ExpiredGradingPolicy::ZeroScore),
            _ => Err(format!("Invalid expired grading policy: {}", value)),
        }
    }
}

/// Product-level attempt rules that sit outside the engine invariants.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct PolicyConfig {
    /// Refuse new attempts once the learner has passed.
    pub block_after_pass: bool,
    pub expired_grading: ExpiredGradingPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Lease on a Redis pair lock; bounds how long a crashed holder blocks others.
    pub ttl_ms: u64,
    /// How long `acquire` waits before giving up.
    pub wait_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            wait_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    /// Base URL of the enrollment service; no check is made when unset.
    pub enrollment_api_url: Option<String>,
    pub bind_addr: String,
    /// `username:password` for the metrics endpoint.
    pub metrics_auth: String,
    pub policy: PolicyConfig,
    pub lock: LockConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the crate-local one.
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/<env>.toml, overridden by APP__SECTION__KEY variables
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .map_err(|_| config::ConfigError::NotFound("database.mongo_uri".to_string()))?;

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizengine".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!("Using default JWT secret (dev mode only)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let enrollment_api_url = settings
            .get_string("enrollment.api_url")
            .or_else(|_| env::var("ENROLLMENT_API_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        let block_after_pass = settings
            .get_bool("policy.block_after_pass")
            .unwrap_or(false);

        let expired_grading = match settings.get_string("policy.expired_grading") {
            Ok(raw) => raw.parse().map_err(config::ConfigError::Message)?,
            Err(_) => ExpiredGradingPolicy::default(),
        };

        let lock_defaults = LockConfig::default();
        let lock = LockConfig {
            ttl_ms: settings
                .get_int("lock.ttl_ms")
                .map(|v| v.max(1) as u64)
                .unwrap_or(lock_defaults.ttl_ms),
            wait_ms: settings
                .get_int("lock.wait_ms")
                .map(|v| v.max(0) as u64)
                .unwrap_or(lock_defaults.wait_ms),
        };

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            enrollment_api_url,
            bind_addr,
            metrics_auth,
            policy: PolicyConfig {
                block_after_pass,
                expired_grading,
            },
            lock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn expired_grading_parses_both_spellings() {
        assert_eq!(
            "grade-staged".parse::<ExpiredGradingPolicy>().unwrap(),
            ExpiredGradingPolicy::GradeStaged
        );
        assert_eq!(
            "ZERO_SCORE".parse::<ExpiredGradingPolicy>().unwrap(),
            ExpiredGradingPolicy::ZeroScore
        );
        assert!("lenient".parse::<ExpiredGradingPolicy>().is_err());
    }

    #[test]
    #[serial]
    fn load_reads_policy_from_environment() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("MONGO_URI", "mongodb://localhost:27017");
        env::set_var("APP__POLICY__BLOCK_AFTER_PASS", "true");
        env::set_var("APP__POLICY__EXPIRED_GRADING", "zero_score");

        let config = Config::load().unwrap();
        assert!(config.policy.block_after_pass);
        assert_eq!(config.policy.expired_grading, ExpiredGradingPolicy::ZeroScore);
        assert_eq!(config.lock.ttl_ms, 10_000);

        env::remove_var("APP__POLICY__BLOCK_AFTER_PASS");
        env::remove_var("APP__POLICY__EXPIRED_GRADING");
        env::remove_var("MONGO_URI");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    #[serial]
    fn load_fails_without_mongo_uri() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::remove_var("MONGO_URI");
        env::remove_var("APP__DATABASE__MONGO_URI");

        assert!(Config::load().is_err());

        env::remove_var("SKIP_ROOT_ENV");
    }
}
