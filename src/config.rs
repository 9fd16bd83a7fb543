use crate::domain::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub pool_feed_url: String,
    pub feed: FeedConfig,
    pub strategy: StrategyConfig,
}

/// Request/retry policy for the pool feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Strategy policy shared by the lifecycle manager and the analytics engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub tick_interval: Duration,
    /// Admission floor, in percent per month.
    pub min_monthly_yield: Decimal,
    pub min_tvl_usd: Decimal,
    /// Admission ceiling on annual yield, in percent.
    pub max_yearly_yield: Decimal,
    pub max_active_positions: usize,
    pub exit_monthly_yield: Decimal,
    pub exit_tvl_usd: Decimal,
    /// Fixed allocation per position, in USD.
    pub stake_usd: f64,
    pub initial_capital_usd: f64,
    pub fees: FeeSchedule,
    /// Receives the safe-chain score bonus.
    pub safe_chain: String,
    pub established_chains: Vec<String>,
    pub reputable_projects: Vec<String>,
    pub lookback_days: i64,
    pub model_impermanent_loss: bool,
    pub compounding: bool,
}

/// Flat entry/exit fee: one rate for the primary chain, one for every other chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSchedule {
    pub primary_chain: String,
    pub primary_chain_fee_usd: f64,
    pub other_chain_fee_usd: f64,
}

impl FeeSchedule {
    pub fn fee_for(&self, chain: &str) -> f64 {
        if chain.eq_ignore_ascii_case(&self.primary_chain) {
            self.primary_chain_fee_usd
        } else {
            self.other_chain_fee_usd
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let max_active_positions = 5;
        let stake_usd = 1000.0;
        Self {
            tick_interval: Duration::from_secs(600),
            min_monthly_yield: Decimal::from(50),
            min_tvl_usd: Decimal::from(500_000),
            max_yearly_yield: Decimal::from(5000),
            max_active_positions,
            exit_monthly_yield: Decimal::from(48),
            exit_tvl_usd: Decimal::from(250_000),
            stake_usd,
            initial_capital_usd: stake_usd * max_active_positions as f64,
            fees: FeeSchedule {
                primary_chain: "Ethereum".to_string(),
                primary_chain_fee_usd: 25.0,
                other_chain_fee_usd: 2.0,
            },
            safe_chain: "Ethereum".to_string(),
            established_chains: ["Arbitrum", "Optimism", "Base", "Polygon", "BSC", "Avalanche"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reputable_projects: [
                "uniswap",
                "curve",
                "aave",
                "balancer",
                "sushiswap",
                "pancakeswap",
                "convex",
                "yearn",
                "velodrome",
                "aerodrome",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            lookback_days: 30,
            model_impermanent_loss: true,
            compounding: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let pool_feed_url = env_map
            .get("POOL_FEED_URL")
            .cloned()
            .unwrap_or_else(|| "https://yields.llama.fi".to_string());

        let feed_defaults = FeedConfig::default();
        let feed = FeedConfig {
            timeout: Duration::from_secs(parse_or(
                &env_map,
                "FEED_TIMEOUT_SECS",
                feed_defaults.timeout.as_secs(),
                "must be a whole number of seconds",
            )?),
            max_attempts: parse_or(
                &env_map,
                "FEED_MAX_ATTEMPTS",
                feed_defaults.max_attempts,
                "must be a valid u32",
            )?,
            retry_delay: Duration::from_secs(parse_or(
                &env_map,
                "FEED_RETRY_DELAY_SECS",
                feed_defaults.retry_delay.as_secs(),
                "must be a whole number of seconds",
            )?),
        };
        if feed.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "FEED_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let strategy = parse_strategy(&env_map)?;

        Ok(Config {
            port,
            database_path,
            pool_feed_url,
            feed,
            strategy,
        })
    }
}

fn parse_strategy(env_map: &HashMap<String, String>) -> Result<StrategyConfig, ConfigError> {
    let defaults = StrategyConfig::default();

    let tick_secs = parse_or(
        env_map,
        "TICK_INTERVAL_SECS",
        defaults.tick_interval.as_secs(),
        "must be a whole number of seconds",
    )?;
    if tick_secs == 0 {
        return Err(ConfigError::InvalidValue(
            "TICK_INTERVAL_SECS".to_string(),
            "must be greater than zero".to_string(),
        ));
    }

    let max_active_positions = parse_or(
        env_map,
        "MAX_ACTIVE_POSITIONS",
        defaults.max_active_positions,
        "must be a valid usize",
    )?;
    let stake_usd = parse_positive_f64(env_map, "STAKE_USD", defaults.stake_usd)?;
    let initial_capital_usd = parse_positive_f64(
        env_map,
        "INITIAL_CAPITAL_USD",
        stake_usd * max_active_positions as f64,
    )?;

    let primary_chain = env_map
        .get("PRIMARY_CHAIN")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.fees.primary_chain.clone());

    Ok(StrategyConfig {
        tick_interval: Duration::from_secs(tick_secs),
        min_monthly_yield: parse_decimal_or(
            env_map,
            "MIN_MONTHLY_YIELD",
            defaults.min_monthly_yield,
        )?,
        min_tvl_usd: parse_decimal_or(env_map, "MIN_TVL_USD", defaults.min_tvl_usd)?,
        max_yearly_yield: parse_decimal_or(
            env_map,
            "MAX_YEARLY_YIELD",
            defaults.max_yearly_yield,
        )?,
        max_active_positions,
        exit_monthly_yield: parse_decimal_or(
            env_map,
            "EXIT_MONTHLY_YIELD",
            defaults.exit_monthly_yield,
        )?,
        exit_tvl_usd: parse_decimal_or(env_map, "EXIT_TVL_USD", defaults.exit_tvl_usd)?,
        stake_usd,
        initial_capital_usd,
        fees: FeeSchedule {
            primary_chain: primary_chain.clone(),
            primary_chain_fee_usd: parse_non_negative_f64(
                env_map,
                "PRIMARY_CHAIN_FEE_USD",
                defaults.fees.primary_chain_fee_usd,
            )?,
            other_chain_fee_usd: parse_non_negative_f64(
                env_map,
                "OTHER_CHAIN_FEE_USD",
                defaults.fees.other_chain_fee_usd,
            )?,
        },
        safe_chain: primary_chain,
        established_chains: parse_list_or(
            env_map,
            "ESTABLISHED_CHAINS",
            defaults.established_chains,
        ),
        reputable_projects: parse_list_or(
            env_map,
            "REPUTABLE_PROJECTS",
            defaults.reputable_projects,
        ),
        lookback_days: parse_or(
            env_map,
            "LOOKBACK_DAYS",
            defaults.lookback_days,
            "must be a valid i64",
        )?,
        model_impermanent_loss: parse_bool_or(
            env_map,
            "MODEL_IMPERMANENT_LOSS",
            defaults.model_impermanent_loss,
        )?,
        compounding: parse_bool_or(env_map, "COMPOUNDING", defaults.compounding)?,
    })
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    hint: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), hint.to_string())),
        None => Ok(default),
    }
}

fn parse_decimal_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Decimal,
) -> Result<Decimal, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a decimal number")?;
    if value.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

fn parse_positive_f64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a number")?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn parse_non_negative_f64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a number")?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

fn parse_bool_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("must be true or false, got {}", other),
            )),
        },
    }
}

fn parse_list_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Vec<String>,
) -> Vec<String> {
    match env_map.get(key) {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.pool_feed_url, "https://yields.llama.fi");
        assert_eq!(config.feed, FeedConfig::default());
        assert_eq!(config.strategy, StrategyConfig::default());
        assert_eq!(config.strategy.initial_capital_usd, 5000.0);
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_strategy_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("MAX_ACTIVE_POSITIONS".to_string(), "3".to_string());
        env_map.insert("STAKE_USD".to_string(), "250".to_string());
        env_map.insert("EXIT_MONTHLY_YIELD".to_string(), "12.5".to_string());
        env_map.insert("PRIMARY_CHAIN".to_string(), "Solana".to_string());
        env_map.insert("ESTABLISHED_CHAINS".to_string(), " Base, ,Sui ".to_string());
        env_map.insert("COMPOUNDING".to_string(), "false".to_string());

        let strategy = Config::from_env_map(env_map).unwrap().strategy;
        assert_eq!(strategy.max_active_positions, 3);
        assert_eq!(strategy.stake_usd, 250.0);
        assert_eq!(strategy.initial_capital_usd, 750.0);
        assert_eq!(
            strategy.exit_monthly_yield,
            Decimal::from_str_canonical("12.5").unwrap()
        );
        assert_eq!(strategy.fees.primary_chain, "Solana");
        assert_eq!(strategy.safe_chain, "Solana");
        assert_eq!(strategy.established_chains, vec!["Base", "Sui"]);
        assert!(!strategy.compounding);
        assert!(strategy.model_impermanent_loss);
    }

    #[test]
    fn test_invalid_bool_flag() {
        let mut env_map = setup_required_env();
        env_map.insert("MODEL_IMPERMANENT_LOSS".to_string(), "maybe".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MODEL_IMPERMANENT_LOSS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_stake_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("STAKE_USD".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "STAKE_USD"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_feed_attempts_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("FEED_MAX_ATTEMPTS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FEED_MAX_ATTEMPTS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_fee_schedule_lookup() {
        let fees = StrategyConfig::default().fees;
        assert_eq!(fees.fee_for("Ethereum"), 25.0);
        assert_eq!(fees.fee_for("ethereum"), 25.0);
        assert_eq!(fees.fee_for("Arbitrum"), 2.0);
    }
}
