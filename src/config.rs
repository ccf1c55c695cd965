/// Configuration
///
/// Environment-variable-driven settings, loaded once into a global
/// `OnceCell`, the same singleton idiom the teacher used for its
/// `config.toml`-backed config, switched from a file source to
/// `config::Environment` per spec §6.
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::errors::AppError;

static GLOBAL_SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone)]
pub struct Settings {
    pub eth_ws_url: String,
    pub eth_http_url: String,
    pub kafka_brokers: String,
    pub kafka_topic: String,
    pub confirmations: u64,
    pub reorg_depth: u64,
    pub addresses_file: String,
    pub head_poll_interval: Duration,
    pub ws_reconnect_floor: Duration,
    pub ws_reconnect_ceil: Duration,
    pub checkpoint_file: String,
    pub bootstrap_blocks: u64,
    pub service_port: u16,
}

fn parse_duration_env(raw: &str) -> Result<Duration, AppError> {
    let raw = raw.trim();
    if let Some(body) = raw.strip_suffix('s') {
        let secs: f64 = body
            .parse()
            .map_err(|_| AppError::Config(format!("invalid duration '{raw}'")))?;
        return Ok(Duration::from_secs_f64(secs));
    }
    let secs: f64 = raw
        .parse()
        .map_err(|_| AppError::Config(format!("invalid duration '{raw}'")))?;
    Ok(Duration::from_secs_f64(secs))
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        let source = config::Config::builder()
            .set_default("KAFKA_TOPIC", "tx_events")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("CONFIRMATIONS", 3)
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("REORG_DEPTH", 12)
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("ADDRESSES_FILE", "./addresses.csv")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("HEAD_POLL_INTERVAL", "3s")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("WS_RECONNECT_FLOOR", "1s")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("WS_RECONNECT_CEIL", "30s")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("CHECKPOINT_FILE", "./data/checkpoint.json")
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("BOOTSTRAP_BLOCKS", 0)
            .map_err(|e| AppError::Config(e.to_string()))?
            .set_default("SERVICE_PORT", 8080)
            .map_err(|e| AppError::Config(e.to_string()))?
            .add_source(config::Environment::default())
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let eth_ws_url: String = source
            .get_string("ETH_WS_URL")
            .map_err(|_| AppError::Config("ETH_WS_URL is required".into()))?;
        let eth_http_url: String = source
            .get_string("ETH_HTTP_URL")
            .map_err(|_| AppError::Config("ETH_HTTP_URL is required".into()))?;
        let kafka_brokers: String = source
            .get_string("KAFKA_BROKERS")
            .map_err(|_| AppError::Config("KAFKA_BROKERS is required".into()))?;

        let head_poll_interval = parse_duration_env(&source.get_string("HEAD_POLL_INTERVAL").unwrap())?;
        let ws_reconnect_floor = parse_duration_env(&source.get_string("WS_RECONNECT_FLOOR").unwrap())?;
        let ws_reconnect_ceil = parse_duration_env(&source.get_string("WS_RECONNECT_CEIL").unwrap())?;

        Ok(Settings {
            eth_ws_url,
            eth_http_url,
            kafka_brokers,
            kafka_topic: source.get_string("KAFKA_TOPIC").unwrap(),
            confirmations: source
                .get_int("CONFIRMATIONS")
                .map_err(|e| AppError::Config(e.to_string()))? as u64,
            reorg_depth: source
                .get_int("REORG_DEPTH")
                .map_err(|e| AppError::Config(e.to_string()))? as u64,
            addresses_file: source.get_string("ADDRESSES_FILE").unwrap(),
            head_poll_interval,
            ws_reconnect_floor,
            ws_reconnect_ceil,
            checkpoint_file: source.get_string("CHECKPOINT_FILE").unwrap(),
            bootstrap_blocks: source
                .get_int("BOOTSTRAP_BLOCKS")
                .map_err(|e| AppError::Config(e.to_string()))? as u64,
            service_port: source
                .get_int("SERVICE_PORT")
                .map_err(|e| AppError::Config(e.to_string()))? as u16,
        })
    }
}

pub fn init_global_settings() -> Result<(), AppError> {
    let settings = Settings::load()?;
    GLOBAL_SETTINGS
        .set(settings)
        .map_err(|_| AppError::Startup("settings already initialized".into()))
}

pub fn get_global_settings() -> &'static Settings {
    GLOBAL_SETTINGS
        .get()
        .expect("settings not initialized - call init_global_settings() first")
}
