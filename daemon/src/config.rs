//! Daemon configuration (§10.3): the engine's own `Config` plus the
//! process-level fields (bind port, log level). Parsed the same way as the
//! engine config: a TOML file with every field defaulted, so a missing or
//! partial file still produces a usable configuration.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub engine: emm_attach::config::Config,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            log_level: "info".to_string(),
            engine: emm_attach::config::Config::default(),
        }
    }
}

pub async fn parse_config<P>(path: P) -> Result<Config, DaemonError>
where
    P: AsRef<std::path::Path>,
{
    if let Ok(config_file) = tokio::fs::read_to_string(&path).await {
        Ok(toml::from_str(&config_file).map_err(DaemonError::ConfigFileParsingError)?)
    } else {
        warn!("unable to read config file, using default config");
        Ok(Config::default())
    }
}

pub struct Args {
    pub config_path: String,
}

pub fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} /path/to/config/file", args[0]);
        std::process::exit(1);
    }
    Args {
        config_path: args[1].clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let config = parse_config("/nonexistent/path/does-not-exist.toml")
            .await
            .unwrap();
        assert_eq!(config.port, Config::default().port);
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "port = 9090\n").await.unwrap();

        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(
            config.engine.gummei.mcc,
            emm_attach::config::Config::default().gummei.mcc
        );
    }
}
