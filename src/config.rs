/*!
 * steam-compete config file
 */

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub db_config: DbConfig,
    pub tracing_config: Option<TracingConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DbConfig {
    /// Database URL, overridden by `DATABASE_URL` when set
    pub database_url: String,

    /// Size of the connection pool
    pub max_connections: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TracingConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub filter: Option<String>,

    /// Jaeger agent endpoint, e.g. `127.0.0.1:6831`
    pub jaeger: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = parse_config(&std::fs::read_to_string(path)?)?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.db_config.database_url = url;
    }
    Ok(config)
}

fn parse_config(raw: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(raw)
}
