//! Service settings read from the environment.
//!
//! Server and database settings (address, port, `databases.cycles_db.url`)
//! come from Rocket's figment (`Rocket.toml` / `ROCKET_*`); everything the
//! application itself decides lives here.

use std::env;

use crate::cycles::{CycleOrdering, DEFAULT_ORDER_BY};

pub const DEFAULT_PRINCIPAL_HEADER: &str = "X-Forwarded-User";

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| parse_bool(&value))
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_default_ordering(token: Option<&str>) -> CycleOrdering {
    match token {
        Some(token) => token.parse().unwrap_or_else(|err| {
            log::warn!("ignoring CYCLES_DEFAULT_ORDER: {}; using {}", err, DEFAULT_ORDER_BY);
            CycleOrdering::default()
        }),
        None => CycleOrdering::default(),
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Apply embedded migrations during ignition.
    pub run_migrations: bool,
    /// Header carrying the caller identity set by the upstream gateway.
    pub principal_header: String,
    /// Ordering used when a request omits `order_by`.
    pub default_ordering: CycleOrdering,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let default_order = env::var("CYCLES_DEFAULT_ORDER").ok();

        Self {
            run_migrations: env_bool("CYCLES_RUN_MIGRATIONS", true),
            principal_header: env_string("CYCLES_PRINCIPAL_HEADER", DEFAULT_PRINCIPAL_HEADER),
            default_ordering: parse_default_ordering(default_order.as_deref()),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run_migrations: true,
            principal_header: DEFAULT_PRINCIPAL_HEADER.to_string(),
            default_ordering: CycleOrdering::default(),
        }
    }
}
