//! Configuration management for the EditPDF server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::document::{EngineSettings, DEFAULT_RENDER_SCALE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served as the fallback route (browser overlay)
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Largest accepted PDF upload in bytes
    pub max_upload_size: usize,
    pub max_undo: usize,
    pub max_sessions: usize,
    /// Idle minutes before a session is evicted, 0 disables eviction
    pub session_idle_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub default_scale: f32,
    pub cache_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                static_dir: None,
            },
            engine: EngineConfig {
                max_upload_size: 50 * 1024 * 1024,
                max_undo: 20,
                max_sessions: 64,
                session_idle_minutes: 120,
            },
            render: RenderConfig {
                default_scale: DEFAULT_RENDER_SCALE,
                cache_pages: 32,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
                static_dir: match env::var("STATIC_DIR") {
                    Ok(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
                    Ok(_) | Err(env::VarError::NotPresent) => None,
                    Err(e) => return Err(e),
                },
            },
            engine: EngineConfig {
                max_upload_size: parse_var("MAX_UPLOAD_SIZE", defaults.engine.max_upload_size),
                max_undo: parse_var("MAX_UNDO", defaults.engine.max_undo),
                max_sessions: parse_var("MAX_SESSIONS", defaults.engine.max_sessions),
                session_idle_minutes: parse_var(
                    "SESSION_IDLE_MINUTES",
                    defaults.engine.session_idle_minutes,
                ),
            },
            render: RenderConfig {
                default_scale: parse_var("RENDER_SCALE", defaults.render.default_scale),
                cache_pages: parse_var("RENDER_CACHE_PAGES", defaults.render.cache_pages),
            },
        })
    }

    /// Limits handed to the session manager
    pub fn engine_settings(&self) -> EngineSettings {
        let idle_minutes = self.engine.session_idle_minutes;
        EngineSettings {
            max_document_bytes: self.engine.max_upload_size,
            max_undo: self.engine.max_undo,
            max_sessions: self.engine.max_sessions,
            idle_timeout: (idle_minutes > 0).then(|| Duration::from_secs(idle_minutes * 60)),
            render_cache_pages: self.render.cache_pages,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Read and parse a variable, falling back to `default` when unset or malformed.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Ignoring malformed setting");
            default
        }),
        Err(_) => default,
    }
}
