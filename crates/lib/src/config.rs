//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.herald/config.json`) and environment.
//! Secrets are usually supplied through the environment; see [`Settings::resolve`].

use crate::relay::attachment::{AttachmentPolicy, MAX_ATTACHMENT_BYTES, WARN_ATTACHMENT_BYTES};
use crate::relay::command::DEFAULT_MINIMUM_WORD_COUNT;
use crate::relay::RelaySettings;
use crate::webex::DEFAULT_API_BASE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "HERALD_CONFIG_PATH";
pub const ENV_BOT_TOKEN: &str = "ANNOUNCE_BOT_TOKEN";
pub const ENV_ADMIN_ROOM: &str = "ANNOUNCE_ADMIN_ROOM";
pub const ENV_WEBHOOK_SECRET: &str = "ANNOUNCE_SECRET";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Webex credentials and API settings.
    #[serde(default)]
    pub webex: WebexConfig,

    /// Broadcast policy.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Gateway bind, port, and webhook route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Route Webex posts webhook deliveries to (default "/webhook").
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Wall-clock budget for handling one event, attachment scan waits included (default 300).
    #[serde(default = "default_event_deadline_secs")]
    pub event_deadline_secs: u64,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_event_deadline_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            webhook_path: default_webhook_path(),
            event_deadline_secs: default_event_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebexConfig {
    /// Bot access token. Overridden by ANNOUNCE_BOT_TOKEN env.
    pub bot_token: Option<String>,
    /// Room id commands are accepted from and reports are posted to. Overridden by ANNOUNCE_ADMIN_ROOM env.
    pub admin_room: Option<String>,
    /// Secret the webhook was registered with. Overridden by ANNOUNCE_SECRET env. When unset, signatures are not checked.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for WebexConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_room: None,
            webhook_secret: None,
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    #[serde(default = "default_minimum_word_count")]
    pub minimum_word_count: usize,
    /// Attachments above this are refused without downloading.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
    /// Attachments above this get a "scanning may take a while" notice.
    #[serde(default = "default_warn_attachment_bytes")]
    pub warn_attachment_bytes: u64,
    /// Give up on a scan-locked attachment after this many download attempts. Unset: wait until the event deadline.
    #[serde(default)]
    pub max_locked_attempts: Option<u32>,
    #[serde(default = "default_restrict_to_admin_room")]
    pub restrict_to_admin_room: bool,
}

fn default_minimum_word_count() -> usize {
    DEFAULT_MINIMUM_WORD_COUNT
}

fn default_max_attachment_bytes() -> u64 {
    MAX_ATTACHMENT_BYTES
}

fn default_warn_attachment_bytes() -> u64 {
    WARN_ATTACHMENT_BYTES
}

fn default_restrict_to_admin_room() -> bool {
    true
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            minimum_word_count: default_minimum_word_count(),
            max_attachment_bytes: default_max_attachment_bytes(),
            warn_attachment_bytes: default_warn_attachment_bytes(),
            max_locked_attempts: None,
            restrict_to_admin_room: default_restrict_to_admin_room(),
        }
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".herald").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, the default path, or HERALD_CONFIG_PATH. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Trimmed, non-empty value: env first, then config.
fn env_or_config(env_value: Option<String>, config_value: Option<&String>) -> Option<String> {
    env_value
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config_value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Everything the gateway and relay need, with env overrides applied and required values checked.
#[derive(Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub webhook_path: String,
    pub event_deadline: Duration,
    pub bot_token: String,
    pub webhook_secret: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub relay: RelaySettings,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn resolve(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(config: &Config, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let Some(bot_token) = env_or_config(env(ENV_BOT_TOKEN), config.webex.bot_token.as_ref())
        else {
            anyhow::bail!(
                "no bot token configured (set webex.botToken or {})",
                ENV_BOT_TOKEN
            );
        };
        let Some(admin_room) = env_or_config(env(ENV_ADMIN_ROOM), config.webex.admin_room.as_ref())
        else {
            anyhow::bail!(
                "no admin room configured (set webex.adminRoom or {})",
                ENV_ADMIN_ROOM
            );
        };
        let webhook_secret = env_or_config(
            env(ENV_WEBHOOK_SECRET),
            config.webex.webhook_secret.as_ref(),
        );

        let webhook_path = config.gateway.webhook_path.trim();
        if !webhook_path.starts_with('/') || webhook_path == "/" {
            anyhow::bail!(
                "gateway.webhookPath must start with '/' and not be the health route: {:?}",
                webhook_path
            );
        }
        let broadcast = &config.broadcast;
        if broadcast.warn_attachment_bytes > broadcast.max_attachment_bytes {
            log::warn!(
                "broadcast.warnAttachmentBytes ({}) is above maxAttachmentBytes ({}); the notice will never be sent",
                broadcast.warn_attachment_bytes,
                broadcast.max_attachment_bytes
            );
        }

        Ok(Self {
            bind: config.gateway.bind.trim().to_string(),
            port: config.gateway.port,
            webhook_path: webhook_path.to_string(),
            event_deadline: Duration::from_secs(config.gateway.event_deadline_secs),
            bot_token,
            webhook_secret,
            api_base: config.webex.api_base.trim().to_string(),
            request_timeout: Duration::from_secs(config.webex.request_timeout_secs),
            relay: RelaySettings {
                admin_room,
                minimum_word_count: broadcast.minimum_word_count,
                attachments: AttachmentPolicy {
                    max_bytes: broadcast.max_attachment_bytes,
                    warn_bytes: broadcast.warn_attachment_bytes,
                    max_locked_attempts: broadcast.max_locked_attempts,
                },
                restrict_to_admin_room: broadcast.restrict_to_admin_room,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 15152);
        assert_eq!(g.bind, "127.0.0.1");
        assert_eq!(g.webhook_path, "/webhook");
        assert_eq!(g.event_deadline_secs, 300);
    }

    #[test]
    fn empty_json_gets_every_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.webex.api_base, DEFAULT_API_BASE);
        assert_eq!(config.broadcast.minimum_word_count, 3);
        assert_eq!(config.broadcast.max_attachment_bytes, 104_857_600);
        assert_eq!(config.broadcast.warn_attachment_bytes, 52_428_800);
        assert_eq!(config.broadcast.max_locked_attempts, None);
        assert!(config.broadcast.restrict_to_admin_room);
    }

    #[test]
    fn camel_case_keys_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 8080, "webhookPath": "/hooks/webex" },
                "webex": { "adminRoom": "room-a", "requestTimeoutSecs": 5 },
                "broadcast": { "minimumWordCount": 10, "maxLockedAttempts": 12 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.webhook_path, "/hooks/webex");
        assert_eq!(config.webex.admin_room.as_deref(), Some("room-a"));
        assert_eq!(config.webex.request_timeout_secs, 5);
        assert_eq!(config.broadcast.minimum_word_count, 10);
        assert_eq!(config.broadcast.max_locked_attempts, Some(12));
    }

    #[test]
    fn env_overrides_config() {
        let mut config = Config::default();
        config.webex.bot_token = Some("from-file".to_string());
        config.webex.admin_room = Some("room-file".to_string());
        let settings = Settings::resolve_with(
            &config,
            env(&[(ENV_BOT_TOKEN, " from-env "), (ENV_WEBHOOK_SECRET, "s3cret")]),
        )
        .unwrap();
        assert_eq!(settings.bot_token, "from-env");
        assert_eq!(settings.relay.admin_room, "room-file");
        assert_eq!(settings.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(settings.event_deadline, Duration::from_secs(300));
    }

    #[test]
    fn missing_token_is_fatal() {
        let mut config = Config::default();
        config.webex.admin_room = Some("room".to_string());
        let err = Settings::resolve_with(&config, env(&[(ENV_BOT_TOKEN, "   ")]))
            .err()
            .expect("missing token");
        assert!(err.to_string().contains(ENV_BOT_TOKEN));
    }

    #[test]
    fn missing_admin_room_is_fatal() {
        let err = Settings::resolve_with(&Config::default(), env(&[(ENV_BOT_TOKEN, "t")]))
            .err()
            .expect("missing admin room");
        assert!(err.to_string().contains(ENV_ADMIN_ROOM));
    }

    #[test]
    fn broadcast_policy_flows_into_relay_settings() {
        let mut config = Config::default();
        config.broadcast.minimum_word_count = 7;
        config.broadcast.max_locked_attempts = Some(4);
        config.broadcast.restrict_to_admin_room = false;
        let settings = Settings::resolve_with(
            &config,
            env(&[(ENV_BOT_TOKEN, "t"), (ENV_ADMIN_ROOM, "admin")]),
        )
        .unwrap();
        assert_eq!(settings.relay.minimum_word_count, 7);
        assert_eq!(settings.relay.attachments.max_locked_attempts, Some(4));
        assert_eq!(settings.relay.attachments.max_bytes, MAX_ATTACHMENT_BYTES);
        assert!(!settings.relay.restrict_to_admin_room);
    }

    #[test]
    fn health_route_cannot_be_the_webhook() {
        let mut config = Config::default();
        config.gateway.webhook_path = "/".to_string();
        let result = Settings::resolve_with(
            &config,
            env(&[(ENV_BOT_TOKEN, "t"), (ENV_ADMIN_ROOM, "admin")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn loopback_binds() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }
}
