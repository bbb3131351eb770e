//! Configuration for the mock server.
//!
//! Defines the listener, the config store backend, logging toggles and the
//! wire shape of a single mock route.

use crate::error::RouteRegistrationError;
use crate::matcher::PathPattern;
use crate::table::RouteMethod;
use rand::Rng;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Where route configs are kept
    #[serde(default)]
    pub store: StoreSettings,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,

    /// Routes loaded into the store when it starts out empty
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let StoreSettings::File { path } = &self.store {
            if path.as_os_str().is_empty() {
                anyhow::bail!("File store requires a non-empty path");
            }
        }
        for (i, route) in self.routes.iter().enumerate() {
            route
                .validate()
                .map_err(|e| anyhow::anyhow!("Route {} ({}): {}", i, route.id, e))?;
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Address to bind
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Config store backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreSettings {
    /// Configs live only as long as the process
    #[default]
    Memory,
    /// Configs are persisted as a JSON snapshot
    File { path: PathBuf },
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every matched request
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests no route matched
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One mock endpoint definition.
///
/// The wire shape is camelCase. `url` and `mockData` are accepted as
/// aliases of `path` and `template`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Stable identifier; generated when absent
    #[serde(default = "generate_id", deserialize_with = "de_id")]
    pub id: String,

    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Module grouping for the admin tree
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,

    /// HTTP verb, case-insensitive
    pub method: String,

    /// Path pattern, e.g. `/user/:id`
    #[serde(alias = "url")]
    pub path: String,

    /// Structured template or template text
    #[serde(default, alias = "mockData")]
    pub template: Value,

    /// Artificial latency in milliseconds
    #[serde(default, deserialize_with = "de_delay")]
    pub delay: u64,

    /// Response status
    #[serde(default = "default_status", deserialize_with = "de_status")]
    pub status_code: u16,
}

impl RouteConfig {
    pub fn new(method: impl Into<String>, path: impl Into<String>, template: Value) -> Self {
        Self {
            id: generate_id(),
            name: None,
            module_id: None,
            method: method.into(),
            path: path.into(),
            template,
            delay: 0,
            status_code: default_status(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Check the fields the route table needs. Template syntax is not
    /// checked here; a bad template makes the route answer 500 instead.
    pub fn validate(&self) -> Result<(), RouteRegistrationError> {
        self.method.parse::<RouteMethod>()?;
        PathPattern::compile(&self.path)?;
        if !(100..=599).contains(&self.status_code) {
            return Err(RouteRegistrationError::InvalidStatus(self.status_code));
        }
        Ok(())
    }
}

fn default_status() -> u16 {
    200
}

/// A random version 4 UUID.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>() & 0x0fff,
        (rng.gen::<u16>() & 0x3fff) | 0x8000,
        rng.gen::<u64>() & 0xffff_ffff_ffff,
    )
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(de_opt_id(deserializer)?.unwrap_or_else(generate_id))
}

/// Ids arrive as strings or as numbers from older exports.
fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!("expected string or number id, got {}", other))),
    }
}

/// Numbers or numeric strings; fractions are truncated.
fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_delay<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    let ms = lenient_number(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid delay: {}", value)))?;
    Ok(ms.max(0.0) as u64)
}

fn de_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(default_status());
    }
    let code = lenient_number(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid status code: {}", value)))?;
    if !(0.0..=f64::from(u16::MAX)).contains(&code) {
        return Err(de::Error::custom(format!("invalid status code: {}", value)));
    }
    Ok(code as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  listen: "0.0.0.0:8080"
store:
  type: file
  path: /tmp/routes.json
settings:
  log_matches: false
routes:
  - id: user
    method: get
    path: /user/:id
    template:
      id: "@id"
      name: "@name"
    delay: 50
"#;
        let config: MockServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(
            config.store,
            StoreSettings::File {
                path: PathBuf::from("/tmp/routes.json")
            }
        );
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].delay, 50);
        assert_eq!(config.routes[0].status_code, 200);
        assert_eq!(config.routes[0].template["name"], "@name");
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config: MockServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.listen, default_listen());
        assert_eq!(config.store, StoreSettings::Memory);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<MockServerConfig, _> = serde_yaml::from_str("stubs: []");
        assert!(result.is_err());
    }

    #[test]
    fn test_route_wire_aliases() {
        let route: RouteConfig = serde_json::from_value(json!({
            "id": 7,
            "moduleId": 2,
            "method": "POST",
            "url": "/login",
            "mockData": "{\"token\": \"@guid\"}",
            "delay": "300",
            "statusCode": "201"
        }))
        .unwrap();

        assert_eq!(route.id, "7");
        assert_eq!(route.module_id.as_deref(), Some("2"));
        assert_eq!(route.path, "/login");
        assert_eq!(route.template, json!("{\"token\": \"@guid\"}"));
        assert_eq!(route.delay, 300);
        assert_eq!(route.status_code, 201);
    }

    #[test]
    fn test_route_generated_id_and_defaults() {
        let route: RouteConfig =
            serde_json::from_value(json!({"method": "get", "path": "/x", "delay": -5})).unwrap();
        assert_eq!(route.id.len(), 36);
        assert_eq!(route.id.chars().nth(14), Some('4'));
        assert_eq!(route.delay, 0);
        assert_eq!(route.status_code, 200);
        assert!(route.template.is_null());
    }

    #[test]
    fn test_route_serializes_camel_case() {
        let route = RouteConfig::new("GET", "/a", json!({})).with_id("a");
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["id"], "a");
        assert!(value.get("moduleId").is_none());
    }

    #[test]
    fn test_route_validation() {
        assert!(RouteConfig::new("get", "/a/:id", Value::Null).validate().is_ok());
        assert!(matches!(
            RouteConfig::new("FETCH", "/a", Value::Null).validate(),
            Err(RouteRegistrationError::UnsupportedMethod(_))
        ));
        assert!(matches!(
            RouteConfig::new("GET", "a", Value::Null).validate(),
            Err(RouteRegistrationError::InvalidPath { .. })
        ));

        let mut route = RouteConfig::new("GET", "/a", Value::Null);
        route.status_code = 42;
        assert_eq!(route.validate(), Err(RouteRegistrationError::InvalidStatus(42)));
    }

    #[test]
    fn test_config_validate_reports_route() {
        let mut config = MockServerConfig::default();
        config.routes.push(RouteConfig::new("BREW", "/coffee", Value::Null).with_id("pot"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pot"));
    }
}
