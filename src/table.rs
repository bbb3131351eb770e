//! The live route table.
//!
//! A [`RouteTable`] is built from an ordered list of [`RouteConfig`] and is
//! immutable once built; changes produce a new table. Lookups scan newest
//! first, so when two entries share a method and path the one registered
//! last answers.

use crate::config::RouteConfig;
use crate::error::{RouteRegistrationError, TemplateSyntaxError};
use crate::matcher::PathPattern;
use crate::template::{self, TemplateValue};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// HTTP verbs a route may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Matches every method
    All,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::All => "ALL",
        }
    }

    /// Whether a request with `method` is served by this verb.
    pub fn accepts(&self, method: &str) -> bool {
        *self == RouteMethod::All || self.as_str().eq_ignore_ascii_case(method)
    }
}

impl FromStr for RouteMethod {
    type Err = RouteRegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            "PUT" => Ok(RouteMethod::Put),
            "DELETE" => Ok(RouteMethod::Delete),
            "PATCH" => Ok(RouteMethod::Patch),
            "HEAD" => Ok(RouteMethod::Head),
            "OPTIONS" => Ok(RouteMethod::Options),
            "ALL" => Ok(RouteMethod::All),
            _ => Err(RouteRegistrationError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered route with its path compiled and template parsed.
#[derive(Debug)]
pub struct CompiledRoute {
    pub config: Arc<RouteConfig>,
    pub method: RouteMethod,
    pub pattern: PathPattern,
    /// Parsed once at registration. A syntax error is kept so the route
    /// can answer with it.
    pub template: Result<TemplateValue, TemplateSyntaxError>,
}

impl CompiledRoute {
    pub fn compile(config: RouteConfig) -> Result<Self, RouteRegistrationError> {
        let method = config.method.parse::<RouteMethod>()?;
        let pattern = PathPattern::compile(&config.path)?;
        if !(100..=599).contains(&config.status_code) {
            return Err(RouteRegistrationError::InvalidStatus(config.status_code));
        }

        let template = template::parse(&config.template);
        if let Err(e) = &template {
            warn!(
                route_id = %config.id,
                error = %e,
                "Route template does not parse; requests will get a 500"
            );
        }

        Ok(Self {
            config: Arc::new(config),
            method,
            pattern,
            template,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<CompiledRoute>,
    pub path_params: HashMap<String, String>,
}

/// A route listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "templateError")]
    pub template_error: bool,
}

/// An entry left out of a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRoute {
    pub id: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: RouteRegistrationError,
}

fn serialize_display<S: serde::Serializer>(
    error: &RouteRegistrationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of [`RouteTable::rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildReport {
    pub registered: usize,
    pub skipped: Vec<SkippedRoute>,
}

/// Ordered, immutable set of compiled routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<CompiledRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a full config list. Entries that fail to
    /// register are skipped and reported; the rest are still served.
    pub fn rebuild(configs: &[RouteConfig]) -> (Self, RebuildReport) {
        let mut table = Self::new();
        let mut report = RebuildReport::default();

        for config in configs {
            let id = config.id.clone();
            match CompiledRoute::compile(config.clone()) {
                Ok(route) => table.routes.push(Arc::new(route)),
                Err(error) => {
                    warn!(
                        route_id = %id,
                        method = %config.method,
                        path = %config.path,
                        error = %error,
                        "Skipping route"
                    );
                    report.skipped.push(SkippedRoute { id, error });
                }
            }
        }

        report.registered = table.routes.len();
        info!(
            registered = report.registered,
            skipped = report.skipped.len(),
            "Route table rebuilt"
        );
        (table, report)
    }

    /// A copy of this table with `config` registered last.
    pub fn inserted(&self, config: RouteConfig) -> Result<Self, RouteRegistrationError> {
        let route = CompiledRoute::compile(config)?;
        let mut routes = self.routes.clone();
        routes.push(Arc::new(route));
        Ok(Self { routes })
    }

    /// A copy of this table without the routes whose id is `id`.
    pub fn removed(&self, id: &str) -> Self {
        Self {
            routes: self.routes.iter().filter(|r| r.id() != id).cloned().collect(),
        }
    }

    /// Find the route serving `method` and `path`.
    pub fn find_match(&self, method: &str, path: &str) -> Option<RouteMatch> {
        self.routes.iter().rev().find_map(|route| {
            if !route.method.accepts(method) {
                return None;
            }
            route.pattern.matches(path).map(|path_params| RouteMatch {
                route: Arc::clone(route),
                path_params,
            })
        })
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.routes
            .iter()
            .map(|r| RouteSummary {
                id: r.config.id.clone(),
                method: r.method.to_string(),
                path: r.pattern.as_str().to_string(),
                template_error: r.template.is_err(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn route(id: &str, method: &str, path: &str) -> RouteConfig {
        RouteConfig::new(method, path, json!({"id": id})).with_id(id)
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<RouteMethod>().unwrap(), RouteMethod::Get);
        assert_eq!(" Options ".parse::<RouteMethod>().unwrap(), RouteMethod::Options);
        assert_eq!("all".parse::<RouteMethod>().unwrap(), RouteMethod::All);
        assert_eq!(
            "TRACE".parse::<RouteMethod>(),
            Err(RouteRegistrationError::UnsupportedMethod("TRACE".to_string()))
        );
        assert!(RouteMethod::All.accepts("DELETE"));
        assert!(RouteMethod::Get.accepts("get"));
        assert!(!RouteMethod::Get.accepts("POST"));
    }

    #[test]
    fn test_every_entry_matches_itself() {
        let configs = vec![
            route("a", "GET", "/a"),
            route("b", "post", "/b/:id"),
            route("c", "PATCH", "/c/*"),
            route("bad", "CONNECT", "/bad"),
        ];
        let (table, report) = RouteTable::rebuild(&configs);

        assert_eq!(report.registered, 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "bad");

        assert_eq!(table.find_match("GET", "/a").unwrap().route.id(), "a");
        assert_eq!(table.find_match("POST", "/b/:id").unwrap().route.id(), "b");
        assert_eq!(table.find_match("PATCH", "/c/*").unwrap().route.id(), "c");
        assert!(table.find_match("CONNECT", "/bad").is_none());
    }

    #[test]
    fn test_path_params_bound() {
        let (table, _) = RouteTable::rebuild(&[route("user", "GET", "/user/:id")]);
        let found = table.find_match("GET", "/user/42").unwrap();
        assert_eq!(found.path_params.get("id"), Some(&"42".to_string()));
        assert!(table.find_match("POST", "/user/42").is_none());
    }

    #[test]
    fn test_last_registered_wins() {
        let (table, _) = RouteTable::rebuild(&[
            route("first", "GET", "/dup"),
            route("second", "GET", "/dup"),
        ]);
        assert_eq!(table.find_match("GET", "/dup").unwrap().route.id(), "second");

        let (table, _) = RouteTable::rebuild(&[
            route("specific", "GET", "/items/special"),
            route("generic", "GET", "/items/:id"),
        ]);
        assert_eq!(table.find_match("GET", "/items/special").unwrap().route.id(), "generic");
    }

    #[test]
    fn test_all_method() {
        let (table, _) = RouteTable::rebuild(&[route("any", "ALL", "/any")]);
        for method in ["GET", "POST", "DELETE", "OPTIONS"] {
            assert!(table.find_match(method, "/any").is_some());
        }
    }

    #[test]
    fn test_invalid_status_and_path_skipped() {
        let mut bad_status = route("status", "GET", "/s");
        bad_status.status_code = 999;
        let (table, report) = RouteTable::rebuild(&[
            bad_status,
            route("path", "GET", "no-slash"),
            route("ok", "GET", "/ok"),
        ]);

        assert_eq!(table.len(), 1);
        assert_eq!(report.skipped[0].error, RouteRegistrationError::InvalidStatus(999));
        assert!(matches!(report.skipped[1].error, RouteRegistrationError::InvalidPath { .. }));
    }

    #[test]
    fn test_bad_template_still_registered() {
        let config = RouteConfig::new("GET", "/broken", Value::String("{not json".to_string()));
        let (table, report) = RouteTable::rebuild(&[config]);

        assert_eq!(report.registered, 1);
        let found = table.find_match("GET", "/broken").unwrap();
        assert!(found.route.template.is_err());
        assert!(table.routes()[0].template_error);
    }

    #[test]
    fn test_rebuild_idempotent() {
        let configs = vec![route("a", "GET", "/a"), route("b", "DELETE", "/b/:x")];
        let (first, _) = RouteTable::rebuild(&configs);
        let (second, _) = RouteTable::rebuild(&configs);
        assert_eq!(first.routes(), second.routes());
    }

    #[test]
    fn test_incremental_matches_rebuild() {
        let (table, _) = RouteTable::rebuild(&[route("a", "GET", "/a")]);
        let table = table.inserted(route("b", "GET", "/b")).unwrap();
        let table = table.inserted(route("c", "GET", "/c")).unwrap().removed("a");

        let (expected, _) = RouteTable::rebuild(&[route("b", "GET", "/b"), route("c", "GET", "/c")]);
        assert_eq!(table.routes(), expected.routes());

        assert!(table.inserted(route("x", "BREW", "/x")).is_err());
        assert_eq!(table.removed("missing").len(), 2);
    }
}
