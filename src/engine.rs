//! The mock engine.
//!
//! Owns the config store and the live route table, answers mock requests
//! and applies admin changes. The table is published through an
//! [`ArcSwap`]: request handling loads the current table without locking,
//! admin changes build a new table off to the side and swap it in.

use crate::config::{GlobalSettings, RouteConfig};
use crate::error::EngineError;
use crate::matcher::{parse_query_string, MatchContext};
use crate::mock::MockExpander;
use crate::render::{RequestContext, ResponseRenderer};
use crate::store::{ConfigStore, Snapshot};
use crate::table::{RebuildReport, RouteSummary, RouteTable, SkippedRoute};
use arc_swap::ArcSwap;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// An inbound request, as the engine sees it.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    pub query: Option<String>,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl MockRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }
}

/// What to send back for a mock request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: Value,
    /// The route that answered, if any
    pub route_id: Option<String>,
}

impl MockResponse {
    fn not_found() -> Self {
        Self {
            status: 404,
            body: json!({"error": "not_found", "message": "No matching route"}),
            route_id: None,
        }
    }
}

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub failed: u64,
    pub degradations: u64,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
    pub routes: usize,
    pub uptime_secs: u64,
    pub requests: RequestStats,
}

/// Mock engine: store, live table and dispatcher.
pub struct MockEngine {
    store: Arc<dyn ConfigStore>,
    table: ArcSwap<RouteTable>,
    report: ArcSwap<RebuildReport>,
    /// Serializes admin changes. Never taken by request handling.
    admin: Mutex<()>,
    expander: MockExpander,
    renderer: ResponseRenderer,
    settings: GlobalSettings,
    started: Instant,
    requests_total: AtomicU64,
    requests_matched: AtomicU64,
    requests_unmatched: AtomicU64,
    requests_failed: AtomicU64,
    degradations: AtomicU64,
}

impl MockEngine {
    /// Create an engine with an empty table. Call [`MockEngine::reload`]
    /// to load routes from the store.
    pub fn new(store: Arc<dyn ConfigStore>, settings: GlobalSettings) -> Self {
        Self {
            store,
            table: ArcSwap::from_pointee(RouteTable::new()),
            report: ArcSwap::from_pointee(RebuildReport::default()),
            admin: Mutex::new(()),
            expander: MockExpander::new(),
            renderer: ResponseRenderer::new(),
            settings,
            started: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            degradations: AtomicU64::new(0),
        }
    }

    /// Rebuild the table from the store.
    pub async fn reload(&self) -> Result<RebuildReport, EngineError> {
        let _guard = self.admin.lock().await;
        self.rebuild_from_store().await
    }

    /// Load `routes` into the store if it is empty, then rebuild.
    pub async fn seed(&self, routes: Vec<RouteConfig>) -> Result<RebuildReport, EngineError> {
        let _guard = self.admin.lock().await;
        if !routes.is_empty() && self.store.get_all().await?.is_empty() {
            info!(routes = routes.len(), "Seeding empty store from configuration");
            self.store.replace_all(routes).await?;
        }
        self.rebuild_from_store().await
    }

    /// Replace every config and rebuild.
    pub async fn replace_all(&self, configs: Vec<RouteConfig>) -> Result<RebuildReport, EngineError> {
        let _guard = self.admin.lock().await;
        self.store.replace_all(configs).await?;
        self.rebuild_from_store().await
    }

    /// Append one config and register it. A config that cannot be
    /// registered is still stored, and reported as skipped.
    pub async fn add_one(&self, config: RouteConfig) -> Result<RebuildReport, EngineError> {
        let _guard = self.admin.lock().await;
        self.store.append(config.clone()).await?;

        let id = config.id.clone();
        let mut report = RebuildReport::clone(&self.report.load());
        match self.table.load().inserted(config) {
            Ok(table) => {
                info!(route_id = %id, routes = table.len(), "Route added");
                self.publish(table, &mut report);
            }
            Err(error) => {
                warn!(route_id = %id, error = %error, "Skipping added route");
                report.skipped.push(SkippedRoute { id, error });
                self.report.store(Arc::new(report.clone()));
            }
        }
        Ok(report)
    }

    /// Remove every config with `id`. Removing an unknown id succeeds and
    /// leaves the table as it was.
    pub async fn delete_by_id(&self, id: &str) -> Result<usize, EngineError> {
        let _guard = self.admin.lock().await;
        let removed = self.store.remove(id).await?;

        let mut report = RebuildReport::clone(&self.report.load());
        report.skipped.retain(|s| s.id != id);
        let table = self.table.load().removed(id);
        info!(route_id = %id, removed, routes = table.len(), "Route deleted");
        self.publish(table, &mut report);
        Ok(removed)
    }

    /// Stored configs, optionally limited to one module.
    pub async fn configs(&self, module_id: Option<&str>) -> Result<Vec<RouteConfig>, EngineError> {
        Ok(match module_id {
            Some(module) => self.store.by_module(module).await?,
            None => self.store.get_all().await?,
        })
    }

    /// Replace modules and configs from an exported snapshot, then
    /// rebuild.
    pub async fn import(&self, snapshot: Snapshot) -> Result<RebuildReport, EngineError> {
        let _guard = self.admin.lock().await;
        info!(
            modules = snapshot.modules.len(),
            routes = snapshot.apis.len(),
            "Importing configuration snapshot"
        );
        self.store.import(snapshot.modules, snapshot.apis).await?;
        self.rebuild_from_store().await
    }

    /// Snapshot of the store for export.
    ///
    /// Stored module records come first; a `moduleId` used by some route
    /// but missing from them gets a `{"id", "name"}` record of its own.
    pub async fn export(&self) -> Result<Snapshot, EngineError> {
        let apis = self.store.get_all().await?;
        let mut modules = self.store.modules().await?;
        for config in &apis {
            let Some(module) = config.module_id.as_deref() else {
                continue;
            };
            let known = modules.iter().any(|m| match &m["id"] {
                Value::String(id) => id == module,
                Value::Number(id) => id.to_string() == module,
                _ => false,
            });
            if !known {
                modules.push(json!({"id": module, "name": module}));
            }
        }
        Ok(Snapshot::now(modules, apis))
    }

    /// Routes in the live table.
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.table.load().routes()
    }

    /// Outcome of the most recent table change.
    pub fn last_report(&self) -> RebuildReport {
        RebuildReport::clone(&self.report.load())
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            message: "Mock server is running",
            routes: self.table.load().len(),
            uptime_secs: self.started.elapsed().as_secs(),
            requests: self.stats(),
        }
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            total: self.requests_total.load(Ordering::Relaxed),
            matched: self.requests_matched.load(Ordering::Relaxed),
            unmatched: self.requests_unmatched.load(Ordering::Relaxed),
            failed: self.requests_failed.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
        }
    }

    /// Answer one mock request.
    pub async fn handle(&self, request: MockRequest) -> MockResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        // Holding this Arc keeps the matched table alive across the delay
        // even if an admin change swaps in a new one.
        let table = self.table.load_full();
        let Some(found) = table.find_match(&request.method, &request.path) else {
            self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
            if self.settings.log_unmatched {
                warn!(method = %request.method, path = %request.path, "No matching route");
            }
            return MockResponse::not_found();
        };

        self.requests_matched.fetch_add(1, Ordering::Relaxed);
        let route = found.route;
        if self.settings.log_matches {
            info!(
                route_id = %route.id(),
                method = %request.method,
                path = %request.path,
                "Request matched route"
            );
        }

        let delay = route.config.delay;
        if delay > 0 {
            debug!(route_id = %route.id(), delay_ms = delay, "Applying delay");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let template = match &route.template {
            Ok(template) => template,
            Err(e) => {
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
                warn!(route_id = %route.id(), error = %e, "Template parse failure");
                return MockResponse {
                    status: 500,
                    body: json!({
                        "success": false,
                        "message": "Mock data format error",
                        "error": e.diagnostic(),
                    }),
                    route_id: Some(route.id().to_string()),
                };
            }
        };

        let expansion = self.expander.expand_reporting(template);
        let mut body = expansion.value;

        let match_ctx = MatchContext {
            path_params: found.path_params,
            query_params: request.query.as_deref().map(parse_query_string).unwrap_or_default(),
        };
        let ctx = RequestContext::new(
            &match_ctx,
            &request.method,
            &request.path,
            &request.headers,
            request.body.as_deref(),
        );
        let render_failures = self.renderer.render_json(&mut body, &ctx);

        let degraded = (expansion.degraded.len() + render_failures) as u64;
        if degraded > 0 {
            self.degradations.fetch_add(degraded, Ordering::Relaxed);
        }

        MockResponse {
            status: route.config.status_code,
            body,
            route_id: Some(route.id().to_string()),
        }
    }

    async fn rebuild_from_store(&self) -> Result<RebuildReport, EngineError> {
        let configs = self.store.get_all().await?;
        let (table, mut report) = RouteTable::rebuild(&configs);
        self.publish(table, &mut report);
        Ok(report)
    }

    fn publish(&self, table: RouteTable, report: &mut RebuildReport) {
        report.registered = table.len();
        self.table.store(Arc::new(table));
        self.report.store(Arc::new(report.clone()));
    }
}
