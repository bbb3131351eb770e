//! HTTP front end.
//!
//! Serves the health probe and admin endpoints, and hands every other
//! request to the [`MockEngine`]. One task per connection, HTTP/1.1.

use crate::config::RouteConfig;
use crate::engine::{MockEngine, MockRequest, MockResponse};
use crate::error::EngineError;
use crate::store::Snapshot;
use crate::tree::{self, Ancestor, TreeOptions};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

const CORS_ALLOW_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// HTTP listener bound to an engine.
pub struct MockServer {
    engine: Arc<MockEngine>,
    listener: TcpListener,
}

impl MockServer {
    /// Bind the listening socket.
    pub async fn bind(engine: Arc<MockEngine>, addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { engine, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let addr = self.listener.local_addr()?;
        info!(%addr, "Mock server listening");
        info!("Health check: http://{}/health", addr);
        info!("Config admin: http://{}/admin/configs", addr);

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
            };
            let io = TokioIo::new(stream);
            let engine = Arc::clone(&self.engine);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| handle(Arc::clone(&engine), req));
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

/// A JSON reply.
#[derive(Debug, Clone, PartialEq)]
struct Reply {
    status: StatusCode,
    body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn success(message: &str, extra: Value) -> Self {
        let mut body = json!({"success": true, "message": message});
        if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
            body.extend(extra);
        }
        Self::ok(body)
    }

    fn failure(status: StatusCode, message: &str, error: impl ToString) -> Self {
        Self {
            status,
            body: json!({"success": false, "message": message, "error": error.to_string()}),
        }
    }

    fn from_engine_error(message: &str, err: EngineError) -> Self {
        error!(error = %err, "{}", message);
        Self::failure(StatusCode::INTERNAL_SERVER_ERROR, message, err)
    }
}

impl From<MockResponse> for Reply {
    fn from(response: MockResponse) -> Self {
        Self {
            status: StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: response.body,
        }
    }
}

/// Handle one HTTP request.
///
/// CORS preflights are answered directly with 204. Bodies larger than
/// [`MAX_BODY_BYTES`] get 413.
pub async fn handle<B>(
    engine: Arc<MockEngine>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
        return Ok(preflight(req.headers()));
    }

    let (parts, body) = req.into_parts();
    let reply = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => {
            let request = MockRequest {
                method: parts.method.as_str().to_string(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(String::from),
                headers: parts
                    .headers
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
                    .collect(),
                body: Some(collected.to_bytes().to_vec()),
            };
            dispatch(&engine, &parts.method, request).await
        }
        Err(e) if e.is::<LengthLimitError>() => {
            Reply::failure(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large", e)
        }
        Err(e) => Reply::failure(StatusCode::BAD_REQUEST, "Failed to read request body", e),
    };

    let bytes = serde_json::to_vec(&reply.body).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = reply.status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}

fn preflight(request_headers: &HeaderMap) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
    // Reflect whatever headers the client asked for
    if let Some(requested) = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
    response
}

async fn dispatch(engine: &MockEngine, method: &Method, request: MockRequest) -> Reply {
    let path = request.path.clone();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let query = request.query.as_deref().map(crate::matcher::parse_query_string).unwrap_or_default();

    match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Reply::ok(json!(engine.health())),

        (&Method::GET, ["admin", "configs"]) => {
            match engine.configs(query.get("moduleId").map(String::as_str)).await {
                Ok(configs) => Reply::ok(json!(configs)),
                Err(e) => Reply::from_engine_error("Failed to read configs", e),
            }
        }

        (&Method::POST, ["admin", "configs"]) => {
            let configs: Vec<RouteConfig> = match parse_body(&request) {
                Ok(configs) => configs,
                Err(reply) => return reply,
            };
            match engine.replace_all(configs).await {
                Ok(report) => Reply::success("Configs updated", json!({"report": report})),
                Err(e) => Reply::from_engine_error("Failed to update configs", e),
            }
        }

        (&Method::POST, ["admin", "configs", "add"]) => {
            let config: RouteConfig = match parse_body(&request) {
                Ok(config) => config,
                Err(reply) => return reply,
            };
            let id = config.id.clone();
            match engine.add_one(config).await {
                Ok(report) => Reply::success("Route added", json!({"id": id, "report": report})),
                Err(e) => Reply::from_engine_error("Failed to add route", e),
            }
        }

        (&Method::DELETE, ["admin", "configs", id]) => {
            let id = decode(id);
            match engine.delete_by_id(&id).await {
                Ok(removed) => Reply::success("Route deleted", json!({"removed": removed})),
                Err(e) => Reply::from_engine_error("Failed to delete route", e),
            }
        }

        (&Method::GET, ["admin", "routes"]) => {
            let report = engine.last_report();
            Reply::ok(json!({
                "routes": engine.routes(),
                "registered": report.registered,
                "skipped": report.skipped,
            }))
        }

        (&Method::POST, ["admin", "import"]) => {
            let snapshot: Snapshot = match parse_body(&request) {
                Ok(snapshot) => snapshot,
                Err(reply) => return reply,
            };
            match engine.import(snapshot).await {
                Ok(report) => Reply::success("Configs imported", json!({"report": report})),
                Err(e) => Reply::from_engine_error("Failed to import configs", e),
            }
        }

        (&Method::GET, ["admin", "export"]) => match engine.export().await {
            Ok(snapshot) => Reply::ok(json!(snapshot)),
            Err(e) => Reply::from_engine_error("Failed to export configs", e),
        },

        (&Method::GET, ["admin", "tree"]) => match engine.configs(None).await {
            Ok(configs) => {
                let tree = tree::module_tree(&configs);
                let tree = match query.get("method") {
                    Some(wanted) => tree::filter_forest(
                        &tree,
                        &|node: &Value| {
                            node["kind"] == "module"
                                || node["method"]
                                    .as_str()
                                    .is_some_and(|m| m.eq_ignore_ascii_case(wanted))
                        },
                        "children",
                    ),
                    None => tree,
                };
                Reply::ok(Value::Array(tree))
            }
            Err(e) => Reply::from_engine_error("Failed to read configs", e),
        },

        (&Method::GET, ["admin", "tree", id, "ancestors"]) => match engine.configs(None).await {
            Ok(configs) => {
                let tree = tree::module_tree(&configs);
                let options = TreeOptions {
                    return_full_path: true,
                    ..TreeOptions::default()
                };
                match tree::find_ancestor(&tree, &Value::String(decode(id)), &options) {
                    Some(Ancestor::Path(path)) => Reply::ok(json!({"ancestors": path})),
                    Some(Ancestor::Parent(parent)) => Reply::ok(json!({"ancestors": [parent]})),
                    None => Reply::failure(StatusCode::NOT_FOUND, "Node not found", id),
                }
            }
            Err(e) => Reply::from_engine_error("Failed to read configs", e),
        },

        _ => engine.handle(request).await.into(),
    }
}

fn parse_body<T: DeserializeOwned>(request: &MockRequest) -> Result<T, Reply> {
    let body = request.body.as_deref().unwrap_or_default();
    serde_json::from_slice(body)
        .map_err(|e| Reply::failure(StatusCode::BAD_REQUEST, "Invalid request body", e))
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalSettings;
    use crate::store::MemoryStore;

    fn engine() -> Arc<MockEngine> {
        Arc::new(MockEngine::new(Arc::new(MemoryStore::new()), GlobalSettings::default()))
    }

    async fn call(engine: &Arc<MockEngine>, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap();
        let response = handle(Arc::clone(engine), req).await.unwrap();
        let status = response.status();
        assert_eq!(response.headers()["content-type"], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let engine = engine();
        let (status, body) = call(&engine, Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["routes"], 0);
    }

    #[tokio::test]
    async fn test_admin_lifecycle() {
        let engine = engine();
        let configs = r#"[
            {"id": 1, "method": "GET", "url": "/user/:id", "mockData": "{\"id\": \"@id\", \"name\": \"@name\"}"},
            {"id": 2, "moduleId": "orders", "method": "POST", "path": "/orders", "template": {"ok": true}, "statusCode": 201}
        ]"#;
        let (status, body) = call(&engine, Method::POST, "/admin/configs", configs).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["report"]["registered"], 2);

        let (status, body) = call(&engine, Method::GET, "/user/42", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].is_string() && body["name"].is_string());

        let (status, body) = call(&engine, Method::POST, "/orders", "").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"ok": true}));

        let (_, body) = call(&engine, Method::GET, "/admin/configs?moduleId=orders", "").await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let add = r#"{"id": "3", "method": "delete", "path": "/orders/:id"}"#;
        let (_, body) = call(&engine, Method::POST, "/admin/configs/add", add).await;
        assert_eq!(body["id"], "3");

        let (_, body) = call(&engine, Method::GET, "/admin/routes", "").await;
        assert_eq!(body["routes"].as_array().unwrap().len(), 3);

        let (status, body) = call(&engine, Method::DELETE, "/admin/configs/1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);

        let (status, _) = call(&engine, Method::GET, "/user/42", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&engine, Method::GET, "/admin/export", "").await;
        assert_eq!(body["apis"].as_array().unwrap().len(), 2);
        assert!(body["exportTime"].is_string());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_succeeds() {
        let engine = engine();
        let (status, body) = call(&engine, Method::DELETE, "/admin/configs/nope", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["removed"], 0);
    }

    #[tokio::test]
    async fn test_bad_admin_body() {
        let engine = engine();
        let (status, body) = call(&engine, Method::POST, "/admin/configs", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_takes_precedence() {
        let engine = engine();
        let shadow = r#"[{"id": "h", "method": "GET", "path": "/health", "template": {"mock": true}}]"#;
        call(&engine, Method::POST, "/admin/configs", shadow).await;

        let (_, body) = call(&engine, Method::GET, "/health", "").await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let engine = engine();
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/admin/configs")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle(Arc::clone(&engine), req).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert!(headers["access-control-allow-methods"].to_str().unwrap().contains("DELETE"));
        assert_eq!(headers["access-control-allow-headers"], "content-type");

        // A plain OPTIONS request still reaches the mock routes
        let (status, _) = call(&engine, Method::OPTIONS, "/admin/configs", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let engine = engine();
        let big = format!("[{}]", "0,".repeat(MAX_BODY_BYTES) + "0");
        let (status, body) = call(&engine, Method::POST, "/admin/configs", &big).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["success"], false);
        assert_eq!(engine.export().await.unwrap().apis.len(), 0);
    }

    #[tokio::test]
    async fn test_export_import_endpoints() {
        let engine = engine();
        let configs = r#"[{"id": "a", "moduleId": "users", "method": "GET", "path": "/a", "template": {"ok": 1}}]"#;
        call(&engine, Method::POST, "/admin/configs", configs).await;
        let (_, exported) = call(&engine, Method::GET, "/admin/export", "").await;
        assert_eq!(exported["modules"][0]["id"], "users");

        call(&engine, Method::DELETE, "/admin/configs/a", "").await;
        let (status, _) = call(&engine, Method::GET, "/a", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            call(&engine, Method::POST, "/admin/import", &exported.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["registered"], 1);

        let (status, body) = call(&engine, Method::GET, "/a", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": 1}));

        let (_, restored) = call(&engine, Method::GET, "/admin/export", "").await;
        assert_eq!(restored["apis"], exported["apis"]);
        assert_eq!(restored["modules"], exported["modules"]);

        // `modules` is optional on import
        let (status, _) = call(&engine, Method::POST, "/admin/import", r#"{"apis": []}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(engine.routes().is_empty());
    }

    #[tokio::test]
    async fn test_tree_endpoints() {
        let engine = engine();
        let configs = r#"[
            {"id": "a", "moduleId": "users", "method": "GET", "path": "/a"},
            {"id": "b", "moduleId": "users", "method": "POST", "path": "/b"},
            {"id": "c", "method": "GET", "path": "/c"}
        ]"#;
        call(&engine, Method::POST, "/admin/configs", configs).await;

        let (_, tree) = call(&engine, Method::GET, "/admin/tree", "").await;
        assert_eq!(tree.as_array().unwrap().len(), 2);

        let (_, tree) = call(&engine, Method::GET, "/admin/tree?method=post", "").await;
        assert_eq!(tree[0]["children"].as_array().unwrap().len(), 1);
        assert!(tree[1]["children"].as_array().unwrap().is_empty());

        let (_, body) = call(&engine, Method::GET, "/admin/tree/b/ancestors", "").await;
        assert_eq!(body["ancestors"][0]["moduleId"], "users");

        let (status, _) = call(&engine, Method::GET, "/admin/tree/zzz/ancestors", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let engine = engine();
        engine
            .replace_all(vec![RouteConfig::new("GET", "/ping", json!({"pong": true}))])
            .await
            .unwrap();

        let server = MockServer::bind(Arc::clone(&engine), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(server.run(async {
            stop_rx.await.ok();
        }));

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with(r#"{"pong":true}"#));

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
