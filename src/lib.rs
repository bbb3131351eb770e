//! Dynamock
//!
//! A runtime-configurable API mocking server. Routes are declared as
//! (method, path, template, delay, status) entries and can be replaced,
//! added or deleted through an admin API while the server keeps serving.
//!
//! # Features
//!
//! - **Live Route Table**: Admin changes are published atomically; in-flight requests finish on the table they matched
//! - **Mock.js Templates**: `list|1-10`, `id|+1`, `@name`, `@email`, `@date('yyyy-MM-dd')` and friends
//! - **Regex Literals**: `"/^1[3-9]\\d{9}$/"` leaves generate matching strings
//! - **Request Context**: `{{path.id}}`, `{{query.page}}`, `{{json.name}}` in generated bodies
//! - **Latency Simulation**: Per-route delays that never block other requests
//! - **Pluggable Storage**: In-memory or JSON snapshot file
//!
//! # Example Configuration
//!
//! ```yaml
//! routes:
//!   - id: user
//!     method: GET
//!     path: /user/:id
//!     template:
//!       id: "@id"
//!       name: "@name"
//!       "tags|1-3": ["@word"]
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod mock;
pub mod render;
pub mod server;
pub mod store;
pub mod table;
pub mod template;
pub mod tree;

pub use config::{MockServerConfig, RouteConfig};
pub use engine::{MockEngine, MockRequest, MockResponse};
pub use mock::{Expansion, MockExpander};
pub use server::MockServer;
pub use store::{ConfigStore, FileStore, MemoryStore};
pub use table::{RebuildReport, RouteTable};
pub use template::TemplateValue;
