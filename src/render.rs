//! Request-context rendering for generated bodies.
//!
//! After expansion, any string containing `{{` is rendered with Handlebars
//! against the request: `{{path.id}}`, `{{query.page}}`,
//! `{{headers.user-agent}}`, `{{json.name}}` and so on.

use crate::matcher::MatchContext;
use chrono::Utc;
use handlebars::{handlebars_helper, Handlebars, RenderError, RenderErrorReason};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::debug;

/// Format used by `{{now}}` without an argument.
const DEFAULT_NOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Renders request data into expanded response bodies.
pub struct ResponseRenderer {
    handlebars: Handlebars<'static>,
}

/// Context for template rendering.
#[derive(Debug, Default, Serialize)]
pub struct RequestContext {
    /// Path parameters from route matching
    pub path: HashMap<String, String>,
    /// Query parameters
    pub query: HashMap<String, String>,
    /// Request headers, lowercased names
    pub headers: HashMap<String, String>,
    /// Request method
    pub method: String,
    /// Request path
    pub request_path: String,
    /// Request body (as string, if text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Request body as JSON (if parseable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl RequestContext {
    pub fn new(
        match_ctx: &MatchContext,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Self {
        let body = body
            .filter(|b| !b.is_empty())
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(String::from);
        let json = body.as_deref().and_then(|s| serde_json::from_str(s).ok());

        Self {
            path: match_ctx.path_params.clone(),
            query: match_ctx.query_params.clone(),
            headers: headers.clone(),
            method: method.to_string(),
            request_path: path.to_string(),
            body,
            json,
        }
    }
}

impl ResponseRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("now", Box::new(now_helper));
        handlebars.register_helper("default", Box::new(default_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));

        // Bodies are JSON, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    fn render(
        &self,
        template: &str,
        ctx: &RequestContext,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars.render_template(template, ctx)
    }

    /// Render every `{{`-bearing string in `value` in place. Strings that
    /// fail to render are left unchanged; returns how many failed.
    pub fn render_json(&self, value: &mut Value, ctx: &RequestContext) -> usize {
        match value {
            Value::String(s) if s.contains("{{") => match self.render(s, ctx) {
                Ok(rendered) => {
                    *s = rendered;
                    0
                }
                Err(e) => {
                    debug!(error = %e, template = %s, "Leaving unrenderable string as is");
                    1
                }
            },
            Value::Array(items) => items.iter_mut().map(|v| self.render_json(v, ctx)).sum(),
            Value::Object(map) => map.values_mut().map(|v| self.render_json(v, ctx)).sum(),
            _ => 0,
        }
    }
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// `{{now "<strftime>"}}`. An invalid format is a render error.
fn now_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or(DEFAULT_NOW_FORMAT);

    let mut stamp = String::new();
    write!(stamp, "{}", Utc::now().format(format)).map_err(|_| {
        RenderError::from(RenderErrorReason::Other(format!(
            "invalid time format {:?}",
            format
        )))
    })?;
    out.write(&stamp)?;
    Ok(())
}

handlebars_helper!(default_helper: |value: Json, fallback: str| match value {
    Value::String(s) if !s.is_empty() => s.clone(),
    Value::String(_) | Value::Null => fallback.to_string(),
    other => other.to_string(),
});

handlebars_helper!(upper_helper: |value: Json| value.as_str().unwrap_or_default().to_uppercase());

handlebars_helper!(lower_helper: |value: Json| value.as_str().unwrap_or_default().to_lowercase());
