//! Lookups over module/route hierarchies.
//!
//! Trees are plain JSON: an array of root nodes, each an object whose
//! children sit under a configurable key.

use crate::config::RouteConfig;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Module assigned to routes without a `moduleId`.
pub const DEFAULT_MODULE: &str = "default";

/// Field names used when walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    pub id_key: String,
    pub children_key: String,
    /// Return the whole chain from the root instead of the direct parent.
    pub return_full_path: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            id_key: "id".to_string(),
            children_key: "children".to_string(),
            return_full_path: false,
        }
    }
}

/// What [`find_ancestor`] found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Ancestor<'a> {
    Parent(&'a Value),
    /// Root first, direct parent last. Empty for a root-level target.
    Path(Vec<&'a Value>),
}

/// Find the parent of the node whose id is `target_id`, searching
/// depth-first.
///
/// Ids compare by value, and a string target also matches a numeric id
/// with the same text. Returns `None` when the target is absent, or when
/// it is a root and no full path was requested.
pub fn find_ancestor<'a>(
    tree: &'a [Value],
    target_id: &Value,
    options: &TreeOptions,
) -> Option<Ancestor<'a>> {
    let mut path = Vec::new();
    let (parent, found) = search(tree, None, target_id, options, &mut path);
    if !found {
        return None;
    }
    if options.return_full_path {
        Some(Ancestor::Path(path))
    } else {
        parent.map(Ancestor::Parent)
    }
}

fn search<'a>(
    nodes: &'a [Value],
    parent: Option<&'a Value>,
    target_id: &Value,
    options: &TreeOptions,
    path: &mut Vec<&'a Value>,
) -> (Option<&'a Value>, bool) {
    for node in nodes {
        if node.get(&options.id_key).is_some_and(|id| same_id(id, target_id)) {
            return (parent, true);
        }

        path.push(node);
        if let Some(children) = node.get(&options.children_key).and_then(Value::as_array) {
            let found = search(children, Some(node), target_id, options, path);
            if found.1 {
                return found;
            }
        }
        path.pop();
    }
    (None, false)
}

fn same_id(id: &Value, target: &Value) -> bool {
    match (id, target) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => id == target,
    }
}

/// Keep `node` and, recursively, the children that satisfy `predicate`.
///
/// A node that fails the predicate is dropped together with its whole
/// subtree, even if some descendants would pass.
pub fn filter_subtree<P>(node: &Value, predicate: &P, children_key: &str) -> Option<Value>
where
    P: Fn(&Value) -> bool,
{
    if !predicate(node) {
        return None;
    }

    let mut kept = node.clone();
    if let Some(Value::Array(children)) = kept.get_mut(children_key) {
        let filtered: Vec<Value> = children
            .iter()
            .filter_map(|child| filter_subtree(child, predicate, children_key))
            .collect();
        *children = filtered;
    }
    Some(kept)
}

/// [`filter_subtree`] over every root.
pub fn filter_forest<P>(tree: &[Value], predicate: &P, children_key: &str) -> Vec<Value>
where
    P: Fn(&Value) -> bool,
{
    tree.iter()
        .filter_map(|node| filter_subtree(node, predicate, children_key))
        .collect()
}

/// Group routes by module: one `kind: "module"` node per module, in order
/// of first appearance, with `kind: "route"` children.
pub fn module_tree(configs: &[RouteConfig]) -> Vec<Value> {
    let mut modules: Vec<(String, Vec<Value>)> = Vec::new();

    for config in configs {
        let module = config.module_id.as_deref().unwrap_or(DEFAULT_MODULE);
        let mut route = Map::new();
        route.insert("id".to_string(), json!(config.id));
        route.insert("kind".to_string(), json!("route"));
        if let Some(name) = &config.name {
            route.insert("name".to_string(), json!(name));
        }
        route.insert("method".to_string(), json!(config.method.to_uppercase()));
        route.insert("path".to_string(), json!(config.path));

        match modules.iter_mut().find(|(id, _)| id == module) {
            Some((_, routes)) => routes.push(Value::Object(route)),
            None => modules.push((module.to_string(), vec![Value::Object(route)])),
        }
    }

    modules
        .into_iter()
        .map(|(module, routes)| {
            json!({
                "id": format!("module:{}", module),
                "kind": "module",
                "moduleId": module,
                "children": routes,
            })
        })
        .collect()
}
