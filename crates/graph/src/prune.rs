use crate::error::{GraphError, Result};
use crate::types::WebIdl;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Removal template: mirrors the graph shape and says what to delete
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// `null`: drop the whole subtree
    Remove,
    /// List of names: drop only the identified items of that field
    Names(Vec<String>),
    /// Object: recurse into the matching subtree
    Nested(BTreeMap<String, Template>),
}

impl Default for Template {
    fn default() -> Self {
        Self::Nested(BTreeMap::new())
    }
}

impl Template {
    pub fn from_value(value: Value) -> Result<Self> {
        let mut path = Vec::new();
        parse(value, &mut path)
    }
}

fn parse(value: Value, path: &mut Vec<String>) -> Result<Template> {
    match value {
        Value::Null => Ok(Template::Remove),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                other => Err(GraphError::invalid_template(
                    path.join("."),
                    format!("expected a name, found {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(Template::Names),
        Value::Object(entries) => {
            let mut nested = BTreeMap::new();
            for (key, value) in entries {
                path.push(key.clone());
                let template = parse(value, path)?;
                path.pop();
                nested.insert(key, template);
            }
            Ok(Template::Nested(nested))
        }
        other => Err(GraphError::invalid_template(
            path.join("."),
            format!("expected null, a list of names, or an object, found {other}"),
        )),
    }
}

/// Remove everything `template` names from `graph`, returning a new graph
pub fn prune(graph: &WebIdl, template: &Template) -> Result<WebIdl> {
    let value = serde_json::to_value(graph)?;
    let pruned = prune_value(value, template)?;
    WebIdl::from_value(pruned.unwrap_or_else(|| Value::Object(Map::new())))
}

/// Shape-generic pruning; `None` means the template removed the value itself
pub fn prune_value(value: Value, template: &Template) -> Result<Option<Value>> {
    let mut path = Vec::new();
    apply(value, template, &mut path)
}

fn apply(value: Value, template: &Template, path: &mut Vec<String>) -> Result<Option<Value>> {
    match template {
        Template::Remove => Ok(None),
        Template::Names(names) => filter_names(value, names, path).map(Some),
        Template::Nested(entries) => filter_object(value, entries, path).map(Some),
    }
}

fn filter_object(
    value: Value,
    entries: &BTreeMap<String, Template>,
    path: &mut Vec<String>,
) -> Result<Value> {
    let Value::Object(object) = value else {
        return Err(GraphError::ShapeMismatch {
            path: path.join("."),
            expected: "an object",
        });
    };

    let mut filtered = Map::new();
    for (key, item) in object {
        let Some(template) = entries.get(&key) else {
            filtered.insert(key, item);
            continue;
        };
        path.push(key.clone());
        let kept = apply(item, template, path)?;
        path.pop();
        if let Some(kept) = kept {
            filtered.insert(key, kept);
        }
    }
    Ok(Value::Object(filtered))
}

/// Arrays are filtered by item identity; named maps lose the listed keys
fn filter_names(value: Value, names: &[String], path: &[String]) -> Result<Value> {
    let listed = |name: &str| names.iter().any(|n| n == name);
    match value {
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .filter(|item| !identity(item).is_some_and(|name| listed(name)))
                .collect(),
        )),
        Value::Object(entries) => Ok(Value::Object(
            entries
                .into_iter()
                .filter(|(key, _)| !listed(key.as_str()))
                .collect(),
        )),
        _ => Err(GraphError::ShapeMismatch {
            path: path.join("."),
            expected: "an array",
        }),
    }
}

/// A bare name, else the item's `name`, else its `new-type`
fn identity(item: &Value) -> Option<&str> {
    match item {
        Value::String(name) => Some(name.as_str()),
        Value::Object(fields) => ["name", "new-type"]
            .iter()
            .filter_map(|key| fields.get(*key).and_then(Value::as_str))
            .find(|name| !name.is_empty()),
        _ => None,
    }
}
