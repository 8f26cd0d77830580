//! Recursive projection of arbitrary JSON documents onto flat state paths.

pub mod conversion;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    registry::{NodeDescriptor, NodeRegistry, Role, ValueType, has_index_segment},
    store::{SetOptions, SetOutcome, StateStore},
};

pub use self::conversion::LinkBase;

const UNDEFINED: &str = "undefined";
const LIST_SUFFIX: &str = ".list";
const TREE_SUFFIX: &str = "Tree";
const RAW_DATA: &str = "_data";
const ROLLUP_FIELDS: [&str; 3] = ["tag", "name", "title"];

/// Shape switches of the flattening walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Expand arrays into indexed children. When disabled, arrays are also rolled up into one
    /// readable node and their elements move under `{key}Tree`.
    pub expand_arrays: bool,
    /// When disabled, every object or array child also gets a `_data` node with its raw JSON.
    pub deep_expansion: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            expand_arrays: true,
            deep_expansion: true,
        }
    }
}

/// One write produced by the walk.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    /// Full state path.
    pub path: String,
    /// Resolved node metadata.
    pub node: NodeDescriptor,
    /// Value to store (ignored for grouping nodes).
    pub value: Value,
}

/// Counters for one applied flatten pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Writes produced by the walk.
    pub planned: usize,
    /// Values persisted.
    pub written: usize,
    /// Values identical to the cache.
    pub unchanged: usize,
    /// Writes that failed to persist.
    pub failed: usize,
}

/// Walks JSON documents and drives the [`StateStore`] with the resulting writes.
#[derive(Debug, Clone)]
pub struct Flattener {
    registry: Arc<NodeRegistry>,
    options: FlattenOptions,
    links: Option<LinkBase>,
}

impl Flattener {
    /// Build a flattener resolving nodes against `registry`.
    pub fn new(registry: Arc<NodeRegistry>, options: FlattenOptions, links: Option<LinkBase>) -> Self {
        Self {
            registry,
            options,
            links,
        }
    }

    /// Registry used for node resolution.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Link base used by link conversions.
    pub fn links(&self) -> Option<&LinkBase> {
        self.links.as_ref()
    }

    /// Flatten `data` found at logical `key` and apply the writes under `prefix`.
    pub async fn flatten(
        &self,
        store: &StateStore,
        key: &str,
        data: &Value,
        prefix: &str,
    ) -> FlattenReport {
        self.apply(store, self.plan(key, data, prefix)).await
    }

    /// Apply planned writes in order. One failing write never stops the batch.
    pub async fn apply(&self, store: &StateStore, writes: Vec<PlannedWrite>) -> FlattenReport {
        let mut report = FlattenReport {
            planned: writes.len(),
            ..FlattenReport::default()
        };
        for write in writes {
            match store
                .set(&write.path, &write.node, &write.value, SetOptions::default())
                .await
            {
                SetOutcome::Written => report.written += 1,
                SetOutcome::Unchanged => report.unchanged += 1,
                SetOutcome::Failed => report.failed += 1,
                SetOutcome::Structural | SetOutcome::Skipped => {}
            }
        }
        report
    }

    /// Compute the writes for `data` at logical `key` without touching any store.
    ///
    /// `key` is resolved against the registry; the state path is `prefix.key` (or `key` when the
    /// prefix is empty).
    pub fn plan(&self, key: &str, data: &Value, prefix: &str) -> Vec<PlannedWrite> {
        match data {
            Value::Null => Vec::new(),
            Value::String(text) if text == UNDEFINED => Vec::new(),
            Value::Object(map) => self.plan_object(key, map, prefix),
            Value::Array(items) => self.plan_array(key, items, prefix),
            scalar => self.plan_scalar(key, scalar, prefix),
        }
    }

    fn plan_object(&self, key: &str, map: &Map<String, Value>, prefix: &str) -> Vec<PlannedWrite> {
        let lookup = if has_index_segment(key) {
            format!("{key}{LIST_SUFFIX}")
        } else {
            key.to_owned()
        };
        let mut writes = vec![self.structural(key, &lookup, prefix)];

        for (field, child) in map {
            let child_key = format!("{key}.{field}");
            if !self.options.deep_expansion && (child.is_object() || child.is_array()) {
                writes.push(PlannedWrite {
                    path: state_path(prefix, &format!("{child_key}.{RAW_DATA}")),
                    node: NodeDescriptor::new("Raw data", Role::Json, ValueType::String),
                    value: Value::String(child.to_string()),
                });
            }
            writes.extend(self.plan(&child_key, child, prefix));
        }
        writes
    }

    fn plan_array(&self, key: &str, items: &[Value], prefix: &str) -> Vec<PlannedWrite> {
        let mut writes = Vec::new();
        let tree_key = if self.options.expand_arrays {
            key.to_owned()
        } else {
            let rollup = rollup(items);
            if !rollup.is_empty() {
                writes.extend(self.plan_scalar(key, &Value::String(rollup), prefix));
            }
            format!("{key}{TREE_SUFFIX}")
        };

        writes.push(self.structural(&tree_key, &tree_key, prefix));
        for (index, item) in items.iter().enumerate() {
            writes.extend(self.plan(&format!("{tree_key}.{index:03}"), item, prefix));
        }
        writes
    }

    fn plan_scalar(&self, key: &str, value: &Value, prefix: &str) -> Vec<PlannedWrite> {
        let node = self.node_for(key);
        let path = state_path(prefix, key);
        let Some(rule) = node.conversion else {
            return vec![PlannedWrite {
                path,
                node,
                value: value.clone(),
            }];
        };

        let converted = conversion::apply(rule, value, self.links.as_ref());
        let mut writes = Vec::with_capacity(1 + converted.siblings.len());
        writes.push(PlannedWrite {
            path,
            node,
            value: converted.value,
        });
        for sibling in converted.siblings {
            let sibling_key = format!("{key}{}", sibling.suffix);
            let node = self
                .registry
                .lookup(&sibling_key)
                .cloned()
                .unwrap_or(sibling.fallback);
            writes.push(PlannedWrite {
                path: state_path(prefix, &sibling_key),
                node,
                value: sibling.value,
            });
        }
        writes
    }

    fn structural(&self, key: &str, lookup: &str, prefix: &str) -> PlannedWrite {
        let node = match self.registry.lookup(lookup) {
            Some(node) if node.role == Role::Device => node.clone(),
            Some(node) => NodeDescriptor::channel(node.description.clone()),
            None => NodeDescriptor::channel(last_segment(key)),
        };
        PlannedWrite {
            path: state_path(prefix, key),
            node,
            value: Value::Null,
        }
    }

    fn node_for(&self, key: &str) -> NodeDescriptor {
        let mut node = self.registry.resolve(key);
        if node.not_exist {
            node.description = last_segment(key).to_owned();
        }
        node
    }
}

/// Join `prefix` and `key` into a state path.
pub fn state_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

fn last_segment(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// Readable one-line summary of an array (`"Action, Comedy"`).
fn rollup(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => ROLLUP_FIELDS
                .iter()
                .find_map(|field| map.get(*field))
                .and_then(scalar_text),
            other => scalar_text(other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
