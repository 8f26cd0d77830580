//! Static catalog describing the metadata of every known state path.

mod catalog;
pub mod node;

use std::collections::HashMap;

pub use self::catalog::MEDIA_TYPES;
pub use self::node::{Conversion, NodeDescriptor, Role, ValueType};

const EVENTS_ROOT: &str = "events.";
const PLAYING_ROOT: &str = "playing.";

/// Read-only lookup table from normalized dotted paths to node descriptors.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeDescriptor>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NodeRegistry {
    /// Registry loaded with the built-in catalog.
    pub fn builtin() -> Self {
        let mut nodes = HashMap::new();
        for (path, description, role, value_type, conversion, writable) in catalog::NODES {
            let mut node = NodeDescriptor::new(*description, *role, *value_type);
            node.conversion = *conversion;
            node.writable = *writable;
            nodes.insert((*path).to_owned(), node);
        }

        for media_type in MEDIA_TYPES {
            nodes.insert(
                format!("details.{media_type}"),
                NodeDescriptor::channel(format!("Timeline of {media_type}")),
            );
            for (field, description, role, value_type, conversion) in catalog::DETAIL_FIELDS {
                let mut node =
                    NodeDescriptor::new(format!("{description} ({media_type})"), *role, *value_type);
                node.conversion = *conversion;
                nodes.insert(format!("details.{media_type}.{field}"), node);
            }
        }

        Self { nodes }
    }

    /// Registry with an explicit set of nodes, mostly useful for tests.
    pub fn from_nodes<I, K>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (K, NodeDescriptor)>,
        K: AsRef<str>,
    {
        Self {
            nodes: nodes
                .into_iter()
                .map(|(path, node)| (path.as_ref().to_lowercase(), node))
                .collect(),
        }
    }

    /// Number of declared nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve the descriptor for `path`.
    ///
    /// Lookup is case-insensitive. On a miss, numeric array segments are collapsed; on a further
    /// miss, an `events.` path is re-rooted under `playing.`. Unknown paths yield
    /// [`NodeDescriptor::generic`].
    pub fn resolve(&self, path: &str) -> NodeDescriptor {
        self.lookup(path).cloned().unwrap_or_else(NodeDescriptor::generic)
    }

    /// Same as [`Self::resolve`] but reports misses as `None`.
    pub fn lookup(&self, path: &str) -> Option<&NodeDescriptor> {
        let normalized = path.to_lowercase();
        if let Some(node) = self.nodes.get(&normalized) {
            return Some(node);
        }

        let collapsed = collapse_indices(&normalized);
        if let Some(node) = self.nodes.get(&collapsed) {
            return Some(node);
        }

        let rest = collapsed.strip_prefix(EVENTS_ROOT)?;
        self.nodes.get(&format!("{PLAYING_ROOT}{rest}"))
    }
}

/// Drop every purely numeric segment from a dotted path.
pub fn collapse_indices(path: &str) -> String {
    path.split('.')
        .filter(|segment| segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether a path contains a zero-padded array index segment.
pub fn has_index_segment(path: &str) -> bool {
    path.split('.')
        .any(|segment| segment.len() == 3 && segment.bytes().all(|b| b.is_ascii_digit()))
}
