//! Declarative extraction of specific fields out of nested metadata documents.
//!
//! A rule set is matched against the lowercase, index-free path of every leaf. Matching rules
//! either publish the leaf, pull named siblings from the leaf's parent object, or re-run another
//! rule set against that parent.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::registry::collapse_indices;

/// Flat destination path → value output of a selection.
pub type Selection = IndexMap<String, Value>;

/// Rule matched against one leaf.
#[derive(Debug, Clone, Copy)]
pub struct SelectorRule {
    /// Lowercase leaf path without array indices, relative to the walked document.
    pub path: &'static str,
    /// Literal the leaf must equal (compared as text) for the rule to apply.
    pub equals: Option<&'static str>,
    /// What to do with a matching leaf.
    pub action: RuleAction,
}

/// Effect of a matching rule.
#[derive(Debug, Clone, Copy)]
pub enum RuleAction {
    /// Publish the leaf value under `dest`.
    Publish {
        /// Destination path.
        dest: &'static str,
    },
    /// Publish named fields of the leaf's parent object: (field, destination).
    Siblings(&'static [(&'static str, &'static str)]),
    /// Re-run `rules` against the leaf's parent object, prefixing output with `prefix` and,
    /// when `key_by_value` is set, with the leaf's own value.
    Dispatch {
        /// Rule set applied to the parent.
        rules: &'static [SelectorRule],
        /// Destination prefix.
        prefix: &'static str,
        /// Insert the leaf value as a path segment after the prefix.
        key_by_value: bool,
    },
}

/// Walk `document` depth-first and collect the values selected by `rules`.
pub fn select(document: &Value, rules: &[SelectorRule]) -> Selection {
    let mut selection = Selection::new();
    walk(document, "", None, rules, "", &mut selection);
    selection
}

fn walk(
    value: &Value,
    path: &str,
    parent: Option<&Map<String, Value>>,
    rules: &[SelectorRule],
    dest_prefix: &str,
    selection: &mut Selection,
) {
    match value {
        Value::Object(map) => {
            for (field, child) in map {
                let child_path = join(path, field);
                walk(child, &child_path, Some(map), rules, dest_prefix, selection);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let item_path = join(path, &format!("{index:03}"));
                walk(item, &item_path, parent, rules, dest_prefix, selection);
            }
        }
        Value::Null => {}
        leaf => visit_leaf(leaf, path, parent, rules, dest_prefix, selection),
    }
}

fn visit_leaf(
    leaf: &Value,
    path: &str,
    parent: Option<&Map<String, Value>>,
    rules: &[SelectorRule],
    dest_prefix: &str,
    selection: &mut Selection,
) {
    let normalized = collapse_indices(&path.to_lowercase());
    let text = leaf_text(leaf);

    for rule in rules.iter().filter(|rule| rule.path == normalized) {
        if rule.equals.is_some_and(|expected| expected != text) {
            continue;
        }
        match rule.action {
            RuleAction::Publish { dest } => {
                selection.insert(join(dest_prefix, dest), leaf.clone());
            }
            RuleAction::Siblings(fields) => {
                let Some(parent) = parent else { continue };
                for (field, dest) in fields {
                    if let Some(value) = parent.get(*field).filter(|value| !value.is_null()) {
                        selection.insert(join(dest_prefix, dest), value.clone());
                    }
                }
            }
            RuleAction::Dispatch {
                rules: derived,
                prefix,
                key_by_value,
            } => {
                let Some(parent) = parent else { continue };
                let mut nested_prefix = join(dest_prefix, prefix);
                if key_by_value {
                    nested_prefix = join(&nested_prefix, &text);
                }
                for (field, child) in parent {
                    walk(child, field, Some(parent), derived, &nested_prefix, selection);
                }
            }
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    match (prefix.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_owned(),
        (_, true) => prefix.to_owned(),
        _ => format!("{prefix}.{segment}"),
    }
}

fn leaf_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Stream type code of lyric streams.
pub const LYRICS_STREAM_TYPE: &str = "4";

const TRACK_RULES: &[SelectorRule] = &[
    SelectorRule {
        path: "grandparenttitle",
        equals: None,
        action: RuleAction::Publish { dest: "artist" },
    },
    SelectorRule {
        path: "parenttitle",
        equals: None,
        action: RuleAction::Publish { dest: "album" },
    },
    SelectorRule {
        path: "title",
        equals: None,
        action: RuleAction::Publish { dest: "title" },
    },
];

const EPISODE_RULES: &[SelectorRule] = &[
    SelectorRule {
        path: "grandparenttitle",
        equals: None,
        action: RuleAction::Publish { dest: "show" },
    },
    SelectorRule {
        path: "parentindex",
        equals: None,
        action: RuleAction::Publish { dest: "season" },
    },
    SelectorRule {
        path: "index",
        equals: None,
        action: RuleAction::Publish { dest: "episode" },
    },
    SelectorRule {
        path: "title",
        equals: None,
        action: RuleAction::Publish { dest: "title" },
    },
];

const MOVIE_RULES: &[SelectorRule] = &[
    SelectorRule {
        path: "title",
        equals: None,
        action: RuleAction::Publish { dest: "title" },
    },
    SelectorRule {
        path: "year",
        equals: None,
        action: RuleAction::Publish { dest: "year" },
    },
];

/// Rules applied to a playing session's metadata item.
pub const SESSION_RULES: &[SelectorRule] = &[
    SelectorRule {
        path: "media.part.stream.streamtype",
        equals: Some(LYRICS_STREAM_TYPE),
        action: RuleAction::Siblings(&[("key", "lyrics.url"), ("codec", "lyrics.codec")]),
    },
    SelectorRule {
        path: "type",
        equals: Some("track"),
        action: RuleAction::Dispatch {
            rules: TRACK_RULES,
            prefix: "item",
            key_by_value: true,
        },
    },
    SelectorRule {
        path: "type",
        equals: Some("episode"),
        action: RuleAction::Dispatch {
            rules: EPISODE_RULES,
            prefix: "item",
            key_by_value: true,
        },
    },
    SelectorRule {
        path: "type",
        equals: Some("movie"),
        action: RuleAction::Dispatch {
            rules: MOVIE_RULES,
            prefix: "item",
            key_by_value: true,
        },
    },
];

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn track() -> Value {
        json!({
            "type": "track",
            "title": "Teardrop",
            "parentTitle": "Mezzanine",
            "grandparentTitle": "Massive Attack",
            "Media": [{
                "Part": [{
                    "Stream": [
                        {"streamType": 2, "codec": "flac"},
                        {"streamType": 4, "codec": "lrc", "key": "/library/streams/99"}
                    ]
                }]
            }]
        })
    }

    #[test]
    fn lyric_stream_is_published_from_parent() {
        let selection = select(&track(), SESSION_RULES);
        assert_eq!(selection["lyrics.url"], json!("/library/streams/99"));
        assert_eq!(selection["lyrics.codec"], json!("lrc"));
    }

    #[test]
    fn item_fields_are_keyed_by_type() {
        let selection = select(&track(), SESSION_RULES);
        assert_eq!(selection["item.track.artist"], json!("Massive Attack"));
        assert_eq!(selection["item.track.album"], json!("Mezzanine"));
        assert_eq!(selection["item.track.title"], json!("Teardrop"));
        assert!(!selection.contains_key("item.episode.title"));
    }

    #[test]
    fn literal_mismatch_skips_rule() {
        let document = json!({"Media": [{"Part": [{"Stream": [{"streamType": 3, "key": "/s/1"}]}]}]});
        assert!(select(&document, SESSION_RULES).is_empty());
    }

    #[test]
    fn episodes_use_their_own_rules() {
        let document = json!({
            "type": "episode",
            "title": "Pilot",
            "grandparentTitle": "Lost",
            "parentIndex": 1,
            "index": 1
        });
        let selection = select(&document, SESSION_RULES);
        assert_eq!(selection["item.episode.show"], json!("Lost"));
        assert_eq!(selection["item.episode.season"], json!(1));
        assert_eq!(selection.len(), 4);
    }
}
