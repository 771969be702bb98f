//! Loading node trees from JSON.
//!
//! A node is either a string (a text node) or an object:
//!
//! ```json
//! {"tag": "ul", "props": {"class": "list"}, "children": [
//!     {"tag": "li", "key": 1, "children": "one"},
//!     {"children": ["a", "b"]}
//! ]}
//! ```
//!
//! An object without `tag` is a fragment. `children` is a string (element
//! text) or a list of nodes. Event handlers cannot be expressed in JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::vnode::{Children, Key, NodeKind, VNode};
use crate::error::{Error, Result};
use crate::reactive::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonNode {
    Text(String),
    Element(JsonElement),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonElement {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    key: Option<JsonKey>,
    #[serde(default)]
    props: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    children: Option<JsonChildren>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonKey {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonChildren {
    Text(String),
    Nodes(Vec<JsonNode>),
}

impl JsonNode {
    fn into_vnode(self) -> Result<VNode> {
        let element = match self {
            JsonNode::Text(content) => return Ok(VNode::text(content)),
            JsonNode::Element(element) => element,
        };

        let mut node = match element.tag {
            Some(tag) if tag.is_empty() => {
                return Err(Error::InvalidNode("element tag is empty".to_string()))
            }
            Some(tag) => VNode::element(tag),
            None => {
                if !element.props.is_empty() {
                    return Err(Error::InvalidNode("fragments take no props".to_string()));
                }
                VNode::fragment([])
            }
        };
        let is_fragment = matches!(node.kind(), NodeKind::Fragment);

        if let Some(key) = element.key {
            node = match key {
                JsonKey::Int(n) => node.key(Key::Int(n)),
                JsonKey::Str(s) => node.key(Key::Str(s.into())),
            };
        }
        for (name, value) in &element.props {
            node = node.prop(name.as_str(), Value::from_json(value));
        }

        if let Some(children) = element.children {
            node.children = match children {
                JsonChildren::Text(_) if is_fragment => {
                    return Err(Error::InvalidNode(
                        "fragment children must be a list of nodes".to_string(),
                    ))
                }
                JsonChildren::Text(text) => Children::Text(text.into()),
                JsonChildren::Nodes(nodes) => Children::Nodes(
                    nodes
                        .into_iter()
                        .map(JsonNode::into_vnode)
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
        }
        Ok(node)
    }
}

impl VNode {
    /// Load a node tree from a JSON document.
    pub fn from_json(json: &str) -> Result<VNode> {
        let node: JsonNode = serde_json::from_str(json)?;
        node.into_vnode()
    }

    /// Load a node tree from an already parsed JSON value.
    pub fn from_json_value(json: serde_json::Value) -> Result<VNode> {
        let node: JsonNode = serde_json::from_value(json)?;
        node.into_vnode()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_tree() {
        let json = r#"{
            "tag": "ul",
            "props": {"class": "list", "data-count": 2},
            "children": [
                {"tag": "li", "key": 1, "children": "one"},
                {"tag": "li", "key": "two", "children": "two"},
                {"children": ["a", "b"]}
            ]
        }"#;

        let node = VNode::from_json(json).unwrap();
        assert!(matches!(node.kind(), NodeKind::Element(tag) if &**tag == "ul"));
        assert_eq!(node.props().get("data-count"), Some(&Value::from(2)));

        let children = node.get_children().nodes();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].get_key(), Some(&Key::Int(1)));
        assert_eq!(children[1].get_key(), Some(&Key::from("two")));
        assert!(matches!(children[2].kind(), NodeKind::Fragment));
        assert_eq!(children[2].get_children().nodes().len(), 2);
    }

    #[test]
    fn bare_string_is_text() {
        let node = VNode::from_json("\"hi\"").unwrap();
        assert!(matches!(node.kind(), NodeKind::Text(content) if &**content == "hi"));
    }

    #[test]
    fn invalid_trees_are_rejected() {
        assert!(matches!(
            VNode::from_json(r#"{"children": "text"}"#),
            Err(Error::InvalidNode(_))
        ));
        assert!(matches!(
            VNode::from_json(r#"{"tag": ""}"#),
            Err(Error::InvalidNode(_))
        ));
        assert!(matches!(VNode::from_json("{"), Err(Error::Json(_))));
        assert!(VNode::from_json("42").is_err());
    }
}
