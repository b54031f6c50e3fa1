//! Attribute data carried between rules.
//!
//! The model is intentionally small: rules in this crate only need names, values,
//! types, where on the page a value came from, and the attribute hierarchy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Page region a value was read from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialBounds {
    /// 1-based page number
    pub page: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// A named value extracted from a document, optionally with children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    #[serde(default, rename = "type")]
    pub attribute_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialBounds>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<Attribute>,
}

/// Top-level attributes of one document.
pub type AttributeSet = Vec<Attribute>;

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            attribute_type: String::new(),
            spatial: None,
            sub_attributes: Vec::new(),
        }
    }

    pub fn with_type(mut self, attribute_type: impl Into<String>) -> Self {
        self.attribute_type = attribute_type.into();
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialBounds) -> Self {
        self.spatial = Some(spatial);
        self
    }

    pub fn with_child(mut self, child: Attribute) -> Self {
        self.sub_attributes.push(child);
        self
    }

    /// Depth-first search for the first attribute named `name` (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&Attribute> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(self);
        }
        self.sub_attributes.iter().find_map(|child| child.find(name))
    }
}

/// Per-document context handed to rules alongside the attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Path of the source document the attributes were extracted from
    pub source_path: PathBuf,
}

impl DocumentContext {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_searches_hierarchy() {
        let root = Attribute::new("Invoice", "")
            .with_child(Attribute::new("Vendor", "ACME").with_child(Attribute::new("Zip", "53703")));

        assert_eq!(root.find("zip").map(|a| a.value.as_str()), Some("53703"));
        assert!(root.find("Total").is_none());
    }

    #[test]
    fn test_attribute_json_shape() {
        let attr = Attribute::new("Total", "12.50")
            .with_type("Money")
            .with_spatial(SpatialBounds {
                page: 1,
                left: 10,
                top: 20,
                right: 90,
                bottom: 35,
            });

        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["type"], "Money");
        assert_eq!(json["spatial"]["page"], 1);
        assert!(json.get("sub_attributes").is_none());

        let parsed: Attribute = serde_json::from_str(r#"{"name":"A","value":"1"}"#).unwrap();
        assert_eq!(parsed.attribute_type, "");
        assert!(parsed.spatial.is_none());
    }
}
