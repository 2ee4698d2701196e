//! Field paths inside a manifest
//!
//! A [`FieldPath`] names a location such as `spec.interfaces[].name`. The
//! array marker `[]` stands for "any element"; error messages may carry a
//! more precise segment (`[name=eth0]` or `[2]`) which [`FieldPath::schema_path`]
//! folds back into the marker for schema lookups.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// Any element of a sequence
    Element,
    /// Element identified by its merge-key values, e.g. `name=eth0`
    Keyed(String),
    /// Element identified by position
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse the textual form used in schema files (`spec.interfaces[]`)
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim().trim_start_matches('.');
        if text.is_empty() {
            return Err("path is empty".to_string());
        }

        let mut segments = Vec::new();
        for part in text.split('.') {
            let mut key = part;
            let mut markers = 0;
            while let Some(stripped) = key.strip_suffix("[]") {
                key = stripped;
                markers += 1;
            }
            if key.is_empty() {
                return Err(format!("empty key in '{part}'"));
            }
            if key.contains('[') || key.contains(']') {
                return Err(format!("unexpected bracket in '{part}'"));
            }
            segments.push(PathSegment::Key(key.to_string()));
            segments.extend(std::iter::repeat_n(PathSegment::Element, markers));
        }
        Ok(Self(segments))
    }

    pub fn child(&self, key: &str) -> Self {
        self.with(PathSegment::Key(key.to_string()))
    }

    pub fn element(&self) -> Self {
        self.with(PathSegment::Element)
    }

    pub fn keyed(&self, selector: impl Into<String>) -> Self {
        self.with(PathSegment::Keyed(selector.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The same path with every element selector replaced by `[]`
    pub fn schema_path(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|segment| match segment {
                    PathSegment::Keyed(_) | PathSegment::Index(_) => PathSegment::Element,
                    other => other.clone(),
                })
                .collect(),
        )
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Element => f.write_str("[]")?,
                PathSegment::Keyed(selector) => write!(f, "[{selector}]")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let path = FieldPath::root().child("spec").child("interfaces").element().child("name");
        assert_eq!(path.to_string(), "spec.interfaces[].name");
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_parse_roundtrip() {
        for text in ["spec.replicas", "spec.interfaces[]", "spec.matrix[][].cells[]"] {
            assert_eq!(FieldPath::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("spec..name").is_err());
        assert!(FieldPath::parse("spec.items[0]").is_err());
    }

    #[test]
    fn test_schema_path_folds_selectors() {
        let precise = FieldPath::root()
            .child("spec")
            .child("profile")
            .keyed("name=eth0")
            .child("ports")
            .index(1);
        assert_eq!(precise.to_string(), "spec.profile[name=eth0].ports[1]");
        assert_eq!(precise.schema_path(), FieldPath::parse("spec.profile[].ports[]").unwrap());
    }
}
