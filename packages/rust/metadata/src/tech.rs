//! Ordered technical-metadata key/value pairs.
//!
//! Presentation-oriented view of the PREMIS technical metadata for one
//! original file, in the `Group:Field` naming convention used by EXIF
//! tooling (`File:Size`, `File:MIMEType`, ...).

use std::fmt;

/// Ordered technical metadata pairs for display and indexing.
#[derive(Debug, Clone, Default)]
pub struct TechPairs {
    pairs: Vec<(String, String)>,
}

impl TechPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; empty values are skipped.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.pairs.push((key.into(), value));
        }
    }

    /// First value recorded under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for TechPairs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .pairs
            .iter()
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(0);
        for (key, value) in &self.pairs {
            writeln!(f, "{key:width$}  {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_keep_insertion_order() {
        let mut tech = TechPairs::new();
        tech.push("File:FileName", "interview-01.tiff");
        tech.push("File:MIMEType", "image/tiff");
        tech.push("File:Size", "5.00 MiB");

        let keys: Vec<&str> = tech.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["File:FileName", "File:MIMEType", "File:Size"]);
        assert_eq!(tech.get("File:MIMEType"), Some("image/tiff"));
    }

    #[test]
    fn empty_values_are_dropped() {
        let mut tech = TechPairs::new();
        tech.push("File:FormatVersion", "");
        tech.push("File:FormatName", "TIFF");
        assert_eq!(tech.len(), 1);
        assert!(tech.get("File:FormatVersion").is_none());
    }

    #[test]
    fn display_aligns_keys() {
        let mut tech = TechPairs::new();
        tech.push("File:FileName", "a.tiff");
        tech.push("File:Size", "1 B");
        let text = tech.to_string();
        assert!(text.contains("File:FileName  a.tiff"));
        assert!(text.contains("File:Size      1 B"));
    }
}
