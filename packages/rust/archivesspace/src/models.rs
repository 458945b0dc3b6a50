//! Builders for ArchivesSpace JSONModel fragments.
//!
//! ArchivesSpace rejects records whose date and extent sub-records use terms
//! outside its closed vocabularies, so these builders validate up front and
//! return the exact JSON the schema expects.

use serde_json::{Value, json};

use ushanka_shared::{Result, UshankaError};

/// Date labels the `date` schema accepts.
pub const VALID_DATE_LABELS: &[&str] = &[
    "agent_relation",
    "broadcast",
    "copyright",
    "creation",
    "deaccession",
    "digitized",
    "event",
    "existence",
    "issued",
    "modified",
    "other",
    "publication",
    "record_keeping",
    "usage",
];

/// Date types the `date` schema accepts.
pub const VALID_DATE_TYPES: &[&str] = &["bulk", "inclusive", "range", "single"];

/// Date certainties the `date` schema accepts.
pub const VALID_DATE_CERTAINTIES: &[&str] = &["approximate", "inferred", "questionable"];

/// Extent portions the `extent` schema accepts.
pub const VALID_EXTENT_PORTIONS: &[&str] = &["whole", "part"];

/// Extent types the `extent` schema accepts.
pub const VALID_EXTENT_TYPES: &[&str] = &[
    "cassettes",
    "cubic feet",
    "gigabytes",
    "megabytes",
    "terrabytes",
    "leaves",
    "linear feet",
    "photographic prints",
    "photographic slides",
    "reels",
    "sheets",
    "volumes",
    "boxes",
    "files",
];

/// A `date` JSONModel under construction.
#[derive(Debug, Clone, Default)]
pub struct DateSpec {
    pub date_type: String,
    pub label: String,
    pub certainty: String,
    pub begin: String,
    pub end: String,
    pub expression: String,
}

impl DateSpec {
    pub fn new(date_type: &str, label: &str) -> Self {
        Self {
            date_type: date_type.to_string(),
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn begin(mut self, begin: &str) -> Self {
        self.begin = begin.to_string();
        self
    }

    pub fn end(mut self, end: &str) -> Self {
        self.end = end.to_string();
        self
    }

    pub fn expression(mut self, expression: &str) -> Self {
        self.expression = expression.to_string();
        self
    }

    pub fn certainty(mut self, certainty: &str) -> Self {
        self.certainty = certainty.to_string();
        self
    }

    /// Validate against the closed vocabularies and emit the JSONModel.
    ///
    /// A date must carry at least one of begin, end, or expression.
    pub fn build(self) -> Result<Value> {
        check_vocab("date type", &self.date_type, VALID_DATE_TYPES)?;
        check_vocab("date label", &self.label, VALID_DATE_LABELS)?;
        if self.begin.is_empty() && self.end.is_empty() && self.expression.is_empty() {
            return Err(UshankaError::validation(
                "date must have a begin, end, or expression value",
            ));
        }

        let mut model = serde_json::Map::new();
        model.insert("jsonmodel_type".into(), "date".into());
        model.insert("date_type".into(), self.date_type.into());
        model.insert("label".into(), self.label.into());
        model.insert("era".into(), "ce".into());
        model.insert("calendar".into(), "gregorian".into());
        if !self.certainty.is_empty() {
            check_vocab("date certainty", &self.certainty, VALID_DATE_CERTAINTIES)?;
            model.insert("certainty".into(), self.certainty.into());
        }
        for (key, value) in [
            ("begin", self.begin),
            ("end", self.end),
            ("expression", self.expression),
        ] {
            if !value.is_empty() {
                model.insert(key.into(), value.into());
            }
        }
        Ok(Value::Object(model))
    }
}

/// Build an `extent` JSONModel, validating portion and type.
pub fn extent_model(number: &str, extent_type: &str, portion: &str) -> Result<Value> {
    check_vocab("extent portion", portion, VALID_EXTENT_PORTIONS)?;
    check_vocab("extent type", extent_type, VALID_EXTENT_TYPES)?;
    Ok(json!({
        "jsonmodel_type": "extent",
        "portion": portion,
        "number": number,
        "extent_type": extent_type,
    }))
}

/// Build a `file_version` JSONModel pointing at a repository object.
pub fn file_version(uri: &str, published: bool, is_representative: bool) -> Value {
    json!({
        "jsonmodel_type": "file_version",
        "is_representative": is_representative,
        "file_uri": uri,
        "xlink_actuate_attribute": "onRequest",
        "xlink_show_attribute": "new",
        "publish": published,
    })
}

fn check_vocab(what: &str, value: &str, valid: &[&str]) -> Result<()> {
    if valid.contains(&value) {
        Ok(())
    } else {
        Err(UshankaError::validation(format!(
            "{value:?} is not a valid {what}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_creation_date() {
        let date = DateSpec::new("single", "creation")
            .begin("2002-03-14")
            .build()
            .unwrap();
        assert_eq!(date["date_type"], "single");
        assert_eq!(date["begin"], "2002-03-14");
        assert_eq!(date["era"], "ce");
        assert!(date.get("certainty").is_none());
    }

    #[test]
    fn date_needs_some_value() {
        let err = DateSpec::new("single", "creation").build().unwrap_err();
        assert!(err.to_string().contains("begin, end, or expression"));
    }

    #[test]
    fn invalid_label_rejected() {
        let err = DateSpec::new("single", "birthday")
            .begin("2002")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not a valid date label"));
    }

    #[test]
    fn invalid_certainty_rejected() {
        let err = DateSpec::new("single", "creation")
            .begin("2002")
            .certainty("vibes")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not a valid date certainty"));
    }

    #[test]
    fn extent_vocabulary_enforced() {
        let extent = extent_model("35", "cassettes", "whole").unwrap();
        assert_eq!(extent["extent_type"], "cassettes");
        assert!(extent_model("35", "casettes", "whole").is_err());
        assert!(extent_model("35", "cassettes", "some").is_err());
    }

    #[test]
    fn file_version_shape() {
        let fv = file_version("https://repo.example.org/islandora/object/test:27", true, true);
        assert_eq!(fv["xlink_actuate_attribute"], "onRequest");
        assert_eq!(
            fv["file_uri"],
            "https://repo.example.org/islandora/object/test:27"
        );
    }
}
