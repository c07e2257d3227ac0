//! Safe construction of warehouse SQL text.
//!
//! Values discovered at runtime (category names) only enter SQL through
//! [`quote_string`]; identifiers only through [`TableName`] and
//! [`quote_identifier`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WarehouseError;

/// Quote a value as a GoogleSQL string literal.
///
/// ```
/// use sluice_core::warehouse::quote_string;
///
/// assert_eq!(quote_string("India"), "'India'");
/// assert_eq!(quote_string("Cote d'Ivoire"), r"'Cote d\'Ivoire'");
/// ```
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str(r"\\"),
            '\'' => quoted.push_str(r"\'"),
            '"' => quoted.push_str("\\\""),
            '`' => quoted.push_str("\\`"),
            '\n' => quoted.push_str(r"\n"),
            '\r' => quoted.push_str(r"\r"),
            '\t' => quoted.push_str(r"\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote a column or table identifier with backticks.
///
/// Identifiers containing backticks, backslashes or line breaks are rejected
/// rather than escaped.
pub fn quote_identifier(name: &str) -> Result<String, WarehouseError> {
    validate_identifier(name).map_err(|reason| WarehouseError::InvalidIdentifier {
        name: name.to_string(),
        reason,
    })?;
    Ok(format!("`{name}`"))
}

fn validate_identifier(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("must not be empty");
    }
    if name.contains(['`', '\\']) {
        return Err("must not contain backticks or backslashes");
    }
    if name.chars().any(char::is_control) {
        return Err("must not contain control characters");
    }
    Ok(())
}

/// Fully-qualified `project.dataset.table` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    project: String,
    dataset: String,
    table: String,
}

impl TableName {
    /// Build a table name from its three parts.
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, WarehouseError> {
        let name = Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        };

        for part in [&name.project, &name.dataset, &name.table] {
            let reason = if part.is_empty() {
                Some("every part must be non-empty")
            } else if part.contains('.') {
                Some("parts must not contain '.'")
            } else {
                validate_identifier(part).err()
            };
            if let Some(reason) = reason {
                return Err(WarehouseError::InvalidTableName {
                    name: name.to_string(),
                    reason,
                });
            }
        }
        Ok(name)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Backtick-quoted form for use in SQL text.
    pub fn quoted(&self) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, self.table)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl FromStr for TableName {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches('`');
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(project), Some(dataset), Some(table), None) => {
                Self::new(project, dataset, table)
            }
            _ => Err(WarehouseError::InvalidTableName {
                name: s.to_string(),
                reason: "expected project.dataset.table",
            }),
        }
    }
}

impl Serialize for TableName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TableName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
