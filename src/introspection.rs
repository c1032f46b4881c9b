//! Schema Introspection Model
//!
//! The structural snapshot produced by the upstream introspection function,
//! plus the explicit decoding rules for its JSON payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// SQL dialect of a snapshot. Only Postgres is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", alias = "data_type", alias = "dataType")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[cfg(test)]
impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

/// Complete structural snapshot at a point in time.
///
/// Tables are keyed by name; `count_tables` is derived from the map and is
/// never taken from input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "SnapshotWire")]
pub struct Snapshot {
    pub dialect: Dialect,
    tables: BTreeMap<String, Vec<Column>>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        dialect: Dialect,
        tables: BTreeMap<String, Vec<Column>>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dialect,
            tables,
            captured_at,
        }
    }

    pub fn tables(&self) -> &BTreeMap<String, Vec<Column>> {
        &self.tables
    }

    pub fn count_tables(&self) -> usize {
        self.tables.len()
    }

    /// Compute checksum from structural content (capture time excluded)
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.dialect.as_str().as_bytes());

        for (table, columns) in &self.tables {
            hasher.update(format!("T:{}", table).as_bytes());

            let mut sorted: Vec<&Column> = columns.iter().collect();
            sorted.sort_by(|a, b| a.name.cmp(&b.name));
            for col in sorted {
                hasher.update(
                    format!("C:{}.{}:{}:{}", table, col.name, col.data_type, col.nullable)
                        .as_bytes(),
                );
            }
        }

        format!("{:x}", hasher.finalize())
    }

    /// Decode the `tables`-bearing body of a fetch response.
    ///
    /// `fallback_dialect` is used when the body carries no `dialect`.
    pub fn from_fetch_body(body: &Value, fallback_dialect: Dialect) -> Result<Self, String> {
        let object = body
            .as_object()
            .ok_or_else(|| "response body is not a JSON object".to_string())?;

        let tables_value = object
            .get("tables")
            .ok_or_else(|| "response body has no `tables` field".to_string())?;

        let tables: BTreeMap<String, Vec<Column>> = serde_json::from_value(tables_value.clone())
            .map_err(|e| format!("invalid `tables` field: {}", e))?;

        let dialect = match object.get("dialect") {
            None | Some(Value::Null) => fallback_dialect,
            Some(Value::String(s)) if s.trim().is_empty() => fallback_dialect,
            Some(Value::String(s)) => {
                Dialect::parse(s).ok_or_else(|| format!("unsupported dialect '{}'", s))?
            }
            Some(other) => return Err(format!("invalid `dialect` field: {}", other)),
        };

        if let Some(reported) = object.get("countTables").and_then(Value::as_u64) {
            if reported as usize != tables.len() {
                warn!(
                    "Upstream reported countTables={} but sent {} tables; using the derived count",
                    reported,
                    tables.len()
                );
            }
        }

        let captured_at = object
            .get("capturedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self::new(dialect, tables, captured_at))
    }
}

/// Fixture builders
#[cfg(test)]
impl Snapshot {
    /// An empty Postgres snapshot captured now
    pub fn empty() -> Self {
        Self::new(Dialect::Postgres, BTreeMap::new(), Utc::now())
    }

    /// Returns this snapshot with one more (or replaced) table
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<Column>) -> Self {
        self.tables.insert(name.into(), columns);
        self
    }
}

/// Wire shape: `countTables` is accepted but recomputed
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotWire {
    #[serde(default)]
    dialect: Dialect,
    tables: BTreeMap<String, Vec<Column>>,
    #[serde(default)]
    #[allow(dead_code)]
    count_tables: Option<u64>,
    #[serde(default = "Utc::now")]
    captured_at: DateTime<Utc>,
}

impl From<SnapshotWire> for Snapshot {
    fn from(wire: SnapshotWire) -> Self {
        Snapshot::new(wire.dialect, wire.tables, wire.captured_at)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Out<'a> {
            dialect: Dialect,
            tables: &'a BTreeMap<String, Vec<Column>>,
            count_tables: usize,
            captured_at: DateTime<Utc>,
        }

        Out {
            dialect: self.dialect,
            tables: &self.tables,
            count_tables: self.tables.len(),
            captured_at: self.captured_at,
        }
        .serialize(serializer)
    }
}
