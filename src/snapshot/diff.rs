//! Schema Diff Engine
//!
//! Compares two structural snapshots by table and column name.
//! Positions never matter, only names and declared types.

use crate::introspection::{Column, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A declared type that differs between the two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChange {
    pub old: String,
    pub new: String,
}

/// Column-level changes of a table present in both snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDelta {
    pub added_columns: BTreeSet<String>,
    pub removed_columns: BTreeSet<String>,
    pub type_changes: BTreeMap<String, TypeChange>,
}

impl ColumnDelta {
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.removed_columns.is_empty()
            && self.type_changes.is_empty()
    }
}

/// Complete diff result. A table name appears in at most one of the
/// three fields; tables in none of them are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub added_tables: BTreeSet<String>,
    pub removed_tables: BTreeSet<String>,
    pub changed_tables: BTreeMap<String, ColumnDelta>,
}

/// Summary statistics for the diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub tables_added: usize,
    pub tables_removed: usize,
    pub tables_modified: usize,
    pub columns_added: usize,
    pub columns_removed: usize,
    pub columns_retyped: usize,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.changed_tables.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary {
            tables_added: self.added_tables.len(),
            tables_removed: self.removed_tables.len(),
            tables_modified: self.changed_tables.len(),
            ..Default::default()
        };

        for delta in self.changed_tables.values() {
            summary.columns_added += delta.added_columns.len();
            summary.columns_removed += delta.removed_columns.len();
            summary.columns_retyped += delta.type_changes.len();
        }

        summary
    }
}

/// The diff engine that compares snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare `old` against `new`
    pub fn diff(old: &Snapshot, new: &Snapshot) -> DiffReport {
        let old_tables = old.tables();
        let new_tables = new.tables();

        let old_keys: HashSet<&String> = old_tables.keys().collect();
        let new_keys: HashSet<&String> = new_tables.keys().collect();

        let mut report = DiffReport {
            added_tables: new_keys
                .difference(&old_keys)
                .map(|name| name.to_string())
                .collect(),
            removed_tables: old_keys
                .difference(&new_keys)
                .map(|name| name.to_string())
                .collect(),
            changed_tables: BTreeMap::new(),
        };

        for name in old_keys.intersection(&new_keys) {
            let delta = Self::diff_columns(&old_tables[*name], &new_tables[*name]);
            if !delta.is_empty() {
                report.changed_tables.insert(name.to_string(), delta);
            }
        }

        report
    }

    fn diff_columns(old: &[Column], new: &[Column]) -> ColumnDelta {
        let old_cols: HashMap<&str, &Column> = old.iter().map(|c| (c.name.as_str(), c)).collect();
        let new_cols: HashMap<&str, &Column> = new.iter().map(|c| (c.name.as_str(), c)).collect();

        let old_keys: HashSet<&str> = old_cols.keys().copied().collect();
        let new_keys: HashSet<&str> = new_cols.keys().copied().collect();

        let mut delta = ColumnDelta {
            added_columns: new_keys
                .difference(&old_keys)
                .map(|c| c.to_string())
                .collect(),
            removed_columns: old_keys
                .difference(&new_keys)
                .map(|c| c.to_string())
                .collect(),
            type_changes: BTreeMap::new(),
        };

        for col_name in old_keys.intersection(&new_keys) {
            let from = old_cols[col_name];
            let to = new_cols[col_name];

            if from.data_type != to.data_type {
                delta.type_changes.insert(
                    col_name.to_string(),
                    TypeChange {
                        old: from.data_type.clone(),
                        new: to.data_type.clone(),
                    },
                );
            }
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Snapshot {
        Snapshot::empty()
            .with_table(
                "users",
                vec![
                    Column::new("id", "integer", false),
                    Column::new("email", "text", false),
                ],
            )
            .with_table(
                "orders",
                vec![
                    Column::new("id", "integer", false),
                    Column::new("user_id", "integer", false),
                    Column::new("total", "numeric", true),
                ],
            )
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_identical_snapshots_have_empty_diff() {
        let report = DiffEngine::diff(&base(), &base());
        assert!(report.is_empty());
        assert_eq!(report, DiffReport::default());
    }

    #[test]
    fn test_added_table_is_antisymmetric() {
        let s = base();
        let s_plus = base().with_table("audit_log", vec![Column::new("at", "timestamptz", false)]);

        let forward = DiffEngine::diff(&s, &s_plus);
        assert_eq!(
            forward,
            DiffReport {
                added_tables: set(&["audit_log"]),
                ..Default::default()
            }
        );

        let backward = DiffEngine::diff(&s_plus, &s);
        assert_eq!(
            backward,
            DiffReport {
                removed_tables: set(&["audit_log"]),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_column_changes() {
        let new = Snapshot::empty()
            .with_table(
                "users",
                vec![
                    Column::new("id", "bigint", false),
                    Column::new("created_at", "timestamptz", false),
                ],
            )
            .with_table(
                "orders",
                vec![
                    Column::new("id", "integer", false),
                    Column::new("user_id", "integer", false),
                    Column::new("total", "numeric", true),
                ],
            );

        let report = DiffEngine::diff(&base(), &new);

        assert!(report.added_tables.is_empty());
        assert!(report.removed_tables.is_empty());
        assert_eq!(report.changed_tables.len(), 1);

        let users = &report.changed_tables["users"];
        assert_eq!(users.added_columns, set(&["created_at"]));
        assert_eq!(users.removed_columns, set(&["email"]));
        assert_eq!(
            users.type_changes["id"],
            TypeChange {
                old: "integer".to_string(),
                new: "bigint".to_string(),
            }
        );

        let summary = report.summary();
        assert_eq!(summary.tables_modified, 1);
        assert_eq!(summary.columns_added, 1);
        assert_eq!(summary.columns_removed, 1);
        assert_eq!(summary.columns_retyped, 1);
    }

    #[test]
    fn test_column_order_is_ignored() {
        let reordered = Snapshot::empty()
            .with_table(
                "users",
                vec![
                    Column::new("email", "text", false),
                    Column::new("id", "integer", false),
                ],
            )
            .with_table(
                "orders",
                vec![
                    Column::new("total", "numeric", true),
                    Column::new("user_id", "integer", false),
                    Column::new("id", "integer", false),
                ],
            );

        assert!(DiffEngine::diff(&base(), &reordered).is_empty());
    }

    #[test]
    fn test_nullability_alone_is_not_a_change() {
        let relaxed = base().with_table(
            "users",
            vec![
                Column::new("id", "integer", false),
                Column::new("email", "text", true),
            ],
        );
        assert!(DiffEngine::diff(&base(), &relaxed).is_empty());
    }

    #[test]
    fn test_empty_to_nonempty() {
        let empty = Snapshot::empty();

        let forward = DiffEngine::diff(&empty, &base());
        assert_eq!(forward.added_tables, set(&["orders", "users"]));
        assert!(forward.removed_tables.is_empty());
        assert!(forward.changed_tables.is_empty());

        let backward = DiffEngine::diff(&base(), &empty);
        assert_eq!(backward.removed_tables, set(&["orders", "users"]));
        assert!(backward.added_tables.is_empty());

        assert!(DiffEngine::diff(&empty, &Snapshot::empty()).is_empty());
    }

    #[test]
    fn test_table_in_exactly_one_bucket() {
        let new = Snapshot::empty()
            .with_table("users", vec![Column::new("id", "uuid", false)])
            .with_table("invoices", vec![]);

        let report = DiffEngine::diff(&base(), &new);
        let mut seen = BTreeSet::new();
        for name in report
            .added_tables
            .iter()
            .chain(report.removed_tables.iter())
            .chain(report.changed_tables.keys())
        {
            assert!(seen.insert(name.clone()), "{name} appears twice");
        }
        assert_eq!(seen, set(&["invoices", "orders", "users"]));
    }

    #[test]
    fn test_serialized_shape() {
        let new = base().with_table("users", vec![Column::new("id", "bigint", false)]);
        let value = serde_json::to_value(DiffEngine::diff(&base(), &new)).unwrap();

        assert_eq!(value["addedTables"], serde_json::json!([]));
        assert_eq!(value["changedTables"]["users"]["removedColumns"], serde_json::json!(["email"]));
        assert_eq!(
            value["changedTables"]["users"]["typeChanges"]["id"],
            serde_json::json!({"old": "integer", "new": "bigint"})
        );
    }
}
