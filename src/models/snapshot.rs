use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::models::conversion::{AccountAlias, ConversionRow, ConversionSet, WarehouseRef};
use crate::models::error::ConvertError;

/// Portable snapshot of the pending conversion, for external save/load.
///
/// Optional fields may be absent in snapshots written by older tooling; the
/// loader backfills them. The four identity columns (before item/lot code,
/// after item/lot code) are mandatory per row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
    pub rows: Vec<ConversionRow>,
    #[serde(default)]
    pub after_warehouse: Option<WarehouseRef>,
    #[serde(default)]
    pub after_alias: Option<AccountAlias>,
    #[serde(default = "default_label_copies")]
    pub label_copies: u32,
}

fn default_schema_version() -> u32 {
    constants::SNAPSHOT_SCHEMA_VERSION
}

fn default_label_copies() -> u32 {
    1
}

impl ConversionSnapshot {
    pub fn capture(set: &ConversionSet) -> Self {
        Self {
            schema_version: constants::SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            rows: set.rows.clone(),
            after_warehouse: set.after_warehouse.clone(),
            after_alias: set.alias.clone(),
            label_copies: set.label_copies,
        }
    }

    /// Reject snapshots this build cannot interpret. Missing identity
    /// columns are reported with row numbers so the operator can repair the
    /// file instead of guessing.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.schema_version > constants::SNAPSHOT_SCHEMA_VERSION {
            return Err(ConvertError::SnapshotIncompatible(format!(
                "schema version {} is newer than supported {}",
                self.schema_version,
                constants::SNAPSHOT_SCHEMA_VERSION
            )));
        }
        let mut missing: Vec<String> = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let mut cols: Vec<&str> = Vec::new();
            if row.before.item_code.is_empty() {
                cols.push("itemCode");
            }
            if row.before.lot_code.is_empty() {
                cols.push("lotCode");
            }
            if row.after.item_code.is_empty() {
                cols.push("after.itemCode");
            }
            if row.after.lot_code.is_empty() {
                cols.push("after.lotCode");
            }
            if !cols.is_empty() {
                missing.push(format!("row {}: {}", i + 1, cols.join(", ")));
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::SnapshotIncompatible(format!(
                "missing identity columns ({})",
                missing.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversion::{AfterIdentity, InventoryRow};

    fn derived_row(item: &str, lot: &str) -> ConversionRow {
        ConversionRow {
            before: InventoryRow {
                warehouse_id: 1,
                warehouse_code: "W1".into(),
                warehouse_name: "자재창고".into(),
                item_id: 10,
                item_code: item.into(),
                item_name: "부품".into(),
                lot_code: lot.into(),
                primary_uom: "EA".into(),
                secondary_uom: None,
                onhand_quantity: -5.0,
                secondary_quantity: None,
            },
            after: AfterIdentity {
                item_code: "7654321".into(),
                item_name: "(완)부품".into(),
                warehouse_name: "출하대기 창고".into(),
                uom: "EA".into(),
                quantity: 5.0,
                lot_code: "7654321-C1-240101100".into(),
            },
            needs_review: false,
        }
    }

    #[test]
    fn test_validate_accepts_complete_rows() {
        let snap = ConversionSnapshot {
            schema_version: 1,
            saved_at: Utc::now(),
            rows: vec![derived_row("1234567", "1234567-C1-240101100")],
            after_warehouse: None,
            after_alias: None,
            label_copies: 1,
        };
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_identity_columns() {
        let mut row = derived_row("1234567", "1234567-C1-240101100");
        row.before.lot_code.clear();
        row.after.item_code.clear();
        let snap = ConversionSnapshot {
            schema_version: 1,
            saved_at: Utc::now(),
            rows: vec![row],
            after_warehouse: None,
            after_alias: None,
            label_copies: 1,
        };
        let err = snap.validate().unwrap_err();
        match err {
            ConvertError::SnapshotIncompatible(msg) => {
                assert!(msg.contains("lotCode"));
                assert!(msg.contains("after.itemCode"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_newer_schema() {
        let snap = ConversionSnapshot {
            schema_version: constants::SNAPSHOT_SCHEMA_VERSION + 1,
            saved_at: Utc::now(),
            rows: vec![],
            after_warehouse: None,
            after_alias: None,
            label_copies: 1,
        };
        assert!(snap.validate().is_err());
    }

    #[test]
    fn test_snapshot_tolerates_missing_optional_fields() {
        let json = serde_json::json!({
            "rows": [],
        });
        let snap: ConversionSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snap.schema_version, constants::SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(snap.label_copies, 1);
        assert!(snap.after_warehouse.is_none());
    }
}
