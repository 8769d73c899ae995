use serde::{Deserialize, Serialize};

/// One on-hand inventory row as fetched from the remote LOT search.
///
/// Field names mirror the remote JSON (camelCase) because these rows travel
/// to and from the MES unchanged. Identity key is `(lot_code, item_code)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRow {
    #[serde(default)]
    pub warehouse_id: i64,
    #[serde(default)]
    pub warehouse_code: String,
    #[serde(default)]
    pub warehouse_name: String,
    #[serde(default)]
    pub item_id: i64,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub lot_code: String,
    #[serde(default)]
    pub primary_uom: String,
    #[serde(default)]
    pub secondary_uom: Option<String>,
    #[serde(default)]
    pub onhand_quantity: f64,
    #[serde(default)]
    pub secondary_quantity: Option<f64>,
}

impl InventoryRow {
    pub fn identity_key(&self) -> (String, String) {
        (self.lot_code.clone(), self.item_code.clone())
    }

    pub fn secondary_uom_or_primary(&self) -> &str {
        match self.secondary_uom.as_deref() {
            Some(u) if !u.is_empty() => u,
            _ => &self.primary_uom,
        }
    }
}

/// The converted identity a row will take after posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AfterIdentity {
    pub item_code: String,
    pub item_name: String,
    pub warehouse_name: String,
    pub uom: String,
    pub quantity: f64,
    pub lot_code: String,
}

/// A derived conversion row: the before inventory row with its quantity
/// negated (debit) plus the after identity carrying the positive magnitude.
///
/// Raw rows live in the cart as [`InventoryRow`]; only `derive_after` can
/// produce a `ConversionRow`, so a row can never be derived twice and the
/// quantities can never double-negate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRow {
    #[serde(flatten)]
    pub before: InventoryRow,
    pub after: AfterIdentity,
    /// Set when a snapshot load could not backfill required identifiers.
    #[serde(default)]
    pub needs_review: bool,
}

impl ConversionRow {
    /// Barcode payload printed on lot labels: the after-lot-code stripped of
    /// dashes followed by the rounded quantity.
    pub fn label_barcode_text(&self) -> String {
        let lot: String = self.after.lot_code.chars().filter(|c| *c != '-').collect();
        format!("{}{}", lot, self.after.quantity.round() as i64)
    }
}

/// Warehouse reference row from the remote warehouse list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseRef {
    #[serde(default)]
    pub warehouse_id: i64,
    #[serde(default)]
    pub warehouse_code: String,
    #[serde(default)]
    pub warehouse_name: String,
}

/// Account alias classifying a non-standard issue/receipt transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountAlias {
    #[serde(default)]
    pub account_alias_id: i64,
    #[serde(default)]
    pub account_alias_code: String,
    #[serde(default)]
    pub account_alias_name: String,
}

/// Item master row from the plant item list (resolves code → id/uoms).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlantItem {
    #[serde(default)]
    pub item_id: i64,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub primary_uom: String,
    #[serde(default)]
    pub secondary_uom: Option<String>,
    #[serde(default)]
    pub item_type: String,
    #[serde(default)]
    pub item_type_name: String,
}

/// The pending conversion: ordered derived rows plus the operator's chosen
/// after-warehouse, account alias and label copy count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSet {
    pub rows: Vec<ConversionRow>,
    #[serde(default)]
    pub after_warehouse: Option<WarehouseRef>,
    #[serde(default)]
    pub alias: Option<AccountAlias>,
    #[serde(default = "default_label_copies")]
    pub label_copies: u32,
}

fn default_label_copies() -> u32 {
    1
}

impl ConversionSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Grouping key for issue batches: the before identity, since an issue
/// debits the before location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IssueBatchKey {
    pub item_id: i64,
    pub item_code: String,
    pub warehouse_id: i64,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub primary_uom: String,
    pub secondary_uom: String,
}

/// Grouping key for receipt batches: the after identity only, since a
/// receipt always targets the single chosen after-warehouse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReceiptBatchKey {
    pub item_code: String,
    pub item_name: String,
    pub uom: String,
}

#[derive(Debug, Clone)]
pub struct IssueBatch {
    pub key: IssueBatchKey,
    pub rows: Vec<ConversionRow>,
}

#[derive(Debug, Clone)]
pub struct ReceiptBatch {
    pub key: ReceiptBatchKey,
    pub rows: Vec<ConversionRow>,
}

/// Per-batch posting outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostingResult {
    pub account_num: String,
    pub item_code: String,
    pub item_name: String,
    pub warehouse_name: String,
    pub lot_count: usize,
    pub primary_quantity: f64,
    pub secondary_quantity: f64,
    pub account_result_id: i64,
    pub status: PostingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum PostingStatus {
    /// Header, lots and confirmation all succeeded.
    Committed,
    /// Remote effects exist but could not be confirmed, stamped or
    /// transferred; not rolled back.
    CommittedUnconfirmed,
    /// The batch aborted at `step`; earlier steps may have committed.
    Failed { step: String, message: String },
}

/// Serializable failure attached to a run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    pub batch: Option<String>,
    pub step: String,
    pub kind: String,
    pub message: String,
}

/// Outcome of one posting run. `results` always holds every batch that got
/// far enough to produce an entry, even when the run as a whole failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostingRunReport {
    pub ok: bool,
    pub results: Vec<PostingResult>,
    #[serde(default)]
    pub failure: Option<RunFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lot: &str, qty: f64) -> ConversionRow {
        ConversionRow {
            before: InventoryRow {
                warehouse_id: 1,
                warehouse_code: "W1".into(),
                warehouse_name: "자재창고".into(),
                item_id: 2,
                item_code: "1234567".into(),
                item_name: "부품".into(),
                lot_code: lot.into(),
                primary_uom: "EA".into(),
                secondary_uom: None,
                onhand_quantity: -qty,
                secondary_quantity: None,
            },
            after: AfterIdentity {
                item_code: "7654321".into(),
                item_name: "(완)부품".into(),
                warehouse_name: "출하대기 창고".into(),
                uom: "EA".into(),
                quantity: qty,
                lot_code: lot.into(),
            },
            needs_review: false,
        }
    }

    #[test]
    fn test_label_barcode_text_strips_dashes() {
        let r = row("7654321-C1-240101100", 10.0);
        assert_eq!(r.label_barcode_text(), "7654321C124010110010");
    }

    #[test]
    fn test_secondary_uom_falls_back_to_primary() {
        let mut r = row("L1", 1.0);
        assert_eq!(r.before.secondary_uom_or_primary(), "EA");
        r.before.secondary_uom = Some("BOX".into());
        assert_eq!(r.before.secondary_uom_or_primary(), "BOX");
        r.before.secondary_uom = Some(String::new());
        assert_eq!(r.before.secondary_uom_or_primary(), "EA");
    }

    #[test]
    fn test_inventory_row_accepts_remote_camel_case() {
        let v = serde_json::json!({
            "warehouseId": 7,
            "warehouseName": "자재창고",
            "itemCode": "1234567",
            "lotCode": "1234567-C1-240101100",
            "primaryUom": "EA",
            "onhandQuantity": 10.0
        });
        let row: InventoryRow = serde_json::from_value(v).unwrap();
        assert_eq!(row.warehouse_id, 7);
        assert_eq!(row.lot_code, "1234567-C1-240101100");
        assert_eq!(row.item_id, 0);
        assert!(row.secondary_quantity.is_none());
    }
}
