//! After-identity derivation, lot code handling and batch grouping.

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::MesApi;
use crate::constants;
use crate::models::conversion::{
    AfterIdentity, ConversionRow, InventoryRow, IssueBatch, IssueBatchKey, ReceiptBatch,
    ReceiptBatchKey,
};
use crate::models::error::ConvertError;

/// Components of a well-formed lot code
/// (`{item 7}-{location class 2}-{YYMMDD}{seq 3}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSegments {
    pub item: String,
    pub class_code: String,
    pub ymd: String,
    pub seq: u32,
}

pub fn parse_lot_segments(lot: &str) -> Option<LotSegments> {
    let mut parts = lot.split('-');
    let (item, class_code, tail) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    if item.len() != constants::LOT_ITEM_SEGMENT_LEN
        || class_code.len() != constants::LOT_CLASS_SEGMENT_LEN
        || tail.len() != constants::LOT_DATE_LEN + 3
        || !tail.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some(LotSegments {
        item: item.to_string(),
        class_code: class_code.to_string(),
        ymd: tail[..constants::LOT_DATE_LEN].to_string(),
        seq: tail[constants::LOT_DATE_LEN..].parse().ok()?,
    })
}

/// Assemble a lot code from scratch. A short item code is right-padded with
/// spaces so the item segment always spans 7 characters.
pub fn rebuild_lot_code(item_code: &str, class_code: &str, ymd: &str, seq: u32) -> String {
    format!("{item_code:<7.7}-{class_code:<2.2}-{ymd}{seq:03}")
}

/// Replace the item segment of `before_lot` with `after_code`, keeping the
/// rest of the lot (class, date, sequence) intact. Only applicable when the
/// before lot is long enough to carry an item segment and the after code is
/// exactly segment-sized.
fn graft_lot(before_lot: &str, after_code: &str) -> Option<String> {
    if after_code.chars().count() != constants::LOT_ITEM_SEGMENT_LEN {
        return None;
    }
    if before_lot.chars().count() < constants::LOT_ITEM_SEGMENT_LEN {
        return None;
    }
    let tail: String = before_lot.chars().skip(constants::LOT_ITEM_SEGMENT_LEN).collect();
    Some(format!("{after_code}{tail}"))
}

/// Derive the after-identity for every cart row.
///
/// The after item name is the before name with the finished-goods prefix;
/// its code is resolved remotely once per distinct name (resolved in sorted
/// order so the remote call sequence is deterministic). Quantities are
/// normalized: before becomes the negative magnitude (debit), after carries
/// the positive magnitude.
///
/// The lot graft only applies when the before lot can carry an item segment
/// and the after code is segment-sized; otherwise the before lot passes
/// through unchanged. A row whose after code cannot be resolved at all also
/// keeps its lot and is flagged `needs_review` instead of being dropped.
pub async fn derive_after<M: MesApi>(
    mes: &M,
    cart: &[InventoryRow],
    after_warehouse_name: &str,
) -> Result<Vec<ConversionRow>, ConvertError> {
    let mut names: Vec<String> = cart
        .iter()
        .map(|r| format!("{}{}", constants::AFTER_ITEM_NAME_PREFIX, r.item_name))
        .collect();
    names.sort();
    names.dedup();

    let mut codes: BTreeMap<String, Option<String>> = BTreeMap::new();
    for name in &names {
        codes.insert(name.clone(), mes.resolve_item_code_by_name(name).await?);
    }

    let mut rows = Vec::with_capacity(cart.len());
    for before in cart {
        let after_name = format!("{}{}", constants::AFTER_ITEM_NAME_PREFIX, before.item_name);
        let code = codes.get(&after_name).cloned().flatten();
        let magnitude = before.onhand_quantity.abs();

        let (lot_code, needs_review) = match code.as_deref() {
            Some(c) => (
                graft_lot(&before.lot_code, c).unwrap_or_else(|| before.lot_code.clone()),
                false,
            ),
            None => {
                debug!(item_name = %after_name, "After item code unresolved; flagging row");
                (before.lot_code.clone(), true)
            }
        };

        let mut debit = before.clone();
        debit.onhand_quantity = -magnitude;

        rows.push(ConversionRow {
            before: debit,
            after: AfterIdentity {
                item_code: code.unwrap_or_default(),
                item_name: after_name,
                warehouse_name: after_warehouse_name.to_string(),
                uom: before.primary_uom.clone(),
                quantity: magnitude,
                lot_code,
            },
            needs_review,
        });
    }
    Ok(rows)
}

/// Rewrite the lot date of every row belonging to one after-item, renumbering
/// sequences from the base in row order. The location class of each lot is
/// preserved when the existing code parses; malformed ones fall back to the
/// default class. Rejects a malformed date before touching any row.
pub fn apply_manual_lot_edit(
    rows: &mut [ConversionRow],
    after_item_code: &str,
    ymd: &str,
) -> Result<usize, ConvertError> {
    if ymd.len() != constants::LOT_DATE_LEN || !ymd.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConvertError::Validation(format!(
            "lot date must be {} digits (YYMMDD), got {ymd:?}",
            constants::LOT_DATE_LEN
        )));
    }
    let mut seq = constants::LOT_SEQUENCE_BASE;
    let mut edited = 0;
    for row in rows.iter_mut() {
        if row.after.item_code != after_item_code {
            continue;
        }
        let class_code = parse_lot_segments(&row.after.lot_code)
            .map(|s| s.class_code)
            .unwrap_or_else(|| constants::DEFAULT_LOCATION_CLASS.to_string());
        row.after.lot_code = rebuild_lot_code(&row.after.item_code, &class_code, ymd, seq);
        seq += 1;
        edited += 1;
    }
    Ok(edited)
}

/// Group rows into issue batches by their before identity. BTreeMap keeps
/// batch order deterministic regardless of cart order; rows inside a batch
/// keep their cart order.
pub fn group_for_issue(rows: &[ConversionRow]) -> Vec<IssueBatch> {
    let mut batches: BTreeMap<IssueBatchKey, Vec<ConversionRow>> = BTreeMap::new();
    for row in rows {
        let key = IssueBatchKey {
            item_id: row.before.item_id,
            item_code: row.before.item_code.clone(),
            warehouse_id: row.before.warehouse_id,
            warehouse_code: row.before.warehouse_code.clone(),
            warehouse_name: row.before.warehouse_name.clone(),
            primary_uom: row.before.primary_uom.clone(),
            secondary_uom: row.before.secondary_uom_or_primary().to_string(),
        };
        batches.entry(key).or_default().push(row.clone());
    }
    batches
        .into_iter()
        .map(|(key, rows)| IssueBatch { key, rows })
        .collect()
}

/// Group rows into receipt batches by their after identity.
pub fn group_for_receipt(rows: &[ConversionRow]) -> Vec<ReceiptBatch> {
    let mut batches: BTreeMap<ReceiptBatchKey, Vec<ConversionRow>> = BTreeMap::new();
    for row in rows {
        let key = ReceiptBatchKey {
            item_code: row.after.item_code.clone(),
            item_name: row.after.item_name.clone(),
            uom: row.after.uom.clone(),
        };
        batches.entry(key).or_default().push(row.clone());
    }
    batches
        .into_iter()
        .map(|(key, rows)| ReceiptBatch { key, rows })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ScriptedMes;

    fn inventory_row(item_code: &str, item_name: &str, lot: &str, qty: f64) -> InventoryRow {
        InventoryRow {
            warehouse_id: 1,
            warehouse_code: "W1".into(),
            warehouse_name: "자재창고".into(),
            item_id: 10,
            item_code: item_code.into(),
            item_name: item_name.into(),
            lot_code: lot.into(),
            primary_uom: "EA".into(),
            secondary_uom: None,
            onhand_quantity: qty,
            secondary_quantity: None,
        }
    }

    #[test]
    fn test_parse_lot_segments() {
        let seg = parse_lot_segments("1234567-C1-240315100").unwrap();
        assert_eq!(seg.item, "1234567");
        assert_eq!(seg.class_code, "C1");
        assert_eq!(seg.ymd, "240315");
        assert_eq!(seg.seq, 100);

        assert!(parse_lot_segments("1234567-C1").is_none());
        assert!(parse_lot_segments("123-C1-240315100").is_none());
        assert!(parse_lot_segments("1234567-C1-24031510x").is_none());
        assert!(parse_lot_segments("1234567-C1-240315-100").is_none());
    }

    #[test]
    fn test_rebuild_pads_short_item_code() {
        assert_eq!(rebuild_lot_code("AB12", "C1", "240315", 100), "AB12   -C1-240315100");
        assert_eq!(rebuild_lot_code("1234567", "C1", "240315", 7), "1234567-C1-240315007");
    }

    #[test]
    fn test_graft_replaces_item_segment_only() {
        assert_eq!(
            graft_lot("1234567-C1-240101100", "7654321").unwrap(),
            "7654321-C1-240101100"
        );
        // Before lot too short to carry an item segment.
        assert!(graft_lot("L1", "7654321").is_none());
        // After code is not segment-sized.
        assert!(graft_lot("1234567-C1-240101100", "765").is_none());
    }

    #[tokio::test]
    async fn test_derive_negates_before_and_grafts_lot() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let cart = vec![
            inventory_row("1234567", "부품", "1234567-C1-240101100", 10.0),
            inventory_row("1234567", "부품", "1234567-C1-240101101", -5.0),
        ];
        let rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].before.onhand_quantity, -10.0);
        assert_eq!(rows[0].after.quantity, 10.0);
        assert_eq!(rows[0].after.item_code, "7654321");
        assert_eq!(rows[0].after.item_name, "(완)부품");
        assert_eq!(rows[0].after.lot_code, "7654321-C1-240101100");
        // Negative on-hand still normalizes to debit/credit magnitudes.
        assert_eq!(rows[1].before.onhand_quantity, -5.0);
        assert_eq!(rows[1].after.quantity, 5.0);
        assert!(!rows[0].needs_review);
    }

    #[tokio::test]
    async fn test_derive_leaves_secondary_quantity_untouched() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let mut row = inventory_row("1234567", "부품", "1234567-C1-240101100", 10.0);
        row.secondary_quantity = Some(3.5);
        let rows = derive_after(&mes, &[row], "출하대기 창고").await.unwrap();
        assert_eq!(rows[0].before.onhand_quantity, -10.0);
        assert_eq!(rows[0].before.secondary_quantity, Some(3.5));
    }

    #[tokio::test]
    async fn test_derive_resolves_each_name_once() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let cart = vec![
            inventory_row("1234567", "부품", "1234567-C1-240101100", 10.0),
            inventory_row("1234567", "부품", "1234567-C1-240101101", 5.0),
        ];
        derive_after(&mes, &cart, "출하대기 창고").await.unwrap();
        let lookups: Vec<String> = mes
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("resolve_item_code_by_name"))
            .collect();
        assert_eq!(lookups.len(), 1);
    }

    #[tokio::test]
    async fn test_derive_passes_lot_through_when_graft_is_impossible() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        mes.name_codes.insert("(완)나사".into(), "F-99".into());
        let cart = vec![
            // Before lot too short to carry an item segment.
            inventory_row("1234567", "부품", "L1", 3.0),
            // After code resolves but is not segment-sized.
            inventory_row("2222222", "나사", "2222222-C1-240101100", 4.0),
        ];
        let rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();
        assert_eq!(rows[0].after.lot_code, "L1");
        assert!(!rows[0].needs_review);
        assert_eq!(rows[1].after.lot_code, "2222222-C1-240101100");
        assert_eq!(rows[1].after.item_code, "F-99");
    }

    #[tokio::test]
    async fn test_derive_flags_unresolved_names() {
        let mes = ScriptedMes::default();
        let cart = vec![inventory_row("1234567", "부품", "1234567-C1-240101100", 10.0)];
        let rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();
        assert!(rows[0].needs_review);
        assert!(rows[0].after.item_code.is_empty());
        assert_eq!(rows[0].after.lot_code, "1234567-C1-240101100");
    }

    #[tokio::test]
    async fn test_manual_lot_edit_renumbers_one_group() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        mes.name_codes.insert("(완)나사".into(), "9999999".into());
        let cart = vec![
            inventory_row("1234567", "부품", "1234567-C1-240101100", 1.0),
            inventory_row("2222222", "나사", "2222222-C2-240101100", 1.0),
            inventory_row("1234567", "부품", "1234567-C1-240101101", 1.0),
            inventory_row("1234567", "부품", "1234567-C1-240101102", 1.0),
        ];
        let mut rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();

        let edited = apply_manual_lot_edit(&mut rows, "7654321", "240315").unwrap();
        assert_eq!(edited, 3);
        assert_eq!(rows[0].after.lot_code, "7654321-C1-240315100");
        assert_eq!(rows[2].after.lot_code, "7654321-C1-240315101");
        assert_eq!(rows[3].after.lot_code, "7654321-C1-240315102");
        // Other group untouched, class preserved.
        assert_eq!(rows[1].after.lot_code, "9999999-C2-240101100");
    }

    #[tokio::test]
    async fn test_manual_lot_edit_rejects_bad_date_without_mutation() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let cart = vec![inventory_row("1234567", "부품", "1234567-C1-240101100", 1.0)];
        let mut rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();
        let before = rows.clone();

        assert!(apply_manual_lot_edit(&mut rows, "7654321", "2403").is_err());
        assert!(apply_manual_lot_edit(&mut rows, "7654321", "24031x").is_err());
        assert_eq!(rows, before);
    }

    #[tokio::test]
    async fn test_issue_grouping_merges_same_before_identity() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let cart = vec![
            inventory_row("1234567", "부품", "1234567-C1-240101100", 10.0),
            inventory_row("1234567", "부품", "1234567-C1-240101101", 5.0),
        ];
        let rows = derive_after(&mes, &cart, "출하대기 창고").await.unwrap();

        let batches = group_for_issue(&rows);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].rows.len(), 2);
        let total: f64 = batches[0].rows.iter().map(|r| r.before.onhand_quantity).sum();
        assert_eq!(total, -15.0);
        let after_total: f64 = batches[0].rows.iter().map(|r| r.after.quantity).sum();
        assert_eq!(after_total, 15.0);
    }

    #[test]
    fn test_issue_grouping_splits_on_warehouse() {
        let a = inventory_row("1234567", "부품", "1234567-C1-240101100", 1.0);
        let mut b = inventory_row("1234567", "부품", "1234567-C1-240101101", 1.0);
        b.warehouse_id = 2;
        b.warehouse_code = "W2".into();
        let rows: Vec<ConversionRow> = [a.clone(), b.clone()]
            .iter()
            .map(|before| ConversionRow {
                before: before.clone(),
                after: AfterIdentity {
                    item_code: "7654321".into(),
                    item_name: "(완)부품".into(),
                    warehouse_name: "출하대기 창고".into(),
                    uom: "EA".into(),
                    quantity: 1.0,
                    lot_code: "7654321-C1-240101100".into(),
                },
                needs_review: false,
            })
            .collect();
        assert_eq!(group_for_issue(&rows).len(), 2);
        // Receipt side only looks at the after identity, so one batch.
        assert_eq!(group_for_receipt(&rows).len(), 1);
    }
}
