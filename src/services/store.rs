//! In-memory conversion state: the operator's cart of raw inventory rows and
//! the derived pending conversion, plus snapshot save/load.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::client::MesApi;
use crate::models::conversion::{
    AccountAlias, ConversionSet, InventoryRow, WarehouseRef,
};
use crate::models::error::ConvertError;
use crate::models::snapshot::ConversionSnapshot;
use crate::services::conversion::{apply_manual_lot_edit, derive_after};

#[derive(Debug, Default)]
struct StoreInner {
    cart: Vec<InventoryRow>,
    pending: ConversionSet,
}

/// Shared mutable workflow state behind an async lock; one store per server.
#[derive(Debug, Default)]
pub struct ConversionStateStore {
    inner: RwLock<StoreInner>,
}

/// What a snapshot load had to reconstruct.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub rows: usize,
    pub needs_review: usize,
    pub backfilled_items: usize,
    pub backfilled_warehouses: usize,
}

impl ConversionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows to the cart, skipping any whose `(lot, item)` identity is
    /// already present. Returns how many were actually added.
    pub async fn add_to_cart(&self, rows: Vec<InventoryRow>) -> usize {
        let mut inner = self.inner.write().await;
        let mut added = 0;
        for row in rows {
            let key = row.identity_key();
            if inner.cart.iter().any(|r| r.identity_key() == key) {
                continue;
            }
            inner.cart.push(row);
            added += 1;
        }
        added
    }

    pub async fn remove_from_cart(&self, lot_code: &str, item_code: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.cart.len();
        inner
            .cart
            .retain(|r| !(r.lot_code == lot_code && r.item_code == item_code));
        inner.cart.len() != before
    }

    pub async fn cart(&self) -> Vec<InventoryRow> {
        self.inner.read().await.cart.clone()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.cart.clear();
        inner.pending = ConversionSet::default();
    }

    pub async fn set_after_warehouse(&self, warehouse: Option<WarehouseRef>) {
        self.inner.write().await.pending.after_warehouse = warehouse;
    }

    pub async fn set_alias(&self, alias: Option<AccountAlias>) {
        self.inner.write().await.pending.alias = alias;
    }

    pub async fn set_label_copies(&self, copies: u32) {
        self.inner.write().await.pending.label_copies = copies.max(1);
    }

    pub async fn pending(&self) -> ConversionSet {
        self.inner.read().await.pending.clone()
    }

    /// Derive the after-identity for the current cart and replace the
    /// pending rows with the result. Selections (warehouse, alias, copies)
    /// survive re-derivation.
    pub async fn build_preview<M: MesApi>(&self, mes: &M) -> Result<ConversionSet, ConvertError> {
        let (cart, warehouse_name) = {
            let inner = self.inner.read().await;
            if inner.cart.is_empty() {
                return Err(ConvertError::Validation("cart is empty".to_string()));
            }
            let name = inner
                .pending
                .after_warehouse
                .as_ref()
                .map(|w| w.warehouse_name.clone())
                .unwrap_or_default();
            (inner.cart.clone(), name)
        };
        let rows = derive_after(mes, &cart, &warehouse_name).await?;

        let mut inner = self.inner.write().await;
        inner.pending.rows = rows;
        Ok(inner.pending.clone())
    }

    /// Re-date the lots of one after-item group in the pending set.
    pub async fn apply_lot_edit(
        &self,
        after_item_code: &str,
        ymd: &str,
    ) -> Result<usize, ConvertError> {
        let mut inner = self.inner.write().await;
        apply_manual_lot_edit(&mut inner.pending.rows, after_item_code, ymd)
    }

    pub async fn save(&self) -> Result<ConversionSnapshot, ConvertError> {
        let inner = self.inner.read().await;
        if inner.pending.rows.is_empty() {
            return Err(ConvertError::Validation("nothing pending to save".to_string()));
        }
        Ok(ConversionSnapshot::capture(&inner.pending))
    }

    /// Replace the pending conversion with a snapshot, backfilling the
    /// identifiers snapshots do not carry (warehouse ids, item ids, uoms)
    /// from the remote reference data. The snapshot is validated before any
    /// state changes; a failed load leaves the store untouched.
    pub async fn load<M: MesApi>(
        &self,
        mes: &M,
        snapshot: ConversionSnapshot,
    ) -> Result<LoadSummary, ConvertError> {
        snapshot.validate()?;

        let warehouses = mes.list_warehouses().await?;
        let find_warehouse = |name: &str| -> Option<WarehouseRef> {
            warehouses.iter().find(|w| w.warehouse_name == name).cloned()
        };

        let mut rows = snapshot.rows;
        let mut backfilled_items = 0;
        let mut backfilled_warehouses = 0;
        let mut items: std::collections::HashMap<String, Option<crate::models::PlantItem>> =
            std::collections::HashMap::new();

        for row in &mut rows {
            if row.before.warehouse_id == 0 {
                if let Some(w) = find_warehouse(&row.before.warehouse_name) {
                    row.before.warehouse_id = w.warehouse_id;
                    row.before.warehouse_code = w.warehouse_code;
                    backfilled_warehouses += 1;
                } else {
                    row.needs_review = true;
                }
            }
            if row.before.item_id == 0 {
                let code = row.before.item_code.clone();
                if !items.contains_key(&code) {
                    let resolved = mes.resolve_plant_item(&code).await?;
                    items.insert(code.clone(), resolved);
                }
                match items.get(&code).and_then(|i| i.clone()) {
                    Some(item) => {
                        row.before.item_id = item.item_id;
                        if row.before.primary_uom.is_empty() {
                            row.before.primary_uom = item.primary_uom;
                        }
                        if row.before.secondary_uom.is_none() {
                            row.before.secondary_uom = item.secondary_uom;
                        }
                        backfilled_items += 1;
                    }
                    None => row.needs_review = true,
                }
            }
            // Normalize quantities the way derivation would have.
            if row.before.onhand_quantity == 0.0 {
                row.before.onhand_quantity = -row.after.quantity.abs();
            } else {
                row.before.onhand_quantity = -row.before.onhand_quantity.abs();
            }
            row.after.quantity = row.after.quantity.abs();
        }

        let after_warehouse = snapshot
            .after_warehouse
            .or_else(|| rows.first().and_then(|r| find_warehouse(&r.after.warehouse_name)));

        let summary = LoadSummary {
            rows: rows.len(),
            needs_review: rows.iter().filter(|r| r.needs_review).count(),
            backfilled_items,
            backfilled_warehouses,
        };
        info!(
            rows = summary.rows,
            needs_review = summary.needs_review,
            "Snapshot loaded"
        );

        let mut inner = self.inner.write().await;
        inner.cart.clear();
        inner.pending = ConversionSet {
            rows,
            after_warehouse,
            alias: snapshot.after_alias,
            label_copies: snapshot.label_copies.max(1),
        };
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversion::PlantItem;
    use crate::services::testing::ScriptedMes;

    fn inventory_row(item_code: &str, lot: &str, qty: f64) -> InventoryRow {
        InventoryRow {
            warehouse_id: 1,
            warehouse_code: "W1".into(),
            warehouse_name: "자재창고".into(),
            item_id: 10,
            item_code: item_code.into(),
            item_name: "부품".into(),
            lot_code: lot.into(),
            primary_uom: "EA".into(),
            secondary_uom: None,
            onhand_quantity: qty,
            secondary_quantity: None,
        }
    }

    #[tokio::test]
    async fn test_cart_dedupes_on_identity() {
        let store = ConversionStateStore::new();
        let added = store
            .add_to_cart(vec![
                inventory_row("1234567", "1234567-C1-240101100", 10.0),
                inventory_row("1234567", "1234567-C1-240101100", 10.0),
                inventory_row("1234567", "1234567-C1-240101101", 5.0),
            ])
            .await;
        assert_eq!(added, 2);
        assert_eq!(store.cart().await.len(), 2);

        assert!(store.remove_from_cart("1234567-C1-240101101", "1234567").await);
        assert!(!store.remove_from_cart("1234567-C1-240101101", "1234567").await);
        assert_eq!(store.cart().await.len(), 1);
    }

    #[tokio::test]
    async fn test_preview_derives_and_keeps_selections() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let store = ConversionStateStore::new();
        store
            .add_to_cart(vec![inventory_row("1234567", "1234567-C1-240101100", 10.0)])
            .await;
        store
            .set_after_warehouse(Some(WarehouseRef {
                warehouse_id: 9,
                warehouse_code: "SHIP".into(),
                warehouse_name: "출하대기 창고".into(),
            }))
            .await;

        let set = store.build_preview(&mes).await.unwrap();
        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.rows[0].after.item_code, "7654321");
        assert_eq!(set.rows[0].after.warehouse_name, "출하대기 창고");
        assert!(set.after_warehouse.is_some());

        // Re-deriving replaces rows instead of appending.
        let again = store.build_preview(&mes).await.unwrap();
        assert_eq!(again.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_preview_requires_cart() {
        let mes = ScriptedMes::default();
        let store = ConversionStateStore::new();
        assert!(store.build_preview(&mes).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_backfills_ids() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        mes.warehouses = vec![
            WarehouseRef {
                warehouse_id: 1,
                warehouse_code: "W1".into(),
                warehouse_name: "자재창고".into(),
            },
            WarehouseRef {
                warehouse_id: 9,
                warehouse_code: "SHIP".into(),
                warehouse_name: "출하대기 창고".into(),
            },
        ];
        mes.plant_items.insert(
            "1234567".into(),
            PlantItem {
                item_id: 10,
                item_code: "1234567".into(),
                item_name: "부품".into(),
                primary_uom: "EA".into(),
                secondary_uom: None,
                item_type: "RM".into(),
                item_type_name: "원자재".into(),
            },
        );

        let store = ConversionStateStore::new();
        store
            .add_to_cart(vec![inventory_row("1234567", "1234567-C1-240101100", 10.0)])
            .await;
        store
            .set_after_warehouse(Some(mes.warehouses[1].clone()))
            .await;
        store.build_preview(&mes).await.unwrap();
        let snapshot = store.save().await.unwrap();

        // Strip what older tooling drops; load must reconstruct it.
        let mut stripped = snapshot.clone();
        for row in &mut stripped.rows {
            row.before.warehouse_id = 0;
            row.before.warehouse_code.clear();
            row.before.item_id = 0;
            row.before.onhand_quantity = 0.0;
        }
        stripped.after_warehouse = None;

        let fresh = ConversionStateStore::new();
        let summary = fresh.load(&mes, stripped).await.unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.needs_review, 0);
        assert_eq!(summary.backfilled_items, 1);
        assert_eq!(summary.backfilled_warehouses, 1);

        let pending = fresh.pending().await;
        assert_eq!(pending.rows[0].before.warehouse_id, 1);
        assert_eq!(pending.rows[0].before.item_id, 10);
        assert_eq!(pending.rows[0].before.onhand_quantity, -10.0);
        assert_eq!(
            pending.after_warehouse.as_ref().unwrap().warehouse_name,
            "출하대기 창고"
        );
    }

    #[tokio::test]
    async fn test_load_rejects_bad_snapshot_without_touching_state() {
        let mut mes = ScriptedMes::default();
        mes.name_codes.insert("(완)부품".into(), "7654321".into());
        let store = ConversionStateStore::new();
        store
            .add_to_cart(vec![inventory_row("1234567", "1234567-C1-240101100", 10.0)])
            .await;
        store.build_preview(&mes).await.unwrap();
        let good = store.pending().await;

        let mut snapshot = store.save().await.unwrap();
        snapshot.rows[0].before.lot_code.clear();
        assert!(store.load(&mes, snapshot).await.is_err());
        assert_eq!(store.pending().await, good);
    }

    #[tokio::test]
    async fn test_load_flags_unresolvable_rows() {
        let mes = ScriptedMes::default();
        let snapshot = ConversionSnapshot {
            schema_version: 1,
            saved_at: chrono::Utc::now(),
            rows: vec![{
                let mut r = crate::models::ConversionRow {
                    before: inventory_row("1234567", "1234567-C1-240101100", 10.0),
                    after: crate::models::AfterIdentity {
                        item_code: "7654321".into(),
                        item_name: "(완)부품".into(),
                        warehouse_name: "출하대기 창고".into(),
                        uom: "EA".into(),
                        quantity: 10.0,
                        lot_code: "7654321-C1-240101100".into(),
                    },
                    needs_review: false,
                };
                r.before.item_id = 0;
                r.before.warehouse_id = 0;
                r
            }],
            after_warehouse: None,
            after_alias: None,
            label_copies: 1,
        };

        let store = ConversionStateStore::new();
        let summary = store.load(&mes, snapshot).await.unwrap();
        assert_eq!(summary.needs_review, 1);
        assert!(store.pending().await.rows[0].needs_review);
    }
}
