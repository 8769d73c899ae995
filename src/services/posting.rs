//! Issue and receipt posting runs against the remote MES.
//!
//! Each run is an ordered multi-step transaction without remote rollback:
//! steps run fail-fast, and whatever committed before a failure stands. The
//! run report therefore distinguishes fully confirmed batches from batches
//! whose remote effects exist but were never confirmed or transferred.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::client::{IssueHeader, MesApi, ReceiptHeader, ReceiptLotRecord};
use crate::models::conversion::{
    ConversionSet, IssueBatch, PostingResult, PostingRunReport, PostingStatus, ReceiptBatch,
    RunFailure,
};
use crate::models::error::ConvertError;
use crate::services::conversion::{group_for_issue, group_for_receipt};
use crate::utils::PlantClock;

pub struct PostingService<'a, M: MesApi> {
    mes: &'a M,
    clock: &'a PlantClock,
    company_id: i64,
    plant_id: i64,
}

impl<'a, M: MesApi> PostingService<'a, M> {
    pub fn new(mes: &'a M, clock: &'a PlantClock, company_id: i64, plant_id: i64) -> Self {
        Self {
            mes,
            clock,
            company_id,
            plant_id,
        }
    }

    /// Post the issue (debit) side: one remote transaction per before-identity
    /// batch, then a single terminal transfer covering every saved header.
    ///
    /// Timestamps are frozen once at entry so every batch of the run carries
    /// the same transaction date.
    pub async fn run_issue(&self, set: &ConversionSet) -> Result<PostingRunReport, ConvertError> {
        let alias = validate_set(set)?;
        let plant_now = self.clock.now();
        let display = self.clock.display_time(plant_now);
        let tx_stamp = PlantClock::stamp(display);
        let base_ymd = PlantClock::ymd(display);

        let batches = group_for_issue(&set.rows);
        info!(batches = batches.len(), rows = set.rows.len(), "Starting issue run");

        let mut results: Vec<PostingResult> = Vec::with_capacity(batches.len());
        let mut header_ids: Vec<i64> = Vec::with_capacity(batches.len());
        let mut failure: Option<RunFailure> = None;

        for batch in &batches {
            let label = batch_label(&batch.key.item_code, &batch.key.warehouse_name);
            match self.post_issue_batch(batch, alias, &tx_stamp, &base_ymd).await {
                Ok((result, header_id)) => {
                    header_ids.push(header_id);
                    results.push(result);
                }
                Err(err) => {
                    error!(batch = %label, error = %err, "Issue batch failed; aborting run");
                    failure = Some(run_failure(Some(label), &err));
                    break;
                }
            }
        }

        if failure.is_none() && !header_ids.is_empty() {
            let transferred = self.mes.transfer_issues(&header_ids).await.unwrap_or(false);
            if !transferred {
                failure = Some(RunFailure {
                    batch: None,
                    step: "issue transfer".to_string(),
                    kind: "remote_rejected".to_string(),
                    message: format!(
                        "transfer rejected for {} saved header(s); stock not moved",
                        header_ids.len()
                    ),
                });
            }
        }

        // Any saved header that never reached a successful transfer is only
        // partially committed on the remote side.
        if failure.is_some() {
            for result in &mut results {
                if result.status == PostingStatus::Committed {
                    result.status = PostingStatus::CommittedUnconfirmed;
                }
            }
        }

        Ok(PostingRunReport {
            ok: failure.is_none(),
            results,
            failure,
        })
    }

    async fn post_issue_batch(
        &self,
        batch: &IssueBatch,
        alias: &crate::models::AccountAlias,
        tx_stamp: &str,
        base_ymd: &str,
    ) -> Result<(PostingResult, i64), ConvertError> {
        let key = &batch.key;
        let item_name = batch.rows[0].before.item_name.clone();
        // The remote header carries positive magnitude sums; the signed debit
        // stays internal to the conversion rows.
        let primary_total: f64 = batch.rows.iter().map(|r| r.after.quantity).sum();
        let secondary_total: f64 = batch
            .rows
            .iter()
            .map(|r| r.before.secondary_quantity.map_or(0.0, f64::abs))
            .sum();

        let account_num = self
            .mes
            .acquire_account_number(base_ymd)
            .await?
            .ok_or_else(|| ConvertError::NumberingExhausted {
                base_date: base_ymd.to_string(),
            })?;

        let header = IssueHeader::new(
            self.company_id,
            self.plant_id,
            &account_num,
            alias,
            key.warehouse_id,
            &key.warehouse_code,
            &key.warehouse_name,
            tx_stamp,
            batch.rows.len(),
            primary_total,
            secondary_total,
            key.item_id,
            &key.item_code,
            &item_name,
            &key.primary_uom,
            &key.secondary_uom,
        );
        let header_id = self.mes.save_issue_header(&header).await?;
        if header_id == 0 {
            return Err(ConvertError::rejected(
                "issue header save",
                "remote returned no header id",
            ));
        }

        // Re-fetch every lot before saving any: a single vanished lot aborts
        // the batch with nothing but the (empty) header committed.
        let mut lot_records = Vec::with_capacity(batch.rows.len());
        for row in &batch.rows {
            let onhand = self
                .mes
                .fetch_lot_onhand(row.before.item_id, &row.before.lot_code, row.before.warehouse_id)
                .await?
                .ok_or_else(|| ConvertError::StaleInventory {
                    reference: format!("{} / {}", row.before.item_code, row.before.lot_code),
                })?;
            lot_records.push(issue_lot_record(onhand, header_id));
        }
        if !self.mes.save_issue_lots(&lot_records).await? {
            return Err(ConvertError::rejected(
                "issue lot save",
                format!("remote rejected {} lot record(s)", lot_records.len()),
            ));
        }

        // Confirmation and the date restamp are best effort; the lots are
        // already committed remotely.
        let mut status = PostingStatus::Committed;
        match self.mes.find_issue_header(&account_num, &key.item_code, base_ymd).await? {
            Some(header_row) => {
                if !self
                    .mes
                    .update_issue_header_date(&header_row, tx_stamp)
                    .await
                    .unwrap_or(false)
                {
                    warn!(account = %account_num, "Issue header date restamp failed");
                    status = PostingStatus::CommittedUnconfirmed;
                }
            }
            None => {
                warn!(account = %account_num, "Saved issue header missing from listing");
                status = PostingStatus::CommittedUnconfirmed;
            }
        }

        info!(account = %account_num, lots = batch.rows.len(), "Issue batch saved");
        Ok((
            PostingResult {
                account_num,
                item_code: key.item_code.clone(),
                item_name,
                warehouse_name: key.warehouse_name.clone(),
                lot_count: batch.rows.len(),
                primary_quantity: primary_total,
                secondary_quantity: secondary_total,
                account_result_id: header_id,
                status,
            },
            header_id,
        ))
    }

    /// Post the receipt (credit) side into the chosen after-warehouse: one
    /// remote transaction per after-identity batch, each carried through
    /// header save, lot save, restamp and the two transmit steps.
    pub async fn run_receipt(&self, set: &ConversionSet) -> Result<PostingRunReport, ConvertError> {
        let alias = validate_set(set)?;
        let warehouse = set
            .after_warehouse
            .as_ref()
            .ok_or_else(|| ConvertError::Validation("no after-warehouse selected".to_string()))?;

        // Receipt headers are saved with the un-shifted plant time; only the
        // final restamp uses the remote display clock.
        let plant_now = self.clock.now();
        let header_stamp = PlantClock::stamp(plant_now);
        let base_ymd = PlantClock::ymd(plant_now);
        let display_stamp = PlantClock::stamp(self.clock.display_time(plant_now));

        let batches = group_for_receipt(&set.rows);
        info!(batches = batches.len(), rows = set.rows.len(), "Starting receipt run");

        let mut results: Vec<PostingResult> = Vec::with_capacity(batches.len());
        let mut failure: Option<RunFailure> = None;

        for batch in &batches {
            let label = batch_label(&batch.key.item_code, &warehouse.warehouse_name);
            match self
                .post_receipt_batch(batch, alias, warehouse, &header_stamp, &base_ymd, &display_stamp)
                .await
            {
                Ok((result, transmit_ok)) => {
                    results.push(result);
                    if !transmit_ok {
                        failure = Some(RunFailure {
                            batch: Some(label),
                            step: "receipt transmit".to_string(),
                            kind: "remote_rejected".to_string(),
                            message: "receipt saved but transmit did not complete".to_string(),
                        });
                        break;
                    }
                }
                Err(err) => {
                    error!(batch = %label, error = %err, "Receipt batch failed; aborting run");
                    failure = Some(run_failure(Some(label), &err));
                    break;
                }
            }
        }

        Ok(PostingRunReport {
            ok: failure.is_none(),
            results,
            failure,
        })
    }

    async fn post_receipt_batch(
        &self,
        batch: &ReceiptBatch,
        alias: &crate::models::AccountAlias,
        warehouse: &crate::models::WarehouseRef,
        header_stamp: &str,
        base_ymd: &str,
        display_stamp: &str,
    ) -> Result<(PostingResult, bool), ConvertError> {
        let key = &batch.key;
        let total: f64 = batch.rows.iter().map(|r| r.after.quantity).sum();

        let item = self
            .mes
            .resolve_plant_item(&key.item_code)
            .await?
            .ok_or_else(|| ConvertError::StaleInventory {
                reference: key.item_code.clone(),
            })?;
        let secondary_uom = item
            .secondary_uom
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| key.uom.clone());

        let account_num = self
            .mes
            .acquire_account_number(base_ymd)
            .await?
            .ok_or_else(|| ConvertError::NumberingExhausted {
                base_date: base_ymd.to_string(),
            })?;

        let header = ReceiptHeader::new(
            self.company_id,
            self.plant_id,
            &account_num,
            alias,
            warehouse,
            header_stamp,
            total,
            &item,
            &key.item_name,
            &key.uom,
            &secondary_uom,
        );
        if !self.mes.save_receipt_header(&header).await? {
            return Err(ConvertError::rejected(
                "receipt header save",
                "remote rejected the header",
            ));
        }

        // The header save returns no id; recover it from the day's listing
        // by account number.
        let listed = self.mes.list_receipt_headers(base_ymd).await?;
        let header_row = listed
            .into_iter()
            .find(|row| row.get("accountNum").and_then(Value::as_str) == Some(account_num.as_str()))
            .ok_or_else(|| {
                ConvertError::rejected("receipt header confirm", "saved header missing from listing")
            })?;
        let account_result_id = header_row
            .get("accountResultId")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if account_result_id == 0 {
            return Err(ConvertError::rejected(
                "receipt header confirm",
                "listed header carries no id",
            ));
        }

        let lot_records: Vec<ReceiptLotRecord> = batch
            .rows
            .iter()
            .map(|row| {
                ReceiptLotRecord::new(
                    self.company_id,
                    self.plant_id,
                    account_result_id,
                    warehouse,
                    item.item_id,
                    &key.uom,
                    &secondary_uom,
                    row.after.quantity,
                    batch.rows.len(),
                    total,
                    &row.after.lot_code,
                )
            })
            .collect();
        let (saved, msg) = self.mes.save_receipt_lots(&lot_records).await?;
        if !saved {
            // The remote message names the offending lot; pass it through.
            return Err(ConvertError::rejected("receipt lot save", msg));
        }

        // The restamp is best effort; header and lots are already committed.
        let mut status = PostingStatus::Committed;
        if !self
            .mes
            .update_receipt_header_date(&header_row, display_stamp)
            .await
            .unwrap_or(false)
        {
            warn!(account = %account_num, "Receipt header date restamp failed");
            status = PostingStatus::CommittedUnconfirmed;
        }

        let transmit_ok = self.transmit_receipt(base_ymd, account_result_id).await?;
        if !transmit_ok {
            status = PostingStatus::CommittedUnconfirmed;
        }

        info!(account = %account_num, lots = batch.rows.len(), "Receipt batch saved");
        Ok((
            PostingResult {
                account_num,
                item_code: key.item_code.clone(),
                item_name: key.item_name.clone(),
                warehouse_name: warehouse.warehouse_name.clone(),
                lot_count: batch.rows.len(),
                primary_quantity: total,
                secondary_quantity: total,
                account_result_id,
                status,
            },
            transmit_ok,
        ))
    }

    /// Terminal transmit pair. The header row is re-fetched from the day's
    /// listing so the transmit carries the restamped state, then re-sent with
    /// its recomputed lot row count; the remote expects it in both the insert
    /// and update record sets.
    async fn transmit_receipt(
        &self,
        base_ymd: &str,
        account_result_id: i64,
    ) -> Result<bool, ConvertError> {
        let listed = self.mes.list_receipt_headers(base_ymd).await?;
        let Some(mut row) = listed.into_iter().find(|row| {
            row.get("accountResultId").and_then(Value::as_i64) == Some(account_result_id)
        }) else {
            warn!(account_result_id, "Receipt header missing from listing before transmit");
            return Ok(false);
        };
        let mut cnt = self.mes.recompute_receipt_row_count(account_result_id).await?;
        if cnt == 0 {
            cnt = row.get("lotDataCount").and_then(Value::as_i64).unwrap_or(0);
        }
        if let Some(obj) = row.as_object_mut() {
            obj.insert("cnt".to_string(), json!(cnt));
            obj.insert("row-active".to_string(), json!(true));
            obj.entry("id".to_string()).or_insert(json!("extModel-receipt-tx"));
        }
        if !self.mes.trigger_bottom_transmit().await? {
            warn!(account_result_id, "Receipt bottom transmit rejected");
            return Ok(false);
        }
        if !self.mes.confirm_top_transmit(&row).await? {
            warn!(account_result_id, "Receipt top transmit rejected");
            return Ok(false);
        }
        Ok(true)
    }
}

fn validate_set(set: &ConversionSet) -> Result<&crate::models::AccountAlias, ConvertError> {
    if set.rows.is_empty() {
        return Err(ConvertError::Validation("no conversion rows to post".to_string()));
    }
    if let Some(pos) = set.rows.iter().position(|r| r.needs_review || r.after.item_code.is_empty())
    {
        return Err(ConvertError::Validation(format!(
            "row {} needs review before posting",
            pos + 1
        )));
    }
    set.alias
        .as_ref()
        .ok_or_else(|| ConvertError::Validation("no account alias selected".to_string()))
}

fn batch_label(item_code: &str, warehouse_name: &str) -> String {
    format!("{item_code} @ {warehouse_name}")
}

fn run_failure(batch: Option<String>, err: &ConvertError) -> RunFailure {
    let step = match err {
        ConvertError::RemoteRejected { step, .. } => step.clone(),
        ConvertError::StaleInventory { .. } => "lot onhand check".to_string(),
        ConvertError::NumberingExhausted { .. } => "account numbering".to_string(),
        ConvertError::NoSession => "session".to_string(),
        ConvertError::Remote(_) => "transport".to_string(),
        _ => "validation".to_string(),
    };
    RunFailure {
        batch,
        step,
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}

/// Issue lot record: the authoritative on-hand row re-sent as fetched, with
/// only the header linkage and interface flag stamped on.
fn issue_lot_record(mut onhand: Value, account_result_id: i64) -> Value {
    if let Some(obj) = onhand.as_object_mut() {
        obj.insert("accountResultId".to_string(), json!(account_result_id));
        obj.insert("interfaceFlag".to_string(), json!("N"));
    }
    onhand
}
