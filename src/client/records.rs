//! Typed request records for the remote save endpoints.
//!
//! Field names and filler values (editStatus, row-active, errorField, …) are
//! the remote grid framework's wire contract and must be sent verbatim; they
//! are confined to this module so the core never sees them.

use serde::Serialize;
use serde_json::Value;

use crate::constants;
use crate::models::conversion::{AccountAlias, PlantItem, WarehouseRef};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueHeader {
    pub edit_status: &'static str,
    pub company_id: i64,
    pub plant_id: i64,
    pub account_num: String,
    pub transaction_type_id: i64,
    pub transaction_type_code: &'static str,
    pub transaction_type_name: &'static str,
    pub account_alias_id: i64,
    pub account_alias_code: String,
    pub account_alias_name: String,
    pub warehouse_id: i64,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub location_id: i64,
    pub location_code: Option<String>,
    pub location_name: Option<String>,
    pub transaction_date: String,
    pub account_result_id: i64,
    pub lot_count: usize,
    pub primary_quantity: f64,
    pub secondary_quantity: f64,
    pub project_id: i64,
    pub effective_start_date: Option<String>,
    pub effective_end_date: Option<String>,
    pub approval_flag: &'static str,
    pub interface_flag: &'static str,
    pub work_status: &'static str,
    pub id: &'static str,
    #[serde(rename = "row-active")]
    pub row_active: bool,
    pub item_code: String,
    pub item_id: i64,
    pub item_name: String,
    pub control_lot_serial: &'static str,
    pub primary_uom: String,
    pub secondary_uom: String,
    pub effective_period_of_day: i64,
    pub effective_period_of_day_flag: &'static str,
    pub error_field: Value,
}

#[allow(clippy::too_many_arguments)]
impl IssueHeader {
    pub fn new(
        company_id: i64,
        plant_id: i64,
        account_num: &str,
        alias: &AccountAlias,
        warehouse_id: i64,
        warehouse_code: &str,
        warehouse_name: &str,
        transaction_date: &str,
        lot_count: usize,
        primary_quantity: f64,
        secondary_quantity: f64,
        item_id: i64,
        item_code: &str,
        item_name: &str,
        primary_uom: &str,
        secondary_uom: &str,
    ) -> Self {
        Self {
            edit_status: "I",
            company_id,
            plant_id,
            account_num: account_num.to_string(),
            transaction_type_id: constants::ISSUE_TRANSACTION_TYPE_ID,
            transaction_type_code: constants::ISSUE_TRANSACTION_TYPE_CODE,
            transaction_type_name: constants::ISSUE_TRANSACTION_TYPE_NAME,
            account_alias_id: alias.account_alias_id,
            account_alias_code: alias.account_alias_code.clone(),
            account_alias_name: alias.account_alias_name.clone(),
            warehouse_id,
            warehouse_code: warehouse_code.to_string(),
            warehouse_name: warehouse_name.to_string(),
            location_id: 0,
            location_code: None,
            location_name: None,
            transaction_date: transaction_date.to_string(),
            account_result_id: 0,
            lot_count,
            primary_quantity,
            secondary_quantity,
            project_id: 0,
            effective_start_date: None,
            effective_end_date: None,
            approval_flag: "Y",
            interface_flag: "N",
            work_status: "I",
            id: "extModel-convert",
            row_active: true,
            item_code: item_code.to_string(),
            item_id,
            item_name: item_name.to_string(),
            control_lot_serial: "LOT",
            primary_uom: primary_uom.to_string(),
            secondary_uom: secondary_uom.to_string(),
            effective_period_of_day: 0,
            effective_period_of_day_flag: "N",
            error_field: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptHeader {
    pub edit_status: &'static str,
    pub company_id: i64,
    pub plant_id: i64,
    pub account_num: String,
    pub transaction_type_id: i64,
    pub transaction_type_code: &'static str,
    pub transaction_type_name: &'static str,
    pub account_alias_id: i64,
    pub account_alias_code: String,
    pub account_alias_name: String,
    pub warehouse_id: i64,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub location_id: i64,
    pub location_code: String,
    pub location_name: Option<String>,
    pub transaction_date: String,
    pub account_result_id: i64,
    pub lot_count: usize,
    pub primary_quantity: f64,
    pub secondary_quantity: f64,
    pub project_id: i64,
    pub effective_start_date: Option<String>,
    pub effective_end_date: Option<String>,
    pub approval_flag: &'static str,
    pub interface_flag: &'static str,
    pub work_status: &'static str,
    pub id: &'static str,
    #[serde(rename = "row-active")]
    pub row_active: bool,
    pub item_code: String,
    pub item_id: i64,
    pub item_name: String,
    pub status: &'static str,
    pub item_type: String,
    pub item_type_name: String,
    pub control_lot_serial: &'static str,
    pub primary_uom: String,
    pub secondary_uom: String,
    pub effective_period_of_day: i64,
    pub effective_period_of_day_flag: &'static str,
    pub available_for_location_flag: &'static str,
    pub error_field: Value,
}

impl ReceiptHeader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        company_id: i64,
        plant_id: i64,
        account_num: &str,
        alias: &AccountAlias,
        warehouse: &WarehouseRef,
        transaction_date: &str,
        total_quantity: f64,
        item: &PlantItem,
        item_name: &str,
        primary_uom: &str,
        secondary_uom: &str,
    ) -> Self {
        Self {
            edit_status: "I",
            company_id,
            plant_id,
            account_num: account_num.to_string(),
            transaction_type_id: constants::RECEIPT_TRANSACTION_TYPE_ID,
            transaction_type_code: constants::RECEIPT_TRANSACTION_TYPE_CODE,
            transaction_type_name: constants::RECEIPT_TRANSACTION_TYPE_NAME,
            account_alias_id: alias.account_alias_id,
            account_alias_code: alias.account_alias_code.clone(),
            account_alias_name: alias.account_alias_name.clone(),
            warehouse_id: warehouse.warehouse_id,
            warehouse_code: warehouse.warehouse_code.clone(),
            warehouse_name: warehouse.warehouse_name.clone(),
            location_id: 0,
            location_code: String::new(),
            location_name: None,
            transaction_date: transaction_date.to_string(),
            account_result_id: 0,
            lot_count: 0,
            primary_quantity: total_quantity,
            secondary_quantity: total_quantity,
            project_id: 0,
            effective_start_date: None,
            effective_end_date: None,
            approval_flag: "Y",
            interface_flag: "N",
            work_status: "I",
            id: "ext-receipt",
            row_active: true,
            item_code: item.item_code.clone(),
            item_id: item.item_id,
            item_name: item_name.to_string(),
            status: "Active",
            item_type: item.item_type.clone(),
            item_type_name: item.item_type_name.clone(),
            control_lot_serial: "LOT",
            primary_uom: primary_uom.to_string(),
            secondary_uom: secondary_uom.to_string(),
            effective_period_of_day: 0,
            effective_period_of_day_flag: "N",
            available_for_location_flag: "N",
            error_field: Value::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLotRecord {
    pub edit_status: &'static str,
    pub company_id: i64,
    pub plant_id: i64,
    pub account_result_id: i64,
    pub warehouse_id: i64,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub item_id: i64,
    pub primary_uom: String,
    pub primary_quantity: f64,
    pub lot_quantity: f64,
    pub secondary_uom: String,
    pub secondary_quantity: f64,
    pub effective_start_date: Option<String>,
    pub effective_end_date: Option<String>,
    pub effective_period_of_day_flag: &'static str,
    pub parent_lot_count: usize,
    pub parent_primary_quantity: f64,
    pub parent_effective_start_date: Option<String>,
    pub parent_effective_end_date: Option<String>,
    pub parent_interface_flag: &'static str,
    pub lot_code: String,
    pub lot_type: &'static str,
    pub lot_id: i64,
    pub interface_flag: &'static str,
    pub id: &'static str,
    #[serde(rename = "row-active")]
    pub row_active: bool,
    pub error_field: Value,
}

impl ReceiptLotRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        company_id: i64,
        plant_id: i64,
        account_result_id: i64,
        warehouse: &WarehouseRef,
        item_id: i64,
        primary_uom: &str,
        secondary_uom: &str,
        quantity: f64,
        parent_lot_count: usize,
        parent_primary_quantity: f64,
        lot_code: &str,
    ) -> Self {
        Self {
            edit_status: "I",
            company_id,
            plant_id,
            account_result_id,
            warehouse_id: warehouse.warehouse_id,
            warehouse_code: warehouse.warehouse_code.clone(),
            warehouse_name: warehouse.warehouse_name.clone(),
            item_id,
            primary_uom: primary_uom.to_string(),
            primary_quantity: quantity,
            lot_quantity: quantity,
            secondary_uom: secondary_uom.to_string(),
            secondary_quantity: quantity,
            effective_start_date: None,
            effective_end_date: None,
            effective_period_of_day_flag: "N",
            parent_lot_count,
            parent_primary_quantity,
            parent_effective_start_date: None,
            parent_effective_end_date: None,
            parent_interface_flag: "N",
            lot_code: lot_code.to_string(),
            lot_type: constants::RECEIPT_LOT_TYPE_GOOD,
            lot_id: 0,
            interface_flag: "N",
            id: "ext-receipt-lot",
            row_active: true,
            error_field: Value::Object(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_header_wire_shape() {
        let alias = AccountAlias {
            account_alias_id: 10038,
            account_alias_code: "CONV".into(),
            account_alias_name: "품목코드 변환".into(),
        };
        let header = IssueHeader::new(
            1, 2, "ETC-0001", &alias, 7, "W1", "자재창고", "2024-03-15 10:00:00", 2, 15.0, 0.0,
            10, "1234567", "부품", "EA", "EA",
        );
        let v = serde_json::to_value(&header).unwrap();
        assert_eq!(v["editStatus"], "I");
        assert_eq!(v["transactionTypeCode"], "Account_Issue");
        assert_eq!(v["accountResultId"], 0);
        assert_eq!(v["row-active"], true);
        assert!(v["locationCode"].is_null());
        assert!(v["errorField"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_receipt_lot_record_carries_group_context() {
        let wh = WarehouseRef {
            warehouse_id: 9,
            warehouse_code: "SHIP".into(),
            warehouse_name: "출하대기 창고".into(),
        };
        let rec = ReceiptLotRecord::new(1, 2, 555, &wh, 10, "EA", "EA", 5.0, 3, 15.0, "7654321-C1-240315100");
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["parentLotCount"], 3);
        assert_eq!(v["parentPrimaryQuantity"], 15.0);
        assert_eq!(v["lotQuantity"], 5.0);
        assert_eq!(v["lotType"], "양품");
    }
}
