// Application Constants
// Centralized constants to avoid magic numbers

/// Default server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4406;

/// Remote MES endpoint paths (documented API boundary)
pub const EP_LOGIN: &str = "/common/login/post-login";
pub const EP_PROFILE_CONTROL_VALUE: &str = "/system/combo/system-profile-control-value";
pub const EP_CODE_RULE_ASSIGN: &str = "/base/popup/code-rule-assign-data";
pub const EP_ONHAND_LOT_LIST: &str = "/inv/stock-onhand-lot/detail-list";
pub const EP_ONHAND_STOCK_LOT: &str = "/inv/combo/warehouse-onhand-stock-lot-list";
pub const EP_ISSUE_TOP_SAVE: &str = "/inv/stock-etc-issue/top-save";
// Underscore variant is intentional; the remote routes lot-save under a different path style.
pub const EP_ISSUE_LOT_SAVE: &str = "/inv/stock_etc_issue/lot-save";
pub const EP_ISSUE_TOP_LIST: &str = "/inv/stock-etc-issue/top-list";
pub const EP_ISSUE_TRANSFER: &str = "/inv/stock-etc-issue/transfer";
pub const EP_RECEIPT_TOP_SAVE: &str = "/inv/stock-account-receipt/top-save";
pub const EP_RECEIPT_TOP_LIST: &str = "/inv/stock-account-receipt/top-list";
pub const EP_RECEIPT_BOTTOM_SAVE: &str = "/inv/stock-account-receipt/bottom-save";
pub const EP_RECEIPT_ROW_COUNT: &str = "/inv/stock-account-receipt/menugrid-data-cnt";
pub const EP_RECEIPT_BOTTOM_TRANSMIT: &str = "/inv/stock-account-receipt/bottom-transmit-proc";
pub const EP_RECEIPT_TOP_TRANSMIT: &str = "/inv/stock-account-receipt/top-transmit-proc";
pub const EP_ITEM_LIST: &str = "/base/item/list";
pub const EP_PLANT_ITEM_LIST: &str = "/base/combo/plant-item-list";
pub const EP_WAREHOUSE_LIST: &str = "/inv/warehouse/list";
pub const EP_ACCOUNT_ALIAS_LIST: &str = "/inv/account-alias/list";

/// Remote menu context identifiers required by the save endpoints
pub const ISSUE_MENU_TREE_ID: &str = "13633";
pub const RECEIPT_MENU_TREE_ID: &str = "13650";

/// Transaction type classification on the remote side
pub const ISSUE_TRANSACTION_TYPE_ID: i64 = 10079;
pub const ISSUE_TRANSACTION_TYPE_CODE: &str = "Account_Issue";
pub const ISSUE_TRANSACTION_TYPE_NAME: &str = "기타출고";
pub const RECEIPT_TRANSACTION_TYPE_ID: i64 = 10080;
pub const RECEIPT_TRANSACTION_TYPE_CODE: &str = "Account_Receipt";
pub const RECEIPT_TRANSACTION_TYPE_NAME: &str = "기타입고";

/// Numbering rule lookup
pub const NUMBERING_CONTROL_CODE: &str = "ANOTHER_ACCT_RULE";
pub const DEFAULT_AUTHORITY_ID: i64 = 10033;

/// After-identity derivation
pub const AFTER_ITEM_NAME_PREFIX: &str = "(완)";
pub const DEFAULT_LOCATION_CLASS: &str = "C1";
pub const LOT_SEQUENCE_BASE: u32 = 100;
pub const LOT_ITEM_SEGMENT_LEN: usize = 7;
pub const LOT_CLASS_SEGMENT_LEN: usize = 2;
pub const LOT_DATE_LEN: usize = 6;

/// Receipt lot classification
pub const RECEIPT_LOT_TYPE_GOOD: &str = "양품";

/// Remote call timeouts: reads vs. multi-row saves
pub const READ_TIMEOUT_SECS: u64 = 60;
pub const SAVE_TIMEOUT_SECS: u64 = 90;

/// Remote display-time defaults (overridable via environment)
pub const DEFAULT_DISPLAY_UTC_OFFSET_HOURS: i64 = 9;
pub const DEFAULT_PLANT_TZ: &str = "Asia/Seoul";

pub const DEFAULT_LANGUAGE_CODE: &str = "KO";

/// Snapshot schema
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
