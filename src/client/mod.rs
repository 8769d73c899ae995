use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::constants;
use crate::models::conversion::{AccountAlias, InventoryRow, PlantItem, WarehouseRef};
use crate::models::error::ConvertError;

pub mod records;

pub use records::{IssueHeader, ReceiptHeader, ReceiptLotRecord};

/// Organization/user identity established at login; every remote call
/// carries these ids.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub company_id: i64,
    pub plant_id: i64,
    pub company_code: String,
    pub user_id: i64,
    pub authority_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MesCredentials {
    pub company_code: String,
    pub user_key: String,
    pub password: String,
    #[serde(default = "default_language")]
    pub language_code: String,
}

fn default_language() -> String {
    constants::DEFAULT_LANGUAGE_CODE.to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginInfo {
    pub user_key: String,
    pub company_code: String,
    pub plant_code: String,
}

/// Standard remote response wrapper: `{success, msg, data: {list}}`.
/// `list` is usually an array but some endpoints return a scalar in it
/// (issue top-save returns the new header id there).
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default)]
    list: Option<Value>,
}

impl ApiEnvelope {
    fn message(&self) -> String {
        self.msg.clone().unwrap_or_else(|| "no reason returned".to_string())
    }

    fn list_value(self) -> Option<Value> {
        self.data.and_then(|d| d.list)
    }

    fn list_array(self) -> Vec<Value> {
        match self.list_value() {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        }
    }
}

fn v_i64(v: &Value, key: &str) -> i64 {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn v_str(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// On-hand LOT search filter. Bare terms get a leading `%` so operators can
/// type fragments the way the remote grid expects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnhandQuery {
    #[serde(default)]
    pub warehouse_name: String,
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub lot_code: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    500
}

fn with_leading_percent(s: &str) -> String {
    if s.is_empty() || s.starts_with('%') {
        s.to_string()
    } else {
        format!("%{s}")
    }
}

/// Operations the posting sagas, derivation and snapshot backfill need from
/// the remote MES. `MesClient` is the production implementation; tests use
/// scripted fakes.
#[allow(async_fn_in_trait)]
pub trait MesApi {
    /// Request a fresh transaction number from the numbering rule scoped to
    /// `base_date`. `None` means the rule is exhausted or missing.
    async fn acquire_account_number(&self, base_date: &str) -> Result<Option<String>, ConvertError>;

    /// Authoritative on-hand lot record; `None` means the lot has changed or
    /// been consumed since the inventory was fetched.
    async fn fetch_lot_onhand(
        &self,
        item_id: i64,
        lot_code: &str,
        warehouse_id: i64,
    ) -> Result<Option<Value>, ConvertError>;

    /// Returns the remote-assigned header id (`0` means the save failed).
    async fn save_issue_header(&self, header: &IssueHeader) -> Result<i64, ConvertError>;

    async fn save_issue_lots(&self, records: &[Value]) -> Result<bool, ConvertError>;

    async fn find_issue_header(
        &self,
        account_num: &str,
        item_code: &str,
        ymd: &str,
    ) -> Result<Option<Value>, ConvertError>;

    async fn update_issue_header_date(
        &self,
        header_row: &Value,
        new_dt: &str,
    ) -> Result<bool, ConvertError>;

    async fn transfer_issues(&self, account_result_ids: &[i64]) -> Result<bool, ConvertError>;

    async fn save_receipt_header(&self, header: &ReceiptHeader) -> Result<bool, ConvertError>;

    async fn list_receipt_headers(&self, ymd: &str) -> Result<Vec<Value>, ConvertError>;

    /// `(success, remote message)`; the message is surfaced verbatim on
    /// failure.
    async fn save_receipt_lots(
        &self,
        records: &[ReceiptLotRecord],
    ) -> Result<(bool, String), ConvertError>;

    async fn update_receipt_header_date(
        &self,
        header_row: &Value,
        new_dt: &str,
    ) -> Result<bool, ConvertError>;

    async fn recompute_receipt_row_count(&self, account_result_id: i64)
        -> Result<i64, ConvertError>;

    async fn trigger_bottom_transmit(&self) -> Result<bool, ConvertError>;

    async fn confirm_top_transmit(&self, header_row: &Value) -> Result<bool, ConvertError>;

    async fn resolve_item_code_by_name(&self, item_name: &str)
        -> Result<Option<String>, ConvertError>;

    async fn resolve_plant_item(&self, item_code: &str) -> Result<Option<PlantItem>, ConvertError>;

    async fn list_warehouses(&self) -> Result<Vec<WarehouseRef>, ConvertError>;

    async fn list_account_aliases(&self) -> Result<Vec<AccountAlias>, ConvertError>;
}

/// Stateless request/response wrapper around the remote MES HTTP API.
/// Authentication is a session cookie set by `post-login`; the reqwest
/// cookie store carries it on every subsequent call.
pub struct MesClient {
    http: Client,
    base_url: String,
    ctx: RwLock<Option<SessionContext>>,
    /// The numbering-rule id is configuration on the remote side; resolved
    /// once per session and memoized.
    numbering_rule_id: RwLock<Option<i64>>,
}

impl std::fmt::Debug for MesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MesClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl MesClient {
    /// Build from `MES_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("MES_BASE_URL").with_context(|| "Missing environment variable: MES_BASE_URL")?;
        Self::new(&base_url)
    }

    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            ctx: RwLock::new(None),
            numbering_rule_id: RwLock::new(None),
        })
    }

    pub async fn is_authenticated(&self) -> bool {
        self.ctx.read().await.is_some()
    }

    /// Current session ids, for callers that stamp them into save records.
    pub async fn session(&self) -> Result<SessionContext, ConvertError> {
        self.context().await
    }

    async fn context(&self) -> Result<SessionContext, ConvertError> {
        self.ctx.read().await.clone().ok_or(ConvertError::NoSession)
    }

    async fn post_json(
        &self,
        path: &str,
        payload: Value,
        timeout_secs: u64,
    ) -> Result<ApiEnvelope, ConvertError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(endpoint = path, "MES request");
        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| ConvertError::Remote(format!("POST {path}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ConvertError::Remote(format!("POST {path}: HTTP {status}")));
        }
        resp.json::<ApiEnvelope>()
            .await
            .map_err(|e| ConvertError::Remote(format!("POST {path}: invalid response body: {e}")))
    }

    /// Authenticate against the MES and capture the org/user context ids the
    /// other endpoints require.
    pub async fn login(&self, creds: &MesCredentials) -> Result<LoginInfo, ConvertError> {
        let payload = json!({
            "companyCode": creds.company_code.trim(),
            "userKey": creds.user_key.trim(),
            "password": creds.password,
            "languageCode": creds.language_code,
        });
        let url = format!("{}{}", self.base_url, constants::EP_LOGIN);
        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| ConvertError::Remote(format!("login: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ConvertError::Remote(format!("login: HTTP {status}")));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ConvertError::Remote(format!("login: invalid response body: {e}")))?;
        if !body.get("success").and_then(Value::as_bool).unwrap_or(false) {
            let msg = v_str(&body, "msg");
            return Err(ConvertError::rejected(
                "login",
                if msg.is_empty() { "check credentials/server".to_string() } else { msg },
            ));
        }

        let empty = json!({});
        let org = body.get("orgInfo").unwrap_or(&empty);
        let user = body.get("userInfo").unwrap_or(&empty);
        let ctx = SessionContext {
            company_id: pick_i64(org, "orgCompanyId", user, "companyId"),
            plant_id: pick_i64(org, "plantId", user, "plantId"),
            company_code: pick_str(org, "orgCompanyCode", user, "companyCode"),
            user_id: v_i64(user, "userId"),
            authority_id: match v_i64(user, "authorityId") {
                0 => constants::DEFAULT_AUTHORITY_ID,
                id => id,
            },
        };
        info!(
            company = %ctx.company_code,
            plant = ctx.plant_id,
            "MES login successful"
        );
        let info = LoginInfo {
            user_key: v_str(user, "userKey"),
            company_code: ctx.company_code.clone(),
            plant_code: v_str(org, "plantCode"),
        };
        *self.ctx.write().await = Some(ctx);
        *self.numbering_rule_id.write().await = None;
        Ok(info)
    }

    /// On-hand inventory search (the before-rows the operator converts).
    pub async fn search_onhand_lots(
        &self,
        query: &OnhandQuery,
    ) -> Result<Vec<InventoryRow>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "itemCode": with_leading_percent(&query.item_code),
            "itemName": with_leading_percent(&query.item_name),
            "itemType": "", "projectCode": "", "projectName": "", "productGroup": "",
            "itemClass1": "", "itemClass2": "", "warehouseCode": "",
            "warehouseName": with_leading_percent(&query.warehouse_name),
            "warehouseLocationCode": "",
            "defectiveFlag": "Y",
            "itemClass3": "", "itemClass4": "",
            "effectiveDateFrom": "", "effectiveDateTo": "",
            "creationDateFrom": "", "creationDateTo": "",
            "lotStatus": "",
            "lotCode": with_leading_percent(&query.lot_code),
            "jobName": "", "partnerItem": "", "peopleName": "",
            "start": 1, "page": 1,
            "limit": query.limit.to_string(),
        });
        let env = self
            .post_json(constants::EP_ONHAND_LOT_LIST, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        let rows = env
            .list_array()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        Ok(rows)
    }

    async fn resolve_numbering_rule_id(&self) -> Result<Option<i64>, ConvertError> {
        if let Some(id) = *self.numbering_rule_id.read().await {
            return Ok(Some(id));
        }
        let ctx = self.context().await?;
        let payload = json!({
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "authorityId": ctx.authority_id,
            "userId": ctx.user_id,
            "controlCode": constants::NUMBERING_CONTROL_CODE,
            "companyCode": ctx.company_code,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
        });
        let env = self
            .post_json(constants::EP_PROFILE_CONTROL_VALUE, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        let id = env
            .list_array()
            .first()
            .map(|row| v_i64(row, "controlTableKeyId"))
            .filter(|id| *id != 0);
        if let Some(id) = id {
            *self.numbering_rule_id.write().await = Some(id);
        } else {
            warn!("Numbering rule {} not configured", constants::NUMBERING_CONTROL_CODE);
        }
        Ok(id)
    }

    /// Shared payload trailer for the grid-style save endpoints.
    fn save_payload(
        ctx: &SessionContext,
        menu_tree_id: &str,
        inserts: &str,
        updates: &str,
        main: bool,
    ) -> Value {
        if main {
            json!({
                "recordsIMain": inserts,
                "recordsUMain": updates,
                "recordsDMain": "[]",
                "menuTreeId": menu_tree_id,
                "languageCode": constants::DEFAULT_LANGUAGE_CODE,
                "companyCode": ctx.company_code,
                "companyId": ctx.company_id,
            })
        } else {
            json!({
                "recordsI": inserts,
                "recordsU": updates,
                "recordsD": "[]",
                "menuTreeId": menu_tree_id,
                "languageCode": constants::DEFAULT_LANGUAGE_CODE,
                "companyCode": ctx.company_code,
                "companyId": ctx.company_id,
            })
        }
    }
}

fn pick_i64(primary: &Value, primary_key: &str, fallback: &Value, fallback_key: &str) -> i64 {
    match v_i64(primary, primary_key) {
        0 => v_i64(fallback, fallback_key),
        id => id,
    }
}

fn pick_str(primary: &Value, primary_key: &str, fallback: &Value, fallback_key: &str) -> String {
    let s = v_str(primary, primary_key);
    if s.is_empty() {
        v_str(fallback, fallback_key)
    } else {
        s
    }
}

fn to_json_string<T: Serialize>(records: &[T]) -> Result<String, ConvertError> {
    serde_json::to_string(records).map_err(|e| ConvertError::Remote(format!("encode records: {e}")))
}

impl MesApi for MesClient {
    async fn acquire_account_number(&self, base_date: &str) -> Result<Option<String>, ConvertError> {
        let Some(rule_id) = self.resolve_numbering_rule_id().await? else {
            return Ok(None);
        };
        let ctx = self.context().await?;
        let payload = json!({
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "codeRuleId": rule_id,
            "baseDate": base_date,
            "itemId": 0,
            "referenceTable": [],
            "referenceColumn": [],
            "referenceId": [],
            "userId": ctx.user_id,
            "checkUnusedLot": "YES",
            "companyCode": ctx.company_code,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
        });
        let env = self
            .post_json(constants::EP_CODE_RULE_ASSIGN, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        let num = env
            .list_array()
            .first()
            .map(|row| v_str(row, "codeRuleAssign"))
            .filter(|s| !s.is_empty());
        Ok(num)
    }

    async fn fetch_lot_onhand(
        &self,
        item_id: i64,
        lot_code: &str,
        warehouse_id: i64,
    ) -> Result<Option<Value>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "itemId": item_id,
            "lotCode": lot_code,
            "warehouseId": warehouse_id,
            "locationId": 0,
            "projectId": 0,
            "effectiveStartDate": null,
            "effectiveEndDate": null,
            "page": 1,
            "limit": 200,
            "companyCode": ctx.company_code,
        });
        let env = self
            .post_json(constants::EP_ONHAND_STOCK_LOT, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env.list_array().into_iter().next())
    }

    async fn save_issue_header(&self, header: &IssueHeader) -> Result<i64, ConvertError> {
        let ctx = self.context().await?;
        let inserts = to_json_string(std::slice::from_ref(header))?;
        let payload = Self::save_payload(&ctx, constants::ISSUE_MENU_TREE_ID, &inserts, "[]", true);
        let env = self
            .post_json(constants::EP_ISSUE_TOP_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        // The new header id is returned directly in data.list.
        Ok(match env.list_value() {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        })
    }

    async fn save_issue_lots(&self, records: &[Value]) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        let inserts = to_json_string(records)?;
        let payload = Self::save_payload(&ctx, constants::ISSUE_MENU_TREE_ID, &inserts, "[]", false);
        let env = self
            .post_json(constants::EP_ISSUE_LOT_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn find_issue_header(
        &self,
        account_num: &str,
        item_code: &str,
        ymd: &str,
    ) -> Result<Option<Value>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "transactionTypeCode": constants::ISSUE_TRANSACTION_TYPE_CODE,
            "accountNum": account_num,
            "itemCode": item_code,
            "itemName": "",
            "transactionDateFrom": ymd,
            "transactionDateTo": ymd,
            "itemType": "", "productGroup": "", "accountAliasCode": "",
            "warehouseCode": "", "warehouseName": "",
            "locationCode": "", "locationName": "", "interfaceFlag": "",
            "start": 1, "page": 1, "limit": 11,
        });
        let env = self
            .post_json(constants::EP_ISSUE_TOP_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env.list_array().into_iter().next())
    }

    async fn update_issue_header_date(
        &self,
        header_row: &Value,
        new_dt: &str,
    ) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        let mut row = header_row.clone();
        if let Some(obj) = row.as_object_mut() {
            obj.insert("editStatus".into(), json!("U"));
            obj.insert("transactionDate".into(), json!(new_dt));
            obj.insert("row-active".into(), json!(true));
        }
        let updates = to_json_string(&[row])?;
        let payload = Self::save_payload(&ctx, constants::ISSUE_MENU_TREE_ID, "[]", &updates, true);
        let env = self
            .post_json(constants::EP_ISSUE_TOP_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn transfer_issues(&self, account_result_ids: &[i64]) -> Result<bool, ConvertError> {
        if account_result_ids.is_empty() {
            return Ok(false);
        }
        let ctx = self.context().await?;
        let payload = json!({
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "accountResultId": account_result_ids,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyCode": ctx.company_code,
        });
        let env = self
            .post_json(constants::EP_ISSUE_TRANSFER, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn save_receipt_header(&self, header: &ReceiptHeader) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        let inserts = to_json_string(std::slice::from_ref(header))?;
        let payload = Self::save_payload(&ctx, constants::RECEIPT_MENU_TREE_ID, &inserts, "[]", true);
        let env = self
            .post_json(constants::EP_RECEIPT_TOP_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn list_receipt_headers(&self, ymd: &str) -> Result<Vec<Value>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "transactionTypeCode": "",
            "accountNum": "", "itemCode": "", "itemName": "",
            "transactionDateFrom": ymd,
            "transactionDateTo": ymd,
            "itemType": "", "productGroup": "", "accountAliasCode": "",
            "warehouseCode": "", "warehouseName": "",
            "locationCode": "", "locationName": "", "interfaceFlag": "",
            "start": 1, "page": 1, "limit": 999,
        });
        let env = self
            .post_json(constants::EP_RECEIPT_TOP_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env.list_array())
    }

    async fn save_receipt_lots(
        &self,
        records: &[ReceiptLotRecord],
    ) -> Result<(bool, String), ConvertError> {
        let ctx = self.context().await?;
        let inserts = to_json_string(records)?;
        let payload =
            Self::save_payload(&ctx, constants::RECEIPT_MENU_TREE_ID, &inserts, "[]", false);
        let env = self
            .post_json(constants::EP_RECEIPT_BOTTOM_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        let msg = env.message();
        Ok((env.success, msg))
    }

    async fn update_receipt_header_date(
        &self,
        header_row: &Value,
        new_dt: &str,
    ) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        // Minimal identifying keys only; resending the whole row risks the
        // remote re-defaulting fields it recomputes on save.
        let safe = json!({
            "editStatus": "U",
            "row-active": true,
            "companyId": header_row.get("companyId"),
            "plantId": header_row.get("plantId"),
            "accountResultId": header_row.get("accountResultId"),
            "transactionTypeId": header_row.get("transactionTypeId"),
            "transactionTypeCode": header_row.get("transactionTypeCode"),
            "transactionDate": new_dt,
        });
        let updates = to_json_string(&[safe])?;
        let payload = Self::save_payload(&ctx, constants::RECEIPT_MENU_TREE_ID, "[]", &updates, true);
        let env = self
            .post_json(constants::EP_RECEIPT_TOP_SAVE, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn recompute_receipt_row_count(
        &self,
        account_result_id: i64,
    ) -> Result<i64, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "accountResultId": account_result_id,
            "companyCode": ctx.company_code,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
        });
        let env = self
            .post_json(constants::EP_RECEIPT_ROW_COUNT, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env.list_array().first().map(|row| v_i64(row, "dataCnt")).unwrap_or(0))
    }

    async fn trigger_bottom_transmit(&self) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        let payload = Self::save_payload(&ctx, constants::RECEIPT_MENU_TREE_ID, "[]", "[]", false);
        let env = self
            .post_json(constants::EP_RECEIPT_BOTTOM_TRANSMIT, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn confirm_top_transmit(&self, header_row: &Value) -> Result<bool, ConvertError> {
        let ctx = self.context().await?;
        let rows = to_json_string(std::slice::from_ref(header_row))?;
        let payload = json!({
            "recordsIMain": rows,
            "recordsUMain": rows,
            "recordsDMain": "[]",
            "menuTreeId": constants::RECEIPT_MENU_TREE_ID,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyCode": ctx.company_code,
            "companyId": ctx.company_id,
        });
        let env = self
            .post_json(constants::EP_RECEIPT_TOP_TRANSMIT, payload, constants::SAVE_TIMEOUT_SECS)
            .await?;
        Ok(env.success)
    }

    async fn resolve_item_code_by_name(
        &self,
        item_name: &str,
    ) -> Result<Option<String>, ConvertError> {
        if item_name.is_empty() {
            return Ok(None);
        }
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "status": "Active",
            "itemPlant": ctx.plant_id,
            "itemCode": "",
            "itemName": item_name,
            "itemType": "", "productGroup": "", "buyMake": "", "controlLot": "",
            "start": 1, "page": 1, "limit": 25,
        });
        let env = self
            .post_json(constants::EP_ITEM_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        let code = env
            .list_array()
            .first()
            .map(|row| v_str(row, "itemCode"))
            .filter(|s| !s.is_empty());
        Ok(code)
    }

    async fn resolve_plant_item(&self, item_code: &str) -> Result<Option<PlantItem>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "controlLotSerial": "", "makeOrBuy": "", "status": "", "itemType": "",
            "itemCode": item_code,
            "itemName": "",
            "productionGroup": "", "productionType": "",
            "specialaType": "", "specialbType": "", "specialcType": "",
            "partnerId": 0, "partnerTypeId": 0,
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "start": 1, "page": 1, "limit": "20",
        });
        let env = self
            .post_json(constants::EP_PLANT_ITEM_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env
            .list_array()
            .into_iter()
            .next()
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn list_warehouses(&self) -> Result<Vec<WarehouseRef>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "enabledFlag": "", "warehouseCode": "", "warehouseName": "", "warehouseType": "",
            "outsideFlag": "", "partnerCode": "", "partnerName": "",
            "availableForLocationFlag": "", "poReceivingFlag": "", "wipProductionFlag": "",
            "shipmentInspectionFlag": "", "defectiveStockFlag": "", "wipProcessingFlag": "",
            "managementType": "", "inventoryAssetFlag": "",
            "start": 1, "page": 1, "limit": 25,
        });
        let env = self
            .post_json(constants::EP_WAREHOUSE_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env
            .list_array()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    async fn list_account_aliases(&self) -> Result<Vec<AccountAlias>, ConvertError> {
        let ctx = self.context().await?;
        let payload = json!({
            "languageCode": constants::DEFAULT_LANGUAGE_CODE,
            "companyId": ctx.company_id,
            "plantId": ctx.plant_id,
            "enabledFlag": "",
            "accountAliasCode": "",
            "accountAliasName": "",
            "start": 1, "page": 1, "limit": 25,
        });
        let env = self
            .post_json(constants::EP_ACCOUNT_ALIAS_LIST, payload, constants::READ_TIMEOUT_SECS)
            .await?;
        Ok(env
            .list_array()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}
