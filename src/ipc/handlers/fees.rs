use serde_json::{json, Map, Value};

use crate::fees::{FeeTable, LicenseClass};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    require_admin, require_session, store_get, store_update, HandlerErr, PATH_FEES,
};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

fn effective_fees(store: &Store) -> Result<FeeTable, HandlerErr> {
    let stored = store_get(store, PATH_FEES)?;
    Ok(FeeTable::from_value(stored.as_ref().unwrap_or(&Value::Null)))
}

fn parse_fee_patch(params: &Value) -> Result<Map<String, Value>, HandlerErr> {
    let fees = params
        .get("fees")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing fees"))?;
    if fees.is_empty() {
        return Err(HandlerErr::bad_params("empty fees"));
    }
    let mut patch = Map::new();
    for (code, value) in fees {
        if LicenseClass::parse(code).is_none() {
            return Err(HandlerErr::bad_params(format!("unknown license class {code}")));
        }
        let Some(amount) = value.as_i64().filter(|n| *n >= 0) else {
            return Err(HandlerErr::bad_params(format!("{code} must be a non-negative amount")));
        };
        patch.insert(code.clone(), Value::from(amount));
    }
    Ok(patch)
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_session(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match effective_fees(store) {
        Ok(table) => ok(&req.id, json!({ "fees": table.to_value() })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    let patch = match parse_fee_patch(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = store_update(store, PATH_FEES, &patch) {
        return e.response(&req.id);
    }
    match effective_fees(store) {
        Ok(table) => ok(&req.id, json!({ "fees": table.to_value() })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.get" => Some(handle_get(state, req)),
        "fees.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
