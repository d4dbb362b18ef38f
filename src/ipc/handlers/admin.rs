use serde_json::{json, Map, Value};

use crate::fees::ClassCounts;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    candidates_path, get_confirm_flag, get_required_str, require_admin, school_path, store_get,
    store_set, store_update, HandlerErr, PATH_SCHOOLS,
};
use crate::ipc::types::{AppState, Request};
use crate::records::CandidateRecord;
use crate::store::Store;

/// Season rollover: every school's candidate record becomes a zeroed
/// counter record, whatever kind it was before.
fn reset_all_candidates(store: &mut Store) -> Result<Value, HandlerErr> {
    let schools = store_get(store, PATH_SCHOOLS)?;
    let Some(map) = schools.as_ref().and_then(|v| v.as_object()) else {
        return Ok(json!({ "resetSchools": 0 }));
    };
    let ids: Vec<String> = map.keys().cloned().collect();
    let zeroed = CandidateRecord::ClassCounts(ClassCounts::default()).to_value();
    for id in &ids {
        store_set(store, &candidates_path(id), &zeroed)?;
    }
    Ok(json!({ "resetSchools": ids.len() }))
}

fn set_management_access(store: &mut Store, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let Some(has_access) = params.get("hasAccess").and_then(|v| v.as_bool()) else {
        return Err(HandlerErr::bad_params("missing hasAccess"));
    };
    if store_get(store, &school_path(&school_id))?.is_none() {
        return Err(HandlerErr::not_found(format!("school {school_id}")));
    }
    let mut patch = Map::new();
    patch.insert("hasManagementAccess".to_string(), Value::Bool(has_access));
    store_update(store, &school_path(&school_id), &patch)?;
    Ok(json!({ "schoolId": school_id, "hasManagementAccess": has_access }))
}

fn handle_reset_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !get_confirm_flag(&req.params) {
        return err(
            &req.id,
            "confirmation_required",
            "resetting every school's candidates needs confirm: true",
            None,
        );
    }
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match reset_all_candidates(store) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_set_management_access(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match set_management_access(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.resetAllCandidates" => Some(handle_reset_all(state, req)),
        "admin.setManagementAccess" => Some(handle_set_management_access(state, req)),
        _ => None,
    }
}
