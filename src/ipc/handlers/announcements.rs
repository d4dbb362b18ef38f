use serde_json::{json, Map, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_opt_str, get_required_filled, get_required_str, new_id, now_millis, require_admin,
    require_session, store_get, store_remove, store_set, store_update, HandlerErr,
    PATH_ANNOUNCEMENTS,
};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

pub const ANNOUNCEMENT_TYPES: [&str; 3] = ["meeting", "fee_collection", "price_update"];

fn announcement_path(id: &str) -> String {
    format!("announcements/{id}")
}

fn check_type(code: &str) -> Result<(), HandlerErr> {
    if ANNOUNCEMENT_TYPES.contains(&code) {
        Ok(())
    } else {
        Err(HandlerErr::bad_params(format!("unknown announcement type {code}")))
    }
}

fn announcement_rows(store: &Store) -> Result<Vec<Value>, HandlerErr> {
    let value = store_get(store, PATH_ANNOUNCEMENTS)?;
    let mut rows: Vec<Value> = Vec::new();
    if let Some(map) = value.as_ref().and_then(|v| v.as_object()) {
        for (id, record) in map {
            let mut row = record.as_object().cloned().unwrap_or_default();
            row.insert("id".to_string(), Value::from(id.clone()));
            rows.push(Value::Object(row));
        }
    }
    // Newest first, as the dashboard displays them.
    rows.sort_by_key(|row| {
        std::cmp::Reverse(row.get("createdAt").and_then(|v| v.as_i64()).unwrap_or(0))
    });
    Ok(rows)
}

fn add_announcement(store: &mut Store, params: &Value) -> Result<Value, HandlerErr> {
    let content = get_required_filled(params, "content")?;
    let kind = get_required_str(params, "type")?;
    check_type(&kind)?;
    let id = new_id();
    let record = json!({
        "content": content,
        "type": kind,
        "createdAt": now_millis(),
    });
    store_set(store, &announcement_path(&id), &record)?;
    Ok(json!({ "announcementId": id }))
}

fn update_announcement(store: &mut Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "announcementId")?;
    let path = announcement_path(&id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("announcement {id}")));
    }
    let mut patch = Map::new();
    if let Some(content) = get_opt_str(params, "content") {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(HandlerErr::bad_params("content must not be empty"));
        }
        patch.insert("content".to_string(), Value::from(trimmed));
    }
    if let Some(kind) = get_opt_str(params, "type") {
        check_type(&kind)?;
        patch.insert("type".to_string(), Value::from(kind));
    }
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("nothing to update"));
    }
    patch.insert("updatedAt".to_string(), Value::from(now_millis()));
    store_update(store, &path, &patch)?;
    Ok(json!({ "updated": true }))
}

fn delete_announcement(store: &mut Store, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "announcementId")?;
    let path = announcement_path(&id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("announcement {id}")));
    }
    store_remove(store, &path)?;
    Ok(json!({ "deleted": true }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_session(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match announcement_rows(store) {
        Ok(rows) => ok(&req.id, json!({ "announcements": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match add_announcement(store, &req.params) {
        Ok(result) => ok(&req.id, result),
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
    match update_announcement(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match delete_announcement(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.list" => Some(handle_list(state, req)),
        "announcements.add" => Some(handle_add(state, req)),
        "announcements.update" => Some(handle_update(state, req)),
        "announcements.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
