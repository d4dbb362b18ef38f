use serde_json::{json, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_confirm_flag, get_required_filled, new_id, now_millis, require_admin, require_session,
    store_get, store_remove, store_set, HandlerErr, PATH_MESSAGES,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::store::Store;

fn message_path(id: &str) -> String {
    format!("messages/{id}")
}

/// Chat identity of the current session. Instructors have no seat in the
/// room.
fn sender_identity(store: &Store, session: &Session) -> Result<(String, String), HandlerErr> {
    match session {
        Session::Admin { .. } => Ok(("admin".to_string(), "Admin".to_string())),
        Session::School { school_id, .. } => {
            let name = store_get(store, &format!("schools/{school_id}/name"))?
                .and_then(|v| v.as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| school_id.clone());
            Ok((school_id.clone(), name))
        }
        Session::Instructor { .. } => {
            Err(HandlerErr::forbidden("chat is for schools and the admin"))
        }
    }
}

fn message_rows(store: &Store, limit: Option<usize>) -> Result<Vec<Value>, HandlerErr> {
    let value = store_get(store, PATH_MESSAGES)?;
    let mut rows: Vec<Value> = Vec::new();
    if let Some(map) = value.as_ref().and_then(|v| v.as_object()) {
        for (id, record) in map {
            let mut row = record.as_object().cloned().unwrap_or_default();
            row.insert("id".to_string(), Value::from(id.clone()));
            rows.push(Value::Object(row));
        }
    }
    rows.sort_by_key(|row| row.get("timestamp").and_then(|v| v.as_i64()).unwrap_or(0));
    if let Some(limit) = limit {
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
    }
    Ok(rows)
}

fn handle_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let content = match get_required_filled(&req.params, "content") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let (school_id, school_name) = match sender_identity(store, session) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let id = new_id();
    let record = json!({
        "schoolId": school_id,
        "schoolName": school_name,
        "content": content,
        "timestamp": now_millis(),
    });
    if let Err(e) = store_set(store, &message_path(&id), &record) {
        return e.response(&req.id);
    }
    ok(&req.id, json!({ "messageId": id }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_session(state.session.as_ref()) {
        return e.response(&req.id);
    }
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize);
    match message_rows(store, limit) {
        Ok(rows) => ok(&req.id, json!({ "messages": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !get_confirm_flag(&req.params) {
        return err(
            &req.id,
            "confirmation_required",
            "clearing the chat history needs confirm: true",
            None,
        );
    }
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_admin(state.session.as_ref()) {
        return e.response(&req.id);
    }
    match store_remove(store, PATH_MESSAGES) {
        Ok(()) => ok(&req.id, json!({ "cleared": true })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "chat.send" => Some(handle_send(state, req)),
        "chat.list" => Some(handle_list(state, req)),
        "chat.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
