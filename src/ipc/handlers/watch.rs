use serde_json::{json, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, new_id, require_session, store_get, HandlerErr};
use crate::ipc::types::{AppState, Request, Watcher};

fn check_watch_path(path: &str) -> Result<(), HandlerErr> {
    if path.is_empty() || path.split('/').any(|seg| seg.is_empty()) {
        return Err(HandlerErr::bad_params("malformed path"));
    }
    Ok(())
}

fn handle_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = require_session(state.session.as_ref()) {
        return e.response(&req.id);
    }
    let path = match get_required_str(&req.params, "path") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = check_watch_path(&path) {
        return e.response(&req.id);
    }
    // The subscription fires once immediately with the current value.
    let value = match store_get(store, &path) {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => return e.response(&req.id),
    };
    let id = new_id();
    state.watchers.push(Watcher {
        id: id.clone(),
        path: path.clone(),
    });
    ok(&req.id, json!({ "watcherId": id, "path": path, "value": value }))
}

fn handle_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_session(state.session.as_ref()) {
        return e.response(&req.id);
    }
    let watcher_id = match get_required_str(&req.params, "watcherId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(pos) = state.watchers.iter().position(|w| w.id == watcher_id) else {
        return HandlerErr::not_found(format!("watcher {watcher_id}")).response(&req.id);
    };
    state.watchers.remove(pos);
    ok(&req.id, json!({ "unsubscribed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "watch.subscribe" => Some(handle_subscribe(state, req)),
        "watch.unsubscribe" => Some(handle_unsubscribe(state, req)),
        _ => None,
    }
}
