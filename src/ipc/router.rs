use serde_json::{json, Value};
use tracing::error;

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

/// One request in, one response out, plus the change events the request
/// caused. The caller writes the events after the response line.
pub fn handle_request(state: &mut AppState, req: Request) -> (serde_json::Value, Vec<Value>) {
    let response = dispatch(state, &req);
    let events = drain_watch_events(state);
    (response, events)
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::counts::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::exams::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::instructors::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::candidates::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::announcements::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::fees::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::chat::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::schedule::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::admin::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::watch::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// A watcher fires when some touched path equals its path, sits under it,
/// or contains it. At most one event per watcher per request.
fn drain_watch_events(state: &mut AppState) -> Vec<Value> {
    let Some(store) = state.store.as_mut() else {
        return Vec::new();
    };
    let dirty = store.take_dirty();
    if dirty.is_empty() || state.watchers.is_empty() {
        return Vec::new();
    }
    let mut events = Vec::new();
    for watcher in &state.watchers {
        if !dirty.iter().any(|path| paths_related(path, &watcher.path)) {
            continue;
        }
        match store.get(&watcher.path) {
            Ok(value) => events.push(json!({
                "event": "change",
                "watcherId": watcher.id,
                "path": watcher.path,
                "value": value.unwrap_or(Value::Null),
            })),
            Err(e) => error!(path = %watcher.path, error = %e, "watch read failed"),
        }
    }
    events
}

fn covers(ancestor: &str, descendant: &str) -> bool {
    descendant
        .strip_prefix(ancestor)
        .map_or(false, |rest| rest.starts_with('/'))
}

fn paths_related(a: &str, b: &str) -> bool {
    a == b || covers(a, b) || covers(b, a)
}

#[cfg(test)]
mod tests {
    use super::paths_related;

    #[test]
    fn path_relationship_matching() {
        assert!(paths_related("schools/1", "schools/1"));
        assert!(paths_related("schools/1/candidates", "schools/1"));
        assert!(paths_related("schools/1", "schools/1/candidates/roster/x"));
        assert!(!paths_related("schools/1", "schools/10"));
        assert!(!paths_related("schools/1/name", "schools/1/email"));
        assert!(!paths_related("messages", "schools"));
    }
}
