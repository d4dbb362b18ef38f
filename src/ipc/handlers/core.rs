use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::school_path;
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match Store::open(&path) {
        Ok(mut store) => {
            let seeded = match seed_schools(&mut store) {
                Ok(n) => n,
                Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
            };
            // Any previous session belonged to the previous workspace.
            state.clear_session();
            state.workspace = Some(path.clone());
            state.store = Some(store);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "seededSchools": seeded,
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

/// First open of a workspace: install the deployment's school roster. A
/// school without a stored candidate record reads as zeroed counters, so
/// seeds carry identity only.
fn seed_schools(store: &mut Store) -> anyhow::Result<usize> {
    if store.get("schools")?.is_some() {
        return Ok(0);
    }
    for (id, name, email) in config::PREDEFINED_SCHOOLS {
        store.set(&school_path(id), &json!({ "name": name, "email": email }))?;
    }
    let count = config::PREDEFINED_SCHOOLS.len();
    info!(count, "seeded predefined schools");
    Ok(count)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
