use serde_json::{json, Map, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_filled, get_required_str, instructor_path, instructors_path, new_id, now_millis,
    require_management, resolve_school_scope, store_get, store_remove, store_set, store_update,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

const EDITABLE_FIELDS: [&str; 3] = ["name", "email", "phone"];

struct InstructorForm {
    name: String,
    email: String,
    phone: String,
    password: String,
}

fn parse_form(params: &Value) -> Result<InstructorForm, HandlerErr> {
    Ok(InstructorForm {
        name: get_required_filled(params, "name")?,
        email: get_required_filled(params, "email")?,
        phone: get_required_filled(params, "phone")?,
        password: get_required_filled(params, "password")?,
    })
}

/// List row for one instructor: the stored record with its id attached and
/// the password withheld.
fn sanitized(id: &str, record: &Value) -> Value {
    let mut row = record.as_object().cloned().unwrap_or_default();
    row.remove("password");
    row.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(row)
}

fn roster_rows(store: &Store, school_id: &str) -> Result<Vec<Value>, HandlerErr> {
    let value = store_get(store, &instructors_path(school_id))?;
    let mut rows: Vec<Value> = Vec::new();
    if let Some(map) = value.as_ref().and_then(|v| v.as_object()) {
        for (id, record) in map {
            rows.push(sanitized(id, record));
        }
    }
    rows.sort_by_key(|row| row.get("createdAt").and_then(|v| v.as_i64()).unwrap_or(0));
    Ok(rows)
}

fn create_instructor(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let form = parse_form(params)?;
    let school_name = store_get(store, &format!("schools/{school_id}/name"))?
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .ok_or_else(|| HandlerErr::not_found(format!("school {school_id}")))?;
    let id = new_id();
    let record = json!({
        "name": form.name,
        "email": form.email,
        "phone": form.phone,
        "password": form.password,
        "school": school_name,
        "createdAt": now_millis(),
    });
    store_set(store, &instructor_path(school_id, &id), &record)?;
    Ok(json!({ "instructorId": id }))
}

fn update_instructor(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let instructor_id = get_required_str(params, "instructorId")?;
    let path = instructor_path(school_id, &instructor_id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("instructor {instructor_id}")));
    }
    let fields = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;
    let mut patch = Map::new();
    for (key, value) in fields {
        if !EDITABLE_FIELDS.contains(&key.as_str()) {
            return Err(HandlerErr::bad_params(format!("{key} is not editable")));
        }
        let Some(text) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(HandlerErr::bad_params(format!("{key} must not be empty")));
        };
        patch.insert(key.clone(), Value::String(text.to_string()));
    }
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("empty patch"));
    }
    store_update(store, &path, &patch)?;
    Ok(json!({ "updated": true }))
}

fn set_password(store: &mut Store, school_id: &str, params: &Value) -> Result<Value, HandlerErr> {
    let instructor_id = get_required_str(params, "instructorId")?;
    let password = get_required_filled(params, "password")?;
    let path = instructor_path(school_id, &instructor_id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("instructor {instructor_id}")));
    }
    let mut patch = Map::new();
    patch.insert("password".to_string(), Value::String(password));
    store_update(store, &path, &patch)?;
    Ok(json!({ "updated": true }))
}

fn delete_instructor(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let instructor_id = get_required_str(params, "instructorId")?;
    let path = instructor_path(school_id, &instructor_id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("instructor {instructor_id}")));
    }
    store_remove(store, &path)?;
    Ok(json!({ "deleted": true }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match resolve_school_scope(state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match roster_rows(store, &school_id) {
        Ok(rows) => ok(&req.id, json!({ "instructors": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match require_management(store, state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match create_instructor(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match require_management(store, state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match update_instructor(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_set_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match require_management(store, state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match set_password(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match require_management(store, state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match delete_instructor(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "instructors.list" => Some(handle_list(state, req)),
        "instructors.create" => Some(handle_create(state, req)),
        "instructors.update" => Some(handle_update(state, req)),
        "instructors.setPassword" => Some(handle_set_password(state, req)),
        "instructors.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
