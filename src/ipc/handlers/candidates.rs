use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    candidates_path, get_opt_str, get_required_filled, get_required_str, instructor_path, new_id,
    now_millis, require_management, require_session, resolve_school_scope, store_get,
    store_remove, store_update, HandlerErr,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::records::{CandidateRecord, RosterCandidate, KIND_CLASS_COUNTS, KIND_ROSTER};
use crate::store::Store;

/// License codes offered by the registration form. B_AUTO is registerable
/// but sits outside the count/fee enumeration.
const REGISTRATION_LICENSE_TYPES: [&str; 6] = ["B", "B_AUTO", "A1", "A2", "C", "D"];

const GENDERS: [&str; 2] = ["male", "female"];

fn roster_entry_path(school_id: &str, candidate_id: &str) -> String {
    format!("schools/{school_id}/candidates/roster/{candidate_id}")
}

/// A missing record is an empty roster waiting for its first registration;
/// a stored counter record is the other kind and rejects roster operations.
pub(crate) fn load_roster(
    store: &Store,
    school_id: &str,
) -> Result<BTreeMap<String, RosterCandidate>, HandlerErr> {
    let stored = store_get(store, &candidates_path(school_id))?;
    match CandidateRecord::from_value(stored.as_ref()) {
        CandidateRecord::Roster(roster) => Ok(roster),
        CandidateRecord::ClassCounts(_) if stored.is_none() => Ok(BTreeMap::new()),
        CandidateRecord::ClassCounts(_) => Err(HandlerErr::with_details(
            "wrong_record_kind",
            "school keeps per-class counters, not a candidate roster",
            json!({ "kind": KIND_CLASS_COUNTS }),
        )),
    }
}

fn register_candidate(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let name = get_required_filled(params, "name")?;
    let phone = get_required_filled(params, "phone")?;
    let license_type = get_required_str(params, "licenseType")?;
    if !REGISTRATION_LICENSE_TYPES.contains(&license_type.as_str()) {
        return Err(HandlerErr::bad_params(format!("unknown license type {license_type}")));
    }
    let registration_month = get_required_str(params, "registrationMonth")?;
    if !config::is_month(&registration_month) {
        return Err(HandlerErr::bad_params(format!("{registration_month} is not a month name")));
    }
    let gender = get_required_str(params, "gender")?;
    if !GENDERS.contains(&gender.as_str()) {
        return Err(HandlerErr::bad_params("gender must be male or female"));
    }
    let instructor_id = get_opt_str(params, "instructorId");
    if let Some(instructor_id) = &instructor_id {
        if store_get(store, &instructor_path(school_id, instructor_id))?.is_none() {
            return Err(HandlerErr::not_found(format!("instructor {instructor_id}")));
        }
    }

    // Kind guard; a missing record becomes a roster here.
    load_roster(store, school_id)?;

    let id = new_id();
    let candidate = RosterCandidate {
        name,
        phone,
        license_type,
        registration_month,
        gender,
        instructor_id,
        created_at: now_millis(),
    };
    let mut patch = Map::new();
    patch.insert("kind".to_string(), Value::from(KIND_ROSTER));
    patch.insert(format!("roster/{id}"), candidate.to_value());
    store_update(store, &candidates_path(school_id), &patch)?;
    Ok(json!({ "candidateId": id }))
}

fn list_candidates(
    store: &Store,
    session: &Session,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let roster = load_roster(store, school_id)?;
    let month = get_opt_str(params, "month");
    let term = get_opt_str(params, "search");
    let term_lower = term.as_ref().map(|t| t.to_lowercase());
    // Instructors only ever see their own students.
    let instructor_id = match session {
        Session::Instructor { instructor_id, .. } => Some(instructor_id.clone()),
        _ => get_opt_str(params, "instructorId"),
    };

    let mut rows: Vec<Value> = Vec::new();
    for (id, candidate) in &roster {
        if let Some(month) = &month {
            if candidate.registration_month != *month {
                continue;
            }
        }
        if let (Some(term), Some(lower)) = (&term, &term_lower) {
            let hit = candidate.name.to_lowercase().contains(lower.as_str())
                || candidate.phone.contains(term.as_str());
            if !hit {
                continue;
            }
        }
        if let Some(wanted) = &instructor_id {
            if candidate.instructor_id.as_deref() != Some(wanted.as_str()) {
                continue;
            }
        }
        let mut row = candidate.to_value();
        if let Some(map) = row.as_object_mut() {
            map.insert("id".to_string(), Value::from(id.clone()));
        }
        rows.push(row);
    }
    rows.sort_by_key(|row| row.get("createdAt").and_then(|v| v.as_i64()).unwrap_or(0));
    Ok(json!({ "candidates": rows }))
}

fn update_candidate(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let candidate_id = get_required_str(params, "candidateId")?;
    let roster = load_roster(store, school_id)?;
    if !roster.contains_key(&candidate_id) {
        return Err(HandlerErr::not_found(format!("candidate {candidate_id}")));
    }
    let fields = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch"))?;
    let mut patch = Map::new();
    for (key, value) in fields {
        match key.as_str() {
            "name" | "phone" => {
                let Some(text) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                    return Err(HandlerErr::bad_params(format!("{key} must not be empty")));
                };
                patch.insert(key.clone(), Value::from(text));
            }
            "licenseType" => {
                let Some(code) = value
                    .as_str()
                    .filter(|c| REGISTRATION_LICENSE_TYPES.contains(c))
                else {
                    return Err(HandlerErr::bad_params("unknown license type"));
                };
                patch.insert(key.clone(), Value::from(code));
            }
            // Null or blank detaches the candidate from their instructor.
            "instructorId" => match value.as_str().filter(|s| !s.is_empty()) {
                Some(id) => {
                    if store_get(store, &instructor_path(school_id, id))?.is_none() {
                        return Err(HandlerErr::not_found(format!("instructor {id}")));
                    }
                    patch.insert(key.clone(), Value::from(id));
                }
                None => {
                    patch.insert(key.clone(), Value::Null);
                }
            },
            _ => return Err(HandlerErr::bad_params(format!("{key} is not editable"))),
        }
    }
    if patch.is_empty() {
        return Err(HandlerErr::bad_params("empty patch"));
    }
    store_update(store, &roster_entry_path(school_id, &candidate_id), &patch)?;
    Ok(json!({ "updated": true }))
}

fn delete_candidate(
    store: &mut Store,
    school_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let candidate_id = get_required_str(params, "candidateId")?;
    let roster = load_roster(store, school_id)?;
    if !roster.contains_key(&candidate_id) {
        return Err(HandlerErr::not_found(format!("candidate {candidate_id}")));
    }
    store_remove(store, &roster_entry_path(school_id, &candidate_id))?;
    Ok(json!({ "deleted": true }))
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    if matches!(session, Session::Instructor { .. }) {
        return HandlerErr::forbidden("registration is a school operation").response(&req.id);
    }
    let school_id = match resolve_school_scope(Some(session), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match register_candidate(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };
    let school_id = match resolve_school_scope(Some(session), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match list_candidates(store, session, &school_id, &req.params) {
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
    match update_candidate(store, &school_id, &req.params) {
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
    match delete_candidate(store, &school_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "candidates.register" => Some(handle_register(state, req)),
        "candidates.list" => Some(handle_list(state, req)),
        "candidates.update" => Some(handle_update(state, req)),
        "candidates.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
