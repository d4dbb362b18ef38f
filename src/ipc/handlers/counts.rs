use serde_json::{json, Value};

use crate::fees::{parse_count_input, ClassCounts, LicenseClass};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    candidates_path, get_required_str, resolve_school_scope, school_path, store_get, store_set,
    HandlerErr,
};
use crate::ipc::types::{AppState, CountsDraft, Request};
use crate::records::{CandidateRecord, KIND_ROSTER};
use crate::store::Store;

fn load_counts(store: &Store, school_id: &str) -> Result<ClassCounts, HandlerErr> {
    let stored = store_get(store, &candidates_path(school_id))?;
    match CandidateRecord::from_value(stored.as_ref()) {
        CandidateRecord::ClassCounts(counts) => Ok(counts),
        CandidateRecord::Roster(_) => Err(HandlerErr::with_details(
            "wrong_record_kind",
            "school keeps a candidate roster, not per-class counters",
            json!({ "kind": KIND_ROSTER }),
        )),
    }
}

fn parse_class(params: &Value) -> Result<LicenseClass, HandlerErr> {
    let code = get_required_str(params, "classType")?;
    LicenseClass::parse(&code)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown class type: {code}")))
}

fn draft_view(draft: &CountsDraft) -> Value {
    json!({
        "schoolId": draft.school_id,
        "counts": draft.counts.to_value(),
        "total": draft.counts.total(),
    })
}

fn open_draft(store: &Store, school_id: &str) -> Result<CountsDraft, HandlerErr> {
    if store_get(store, &school_path(school_id))?.is_none() {
        return Err(HandlerErr::not_found(format!("school {school_id}")));
    }
    let counts = load_counts(store, school_id)?;
    Ok(CountsDraft {
        school_id: school_id.to_string(),
        counts,
    })
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let school_id = match resolve_school_scope(state.session.as_ref(), &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match open_draft(store, &school_id) {
        Ok(draft) => {
            let view = draft_view(&draft);
            state.counts_draft = Some(draft);
            ok(&req.id, view)
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_increment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class = match parse_class(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(draft) = state.counts_draft.as_mut() else {
        return err(&req.id, "no_draft", "open the counts editor first", None);
    };
    draft.counts.increment(class);
    ok(&req.id, draft_view(draft))
}

fn handle_decrement(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class = match parse_class(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(draft) = state.counts_draft.as_mut() else {
        return err(&req.id, "no_draft", "open the counts editor first", None);
    };
    draft.counts.decrement(class);
    ok(&req.id, draft_view(draft))
}

fn handle_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class = match parse_class(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let value = req.params.get("value").cloned().unwrap_or(Value::Null);
    let Some(draft) = state.counts_draft.as_mut() else {
        return err(&req.id, "no_draft", "open the counts editor first", None);
    };
    draft.counts.set(class, parse_count_input(&value));
    ok(&req.id, draft_view(draft))
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.counts_draft.as_ref() else {
        return err(&req.id, "no_draft", "open the counts editor first", None);
    };
    let record = CandidateRecord::ClassCounts(draft.counts);
    match store_set(store, &candidates_path(&draft.school_id), &record.to_value()) {
        Ok(()) => ok(
            &req.id,
            json!({
                "saved": true,
                "schoolId": draft.school_id,
                "counts": draft.counts.to_value(),
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

fn handle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.counts_draft.as_mut() else {
        return err(&req.id, "no_draft", "open the counts editor first", None);
    };
    match load_counts(store, &draft.school_id) {
        Ok(counts) => {
            draft.counts = counts;
            ok(&req.id, draft_view(draft))
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "counts.open" => Some(handle_open(state, req)),
        "counts.increment" => Some(handle_increment(state, req)),
        "counts.decrement" => Some(handle_decrement(state, req)),
        "counts.set" => Some(handle_set(state, req)),
        "counts.submit" => Some(handle_submit(state, req)),
        "counts.reset" => Some(handle_reset(state, req)),
        _ => None,
    }
}
