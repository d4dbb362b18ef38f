use serde_json::{json, Value};
use tracing::warn;

use crate::config;
use crate::exam::{self, ExamCandidate, ExamDay, MoveDirection, SLOT_COUNT};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    exam_list_path, get_confirm_flag, get_opt_str, get_required_str, instructor_path, now_millis,
    require_session, store_get, store_remove, store_set, HandlerErr,
};
use crate::ipc::types::{AppState, ExamDraft, Request, Session};
use crate::store::Store;

fn day_value(list: &[ExamCandidate]) -> Value {
    serde_json::to_value(list).unwrap_or_default()
}

/// Stored day lists tolerate entries written by older clients (extra keys,
/// missing fields); unreadable entries are dropped with a warning.
fn parse_day(record: &Value, day: ExamDay) -> Vec<ExamCandidate> {
    let Some(items) = record.get(day.as_str()).and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    let mut list = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<ExamCandidate>(item.clone()) {
            Ok(candidate) => list.push(candidate),
            Err(e) => warn!(day = day.as_str(), error = %e, "skipping unreadable exam entry"),
        }
    }
    list
}

fn parse_day_param(params: &Value) -> Result<ExamDay, HandlerErr> {
    let day = get_required_str(params, "day")?;
    ExamDay::parse(&day).ok_or_else(|| HandlerErr::bad_params(format!("unknown day: {day}")))
}

fn slots_view(list: &[ExamCandidate]) -> Value {
    let mut slots = Vec::with_capacity(SLOT_COUNT);
    for order in 1..=SLOT_COUNT as u32 {
        let Some((start, end)) = exam::slot_times(order) else {
            continue;
        };
        // Slots render by order value, so stored gaps show as empty slots.
        let candidate = list.iter().find(|c| c.order == order);
        slots.push(json!({
            "slot": order,
            "startTime": start,
            "endTime": end,
            "candidate": candidate
                .map(|c| serde_json::to_value(c).unwrap_or_default())
                .unwrap_or(Value::Null),
        }));
    }
    Value::Array(slots)
}

fn draft_view(draft: &ExamDraft) -> Value {
    json!({
        "schoolId": draft.school_id,
        "instructorId": draft.instructor_id,
        "month": draft.month,
        "saturday": day_value(&draft.saturday),
        "sunday": day_value(&draft.sunday),
        "slots": {
            "saturday": slots_view(&draft.saturday),
            "sunday": slots_view(&draft.sunday),
        },
    })
}

fn record_value(draft: &ExamDraft, updated_at: i64) -> Value {
    json!({
        "saturday": day_value(&draft.saturday),
        "sunday": day_value(&draft.sunday),
        "updatedAt": updated_at,
    })
}

/// Which (school, instructor) a session may open: instructors their own
/// list, schools any of their instructors, the admin anyone's.
fn resolve_target(session: &Session, params: &Value) -> Result<(String, String), HandlerErr> {
    match session {
        Session::Instructor {
            school_id,
            instructor_id,
            ..
        } => {
            if let Some(other) = get_opt_str(params, "instructorId") {
                if other != *instructor_id {
                    return Err(HandlerErr::forbidden("another instructor's exam list"));
                }
            }
            Ok((school_id.clone(), instructor_id.clone()))
        }
        Session::School { school_id, .. } => {
            let instructor_id = get_required_str(params, "instructorId")?;
            Ok((school_id.clone(), instructor_id))
        }
        Session::Admin { .. } => {
            let school_id = get_required_str(params, "schoolId")?;
            let instructor_id = get_required_str(params, "instructorId")?;
            Ok((school_id, instructor_id))
        }
    }
}

fn open_draft(store: &Store, session: &Session, params: &Value) -> Result<ExamDraft, HandlerErr> {
    let (school_id, instructor_id) = resolve_target(session, params)?;
    let month = get_required_str(params, "month")?;
    if !config::is_month(&month) {
        return Err(HandlerErr::bad_params(format!("unknown month: {month}")));
    }
    if store_get(store, &instructor_path(&school_id, &instructor_id))?.is_none() {
        return Err(HandlerErr::not_found(format!("instructor {instructor_id}")));
    }

    let record = store_get(store, &exam_list_path(&school_id, &instructor_id, &month))?
        .unwrap_or(Value::Null);
    Ok(ExamDraft {
        school_id,
        instructor_id,
        month,
        saturday: parse_day(&record, ExamDay::Saturday),
        sunday: parse_day(&record, ExamDay::Sunday),
    })
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match open_draft(store, session, &req.params) {
        Ok(draft) => {
            let view = draft_view(&draft);
            state.exam_draft = Some(draft);
            ok(&req.id, view)
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_move(state: &mut AppState, req: &Request) -> serde_json::Value {
    let day = match parse_day_param(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let direction = match get_required_str(&req.params, "direction")
        .and_then(|d| {
            MoveDirection::parse(&d)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown direction: {d}")))
        }) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(index) = req.params.get("index").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing index", None);
    };
    let Some(draft) = state.exam_draft.as_mut() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };

    let list = match day {
        ExamDay::Saturday => &mut draft.saturday,
        ExamDay::Sunday => &mut draft.sunday,
    };
    let moved = exam::move_candidate(list, index as usize, direction);
    let mut view = draft_view(draft);
    view["moved"] = Value::Bool(moved);
    ok(&req.id, view)
}

fn handle_switch_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let day = match parse_day_param(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let candidate_id = match get_required_str(&req.params, "candidateId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(draft) = state.exam_draft.as_mut() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };

    let (from, to) = match day {
        ExamDay::Saturday => (&mut draft.saturday, &mut draft.sunday),
        ExamDay::Sunday => (&mut draft.sunday, &mut draft.saturday),
    };
    if !exam::switch_day(from, to, &candidate_id) {
        warn!(
            candidate_id,
            day = day.as_str(),
            "switch-day: candidate not in list"
        );
        return err(&req.id, "not_found", "candidate not in list", None);
    }
    let mut view = draft_view(draft);
    view["movedTo"] = Value::String(day.other().as_str().to_string());
    ok(&req.id, view)
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let day = match parse_day_param(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let candidate_id = match get_required_str(&req.params, "candidateId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(draft) = state.exam_draft.as_mut() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };

    let list = match day {
        ExamDay::Saturday => &mut draft.saturday,
        ExamDay::Sunday => &mut draft.sunday,
    };
    // A nonexistent id is not an error; the list is simply unchanged.
    let removed = exam::remove_candidate(list, &candidate_id);
    let mut view = draft_view(draft);
    view["removed"] = Value::Bool(removed);
    ok(&req.id, view)
}

/// The roster-to-exam-list flow: selected candidates of the owning school
/// join the Saturday list and the whole record is persisted at once.
fn add_candidates(
    store: &mut Store,
    draft: &mut ExamDraft,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let Some(ids) = params.get("candidateIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing candidateIds"));
    };
    let ids: Vec<String> = ids
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if ids.is_empty() {
        return Err(HandlerErr::bad_params("candidateIds is empty"));
    }

    let roster = super::candidates::load_roster(store, &draft.school_id)?;

    let mut saturday = draft.saturday.clone();
    let mut added = 0usize;
    let mut skipped = 0usize;
    for id in ids {
        let Some(candidate) = roster.get(&id) else {
            skipped += 1;
            continue;
        };
        saturday.push(ExamCandidate {
            id,
            name: candidate.name.clone(),
            license_type: candidate.license_type.clone(),
            order: (saturday.len() + 1) as u32,
        });
        added += 1;
    }

    let updated_at = now_millis();
    let staged = ExamDraft {
        school_id: draft.school_id.clone(),
        instructor_id: draft.instructor_id.clone(),
        month: draft.month.clone(),
        saturday,
        sunday: draft.sunday.clone(),
    };
    let path = exam_list_path(&staged.school_id, &staged.instructor_id, &staged.month);
    store_set(store, &path, &record_value(&staged, updated_at))?;
    // The draft advances only once the write is confirmed.
    *draft = staged;

    let mut view = draft_view(draft);
    view["added"] = Value::from(added);
    view["skipped"] = Value::from(skipped);
    view["updatedAt"] = Value::from(updated_at);
    Ok(view)
}

fn handle_add_candidates(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.exam_draft.as_mut() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };
    match add_candidates(store, draft, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.exam_draft.as_ref() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };
    let updated_at = now_millis();
    let path = exam_list_path(&draft.school_id, &draft.instructor_id, &draft.month);
    match store_set(store, &path, &record_value(draft, updated_at)) {
        Ok(()) => ok(&req.id, json!({ "saved": true, "updatedAt": updated_at })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !get_confirm_flag(&req.params) {
        return err(
            &req.id,
            "confirmation_required",
            "clearing the stored list needs confirm: true",
            None,
        );
    }
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(draft) = state.exam_draft.as_mut() else {
        return err(&req.id, "no_draft", "open an exam list first", None);
    };
    let path = exam_list_path(&draft.school_id, &draft.instructor_id, &draft.month);
    match store_remove(store, &path) {
        Ok(()) => {
            draft.saturday.clear();
            draft.sunday.clear();
            let mut view = draft_view(draft);
            view["cleared"] = Value::Bool(true);
            ok(&req.id, view)
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.open" => Some(handle_open(state, req)),
        "exams.addCandidates" => Some(handle_add_candidates(state, req)),
        "exams.move" => Some(handle_move(state, req)),
        "exams.switchDay" => Some(handle_switch_day(state, req)),
        "exams.remove" => Some(handle_remove(state, req)),
        "exams.send" => Some(handle_send(state, req)),
        "exams.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
