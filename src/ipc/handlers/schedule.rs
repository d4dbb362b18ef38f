use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_str, new_id, now_millis, require_session, schedule_path, store_get, store_remove,
    store_set, HandlerErr,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::store::Store;

fn lesson_path(instructor_id: &str, date: &str, lesson_id: &str) -> String {
    format!("schedule/{instructor_id}/{date}/{lesson_id}")
}

/// Schedule methods are instructor-only; the session carries the identity.
fn require_instructor(session: Option<&Session>) -> Result<(String, String), HandlerErr> {
    match require_session(session)? {
        Session::Instructor {
            school_id,
            instructor_id,
            ..
        } => Ok((school_id.clone(), instructor_id.clone())),
        _ => Err(HandlerErr::forbidden(
            "lesson schedules belong to instructors",
        )),
    }
}

fn parse_date(params: &Value) -> Result<String, HandlerErr> {
    let date = get_required_str(params, "date")?;
    if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Err(HandlerErr::bad_params(format!("{date} is not a YYYY-MM-DD date")));
    }
    Ok(date)
}

fn parse_time(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let time = get_required_str(params, key)?;
    if NaiveTime::parse_from_str(&time, "%H:%M").is_err() {
        return Err(HandlerErr::bad_params(format!("{key} must be HH:MM")));
    }
    Ok(time)
}

fn create_lesson(
    store: &mut Store,
    school_id: &str,
    instructor_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let date = parse_date(params)?;
    let student_id = get_required_str(params, "studentId")?;
    let start_time = parse_time(params, "startTime")?;
    let end_time = parse_time(params, "endTime")?;

    // Name and license class come from the roster entry, which must be one
    // of this instructor's own students.
    let roster = super::candidates::load_roster(store, school_id)?;
    let student = roster
        .get(&student_id)
        .filter(|c| c.instructor_id.as_deref() == Some(instructor_id))
        .ok_or_else(|| HandlerErr::not_found("selected student is not in your roster"))?;

    let id = new_id();
    let lesson = json!({
        "studentId": student_id,
        "studentName": student.name,
        "licenseType": student.license_type,
        "date": date,
        "startTime": start_time,
        "endTime": end_time,
        "status": "pending",
        "createdAt": now_millis(),
    });
    store_set(store, &lesson_path(instructor_id, &date, &id), &lesson)?;
    Ok(json!({ "lessonId": id }))
}

fn lesson_rows(store: &Store, instructor_id: &str, date: &str) -> Result<Vec<Value>, HandlerErr> {
    let value = store_get(store, &schedule_path(instructor_id, date))?;
    let mut rows: Vec<Value> = Vec::new();
    if let Some(map) = value.as_ref().and_then(|v| v.as_object()) {
        for (id, record) in map {
            let mut row = record.as_object().cloned().unwrap_or_default();
            row.insert("id".to_string(), Value::from(id.clone()));
            rows.push(Value::Object(row));
        }
    }
    rows.sort_by_key(|row| {
        row.get("startTime")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    });
    Ok(rows)
}

fn remove_lesson(
    store: &mut Store,
    instructor_id: &str,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let date = parse_date(params)?;
    let lesson_id = get_required_str(params, "lessonId")?;
    let path = lesson_path(instructor_id, &date, &lesson_id);
    if store_get(store, &path)?.is_none() {
        return Err(HandlerErr::not_found(format!("lesson {lesson_id}")));
    }
    store_remove(store, &path)?;
    Ok(json!({ "deleted": true }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (school_id, instructor_id) = match require_instructor(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match create_lesson(store, &school_id, &instructor_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (_, instructor_id) = match require_instructor(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let date = match parse_date(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match lesson_rows(store, &instructor_id, &date) {
        Ok(rows) => ok(&req.id, json!({ "lessons": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (_, instructor_id) = match require_instructor(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match remove_lesson(store, &instructor_id, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.create" => Some(handle_create(state, req)),
        "schedule.list" => Some(handle_list(state, req)),
        "schedule.remove" => Some(handle_remove(state, req)),
        _ => None,
    }
}
