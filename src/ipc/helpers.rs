use serde_json::{Map, Value};
use tracing::error;
use uuid::Uuid;

use super::error::err;
use super::types::Session;
use crate::store::Store;

pub const PATH_SCHOOLS: &str = "schools";
pub const PATH_FEES: &str = "licenseFees";
pub const PATH_ANNOUNCEMENTS: &str = "announcements";
pub const PATH_MESSAGES: &str = "messages";

pub fn school_path(school_id: &str) -> String {
    format!("schools/{school_id}")
}

pub fn candidates_path(school_id: &str) -> String {
    format!("schools/{school_id}/candidates")
}

pub fn instructors_path(school_id: &str) -> String {
    format!("schools/{school_id}/instructors")
}

pub fn instructor_path(school_id: &str, instructor_id: &str) -> String {
    format!("schools/{school_id}/instructors/{instructor_id}")
}

pub fn exam_list_path(school_id: &str, instructor_id: &str, month: &str) -> String {
    format!("examLists/{school_id}/{instructor_id}/{month}")
}

pub fn schedule_path(instructor_id: &str, date: &str) -> String {
    format!("schedule/{instructor_id}/{date}")
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: &'static str,
        message: impl Into<String>,
        details: Value,
    ) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("not_found", message)
    }

    pub fn forbidden(message: impl Into<String>) -> HandlerErr {
        HandlerErr::new("forbidden", message)
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

/// Required, and meaningfully filled in: form fields reject blank input.
pub fn get_required_filled(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?;
    let trimmed = v.trim();
    if trimmed.is_empty() {
        return Err(HandlerErr::bad_params(format!("{key} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn get_opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_confirm_flag(params: &Value) -> bool {
    params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn require_session(session: Option<&Session>) -> Result<&Session, HandlerErr> {
    session.ok_or_else(|| HandlerErr::new("no_session", "sign in first"))
}

pub fn require_admin(session: Option<&Session>) -> Result<&Session, HandlerErr> {
    let session = require_session(session)?;
    if !session.is_admin() {
        return Err(HandlerErr::forbidden("administrator only"));
    }
    Ok(session)
}

/// Resolves which school an operation targets. Admin must name one; school
/// and instructor sessions work on their own and may not name another.
pub fn resolve_school_scope(
    session: Option<&Session>,
    params: &Value,
) -> Result<String, HandlerErr> {
    let session = require_session(session)?;
    let requested = get_opt_str(params, "schoolId");
    match session.school_id() {
        Some(own) => match requested {
            Some(other) if other != own => Err(HandlerErr::forbidden("another school's data")),
            _ => Ok(own.to_string()),
        },
        None => requested.ok_or_else(|| HandlerErr::bad_params("missing schoolId")),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn store_get(store: &Store, path: &str) -> Result<Option<Value>, HandlerErr> {
    store.get(path).map_err(|e| {
        error!(path, error = %e, "store read failed");
        HandlerErr::new("db_query_failed", e.to_string())
    })
}

pub fn store_set(store: &mut Store, path: &str, value: &Value) -> Result<(), HandlerErr> {
    store.set(path, value).map_err(|e| {
        error!(path, error = %e, "store write failed");
        HandlerErr::new("db_update_failed", e.to_string())
    })
}

pub fn store_update(
    store: &mut Store,
    path: &str,
    partial: &Map<String, Value>,
) -> Result<(), HandlerErr> {
    store.update(path, partial).map_err(|e| {
        error!(path, error = %e, "store update failed");
        HandlerErr::new("db_update_failed", e.to_string())
    })
}

pub fn store_remove(store: &mut Store, path: &str) -> Result<(), HandlerErr> {
    store.remove(path).map_err(|e| {
        error!(path, error = %e, "store remove failed");
        HandlerErr::new("db_update_failed", e.to_string())
    })
}

/// Management-dashboard gate: the admin everywhere, a school only when its
/// record carries the access flag.
pub fn has_management_access(store: &Store, school_id: &str) -> Result<bool, HandlerErr> {
    let flag = store_get(store, &format!("schools/{school_id}/hasManagementAccess"))?;
    Ok(flag.and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Scope resolution plus the management gate. Instructor sessions never
/// qualify, whatever their school's flag says.
pub fn require_management(
    store: &Store,
    session: Option<&Session>,
    params: &Value,
) -> Result<String, HandlerErr> {
    let school_id = resolve_school_scope(session, params)?;
    let session = require_session(session)?;
    match session {
        Session::Admin { .. } => Ok(school_id),
        Session::School { .. } if has_management_access(store, &school_id)? => Ok(school_id),
        _ => Err(HandlerErr::forbidden("management access required")),
    }
}
