use serde_json::{json, Value};
use tracing::warn;

use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, instructor_path, store_get, HandlerErr, PATH_SCHOOLS};
use crate::ipc::types::{AppState, Request, Session};
use crate::store::Store;

enum SignInOutcome {
    Admin(Session),
    School(Session, Value),
    NoSchool { email: String },
}

/// Maps a signed-in email onto a tenant. The identity provider itself is
/// external; by the time this runs the email is taken as authenticated.
fn resolve_sign_in(store: &Store, params: &Value) -> Result<SignInOutcome, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    if password.chars().count() < config::MIN_PASSWORD_LEN {
        return Err(HandlerErr::bad_params(format!(
            "password must be at least {} characters",
            config::MIN_PASSWORD_LEN
        )));
    }

    if email == config::ADMIN_EMAIL {
        return Ok(SignInOutcome::Admin(Session::Admin { email }));
    }

    let Some(school_id) = lookup_school_by_email(store, &email)? else {
        return Ok(SignInOutcome::NoSchool { email });
    };
    let summary = school_summary(store, &school_id)?;
    Ok(SignInOutcome::School(
        Session::School { school_id, email },
        summary,
    ))
}

fn lookup_school_by_email(store: &Store, email: &str) -> Result<Option<String>, HandlerErr> {
    let Some(schools) = store_get(store, PATH_SCHOOLS)? else {
        return Ok(None);
    };
    let Some(map) = schools.as_object() else {
        return Ok(None);
    };
    for (id, school) in map {
        if school.get("email").and_then(|v| v.as_str()) == Some(email) {
            return Ok(Some(id.clone()));
        }
    }
    Ok(None)
}

fn school_summary(store: &Store, school_id: &str) -> Result<Value, HandlerErr> {
    let school = store_get(store, &format!("schools/{school_id}"))?.unwrap_or(Value::Null);
    Ok(json!({
        "id": school_id,
        "name": school.get("name").cloned().unwrap_or(Value::Null),
        "email": school.get("email").cloned().unwrap_or(Value::Null),
        "hasManagementAccess": school
            .get("hasManagementAccess")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }))
}

fn instructor_sign_in(store: &Store, params: &Value) -> Result<Session, HandlerErr> {
    let school_id = get_required_str(params, "schoolId")?;
    let instructor_id = get_required_str(params, "instructorId")?;
    let password = get_required_str(params, "password")?;

    let instructor = store_get(store, &instructor_path(&school_id, &instructor_id))?
        .ok_or_else(|| HandlerErr::new("auth_failed", "invalid instructor credentials"))?;
    let stored_password = instructor.get("password").and_then(|v| v.as_str());
    if stored_password != Some(password.as_str()) {
        return Err(HandlerErr::new("auth_failed", "invalid instructor credentials"));
    }

    Ok(Session::Instructor {
        school_id,
        instructor_id,
        name: instructor
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    })
}

fn schools_list(store: &Store) -> Result<Value, HandlerErr> {
    let schools = store_get(store, PATH_SCHOOLS)?.unwrap_or(Value::Null);
    let mut out = Vec::new();
    if let Some(map) = schools.as_object() {
        for (id, school) in map {
            out.push(json!({
                "id": id,
                "name": school.get("name").cloned().unwrap_or(Value::Null),
                "email": school.get("email").cloned().unwrap_or(Value::Null),
                "hasManagementAccess": school
                    .get("hasManagementAccess")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            }));
        }
    }
    Ok(json!({ "schools": out }))
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match resolve_sign_in(store, &req.params) {
        Ok(SignInOutcome::Admin(session)) => {
            let described = session.describe();
            state.session = Some(session);
            ok(&req.id, json!({ "session": described }))
        }
        Ok(SignInOutcome::School(session, summary)) => {
            let described = session.describe();
            state.session = Some(session);
            ok(&req.id, json!({ "session": described, "school": summary }))
        }
        Ok(SignInOutcome::NoSchool { email }) => {
            // The account exists upstream but maps to no tenant: terminate
            // the session and report it as fatal to the caller.
            warn!(email, "sign-in email matches no school; forcing sign-out");
            state.clear_session();
            err(
                &req.id,
                "auth_no_school",
                "no school matches this email",
                Some(json!({ "fatal": true, "forcedSignOut": true })),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_instructor_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match instructor_sign_in(store, &req.params) {
        Ok(session) => {
            let described = session.describe();
            state.session = Some(session);
            ok(&req.id, json!({ "session": described }))
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.clear_session();
    ok(&req.id, json!({ "signedOut": true }))
}

fn handle_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = state
        .session
        .as_ref()
        .map(|s| s.describe())
        .unwrap_or(Value::Null);
    ok(&req.id, json!({ "session": session }))
}

fn handle_schools_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schools_list(store) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.instructorSignIn" => Some(handle_instructor_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.current" => Some(handle_current(state, req)),
        "schools.list" => Some(handle_schools_list(state, req)),
        _ => None,
    }
}
