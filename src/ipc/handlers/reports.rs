use serde_json::{json, Value};

use crate::fees::{
    format_try, remaining_b_quota, remaining_difference_quota, school_fee_total, ClassCounts,
    FeeTable, LicenseClass, CLASS_B_QUOTA, DIFFERENCE_QUOTA,
};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_opt_str, has_management_access, require_session, store_get, HandlerErr, PATH_FEES,
    PATH_SCHOOLS,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::records::CandidateRecord;
use crate::store::Store;

struct SchoolRow {
    id: String,
    name: String,
    counts: ClassCounts,
}

/// Aggregation input: every stored school except the administrative record,
/// with roster-kind candidates grouped into class counts.
fn school_rows(store: &Store) -> Result<Vec<SchoolRow>, HandlerErr> {
    let schools = store_get(store, PATH_SCHOOLS)?.unwrap_or(Value::Null);
    let mut rows = Vec::new();
    if let Some(map) = schools.as_object() {
        for (id, school) in map {
            if id == "admin" {
                continue;
            }
            let counts = CandidateRecord::from_value(school.get("candidates")).effective_counts();
            rows.push(SchoolRow {
                id: id.clone(),
                name: school
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                counts,
            });
        }
    }
    Ok(rows)
}

fn load_fee_table(store: &Store) -> Result<FeeTable, HandlerErr> {
    let stored = store_get(store, PATH_FEES)?;
    Ok(stored
        .map(|v| FeeTable::from_value(&v))
        .unwrap_or_default())
}

/// The management dashboard's cross-school report: the admin always, a
/// school only once it has been granted management access.
fn check_detailed_access(store: &Store, session: &Session) -> Result<(), HandlerErr> {
    match session {
        Session::Admin { .. } => Ok(()),
        Session::School { school_id, .. } => {
            if has_management_access(store, school_id)? {
                Ok(())
            } else {
                Err(HandlerErr::forbidden("management access required"))
            }
        }
        Session::Instructor { .. } => Err(HandlerErr::forbidden("management access required")),
    }
}

fn detailed_report(store: &Store, session: &Session) -> Result<Value, HandlerErr> {
    check_detailed_access(store, session)?;
    let rows = school_rows(store)?;
    let fees = load_fee_table(store)?;

    let mut class_totals = ClassCounts::default();
    let mut total_candidates: u64 = 0;
    let mut total_fee: i64 = 0;
    let mut school_views = Vec::with_capacity(rows.len());
    for row in &rows {
        for class in LicenseClass::ALL {
            class_totals.add(class, row.counts.get(class));
        }
        let fee = school_fee_total(&row.counts, &fees);
        total_candidates += row.counts.total();
        total_fee += fee;
        school_views.push(json!({
            "schoolId": row.id,
            "name": row.name,
            "counts": row.counts.to_value(),
            "total": row.counts.total(),
            "fee": fee,
            "feeFormatted": format_try(fee),
        }));
    }

    let mut classes = Vec::with_capacity(LicenseClass::ALL.len());
    for class in LicenseClass::ALL {
        classes.push(json!({
            "code": class.code(),
            "displayName": class.display_name(),
            "feeAmount": fees.get(class),
            "feeAmountFormatted": format_try(fees.get(class)),
            "total": class_totals.get(class),
        }));
    }

    Ok(json!({
        "schools": school_views,
        "classes": classes,
        "totalCandidates": total_candidates,
        "totalFee": total_fee,
        "totalFeeFormatted": format_try(total_fee),
    }))
}

fn quota_row(row: &SchoolRow) -> Value {
    json!({
        "schoolId": row.id,
        "name": row.name,
        "counts": row.counts.to_value(),
        "bQuota": remaining_b_quota(&row.counts),
        "differenceQuota": remaining_difference_quota(&row.counts),
    })
}

fn quota_report(store: &Store, session: &Session, params: &Value) -> Result<Value, HandlerErr> {
    let scope: Option<String> = match session {
        Session::Admin { .. } => get_opt_str(params, "schoolId"),
        Session::School { school_id, .. } => {
            if let Some(other) = get_opt_str(params, "schoolId") {
                if other != *school_id {
                    return Err(HandlerErr::forbidden("another school's data"));
                }
            }
            Some(school_id.clone())
        }
        Session::Instructor { .. } => {
            return Err(HandlerErr::forbidden("school or administrator only"));
        }
    };

    let rows = school_rows(store)?;
    let views: Vec<Value> = match &scope {
        Some(school_id) => {
            let row = rows
                .iter()
                .find(|r| r.id == *school_id)
                .ok_or_else(|| HandlerErr::not_found(format!("school {school_id}")))?;
            vec![quota_row(row)]
        }
        None => rows.iter().map(quota_row).collect(),
    };

    Ok(json!({
        "schools": views,
        "bQuotaLimit": CLASS_B_QUOTA,
        "differenceQuotaLimit": DIFFERENCE_QUOTA,
    }))
}

fn handle_detailed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match detailed_report(store, session) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_quota(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session = match require_session(state.session.as_ref()) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match quota_report(store, session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.detailed" => Some(handle_detailed(state, req)),
        "reports.quota" => Some(handle_quota(state, req)),
        _ => None,
    }
}
