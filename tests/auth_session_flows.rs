
use serde_json::json;
use test_support::{
    error_code, request, request_err, request_ok, select_workspace, sign_in_admin, spawn_sidecar,
    temp_dir,
};

#[test]
fn schools_list_shows_seeded_roster_before_sign_in() {
    let workspace = temp_dir("mtsk-auth-roster");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        selected.get("seededSchools").and_then(|v| v.as_u64()),
        Some(5)
    );

    let listed = request_ok(&mut stdin, &mut reader, "2", "schools.list", json!({}));
    let schools = listed
        .get("schools")
        .and_then(|v| v.as_array())
        .expect("schools array");
    assert_eq!(schools.len(), 5);
    assert_eq!(
        schools[0].get("id").and_then(|v| v.as_str()),
        Some("1")
    );
    assert_eq!(
        schools[0].get("name").and_then(|v| v.as_str()),
        Some("ÖZEL BİGA LİDER MTSK")
    );
    assert_eq!(
        schools[0].get("email").and_then(|v| v.as_str()),
        Some("bigalidermtsk@biga.com")
    );
    assert_eq!(
        schools[0]
            .get("hasManagementAccess")
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    // Selecting the same workspace again finds the roster already present.
    let reselected = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        reselected.get("seededSchools").and_then(|v| v.as_u64()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn admin_and_school_sign_in_round_trip() {
    let workspace = temp_dir("mtsk-auth-signin");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "auth.signIn",
        json!({ "email": "admin@surucukursu.com", "password": "yonetici" }),
    );
    assert_eq!(
        signed
            .get("session")
            .and_then(|v| v.get("role"))
            .and_then(|v| v.as_str()),
        Some("admin")
    );

    let current = request_ok(&mut stdin, &mut reader, "2", "auth.current", json!({}));
    assert_eq!(
        current
            .get("session")
            .and_then(|v| v.get("role"))
            .and_then(|v| v.as_str()),
        Some("admin")
    );

    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "bigagozdemtsk@biga.com", "password": "123456" }),
    );
    assert_eq!(
        signed
            .get("session")
            .and_then(|v| v.get("schoolId"))
            .and_then(|v| v.as_str()),
        Some("3")
    );
    assert_eq!(
        signed
            .get("school")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str()),
        Some("ÖZEL BİGA GÖZDE MTSK")
    );

    let _ = request_ok(&mut stdin, &mut reader, "4", "auth.signOut", json!({}));
    let current = request_ok(&mut stdin, &mut reader, "5", "auth.current", json!({}));
    assert!(current.get("session").map(|v| v.is_null()).unwrap_or(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn short_password_is_rejected_before_lookup() {
    let workspace = temp_dir("mtsk-auth-shortpw");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "auth.signIn",
        json!({ "email": "admin@surucukursu.com", "password": "12345" }),
    );
    assert_eq!(error_code(&error), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_email_forces_sign_out_with_fatal_flag() {
    let workspace = temp_dir("mtsk-auth-noschool");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "auth.signIn",
        json!({ "email": "nobody@elsewhere.com", "password": "123456" }),
    );
    assert_eq!(error_code(&error), "auth_no_school");
    let details = error.get("details").expect("details");
    assert_eq!(details.get("fatal").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        details.get("forcedSignOut").and_then(|v| v.as_bool()),
        Some(true)
    );

    // The previous admin session is gone, not restored.
    let current = request_ok(&mut stdin, &mut reader, "2", "auth.current", json!({}));
    assert!(current.get("session").map(|v| v.is_null()).unwrap_or(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn sign_in_requires_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let response = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.signIn",
        json!({ "email": "admin@surucukursu.com", "password": "123456" }),
    );
    assert_eq!(response.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        response
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn instructor_sign_in_checks_stored_password() {
    let workspace = temp_dir("mtsk-auth-instructor");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "instructors.create",
        json!({
            "schoolId": "1",
            "name": "Mehmet Usta",
            "email": "mehmet@biga.com",
            "phone": "05551110033",
            "password": "gizli-parola"
        }),
    );
    let instructor_id = created
        .get("instructorId")
        .and_then(|v| v.as_str())
        .expect("instructorId")
        .to_string();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "auth.instructorSignIn",
        json!({ "schoolId": "1", "instructorId": instructor_id, "password": "wrong" }),
    );
    assert_eq!(error_code(&error), "auth_failed");

    let signed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.instructorSignIn",
        json!({ "schoolId": "1", "instructorId": instructor_id, "password": "gizli-parola" }),
    );
    let session = signed.get("session").expect("session");
    assert_eq!(session.get("role").and_then(|v| v.as_str()), Some("instructor"));
    assert_eq!(session.get("name").and_then(|v| v.as_str()), Some("Mehmet Usta"));
    assert_eq!(session.get("schoolId").and_then(|v| v.as_str()), Some("1"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
