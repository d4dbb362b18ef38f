
use serde_json::json;
use test_support::{
    error_code, request_err, request_ok, select_workspace, sign_in_admin, sign_in_school,
    spawn_sidecar, temp_dir,
};

#[test]
fn create_list_update_delete_round_trip() {
    let workspace = temp_dir("mtsk-instructors-crud");
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
            "name": "Hasan Demir",
            "email": "hasan@biga.com",
            "phone": "05551110022",
            "password": "123456"
        }),
    );
    let instructor_id = created
        .get("instructorId")
        .and_then(|v| v.as_str())
        .expect("instructorId")
        .to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "instructors.list",
        json!({ "schoolId": "1" }),
    );
    let rows = listed
        .get("instructors")
        .and_then(|v| v.as_array())
        .expect("instructors");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(
        row.get("id").and_then(|v| v.as_str()),
        Some(instructor_id.as_str())
    );
    assert_eq!(row.get("name").and_then(|v| v.as_str()), Some("Hasan Demir"));
    assert_eq!(
        row.get("school").and_then(|v| v.as_str()),
        Some("ÖZEL BİGA LİDER MTSK")
    );
    // Credentials never leave the store.
    assert!(row.get("password").is_none());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "instructors.update",
        json!({
            "schoolId": "1",
            "instructorId": instructor_id,
            "patch": { "phone": "05559990000" }
        }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "instructors.list",
        json!({ "schoolId": "1" }),
    );
    assert_eq!(
        listed
            .get("instructors")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows[0].get("phone"))
            .and_then(|v| v.as_str()),
        Some("05559990000")
    );

    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "instructors.update",
        json!({
            "schoolId": "1",
            "instructorId": instructor_id,
            "patch": { "password": "sneaky" }
        }),
    );
    assert_eq!(error_code(&error), "bad_params");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "instructors.update",
        json!({
            "schoolId": "1",
            "instructorId": instructor_id,
            "patch": { "name": "   " }
        }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "instructors.delete",
        json!({ "schoolId": "1", "instructorId": instructor_id }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "instructors.list",
        json!({ "schoolId": "1" }),
    );
    assert_eq!(
        listed
            .get("instructors")
            .and_then(|v| v.as_array())
            .map(|rows| rows.len()),
        Some(0)
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "instructors.delete",
        json!({ "schoolId": "1", "instructorId": instructor_id }),
    );
    assert_eq!(error_code(&error), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn set_password_takes_effect_for_sign_in() {
    let workspace = temp_dir("mtsk-instructors-pw");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "instructors.create",
        json!({
            "schoolId": "2",
            "name": "Nur Hoca",
            "email": "nur@biga.com",
            "phone": "05551110055",
            "password": "ilk-parola"
        }),
    );
    let instructor_id = created
        .get("instructorId")
        .and_then(|v| v.as_str())
        .expect("instructorId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "instructors.setPassword",
        json!({ "schoolId": "2", "instructorId": instructor_id, "password": "yeni-parola" }),
    );

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "auth.instructorSignIn",
        json!({ "schoolId": "2", "instructorId": instructor_id, "password": "ilk-parola" }),
    );
    assert_eq!(error_code(&error), "auth_failed");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.instructorSignIn",
        json!({ "schoolId": "2", "instructorId": instructor_id, "password": "yeni-parola" }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn management_gate_controls_school_mutations() {
    let workspace = temp_dir("mtsk-instructors-gate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    sign_in_school(&mut stdin, &mut reader, "4");
    let form = json!({
        "name": "Seda Hoca",
        "email": "seda@biga.com",
        "phone": "05551110077",
        "password": "123456"
    });
    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "instructors.create",
        form.clone(),
    );
    assert_eq!(error_code(&error), "forbidden");
    // Listing is not gated.
    let _ = request_ok(&mut stdin, &mut reader, "2", "instructors.list", json!({}));

    sign_in_admin(&mut stdin, &mut reader);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "admin.setManagementAccess",
        json!({ "schoolId": "4", "hasAccess": true }),
    );

    sign_in_school(&mut stdin, &mut reader, "4");
    let created = request_ok(&mut stdin, &mut reader, "4", "instructors.create", form);
    let instructor_id = created
        .get("instructorId")
        .and_then(|v| v.as_str())
        .expect("instructorId")
        .to_string();

    // Instructors never pass the gate, whatever their school's flag says.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "auth.instructorSignIn",
        json!({ "schoolId": "4", "instructorId": instructor_id, "password": "123456" }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "instructors.create",
        json!({
            "name": "Baska Hoca",
            "email": "baska@biga.com",
            "phone": "05551110088",
            "password": "123456"
        }),
    );
    assert_eq!(error_code(&error), "forbidden");
    let listed = request_ok(&mut stdin, &mut reader, "7", "instructors.list", json!({}));
    assert_eq!(
        listed
            .get("instructors")
            .and_then(|v| v.as_array())
            .map(|rows| rows.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn create_requires_every_form_field_filled() {
    let workspace = temp_dir("mtsk-instructors-form");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "instructors.create",
        json!({
            "schoolId": "1",
            "name": "Eksik Hoca",
            "email": "",
            "phone": "05551110099",
            "password": "123456"
        }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "instructors.create",
        json!({
            "schoolId": "no-such-school",
            "name": "Eksik Hoca",
            "email": "eksik@biga.com",
            "phone": "05551110099",
            "password": "123456"
        }),
    );
    assert_eq!(error_code(&error), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
