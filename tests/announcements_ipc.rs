
use serde_json::{json, Value};
use test_support::{
    error_code, request_err, request_ok, select_workspace, sign_in_admin, sign_in_school,
    spawn_sidecar, temp_dir,
};

fn row_by_id<'a>(result: &'a Value, id: &str) -> &'a Value {
    result
        .get("announcements")
        .and_then(|v| v.as_array())
        .and_then(|rows| {
            rows.iter()
                .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
        })
        .unwrap_or_else(|| panic!("no announcement {id}: {result}"))
}

#[test]
fn admin_publishes_schools_read() {
    let workspace = temp_dir("mtsk-announce-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "announcements.add",
        json!({ "content": "Aylık toplantı cumartesi 14:00", "type": "meeting" }),
    );
    let meeting_id = added
        .get("announcementId")
        .and_then(|v| v.as_str())
        .expect("announcementId")
        .to_string();
    let added = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "announcements.add",
        json!({ "content": "Harç ödemeleri ay sonuna kadar", "type": "fee_collection" }),
    );
    let fee_id = added
        .get("announcementId")
        .and_then(|v| v.as_str())
        .expect("announcementId")
        .to_string();

    // Schools read the same feed.
    sign_in_school(&mut stdin, &mut reader, "2");
    let listed = request_ok(&mut stdin, &mut reader, "3", "announcements.list", json!({}));
    assert_eq!(
        listed
            .get("announcements")
            .and_then(|v| v.as_array())
            .map(|rows| rows.len()),
        Some(2)
    );
    let meeting = row_by_id(&listed, &meeting_id);
    assert_eq!(
        meeting.get("type").and_then(|v| v.as_str()),
        Some("meeting")
    );
    assert!(meeting.get("createdAt").and_then(|v| v.as_i64()).is_some());

    // Publishing is the admin's.
    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "announcements.add",
        json!({ "content": "okul duyurusu", "type": "meeting" }),
    );
    assert_eq!(error_code(&error), "forbidden");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "announcements.delete",
        json!({ "announcementId": meeting_id }),
    );
    assert_eq!(error_code(&error), "forbidden");

    sign_in_admin(&mut stdin, &mut reader);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "announcements.update",
        json!({ "announcementId": fee_id, "content": "Harç ödemeleri uzatıldı", "type": "price_update" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "7", "announcements.list", json!({}));
    let updated = row_by_id(&listed, &fee_id);
    assert_eq!(
        updated.get("content").and_then(|v| v.as_str()),
        Some("Harç ödemeleri uzatıldı")
    );
    assert_eq!(
        updated.get("type").and_then(|v| v.as_str()),
        Some("price_update")
    );
    assert!(updated.get("updatedAt").and_then(|v| v.as_i64()).is_some());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "announcements.delete",
        json!({ "announcementId": fee_id }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "9", "announcements.list", json!({}));
    assert_eq!(
        listed
            .get("announcements")
            .and_then(|v| v.as_array())
            .map(|rows| rows.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn add_and_update_validate_type_and_content() {
    let workspace = temp_dir("mtsk-announce-validate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    sign_in_admin(&mut stdin, &mut reader);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "announcements.add",
        json!({ "content": "duyuru", "type": "party" }),
    );
    assert_eq!(error_code(&error), "bad_params");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "announcements.add",
        json!({ "content": "  ", "type": "meeting" }),
    );
    assert_eq!(error_code(&error), "bad_params");

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "announcements.add",
        json!({ "content": "duyuru", "type": "meeting" }),
    );
    let id = added
        .get("announcementId")
        .and_then(|v| v.as_str())
        .expect("announcementId")
        .to_string();

    let error = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "announcements.update",
        json!({ "announcementId": id }),
    );
    assert_eq!(error_code(&error), "bad_params");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "announcements.update",
        json!({ "announcementId": "no-such", "content": "x" }),
    );
    assert_eq!(error_code(&error), "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
