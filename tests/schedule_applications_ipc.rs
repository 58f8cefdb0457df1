mod test_support;

use chrono::{Duration, Local};
use serde_json::json;
use test_support::{error_code, request, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn schedule_groups_by_day_sorted_by_start() {
    let workspace = temp_dir("uniflow-schedule");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    for (id, day, start, end, title) in [
        ("1", 0, "14:00", "15:00", "Seminar"),
        ("2", 0, "09:00", "10:30", "Lecture"),
        ("3", 4, "11:00", "12:00", "Lab"),
    ] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "schedule.add",
            json!({ "day": day, "start": start, "end": end, "title": title }),
        );
    }

    for (id, params) in [
        ("4", json!({ "day": 7, "start": "09:00", "end": "10:00", "title": "X" })),
        ("5", json!({ "day": 1, "start": "10:00", "end": "09:00", "title": "X" })),
        ("6", json!({ "day": 1, "start": "9am", "end": "10:00", "title": "X" })),
        ("7", json!({ "day": 1, "start": "09:00", "end": "10:00", "title": " " })),
    ] {
        let resp = request(&mut stdin, &mut reader, id, "schedule.add", params);
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }

    let listed = request_ok(&mut stdin, &mut reader, "8", "schedule.list", json!({}));
    let days = listed["days"].as_array().expect("days");
    assert_eq!(days.len(), 7);
    assert_eq!(days[0]["name"], json!("Monday"));
    assert_eq!(days[0]["entries"][0]["title"], json!("Lecture"));
    assert_eq!(days[0]["entries"][1]["title"], json!("Seminar"));
    assert_eq!(days[4]["entries"][0]["title"], json!("Lab"));
    assert_eq!(days[6]["entries"], json!([]));

    let entry_id = days[4]["entries"][0]["id"].as_str().expect("id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.delete",
        json!({ "entryId": entry_id }),
    );
    let cleared = request_ok(&mut stdin, &mut reader, "10", "schedule.clear", json!({}));
    assert_eq!(cleared["removed"], json!(2));
}

#[test]
fn applications_upsert_and_deadline_states() {
    let workspace = temp_dir("uniflow-applications");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let in_days = |n: i64| {
        (Local::now().date_naive() + Duration::days(n))
            .format("%Y-%m-%d")
            .to_string()
    };

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "applications.upsert",
        json!({ "input": {
            "company": "Acme",
            "programme": "Graduate Scheme",
            "closing": in_days(2),
            "status": "interested",
            "written": "no"
        } }),
    );
    let application_id = created["applicationId"].as_str().expect("applicationId").to_string();

    let listed = request_ok(&mut stdin, &mut reader, "2", "applications.list", json!({}));
    assert_eq!(listed["statusOptions"].as_array().map(Vec::len), Some(13));
    let app = &listed["applications"][0];
    assert_eq!(app["status"], json!("Interested"));
    assert_eq!(app["written"], json!("No"));
    assert_eq!(app["cv"], json!("Yes"));
    assert_eq!(app["deadline"], json!({ "state": "soon", "daysLeft": 2 }));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "applications.upsert",
        json!({ "input": {
            "applicationId": application_id,
            "company": "Acme",
            "closing": in_days(-3),
            "status": "Rejected"
        } }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "4", "applications.list", json!({}));
    let apps = listed["applications"].as_array().expect("applications");
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0]["status"], json!("Rejected"));
    assert_eq!(apps[0]["deadline"], json!({ "state": "passed", "daysAgo": 3 }));

    let missing = request(
        &mut stdin,
        &mut reader,
        "5",
        "applications.upsert",
        json!({ "input": { "applicationId": "nope", "company": "Acme" } }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));
    let bad = request(
        &mut stdin,
        &mut reader,
        "6",
        "applications.upsert",
        json!({ "input": { "status": "Ghosted" } }),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "applications.delete",
        json!({ "applicationId": application_id }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "8", "applications.list", json!({}));
    assert_eq!(listed["applications"], json!([]));
}
