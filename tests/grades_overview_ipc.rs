mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, select_workspace, spawn_sidecar, temp_dir};

fn create_module(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    name: &str,
    term: i64,
    credits: f64,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "modules.create",
        json!({ "name": name, "term": term, "credits": credits }),
    );
    created["moduleId"].as_str().expect("moduleId").to_string()
}

#[test]
fn overview_rolls_up_terms_courses_and_overall() {
    let workspace = temp_dir("uniflow-grades-overview");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let calc1 = create_module(&mut stdin, &mut reader, "m1", "Calculus", 1, 5.0);
    let calc2 = create_module(&mut stdin, &mut reader, "m2", " Calculus ", 2, 5.0);
    let _ethics = create_module(&mut stdin, &mut reader, "m3", "Ethics", 1, 5.0);
    let bio = create_module(&mut stdin, &mut reader, "m4", "biology", 1, 7.5);

    for (id, module_id, weight, score) in [
        ("a1", &calc1, json!(40), json!(80)),
        ("a2", &calc1, json!(60), json!(null)),
        ("a3", &calc2, json!("100"), json!(18)),
        ("a4", &bio, json!(100), json!("70")),
    ] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "assessments.create",
            json!({ "moduleId": module_id, "title": "Exam", "weight": weight, "score": score }),
        );
    }

    let overview = request_ok(&mut stdin, &mut reader, "o1", "grades.overview", json!({}));

    let by_term = overview["modulesByTerm"].as_array().expect("modulesByTerm");
    assert_eq!(by_term.len(), 2);
    assert_eq!(by_term[0]["term"], json!(1));
    let term1 = by_term[0]["modules"].as_array().expect("modules");
    assert_eq!(term1.len(), 3);
    let calculus = term1
        .iter()
        .find(|m| m["moduleId"] == json!(calc1))
        .expect("calculus");
    assert_eq!(calculus["currentGrade"], json!(80.0));
    assert_eq!(calculus["currentPoints"], json!(32.0));
    assert_eq!(calculus["totalWeight"], json!(100.0));
    assert_eq!(calculus["weightWithScore"], json!(40.0));
    assert_eq!(calculus["assessments"].as_array().map(Vec::len), Some(2));

    let summaries = overview["termSummaries"].as_array().expect("termSummaries");
    assert_eq!(summaries.len(), 2);
    // (5*80 + 5*0 + 7.5*70) / 17.5, the ungraded module still counts.
    assert_eq!(summaries[0]["avg"], json!(52.86));
    assert_eq!(summaries[0]["moduleCount"], json!(3));
    assert_eq!(summaries[0]["gradedCount"], json!(2));
    assert_eq!(summaries[1]["avg"], json!(18.0));

    let courses = overview["coursesOverall"].as_array().expect("coursesOverall");
    let names: Vec<&str> = courses.iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(names, vec!["biology", "Calculus", "Ethics"]);
    assert_eq!(courses[0]["ectsTotal"], json!(7.5));
    assert_eq!(courses[1]["ectsTotal"], json!(10));
    assert_eq!(courses[1]["termsCount"], json!(2));
    assert_eq!(courses[1]["overall"], json!(50.0));
    assert_eq!(
        courses[1]["terms"],
        json!([{ "term": 1, "points": 32.0 }, { "term": 2, "points": 18.0 }])
    );
    assert_eq!(courses[2]["overall"], json!(0.0));

    // (70 + 50 + 0) / 3
    assert_eq!(overview["overallAvg"], json!(40.0));
}

#[test]
fn empty_workspace_has_null_overall_and_empty_terms_toggle() {
    let workspace = temp_dir("uniflow-grades-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let overview = request_ok(&mut stdin, &mut reader, "1", "grades.overview", json!({}));
    assert_eq!(overview["overallAvg"], json!(null));
    assert_eq!(overview["termSummaries"], json!([]));
    assert_eq!(overview["coursesOverall"], json!([]));

    let _ = create_module(&mut stdin, &mut reader, "2", "Thesis", 3, 15.0);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "grades", "patch": { "showEmptyTerms": true } }),
    );
    let overview = request_ok(&mut stdin, &mut reader, "4", "grades.overview", json!({}));
    let terms: Vec<i64> = overview["termSummaries"]
        .as_array()
        .expect("termSummaries")
        .iter()
        .filter_map(|t| t["term"].as_i64())
        .collect();
    assert_eq!(terms, vec![1, 2, 3]);
    assert_eq!(overview["termSummaries"][2]["avg"], json!(0.0));
    assert_eq!(overview["termSummaries"][0]["avg"], json!(null));
}

#[test]
fn module_and_assessment_edits_validate_and_cascade() {
    let workspace = temp_dir("uniflow-modules-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let module_id = create_module(&mut stdin, &mut reader, "1", "Statistics", 1, 6.0);

    for (id, params) in [
        ("2", json!({ "name": "  ", "term": 1, "credits": 5 })),
        ("3", json!({ "name": "X", "term": 0, "credits": 5 })),
        ("4", json!({ "name": "X", "term": 1, "credits": -1 })),
    ] {
        let resp = request(&mut stdin, &mut reader, id, "modules.create", params);
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }

    let over = request(
        &mut stdin,
        &mut reader,
        "5",
        "assessments.create",
        json!({ "moduleId": module_id, "title": "Quiz", "weight": 30, "score": 101 }),
    );
    assert_eq!(error_code(&over), Some("bad_params"));
    let orphan = request(
        &mut stdin,
        &mut reader,
        "6",
        "assessments.create",
        json!({ "moduleId": "missing", "title": "Quiz", "weight": 30 }),
    );
    assert_eq!(error_code(&orphan), Some("not_found"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assessments.create",
        json!({ "moduleId": module_id, "title": "Quiz", "weight": 30 }),
    );
    let assessment_id = created["assessmentId"].as_str().expect("assessmentId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "assessments.update",
        json!({ "assessmentId": assessment_id, "patch": { "score": 90 } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "modules.update",
        json!({ "moduleId": module_id, "patch": { "term": 2 } }),
    );
    let unknown = request(
        &mut stdin,
        &mut reader,
        "10",
        "modules.update",
        json!({ "moduleId": module_id, "patch": { "colour": "blue" } }),
    );
    assert_eq!(error_code(&unknown), Some("bad_params"));

    let listed = request_ok(&mut stdin, &mut reader, "11", "modules.list", json!({}));
    let module = &listed["modules"][0];
    assert_eq!(module["term"], json!(2));
    assert_eq!(module["currentGrade"], json!(90.0));
    assert_eq!(module["currentPoints"], json!(27.0));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "modules.delete",
        json!({ "moduleId": module_id }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "13",
        "assessments.delete",
        json!({ "assessmentId": assessment_id }),
    );
    assert_eq!(error_code(&gone), Some("not_found"));
    let listed = request_ok(&mut stdin, &mut reader, "14", "modules.list", json!({}));
    assert_eq!(listed["modules"], json!([]));
}
