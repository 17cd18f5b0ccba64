use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn tutor_sees_only_assigned_programs() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let ana = app.create_user(&admin, "tutor_ana", "tutor").await;
    let bo = app.create_user(&admin, "tutor_bo", "tutor").await;
    let mine = app.create_program(&admin, ana.id, 3000.0).await;
    app.create_program(&admin, bo.id, 3000.0).await;

    let res = app.get_with_session(routes::PROGRAMS, &ana.token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], mine);

    let all = app.get_with_session(routes::PROGRAMS, &admin.token).await;
    assert_eq!(all.body["data"].as_array().unwrap().len(), 2);
    assert_eq!(all.body["pagination"]["total"], 2);
}

#[tokio::test]
async fn program_tutor_must_be_a_tutor() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let student = app.create_user(&admin, "student_ben", "student").await;

    let res = app
        .post_with_session(
            routes::PROGRAMS,
            &json!({"name": "Reading", "tutor_id": student.id, "fee": 100.0}),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn negative_fee_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let res = app
        .post_with_session(
            routes::PROGRAMS,
            &json!({"name": "Reading", "fee": -1.0}),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn overlapping_sessions_conflict() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let path = routes::program_sessions(c.program_id);

    let first = app
        .post_with_session(
            &path,
            &json!({
                "title": "Lesson 1",
                "starts_at": "2030-03-01T09:00:00Z",
                "ends_at": "2030-03-01T10:00:00Z",
            }),
            &c.tutor.token,
        )
        .await;
    assert_eq!(first.status, 201, "{}", first.text);

    let overlap = app
        .post_with_session(
            &path,
            &json!({
                "title": "Lesson 2",
                "starts_at": "2030-03-01T09:30:00Z",
                "ends_at": "2030-03-01T10:30:00Z",
            }),
            &c.tutor.token,
        )
        .await;
    assert_eq!(overlap.status, 409);
    assert_eq!(overlap.body["code"], "CONFLICT");

    let adjacent = app
        .post_with_session(
            &path,
            &json!({
                "title": "Lesson 2",
                "starts_at": "2030-03-01T10:00:00Z",
                "ends_at": "2030-03-01T11:00:00Z",
            }),
            &c.tutor.token,
        )
        .await;
    assert_eq!(adjacent.status, 201, "{}", adjacent.text);
}

#[tokio::test]
async fn session_must_end_after_it_starts() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;

    let res = app
        .post_with_session(
            &routes::program_sessions(c.program_id),
            &json!({
                "title": "Backwards",
                "starts_at": "2030-03-01T10:00:00Z",
                "ends_at": "2030-03-01T09:00:00Z",
            }),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn materials_are_visible_to_enrolled_students_only() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let outsider = app.create_user(&c.admin, "student_zed", "student").await;

    let res = app
        .get_with_session(&routes::program_materials(c.program_id), &c.student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);

    let res = app
        .get_with_session(&routes::program_materials(c.program_id), &outsider.token)
        .await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn other_tutor_cannot_add_material() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "tutor_bo", "tutor").await;

    let res = app
        .post_with_session(
            &routes::program_materials(c.program_id),
            &json!({"title": "Not mine"}),
            &other.token,
        )
        .await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let res = app.get_with_session(&routes::program(9999), &admin.token).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}
