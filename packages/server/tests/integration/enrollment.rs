use serde_json::json;

use crate::common::{TestApp, routes};

#[tokio::test]
async fn student_self_enrollment_starts_pending() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let tutor = app.create_user(&admin, "tutor_ana", "tutor").await;
    let student = app.create_user(&admin, "student_ben", "student").await;
    let program_id = app.create_program(&admin, tutor.id, 2500.0).await;

    let res = app
        .post_with_session(
            routes::ENROLLMENTS,
            &json!({"program_id": program_id}),
            &student.token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["status"], "pending");
    assert_eq!(res.body["student_id"], student.id);

    let again = app
        .post_with_session(
            routes::ENROLLMENTS,
            &json!({"program_id": program_id}),
            &student.token,
        )
        .await;
    assert_eq!(again.status, 409);
}

#[tokio::test]
async fn full_program_rejects_enrollment() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let a = app.create_user(&admin, "student_a", "student").await;
    let b = app.create_user(&admin, "student_b", "student").await;

    let res = app
        .post_with_session(
            routes::PROGRAMS,
            &json!({"name": "Tiny", "fee": 100.0, "max_students": 1}),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    let program_id = res.id();

    app.enroll(&admin, program_id, a.id).await;
    let res = app
        .post_with_session(
            routes::ENROLLMENTS,
            &json!({"program_id": program_id, "student_id": b.id}),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn status_changes_follow_the_lifecycle() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let path = routes::enrollment_status(c.enrollment_id);

    let res = app
        .patch_with_session(&path, &json!({"status": "completed"}), &c.admin.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["status"], "completed");

    let res = app
        .patch_with_session(&path, &json!({"status": "active"}), &c.admin.token)
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn balance_starts_at_the_full_fee() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;

    let res = app
        .get_with_session(&routes::enrollment_balance(c.enrollment_id), &c.student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["total_fee"], 5000.0);
    assert_eq!(res.body["total_paid"], 0.0);
    assert_eq!(res.body["balance"], 5000.0);
}

#[tokio::test]
async fn students_see_only_their_own_enrollments() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    app.enroll(&c.admin, c.program_id, other.id).await;

    let res = app.get_with_session(routes::ENROLLMENTS, &c.student.token).await;
    assert_eq!(res.status, 200);
    let data = res.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["student_id"], c.student.id);

    let res = app
        .get_with_session(&routes::enrollment_balance(c.enrollment_id), &other.token)
        .await;
    assert_eq!(res.status, 403);
}
