use serde_json::{Value, json};

use crate::common::{Classroom, TestApp, routes, text_form};

async fn validated_payment(app: &TestApp, c: &Classroom, amount: f64) -> i32 {
    let id = app.create_payment(&c.student.token, c.enrollment_id, amount).await;
    let res = app
        .post_with_session(
            &routes::payment_validate(id),
            &json!({"action": "validate"}),
            &c.admin.token,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    id
}

fn status_entry<'a>(report: &'a Value, status: &str) -> &'a Value {
    report["by_status"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["status"] == status)
        .unwrap()
}

#[tokio::test]
async fn revenue_counts_validated_payments_only() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    validated_payment(&app, &c, 500.0).await;
    validated_payment(&app, &c, 250.5).await;
    app.create_payment(&c.student.token, c.enrollment_id, 999.0).await;

    let res = app.get_with_session(routes::REVENUE, &c.admin.token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["total_revenue"], 750.5);
    assert_eq!(status_entry(&res.body, "validated")["count"], 2);
    assert_eq!(status_entry(&res.body, "pending")["amount"], 999.0);
    assert_eq!(status_entry(&res.body, "refunded")["count"], 0);

    let methods = res.body["by_method"].as_array().unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0]["method"], "gcash");
    assert_eq!(res.body["by_month"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn revenue_window_excludes_other_dates() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    validated_payment(&app, &c, 500.0).await;

    let res = app
        .get_with_session(
            &format!("{}?from=2000-01-01&to=2000-12-31", routes::REVENUE),
            &c.admin.token,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["total_revenue"], 0.0);

    let backwards = app
        .get_with_session(
            &format!("{}?from=2001-01-01&to=2000-01-01", routes::REVENUE),
            &c.admin.token,
        )
        .await;
    assert_eq!(backwards.status, 400);
}

#[tokio::test]
async fn revenue_is_admin_only() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;

    let res = app.get_with_session(routes::REVENUE, &c.tutor.token).await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn completion_rate_per_program() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    app.enroll(&c.admin, c.program_id, other.id).await;
    app.patch_with_session(
        &routes::enrollment_status(c.enrollment_id),
        &json!({"status": "completed"}),
        &c.admin.token,
    )
    .await;

    let res = app.get_with_session(routes::COMPLETION, &c.tutor.token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    let row = &res.body["data"][0];
    assert_eq!(row["program_id"], c.program_id);
    assert_eq!(row["total_enrollments"], 2);
    assert_eq!(row["completed"], 1);
    assert_eq!(row["completion_rate"], 50.0);

    let res = app.get_with_session(routes::COMPLETION, &c.student.token).await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn student_grades_combine_both_categories() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;

    let assessment_id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(assessment_id), &json!({}), &c.student.token)
        .await
        .id();
    app.post_form(
        &routes::attempt_submit(attempt_id),
        text_form(&[("comments", "answers inline")]),
        &c.student.token,
    )
    .await;
    app.post_with_session(
        &routes::attempt_grade(attempt_id),
        &json!({"score": 80.0}),
        &c.tutor.token,
    )
    .await;

    let assignment_id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let submission_id = app
        .post_form(
            &routes::assignment_submissions(assignment_id),
            text_form(&[("submission_text", "essay")]),
            &c.student.token,
        )
        .await
        .id();
    app.post_with_session(
        &routes::submission_grade(submission_id),
        &json!({"score": 94.0}),
        &c.tutor.token,
    )
    .await;

    let res = app
        .get_with_session(&routes::student_grades(c.student.id), &c.student.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let program = &res.body["programs"][0];
    assert_eq!(program["graded_assessments"], 1);
    assert_eq!(program["graded_assignments"], 1);
    assert_eq!(program["assessment_average"], 80.0);
    assert_eq!(program["assignment_average"], 94.0);
    assert_eq!(program["final_percentage"], 87.0);
    assert_eq!(program["letter_grade"], "B+");

    let tutor_view = app
        .get_with_session(&routes::student_grades(c.student.id), &c.tutor.token)
        .await;
    assert_eq!(tutor_view.status, 200);
}

#[tokio::test]
async fn grades_are_private() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    let stranger = app.create_user(&c.admin, "tutor_bo", "tutor").await;

    let res = app
        .get_with_session(&routes::student_grades(c.student.id), &other.token)
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .get_with_session(&routes::student_grades(c.student.id), &stranger.token)
        .await;
    assert_eq!(res.status, 403);
}
