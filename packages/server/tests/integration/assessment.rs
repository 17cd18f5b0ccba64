use common::AttemptStatus;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use tplearn_server::entity::assessment_attempt;

use crate::common::{TestApp, file_form, routes, text_form};

#[tokio::test]
async fn answers_are_hidden_from_students() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;

    let tutor_view = app.get_with_session(&routes::assessment(id), &c.tutor.token).await;
    assert_eq!(tutor_view.status, 200, "{}", tutor_view.text);
    assert_eq!(tutor_view.body["questions"][0]["answer"], "3/4");

    let student_view = app
        .get_with_session(&routes::assessment(id), &c.student.token)
        .await;
    assert_eq!(student_view.status, 200);
    assert!(student_view.body["questions"][0]["answer"].is_null());
    assert_eq!(student_view.body["questions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn question_points_cannot_exceed_total() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;

    let res = app
        .post_with_session(
            routes::ASSESSMENTS,
            &json!({
                "material_id": c.material_id,
                "title": "Too many points",
                "total_points": 10.0,
                "questions": [
                    {"prompt": "Q", "question_type": "essay", "points": 20.0}
                ],
            }),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn start_is_idempotent_while_in_progress() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, Some(30), None)
        .await;

    let first = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(first.status, 201, "{}", first.text);
    assert_eq!(first.body["status"], "in_progress");
    assert!(first.body["time_limit_end"].is_string());

    let again = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(again.status, 200);
    assert_eq!(again.id(), first.id());
    assert_eq!(again.body["time_limit_end"], first.body["time_limit_end"]);
}

#[tokio::test]
async fn only_enrolled_students_start_attempts() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let outsider = app.create_user(&c.admin, "student_zed", "student").await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;

    let res = app
        .post_with_session(&routes::attempts(id), &json!({}), &outsider.token)
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.tutor.token)
        .await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn submit_then_grade_gives_letter() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;

    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    let form = file_form("answers.pdf", b"%PDF-1.4 my answers").text("comments", "Done early");
    let submitted = app
        .post_form(&routes::attempt_submit(attempt_id), form, &c.student.token)
        .await;
    assert_eq!(submitted.status, 200, "{}", submitted.text);
    assert_eq!(submitted.body["status"], "submitted");
    assert_eq!(submitted.body["is_late"], false);
    assert_eq!(submitted.body["comments"], "Done early");
    assert_eq!(submitted.body["file"]["original_filename"], "answers.pdf");

    let graded = app
        .post_with_session(
            &routes::attempt_grade(attempt_id),
            &json!({"score": 87.0, "feedback": "Nice work"}),
            &c.tutor.token,
        )
        .await;
    assert_eq!(graded.status, 200, "{}", graded.text);
    assert_eq!(graded.body["status"], "graded");
    assert_eq!(graded.body["percentage"], 87.0);
    assert_eq!(graded.body["grade_letter"], "B+");
    assert_eq!(graded.body["graded_by"], c.tutor.id);

    let mine = app
        .get_with_session(&routes::my_attempt(id), &c.student.token)
        .await;
    assert_eq!(mine.body["grade_letter"], "B+");
    assert_eq!(mine.body["feedback"], "Nice work");
}

#[tokio::test]
async fn score_must_fit_total_points() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.post_form(
        &routes::attempt_submit(attempt_id),
        text_form(&[("comments", "see attached")]),
        &c.student.token,
    )
    .await;

    let res = app
        .post_with_session(
            &routes::attempt_grade(attempt_id),
            &json!({"score": 101.0}),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 400);

    let res = app
        .post_with_session(
            &routes::attempt_grade(attempt_id),
            &json!({"score": -1.0}),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn in_progress_attempt_cannot_be_graded() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    let res = app
        .post_with_session(
            &routes::attempt_grade(attempt_id),
            &json!({"score": 50.0}),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            text_form(&[("comments", "   ")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn overdue_attempt_expires_on_submit() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, Some(10), None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    app.execute_sql(&format!(
        "UPDATE assessment_attempt SET time_limit_end = now() - interval '1 minute' \
         WHERE id = {attempt_id}"
    ))
    .await;

    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            file_form("late.txt", b"too late"),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "ATTEMPT_EXPIRED");
    assert_eq!(app.stored_file_count("assessments"), 0);

    let mine = app
        .get_with_session(&routes::my_attempt(id), &c.student.token)
        .await;
    assert_eq!(mine.status, 200);
    assert_eq!(mine.body["status"], "expired");

    let retry = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(retry.status, 409);
    assert_eq!(retry.body["code"], "ATTEMPT_EXPIRED");
}

#[tokio::test]
async fn restart_after_time_limit_expires_without_new_attempt() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, Some(30), None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.execute_sql(&format!(
        "UPDATE assessment_attempt SET time_limit_end = now() - interval '1 minute' \
         WHERE id = {attempt_id}"
    ))
    .await;

    let res = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(res.status, 409, "{}", res.text);
    assert_eq!(res.body["code"], "ATTEMPT_EXPIRED");

    let rows = assessment_attempt::Entity::find()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, attempt_id);
    assert_eq!(rows[0].status, AttemptStatus::Expired);

    let again = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(again.body["code"], "ATTEMPT_EXPIRED");
    let count = assessment_attempt::Entity::find()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn listing_marks_overdue_attempts_expired() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, Some(5), None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.execute_sql(&format!(
        "UPDATE assessment_attempt SET time_limit_end = now() - interval '1 second' \
         WHERE id = {attempt_id}"
    ))
    .await;

    let res = app.get_with_session(&routes::attempts(id), &c.tutor.token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["data"][0]["status"], "expired");
}

#[tokio::test]
async fn second_start_after_submit_conflicts() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            text_form(&[("comments", "answer: 3/4")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let res = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "CONFLICT");

    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            text_form(&[("comments", "again")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn edit_replaces_file_until_graded() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.post_form(
        &routes::attempt_submit(attempt_id),
        file_form("v1.txt", b"first"),
        &c.student.token,
    )
    .await;
    assert_eq!(app.stored_file_count("assessments"), 1);

    let edited = app
        .put_form(
            &routes::attempt(attempt_id),
            file_form("v2.txt", b"second"),
            &c.student.token,
        )
        .await;
    assert_eq!(edited.status, 200, "{}", edited.text);
    assert_eq!(edited.body["file"]["original_filename"], "v2.txt");
    assert_eq!(app.stored_file_count("assessments"), 1);

    app.post_with_session(
        &routes::attempt_grade(attempt_id),
        &json!({"score": 70.0}),
        &c.tutor.token,
    )
    .await;

    let res = app
        .put_form(
            &routes::attempt(attempt_id),
            file_form("v3.txt", b"third"),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(app.stored_file_count("assessments"), 1);
}

#[tokio::test]
async fn second_edit_is_refused_before_grading() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.post_form(
        &routes::attempt_submit(attempt_id),
        file_form("v1.txt", b"first"),
        &c.student.token,
    )
    .await;

    let first = app
        .put_form(
            &routes::attempt(attempt_id),
            file_form("v2.txt", b"second"),
            &c.student.token,
        )
        .await;
    assert_eq!(first.status, 200, "{}", first.text);
    assert!(first.body["edited_at"].is_string());

    let second = app
        .put_form(
            &routes::attempt(attempt_id),
            file_form("v3.txt", b"third"),
            &c.student.token,
        )
        .await;
    assert_eq!(second.status, 409, "{}", second.text);
    assert_eq!(second.body["code"], "CONFLICT");
    assert_eq!(app.stored_file_count("assessments"), 1);

    let mine = app
        .get_with_session(&routes::my_attempt(id), &c.student.token)
        .await;
    assert_eq!(mine.body["file"]["original_filename"], "v2.txt");
    assert_eq!(mine.body["status"], "submitted");
}

#[tokio::test]
async fn edit_refused_after_due_date_even_ungraded() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(
            &c.tutor.token,
            c.material_id,
            None,
            Some("2099-01-01T00:00:00Z"),
        )
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    let submitted = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            text_form(&[("comments", "on time")]),
            &c.student.token,
        )
        .await;
    assert_eq!(submitted.status, 200, "{}", submitted.text);
    assert_eq!(submitted.body["is_late"], false);

    app.execute_sql(&format!(
        "UPDATE assessment SET due_date = now() - interval '1 minute' WHERE id = {id}"
    ))
    .await;

    let res = app
        .put_form(
            &routes::attempt(attempt_id),
            file_form("late.txt", b"after the deadline"),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 409, "{}", res.text);
    assert_eq!(res.body["code"], "CONFLICT");
    assert_eq!(app.stored_file_count("assessments"), 0);

    let mine = app
        .get_with_session(&routes::my_attempt(id), &c.student.token)
        .await;
    assert_eq!(mine.body["status"], "submitted");
    assert_eq!(mine.body["comments"], "on time");
    assert!(mine.body["edited_at"].is_null());
}

#[tokio::test]
async fn other_students_cannot_touch_an_attempt() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    app.enroll(&c.admin, c.program_id, other.id).await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            text_form(&[("comments", "not mine")]),
            &other.token,
        )
        .await;
    assert_eq!(res.status, 403);

    let res = app.get_with_session(&routes::attempts(id), &other.token).await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn disallowed_extension_is_rejected_before_storage() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();

    let res = app
        .post_form(
            &routes::attempt_submit(attempt_id),
            file_form("virus.exe", b"MZ"),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(app.stored_file_count("assessments"), 0);
}

#[tokio::test]
async fn deleting_assessment_removes_attempt_files() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assessment(&c.tutor.token, c.material_id, None, None)
        .await;
    let attempt_id = app
        .post_with_session(&routes::attempts(id), &json!({}), &c.student.token)
        .await
        .id();
    app.post_form(
        &routes::attempt_submit(attempt_id),
        file_form("work.pdf", b"%PDF"),
        &c.student.token,
    )
    .await;

    let forbidden = app
        .delete_with_session(&routes::assessment(id), &c.tutor.token)
        .await;
    assert_eq!(forbidden.status, 403);

    let res = app
        .delete_with_session(&routes::assessment(id), &c.admin.token)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["deleted_attempts"], 1);
    assert_eq!(res.body["deleted_files"], 1);
    assert_eq!(app.stored_file_count("assessments"), 0);

    let gone = app.get_with_session(&routes::assessment(id), &c.admin.token).await;
    assert_eq!(gone.status, 404);
}
