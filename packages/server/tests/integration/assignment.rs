use serde_json::json;

use crate::common::{TestApp, file_form, routes, text_form};

#[tokio::test]
async fn submit_and_grade_assignment() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assignment(&c.tutor.token, c.material_id, Some("2099-01-01T00:00:00Z"))
        .await;

    let res = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "My essay about fractions")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["status"], "submitted");
    assert_eq!(res.body["is_late"], false);
    let submission_id = res.id();

    let graded = app
        .post_with_session(
            &routes::submission_grade(submission_id),
            &json!({"score": 87.0, "feedback": "Clear structure"}),
            &c.tutor.token,
        )
        .await;
    assert_eq!(graded.status, 200, "{}", graded.text);
    assert_eq!(graded.body["grade_letter"], "B+");
    assert_eq!(graded.body["percentage"], 87.0);

    let mine = app
        .get_with_session(&routes::my_submission(id), &c.student.token)
        .await;
    assert_eq!(mine.status, 200);
    assert_eq!(mine.body["status"], "graded");
    assert_eq!(mine.body["feedback"], "Clear structure");
}

#[tokio::test]
async fn second_submission_conflicts() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;

    let first = app
        .post_form(
            &routes::assignment_submissions(id),
            file_form("essay.docx", b"PK essay"),
            &c.student.token,
        )
        .await;
    assert_eq!(first.status, 201, "{}", first.text);

    let second = app
        .post_form(
            &routes::assignment_submissions(id),
            file_form("essay2.docx", b"PK essay two"),
            &c.student.token,
        )
        .await;
    assert_eq!(second.status, 409);
    assert_eq!(second.body["code"], "CONFLICT");
    assert_eq!(app.stored_file_count("assignment_submissions"), 1);
}

#[tokio::test]
async fn submission_after_due_date_is_tagged_late() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app
        .create_assignment(&c.tutor.token, c.material_id, Some("2020-01-01T00:00:00Z"))
        .await;

    let res = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "Sorry, late")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["is_late"], true);

    let edit = app
        .put_form(
            &routes::submission(res.id()),
            text_form(&[("submission_text", "Edited")]),
            &c.student.token,
        )
        .await;
    assert_eq!(edit.status, 409);
}

#[tokio::test]
async fn material_due_date_applies_when_assignment_has_none() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let material_id = app
        .create_material(&c.tutor.token, c.program_id, Some("2020-06-01T00:00:00Z"))
        .await;
    let id = app.create_assignment(&c.tutor.token, material_id, None).await;

    let assignment = app.get_with_session(&routes::assignment(id), &c.student.token).await;
    assert_eq!(assignment.status, 200, "{}", assignment.text);
    assert!(assignment.body["due_date"].is_null());
    assert!(assignment.body["effective_due_date"].is_string());

    let res = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "late by material")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.body["is_late"], true);
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;

    let res = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "  ")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn edit_replaces_text_and_file_before_grading() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let submission_id = app
        .post_form(
            &routes::assignment_submissions(id),
            file_form("draft.txt", b"draft"),
            &c.student.token,
        )
        .await
        .id();

    let edited = app
        .put_form(
            &routes::submission(submission_id),
            file_form("final.txt", b"final").text("submission_text", "See final"),
            &c.student.token,
        )
        .await;
    assert_eq!(edited.status, 200, "{}", edited.text);
    assert_eq!(edited.body["submission_text"], "See final");
    assert_eq!(edited.body["file"]["original_filename"], "final.txt");
    assert_eq!(app.stored_file_count("assignment_submissions"), 1);

    app.post_with_session(
        &routes::submission_grade(submission_id),
        &json!({"score": 90.0}),
        &c.tutor.token,
    )
    .await;

    let res = app
        .put_form(
            &routes::submission(submission_id),
            text_form(&[("submission_text", "After grading")]),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 409);
}

#[tokio::test]
async fn submission_can_be_edited_only_once() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let submission_id = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "draft")]),
            &c.student.token,
        )
        .await
        .id();

    let first = app
        .put_form(
            &routes::submission(submission_id),
            text_form(&[("submission_text", "revised")]),
            &c.student.token,
        )
        .await;
    assert_eq!(first.status, 200, "{}", first.text);
    assert!(first.body["edited_at"].is_string());

    let second = app
        .put_form(
            &routes::submission(submission_id),
            file_form("again.txt", b"one more try"),
            &c.student.token,
        )
        .await;
    assert_eq!(second.status, 409, "{}", second.text);
    assert_eq!(second.body["code"], "CONFLICT");
    assert_eq!(app.stored_file_count("assignment_submissions"), 0);

    let mine = app
        .get_with_session(&routes::my_submission(id), &c.student.token)
        .await;
    assert_eq!(mine.body["submission_text"], "revised");
    assert!(mine.body["file"].is_null());
}

#[tokio::test]
async fn submissions_are_private_to_owner_and_managers() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    app.enroll(&c.admin, c.program_id, other.id).await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let submission_id = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "mine")]),
            &c.student.token,
        )
        .await
        .id();

    let res = app
        .get_with_session(&routes::submission(submission_id), &other.token)
        .await;
    assert_eq!(res.status, 403);

    let res = app
        .get_with_session(&routes::submission(submission_id), &c.tutor.token)
        .await;
    assert_eq!(res.status, 200);

    let list = app
        .get_with_session(&routes::assignment_submissions(id), &c.tutor.token)
        .await;
    assert_eq!(list.status, 200);
    assert_eq!(list.body["data"].as_array().unwrap().len(), 1);

    let res = app
        .get_with_session(&routes::assignment_submissions(id), &c.student.token)
        .await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn admins_cannot_grade() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let submission_id = app
        .post_form(
            &routes::assignment_submissions(id),
            text_form(&[("submission_text", "work")]),
            &c.student.token,
        )
        .await
        .id();

    let res = app
        .post_with_session(
            &routes::submission_grade(submission_id),
            &json!({"score": 50.0}),
            &c.admin.token,
        )
        .await;
    assert_eq!(res.status, 403);
}
