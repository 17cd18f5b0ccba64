use crate::common::{TestApp, file_form, routes};

/// Submit a file for an assignment and return the file id.
async fn submitted_file(app: &TestApp, token: &str, material_id: i32, tutor: &str) -> i32 {
    let assignment_id = app.create_assignment(tutor, material_id, None).await;
    let res = app
        .post_form(
            &routes::assignment_submissions(assignment_id),
            file_form("notes.txt", b"hello tutor"),
            token,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    res.body["file"]["id"].as_i64().unwrap() as i32
}

#[tokio::test]
async fn owner_and_tutor_can_download() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let file_id = submitted_file(&app, &c.student.token, c.material_id, &c.tutor.token).await;

    let res = app.get_with_session(&routes::file(file_id), &c.student.token).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text, "hello tutor");
    assert!(res.header("content-type").unwrap().starts_with("text/plain"));
    assert!(res.header("content-disposition").unwrap().starts_with("inline"));
    assert!(res.header("etag").is_some());

    let res = app
        .get_with_session(
            &format!("{}?disposition=attachment", routes::file(file_id)),
            &c.tutor.token,
        )
        .await;
    assert_eq!(res.status, 200);
    assert!(
        res.header("content-disposition")
            .unwrap()
            .starts_with("attachment")
    );
}

#[tokio::test]
async fn etag_match_returns_not_modified() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let file_id = submitted_file(&app, &c.student.token, c.material_id, &c.tutor.token).await;

    let first = app.get_with_session(&routes::file(file_id), &c.student.token).await;
    let etag = first.header("etag").unwrap().to_string();

    let res = app
        .get_with_headers(
            &routes::file(file_id),
            &c.student.token,
            &[("if-none-match", etag.as_str())],
        )
        .await;
    assert_eq!(res.status, 304);
    assert!(res.text.is_empty());
}

#[tokio::test]
async fn strangers_cannot_download() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let other = app.create_user(&c.admin, "student_cy", "student").await;
    let other_tutor = app.create_user(&c.admin, "tutor_bo", "tutor").await;
    let file_id = submitted_file(&app, &c.student.token, c.material_id, &c.tutor.token).await;

    let res = app.get_with_session(&routes::file(file_id), &other.token).await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");

    let res = app
        .get_with_session(&routes::file(file_id), &other_tutor.token)
        .await;
    assert_eq!(res.status, 403);

    let res = app.get_without_session(&routes::file(file_id)).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let res = app.get_with_session(&routes::file(424242), &admin.token).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let assignment_id = app.create_assignment(&c.tutor.token, c.material_id, None).await;
    let big = vec![b'x'; (crate::common::MAX_UPLOAD + 1) as usize];

    let res = app
        .post_form(
            &routes::assignment_submissions(assignment_id),
            file_form("big.txt", &big),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 413);
    assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(app.stored_file_count("assignment_submissions"), 0);
    assert_eq!(app.stored_file_count(".tmp"), 0);

    let ok = app
        .post_form(
            &routes::assignment_submissions(assignment_id),
            file_form("small.txt", b"fits"),
            &c.student.token,
        )
        .await;
    assert_eq!(ok.status, 201, "{}", ok.text);
}

#[tokio::test]
async fn empty_upload_is_rejected_and_removed() {
    let app = TestApp::spawn().await;
    let c = app.classroom().await;
    let assignment_id = app.create_assignment(&c.tutor.token, c.material_id, None).await;

    let res = app
        .post_form(
            &routes::assignment_submissions(assignment_id),
            file_form("empty.txt", b""),
            &c.student.token,
        )
        .await;
    assert_eq!(res.status, 400, "{}", res.text);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert_eq!(app.stored_file_count("assignment_submissions"), 0);
    assert_eq!(app.stored_file_count(".tmp"), 0);
}
