use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

#[tokio::test]
async fn login_sets_cookie_and_me_returns_account() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let res = app.get_with_session(routes::ME, &admin.token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["username"], "admin");
    assert_eq!(res.body["role"], "admin");
    assert_eq!(res.body["id"], admin.id);
}

#[tokio::test]
async fn login_body_carries_user_and_expiry() {
    let app = TestApp::spawn().await;
    app.admin().await;

    let res = app
        .post_without_session(
            routes::LOGIN,
            &json!({"username": "admin", "password": PASSWORD}),
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["user"]["username"], "admin");
    assert!(res.body["expires_at"].is_string());
    assert!(!res.body.to_string().contains(PASSWORD));
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::spawn().await;
    app.admin().await;

    let wrong = app
        .post_without_session(
            routes::LOGIN,
            &json!({"username": "admin", "password": "not-the-password"}),
        )
        .await;
    let unknown = app
        .post_without_session(
            routes::LOGIN,
            &json!({"username": "nobody", "password": PASSWORD}),
        )
        .await;

    assert_eq!(wrong.status, 401);
    assert_eq!(unknown.status, 401);
    assert_eq!(wrong.body["code"], "INVALID_CREDENTIALS");
    assert_eq!(wrong.body, unknown.body);
}

#[tokio::test]
async fn missing_and_unknown_sessions_are_distinguished() {
    let app = TestApp::spawn().await;

    let missing = app.get_without_session(routes::ME).await;
    assert_eq!(missing.status, 401);
    assert_eq!(missing.body["code"], "SESSION_MISSING");

    let bogus = app.get_with_session(routes::ME, "deadbeef").await;
    assert_eq!(bogus.status, 401);
    assert_eq!(bogus.body["code"], "SESSION_INVALID");
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let res = app
        .post_with_session(routes::LOGOUT, &json!({}), &admin.token)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.session_cookie().as_deref(), Some(""));

    let after = app.get_with_session(routes::ME, &admin.token).await;
    assert_eq!(after.status, 401);
    assert_eq!(after.body["code"], "SESSION_INVALID");
}

#[tokio::test]
async fn logout_without_session_is_harmless() {
    let app = TestApp::spawn().await;
    let res = app.post_without_session(routes::LOGOUT, &json!({})).await;
    assert_eq!(res.status, 200);
}

#[tokio::test]
async fn deactivated_user_loses_access() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let student = app.create_user(&admin, "student_cy", "student").await;

    let res = app
        .patch_with_session(
            &routes::user_status(student.id),
            &json!({"status": "inactive"}),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let me = app.get_with_session(routes::ME, &student.token).await;
    assert_eq!(me.status, 401);

    let login = app
        .post_without_session(
            routes::LOGIN,
            &json!({"username": "student_cy", "password": PASSWORD}),
        )
        .await;
    assert_eq!(login.status, 401);
}

#[tokio::test]
async fn only_admins_create_users() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let tutor = app.create_user(&admin, "tutor_dee", "tutor").await;

    let res = app
        .post_with_session(
            routes::USERS,
            &json!({
                "username": "sneaky",
                "password": PASSWORD,
                "full_name": "Sneaky",
                "role": "admin",
            }),
            &tutor.token,
        )
        .await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body["code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    app.create_user(&admin, "student_eve", "student").await;

    let res = app
        .post_with_session(
            routes::USERS,
            &json!({
                "username": "student_eve",
                "password": PASSWORD,
                "full_name": "Eve Again",
                "role": "student",
            }),
            &admin.token,
        )
        .await;
    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "USERNAME_TAKEN");
}

#[tokio::test]
async fn profile_is_upserted_for_the_caller() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let student = app.create_user(&admin, "student_fay", "student").await;

    let res = app
        .put_with_session(
            routes::MY_PROFILE,
            &json!({"phone": "+63 912 345 6789", "bio": "Likes fractions"}),
            &student.token,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let res = app.get_with_session(routes::MY_PROFILE, &student.token).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["user_id"], student.id);
    assert_eq!(res.body["bio"], "Likes fractions");
}
