//! Registration and session API tests

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{App, test};
use serde_json::json;

use crate::model::Model;
use crate::model::auth::{SESSION_COOKIE, SessionToken};
use crate::model::users::Role;
use crate::service;
use crate::service::tests::{GraphQLResp, api_request, create_user, gql};

const REGISTER: &str = r#"mutation($input: SignUpInput!) {
    register(signUpInput: $input) { id email firstName lastName role favoriteActivityIds }
}"#;

const LOGIN: &str = r#"mutation($email: String!, $password: String!) {
    login(signInInput: { email: $email, password: $password }) {
        accessToken
        user { email }
    }
}"#;

const ME: &str = "query { getMe { email role } }";

#[actix_web::test]
async fn register_login_and_logout() {
    let model = Model::test().await.unwrap();
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let query = gql(
        REGISTER,
        json!({ "input": {
            "email": "user1@test.fr",
            "password": "Password1",
            "firstName": "John",
            "lastName": "Doe",
        }}),
    );
    let resp: GraphQLResp =
        test::call_and_read_body_json(&app, api_request(query, None).to_request()).await;

    assert_eq!(resp.errors, None);
    assert_eq!(resp.data::<String>("register.email").unwrap(), "user1@test.fr");
    assert_eq!(resp.data::<String>("register.role").unwrap(), "USER");
    assert_eq!(
        resp.data::<Vec<String>>("register.favoriteActivityIds").unwrap(),
        Vec::<String>::new()
    );

    let query = gql(
        LOGIN,
        json!({ "email": "user1@test.fr", "password": "Password1" }),
    );
    let resp = test::call_service(&app, api_request(query, None).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .unwrap()
        .into_owned();
    assert_eq!(cookie.http_only(), Some(true));

    let resp: GraphQLResp = test::read_body_json(resp).await;
    assert_eq!(resp.errors, None);
    assert_eq!(resp.data::<String>("login.user.email").unwrap(), "user1@test.fr");
    let token = SessionToken::new(resp.data::<String>("login.accessToken").unwrap());
    assert_eq!(cookie.value(), token.to_string());

    let resp: GraphQLResp = test::call_and_read_body_json(
        &app,
        api_request(gql(ME, json!({})), Some(&token)).to_request(),
    )
    .await;
    assert_eq!(resp.errors, None);
    assert_eq!(resp.data::<String>("getMe.email").unwrap(), "user1@test.fr");

    let resp = test::call_service(
        &app,
        api_request(gql("mutation { logout }", json!({})), Some(&token)).to_request(),
    )
    .await;
    let removal = resp
        .response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .unwrap()
        .into_owned();
    assert_eq!(removal.value(), "");

    let resp: GraphQLResp = test::read_body_json(resp).await;
    assert_eq!(resp.errors, None);
    assert!(resp.data::<bool>("logout").unwrap());

    // Token of the closed session is not accepted anymore
    let status = match test::try_call_service(
        &app,
        api_request(gql(ME, json!({})), Some(&token)).to_request(),
    )
    .await
    {
        Ok(resp) => resp.status(),
        Err(err) => err.error_response().status(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn invalid_credentials() {
    let model = Model::test().await.unwrap();
    create_user(&model, "user1@test.fr", Role::User).await;
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    for (email, password) in [
        ("user1@test.fr", "password1"),
        ("nobody@test.fr", "Password1"),
    ] {
        let query = gql(LOGIN, json!({ "email": email, "password": password }));
        let resp: GraphQLResp =
            test::call_and_read_body_json(&app, api_request(query, None).to_request()).await;

        assert_eq!(resp.error_code(), Some("UNAUTHENTICATED"));
        assert_eq!(resp.error_message(), Some("Invalid credentials"));
    }
}

#[actix_web::test]
async fn registration_input_is_validated() {
    let model = Model::test().await.unwrap();
    create_user(&model, "user1@test.fr", Role::User).await;
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let register = |email: &str, password: &str| {
        gql(
            REGISTER,
            json!({ "input": {
                "email": email,
                "password": password,
                "firstName": "John",
                "lastName": "Doe",
            }}),
        )
    };

    let resp: GraphQLResp = test::call_and_read_body_json(
        &app,
        api_request(register("user2@test.fr", "password1"), None).to_request(),
    )
    .await;
    assert_eq!(resp.error_code(), Some("BAD_USER_INPUT"));

    let resp: GraphQLResp = test::call_and_read_body_json(
        &app,
        api_request(register("user1@test.fr", "Password1"), None).to_request(),
    )
    .await;
    assert_eq!(resp.error_code(), Some("BAD_USER_INPUT"));
    assert_eq!(resp.error_message(), Some("Email already exists"));

    for (email, password) in [("not-an-email", "Password1"), ("user2@test.fr", "Pass1")] {
        let resp: GraphQLResp = test::call_and_read_body_json(
            &app,
            api_request(register(email, password), None).to_request(),
        )
        .await;
        assert!(resp.errors.is_some());
    }
}

#[actix_web::test]
async fn session_cookie_authentication() {
    let model = Model::test().await.unwrap();
    let (_, token) = create_user(&model, "admin@test.fr", Role::Admin).await;
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let resp: GraphQLResp = test::call_and_read_body_json(
        &app,
        api_request(gql(ME, json!({})), None)
            .cookie(Cookie::new(SESSION_COOKIE, token.to_string()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.errors, None);
    assert_eq!(resp.data::<String>("getMe.role").unwrap(), "ADMIN");

    // Broken cookie leaves the request anonymous
    let resp = test::call_service(
        &app,
        api_request(gql(ME, json!({})), None)
            .cookie(Cookie::new(SESSION_COOKIE, "garbage"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp: GraphQLResp = test::read_body_json(resp).await;
    assert_eq!(resp.error_code(), Some("UNAUTHENTICATED"));
}

#[actix_web::test]
async fn malformed_authorization_is_rejected() {
    let model = Model::test().await.unwrap();
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    for header in ["Bearer token", "Session garbage", "garbage"] {
        let status = match test::try_call_service(
            &app,
            api_request(gql(ME, json!({})), None)
                .insert_header(("Authorization", header))
                .to_request(),
        )
        .await
        {
            Ok(resp) => resp.status(),
            Err(err) => err.error_response().status(),
        };
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{header}");
    }
}

#[actix_web::test]
async fn fresh_session_is_not_refreshed() {
    let model = Model::test().await.unwrap();
    let (_, token) = create_user(&model, "user1@test.fr", Role::User).await;
    let service_config = service::configure(false, model).await.unwrap();
    let app = test::init_service(App::new().configure(service_config)).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/refresh")
            .insert_header(("Authorization", format!("Session {token}")))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-session-token").is_none());
}
