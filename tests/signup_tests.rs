use std::sync::Arc;

use holistic_spaces::auth::MemorySessionStore;
use holistic_spaces::prelude::*;
use holistic_spaces::services::{SignupRequest, SignupService};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signup_service(server: &MockServer) -> SignupService {
    let config = AppConfig::new(&server.uri(), "test_anon_key")
        .unwrap()
        .with_options(ClientOptions::default().with_persist_session(false));
    let backend = Backend::with_session_store(config, Arc::new(MemorySessionStore::default())).unwrap();
    let store = Arc::new(SupabaseStore::new(backend.clone()));
    SignupService::new(backend.auth().clone(), store.clone(), store.clone(), store)
}

fn request(invite_code: &str) -> SignupRequest {
    SignupRequest {
        email: "new@example.com".to_string(),
        password: "password123".to_string(),
        full_name: "Ada Lovelace".to_string(),
        invite_code: invite_code.to_string(),
    }
}

#[tokio::test]
async fn test_signup_with_valid_invite_records_referral() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let referrer_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/validate_invite_code"))
        .and(body_json(json!({ "p_code": "AB12CD34" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invite_codes"))
        .and(query_param("code", "eq.AB12CD34"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "code": "AB12CD34",
            "created_by": referrer_id
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "new@example.com",
            "data": { "full_name": "Ada Lovelace", "invite_code": "AB12CD34" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new_user_token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "new_user_refresh",
            "user": { "id": user_id.to_string(), "email": "new@example.com" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("on_conflict", "id"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": user_id,
            "full_name": "Ada Lovelace",
            "email": "new@example.com"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/use_invite_code"))
        .and(body_json(json!({ "p_code": "AB12CD34", "p_user_id": user_id })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/referrals"))
        .and(body_json(json!({
            "referrer_id": referrer_id,
            "referred_id": user_id,
            "invite_code": "AB12CD34"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = signup_service(&mock_server)
        .sign_up(&request(" ab12-cd34 "))
        .await
        .unwrap();

    assert_eq!(outcome.user_id, user_id);
    assert_eq!(outcome.referred_by, Some(referrer_id));
    assert_eq!(outcome.session.unwrap().access_token, "new_user_token");
}

#[tokio::test]
async fn test_signup_with_invalid_invite_creates_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/validate_invite_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = signup_service(&mock_server)
        .sign_up(&request("nope-nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.to_string(), "Invalid or expired invite code");
}

#[tokio::test]
async fn test_signup_form_checked_before_any_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = signup_service(&mock_server);
    assert!(service.sign_up(&request("---")).await.is_err());

    let mut short_password = request("AB12CD34");
    short_password.password = "12345".to_string();
    let err = service.sign_up(&short_password).await.unwrap_err();
    assert_eq!(err.to_string(), "Password must be at least 6 characters");
}
