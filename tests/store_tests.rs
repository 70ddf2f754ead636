use std::sync::Arc;
use std::time::Duration;

use holistic_spaces::auth::{MemorySessionStore, Session};
use holistic_spaces::prelude::*;
use holistic_spaces::repository::{AdminGateway, CommunityGateway, EventGateway};
use holistic_spaces::services::{NotificationService, SpaceBoard};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in_store(server: &MockServer) -> SupabaseStore {
    let config = AppConfig::new(&server.uri(), "test_anon_key")
        .unwrap()
        .with_options(ClientOptions::default().with_persist_session(false));
    let backend = Backend::with_session_store(config, Arc::new(MemorySessionStore::default())).unwrap();
    backend
        .auth()
        .set_session(Session::new("member_token".into(), "member_refresh".into(), 3600, None));
    SupabaseStore::new(backend)
}

fn space_row(id: Uuid, holder_id: Uuid, capacity: i32) -> serde_json::Value {
    json!({
        "id": id,
        "holder_id": holder_id,
        "title": "Morning meditation",
        "start_time": "2030-05-01T08:00:00Z",
        "end_time": "2030-05-01T09:00:00Z",
        "capacity": capacity,
        "status": "open",
        "pricing_type": "donation"
    })
}

#[tokio::test]
async fn test_board_loads_spaces_with_attendance() {
    let mock_server = MockServer::start().await;
    let me = Uuid::new_v4();
    let space_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/spaces"))
        .and(query_param("order", "start_time.asc"))
        .and(header("authorization", "Bearer member_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([space_row(space_id, Uuid::new_v4(), 2)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/space_attendees"))
        .and(query_param("space_id", format!("in.({})", space_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "space_id": space_id, "user_id": me },
            { "space_id": space_id, "user_id": Uuid::new_v4() }
        ])))
        .mount(&mock_server)
        .await;

    let store = Arc::new(signed_in_store(&mock_server));
    let board = SpaceBoard::new(store.clone(), store, me, Duration::from_secs(3600));
    board.refresh().await.unwrap();

    let listing = board.listing(space_id).await.unwrap();
    assert_eq!(listing.attendee_count, 2);
    assert!(listing.is_member);
    assert!(listing.space.is_full_with(listing.attendee_count));
}

#[tokio::test]
async fn test_rejected_join_restores_listing() {
    let mock_server = MockServer::start().await;
    let me = Uuid::new_v4();
    let space_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/spaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([space_row(space_id, Uuid::new_v4(), 10)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/space_attendees"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/space_attendees"))
        .and(body_json(json!({ "space_id": space_id, "user_id": me })))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(signed_in_store(&mock_server));
    let board = SpaceBoard::new(store.clone(), store, me, Duration::from_secs(3600));
    board.refresh().await.unwrap();

    let err = board.join(space_id).await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    let listing = board.listing(space_id).await.unwrap();
    assert_eq!(listing.attendee_count, 0);
    assert!(!listing.is_member);
}

#[tokio::test]
async fn test_rpc_calls_use_backend_parameter_names() {
    let mock_server = MockServer::start().await;
    let event_id = Uuid::new_v4();
    let space_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/check_event_capacity"))
        .and(body_json(json!({ "p_event_id": event_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/admin_update_space_status"))
        .and(body_json(json!({ "p_space_id": space_id, "p_status": "completed" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = signed_in_store(&mock_server);
    assert!(!store.check_event_capacity(event_id).await.unwrap());
    store.update_space_status(space_id, SpaceStatus::Completed).await.unwrap();
}

#[tokio::test]
async fn test_open_requests_filter_by_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/community_requests"))
        .and(query_param("status", "eq.open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "requester_id": Uuid::new_v4(),
            "title": "Need a ride",
            "status": "open"
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = signed_in_store(&mock_server);
    let requests = store.list_requests(Some(RequestStatus::Open)).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, RequestStatus::Open);
}

#[tokio::test]
async fn test_unread_count_covers_whole_inbox() {
    let mock_server = MockServer::start().await;
    let me = Uuid::new_v4();

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", me)))
        .and(query_param("read", "eq.false"))
        .and(header("prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "0-49/60"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(signed_in_store(&mock_server));
    let notifications = NotificationService::new(store, me);
    assert_eq!(notifications.unread_count().await.unwrap(), 60);
}
