use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::{appointment_routes, public_routes};
use shared_utils::test_utils::{JwtTestUtils, MockRestResponses, TestConfig, TestUser};

const CODE: &str = "AB12CD";

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn authenticate(mock_server: &MockServer, config: &TestConfig, user: &TestUser) -> String {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockRestResponses::user_row(user)])))
        .mount(mock_server)
        .await;

    format!("Bearer {}", JwtTestUtils::create_test_token(user, &config.jwt_secret, None))
}

fn authed(method: &str, uri: &str, bearer: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", bearer);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// A provider reachable by `CODE`, owned by `owner`.
async fn mount_provider(mock_server: &MockServer, provider_id: Uuid, owner: &TestUser) {
    let row = MockRestResponses::provider_row(provider_id, owner.id, CODE);

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("code", format!("eq.{}", CODE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("user_id", format!("eq.{}", owner.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(mock_server)
        .await;
}

async fn mount_not_a_provider(mock_server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

async fn mount_service(mock_server: &MockServer, service_id: Uuid, provider_id: Uuid, minutes: i32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("id", format!("eq.{}", service_id)))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRestResponses::service_row(service_id, provider_id, "Haircut", minutes, 1500)
        ])))
        .mount(mock_server)
        .await;
}

/// Slot check filtered on `service_filter` (`eq.<id>` or `is.null`).
async fn mount_slot(mock_server: &MockServer, service_filter: &str, holder: Option<Uuid>, times: Option<u64>) {
    let rows = holder.map(|id| json!([{ "id": id }])).unwrap_or_else(|| json!([]));
    let mock = Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("service_id", service_filter))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows));

    match times {
        Some(n) => mock.up_to_n_times(n).mount(mock_server).await,
        None => mock.mount(mock_server).await,
    }
}

async fn mount_client_bookings(mock_server: &MockServer, client: &TestUser, holder: Option<Uuid>) {
    let rows = holder.map(|id| json!([{ "id": id }])).unwrap_or_else(|| json!([]));
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("client_id", format!("eq.{}", client.id)))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mount_appointment(mock_server: &MockServer, row: Option<Value>, appointment_id: Uuid) {
    let rows = row.map(|r| json!([r])).unwrap_or_else(|| json!([]));
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

fn parse(value: &Value) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value.as_str().unwrap(), "%Y-%m-%dT%H:%M:%S").unwrap()
}

#[tokio::test]
async fn test_book_by_code_then_collide_then_book_without_service() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let first = TestUser::client("ana");
    let second = TestUser::client("bruno");
    let provider_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();
    let booked_id = Uuid::new_v4();

    let first_bearer = authenticate(&mock_server, &config, &first).await;
    let second_bearer = authenticate(&mock_server, &config, &second).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    mount_service(&mock_server, service_id, provider_id, 30).await;

    let service_filter = format!("eq.{}", service_id);
    mount_slot(&mock_server, &service_filter, None, Some(1)).await;
    mount_slot(&mock_server, &service_filter, Some(booked_id), None).await;
    mount_slot(&mock_server, "is.null", None, None).await;
    mount_client_bookings(&mock_server, &first, None).await;
    mount_client_bookings(&mock_server, &second, None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "provider_id": provider_id,
            "service_id": service_id,
            "client_id": first.id,
            "start_at": "2024-06-03T09:00:00",
            "end_at": "2024-06-03T09:30:00",
            "status": "confirmed",
            "applied_price": 1500,
            "client_name": "ana"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockRestResponses::appointment_row(
            booked_id,
            provider_id,
            Some(service_id),
            Some(first.id),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "service_id": null, "client_id": second.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockRestResponses::appointment_row(
            Uuid::new_v4(),
            provider_id,
            None,
            Some(second.id),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = appointment_routes(config.to_arc());
    let booking = json!({
        "provider_code": "ab12cd",
        "service_id": service_id,
        "start": "2024-06-03T09:00"
    });

    let response = app
        .clone()
        .oneshot(authed("POST", "/", &first_bearer, Some(booking.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["end_at"], "2024-06-03T09:30:00");
    assert_eq!(body["status"], "confirmed");

    let response = app
        .clone()
        .oneshot(authed("POST", "/", &first_bearer, Some(booking)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "That time slot is already booked");

    let response = app
        .oneshot(authed(
            "POST",
            "/",
            &second_bearer,
            Some(json!({ "provider_code": CODE, "service_id": "", "start": "2024-06-03T09:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_client_cannot_double_book_the_same_start() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    mount_slot(&mock_server, "is.null", None, None).await;
    mount_client_bookings(&mock_server, &client, Some(Uuid::new_v4())).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "POST",
            "/",
            &bearer,
            Some(json!({ "provider_id": provider_id, "start_at": "2024-06-03T09:00:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "You already have an appointment at that time");
}

#[tokio::test]
async fn test_create_requires_provider_and_start() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let client = TestUser::client("ana");
    let bearer = authenticate(&mock_server, &config, &client).await;
    let app = appointment_routes(config.to_arc());

    let response = app
        .clone()
        .oneshot(authed("POST", "/", &bearer, Some(json!({ "start": "2024-06-03T09:00" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .and(query_param("code", "eq.ZZZZZZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app
        .oneshot(authed(
            "POST",
            "/",
            &bearer,
            Some(json!({ "provider_code": "zzzzzz", "start": "2024-06-03T09:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "POST",
            "/",
            &bearer,
            Some(json!({ "provider_id": provider_id, "service_id": Uuid::new_v4(), "start": "2024-06-03T09:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reschedule_recomputes_end_from_service_duration() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_service(&mock_server, service_id, provider_id, 45).await;
    mount_appointment(
        &mock_server,
        Some(MockRestResponses::appointment_row(
            appointment_id,
            provider_id,
            Some(service_id),
            Some(client.id),
            "2024-06-03T09:00:00",
            "2024-06-03T09:45:00",
        )),
        appointment_id,
    )
    .await;
    mount_slot(&mock_server, &format!("eq.{}", service_id), None, None).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(json!({
            "start_at": "2024-06-03T11:00:00",
            "end_at": "2024-06-03T11:45:00",
            "service_id": service_id
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockRestResponses::appointment_row(
            appointment_id,
            provider_id,
            Some(service_id),
            Some(client.id),
            "2024-06-03T11:00:00",
            "2024-06-03T11:45:00",
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "PATCH",
            &format!("/{}", appointment_id),
            &bearer,
            Some(json!({ "start": "2024-06-03T11:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let length = parse(&body["end_at"]) - parse(&body["start_at"]);
    assert_eq!(length.num_minutes(), 45);
}

#[tokio::test]
async fn test_reschedule_into_taken_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &owner).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    mount_appointment(
        &mock_server,
        Some(MockRestResponses::appointment_row(
            appointment_id,
            provider_id,
            None,
            Some(Uuid::new_v4()),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )),
        appointment_id,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("service_id", "is.null"))
        .and(query_param("start_at", "eq.2024-06-03T10:00:00"))
        .and(query_param("id", format!("neq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "PATCH",
            &format!("/{}", appointment_id),
            &bearer,
            Some(json!({ "start_at": "2024-06-03T10:00:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_strangers_cannot_touch_appointments() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let stranger = TestUser::client("mallory");
    let appointment_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &stranger).await;
    mount_not_a_provider(&mock_server, &stranger).await;
    mount_appointment(
        &mock_server,
        Some(MockRestResponses::appointment_row(
            appointment_id,
            Uuid::new_v4(),
            None,
            Some(Uuid::new_v4()),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )),
        appointment_id,
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = appointment_routes(config.to_arc());
    let uri = format!("/{}", appointment_id);

    let response = app
        .clone()
        .oneshot(authed("GET", &uri, &bearer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed("PATCH", &uri, &bearer, Some(json!({ "status": "cancelled" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(authed("DELETE", &uri, &bearer, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_by_owner_and_of_missing_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let missing_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &owner).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    mount_appointment(
        &mock_server,
        Some(MockRestResponses::appointment_row(
            appointment_id,
            provider_id,
            None,
            Some(Uuid::new_v4()),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )),
        appointment_id,
    )
    .await;
    mount_appointment(&mock_server, None, missing_id).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = appointment_routes(config.to_arc());

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/{}", appointment_id), &bearer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(authed("DELETE", &format!("/{}", missing_id), &bearer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_owner_calendar_is_range_filtered() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let provider_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &owner).await;
    mount_provider(&mock_server, provider_id, &owner).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("start_at", "gte.2024-06-01T00:00:00"))
        .and(query_param("start_at", "lte.2024-06-30T00:00:00"))
        .and(query_param("order", "start_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockRestResponses::appointment_row(
            Uuid::new_v4(),
            provider_id,
            None,
            None,
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = appointment_routes(config.to_arc());

    let response = app
        .clone()
        .oneshot(authed("GET", "/owner?from=2024-06-01&to=2024-06-30", &bearer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(authed("GET", "/owner?from=soon", &bearer, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_public_agenda_hides_client_details_and_cancelled_slots() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let provider_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();

    mount_provider(&mock_server, provider_id, &owner).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("active", "is.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRestResponses::service_row(service_id, provider_id, "Haircut", 30, 1500)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_blocks"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRestResponses::availability_row(Uuid::new_v4(), provider_id, 1, "09:00:00", "13:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let mut booked = MockRestResponses::appointment_row(
        Uuid::new_v4(),
        provider_id,
        Some(service_id),
        Some(Uuid::new_v4()),
        "2024-06-03T09:00:00",
        "2024-06-03T09:30:00",
    );
    booked["client_name"] = json!("ana");
    booked["client_contact"] = json!("ana@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("status", "neq.cancelled"))
        .and(query_param("order", "start_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([booked])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = public_routes(config.to_arc())
        .oneshot(Request::builder().uri("/ab12cd").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["provider"]["code"], CODE);
    assert_eq!(body["services"][0]["name"], "Haircut");
    assert_eq!(body["availability"][0]["start_time"], "09:00");

    let slot = &body["appointments"][0];
    assert_eq!(slot["start_at"], "2024-06-03T09:00:00");
    assert!(slot.get("client_name").is_none());
    assert!(slot.get("client_contact").is_none());
}

#[tokio::test]
async fn test_unknown_code_agenda_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = public_routes(config.to_arc())
        .oneshot(Request::builder().uri("/NOPE99").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = appointment_routes(config.to_arc())
        .oneshot(Request::builder().uri("/by-code/NOPE99").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn unique_violation() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(json!({
        "code": "23505",
        "message": "duplicate key value violates unique constraint \"appointments_slot_key\""
    }))
}

#[tokio::test]
async fn test_insert_losing_the_slot_race_is_a_conflict() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_provider(&mock_server, provider_id, &owner).await;
    mount_slot(&mock_server, "is.null", None, None).await;
    mount_client_bookings(&mock_server, &client, None).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(unique_violation())
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "POST",
            "/",
            &bearer,
            Some(json!({ "provider_code": CODE, "start": "2024-06-03T09:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "That time slot is already booked");
}

#[tokio::test]
async fn test_reschedule_losing_the_slot_race_is_a_conflict() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_appointment(
        &mock_server,
        Some(MockRestResponses::appointment_row(
            appointment_id,
            provider_id,
            None,
            Some(client.id),
            "2024-06-03T09:00:00",
            "2024-06-03T09:30:00",
        )),
        appointment_id,
    )
    .await;
    mount_slot(&mock_server, "is.null", None, None).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(unique_violation())
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "PATCH",
            &format!("/{}", appointment_id),
            &bearer,
            Some(json!({ "start": "2024-06-03T10:00" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "That time slot is already booked");
}

#[tokio::test]
async fn test_start_at_the_end_of_the_calendar_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_rest_url(&mock_server.uri());
    let owner = TestUser::provider("barber");
    let client = TestUser::client("ana");
    let provider_id = Uuid::new_v4();

    let bearer = authenticate(&mock_server, &config, &client).await;
    mount_provider(&mock_server, provider_id, &owner).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let last_minute = NaiveDate::MAX
        .and_hms_opt(23, 59, 0)
        .unwrap()
        .format("%Y-%m-%dT%H:%M")
        .to_string();

    let response = appointment_routes(config.to_arc())
        .oneshot(authed(
            "POST",
            "/",
            &bearer,
            Some(json!({ "provider_id": provider_id, "start": last_minute })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
