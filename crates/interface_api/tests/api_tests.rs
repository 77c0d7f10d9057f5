//! End-to-end tests of the HTTP API over in-memory ports

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use core_kernel::{Actor, CoreError, Permission, UserId};
use domain_people::MockPeoplePort;
use domain_programs::{MockEnrollmentPort, MockProgramPort, NewProgram, Program, ProgramType};
use domain_reimbursements::MockReimbursementPort;
use interface_api::{
    auth::create_token, config::ApiConfig, create_router, handlers::auth::PROXY_SECRET_HEADER, AppState, Ports,
};

const JWT_SECRET: &str = "test-jwt-secret";
const PROXY_SECRET: &str = "test-proxy-secret";
const ORCID: &str = "0000-0002-1825-0097";
const OTHER_ORCID: &str = "0000-0002-1694-233X";

struct TestApp {
    router: Router,
    open_program: Program,
    closed_program: Program,
}

fn program(code: i32, title: &str, deadline_days: i64, start_days: i64) -> Program {
    let today = Utc::now().date_naive();
    Program::create(NewProgram {
        code,
        title: title.to_string(),
        abbreviation: None,
        program_type: ProgramType::Workshop,
        organizers: vec![],
        location: Some("Pasadena".into()),
        application_deadline: Some(Utc::now() + Duration::days(deadline_days)),
        start_date: Some(today + Duration::days(start_days)),
        end_date: Some(today + Duration::days(start_days + 4)),
        description: None,
        online: false,
    })
    .unwrap()
}

async fn test_app() -> TestApp {
    let open_program = program(1042, "Arithmetic Statistics", 30, 60);
    let closed_program = program(1043, "Tropical Geometry", -1, 20);
    let programs = MockProgramPort::with_programs(vec![open_program.clone(), closed_program.clone()]).await;

    let ports = Ports {
        people: Arc::new(MockPeoplePort::new()),
        programs: Arc::new(programs),
        enrollments: Arc::new(MockEnrollmentPort::new()),
        reimbursements: Arc::new(MockReimbursementPort::new()),
    };
    let config = ApiConfig {
        jwt_secret: JWT_SECRET.into(),
        identity_proxy_secret: PROXY_SECRET.into(),
        ..ApiConfig::default()
    };
    let state = AppState::new(config, ports).unwrap();

    TestApp {
        router: create_router(state),
        open_program,
        closed_program,
    }
}

fn staff_token(permissions: impl IntoIterator<Item = Permission>) -> String {
    let actor = Actor::staff(UserId::new(), permissions);
    create_token(&actor, JWT_SECRET, 3600).unwrap()
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn sign_in(router: &Router, orcid: &str, email: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/orcid")
        .header(header::CONTENT_TYPE, "application/json")
        .header(PROXY_SECRET_HEADER, PROXY_SECRET)
        .body(Body::from(
            json!({
                "orcid_id": orcid,
                "email": email,
                "given_name": "Ada",
                "family_name": "Lovelace"
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["token"].as_str().unwrap().to_string()
}

/// Applies to the open program and has staff accept; returns the enrollment id
async fn accepted_enrollment(app: &TestApp, token: &str) -> String {
    let (status, enrollment) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/programs/{}/apply", app.open_program.code),
        Some(token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = enrollment["id"].as_str().unwrap().to_string();

    let manager = staff_token([Permission::ManagePrograms]);
    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/enrollments/{}/decision", id),
        Some(&manager),
        Some(json!({ "decision": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

// ============================================================================
// Health and sign-in
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app().await;
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app.router, Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["adapters"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_sign_in_requires_proxy_secret() {
    let app = test_app().await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/orcid",
        None,
        Some(json!({ "orcid_id": ORCID })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_sign_in_rejects_placeholder_secret() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/orcid")
        .header(header::CONTENT_TYPE, "application/json")
        .header(PROXY_SECRET_HEADER, "change-me-in-production")
        .body(Body::from(json!({ "orcid_id": ORCID, "email": "ada@example.org" }).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_unconfigured_secrets_refuse_to_start() {
    let ports = Ports {
        people: Arc::new(MockPeoplePort::new()),
        programs: Arc::new(MockProgramPort::new()),
        enrollments: Arc::new(MockEnrollmentPort::new()),
        reimbursements: Arc::new(MockReimbursementPort::new()),
    };
    let config = ApiConfig {
        jwt_secret: JWT_SECRET.into(),
        ..ApiConfig::default()
    };
    let err = AppState::new(config, ports).err().unwrap();
    assert_eq!(err, CoreError::insecure_secret("API_IDENTITY_PROXY_SECRET"));
}

#[tokio::test]
async fn test_sign_in_then_me() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;

    let (status, body) = send(&app.router, Method::GET, "/api/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["is_staff"], false);
    assert_eq!(body["person"]["orcid_id"], ORCID);
    assert_eq!(body["person"]["display_name"], "Ada Lovelace");

    // Signing in again reuses the account
    let again = sign_in(&app.router, ORCID, "ada@example.org").await;
    let (_, second) = send(&app.router, Method::GET, "/api/v1/me", Some(&again), None).await;
    assert_eq!(second["account"]["id"], body["account"]["id"]);
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = test_app().await;
    let (status, _) = send(&app.router, Method::GET, "/api/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, Method::GET, "/api/v1/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/api/v1/me/profile",
        Some(&token),
        Some(json!({ "institution": "University of London", "phone_number": "+44 20 7946 0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["institution"], "University of London");

    let (status, _) = send(
        &app.router,
        Method::PUT,
        "/api/v1/me/profile",
        Some(&token),
        Some(json!({ "email": "not-an-email" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Programs and enrollments
// ============================================================================

#[tokio::test]
async fn test_upcoming_is_public() {
    let app = test_app().await;
    let (status, body) = send(&app.router, Method::GET, "/api/v1/programs/upcoming", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_apply_and_dashboard() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;

    let (status, open) = send(&app.router, Method::GET, "/api/v1/programs/open", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open.as_array().unwrap().len(), 1);

    let apply_uri = format!("/api/v1/programs/{}/apply", app.open_program.code);
    let (status, _) = send(
        &app.router,
        Method::POST,
        &apply_uri,
        Some(&token),
        Some(json!({ "airport1": "LHR", "funding": "Own grant" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app.router, Method::POST, &apply_uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let closed_uri = format!("/api/v1/programs/{}/apply", app.closed_program.code);
    let (status, _) = send(&app.router, Method::POST, &closed_uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, dashboard) = send(&app.router, Method::GET, "/api/v1/me/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["pending_applications"].as_array().unwrap().len(), 1);
    assert!(dashboard["upcoming"].as_array().unwrap().is_empty());
    assert!(dashboard["open_programs"].as_array().unwrap().is_empty());
    assert!(dashboard["recent_reimbursements"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_enrollment_dates_are_validated() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;
    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/programs/{}/apply", app.open_program.code),
        Some(&token),
        Some(json!({ "check_in_date": "2030-06-05", "check_out_date": "2030-06-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"].as_array().is_some());
}

#[tokio::test]
async fn test_staff_decision_and_withdraw() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;

    // Participants cannot decide applications
    let (_, enrollment) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/programs/{}/apply", app.open_program.code),
        Some(&token),
        Some(json!({})),
    )
    .await;
    let id = enrollment["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/enrollments/{}/decision", id),
        Some(&token),
        Some(json!({ "decision": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let manager = staff_token([Permission::ManagePrograms]);
    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/enrollments/{}/decision", id),
        Some(&manager),
        Some(json!({ "decision": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        Method::GET,
        &format!("/api/v1/enrollments/{}", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["program"]["code"], app.open_program.code);

    // Someone else's enrollment is not visible
    let other = sign_in(&app.router, OTHER_ORCID, "emmy@example.org").await;
    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/api/v1/enrollments/{}", id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let withdraw_uri = format!("/api/v1/enrollments/{}/withdraw", id);
    let (status, body) = send(
        &app.router,
        Method::POST,
        &withdraw_uri,
        Some(&token),
        Some(json!({ "reason": "Visa delayed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["declined_reason"], "Withdrawn by participant: Visa delayed");

    let (status, _) = send(&app.router, Method::POST, &withdraw_uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============================================================================
// Invitations
// ============================================================================

#[tokio::test]
async fn test_invitation_flow() {
    let app = test_app().await;
    let manager = staff_token([Permission::ManagePrograms]);

    let (status, invitation) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/programs/{}/invitations", app.open_program.id.as_uuid()),
        Some(&manager),
        Some(json!({ "email": "ada@example.org" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = invitation["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, Method::GET, &format!("/api/v1/invitations/{}", token), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], false);
    assert_eq!(body["program"]["code"], app.open_program.code);

    // Accepting anonymously is refused
    let respond_uri = format!("/api/v1/invitations/{}/respond", token);
    let (status, _) = send(&app.router, Method::POST, &respond_uri, None, Some(json!({ "action": "accept" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let session = sign_in(&app.router, ORCID, "ada@example.org").await;
    let (_, dashboard) = send(&app.router, Method::GET, "/api/v1/me/dashboard", Some(&session), None).await;
    assert_eq!(dashboard["pending_invitations"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &respond_uri,
        Some(&session),
        Some(json!({ "action": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_enrolled"], false);
    assert!(body["enrollment"]["accepted_at"].is_string());

    let (status, _) = send(&app.router, Method::POST, &respond_uri, None, Some(json!({ "action": "decline" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_invitation() {
    let app = test_app().await;
    let (status, _) = send(&app.router, Method::GET, "/api/v1/invitations/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anonymous_decline() {
    let app = test_app().await;
    let manager = staff_token([Permission::ManagePrograms]);
    let (_, invitation) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/programs/{}/invitations", app.open_program.id.as_uuid()),
        Some(&manager),
        Some(json!({ "email": "guest@example.org" })),
    )
    .await;
    let token = invitation["token"].as_str().unwrap();

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/invitations/{}/respond", token),
        None,
        Some(json!({ "action": "decline" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invitation"]["status"], "declined");
    assert!(body["enrollment"].is_null());
}

// ============================================================================
// Reimbursements
// ============================================================================

fn ach_details(enrollment_id: Option<&str>) -> Value {
    json!({
        "enrollment_id": enrollment_id,
        "tax_status": "us_citizen",
        "payment_method": "ach",
        "bank_name": "First Bank",
        "bank_routing_number": "021000021",
        "bank_account_number": "000123456789",
        "bank_account_type": "checking"
    })
}

#[tokio::test]
async fn test_reimbursement_workflow() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;
    let enrollment_id = accepted_enrollment(&app, &token).await;

    let (status, request) = send(
        &app.router,
        Method::POST,
        "/api/v1/reimbursements",
        Some(&token),
        Some(ach_details(Some(&enrollment_id))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "draft");
    assert_eq!(request["program_id"], app.open_program.id.as_uuid().to_string());
    assert_eq!(request["payment"]["bank_account_number"], "****6789");
    let id = request["id"].as_str().unwrap().to_string();

    // Nothing to submit yet
    let submit_uri = format!("/api/v1/reimbursements/{}/submit", id);
    let (status, body) = send(
        &app.router,
        Method::POST,
        &submit_uri,
        Some(&token),
        Some(json!({ "signature": "Ada Lovelace", "confirm_accurate": true, "confirm_policy": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!body["details"].as_array().unwrap().is_empty());

    let (status, added) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/reimbursements/{}/expenses", id),
        Some(&token),
        Some(json!({
            "category": "airfare",
            "description": "LHR-LAX return",
            "date_incurred": NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            "amount": "640.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let item = added["line_item_id"].as_str().unwrap().to_string();

    let (status, receipt) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/reimbursements/{}/expenses/{}/receipts", id, item),
        Some(&token),
        Some(json!({ "storage_key": "receipts/boarding.pdf", "original_filename": "boarding.pdf", "file_size": 4096 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(receipt["receipt_id"].is_string());

    // Both confirmations are required
    let (status, body) = send(
        &app.router,
        Method::POST,
        &submit_uri,
        Some(&token),
        Some(json!({ "signature": "Ada Lovelace", "confirm_accurate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &submit_uri,
        Some(&token),
        Some(json!({ "signature": "Ada Lovelace", "confirm_accurate": true, "confirm_policy": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["is_editable"], false);

    // Review queue
    let reviewer = staff_token([Permission::ReviewReimbursements]);
    let (status, queue) = send(
        &app.router,
        Method::GET,
        "/api/v1/staff/reimbursements/pending-review",
        Some(&reviewer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let approve_uri = format!("/api/v1/staff/reimbursements/{}/approve", id);
    let (status, _) = send(&app.router, Method::POST, &approve_uri, Some(&reviewer), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approver = staff_token([Permission::ApproveReimbursements]);
    let (status, body) = send(
        &app.router,
        Method::POST,
        &approve_uri,
        Some(&approver),
        Some(json!({ "overrides": [{ "line_item_id": item, "amount_approved": "600.00" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let payer = staff_token([Permission::MarkReimbursementsPaid]);
    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/staff/reimbursements/{}/mark-paid", id),
        Some(&payer),
        Some(json!({ "payment_reference": "ACH-20250410" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["payment_reference"], "ACH-20250410");

    let (status, summary) = send(&app.router, Method::GET, "/api/v1/reimbursements/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["paid"], 1);
    assert_eq!(summary["total"], 1);

    let (status, program) = send(
        &app.router,
        Method::GET,
        &format!("/api/v1/staff/programs/{}/reimbursement-summary", app.open_program.id.as_uuid()),
        Some(&reviewer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(program["total_requests"], 1);

    // Paid requests cannot be cancelled
    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/reimbursements/{}/cancel", id),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reimbursement_needs_own_accepted_enrollment() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;

    // Pending application
    let (_, enrollment) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/programs/{}/apply", app.open_program.code),
        Some(&token),
        Some(json!({})),
    )
    .await;
    let pending_id = enrollment["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/reimbursements",
        Some(&token),
        Some(ach_details(Some(&pending_id))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Someone else's enrollment
    let other = sign_in(&app.router, OTHER_ORCID, "emmy@example.org").await;
    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/reimbursements",
        Some(&other),
        Some(ach_details(Some(&pending_id))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reimbursements_are_private() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;
    let (_, request) = send(
        &app.router,
        Method::POST,
        "/api/v1/reimbursements",
        Some(&token),
        Some(ach_details(None)),
    )
    .await;
    let id = request["id"].as_str().unwrap();

    let other = sign_in(&app.router, OTHER_ORCID, "emmy@example.org").await;
    let (status, _) = send(
        &app.router,
        Method::GET,
        &format!("/api/v1/reimbursements/{}", id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = send(&app.router, Method::GET, "/api/v1/reimbursements", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let (status, list) = send(&app.router, Method::GET, "/api/v1/reimbursements", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_draft() {
    let app = test_app().await;
    let token = sign_in(&app.router, ORCID, "ada@example.org").await;
    let (_, request) = send(
        &app.router,
        Method::POST,
        "/api/v1/reimbursements",
        Some(&token),
        Some(ach_details(None)),
    )
    .await;
    let id = request["id"].as_str().unwrap();

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/api/v1/reimbursements/{}/cancel", id),
        Some(&token),
        Some(json!({ "reason": "Trip called off" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "Trip called off");
}
