use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{Request, StatusCode},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{any, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::AccessScope;
use consultation_cell::handlers::reject_consultation;
use consultation_cell::models::{ActionKind, ConsultationStatus, RejectRequest, TransitionError, WorkflowAction};
use consultation_cell::router::consultation_routes;
use consultation_cell::{ConsultationError, WorkflowPolicy, WorkflowService};
use shared_models::auth::Role;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn dentist_scope(dentist_id: i64) -> AccessScope {
    AccessScope {
        email: "dr.reyes@example.com".to_string(),
        role: Role::Dentist,
        dentist_id: Some(dentist_id),
        patient_id: None,
    }
}

fn patient_scope(patient_id: i64) -> AccessScope {
    AccessScope {
        email: "ana@example.com".to_string(),
        role: Role::Patient,
        dentist_id: None,
        patient_id: Some(patient_id),
    }
}

fn with_patient(mut row: Value) -> Value {
    row["Patient"] = json!({ "FirstName": "Ana", "LastName": "Santos" });
    row["Diagnosis"] = json!([]);
    row
}

async fn mock_consultation(server: &MockServer, row: Value) {
    let id = row["id"].as_i64().unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn rejecting_with_schedule_conflict_stores_reason_and_refetches() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(42, 3, 7, "2025-06-10", "pending"),
    )
    .await;

    let mut rejected = MockSupabaseResponses::consultation_row(42, 3, 7, "2025-06-10", "rejected");
    rejected["rejection_reason"] = json!("Schedule conflict");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", "eq.42"))
        .and(query_param("Status", "eq.pending"))
        .and(body_partial_json(json!({
            "Status": "rejected",
            "rejection_reason": "Schedule conflict",
            "followupdate": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([rejected.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("DentistId", "eq.7"))
        .and(query_param("order", "AppointmentDate.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_patient(rejected)])))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = WorkflowService::new(&config)
        .apply(
            42,
            WorkflowAction::Reject {
                reason: "Schedule conflict".to_string(),
            },
            &dentist_scope(7),
            "token",
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, Some(ConsultationStatus::Rejected));
    let written = outcome.consultation.unwrap();
    assert_eq!(written.rejection_reason.as_deref(), Some("Schedule conflict"));
    assert!(written.followupdate.is_none());
    assert_eq!(outcome.consultations.len(), 1);
    assert_eq!(outcome.consultations[0].patient_full_name(), "Ana Santos");
}

#[tokio::test]
async fn empty_rejection_reason_makes_no_remote_call() {
    let server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_supabase_url(&server.uri()).to_app_config());

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = reject_consultation(
        State(config),
        Path(42),
        TypedHeader(Authorization::bearer("token").unwrap()),
        Extension(TestUser::dentist("dr.reyes@example.com").to_user()),
        Json(RejectRequest {
            reason: "   ".to_string(),
        }),
    )
    .await;

    assert_matches!(
        result,
        Err(shared_models::error::AppError::ValidationError(msg)) if msg == "Please provide a reason for rejection."
    );
}

#[tokio::test]
async fn patients_cannot_cancel_a_follow_up() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(51, 3, 7, "2025-06-10", "follow-up"),
    )
    .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = WorkflowService::new(&config)
        .apply(51, WorkflowAction::Cancel { confirmed: true }, &patient_scope(3), "token")
        .await;

    assert_matches!(
        result,
        Err(ConsultationError::Transition(TransitionError::NotAllowed {
            action: ActionKind::Cancel,
            from: ConsultationStatus::FollowUp
        }))
    );
    assert!(!WorkflowPolicy::default()
        .available_actions(ConsultationStatus::FollowUp, Role::Patient)
        .contains(&ActionKind::Cancel));
}

#[tokio::test]
async fn cancelling_a_pending_booking_deletes_it() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    let pending = MockSupabaseResponses::consultation_row(52, 3, 7, "2025-06-10", "pending");
    mock_consultation(&server, pending.clone()).await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", "eq.52"))
        .and(query_param("Status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("PatientId", "eq.3"))
        .and(query_param("Status", "neq.complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = WorkflowService::new(&config)
        .apply(52, WorkflowAction::Cancel { confirmed: true }, &patient_scope(3), "token")
        .await
        .unwrap();

    assert_eq!(outcome.status, None);
    assert!(outcome.consultation.is_none());
    assert!(outcome.consultations.is_empty());
}

#[tokio::test]
async fn concurrent_change_surfaces_as_stale_status() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(60, 3, 7, "2025-06-10", "pending"),
    )
    .await;
    // Another clinician got there first: the guarded PATCH matches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Consultation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = WorkflowService::new(&config)
        .apply(60, WorkflowAction::Approve, &dentist_scope(7), "token")
        .await;

    assert_matches!(
        result,
        Err(ConsultationError::StaleStatus {
            id: 60,
            expected: ConsultationStatus::Pending
        })
    );
}

#[tokio::test]
async fn guarded_write_matches_the_status_casing_stored_in_the_row() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(42, 3, 7, "2025-06-10", "Pending"),
    )
    .await;
    let approved = MockSupabaseResponses::consultation_row(42, 3, 7, "2025-06-10", "approved");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", "eq.42"))
        .and(query_param("Status", "eq.Pending"))
        .and(body_partial_json(json!({ "Status": "approved" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([approved.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("DentistId", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_patient(approved)])))
        .mount(&server)
        .await;

    let outcome = WorkflowService::new(&config)
        .apply(42, WorkflowAction::Approve, &dentist_scope(7), "token")
        .await
        .unwrap();

    assert_eq!(outcome.status, Some(ConsultationStatus::Approved));
    assert_eq!(outcome.consultation.unwrap().stored_status, "approved");
}

#[tokio::test]
async fn other_dentists_consultations_are_out_of_scope() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(61, 3, 7, "2025-06-10", "pending"),
    )
    .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = WorkflowService::new(&config)
        .apply(61, WorkflowAction::Approve, &dentist_scope(8), "token")
        .await;

    assert_matches!(result, Err(ConsultationError::OutOfScope(61)));
}

#[tokio::test]
async fn completing_clears_the_follow_up_date() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    let mut follow_up = MockSupabaseResponses::consultation_row(70, 3, 7, "2025-06-10", "follow-up");
    follow_up["followupdate"] = json!("2025-07-01T10:00");
    mock_consultation(&server, follow_up).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("Status", "eq.follow-up"))
        .and(body_partial_json(json!({
            "Status": "complete",
            "followupdate": null,
            "rejection_reason": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::consultation_row(70, 3, 7, "2025-06-10", "complete")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("DentistId", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let outcome = WorkflowService::new(&config)
        .apply(70, WorkflowAction::SetComplete { confirmed: true }, &dentist_scope(7), "token")
        .await
        .unwrap();

    let written = outcome.consultation.unwrap();
    assert_eq!(written.status, ConsultationStatus::Complete);
    assert!(written.followupdate.is_none());
    assert!(written.rejection_reason.is_none());
}

#[tokio::test]
async fn approving_a_rejected_consultation_over_http_is_a_conflict() {
    let server = MockServer::start().await;
    let test_config = TestConfig::with_supabase_url(&server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_role_row("mara@example.com", "secretary")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Secretary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::secretary_row(7, "mara@example.com")
        ])))
        .mount(&server)
        .await;
    mock_consultation(
        &server,
        MockSupabaseResponses::consultation_row(80, 3, 7, "2025-06-10", "rejected"),
    )
    .await;

    let app = consultation_routes(test_config.to_arc());
    let token = JwtTestUtils::create_test_token(
        &TestUser::secretary("mara@example.com"),
        &test_config.jwt_secret,
        Some(1),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/80/approve")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Cannot approve"));
}
