use assert_matches::assert_matches;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::AccessScope;
use consultation_cell::{ConsultationError, ConsultationStatus};
use diagnosis_cell::models::UpdateDiagnosisRequest;
use diagnosis_cell::{DiagnosisError, DiagnosisService, ImageView};
use shared_models::auth::Role;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use shared_utils::upload::FileUpload;

fn clinician(dentist_id: i64) -> AccessScope {
    AccessScope {
        email: "mara@example.com".to_string(),
        role: Role::Secretary,
        dentist_id: Some(dentist_id),
        patient_id: None,
    }
}

fn patient(patient_id: i64) -> AccessScope {
    AccessScope {
        email: "ana@example.com".to_string(),
        role: Role::Patient,
        dentist_id: None,
        patient_id: Some(patient_id),
    }
}

async fn mock_consultation(server: &MockServer, id: i64, status: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::consultation_row(id, 3, 7, "2025-06-10", status)
        ])))
        .mount(server)
        .await;
}

async fn mock_diagnosis(server: &MockServer, row: Value) {
    let id = row["id"].as_i64().unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/v1/Diagnosis"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn diagnoses_come_newest_first_with_resolved_images() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 42, "partially complete").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Diagnosis"))
        .and(query_param("ConsultationId", "eq.42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::diagnosis_row(5, 42, None),
            MockSupabaseResponses::diagnosis_row(6, 42, Some("2025-06-10T08:00:00+00:00")),
            MockSupabaseResponses::diagnosis_row(9, 42, Some("2025-06-10T08:00:00+00:00")),
            MockSupabaseResponses::diagnosis_row(7, 42, Some("2025-06-11T08:00:00+00:00"))
        ])))
        .mount(&server)
        .await;

    let views = DiagnosisService::new(&config)
        .list_diagnoses(42, &clinician(7), "token")
        .await
        .unwrap();

    let ids: Vec<i64> = views.iter().map(|v| v.diagnosis.id).collect();
    assert_eq!(ids, vec![7, 9, 6, 5]);
    assert_eq!(
        views[0].full_image_url,
        format!("{}/storage/v1/object/public/diagnosis-images/7.jpg", server.uri())
    );
    assert_eq!(views[0].confidence_display.as_deref(), Some("87.34%"));
}

#[tokio::test]
async fn clinicians_cannot_open_diagnoses_before_the_visit() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 43, "approved").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Diagnosis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = DiagnosisService::new(&config)
        .list_diagnoses(43, &clinician(7), "token")
        .await;

    assert_matches!(result, Err(DiagnosisError::NotViewable(ConsultationStatus::Approved)));
}

#[tokio::test]
async fn patients_read_only_their_completed_consultations() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 44, "follow-up").await;
    mock_consultation(&server, 45, "complete").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Diagnosis"))
        .and(query_param("ConsultationId", "eq.45"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::diagnosis_row(11, 45, Some("2025-06-10T08:00:00Z"))
        ])))
        .mount(&server)
        .await;

    let service = DiagnosisService::new(&config);

    assert_matches!(
        service.list_diagnoses(44, &patient(3), "token").await,
        Err(DiagnosisError::NotViewable(ConsultationStatus::FollowUp))
    );
    assert_eq!(service.list_diagnoses(45, &patient(3), "token").await.unwrap().len(), 1);
    assert_matches!(
        service.list_diagnoses(45, &patient(4), "token").await,
        Err(DiagnosisError::Consultation(ConsultationError::OutOfScope(45)))
    );
}

#[tokio::test]
async fn consultation_without_diagnoses_lists_empty() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 46, "complete").await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/Diagnosis"))
        .and(query_param("ConsultationId", "eq.46"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let views = DiagnosisService::new(&config)
        .list_diagnoses(46, &patient(3), "token")
        .await
        .unwrap();

    assert!(views.is_empty());
}

#[tokio::test]
async fn update_writes_only_the_final_fields() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_diagnosis(&server, MockSupabaseResponses::diagnosis_row(9, 42, None)).await;
    mock_consultation(&server, 42, "complete").await;

    let mut updated = MockSupabaseResponses::diagnosis_row(9, 42, None);
    updated["FinalDiagnosis"] = json!("Deep caries");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Diagnosis"))
        .and(query_param("id", "eq.9"))
        .and(body_json(json!({
            "FinalDiagnosis": "Deep caries",
            "FinalDiagnosisDesc": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&server)
        .await;

    let view = DiagnosisService::new(&config)
        .update_diagnosis(
            9,
            UpdateDiagnosisRequest {
                final_diagnosis: Some(" Deep caries ".to_string()),
                final_diagnosis_desc: Some("   ".to_string()),
            },
            &clinician(7),
            "token",
        )
        .await
        .unwrap();

    assert_eq!(view.diagnosis.final_diagnosis.as_deref(), Some("Deep caries"));
    assert_eq!(view.diagnosis.initial_diagnosis.as_deref(), Some("Dental caries"));
}

#[tokio::test]
async fn image_probe_reports_success_and_falls_back_on_failure() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 42, "complete").await;
    mock_diagnosis(&server, MockSupabaseResponses::diagnosis_row(9, 42, None)).await;
    mock_diagnosis(&server, MockSupabaseResponses::diagnosis_row(10, 42, None)).await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/object/public/diagnosis-images/9.jpg"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/object/public/diagnosis-images/10.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = DiagnosisService::new(&config);

    let found = service.probe_image(9, &clinician(7), "token").await.unwrap();
    assert_matches!(found, ImageView::Available { content_type: Some(ct), .. } if ct == "image/jpeg");

    let missing_url = format!("{}/storage/v1/object/public/diagnosis-images/10.jpg", server.uri());
    let missing = service.probe_image(10, &clinician(7), "token").await.unwrap();
    assert_eq!(missing, ImageView::unavailable(&missing_url));
    assert_matches!(missing, ImageView::Unavailable { message, .. } if message == format!("Unable to load image. URL: {}", missing_url));
}

#[tokio::test]
async fn unreachable_image_host_is_not_an_error() {
    let config = TestConfig::default().to_app_config();

    let view = DiagnosisService::new(&config)
        .probe_url("http://127.0.0.1:9/diagnosis.jpg")
        .await;

    assert_eq!(view, ImageView::unavailable("http://127.0.0.1:9/diagnosis.jpg"));
}

#[tokio::test]
async fn uploaded_image_lands_under_the_consultation() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();

    mock_consultation(&server, 42, "partially complete").await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/diagnosis-images/42/[0-9a-f-]+\.jpg$"))
        .and(header("content-type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "diagnosis-images/42/x.jpg" })))
        .expect(1)
        .mount(&server)
        .await;

    let image = DiagnosisService::new(&config)
        .upload_image(
            42,
            FileUpload {
                file_data: "data:image/jpeg;base64,aGVsbG8=".to_string(),
                content_type: None,
            },
            &clinician(7),
            "token",
        )
        .await
        .unwrap();

    assert!(image.image_path.starts_with("diagnosis-images/42/"));
    assert!(image
        .image_url
        .starts_with(&format!("{}/storage/v1/object/public/diagnosis-images/42/", server.uri())));
}
