use assert_matches::assert_matches;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient, SupabaseError};

fn config(url: &str) -> AppConfig {
    AppConfig {
        supabase_url: url.to_string(),
        supabase_anon_key: "anon".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        storage_public_url: AppConfig::default_storage_public_url(url),
        clinic_utc_offset_minutes: 480,
        allow_follow_up_after_complete: true,
        consultations_per_page: 10,
        api_port: 3000,
    }
}

#[tokio::test]
async fn select_sends_keys_and_decoded_filters() {
    let server = MockServer::start().await;
    let client = SupabaseClient::new(&config(&server.uri()));

    Mock::given(method("GET"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("Status", "neq.partially complete"))
        .and(header("apikey", "anon"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .expect(1)
        .mount(&server)
        .await;

    let query = PostgrestQuery::table("Consultation")
        .select("id")
        .neq("Status", "partially complete");
    let rows: Vec<Value> = client.select(&query, "user-token").await.unwrap();

    assert_eq!(rows, vec![json!({ "id": 1 })]);
}

#[tokio::test]
async fn writes_ask_for_the_written_rows() {
    let server = MockServer::start().await;
    let client = SupabaseClient::new(&config(&server.uri()));

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/Consultation"))
        .and(query_param("id", "eq.42"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "Status": "approved" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 42, "Status": "approved" }])))
        .expect(1)
        .mount(&server)
        .await;

    let query = PostgrestQuery::table("Consultation").eq("id", 42);
    let rows: Vec<Value> = client
        .update(&query, json!({ "Status": "approved" }), "user-token")
        .await
        .unwrap();

    assert_eq!(rows[0]["Status"], "approved");
}

#[tokio::test]
async fn remote_errors_downcast_to_their_category() {
    let server = MockServer::start().await;
    let client = SupabaseClient::new(&config(&server.uri()));

    Mock::given(method("POST"))
        .and(path("/rest/v1/Patient"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let err = client
        .insert::<Value>("Patient", json!({ "Email": "ana@example.com" }), "user-token")
        .await
        .unwrap_err();

    assert_matches!(
        err.downcast_ref::<SupabaseError>(),
        Some(SupabaseError::Api { status: 409, .. })
    );
}

#[tokio::test]
async fn uploads_go_to_the_bucket_path() {
    let server = MockServer::start().await;
    let client = SupabaseClient::new(&config(&server.uri()));

    Mock::given(method("POST"))
        .and(path("/storage/v1/object/licenses/7/scan.png"))
        .and(header("content-type", "image/png"))
        .and(header("x-upsert", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "licenses/7/scan.png" })))
        .expect(1)
        .mount(&server)
        .await;

    let stored = client
        .upload_object("licenses", "7/scan.png", vec![1, 2, 3], "image/png", "user-token")
        .await
        .unwrap();

    assert_eq!(stored["Key"], "licenses/7/scan.png");
    assert_eq!(
        client.get_public_url("licenses", "7/scan.png"),
        format!("{}/storage/v1/object/public/licenses/7/scan.png", server.uri())
    );
}
