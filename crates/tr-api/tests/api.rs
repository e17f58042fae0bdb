use std::sync::Arc;

use serde_json::json;
use tr_api::{
    AddTrainingExercise, AnamnesisAnswers, ClientError, CreateAnamnesis, Id, SessionMonitor,
    TreinoApi, UpdateTrainingSheet,
};
use tr_auth::{
    AuthenticatingHttpClient, ClientConfig, CredentialStore, Credentials, MemoryCredentialStore,
    SessionCallbacks,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(store: Arc<MemoryCredentialStore>) -> (MockServer, TreinoApi) {
    let server = MockServer::start().await;
    let config = ClientConfig::with_base_url(&format!("{}/api", server.uri())).unwrap();
    let client = AuthenticatingHttpClient::new(config, store).unwrap();
    (server, TreinoApi::new(client))
}

async fn signed_in() -> (MockServer, TreinoApi) {
    let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
        "T1", "R1",
    )));
    let (server, api) = setup(store).await;
    assert!(api.restore_session().await);
    (server, api)
}

#[tokio::test]
async fn test_sign_in_persists_tokens_and_installs_header() {
    let store = Arc::new(MemoryCredentialStore::new());
    let (server, api) = setup(store.clone()).await;

    Mock::given(method("POST"))
        .and(path("/api/user/signin"))
        .and(body_json(json!({
            "login": "coach",
            "password": "5ebe2294ecd0e0f08eab7690d2a6ee69"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "login": "coach", "name": "Coach", "role": "admin" },
            "token": "T1",
            "refreshToken": "R1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = api.sign_in("coach", "secret").await.unwrap();
    assert!(user.is_admin());
    assert_eq!(store.access_token().await.as_deref(), Some("T1"));
    assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));
    assert_eq!(
        api.client().default_authorization_token().as_deref(),
        Some("T1")
    );
}

#[tokio::test]
async fn test_sign_in_without_tokens_persists_nothing() {
    let store = Arc::new(MemoryCredentialStore::new());
    let (server, api) = setup(store.clone()).await;

    Mock::given(method("POST"))
        .and(path("/api/user/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "login": "coach", "name": "Coach", "role": "admin" },
            "token": "T1"
        })))
        .mount(&server)
        .await;

    let err = api.sign_in("coach", "secret").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
    assert!(store.access_token().await.is_none());
    assert!(api.client().default_authorization_token().is_none());
}

#[tokio::test]
async fn test_sign_in_rejected_surfaces_server_message() {
    let (server, api) = setup(Arc::new(MemoryCredentialStore::new())).await;
    let handle = api
        .client()
        .register_session_handlers(Arc::new(SessionCallbacks::new(|| {}, |_| {})))
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/user/signin"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Invalid login or password."
        })))
        .mount(&server)
        .await;

    match api.sign_in("coach", "wrong").await.unwrap_err() {
        ClientError::Api {
            status, message, ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid login or password.");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    handle.unregister();
}

#[tokio::test]
async fn test_sign_out_clears_store_and_header() {
    let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
        "T1", "R1",
    )));
    let (_server, api) = setup(store.clone()).await;
    assert!(api.restore_session().await);

    api.sign_out().await.unwrap();

    assert!(store.credentials().await.is_none());
    assert!(api.client().default_authorization_token().is_none());
    assert!(!api.restore_session().await);
}

#[tokio::test]
async fn test_students_are_unwrapped_from_envelope() {
    let (server, api) = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/student/all"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "students": [
                { "id": 1, "name": "Ana", "email": "ana@example.com" },
                { "id": "2", "name": "Bruno" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/student/find/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "student": { "id": 2, "name": "Bruno", "phone": "555-0101" }
        })))
        .mount(&server)
        .await;

    let students = api.list_students().await.unwrap();
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].email.as_deref(), Some("ana@example.com"));
    assert_eq!(students[1].id, Id::from(2));

    let bruno = api.find_student(&Id::from(2)).await.unwrap();
    assert_eq!(bruno.phone.as_deref(), Some("555-0101"));
}

#[tokio::test]
async fn test_training_sheet_flow() {
    let (server, api) = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/training-sheet/many/from/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trainingSheets": [
                { "id": 3, "name": "A", "canceled_at": null, "trainingGroup": [] },
                { "id": 4, "name": "Old", "canceled_at": "2024-01-01T00:00:00Z" }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/training-sheet/update"))
        .and(body_json(json!({ "trainingSheetId": 3, "name": "A2", "actived": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "trainingSheet": { "id": 3, "name": "A2", "canceled_at": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sheets = api.list_training_sheets(&Id::from(7)).await.unwrap();
    assert_eq!(sheets.len(), 2);
    assert!(sheets[0].is_active());
    assert!(!sheets[1].is_active());

    let updated = api
        .update_training_sheet(&UpdateTrainingSheet {
            training_sheet_id: Id::from(3),
            name: "A2".to_string(),
            actived: true,
        })
        .await
        .unwrap();
    assert_eq!(updated.name, "A2");
}

#[tokio::test]
async fn test_exercise_catalog_and_assignment() {
    let (server, api) = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/training-sheet/exercise-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exerciseGroups": [{ "id": 1, "name": "Chest" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/training-sheet/exercises/from/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exercises": [{
                "id": 9,
                "exercise_id": 2,
                "repetitions": "12",
                "series": 4,
                "trainingGroup_id": 5,
                "exercise": { "id": 2, "name": "Bench press" }
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/training-sheet/exercise/create"))
        .and(body_json(json!({
            "series": 3,
            "repetitions": "10",
            "trainingGroupId": 5,
            "exerciseId": 2
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let groups = api.list_exercise_groups().await.unwrap();
    assert_eq!(groups[0].name, "Chest");

    let assigned = api.list_training_exercises(&Id::from(5)).await.unwrap();
    assert_eq!(assigned[0].series, "4");
    assert_eq!(assigned[0].exercise.name, "Bench press");

    api.add_training_exercise(&AddTrainingExercise {
        series: 3,
        repetitions: "10".to_string(),
        training_group_id: Id::from(5),
        exercise_id: Id::from(2),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_anamnesis_absent_and_created() {
    let (server, api) = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/anamnesis/getById/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "anamnesis": null })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/anamnesis/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(api.find_anamnesis(&Id::from(7)).await.unwrap().is_none());

    api.create_anamnesis(&CreateAnamnesis {
        student_id: Id::from(7),
        answers: AnamnesisAnswers {
            physical_activity: true,
            what_physical_activity: "Running".to_string(),
            how_many_times_week: 3,
            ..Default::default()
        },
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_assessments_refresh_transparently() {
    let (server, api) = signed_in().await;
    let handle = api
        .client()
        .register_session_handlers(Arc::new(SessionCallbacks::new(|| {}, |_| {})))
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/assessment/getAll/7"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "token.expired",
            "message": "Token expired."
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T2",
            "refreshToken": "R2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/assessment/getAll/7"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assessments": [{ "id": "a1", "student_id": 7, "weight": 80.2 }]
        })))
        .mount(&server)
        .await;

    let assessments = api.list_assessments(&Id::from(7)).await.unwrap();
    assert_eq!(assessments.len(), 1);
    assert_eq!(assessments[0].fields["weight"], 80.2);
    assert_eq!(
        api.client().store().refresh_token().await.as_deref(),
        Some("R2")
    );

    handle.unregister();
}

#[tokio::test]
async fn test_revoked_session_is_forgotten() {
    let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
        "T1", "R1",
    )));
    let (server, api) = setup(store.clone()).await;
    assert!(api.restore_session().await);

    let monitor = Arc::new(SessionMonitor::new());
    let handle = api
        .client()
        .register_session_handlers(monitor.clone())
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/student/all"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "token.expired",
            "message": "Token expired."
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "token.invalid",
            "message": "Refresh token revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(api.list_students().await.is_err());
    handle.unregister();

    assert!(monitor.session_ended());
    assert!(api.forget_ended_session(&monitor).await.unwrap());
    assert!(store.credentials().await.is_none());
    assert!(!api.restore_session().await);
}

#[tokio::test]
async fn test_healthy_session_is_kept() {
    let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
        "T1", "R1",
    )));
    let (_server, api) = setup(store.clone()).await;
    let monitor = SessionMonitor::new();

    assert!(!api.forget_ended_session(&monitor).await.unwrap());
    assert_eq!(store.access_token().await.as_deref(), Some("T1"));
}
