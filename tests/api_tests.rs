use anyhow::Result;
use async_trait::async_trait;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use jobportal::analysis::LanguageModel;
use jobportal::auth::hash_password;
use jobportal::core::config_manager::AuthSettings;
use jobportal::core::{Database, MediaStore};
use jobportal::ingestion::ResumeTextExtractor;
use jobportal::recommendation::index::{IndexEntry, JobIndex};
use jobportal::recommendation::EmbeddingModel;
use jobportal::repositories::{NewUser, UserRepository};
use jobportal::{build_rocket, AppParts, AppState};

const BOUNDARY: &str = "jobportal-test-boundary";
const PASSWORD: &str = "blue-ocean-42";

/// Answers resume prompts with a fixed analysis and fit prompts with a fixed score.
struct ScriptedModel;

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<Value> {
        if user.contains("fit_score") {
            Ok(json!({
                "fit_score": 87,
                "matching_skills": ["Rust"],
                "missing_skills": ["Kubernetes"],
                "summary": "Strong systems background."
            }))
        } else {
            Ok(json!({
                "skills": ["Rust", "Data pipelines"],
                "experience_years": 4,
                "summary": "Rust developer building data pipelines."
            }))
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

const VOCABULARY: [&str; 8] = [
    "rust", "data", "developer", "pipelines", "chef", "cook", "food", "kitchen",
];

struct KeywordEmbedder;

#[async_trait]
impl EmbeddingModel for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                let words: Vec<&str> = lowered
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                VOCABULARY
                    .iter()
                    .map(|term| words.iter().filter(|w| *w == term).count() as f32)
                    .collect()
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

struct TestApp {
    client: Client,
    _media: TempDir,
    _data: TempDir,
}

async fn app() -> TestApp {
    app_with_data(tempfile::tempdir().unwrap()).await
}

/// App whose index file lives in `data`, so tests can seed it first.
async fn app_with_data(data: TempDir) -> TestApp {
    let media = tempfile::tempdir().unwrap();

    let state = AppState::assemble(AppParts {
        db: Database::in_memory().await.unwrap(),
        media: MediaStore::new(media.path()),
        auth: AuthSettings {
            jwt_secret: "api-test-secret".to_string(),
            token_ttl_hours: 1,
        },
        language_model: Arc::new(ScriptedModel),
        embedder: Arc::new(KeywordEmbedder),
        extractor: Arc::new(ResumeTextExtractor),
        index_path: data.path().join("job_index.json"),
        recommendation_k: 5,
        fit_analysis_enabled: true,
        pipeline_workers: 1,
    })
    .await
    .unwrap();

    let client = Client::tracked(build_rocket(state)).await.unwrap();
    TestApp {
        client,
        _media: media,
        _data: data,
    }
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.unwrap()
}

fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

async fn register(client: &Client, username: &str, user_type: &str) -> Value {
    let response = client
        .post("/api/users")
        .header(ContentType::Form)
        .body(format!(
            "username={}&password={}&user_type={}&email={}%40example.com",
            username, PASSWORD, user_type, username
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    body(response).await
}

async fn token(client: &Client, username: &str) -> String {
    let response = client
        .post("/api/auth/token")
        .header(ContentType::JSON)
        .body(json!({"username": username, "password": PASSWORD}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    body(response).await["data"]["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn staff_token(client: &Client) -> String {
    let state = client.rocket().state::<AppState>().unwrap();
    UserRepository::new(state.db.pool())
        .create(&NewUser {
            username: "root".to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            avatar: None,
            is_staff: true,
            phone_number: String::new(),
            address: String::new(),
            user_type: None,
        })
        .await
        .unwrap();
    token(client, "root").await
}

/// Employer with one approved company; returns (employer token, company id).
async fn approved_company(client: &Client, staff: &str) -> (String, i64) {
    register(client, "acme-hr", "employer").await;
    let employer = token(client, "acme-hr").await;

    let response = client
        .post("/api/companies")
        .header(ContentType::Form)
        .header(bearer(&employer))
        .body("name=Acme&website=https%3A%2F%2Facme.test&address=Hanoi")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let company = body(response).await;
    assert_eq!(company["data"]["status"], "pending");
    assert_eq!(company["data"]["logo"], "");
    let company_id = company["data"]["id"].as_i64().unwrap();

    let response = client
        .post(format!("/api/companies/{}/status", company_id))
        .header(ContentType::JSON)
        .header(bearer(staff))
        .body(json!({"status": "approved"}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    (employer, company_id)
}

async fn post_job(client: &Client, employer: &str, company_id: i64, title: &str, description: &str) -> i64 {
    let response = client
        .post("/api/jobs")
        .header(ContentType::JSON)
        .header(bearer(employer))
        .body(
            json!({
                "company_id": company_id,
                "title": title,
                "description": description,
                "location": "Remote",
                "salary": 5000,
                "job_type": "full_time"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    body(response).await["data"]["id"].as_i64().unwrap()
}

async fn post_resume<'c>(client: &'c Client, candidate: &str, text: &str) -> LocalResponse<'c> {
    let payload = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nMy CV\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n{text}\r\n--{b}--\r\n",
        b = BOUNDARY,
        text = text
    );
    client
        .post("/api/resumes")
        .header(Header::new(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .header(bearer(candidate))
        .body(payload)
        .dispatch()
        .await
}

async fn upload_resume(client: &Client, candidate: &str, text: &str) -> i64 {
    let response = post_resume(client, candidate, text).await;
    assert_eq!(response.status(), Status::Created);
    let resume = body(response).await;
    assert!(resume["data"]["file"].as_str().unwrap().starts_with("/media/resumes/"));
    resume["data"]["id"].as_i64().unwrap()
}

async fn wait_for_analysis(client: &Client, candidate: &str, resume_id: i64) -> Value {
    for _ in 0..100 {
        let response = client
            .get(format!("/api/resumes/{}/analysis", resume_id))
            .header(bearer(candidate))
            .dispatch()
            .await;
        let analysis = body(response).await;
        if analysis["data"]["processing_status"] == "completed" {
            return analysis;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("resume {} was never processed", resume_id);
}

#[tokio::test]
async fn test_register_login_and_current_user() {
    let app = app().await;
    let client = &app.client;

    let created = register(client, "alice", "candidate").await;
    assert_eq!(created["type"], "data");
    assert_eq!(created["data"]["username"], "alice");
    assert_eq!(created["data"]["avatar"], "");
    assert_eq!(created["data"]["profile"]["user_type"], "candidate");

    let duplicate = client
        .post("/api/users")
        .header(ContentType::Form)
        .body(format!("username=alice&password={}", PASSWORD))
        .dispatch()
        .await;
    assert_eq!(duplicate.status(), Status::Conflict);

    let anonymous = client.get("/api/users/current-user").dispatch().await;
    assert_eq!(anonymous.status(), Status::Unauthorized);
    let error = body(anonymous).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error"], "Authentication credentials were not provided");

    let alice = token(client, "alice").await;
    let me = client
        .get("/api/users/current-user")
        .header(bearer(&alice))
        .dispatch()
        .await;
    assert_eq!(me.status(), Status::Ok);
    assert_eq!(body(me).await["data"]["email"], "alice@example.com");

    let wrong = client
        .post("/api/auth/token")
        .header(ContentType::JSON)
        .body(json!({"username": "alice", "password": "not-her-password"}).to_string())
        .dispatch()
        .await;
    assert_eq!(wrong.status(), Status::Unauthorized);
}

#[tokio::test]
async fn test_weak_password_and_password_change() {
    let app = app().await;
    let client = &app.client;

    let weak = client
        .post("/api/users")
        .header(ContentType::Form)
        .body("username=bob&password=12345678")
        .dispatch()
        .await;
    assert_eq!(weak.status(), Status::BadRequest);
    assert_eq!(body(weak).await["error_code"], "VALIDATION_ERROR");

    register(client, "bob", "candidate").await;
    let bob = token(client, "bob").await;

    let wrong_old = client
        .post("/api/users/change-password")
        .header(ContentType::JSON)
        .header(bearer(&bob))
        .body(
            json!({
                "old_password": "nope-nope-nope",
                "new_password": "green-forest-77",
                "confirm_new_password": "green-forest-77"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(wrong_old.status(), Status::BadRequest);
    assert!(body(wrong_old).await["error"]
        .as_str()
        .unwrap()
        .starts_with("old_password"));

    let changed = client
        .post("/api/users/change-password")
        .header(ContentType::JSON)
        .header(bearer(&bob))
        .body(
            json!({
                "old_password": PASSWORD,
                "new_password": "green-forest-77",
                "confirm_new_password": "green-forest-77"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(changed.status(), Status::Ok);
    assert_eq!(body(changed).await["action"], "password_changed");
}

#[tokio::test]
async fn test_company_job_and_application_flow() {
    let app = app().await;
    let client = &app.client;
    let staff = staff_token(client).await;
    let (employer, company_id) = approved_company(client, &staff).await;

    let job_id = post_job(client, &employer, company_id, "Rust Developer", "<p>Rust work</p>").await;
    let duplicate = client
        .post("/api/jobs")
        .header(ContentType::JSON)
        .header(bearer(&employer))
        .body(
            json!({
                "company_id": company_id,
                "title": "Rust Developer",
                "location": "Remote",
                "salary": 10,
                "job_type": "remote"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(duplicate.status(), Status::Conflict);

    register(client, "carol", "candidate").await;
    let carol = token(client, "carol").await;

    let forbidden = client
        .post("/api/jobs")
        .header(ContentType::JSON)
        .header(bearer(&carol))
        .body(
            json!({
                "company_id": company_id,
                "title": "Sneaky",
                "location": "Remote",
                "salary": 1,
                "job_type": "remote"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(forbidden.status(), Status::Forbidden);

    let anonymous = body(client.get("/api/jobs").dispatch().await).await;
    assert_eq!(anonymous["data"]["count"], 1);
    assert!(anonymous["data"]["results"][0]["is_saved"].is_null());
    assert_eq!(anonymous["data"]["results"][0]["job_type_display"], "Full-time");

    let saved = client
        .post(format!("/api/jobs/{}/save-job", job_id))
        .header(bearer(&carol))
        .dispatch()
        .await;
    assert_eq!(body(saved).await["data"]["is_saved"], true);
    let listed = client.get("/api/jobs").header(bearer(&carol)).dispatch().await;
    assert_eq!(body(listed).await["data"]["results"][0]["is_saved"], true);
    let saved_jobs = client
        .get("/api/users/saved-jobs")
        .header(bearer(&carol))
        .dispatch()
        .await;
    assert_eq!(body(saved_jobs).await["data"].as_array().unwrap().len(), 1);

    let resume_id = upload_resume(client, &carol, "Carol\n\nRust developer").await;
    let apply = |resume: i64| {
        client
            .post(format!("/api/jobs/{}/applications", job_id))
            .header(ContentType::JSON)
            .header(bearer(&carol))
            .body(json!({ "resume": resume }).to_string())
    };
    let applied = apply(resume_id).dispatch().await;
    assert_eq!(applied.status(), Status::Created);
    let application_id = body(applied).await["data"]["id"].as_i64().unwrap();
    assert_eq!(apply(resume_id).dispatch().await.status(), Status::BadRequest);

    let employer_view = client
        .get(format!("/api/jobs/{}/applications", job_id))
        .header(bearer(&employer))
        .dispatch()
        .await;
    assert_eq!(body(employer_view).await["data"].as_array().unwrap().len(), 1);
    let not_owner = client
        .get(format!("/api/jobs/{}/applications", job_id))
        .header(bearer(&carol))
        .dispatch()
        .await;
    assert_eq!(not_owner.status(), Status::Forbidden);

    let reviewed = client
        .post(format!("/api/applications/{}/review", application_id))
        .header(bearer(&employer))
        .dispatch()
        .await;
    assert_eq!(body(reviewed).await["data"]["status"], "reviewed");

    let withdrawn = client
        .post(format!("/api/applications/{}/withdraw", application_id))
        .header(bearer(&carol))
        .dispatch()
        .await;
    assert_eq!(body(withdrawn).await["data"]["status"], "withdrawn");

    let too_late = client
        .patch(format!("/api/applications/{}/status", application_id))
        .header(ContentType::JSON)
        .header(bearer(&employer))
        .body(json!({"status": "accepted"}).to_string())
        .dispatch()
        .await;
    assert_eq!(too_late.status(), Status::BadRequest);

    let referenced = client
        .delete(format!("/api/resumes/{}", resume_id))
        .header(bearer(&carol))
        .dispatch()
        .await;
    assert_eq!(referenced.status(), Status::Conflict);

    let stats = client
        .get("/api/stats/jobs")
        .header(bearer(&staff))
        .dispatch()
        .await;
    let stats = body(stats).await;
    assert_eq!(stats["data"][0]["name"], "Acme");
    assert_eq!(stats["data"][0]["job_count"], 1);
}

#[tokio::test]
async fn test_resume_pipeline_and_recommendations() {
    let app = app().await;
    let client = &app.client;
    let staff = staff_token(client).await;
    let (employer, company_id) = approved_company(client, &staff).await;

    post_job(
        client,
        &employer,
        company_id,
        "Rust Developer",
        "<p>Rust systems developer for data pipelines</p>",
    )
    .await;
    post_job(client, &employer, company_id, "Chef", "<p>Cook food in our kitchen</p>").await;

    register(client, "dana", "candidate").await;
    let dana = token(client, "dana").await;

    let no_resume = client
        .get("/api/recommendations")
        .header(bearer(&dana))
        .dispatch()
        .await;
    assert_eq!(no_resume.status(), Status::BadRequest);

    let resume_id = upload_resume(client, &dana, "Dana\n\nI build data pipelines in Rust").await;
    let analysis = wait_for_analysis(client, &dana, resume_id).await;
    assert_eq!(analysis["data"]["analysis"]["skills"][0], "Rust");
    assert!(analysis["data"]["extracted_text_length"].as_u64().unwrap() > 0);

    let no_index = client
        .get("/api/recommendations")
        .header(bearer(&dana))
        .dispatch()
        .await;
    assert_eq!(no_index.status(), Status::ServiceUnavailable);

    let not_staff = client
        .post("/api/recommendations/rebuild")
        .header(bearer(&dana))
        .dispatch()
        .await;
    assert_eq!(not_staff.status(), Status::Forbidden);

    let rebuilt = client
        .post("/api/recommendations/rebuild")
        .header(bearer(&staff))
        .dispatch()
        .await;
    assert_eq!(rebuilt.status(), Status::Ok);
    assert_eq!(body(rebuilt).await["data"]["jobs"], 2);

    let status = client
        .get("/api/recommendations/status")
        .header(bearer(&dana))
        .dispatch()
        .await;
    let status = body(status).await;
    assert_eq!(status["data"]["built"], true);
    assert_eq!(status["data"]["model"], "keyword");

    let recommended = client
        .get("/api/recommendations?k=1")
        .header(bearer(&dana))
        .dispatch()
        .await;
    assert_eq!(recommended.status(), Status::Ok);
    let recommended = body(recommended).await;
    let results = recommended["data"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["job"]["title"], "Rust Developer");
    assert_eq!(results[0]["fit_analysis"]["fit_score"], 87);
}

#[tokio::test]
async fn test_health_pagination_and_preflight() {
    let app = app().await;
    let client = &app.client;

    let health = client.get("/api/health").dispatch().await;
    assert_eq!(health.status(), Status::Ok);
    let health = body(health).await;
    assert_eq!(health["type"], "text");
    assert_eq!(health["message"], "OK");

    let first = body(client.get("/api/jobs").dispatch().await).await;
    assert_eq!(first["data"]["count"], 0);
    assert!(first["data"]["next"].is_null());
    assert_eq!(
        client.get("/api/jobs?page=2").dispatch().await.status(),
        Status::NotFound
    );

    let preflight = client.options("/api/jobs").dispatch().await;
    assert_eq!(preflight.status(), Status::Ok);
    assert_eq!(
        preflight.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );
}

#[tokio::test]
async fn test_resume_upload_size_limits() {
    let app = app().await;
    let client = &app.client;
    register(client, "erin", "candidate").await;
    let erin = token(client, "erin").await;

    // Larger than Rocket's default 1 MiB file limit.
    let large = "Rust developer building data pipelines.\n".repeat(40_000);
    assert!(large.len() > 3 * 1024 * 1024 / 2);
    upload_resume(client, &erin, &large).await;

    let oversized = "x".repeat(10 * 1024 * 1024 + 512 * 1024);
    let rejected = post_resume(client, &erin, &oversized).await;
    assert_eq!(rejected.status(), Status::PayloadTooLarge);
    let error = body(rejected).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error_code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_index_from_another_embedding_model_is_ignored() {
    let data = tempfile::tempdir().unwrap();
    JobIndex::new(
        "some-other-model",
        vec![IndexEntry {
            key: "1".to_string(),
            label: "Old job".to_string(),
            chunk_index: 0,
            content: "Old job".to_string(),
            embedding: vec![1.0, 0.0, 0.0],
        }],
    )
    .unwrap()
    .save(&data.path().join("job_index.json"))
    .await
    .unwrap();

    let app = app_with_data(data).await;
    let client = &app.client;
    register(client, "gus", "candidate").await;
    let gus = token(client, "gus").await;

    let status = client
        .get("/api/recommendations/status")
        .header(bearer(&gus))
        .dispatch()
        .await;
    assert_eq!(body(status).await["data"]["built"], false);

    let resume_id = upload_resume(client, &gus, "Gus\n\nRust developer").await;
    wait_for_analysis(client, &gus, resume_id).await;
    let recommended = client
        .get("/api/recommendations")
        .header(bearer(&gus))
        .dispatch()
        .await;
    assert_eq!(recommended.status(), Status::ServiceUnavailable);
}
