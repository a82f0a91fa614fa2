//! # HTTP Handlers
//!
//! The gateway's route table. Handlers stay thin: they pull what they need out
//! of [`AppState`](crate::state::AppState), call into the pipeline or the backend
//! client, and shape the JSON reply. Status codes come from
//! [`AppError`]'s `ResponseError` impl.
//!
//! ## Available Endpoints:
//! - `POST /transcribe` - audio in, transcript out
//! - `POST /ask-ollama` - prompt in, model response out
//! - `GET /health` - liveness, no dependency calls
//! - `GET /metrics` - request counters and uptime

pub mod ask;
pub mod transcribe;

pub use ask::ask_ollama;
pub use transcribe::transcribe;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::health;
use actix_web::web;
use tracing::{error, warn};

/// Register every route plus the JSON extractor settings they rely on.
pub fn configure(config: &AppConfig) -> impl FnOnce(&mut web::ServiceConfig) {
    let json_limit = config.server.max_upload_bytes;

    move |cfg| {
        let json_config = web::JsonConfig::default()
            .limit(json_limit)
            .error_handler(|err, _req| {
                AppError::Input(format!("Invalid JSON body: {}", err)).into()
            });

        cfg.app_data(json_config)
            .route("/transcribe", web::post().to(transcribe))
            .route("/ask-ollama", web::post().to(ask_ollama))
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics));
    }
}

/// Log a failed request at the handler boundary with its full detail.
pub(crate) fn log_failure(endpoint: &str, err: &AppError) {
    match err {
        AppError::Input(_) => warn!(endpoint, kind = err.kind(), error = %err, "Rejected request"),
        AppError::Dependency { service, .. } => {
            error!(endpoint, kind = err.kind(), service = *service, error = %err, "Backend call failed")
        }
        _ => error!(endpoint, kind = err.kind(), error = ?err, "Request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ingest::tests::{multipart_body, multipart_content_type};
    use crate::audio::transcoder::fake;
    use crate::audio::wav::encode_canonical;
    use crate::middleware::MetricsMiddleware;
    use crate::state::AppState;
    use actix_web::{http::StatusCode, test, App};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        config: AppConfig,
        scratch: TempDir,
        _bin: TempDir,
    }

    /// Config pointing both backends at `server` and ffmpeg at a stand-in script.
    fn harness(server: &MockServer, script: &str) -> Harness {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let ffmpeg = fake::install(bin.path(), "ffmpeg", script);

        let mut config = AppConfig::default();
        config.backends.whisper_url = format!("{}/inference", server.uri());
        config.backends.ollama_url = format!("{}/api/generate", server.uri());
        config.transcoder.ffmpeg_path = ffmpeg.to_string_lossy().to_string();
        config.transcoder.scratch_dir = Some(scratch.path().to_path_buf());

        Harness {
            config,
            scratch,
            _bin: bin,
        }
    }

    macro_rules! app {
        ($config:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState::new($config.clone()).unwrap()))
                    .wrap(MetricsMiddleware)
                    .configure(configure(&$config)),
            )
            .await
        };
    }

    fn scratch_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[actix_web::test]
    async fn test_health_makes_no_backend_calls() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "ok" }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_transcribe_missing_audio_data() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .set_json(json!({ "audio": "AAAA" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        let message = body["error"].as_str().unwrap().to_lowercase();
        assert!(message.contains("no audio_data"));
    }

    #[actix_web::test]
    async fn test_transcribe_missing_file_field() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(multipart_body(&[("note", None, &b"hello"[..])]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("No file provided"));
    }

    #[actix_web::test]
    async fn test_transcribe_invalid_base64() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .set_json(json!({ "audio_data": "!!not base64!!" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid base64"));
        assert!(scratch_is_empty(&h.scratch));
    }

    #[actix_web::test]
    async fn test_transcribe_unsupported_content_type() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", "text/plain"))
            .set_payload("hello")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_transcribe_silent_wav_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "text": "", "language": "en", "duration": 0.5 })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let silence = encode_canonical(&[0i16; 8000]);
        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header(("content-type", multipart_content_type()))
            .set_payload(multipart_body(&[("file", Some("silence.wav"), &silence[..])]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["text"], "");
        assert!(!body["language"].as_str().unwrap().is_empty());
        assert!(scratch_is_empty(&h.scratch));
    }

    #[actix_web::test]
    async fn test_transcribe_json_base64_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": " hello " })))
            .mount(&server)
            .await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let audio = encode_canonical(&[0i16; 160]);
        let req = test::TestRequest::post()
            .uri("/transcribe")
            .set_json(json!({ "audio_data": STANDARD.encode(&audio) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({ "status": "success", "text": "hello", "language": "unknown" })
        );
    }

    #[actix_web::test]
    async fn test_transcribe_without_ffmpeg_reports_install_hint() {
        let server = MockServer::start().await;
        let mut h = harness(&server, fake::COPY);
        h.config.transcoder.ffmpeg_path = "/nonexistent/bin/ffmpeg".to_string();
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .set_json(json!({ "audio_data": STANDARD.encode(b"some audio") }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("Install it with"));
        assert!(scratch_is_empty(&h.scratch));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_transcribe_backend_failure_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .set_json(json!({ "audio_data": STANDARD.encode(encode_canonical(&[0i16; 16])) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(scratch_is_empty(&h.scratch));
    }

    #[actix_web::test]
    async fn test_ask_ollama_success_with_default_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(wiremock::matchers::body_partial_json(json!({ "model": "llama3.1:8b" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Hi!" })))
            .expect(1)
            .mount(&server)
            .await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/ask-ollama")
            .set_json(json!({ "prompt": "hello" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "success", "response": "Hi!" }));
    }

    #[actix_web::test]
    async fn test_ask_ollama_missing_prompt() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/ask-ollama")
            .set_json(json!({ "model": "llama3.1:8b" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No prompt provided" }));
    }

    #[actix_web::test]
    async fn test_ask_ollama_malformed_json_is_400() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/ask-ollama")
            .insert_header(("content-type", "application/json"))
            .set_payload("{ not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[actix_web::test]
    async fn test_ask_ollama_unreachable_backend() {
        let server = MockServer::start().await;
        let mut h = harness(&server, fake::COPY);
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        h.config.backends.ollama_url = format!("http://127.0.0.1:{}/api/generate", port);
        let app = app!(h.config);

        let req = test::TestRequest::post()
            .uri("/ask-ollama")
            .set_json(json!({ "prompt": "hello" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_metrics_counts_requests() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/health").to_request();
            test::call_service(&app, req).await;
        }
        let req = test::TestRequest::post()
            .uri("/ask-ollama")
            .set_json(json!({}))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["overall"]["total_requests"], 3);
        assert_eq!(body["overall"]["total_errors"], 1);
        let endpoints = body["endpoints"].as_array().unwrap();
        let health = endpoints
            .iter()
            .find(|e| e["endpoint"] == "GET /health")
            .unwrap();
        assert_eq!(health["request_count"], 2);
    }

    #[actix_web::test]
    async fn test_metrics_share_one_bucket_for_unknown_paths() {
        let server = MockServer::start().await;
        let h = harness(&server, fake::COPY);
        let app = app!(h.config);

        for i in 0..50 {
            let req = test::TestRequest::get()
                .uri(&format!("/scan-{}", i))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let endpoints = body["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0]["endpoint"], crate::middleware::metrics::UNMATCHED_ENDPOINT);
        assert_eq!(endpoints[0]["request_count"], 50);
        assert_eq!(endpoints[0]["error_count"], 50);
    }
}
