use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use snapconnect::{
    BatchProcessor, ChatBackend, ChatRequest, InferenceAdapter, LlmError, Procedures, NOT_FOUND,
};

/// 假后端：按图片名返回预设内容，并记录最大并发数
#[derive(Default)]
struct FakeBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn complete(&self, request: ChatRequest) -> Result<Option<String>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let image = request
            .image_url
            .as_deref()
            .map(|url| url.trim_start_matches("data:image/jpeg;base64,").to_string());

        // 名字越靠前完成越晚，打乱完成顺序
        if let Some(name) = &image {
            let rank = name.bytes().last().unwrap_or(b'A').saturating_sub(b'A') as u64;
            tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(rank * 8))).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = match image.as_deref() {
            None => Some("# Morning Brief\n\n- all good".to_string()),
            Some(name) if name.starts_with("broken") => {
                return Err(LlmError::MalformedResponse {
                    reason: "upstream said: secret diagnostic".to_string(),
                })
            }
            Some("imgJane") => {
                Some(r#"{"name":"Jane","company":null,"role":"Engineer"}"#.to_string())
            }
            Some("imgEmpty") => Some("{}".to_string()),
            Some(name) if request.user_message.contains("JSON") => {
                Some(format!(r#"{{"name":"{}"}}"#, name))
            }
            Some(name) => Some(format!("analysis of {}", name)),
        };
        Ok(reply)
    }
}

fn server_with(
    backend: Arc<FakeBackend>,
    max_images: Option<usize>,
    body_limit: usize,
) -> TestServer {
    let procedures = Procedures::new(
        InferenceAdapter::new(backend),
        BatchProcessor::new(NonZeroUsize::new(4).unwrap(), max_images),
    );
    let app = snapconnect::server::routes(Arc::new(procedures), body_limit);
    TestServer::new(app).unwrap()
}

fn server() -> TestServer {
    server_with(Arc::new(FakeBackend::default()), Some(20), 10 * 1024 * 1024)
}

#[tokio::test]
async fn test_health() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_hello_query_and_mutation() {
    let server = server();

    let response = server
        .get("/api/trpc/hello")
        .add_query_param("input", r#"{"text":"C.C."}"#)
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({"result": {"data": {"greeting": "hello C.C."}}})
    );

    let response = server.post("/api/trpc/hello").json(&json!({"text": "world"})).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["result"]["data"]["greeting"], "hello world");
}

#[tokio::test]
async fn test_analyze_image() {
    let response = server()
        .post("/api/trpc/analyzeImage")
        .json(&json!({"image": "imgA"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["result"]["data"], "analysis of imgA");
}

#[tokio::test]
async fn test_extract_people_five_images_in_order() {
    let backend = Arc::new(FakeBackend::default());
    let server = server_with(backend.clone(), Some(20), 10 * 1024 * 1024);

    let images = ["imgA", "imgB", "imgC", "imgD", "imgE"];
    let response = server
        .post("/api/trpc/extractPeople")
        .json(&json!({"images": images}))
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    let people = body["result"]["data"]["people"].as_array().unwrap();
    assert_eq!(people.len(), 5);
    for (person, image) in people.iter().zip(images) {
        assert_eq!(person["name"], image);
        assert_eq!(person["imageUrl"], image);
        assert_eq!(person["company"], NOT_FOUND);
    }

    assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
    // 批大小为 4
    assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn test_extract_people_field_mapping() {
    let response = server()
        .post("/api/trpc/extractPeople")
        .json(&json!({"images": ["imgJane", "imgEmpty"]}))
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    assert_eq!(
        body["result"]["data"]["people"],
        json!([
            {
                "name": "Jane",
                "company": NOT_FOUND,
                "role": "Engineer",
                "timestamp": NOT_FOUND,
                "imageUrl": "imgJane"
            },
            {
                "name": NOT_FOUND,
                "company": NOT_FOUND,
                "role": NOT_FOUND,
                "timestamp": NOT_FOUND,
                "imageUrl": "imgEmpty"
            }
        ])
    );
}

#[tokio::test]
async fn test_extract_people_failure_is_generic() {
    let response = server()
        .post("/api/trpc/extractPeople")
        .json(&json!({"images": ["imgA", "brokenB", "imgC"]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], "Failed to extract person from image");
    assert!(body.get("result").is_none());
    assert!(!response.text().contains("secret diagnostic"));
}

#[tokio::test]
async fn test_generate_morning_brief() {
    let response = server()
        .post("/api/trpc/generateMorningBrief")
        .json(&json!({"images": ["imgA", "imgB"]}))
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    let data = &body["result"]["data"];
    assert_eq!(data["analyses"], json!(["analysis of imgA", "analysis of imgB"]));
    assert_eq!(data["brief"], "# Morning Brief\n\n- all good");
}

#[tokio::test]
async fn test_generate_morning_brief_failure() {
    let response = server()
        .post("/api/trpc/generateMorningBrief")
        .json(&json!({"images": ["brokenA"]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["error"]["message"], "Failed to analyze image");
}

#[tokio::test]
async fn test_too_many_images_rejected() {
    let backend = Arc::new(FakeBackend::default());
    let server = server_with(backend.clone(), Some(2), 10 * 1024 * 1024);

    let response = server
        .post("/api/trpc/extractPeople")
        .json(&json!({"images": ["imgA", "imgB", "imgC"]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "BAD_REQUEST");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_input_shape() {
    let server = server();

    let response = server
        .post("/api/trpc/extractPeople")
        .json(&json!({"pictures": ["imgA"]}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "BAD_REQUEST");

    let response = server
        .get("/api/trpc/hello")
        .add_query_param("input", "not json")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_body_limit() {
    let server = server_with(Arc::new(FakeBackend::default()), Some(20), 1024);

    let response = server
        .post("/api/trpc/extractPeople")
        .json(&json!({"images": ["A".repeat(4096)]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json::<Value>()["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_unknown_procedure() {
    let response = server().post("/api/trpc/doesNotExist").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_batched_mutation() {
    let response = server()
        .post("/api/trpc/extractPeople")
        .add_query_param("batch", "1")
        .json(&json!({"0": {"images": ["imgA"]}}))
        .await;
    response.assert_status_ok();

    assert_eq!(
        response.json::<Value>(),
        json!([{
            "result": {
                "data": {
                    "people": [{
                        "name": "imgA",
                        "company": NOT_FOUND,
                        "role": NOT_FOUND,
                        "timestamp": NOT_FOUND,
                        "imageUrl": "imgA"
                    }]
                }
            }
        }])
    );
}

#[tokio::test]
async fn test_batched_queries_keep_call_order() {
    let response = server()
        .get("/api/trpc/hello,analyzeImage")
        .add_query_param("batch", "1")
        .add_query_param("input", r#"{"0":{"text":"C.C."},"1":{"image":"imgB"}}"#)
        .await;
    response.assert_status_ok();

    assert_eq!(
        response.json::<Value>(),
        json!([
            {"result": {"data": {"greeting": "hello C.C."}}},
            {"result": {"data": "analysis of imgB"}}
        ])
    );
}

#[tokio::test]
async fn test_batch_with_failure_is_multi_status() {
    let response = server()
        .post("/api/trpc/extractPeople,generateMorningBrief")
        .add_query_param("batch", "1")
        .json(&json!({
            "0": {"images": ["imgA"]},
            "1": {"images": ["brokenB"]}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::MULTI_STATUS);
    let body = response.json::<Value>();
    assert_eq!(body[0]["result"]["data"]["people"][0]["name"], "imgA");
    assert_eq!(body[1]["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body[1]["error"]["message"], "Failed to analyze image");
}

#[tokio::test]
async fn test_batch_errors() {
    let server = server();

    let response = server
        .post("/api/trpc/extractPeople,doesNotExist")
        .add_query_param("batch", "1")
        .json(&json!({"0": {"pictures": []}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::MULTI_STATUS);
    let body = response.json::<Value>();
    assert_eq!(body[0]["error"]["code"], "BAD_REQUEST");
    assert_eq!(body[1]["error"]["code"], "NOT_FOUND");

    // 全部失败且状态相同时沿用该状态
    let response = server
        .post("/api/trpc/hello,analyzeImage")
        .add_query_param("batch", "1")
        .json(&json!({"0": {}, "1": {}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>().as_array().unwrap().len(), 2);

    let response = server
        .post("/api/trpc/extractPeople")
        .add_query_param("batch", "1")
        .json(&json!([{"images": ["imgA"]}]))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_on_mutation_not_supported() {
    let backend = Arc::new(FakeBackend::default());
    let server = server_with(backend.clone(), Some(20), 10 * 1024 * 1024);

    let response = server
        .get("/api/trpc/extractPeople")
        .add_query_param("input", r#"{"images":["imgA"]}"#)
        .await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json::<Value>()["error"]["code"], "METHOD_NOT_SUPPORTED");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}
