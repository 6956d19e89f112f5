//! Translator against a fake chat-completions provider.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yuyi::{Config, Translator};

#[derive(Clone)]
struct Provider {
    status: StatusCode,
    body: String,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<(HeaderMap, Value)>>>,
}

impl Provider {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            hits: Arc::new(AtomicUsize::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn completions(
    State(p): State<Provider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    p.hits.fetch_add(1, Ordering::SeqCst);
    *p.last.lock().unwrap() = Some((headers, body));
    if !p.delay.is_zero() {
        tokio::time::sleep(p.delay).await;
    }
    (p.status, p.body.clone())
}

/// Replies with the user message and its uppercase form.
async fn echo(Json(body): Json<Value>) -> Json<Value> {
    let user = body["messages"][1]["content"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "choices": [{ "message": { "content": format!("{}\n{}", user, user.to_uppercase()) } }]
    }))
}

async fn serve(provider: Provider) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/echo", post(echo))
        .with_state(provider);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn success(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
}

fn config_for(base: &str) -> Config {
    Config::new("sk-test", format!("{}/v1/chat/completions", base), "gpt-test", "ZH")
}

#[tokio::test]
async fn test_returns_each_line_as_candidate() {
    let provider = Provider::new(StatusCode::OK, success("你好\n你好呀\n您好"));
    let base = serve(provider.clone()).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out, vec!["你好", "你好呀", "您好"]);
    assert_eq!(provider.hits(), 1);
}

#[tokio::test]
async fn test_sends_openai_shaped_request() {
    let provider = Provider::new(StatusCode::OK, success("hi"));
    let base = serve(provider.clone()).await;

    Translator::new().unwrap().translate("你好", &config_for(&base)).await;

    let (headers, body) = provider.last.lock().unwrap().take().unwrap();
    assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-test");
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1], json!({ "role": "user", "content": "你好" }));
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn test_user_text_is_sent_untrimmed() {
    let provider = Provider::new(StatusCode::OK, success("hi"));
    let base = serve(provider.clone()).await;
    let raw = "  line one\n\tline two  \n";

    Translator::new().unwrap().translate(raw, &config_for(&base)).await;

    let (_, body) = provider.last.lock().unwrap().take().unwrap();
    assert_eq!(body["messages"][1]["content"], raw);
}

#[tokio::test]
async fn test_unauthorized_embeds_provider_message() {
    let provider = Provider::new(
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"invalid api key","type":"auth_error"}}"#,
    );
    let base = serve(provider).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Error:"));
    assert!(out[0].contains("401"));
    assert!(out[0].contains("invalid api key"));
}

#[tokio::test]
async fn test_error_object_on_success_status() {
    let provider = Provider::new(
        StatusCode::OK,
        r#"{"error":{"message":"model overloaded","type":"server_error"}}"#,
    );
    let base = serve(provider).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out, vec!["Error: API 错误 - model overloaded"]);
}

#[tokio::test]
async fn test_empty_choices() {
    let base = serve(Provider::new(StatusCode::OK, r#"{"choices":[]}"#)).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out, vec!["Error: API 未返回翻译结果"]);
}

#[tokio::test]
async fn test_unparseable_body() {
    let base = serve(Provider::new(StatusCode::OK, "<html>gateway</html>")).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Error: 解析响应失败"));
}

#[tokio::test]
async fn test_blank_content_is_returned_raw() {
    let base = serve(Provider::new(StatusCode::OK, success(" \n \n"))).await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out, vec![" \n \n"]);
}

#[tokio::test]
async fn test_numbered_reply_is_cleaned_and_capped() {
    let reply = "1. one\n2) two\n3: three\n4、four\n5. five\n6. six\n7. seven\n8. eight";
    let base = serve(Provider::new(StatusCode::OK, success(reply))).await;

    let out = Translator::new().unwrap().translate("x", &config_for(&base)).await;

    assert_eq!(out, vec!["one", "two", "three", "four", "five"]);
}

#[tokio::test]
async fn test_missing_key_never_reaches_provider() {
    let provider = Provider::new(StatusCode::OK, success("unused"));
    let base = serve(provider.clone()).await;
    let mut cfg = config_for(&base);
    cfg.api_key.clear();

    let out = Translator::new().unwrap().translate("hello", &cfg).await;

    assert_eq!(out, vec!["请先在设置中配置 API Key"]);
    assert_eq!(provider.hits(), 0);
}

#[tokio::test]
async fn test_empty_text_never_reaches_provider() {
    let provider = Provider::new(StatusCode::OK, success("unused"));
    let base = serve(provider.clone()).await;

    let out = Translator::new().unwrap().translate("", &config_for(&base)).await;

    assert!(out.is_empty());
    assert_eq!(provider.hits(), 0);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let out = Translator::new()
        .unwrap()
        .translate("hello", &config_for(&format!("http://{}", addr)))
        .await;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Error: 网络请求失败"));
}

/// Accepts one request, promises 100 bytes of body, sends 5 and hangs up.
async fn serve_truncated_body() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        // Drain the whole request so closing does not reset the connection.
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"cho")
            .await
            .unwrap();
        socket.flush().await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_body_cut_short_reports_read_failure() {
    let base = serve_truncated_body().await;

    let out = Translator::new().unwrap().translate("hello", &config_for(&base)).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Error: 读取响应失败"), "{}", out[0]);
}

#[tokio::test]
async fn test_slow_provider_times_out_once() {
    let mut provider = Provider::new(StatusCode::OK, success("late"));
    provider.delay = Duration::from_secs(5);
    let base = serve(provider.clone()).await;

    let translator = Translator::with_timeout(Duration::from_millis(200)).unwrap();
    let out = translator.translate("hello", &config_for(&base)).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].starts_with("Error: 网络请求失败"));
    assert_eq!(provider.hits(), 1);
}

#[tokio::test]
async fn test_overlapping_calls_do_not_interfere() {
    let base = serve(Provider::new(StatusCode::OK, success("unused"))).await;
    let cfg = Config::new("sk-test", format!("{}/echo", base), "gpt-test", "ZH");
    let translator = Translator::new().unwrap();

    let (a, b) = tokio::join!(
        translator.translate("abc", &cfg),
        translator.translate("xyz", &cfg)
    );

    assert_eq!(a, vec!["abc", "ABC"]);
    assert_eq!(b, vec!["xyz", "XYZ"]);
}
