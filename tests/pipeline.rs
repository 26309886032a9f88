use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Method, Request, StatusCode},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use basic_axum_guard::{
    screening_middleware, AdmissionGuard, DelayPolicy, GuardConfig, RateLimitConfig,
    RequestScreener, ScreeningConfig, SlowDownConfig, TrackerConfig, ACCESS_DENIED,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

fn site() -> Router {
    Router::new()
        .route("/", get(|| async { "home" }))
        .route("/api/v1/products", get(|| async { "products" }))
        .route("/admin/secret", get(|| async { StatusCode::FORBIDDEN }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
}

fn app(guard: &AdmissionGuard) -> Router {
    guard
        .apply(site())
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
}

fn default_guard() -> AdmissionGuard {
    AdmissionGuard::builder()
        .screening(ScreeningConfig::recommended())
        .build()
        .unwrap()
}

fn request(method: Method, path: &str, ip: &str, user_agent: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("X-Forwarded-For", ip);
    if let Some(ua) = user_agent {
        builder = builder.header(header::USER_AGENT, ua);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn scanner_user_agent_gets_access_denied() {
    let guard = default_guard();
    let app = app(&guard);

    let response = send(
        &app,
        request(Method::GET, "/anything", "5.5.5.5", Some("Apache-HttpClient")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, ACCESS_DENIED);
    assert_eq!(guard.tracker().count("5.5.5.5"), 1);
}

#[tokio::test]
async fn padded_scanner_user_agent_is_still_screened() {
    let guard = default_guard();
    let app = app(&guard);
    let padded = format!("Mozilla/5.0 {} Apache-HttpClient/4.5", "x".repeat(500));

    let response = send(
        &app,
        request(Method::GET, "/anything", "5.5.5.6", Some(padded.as_str())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, ACCESS_DENIED);
}

#[tokio::test]
async fn suspicious_path_blocked_outside_api_prefix_only() {
    let guard = default_guard();
    let app = app(&guard);

    let response = send(
        &app,
        request(Method::GET, "/wp-login.php", "6.6.6.6", Some(BROWSER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request(Method::GET, "/api/v1/export/.env", "6.6.6.7", Some(BROWSER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_user_agent_is_rejected() {
    let app = app(&default_guard());

    let response = send(&app, request(Method::GET, "/products", "7.7.7.7", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request(Method::GET, "/products", "7.7.7.7", Some("Unknown")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn head_probe_on_root_only() {
    let app = app(&default_guard());

    let response = send(&app, request(Method::HEAD, "/", "8.8.4.4", Some(BROWSER))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, request(Method::HEAD, "/foo", "8.8.4.4", Some(BROWSER))).await;
    assert_ne!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn homepage_served_unless_root_blocking_enabled() {
    let lenient = app(&default_guard());
    let response = send(&lenient, request(Method::GET, "/", "9.9.9.1", Some(BROWSER))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "home");

    let strict = AdmissionGuard::builder()
        .screening(ScreeningConfig::recommended().with_root_get_post_blocking(true))
        .build()
        .unwrap();
    let strict = app(&strict);
    let response = send(&strict, request(Method::GET, "/", "9.9.9.1", Some(BROWSER))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hundred_and_first_request_is_rate_limited() {
    let guard = default_guard();
    let app = app(&guard);

    for i in 1..=100u64 {
        let response = send(
            &app,
            request(Method::GET, "/api/v1/products", "1.2.3.4", Some(BROWSER)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i);
        assert_eq!(header_str(&response, "ratelimit-limit"), Some("100"));
        let remaining = (100 - i).to_string();
        assert_eq!(
            header_str(&response, "ratelimit-remaining"),
            Some(remaining.as_str())
        );
    }

    let response = send(
        &app,
        request(Method::GET, "/api/v1/products", "1.2.3.4", Some(BROWSER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "ratelimit-remaining"), Some("0"));
    assert_eq!(header_str(&response, "ratelimit-policy"), Some("100;w=900"));
    assert!(header_str(&response, "x-ratelimit-limit").is_none());

    let retry_after: u64 = header_str(&response, "retry-after")
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 900);
    assert_eq!(
        body_text(response).await,
        RateLimitConfig::default().message
    );

    // Another identity is unaffected
    let response = send(
        &app,
        request(Method::GET, "/api/v1/products", "1.2.3.5", Some(BROWSER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // 429 is not a blocked attempt
    assert_eq!(guard.tracker().count("1.2.3.4"), 0);
}

#[tokio::test]
async fn rate_window_elapses() {
    let guard = AdmissionGuard::builder()
        .rate_limit(RateLimitConfig::new(2, Duration::from_secs(1)))
        .build()
        .unwrap();
    let app = app(&guard);
    let req = || request(Method::GET, "/api/v1/products", "2.2.2.2", Some(BROWSER));

    assert_eq!(send(&app, req()).await.status(), StatusCode::OK);
    assert_eq!(send(&app, req()).await.status(), StatusCode::OK);
    assert_eq!(send(&app, req()).await.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(send(&app, req()).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn legacy_headers_when_enabled() {
    let guard = AdmissionGuard::builder()
        .rate_limit(
            RateLimitConfig::new(5, Duration::from_secs(60))
                .with_standard_headers(false)
                .with_legacy_headers(true),
        )
        .build()
        .unwrap();
    let app = app(&guard);

    let response = send(
        &app,
        request(Method::GET, "/api/v1/products", "3.3.3.3", Some(BROWSER)),
    )
    .await;
    assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("5"));
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("4"));
    let reset: i64 = header_str(&response, "x-ratelimit-reset")
        .unwrap()
        .parse()
        .unwrap();
    assert!(reset > chrono::Utc::now().timestamp());
    assert!(header_str(&response, "ratelimit-limit").is_none());
}

#[tokio::test]
async fn repeated_forbidden_responses_are_tracked() {
    let guard = AdmissionGuard::builder()
        .tracker(TrackerConfig::new(5))
        .build()
        .unwrap();
    let app = app(&guard);

    for _ in 0..5 {
        let response = send(
            &app,
            request(Method::GET, "/admin/secret", "4.4.4.4", Some(BROWSER)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
    assert_eq!(guard.tracker().count("4.4.4.4"), 5);

    // Non-403 responses leave the count alone
    send(&app, request(Method::GET, "/nope", "4.4.4.4", Some(BROWSER))).await;
    assert_eq!(guard.tracker().count("4.4.4.4"), 5);
}

#[tokio::test]
async fn slow_down_delays_but_does_not_reject() {
    let guard = AdmissionGuard::builder()
        .slow_down(
            SlowDownConfig::new(2, Duration::from_secs(60))
                .with_delay(DelayPolicy::Constant(Duration::from_millis(200))),
        )
        .build()
        .unwrap();
    let app = app(&guard);
    let req = || request(Method::GET, "/api/v1/products", "5.6.7.8", Some(BROWSER));

    for _ in 0..2 {
        let start = Instant::now();
        assert_eq!(send(&app, req()).await.status(), StatusCode::OK);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    let start = Instant::now();
    let response = send(&app, req()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn screened_requests_never_reach_the_rate_limiter() {
    let guard = AdmissionGuard::builder()
        .config(GuardConfig {
            screening: ScreeningConfig::recommended(),
            rate_limit: RateLimitConfig::new(1, Duration::from_secs(60)),
            ..Default::default()
        })
        .build()
        .unwrap();
    let app = app(&guard);

    for _ in 0..3 {
        let response = send(&app, request(Method::GET, "/.env", "6.7.8.9", Some(BROWSER))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = send(
        &app,
        request(Method::GET, "/api/v1/products", "6.7.8.9", Some(BROWSER)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(guard.rate_limiter().tracked_identities(), 1);
}

#[tokio::test]
async fn filters_fail_closed_without_security_context() {
    let screener = Arc::new(RequestScreener::new(&ScreeningConfig::recommended()).unwrap());
    let app = site().layer(middleware::from_fn_with_state(screener, screening_middleware));

    let response = send(&app, request(Method::GET, "/", "1.1.1.1", Some(BROWSER))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn dropped_request_is_not_forwarded_after_delay() {
    let guard = AdmissionGuard::builder()
        .slow_down(
            SlowDownConfig::new(1, Duration::from_secs(60))
                .with_delay(DelayPolicy::Constant(Duration::from_millis(500))),
        )
        .build()
        .unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = hits.clone();
    let counted = Router::new().route(
        "/api/v1/products",
        get(move || {
            let hits = handler_hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "products"
            }
        }),
    );
    let app = guard
        .apply(counted)
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
    let req = || request(Method::GET, "/api/v1/products", "7.8.9.10", Some(BROWSER));

    assert_eq!(send(&app, req()).await.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Client gives up while the second request is held
    let abandoned = tokio::time::timeout(Duration::from_millis(100), app.clone().oneshot(req())).await;
    assert!(abandoned.is_err(), "request should still be delayed");

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
