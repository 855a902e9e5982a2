use crate::config::GateConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Test fixture driving the full router against a mocked authorization service.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     fixture.mock_check("user:42", "viewer", "document:plan", true, 1).await;
///
///     let response = fixture
///         .post("/check", &json!({
///             "principal": "user:42",
///             "relation": "viewer",
///             "resource": "document:plan"
///         }))
///         .await;
///
///     response.assert_ok();
///     assert_eq!(response.json["source"], "remote");
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub config: GateConfig,
    /// State shared with the router, for inspecting components directly
    pub state: AppState,
    /// Mock server for the authorization service
    pub fga_mock: MockServer,
}

impl TestFixture {
    /// Creates a fixture with a fresh mock server and the default test configuration
    pub async fn new() -> Self {
        let fga_mock = MockServer::start().await;
        let config = GateConfig::for_test_with_mocks(&fga_mock);
        Self::with_config(config, fga_mock).await
    }

    /// Creates a fixture with a custom configuration.
    /// The configuration should point at `fga_mock`.
    pub async fn with_config(config: GateConfig, fga_mock: MockServer) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let state = AppState::for_testing(&config);
        let app = create_app(state.clone()).await;

        Self {
            app,
            config,
            state,
            fga_mock,
        }
    }

    /// Initializes the test logger. Safe to call repeatedly.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Request builder carrying the test API key and a JSON content type
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
    }

    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    pub async fn post<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        self.post_with_headers(uri, body, &[]).await
    }

    pub async fn post_with_headers<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let mut builder = self.request_builder(Method::POST, uri);

        // Add custom headers
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request through the router and collects the response
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse { status, json }
    }

    /// Mounts a check answer for one tuple, expecting `expected_calls` calls
    pub async fn mock_check(
        &self,
        principal: &str,
        relation: &str,
        resource: &str,
        allowed: bool,
        expected_calls: u64,
    ) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/stores/test-store/check"))
            .and(matchers::body_partial_json(json!({
                "tuple_key": {
                    "user": principal,
                    "relation": relation,
                    "object": resource
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": allowed })))
            .expect(expected_calls)
            .mount(&self.fga_mock)
            .await;
    }

    /// Mounts a response for any call to a store endpoint
    pub async fn mock_store_endpoint(
        &self,
        method: Method,
        endpoint: &str,
        response_body: impl Serialize,
        status_code: StatusCode,
        expected_calls: u64,
    ) {
        Mock::given(matchers::method(method.as_str()))
            .and(matchers::path(format!("/stores/test-store/{}", endpoint)))
            .respond_with(ResponseTemplate::new(status_code.as_u16()).set_body_json(response_body))
            .expect(expected_calls)
            .mount(&self.fga_mock)
            .await;
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub json: Value,
}

impl TestResponse {
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
