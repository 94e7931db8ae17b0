use crate::auth::jwt::{encode, public_jwk};
use crate::config::Settings;
use crate::create_app;
use crate::state::AppState;
use crate::store::SqlDrinkStore;
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Key id published by the mocked key set
pub const TEST_KID: &str = "test-key";
/// Subject of every token minted by the fixture
pub const TEST_SUBJECT: &str = "barista|test";

/// Test fixture for setting up a complete test environment with a mocked identity provider.
///
/// The fixture opens a fresh in-memory database, serves a key set from a wiremock server
/// and signs tokens with the matching private key, so requests exercise the full
/// authorization path.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     let token = fixture.token(&["get:drinks-detail"]);
///
///     let response = fixture.get("/drinks-detail", Some(&token)).await;
///
///     response.assert_status(StatusCode::BAD_REQUEST);
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub settings: Settings,
    /// State shared by the router
    pub state: AppState,
    /// Direct handle on the database behind the router
    pub store: SqlDrinkStore,
    /// Mock server publishing the key set
    pub jwks_mock: MockServer,
    signing_key: SigningKey,
}

impl TestFixture {
    /// Creates a fixture whose key set contains the signing key under [`TEST_KID`].
    pub async fn new() -> Self {
        let fixture = Self::without_key_set().await;

        let key_set = json!({ "keys": [public_jwk(TEST_KID, &fixture.signing_key)] });
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(key_set))
            .mount(&fixture.jwks_mock)
            .await;

        fixture
    }

    /// Creates a fixture whose identity provider publishes no key set, so every key
    /// lookup fails.
    pub async fn without_key_set() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let jwks_mock = MockServer::start().await;
        let settings = Settings::for_test_with_mocks(&jwks_mock);

        let store = SqlDrinkStore::connect(&settings.database)
            .await
            .expect("Failed to open test database");
        let state = AppState::with_store(&settings, Arc::new(store.clone()))
            .expect("Failed to create test state");
        let app = create_app(state.clone()).await;

        Self {
            app,
            settings,
            state,
            store,
            jwks_mock,
            signing_key: SigningKey::from_bytes(&[42u8; 32]),
        }
    }

    /// Initializes the test logger with customized settings.
    ///
    /// Called by the constructors with `Debug`, later calls are ignored.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Signs a valid token carrying `permissions`.
    pub fn token(&self, permissions: &[&str]) -> String {
        self.token_with_kid(TEST_KID, permissions)
    }

    /// Signs a valid token whose header names `kid`.
    pub fn token_with_kid(&self, kid: &str, permissions: &[&str]) -> String {
        let now = Utc::now().timestamp();
        self.token_with_claims(
            kid,
            json!({
                "iss": self.settings.auth.issuer,
                "aud": self.settings.auth.audience,
                "sub": TEST_SUBJECT,
                "iat": now,
                "exp": now + 3600,
                "permissions": permissions,
            }),
        )
    }

    /// Signs arbitrary claims, for tokens that are meant to be rejected.
    pub fn token_with_claims(&self, kid: &str, claims: Value) -> String {
        let header = json!({ "alg": "EdDSA", "typ": "JWT", "kid": kid });
        encode(&header, &claims, &self.signing_key)
    }

    /// Creates a request builder with the JSON content type and an optional bearer token.
    pub fn request_builder(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        token: Option<&str>,
    ) -> http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri.as_ref());

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.header("Content-Type", "application/json")
    }

    /// Sends a GET request to the specified URI.
    pub async fn get(&self, uri: impl AsRef<str>, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    /// Sends a request with an optional token and JSON body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let token = fixture.token(&["post:drinks"]);
    /// let body = json!({"title": "Water", "recipe": {"name": "water", "color": "blue", "parts": 1}});
    ///
    /// let response = fixture.request(Method::POST, "/drinks", Some(&token), Some(&body)).await;
    ///
    /// response.assert_ok();
    /// ```
    pub async fn request(
        &self,
        method: Method,
        uri: impl AsRef<str>,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(value).expect("Failed to serialize body")),
            None => Body::empty(),
        };
        let request = self
            .request_builder(method, uri, token)
            .body(body)
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request and returns a TestResponse.
    ///
    /// Lower-level than `get()` and `request()`, use it when the request needs
    /// custom headers.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let (status, body) = Self::send_to(&self.app, request).await;

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_str(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse { status, json }
    }

    /// Sends a GET request to any router and returns the raw body.
    pub async fn send_raw(
        &self,
        app: &Router,
        uri: impl AsRef<str>,
        token: Option<&str>,
    ) -> (StatusCode, String) {
        let request = self
            .request_builder(Method::GET, uri, token)
            .body(Body::empty())
            .expect("Failed to build request");

        Self::send_to(app, request).await
    }

    async fn send_to(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app
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

        (status, String::from_utf8_lossy(&body).into_owned())
    }
}

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as JSON, `{}` when the body was empty or not JSON
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status code {}, got {}. Response: {}",
            expected, self.status, self.json
        );
    }

    /// Asserts that the response has a 200 OK status code.
    pub fn assert_ok(&self) {
        self.assert_status(StatusCode::OK);
    }

    /// Deserializes the response body into the specified type.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response")
    }
}
