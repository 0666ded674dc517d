use lead_crm::{
    app::App,
    auth::{self, NewUser},
    config::{self, DatabaseSettings, Settings},
    domain::{EmailAddress, FullName, Role, ValidPassword},
    telemetry,
};
use regex::Regex;
use reqwest::{Client, Response};
use secrecy::SecretString;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::{env, io, sync::LazyLock};
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const DB_CONNECTION_FAIL: &str = "Failed to connect to Postgres";
const RQST_FAIL: &str = "Failed to execute request.";

const LOGGER_NAME: &str = "test";
const LOGGER_FILTER_LEVEL: &str = "info";

pub const API_KEY: &str = "test-lead-ingestion-key";

static TRACING: LazyLock<()> = LazyLock::new(TestApp::init_logging);

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

impl TestUser {
    pub fn generate(role: Role) -> Self {
        Self {
            id: Uuid::nil(),
            email: format!("{}@example.com", Uuid::new_v4()),
            full_name: "Test User".into(),
            password: Uuid::new_v4().to_string(),
            role,
        }
    }

    async fn store(&mut self, pool: &PgPool) {
        let new_user = NewUser {
            email: EmailAddress::parse_lowercase(&self.email).unwrap(),
            full_name: Some(FullName::parse(&self.full_name).unwrap()),
            role: self.role,
            password: ValidPassword::parse(SecretString::from(self.password.clone())).unwrap(),
        };
        self.id = auth::create_user(new_user, pool)
            .await
            .expect("Failed to store the test user.");
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub addr: String,
    pub port: u16,
    pub db_pool: PgPool,
    pub email_server: MockServer,
    pub google_server: MockServer,
    pub api_client: Client,
    pub admin: TestUser,
    pub member: TestUser,
}

impl TestApp {
    /// Runs the app in the background at a random port. The database pool is
    /// lazy, so only requests that reach Postgres need one running.
    pub async fn spawn() -> TestApp {
        let email_server = MockServer::start().await;
        let google_server = MockServer::start().await;
        let config = Self::config(&email_server, &google_server);
        Self::launch(config, email_server, google_server).await
    }

    /// Like `spawn`, on a freshly migrated database seeded with an admin and
    /// a team member.
    pub async fn spawn_with_db() -> TestApp {
        let email_server = MockServer::start().await;
        let google_server = MockServer::start().await;
        let config = Self::config(&email_server, &google_server);
        Self::init_db(&config.database).await;

        let mut app = Self::launch(config, email_server, google_server).await;
        app.admin.store(&app.db_pool).await;
        app.member.store(&app.db_pool).await;
        app
    }

    fn config(email_server: &MockServer, google_server: &MockServer) -> Settings {
        let mut raw = config::get().expect("Failed to read configuration");
        // Use a different database for each test case
        raw.database.name = Uuid::new_v4().to_string();
        // Use a random OS port
        raw.application.port = 0;
        raw.email_client.base_url = email_server.uri();
        raw.google.auth_base_url = format!("{}/o/oauth2/v2/auth", google_server.uri());
        raw.google.token_url = format!("{}/token", google_server.uri());
        raw.google.gmail_base_url = google_server.uri();
        raw.lead_ingestion.api_key = SecretString::from(API_KEY);
        raw.redis_uri = None;
        raw.bootstrap_admin = None;
        raw
    }

    async fn launch(config: Settings, email_server: MockServer, google_server: MockServer) -> TestApp {
        LazyLock::force(&TRACING);

        let app = App::build(&config)
            .await
            .expect("Failed to build application.");
        let port = app.addr().port();
        tokio::spawn(app.run_until_stopped());

        let api_client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .build()
            .unwrap();

        TestApp {
            addr: format!("http://127.0.0.1:{}", port),
            port,
            db_pool: config.database.get_db_pool(),
            email_server,
            google_server,
            api_client,
            admin: TestUser::generate(Role::Admin),
            member: TestUser::generate(Role::Team),
        }
    }

    fn init_logging() {
        let subscriber: Box<dyn tracing::subscriber::Subscriber + Send + Sync> =
            if env::var("TEST_LOG").is_ok() {
                Box::new(telemetry::get_subscriber(
                    LOGGER_NAME,
                    LOGGER_FILTER_LEVEL,
                    io::stdout,
                ))
            } else {
                Box::new(telemetry::get_subscriber(
                    LOGGER_NAME,
                    LOGGER_FILTER_LEVEL,
                    io::sink,
                ))
            };

        telemetry::init_subscriber(subscriber)
    }

    async fn init_db(config: &DatabaseSettings) -> PgPool {
        // Create Database
        let maintenance_settings = DatabaseSettings {
            name: "postgres".into(),
            username: "postgres".into(),
            password: "password".into(),
            ..config.clone()
        };

        PgConnection::connect_with(&maintenance_settings.connect_options())
            .await
            .expect(DB_CONNECTION_FAIL)
            .execute(format!(r#"CREATE DATABASE "{}";"#, config.name).as_str())
            .await
            .expect("Failed to create database");

        // Migrate Database
        let db_pool = PgPool::connect_with(config.connect_options())
            .await
            .expect(DB_CONNECTION_FAIL);

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .expect("Failed to migrate the database");

        db_pool
    }

    pub async fn get(&self, path: &str) -> Response {
        self.api_client
            .get(format!("{}{}", self.addr, path))
            .send()
            .await
            .expect(RQST_FAIL)
    }

    pub async fn get_html(&self, path: &str) -> String {
        self.get(path).await.text().await.unwrap()
    }

    pub async fn post_form(&self, path: &str, body: &impl serde::Serialize) -> Response {
        self.api_client
            .post(format!("{}{}", self.addr, path))
            .form(body)
            .send()
            .await
            .expect(RQST_FAIL)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}{}", self.addr, path))
            .json(body)
            .send()
            .await
            .expect(RQST_FAIL)
    }

    pub async fn post_login(&self, email: &str, password: &str) -> Response {
        self.post_form(
            "/login",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn post_otp(&self, otp: &str) -> Response {
        self.post_form("/otp", &serde_json::json!({ "otp": otp })).await
    }

    pub async fn post_logout(&self) -> Response {
        self.api_client
            .post(format!("{}/logout", self.addr))
            .send()
            .await
            .expect(RQST_FAIL)
    }

    pub async fn mock_email_provider(&self) {
        Mock::given(path("/emails"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.email_server)
            .await;
    }

    /// The code carried by the most recent OTP email.
    pub async fn last_otp(&self) -> String {
        let requests = self.email_server.received_requests().await.unwrap();
        let request = requests.last().expect("No OTP email was sent.");
        let body: serde_json::Value = request.body_json().unwrap();
        let text = body["text"].as_str().unwrap();
        Regex::new(r"\b(\d{6})\b").unwrap().captures(text).unwrap()[1].to_string()
    }

    /// Runs both login steps.
    pub async fn log_in(&self, user: &TestUser) {
        self.mock_email_provider().await;
        let resp = self.post_login(&user.email, &user.password).await;
        assert_redirects_to(&resp, "/otp");
        let otp = self.last_otp().await;
        let resp = self.post_otp(&otp).await;
        assert_redirects_to(&resp, user.role.home());
    }

    pub async fn post_lead(&self, body: &serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/api/leads", self.addr))
            .header("x-api-key", API_KEY)
            .json(body)
            .send()
            .await
            .expect(RQST_FAIL)
    }

    /// Ingests a lead and returns its id.
    pub async fn create_lead(&self, name: &str, email: &str) -> Uuid {
        let resp = self
            .post_lead(&serde_json::json!({ "name": name, "email": email }))
            .await;
        assert_eq!(201, resp.status().as_u16());
        let body: serde_json::Value = resp.json().await.unwrap();
        body["lead"]["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn assert_redirects_to(resp: &Response, location: &str) {
    assert_eq!(303, resp.status().as_u16());
    assert_eq!(location, resp.headers().get("Location").unwrap());
}
