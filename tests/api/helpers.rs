use once_cell::sync::Lazy;
use secrecy::Secret;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;
use waitlist::configuration::get_configuration;
use waitlist::configuration::DatabaseSettings;
use waitlist::startup::get_connection_pool;
use waitlist::startup::Application;
use waitlist::telemetry::get_subscriber;
use waitlist::telemetry::init_subscriber;

pub const ALLOWED_ORIGIN: &str = "https://plannosaur.com";
pub const ADMIN_KEY: &str = "test-admin-key";

/// Init a static subscriber once for the whole test binary.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks are different closure types, hence the duplicated arms
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).unwrap();
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).unwrap();
        }
    };
});

pub struct TestApp {
    pub addr: String,
    pub pool: PgPool,
}

impl TestApp {
    /// `POST /api/waitlist` from an allowed origin, with a fixed client address
    pub async fn post_waitlist(
        &self,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.post_waitlist_from("203.0.113.7", body).await
    }

    /// `POST /api/waitlist` from an allowed origin, as if forwarded for `ip`
    pub async fn post_waitlist_from(
        &self,
        ip: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/api/waitlist", self.addr))
            .header("Origin", ALLOWED_ORIGIN)
            .header("X-Forwarded-For", ip)
            .json(body)
            .send()
            .await
            .expect("execute request")
    }

    /// `GET /api/waitlist?{query}`, with the admin key if given
    pub async fn get_signups(
        &self,
        key: Option<&str>,
        query: &str,
    ) -> reqwest::Response {
        let mut req = reqwest::Client::new().get(format!("{}/api/waitlist?{query}", self.addr));
        if let Some(key) = key {
            req = req.header("x-admin-key", key);
        }
        req.send().await.expect("execute request")
    }
}

/// Create a db with a randomised name (`cfg.database_name`), and run the
/// migrations in `./migrations` against it.
async fn configure_database(cfg: &DatabaseSettings) -> PgPool {
    let mut conn = PgConnection::connect_with(&cfg.connection_without_db())
        .await
        .expect("postgres must be running");

    conn.execute(format!(r#"CREATE DATABASE "{}";"#, cfg.database_name).as_str())
        .await
        .unwrap();

    let pool = PgPool::connect_with(cfg.connection()).await.unwrap();
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to migrate");
    pool
}

/// Spawn the full application on a random port, backed by a fresh db, with the
/// admin key set to `ADMIN_KEY`.
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let cfg = {
        let mut rand_cfg = get_configuration().unwrap();

        // a new db per test
        rand_cfg.database.database_name = Uuid::new_v4().to_string();

        // port 0 -> random available port
        rand_cfg.application.port = 0;

        rand_cfg.admin.api_key = Some(Secret::new(ADMIN_KEY.to_string()));
        rand_cfg.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];

        rand_cfg
    };

    configure_database(&cfg.database).await;

    let app = Application::build(cfg.clone()).unwrap();
    let addr = format!("http://localhost:{}", app.get_port());

    let pool = get_connection_pool(&cfg.database);
    tokio::spawn(app.run_until_stopped());

    TestApp { addr, pool }
}
