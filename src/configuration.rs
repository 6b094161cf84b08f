use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::num::NonZeroU32;
use std::num::NonZeroU64;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::PgConnectOptions;

/// Global configuration, loaded from the yaml files in `configuration/`. See
/// `get_configuration`.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub cors: CorsSettings,
    pub deployment: DeploymentSettings,
    pub admin: AdminSettings,
    pub rate_limit: RateLimitSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// Database configuration
#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,

    /// Port for the postgres database, which will be different from that of the
    /// server.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub database_name: String,

    /// Should be `true` in production.
    /// https://www.postgresql.org/docs/current/libpq-ssl.html#LIBPQ-SSL-SSLMODE-STATEMENTS
    pub require_ssl: bool,
}

impl DatabaseSettings {
    /// Return connection to a named database (declared in config file). The db
    /// password is concealed.
    pub fn connection(&self) -> PgConnectOptions {
        self.connection_without_db().database(&self.database_name)
    }

    /// Return connection to the Postgres instance (instead of a specific db),
    /// i.e. `database_name` is unset. This is typically used to init a
    /// randomised db for testing.
    pub fn connection_without_db(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .username(&self.username)
            .password(self.password.expose_secret())
            .host(&self.host)
            .port(self.port)
            .ssl_mode(match self.require_ssl {
                true => sqlx::postgres::PgSslMode::Require,
                false => sqlx::postgres::PgSslMode::Prefer,
            })
    }
}

/// Origins that are always allowed to receive CORS-enabled responses. Exact
/// match on scheme + host (+ port), e.g. `https://plannosaur.com`.
#[derive(Deserialize, Clone)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

/// Where the app is deployed, as reported by the hosting platform. Not to be
/// confused with `Environment`, which only selects the config file.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    Production,
    Preview,
    Development,
    /// Any other name the platform reports; treated like a preview
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Clone)]
pub struct DeploymentSettings {
    pub environment: DeploymentEnvironment,

    /// Bare host of the current deployment (e.g. `my-app-abc123.vercel.app`),
    /// injected by the platform. Allow-listed (as https) outside production.
    pub url: Option<String>,
}

impl DeploymentSettings {
    /// The origin of a preview/development deployment, if there is one
    pub fn preview_origin(&self) -> Option<String> {
        if self.environment == DeploymentEnvironment::Production {
            return None;
        }
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| format!("https://{u}"))
    }
}

#[derive(Deserialize, Clone)]
pub struct AdminSettings {
    /// Shared secret for `GET /api/waitlist`. If absent, the listing is never
    /// served.
    pub api_key: Option<Secret<String>>,
}

/// All values must be non-zero; a zero window would disable limiting, and a zero
/// sweep interval would busy-loop the sweep worker.
#[derive(Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_requests: NonZeroU32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_seconds: NonZeroU64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sweep_interval_seconds: NonZeroU64,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration { Duration::from_secs(self.window_seconds.get()) }

    pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_seconds.get()) }
}

pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )?;
        Ok(())
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`.
///
/// Sources, from lowest to highest priority:
///
/// 1. `base.yaml`
/// 2. `{APP_ENVIRONMENT}.yaml` (`local` by default)
/// 3. `APP_`-prefixed env vars, e.g. `APP_APPLICATION__PORT=5001` ->
///    `Settings.application.port`
/// 4. platform env vars: `VERCEL_ENV`, `VERCEL_URL`, `ADMIN_API_KEY`
///
/// All fields must be present after merging, otherwise the server will not
/// start.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or("local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    tracing::info!("loading config for {env} env");

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            // env vars are -always- parsed as String, `serde-aux` is required to parse other
            // types
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("deployment.environment", env::var("VERCEL_ENV").ok())?
        .set_override_option("deployment.url", env::var("VERCEL_URL").ok())?
        .set_override_option("admin.api_key", env::var("ADMIN_API_KEY").ok())?
        .build()?;

    settings.try_deserialize::<Settings>()
}
