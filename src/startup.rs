use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use actix_web_lab::middleware::from_fn;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::admission::admission;
use crate::admission::AllowedOrigins;
use crate::authentication::AdminKey;
use crate::configuration::DatabaseSettings;
use crate::configuration::Settings;
use crate::rate_limit::RateLimiter;
use crate::routes::health_check;
use crate::routes::join_waitlist;
use crate::routes::list_signups;
use crate::store::PgSignupStore;
use crate::store::SignupStore;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
    /// Shared with the sweep worker, see `rate_limit::init_sweep_worker`
    rate_limiter: web::Data<RateLimiter>,
}

impl Application {
    /// Bind the listener and build the `Server` (which does not run until
    /// awaited). The db pool is lazy, so no db is needed at this point.
    pub fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;

        // port 0 -> randomised port assigned by OS
        let port = listener.local_addr()?.port();

        let pool = get_connection_pool(&cfg.database);
        let store: Arc<dyn SignupStore> = Arc::new(PgSignupStore::new(pool));
        let rate_limiter = web::Data::new(RateLimiter::from_settings(&cfg.rate_limit));
        let allowed_origins = AllowedOrigins::from_settings(&cfg);
        let admin_key = AdminKey::new(cfg.admin.api_key.clone());

        tracing::info!(?allowed_origins, "allowed origins");

        let server = run(
            listener,
            store,
            rate_limiter.clone(),
            allowed_origins,
            admin_key,
        )?;

        Ok(Self {
            port,
            server,
            rate_limiter,
        })
    }

    pub fn get_port(&self) -> u16 { self.port }

    pub fn rate_limiter(&self) -> web::Data<RateLimiter> { self.rate_limiter.clone() }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// `connect_lazy_with` only connects when the pool is used for the first time,
/// so db-free requests (e.g. health_check) work without a db
pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(db_cfg.connection())
}

/// Declares all API endpoints. App data (store, rate limiter, allowed
/// origins, admin key) must be registered by the caller.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health_check", web::get().to(health_check))
        .service(
            web::scope("/api")
                // method gate, origin check and CORS/security headers for everything below
                .wrap(from_fn(admission))
                .service(
                    web::resource("/waitlist")
                        .route(web::post().to(join_waitlist))
                        .route(web::get().to(list_signups)),
                ),
        );
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
pub fn run(
    listener: TcpListener,
    store: Arc<dyn SignupStore>,
    rate_limiter: web::Data<RateLimiter>,
    allowed_origins: AllowedOrigins,
    admin_key: AdminKey,
) -> Result<Server, anyhow::Error> {
    // `Data` is externally an `Arc` (for sharing/cloning), internally a `HashMap`
    // (for wrapping arbitrary types)
    let store: web::Data<dyn SignupStore> = web::Data::from(store);
    let allowed_origins = web::Data::new(allowed_origins);
    let admin_key = web::Data::new(admin_key);

    // actix-web spins up a worker per core, each calling this closure to build its own `App`;
    // everything captured must be cloneable
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(configure_routes)
            .app_data(store.clone())
            .app_data(rate_limiter.clone())
            .app_data(allowed_origins.clone())
            .app_data(admin_key.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
