use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod jobs;
mod model;
mod models;
mod notify;
mod routes;
mod utils;
mod validation;
mod workflow;

use config::Config;
use db::{bootstrap_admin, init_db};

use crate::docs::ApiDoc;
use crate::notify::NotificationHub;
use crate::routes::RateLimits;
use crate::utils::nip_registry;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "absensi.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config).await?;

    if let Some((nip, password)) = &config.bootstrap_admin {
        if bootstrap_admin(&pool, nip, password).await? {
            warn!(nip = %nip, "Bootstrap administrator created, change its password");
        }
    }

    let warmup_pool = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = nip_registry::warmup(&warmup_pool, 500).await {
            error!(error = ?e, "Failed to warm up NIP registry");
        }
    });

    if config.absence_closer_enabled {
        actix_web::rt::spawn(jobs::run_absence_closer(
            pool.clone(),
            config.schedule.timezone,
        ));
    } else {
        info!("Absence closer disabled");
    }

    let hub = Data::new(NotificationHub::new(config.notification_channel_capacity));
    let limits = Arc::new(RateLimits::from_config(&config)?);
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(routes::access_logger())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(hub.clone())
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
