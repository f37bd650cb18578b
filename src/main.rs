mod annotate;
mod config;
mod dicom;
mod error;
mod inference;
mod report;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use annotate::Annotator;
use config::AppConfig;
use inference::InferenceClient;
use routes::configure_routes;
use storage::ArtifactStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = std::env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::other(format!("configuration error: {e}")))?;

    let store = ArtifactStore::new(&config);
    store.ensure_dirs()?;

    let client = InferenceClient::new(&config)
        .map_err(|e| std::io::Error::other(format!("inference client setup failed: {e}")))?;

    let store_data = web::Data::new(store.clone());
    let client_data = web::Data::new(client);
    let annotator_data = web::Data::new(Annotator::from_config(&config));

    if !config.artifact_ttl.is_zero() {
        let sweep_store = store;
        let ttl = config.artifact_ttl;
        let every = config.sweep_interval;
        actix_web::rt::spawn(async move {
            let mut tick = actix_web::rt::time::interval(every);
            loop {
                tick.tick().await;
                match sweep_store.sweep_expired(ttl) {
                    Ok(0) => {}
                    Ok(n) => log::info!("retention sweep removed {n} expired artifact(s)"),
                    Err(e) => log::error!("retention sweep failed: {e}"),
                }
            }
        });
    } else {
        log::warn!("artifact TTL is zero; uploaded and converted files will accumulate");
    }

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    let origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);
        for origin in &origins {
            cors = cors.allowed_origin(origin);
        }
        App::new()
            .wrap(cors)
            .app_data(store_data.clone())
            .app_data(client_data.clone())
            .app_data(annotator_data.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
