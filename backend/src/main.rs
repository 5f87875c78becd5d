use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use backend::config::{AppConfig, ServerSettings};
use backend::routes::configure_routes;
use backend::{Classifier, GateEngine};
use std::env;
use std::sync::Arc;

#[cfg(feature = "torch")]
fn load_classifier(model_path: &str) -> std::io::Result<Arc<dyn Classifier>> {
    let classifier = backend::inference::TorchClassifier::load(model_path)
        .map_err(|e| std::io::Error::other(format!("Model loading failed: {}", e)))?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "torch"))]
fn load_classifier(model_path: &str) -> std::io::Result<Arc<dyn Classifier>> {
    Err(std::io::Error::other(format!(
        "Cannot load {}: backend was built without the `torch` feature",
        model_path
    )))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let settings = ServerSettings::from_env();
    let config = AppConfig::from_env().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other(e.to_string())
    })?;
    log::info!("Gate thresholds: {:?}", config.gate);

    let classifier = match load_classifier(&settings.model_path) {
        Ok(classifier) => classifier,
        Err(e) => {
            log::error!("Failed to load model at startup: {}", e);
            return Err(e);
        }
    };

    let engine = GateEngine::new(classifier, config);
    let status = engine.health();
    if status.ready {
        log::info!("Model {} ready with {} classes", status.model, status.classes);
    } else {
        log::warn!("Model {} failed its warm-up pass", status.model);
    }

    let bind_address = settings.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(engine.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
