mod model;
mod routes;
mod vegetation;

use actix_web::{App, HttpServer, middleware::Logger, web};
use model::PlaceholderModel;
use routes::configure_routes;
use std::env;

const DEFAULT_PORT: u16 = 7860;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let port = match env::var("PORT") {
        Ok(value) => value.parse::<u16>().map_err(|e| {
            log::error!("Invalid PORT {:?}: {}", value, e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Invalid PORT: {value}"))
        })?,
        Err(_) => DEFAULT_PORT,
    };
    let bind_address = format!("0.0.0.0:{}", port);

    let model = web::Data::new(PlaceholderModel::default());
    log::warn!("No trained model is loaded, predictions come from a placeholder heuristic");
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(model.clone())
            .configure(configure_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}
