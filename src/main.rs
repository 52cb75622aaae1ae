mod auth;
mod config;
mod credentials;
mod database;
mod enrichment;
mod error;
mod favorites;
mod model;
mod routes;
mod token;
mod validation;

use actix_web::{middleware::Logger, web, App, HttpServer};
use auth::{BearerStrategy, LocalStrategy};
use credentials::CredentialStore;
use enrichment::{NoPosters, PosterSource};
use log::{error, info};
use std::io;
use std::sync::Arc;
use token::TokenIssuer;

fn open_database(settings: &config::Settings) -> sled::Result<sled::Db> {
    match &settings.database_path {
        Some(path) => sled::open(path),
        None => {
            info!("no database_path configured, using a temporary database");
            sled::Config::new().temporary(true).open()
        }
    }
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("myflix=debug,actix_web=info"),
    )
    .init();

    let settings = match config::Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            error!("invalid configuration: {}", err);
            return Err(io::Error::new(io::ErrorKind::Other, err.to_string()));
        }
    };

    let db = open_database(&settings)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    let issuer = TokenIssuer::new(
        &settings.jwt_secret,
        chrono::Duration::seconds(settings.token_ttl_secs),
    );
    let store = CredentialStore::new(db.clone(), settings.bcrypt_cost);

    let db_data = web::Data::new(db.clone());
    let store_data = web::Data::new(store.clone());
    let local = web::Data::new(LocalStrategy::new(store));
    let bearer = web::Data::new(BearerStrategy::new(db, issuer.clone()));
    let issuer = web::Data::new(issuer);
    let posters: Arc<dyn PosterSource> = Arc::new(NoPosters);
    let posters = web::Data::from(posters);

    let address = (settings.bind_address.clone(), settings.port);
    info!("listening on {}:{}", address.0, address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db_data.clone())
            .app_data(store_data.clone())
            .app_data(local.clone())
            .app_data(bearer.clone())
            .app_data(issuer.clone())
            .app_data(posters.clone())
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await
}
