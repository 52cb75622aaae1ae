use crate::auth::{Authenticated, LocalStrategy, LoginParams, Strategy};
use crate::credentials::CredentialStore;
use crate::database::MovieDb;
use crate::enrichment::{enrich, PosterSource};
use crate::error::{Error, FieldError, Result};
use crate::favorites;
use crate::model::*;
use crate::token::{IssuedToken, TokenIssuer};
use crate::validation::validate_movie;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use log::info;
use serde::Serialize;
use std::collections::BTreeSet;

type Db = web::Data<sled::Db>;
type Store = web::Data<CredentialStore>;
type Posters = web::Data<dyn PosterSource>;

/// Bodies that parse as JSON but not as the expected shape are rejected like
/// any other invalid input.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match err {
        JsonPayloadError::Deserialize(err) => Error::Validation(vec![FieldError {
            field: "body".to_owned(),
            message: err.to_string(),
        }])
        .into(),
        other => other.into(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/", web::get().to(index))
        .route("/login", web::post().to(login))
        .route("/users", web::post().to(register))
        .route("/users/{username}", web::get().to(profile))
        .route("/users/{username}", web::put().to(update_profile))
        .route("/users/{username}", web::delete().to(deregister))
        .route(
            "/users/{username}/movies/{movie_id}",
            web::post().to(add_favorite),
        )
        .route(
            "/users/{username}/movies/{movie_id}",
            web::delete().to(remove_favorite),
        )
        .route("/movies", web::get().to(list_movies))
        .route("/movies", web::post().to(create_movie))
        .route("/movies/genre/{name}", web::get().to(genre))
        .route("/movies/directors/{name}", web::get().to(director))
        .route("/movies/id/{movie_id}", web::put().to(replace_movie))
        .route("/movies/id/{movie_id}", web::delete().to(delete_movie))
        .route("/movies/{title}", web::get().to(movie_by_title));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body("Looking for myFlix? Add \"/movies\" to the end of the URL to get there")
}

#[derive(Serialize)]
struct LoginResponse {
    user: Profile,
    #[serde(flatten)]
    token: IssuedToken,
}

async fn login(
    params: web::Json<LoginParams>,
    local: web::Data<LocalStrategy>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse> {
    let identity = local.resolve(&params)?;
    let token = issuer.issue(&identity)?;
    info!("issued token for {}", identity.user.username);
    Ok(HttpResponse::Ok().json(LoginResponse {
        user: Profile::from(&identity),
        token,
    }))
}

async fn register(params: web::Json<Registration>, store: Store) -> Result<HttpResponse> {
    let identity = store.register(params.into_inner())?;
    Ok(HttpResponse::Created().json(Profile::from(&identity)))
}

async fn profile(
    Authenticated(actor): Authenticated,
    username: web::Path<String>,
    store: Store,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(store.profile(&actor, &username)?))
}

async fn update_profile(
    Authenticated(actor): Authenticated,
    username: web::Path<String>,
    params: web::Json<ProfileUpdate>,
    store: Store,
) -> Result<HttpResponse> {
    let identity = store.update_profile(&actor, &username, params.into_inner())?;
    Ok(HttpResponse::Ok().json(Profile::from(&identity)))
}

async fn deregister(
    Authenticated(actor): Authenticated,
    username: web::Path<String>,
    store: Store,
) -> Result<HttpResponse> {
    store.deregister(&actor, &username)?;
    Ok(HttpResponse::Ok().body(format!("{} has been deregistered", username)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Favorites {
    favorite_movies: BTreeSet<MovieRef>,
}

async fn add_favorite(
    Authenticated(actor): Authenticated,
    path: web::Path<(String, MovieRef)>,
    db: Db,
) -> Result<HttpResponse> {
    let (username, movie) = path.into_inner();
    let favorite_movies = favorites::add_favorite(&db, &actor, &username, movie)?;
    Ok(HttpResponse::Ok().json(Favorites { favorite_movies }))
}

async fn remove_favorite(
    Authenticated(actor): Authenticated,
    path: web::Path<(String, MovieRef)>,
    db: Db,
) -> Result<HttpResponse> {
    let (username, movie) = path.into_inner();
    let favorite_movies = favorites::remove_favorite(&db, &actor, &username, movie)?;
    Ok(HttpResponse::Ok().json(Favorites { favorite_movies }))
}

async fn list_movies(_: Authenticated, db: Db, posters: Posters) -> Result<HttpResponse> {
    let mut movies = db.list_movies()?;
    for entry in movies.iter_mut() {
        enrich(posters.get_ref(), entry);
    }
    Ok(HttpResponse::Ok().json(movies))
}

async fn movie_by_title(
    _: Authenticated,
    title: web::Path<String>,
    db: Db,
    posters: Posters,
) -> Result<HttpResponse> {
    let mut entry = db
        .find_movie_by_title(&title)?
        .ok_or_else(|| Error::NotFound(format!("movie {:?}", title.as_str())))?;
    enrich(posters.get_ref(), &mut entry);
    Ok(HttpResponse::Ok().json(entry))
}

async fn genre(_: Authenticated, name: web::Path<String>, db: Db) -> Result<HttpResponse> {
    let genre = db
        .find_genre(&name)?
        .ok_or_else(|| Error::NotFound(format!("genre {:?}", name.as_str())))?;
    Ok(HttpResponse::Ok().json(genre))
}

async fn director(_: Authenticated, name: web::Path<String>, db: Db) -> Result<HttpResponse> {
    let director = db
        .find_director(&name)?
        .ok_or_else(|| Error::NotFound(format!("director {:?}", name.as_str())))?;
    Ok(HttpResponse::Ok().json(director))
}

async fn create_movie(
    Authenticated(actor): Authenticated,
    draft: web::Json<MovieDraft>,
    db: Db,
) -> Result<HttpResponse> {
    let movie = validate_movie(draft.into_inner())?;
    let id = db.add_movie(&movie)?;
    info!("{} added movie {} ({})", actor.user.username, movie.title, id);
    Ok(HttpResponse::Created().json(MovieEntry { id, movie }))
}

async fn replace_movie(
    Authenticated(actor): Authenticated,
    id: web::Path<MovieRef>,
    draft: web::Json<MovieDraft>,
    db: Db,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    let movie = validate_movie(draft.into_inner())?;
    db.replace_movie(id, &movie)?;
    info!("{} replaced movie {}", actor.user.username, id);
    Ok(HttpResponse::Ok().json(MovieEntry { id, movie }))
}

async fn delete_movie(
    Authenticated(actor): Authenticated,
    id: web::Path<MovieRef>,
    db: Db,
) -> Result<HttpResponse> {
    let id = id.into_inner();
    db.remove_movie(id)?;
    info!("{} deleted movie {}", actor.user.username, id);
    Ok(HttpResponse::Ok().body(format!("movie {} has been deleted", id)))
}
