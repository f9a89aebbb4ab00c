use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::body::{Body, Bytes};
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use movie_catalog_api::{Backend, CatalogApi, MirrorConfig};
use movie_catalog_core::{CatalogError, Movie, INVALID_REQUEST_FORMAT};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Clone)]
struct ServiceState {
    api: CatalogApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: Backend,
    movies: usize,
}

#[derive(Debug, Parser)]
#[command(name = "movie-catalog-service")]
#[command(about = "HTTP service for a small movie catalog")]
struct Args {
    /// Optional SQLite mirror; `:memory:` keeps it in-process.
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, default_value = "0.0.0.0:2565")]
    bind: SocketAddr,
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(kind = err.kind(), error = %err, "request rejected");
        Self { status, error: err.to_string() }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/openapi", get(openapi))
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/", get(get_movie_without_id))
        .route("/movies/:id", get(get_movie))
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("tracing init failed: {err}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let api = CatalogApi::open(&MirrorConfig::from_db_arg(args.db))?;
    tracing::info!(
        backend = api.backend().as_str(),
        movies = api.movie_count()?,
        "movie catalog seeded"
    );

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "starting movie catalog service");
    axum::serve(listener, app(ServiceState { api })).await?;
    Ok(())
}

async fn health(State(state): State<ServiceState>) -> Result<Json<HealthResponse>, ServiceError> {
    let movies = state.api.movie_count()?;
    Ok(Json(HealthResponse { status: "ok", backend: state.api.backend(), movies }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

/// Only the first `year` pair counts; repeated keys are ignored.
fn first_year(pairs: &[(String, String)]) -> Option<&str> {
    pairs.iter().find(|(key, _)| key == "year").map(|(_, value)| value.as_str())
}

async fn list_movies(
    State(state): State<ServiceState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<Movie>>, ServiceError> {
    let Query(pairs) = query.map_err(|rejection| {
        tracing::debug!(error = %rejection, "unreadable query string");
        ServiceError::from(CatalogError::invalid_input(INVALID_REQUEST_FORMAT))
    })?;
    let movies = state.api.list_movies(first_year(&pairs))?;
    Ok(Json(movies))
}

async fn get_movie(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ServiceError> {
    let movie = state.api.get_movie_by_id(&id)?;
    Ok(Json(movie))
}

async fn get_movie_without_id(
    State(state): State<ServiceState>,
) -> Result<Json<Movie>, ServiceError> {
    let movie = state.api.get_movie_by_id("")?;
    Ok(Json(movie))
}

fn unreadable_payload(error: &dyn std::fmt::Display) -> ServiceError {
    tracing::debug!(error = %error, "unreadable movie payload");
    ServiceError::from(CatalogError::invalid_input(INVALID_REQUEST_FORMAT))
}

/// Decode a create payload. An empty body or a JSON `null` yields a zero-valued
/// movie, leaving the rejection to field validation.
async fn decode_movie(headers: HeaderMap, body: Bytes) -> Result<Movie, ServiceError> {
    if body.is_empty() {
        return Ok(Movie::default());
    }

    let mut request = Request::new(Body::from(body));
    *request.headers_mut() = headers;
    let Json(movie) = Json::<Option<Movie>>::from_request(request, &())
        .await
        .map_err(|rejection| unreadable_payload(&rejection))?;
    Ok(movie.unwrap_or_default())
}

async fn create_movie(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Movie>), ServiceError> {
    let body = body.map_err(|rejection| unreadable_payload(&rejection))?;
    let movie = decode_movie(headers, body).await?;
    let movie = state.api.create_movie(movie)?;
    Ok((StatusCode::CREATED, Json(movie)))
}
