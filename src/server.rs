//! Webhook routes binding a [`Station`] to an HTTP server.
//!
//! `GET /v0/{station}` answers the platform's URL verification handshake by
//! echoing `echostr`; `POST /v0/{station}` carries inbound messages. Both are
//! signed with `timestamp`, `nonce` and `signature` query parameters.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::Error;
use crate::station::Station;

#[derive(Debug, Deserialize)]
struct SignedQuery {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    signature: String,
    #[serde(default)]
    echostr: String,
}

enum Rejection {
    UnknownStation(String),
    Station(Error),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownStation(id) => {
                (StatusCode::NOT_FOUND, format!("no such station: {id}")).into_response()
            }
            Self::Station(Error::InvalidRequest) => {
                (StatusCode::UNAUTHORIZED, Error::InvalidRequest.to_string()).into_response()
            }
            Self::Station(e) => {
                error!("Failed to process message: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

pub fn router(station: Arc<Station>) -> Router {
    Router::new()
        .route("/v0/{station}", get(verify).post(receive))
        .with_state(station)
}

fn authorize(station: &Station, id: &str, query: &SignedQuery) -> Result<(), Rejection> {
    if id != station.id() {
        return Err(Rejection::UnknownStation(id.to_string()));
    }
    station
        .is_valid(&query.timestamp, &query.nonce, &query.signature)
        .map_err(Rejection::Station)
}

async fn verify(
    State(station): State<Arc<Station>>,
    Path(id): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<String, Rejection> {
    authorize(&station, &id, &query)?;
    Ok(query.echostr)
}

async fn receive(
    State(station): State<Arc<Station>>,
    Path(id): Path<String>,
    Query(query): Query<SignedQuery>,
    body: Bytes,
) -> Result<String, Rejection> {
    authorize(&station, &id, &query)?;

    let reply = station.process(&body).await.map_err(Rejection::Station)?;
    debug!("Response: {}", reply);
    Ok(format!("{reply}\n"))
}
