use actix_web::{get, web::Data, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};

use crate::state::AppState;

#[get("/metrics")]
pub async fn metrics(state: Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&state.registry.gather(), &mut buffer).unwrap();
    HttpResponse::Ok().body(buffer)
}
