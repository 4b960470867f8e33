use actix_web::{get, HttpResponse, Responder};

use crate::identity::Identity;

#[get("/health")]
pub async fn health(_identity: Identity) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}
