use actix_web::{get, HttpResponse, Responder};

use krkn_core::shared_state::SharedState;

/// Unauthenticated process snapshot, mirroring the teacher's `/` root
/// handler: whatever the reconciler loops have stamped into the shared
/// state, currently just `last_reconcile`.
#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(SharedState::global().snapshot().await)
}
