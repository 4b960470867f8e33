use actix_web::{middleware, web, web::Data, App, HttpServer};
use anyhow::Result;

use crate::handlers::{auth, diagnostics, health, logs, metrics, nodes, provider_config, providers, scenarios, targets};
use crate::state::AppState;

/// Configure and start the HTTP server: every named route lives under
/// `/api/v1` (spec §6 "All paths are prefixed `/api/v1`"); `/metrics`
/// and `/` are the ambient exceptions (not part of the named surface)
/// and stay unprefixed and excluded from access logging, following the
/// teacher's own `/metrics` and root diagnostics mounts.
pub async fn start_server(state: AppState, bind_addr: &str) -> Result<()> {
    let state = Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default().exclude("/api/v1/health").exclude("/metrics").exclude("/"))
            .service(metrics::metrics)
            .service(diagnostics::index)
            .service(
                web::scope("/api/v1")
                    .service(health::health)
                    .service(auth::is_registered)
                    .service(auth::register)
                    .service(auth::login)
                    .service(providers::list)
                    .service(providers::set_active)
                    .service(provider_config::create)
                    .service(provider_config::get)
                    .service(provider_config::submit)
                    .service(targets::list)
                    .service(targets::create)
                    .service(targets::get)
                    .service(targets::update)
                    .service(targets::delete)
                    .service(nodes::list)
                    .service(scenarios::list)
                    .service(scenarios::detail)
                    .service(scenarios::globals)
                    .service(scenarios::create)
                    .service(scenarios::list_runs)
                    .service(scenarios::get_run)
                    .service(scenarios::cancel_job)
                    .service(logs::stream),
            )
    })
    .bind(bind_addr)?
    .shutdown_timeout(5);

    server.run().await?;
    Ok(())
}
