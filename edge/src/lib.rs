mod cache;
pub mod config;
mod edge_service;
mod errors;
pub mod metrics_defs;
mod page;
mod site;

pub use edge_service::EdgeService;
pub use errors::EdgeError;

use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Runs the edge and admin listeners until either fails
pub async fn run(config: config::Config) -> Result<(), EdgeError> {
    let edge_service = EdgeService::try_new(&config)?;

    let edge_task = run_http_service(&config.listener.host, config.listener.port, edge_service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, EdgeError>::new(|| true),
    );

    tokio::try_join!(edge_task, admin_task)?;
    Ok(())
}
