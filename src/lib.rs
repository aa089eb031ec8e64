pub mod aggregate;
pub mod clients;
pub mod config;
pub mod helpers;
pub mod models;
pub mod routes;

use std::sync::Arc;

use clients::ClusterClient;
use clients::fleet::FleetClient;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetClient<ClusterClient>>,
    pub config: Arc<config::Config>,
}
