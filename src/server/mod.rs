//! HTTP surface exposing the recommendation pipeline.

mod http_layers;
#[allow(clippy::module_inception)]
pub mod server;
pub mod state;

pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::{ServerConfig, ServerState};
