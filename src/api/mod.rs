pub mod models;

#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "server")]
pub use server::{create_router, run_server};
