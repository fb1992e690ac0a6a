// Library exports for testing and HTTP API

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod service;

// Re-export commonly used types
pub use config::EngineConfig;
pub use service::SlipwayService;
