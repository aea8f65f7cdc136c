pub mod bus_client;
pub mod configuration;
pub mod contracts;
pub mod error_bus;
pub mod error_host;
pub mod factory;
pub mod message;
pub mod registry;
pub mod service_host;
pub mod services;
pub mod web_host;

mod bus_pipeline;
mod handlers;
