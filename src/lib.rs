pub mod core;
pub mod registry;

pub use crate::core::bus_client::{BusClientExt, InMemoryBusClient};
pub use crate::core::configuration::{Configuration, ConfigurationBuilder};
pub use crate::core::contracts::{
    AnyError, IBusClient, IBusPipeline, ICommand, ICommandHandler, IEvent, IEventHandler,
    IStartup, IWebHost, MessageContext, MessageKind,
};
pub use crate::core::error_bus::BusError;
pub use crate::core::error_host::{ConfigurationError, HostError, ServiceError};
pub use crate::core::service_host::{BuilderBase, BusBuilder, HostBuilder, ServiceHost};
pub use crate::core::services::{ServiceCollection, ServiceLifetime, ServiceProvider};
pub use crate::core::web_host::{ShutdownHandle, WebHost, WebHostBuilder};
