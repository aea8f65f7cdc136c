/// Attribute macro for registering a command handler.
/// Usage:
///   #[CommandHandler]
///   #[CommandHandler(factory)]
pub use service_host_macros::CommandHandler;

/// Attribute macro for registering an event handler.
/// Usage:
///   #[EventHandler]
///   #[EventHandler(factory)]
pub use service_host_macros::EventHandler;

/// Attribute macro for registering a pipeline on every in-memory bus.
/// Usage:
/// #[BusPipeline]
pub use service_host_macros::BusPipeline;
