use crate::core::error_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("ConfigurationError: Missing value for command-line switch '{0}'")]
    MissingValue(String),

    #[error("ConfigurationError: Invalid command-line argument '{0}'")]
    InvalidArgument(String),

    #[error("ConfigurationError: Configuration file not found '{0}'")]
    FileNotFound(String),

    #[error("ConfigurationError: Cant read file '{0}' error '{1}'")]
    Io(String, String),

    #[error("ConfigurationError: Cant parse file '{0}' error '{1}'")]
    Parse(String, String),

    #[error("ConfigurationError: Invalid value '{1}' for key '{0}' error '{2}'")]
    InvalidValue(String, String, String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
    #[error("ServiceError: No service registered for type '{0}'")]
    NotRegistered(String),

    #[error(
        "ServiceError: Scoped service '{0}' cannot be resolved from the root provider. \
Create a scope with `ServiceProvider::create_scope()` first."
    )]
    ScopedFromRoot(String),

    #[error("ServiceError: Circular dependency detected while resolving '{0}'")]
    CircularDependency(String),

    #[error("ServiceError: Incorrect service type after resolution: '{0}'")]
    IncorrectServiceType(String),

    #[error("ServiceError: Cant construct service '{0}' error '{1}'")]
    FactoryFailed(String, String),
}

impl ServiceError {
    pub fn factory_failed<T: ?Sized>(err: impl std::fmt::Display) -> Self {
        ServiceError::FactoryFailed(std::any::type_name::<T>().to_string(), err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("HostError: Invalid url '{0}' error '{1}'")]
    InvalidUrl(String, String),

    #[error("HostError: No urls configured")]
    NoUrls,

    #[error("HostError: Io error on '{0}': {1}")]
    Io(String, #[source] std::io::Error),
}
