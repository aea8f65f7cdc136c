use crate::core::bus_client::BusClientExt;
use crate::core::configuration::ConfigurationBuilder;
use crate::core::contracts::{
    AnyError, IBusClient, ICommand, ICommandHandler, IEvent, IEventHandler, IStartup, IWebHost,
};
use crate::core::error_host::HostError;
use crate::core::registry::{registered_handlers, registration_conflicts};
use crate::core::services::ServiceProvider;
use crate::core::web_host::{APPLICATION_NAME_KEY, WebHostBuilder};
use std::any::type_name;
use std::sync::Arc;

/// Module path of `T`, e.g. `orders::startup` for `orders::startup::Startup`.
pub(crate) fn type_namespace<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    match path.rfind("::") {
        Some(index) => &path[..index],
        None => path,
    }
}

/// A built host ready to run.
pub struct ServiceHost {
    web_host: Box<dyn IWebHost>,
}

impl ServiceHost {
    pub fn new(web_host: impl IWebHost + 'static) -> Self {
        Self {
            web_host: Box::new(web_host),
        }
    }

    pub fn services(&self) -> &ServiceProvider {
        self.web_host.services()
    }

    pub async fn run_async(self) -> Result<(), HostError> {
        self.web_host.run_async().await
    }

    /// Builds a [`crate::WebHost`] for `TStartup` from environment variables and
    /// `args` (command line wins). The application name defaults to the
    /// module path of `TStartup`.
    pub fn create<TStartup: IStartup>(
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<HostBuilder, HostError> {
        let application_name = type_namespace::<TStartup>();

        #[cfg(feature = "logging")]
        log::info!("Host. Creating '{}'", application_name);

        // the derived name is the lowest layer so `--applicationName` still wins
        let configuration = ConfigurationBuilder::new()
            .add_in_memory([(APPLICATION_NAME_KEY, application_name)])
            .add_environment_variables()
            .add_command_line(args);

        let web_host = WebHostBuilder::new(configuration)
            .use_startup::<TStartup>()
            .build()?;

        Ok(HostBuilder::new(web_host))
    }
}

pub trait BuilderBase {
    fn build(self) -> ServiceHost;
}

pub struct HostBuilder {
    web_host: Box<dyn IWebHost>,
}

impl HostBuilder {
    pub fn new(web_host: impl IWebHost + 'static) -> Self {
        Self {
            web_host: Box::new(web_host),
        }
    }

    /// Attaches the `dyn IBusClient` registered in the host's services.
    pub fn use_bus_client(self) -> Result<BusBuilder, HostError> {
        let bus = self
            .web_host
            .services()
            .get_required_service::<dyn IBusClient>()?;
        Ok(BusBuilder {
            web_host: self.web_host,
            bus,
        })
    }
}

impl BuilderBase for HostBuilder {
    fn build(self) -> ServiceHost {
        ServiceHost {
            web_host: self.web_host,
        }
    }
}

pub struct BusBuilder {
    web_host: Box<dyn IWebHost>,
    bus: Arc<dyn IBusClient>,
}

impl BusBuilder {
    pub fn bus(&self) -> &Arc<dyn IBusClient> {
        &self.bus
    }

    /// Resolves `dyn ICommandHandler<C, E>` in a fresh scope and subscribes it.
    pub fn subscribe_to_command<C, E>(self) -> Result<Self, HostError>
    where
        C: ICommand<E>,
        E: AnyError,
    {
        let scope = self.web_host.services().create_scope();
        let handler = scope
            .service_provider()
            .get_required_service::<dyn ICommandHandler<C, E>>()?;
        self.bus.with_command_handler(handler)?;
        Ok(self)
    }

    /// Resolves `dyn IEventHandler<Ev, E>` in a fresh scope and subscribes it.
    pub fn subscribe_to_event<Ev, E>(self) -> Result<Self, HostError>
    where
        Ev: IEvent<E>,
        E: AnyError,
    {
        let scope = self.web_host.services().create_scope();
        let handler = scope
            .service_provider()
            .get_required_service::<dyn IEventHandler<Ev, E>>()?;
        self.bus.with_event_handler(handler)?;
        Ok(self)
    }

    /// Subscribes every handler declared with `#[CommandHandler]` or
    /// `#[EventHandler]`. Their services come from
    /// [`crate::ServiceCollection::add_registered_handlers`].
    ///
    /// Fails with the first duplicate declaration if one message type was
    /// claimed by more than one handler.
    pub fn subscribe_to_registered_handlers(self) -> Result<Self, HostError> {
        if let Some(conflict) = registration_conflicts().into_iter().next() {
            return Err(conflict.into());
        }

        let mut builder = self;
        for handler in registered_handlers() {
            builder = handler.subscribe(builder)?;
        }
        Ok(builder)
    }
}

impl BuilderBase for BusBuilder {
    fn build(self) -> ServiceHost {
        ServiceHost {
            web_host: self.web_host,
        }
    }
}
