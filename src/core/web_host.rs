use crate::core::configuration::{Configuration, ConfigurationBuilder};
use crate::core::contracts::{IStartup, IWebHost};
use crate::core::error_host::HostError;
use crate::core::services::{ServiceCollection, ServiceProvider};
use async_trait::async_trait;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use url::Url;

pub const URLS_KEY: &str = "urls";
pub const APPLICATION_NAME_KEY: &str = "applicationName";
pub const DEFAULT_URLS: &str = "http://localhost:5000";

/// Stops a running [`WebHost`]. Registered as a singleton in every host's
/// services so handlers can request a shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindUrl {
    pub url: String,
    pub host: String,
    pub port: u16,
}

pub(crate) fn parse_urls(value: &str) -> Result<Vec<BindUrl>, HostError> {
    let mut urls = Vec::new();

    for raw in value.split(';').map(str::trim).filter(|raw| !raw.is_empty()) {
        let normalized = raw.replacen("://*", "://0.0.0.0", 1).replacen("://+", "://0.0.0.0", 1);
        let url = Url::parse(&normalized)
            .map_err(|err| HostError::InvalidUrl(raw.to_string(), err.to_string()))?;

        if url.scheme() != "http" {
            return Err(HostError::InvalidUrl(
                raw.to_string(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let host = url
            .host_str()
            .ok_or_else(|| HostError::InvalidUrl(raw.to_string(), "missing host".to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        urls.push(BindUrl {
            url: raw.to_string(),
            host,
            port,
        });
    }

    if urls.is_empty() {
        return Err(HostError::NoUrls);
    }
    Ok(urls)
}

/// Axum based web host.
pub struct WebHost {
    services: ServiceProvider,
    router: Router<ServiceProvider>,
    urls: Vec<BindUrl>,
    application_name: String,
    shutdown: ShutdownHandle,
}

impl WebHost {
    pub fn builder() -> WebHostBuilder {
        WebHostBuilder::new(ConfigurationBuilder::new())
    }

    /// Builder preloaded with environment variables and `args`.
    pub fn create_default_builder<S: Into<String>>(
        args: impl IntoIterator<Item = S>,
    ) -> WebHostBuilder {
        WebHostBuilder::new(
            ConfigurationBuilder::new()
                .add_environment_variables()
                .add_command_line(args),
        )
    }

    pub fn urls(&self) -> &[BindUrl] {
        &self.urls
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Axum router with the host's services attached as state.
    pub fn app(&self) -> Router {
        self.router.clone().with_state(self.services.clone())
    }

    async fn bind(&self) -> Result<Vec<(BindUrl, TcpListener)>, HostError> {
        let mut listeners = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let listener = TcpListener::bind((url.host.as_str(), url.port))
                .await
                .map_err(|err| HostError::Io(url.url.clone(), err))?;
            listeners.push((url.clone(), listener));
        }
        Ok(listeners)
    }
}

#[async_trait]
impl IWebHost for WebHost {
    fn services(&self) -> &ServiceProvider {
        &self.services
    }

    /// Serves every configured url until Ctrl+C or [`ShutdownHandle::shutdown`].
    async fn run_async(&self) -> Result<(), HostError> {
        let listeners = self.bind().await?;
        let app = self.app();

        let signal_handle = self.shutdown.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                #[cfg(feature = "logging")]
                log::info!("Host. Shutdown signal received");
                signal_handle.shutdown();
            }
        });

        let servers = listeners.into_iter().map(|(url, listener)| {
            let app = app.clone();
            let mut shutdown_rx = self.shutdown.subscribe();
            #[cfg(feature = "logging")]
            let application_name = self.application_name.clone();

            async move {
                #[cfg(feature = "logging")]
                log::info!(
                    "Host. '{}' listening on {} ({:?})",
                    application_name,
                    url.url,
                    listener.local_addr().ok()
                );

                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
                    })
                    .await
                    .map_err(|err| HostError::Io(url.url.clone(), err))?;

                #[cfg(feature = "logging")]
                log::info!("Host. Stopped listening on {}", url.url);

                Ok::<_, HostError>(())
            }
        });

        let result = futures::future::try_join_all(servers).await;
        signal_task.abort();
        result.map(|_| ())
    }
}

type ConfigureServices = Box<dyn FnOnce(&Configuration, &mut ServiceCollection) + Send>;
type StartupFactory = fn(&Configuration) -> Box<dyn IStartup>;

pub struct WebHostBuilder {
    configuration: ConfigurationBuilder,
    overrides: Vec<Configuration>,
    startup: Option<StartupFactory>,
    configure_services: Vec<ConfigureServices>,
}

impl WebHostBuilder {
    pub fn new(configuration: ConfigurationBuilder) -> Self {
        Self {
            configuration,
            overrides: Vec::new(),
            startup: None,
            configure_services: Vec::new(),
        }
    }

    pub fn use_configuration(mut self, configuration: Configuration) -> Self {
        self.overrides.push(configuration);
        self
    }

    pub fn use_setting(mut self, key: &str, value: impl Into<String>) -> Self {
        let mut configuration = Configuration::new();
        configuration.set(key, value);
        self.overrides.push(configuration);
        self
    }

    pub fn use_urls(self, urls: impl Into<String>) -> Self {
        self.use_setting(URLS_KEY, urls)
    }

    pub fn use_startup<TStartup: IStartup>(mut self) -> Self {
        self.startup = Some(|configuration: &Configuration| -> Box<dyn IStartup> {
            Box::new(TStartup::new(configuration))
        });
        self
    }

    pub fn configure_services<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&Configuration, &mut ServiceCollection) + Send + 'static,
    {
        self.configure_services.push(Box::new(configure));
        self
    }

    pub fn build(self) -> Result<WebHost, HostError> {
        let mut configuration = self.configuration.build()?;
        for overrides in &self.overrides {
            configuration.merge(overrides);
        }

        let urls = parse_urls(configuration.get(URLS_KEY).unwrap_or(DEFAULT_URLS))?;
        let application_name = configuration
            .get(APPLICATION_NAME_KEY)
            .unwrap_or_default()
            .to_string();
        let shutdown = ShutdownHandle::new();
        let startup = self.startup.map(|factory| factory(&configuration));

        let mut services = ServiceCollection::new();
        services
            .add_singleton_instance(Arc::new(configuration.clone()))
            .add_singleton_instance(Arc::new(shutdown.clone()));
        for configure in self.configure_services {
            configure(&configuration, &mut services);
        }
        if let Some(startup) = &startup {
            startup.configure_services(&mut services);
        }

        let router = match &startup {
            Some(startup) => startup.configure(Router::new()),
            None => Router::new(),
        };

        #[cfg(feature = "logging")]
        log::debug!(
            "Host. '{}' built with {} services",
            application_name,
            services.len()
        );

        Ok(WebHost {
            services: services.build_service_provider(),
            router,
            urls,
            application_name,
            shutdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Greeting(String);

    struct TestStartup {
        greeting: String,
    }

    impl IStartup for TestStartup {
        fn new(configuration: &Configuration) -> Self {
            Self {
                greeting: configuration.get("greeting").unwrap_or("hi").to_string(),
            }
        }

        fn configure_services(&self, services: &mut ServiceCollection) {
            let greeting = self.greeting.clone();
            services.add_singleton(move |_| Ok(Arc::new(Greeting(greeting.clone()))));
        }

        fn configure(&self, app: Router<ServiceProvider>) -> Router<ServiceProvider> {
            app.route("/greet", get(greet))
        }
    }

    async fn greet(State(services): State<ServiceProvider>) -> Result<String, StatusCode> {
        services
            .get_required_service::<Greeting>()
            .map(|greeting| greeting.0.clone())
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[test]
    fn test_parse_urls() {
        let urls = parse_urls("http://localhost:5000; http://*:8080;http://[::]:9000").unwrap();

        assert_eq!(
            urls,
            vec![
                BindUrl {
                    url: "http://localhost:5000".into(),
                    host: "localhost".into(),
                    port: 5000,
                },
                BindUrl {
                    url: "http://*:8080".into(),
                    host: "0.0.0.0".into(),
                    port: 8080,
                },
                BindUrl {
                    url: "http://[::]:9000".into(),
                    host: "::".into(),
                    port: 9000,
                },
            ]
        );
    }

    #[test]
    fn test_parse_urls_defaults_port_and_rejects_invalid() {
        assert_eq!(parse_urls("http://example.local").unwrap()[0].port, 80);
        assert!(matches!(
            parse_urls("https://localhost:5001"),
            Err(HostError::InvalidUrl(_, _))
        ));
        assert!(matches!(parse_urls("not a url"), Err(HostError::InvalidUrl(_, _))));
        assert!(matches!(parse_urls(" ; "), Err(HostError::NoUrls)));
    }

    #[test]
    fn test_build_uses_default_urls_and_registers_host_services() {
        let host = WebHost::builder().build().unwrap();

        assert_eq!(host.urls()[0].url, DEFAULT_URLS);
        assert!(host.services().get_required_service::<Configuration>().is_ok());
        assert!(host.services().get_required_service::<ShutdownHandle>().is_ok());
    }

    #[test]
    fn test_overrides_apply_in_order() {
        let mut configuration = Configuration::new();
        configuration.set(URLS_KEY, "http://127.0.0.1:7001");
        configuration.set(APPLICATION_NAME_KEY, "orders");

        let host = WebHost::builder()
            .use_urls("http://127.0.0.1:7000")
            .use_configuration(configuration)
            .build()
            .unwrap();

        assert_eq!(host.urls()[0].port, 7001);
        assert_eq!(host.application_name(), "orders");
    }

    #[test]
    fn test_default_builder_reads_command_line() {
        let host = WebHost::create_default_builder(["--urls", "http://127.0.0.1:7002"])
            .build()
            .unwrap();

        assert_eq!(host.urls()[0].port, 7002);
    }

    #[tokio::test]
    async fn test_startup_configures_services_and_routes() {
        let host = WebHost::builder()
            .use_setting("greeting", "hello")
            .use_startup::<TestStartup>()
            .build()
            .unwrap();

        let response = host
            .app()
            .oneshot(Request::builder().uri("/greet").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_configure_services_runs_before_startup() {
        let host = WebHost::builder()
            .configure_services(|_, services| {
                services.add_singleton(|_| Ok(Arc::new(Greeting("early".into()))));
            })
            .use_startup::<TestStartup>()
            .build()
            .unwrap();

        let greeting = host.services().get_required_service::<Greeting>().unwrap();
        assert_eq!(greeting.0, "hi");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let host = Arc::new(
            WebHost::builder()
                .use_urls("http://127.0.0.1:0")
                .build()
                .unwrap(),
        );
        let shutdown = host.shutdown_handle();

        let running = {
            let host = Arc::clone(&host);
            tokio::spawn(async move { host.run_async().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("host did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let host = WebHost::builder()
            .use_urls(format!("http://127.0.0.1:{}", port))
            .build()
            .unwrap();

        assert!(matches!(host.run_async().await, Err(HostError::Io(_, _))));
    }
}
