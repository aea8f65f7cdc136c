use crate::core::error_host::ServiceError;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

type ErasedInstance = Arc<dyn Any + Send + Sync>;
type ServiceFactory =
    dyn Fn(&ServiceProvider) -> Result<ErasedInstance, ServiceError> + Send + Sync + 'static;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// One instance per root provider.
    Singleton,
    /// One instance per [`ServiceScope`].
    Scoped,
    /// A new instance on every resolve.
    Transient,
}

#[derive(Clone)]
struct ServiceDescriptor {
    lifetime: ServiceLifetime,
    type_name: &'static str,
    factory: Arc<ServiceFactory>,
}

/// Registration side of the container.
///
/// Services are keyed by the `TypeId` of `T`, which may be unsized, so trait
/// objects such as `dyn IBusClient` are registered and resolved directly.
/// Registering the same `T` twice keeps the last registration.
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: HashMap<TypeId, ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        let type_name = type_name::<T>();
        let erased: Arc<ServiceFactory> = Arc::new(move |provider| {
            let instance = factory(provider)?;
            Ok(Arc::new(instance) as ErasedInstance)
        });

        let previous = self.descriptors.insert(
            TypeId::of::<T>(),
            ServiceDescriptor {
                lifetime,
                type_name,
                factory: erased,
            },
        );

        #[cfg(feature = "logging")]
        if previous.is_some() {
            log::debug!("Services. Registration for '{}' replaced", type_name);
        }
        #[cfg(not(feature = "logging"))]
        let _ = previous;

        self
    }

    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        self.add(ServiceLifetime::Singleton, factory)
    }

    pub fn add_singleton_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceLifetime::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        self.add(ServiceLifetime::Scoped, factory)
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        self.add(ServiceLifetime::Transient, factory)
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.descriptors.contains_key(&TypeId::of::<T>())
    }

    pub fn lifetime_of<T: ?Sized + 'static>(&self) -> Option<ServiceLifetime> {
        self.descriptors
            .get(&TypeId::of::<T>())
            .map(|descriptor| descriptor.lifetime)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn build_service_provider(self) -> ServiceProvider {
        ServiceProvider {
            root: Arc::new(RootState {
                descriptors: self.descriptors,
                singletons: DashMap::new(),
            }),
            scope: None,
        }
    }
}

struct RootState {
    descriptors: HashMap<TypeId, ServiceDescriptor>,
    singletons: DashMap<TypeId, Arc<OnceCell<ErasedInstance>>>,
}

#[derive(Default)]
struct ScopeState {
    instances: DashMap<TypeId, Arc<OnceCell<ErasedInstance>>>,
}

thread_local! {
    static RESOLVING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as being constructed on the current thread for the
/// lifetime of the guard.
struct ResolutionGuard {
    key: TypeId,
}

impl ResolutionGuard {
    fn enter(key: TypeId, type_name: &'static str) -> Result<Self, ServiceError> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                return Err(ServiceError::CircularDependency(type_name.to_string()));
            }
            stack.push(key);
            Ok(Self { key })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|key| *key == self.key) {
                stack.remove(position);
            }
        });
    }
}

/// Resolution side of the container. Cloning is cheap and clones share the
/// same singletons (and the same scope, for scoped providers).
#[derive(Clone)]
pub struct ServiceProvider {
    root: Arc<RootState>,
    scope: Option<Arc<ScopeState>>,
}

impl ServiceProvider {
    pub fn get_service<T>(&self) -> Result<Option<Arc<T>>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();
        let Some(descriptor) = self.root.descriptors.get(&key) else {
            return Ok(None);
        };

        let instance = self.resolve(key, descriptor)?;
        instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .map(Some)
            .ok_or_else(|| ServiceError::IncorrectServiceType(type_name::<T>().to_string()))
    }

    pub fn get_required_service<T>(&self) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_service::<T>()?
            .ok_or_else(|| ServiceError::NotRegistered(type_name::<T>().to_string()))
    }

    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope {
            provider: ServiceProvider {
                root: Arc::clone(&self.root),
                scope: Some(Arc::new(ScopeState::default())),
            },
        }
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    fn root_provider(&self) -> ServiceProvider {
        ServiceProvider {
            root: Arc::clone(&self.root),
            scope: None,
        }
    }

    fn resolve(
        &self,
        key: TypeId,
        descriptor: &ServiceDescriptor,
    ) -> Result<ErasedInstance, ServiceError> {
        let _guard = ResolutionGuard::enter(key, descriptor.type_name)?;

        match descriptor.lifetime {
            ServiceLifetime::Transient => (descriptor.factory)(self),
            ServiceLifetime::Singleton => {
                let cell = self.root.singletons.entry(key).or_default().value().clone();
                // singletons never see the scope they were first requested from
                let root = self.root_provider();
                cell.get_or_try_init(|| (descriptor.factory)(&root))
                    .cloned()
            }
            ServiceLifetime::Scoped => {
                let scope = self
                    .scope
                    .as_ref()
                    .ok_or_else(|| ServiceError::ScopedFromRoot(descriptor.type_name.to_string()))?;
                let cell = scope.instances.entry(key).or_default().value().clone();
                cell.get_or_try_init(|| (descriptor.factory)(self)).cloned()
            }
        }
    }
}

/// A child provider whose scoped instances are released when the scope is
/// dropped.
pub struct ServiceScope {
    provider: ServiceProvider,
}

impl ServiceScope {
    pub fn service_provider(&self) -> &ServiceProvider {
        &self.provider
    }
}
