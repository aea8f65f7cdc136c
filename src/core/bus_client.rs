use crate::core::bus_pipeline::chain;
use crate::core::contracts::{
    AnyError, ErasedError, IBusClient, IBusPipeline, ICommand, ICommandHandler, IEvent,
    IEventHandler, MessageKind,
};
use crate::core::error_bus::BusError;
use crate::core::handlers::into_typed_error;
use crate::core::message::{Envelope, Subscription};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use parking_lot::RwLock;
use std::any::type_name;
use std::sync::Arc;

/// Process-local bus client.
///
/// Commands have exactly one subscriber; events fan out to every subscriber
/// concurrently and the first failure is returned to the publisher.
#[derive(Default)]
pub struct InMemoryBusClient {
    commands: DashMap<&'static str, Arc<Subscription>>,
    events: DashMap<&'static str, Vec<Arc<Subscription>>>,
    pipelines: RwLock<Vec<Arc<dyn IBusPipeline>>>,
}

impl InMemoryBusClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline(self, pipeline: Arc<dyn IBusPipeline>) -> Self {
        self.add_pipeline(pipeline);
        self
    }

    pub fn add_pipeline(&self, pipeline: Arc<dyn IBusPipeline>) {
        self.pipelines.write().push(pipeline);
    }

    pub fn subscription_count(&self, kind: MessageKind) -> usize {
        match kind {
            MessageKind::Command => self.commands.len(),
            MessageKind::Event => self.events.iter().map(|entry| entry.value().len()).sum(),
        }
    }

    pub fn is_subscribed(&self, kind: MessageKind, message_name: &str) -> bool {
        match kind {
            MessageKind::Command => self.commands.contains_key(message_name),
            MessageKind::Event => self
                .events
                .get(message_name)
                .is_some_and(|subscriptions| !subscriptions.is_empty()),
        }
    }
}

#[async_trait]
impl IBusClient for InMemoryBusClient {
    fn subscribe(&self, subscription: Subscription) -> Result<(), BusError> {
        let message_name = subscription.message_name;
        let handler_name = subscription.handler_name;

        match subscription.kind {
            MessageKind::Command => match self.commands.entry(message_name) {
                Entry::Occupied(_) => {
                    return Err(BusError::CommandHandlerRegistered(
                        message_name.to_string(),
                        handler_name.to_string(),
                    ));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(subscription));
                }
            },
            MessageKind::Event => {
                self.events
                    .entry(message_name)
                    .or_default()
                    .push(Arc::new(subscription));
            }
        }

        #[cfg(feature = "logging")]
        log::info!("Bus. '{}' subscribed to '{}'", handler_name, message_name);

        Ok(())
    }

    async fn dispatch(&self, envelope: Envelope) -> Result<(), ErasedError> {
        let Envelope { context, payload } = envelope;
        let pipelines = self.pipelines.read().clone();

        match context.kind {
            MessageKind::Command => {
                let subscription = self
                    .commands
                    .get(context.message_name.as_str())
                    .map(|entry| Arc::clone(entry.value()))
                    .ok_or_else(|| BusError::CommandHandlerNotFound(context.message_name.clone()))?;

                let message = subscription.decode(payload)?;
                let handler = chain(Arc::clone(&subscription.handler), &pipelines);
                let result = handler.handle(&context, message).await;

                #[cfg(feature = "logging")]
                if let Err(err) = &result {
                    log::error!(
                        "Bus. Command '{}' ({}) failed in '{}': {}",
                        context.message_name,
                        context.message_id,
                        subscription.handler_name,
                        err
                    );
                }

                result
            }
            MessageKind::Event => {
                let subscriptions = match self.events.get(context.message_name.as_str()) {
                    Some(entry) if !entry.is_empty() => entry.value().clone(),
                    _ => return Ok(()),
                };

                let message = subscriptions[0].decode(payload)?;
                let mut futures = FuturesUnordered::new();

                for subscription in subscriptions {
                    let handler = chain(Arc::clone(&subscription.handler), &pipelines);
                    let message = Arc::clone(&message);
                    let context = &context;
                    futures.push(async move {
                        let result = handler.handle(context, message).await;

                        #[cfg(feature = "logging")]
                        if let Err(err) = &result {
                            log::error!(
                                "Bus. Event '{}' ({}) failed in '{}': {}",
                                context.message_name,
                                context.message_id,
                                subscription.handler_name,
                                err
                            );
                        }

                        result
                    });
                }

                // every subscriber runs to completion even after a sibling fails
                let mut first_error = None;
                while let Some(result) = futures.next().await {
                    if let Err(err) = result {
                        first_error.get_or_insert(err);
                    }
                }

                match first_error {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Typed helpers available on every [`IBusClient`], including `dyn IBusClient`.
#[async_trait]
pub trait BusClientExt: IBusClient {
    fn with_command_handler<C, E>(
        &self,
        handler: Arc<dyn ICommandHandler<C, E>>,
    ) -> Result<(), BusError>
    where
        C: ICommand<E>,
        E: AnyError,
    {
        self.subscribe(Subscription::command(handler))
    }

    fn with_event_handler<Ev, E>(&self, handler: Arc<dyn IEventHandler<Ev, E>>) -> Result<(), BusError>
    where
        Ev: IEvent<E>,
        E: AnyError,
    {
        self.subscribe(Subscription::event(handler))
    }

    async fn send_async<C, E>(&self, command: C) -> Result<(), E>
    where
        C: ICommand<E>,
        E: AnyError,
    {
        self.dispatch(Envelope::typed(MessageKind::Command, command))
            .await
            .map_err(|err| into_typed_error::<E>(type_name::<C>(), err))
    }

    async fn publish_async<Ev, E>(&self, event: Ev) -> Result<(), E>
    where
        Ev: IEvent<E>,
        E: AnyError,
    {
        self.dispatch(Envelope::typed(MessageKind::Event, event))
            .await
            .map_err(|err| into_typed_error::<E>(type_name::<Ev>(), err))
    }

    async fn dispatch_json(
        &self,
        kind: MessageKind,
        message_name: &str,
        value: serde_json::Value,
    ) -> Result<(), ErasedError> {
        self.dispatch(Envelope::json(kind, message_name, value)).await
    }
}

impl<T: IBusClient + ?Sized> BusClientExt for T {}
