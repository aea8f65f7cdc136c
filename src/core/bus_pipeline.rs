use crate::core::contracts::{
    ErasedError, ErasedMessage, IBusPipeline, IErasedHandler, MessageContext,
};
use async_trait::async_trait;
use std::sync::Arc;

pub(crate) struct PipelineWithNext {
    pub pipeline: Arc<dyn IBusPipeline>,
    pub next: Arc<dyn IErasedHandler>,
}

#[async_trait]
impl IErasedHandler for PipelineWithNext {
    async fn handle(
        &self,
        context: &MessageContext,
        message: ErasedMessage,
    ) -> Result<(), ErasedError> {
        self.pipeline
            .handle(context, message, Arc::clone(&self.next))
            .await
    }
}

/// Wraps `handler` with `pipelines`; the last pipeline ends up outermost.
pub(crate) fn chain(
    handler: Arc<dyn IErasedHandler>,
    pipelines: &[Arc<dyn IBusPipeline>],
) -> Arc<dyn IErasedHandler> {
    let mut current_handler = handler;
    for pipeline in pipelines {
        let next = Arc::clone(&current_handler);
        current_handler = Arc::new(PipelineWithNext {
            pipeline: Arc::clone(pipeline),
            next,
        });
    }
    current_handler
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::MessageKind;
    use parking_lot::Mutex;

    struct RecordingHandler {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl IErasedHandler for RecordingHandler {
        async fn handle(
            &self,
            _context: &MessageContext,
            _message: ErasedMessage,
        ) -> Result<(), ErasedError> {
            self.log.lock().push("handler");
            Ok(())
        }
    }

    struct RecordingPipeline {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl IBusPipeline for RecordingPipeline {
        async fn handle(
            &self,
            context: &MessageContext,
            message: ErasedMessage,
            next: Arc<dyn IErasedHandler>,
        ) -> Result<(), ErasedError> {
            self.log.lock().push(self.name);
            next.handle(context, message).await
        }
    }

    struct ShortCircuitPipeline;

    #[async_trait]
    impl IBusPipeline for ShortCircuitPipeline {
        async fn handle(
            &self,
            _context: &MessageContext,
            _message: ErasedMessage,
            _next: Arc<dyn IErasedHandler>,
        ) -> Result<(), ErasedError> {
            Err("rejected".into())
        }
    }

    #[tokio::test]
    async fn test_chain_runs_last_pipeline_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler { log: log.clone() });
        let pipelines: Vec<Arc<dyn IBusPipeline>> = vec![
            Arc::new(RecordingPipeline {
                name: "first",
                log: log.clone(),
            }),
            Arc::new(RecordingPipeline {
                name: "second",
                log: log.clone(),
            }),
        ];

        let composed = chain(handler, &pipelines);
        let result = composed
            .handle(&MessageContext::new(MessageKind::Event, "evt"), Arc::new(()))
            .await;

        assert!(result.is_ok());
        assert_eq!(*log.lock(), vec!["second", "first", "handler"]);
    }

    #[tokio::test]
    async fn test_pipeline_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler { log: log.clone() });
        let pipelines: Vec<Arc<dyn IBusPipeline>> = vec![Arc::new(ShortCircuitPipeline)];

        let result = chain(handler, &pipelines)
            .handle(&MessageContext::new(MessageKind::Command, "cmd"), Arc::new(()))
            .await;

        assert_eq!(result.unwrap_err().to_string(), "rejected");
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_chain_without_pipelines_is_the_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler { log: log.clone() });

        let result = chain(handler, &[])
            .handle(&MessageContext::new(MessageKind::Command, "cmd"), Arc::new(()))
            .await;

        assert!(result.is_ok());
        assert_eq!(*log.lock(), vec!["handler"]);
    }
}
