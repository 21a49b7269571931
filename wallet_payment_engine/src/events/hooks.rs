use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{AnomalyDetectedEvent, EventHandler, EventProducer, Handler, LedgerEntryCreatedEvent};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing side of the configured hooks. Cloned into every API object that emits events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub ledger_entry_producer: Vec<EventProducer<LedgerEntryCreatedEvent>>,
    pub anomaly_producer: Vec<EventProducer<AnomalyDetectedEvent>>,
}

impl EventProducers {
    pub async fn publish_ledger_entry(&self, event: LedgerEntryCreatedEvent) {
        for producer in &self.ledger_entry_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_anomaly(&self, event: AnomalyDetectedEvent) {
        for producer in &self.anomaly_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_ledger_entry: Option<EventHandler<LedgerEntryCreatedEvent>>,
    pub on_anomaly: Option<EventHandler<AnomalyDetectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_ledger_entry = hooks.on_ledger_entry.map(|f| EventHandler::new(buffer_size, f));
        let on_anomaly = hooks.on_anomaly.map(|f| EventHandler::new(buffer_size, f));
        Self { on_ledger_entry, on_anomaly }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_ledger_entry {
            result.ledger_entry_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_anomaly {
            result.anomaly_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_ledger_entry {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_anomaly {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_ledger_entry: Option<Handler<LedgerEntryCreatedEvent>>,
    pub on_anomaly: Option<Handler<AnomalyDetectedEvent>>,
}

impl EventHooks {
    pub fn on_ledger_entry<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(LedgerEntryCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_ledger_entry = Some(Arc::new(f));
        self
    }

    pub fn on_anomaly<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AnomalyDetectedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_anomaly = Some(Arc::new(f));
        self
    }
}
