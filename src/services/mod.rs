//! Business logic services

pub mod batch_id;
pub mod depots;
pub mod dispatch;
pub mod eta;
pub mod geo;
pub mod lifecycle;
pub mod optimizer;
pub mod persister;

use std::sync::Arc;

use crate::config::Config;
use crate::db::DispatchStore;
use batch_id::{BatchIdGenerator, Clock, SystemClock, TimestampBatchIdGenerator};
use depots::DepotRegistry;
use dispatch::Dispatcher;
use lifecycle::DeliveryLifecycle;
use persister::BatchPersister;

/// Everything the message handlers need, built once at startup
pub struct DispatchServices {
    pub store: Arc<dyn DispatchStore>,
    pub depots: Arc<DepotRegistry>,
    pub dispatcher: Dispatcher,
    pub lifecycle: DeliveryLifecycle,
}

impl DispatchServices {
    pub fn new(store: Arc<dyn DispatchStore>, config: &Config) -> Self {
        Self::with_parts(
            store,
            config,
            Arc::new(TimestampBatchIdGenerator::system()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        store: Arc<dyn DispatchStore>,
        config: &Config,
        ids: Arc<dyn BatchIdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let depots = Arc::new(DepotRegistry::new(store.clone()));
        let persister = BatchPersister::new(store.clone(), ids, clock.clone());
        let dispatcher = Dispatcher::new(
            store.clone(),
            depots.clone(),
            persister,
            config.eta,
            config.offload_threshold,
        );
        let lifecycle = DeliveryLifecycle::new(store.clone(), clock);

        Self {
            store,
            depots,
            dispatcher,
            lifecycle,
        }
    }
}
