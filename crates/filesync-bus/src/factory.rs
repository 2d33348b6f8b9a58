//! Construct the configured change bus backend.

use std::sync::Arc;

use tracing::info;

use filesync_core::config::{BusConfig, BusProvider};
use filesync_core::result::AppResult;
use filesync_core::traits::bus::ChangeBus;

use crate::providers::MemoryChangeBus;

/// Build the change bus selected by `bus.provider`.
pub async fn build_change_bus(config: &BusConfig) -> AppResult<Arc<dyn ChangeBus>> {
    let bus: Arc<dyn ChangeBus> = match config.provider {
        BusProvider::Memory => Arc::new(MemoryChangeBus::new(config.channel_buffer_size)),
        #[cfg(feature = "redis-bus")]
        BusProvider::Redis => Arc::new(crate::providers::RedisChangeBus::connect(config).await?),
        #[cfg(not(feature = "redis-bus"))]
        BusProvider::Redis => {
            return Err(filesync_core::AppError::configuration(
                "bus.provider = redis requires building with the `redis-bus` feature",
            ));
        }
    };

    info!(provider = bus.provider_type(), topic = %config.topic, "Change bus ready");
    Ok(bus)
}
