use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{DecodeError, VehicleAttributes, VinDecoder};

const DEFAULT_CAPACITY: usize = 1024;

/// Successful decodes, oldest evicted first once full
#[derive(Default)]
struct Decoded {
    entries: HashMap<String, VehicleAttributes>,
    order: VecDeque<String>,
}

/// Decode cache keyed by VIN.
///
/// Concurrent lookups for the same VIN queue behind one in-flight request;
/// only successful decodes are cached so a failed VIN can be retried.
pub struct CachedDecoder {
    inner: Arc<dyn VinDecoder>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    decoded: RwLock<Decoded>,
    capacity: usize,
}

impl CachedDecoder {
    pub fn new(inner: Arc<dyn VinDecoder>) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn VinDecoder>, capacity: usize) -> Self {
        Self {
            inner,
            inflight: Mutex::new(HashMap::new()),
            decoded: RwLock::new(Decoded::default()),
            capacity: capacity.max(1),
        }
    }

    async fn slot(&self, vin: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(
            inflight
                .entry(vin.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Forget the VIN's slot once nobody else is queued on it
    async fn release(&self, vin: &str, slot: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        // the map's reference plus ours
        let last_user = inflight
            .get(vin)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2);
        if last_user {
            inflight.remove(vin);
        }
    }

    pub async fn cached(&self, vin: &str) -> Option<VehicleAttributes> {
        self.decoded.read().await.entries.get(vin).cloned()
    }

    async fn remember(&self, vin: &str, attrs: VehicleAttributes) {
        let mut decoded = self.decoded.write().await;
        if decoded.entries.insert(vin.to_string(), attrs).is_none() {
            decoded.order.push_back(vin.to_string());
        }
        while decoded.entries.len() > self.capacity {
            let Some(oldest) = decoded.order.pop_front() else {
                break;
            };
            decoded.entries.remove(&oldest);
        }
    }

    async fn decode_once(
        &self,
        vin: &str,
        slot: &Arc<Mutex<()>>,
    ) -> Result<VehicleAttributes, DecodeError> {
        let _guard = slot.lock().await;

        // Another caller may have finished while we waited.
        if let Some(hit) = self.cached(vin).await {
            tracing::trace!(vin, "VIN served from cache after wait");
            return Ok(hit);
        }

        let attrs = self.inner.decode(vin).await?;
        self.remember(vin, attrs.clone()).await;
        Ok(attrs)
    }
}

#[async_trait]
impl VinDecoder for CachedDecoder {
    async fn decode(&self, vin: &str) -> Result<VehicleAttributes, DecodeError> {
        if let Some(hit) = self.cached(vin).await {
            return Ok(hit);
        }

        let slot = self.slot(vin).await;
        let result = self.decode_once(vin, &slot).await;
        self.release(vin, slot).await;
        result
    }
}
