// core/common/src/cache/single_flight.rs
// Per-key in-flight de-duplication for concurrent cache misses

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type FlightMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Serializes recomputation per cache key so that concurrent misses wait
/// for one shared computation instead of stampeding the source.
#[derive(Clone, Default)]
pub struct SingleFlight {
    flights: Arc<Mutex<FlightMap>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds `key`, then hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let slot = {
            let mut flights = self.flights.lock().unwrap_or_else(|p| p.into_inner());
            flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;
        FlightGuard {
            key: key.to_string(),
            guard: Some(guard),
            flights: self.flights.clone(),
        }
    }

    /// Keys with a computation running or waiting.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().map(|f| f.len()).unwrap_or(0)
    }
}

pub struct FlightGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    flights: Arc<Mutex<FlightMap>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // Release the slot before deciding whether anyone still needs it.
        self.guard.take();
        let mut flights = self.flights.lock().unwrap_or_else(|p| p.into_inner());
        if flights
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            flights.remove(&self.key);
        }
    }
}
