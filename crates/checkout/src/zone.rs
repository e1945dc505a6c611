//! Cached service-zone detection.

use std::collections::HashMap;
use std::time::Duration;

use gateway::{GatewayError, ZoneGateway};
use model::{DeliveryAddress, Zone};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

type CellKey = (i64, i64);

/// Looks up the zone serving a location, remembering answers per
/// ~100 m cell (coordinates rounded to three decimals) for `ttl`.
pub struct ZoneResolver<Z> {
    gateway: Z,
    ttl: Duration,
    cache: Mutex<HashMap<CellKey, (Instant, Option<Zone>)>>,
}

impl<Z> std::fmt::Debug for ZoneResolver<Z> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneResolver")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<Z: ZoneGateway> ZoneResolver<Z> {
    pub fn new(gateway: Z, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Active zone serving the coordinates. Inactive zones count as not served.
    ///
    /// # Errors
    /// Gateway failures are returned and nothing is cached.
    #[instrument(skip(self))]
    pub async fn zone_for(&self, latitude: f64, longitude: f64) -> Result<Option<Zone>, GatewayError> {
        let key = cell(latitude, longitude);
        if let Some((stored_at, zone)) = self.cache.lock().await.get(&key) {
            if stored_at.elapsed() < self.ttl {
                debug!("Zone cache hit");
                return Ok(zone.clone());
            }
        }

        let zone = self
            .gateway
            .detect_zone(latitude, longitude)
            .await?
            .filter(|z| z.is_active);
        self.cache
            .lock()
            .await
            .insert(key, (Instant::now(), zone.clone()));
        Ok(zone)
    }

    /// Zone for the address's coordinates, `None` when it has none.
    pub async fn zone_for_address(
        &self,
        address: &DeliveryAddress,
    ) -> Result<Option<Zone>, GatewayError> {
        match address.coordinates() {
            Some((lat, lng)) => self.zone_for(lat, lng).await,
            None => Ok(None),
        }
    }
}

fn cell(latitude: f64, longitude: f64) -> CellKey {
    (
        (latitude * 1000.0).round() as i64,
        (longitude * 1000.0).round() as i64,
    )
}
