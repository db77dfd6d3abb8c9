use std::sync::Arc;

use async_trait::async_trait;

use crate::{Coordinates, Payload, ProviderError, ProviderKind};

/// An upstream environmental data source.
///
/// Implementations own their transport, credentials and timeouts. Any reason
/// the source could not produce usable data (including a timeout) is reported
/// as a [`ProviderError`].
#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    /// Which snapshot slot this provider fills.
    fn kind(&self) -> ProviderKind;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Fetch the current data for a point.
    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError>;
}

/// The four providers a complete snapshot is built from.
#[derive(Clone)]
pub struct ProviderSet {
    pub climate: Arc<dyn EnvironmentProvider>,
    pub weather: Arc<dyn EnvironmentProvider>,
    pub air_quality: Arc<dyn EnvironmentProvider>,
    pub fires: Arc<dyn EnvironmentProvider>,
}

impl ProviderSet {
    pub fn get(&self, kind: ProviderKind) -> &Arc<dyn EnvironmentProvider> {
        match kind {
            ProviderKind::Climate => &self.climate,
            ProviderKind::Weather => &self.weather,
            ProviderKind::AirQuality => &self.air_quality,
            ProviderKind::Fires => &self.fires,
        }
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("climate", &self.climate.name())
            .field("weather", &self.weather.name())
            .field("air_quality", &self.air_quality.name())
            .field("fires", &self.fires.name())
            .finish()
    }
}
