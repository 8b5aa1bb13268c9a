//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CoordinateKey, GeoPoint};
use crate::fetch::{AirQualitySnapshot, ConditionsSnapshot, FetchError, WeatherPayload, WeatherSource};
use crate::overlay::{ImageryHandleId, ImageryRequest, ImagerySurface};
use crate::summary::{ProviderError, SummaryProvider};
use crate::surface::{MapSurface, SurfaceError, SurfaceKind};

pub fn conditions(location: Option<&str>, temperature: f64, condition: &str) -> ConditionsSnapshot {
    ConditionsSnapshot {
        temperature,
        feels_like: temperature - 1.0,
        humidity: 55,
        pressure: 1016,
        wind_speed: 3.5,
        wind_deg: 200,
        condition: condition.to_string(),
        icon: "01d".to_string(),
        observed_at: None,
        location: location.map(str::to_string),
    }
}

pub fn payload(location: &str, temperature: f64, condition: &str) -> WeatherPayload {
    WeatherPayload {
        current: conditions(Some(location), temperature, condition),
        forecast: vec![
            conditions(None, temperature + 2.0, condition),
            conditions(None, temperature + 3.0, "light rain"),
        ],
        air_quality: Some(AirQualitySnapshot {
            aqi: 2,
            pm2_5: 6.0,
            pm10: 11.0,
            o3: 55.0,
            no2: 14.0,
        }),
    }
}

/// In-memory weather source counting every request it serves.
#[derive(Debug)]
pub struct FakeWeatherSource {
    location: String,
    temperature: f64,
    condition: String,
    calls: AtomicUsize,
    delays: Mutex<HashMap<CoordinateKey, Duration>>,
    locations: Mutex<HashMap<CoordinateKey, String>>,
    forecast_error: Mutex<Option<FetchError>>,
    air_quality_error: Mutex<Option<FetchError>>,
}

impl FakeWeatherSource {
    pub fn new(location: &str, temperature: f64, condition: &str) -> Self {
        Self {
            location: location.to_string(),
            temperature,
            condition: condition.to_string(),
            calls: AtomicUsize::new(0),
            delays: Mutex::new(HashMap::new()),
            locations: Mutex::new(HashMap::new()),
            forecast_error: Mutex::new(None),
            air_quality_error: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delay(&self, point: GeoPoint, delay: Duration) {
        self.delays.lock().unwrap().insert(point.key(), delay);
    }

    pub fn name_point(&self, point: GeoPoint, name: &str) {
        self.locations.lock().unwrap().insert(point.key(), name.to_string());
    }

    pub fn fail_forecast(&self, error: FetchError) {
        *self.forecast_error.lock().unwrap() = Some(error);
    }

    pub fn fail_air_quality(&self, error: FetchError) {
        *self.air_quality_error.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.forecast_error.lock().unwrap() = None;
        *self.air_quality_error.lock().unwrap() = None;
    }

    async fn serve(&self, point: GeoPoint) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(&point.key()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WeatherSource for FakeWeatherSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn current(&self, point: GeoPoint) -> Result<ConditionsSnapshot, FetchError> {
        self.serve(point).await;
        let location = self
            .locations
            .lock()
            .unwrap()
            .get(&point.key())
            .cloned()
            .unwrap_or_else(|| self.location.clone());
        Ok(conditions(Some(&location), self.temperature, &self.condition))
    }

    async fn forecast(&self, point: GeoPoint) -> Result<Vec<ConditionsSnapshot>, FetchError> {
        self.serve(point).await;
        if let Some(error) = self.forecast_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(vec![conditions(None, self.temperature + 1.0, &self.condition)])
    }

    async fn air_quality(&self, point: GeoPoint) -> Result<Option<AirQualitySnapshot>, FetchError> {
        self.serve(point).await;
        if let Some(error) = self.air_quality_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(None)
    }
}

/// Summary provider with a fixed outcome and a call counter.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    name: &'static str,
    outcome: Result<String, ProviderError>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn ok(name: &'static str, text: &str) -> Self {
        Self {
            name,
            outcome: Ok(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &'static str, error: ProviderError) -> Self {
        Self {
            name,
            outcome: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SummaryProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(&self, _payload: &WeatherPayload) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// One call recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Add { layer_id: String, url: String },
    Remove(String),
    Clear,
    FlyTo(GeoPoint),
    Marker(GeoPoint),
    Zoom(i32),
    Measure,
    Close,
}

/// Surface that records every call into a shared log.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    kind: SurfaceKind,
    pub ready: bool,
    pub location: Option<GeoPoint>,
    pub reject_layer: Option<String>,
    zoom: f64,
    live: HashMap<ImageryHandleId, String>,
    log: Arc<Mutex<Vec<SurfaceCall>>>,
}

impl RecordingSurface {
    pub fn new(kind: SurfaceKind) -> Self {
        Self {
            kind,
            ready: true,
            location: None,
            reject_layer: None,
            zoom: 5.0,
            live: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn take_calls(&self) -> Vec<SurfaceCall> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    fn record(&self, call: SurfaceCall) {
        self.log.lock().unwrap().push(call);
    }
}

impl ImagerySurface for RecordingSurface {
    fn add_imagery(&mut self, request: &ImageryRequest) -> Result<(), SurfaceError> {
        if self.reject_layer.as_deref() == Some(request.layer_id.as_str()) {
            return Err(SurfaceError::Rejected(request.layer_id.clone()));
        }
        self.live.insert(request.handle, request.layer_id.clone());
        self.record(SurfaceCall::Add {
            layer_id: request.layer_id.clone(),
            url: request.source.url_template(),
        });
        Ok(())
    }

    fn remove_imagery(&mut self, handle: ImageryHandleId) {
        let layer_id = self.live.remove(&handle).unwrap_or_default();
        self.record(SurfaceCall::Remove(layer_id));
    }

    fn clear_imagery(&mut self) {
        self.live.clear();
        self.record(SurfaceCall::Clear);
    }
}

impl MapSurface for RecordingSurface {
    fn kind(&self) -> SurfaceKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn fly_to(&mut self, point: GeoPoint, _zoom_hint: Option<f64>) {
        self.record(SurfaceCall::FlyTo(point));
    }

    fn zoom_by(&mut self, steps: i32) -> f64 {
        self.zoom += f64::from(steps);
        self.record(SurfaceCall::Zoom(steps));
        self.zoom
    }

    fn locate_user(&mut self) -> Option<GeoPoint> {
        self.location
    }

    fn place_marker(&mut self, point: GeoPoint) {
        self.record(SurfaceCall::Marker(point));
    }

    fn start_measurement(&mut self) -> Result<(), SurfaceError> {
        match self.kind {
            SurfaceKind::TwoD => {
                self.record(SurfaceCall::Measure);
                Ok(())
            }
            SurfaceKind::ThreeD => Err(SurfaceError::Unsupported("measurement")),
        }
    }

    fn close(&mut self) {
        self.record(SurfaceCall::Close);
    }
}
