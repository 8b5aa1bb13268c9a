//! Terminal stand-in for a map surface.
//!
//! Imagery changes and camera commands are printed instead of rendered, which
//! lets the CLI drive the same coordinator a graphical front end would.

use std::collections::BTreeMap;

use log::debug;
use weather_layer::{
    GeoPoint, ImageryHandleId, ImageryKind, ImageryRequest, ImagerySurface, MapSurface, SurfaceError,
    SurfaceKind,
};

/// Default camera height for the globe, in metres
const GLOBE_HEIGHT: f64 = 10_000_000.0;
const DEFAULT_ZOOM: f64 = 7.0;
const MAX_ZOOM: f64 = 19.0;

#[derive(Debug)]
pub struct ConsoleSurface {
    kind: SurfaceKind,
    quiet: bool,
    zoom: f64,
    home: Option<GeoPoint>,
    layers: BTreeMap<ImageryHandleId, (String, String)>,
}

impl ConsoleSurface {
    pub fn new(kind: SurfaceKind, home: Option<GeoPoint>) -> Self {
        let zoom = match kind {
            SurfaceKind::TwoD => DEFAULT_ZOOM,
            SurfaceKind::ThreeD => GLOBE_HEIGHT,
        };
        Self {
            kind,
            quiet: false,
            zoom,
            home,
            layers: BTreeMap::new(),
        }
    }

    /// Suppress camera output; imagery changes are still printed.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn say(&self, line: &str) {
        if !self.quiet {
            println!("[{}] {line}", self.kind);
        }
    }
}

impl ImagerySurface for ConsoleSurface {
    fn add_imagery(&mut self, request: &ImageryRequest) -> Result<(), SurfaceError> {
        let label = match request.kind {
            ImageryKind::Base => "base",
            ImageryKind::Overlay => "overlay",
        };
        let url = request.source.url_template();
        println!(
            "[{}] + {label} {:<16} opacity {:.1}  {url}",
            self.kind, request.layer_id, request.opacity
        );
        self.layers.insert(request.handle, (request.layer_id.clone(), url));
        Ok(())
    }

    fn remove_imagery(&mut self, handle: ImageryHandleId) {
        match self.layers.remove(&handle) {
            Some((layer_id, _)) => println!("[{}] - {layer_id}", self.kind),
            None => debug!("Ignoring removal of unknown imagery {handle}"),
        }
    }

    fn clear_imagery(&mut self) {
        println!("[{}] cleared {} imagery layers", self.kind, self.layers.len());
        self.layers.clear();
    }
}

impl MapSurface for ConsoleSurface {
    fn kind(&self) -> SurfaceKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn fly_to(&mut self, point: GeoPoint, zoom_hint: Option<f64>) {
        if let (Some(zoom), SurfaceKind::TwoD) = (zoom_hint, self.kind) {
            self.zoom = zoom.clamp(0.0, MAX_ZOOM);
        }
        self.say(&format!("camera -> {point}"));
    }

    fn zoom_by(&mut self, steps: i32) -> f64 {
        self.zoom = match self.kind {
            SurfaceKind::TwoD => (self.zoom + f64::from(steps)).clamp(0.0, MAX_ZOOM),
            // Each step halves (or doubles) the camera height
            SurfaceKind::ThreeD => (self.zoom / 2f64.powi(steps)).max(100.0),
        };
        self.zoom
    }

    fn locate_user(&mut self) -> Option<GeoPoint> {
        self.home
    }

    fn place_marker(&mut self, point: GeoPoint) {
        self.say(&format!("marker at {point}"));
    }

    fn start_measurement(&mut self) -> Result<(), SurfaceError> {
        match self.kind {
            SurfaceKind::TwoD => Ok(()),
            SurfaceKind::ThreeD => Err(SurfaceError::Unsupported("measurement")),
        }
    }

    fn close(&mut self) {
        self.say("closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_is_surface_specific() {
        let mut map = ConsoleSurface::new(SurfaceKind::TwoD, None).quiet();
        assert_eq!(map.zoom_by(2), 9.0);
        assert_eq!(map.zoom_by(-20), 0.0);

        let mut globe = ConsoleSurface::new(SurfaceKind::ThreeD, None).quiet();
        assert_eq!(globe.zoom_by(1), GLOBE_HEIGHT / 2.0);
        assert_eq!(globe.zoom_by(-2), GLOBE_HEIGHT * 2.0);
    }

    #[test]
    fn test_measurement_only_on_map() {
        let mut globe = ConsoleSurface::new(SurfaceKind::ThreeD, None).quiet();
        assert_eq!(globe.start_measurement(), Err(SurfaceError::Unsupported("measurement")));
        assert!(ConsoleSurface::new(SurfaceKind::TwoD, None).start_measurement().is_ok());
    }
}
