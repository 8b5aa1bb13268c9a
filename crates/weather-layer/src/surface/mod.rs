// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Coordination of the 2D map and the 3D globe.
//!
//! Exactly one surface is active at a time. Commands go to the active
//! surface through the [`MapSurface`] capability and come back as a
//! [`CommandOutcome`], whatever the surface kind. The overlay selection lives
//! here rather than on a surface, so switching surfaces carries it over; the
//! weather panel is shared and keeps running across a switch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use thiserror::Error;

use crate::cache::GeoPoint;
use crate::overlay::{Basemap, ImagerySurface, OverlayRegistry, ReconcileReport, SourceResolver};
use crate::panel::WeatherPanel;

/// Zoom hint used when flying to a searched location.
pub const SEARCH_ZOOM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    TwoD,
    ThreeD,
}

impl SurfaceKind {
    pub fn other(self) -> Self {
        match self {
            SurfaceKind::TwoD => SurfaceKind::ThreeD,
            SurfaceKind::ThreeD => SurfaceKind::TwoD,
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::TwoD => write!(f, "2D"),
            SurfaceKind::ThreeD => write!(f, "3D"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface is not ready")]
    NotReady,

    #[error("{0} is not supported on this surface")]
    Unsupported(&'static str),

    #[error("surface rejected imagery '{0}'")]
    Rejected(String),
}

/// Everything the coordinator needs from a rendering surface.
pub trait MapSurface: ImagerySurface + Send {
    fn kind(&self) -> SurfaceKind;

    /// False until the underlying renderer has finished loading.
    fn is_ready(&self) -> bool;

    fn fly_to(&mut self, point: GeoPoint, zoom_hint: Option<f64>);

    /// Zoom by whole steps. Returns the new zoom level (2D) or camera
    /// height in metres (3D).
    fn zoom_by(&mut self, steps: i32) -> f64;

    fn locate_user(&mut self) -> Option<GeoPoint>;

    fn place_marker(&mut self, point: GeoPoint);

    fn start_measurement(&mut self) -> Result<(), SurfaceError>;

    fn close(&mut self);
}

/// Uniform result of a surface command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    Done,
    Zoomed(f64),
    Located(GeoPoint),
    NotLocated,
    Unsupported,
    NotReady,
}

/// One known overlay and whether the user has it switched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayDescriptor {
    pub id: String,
    pub is_active: bool,
}

/// User-selected overlay state, independent of any surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySelection {
    pub active: BTreeSet<String>,
    pub reference_date: NaiveDate,
    pub basemap: Basemap,
}

impl OverlaySelection {
    #[must_use]
    pub fn new(reference_date: NaiveDate, basemap: Basemap) -> Self {
        Self {
            active: BTreeSet::new(),
            reference_date,
            basemap,
        }
    }

    #[must_use]
    pub fn with_active<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Toggle one id. Returns true if the selection changed.
    pub fn set(&mut self, id: &str, active: bool) -> bool {
        if active {
            self.active.insert(id.to_string())
        } else {
            self.active.remove(id)
        }
    }

    pub fn descriptors(&self) -> Vec<OverlayDescriptor> {
        SourceResolver::known_ids()
            .into_iter()
            .map(|id| OverlayDescriptor {
                id: id.to_string(),
                is_active: self.active.contains(id),
            })
            .collect()
    }
}

struct MountedSurface {
    surface: Box<dyn MapSurface>,
    overlays: OverlayRegistry,
}

/// Routes commands and overlay state to whichever surface is active.
pub struct SurfaceCoordinator {
    active: SurfaceKind,
    two_d: Option<MountedSurface>,
    three_d: Option<MountedSurface>,
    resolver: Arc<SourceResolver>,
    selection: OverlaySelection,
    panel: Arc<WeatherPanel>,
}

impl fmt::Debug for SurfaceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceCoordinator")
            .field("active", &self.active)
            .field("two_d_mounted", &self.two_d.is_some())
            .field("three_d_mounted", &self.three_d.is_some())
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl SurfaceCoordinator {
    /// Start with the 2D surface active and nothing mounted.
    #[must_use]
    pub fn new(panel: Arc<WeatherPanel>, resolver: Arc<SourceResolver>, selection: OverlaySelection) -> Self {
        Self {
            active: SurfaceKind::TwoD,
            two_d: None,
            three_d: None,
            resolver,
            selection,
            panel,
        }
    }

    pub fn active(&self) -> SurfaceKind {
        self.active
    }

    pub fn selection(&self) -> &OverlaySelection {
        &self.selection
    }

    pub fn panel(&self) -> &Arc<WeatherPanel> {
        &self.panel
    }

    pub fn is_mounted(&self, kind: SurfaceKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Overlay ids currently attached to a mounted surface.
    pub fn attached_overlays(&self, kind: SurfaceKind) -> Option<BTreeSet<String>> {
        self.slot(kind).map(|m| m.overlays.attached_ids())
    }

    fn slot(&self, kind: SurfaceKind) -> Option<&MountedSurface> {
        match kind {
            SurfaceKind::TwoD => self.two_d.as_ref(),
            SurfaceKind::ThreeD => self.three_d.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: SurfaceKind) -> &mut Option<MountedSurface> {
        match kind {
            SurfaceKind::TwoD => &mut self.two_d,
            SurfaceKind::ThreeD => &mut self.three_d,
        }
    }

    /// Mount a surface into its slot, replacing (and tearing down) any
    /// surface of the same kind.
    pub fn mount(&mut self, surface: Box<dyn MapSurface>) {
        let kind = surface.kind();
        self.unmount(kind);

        let overlays = OverlayRegistry::new(
            Arc::clone(&self.resolver),
            self.selection.basemap,
            self.selection.reference_date,
        );
        *self.slot_mut(kind) = Some(MountedSurface { surface, overlays });
        info!("Mounted {kind} surface");

        if kind == self.active {
            self.sync_overlays();
        }
    }

    /// Destroy every imagery handle on a surface and drop it.
    pub fn unmount(&mut self, kind: SurfaceKind) {
        if let Some(mut mounted) = self.slot_mut(kind).take() {
            mounted.overlays.teardown(mounted.surface.as_mut());
            info!("Unmounted {kind} surface");
        }
    }

    /// Make `kind` the active surface. Returns false if it already was.
    pub fn switch_to(&mut self, kind: SurfaceKind) -> bool {
        if self.active == kind {
            return false;
        }
        info!("Switching active surface {} -> {kind}", self.active);
        self.active = kind;
        self.sync_overlays();
        true
    }

    pub fn toggle(&mut self) -> SurfaceKind {
        self.switch_to(self.active.other());
        self.active
    }

    pub fn set_overlay(&mut self, id: &str, active: bool) -> Option<ReconcileReport> {
        if !self.selection.set(id, active) {
            debug!("Overlay {id} already {}", if active { "on" } else { "off" });
        }
        self.sync_overlays()
    }

    pub fn set_reference_date(&mut self, date: NaiveDate) -> Option<ReconcileReport> {
        self.selection.reference_date = date;
        self.sync_overlays()
    }

    pub fn set_basemap(&mut self, basemap: Basemap) -> Option<ReconcileReport> {
        self.selection.basemap = basemap;
        self.sync_overlays()
    }

    /// Reconcile the selection onto the active surface.
    ///
    /// Call again once a surface reports ready; `None` while the active
    /// surface is missing or still loading.
    pub fn sync_overlays(&mut self) -> Option<ReconcileReport> {
        let active = self.active;
        let selection = self.selection.clone();

        let Some(mounted) = self.slot_mut(active).as_mut() else {
            debug!("No {active} surface mounted, overlay sync deferred");
            return None;
        };
        if !mounted.surface.is_ready() {
            debug!("{active} surface not ready, overlay sync deferred");
            return None;
        }

        let surface = mounted.surface.as_mut();
        let report = if mounted.overlays.basemap() == selection.basemap {
            mounted
                .overlays
                .reconcile(surface, &selection.active, selection.reference_date)
        } else {
            mounted.overlays.switch_basemap(
                surface,
                selection.basemap,
                &selection.active,
                selection.reference_date,
            )
        };
        Some(report)
    }

    fn with_active<F>(&mut self, command: &str, f: F) -> CommandOutcome
    where
        F: FnOnce(&mut dyn MapSurface) -> CommandOutcome,
    {
        let active = self.active;
        match self.slot_mut(active).as_mut() {
            Some(mounted) if mounted.surface.is_ready() => f(mounted.surface.as_mut()),
            _ => {
                warn!("{command} ignored: {active} surface not ready");
                CommandOutcome::NotReady
            }
        }
    }

    pub fn fly_to(&mut self, point: GeoPoint, zoom_hint: Option<f64>) -> CommandOutcome {
        self.with_active("fly_to", |surface| {
            surface.fly_to(point, zoom_hint);
            CommandOutcome::Done
        })
    }

    pub fn zoom_in(&mut self) -> CommandOutcome {
        self.with_active("zoom_in", |surface| CommandOutcome::Zoomed(surface.zoom_by(1)))
    }

    pub fn zoom_out(&mut self) -> CommandOutcome {
        self.with_active("zoom_out", |surface| CommandOutcome::Zoomed(surface.zoom_by(-1)))
    }

    /// Centre on the user's position, if the surface can find it.
    pub fn locate_user(&mut self) -> CommandOutcome {
        self.with_active("locate_user", |surface| match surface.locate_user() {
            Some(point) => {
                surface.fly_to(point, None);
                CommandOutcome::Located(point)
            }
            None => CommandOutcome::NotLocated,
        })
    }

    /// Fly to a point, mark it and start loading its weather.
    ///
    /// The load runs on the tokio runtime and keeps going if the active
    /// surface changes before it completes.
    pub fn search_and_show_weather(&mut self, point: GeoPoint) -> CommandOutcome {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("search_and_show_weather ignored: no async runtime");
            return CommandOutcome::NotReady;
        };

        let outcome = self.with_active("search_and_show_weather", |surface| {
            surface.fly_to(point, Some(SEARCH_ZOOM));
            surface.place_marker(point);
            CommandOutcome::Done
        });

        if outcome == CommandOutcome::Done {
            let panel = Arc::clone(&self.panel);
            runtime.spawn(async move {
                let result = panel.load(point).await;
                debug!("Weather load for {point} finished: {result:?}");
            });
        }
        outcome
    }

    pub fn start_measurement(&mut self) -> CommandOutcome {
        if self.active == SurfaceKind::ThreeD {
            info!("Measurement is only available on the 2D map");
            return CommandOutcome::Unsupported;
        }
        self.with_active("start_measurement", |surface| match surface.start_measurement() {
            Ok(()) => CommandOutcome::Done,
            Err(SurfaceError::Unsupported(what)) => {
                info!("{what} unsupported on this surface");
                CommandOutcome::Unsupported
            }
            Err(e) => {
                warn!("Measurement failed: {e}");
                CommandOutcome::NotReady
            }
        })
    }

    pub fn close(&mut self) -> CommandOutcome {
        self.with_active("close", |surface| {
            surface.close();
            CommandOutcome::Done
        })
    }
}
