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

//! Overlay bookkeeping for one rendering surface.
//!
//! The [`OverlayRegistry`] keeps the imagery attached to a surface in step
//! with the user's selection. Reconciliation is diff-based: only ids that
//! entered or left the desired set are touched, plus date-sensitive sources
//! when the reference date moves. A basemap switch clears the surface and
//! rebuilds everything on top of the new base.

mod sources;

pub use sources::{Basemap, SatelliteLayer, SourceDescriptor, SourceResolver, WeatherLayer};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::surface::SurfaceError;

/// Opacity of every weather overlay.
pub const OVERLAY_OPACITY: f32 = 0.6;
/// Opacity of the base layer.
pub const BASE_OPACITY: f32 = 1.0;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverlayError {
    #[error("unknown overlay layer '{0}'")]
    UnknownLayer(String),

    #[error("overlay layer '{0}' needs an OpenWeatherMap API key")]
    MissingApiKey(String),
}

/// Identity of one imagery resource on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageryHandleId(Uuid);

impl ImageryHandleId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ImageryHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageryKind {
    Base,
    Overlay,
}

/// Everything a surface needs to create one imagery resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryRequest {
    pub handle: ImageryHandleId,
    pub layer_id: String,
    pub source: SourceDescriptor,
    pub opacity: f32,
    pub kind: ImageryKind,
}

/// Imagery capability of a rendering surface.
pub trait ImagerySurface {
    fn add_imagery(&mut self, request: &ImageryRequest) -> Result<(), SurfaceError>;

    /// Destroy a resource previously created with `add_imagery`.
    fn remove_imagery(&mut self, handle: ImageryHandleId);

    /// Destroy every imagery resource, base layer included.
    fn clear_imagery(&mut self);
}

/// One live imagery resource owned by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagerySourceHandle {
    pub id: ImageryHandleId,
    pub layer_id: String,
    pub descriptor: SourceDescriptor,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attached: Vec<String>,
    pub detached: Vec<String>,
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    /// True when the pass touched no imagery.
    pub fn is_noop(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

/// Attached-set bookkeeping for one surface.
#[derive(Debug)]
pub struct OverlayRegistry {
    resolver: Arc<SourceResolver>,
    basemap: Basemap,
    base: Option<ImagerySourceHandle>,
    attached: BTreeMap<String, ImagerySourceHandle>,
    desired: BTreeSet<String>,
    reference_date: NaiveDate,
}

impl OverlayRegistry {
    #[must_use]
    pub fn new(resolver: Arc<SourceResolver>, basemap: Basemap, reference_date: NaiveDate) -> Self {
        Self {
            resolver,
            basemap,
            base: None,
            attached: BTreeMap::new(),
            desired: BTreeSet::new(),
            reference_date,
        }
    }

    pub fn basemap(&self) -> Basemap {
        self.basemap
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Ids with a live handle on the surface.
    pub fn attached_ids(&self) -> BTreeSet<String> {
        self.attached.keys().cloned().collect()
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Bring the surface in line with `desired` on `date`.
    ///
    /// Every detach in the pass happens before the first attach.
    pub fn reconcile<S: ImagerySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        desired: &BTreeSet<String>,
        date: NaiveDate,
    ) -> ReconcileReport {
        let date_changed = date != self.reference_date;
        self.reference_date = date;
        self.desired = desired.clone();

        let mut report = ReconcileReport::default();

        let stale: Vec<String> = self
            .attached
            .iter()
            .filter(|(id, handle)| {
                !desired.contains(*id) || (date_changed && handle.descriptor.is_date_sensitive())
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            if let Some(handle) = self.attached.remove(&id) {
                surface.remove_imagery(handle.id);
                debug!("Detached overlay {id} ({})", handle.id);
                report.detached.push(id);
            }
        }

        if self.base.is_none() {
            self.attach_base(surface);
        }

        for id in desired {
            if !self.attached.contains_key(id) {
                self.attach_overlay(surface, id, &mut report);
            }
        }

        if !report.is_noop() {
            info!(
                "Overlays reconciled for {}: +{:?} -{:?}",
                self.reference_date, report.attached, report.detached
            );
        }
        report
    }

    /// Move the reference date, rebuilding date-sensitive overlays only.
    pub fn set_reference_date<S>(&mut self, surface: &mut S, date: NaiveDate) -> ReconcileReport
    where
        S: ImagerySurface + ?Sized,
    {
        let desired = self.desired.clone();
        self.reconcile(surface, &desired, date)
    }

    /// Replace the base layer. The surface is cleared, then `desired` is
    /// attached on `date` above the new base.
    pub fn switch_basemap<S>(
        &mut self,
        surface: &mut S,
        basemap: Basemap,
        desired: &BTreeSet<String>,
        date: NaiveDate,
    ) -> ReconcileReport
    where
        S: ImagerySurface + ?Sized,
    {
        info!("Switching basemap {} -> {}", self.basemap.id(), basemap.id());
        self.desired = desired.clone();
        self.reference_date = date;

        surface.clear_imagery();
        let mut report = ReconcileReport {
            detached: self.attached.keys().cloned().collect(),
            ..Default::default()
        };
        self.attached.clear();
        self.base = None;
        self.basemap = basemap;

        self.attach_base(surface);
        let desired = self.desired.clone();
        for id in &desired {
            self.attach_overlay(surface, id, &mut report);
        }
        report
    }

    /// Destroy every handle this registry owns on the surface.
    pub fn teardown<S: ImagerySurface + ?Sized>(&mut self, surface: &mut S) {
        let overlays = std::mem::take(&mut self.attached);
        for (id, handle) in overlays {
            surface.remove_imagery(handle.id);
            debug!("Detached overlay {id} on teardown");
        }
        if let Some(base) = self.base.take() {
            surface.remove_imagery(base.id);
        }
    }

    fn attach_base<S: ImagerySurface + ?Sized>(&mut self, surface: &mut S) {
        let request = ImageryRequest {
            handle: ImageryHandleId::new(),
            layer_id: self.basemap.id().to_string(),
            source: SourceDescriptor::Basemap(self.basemap),
            opacity: BASE_OPACITY,
            kind: ImageryKind::Base,
        };

        match surface.add_imagery(&request) {
            Ok(()) => {
                self.base = Some(ImagerySourceHandle {
                    id: request.handle,
                    layer_id: request.layer_id,
                    descriptor: request.source,
                });
            }
            Err(e) => warn!("Failed to attach basemap {}: {e}", self.basemap.id()),
        }
    }

    fn attach_overlay<S: ImagerySurface + ?Sized>(
        &mut self,
        surface: &mut S,
        id: &str,
        report: &mut ReconcileReport,
    ) {
        let source = match self.resolver.resolve(id, self.reference_date) {
            Ok(source) => source,
            Err(e) => {
                warn!("Skipping overlay: {e}");
                report.skipped.push(id.to_string());
                return;
            }
        };

        let request = ImageryRequest {
            handle: ImageryHandleId::new(),
            layer_id: id.to_string(),
            source,
            opacity: OVERLAY_OPACITY,
            kind: ImageryKind::Overlay,
        };

        match surface.add_imagery(&request) {
            Ok(()) => {
                debug!("Attached overlay {id} ({})", request.handle);
                self.attached.insert(
                    id.to_string(),
                    ImagerySourceHandle {
                        id: request.handle,
                        layer_id: request.layer_id,
                        descriptor: request.source,
                    },
                );
                report.attached.push(id.to_string());
            }
            Err(e) => {
                warn!("Surface rejected overlay {id}: {e}");
                report.skipped.push(id.to_string());
            }
        }
    }
}
