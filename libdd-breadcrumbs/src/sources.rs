// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pluggable producers feeding the breadcrumb registry.
//!
//! Platform observers (battery, memory pressure, lifecycle notifications)
//! live outside this crate; they plug in through [`EventSource`] and call
//! back into the registry like any other caller. The registry has no
//! compile-time knowledge of concrete sources.

use crate::breadcrumb::{BreadcrumbLevel, BreadcrumbType};
use crate::registry::BreadcrumbRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A subscription-style breadcrumb producer.
///
/// `start_observing` hands the source a registry handle to emit into; the
/// source keeps emitting (however its platform delivers events) until
/// `stop_observing`. Both calls must be cheap and infallible.
pub trait EventSource: Send {
    fn start_observing(&mut self, registry: Arc<BreadcrumbRegistry>);
    fn stop_observing(&mut self);
}

/// Owns a set of event sources and starts/stops them together.
pub struct EventSourceSet {
    registry: Arc<BreadcrumbRegistry>,
    sources: Vec<Box<dyn EventSource>>,
    observing: bool,
}

impl EventSourceSet {
    pub fn new(registry: Arc<BreadcrumbRegistry>) -> Self {
        Self {
            registry,
            sources: Vec::new(),
            observing: false,
        }
    }

    pub fn register(&mut self, mut source: Box<dyn EventSource>) {
        if self.observing {
            source.start_observing(Arc::clone(&self.registry));
        }
        self.sources.push(source);
    }

    pub fn enable(&mut self) {
        if self.observing {
            return;
        }
        for source in &mut self.sources {
            source.start_observing(Arc::clone(&self.registry));
        }
        self.observing = true;
    }

    pub fn disable(&mut self) {
        if !self.observing {
            return;
        }
        for source in &mut self.sources {
            source.stop_observing();
        }
        self.observing = false;
    }
}

impl Drop for EventSourceSet {
    fn drop(&mut self) {
        self.disable();
    }
}

/// Derived power readings a platform implementation computes however it
/// likes. Substituting this interface replaces the battery observer without
/// any subclassing.
pub trait PowerStatus: Send {
    /// Battery charge in `[0.0, 1.0]`, `None` when the platform cannot say.
    fn battery_level(&self) -> Option<f32>;
    fn is_charging(&self) -> Option<bool>;
}

/// Turns [`PowerStatus`] readings into `system` breadcrumbs.
pub struct BatterySource<P> {
    provider: P,
    registry: Option<Arc<BreadcrumbRegistry>>,
}

impl<P: PowerStatus> BatterySource<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            registry: None,
        }
    }

    /// Samples the provider and emits one breadcrumb. The platform glue calls
    /// this from whatever power-change notification it receives.
    pub fn record_reading(&self) -> bool {
        let Some(registry) = &self.registry else {
            return false;
        };
        let mut attributes = BTreeMap::new();
        let message = match self.provider.battery_level() {
            None => "Unknown battery level".to_string(),
            Some(level) => {
                let percent = level * 100.0;
                attributes.insert("battery.level".to_string(), format!("{percent:.1}"));
                let state = match self.provider.is_charging() {
                    Some(true) => "Charging",
                    Some(false) => "Unplugged",
                    None => "Unknown state",
                };
                attributes.insert(
                    "battery.charging".to_string(),
                    matches!(self.provider.is_charging(), Some(true)).to_string(),
                );
                format!("{state} battery level: {percent:.1}%")
            }
        };
        registry.add_breadcrumb_with(
            &message,
            attributes,
            BreadcrumbType::System,
            BreadcrumbLevel::Info,
        )
    }
}

impl<P: PowerStatus> EventSource for BatterySource<P> {
    fn start_observing(&mut self, registry: Arc<BreadcrumbRegistry>) {
        self.registry = Some(registry);
        self.record_reading();
    }

    fn stop_observing(&mut self) {
        self.registry = None;
    }
}
