// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::breadcrumb::{BreadcrumbLevel, BreadcrumbType};
use crate::manager::BreadcrumbLogManager;
use crate::settings::BreadcrumbSettings;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Trail file name, fixed per registry instance. External tooling may tail
/// this file directly as newline-delimited JSON.
pub const BREADCRUMB_FILE_NAME: &str = "bt-breadcrumbs-0";

#[derive(Debug, Default)]
struct RegistryState {
    enabled: bool,
    session_id: Option<Uuid>,
    settings: BreadcrumbSettings,
    manager: Option<Arc<BreadcrumbLogManager>>,
}

/// The public breadcrumb surface.
///
/// Holds the process-wide enabled flag, the active filter, and the session
/// correlation id rotated on each enablement. Filtering is evaluated
/// synchronously under the registry lock with zero storage access; only a
/// breadcrumb that passes reaches the trail manager (and its file I/O), with
/// the manager handle cloned out of the lock first so concurrent callers
/// never queue behind the disk just to be filtered.
#[derive(Debug)]
pub struct BreadcrumbRegistry {
    log_path: PathBuf,
    state: Mutex<RegistryState>,
}

impl BreadcrumbRegistry {
    /// `directory` is an application-writable directory; the trail lives at
    /// `directory/`[`BREADCRUMB_FILE_NAME`]. Registries start disabled.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            log_path: directory.as_ref().join(BREADCRUMB_FILE_NAME),
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Enables breadcrumb collection with `settings` (normalized first,
    /// invalid values fall back to defaults) and assigns a fresh session id.
    /// Re-enabling while enabled rotates the session id; the underlying store
    /// is rebuilt only when the capacity changed, preserving prior content
    /// otherwise.
    pub fn enable(&self, settings: BreadcrumbSettings) {
        let settings = settings.normalized();
        let mut state = self.lock();
        let rebuild = match &state.manager {
            Some(manager) => manager.max_log_size_bytes() != settings.max_log_size_bytes,
            None => true,
        };
        if rebuild {
            state.manager = Some(Arc::new(BreadcrumbLogManager::new(
                self.log_path.clone(),
                settings.max_log_size_bytes,
            )));
        }
        state.settings = settings;
        state.enabled = true;
        let session_id = Uuid::new_v4();
        state.session_id = Some(session_id);
        debug!("breadcrumbs enabled, session {session_id}");
    }

    /// Disables collection and drops the session id. Stored breadcrumbs are
    /// kept; call [`BreadcrumbRegistry::clear`] to erase them. Idempotent.
    pub fn disable(&self) {
        let mut state = self.lock();
        state.enabled = false;
        state.session_id = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// The session correlation id, `None` while disabled.
    pub fn session_id(&self) -> Option<Uuid> {
        self.lock().session_id
    }

    /// Whether a breadcrumb of this type and level would currently pass the
    /// filter.
    pub fn allows(&self, breadcrumb_type: BreadcrumbType, level: BreadcrumbLevel) -> bool {
        let state = self.lock();
        state.enabled && state.settings.allows(breadcrumb_type, level)
    }

    /// Adds a `manual`/`info` breadcrumb with no attributes.
    pub fn add_breadcrumb(&self, message: &str) -> bool {
        self.add_breadcrumb_with(
            message,
            BTreeMap::new(),
            BreadcrumbType::default(),
            BreadcrumbLevel::default(),
        )
    }

    /// Adds a breadcrumb, returning `false` immediately (no storage access)
    /// when disabled or filtered out.
    pub fn add_breadcrumb_with(
        &self,
        message: &str,
        attributes: BTreeMap<String, String>,
        breadcrumb_type: BreadcrumbType,
        level: BreadcrumbLevel,
    ) -> bool {
        let manager = {
            let state = self.lock();
            if !state.enabled || !state.settings.allows(breadcrumb_type, level) {
                return false;
            }
            state.manager.clone()
        };
        match manager {
            Some(manager) => manager.add_breadcrumb(message, attributes, breadcrumb_type, level),
            None => false,
        }
    }

    /// Erases the stored trail. Works regardless of the enabled state so
    /// cleanup flows can run while collection is off; succeeds trivially when
    /// nothing was ever stored.
    pub fn clear(&self) -> bool {
        let manager = self.lock().manager.clone();
        match manager {
            Some(manager) => manager.clear(),
            None => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
