// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::breadcrumb::{BreadcrumbLevel, BreadcrumbType};
use crate::ring_store::DEFAULT_RING_CAPACITY;
use serde::{Deserialize, Serialize};

/// Filtering and sizing policy applied when breadcrumbs are enabled.
///
/// Invalid values never fail enablement; [`BreadcrumbSettings::normalized`]
/// folds them back to defaults first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadcrumbSettings {
    /// Cap on the trail file's physical size. Zero means the default.
    pub max_log_size_bytes: u64,
    /// Minimum level that passes the filter.
    pub min_level: BreadcrumbLevel,
    /// Breadcrumb types that pass the filter. Empty means all types.
    pub allowed_types: Vec<BreadcrumbType>,
}

impl Default for BreadcrumbSettings {
    fn default() -> Self {
        Self {
            max_log_size_bytes: DEFAULT_RING_CAPACITY,
            min_level: BreadcrumbLevel::Debug,
            allowed_types: BreadcrumbType::ALL.to_vec(),
        }
    }
}

impl BreadcrumbSettings {
    pub fn normalized(mut self) -> Self {
        if self.max_log_size_bytes == 0 {
            self.max_log_size_bytes = DEFAULT_RING_CAPACITY;
        }
        if self.allowed_types.is_empty() {
            self.allowed_types = BreadcrumbType::ALL.to_vec();
        }
        self
    }

    pub fn allows(&self, breadcrumb_type: BreadcrumbType, level: BreadcrumbLevel) -> bool {
        level >= self.min_level && self.allowed_types.contains(&breadcrumb_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_everything() {
        let settings = BreadcrumbSettings::default();
        for breadcrumb_type in BreadcrumbType::ALL {
            assert!(settings.allows(breadcrumb_type, BreadcrumbLevel::Debug));
        }
    }

    #[test]
    fn zero_capacity_normalizes_to_default() {
        let settings = BreadcrumbSettings {
            max_log_size_bytes: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.max_log_size_bytes, DEFAULT_RING_CAPACITY);
    }

    #[test]
    fn empty_type_list_normalizes_to_all_types() {
        let settings = BreadcrumbSettings {
            allowed_types: vec![],
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.allowed_types, BreadcrumbType::ALL.to_vec());
    }

    #[test]
    fn level_filter_is_a_minimum() {
        let settings = BreadcrumbSettings {
            min_level: BreadcrumbLevel::Error,
            ..Default::default()
        };
        assert!(!settings.allows(BreadcrumbType::Manual, BreadcrumbLevel::Info));
        assert!(settings.allows(BreadcrumbType::Manual, BreadcrumbLevel::Error));
        assert!(settings.allows(BreadcrumbType::Manual, BreadcrumbLevel::Fatal));
    }

    #[test]
    fn type_filter_excludes_unlisted_types() {
        let settings = BreadcrumbSettings {
            allowed_types: vec![BreadcrumbType::System, BreadcrumbType::Manual],
            ..Default::default()
        };
        assert!(settings.allows(BreadcrumbType::System, BreadcrumbLevel::Info));
        assert!(!settings.allows(BreadcrumbType::Navigation, BreadcrumbLevel::Fatal));
    }
}
