// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::breadcrumb::{unix_timestamp, Breadcrumb, BreadcrumbLevel, BreadcrumbType};
use crate::ring_store::{RingStore, MAX_RECORD_SIZE};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};
use tracing::warn;

/// The only component that touches the ring store: stamps each breadcrumb
/// with a sequence id and timestamp, encodes it, and appends it.
#[derive(Debug)]
pub struct BreadcrumbLogManager {
    store: RingStore,
    next_id: AtomicU64,
}

impl BreadcrumbLogManager {
    pub fn new(path: impl Into<PathBuf>, max_log_size_bytes: u64) -> Self {
        Self {
            store: RingStore::new(path.into(), max_log_size_bytes),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn max_log_size_bytes(&self) -> u64 {
        self.store.capacity()
    }

    /// Stamps, encodes and appends one breadcrumb. Records whose encoded form
    /// exceeds [`MAX_RECORD_SIZE`] are rejected before the store is touched.
    pub fn add_breadcrumb(
        &self,
        message: &str,
        attributes: BTreeMap<String, String>,
        breadcrumb_type: BreadcrumbType,
        level: BreadcrumbLevel,
    ) -> bool {
        // Sequence ids mark append order, not storage position; an id burned
        // on a rejected record just shows up as a gap to the reader.
        let id = self.next_id.fetch_add(1, SeqCst);
        let breadcrumb = Breadcrumb {
            id,
            timestamp: unix_timestamp(),
            level,
            breadcrumb_type,
            message: message.to_string(),
            attributes,
        };
        let encoded = match breadcrumb.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("failed to encode breadcrumb {id}: {err:#}");
                return false;
            }
        };
        if encoded.len() > MAX_RECORD_SIZE {
            warn!(
                "rejecting breadcrumb {id}: encoded size {} exceeds {MAX_RECORD_SIZE} bytes",
                encoded.len()
            );
            return false;
        }
        self.store.append(&encoded)
    }

    /// Truncates the trail and restarts the sequence counter.
    pub fn clear(&self) -> bool {
        let cleared = self.store.clear();
        if cleared {
            self.next_id.store(0, SeqCst);
        }
        cleared
    }

    /// Raw file content, in on-disk order.
    pub fn read_all(&self) -> Vec<u8> {
        self.store.read_all()
    }

    /// Every record that still parses, skipping wrap-point fragments.
    pub fn read_breadcrumbs(&self) -> Vec<Breadcrumb> {
        Breadcrumb::decode_stream(&self.read_all())
    }
}
