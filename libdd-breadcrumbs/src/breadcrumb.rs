// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What produced a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BreadcrumbType {
    Configuration,
    System,
    Process,
    Log,
    User,
    Navigation,
    HttpRequest,
    #[default]
    Manual,
}

impl BreadcrumbType {
    pub const ALL: [BreadcrumbType; 8] = [
        BreadcrumbType::Configuration,
        BreadcrumbType::System,
        BreadcrumbType::Process,
        BreadcrumbType::Log,
        BreadcrumbType::User,
        BreadcrumbType::Navigation,
        BreadcrumbType::HttpRequest,
        BreadcrumbType::Manual,
    ];
}

/// Severity of a breadcrumb. The derived ordering drives level filtering:
/// `Debug < Info < Warning < Error < Fatal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

/// One structured trail entry.
///
/// `id` is the process-session append counter, not a storage position; gaps
/// after a wraparound tell a reader how many records rotated away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: u64,
    /// Seconds since the Unix epoch, captured at append time.
    pub timestamp: f64,
    pub level: BreadcrumbLevel,
    #[serde(rename = "type")]
    pub breadcrumb_type: BreadcrumbType,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Breadcrumb {
    /// Encodes the record as one JSON object terminated by a newline.
    ///
    /// JSON string escaping guarantees an embedded newline in a message or
    /// attribute can never masquerade as a record separator, so a sequential
    /// reader can always resynchronize on `\n`.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decodes every parseable record from a raw (possibly rotated) buffer.
    ///
    /// Lines that fail to parse are skipped rather than aborting the scan;
    /// the wrap point of the backing ring routinely leaves a leading or
    /// trailing fragment in the buffer.
    pub fn decode_stream(bytes: &[u8]) -> Vec<Breadcrumb> {
        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_slice(line).ok())
            .collect()
    }
}

/// Seconds since the Unix epoch as a float, the timestamp form carried by
/// every breadcrumb.
pub(crate) fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
