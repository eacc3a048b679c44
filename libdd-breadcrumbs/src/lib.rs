// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A bounded, crash-survivable trail of recent application events.
//!
//! Breadcrumbs are small structured records (message, type, level, attributes)
//! appended to a single fixed-size file that wraps around when full, so the
//! trail written before an abnormal termination is still readable afterwards
//! and its on-disk footprint never grows past the configured cap.
//!
//! The public surface is [`BreadcrumbRegistry`]: enable it with
//! [`BreadcrumbSettings`], feed it breadcrumbs from application code or from
//! pluggable [`EventSource`] implementations, and read the file back (or tail
//! it with external tooling) after a crash. Every operation degrades to a
//! `false` return instead of propagating a failure into the host process.

mod breadcrumb;
mod manager;
mod registry;
mod ring_store;
mod settings;
mod sources;

pub use breadcrumb::*;
pub use manager::*;
pub use registry::*;
pub use ring_store::*;
pub use settings::*;
pub use sources::*;
