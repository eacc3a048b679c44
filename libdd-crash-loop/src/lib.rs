// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Crash-loop detection for application startup.
//!
//! Once per launch, [`CrashLoopDetector::detect_crash_loop`] derives whether
//! the previous run crashed (a leftover crash artifact on disk means it did),
//! records the outcome in a small persisted window of recent launches, and
//! answers whether every launch in that window failed. Initialization code
//! uses the answer to choose between the normal path and a degraded safe
//! mode that skips risky setup.
//!
//! Persistence goes through the injected [`KeyValueStore`] so the detector
//! works against platform preference stores, a plain directory, or an
//! in-memory fake in tests. Every failure path degrades to a usable boolean;
//! the detector never propagates an error into startup code.

mod detector;
mod key_value;
mod startup_events;

pub use detector::*;
pub use key_value::*;
pub use startup_events::*;
