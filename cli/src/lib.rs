// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! capwire CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Wires the core crate into a running operator process

pub mod commands;

use clap::ValueEnum;

/// Shape of log lines written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Single-line human readable output
    Compact,
    /// One JSON object per line, for log collectors
    Json,
}
