// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Capability resolution engine and reconciliation core of the capwire
//! operator.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Wires domain, application, infrastructure and presentation layers

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
