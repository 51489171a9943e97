// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Cluster resource model, capability resolution and collaborator contracts.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and rules; no I/O beyond the traits in `repository`

pub mod agent;
pub mod capability;
pub mod channel;
pub mod events;
pub mod operator_config;
pub mod repository;
pub mod resolver;
pub mod resource;
pub mod rollout;
pub mod scope;
