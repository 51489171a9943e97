// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`capwire-core`)
//!
//! Read-only HTTP surface over already computed channel state. No resolution
//! happens here; handlers only read from the `ChannelRepository`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Channel and routing queries per tenant, health |

pub mod api;
