// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CLI command handlers

pub mod config;
pub mod resolve;
pub mod run;

pub use config::ConfigCommand;
pub use resolve::ResolveArgs;
pub use run::RunArgs;
