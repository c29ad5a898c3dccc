// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lyceum Core
//!
//! Course purchase, enrollment, refund and forum poll workflows for the
//! Lyceum learning platform.
//!
//! # Architecture
//!
//! - **domain:** aggregates, state machines and ports
//! - **application:** services orchestrating the workflows
//! - **infrastructure:** repositories, payment gateways, event bus, job queue
//! - **presentation:** axum HTTP API

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
