// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Aggregates, state machines and the ports (repository and gateway traits)
//! they are persisted and settled through. Nothing here performs I/O.
//!
//! | Module | Aggregate / concern |
//! |--------|---------------------|
//! | [`course`] | course catalog entry, price resolution |
//! | [`enrollment`] | (user, course) access record |
//! | [`payment`] | payment state machine, refund window |
//! | [`poll`] | forum polls, votes, tallies |
//! | [`certificate`] | completion certificates |
//! | [`payment_gateway`] | processor port |
//! | [`repository`] | persistence ports |
//! | [`platform_config`] | server configuration manifest |

pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod events;
pub mod payment;
pub mod payment_gateway;
pub mod platform_config;
pub mod poll;
pub mod repository;
pub mod user;
