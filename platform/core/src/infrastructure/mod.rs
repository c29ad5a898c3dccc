// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod job_queue;
pub mod payment_gateway;
pub mod repositories;

pub use event_bus::EventBus;
pub use job_queue::{JobDescriptor, JobQueue};
