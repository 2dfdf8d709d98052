// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Snapline upload pipeline.
//!
//! Four cooperating pieces sit between the webhook and Google Drive:
//!
//! - [`dispatcher::Dispatcher`] routes inbound events and picks replies,
//! - [`processor::UploadProcessor`] runs the immediate upload path,
//! - [`batch::BatchAggregator`] coalesces uploads into one summary per
//!   quiet period,
//! - [`worker::RetryWorker`] gives queued failures exactly one retry.

pub mod batch;
pub mod dispatcher;
pub mod processor;
pub mod replies;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchAggregator, BatchStatus, BatchUpload};
pub use dispatcher::Dispatcher;
pub use processor::UploadProcessor;
pub use worker::RetryWorker;
