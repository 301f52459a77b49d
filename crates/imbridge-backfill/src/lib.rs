// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Backfill Pipeline: on-demand paginated history for a portal,
//! hydrating attachments in parallel ahead of the conversion loop that
//! turns stored messages into whatever the caller needs next.

pub mod error;
pub mod hydration;
pub mod pipeline;

pub use error::{BackfillError, BackfillResult};
pub use hydration::AttachmentFetcher;
pub use pipeline::{BackfillPipeline, Direction, FetchResult};
