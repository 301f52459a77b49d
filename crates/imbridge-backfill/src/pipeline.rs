// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Backfill Pipeline: paginated history fetch for a portal, with
//! attachment hydration completed before any message is handed back to
//! the caller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use imbridge_common::{Message, PortalId};
use imbridge_store::ShadowStore;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::BackfillResult;
use crate::hydration::{self, AttachmentFetcher, FailureTracker};

/// Internal page size for forward reads: a forward fetch is a single
/// invocation regardless of how many rows the window spans, so it must
/// chunk its own reads rather than pull the whole range at once.
const FORWARD_CHUNK_ROWS: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub messages: Vec<Message>,
    /// Only meaningful for `Direction::Backward`: true when exactly
    /// `count` rows were returned and an earlier page may still exist.
    /// Forward fetches never paginate, so this is always `false` there.
    pub has_more: bool,
}

pub struct BackfillPipeline<F> {
    store: ShadowStore,
    pub(crate) fetcher: Arc<F>,
    semaphore: Arc<Semaphore>,
    failures: FailureTracker,
}

impl<F: AttachmentFetcher + 'static> BackfillPipeline<F> {
    pub fn new(store: ShadowStore, fetcher: F, concurrency: usize) -> Self {
        Self {
            store,
            fetcher: Arc::new(fetcher),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            failures: Default::default(),
        }
    }

    /// `initial_sync_days` bounds the "no anchor, backward" case to the
    /// configured scrollback window (default 365 days). A forward fetch
    /// with no anchor is a full historical export and ignores the window.
    pub async fn fetch_messages(
        &self,
        portal: &PortalId,
        direction: Direction,
        anchor: Option<(i64, String)>,
        count: usize,
        initial_sync_days: u32,
        cancel: &CancellationToken,
    ) -> BackfillResult<FetchResult> {
        match direction {
            Direction::Backward => self.fetch_backward(portal, anchor, count, initial_sync_days, cancel).await,
            Direction::Forward => self.fetch_forward(portal, anchor, cancel).await,
        }
    }

    async fn fetch_backward(
        &self,
        portal: &PortalId,
        anchor: Option<(i64, String)>,
        count: usize,
        initial_sync_days: u32,
        cancel: &CancellationToken,
    ) -> BackfillResult<FetchResult> {
        let anchor_ref = anchor.as_ref().map(|(ts, guid)| (*ts, guid.as_str()));
        let mut messages = self.store.list_backward_messages(portal, anchor_ref, count).await?;
        let exhausted_by_count = messages.len() == count;

        let has_more = if anchor.is_none() {
            let cutoff = Utc::now() - Duration::days(initial_sync_days as i64);
            let cutoff_ms = cutoff.timestamp_millis();
            let before_filter = messages.len();
            messages.retain(|m| m.timestamp_ms >= cutoff_ms);
            // The scrollback window only trims the old end of an already
            // newest-first page, so losing rows to it never implies there
            // is more recent history left to fetch.
            exhausted_by_count && messages.len() == before_filter
        } else {
            exhausted_by_count
        };

        self.hydrate(&messages, cancel).await?;
        Ok(FetchResult { messages, has_more })
    }

    async fn fetch_forward(
        &self,
        portal: &PortalId,
        anchor: Option<(i64, String)>,
        cancel: &CancellationToken,
    ) -> BackfillResult<FetchResult> {
        let mut cursor = anchor;
        let mut messages = Vec::new();
        loop {
            let cursor_ref = cursor.as_ref().map(|(ts, guid)| (*ts, guid.as_str()));
            let chunk = self
                .store
                .list_forward_messages(portal, cursor_ref, FORWARD_CHUNK_ROWS)
                .await?;
            let got = chunk.len();
            if let Some(last) = chunk.last() {
                cursor = Some((last.timestamp_ms, last.guid.clone()));
            }
            self.hydrate(&chunk, cancel).await?;
            messages.extend(chunk);
            if got < FORWARD_CHUNK_ROWS {
                break;
            }
            if cancel.is_cancelled() {
                debug!(portal = %portal, fetched = messages.len(), "forward backfill cancelled mid-chunk");
                break;
            }
        }
        Ok(FetchResult { messages, has_more: false })
    }

    async fn hydrate(&self, messages: &[Message], cancel: &CancellationToken) -> BackfillResult<()> {
        hydration::hydrate_missing_attachments(
            &self.store,
            &self.fetcher,
            &self.semaphore,
            &self.failures,
            messages,
            cancel,
        )
        .await
    }
}
