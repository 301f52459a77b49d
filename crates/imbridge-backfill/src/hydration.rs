// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded-concurrency attachment hydration: downloads of uncached
//! attachments run in parallel, capped by a semaphore, and complete before
//! the caller's per-message conversion loop starts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use imbridge_common::{AttachmentMeta, FailedAttachmentEntry, MAX_ATTACHMENT_ATTEMPTS};
use imbridge_store::{AttachmentCacheEntry, ShadowStore};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BackfillError, BackfillResult};

const OGG_OPUS_MIME: &str = "audio/ogg";
const CAF_OPUS_MIME: &str = "audio/x-caf";

/// Collaborator that materializes an attachment's bytes on local disk and
/// reports back where they landed. Byte transport and storage are kept out
/// of this crate's concern, same as `Sink::upload_media` on the outbound
/// side.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, meta: &AttachmentMeta) -> BackfillResult<(String, String)>;
}

/// Tracks per-`record_name` hydration failures across calls so a portal
/// with one broken attachment doesn't retry it forever: once an entry's
/// attempt count reaches `MAX_ATTACHMENT_ATTEMPTS` it is abandoned with a
/// warning rather than blocking the message it belongs to. Held in memory
/// only; a restart resets the count.
pub(crate) type FailureTracker = Arc<Mutex<HashMap<String, FailedAttachmentEntry>>>;

/// Downloads every attachment referenced by `messages` that is not already
/// in the cache, up to `concurrency` at a time. Tasks waiting for a permit
/// observe `cancel` and exit promptly rather than queuing indefinitely.
pub(crate) async fn hydrate_missing_attachments<F: AttachmentFetcher + 'static>(
    store: &ShadowStore,
    fetcher: &Arc<F>,
    semaphore: &Arc<Semaphore>,
    failures: &FailureTracker,
    messages: &[imbridge_common::Message],
    cancel: &CancellationToken,
) -> BackfillResult<()> {
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    for message in messages {
        for attachment in &message.attachments {
            if !seen.insert(attachment.record_name.clone()) {
                continue;
            }
            if store.lookup_attachment(&attachment.record_name).await?.is_some() {
                continue;
            }
            if let Some(entry) = failures.lock().await.get(&attachment.record_name) {
                if entry.abandoned() {
                    continue;
                }
            }
            pending.push(attachment.clone());
        }
    }
    if pending.is_empty() {
        return Ok(());
    }
    debug!(count = pending.len(), "hydrating uncached attachments");

    let mut tasks = tokio::task::JoinSet::new();
    for attachment in pending {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let fetcher = fetcher.clone();
        let store = store.clone();
        let failures = failures.clone();
        tasks.spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = cancel.cancelled() => {
                    debug!(record_name = %attachment.record_name, "hydration cancelled before a slot was free");
                    return;
                }
            };
            let result = fetcher.fetch(&attachment).await;
            drop(permit);
            match result {
                Ok((local_path, content_type)) => {
                    let (local_path, content_type) = if content_type.eq_ignore_ascii_case(CAF_OPUS_MIME) {
                        match convert_caf_attachment_to_ogg(&local_path).await {
                            Ok(ogg_path) => (ogg_path, OGG_OPUS_MIME.to_string()),
                            Err(err) => {
                                warn!(
                                    record_name = %attachment.record_name,
                                    %err,
                                    "caf-to-ogg conversion failed, caching the original CAF bytes"
                                );
                                (local_path, content_type)
                            }
                        }
                    } else {
                        (local_path, content_type)
                    };
                    let entry = AttachmentCacheEntry {
                        record_name: attachment.record_name.clone(),
                        local_path,
                        content_type,
                    };
                    if let Err(err) = store.cache_attachment(&entry).await {
                        warn!(record_name = %attachment.record_name, %err, "failed to record hydrated attachment");
                    } else {
                        failures.lock().await.remove(&attachment.record_name);
                    }
                }
                Err(err) => record_failure(&failures, &attachment.record_name, &err.to_string()).await,
            }
        });
    }
    while tasks.join_next().await.is_some() {}
    Ok(())
}

/// Remuxes a received CAF Opus voice message back into OGG Opus for the
/// sink, mirroring the outbound adapter's OGG-to-CAF conversion on send.
/// Writes the converted bytes alongside the original under a `.ogg` path.
async fn convert_caf_attachment_to_ogg(local_path: &str) -> BackfillResult<String> {
    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|err| BackfillError::Fetch(err.to_string()))?;
    let ogg_bytes = imbridge_outbound::caf_opus_to_ogg(&bytes).map_err(|err| BackfillError::Fetch(err.to_string()))?;
    let ogg_path = format!("{local_path}.ogg");
    tokio::fs::write(&ogg_path, &ogg_bytes)
        .await
        .map_err(|err| BackfillError::Fetch(err.to_string()))?;
    Ok(ogg_path)
}

async fn record_failure(failures: &FailureTracker, record_name: &str, error: &str) {
    let mut map = failures.lock().await;
    let entry = map.entry(record_name.to_string()).or_insert(FailedAttachmentEntry {
        attempt_count: 0,
        last_error: String::new(),
        last_attempt_time: Utc::now(),
    });
    entry.attempt_count += 1;
    entry.last_error = error.to_string();
    entry.last_attempt_time = Utc::now();
    if entry.attempt_count >= MAX_ATTACHMENT_ATTEMPTS {
        warn!(record_name, attempts = entry.attempt_count, %error, "abandoning attachment after repeated hydration failures");
    } else {
        info!(record_name, attempts = entry.attempt_count, %error, "attachment hydration failed, will retry on a later pass");
    }
}
