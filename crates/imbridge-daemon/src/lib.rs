// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wires the bridge crates into one running process: an initial full sync,
//! the realtime dispatch loop, and the proactive credential-refresh timers,
//! all behind a shared shutdown broadcast.

pub mod telemetry;

use std::sync::Arc;

use imbridge_auth::{AuthLifecycle, AuthServiceClient};
use imbridge_backfill::{AttachmentFetcher, BackfillPipeline};
use imbridge_common::BridgeConfig;
use imbridge_dispatch::{Dispatcher, DispatcherRole, PushEvent, Sink};
use imbridge_outbound::{OutboundAdapter, PushClient};
use imbridge_resolver::ContactSource;
use imbridge_store::ShadowStore;
use imbridge_sync::{CloudSyncClient, Decryptor, SyncEngine};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Runs until `stop` fires, then lets every spawned task wind down.
#[allow(clippy::too_many_arguments)]
pub async fn run<A, CL, D, P, S, C, F>(
    config: BridgeConfig,
    store: ShadowStore,
    auth: Arc<AuthLifecycle<A>>,
    cloud_client: CL,
    decryptor: D,
    sink: S,
    contacts: C,
    push_client: P,
    attachment_fetcher: F,
    self_identifier: String,
    dispatcher_role: DispatcherRole,
    mut push_events: mpsc::Receiver<PushEvent>,
    mut stop: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    A: AuthServiceClient + Send + Sync + 'static,
    CL: CloudSyncClient + Send + Sync + 'static,
    D: Decryptor + Send + Sync + 'static,
    P: PushClient + Send + Sync + 'static,
    S: Sink + Clone + Send + Sync + 'static,
    C: ContactSource + Clone + Send + Sync + 'static,
    F: AttachmentFetcher + Send + Sync + 'static,
{
    let sync_engine = SyncEngine::new(store.clone(), cloud_client, decryptor);
    let dispatcher = Dispatcher::with_role(store.clone(), sink, contacts, dispatcher_role);
    let backfill = Arc::new(BackfillPipeline::new(
        store.clone(),
        attachment_fetcher,
        config.attachment_hydration_concurrency,
    ));
    let outbound = OutboundAdapter::with_dispatcher(push_client, dispatcher.clone(), self_identifier);
    // Held so the outbound send surface stays reachable for whatever wires
    // sink-originated actions into it; this skeleton only drives the
    // inbound direction.
    let _ = (&backfill, &outbound);

    info!("running initial full sync");
    if let Err(err) = sync_engine.run_full_sync().await {
        warn!(%err, "initial full sync failed");
    }

    let pet_refresh_task = {
        let auth = auth.clone();
        let mut stop = stop.resubscribe();
        let interval = imbridge_auth::refresh_interval(config.pet_refresh_interval_minutes);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = auth.proactive_pet_refresh().await {
                            warn!(%err, "proactive PET refresh failed");
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    };

    let delegate_refresh_task = {
        let auth = auth.clone();
        let mut stop = stop.resubscribe();
        let interval = imbridge_auth::refresh_interval(config.delegate_refresh_interval_minutes);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = auth.ensure_delegate().await {
                            warn!(%err, "proactive delegate refresh failed");
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    };

    let state_persist_task = {
        let auth = auth.clone();
        let mut stop = stop.resubscribe();
        let interval = std::time::Duration::from_secs(config.state_persist_interval_minutes * 60);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        info!(state = ?auth.state().await, "periodic state checkpoint");
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    };

    let dispatch_task = {
        let dispatcher = dispatcher.clone();
        let mut stop = stop.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = push_events.recv() => {
                        let Some(event) = event else { break };
                        if let Err(err) = dispatcher.handle_event(event).await {
                            warn!(%err, "failed to handle push event");
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    };

    let _ = stop.recv().await;
    info!("shutdown signal received, waiting for tasks to wind down");
    for task in [pet_refresh_task, delegate_refresh_task, state_persist_task, dispatch_task] {
        let _ = task.await;
    }
    Ok(())
}
