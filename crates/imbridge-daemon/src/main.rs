// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

mod collaborators;

use imbridge_auth::AuthLifecycle;
use imbridge_common::config::get_configuration;
use imbridge_daemon::telemetry::{get_subscriber, init_subscriber};
use imbridge_dispatch::DispatcherRole;
use imbridge_resolver::NoContacts;
use imbridge_store::ShadowStore;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use collaborators::{
    UnimplementedAttachmentFetcher, UnimplementedAuthServiceClient, UnimplementedCloudSyncClient,
    UnimplementedDecryptor, UnimplementedPushClient, UnimplementedSink,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration("config/").expect("could not load configuration");

    let subscriber = get_subscriber("imbridge-daemon".into(), config.log_filter.clone(), std::io::stdout);
    init_subscriber(subscriber);

    info!(database_path = %config.database_path, "starting imbridge-daemon");

    let login_id = "primary-login";
    let store = ShadowStore::open(login_id, &config.database_path).await?;
    let auth = AuthLifecycle::new(UnimplementedAuthServiceClient, login_id);

    // Real deployments feed this from the protocol client's push callback;
    // left empty here since that transport is this binary's only
    // unimplemented seam.
    let (_push_tx, push_rx) = mpsc::channel(256);

    let (stop_tx, stop_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = stop_tx.send(());
    });

    imbridge_daemon::run(
        config,
        store,
        auth,
        UnimplementedCloudSyncClient,
        UnimplementedDecryptor,
        UnimplementedSink,
        NoContacts,
        UnimplementedPushClient,
        UnimplementedAttachmentFetcher,
        login_id.to_string(),
        DispatcherRole::Primary,
        push_rx,
        stop_rx,
    )
    .await
}
