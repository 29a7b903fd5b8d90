//! `provision-store`: ensure collections and indexes exist, then seed the
//! fixture graph. Safe to rerun any number of times.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io;
use std::sync::Arc;

use clap::Parser;
use delivery_store::domain::Provisioner;
use delivery_store::inbound::cli::{CliArgs, StoreTarget};
use delivery_store::outbound::mongo::{MongoConfig, MongoDocumentStore};
use mockable::{DefaultClock, DefaultEnv};
use tokio::runtime::Builder;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    let result = runtime.block_on(async_main(args));
    if let Err(error) = &result {
        error!(%error, "provisioning failed");
    }
    result
}

async fn async_main(args: CliArgs) -> io::Result<()> {
    let target = StoreTarget::resolve(args.uri, &DefaultEnv::new())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
    info!(uri = %target.redacted(), database = target.database(), "provisioning store");

    let config = MongoConfig::new(target.uri(), target.database());
    let store = MongoDocumentStore::connect(&config)
        .await
        .map_err(|error| io::Error::other(format!("connect to document store: {error}")))?;

    let provisioner = Provisioner::new(Arc::new(store), Arc::new(DefaultClock));
    let report = provisioner
        .run()
        .await
        .map_err(|error| io::Error::other(format!("provisioning failed: {error}")))?;

    for fixture in &report.seed.fixtures {
        info!(
            step = %fixture.step,
            id = %fixture.id,
            disposition = %fixture.disposition,
            "fixture"
        );
    }
    info!(
        collections = report.collections.len(),
        indexes = report.indexes.len(),
        fixtures_created = report.seed.created(),
        "store provisioned"
    );
    Ok(())
}
