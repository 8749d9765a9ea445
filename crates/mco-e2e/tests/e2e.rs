//! Live-cluster checks. They need a hub reachable through `OPTIONS` and
//! `KUBECONFIG`, so they only run with `cargo test -- --ignored`.

use clap::Parser;
use converge::CancellationToken;
use converge::ProbeResult;
use mco_e2e::config::Cli;
use mco_e2e::config::Commands;
use mco_e2e::resources::mco::McoVersion;
use mco_e2e::resources::names::AvailabilityMode;
use mco_e2e::resources::names::REQUIRED_CRDS;
use mco_e2e::scenarios::diagnostics;
use mco_e2e::scenarios::TestContext;
use once_cell::sync::OnceCell;
use tracing::info;

/// global logging initialization function, ensure logging is initialized only once
fn init_test_logging() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        mco_e2e::logging::init(1);
        info!("Test logging initialized");
    });
}

async fn context() -> TestContext {
    init_test_logging();
    let cli =
        Cli::try_parse_from(["mco-e2e", "check"]).expect("suite settings from the environment");
    assert_eq!(cli.command, Commands::Check);
    TestContext::from_args(&cli.suite, CancellationToken::new())
        .await
        .unwrap_or_else(|report| panic!("cannot connect to the hub: {report:?}"))
}

#[tokio::test]
#[ignore = "requires a hub cluster with the observability operator"]
async fn hub_serves_observability_crds() {
    let ctx = context().await;
    assert_eq!(ctx.hub.crds_exist(&REQUIRED_CRDS).await, ProbeResult::Success);
    assert_eq!(ctx.hub.operator_running().await, ProbeResult::Success);
}

#[tokio::test]
#[ignore = "requires an installed observability stack"]
async fn installed_stack_passes_integrity_check() {
    let ctx = context().await;
    assert_eq!(
        ctx.hub.mco_condition(McoVersion::V1beta2, "Ready").await,
        ProbeResult::Success
    );
    assert_eq!(
        ctx.hub.components_ready(AvailabilityMode::High).await,
        ProbeResult::Success
    );
    if let Err(report) = diagnostics::integrity_check(&ctx).await {
        diagnostics::dump(&ctx).await;
        panic!("integrity check failed: {report:?}");
    }
}
