use anyhow::Result;
use clap::Parser;
use error_stack::Report;
use mco_e2e::config::Cli;
use mco_e2e::config::Commands;
use mco_e2e::error::E2eError;
use mco_e2e::logging;
use mco_e2e::scenarios;
use mco_e2e::scenarios::TestContext;
use tokio_util::sync::CancellationToken;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

/// Cancel `token` on the first Ctrl-C so running polls stop between attempts.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling remaining steps");
            token.cancel();
        }
    });
}

fn into_anyhow(report: Report<E2eError>) -> anyhow::Error {
    anyhow::anyhow!("{report:?}")
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut ctx = TestContext::from_args(&cli.suite, cancel)
        .await
        .map_err(into_anyhow)?;

    tracing::info!(command = ?cli.command, "Starting observability e2e");
    run(cli.command, &mut ctx).await.map_err(into_anyhow)
}

async fn run(command: Commands, ctx: &mut TestContext) -> Result<(), Report<E2eError>> {
    match command {
        Commands::Install => scenarios::install::run(ctx).await,
        Commands::Reconcile => scenarios::reconcile::run(ctx).await,
        Commands::Uninstall => scenarios::uninstall::run(ctx).await,
        Commands::All => {
            scenarios::install::run(ctx).await?;
            let reconciled = scenarios::reconcile::run(ctx).await;
            let uninstalled = scenarios::uninstall::run(ctx).await;
            reconciled.and(uninstalled)
        }
        Commands::Check => scenarios::diagnostics::integrity_check(ctx).await,
    }
}
