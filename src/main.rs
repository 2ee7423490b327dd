//! infomaniak-ddns - keeps an Infomaniak DNS record pointed at this host.

use clap::Parser;
use infomaniak_ddns::config::Target;
use infomaniak_ddns::detector::IpDetector;
use infomaniak_ddns::providers::create_provider;
use infomaniak_ddns::reconciler::{Reconciler, Reconciliation};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "infomaniak-ddns")]
#[command(about = "Dynamic DNS client for Infomaniak, configured through environment variables")]
#[command(version)]
struct Cli {
    /// Run a single check and exit instead of polling forever
    #[arg(long)]
    once: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let target = Target::from_env()?;
    let provider = create_provider(&target)?;
    provider.validate().await?;
    let detector = IpDetector::new()?;

    let mut reconciler = Reconciler::new(target, Box::new(detector), provider);

    if cli.once {
        cmd_once(&mut reconciler).await
    } else {
        cmd_daemon(&mut reconciler).await
    }
}

async fn cmd_once(reconciler: &mut Reconciler) -> anyhow::Result<()> {
    println!("infomaniak-ddns: {}", reconciler.target().hostname);
    println!("================\n");

    let mut all_ok = true;

    for (family, result) in reconciler.run_cycle().await {
        print!("  {}: ", family);

        match result {
            Ok(Reconciliation::InSync { ip }) => println!("up to date ({})", ip),
            Ok(Reconciliation::AlreadyAttempted { ip }) => println!("already sent ({})", ip),
            Ok(Reconciliation::Updated { ip, outcome }) => {
                println!("{} ({})", outcome, ip);
                all_ok &= outcome.is_success();
            }
            Ok(Reconciliation::UpdateFailed { ip, reason }) => {
                println!("FAILED ({}) - {}", ip, reason);
                all_ok = false;
            }
            Err(e) => {
                println!("skipped - {}", e);
                all_ok = false;
            }
        }
    }

    if !all_ok {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_daemon(reconciler: &mut Reconciler) -> anyhow::Result<()> {
    tokio::select! {
        _ = reconciler.run_forever() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
