mod cmd;
mod config;
mod error;

use clap::Parser;
use config::ServeArgs;

#[derive(Parser)]
#[command(name = "wstudio-server", about = "Studio lifecycle event service")]
struct Cli {
    #[command(flatten)]
    args: ServeArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = cmd::serve::run(cli.args).await {
        tracing::error!(error = %e, "wstudio-server failed");
        std::process::exit(1);
    }
}
