use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod client;
mod config;
mod dispatch;
mod extract;
mod normalize;
mod server;
mod utils;

use cli::{Cli, Commands};
use client::FetchOptions;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "tubefetch=debug"
    } else {
        "tubefetch=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { port, download_dir } => {
            let mut config = Config::load().await?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = download_dir {
                config.storage.download_dir = dir;
            }

            // Check for required external dependencies (non-fatal)
            let missing = utils::check_dependencies(&config.extractor.yt_dlp_path).await;
            if !missing.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may be available)");
            }

            server::start_server(config).await?;
        }
        Commands::Fetch {
            url,
            kind,
            output,
            server,
            timeout,
        } => {
            let opts = FetchOptions {
                server,
                output,
                timeout: std::time::Duration::from_secs(timeout),
                quiet: cli.quiet,
            };

            match client::fetch(&url, kind.into(), &opts).await {
                Ok(fetched) => {
                    println!(
                        "{} {} ({})",
                        style("Saved").green().bold(),
                        fetched.path.display(),
                        utils::format_file_size(fetched.bytes)
                    );
                }
                Err(e) => {
                    eprintln!("{} {}", style("Error:").red().bold(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written. Edit it at your platform config directory under tubefetch/config.yaml");
            }
        }
    }

    Ok(())
}
