use std::path::PathBuf;

use clap::Parser;
use tf_registry_cache::{run_with_provider_cache, DriverOptions};
use tracing_subscriber::EnvFilter;

/// Runs a client invocation behind a local provider registry cache that
/// deduplicates concurrent plugin downloads across many invocations.
#[derive(Parser, Debug)]
#[command(name = "tf-registry-cache", author, version, about)]
struct Cli {
    /// Master switch: without this, the client runs directly with no cache.
    #[arg(long)]
    provider_cache: bool,

    /// Host the local registry facade listens on.
    #[arg(long, default_value = "localhost")]
    registry_hostname: String,

    /// Port the local registry facade listens on.
    #[arg(long, default_value_t = 6675)]
    registry_port: u16,

    /// Bearer token clients must present; auto-generated if omitted.
    #[arg(long)]
    registry_token: Option<String>,

    /// Upstream registry hostname to proxy. Repeatable.
    #[arg(long = "registry-name")]
    registry_names: Vec<String>,

    /// Directory used for the plugin cache and the generated CLI config.
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// The client binary to run (e.g. `terraform`, `tofu`).
    #[arg(long, default_value = "terraform")]
    client_command: String,

    /// Arguments forwarded to the client verbatim.
    #[arg(last = true)]
    client_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let opts = DriverOptions {
        provider_cache: cli.provider_cache,
        registry_hostname: cli.registry_hostname,
        registry_port: cli.registry_port,
        registry_token: cli.registry_token,
        registry_names: cli.registry_names,
        download_dir: cli.download_dir,
        client_command: cli.client_command,
        client_args: cli.client_args,
    };

    run_with_provider_cache(opts).await
}
