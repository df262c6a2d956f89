use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use registry_core::Coordinator;
use registry_util::{RegistryError, TrapWriter};
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config;

/// Driver configuration options (spec §6): the master switch plus
/// everything needed to stand the facade up and point the client at it.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    pub provider_cache: bool,
    pub registry_hostname: String,
    pub registry_port: u16,
    pub registry_token: Option<String>,
    pub registry_names: Vec<String>,
    pub download_dir: PathBuf,
    pub client_command: String,
    pub client_args: Vec<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            provider_cache: false,
            registry_hostname: "localhost".to_string(),
            registry_port: 6675,
            registry_token: None,
            registry_names: Vec::new(),
            download_dir: PathBuf::from("."),
            client_command: "terraform".to_string(),
            client_args: Vec::new(),
        }
    }
}

/// The canonical locked-plugin status line the client is expected to print
/// to stderr: the decimal status code, a space, and the status's canonical
/// reason phrase.
fn locked_status_line(status: axum::http::StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
}

/// Runs the client once, trapping the locked-plugin signal, retrying until
/// either the client succeeds with nothing trapped or fails with nothing
/// trapped. Starts and tears down the registry facade around the retry
/// loop. Mirrors the original's `RunWithProviderCache`.
pub async fn run_with_provider_cache(opts: DriverOptions) -> anyhow::Result<()> {
    if !opts.provider_cache {
        let status = run_client(&opts, &HashMap::new(), None).await?;
        anyhow::ensure!(status.success(), "client exited with {status}");
        return Ok(());
    }

    let token = opts
        .registry_token
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let bearer_value = format!("x-api-key:{token}");

    let mut env = HashMap::new();
    for host in &opts.registry_names {
        env.insert(format!("TF_TOKEN_{}", host.replace('.', "_")), bearer_value.clone());
    }

    let config_path = config::write_cli_config(
        &opts.download_dir,
        &opts.registry_hostname,
        opts.registry_port,
        &opts.registry_names,
    )
    .context("writing CLI config file")?;
    env.insert(
        "TF_CLI_CONFIG_FILE".to_string(),
        config_path.to_string_lossy().into_owned(),
    );
    env.insert(
        "TF_PLUGIN_CACHE_MAY_BREAK_DEPENDENCY_LOCK_FILE".to_string(),
        "1".to_string(),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let coordinator = Arc::new(Coordinator::new());
    let public_base_url = Url::parse(&format!("http://{}:{}", opts.registry_hostname, opts.registry_port))
        .map_err(|err| RegistryError::Configuration(format!("building the facade's own public URL: {err}")))?;
    let addr: SocketAddr = format!("{}:{}", opts.registry_hostname, opts.registry_port)
        .parse()
        .map_err(|err| RegistryError::Configuration(format!("parsing registry listen address: {err}")))?;
    let locked_status = axum::http::StatusCode::from_u16(423).expect("423 is a valid status code");

    let server = registry_server::build(coordinator.clone(), public_base_url, addr, token);
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move { server.run(server_cancel).await });

    let target_line = locked_status_line(locked_status);
    let result = drive_client_retries(&opts, &env, &coordinator, &cancel, &target_line).await;

    cancel.cancel();
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "registry facade reported an error on shutdown"),
        Err(join_err) => tracing::warn!(error = %join_err, "registry facade task panicked"),
    }

    result
}

async fn drive_client_retries(
    opts: &DriverOptions,
    env: &HashMap<String, String>,
    coordinator: &Arc<Coordinator>,
    cancel: &CancellationToken,
    target_line: &str,
) -> anyhow::Result<()> {
    loop {
        let mut trap = TrapWriter::new(std::io::stderr(), target_line.as_bytes().to_vec());
        let status = run_client(opts, env, Some(&mut trap)).await?;

        if trap.is_empty() {
            anyhow::ensure!(status.success(), "client exited with {status}");
            return Ok(());
        }

        let trapped: Vec<String> = trap
            .trapped_messages()
            .map(|msg| String::from_utf8_lossy(msg).into_owned())
            .collect();

        let locked = coordinator.locked_plugins().await;
        for message in &trapped {
            for plugin in &locked {
                let fragment = format!(
                    "{}/{}/{}",
                    plugin.registry_host.as_deref().unwrap_or(""),
                    plugin.namespace.as_deref().unwrap_or(""),
                    plugin.name.as_deref().unwrap_or(""),
                );
                if message.contains(&fragment) {
                    coordinator.wait_release(plugin, cancel).await;
                }
            }
        }
    }
}

/// Runs the configured client command once, optionally capturing its
/// stderr through `trap` (non-matching lines are still forwarded to the
/// real stderr; matching lines are swallowed).
async fn run_client(
    opts: &DriverOptions,
    env: &HashMap<String, String>,
    trap: Option<&mut TrapWriter<std::io::Stderr>>,
) -> anyhow::Result<std::process::ExitStatus> {
    let mut command = Command::new(&opts.client_command);
    command.args(&opts.client_args).envs(env);

    let Some(trap) = trap else {
        return command.status().await.context("spawning client");
    };

    command.stderr(std::process::Stdio::piped());
    let mut child = command.spawn().context("spawning client")?;
    let stderr = child.stderr.take().expect("stderr was piped");
    let mut lines = BufReader::new(stderr).lines();

    while let Some(line) = lines.next_line().await.context("reading client stderr")? {
        let mut line_bytes = line.into_bytes();
        line_bytes.push(b'\n');
        trap.write_all(&line_bytes).ok();
    }

    child.wait().await.context("waiting for client")
}
