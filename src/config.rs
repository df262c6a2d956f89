use std::path::{Path, PathBuf};

use anyhow::Context;

/// Writes the CLI-config file the client reads via `TF_CLI_CONFIG_FILE`.
/// This intentionally does not pull in a full HCL serializer (that layer
/// is an external collaborator per the driver's scope) — the two fields
/// this system needs are simple enough to emit as a literal template.
pub fn write_cli_config(download_dir: &Path, registry_hostname: &str, registry_port: u16, registry_names: &[String]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(download_dir)
        .with_context(|| format!("creating download dir {}", download_dir.display()))?;

    let plugin_cache_dir = download_dir.join("plugin-cache");
    std::fs::create_dir_all(&plugin_cache_dir)
        .with_context(|| format!("creating plugin cache dir {}", plugin_cache_dir.display()))?;

    let mut contents = format!("plugin_cache_dir = \"{}\"\n\n", plugin_cache_dir.display());
    for name in registry_names {
        contents.push_str(&format!(
            "host \"{name}\" {{\n  services = {{\n    \"providers.v1\" = \"http://{registry_hostname}:{registry_port}/v1/providers/{name}/\"\n  }}\n}}\n\n",
        ));
    }

    let path = download_dir.join(".terraformrc");
    std::fs::write(&path, contents).with_context(|| format!("writing CLI config to {}", path.display()))?;
    Ok(path)
}
