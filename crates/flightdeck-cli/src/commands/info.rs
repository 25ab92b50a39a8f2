use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use flightdeck_core::{Configuration, FlightdeckConfig};
use flightdeck_state::StateStore;

#[derive(Debug, Args)]
pub struct InfoCommand {
    /// Project name.
    pub project: String,

    /// Print shell `export` lines for the secrets store CLI.
    #[arg(long)]
    pub env: bool,

    /// Fail unless the deployment lives in this region.
    #[arg(long)]
    pub region: Option<String>,
}

pub fn render_summary(config: &Configuration) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deployment:      {}", config.deployment);
    let _ = writeln!(out, "Region:          {}", config.region);
    let _ = writeln!(out, "Domain:          {}", config.domain);
    let _ = writeln!(out, "Director IP:     {}", config.director_public_ip);
    let _ = writeln!(
        out,
        "Workers:         {} x {}",
        config.worker_count, config.worker_size
    );
    let _ = writeln!(out, "Web size:        {}", config.web_size);
    let _ = writeln!(out, "Admin user:      {}", config.admin_username);
    let _ = writeln!(out, "Credhub URL:     {}", config.secrets_store.url);
    let _ = writeln!(out, "Credhub user:    {}", config.secrets_store.username);
    out
}

/// Shell-quote with single quotes.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn render_env(config: &Configuration) -> String {
    let access = &config.secrets_store;
    let mut out = String::new();
    for (name, value) in [
        ("CREDHUB_SERVER", &access.url),
        ("CREDHUB_CLIENT", &access.username),
        ("CREDHUB_SECRET", &access.password),
        ("CREDHUB_CA_CERT", &access.ca_cert),
    ] {
        let _ = writeln!(out, "export {name}={}", quote(value));
    }
    out
}

pub fn run(
    cmd: InfoCommand,
    settings: &FlightdeckConfig,
    state: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = super::state_path(settings, state);
    let store = StateStore::open_existing(&path)?.project(&cmd.project);
    let Some(config) = store.load()? else {
        bail!("no deployment found for project {}", cmd.project);
    };
    if let Some(region) = &cmd.region
        && *region != config.region
    {
        bail!(
            "deployment {} is in {}, not {region}",
            config.deployment,
            config.region
        );
    }

    if cmd.env {
        print!("{}", render_env(&config));
    } else {
        print!("{}", render_summary(&config));
    }
    Ok(())
}
