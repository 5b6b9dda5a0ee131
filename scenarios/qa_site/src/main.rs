use anyhow::Context;
use gale_http_client::prelude::ReqwestTransport;
use gale_runner::prelude::*;
use std::sync::Arc;
use std::time::Duration;

mod profiles;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

fn main() -> GaleResult<()> {
    let cli = init();

    let base_url = cli
        .base_url
        .clone()
        .or_else(|| std::env::var("BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let config = match &cli.profile_file {
        Some(path) => ScenarioConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load profile from {}", path.display()))?,
        None => profiles::by_name(&cli.profile).with_context(|| {
            format!(
                "Choose one of {} or pass --profile-file",
                profiles::PROFILES.join(", ")
            )
        })?,
    }
    .scaled(cli.duration_scale)
    .context("Invalid --duration-scale")?;

    let transport = ReqwestTransport::new(&base_url, Duration::from_secs(cli.request_timeout_s))
        .context("Failed to create the HTTP transport")?;
    log::info!("Running the {} profile against {}", cli.profile, transport.base_url());

    let run_config = RunConfig::from_cli(&cli)
        .with_env("BASE_URL", &base_url)
        .with_env("PROFILE", &cli.profile);

    let scenario = profiles::scenario(&cli.profile, config, Arc::new(transport))
        .with_run_config(run_config);

    let summary = run(scenario)?;

    if !summary.result.overall_pass {
        let failed = summary.result.failed_thresholds().count();
        log::error!("{failed} thresholds failed for run {}", summary.run_id);
        std::process::exit(1);
    }

    Ok(())
}
