use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about, long_about = None)]
pub struct GaleScenarioCli {
    /// The load profile to run, for example `baseline` or `stress`.
    #[clap(short, long, default_value = "baseline")]
    pub profile: String,

    /// Load the profile from a TOML file instead of using a built-in one.
    ///
    /// The name given by `--profile` is still used to name the run.
    #[clap(long)]
    pub profile_file: Option<PathBuf>,

    /// The base URL of the service to test. Falls back to the `BASE_URL` environment variable.
    #[clap(short, long)]
    pub base_url: Option<String>,

    /// Multiply every duration in the profile by this factor.
    ///
    /// Useful for trying out a long profile in a few seconds, for example `--duration-scale 0.01`.
    #[clap(long, default_value = "1.0")]
    pub duration_scale: f64,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Append the run summary as a JSON line to this file.
    #[clap(long, env = "RUN_SUMMARY_PATH", default_value = "run_summary.jsonl")]
    pub summary_path: Option<PathBuf>,

    /// How often, in milliseconds, the number of virtual users is adjusted to the profile.
    #[clap(long, default_value = "100")]
    pub tick_ms: u64,

    /// Give up on a single request after this many seconds. It is then recorded as a network failure.
    #[clap(long, default_value = "60")]
    pub request_timeout_s: u64,

    /// An identifier for this run. A random one is generated if not provided.
    #[clap(long)]
    pub run_id: Option<String>,
}
