use gale_http_client::prelude::{CONTACT_PATH, LOGIN_PATH};
use gale_runner::prelude::{
    ConfigError, RequestGroup, ScenarioConfig, ScenarioDefinitionBuilder, Stage, Transport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const PROFILES: &[&str] = &["baseline", "soak", "spike", "stress", "locust"];

pub fn by_name(name: &str) -> Result<ScenarioConfig, ConfigError> {
    match name {
        "baseline" => Ok(baseline()),
        "soak" => Ok(soak()),
        "spike" => Ok(spike()),
        "stress" => Ok(stress()),
        "locust" => Ok(locust()),
        other => Err(ConfigError::UnknownProfile(other.to_string())),
    }
}

/// Normal traffic, 20 users for two minutes.
pub fn baseline() -> ScenarioConfig {
    with_site_thresholds(
        ScenarioConfig::constant(20, Duration::from_secs(120)).with_pacing(Duration::from_secs(1)),
    )
}

/// Normal traffic held for twelve hours, to find leaks and slow degradation.
pub fn soak() -> ScenarioConfig {
    with_site_thresholds(
        ScenarioConfig::constant(20, Duration::from_secs(12 * 60 * 60))
            .with_pacing(Duration::from_secs(1)),
    )
}

/// A sudden burst to 100 users and back.
pub fn spike() -> ScenarioConfig {
    with_site_thresholds(
        ScenarioConfig::staged(vec![
            Stage::new(Duration::from_secs(10), 10),
            Stage::new(Duration::from_secs(10), 100),
            Stage::new(Duration::from_secs(10), 10),
            Stage::new(Duration::from_secs(20), 10),
        ])
        .with_graceful_stop(Duration::ZERO)
        .with_pacing(Duration::from_millis(200)),
    )
}

/// Step up to 300 users, a minute per step, then ramp down.
pub fn stress() -> ScenarioConfig {
    let minute = Duration::from_secs(60);
    with_site_thresholds(
        ScenarioConfig::staged(
            [10, 50, 100, 200, 300, 0]
                .into_iter()
                .map(|target| Stage::new(minute, target))
                .collect(),
        )
        .with_graceful_stop(Duration::from_secs(30))
        .with_pacing(Duration::from_millis(200)),
    )
}

/// The browsing user of the original Locust suite. Each user logs in once, then submits the
/// contact form three times as often as it logs in again, waiting 200ms to 1s in between.
pub fn locust() -> ScenarioConfig {
    with_site_thresholds(
        ScenarioConfig::constant(20, Duration::from_secs(120))
            .with_pacing_range(Duration::from_millis(200), Duration::from_secs(1)),
    )
}

fn with_site_thresholds(config: ScenarioConfig) -> ScenarioConfig {
    config
        .with_threshold("http_req_duration{name:login}", &["p(95)<500"])
        .with_threshold("http_req_duration{name:contact}", &["p(95)<500"])
        .with_threshold("http_req_failed", &["rate<0.01"])
}

pub fn login_group() -> RequestGroup {
    RequestGroup::post(
        "login",
        LOGIN_PATH,
        json!({"username": "admin", "password": "1234"}),
    )
}

pub fn contact_group() -> RequestGroup {
    RequestGroup::post(
        "contact",
        CONTACT_PATH,
        json!({"name": "Eddie", "email": "a@b.com", "message": "Hello from QA site!"}),
    )
}

/// The `locust` profile logs in once and then picks contact or login at 3 to 1 on each
/// iteration. Every other profile sends a login and then a contact form submission on each
/// iteration.
pub fn scenario(
    name: &str,
    config: ScenarioConfig,
    transport: Arc<dyn Transport>,
) -> ScenarioDefinitionBuilder {
    let builder = ScenarioDefinitionBuilder::new(name, transport).with_config(config);
    match name {
        "locust" => builder
            .use_setup_group(login_group())
            .use_weighted_group(contact_group(), 3)
            .use_weighted_group(login_group(), 1),
        _ => builder.use_group(login_group()).use_group(contact_group()),
    }
}
