//! Environment configuration for the simulated backends and coordination strategy.

use std::{env, time::Duration};

use color_eyre::{
    eyre::{bail, eyre, WrapErr},
    Result,
};
use hedged_fanout::{Candidate, Coordinator, FanoutConfig};

use crate::sim::{Profile, SimBackend};

const DEFAULT_BACKENDS: &str = "alpha=60/5,beta=120/10,gamma=250/30,delta=hang";

/// Parses one `name=latency_ms[/fail_pct]` or `name=hang` entry.
///
/// Jitter is half the base latency.
pub fn parse_backend(entry: &str) -> Result<(Candidate, Profile)> {
    let (name, behaviour) = entry
        .split_once('=')
        .ok_or_else(|| eyre!("backend entry {entry:?} is missing '='"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("backend entry {entry:?} has an empty name");
    }

    let behaviour = behaviour.trim();
    if behaviour.eq_ignore_ascii_case("hang") {
        return Ok((Candidate::from(name), Profile::Hang));
    }

    let (latency, fail_pct) = match behaviour.split_once('/') {
        Some((latency, pct)) => (latency, pct.trim()),
        None => (behaviour, "0"),
    };
    let base_ms: u64 = latency
        .trim()
        .parse()
        .wrap_err_with(|| format!("bad latency in backend entry {entry:?}"))?;
    let fail_pct: u8 = fail_pct
        .parse()
        .wrap_err_with(|| format!("bad failure rate in backend entry {entry:?}"))?;
    if fail_pct > 100 {
        bail!("failure rate in backend entry {entry:?} exceeds 100%");
    }

    Ok((
        Candidate::from(name),
        Profile::Latency {
            base_ms,
            jitter_ms: base_ms / 2,
            fail_pct,
        },
    ))
}

fn millis_from_env(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .wrap_err_with(|| format!("{key} must be a number of milliseconds"))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

/// Builds a coordinator over simulated backends from environment variables.
///
/// Looks for the following environment variables:
/// - `FANOUT_BACKENDS` (e.g. `alpha=60/5,beta=120,gamma=hang`)
/// - `FANOUT_HEDGE_MS`
/// - `FANOUT_TIMEOUT_MS`
pub fn build_coordinator_from_env(
) -> Result<(Coordinator<SimBackend>, Vec<(Candidate, Profile)>)> {
    let raw = env::var("FANOUT_BACKENDS").unwrap_or_else(|_| DEFAULT_BACKENDS.to_string());
    let backends = raw
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(parse_backend)
        .collect::<Result<Vec<_>>>()?;

    if backends.is_empty() {
        bail!(
            "No backends configured.\n\
             Set FANOUT_BACKENDS, e.g. FANOUT_BACKENDS=alpha=60/5,beta=120,gamma=hang"
        );
    }

    let mut cfg = FanoutConfig {
        hedge_after: Duration::from_millis(100),
        overall_timeout: Some(Duration::from_secs(2)),
        ..FanoutConfig::default()
    };
    if let Some(hedge_after) = millis_from_env("FANOUT_HEDGE_MS")? {
        cfg.hedge_after = hedge_after;
    }
    if let Some(timeout) = millis_from_env("FANOUT_TIMEOUT_MS")? {
        cfg.overall_timeout = Some(timeout);
    }

    let coordinator = Coordinator::new(SimBackend::new(&backends), cfg)?;
    Ok((coordinator, backends))
}
