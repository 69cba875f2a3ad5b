//! Application configuration loaded from environment variables.
//!
//! All values are optional:
//! - `QUOTEFEED_API_URL`: relay HTTP base (default `http://localhost:8000`),
//!   used for historical candles and to derive the stream URL
//! - `QUOTEFEED_RELAY_URL`: overrides the derived `ws://.../ws/market-data` URL
//! - `QUOTEFEED_RECONNECT_DELAY_MS`: linear backoff unit (default 3000)
//! - `QUOTEFEED_MAX_RECONNECT_ATTEMPTS`: retry budget (default 5)
//! - `QUOTEFEED_HISTORY_TIMEOUT_MS`: bound on one history request (default 10000)
//! - `QUOTEFEED_BUCKET_SECS`: chart candle width (default 60)

use std::str::FromStr;
use std::time::Duration;

use crate::aggregator::DEFAULT_BUCKET_SECS;
use crate::history::DEFAULT_HISTORY_TIMEOUT;
use crate::websocket::ReconnectPolicy;

/// Default relay HTTP endpoint.
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the market-data stream on the relay.
const STREAM_PATH: &str = "/ws/market-data";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub chart: ChartConfig,
}

/// Where the relay lives and how to reconnect to it.
#[derive(Debug)]
pub struct RelayConfig {
    pub websocket_url: String,
    pub api_url: String,
    pub history_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Chart aggregation settings.
#[derive(Debug)]
pub struct ChartConfig {
    pub bucket_secs: i64,
}

/// Loads the application configuration from environment variables.
///
/// Empty variables count as unset.
///
/// # Errors
///
/// Returns [`FeedError::Config`](crate::FeedError::Config) if a numeric
/// variable does not parse, or if the bucket width is not positive.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let api_url = non_empty_var("QUOTEFEED_API_URL")
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
        .trim_end_matches('/')
        .to_string();
    let websocket_url =
        non_empty_var("QUOTEFEED_RELAY_URL").unwrap_or_else(|| stream_url_for(&api_url));

    let defaults = ReconnectPolicy::default();
    let base_delay = parsed_var::<u64>("QUOTEFEED_RECONNECT_DELAY_MS")?
        .map_or(defaults.base_delay, Duration::from_millis);
    let max_attempts =
        parsed_var::<u32>("QUOTEFEED_MAX_RECONNECT_ATTEMPTS")?.unwrap_or(defaults.max_attempts);

    let history_timeout = parsed_var::<u64>("QUOTEFEED_HISTORY_TIMEOUT_MS")?
        .map_or(DEFAULT_HISTORY_TIMEOUT, Duration::from_millis);
    if history_timeout.is_zero() {
        return Err(crate::FeedError::Config(
            "QUOTEFEED_HISTORY_TIMEOUT_MS must be positive".to_string(),
        ));
    }

    let bucket_secs = parsed_var::<i64>("QUOTEFEED_BUCKET_SECS")?.unwrap_or(DEFAULT_BUCKET_SECS);
    if bucket_secs <= 0 {
        return Err(crate::FeedError::Config(format!(
            "QUOTEFEED_BUCKET_SECS must be positive, got {bucket_secs}"
        )));
    }

    Ok(AppConfig {
        relay: RelayConfig {
            websocket_url,
            api_url,
            history_timeout,
            reconnect: ReconnectPolicy {
                base_delay,
                max_attempts,
            },
        },
        chart: ChartConfig { bucket_secs },
    })
}

/// Derives the stream URL from the HTTP base: `http` becomes `ws`,
/// `https` becomes `wss`.
pub fn stream_url_for(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let base = match base.split_once("://") {
        Some(("https", rest)) => format!("wss://{rest}"),
        Some(("http", rest)) => format!("ws://{rest}"),
        _ => base.to_string(),
    };
    format!("{base}{STREAM_PATH}")
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses an optional environment variable.
fn parsed_var<T: FromStr>(name: &str) -> crate::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| crate::FeedError::Config(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "QUOTEFEED_API_URL",
        "QUOTEFEED_RELAY_URL",
        "QUOTEFEED_RECONNECT_DELAY_MS",
        "QUOTEFEED_MAX_RECONNECT_ATTEMPTS",
        "QUOTEFEED_HISTORY_TIMEOUT_MS",
        "QUOTEFEED_BUCKET_SECS",
    ];

    /// Helper that temporarily sets env vars, runs `f`, then restores originals.
    ///
    /// Every variable in [`VARS`] not listed in `vars` is cleared for the
    /// duration of `f`.
    ///
    /// # Safety
    ///
    /// Holds [`ENV_LOCK`] for the whole call so no other test in this
    /// module reads or writes these env vars concurrently.
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let originals: Vec<(&str, Option<String>)> =
            VARS.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        for k in VARS {
            let value = vars.iter().find(|(name, _)| *name == k).and_then(|(_, v)| *v);
            // SAFETY: ENV_LOCK is held; nothing else in this crate reads these vars.
            unsafe {
                match value {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values, same single-threaded context.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn defaults_without_env_vars() {
        with_env(&[], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.relay.api_url, DEFAULT_API_URL);
            assert_eq!(
                config.relay.websocket_url,
                "ws://localhost:8000/ws/market-data"
            );
            assert_eq!(config.relay.reconnect, ReconnectPolicy::default());
            assert_eq!(config.relay.reconnect.base_delay, Duration::from_secs(3));
            assert_eq!(config.relay.reconnect.max_attempts, 5);
            assert_eq!(config.relay.history_timeout, Duration::from_secs(10));
            assert_eq!(config.chart.bucket_secs, 60);
        });
    }

    #[test]
    fn derives_secure_stream_url_from_api_url() {
        with_env(&[("QUOTEFEED_API_URL", Some("https://relay.example.com/"))], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.relay.api_url, "https://relay.example.com");
            assert_eq!(
                config.relay.websocket_url,
                "wss://relay.example.com/ws/market-data"
            );
        });
    }

    #[test]
    fn relay_url_overrides_derived_url() {
        with_env(
            &[
                ("QUOTEFEED_API_URL", Some("http://10.0.0.5:8000")),
                ("QUOTEFEED_RELAY_URL", Some("ws://stream.internal:9000/ticks")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.relay.api_url, "http://10.0.0.5:8000");
                assert_eq!(config.relay.websocket_url, "ws://stream.internal:9000/ticks");
            },
        );
    }

    #[test]
    fn reconnect_limits_are_tunable() {
        with_env(
            &[
                ("QUOTEFEED_RECONNECT_DELAY_MS", Some("250")),
                ("QUOTEFEED_MAX_RECONNECT_ATTEMPTS", Some("9")),
                ("QUOTEFEED_BUCKET_SECS", Some("300")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(
                    config.relay.reconnect.base_delay,
                    Duration::from_millis(250)
                );
                assert_eq!(config.relay.reconnect.max_attempts, 9);
                assert_eq!(config.chart.bucket_secs, 300);
            },
        );
    }

    #[test]
    fn rejects_unparsable_attempts() {
        with_env(
            &[("QUOTEFEED_MAX_RECONNECT_ATTEMPTS", Some("lots"))],
            || {
                let err = fetch_config().unwrap_err();
                assert!(err.to_string().contains("QUOTEFEED_MAX_RECONNECT_ATTEMPTS"));
            },
        );
    }

    #[test]
    fn history_timeout_is_tunable() {
        with_env(&[("QUOTEFEED_HISTORY_TIMEOUT_MS", Some("1500"))], || {
            let config = fetch_config().unwrap();
            assert_eq!(config.relay.history_timeout, Duration::from_millis(1500));
        });
    }

    #[test]
    fn rejects_zero_history_timeout() {
        with_env(&[("QUOTEFEED_HISTORY_TIMEOUT_MS", Some("0"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("QUOTEFEED_HISTORY_TIMEOUT_MS"));
        });
    }

    #[test]
    fn rejects_non_positive_bucket() {
        with_env(&[("QUOTEFEED_BUCKET_SECS", Some("0"))], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("must be positive"));
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &[
                ("QUOTEFEED_API_URL", Some("")),
                ("QUOTEFEED_RELAY_URL", Some("")),
                ("QUOTEFEED_RECONNECT_DELAY_MS", Some("")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.relay.api_url, DEFAULT_API_URL);
                assert_eq!(
                    config.relay.websocket_url,
                    "ws://localhost:8000/ws/market-data"
                );
                assert_eq!(config.relay.reconnect.base_delay, Duration::from_secs(3));
            },
        );
    }

    #[test]
    fn stream_url_keeps_unknown_schemes() {
        assert_eq!(stream_url_for("ws://a:1"), "ws://a:1/ws/market-data");
        assert_eq!(stream_url_for("http://a:1/"), "ws://a:1/ws/market-data");
    }
}
