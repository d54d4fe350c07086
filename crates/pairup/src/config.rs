//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use pairup_room::RoundConfig;
use pairup_session::SessionConfig;
use tracing::warn;
use url::Url;

use crate::{AdapterConfig, PairupError};

/// Default session service base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Everything a client needs to reach the service and run a session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for HTTP calls, e.g. `http://localhost:5000/api`.
    pub api_url: String,

    /// Realtime endpoint. Derived from `api_url` when unset.
    pub ws_url: Option<String>,

    pub round: RoundConfig,
    pub session: SessionConfig,
    pub adapter: AdapterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            round: RoundConfig::default(),
            session: SessionConfig::default(),
            adapter: AdapterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`:
    ///
    /// | Variable              | Field                       |
    /// |-----------------------|-----------------------------|
    /// | `PAIRUP_API_URL`      | `api_url`                   |
    /// | `PAIRUP_WS_URL`       | `ws_url`                    |
    /// | `PAIRUP_STATE_DIR`    | `session.state_dir`         |
    /// | `PAIRUP_PAIRING_SECS` | `round.pairing_duration`    |
    /// | `PAIRUP_TALKING_SECS` | `round.talking_duration`    |
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str| get(key).and_then(|v| seconds(key, &v));

        if let Some(url) = get("PAIRUP_API_URL") {
            self.api_url = url.trim().to_string();
        }
        if let Some(url) = get("PAIRUP_WS_URL") {
            self.ws_url = Some(url.trim().to_string());
        }
        if let Some(dir) = get("PAIRUP_STATE_DIR") {
            self.session.state_dir = PathBuf::from(dir);
        }
        if let Some(duration) = secs("PAIRUP_PAIRING_SECS") {
            self.round.pairing_duration = duration;
        }
        if let Some(duration) = secs("PAIRUP_TALKING_SECS") {
            self.round.talking_duration = duration;
        }
        self
    }

    /// Validates every nested config.
    pub fn validated(mut self) -> Self {
        self.round = self.round.validated();
        self.session = self.session.validated();
        self.adapter = self.adapter.validated();
        self
    }

    /// The realtime URL: `ws_url` if set, otherwise derived from `api_url`.
    ///
    /// # Errors
    /// [`PairupError::InvalidUrl`] when the chosen URL does not parse.
    pub fn realtime_url(&self) -> Result<String, PairupError> {
        match &self.ws_url {
            Some(raw) => Url::parse(raw.trim())
                .map(String::from)
                .map_err(|e| PairupError::invalid_url(raw, e)),
            None => derive_ws_url(&self.api_url).map(String::from),
        }
    }
}

fn seconds(key: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warn!(key, value = raw, error = %e, "ignoring invalid duration");
            None
        }
    }
}

/// `http://host:5000/api` becomes `ws://host:5000/ws`; `https` maps to
/// `wss`. Query and fragment are dropped.
pub fn derive_ws_url(api_url: &str) -> Result<Url, PairupError> {
    let mut url = Url::parse(api_url.trim()).map_err(|e| PairupError::invalid_url(api_url, e))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(PairupError::invalid_url(
                api_url,
                format!("unsupported scheme `{other}`"),
            ));
        }
    };
    if url.set_scheme(scheme).is_err() {
        return Err(PairupError::invalid_url(api_url, "cannot switch to a realtime scheme"));
    }

    let path = url.path().trim_end_matches('/');
    let base = path.strip_suffix("/api").unwrap_or(path);
    let realtime = format!("{base}/ws");
    url.set_path(&realtime);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_derive_ws_url_strips_api_and_switches_scheme() {
        let derived = |raw: &str| derive_ws_url(raw).unwrap().to_string();
        assert_eq!(derived("http://localhost:5000/api"), "ws://localhost:5000/ws");
        assert_eq!(derived("https://pairup.school/api/"), "wss://pairup.school/ws");
        assert_eq!(derived("http://10.0.0.2:8080"), "ws://10.0.0.2:8080/ws");
        assert_eq!(derived("http://host/v2/api?debug=1"), "ws://host/v2/ws");
    }

    #[test]
    fn test_derive_ws_url_rejects_unparseable_or_foreign_scheme() {
        for raw in ["localhost:5000/api", "not a url", "ftp://files.school/api"] {
            let err = derive_ws_url(raw).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Validation, "{raw}");
        }
    }

    #[test]
    fn test_with_env_overrides_fields() {
        let config = ClientConfig::default().with_env(env(&[
            ("PAIRUP_API_URL", "https://pairup.school/api"),
            ("PAIRUP_STATE_DIR", "/tmp/pairup-test"),
            ("PAIRUP_PAIRING_SECS", "30"),
            ("PAIRUP_TALKING_SECS", "90"),
        ]));

        assert_eq!(config.api_url, "https://pairup.school/api");
        assert_eq!(config.realtime_url().unwrap(), "wss://pairup.school/ws");
        assert_eq!(config.session.state_dir, PathBuf::from("/tmp/pairup-test"));
        assert_eq!(config.round.pairing_duration, Duration::from_secs(30));
        assert_eq!(config.round.talking_duration, Duration::from_secs(90));
    }

    #[test]
    fn test_with_env_explicit_ws_url_wins() {
        let config =
            ClientConfig::default().with_env(env(&[("PAIRUP_WS_URL", "ws://rt:9000/socket")]));
        assert_eq!(config.realtime_url().unwrap(), "ws://rt:9000/socket");
    }

    #[test]
    fn test_with_env_bad_number_keeps_default() {
        let config =
            ClientConfig::default().with_env(env(&[("PAIRUP_PAIRING_SECS", "soon")]));
        assert_eq!(config.round.pairing_duration, RoundConfig::DEFAULT_PAIRING);
    }
}
