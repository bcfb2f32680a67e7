// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-driven service configuration.
//!
//! Sessions are ephemeral by design, so there is no config file: every knob
//! is an environment variable with a built-in default, and the service
//! binaries layer CLI overrides on top.

use std::str::FromStr;
use std::time::Duration;

/// Advertised coordinates of the datagram relay, returned by the directory
/// so a freshly created host knows where to register.
#[derive(Debug, Clone)]
pub struct RelayCoords {
    /// Host name to advertise; when unset, the directory falls back to the
    /// name the request arrived under (for deployments behind a proxy)
    pub advertised_host: Option<String>,
    pub control_port: u16,
    pub state_port: u16,
}

/// Runtime configuration shared by the three services
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// HTTP listen port for the directory / rendezvous surface
    pub http_port: u16,
    /// UDP listen port for the control channel
    pub control_port: u16,
    /// UDP listen port for the state channel
    pub state_port: u16,
    /// How long a session record lives without being recreated
    pub session_ttl_secs: u64,
    /// How long an endpoint registration lives without keepalive traffic
    pub registration_ttl_secs: u64,
    /// How often the expiry sweeper runs
    pub sweep_secs: u64,
    /// Externally advertised host name, for deployments behind a proxy
    pub public_host: Option<String>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            http_port: 50006,
            control_port: 50007,
            state_port: 50008,
            session_ttl_secs: 300,
            registration_ttl_secs: 60,
            sweep_secs: 30,
            public_host: None,
        }
    }
}

impl NetConfig {
    /// Build a configuration from the environment, falling back to defaults
    /// for unset or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            http_port: env_parsed("SEVENKOR_HTTP_PORT", defaults.http_port),
            control_port: env_parsed("SEVENKOR_CONTROL_PORT", defaults.control_port),
            state_port: env_parsed("SEVENKOR_STATE_PORT", defaults.state_port),
            session_ttl_secs: env_parsed("SEVENKOR_SESSION_TTL_SECS", defaults.session_ttl_secs),
            registration_ttl_secs: env_parsed(
                "SEVENKOR_REGISTRATION_TTL_SECS",
                defaults.registration_ttl_secs,
            ),
            sweep_secs: env_parsed("SEVENKOR_SWEEP_SECS", defaults.sweep_secs),
            public_host: std::env::var("SEVENKOR_PUBLIC_HOST")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn registration_ttl(&self) -> Duration {
        Duration::from_secs(self.registration_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }

    pub fn relay_coords(&self) -> RelayCoords {
        RelayCoords {
            advertised_host: self.public_host.clone(),
            control_port: self.control_port,
            state_port: self.state_port,
        }
    }
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-global, so everything lives in one
    // test to keep the harness's parallel runner out of the picture.
    #[test]
    fn from_env_overrides_and_fallbacks() {
        for name in [
            "SEVENKOR_HTTP_PORT",
            "SEVENKOR_CONTROL_PORT",
            "SEVENKOR_STATE_PORT",
            "SEVENKOR_SESSION_TTL_SECS",
            "SEVENKOR_REGISTRATION_TTL_SECS",
            "SEVENKOR_SWEEP_SECS",
            "SEVENKOR_PUBLIC_HOST",
        ] {
            std::env::remove_var(name);
        }

        let cfg = NetConfig::from_env();
        assert_eq!(cfg.http_port, 50006);
        assert_eq!(cfg.control_port, 50007);
        assert_eq!(cfg.state_port, 50008);
        assert_eq!(cfg.session_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.registration_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(30));
        assert!(cfg.public_host.is_none());

        std::env::set_var("SEVENKOR_HTTP_PORT", "8080");
        std::env::set_var("SEVENKOR_SESSION_TTL_SECS", "not-a-number");
        std::env::set_var("SEVENKOR_PUBLIC_HOST", "relay.example.net");

        let cfg = NetConfig::from_env();
        assert_eq!(cfg.http_port, 8080);
        // garbage falls back to the default
        assert_eq!(cfg.session_ttl_secs, 300);
        assert_eq!(cfg.public_host.as_deref(), Some("relay.example.net"));

        let coords = cfg.relay_coords();
        assert_eq!(coords.advertised_host.as_deref(), Some("relay.example.net"));
        assert_eq!(coords.control_port, 50007);

        std::env::remove_var("SEVENKOR_HTTP_PORT");
        std::env::remove_var("SEVENKOR_SESSION_TTL_SECS");
        std::env::remove_var("SEVENKOR_PUBLIC_HOST");
    }
}
