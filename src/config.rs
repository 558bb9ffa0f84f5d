// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into a [`Config`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | Credential JSON file | Ambient credentials |
//! | `GOOGLE_CLOUD_PROJECT` | Firebase / GCP project id | `project_id` of the credential file, else startup fails |
//! | `FIRESTORE_EMULATOR_HOST` | `host:port` of a Firestore emulator | Unset |
//! | `FIRESTORE_DATABASE` | Firestore database id | `(default)` |
//! | `FIREBASE_JWKS_URL` | Signing keys for Firebase ID tokens | Google securetoken endpoint |
//! | `UPSTREAM_TIMEOUT_SECS` | Timeout for every outbound HTTP call | `10` |
//! | `REQUEST_TIMEOUT_SECS` | Deadline for every inbound request | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Path to a service-account or authorized-user JSON key file.
///
/// When unset, ambient credentials are used (gcloud well-known file, then
/// the metadata server).
pub const CREDENTIALS_FILE_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Project that owns both the Firebase Auth tenant and the Firestore database.
pub const PROJECT_ID_ENV: &str = "GOOGLE_CLOUD_PROJECT";

pub const FIRESTORE_EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";
pub const FIRESTORE_DATABASE_ENV: &str = "FIRESTORE_DATABASE";
pub const FIREBASE_JWKS_URL_ENV: &str = "FIREBASE_JWKS_URL";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Public JWKS for Firebase Authentication ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("HOST:PORT is not a valid socket address: {0}")]
    BindAddress(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Application configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub credentials_file: Option<PathBuf>,
    /// Explicit project id. Resolution against the credential file happens
    /// during bootstrap.
    pub project_id: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub firestore_database: String,
    pub jwks_url: String,
    pub upstream_timeout: Duration,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                expected: "a port number",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::BindAddress(format!("{host}:{port}")))?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    expected: "`json` or `pretty`",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr,
            credentials_file: get(CREDENTIALS_FILE_ENV).map(PathBuf::from),
            project_id: get(PROJECT_ID_ENV).map(|p| p.trim().to_string()),
            firestore_emulator_host: get(FIRESTORE_EMULATOR_HOST_ENV),
            firestore_database: get(FIRESTORE_DATABASE_ENV)
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            jwks_url: get(FIREBASE_JWKS_URL_ENV).unwrap_or_else(|| FIREBASE_JWKS_URL.to_string()),
            upstream_timeout: seconds(get(UPSTREAM_TIMEOUT_ENV), UPSTREAM_TIMEOUT_ENV)?
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
            request_timeout: seconds(get(REQUEST_TIMEOUT_ENV), REQUEST_TIMEOUT_ENV)?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            log_format,
        })
    }
}

fn seconds(raw: Option<String>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "a positive number of seconds",
            value: raw,
        }),
    }
}
