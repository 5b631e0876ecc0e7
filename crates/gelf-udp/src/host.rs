// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default `host` and `facility` values for outgoing messages.

use std::path::Path;

const UNKNOWN_HOSTNAME: &str = "unknown";
const DEFAULT_FACILITY: &str = "gelf";

/// Get the system hostname, or "unknown" if it cannot be determined.
#[must_use]
pub fn get_hostname() -> String {
    #[cfg(unix)]
    {
        match nix::unistd::gethostname() {
            Ok(hostname) => {
                // Non-UTF8 hostnames are ignored
                if let Some(hostname) = hostname.to_str() {
                    if !hostname.is_empty() {
                        return hostname.to_string();
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to get system hostname: {}", e);
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Ok(hostname) = std::env::var("COMPUTERNAME") {
            if !hostname.is_empty() {
                return hostname;
            }
        }
    }

    UNKNOWN_HOSTNAME.to_string()
}

/// Base name of the running executable, the conventional GELF facility.
#[must_use]
pub fn default_facility() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FACILITY)
        .to_string()
}
