//! `turnstile init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either a minimal
//! or a fully documented template.

use std::path::PathBuf;

use console::style;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::TurnstileError;

pub fn execute(args: &InitArgs) -> Result<(), TurnstileError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("turnstile.{}", args.format.extension())));

    if output.exists() {
        return Err(TurnstileError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("{} Created {}", style("\u{2713}").green(), output.display());
    println!(
        "  Next: {}",
        style(format!("turnstile run -c {}", output.display())).bold()
    );
    Ok(())
}

const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# Turnstile config

hosts:
  - target: "http://localhost:8081"
  - target: "http://localhost:8082"
"#;

const YAML_FULL: &str = r#"# Turnstile config
#
# All values shown are defaults. Uncomment and modify as needed.

# Host selection policy: round_robin | random | least_connections
# selector: round_robin

# Skip invalid or duplicate hosts with a warning instead of refusing to start
# lenient: false

# Defaults applied to every host unless overridden
# defaults:
  # timeout: 5000              # Upstream timeout in ms
  # forward_headers: true      # Forward client headers to hosts
  # proxy_headers: true        # Add X-Forwarded-*, X-Real-IP, Via headers
  # strip_hop_by_hop: true     # Strip Connection, TE, etc.

# Passive demotion and revive probing (durations in ms)
# health:
  # failure_threshold: 3       # Failures before a host leaves rotation
  # revive_timeout: 30000      # Time out of rotation before the first probe
  # revive_threshold: 3        # Failed probes before re-admission on trial (0 = never)
  # probe_interval: 5000       # Time between revive sweeps
  # probe_path: "/"
  # probe_method: "GET"
  # probe_timeout: 2000

hosts:
  - target: "http://localhost:8081"

  # Full: all options shown
  # - target: "http://localhost:8082/api"
  #   timeout: 10000           # Override defaults.timeout for this host
  #   error_status: 503        # Answer failures with this status instead of 502/504
"#;

const JSON_MINIMAL: &str = r#"{
  "hosts": [
    { "target": "http://localhost:8081" },
    { "target": "http://localhost:8082" }
  ]
}
"#;

const JSON_FULL: &str = r#"{
  "selector": "round_robin",
  "lenient": false,
  "defaults": {
    "timeout": 5000,
    "forward_headers": true,
    "proxy_headers": true,
    "strip_hop_by_hop": true
  },
  "health": {
    "failure_threshold": 3,
    "revive_timeout": 30000,
    "revive_threshold": 3,
    "probe_interval": 5000,
    "probe_path": "/",
    "probe_method": "GET",
    "probe_timeout": 2000
  },
  "hosts": [
    { "target": "http://localhost:8081" },
    { "target": "http://localhost:8082/api", "timeout": 10000, "error_status": 503 }
  ]
}
"#;

const TOML_MINIMAL: &str = r#"# Turnstile config

[[hosts]]
target = "http://localhost:8081"

[[hosts]]
target = "http://localhost:8082"
"#;

const TOML_FULL: &str = r#"# Turnstile config
#
# All values shown are defaults. Uncomment and modify as needed.

# selector = "round_robin"
# lenient = false

[defaults]
# timeout = 5000
# forward_headers = true
# proxy_headers = true
# strip_hop_by_hop = true

[health]
# failure_threshold = 3
# revive_timeout = 30000
# revive_threshold = 3
# probe_interval = 5000
# probe_path = "/"
# probe_method = "GET"
# probe_timeout = 2000

[[hosts]]
target = "http://localhost:8081"
# timeout = 5000
# error_status = 503
"#;
