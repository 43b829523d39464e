use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutotraceError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Attach full query text to database spans.
    pub include_db_statement: bool,
    pub instrumentation_version: String,
    pub scope_prefix: String,
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub export_timeout: Duration,
    pub event_channel_capacity: usize,
    pub disabled_probes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_db_statement: false,
            instrumentation_version: env!("CARGO_PKG_VERSION").to_string(),
            scope_prefix: "autotrace/".to_string(),
            service_name: "unknown_service".to_string(),
            otlp_endpoint: None,
            export_timeout: Duration::from_secs(10),
            event_channel_capacity: 1024,
            disabled_probes: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path(&process_env);
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        apply_overrides(&mut cfg, load_env_overrides(&process_env), "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    /// Builds a config from defaults plus whatever `lookup` returns for the
    /// recognised variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        apply_overrides(&mut cfg, load_env_overrides(&lookup), "environment")?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides(path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        Ok(cfg)
    }

    pub fn is_probe_disabled(&self, package: &str) -> bool {
        self.disabled_probes.iter().any(|p| p == package)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    include_db_statement: Option<FlagValue>,
    instrumentation_version: Option<String>,
    scope_prefix: Option<String>,
    service_name: Option<String>,
    otlp_endpoint: Option<String>,
    export_timeout: Option<String>,
    event_channel_capacity: Option<usize>,
    disabled_probes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    fn enabled(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(raw) => parse_bool(raw).unwrap_or(false),
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn config_file_path<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("AUTOTRACE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = lookup("HOME").unwrap_or_else(|| ".".to_string());
    let config_home = lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(home).join(".config"));
    config_home.join("autotrace/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AutotraceError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw).map_err(|e| {
        AutotraceError::Config(format!("failed parsing {}: {e}", path.display()))
    })?;
    Ok(Some(parsed))
}

fn load_env_overrides<F>(lookup: &F) -> ConfigOverrides
where
    F: Fn(&str) -> Option<String>,
{
    ConfigOverrides {
        include_db_statement: lookup("AUTOTRACE_INCLUDE_DB_STATEMENT").map(FlagValue::Text),
        instrumentation_version: lookup("AUTOTRACE_INSTRUMENTATION_VERSION"),
        scope_prefix: lookup("AUTOTRACE_SCOPE_PREFIX"),
        service_name: lookup("OTEL_SERVICE_NAME"),
        otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
        export_timeout: lookup("AUTOTRACE_EXPORT_TIMEOUT"),
        event_channel_capacity: lookup("AUTOTRACE_EVENT_CHANNEL_CAPACITY")
            .and_then(|v| v.trim().parse().ok()),
        disabled_probes: lookup("AUTOTRACE_DISABLED_PROBES"),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.include_db_statement {
        cfg.include_db_statement = v.enabled();
    }
    if let Some(v) = overrides.instrumentation_version {
        cfg.instrumentation_version = v;
    }
    if let Some(v) = overrides.scope_prefix {
        cfg.scope_prefix = v;
    }
    if let Some(v) = overrides.service_name {
        cfg.service_name = v;
    }
    if let Some(v) = overrides.otlp_endpoint {
        cfg.otlp_endpoint = Some(v);
    }
    if let Some(v) = overrides.export_timeout {
        cfg.export_timeout = humantime::parse_duration(&v).map_err(|e| {
            AutotraceError::Config(format!("bad export_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.event_channel_capacity {
        if v == 0 {
            return Err(AutotraceError::Config(format!(
                "event_channel_capacity in {source} must be positive"
            )));
        }
        cfg.event_channel_capacity = v;
    }
    if let Some(v) = overrides.disabled_probes {
        cfg.disabled_probes = v
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
