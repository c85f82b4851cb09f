use crate::runtime::error::{HostError, HostResult};
use crate::runtime::platform::PrimitivesMode;
use crate::runtime::symbol::ExposedSymbol;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const CONFIG_FILE: &str = "prime-host.toml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    pub module: Option<PathBuf>,
    pub entry: ExposedSymbol,
    pub os_primitives: PrimitivesMode,
    pub trace: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module: None,
            entry: ExposedSymbol::default(),
            os_primitives: PrimitivesMode::Auto,
            trace: false,
        }
    }
}

/// Settings given on the command line; they win over everything else.
#[derive(Clone, Debug, Default)]
pub struct HostFlags {
    pub config: Option<PathBuf>,
    pub module: Option<PathBuf>,
    pub entry: Option<String>,
    pub os_primitives: Option<String>,
    pub trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    module: RawModule,
    #[serde(default)]
    host: RawHost,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    path: Option<PathBuf>,
    entry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHost {
    os_primitives: Option<String>,
    trace: Option<bool>,
}

/// Source of `PRIME_HOST_*` overrides; swapped out in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl HostConfig {
    /// Defaults, then the config file, then `PRIME_HOST_*`, then flags. An
    /// explicit `--config` must exist; the default file is optional.
    pub fn from_sources(flags: &HostFlags, env: &dyn EnvSource) -> HostResult<Self> {
        let mut config = match &flags.config {
            Some(path) => Self::load(path)?,
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if default.is_file() {
                    Self::load(&default)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(module) = env.var("PRIME_HOST_MODULE") {
            config.module = Some(PathBuf::from(module));
        }
        if let Some(entry) = env.var("PRIME_HOST_ENTRY") {
            config.entry = entry.parse()?;
        }
        if let Some(mode) = env.var("PRIME_HOST_OS") {
            config.os_primitives = mode.parse()?;
        }
        if let Some(trace) = env.var("PRIME_HOST_TRACE") {
            config.trace = parse_switch("PRIME_HOST_TRACE", &trace)?;
        }

        if let Some(module) = &flags.module {
            config.module = Some(module.clone());
        }
        if let Some(entry) = &flags.entry {
            config.entry = entry.parse()?;
        }
        if let Some(mode) = &flags.os_primitives {
            config.os_primitives = mode.parse()?;
        }
        if flags.trace {
            config.trace = true;
        }
        Ok(config)
    }

    /// Reads a config file. Relative module paths resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> HostResult<Self> {
        let content = fs::read_to_string(path).map_err(|error| HostError::ConfigIo {
            path: path.to_path_buf(),
            error,
        })?;
        let raw: RawConfig = toml::from_str(&content).map_err(|error| HostError::ConfigParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        let root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::default();
        config.module = raw.module.path.map(|p| if p.is_absolute() { p } else { root.join(p) });
        if let Some(entry) = raw.module.entry {
            config.entry = entry.parse()?;
        }
        if let Some(mode) = raw.host.os_primitives {
            config.os_primitives = mode.parse()?;
        }
        config.trace = raw.host.trace.unwrap_or(false);
        Ok(config)
    }

    pub fn module_path(&self) -> HostResult<&Path> {
        self.module.as_deref().ok_or(HostError::MissingModule)
    }
}

fn parse_switch(setting: &str, value: &str) -> HostResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HostError::ConfigValue {
            setting: setting.to_string(),
            value: value.to_string(),
            expected: "1, 0, true, false, yes, no, on, off".into(),
        }),
    }
}
