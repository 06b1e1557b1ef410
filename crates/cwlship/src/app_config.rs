//! 🔧 App Configuration: environment variables and an optional TOML file, folded into one
//! struct by Figment.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! Layers, lowest priority first:
//!
//! 0. a `.env` file, if [`load_dotenv`] found one. It only fills variables the process
//!    environment doesn't already have, so it feeds the two env layers below.
//! 1. the usual suspects: `APP_ENV`, `OPENSEARCH_ENDPOINT`, `AWS_REGION`,
//!    `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`
//! 2. `CWLSHIP_*` variables, with `__` for nesting (`CWLSHIP_RUNTIME__QUEUE_CAPACITY=4`)
//! 3. the TOML file, if one was given. The file wins on conflicts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::{debug, info};

pub use crate::backends::{FileSourceConfig, OpenSearchSinkConfig};
pub use crate::signing::AwsCredentials;

/// 📦 Everything one run needs to know.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🏷️ The deployment tag baked into every index name (`cwl-{app_env}-...`).
    pub app_env: String,
    pub source: FileSourceConfig,
    pub sink: OpenSearchSinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// ⚙️ Knobs for the pipeline itself, as opposed to either end of it.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📦 How many lines the reader may run ahead of the shipper.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 🪦 Where to write lines that never made it. Unset means they're only logged.
    #[serde(default)]
    pub dead_letter_file: Option<PathBuf>,
    /// 📊 Draw the progress table on stderr.
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            dead_letter_file: None,
            show_progress: false,
        }
    }
}

fn default_queue_capacity() -> usize {
    10
}

// -- the conventional names that deployments already export, mapped onto our nesting
fn conventional_key(name: &str) -> Option<&'static str> {
    match name {
        "APP_ENV" => Some("app_env"),
        "OPENSEARCH_ENDPOINT" => Some("sink.endpoint"),
        "AWS_REGION" => Some("sink.region"),
        "AWS_ACCESS_KEY_ID" => Some("sink.credentials.access_key_id"),
        "AWS_SECRET_ACCESS_KEY" => Some("sink.credentials.secret_access_key"),
        "AWS_SESSION_TOKEN" => Some("sink.credentials.session_token"),
        _ => None,
    }
}

/// 🌱 Load `.env` from the working directory (or the nearest parent that has one) into the
/// process environment. Variables that are already set keep their values.
///
/// `Ok(None)` when there's no `.env` anywhere up the tree. That's the normal case for a
/// deployment that exports real env vars.
pub fn load_dotenv() -> anyhow::Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!("🌱 Loaded environment from {}", path.display());
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context(
            "💀 Found a .env file but couldn't read it. Each line should be KEY=value, \
             quotes optional, no creativity.",
        ),
    }
}

/// 🧱 The layered Figment, before extraction. Exposed so callers can stack overrides on top.
pub fn figment(config_file_name: Option<&Path>) -> Figment {
    let conventional = Env::raw().filter_map(|key| {
        conventional_key(key.as_str().to_ascii_uppercase().as_str()).map(Into::into)
    });

    let config = Figment::new()
        .merge(conventional)
        .merge(Env::prefixed("CWLSHIP_").split("__"));

    match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    }
}

/// 🚀 Load the config: env vars always, plus the TOML file when one is given.
///
/// 💀 Fails with a message naming where we looked when the result doesn't deserialize.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables \
             (APP_ENV, OPENSEARCH_ENDPOINT, AWS_*, CWLSHIP_*). \
             The file exists in our hearts, but maybe not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables \
                 (APP_ENV, OPENSEARCH_ENDPOINT, AWS_*, CWLSHIP_*). \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    figment(config_file_name).extract().context(context_msg)
}
