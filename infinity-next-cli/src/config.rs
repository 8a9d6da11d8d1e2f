//! Resolution of connection settings from flags, environment and the YAML config file.
//!
//! Flags and environment variables are merged by clap. Values still missing
//! afterwards are taken from the config file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use infinity_next_api::Region;
use log::debug;
use serde::Deserialize;

/// Name of the config file looked up in the home directory
pub(crate) const DEFAULT_CONFIG_FILE: &str = ".inext.yaml";

/// Keys accepted in the YAML config file
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct FileConfig {
    pub client_id: Option<String>,
    pub access_key: Option<String>,
    pub region: Option<String>,
    pub token: Option<String>,
}

/// Values supplied on the command line or through `INEXT_*` variables
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CliValues {
    pub client_id: Option<String>,
    pub access_key: Option<String>,
    pub region: Option<String>,
    pub token: Option<String>,
    pub host: Option<String>,
}

/// How the session obtains its bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Credentials {
    /// Exchange API credentials at the gateway
    ApiKey {
        client_id: String,
        access_key: String,
    },
    /// Use a pre-issued token as is
    Token(String),
}

/// Fully resolved connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub region: Region,
    pub host: Option<String>,
    pub credentials: Credentials,
}

/// Load the config file.
///
/// An explicit path must exist and parse. The default `$HOME/.inext.yaml` is
/// optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_file_config(path);
    }

    match default_config_path() {
        Some(path) if path.is_file() => read_file_config(&path),
        _ => {
            debug!("No config file found, using flags and environment only");
            Ok(FileConfig::default())
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    debug!("Reading config file {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn pick(cli: Option<String>, file: Option<String>) -> Option<String> {
    cli.filter(|value| !value.is_empty())
        .or_else(|| file.filter(|value| !value.is_empty()))
}

/// Merge command line values over the config file and validate the result.
pub(crate) fn resolve(cli: CliValues, file: FileConfig) -> Result<Settings> {
    let region = match pick(cli.region, file.region) {
        Some(region) => region.parse::<Region>().map_err(|e| anyhow!(e))?,
        None => Region::default(),
    };

    let token = pick(cli.token, file.token);
    let client_id = pick(cli.client_id, file.client_id);
    let access_key = pick(cli.access_key, file.access_key);

    let credentials = match (token, client_id, access_key) {
        (Some(token), _, _) => Credentials::Token(token),
        (None, Some(client_id), Some(access_key)) => Credentials::ApiKey {
            client_id,
            access_key,
        },
        (None, None, _) => bail!(
            "missing client id: set --client-id, INEXT_CLIENT_ID or client-id in the config file"
        ),
        (None, Some(_), None) => bail!(
            "missing access key: set --access-key, INEXT_ACCESS_KEY or access-key in the config file"
        ),
    };

    Ok(Settings {
        region,
        host: cli.host.filter(|host| !host.is_empty()),
        credentials,
    })
}
