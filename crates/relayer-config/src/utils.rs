// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};

use config::{Config, File};

use super::AegisRelayerConfig;

/// A helper function that will search for all config files in the given
/// directory and return them as a vec of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> aegis_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory
    // and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(aegis_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`AegisRelayerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> aegis_relayer_utils::Result<AegisRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of AEGIS).
    let builder = builder
        .add_source(config::Environment::with_prefix("AEGIS").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        AegisRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files from the given directory.
///
/// it is the same as using the [`search_config_files`] and
/// [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> aegis_relayer_utils::Result<AegisRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and warn about
/// combinations that will not do what the operator probably expects.
pub fn postloading_process(
    config: AegisRelayerConfig,
) -> aegis_relayer_utils::Result<AegisRelayerConfig> {
    tracing::trace!("Checking configuration sanity ...");
    if config.features.event_relay && !config.ledger.events_watcher.enabled {
        tracing::warn!(
            "!!WARNING!!: event relaying is enabled but the events watcher \
             is disabled; connected clients will not receive push updates"
        );
    }
    if config.api.rate_limit.max_requests == 0 {
        tracing::warn!(
            "!!WARNING!!: max-requests is 0, every query request will be \
             rejected"
        );
    }
    config.verify()?;
    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, contents: &str) {
        std::fs::write(dir.join("main.toml"), contents).unwrap();
    }

    #[test]
    fn loads_a_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
            [ledger]
            http-endpoint = "http://localhost:8545"
            chain-id = 31337
            token-contract = "0xAABBCCDDEEFF00112233445566778899AABBCCDD"
            "#,
        );
        let config = load(dir.path()).unwrap();
        assert_eq!(config.port, 9955);
        assert_eq!(config.ledger.chain_id, 31337);
        assert_eq!(
            config.ledger.token_contract.to_canonical_string(),
            "0xaabbccddeeff00112233445566778899aabbccdd"
        );
        assert_eq!(config.api.rate_limit.max_requests, 100);
        assert_eq!(config.api.rate_limit.window_seconds, 900);
        assert_eq!(config.api.balance_cache_ttl, 30);
        assert_eq!(config.assets.len(), 5);
        assert!(config.features.event_relay);
    }

    #[test]
    fn missing_ledger_section_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "port = 9000\n");
        assert!(load(dir.path()).is_err());
    }

    #[test]
    fn zero_token_contract_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
            [ledger]
            http-endpoint = "http://localhost:8545"
            chain-id = 1
            token-contract = "0x0000000000000000000000000000000000000000"
            "#,
        );
        assert!(load(dir.path()).is_err());
    }
}
