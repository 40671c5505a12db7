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

use serde::{Deserialize, Serialize};

/// The polling interval is 6 seconds by default, roughly one block time.
const fn polling_interval_default() -> u64 {
    6_000
}
/// The maximum blocks per step is set to `100` by default.
const fn max_blocks_per_step_default() -> u64 {
    100
}
/// The print progress interval is set to `7_000` by default.
const fn print_progress_interval_default() -> u64 {
    7_000
}
/// The events watcher is enabled by default.
const fn enabled_default() -> bool {
    true
}

/// EventsWatcherConfig is the configuration for the events watcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventsWatcherConfig {
    /// If the event watcher is enabled or not.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Polling interval in milliseconds.
    #[serde(
        rename(serialize = "pollingInterval"),
        default = "polling_interval_default"
    )]
    pub polling_interval: u64,
    /// The maximum number of blocks to scan in one request.
    #[serde(skip_serializing, default = "max_blocks_per_step_default")]
    pub max_blocks_per_step: u64,
    /// Print sync progress frequency in milliseconds.
    /// if it is zero, means no progress will be printed.
    #[serde(skip_serializing, default = "print_progress_interval_default")]
    pub print_progress_interval: u64,
}

impl Default for EventsWatcherConfig {
    fn default() -> Self {
        Self {
            enabled: enabled_default(),
            polling_interval: polling_interval_default(),
            max_blocks_per_step: max_blocks_per_step_default(),
            print_progress_interval: print_progress_interval_default(),
        }
    }
}
