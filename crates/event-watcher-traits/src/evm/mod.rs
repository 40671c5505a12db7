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

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use ethers::contract;
use ethers::providers;
use ethers::providers::Middleware;
use ethers::types;
use futures::prelude::*;

use aegis_relayer_store::HistoryStore;
use aegis_relayer_store::TransactionStore;

mod event_watcher;
pub use event_watcher::*;
