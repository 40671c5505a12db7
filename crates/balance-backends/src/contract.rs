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

use std::collections::HashMap;
use std::sync::Arc;

use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};

use aegis_contracts::AegisToken;
use aegis_relayer_types::EthAddress;
use aegis_relayer_utils::Result;

use super::BalancesMap;

/// One asset tracked for balance queries.
#[derive(Debug, Clone, Copy)]
pub struct TrackedAsset {
    /// The token id of the asset on the Aegis token contract.
    pub token_id: u64,
    /// Decimals used to render raw units as token units.
    pub decimals: u32,
}

/// The authoritative balance backend: queries `balanceOf` on the token
/// contract for every tracked asset.
#[derive(Debug, Clone)]
pub struct ContractBalanceBackend {
    contract: AegisToken<Provider<Http>>,
    assets: HashMap<String, TrackedAsset>,
}

impl ContractBalanceBackend {
    /// Creates a new backend over the given provider and contract address.
    pub fn new(
        client: Arc<Provider<Http>>,
        contract_address: Address,
        assets: HashMap<String, TrackedAsset>,
    ) -> Self {
        Self {
            contract: AegisToken::new(contract_address, client),
            assets,
        }
    }
}

#[async_trait::async_trait]
impl super::BalanceBackend for ContractBalanceBackend {
    async fn get_balances(
        &self,
        address: &EthAddress,
    ) -> Result<BalancesMap> {
        let account: Address = address.inner();
        let mut balances = BalancesMap::new();
        for (symbol, asset) in &self.assets {
            let raw: U256 = self
                .contract
                .balance_of(account, U256::from(asset.token_id))
                .call()
                .await?;
            let formatted = ethers::utils::format_units(raw, asset.decimals)?;
            balances.insert(symbol.clone(), formatted);
        }
        Ok(balances)
    }
}
