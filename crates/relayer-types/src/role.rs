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

/// The role a client declares when registering a session.
///
/// Roles double as broadcast room names: every registered session joins the
/// room of its declared role. The relayer does not authenticate the
/// address-to-role binding; roles are routing labels, not privileges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// A disaster victim receiving aid tokens.
    Victim,
    /// A donor funding relief campaigns.
    Donor,
    /// A merchant accepting aid tokens as payment.
    Merchant,
    /// A platform administrator.
    Admin,
}

impl UserRole {
    /// The room name for this role, as used on the wire.
    pub fn room_name(&self) -> &'static str {
        match self {
            Self::Victim => "victim",
            Self::Donor => "donor",
            Self::Merchant => "merchant",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.room_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_room_names() {
        for role in [
            UserRole::Victim,
            UserRole::Donor,
            UserRole::Merchant,
            UserRole::Admin,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.room_name()));
        }
    }
}
