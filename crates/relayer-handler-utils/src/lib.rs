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

#![warn(missing_docs)]

//! # Relayer Handler Utils Module
//!
//! The wire protocol of the persistent connection: commands a client may
//! send, and events the relayer pushes back. Everything is JSON text frames
//! with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aegis_relayer_types::{EthAddress, UserRole};

/// A command sent by a client over the persistent connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientCommand {
    /// Declare the identity of this session.
    Register(RegisterCommand),
    /// Liveness probe.
    Ping(),
}

/// The payload of a register command.
///
/// Deserialization already normalizes the address, so everything behind the
/// command handler sees one canonical identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCommand {
    /// The address this session wants transfer events for.
    pub address: EthAddress,
    /// The declared role; doubles as the room to join.
    pub role: UserRole,
}

/// Whether the registered address was the sender or the recipient of a
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// The registered address sent the tokens.
    Sent,
    /// The registered address received the tokens.
    Received,
}

/// A transfer event scoped to one registered address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransferEvent {
    /// Sender address.
    pub from: EthAddress,
    /// Recipient address.
    pub to: EthAddress,
    /// The transferred token id.
    pub token_id: String,
    /// Amount in token units.
    pub amount: String,
    /// Direction relative to the registered address.
    #[serde(rename = "type")]
    pub direction: TransferDirection,
    /// The ledger transaction hash.
    pub tx_hash: String,
}

/// A globally broadcast first-insertion transfer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransactionEvent {
    /// The ledger transaction hash.
    pub tx_hash: String,
    /// Sender address.
    pub from: EthAddress,
    /// Recipient address.
    pub to: EthAddress,
    /// The transferred token id.
    pub token_id: String,
    /// Amount in token units.
    pub amount: String,
}

/// A disaster event pushed to the admin room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDisasterEvent {
    /// Where the incident happened.
    pub location: String,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Incident category.
    #[serde(rename = "type")]
    pub category: String,
    /// When the incident was ingested.
    pub timestamp: DateTime<Utc>,
}

/// An event pushed by the relayer over the persistent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Acknowledgment of a register command.
    Registered {
        /// Whether the registration was accepted.
        success: bool,
    },
    /// Response to a ping.
    Pong,
    /// A transfer involving the session's registered address.
    TokenTransfer(TokenTransferEvent),
    /// A transfer recorded for the first time, broadcast to everyone.
    NewTransaction(NewTransactionEvent),
    /// A newly ingested disaster, broadcast to the admin room.
    NewDisaster(NewDisasterEvent),
    /// A malformed command was received.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_command_wire_shape() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"register":{"address":"0xAABBCCDDEEFF00112233445566778899AABBCCDD","role":"victim"}}"#,
        )
        .unwrap();
        match cmd {
            ClientCommand::Register(register) => {
                assert_eq!(
                    register.address.to_canonical_string(),
                    "0xaabbccddeeff00112233445566778899aabbccdd"
                );
                assert_eq!(register.role, UserRole::Victim);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn token_transfer_wire_shape() {
        let event = ServerEvent::TokenTransfer(TokenTransferEvent {
            from: "0xaabbccddeeff00112233445566778899aabbccdd"
                .parse()
                .unwrap(),
            to: "0x00112233445566778899aabbccddeeff00112233"
                .parse()
                .unwrap(),
            token_id: "1".to_string(),
            amount: "2.5".to_string(),
            direction: TransferDirection::Sent,
            tx_hash: "0xfeed".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "tokenTransfer");
        assert_eq!(json["data"]["type"], "sent");
        assert_eq!(json["data"]["tokenId"], "1");
        assert_eq!(json["data"]["txHash"], "0xfeed");
    }

    #[test]
    fn registered_ack_wire_shape() {
        let json =
            serde_json::to_value(ServerEvent::Registered { success: true })
                .unwrap();
        assert_eq!(json["event"], "registered");
        assert_eq!(json["data"]["success"], true);
    }

    #[test]
    fn new_disaster_renames_category_to_type() {
        let json = serde_json::to_value(ServerEvent::NewDisaster(
            NewDisasterEvent {
                location: "Tokyo".to_string(),
                magnitude: 5.0,
                category: "earthquake".to_string(),
                timestamp: Utc::now(),
            },
        ))
        .unwrap();
        assert_eq!(json["event"], "newDisaster");
        assert_eq!(json["data"]["type"], "earthquake");
    }
}
