use serde::{Deserialize, Deserializer};

use crate::{
    primitives::ObjectId,
    transaction::{ExecutionStatus, GasSummary},
};

/// Reference to an on-chain object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Object id.
    pub object_id: ObjectId,
    /// Object version.
    pub version: u64,
    /// Object digest.
    pub digest: String,
}

/// A gas coin and its balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    /// Coin object id.
    pub object_id: ObjectId,
    /// Balance in the smallest unit.
    pub balance: u64,
}

/// What a dry-run reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunResult {
    /// Status the transaction would end with.
    pub status: ExecutionStatus,
    /// Gas it would be charged.
    pub gas: GasSummary,
    /// Number of events it would emit.
    pub event_count: u64,
}

/// The node renders 64-bit integers as strings; older nodes used numbers.
pub(crate) fn u64_from_str_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
