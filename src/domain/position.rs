//! Simulated farming positions and the records used to create and patch them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Decimal, Pool, PoolId, TimeMs};

/// Lifecycle status. `Unstaked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Farming,
    Unstaked,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Farming => "FARMING",
            PositionStatus::Unstaked => "UNSTAKED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FARMING" => Ok(PositionStatus::Farming),
            "UNSTAKED" => Ok(PositionStatus::Unstaked),
            other => Err(format!("unknown position status: {}", other)),
        }
    }
}

/// A persisted position.
///
/// Entry fields never change after creation. Exit fields are populated exactly once,
/// together with the transition to `Unstaked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,
    pub pool_id: PoolId,
    pub symbol: String,
    pub project: String,
    pub chain: String,
    pub entry_yield: Decimal,
    pub entry_tvl: Decimal,
    pub current_yield: Decimal,
    pub current_tvl: Decimal,
    pub status: PositionStatus,
    pub entry_time: TimeMs,
    pub exit_time: Option<TimeMs>,
    pub exit_yield: Option<Decimal>,
    pub exit_tvl: Option<Decimal>,
    pub exit_reason: Option<String>,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Farming
    }

    /// Exit TVL when closed, otherwise the latest observed TVL.
    pub fn last_tvl(&self) -> Decimal {
        self.exit_tvl.unwrap_or(self.current_tvl)
    }

    /// Exit time when closed, otherwise `as_of`.
    pub fn end_time(&self, as_of: TimeMs) -> TimeMs {
        self.exit_time.unwrap_or(as_of)
    }

    /// Apply a patch in memory, with the same one-way rules the stores enforce.
    ///
    /// Returns false (and leaves the position untouched) if it is already closed.
    pub fn apply_patch(&mut self, patch: &PositionPatch, now: TimeMs) -> bool {
        if !self.is_active() {
            return false;
        }
        self.current_yield = patch.current_yield;
        self.current_tvl = patch.current_tvl;
        if let Some(exit) = &patch.exit {
            self.status = PositionStatus::Unstaked;
            self.exit_time = Some(exit.time);
            self.exit_yield = Some(exit.exit_yield);
            self.exit_tvl = Some(exit.exit_tvl);
            self.exit_reason = Some(exit.reason.clone());
        }
        self.updated_at = now;
        true
    }
}

/// A position to be created by the fill step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPosition {
    pub id: Uuid,
    pub pool_id: PoolId,
    pub symbol: String,
    pub project: String,
    pub chain: String,
    pub entry_yield: Decimal,
    pub entry_tvl: Decimal,
    pub entry_time: TimeMs,
}

impl NewPosition {
    /// Open a position on `pool` at its current feed values.
    pub fn from_pool(pool: &Pool, now: TimeMs) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool_id: pool.id.clone(),
            symbol: pool.symbol.clone(),
            project: pool.project.clone(),
            chain: pool.chain.clone(),
            entry_yield: pool.apy,
            entry_tvl: pool.tvl_usd,
            entry_time: now,
        }
    }

    pub fn into_position(self) -> Position {
        Position {
            id: self.id,
            pool_id: self.pool_id,
            symbol: self.symbol,
            project: self.project,
            chain: self.chain,
            entry_yield: self.entry_yield,
            entry_tvl: self.entry_tvl,
            current_yield: self.entry_yield,
            current_tvl: self.entry_tvl,
            status: PositionStatus::Farming,
            entry_time: self.entry_time,
            exit_time: None,
            exit_yield: None,
            exit_tvl: None,
            exit_reason: None,
            created_at: self.entry_time,
            updated_at: self.entry_time,
        }
    }
}

/// Exit fields written together with the `Farming -> Unstaked` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRecord {
    pub time: TimeMs,
    pub exit_yield: Decimal,
    pub exit_tvl: Decimal,
    pub reason: String,
}

/// Per-tick mutation of an active position. `exit` is set for closures only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPatch {
    pub id: Uuid,
    pub current_yield: Decimal,
    pub current_tvl: Decimal,
    pub exit: Option<ExitRecord>,
}

impl PositionPatch {
    pub fn is_closure(&self) -> bool {
        self.exit.is_some()
    }
}
