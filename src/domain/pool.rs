use serde::{Deserialize, Serialize};

use super::{Decimal, PoolId};

/// A feed-sourced pool snapshot. Ephemeral: consumed once per reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub id: PoolId,
    pub symbol: String,
    pub project: String,
    pub chain: String,
    /// Annualized yield, in percent.
    pub apy: Decimal,
    pub tvl_usd: Decimal,
}

impl Pool {
    /// Annual yield divided by 12, the engine's primary comparison unit.
    pub fn monthly_yield(&self) -> Decimal {
        self.apy / Decimal::twelve()
    }
}
