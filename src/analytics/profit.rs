//! Per-position profit breakdown with the impermanent-loss approximation.

use crate::config::StrategyConfig;
use crate::domain::{Position, TimeMs, MS_PER_HOUR};
use serde::Serialize;
use uuid::Uuid;

/// Empirical (price-change multiple, IL fraction) points, ascending by multiple.
pub const IL_TABLE: [(f64, f64); 9] = [
    (1.0, 0.000),
    (1.25, 0.006),
    (1.5, 0.020),
    (2.0, 0.057),
    (3.0, 0.134),
    (5.0, 0.255),
    (10.0, 0.425),
    (50.0, 0.717),
    (100.0, 0.800),
];

/// Positions are assumed to be auto-exited before IL exceeds this fraction.
pub const IL_CAP: f64 = 0.06;

const BUCKET_MS: i64 = 6 * MS_PER_HOUR;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitBreakdown {
    pub position_id: Uuid,
    pub days_in_pool: f64,
    pub stake: f64,
    pub gross_profit: f64,
    pub fees: f64,
    pub price_change_multiple: f64,
    pub il_fraction: f64,
    pub il_amount: f64,
    pub net_profit: f64,
    pub roi: f64,
    pub total_value: f64,
}

/// Holding time in days, quantized down to whole 6-hour buckets.
pub fn days_in_pool(position: &Position, as_of: TimeMs) -> f64 {
    let elapsed = position.end_time(as_of).as_ms() - position.entry_time.as_ms();
    (elapsed.max(0) / BUCKET_MS) as f64 * 0.25
}

/// `max(ratio, 1/ratio)` of last over entry TVL; 1.0 when the entry TVL is unusable.
pub fn price_change_multiple(entry_tvl: f64, last_tvl: f64) -> f64 {
    if !(entry_tvl.is_finite() && entry_tvl > 0.0) || !last_tvl.is_finite() || last_tvl < 0.0 {
        return 1.0;
    }
    let ratio = last_tvl / entry_tvl;
    if ratio == 0.0 {
        // Pool fully drained; treat as the far end of the table.
        return f64::INFINITY;
    }
    ratio.max(1.0 / ratio)
}

/// Linear interpolation over [`IL_TABLE`], clamped to its endpoints. Not capped.
pub fn interpolate_il(multiple: f64) -> f64 {
    let (first_m, first_il) = IL_TABLE[0];
    if multiple.is_nan() || multiple <= first_m {
        return first_il;
    }
    for pair in IL_TABLE.windows(2) {
        let (lo_m, lo_il) = pair[0];
        let (hi_m, hi_il) = pair[1];
        if multiple <= hi_m {
            let t = (multiple - lo_m) / (hi_m - lo_m);
            return lo_il + t * (hi_il - lo_il);
        }
    }
    IL_TABLE[IL_TABLE.len() - 1].1
}

/// Profit breakdown for one position, evaluated at `as_of` if it is still open.
pub fn compute_profit(position: &Position, config: &StrategyConfig, as_of: TimeMs) -> ProfitBreakdown {
    let stake = config.stake_usd;
    let days = days_in_pool(position, as_of);
    let daily_rate = position.entry_yield.to_f64() / 365.0 / 100.0;

    let gross_profit = if config.compounding {
        stake * (1.0 + daily_rate).powf(days) - stake
    } else {
        stake * daily_rate * days
    };
    let gross_profit = finite_or_zero(gross_profit);

    let fees = config.fees.fee_for(&position.chain);

    let multiple = price_change_multiple(position.entry_tvl.to_f64(), position.last_tvl().to_f64());
    let il_fraction = if config.model_impermanent_loss {
        interpolate_il(multiple).min(IL_CAP)
    } else {
        0.0
    };
    let il_amount = stake * il_fraction;

    let net_profit = gross_profit - fees - il_amount;
    let roi = ratio_pct(net_profit, stake);

    ProfitBreakdown {
        position_id: position.id,
        days_in_pool: days,
        stake,
        gross_profit,
        fees,
        price_change_multiple: if multiple.is_finite() { multiple } else { 0.0 },
        il_fraction,
        il_amount,
        net_profit,
        roi,
        total_value: stake + net_profit,
    }
}

/// `value / base * 100`, or 0 when `base` is not a usable denominator.
pub(crate) fn ratio_pct(value: f64, base: f64) -> f64 {
    if base == 0.0 || !base.is_finite() {
        return 0.0;
    }
    finite_or_zero(value / base * 100.0)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
