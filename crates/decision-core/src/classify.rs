//! Classifiers that turn raw cycle inputs (timestamps, closes, vote scores) into the
//! closed enums consumed by the gate chain.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Asia::Kolkata;

use crate::{DirectionalBias, MarketRegime, MomentumState, TradingSession};

const VOLATILE_STD_DEV: f64 = 7.0;
const CALM_STD_DEV: f64 = 3.0;

// Session boundaries in IST, minutes after midnight
const OPEN_START: u32 = 9 * 60 + 15;
const PHASE2_START: u32 = 9 * 60 + 25;
const PHASE3_START: u32 = 9 * 60 + 40;
const MIDDAY_START: u32 = 10 * 60 + 15;
const POWER_START: u32 = 14 * 60 + 30;
const MARKET_CLOSE: u32 = 15 * 60 + 30;

impl TradingSession {
    /// Map a UTC instant onto the NSE micro-session it falls in.
    pub fn classify(now: DateTime<Utc>) -> Self {
        let ist = now.with_timezone(&Kolkata);
        if matches!(ist.weekday(), Weekday::Sat | Weekday::Sun) {
            return TradingSession::OffHours;
        }

        let minute = ist.hour() * 60 + ist.minute();
        match minute {
            m if m < OPEN_START => TradingSession::OffHours,
            m if m < PHASE2_START => TradingSession::OpeningPhase1,
            m if m < PHASE3_START => TradingSession::OpeningPhase2,
            m if m < MIDDAY_START => TradingSession::OpeningPhase3,
            m if m < POWER_START => TradingSession::MiddayConsolidation,
            m if m < MARKET_CLOSE => TradingSession::PowerHour,
            _ => TradingSession::OffHours,
        }
    }
}

impl MarketRegime {
    /// Classify from a price history (oldest first). `latest_close` overrides the
    /// last element when the caller has a fresher quote.
    ///
    /// Rules, first match wins: std-dev > 7 is VOLATILE; latest above both SMA50
    /// and SMA20 is TRENDING; std-dev < 3 is CALM; anything else is RANGING.
    pub fn classify(prices: &[f64], latest_close: Option<f64>) -> Self {
        let Some(&last) = prices.last() else {
            return MarketRegime::Unknown;
        };
        let latest = latest_close.filter(|p| p.is_finite()).unwrap_or(last);

        let std_dev = population_std_dev(prices);
        if std_dev > VOLATILE_STD_DEV {
            return MarketRegime::Volatile;
        }

        if latest > sma(prices, 50) && latest > sma(prices, 20) {
            return MarketRegime::Trending;
        }

        if std_dev < CALM_STD_DEV {
            return MarketRegime::Calm;
        }

        MarketRegime::Ranging
    }
}

impl MomentumState {
    /// Momentum from the three most recent closes, newest first.
    pub fn from_closes(closes: &[f64]) -> Self {
        let [p0, p1, p2] = match closes {
            [a, b, c, ..] => [*a, *b, *c],
            _ => return MomentumState::Unknown,
        };

        if p0 < p1 {
            MomentumState::Falling
        } else if p0 > p1 && p1 > p2 {
            MomentumState::Rising
        } else {
            // Up-tick without follow-through, or flat
            MomentumState::Weakening
        }
    }
}

impl DirectionalBias {
    /// Bucket the trend agent's -5..+5 vote score.
    pub fn from_vote_score(score: i32) -> Self {
        match score {
            s if s >= 3 => DirectionalBias::StrongBullish,
            s if s >= 1 => DirectionalBias::Bullish,
            0 => DirectionalBias::Neutral,
            s if s >= -2 => DirectionalBias::Bearish,
            _ => DirectionalBias::StrongBearish,
        }
    }
}

fn population_std_dev(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Simple moving average over the last `period` points (all points if fewer).
fn sma(prices: &[f64], period: usize) -> f64 {
    let from = prices.len().saturating_sub(period);
    let window = &prices[from..];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}
