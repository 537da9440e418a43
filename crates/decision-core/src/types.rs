use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DecisionError;

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for a closed enum
/// whose serde representation is SCREAMING_SNAKE_CASE.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DecisionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(DecisionError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// Trading signal emitted by agents, the AI strategist and the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    Watch,
}

wire_enum!(Signal, "signal", {
    Buy => "BUY",
    Sell => "SELL",
    Hold => "HOLD",
    Watch => "WATCH",
});

impl Signal {
    /// Vote score used by the weighted consensus (BUY=+1, SELL=-1, HOLD=0, WATCH=+0.5).
    pub fn score(&self) -> f64 {
        match self {
            Signal::Buy => 1.0,
            Signal::Sell => -1.0,
            Signal::Hold => 0.0,
            Signal::Watch => 0.5,
        }
    }

    /// BUY or SELL: a signal that would open a position.
    pub fn is_directional(&self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }
}

/// Unambiguous position direction derived from the final signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDirection {
    Long,
    Short,
    Flat,
}

wire_enum!(TradeDirection, "trade direction", {
    Long => "LONG",
    Short => "SHORT",
    Flat => "FLAT",
});

impl TradeDirection {
    pub fn from_signal(signal: Signal) -> Self {
        match signal {
            Signal::Buy => TradeDirection::Long,
            Signal::Sell => TradeDirection::Short,
            Signal::Hold | Signal::Watch => TradeDirection::Flat,
        }
    }
}

/// Detected market condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Calm,
    #[default]
    Unknown,
}

wire_enum!(MarketRegime, "market regime", {
    Trending => "TRENDING",
    Ranging => "RANGING",
    Volatile => "VOLATILE",
    Calm => "CALM",
    Unknown => "UNKNOWN",
});

/// Intraday micro-session of the NSE trading day (IST).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSession {
    /// 09:15-09:25, price discovery
    #[serde(rename = "OPENING_PHASE_1")]
    OpeningPhase1,
    /// 09:25-09:40, directional expansion
    #[serde(rename = "OPENING_PHASE_2")]
    OpeningPhase2,
    /// 09:40-10:15, continuation or trap
    #[serde(rename = "OPENING_PHASE_3")]
    OpeningPhase3,
    /// 10:15-14:30
    MiddayConsolidation,
    /// 14:30-15:30
    PowerHour,
    #[default]
    OffHours,
    /// Legacy label for the undivided opening window, still present in recorded data.
    OpeningBurst,
}

wire_enum!(TradingSession, "trading session", {
    OpeningPhase1 => "OPENING_PHASE_1",
    OpeningPhase2 => "OPENING_PHASE_2",
    OpeningPhase3 => "OPENING_PHASE_3",
    MiddayConsolidation => "MIDDAY_CONSOLIDATION",
    PowerHour => "POWER_HOUR",
    OffHours => "OFF_HOURS",
    OpeningBurst => "OPENING_BURST",
});

impl TradingSession {
    /// Sessions in which BUY/SELL entries may be taken at all.
    pub fn is_active_scalping_window(&self) -> bool {
        match self {
            TradingSession::OpeningPhase1
            | TradingSession::OpeningPhase2
            | TradingSession::OpeningPhase3
            | TradingSession::PowerHour
            | TradingSession::OpeningBurst => true,
            TradingSession::MiddayConsolidation | TradingSession::OffHours => false,
        }
    }

    /// Low-volatility or closed windows where only WATCH/HOLD are emitted.
    pub fn is_dormant(&self) -> bool {
        matches!(
            self,
            TradingSession::MiddayConsolidation | TradingSession::OffHours
        )
    }

    /// Opening sub-windows in which SELL entries are eligible (not the continuation phase).
    pub fn allows_sell_entry(&self) -> bool {
        match self {
            TradingSession::OpeningPhase1
            | TradingSession::OpeningPhase2
            | TradingSession::OpeningBurst => true,
            TradingSession::OpeningPhase3
            | TradingSession::MiddayConsolidation
            | TradingSession::PowerHour
            | TradingSession::OffHours => false,
        }
    }
}

/// Five-level aggregate of the trend agent's directional vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectionalBias {
    StrongBullish,
    Bullish,
    #[default]
    Neutral,
    Bearish,
    StrongBearish,
}

wire_enum!(DirectionalBias, "directional bias", {
    StrongBullish => "STRONG_BULLISH",
    Bullish => "BULLISH",
    Neutral => "NEUTRAL",
    Bearish => "BEARISH",
    StrongBearish => "STRONG_BEARISH",
});

impl DirectionalBias {
    pub fn is_long_bias(&self) -> bool {
        matches!(self, DirectionalBias::Bullish | DirectionalBias::StrongBullish)
    }

    pub fn is_short_bias(&self) -> bool {
        matches!(self, DirectionalBias::Bearish | DirectionalBias::StrongBearish)
    }

    pub fn is_strong(&self) -> bool {
        matches!(
            self,
            DirectionalBias::StrongBullish | DirectionalBias::StrongBearish
        )
    }
}

/// Short-horizon price momentum from the last three closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumState {
    Rising,
    Weakening,
    Falling,
    #[default]
    Unknown,
}

wire_enum!(MomentumState, "momentum state", {
    Rising => "RISING",
    Weakening => "WEAKENING",
    Falling => "FALLING",
    Unknown => "UNKNOWN",
});

impl MomentumState {
    pub fn is_fading(&self) -> bool {
        matches!(self, MomentumState::Weakening | MomentumState::Falling)
    }
}

/// Primary analytical capability of an agent, used for regime weight boosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentCapability {
    Trend,
    Risk,
    Portfolio,
    Discipline,
}

wire_enum!(AgentCapability, "agent capability", {
    Trend => "TREND",
    Risk => "RISK",
    Portfolio => "PORTFOLIO",
    Discipline => "DISCIPLINE",
});

impl AgentCapability {
    /// Capability of the built-in agents, by registered name.
    pub fn from_agent_name(agent_name: &str) -> Option<Self> {
        match agent_name {
            "TrendAgent" => Some(AgentCapability::Trend),
            "RiskAgent" => Some(AgentCapability::Risk),
            "PortfolioAgent" => Some(AgentCapability::Portfolio),
            "DisciplineCoach" => Some(AgentCapability::Discipline),
            _ => None,
        }
    }
}

/// Outcome of the daily kill-switch evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernorDecision {
    #[default]
    Allow,
    ReduceSize,
    Halt,
}

wire_enum!(GovernorDecision, "governor decision", {
    Allow => "ALLOW",
    ReduceSize => "REDUCE_SIZE",
    Halt => "HALT",
});

impl GovernorDecision {
    /// Position size multiplier handed to the sizing engine.
    pub fn size_multiplier(&self) -> f64 {
        match self {
            GovernorDecision::ReduceSize => 0.5,
            GovernorDecision::Allow | GovernorDecision::Halt => 1.0,
        }
    }
}

/// Strategist model class: cheap and fast in peak windows, stronger otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelTier {
    Fast,
    Deep,
}

wire_enum!(ModelTier, "model tier", {
    Fast => "FAST",
    Deep => "DEEP",
});

impl ModelTier {
    pub fn select(peak_mode: bool, regime: MarketRegime) -> Self {
        if peak_mode || regime == MarketRegime::Volatile {
            ModelTier::Fast
        } else {
            ModelTier::Deep
        }
    }
}

/// One agent's output for the current cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSignal {
    pub agent_name: String,
    pub signal: Signal,
    pub confidence: f64, // 0.0 to 1.0
    #[serde(default)]
    pub summary: String,
    /// Explicit capability; falls back to the name registry when absent.
    #[serde(default)]
    pub capability: Option<AgentCapability>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentSignal {
    pub fn new(agent_name: impl Into<String>, signal: Signal, confidence: f64) -> Self {
        Self {
            agent_name: agent_name.into(),
            signal,
            confidence,
            summary: String::new(),
            capability: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_capability(mut self, capability: AgentCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn capability(&self) -> Option<AgentCapability> {
        self.capability
            .or_else(|| AgentCapability::from_agent_name(&self.agent_name))
    }

    /// String metadata value, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Historical performance snapshot for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_name: String,
    /// Average confidence across stored decisions (0.0 to 1.0)
    pub historical_accuracy_score: f64,
    /// Normalized latency penalty (1.0 = slowest agent observed)
    pub latency_weight: f64,
    #[serde(default)]
    pub total_decisions: u64,
}

/// Outcome-derived feedback for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFeedback {
    pub agent_name: String,
    pub win_rate: f64,
    pub avg_confidence: f64,
    pub avg_latency_ms: f64,
    #[serde(default)]
    pub total_decisions: u64,
}

/// Primary signal from the AI strategist (or its synthesized stand-in).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiDecision {
    pub signal: Signal,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub estimated_hold_minutes: Option<u32>,
    pub trade_direction: TradeDirection,
}

impl AiDecision {
    /// Decision without entry/exit levels; direction follows the signal.
    pub fn new(signal: Signal, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            signal,
            confidence,
            reasoning: reasoning.into(),
            entry_price: None,
            target_price: None,
            stop_loss: None,
            estimated_hold_minutes: None,
            trade_direction: TradeDirection::from_signal(signal),
        }
    }
}

/// Clamp into [0, 1]; non-finite input collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp into `[min, max]`; NaN collapses to `min`.
pub fn clamp_bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
