//! File-backed collaborators for replaying recorded cycles.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use decision_core::{
    AgentFeedback, AgentPerformance, AgentSignal, AgentSource, AiDecision, AiStrategist,
    DecisionError, DecisionResult, PerformanceSource, StrategyRequest,
};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleRequest;

/// One recorded cycle: the inputs the agents saw and what they said.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCycle {
    pub symbol: String,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub prices: Vec<f64>,
    #[serde(default)]
    pub agents: Vec<AgentSignal>,
}

impl RecordedCycle {
    pub fn to_request(&self) -> CycleRequest {
        CycleRequest::replay(self.symbol.clone(), self.triggered_at, self.prices.clone())
    }
}

pub fn load_cycles(path: &Path) -> Result<Vec<RecordedCycle>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_cycles(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_cycles(raw: &str) -> DecisionResult<Vec<RecordedCycle>> {
    Ok(serde_json::from_str(raw)?)
}

/// Replays each symbol's recorded agent outputs in file order, one batch per call.
#[derive(Default)]
pub struct RecordedAgents {
    queues: DashMap<String, VecDeque<Vec<AgentSignal>>>,
}

impl RecordedAgents {
    pub fn from_cycles(cycles: &[RecordedCycle]) -> Self {
        let agents = Self::default();
        for cycle in cycles {
            agents
                .queues
                .entry(cycle.symbol.clone())
                .or_default()
                .push_back(cycle.agents.clone());
        }
        agents
    }
}

#[async_trait]
impl AgentSource for RecordedAgents {
    async fn collect_signals(&self, symbol: &str, _prices: &[f64]) -> DecisionResult<Vec<AgentSignal>> {
        self.queues
            .get_mut(symbol)
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| DecisionError::Unavailable(format!("no recorded agent output left for {symbol}")))
    }
}

/// Agent history snapshot loaded once from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedHistory {
    #[serde(default)]
    pub performance: Vec<AgentPerformance>,
    #[serde(default)]
    pub feedback: Vec<AgentFeedback>,
}

impl RecordedHistory {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[async_trait]
impl PerformanceSource for RecordedHistory {
    async fn agent_performance(&self) -> DecisionResult<HashMap<String, AgentPerformance>> {
        Ok(self
            .performance
            .iter()
            .map(|p| (p.agent_name.clone(), p.clone()))
            .collect())
    }

    async fn agent_feedback(&self) -> DecisionResult<HashMap<String, AgentFeedback>> {
        Ok(self
            .feedback
            .iter()
            .map(|f| (f.agent_name.clone(), f.clone()))
            .collect())
    }
}

/// Replay never consults a strategist; the consensus stands in.
pub struct OfflineStrategist;

#[async_trait]
impl AiStrategist for OfflineStrategist {
    async fn decide(&self, request: &StrategyRequest) -> DecisionResult<AiDecision> {
        Err(DecisionError::Unavailable(format!(
            "strategist not available offline (symbol {})",
            request.symbol
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::Signal;

    const CYCLES: &str = r#"[
        {
            "symbol": "NIFTY",
            "triggeredAt": "2024-03-06T03:50:00Z",
            "prices": [100.0, 101.0, 102.0],
            "agents": [
                {"agentName": "TrendAgent", "signal": "BUY", "confidence": 0.8,
                 "metadata": {"directionalBias": "STRONG_BULLISH", "momentumState": "RISING"}},
                {"agentName": "RiskAgent", "signal": "HOLD", "confidence": 0.5}
            ]
        },
        {
            "symbol": "NIFTY",
            "triggeredAt": "2024-03-06T03:55:00Z",
            "agents": [{"agentName": "TrendAgent", "signal": "SELL", "confidence": 0.6}]
        }
    ]"#;

    #[test]
    fn test_parse_recorded_cycles() {
        let cycles = parse_cycles(CYCLES).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].agents.len(), 2);
        assert!(cycles[1].prices.is_empty());
        assert!(cycles[0].to_request().replay_mode);
    }

    #[test]
    fn test_malformed_file_is_a_serialization_error() {
        assert!(matches!(
            parse_cycles("{not json"),
            Err(DecisionError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_recorded_agents_replay_in_order() {
        let cycles = parse_cycles(CYCLES).unwrap();
        let agents = RecordedAgents::from_cycles(&cycles);

        let first = agents.collect_signals("NIFTY", &[]).await.unwrap();
        assert_eq!(first[0].signal, Signal::Buy);
        let second = agents.collect_signals("NIFTY", &[]).await.unwrap();
        assert_eq!(second[0].signal, Signal::Sell);
        assert!(agents.collect_signals("NIFTY", &[]).await.is_err());
        assert!(agents.collect_signals("BANKNIFTY", &[]).await.is_err());
    }
}
