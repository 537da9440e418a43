#[cfg(test)]
mod pipeline_tests {
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    use crate::engine::{HALT_REASONING, REPLAY_REASONING};
    use crate::{DecisionMode, DecisionPipelineEngine, DecisionRequest, FinalDecision, MarketContext};
    use decision_core::{
        AgentSignal, AiDecision, DirectionalBias, GovernorDecision, MarketRegime, MomentumState,
        Signal, TradeDirection, TradingSession,
    };

    fn agents(votes: &[Signal]) -> Vec<AgentSignal> {
        votes
            .iter()
            .enumerate()
            .map(|(i, s)| AgentSignal::new(format!("Agent{}", i), *s, 0.7))
            .collect()
    }

    fn prime_market() -> MarketContext {
        MarketContext {
            regime: MarketRegime::Volatile,
            session: TradingSession::OpeningPhase2,
            bias: DirectionalBias::Bullish,
            momentum: MomentumState::Rising,
        }
    }

    fn request(votes: &[Signal], ai: Signal, confidence: f64) -> DecisionRequest {
        let mut req = DecisionRequest::new(
            "NIFTY",
            Utc.with_ymd_and_hms(2024, 3, 6, 4, 0, 0).unwrap(),
            agents(votes),
        );
        req.trace_id = "trace-1".to_string();
        req.ai_decision = Some(AiDecision::new(ai, confidence, "AI rationale"));
        req.market = prime_market();
        req
    }

    #[test]
    fn test_aligned_buy_passes_every_gate() {
        let engine = DecisionPipelineEngine::default();
        let decision = engine.build_decision(&request(&[Signal::Buy; 3], Signal::Buy, 0.80));

        assert_eq!(decision.signal, Signal::Buy);
        assert_relative_eq!(decision.confidence, 0.80);
        assert_eq!(decision.trade_direction, TradeDirection::Long);
        assert!(!decision.divergence_flag);
        assert_eq!(decision.reasoning, "AI rationale");
        assert!(decision.metadata.gate_trail.is_empty());
        assert_eq!(decision.metadata.decision_mode, DecisionMode::LiveAi);
        assert_eq!(decision.metadata.agent_count, 3);
        assert_eq!(decision.metadata.signal_votes[&Signal::Buy], 3);

        let sizing = decision.position_sizing.unwrap();
        assert_relative_eq!(sizing.risk_percent, 0.80, epsilon = 1e-12);
        assert_relative_eq!(sizing.lot_multiplier, 0.80, epsilon = 1e-12);
    }

    #[test]
    fn test_reduce_size_halves_sizing() {
        let engine = DecisionPipelineEngine::default();
        let allow = engine.build_decision(&request(&[Signal::Buy; 3], Signal::Buy, 0.80));

        let mut reduced_req = request(&[Signal::Buy; 3], Signal::Buy, 0.80);
        reduced_req.governor_decision = GovernorDecision::ReduceSize;
        let reduced = engine.build_decision(&reduced_req);

        assert_eq!(reduced.signal, Signal::Buy);
        assert_relative_eq!(reduced.metadata.size_multiplier, 0.5);
        let a = allow.position_sizing.unwrap();
        let r = reduced.position_sizing.unwrap();
        assert_relative_eq!(r.risk_percent, a.risk_percent * 0.5, epsilon = 1e-12);
        assert_relative_eq!(r.lot_multiplier, a.lot_multiplier * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_win_rate_feeds_sizing() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Buy; 3], Signal::Buy, 0.80);
        req.edge_win_rate = 0.70;
        let decision = engine.build_decision(&req);
        assert_relative_eq!(decision.position_sizing.unwrap().risk_percent, 0.96, epsilon = 1e-12);
    }

    #[test]
    fn test_halt_short_circuits() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Buy; 3], Signal::Buy, 0.95);
        req.governor_decision = GovernorDecision::Halt;
        let decision = engine.build_decision(&req);

        assert_eq!(decision.signal, Signal::Hold);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.trade_direction, TradeDirection::Flat);
        assert_eq!(decision.reasoning, HALT_REASONING);
        assert!(decision.position_sizing.is_none());
        assert_eq!(decision.metadata.size_multiplier, 0.0);
        assert_eq!(decision.metadata.governor_decision, GovernorDecision::Halt);
        assert!(decision.metadata.gate_trail.is_empty());
    }

    #[test]
    fn test_halt_dominates_every_input() {
        let engine = DecisionPipelineEngine::default();
        let vote_sets: [&[Signal]; 3] = [&[Signal::Buy; 3], &[Signal::Sell; 2], &[]];
        for ai in Signal::ALL {
            for votes in vote_sets {
                for session in TradingSession::ALL {
                    for replay_mode in [false, true] {
                        let mut req = request(votes, *ai, 0.99);
                        req.market.session = *session;
                        req.replay_mode = replay_mode;
                        req.divergence_streak = 3;
                        req.governor_decision = GovernorDecision::Halt;

                        let d = engine.build_decision(&req);
                        assert_eq!(d.signal, Signal::Hold);
                        assert_eq!(d.confidence, 0.0);
                        assert_eq!(d.trade_direction, TradeDirection::Flat);
                    }
                }
            }
        }
    }

    #[test]
    fn test_upward_override_is_discarded() {
        // Consensus BUY at full confidence overrides an AI SELL; the authority
        // chain restores SELL and the divergence then filters it to WATCH.
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Buy; 3], Signal::Sell, 0.80);
        req.market.bias = DirectionalBias::StrongBearish;
        let decision = engine.build_decision(&req);

        assert!(decision.divergence_flag);
        assert_eq!(decision.signal, Signal::Watch);
        assert_relative_eq!(decision.confidence, 0.68, epsilon = 1e-12);
        assert!(!decision.metadata.override_applied);
        assert_eq!(decision.reasoning, "AI rationale");

        let gates: Vec<_> = decision
            .metadata
            .gate_trail
            .iter()
            .map(|t| t.gate.as_str())
            .collect();
        assert_eq!(gates, vec!["AuthorityChain", "DivergencePenalty", "MultiFilter"]);
        assert_eq!(decision.metadata.gate_trail[0].to_signal, Signal::Sell);
    }

    #[test]
    fn test_downward_override_survives_with_reasoning_suffix() {
        let engine = DecisionPipelineEngine::default();
        // BUY + 4 HOLD: raw 0.2 -> consensus WATCH at 0.60
        let votes = [Signal::Buy, Signal::Hold, Signal::Hold, Signal::Hold, Signal::Hold];
        let mut req = request(&votes, Signal::Hold, 0.90);
        req.divergence_streak = 2;
        let decision = engine.build_decision(&req);

        assert!(decision.divergence_flag);
        assert!(decision.metadata.override_applied);
        assert_eq!(decision.signal, Signal::Watch);
        // dampened 0.72, then the 0.85 penalty
        assert_relative_eq!(decision.confidence, 0.612, epsilon = 1e-9);
        assert_eq!(
            decision.reasoning,
            "AI rationale [OVERRIDE: ConfidenceDampen streak=2 confidence 0.90→0.72]"
        );
        assert!(decision.position_sizing.is_none());
    }

    #[test]
    fn test_upward_override_of_watch_restores_watch() {
        let engine = DecisionPipelineEngine::default();
        // AI WATCH against a unanimous BUY consensus
        let decision = engine.build_decision(&request(&[Signal::Buy; 4], Signal::Watch, 0.5));

        // Rule 1 resolves to BUY, which is upward, so AI WATCH is restored
        assert_eq!(decision.signal, Signal::Watch);
        assert!(!decision.metadata.override_applied);
        assert_eq!(decision.trade_direction, TradeDirection::Flat);
    }

    #[test]
    fn test_replay_uses_consensus_as_primary() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Buy; 3], Signal::Sell, 0.95);
        req.replay_mode = true;
        let decision = engine.build_decision(&req);

        assert!(!decision.divergence_flag);
        assert_eq!(decision.metadata.decision_mode, DecisionMode::ReplayConsensusOnly);
        assert_eq!(decision.reasoning, REPLAY_REASONING);
        // unanimous BUY consensus at 1.0 clears every gate in the prime window
        assert_eq!(decision.signal, Signal::Buy);
        assert_relative_eq!(decision.confidence, 1.0);
        assert!(decision.is_replay());
    }

    #[test]
    fn test_empty_agents_resolve_to_hold() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[], Signal::Hold, 0.5);
        req.replay_mode = true;
        let decision = engine.build_decision(&req);

        assert_eq!(decision.signal, Signal::Hold);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.metadata.consensus_signal, Signal::Hold);
        assert_eq!(decision.metadata.agent_count, 0);
    }

    #[test]
    fn test_midday_blocks_entries() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Buy; 3], Signal::Buy, 0.9);
        req.market.session = TradingSession::MiddayConsolidation;
        let decision = engine.build_decision(&req);

        assert_eq!(decision.signal, Signal::Watch);
        assert_eq!(decision.metadata.gate_trail[0].gate, "SessionGate");
    }

    #[test]
    fn test_sell_in_opening_window() {
        let engine = DecisionPipelineEngine::default();
        let mut req = request(&[Signal::Sell; 3], Signal::Sell, 0.8);
        req.market.bias = DirectionalBias::Bearish;
        let decision = engine.build_decision(&req);

        assert_eq!(decision.signal, Signal::Sell);
        assert_eq!(decision.trade_direction, TradeDirection::Short);
        assert!(decision.position_sizing.is_some());
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let engine = DecisionPipelineEngine::default();
        let decision = engine.build_decision(&request(&[Signal::Buy; 3], Signal::Buy, 0.80));
        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["tradeDirection"], "LONG");
        assert_eq!(json["divergenceFlag"], false);
        assert_eq!(json["traceId"], "trace-1");
        assert_eq!(json["metadata"]["decisionMode"], "LIVE_AI");
        assert_eq!(json["metadata"]["tradingSession"], "OPENING_PHASE_2");
        assert_eq!(json["metadata"]["signalVotes"]["BUY"], 3);
        assert!(json["positionSizing"]["riskPercent"].is_number());
    }

    #[test]
    fn test_decision_round_trips_every_session() {
        let engine = DecisionPipelineEngine::default();
        for session in TradingSession::ALL {
            let mut req = request(&[Signal::Buy; 3], Signal::Buy, 0.80);
            req.market.session = *session;
            let decision = engine.build_decision(&req);

            let json = serde_json::to_string(&decision).unwrap();
            assert!(json.contains(&format!("\"tradingSession\":\"{}\"", session)), "{json}");
            let back: FinalDecision = serde_json::from_str(&json).unwrap();
            assert_eq!(back.metadata.trading_session, *session);
            assert_eq!(back.signal, decision.signal);
            assert_eq!(back.trade_direction, decision.trade_direction);
            let gates = |d: &FinalDecision| -> Vec<String> {
                d.metadata.gate_trail.iter().map(|t| t.gate.clone()).collect()
            };
            assert_eq!(gates(&back), gates(&decision));
        }

        let mut req = request(&[Signal::Buy; 3], Signal::Buy, 0.80);
        req.market.session = TradingSession::OpeningPhase1;
        let json = serde_json::to_value(engine.build_decision(&req)).unwrap();
        assert_eq!(json["metadata"]["tradingSession"], "OPENING_PHASE_1");
    }

    #[test]
    fn test_gate_invariants_across_contexts() {
        let engine = DecisionPipelineEngine::default();
        let vote_sets: [&[Signal]; 4] = [
            &[Signal::Buy, Signal::Buy, Signal::Buy],
            &[Signal::Sell, Signal::Sell],
            &[Signal::Buy, Signal::Buy, Signal::Sell],
            &[Signal::Hold, Signal::Watch],
        ];

        for ai in Signal::ALL {
            for votes in vote_sets {
                for session in TradingSession::ALL {
                    for regime in MarketRegime::ALL {
                        for bias in DirectionalBias::ALL {
                            for momentum in [MomentumState::Rising, MomentumState::Falling] {
                                for streak in 0..3 {
                                    for confidence in [0.6, 0.9] {
                                        let mut req = request(votes, *ai, confidence);
                                        req.market = MarketContext {
                                            regime: *regime,
                                            session: *session,
                                            bias: *bias,
                                            momentum,
                                        };
                                        req.divergence_streak = streak;
                                        let d = engine.build_decision(&req);

                                        assert!((0.0..=1.0).contains(&d.confidence));
                                        assert_eq!(d.trade_direction, TradeDirection::from_signal(d.signal));
                                        assert_eq!(d.position_sizing.is_some(), d.signal.is_directional());

                                        if d.signal.is_directional() {
                                            // never invented, never divergent, always tradeable
                                            assert_eq!(d.signal, *ai);
                                            assert!(!d.divergence_flag);
                                            assert!(d.confidence >= 0.65);
                                            assert!(session.is_active_scalping_window());
                                            assert!(streak < 2);
                                            let s = d.position_sizing.as_ref().unwrap();
                                            assert!((0.1..=1.5).contains(&s.risk_percent));
                                            assert!((0.25..=2.0).contains(&s.lot_multiplier));
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod chain_tests {
    use agent_consensus::DivergenceGuard;
    use approx::assert_relative_eq;

    use crate::gates::{authority_chain, GateContext, GateState, GATE_CHAIN};
    use decision_core::{DirectionalBias, MarketRegime, MomentumState, Signal, TradingSession};

    fn context(ai_signal: Signal, ai_confidence: f64) -> GateContext {
        GateContext {
            ai_signal,
            ai_confidence,
            regime: MarketRegime::Volatile,
            session: TradingSession::OpeningPhase2,
            bias: DirectionalBias::Bullish,
            momentum: MomentumState::Rising,
            divergence_flag: true,
            divergence_streak: 0,
        }
    }

    #[test]
    fn test_consensus_override_of_buy_reverts_to_ai() {
        let guard = DivergenceGuard::default();
        let outcome = guard.evaluate(Signal::Buy, 0.80, Signal::Sell, 0.70, true, 0);
        assert_eq!(outcome.signal, Signal::Sell);
        assert!(outcome.override_applied);

        let state = GateState::new(
            outcome.signal,
            outcome.confidence,
            outcome.override_applied,
            outcome.override_reason,
        );
        let state = authority_chain(&context(Signal::Buy, 0.80), state);

        assert_eq!(state.signal, Signal::Buy);
        assert_relative_eq!(state.confidence, 0.80);
        assert!(!state.override_kept);
    }

    #[test]
    fn test_watch_is_never_reverted() {
        for session in TradingSession::ALL {
            for regime in MarketRegime::ALL {
                for bias in DirectionalBias::ALL {
                    for momentum in MomentumState::ALL {
                        for divergence_flag in [false, true] {
                            for streak in 0..3 {
                                for start in Signal::ALL {
                                    let ctx = GateContext {
                                        ai_signal: *start,
                                        ai_confidence: 0.9,
                                        regime: *regime,
                                        session: *session,
                                        bias: *bias,
                                        momentum: *momentum,
                                        divergence_flag,
                                        divergence_streak: streak,
                                    };
                                    let mut state = GateState::new(*start, 0.9, false, None);
                                    let mut demoted = false;
                                    for gate in GATE_CHAIN.iter() {
                                        state = (gate.apply)(&ctx, state);
                                        if demoted {
                                            assert!(
                                                !state.is_directional(),
                                                "{} revived a demoted signal",
                                                gate.name
                                            );
                                        }
                                        demoted |= state.signal == Signal::Watch;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
