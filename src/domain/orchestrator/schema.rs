//! Strict output schema for the four-agent INoT completion (spec.md §4.5).
//! These types are what a validated LLM response deserializes into; parsing
//! and auto-remediation live in `application::orchestrator::validate`.

use crate::domain::types::{Action, MarketRegimeType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAgentOutput {
    pub action: Action,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAgentOutput {
    pub approved: bool,
    pub confidence: f64,
    /// Multiplier applied to `Synthesis.final_decision.lots`; domain `(0, 2]`.
    pub position_size_adjustment: f64,
    pub stop_loss_required: bool,
    #[serde(default)]
    pub veto_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextAgentOutput {
    pub regime: MarketRegimeType,
    pub regime_confidence: f64,
    pub signal_regime_fit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDecision {
    pub action: Action,
    pub lots: Decimal,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisAgentOutput {
    pub final_decision: FinalDecision,
}

/// The fixed-order sequence Signal, Risk, Context, Synthesis that the model
/// must emit in one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutputs {
    pub signal: SignalAgentOutput,
    pub risk: RiskAgentOutput,
    pub context: ContextAgentOutput,
    pub synthesis: SynthesisAgentOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_outputs_round_trip_json() {
        let outputs = AgentOutputs {
            signal: SignalAgentOutput {
                action: Action::Buy,
                confidence: 0.9,
                reasoning: "strong uptrend".to_string(),
            },
            risk: RiskAgentOutput {
                approved: true,
                confidence: 0.6,
                position_size_adjustment: 1.0,
                stop_loss_required: false,
                veto_reason: None,
            },
            context: ContextAgentOutput {
                regime: MarketRegimeType::TrendingUp,
                regime_confidence: 0.8,
                signal_regime_fit: 0.75,
            },
            synthesis: SynthesisAgentOutput {
                final_decision: FinalDecision {
                    action: Action::Buy,
                    lots: Decimal::ONE,
                    stop_loss: None,
                    take_profit: None,
                    confidence: 0.7,
                    reasoning: "agrees".to_string(),
                },
            },
        };
        let json = serde_json::to_string(&outputs).unwrap();
        let parsed: AgentOutputs = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.signal.action, Action::Buy);
    }

    #[test]
    fn test_risk_veto_reason_defaults_to_none() {
        let json = r#"{"approved":true,"confidence":0.5,"position_size_adjustment":1.0,"stop_loss_required":false}"#;
        let risk: RiskAgentOutput = serde_json::from_str(json).unwrap();
        assert!(risk.veto_reason.is_none());
    }
}
