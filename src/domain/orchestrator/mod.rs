//! Agent-output schema and decision-synthesis rules for the INoT Orchestrator
//! (spec.md §4.5). Pure domain logic; the LLM call and prompt assembly live
//! in `application::orchestrator`.

pub mod schema;

use crate::domain::errors::ValidationError;
use crate::domain::types::{Action, MarketRegimeType};
use rust_decimal::Decimal;
use schema::{AgentOutputs, RiskAgentOutput};
use serde_json::Value;

/// Clipping floor for confidences entering the weighted geometric mean, so a
/// single zeroed component cannot zero out the whole product.
const CONFIDENCE_EPSILON: f64 = 0.001;

const SIGNAL_WEIGHT: f64 = 0.45;
const RISK_WEIGHT: f64 = 0.25;
const CONTEXT_WEIGHT: f64 = 0.15;
const SYNTHESIS_WEIGHT: f64 = 0.15;

/// The full outcome of one orchestration pass: what the engine acts on, plus
/// the raw agent sections for audit/persistence.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub lots: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub confidence: f64,
    pub vetoed: bool,
    pub veto_reason: Option<String>,
    pub reasoning: String,
    pub signal_agent_output: Value,
    pub risk_agent_output: Value,
    pub context_agent_output: Value,
    pub synthesis_agent_output: Value,
}

impl Decision {
    /// A safe HOLD used on validation failure, budget exhaustion, or any
    /// path that must not touch the market (spec.md §4.5 Failure semantics).
    pub fn safe_hold(veto_reason: &str) -> Self {
        Self {
            action: Action::Hold,
            lots: Decimal::ZERO,
            stop_loss: None,
            take_profit: None,
            confidence: 0.0,
            vetoed: true,
            veto_reason: Some(veto_reason.to_string()),
            reasoning: veto_reason.to_string(),
            signal_agent_output: Value::Null,
            risk_agent_output: Value::Null,
            context_agent_output: Value::Null,
            synthesis_agent_output: Value::Null,
        }
    }
}

/// Weighted geometric mean of the four agent confidences, weights fixed at
/// 0.45/0.25/0.15/0.15 (Signal/Risk/Context/Synthesis), each confidence
/// clipped to `[ε, 1]` first.
pub fn weighted_geometric_mean_confidence(
    signal_confidence: f64,
    risk_confidence: f64,
    context_regime_confidence: f64,
    synthesis_confidence: f64,
) -> f64 {
    let clip = |c: f64| c.clamp(CONFIDENCE_EPSILON, 1.0);
    let s = clip(signal_confidence);
    let r = clip(risk_confidence);
    let c = clip(context_regime_confidence);
    let y = clip(synthesis_confidence);

    (s.powf(SIGNAL_WEIGHT) * r.powf(RISK_WEIGHT) * c.powf(CONTEXT_WEIGHT) * y.powf(SYNTHESIS_WEIGHT))
        .clamp(0.0, 1.0)
}

/// Applies the hard veto rule, then synthesis, to validated agent outputs.
/// This function is system-enforced and never delegated to the model.
pub fn synthesize(outputs: &AgentOutputs) -> Result<Decision, ValidationError> {
    let signal_json = serde_json::to_value(&outputs.signal).unwrap_or(Value::Null);
    let risk_json = serde_json::to_value(&outputs.risk).unwrap_or(Value::Null);
    let context_json = serde_json::to_value(&outputs.context).unwrap_or(Value::Null);
    let synthesis_json = serde_json::to_value(&outputs.synthesis).unwrap_or(Value::Null);

    if let Some(reason) = veto_reason(&outputs.risk, &outputs.synthesis) {
        return Ok(Decision {
            action: Action::Hold,
            lots: Decimal::ZERO,
            stop_loss: None,
            take_profit: None,
            confidence: 0.0,
            vetoed: true,
            veto_reason: Some(reason),
            reasoning: outputs.synthesis.final_decision.reasoning.clone(),
            signal_agent_output: signal_json,
            risk_agent_output: risk_json,
            context_agent_output: context_json,
            synthesis_agent_output: synthesis_json,
        });
    }

    let raw_lots = outputs.synthesis.final_decision.lots;
    let adjustment =
        Decimal::from_f64_retain(outputs.risk.position_size_adjustment).unwrap_or(Decimal::ONE);
    let lots = raw_lots * adjustment;

    let confidence = weighted_geometric_mean_confidence(
        outputs.signal.confidence,
        outputs.risk.confidence,
        outputs.context.regime_confidence,
        outputs.synthesis.final_decision.confidence,
    );

    Ok(Decision {
        action: outputs.synthesis.final_decision.action,
        lots,
        stop_loss: outputs.synthesis.final_decision.stop_loss,
        take_profit: outputs.synthesis.final_decision.take_profit,
        confidence,
        vetoed: false,
        veto_reason: None,
        reasoning: outputs.synthesis.final_decision.reasoning.clone(),
        signal_agent_output: signal_json,
        risk_agent_output: risk_json,
        context_agent_output: context_json,
        synthesis_agent_output: synthesis_json,
    })
}

/// Evaluates the three hard-veto conditions (spec.md §4.5). Returns `Some`
/// with the reason the first triggered condition names.
fn veto_reason(
    risk: &RiskAgentOutput,
    synthesis: &schema::SynthesisAgentOutput,
) -> Option<String> {
    if !risk.approved {
        return Some(
            risk.veto_reason
                .clone()
                .unwrap_or_else(|| "risk agent did not approve".to_string()),
        );
    }
    if risk.stop_loss_required && synthesis.final_decision.stop_loss.is_none() {
        return Some("stop_loss_required but absent from synthesis".to_string());
    }
    if risk.position_size_adjustment <= 0.0 {
        return Some("risk position_size_adjustment is non-positive".to_string());
    }
    None
}

/// Blends signal/regime fit into an overall market-regime read used outside
/// synthesis (e.g. for health/observability), separate from the Decision path.
pub fn regime_fit_label(regime: MarketRegimeType, fit: f64) -> String {
    format!("{regime}:{fit:.2}")
}
