//! Risk engine - position sizing, scoring and portfolio checks
//!
//! Pure math over the three panel inputs (capital, risk percent, stop
//! loss), plus trade-entry assessment, portfolio aggregation and the
//! exportable risk report. All functions are deterministic except the
//! Monte Carlo simulation, which takes its RNG from the caller.

pub mod monte_carlo;

pub use monte_carlo::{simulate, SimulationStats};

use crate::store::Store;
use crate::types::MarketKey;
use crate::utils::round_to;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Panel inputs driving every derived risk figure.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs {
    pub capital: f64,
    pub risk_percent: f64,
    pub stop_loss: f64,
}

impl Default for RiskInputs {
    fn default() -> Self {
        Self {
            capital: 10_000.0,
            risk_percent: 1.0,
            stop_loss: 2.0,
        }
    }
}

/// Derived panel figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCalculation {
    pub risk_amount: f64,
    pub position_size: f64,
    pub max_loss: f64,
    pub max_gain: f64,
    pub risk_score: u32,
    pub warnings: Vec<String>,
}

/// Risk band for the panel indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn from_risk_percent(risk_percent: f64) -> Self {
        if risk_percent <= 1.0 {
            RiskLevel::Low
        } else if risk_percent <= 2.0 {
            RiskLevel::Moderate
        } else if risk_percent <= 3.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
            RiskLevel::Extreme => "Extreme Risk",
        }
    }
}

/// Derive every panel figure from the inputs. Max gain assumes the
/// panel's fixed 1:2 risk-reward.
pub fn calculate(inputs: RiskInputs) -> RiskCalculation {
    let risk_amount = inputs.capital * (inputs.risk_percent / 100.0);
    let position_size = risk_amount / (inputs.stop_loss / 100.0);

    RiskCalculation {
        risk_amount,
        position_size,
        max_loss: -risk_amount,
        max_gain: risk_amount * 2.0,
        risk_score: risk_score(inputs),
        warnings: warnings(inputs, position_size),
    }
}

/// 0-100 score: base of 20 points per risk percent, scaled up for wide
/// stops and small accounts, down for tight stops and large accounts.
pub fn risk_score(inputs: RiskInputs) -> u32 {
    let mut score = inputs.risk_percent * 20.0;

    if inputs.stop_loss > 5.0 {
        score *= 1.2;
    }
    if inputs.stop_loss < 1.0 {
        score *= 0.8;
    }
    if inputs.capital < 5_000.0 {
        score *= 1.1;
    }
    if inputs.capital > 50_000.0 {
        score *= 0.9;
    }

    score.clamp(0.0, 100.0).round() as u32
}

/// Independent checks in fixed order; both thresholds of a pair can fire.
pub fn warnings(inputs: RiskInputs, position_size: f64) -> Vec<String> {
    let mut warnings = Vec::new();

    if inputs.risk_percent > 2.0 {
        warnings.push("Risk per trade exceeds 2%".to_string());
    }
    if inputs.risk_percent > 5.0 {
        warnings.push("Risk per trade is extremely high (>5%)".to_string());
    }
    if inputs.stop_loss > 10.0 {
        warnings.push("Stop loss is too wide (>10%) - consider tightening".to_string());
    }
    if inputs.stop_loss < 0.5 {
        warnings.push(
            "Stop loss is very tight (<0.5%) - may result in frequent stops".to_string(),
        );
    }
    if position_size > inputs.capital * 0.5 {
        warnings.push(
            "Position size exceeds 50% of capital - extremely high concentration risk"
                .to_string(),
        );
    }
    if position_size > inputs.capital * 0.25 {
        warnings.push(
            "Position size exceeds 25% of capital - high concentration risk".to_string(),
        );
    }

    warnings
}

/// Display units for a position at the given price, per market convention.
pub fn position_units(key: MarketKey, position_size: f64, price: f64) -> String {
    if price <= 0.0 || position_size <= 0.0 {
        return "0 units".to_string();
    }
    let units = position_size / price;
    match key {
        MarketKey::BTC => format!("{units:.4} BTC"),
        MarketKey::GOLD => format!("{units:.3} oz"),
        MarketKey::NIFTY | MarketKey::BANKNIFTY => format!("{units:.0} contracts"),
        _ => format!("{units:.2} units"),
    }
}

/// Pre-entry check for a concrete trade.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAssessment {
    pub risk_amount: f64,
    pub risk_percent: f64,
    pub position_size: f64,
    pub position_size_percent: f64,
    pub stop_loss_distance: f64,
    pub target_distance: f64,
    pub risk_reward_ratio: f64,
    pub warnings: Vec<String>,
    pub is_acceptable: bool,
}

pub fn quick_assessment(
    capital: f64,
    entry: f64,
    stop_loss: f64,
    target: f64,
    size: f64,
) -> QuickAssessment {
    let risk_amount = (entry - stop_loss).abs() * size;
    let risk_percent = risk_amount / capital * 100.0;
    let position_size = entry * size;
    let position_size_percent = position_size / capital * 100.0;
    let stop_loss_distance = ((stop_loss - entry) / entry * 100.0).abs();
    let target_distance = ((target - entry) / entry * 100.0).abs();
    let risk_reward_ratio = ((target - entry) / (entry - stop_loss)).abs();

    let mut warnings = Vec::new();
    if risk_percent > 2.0 {
        warnings.push(format!(
            "Risk per trade ({risk_percent:.1}%) exceeds 2% limit"
        ));
    }
    if position_size_percent > 25.0 {
        warnings.push(format!(
            "Position size ({position_size_percent:.1}%) exceeds 25% of capital"
        ));
    }
    if stop_loss_distance > 10.0 {
        warnings.push(format!(
            "Stop loss ({stop_loss_distance:.1}%) is wider than 10%"
        ));
    }
    if risk_reward_ratio < 1.0 {
        warnings.push(format!(
            "Risk-reward ratio (1:{risk_reward_ratio:.1}) is less than 1:1"
        ));
    }

    let is_acceptable = warnings.is_empty();
    QuickAssessment {
        risk_amount,
        risk_percent,
        position_size,
        position_size_percent,
        stop_loss_distance,
        target_distance,
        risk_reward_ratio,
        warnings,
        is_acceptable,
    }
}

/// Sizing that spends exactly the configured risk budget.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimalPosition {
    pub optimal_size: f64,
    pub risk_amount: f64,
    pub position_value: f64,
    pub position_percent: f64,
    pub risk_per_unit: f64,
    pub message: String,
}

pub fn optimal_position_size(
    capital: f64,
    risk_percent: f64,
    entry: f64,
    stop_loss: f64,
) -> OptimalPosition {
    let max_risk_amount = capital * (risk_percent / 100.0);
    let risk_per_unit = (entry - stop_loss).abs();

    if risk_per_unit == 0.0 {
        return OptimalPosition {
            optimal_size: 0.0,
            risk_amount: 0.0,
            position_value: 0.0,
            position_percent: 0.0,
            risk_per_unit: 0.0,
            message: "Invalid stop loss - same as entry price".to_string(),
        };
    }

    let optimal_size = max_risk_amount / risk_per_unit;
    let position_value = optimal_size * entry;
    let message = if position_value > capital * 0.25 {
        "Warning: Position size exceeds 25% of capital".to_string()
    } else {
        "Position size is within acceptable limits".to_string()
    };

    OptimalPosition {
        optimal_size,
        risk_amount: max_risk_amount,
        position_value,
        position_percent: position_value / capital * 100.0,
        risk_per_unit,
        message,
    }
}

/// One open position for portfolio aggregation.
#[derive(Debug, Clone, Copy)]
pub struct OpenPosition {
    pub size: f64,
    pub stop_loss: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRisk {
    pub total_risk: f64,
    pub portfolio_risk_percent: f64,
    pub concentration_risk: f64,
    pub number_of_positions: usize,
    pub warnings: Vec<String>,
}

pub fn portfolio_risk(capital: f64, positions: &[OpenPosition]) -> PortfolioRisk {
    let mut total_risk = 0.0;
    let mut max_position_risk = 0.0f64;
    for position in positions {
        let position_risk = position.size * (position.stop_loss / 100.0);
        total_risk += position_risk;
        max_position_risk = max_position_risk.max(position_risk);
    }

    let portfolio_risk_percent = if capital > 0.0 {
        total_risk / capital * 100.0
    } else {
        0.0
    };
    let concentration_risk = if total_risk > 0.0 {
        max_position_risk / total_risk * 100.0
    } else {
        0.0
    };

    let mut warnings = Vec::new();
    if portfolio_risk_percent > 10.0 {
        warnings.push(
            "Total portfolio risk exceeds 10% - consider reducing position sizes".to_string(),
        );
    }
    if portfolio_risk_percent > 20.0 {
        warnings.push("Total portfolio risk is dangerously high (>20%)".to_string());
    }
    if concentration_risk > 50.0 {
        warnings.push(
            "Single position represents over 50% of total risk - high concentration".to_string(),
        );
    }
    if concentration_risk > 75.0 {
        warnings.push("Extreme concentration risk (>75% in single position)".to_string());
    }

    PortfolioRisk {
        total_risk,
        portfolio_risk_percent,
        concentration_risk,
        number_of_positions: positions.len(),
        warnings,
    }
}

/// Fixed outcome scenarios for the panel.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub outcome: String,
    pub probability: &'static str,
}

pub fn scenario_analysis(calc: &RiskCalculation) -> Vec<Scenario> {
    vec![
        Scenario {
            name: "Best Case",
            description: "Take profit level reached",
            outcome: format!("+${:.2}", calc.max_gain),
            probability: "30%",
        },
        Scenario {
            name: "Expected Loss",
            description: "Stop loss level reached",
            outcome: format!("-${:.2}", calc.max_loss.abs()),
            probability: "50%",
        },
        Scenario {
            name: "Break Even",
            description: "Price returns to entry",
            outcome: "$0.00".to_string(),
            probability: "20%",
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Compliant,
    Violated,
    Checking,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskRule {
    pub rule: &'static str,
    pub description: &'static str,
    pub status: RuleStatus,
    pub impact: &'static str,
}

fn compliance(compliant: bool) -> RuleStatus {
    if compliant {
        RuleStatus::Compliant
    } else {
        RuleStatus::Violated
    }
}

/// Guideline compliance for the current inputs.
pub fn risk_rules(inputs: RiskInputs, position_size: f64) -> Vec<RiskRule> {
    vec![
        RiskRule {
            rule: "1% Rule",
            description: "Never risk more than 1% of your capital on a single trade",
            status: compliance(inputs.risk_percent <= 1.0),
            impact: "High",
        },
        RiskRule {
            rule: "2% Rule",
            description: "Never risk more than 2% of your capital on a single trade",
            status: compliance(inputs.risk_percent <= 2.0),
            impact: "Medium",
        },
        RiskRule {
            rule: "5% Stop Loss",
            description: "Stop loss should not exceed 5% of entry price",
            status: compliance(inputs.stop_loss <= 5.0),
            impact: "Medium",
        },
        RiskRule {
            rule: "Portfolio Risk",
            description: "Total portfolio risk should not exceed 10%",
            status: RuleStatus::Checking,
            impact: "High",
        },
        RiskRule {
            rule: "Position Size",
            description: "No single position should exceed 25% of capital",
            status: compliance(position_size <= inputs.capital * 0.25),
            impact: "High",
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: &'static str,
    pub action: &'static str,
    pub reason: String,
    pub impact: &'static str,
}

pub fn recommendations(
    inputs: RiskInputs,
    rules: &[RiskRule],
    simulation: &SimulationStats,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if inputs.risk_percent > 2.0 {
        out.push(Recommendation {
            priority: "high",
            action: "Reduce risk per trade",
            reason: format!(
                "Current risk ({}%) exceeds recommended 2% maximum",
                inputs.risk_percent
            ),
            impact: "Reduces probability of ruin and large drawdowns",
        });
    }
    if inputs.stop_loss > 5.0 {
        out.push(Recommendation {
            priority: "medium",
            action: "Tighten stop loss",
            reason: format!(
                "Stop loss ({}%) is wider than recommended 5% maximum",
                inputs.stop_loss
            ),
            impact: "Reduces individual trade risk and improves risk-reward ratios",
        });
    }
    if simulation.probability_of_ruin > 10.0 {
        out.push(Recommendation {
            priority: "high",
            action: "Review risk parameters",
            reason: format!(
                "Probability of ruin is {:.1}%",
                simulation.probability_of_ruin
            ),
            impact: "High chance of significant capital depletion",
        });
    }
    let violated = rules
        .iter()
        .filter(|r| r.status == RuleStatus::Violated)
        .count();
    if violated > 0 {
        out.push(Recommendation {
            priority: "medium",
            action: "Address rule violations",
            reason: format!("{violated} risk management rules are being violated"),
            impact: "Increases overall portfolio risk and reduces consistency",
        });
    }
    if inputs.risk_percent <= 1.0 && simulation.probability_of_ruin < 5.0 {
        out.push(Recommendation {
            priority: "low",
            action: "Maintain current approach",
            reason: "Risk parameters are conservative and sustainable".to_string(),
            impact: "Continued capital preservation and steady growth",
        });
    }

    out
}

/// Full exportable risk report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub timestamp: String,
    pub risk_parameters: RiskCalculation,
    pub scenario_analysis: Vec<Scenario>,
    pub risk_rules: Vec<RiskRule>,
    pub monte_carlo_simulation: SimulationStats,
    pub recommendations: Vec<Recommendation>,
}

/// Build the report at a reduced iteration count so export stays fast.
pub fn build_report<R: Rng>(rng: &mut R, inputs: RiskInputs, win_rate: f64) -> RiskReport {
    let calc = calculate(inputs);
    let rules = risk_rules(inputs, calc.position_size);
    let simulation = simulate(rng, inputs.capital, inputs.risk_percent, win_rate, 500);
    let recommendations = recommendations(inputs, &rules, &simulation);

    RiskReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        scenario_analysis: scenario_analysis(&calc),
        risk_parameters: calc,
        risk_rules: rules,
        monte_carlo_simulation: simulation,
        recommendations,
    }
}

/// Export blob wrapping a full report.
pub fn export_report(report: &RiskReport) -> serde_json::Value {
    let payload = serde_json::to_value(report).unwrap_or_default();
    crate::persistence::export_blob("risk", payload)
}

/// Recompute the `risk` subtree whenever one of its inputs changes.
/// Writes only the derived leaves so the triggering input is untouched.
pub fn refresh_risk_panel(store: &Store) {
    let read = |path: &str| store.get(path).and_then(|v| v.as_f64());
    let inputs = RiskInputs {
        capital: read("risk.capital").unwrap_or(10_000.0),
        risk_percent: read("risk.riskPercent").unwrap_or(1.0),
        stop_loss: read("risk.stopLoss").unwrap_or(2.0),
    };
    if inputs.capital <= 0.0 || inputs.stop_loss <= 0.0 {
        warn!(
            capital = inputs.capital,
            stop_loss = inputs.stop_loss,
            "skipping risk recompute for degenerate inputs"
        );
        return;
    }

    let calc = calculate(inputs);
    let updates = [
        ("risk.riskAmount", json!(round_to(calc.risk_amount, 2))),
        ("risk.positionSize", json!(round_to(calc.position_size, 2))),
        ("risk.maxLoss", json!(round_to(calc.max_loss, 2))),
        ("risk.maxGain", json!(round_to(calc.max_gain, 2))),
        ("risk.riskScore", json!(calc.risk_score)),
        ("risk.warnings", json!(calc.warnings)),
    ];
    for (path, value) in updates {
        if let Err(e) = store.update(path, value) {
            warn!(path, error = %e, "risk panel write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn inputs(capital: f64, risk_percent: f64, stop_loss: f64) -> RiskInputs {
        RiskInputs {
            capital,
            risk_percent,
            stop_loss,
        }
    }

    #[test]
    fn test_default_panel_figures() {
        let calc = calculate(RiskInputs::default());
        // $10k at 1% risk with a 2% stop: $100 risked, $5000 position
        assert_eq!(calc.risk_amount, 100.0);
        assert_eq!(calc.position_size, 5000.0);
        assert_eq!(calc.max_loss, -100.0);
        assert_eq!(calc.max_gain, 200.0);
        assert_eq!(calc.risk_score, 20);
    }

    #[test]
    fn test_risk_score_multipliers() {
        // Base 2% -> 40 points
        assert_eq!(risk_score(inputs(10_000.0, 2.0, 2.0)), 40);
        // Wide stop: 40 * 1.2 = 48
        assert_eq!(risk_score(inputs(10_000.0, 2.0, 6.0)), 48);
        // Tight stop: 40 * 0.8 = 32
        assert_eq!(risk_score(inputs(10_000.0, 2.0, 0.5)), 32);
        // Small account: 40 * 1.1 = 44
        assert_eq!(risk_score(inputs(4_000.0, 2.0, 2.0)), 44);
        // Large account: 40 * 0.9 = 36
        assert_eq!(risk_score(inputs(60_000.0, 2.0, 2.0)), 36);
        // Clamped at 100
        assert_eq!(risk_score(inputs(4_000.0, 6.0, 8.0)), 100);
    }

    #[test]
    fn test_warning_order_and_pairing() {
        // 6% risk with 0.3% stop: both risk warnings fire, tight-stop
        // fires, and the huge implied position trips both size warnings
        let i = inputs(10_000.0, 6.0, 0.3);
        let calc = calculate(i);
        assert_eq!(
            calc.warnings,
            vec![
                "Risk per trade exceeds 2%",
                "Risk per trade is extremely high (>5%)",
                "Stop loss is very tight (<0.5%) - may result in frequent stops",
                "Position size exceeds 50% of capital - extremely high concentration risk",
                "Position size exceeds 25% of capital - high concentration risk",
            ]
        );
    }

    #[test]
    fn test_raising_risk_only_adds_warnings() {
        // $10k capital, 2% stop: going from 1% to 3% risk trips the 2%
        // warning while keeping everything that already fired
        let at = |risk_percent| {
            let i = inputs(10_000.0, risk_percent, 2.0);
            warnings(i, calculate(i).position_size)
        };
        let before = at(1.0);
        let after = at(3.0);

        assert!(!before.iter().any(|w| w.contains("exceeds 2%")));
        assert!(after.iter().any(|w| w.contains("exceeds 2%")));
        for warning in &before {
            assert!(after.contains(warning), "lost warning: {warning}");
        }
        assert!(after.len() > before.len());
    }

    #[test]
    fn test_no_warnings_for_conservative_inputs() {
        // 0.5% risk, 2% stop: position is $2500, exactly 25% (not over)
        let calc = calculate(inputs(10_000.0, 0.5, 2.0));
        assert!(calc.warnings.is_empty());
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_risk_percent(0.5), RiskLevel::Low);
        assert_eq!(RiskLevel::from_risk_percent(1.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_risk_percent(2.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_risk_percent(3.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_risk_percent(4.5), RiskLevel::Extreme);
        assert_eq!(RiskLevel::Extreme.label(), "Extreme Risk");
    }

    #[test]
    fn test_quick_assessment_acceptable_trade() {
        // Long 1 BTC-sized unit: entry 100, stop 98, target 106
        let qa = quick_assessment(10_000.0, 100.0, 98.0, 106.0, 1.0);
        assert_eq!(qa.risk_amount, 2.0);
        assert_eq!(qa.stop_loss_distance, 2.0);
        assert_eq!(qa.target_distance, 6.0);
        assert_eq!(qa.risk_reward_ratio, 3.0);
        assert!(qa.is_acceptable);
    }

    #[test]
    fn test_quick_assessment_flags_poor_ratio() {
        // Target closer than stop: R:R below 1
        let qa = quick_assessment(10_000.0, 100.0, 95.0, 102.0, 1.0);
        assert!(qa.risk_reward_ratio < 1.0);
        assert!(!qa.is_acceptable);
        assert!(qa.warnings.iter().any(|w| w.contains("less than 1:1")));
    }

    #[test]
    fn test_optimal_position_size() {
        let opt = optimal_position_size(10_000.0, 1.0, 100.0, 98.0);
        // $100 budget over $2/unit of risk = 50 units = $5000 position
        assert_eq!(opt.optimal_size, 50.0);
        assert_eq!(opt.position_value, 5000.0);
        assert!(opt.message.starts_with("Warning"));
    }

    #[test]
    fn test_optimal_position_degenerate_stop() {
        let opt = optimal_position_size(10_000.0, 1.0, 100.0, 100.0);
        assert_eq!(opt.optimal_size, 0.0);
        assert_eq!(opt.message, "Invalid stop loss - same as entry price");
    }

    #[test]
    fn test_portfolio_risk_aggregation() {
        let positions = [
            OpenPosition {
                size: 5_000.0,
                stop_loss: 2.0,
            },
            OpenPosition {
                size: 2_000.0,
                stop_loss: 5.0,
            },
        ];
        let pr = portfolio_risk(10_000.0, &positions);
        assert_eq!(pr.total_risk, 200.0);
        assert_eq!(pr.portfolio_risk_percent, 2.0);
        assert_eq!(pr.concentration_risk, 50.0);
        assert!(pr.warnings.is_empty());
    }

    #[test]
    fn test_portfolio_concentration_warning() {
        // One $80k position with a 3% stop on $10k capital: $2400 at
        // risk, 24% of capital, all of it in a single position
        let positions = [OpenPosition {
            size: 80_000.0,
            stop_loss: 3.0,
        }];
        let pr = portfolio_risk(10_000.0, &positions);
        assert_eq!(pr.total_risk, 2400.0);
        assert_eq!(pr.portfolio_risk_percent, 24.0);
        assert_eq!(pr.concentration_risk, 100.0);
        assert!(pr.warnings.iter().any(|w| w.contains("exceeds 10%")));
        assert!(pr
            .warnings
            .iter()
            .any(|w| w.contains("dangerously high")));
        assert!(pr.warnings.iter().any(|w| w.contains(">75%")));
    }

    #[test]
    fn test_position_units_formatting() {
        assert_eq!(position_units(MarketKey::BTC, 5000.0, 65000.0), "0.0769 BTC");
        assert_eq!(position_units(MarketKey::GOLD, 5000.0, 2345.67), "2.132 oz");
        assert_eq!(
            position_units(MarketKey::NIFTY, 50000.0, 22450.0),
            "2 contracts"
        );
        assert_eq!(position_units(MarketKey::BTC, 0.0, 65000.0), "0 units");
    }

    #[test]
    fn test_rules_reflect_inputs() {
        let calc = calculate(inputs(10_000.0, 1.5, 6.0));
        let rules = risk_rules(inputs(10_000.0, 1.5, 6.0), calc.position_size);
        assert_eq!(rules[0].status, RuleStatus::Violated); // 1% rule
        assert_eq!(rules[1].status, RuleStatus::Compliant); // 2% rule
        assert_eq!(rules[2].status, RuleStatus::Violated); // 5% stop
        assert_eq!(rules[3].status, RuleStatus::Checking);
    }

    #[test]
    fn test_report_build() {
        let mut rng = StdRng::seed_from_u64(3);
        let report = build_report(&mut rng, RiskInputs::default(), 0.6);
        assert_eq!(report.scenario_analysis.len(), 3);
        assert_eq!(report.risk_rules.len(), 5);
        assert_eq!(report.monte_carlo_simulation.iterations, 500);
        // Conservative defaults earn the positive recommendation
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.action == "Maintain current approach"));
    }

    #[test]
    fn test_refresh_risk_panel_writes_derived_leaves() {
        let store = Store::new();
        store
            .update("risk.capital", json!(20_000.0))
            .unwrap();
        refresh_risk_panel(&store);
        assert_eq!(store.get("risk.riskAmount"), Some(json!(200.0)));
        assert_eq!(store.get("risk.positionSize"), Some(json!(10_000.0)));
        assert_eq!(store.get("risk.riskScore"), Some(json!(20)));
        // The input leaf is untouched
        assert_eq!(store.get("risk.capital"), Some(json!(20_000.0)));
    }

    #[test]
    fn test_report_export_blob() {
        let mut rng = StdRng::seed_from_u64(3);
        let report = build_report(&mut rng, RiskInputs::default(), 0.6);
        let blob = export_report(&report);
        assert_eq!(blob["kind"], "risk");
        assert_eq!(blob["data"]["riskRules"].as_array().unwrap().len(), 5);
    }
}
