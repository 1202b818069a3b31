//! Smart allocation of a cash contribution over the portfolio.
//!
//! Two greedy phases run over already-fetched assets. Rebalancing first closes
//! target gaps, largest gap first, under a global spending cap. Expansion then
//! spreads part of the remaining cash over high-score assets without a gap,
//! limited per asset.

use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    aflerr,
    core_types::AflResult,
    format::format_money,
    model::Asset,
};

const REBALANCE_CAP_LARGE: f64 = 0.50;
const REBALANCE_CAP_SMALL: f64 = 0.70;
const LARGE_AMOUNT: f64 = 10000.0;
const EXPANSION_CAP: f64 = 0.05;
const MIN_SCORE: f64 = 40.0;
const MIN_CASH_TO_EXPAND: f64 = 100.0;
const MIN_CASH_STOP: f64 = 50.0;
const HIGH_LEFTOVER_FRACTION: f64 = 0.05;
const HIGH_LEFTOVER_MIN: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Fraction of the amount that rebalancing may spend in total.
    pub rebalance_global_cap: f64,
    /// Fraction of the amount that expansion may spend per asset.
    pub expansion_cap: f64,
    pub min_score: f64,
    pub min_cash_to_expand: f64,
    pub min_cash_stop: f64,
}
impl AllocationPolicy {
    pub fn for_amount(amount: f64) -> Self {
        AllocationPolicy {
            rebalance_global_cap: if amount > LARGE_AMOUNT {
                REBALANCE_CAP_LARGE
            } else {
                REBALANCE_CAP_SMALL
            },
            expansion_cap: EXPANSION_CAP,
            min_score: MIN_SCORE,
            min_cash_to_expand: MIN_CASH_TO_EXPAND,
            min_cash_stop: MIN_CASH_STOP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseKind {
    Rebalance,
    Expansion,
}
impl Display for PurchaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseKind::Rebalance => f.write_str("Rebalanceamento"),
            PurchaseKind::Expansion => f.write_str("Expansão"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub ticker: String,
    pub tipo: String,
    pub score: f64,
    pub kind: PurchaseKind,
    pub quantity: u64,
    pub unit_price: f64,
    pub cost: f64,
    /// Share of the open gap this purchase covers, only for assets with a gap.
    pub gap_impact_pct: Option<f64>,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub amount: f64,
    pub policy: AllocationPolicy,
    pub purchases: Vec<Purchase>,
    pub rebalance_spent: f64,
}
impl AllocationPlan {
    pub fn total_allocated(&self) -> f64 {
        self.purchases.iter().map(|p| p.cost).sum()
    }

    /// Cash that stays uninvested.
    pub fn leftover(&self) -> f64 {
        self.amount - self.total_allocated()
    }

    pub fn is_high_leftover(&self) -> bool {
        let leftover = self.leftover();
        leftover > self.amount * HIGH_LEFTOVER_FRACTION && leftover > HIGH_LEFTOVER_MIN
    }
}

/// Parses user input like `R$ 1.234,56` where `.` groups thousands and `,` is the decimal mark.
/// Anything unparsable yields 0.
pub fn parse_currency(s: &str) -> f64 {
    let clean = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect::<String>()
        .replacen(',', ".", 1);
    match clean.parse::<f64>() {
        Ok(x) if x.is_finite() => x,
        _ => 0.0,
    }
}

/// Whole shares of `price` that fit into `budget` without exceeding it.
fn whole_shares(budget: f64, price: f64) -> u64 {
    if budget.is_nan() || budget < price {
        return 0;
    }
    let mut shares = (budget / price).floor() as u64;
    while shares > 0 && shares as f64 * price > budget {
        shares -= 1;
    }
    shares
}

fn is_valid(asset: &Asset) -> bool {
    asset.preco_atual.is_finite() && asset.preco_atual > 0.0
}

fn gap_impact(cost: f64, gap: f64) -> f64 {
    (cost / gap * 100.0).min(100.0)
}

fn rebalance(
    assets: &[&Asset],
    cash: &mut f64,
    policy: &AllocationPolicy,
    amount: f64,
    planned: &mut HashSet<String>,
) -> (Vec<Purchase>, f64) {
    let max_rebalance = amount * policy.rebalance_global_cap;
    let mut spent = 0.0;
    let mut candidates = assets
        .iter()
        .filter(|a| a.falta_comprar > 0.0)
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.falta_comprar.total_cmp(&a.falta_comprar));

    let mut purchases = vec![];
    for asset in candidates {
        let price = asset.preco_atual;
        if *cash < price || planned.contains(&asset.ticker) {
            continue;
        }
        let remaining_budget = (max_rebalance - spent).max(0.0);
        if remaining_budget < price {
            tracing::debug!(ticker = %asset.ticker, remaining_budget, "rebalance cap reached");
            break;
        }
        let to_fill_gap = (asset.falta_comprar / price).ceil() as u64;
        let affordable = whole_shares(*cash, price);
        let within_cap = whole_shares(remaining_budget, price);
        let quantity = to_fill_gap.min(affordable).min(within_cap);
        if quantity == 0 {
            continue;
        }
        let cost = quantity as f64 * price;
        let impact = gap_impact(cost, asset.falta_comprar);
        let mut rationale = vec![format!(
            "Meta em aberto: {}",
            format_money(asset.falta_comprar)
        )];
        if impact >= 99.0 {
            rationale.push("Meta totalmente atingida".to_string());
        } else {
            rationale.push(format!("Cobre {impact:.0}% do gap atual"));
        }
        if within_cap < to_fill_gap && within_cap < affordable {
            rationale.push(format!(
                "Travado pelo teto de rebalanceamento ({:.0}%)",
                policy.rebalance_global_cap * 100.0
            ));
        }
        *cash -= cost;
        spent += cost;
        planned.insert(asset.ticker.clone());
        purchases.push(Purchase {
            ticker: asset.ticker.clone(),
            tipo: asset.tipo.clone(),
            score: asset.score,
            kind: PurchaseKind::Rebalance,
            quantity,
            unit_price: price,
            cost,
            gap_impact_pct: Some(impact),
            rationale,
        });
    }
    (purchases, spent)
}

fn is_expansion_candidate(asset: &Asset, policy: &AllocationPolicy) -> bool {
    let below_graham = match asset.vi_graham {
        Some(vi) if vi > 0.0 => asset.preco_atual < vi,
        _ => true,
    };
    asset.falta_comprar <= 0.0 && asset.score >= policy.min_score && below_graham
}

fn expand(
    assets: &[&Asset],
    cash: &mut f64,
    policy: &AllocationPolicy,
    amount: f64,
    planned: &mut HashSet<String>,
) -> Vec<Purchase> {
    let mut purchases = vec![];
    if *cash <= policy.min_cash_to_expand {
        return purchases;
    }
    let max_per_asset = amount * policy.expansion_cap;
    let mut candidates = assets
        .iter()
        .filter(|a| is_expansion_candidate(a, policy))
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    for asset in candidates {
        let price = asset.preco_atual;
        if *cash < price || planned.contains(&asset.ticker) {
            continue;
        }
        let affordable = whole_shares(*cash, price);
        let within_cap = whole_shares(max_per_asset, price);
        let quantity = affordable.min(within_cap);
        if quantity > 0 {
            let cost = quantity as f64 * price;
            let mut rationale = vec![format!("Score de qualidade: {}", asset.score)];
            if let Some(vi) = asset.vi_graham.filter(|vi| *vi > 0.0 && price < *vi) {
                rationale.push(format!("Abaixo do V.I. Graham ({})", format_money(vi)));
            }
            if within_cap < affordable {
                rationale.push(format!(
                    "Pulverização forçada (máx. {:.0}%)",
                    policy.expansion_cap * 100.0
                ));
            }
            *cash -= cost;
            planned.insert(asset.ticker.clone());
            purchases.push(Purchase {
                ticker: asset.ticker.clone(),
                tipo: asset.tipo.clone(),
                score: asset.score,
                kind: PurchaseKind::Expansion,
                quantity,
                unit_price: price,
                cost,
                gap_impact_pct: None,
                rationale,
            });
        }
        if *cash < policy.min_cash_stop {
            break;
        }
    }
    purchases
}

/// Plans the purchase of whole shares for `amount` of fresh cash.
pub fn simulate(amount: f64, assets: &[Asset]) -> AflResult<AllocationPlan> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(aflerr!("amount needs to be a positive number, got {amount}"));
    }
    let policy = AllocationPolicy::for_amount(amount);
    let valid = assets.iter().filter(|a| is_valid(a)).collect::<Vec<_>>();
    let mut cash = amount;
    let mut planned = HashSet::new();

    let (mut purchases, rebalance_spent) =
        rebalance(&valid, &mut cash, &policy, amount, &mut planned);
    purchases.extend(expand(&valid, &mut cash, &policy, amount, &mut planned));

    // rebalance first, then most expensive first
    purchases.sort_by(|a, b| match (a.kind, b.kind) {
        (PurchaseKind::Rebalance, PurchaseKind::Expansion) => std::cmp::Ordering::Less,
        (PurchaseKind::Expansion, PurchaseKind::Rebalance) => std::cmp::Ordering::Greater,
        _ => b.cost.total_cmp(&a.cost),
    });
    tracing::info!(
        amount,
        n_orders = purchases.len(),
        rebalance_spent,
        leftover = cash,
        "allocation simulated"
    );
    Ok(AllocationPlan {
        amount,
        policy,
        purchases,
        rebalance_spent,
    })
}

#[cfg(test)]
fn asset(ticker: &str, price: f64, gap: f64, score: f64, vi_graham: Option<f64>) -> Asset {
    Asset {
        ticker: ticker.to_string(),
        tipo: "Ação".to_string(),
        preco_atual: price,
        falta_comprar: gap,
        score,
        vi_graham,
        ..Default::default()
    }
}

#[cfg(test)]
fn assert_f(x: f64, reference: f64) {
    assert!((x - reference).abs() < 1e-9, "{x} != {reference}");
}

#[test]
fn test_parse_currency() {
    assert_f(parse_currency("1.234,56"), 1234.56);
    assert_f(parse_currency("R$ 10.000"), 10000.0);
    assert_f(parse_currency("500"), 500.0);
    assert_f(parse_currency(",5"), 0.5);
    assert_f(parse_currency(""), 0.0);
    assert_f(parse_currency("abc"), 0.0);
    assert_f(parse_currency("1,2,3"), 0.0);
}

#[test]
fn test_whole_shares() {
    assert_eq!(whole_shares(1000.0, 100.0), 10);
    assert_eq!(whole_shares(999.99, 100.0), 9);
    assert_eq!(whole_shares(99.0, 100.0), 0);
    assert_eq!(whole_shares(0.3, 0.1), 2);
    assert_eq!(whole_shares(f64::NAN, 1.0), 0);
}

#[test]
fn test_policy() {
    assert_f(AllocationPolicy::for_amount(10000.0).rebalance_global_cap, 0.7);
    assert_f(AllocationPolicy::for_amount(10000.01).rebalance_global_cap, 0.5);
}

#[test]
fn test_single_gap_limited() {
    let plan = simulate(10000.0, &[asset("ITSA4", 100.0, 5000.0, 50.0, None)]).unwrap();
    assert_eq!(plan.purchases.len(), 1);
    let p = &plan.purchases[0];
    assert_eq!(p.quantity, 50);
    assert_eq!(p.kind, PurchaseKind::Rebalance);
    assert_f(p.cost, 5000.0);
    assert_f(plan.leftover(), 5000.0);
    assert_eq!(p.rationale[1], "Meta totalmente atingida");
    assert!(plan.is_high_leftover());
}

#[test]
fn test_rebalance_cap_binds() {
    // 20000 > 10000, cap is 50% = 10000
    let plan = simulate(20000.0, &[asset("BBAS3", 100.0, 50000.0, 50.0, None)]).unwrap();
    let p = &plan.purchases[0];
    assert_eq!(p.quantity, 100);
    assert_f(plan.rebalance_spent, 10000.0);
    assert_f(p.gap_impact_pct.unwrap(), 20.0);
    assert_eq!(p.rationale[1], "Cobre 20% do gap atual");
    assert_eq!(p.rationale[2], "Travado pelo teto de rebalanceamento (50%)");
}

#[test]
fn test_rebalance_order_and_stop() {
    let assets = [
        asset("SMALL", 10.0, 100.0, 10.0, None),
        asset("BIG", 100.0, 650.0, 10.0, None),
    ];
    // cap is 70% of 1000 = 700; BIG takes 7 shares (gap needs 7) = 700, then the budget is gone
    let plan = simulate(1000.0, &assets).unwrap();
    assert_eq!(plan.purchases.len(), 1);
    assert_eq!(plan.purchases[0].ticker, "BIG");
    assert_eq!(plan.purchases[0].quantity, 7);
    assert_f(plan.leftover(), 300.0);
}

#[test]
fn test_expansion() {
    let assets = [
        asset("GAP", 10.0, 100.0, 0.0, None),
        asset("LOW", 10.0, 0.0, 39.0, None),
        asset("DEAR", 50.0, 0.0, 90.0, Some(40.0)),
        asset("GOOD", 30.0, -10.0, 80.0, Some(60.0)),
        asset("NOVI", 20.0, 0.0, 60.0, None),
    ];
    let plan = simulate(10000.0, &assets).unwrap();
    let tickers = plan
        .purchases
        .iter()
        .map(|p| p.ticker.as_str())
        .collect::<Vec<_>>();
    // rebalance first, then expansion by cost
    assert_eq!(tickers, vec!["GAP", "NOVI", "GOOD"]);
    let good = &plan.purchases[2];
    assert_eq!(good.kind, PurchaseKind::Expansion);
    // 5% of 10000 = 500, 16 shares at 30
    assert_eq!(good.quantity, 16);
    assert_eq!(good.gap_impact_pct, None);
    assert_eq!(good.rationale[0], "Score de qualidade: 80");
    assert_eq!(good.rationale[1], "Abaixo do V.I. Graham (R$ 60,00)");
    assert_eq!(good.rationale[2], "Pulverização forçada (máx. 5%)");
    assert_eq!(plan.purchases[1].quantity, 25);
}

#[test]
fn test_expansion_needs_cash() {
    // rebalancing leaves 30, not enough to start expanding
    let assets = [
        asset("GAP", 10.0, 70.0, 0.0, None),
        asset("NICE", 1.0, 0.0, 99.0, None),
    ];
    let plan = simulate(100.0, &assets).unwrap();
    assert_eq!(plan.purchases.len(), 1);
    assert_eq!(plan.purchases[0].quantity, 7);
    assert!(!plan.is_high_leftover());
    let plan = simulate(300.0, &[asset("NICE", 1.0, 0.0, 99.0, None)]).unwrap();
    assert_eq!(plan.purchases[0].quantity, 15);
}

#[test]
fn test_invalid_input() {
    assert!(simulate(0.0, &[]).is_err());
    assert!(simulate(-5.0, &[]).is_err());
    assert!(simulate(f64::NAN, &[]).is_err());
    let plan = simulate(
        1000.0,
        &[
            asset("ZERO", 0.0, 500.0, 90.0, None),
            asset("NAN", f64::NAN, 500.0, 90.0, None),
        ],
    )
    .unwrap();
    assert!(plan.purchases.is_empty());
}

#[test]
fn test_duplicate_tickers() {
    let assets = [
        asset("DUP", 10.0, 100.0, 50.0, None),
        asset("DUP", 10.0, 90.0, 50.0, None),
    ];
    let plan = simulate(1000.0, &assets).unwrap();
    assert_eq!(plan.purchases.len(), 1);
}

#[test]
fn test_random_invariants() {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let amount = rng.random_range(1.0..60000.0);
        let n_assets = rng.random_range(0..15);
        let assets = (0..n_assets)
            .map(|i| {
                let gap = if rng.random_bool(0.5) {
                    rng.random_range(0.0..20000.0)
                } else {
                    -rng.random_range(0.0..1000.0)
                };
                let vi = if rng.random_bool(0.5) {
                    Some(rng.random_range(0.0..600.0))
                } else {
                    None
                };
                asset(
                    &format!("T{i}"),
                    rng.random_range(0.01..2000.0),
                    gap,
                    rng.random_range(0.0..100.0),
                    vi,
                )
            })
            .collect::<Vec<_>>();
        let plan = simulate(amount, &assets).unwrap();
        let tol = 1e-9 * amount;

        assert!(plan.total_allocated() <= amount + tol);
        assert!(plan.leftover() >= -tol);
        assert!(plan.rebalance_spent <= amount * plan.policy.rebalance_global_cap + tol);
        for p in plan.purchases.iter() {
            assert!(p.quantity > 0);
            if p.kind == PurchaseKind::Expansion {
                assert!(p.cost <= amount * 0.05 + tol);
            }
        }
        let tickers = plan
            .purchases
            .iter()
            .map(|p| p.ticker.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(tickers.len(), plan.purchases.len());

        if assets.iter().all(|a| a.preco_atual > amount) {
            assert!(plan.purchases.is_empty());
            assert_f(plan.leftover(), amount);
        }
    }
}
