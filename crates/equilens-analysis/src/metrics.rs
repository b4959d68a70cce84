//! Standardized ratio derivation from normalized statement records
//!
//! Pure functions, no I/O. Every ratio follows one omission policy: if the
//! denominator is missing, zero or negative, the ratio is left out of the
//! result map entirely. Absence means "not computable"; stages render it as
//! data unavailable instead of a false zero. Ratios named `*_margin`,
//! `roe`, `roa`, `debt_to_assets` and the growth rates are percentages
//! (fraction times 100); `debt_to_equity` and `current_ratio` are plain
//! ratios.

use crate::data::{fields, CompanyProfile, FinancialDataBundle, PeriodRecord, PricePoint};
use serde::Serialize;
use std::collections::BTreeMap;

/// Canonical ratio keys
pub mod ratios {
    pub const ROE: &str = "roe";
    pub const ROA: &str = "roa";
    pub const NET_PROFIT_MARGIN: &str = "net_profit_margin";
    pub const GROSS_PROFIT_MARGIN: &str = "gross_profit_margin";
    pub const DEBT_TO_ASSETS: &str = "debt_to_assets";
    pub const DEBT_TO_EQUITY: &str = "debt_to_equity";
    pub const CURRENT_RATIO: &str = "current_ratio";
    pub const REVENUE_GROWTH: &str = "revenue_growth";
    pub const PROFIT_GROWTH: &str = "profit_growth";

    pub const LATEST_CLOSE: &str = "latest_close";
    pub const PERIOD_HIGH: &str = "period_high";
    pub const PERIOD_LOW: &str = "period_low";
    pub const PRICE_CHANGE_PCT: &str = "price_change_pct";
    pub const EPS: &str = "eps";
    pub const PE_RATIO: &str = "pe_ratio";
    pub const BOOK_VALUE_PER_SHARE: &str = "book_value_per_share";
    pub const PB_RATIO: &str = "pb_ratio";
}

/// A named set of computed ratios
pub type RatioMap = BTreeMap<String, f64>;

/// The three ratio groups computed from financial statements
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinancialRatios {
    pub profitability: RatioMap,
    pub solvency: RatioMap,
    pub growth: RatioMap,
}

impl FinancialRatios {
    pub fn is_empty(&self) -> bool {
        self.profitability.is_empty() && self.solvency.is_empty() && self.growth.is_empty()
    }
}

/// Compute all three statement-derived ratio groups
pub fn financial_ratios(bundle: &FinancialDataBundle) -> FinancialRatios {
    FinancialRatios {
        profitability: profitability_ratios(bundle.latest_income(), bundle.latest_balance()),
        solvency: solvency_ratios(bundle.latest_balance()),
        growth: growth_ratios(&bundle.income_statement),
    }
}

/// Profitability ratios from the most recent income statement and balance
/// sheet periods
pub fn profitability_ratios(
    income: Option<&PeriodRecord>,
    balance: Option<&PeriodRecord>,
) -> RatioMap {
    let mut out = RatioMap::new();

    let net_income = income.and_then(|r| r.get(fields::NET_INCOME));
    let revenue = income.and_then(|r| r.get(fields::TOTAL_REVENUE));
    let equity = balance.and_then(|r| r.get(fields::SHAREHOLDERS_EQUITY));
    let assets = balance.and_then(|r| r.get(fields::TOTAL_ASSETS));

    put(&mut out, ratios::ROE, percent_of(net_income, equity));
    put(&mut out, ratios::ROA, percent_of(net_income, assets));
    put(&mut out, ratios::NET_PROFIT_MARGIN, percent_of(net_income, revenue));

    // Gross margin prefers revenue minus cost of revenue; falls back to a
    // reported gross profit when the cost line is absent.
    let gross = match income.and_then(|r| r.get(fields::COST_OF_REVENUE)) {
        Some(cogs) => revenue.map(|rev| rev - cogs),
        None => income.and_then(|r| r.get(fields::GROSS_PROFIT)),
    };
    put(&mut out, ratios::GROSS_PROFIT_MARGIN, percent_of(gross, revenue));

    out
}

/// Solvency ratios from the most recent balance sheet period
pub fn solvency_ratios(balance: Option<&PeriodRecord>) -> RatioMap {
    let mut out = RatioMap::new();

    let liabilities = balance.and_then(|r| r.get(fields::TOTAL_LIABILITIES));
    let assets = balance.and_then(|r| r.get(fields::TOTAL_ASSETS));
    let equity = balance.and_then(|r| r.get(fields::SHAREHOLDERS_EQUITY));

    put(&mut out, ratios::DEBT_TO_ASSETS, percent_of(liabilities, assets));
    put(&mut out, ratios::DEBT_TO_EQUITY, ratio_of(liabilities, equity));
    // Simplified liquidity proxy over total positions
    put(&mut out, ratios::CURRENT_RATIO, ratio_of(assets, liabilities));

    out
}

/// Growth ratios over the two most recent income statement periods
///
/// Records are most-recent-first; fewer than two periods yields an empty
/// map.
pub fn growth_ratios(income_periods: &[PeriodRecord]) -> RatioMap {
    let mut out = RatioMap::new();

    let (Some(current), Some(prior)) = (income_periods.first(), income_periods.get(1)) else {
        return out;
    };

    let revenue_change = match (
        current.get(fields::TOTAL_REVENUE),
        prior.get(fields::TOTAL_REVENUE),
    ) {
        (Some(cur), Some(prev)) => percent_of(Some(cur - prev), Some(prev)),
        _ => None,
    };
    put(&mut out, ratios::REVENUE_GROWTH, revenue_change);

    let profit_change = match (
        current.get(fields::NET_INCOME),
        prior.get(fields::NET_INCOME),
    ) {
        (Some(cur), Some(prev)) => percent_of(Some(cur - prev), Some(prev)),
        _ => None,
    };
    put(&mut out, ratios::PROFIT_GROWTH, profit_change);

    out
}

/// Valuation metrics from a chronological price window plus statements
/// and, when available, the company profile
pub fn valuation_metrics(
    prices: &[PricePoint],
    bundle: &FinancialDataBundle,
    profile: Option<&CompanyProfile>,
) -> RatioMap {
    let mut out = RatioMap::new();

    let Some(latest) = prices.last() else {
        return out;
    };
    let first = &prices[0];

    out.insert(ratios::LATEST_CLOSE.to_string(), latest.close);
    if let Some(high) = prices.iter().map(|p| p.high).reduce(f64::max) {
        out.insert(ratios::PERIOD_HIGH.to_string(), high);
    }
    if let Some(low) = prices.iter().map(|p| p.low).reduce(f64::min) {
        out.insert(ratios::PERIOD_LOW.to_string(), low);
    }
    put(
        &mut out,
        ratios::PRICE_CHANGE_PCT,
        percent_of(Some(latest.close - first.close), Some(first.close)),
    );

    let net_income = bundle.latest_income().and_then(|r| r.get(fields::NET_INCOME));
    let equity = bundle
        .latest_balance()
        .and_then(|r| r.get(fields::SHAREHOLDERS_EQUITY));
    let shares = profile.and_then(|p| p.shares_outstanding);

    let eps = ratio_of(net_income, shares);
    put(&mut out, ratios::EPS, eps);
    put(&mut out, ratios::PE_RATIO, ratio_of(Some(latest.close), eps));

    let bvps = ratio_of(equity, shares);
    put(&mut out, ratios::BOOK_VALUE_PER_SHARE, bvps);
    put(&mut out, ratios::PB_RATIO, ratio_of(Some(latest.close), bvps));

    out
}

/// numerator / denominator * 100, only for a strictly positive denominator
fn percent_of(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    ratio_of(numerator, denominator).map(|r| r * 100.0)
}

/// numerator / denominator, only for a strictly positive denominator
fn ratio_of(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(num), Some(den)) if den > 0.0 => Some(num / den),
        _ => None,
    }
}

fn put(map: &mut RatioMap, key: &str, value: Option<f64>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn income(period: &str, revenue: Option<f64>, net: Option<f64>) -> PeriodRecord {
        PeriodRecord::new(period)
            .with(fields::TOTAL_REVENUE, revenue)
            .with(fields::NET_INCOME, net)
    }

    fn balance(assets: Option<f64>, liabilities: Option<f64>, equity: Option<f64>) -> PeriodRecord {
        PeriodRecord::new("2023-12-31")
            .with(fields::TOTAL_ASSETS, assets)
            .with(fields::TOTAL_LIABILITIES, liabilities)
            .with(fields::SHAREHOLDERS_EQUITY, equity)
    }

    fn bar(date: (i32, u32, u32), close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            open: close,
            high: close * 1.02,
            low: close * 0.98,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn test_roe_omitted_for_zero_equity() {
        let inc = income("2023-12-31", Some(500.0), Some(80.0));
        let bal = balance(Some(1_000.0), Some(400.0), Some(0.0));

        let out = profitability_ratios(Some(&inc), Some(&bal));
        assert!(!out.contains_key(ratios::ROE));
        // Other ratios are unaffected by the bad denominator
        assert!(out.contains_key(ratios::ROA));
    }

    #[test]
    fn test_roe_omitted_for_negative_equity() {
        let inc = income("2023-12-31", Some(500.0), Some(80.0));
        let bal = balance(Some(1_000.0), Some(1_200.0), Some(-200.0));

        let out = profitability_ratios(Some(&inc), Some(&bal));
        assert!(!out.contains_key(ratios::ROE));
    }

    #[test]
    fn test_roe_omitted_for_missing_inputs() {
        let inc = income("2023-12-31", Some(500.0), None);
        let bal = balance(Some(1_000.0), Some(400.0), Some(600.0));

        let out = profitability_ratios(Some(&inc), Some(&bal));
        assert!(!out.contains_key(ratios::ROE));

        let out = profitability_ratios(None, None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_profitability_values() {
        let inc = income("2023-12-31", Some(1_000.0), Some(150.0))
            .with(fields::COST_OF_REVENUE, Some(600.0));
        let bal = balance(Some(2_000.0), Some(800.0), Some(1_200.0));

        let out = profitability_ratios(Some(&inc), Some(&bal));
        assert_eq!(out[ratios::ROE], 12.5);
        assert_eq!(out[ratios::ROA], 7.5);
        assert_eq!(out[ratios::NET_PROFIT_MARGIN], 15.0);
        assert_eq!(out[ratios::GROSS_PROFIT_MARGIN], 40.0);
    }

    #[test]
    fn test_gross_margin_falls_back_to_reported_gross_profit() {
        let inc = income("2023-12-31", Some(1_000.0), Some(150.0))
            .with(fields::GROSS_PROFIT, Some(400.0));

        let out = profitability_ratios(Some(&inc), None);
        assert_eq!(out[ratios::GROSS_PROFIT_MARGIN], 40.0);

        // Neither cost of revenue nor gross profit: omitted
        let inc = income("2023-12-31", Some(1_000.0), Some(150.0));
        let out = profitability_ratios(Some(&inc), None);
        assert!(!out.contains_key(ratios::GROSS_PROFIT_MARGIN));
    }

    #[test]
    fn test_solvency_mixes_percent_and_plain_ratios() {
        let bal = balance(Some(2_000.0), Some(800.0), Some(1_200.0));
        let out = solvency_ratios(Some(&bal));

        assert_eq!(out[ratios::DEBT_TO_ASSETS], 40.0);
        assert!((out[ratios::DEBT_TO_EQUITY] - 0.666_666_666_666).abs() < 1e-9);
        assert_eq!(out[ratios::CURRENT_RATIO], 2.5);
    }

    #[test]
    fn test_growth_needs_two_periods() {
        let single = vec![income("2023-12-31", Some(110.0), Some(20.0))];
        assert!(growth_ratios(&single).is_empty());
        assert!(growth_ratios(&[]).is_empty());
    }

    #[test]
    fn test_growth_ten_percent() {
        let periods = vec![
            income("2023-12-31", Some(110.0), Some(22.0)),
            income("2022-12-31", Some(100.0), Some(20.0)),
        ];
        let out = growth_ratios(&periods);
        assert!((out[ratios::REVENUE_GROWTH] - 10.0).abs() < 1e-9);
        assert!((out[ratios::PROFIT_GROWTH] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_omitted_for_nonpositive_prior() {
        let periods = vec![
            income("2023-12-31", Some(110.0), Some(22.0)),
            income("2022-12-31", Some(0.0), Some(-5.0)),
        ];
        let out = growth_ratios(&periods);
        assert!(!out.contains_key(ratios::REVENUE_GROWTH));
        assert!(!out.contains_key(ratios::PROFIT_GROWTH));
    }

    #[test]
    fn test_negative_growth_is_still_reported() {
        let periods = vec![
            income("2023-12-31", Some(90.0), Some(18.0)),
            income("2022-12-31", Some(100.0), Some(20.0)),
        ];
        let out = growth_ratios(&periods);
        assert!((out[ratios::REVENUE_GROWTH] + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_valuation_from_prices_only() {
        let prices = vec![bar((2023, 6, 1), 100.0), bar((2023, 12, 1), 120.0)];
        let out = valuation_metrics(&prices, &FinancialDataBundle::default(), None);

        assert_eq!(out[ratios::LATEST_CLOSE], 120.0);
        assert!((out[ratios::PRICE_CHANGE_PCT] - 20.0).abs() < 1e-9);
        assert!(out.contains_key(ratios::PERIOD_HIGH));
        assert!(out.contains_key(ratios::PERIOD_LOW));
        // No shares outstanding: per-share metrics omitted
        assert!(!out.contains_key(ratios::PE_RATIO));
        assert!(!out.contains_key(ratios::PB_RATIO));
    }

    #[test]
    fn test_valuation_per_share_metrics() {
        let prices = vec![bar((2023, 6, 1), 100.0), bar((2023, 12, 1), 120.0)];
        let bundle = FinancialDataBundle {
            income_statement: vec![income("2023-12-31", Some(1_000.0), Some(200.0))],
            balance_sheet: vec![balance(Some(2_000.0), Some(800.0), Some(1_200.0))],
            ..Default::default()
        };
        let profile = CompanyProfile {
            shares_outstanding: Some(100.0),
            ..CompanyProfile::new("TEST")
        };

        let out = valuation_metrics(&prices, &bundle, Some(&profile));
        assert_eq!(out[ratios::EPS], 2.0);
        assert_eq!(out[ratios::PE_RATIO], 60.0);
        assert_eq!(out[ratios::BOOK_VALUE_PER_SHARE], 12.0);
        assert_eq!(out[ratios::PB_RATIO], 10.0);
    }

    #[test]
    fn test_valuation_pe_omitted_for_negative_eps() {
        let prices = vec![bar((2023, 12, 1), 120.0)];
        let bundle = FinancialDataBundle {
            income_statement: vec![income("2023-12-31", Some(1_000.0), Some(-200.0))],
            ..Default::default()
        };
        let profile = CompanyProfile {
            shares_outstanding: Some(100.0),
            ..CompanyProfile::new("TEST")
        };

        let out = valuation_metrics(&prices, &bundle, Some(&profile));
        assert_eq!(out[ratios::EPS], -2.0);
        assert!(!out.contains_key(ratios::PE_RATIO));
    }

    #[test]
    fn test_valuation_empty_prices() {
        assert!(valuation_metrics(&[], &FinancialDataBundle::default(), None).is_empty());
    }
}
