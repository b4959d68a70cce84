//! User prompt builders for the analysis stages
//!
//! Each builder assembles the structured context one stage hands to the
//! text generator: ticker, date, depth guidance and the computed figures
//! serialized as JSON. The generator is told to work strictly from these
//! figures, so they are embedded verbatim rather than paraphrased.

use crate::data::CompanyProfile;
use crate::metrics::{FinancialRatios, RatioMap};
use crate::state::Depth;
use chrono::NaiveDate;
use std::fmt::Write;

/// How much output each depth asks for
pub fn depth_guidance(depth: Depth) -> &'static str {
    match depth {
        Depth::Basic => {
            "Keep the analysis brief: two or three focused paragraphs covering only the most important points."
        }
        Depth::Standard => {
            "Provide a standard analysis: four to six paragraphs with clear reasoning."
        }
        Depth::Comprehensive => {
            "Provide a comprehensive analysis with detailed sections covering every available metric, including trend discussion and risks."
        }
    }
}

/// Context for the financial metrics stage
pub fn financial_metrics_prompt(
    ticker: &str,
    date: NaiveDate,
    depth: Depth,
    ratios: &FinancialRatios,
    profile: Option<&CompanyProfile>,
) -> String {
    let mut prompt = header(ticker, date);
    if let Some(profile) = profile {
        prompt.push_str(&profile_block(profile));
    }
    let _ = writeln!(
        prompt,
        "\nComputed financial ratios (percentages unless noted):\n{}",
        to_pretty_json(ratios)
    );
    let _ = writeln!(
        prompt,
        "\nAnalyze this company's financial health from these ratios. {}",
        depth_guidance(depth)
    );
    prompt
}

/// Context for the industry comparison stage
pub fn industry_comparison_prompt(
    ticker: &str,
    date: NaiveDate,
    depth: Depth,
    profile: &CompanyProfile,
    ratios: &FinancialRatios,
) -> String {
    let mut prompt = header(ticker, date);
    prompt.push_str(&profile_block(profile));
    let _ = writeln!(
        prompt,
        "\nComputed financial ratios for benchmarking:\n{}",
        to_pretty_json(ratios)
    );
    let _ = writeln!(
        prompt,
        "\nCompare this company against its industry and assess its competitive position. {}",
        depth_guidance(depth)
    );
    prompt
}

/// Context for the valuation stage
pub fn valuation_prompt(
    ticker: &str,
    date: NaiveDate,
    depth: Depth,
    metrics: &RatioMap,
    profile: Option<&CompanyProfile>,
) -> String {
    let mut prompt = header(ticker, date);
    if let Some(profile) = profile {
        prompt.push_str(&profile_block(profile));
    }
    let _ = writeln!(
        prompt,
        "\nComputed valuation metrics over the trailing year:\n{}",
        to_pretty_json(metrics)
    );
    let _ = writeln!(
        prompt,
        "\nAssess whether this stock looks cheap, fairly priced or expensive. {}",
        depth_guidance(depth)
    );
    prompt
}

/// Context for the integration stage
///
/// `sections` carries one (title, body) pair per upstream stage; failed
/// stages arrive with their placeholder body already substituted.
pub fn integration_prompt(ticker: &str, date: NaiveDate, sections: &[(String, String)]) -> String {
    let mut prompt = header(ticker, date);
    prompt.push_str("\nSpecialist analysis sections follow.\n");
    for (title, body) in sections {
        let _ = writeln!(prompt, "\n## {title}\n\n{body}");
    }
    prompt.push_str(
        "\nSynthesize these sections into one investment view with an explicit recommendation and, if supported, a target price range.\n",
    );
    prompt
}

/// Second, more directive attempt after a declined generation
///
/// Embeds the computed figures verbatim so the generator cannot claim it
/// lacks data.
pub fn directive_retry_prompt(original: &str, data_json: &str) -> String {
    format!(
        "{original}\n\nYour previous response was empty. You must produce the analysis now, \
         working only from these exact computed figures:\n{data_json}\n\
         Do not decline and do not ask for more data."
    )
}

fn header(ticker: &str, date: NaiveDate) -> String {
    format!("Ticker: {ticker}\nAnalysis date: {date}\n")
}

fn profile_block(profile: &CompanyProfile) -> String {
    let mut block = String::new();
    if let Some(name) = &profile.name {
        let _ = writeln!(block, "Company: {name}");
    }
    if let Some(exchange) = &profile.exchange {
        let _ = writeln!(block, "Exchange: {exchange}");
    }
    if let Some(sector) = &profile.sector {
        let _ = writeln!(block, "Sector: {sector}");
    }
    if let Some(industry) = &profile.industry {
        let _ = writeln!(block, "Industry: {industry}");
    }
    if let Some(market_cap) = profile.market_cap {
        let _ = writeln!(block, "Market cap: {market_cap}");
    }
    block
}

fn to_pretty_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
