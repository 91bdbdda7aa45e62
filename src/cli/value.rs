//! The `value` command: resolve inputs, compute intrinsic value, classify.

use anyhow::{Result, bail};
use chrono::Utc;
use comfy_table::Cell;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::ui;
use crate::core::cache::Cache;
use crate::core::classify::{self, Label};
use crate::core::config::AppConfig;
use crate::core::eps::{EpsEstimate, EpsSource, MAX_QUARTERS};
use crate::core::evaluation::EvaluationRecord;
use crate::core::quote::{QuoteProvider, QuoteSnapshot};
use crate::core::resolve::{
    self, Provenance, RateSource, ResolveOptions, ResolvedRate, Resolution,
};
use crate::core::valuation::{self, ValuationMode};
use crate::providers::fred::FredYieldSource;
use crate::providers::yahoo_finance::{YahooQuoteProvider, YahooYieldSource};
use crate::providers::yahoo_summary::{
    ActualsEpsSource, SummarySnapshot, TrailingEpsSource, TrendGrowthSource, TrendHorizon,
    YahooSummaryProvider,
};
use crate::store::EvaluationLog;

const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Manual values supplied on the command line. These short-circuit the
/// corresponding provider chain entirely.
#[derive(Debug, Default)]
pub struct Overrides {
    pub mode: Option<ValuationMode>,
    pub years: Option<u32>,
    pub eps: Option<f64>,
    pub growth: Option<f64>,
}

pub async fn run(config: &AppConfig, symbol: &str, overrides: Overrides) -> Result<()> {
    let symbol = symbol.to_uppercase();
    let timeout = Duration::from_secs(config.valuation.provider_timeout_secs);

    let yahoo_base = config
        .providers
        .yahoo
        .as_ref()
        .map_or(DEFAULT_YAHOO_BASE_URL, |p| p.base_url.as_str());

    // Shared caches, scoped to this evaluation
    let quote_cache = Arc::new(Cache::new());
    let summary_cache = Arc::new(Cache::new());
    let rate_cache = Arc::new(Cache::new());

    let quote_provider = YahooQuoteProvider::new(yahoo_base, quote_cache);
    let summary_provider = Arc::new(YahooSummaryProvider::new(yahoo_base, summary_cache));

    let pb = ui::new_spinner("Fetching market data...");
    let (quote_result, summary_result) = futures::join!(
        tokio::time::timeout(timeout, quote_provider.fetch_quote(&symbol)),
        tokio::time::timeout(timeout, summary_provider.fetch_summary(&symbol)),
    );
    pb.finish_and_clear();

    let mut quote = match quote_result {
        Ok(Ok(quote)) => quote,
        Ok(Err(e)) => {
            warn!(error = %e, "quote fetch failed");
            QuoteSnapshot::empty(&symbol)
        }
        Err(_) => {
            warn!("quote fetch timed out");
            QuoteSnapshot::empty(&symbol)
        }
    };

    let summary = match summary_result {
        Ok(Ok(summary)) => Some(summary),
        Ok(Err(e)) => {
            warn!(error = %e, "summary fetch failed");
            None
        }
        Err(_) => {
            warn!("summary fetch timed out");
            None
        }
    };

    if let Some(summary) = &summary {
        quote.next_earnings_date = summary.next_earnings_date;
    }

    print_quote(&quote);
    if let Some(summary) = &summary {
        print_earnings_history(summary);
    }

    // Discount rate: first success wins, constant fallback.
    let discount = resolve_discount(config, yahoo_base, &rate_cache, timeout).await;

    // Growth: every source is consulted and successes are averaged.
    let growth = match overrides.growth {
        Some(value_pct) => ResolvedRate {
            value_pct,
            provenance: Provenance::Manual,
        },
        None => resolve_growth(config, &summary_provider, &symbol, timeout).await?,
    };

    // EPS: first success wins, manual quarterly entry as the last resort.
    let (eps, eps_source) = match overrides.eps {
        Some(value) => (EpsEstimate::manual_total(value), "manual".to_string()),
        None => {
            let sources: Vec<Box<dyn EpsSource>> = vec![
                Box::new(TrailingEpsSource::new(Arc::clone(&summary_provider), &symbol)),
                Box::new(ActualsEpsSource::new(Arc::clone(&summary_provider), &symbol)),
            ];
            match resolve::resolve_eps(&sources, timeout).await {
                Some(resolved) => resolved,
                None => (prompt_quarterly_eps()?, "manual".to_string()),
            }
        }
    };

    // A zero or bad input must end as a distinguishable message, never as a
    // garbage intrinsic value.
    if !eps.is_usable() {
        bail!(
            "insufficient data: earnings per share must be positive, got {:.2}",
            eps.value_per_share
        );
    }
    if growth.value_pct < 0.0 {
        bail!(
            "insufficient data: growth estimate is negative ({:.2}%); pass --growth to override",
            growth.value_pct
        );
    }
    if discount.value_pct <= 0.0 {
        bail!(
            "insufficient data: discount rate must be positive, got {:.2}%",
            discount.value_pct
        );
    }

    let mode = overrides.mode.unwrap_or(config.valuation.mode);
    let years = overrides.years.unwrap_or(config.valuation.years);

    let intrinsic_value = valuation::intrinsic_value(
        mode,
        eps.value_per_share,
        growth.value_pct,
        discount.value_pct,
        years,
    )?;
    let buy_below = classify::buy_below(intrinsic_value, config.thresholds.margin_of_safety);
    let label = quote
        .current_price
        .map(|price| classify::classify(intrinsic_value, price, &config.thresholds));

    print_valuation(
        config,
        &quote,
        &eps,
        &eps_source,
        &growth,
        &discount,
        mode,
        years,
        intrinsic_value,
        buy_below,
        label,
    );

    let record = EvaluationRecord {
        timestamp: Utc::now(),
        symbol: symbol.clone(),
        eps: eps.value_per_share,
        eps_basis: eps.basis,
        eps_source,
        growth_pct: growth.value_pct,
        growth_provenance: growth.provenance,
        discount_pct: discount.value_pct,
        discount_provenance: discount.provenance,
        mode,
        years,
        intrinsic_value,
        buy_below,
        price: quote.current_price,
        label,
    };
    append_to_log(config, &record);

    Ok(())
}

async fn resolve_discount(
    config: &AppConfig,
    yahoo_base: &str,
    rate_cache: &Arc<Cache<String, f64>>,
    timeout: Duration,
) -> ResolvedRate {
    let mut sources: Vec<Box<dyn RateSource>> = Vec::new();

    if let Some(fred) = &config.providers.fred {
        match fred.resolved_api_key() {
            Some(api_key) => sources.push(Box::new(FredYieldSource::new(
                &fred.base_url,
                &api_key,
                &fred.series_id,
                Arc::clone(rate_cache),
            ))),
            None => debug!("no FRED api key configured, skipping FRED source"),
        }
    }
    sources.push(Box::new(YahooYieldSource::new(
        yahoo_base,
        &config.providers.treasury_symbol,
        Arc::clone(rate_cache),
    )));

    match resolve::resolve_first(
        &sources,
        &ResolveOptions::discount(timeout),
        Some(config.fallbacks.discount_rate_pct),
    )
    .await
    {
        Resolution::Resolved(rate) => rate,
        // Unreachable with a constant fallback, but harmless to honor
        Resolution::ManualEntryRequired => ResolvedRate {
            value_pct: config.fallbacks.discount_rate_pct,
            provenance: Provenance::Fallback,
        },
    }
}

async fn resolve_growth(
    config: &AppConfig,
    summary_provider: &Arc<YahooSummaryProvider>,
    symbol: &str,
    timeout: Duration,
) -> Result<ResolvedRate> {
    let sources: Vec<Box<dyn RateSource>> = vec![
        Box::new(TrendGrowthSource::new(
            Arc::clone(summary_provider),
            symbol,
            TrendHorizon::NextYear,
        )),
        Box::new(TrendGrowthSource::new(
            Arc::clone(summary_provider),
            symbol,
            TrendHorizon::NextFiveYears,
        )),
    ];

    match resolve::resolve_mean(
        &sources,
        &ResolveOptions::growth(timeout),
        config.fallbacks.growth_rate_pct,
    )
    .await
    {
        Resolution::Resolved(rate) => Ok(rate),
        Resolution::ManualEntryRequired => prompt_rate("1-year growth estimate (%)"),
    }
}

fn append_to_log(config: &AppConfig, record: &EvaluationRecord) {
    let log = config
        .data_path()
        .and_then(|path| EvaluationLog::open(&path.join("evaluations")));
    match log {
        Ok(log) => {
            if let Err(e) = log.append(record) {
                warn!(error = %e, "failed to append evaluation record");
            }
        }
        Err(e) => warn!(error = %e, "evaluation log unavailable"),
    }
}

fn prompt_rate(label: &str) -> Result<ResolvedRate> {
    if !console::user_attended() {
        bail!(
            "insufficient data: no provider returned a {label} and no terminal is attached for manual entry"
        );
    }

    let term = console::Term::stdout();
    loop {
        term.write_str(&format!("{label}: "))?;
        let line = term.read_line()?;
        if line.trim().is_empty() {
            bail!("insufficient data: no {label} entered");
        }
        match line.trim().parse::<f64>() {
            Ok(value_pct) if value_pct.is_finite() => {
                return Ok(ResolvedRate {
                    value_pct,
                    provenance: Provenance::Manual,
                });
            }
            _ => term.write_line("Enter a number, e.g. 10.0")?,
        }
    }
}

fn prompt_quarterly_eps() -> Result<EpsEstimate> {
    if !console::user_attended() {
        bail!(
            "insufficient data: no provider returned EPS and no terminal is attached for manual entry; pass --eps"
        );
    }

    let term = console::Term::stdout();
    term.write_line("No EPS data available. Enter up to four quarterly figures (blank to finish).")?;

    let mut quarters = Vec::new();
    while quarters.len() < MAX_QUARTERS {
        term.write_str(&format!("Quarter {} EPS: ", quarters.len() + 1))?;
        let line = term.read_line()?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => quarters.push(value),
            _ => term.write_line("Enter a number, e.g. 1.52")?,
        }
    }

    if quarters.is_empty() {
        bail!("insufficient data: no quarterly EPS entered");
    }
    Ok(EpsEstimate::from_quarters(&quarters))
}

fn print_quote(quote: &QuoteSnapshot) {
    let mut line = ui::style_text(&quote.symbol, ui::StyleType::Title);

    match quote.current_price {
        Some(price) => {
            let currency = quote.currency.as_deref().unwrap_or("");
            line.push_str(&format!("  {price:.2} {currency}"));
            if let Some(change_pct) = quote.day_change_percent() {
                line.push_str(&format!(" ({change_pct:+.2}%)"));
            }
        }
        None => line.push_str(&format!(
            "  {}",
            ui::style_text("no market price", ui::StyleType::Error)
        )),
    }
    println!("{line}");

    if let Some(date) = quote.next_earnings_date {
        println!(
            "{}",
            ui::style_text(&format!("Next earnings: {date}"), ui::StyleType::Subtle)
        );
    }
    println!();
}

fn print_earnings_history(summary: &SummarySnapshot) {
    if summary.earnings_history.is_empty() {
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Quarter"),
        ui::header_cell("EPS Actual"),
        ui::header_cell("EPS Estimate"),
        ui::header_cell("Surprise"),
    ]);

    for observation in summary.earnings_history.iter().take(6) {
        let quarter = observation
            .quarter
            .map_or("N/A".to_string(), |d| d.to_string());
        let surprise = match observation.surprise_pct {
            Some(pct) => ui::change_cell(pct * 100.0),
            None => Cell::new("N/A"),
        };
        table.add_row(vec![
            Cell::new(quarter),
            ui::format_optional_cell(observation.eps_actual, |v| format!("{v:.2}")),
            ui::format_optional_cell(observation.eps_estimate, |v| format!("{v:.2}")),
            surprise,
        ]);
    }

    println!("Earnings History");
    println!("{table}\n");
}

#[allow(clippy::too_many_arguments)]
fn print_valuation(
    config: &AppConfig,
    quote: &QuoteSnapshot,
    eps: &EpsEstimate,
    eps_source: &str,
    growth: &ResolvedRate,
    discount: &ResolvedRate,
    mode: ValuationMode,
    years: u32,
    intrinsic_value: f64,
    buy_below: f64,
    label: Option<Label>,
) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Input"),
        ui::header_cell("Value"),
        ui::header_cell("Source"),
    ]);

    table.add_row(vec![
        Cell::new(format!("EPS ({})", eps.basis)),
        Cell::new(format!("{:.2}", eps.value_per_share)),
        Cell::new(eps_source),
    ]);
    table.add_row(vec![
        Cell::new("Growth rate"),
        Cell::new(format!("{:.2}%", growth.value_pct)),
        Cell::new(growth.provenance.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Discount rate"),
        Cell::new(format!("{:.2}%", discount.value_pct)),
        Cell::new(discount.provenance.to_string()),
    ]);

    let model = match mode {
        ValuationMode::DiscountedEarnings => format!("{mode} ({years}y)"),
        ValuationMode::GrahamMultiplier => mode.to_string(),
    };
    table.add_row(vec![Cell::new("Model"), Cell::new(model), Cell::new("")]);
    table.add_row(vec![
        Cell::new("Intrinsic value"),
        Cell::new(format!("{intrinsic_value:.2}")),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new(format!(
            "Buy below ({:.0}% margin)",
            config.thresholds.margin_of_safety * 100.0
        )),
        Cell::new(format!("{buy_below:.2}")),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Current price"),
        ui::format_optional_cell(quote.current_price, |p| format!("{p:.2}")),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Verdict"),
        ui::label_cell(label),
        Cell::new(""),
    ]);

    println!("{table}");

    match (label, quote.current_price) {
        (Some(label), Some(price)) => {
            let text = format!(
                "{} at {:.2} against an intrinsic value of {:.2}",
                label, price, intrinsic_value
            );
            let styled = match label {
                Label::Undervalued => ui::style_text(&text, ui::StyleType::Positive),
                Label::FairlyValued => ui::style_text(&text, ui::StyleType::Warning),
                Label::Overvalued => ui::style_text(&text, ui::StyleType::Error),
            };
            println!("\n{styled}");
        }
        _ => println!(
            "\n{}",
            ui::style_text(
                "No market price available; classification skipped.",
                ui::StyleType::Subtle
            )
        ),
    }
}
