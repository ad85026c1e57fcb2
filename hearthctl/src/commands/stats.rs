//! Stats command. Renders the same platform rollup the admin dashboard
//! shows, as a table or JSON.

use anyhow::{Context, Result};
use clap::Args;
use letting::Month;
use std::path::PathBuf;
use tabled::{settings::style::Style, Table, Tabled};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Path to the SQLite database
    #[arg(long, env = "HEARTH_DB")]
    pub db: PathBuf,

    /// Month to report on, YYYY-MM (default: the current month)
    #[arg(long)]
    pub month: Option<String>,

    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Tabled)]
struct StatsRow {
    #[tabled(rename = "MONTH")]
    month: String,
    #[tabled(rename = "LANDLORDS")]
    landlords: u64,
    #[tabled(rename = "TENANTS")]
    tenants: u64,
    #[tabled(rename = "PROPERTIES")]
    properties: u64,
    #[tabled(rename = "UNITS")]
    units: u64,
    #[tabled(rename = "OCCUPANCY")]
    occupancy: String,
    #[tabled(rename = "ACTIVE TENANCIES")]
    active_tenancies: u64,
    #[tabled(rename = "COLLECTED")]
    collected: String,
    #[tabled(rename = "PAYMENTS")]
    payments: u64,
    #[tabled(rename = "PENDING REQUESTS")]
    pending_requests: u64,
    #[tabled(rename = "OPEN ISSUES")]
    open_issues: u64,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let month = match &args.month {
        Some(raw) => raw.parse::<Month>()?,
        None => Month::current(),
    };
    let store = hearth_store::Store::open(&args.db)
        .with_context(|| format!("opening database at {}", args.db.display()))?;
    let stats = store.platform_stats(&month)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let row = StatsRow {
        month: stats.month.clone(),
        landlords: stats.landlords,
        tenants: stats.tenants,
        properties: stats.properties,
        units: stats.units,
        occupancy: format!("{:.0}%", stats.occupancy_rate * 100.0),
        active_tenancies: stats.active_tenancies,
        collected: stats.collected_in_month.to_string(),
        payments: stats.payments_in_month,
        pending_requests: stats.pending_join_requests,
        open_issues: stats.open_maintenance,
    };

    let mut table = Table::new(vec![row]);
    table.with(Style::rounded());
    println!("\n{}", table);
    Ok(())
}
