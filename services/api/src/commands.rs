use crate::error::AppError;
use crate::infra::{SeedArgs, Stores};
use clap::Args;
use kpi_rewards::config::AppConfig;
use kpi_rewards::telemetry;
use kpi_rewards::workflows::integrity::SweepMode;
use kpi_rewards::workflows::records::EmployeeId;
use kpi_rewards::workflows::rewards::Frequency;
use serde_json::json;

#[derive(Args, Debug)]
pub(crate) struct CalculateArgs {
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
    /// Employee to calculate rewards for
    #[arg(long)]
    pub(crate) employee: String,
    /// Period key: YYYY-MM, YYYY-Qn or YYYY depending on frequency
    #[arg(long)]
    pub(crate) period: String,
    /// monthly, quarterly or annually
    #[arg(long, value_parser = parse_frequency, default_value = "monthly")]
    pub(crate) frequency: Frequency,
}

#[derive(Args, Debug)]
pub(crate) struct IntegrityArgs {
    #[command(flatten)]
    pub(crate) seed: SeedArgs,
    /// Soft-delete records with dangling employee or KPI references
    #[arg(long)]
    pub(crate) apply: bool,
}

pub(crate) fn parse_frequency(raw: &str) -> Result<Frequency, String> {
    Frequency::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of monthly, quarterly, annually"))
}

/// Run one calculation against seeded stores and print it as JSON.
pub(crate) fn run_calculation(args: CalculateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let stores = Stores::load(&args.seed)?;
    let service = stores.reward_service(config.rewards.clone());
    let calculation =
        service.calculate(&EmployeeId(args.employee), &args.period, args.frequency)?;
    let payable = calculation.payable_amount(config.rewards.clamp_net_at_zero);

    let output = json!({ "calculation": calculation, "payableAmount": payable });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(crate) fn run_integrity(args: IntegrityArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mode = if args.apply {
        SweepMode::Apply
    } else {
        SweepMode::ReportOnly
    };
    let report = Stores::load(&args.seed)?.integrity_sweep().run(mode)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
