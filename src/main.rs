use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use savings_planner::api::check_plan_span;
use savings_planner::config::{ServeArgs, build_config};
use savings_planner::core::{SavingsSchedule, format_vnd, generate};

#[derive(Parser, Debug)]
#[command(
    name = "savings-planner",
    version,
    about = "Progressive daily savings planner (linearly increasing deposits that hit a target exactly)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the deposit schedule for a plan
    Schedule {
        #[arg(long, help = "Target amount in VND, e.g. 1000000")]
        target: i64,
        #[arg(long, value_parser = parse_date, help = "First day of the plan (YYYY-MM-DD)")]
        start: NaiveDate,
        #[arg(long, value_parser = parse_date, help = "Day after the last deposit (YYYY-MM-DD)")]
        end: NaiveDate,
        #[arg(long, help = "Print the schedule as JSON instead of a table")]
        json: bool,
    },
    /// Serve the JSON HTTP API
    Serve(ServeArgs),
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got {raw:?}: {e}"))
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_table(schedule: &SavingsSchedule) {
    println!("{:>5}  {:<10}  {:>20}", "Day", "Date", "Amount");
    for entry in &schedule.daily_amounts {
        println!(
            "{:>5}  {:<10}  {:>20}",
            entry.day,
            entry.date.format("%d/%m/%Y"),
            format_vnd(entry.amount)
        );
    }
    println!();
    println!("First day amount: {}", format_vnd(schedule.first_day_amount));
    println!("Daily increment:  {}", format_vnd(schedule.step_increment));
    println!("Total:            {}", format_vnd(schedule.total()));
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Schedule {
            target,
            start,
            end,
            json,
        } => {
            init_tracing("warn");
            if let Err(msg) = check_plan_span(start, end) {
                eprintln!("Error: {msg}");
                std::process::exit(2);
            }
            let schedule = match generate(target, start, end) {
                Ok(schedule) => schedule,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            };
            tracing::debug!(days = schedule.day_count(), "generated schedule");

            if json {
                match serde_json::to_string_pretty(&schedule) {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        eprintln!("Error: failed to serialize schedule: {e}");
                        std::process::exit(1);
                    }
                }
            } else {
                print_table(&schedule);
            }
        }
        Command::Serve(args) => {
            let config = match build_config(&args) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(2);
                }
            };
            init_tracing(config.log_level.as_filter_str());
            tracing::info!(
                address = %config.addr,
                log_level = %config.log_level,
                "starting savings planner"
            );

            if let Err(e) = savings_planner::api::run_http_server(&config).await {
                tracing::error!(error = %e, "server error");
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}
