pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crediflow_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "crediflow",
    about = "Crediflow operator CLI",
    long_about = "Operate the credit application workflow: migrations, demo data, \
                  application inspection, approvals, and status transitions.",
    after_help = "Examples:\n  crediflow migrate\n  crediflow show APP-2026-0001\n  crediflow approve APP-2026-0001 --party advisor --actor-id adv-maria"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PartyArg {
    Advisor,
    Company,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset (safe to re-run)")]
    Seed,
    #[command(about = "Show an application, its approval record, and its audit trail")]
    Show {
        #[arg(help = "Application id")]
        id: String,
    },
    #[command(about = "List applications, optionally narrowed to one advisor or company")]
    List {
        #[arg(long, help = "Only applications assigned to this advisor")]
        advisor_id: Option<String>,
        #[arg(long, help = "Only applications belonging to this company")]
        company_id: Option<String>,
    },
    #[command(about = "Per-status application counts")]
    Summary,
    #[command(about = "Record an advisor or company approval")]
    Approve {
        #[arg(help = "Application id")]
        id: String,
        #[arg(long, value_enum, help = "Which of the two parties is approving")]
        party: PartyArg,
        #[arg(long, help = "Id of the approving user")]
        actor_id: String,
        #[arg(long, help = "Company id, required for company approvals")]
        company_id: Option<String>,
    },
    #[command(about = "Move an application to a new lifecycle status")]
    SetStatus {
        #[arg(help = "Application id")]
        id: String,
        #[arg(help = "Target status, e.g. in_review or por_dispersar")]
        status: String,
        #[arg(long, default_value = "cli-operator", help = "Id recorded in the audit note")]
        actor_id: String,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "startup",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&config),
        Command::Seed => commands::seed::run(&config),
        Command::Show { id } => commands::show::run(&config, &id),
        Command::List { advisor_id, company_id } => {
            commands::list::run(&config, advisor_id.as_deref(), company_id.as_deref())
        }
        Command::Summary => commands::summary::run(&config),
        Command::Approve { id, party, actor_id, company_id } => {
            commands::approve::run(&config, &id, party, &actor_id, company_id.as_deref())
        }
        Command::SetStatus { id, status, actor_id } => {
            commands::set_status::run(&config, &id, &status, &actor_id)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
