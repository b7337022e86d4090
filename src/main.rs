//! Plan Proposals CLI
//!
//! Quotes from the pricing catalog and drives proposals through review

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use plan_proposals::config::{DEFAULT_STORE_PATH, PortalConfig};
use plan_proposals::cpf::{format_cpf, validate_cpf};
use plan_proposals::notify::LogMailer;
use plan_proposals::pricing::loader::{load_bracket_records, load_catalog, load_tables, DEFAULT_CATALOG_PATH};
use plan_proposals::pricing::{group_by_table, load_census, quote_census, PricingCatalog};
use plan_proposals::proposal::{CancelOutcome, Proposal, ProposalDraft, ProposalService, ProposalStatus};
use plan_proposals::session::{
    require_session, Action, Resource, Role, Session, SessionFile, DEFAULT_SESSION_PATH,
};
use plan_proposals::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "plan_proposals", version, about = "Health-plan pricing and proposal desk")]
struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[arg(long, global = true, env = "PORTAL_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,
    #[arg(long, global = true, env = "PORTAL_STORE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
    #[arg(long, global = true, env = "PORTAL_SESSION", default_value = DEFAULT_SESSION_PATH)]
    session: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Price one person on a table
    Quote {
        #[arg(long)]
        table: u64,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        birth_date: Option<NaiveDate>,
        /// Quote date (defaults to today)
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// List the brackets of a table
    Brackets {
        #[arg(long)]
        table: u64,
    },
    /// All brackets grouped by table title
    Report {
        /// Only tables sold in this coverage area (e.g. SP)
        #[arg(long)]
        area: Option<String>,
    },
    /// Check tables for gaps, overlaps and a missing open bracket
    CheckCoverage {
        #[arg(long)]
        table: Option<u64>,
    },
    /// Price every line of a census CSV (name,birth_date)
    QuoteBatch {
        #[arg(long)]
        table: u64,
        census: PathBuf,
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Validate and format a CPF
    Cpf {
        value: String,
    },
    Login {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Broker)]
        role: RoleArg,
    },
    Logout,
    /// Price a draft (JSON) on a table and submit it
    Submit {
        draft: PathBuf,
        #[arg(long)]
        table: u64,
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    Cancel {
        id: u64,
        #[arg(long)]
        reason: Option<String>,
    },
    Validate {
        id: u64,
    },
    Reject {
        id: u64,
        #[arg(long)]
        reason: String,
    },
    Reopen {
        id: u64,
    },
    /// Show one proposal, or list them
    Show {
        id: Option<u64>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    Broker,
    Viewer,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Role::Admin,
            RoleArg::Broker => Role::Broker,
            RoleArg::Viewer => Role::Viewer,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Pending,
    Validated,
    Rejected,
    Cancelled,
}

impl From<StatusArg> for ProposalStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => ProposalStatus::Pending,
            StatusArg::Validated => ProposalStatus::Validated,
            StatusArg::Rejected => ProposalStatus::Rejected,
            StatusArg::Cancelled => ProposalStatus::Cancelled,
        }
    }
}

type Service = ProposalService<MemoryStore, LogMailer>;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = PortalConfig {
        catalog_path: cli.catalog.clone(),
        store_path: cli.store.clone(),
        session_path: cli.session.clone(),
        ..PortalConfig::default()
    };
    let sessions = SessionFile::new(&config.session_path);
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Quote {
            table,
            age,
            birth_date,
            on,
        } => {
            let catalog = catalog(&config)?;
            let bracket = match (age, birth_date) {
                (Some(age), None) => catalog.resolve_bracket_for_age(table, age)?,
                (None, Some(birth)) => catalog.resolve_for_birth_date(table, birth, on.unwrap_or(today))?,
                _ => bail!("give exactly one of --age or --birth-date"),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(bracket)?);
            } else {
                println!("Table {} faixa {}: R$ {:.2}", table, bracket.label, bracket.value);
            }
        }

        Commands::Brackets { table } => {
            let catalog = catalog(&config)?;
            let meta = catalog.table(table)?;
            let brackets = catalog.list_brackets_for_table(table)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(brackets)?);
            } else {
                println!("{} ({}){}", meta.title, meta.operator, if meta.active { "" } else { " [inactive]" });
                for bracket in brackets {
                    println!("  {:>8}  R$ {:>10.2}", bracket.label, bracket.value);
                }
            }
        }

        Commands::Report { area } => {
            // Raw records: a bad label only affects its own line
            let mut tables = load_tables(&config.catalog_path)?;
            let mut records = load_bracket_records(&config.catalog_path)?;
            if let Some(area) = &area {
                tables.retain(|t| t.covers_area(area));
                records.retain(|r| tables.iter().any(|t| t.id == r.table_id));
            }
            let grouped = group_by_table(&tables, &records);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&grouped)?);
            } else {
                for (title, summaries) in &grouped {
                    println!("{}", title);
                    for s in summaries {
                        println!("  {:>8}  R$ {:>10.2}", s.faixa, s.value);
                    }
                }
            }
        }

        Commands::CheckCoverage { table } => {
            let catalog = catalog(&config)?;
            let ids: Vec<u64> = match table {
                Some(id) => vec![id],
                None => catalog.tables().map(|t| t.id).collect(),
            };
            let mut failures = 0;
            for id in ids {
                match catalog.validate_coverage(id) {
                    Ok(()) => println!("table {}: ok", id),
                    Err(e) => {
                        failures += 1;
                        println!("table {}: {}", id, e);
                    }
                }
            }
            if failures > 0 {
                bail!("{} table(s) with coverage problems", failures);
            }
        }

        Commands::QuoteBatch { table, census, on } => {
            let catalog = catalog(&config)?;
            let applicants = load_census(&census).with_context(|| format!("reading census {}", census.display()))?;
            let lines = quote_census(&catalog, table, &applicants, on.unwrap_or(today));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                let mut total = 0.0;
                for line in &lines {
                    match (&line.faixa, line.value) {
                        (Some(faixa), Some(value)) => {
                            total += value;
                            println!("{:<30} {:>8} R$ {:>10.2}", line.name, faixa, value);
                        }
                        _ => println!(
                            "{:<30} error: {}",
                            line.name,
                            line.error.as_deref().unwrap_or("unpriced")
                        ),
                    }
                }
                let priced = lines.iter().filter(|l| l.is_priced()).count();
                println!("{} of {} priced, total R$ {:.2}", priced, lines.len(), total);
            }
        }

        Commands::Cpf { value } => {
            let valid = validate_cpf(&value);
            println!("{} {}", format_cpf(&value), if valid { "valid" } else { "invalid" });
            if !valid {
                std::process::exit(1);
            }
        }

        Commands::Login { user, role } => {
            let session = Session::new(user, role.into());
            sessions.save(&session)?;
            info!("session started for {} as {:?}", session.user, session.role);
            println!("Logged in as {} ({:?})", session.user, session.role);
        }

        Commands::Logout => {
            sessions.clear()?;
            println!("Logged out");
        }

        Commands::Submit { draft, table, on } => {
            require_session(&sessions, Resource::Proposals, Action::Write)?;
            let text = fs::read_to_string(&draft).with_context(|| format!("reading draft {}", draft.display()))?;
            let mut draft: ProposalDraft = serde_json::from_str(&text)?;
            draft.price_with(&catalog(&config)?, table, on.unwrap_or(today))?;

            let mut service = service(&config)?;
            let receipt = service.submit(draft)?;
            save(service, &config.store_path)?;

            print_proposal(&receipt.proposal, cli.json)?;
            if !receipt.notified {
                println!("warning: confirmation email was not sent");
            }
        }

        Commands::Cancel { id, reason } => {
            require_session(&sessions, Resource::Proposals, Action::Write)?;
            let mut service = service(&config)?;
            let outcome = service.cancel(id, reason.as_deref())?;
            save(service, &config.store_path)?;

            match outcome {
                CancelOutcome::Cancelled { schema, reason } => {
                    println!("Proposal {} cancelled ({:?}): {}", id, schema, reason)
                }
                CancelOutcome::AlreadyCancelled => println!("Proposal {} was already cancelled", id),
            }
        }

        Commands::Validate { id } => {
            let session = require_session(&sessions, Resource::Proposals, Action::Administer)?;
            let mut service = service(&config)?;
            let proposal = service.validate(&session, id)?;
            save(service, &config.store_path)?;
            print_proposal(&proposal, cli.json)?;
        }

        Commands::Reject { id, reason } => {
            let session = require_session(&sessions, Resource::Proposals, Action::Administer)?;
            let mut service = service(&config)?;
            let proposal = service.reject(&session, id, &reason)?;
            save(service, &config.store_path)?;
            print_proposal(&proposal, cli.json)?;
        }

        Commands::Reopen { id } => {
            let session = require_session(&sessions, Resource::Proposals, Action::Administer)?;
            let mut service = service(&config)?;
            let proposal = service.reopen(&session, id)?;
            save(service, &config.store_path)?;
            print_proposal(&proposal, cli.json)?;
        }

        Commands::Show { id, status } => {
            require_session(&sessions, Resource::Proposals, Action::Read)?;
            let service = service(&config)?;
            match id {
                Some(id) => print_proposal(&service.get(id)?, cli.json)?,
                None => {
                    let proposals = service.list(status.map(Into::into))?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&proposals)?);
                    } else {
                        for p in &proposals {
                            println!(
                                "#{:<5} {:<10} {:<30} R$ {:>10.2}",
                                p.id,
                                p.status.as_str(),
                                p.client.name,
                                p.total_premium()
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn catalog(config: &PortalConfig) -> Result<PricingCatalog> {
    load_catalog(&config.catalog_path)
        .with_context(|| format!("loading catalog from {}", config.catalog_path.display()))
}

fn service(config: &PortalConfig) -> Result<Service> {
    let store = MemoryStore::open(&config.store_path)
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    Ok(ProposalService::with_config(
        store,
        LogMailer::new(config.mail_sender.clone()),
        config,
    ))
}

fn save(service: Service, path: &Path) -> Result<()> {
    service
        .into_store()
        .save(path)
        .with_context(|| format!("saving store {}", path.display()))
}

fn print_proposal(proposal: &Proposal, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(proposal)?);
        return Ok(());
    }

    println!("Proposal #{} [{}]", proposal.id, proposal.status);
    println!("  Client:  {} (CPF {})", proposal.client.name, format_cpf(&proposal.client.cpf));
    println!("  Email:   {}", proposal.client.email);
    println!(
        "  Plan:    table {} faixa {} R$ {:.2}",
        proposal.price.table_id, proposal.price.faixa, proposal.price.value
    );
    for d in &proposal.dependents {
        let price = d
            .price
            .as_ref()
            .map(|p| format!("{} R$ {:.2}", p.faixa, p.value))
            .unwrap_or_else(|| "unpriced".to_string());
        println!("  + {} ({}) {}", d.name, d.relationship.label(), price);
    }
    println!("  Total:   R$ {:.2}/month", proposal.total_premium());
    if let Some(reason) = &proposal.cancellation_reason {
        println!("  Cancelled: {}", reason);
    }
    if let Some(reason) = &proposal.rejection_reason {
        println!("  Rejected:  {}", reason);
    }
    println!("  Created: {}", proposal.created_at.format("%Y-%m-%d %H:%M"));
    Ok(())
}
