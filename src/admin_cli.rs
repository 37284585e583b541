// src/admin_cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use crate::auth::{hash_password, validate_password};
use crate::core::{ConfigManager, Database};
use crate::recommendation::evaluation::{evaluate, EvaluationDataset};
use crate::recommendation::IndexBuilder;
use crate::repositories::{CompanyRepository, JobRepository, NewUser, UserRepository};
use crate::types::CompanyStatus;
use crate::web::services::embedding_model;
use crate::web::start_web_server;

#[derive(Parser)]
#[command(name = "jobportal")]
#[command(about = "Job portal API server and maintenance commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server (default)
    Serve,
    /// Embed every active job and write the vector index
    BuildIndex,
    /// Measure retrieval quality on a labelled resume/role dataset
    Evaluate {
        /// CSV with Resume, Job Roles and Job Description columns
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 10)]
        k: usize,
        #[arg(long, default_value_t = 0.2)]
        test_ratio: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Approve or reject a company registration
    Company {
        #[command(subcommand)]
        action: CompanyAction,
    },
    /// Show job counts per company
    Stats,
    /// Create a staff account
    CreateStaff { username: String, password: String },
}

#[derive(Subcommand)]
pub enum CompanyAction {
    Approve { id: i64 },
    Reject { id: i64 },
}

async fn open_database(config: &ConfigManager) -> Result<Database> {
    config.ensure_directories().await?;
    Database::connect(&config.environment.database_path).await
}

pub async fn handle_command(command: Command, config: ConfigManager) -> Result<()> {
    match command {
        Command::Serve => start_web_server(config).await,

        Command::BuildIndex => {
            let db = open_database(&config).await?;
            let embedder = embedding_model(&config.service)?;
            match IndexBuilder::new(db, embedder)
                .build(&config.environment.index_path)
                .await?
            {
                Some((_, report)) => info!(
                    "Job index written to {}: {} jobs, {} chunks",
                    config.environment.index_path.display(),
                    report.jobs,
                    report.chunks
                ),
                None => info!("No active jobs, nothing to index"),
            }
            Ok(())
        }

        Command::Evaluate {
            csv,
            k,
            test_ratio,
            seed,
        } => {
            if !(0.0..=1.0).contains(&test_ratio) {
                anyhow::bail!("--test-ratio must be between 0 and 1, got {}", test_ratio);
            }
            let dataset = EvaluationDataset::from_path(&csv)?;
            let embedder = embedding_model(&config.service)?;
            let report = evaluate(embedder.as_ref(), &dataset, k.max(1), test_ratio, seed).await?;

            info!(
                "Evaluated {} test applicants against {} roles",
                report.test_size, report.roles
            );
            info!("Hit rate@{}: {:.4}", report.k, report.hit_rate);
            info!("MRR: {:.4}", report.mean_reciprocal_rank);
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render report")?
            );
            Ok(())
        }

        Command::Company { action } => {
            let db = open_database(&config).await?;
            let (id, status) = match action {
                CompanyAction::Approve { id } => (id, CompanyStatus::Approved),
                CompanyAction::Reject { id } => (id, CompanyStatus::Rejected),
            };
            match CompanyRepository::new(db.pool()).set_status(id, status).await? {
                Some(company) => info!("Company '{}' ({}) is now {}", company.name, id, status),
                None => error!("No company with id {}", id),
            }
            Ok(())
        }

        Command::Stats => {
            let db = open_database(&config).await?;
            let stats = CompanyRepository::new(db.pool()).job_counts().await?;
            let open_jobs = JobRepository::new(db.pool()).count_active().await?;

            if stats.is_empty() {
                info!("No companies registered.");
            } else {
                println!("{:<5} {:<40} {:>6}", "ID", "Company", "Jobs");
                println!("{}", "-".repeat(53));
                for entry in &stats {
                    println!("{:<5} {:<40} {:>6}", entry.id, entry.name, entry.job_count);
                }
            }
            info!("{} active jobs in total", open_jobs);
            Ok(())
        }

        Command::CreateStaff { username, password } => {
            validate_password(&password, &username).map_err(|message| anyhow::anyhow!(message))?;
            let db = open_database(&config).await?;
            let users = UserRepository::new(db.pool());
            if users.find_by_username(&username).await?.is_some() {
                anyhow::bail!("User '{}' already exists", username);
            }

            let user = users
                .create(&NewUser {
                    username,
                    password_hash: hash_password(&password)?,
                    first_name: String::new(),
                    last_name: String::new(),
                    email: String::new(),
                    avatar: None,
                    is_staff: true,
                    phone_number: String::new(),
                    address: String::new(),
                    user_type: None,
                })
                .await?;
            info!("Staff account '{}' created (id {})", user.username, user.id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["jobportal"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_evaluate_defaults() {
        let cli = Cli::try_parse_from(["jobportal", "evaluate", "--csv", "data.csv"]).unwrap();
        match cli.command {
            Some(Command::Evaluate {
                csv,
                k,
                test_ratio,
                seed,
            }) => {
                assert_eq!(csv, PathBuf::from("data.csv"));
                assert_eq!(k, 10);
                assert_eq!(test_ratio, 0.2);
                assert_eq!(seed, 42);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_company_subcommand() {
        let cli = Cli::try_parse_from(["jobportal", "company", "approve", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Company {
                action: CompanyAction::Approve { id: 7 }
            })
        ));
    }
}
