//! Operator tools: create the schema, seed data, print results and export CSV files.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tally_common::db_util::{
    establish_connection, find_period, get_users, init_schema, seed_default_data,
};
use tally_common::results::{calculate_results, results_for_presenter};
use tally_common::{ScoreResult, UserRole, export};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Show debug output
    #[arg(short, long, global = true, env = "TALLY_VERBOSE")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true, env = "TALLY_QUIET", conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create any missing tables
    Init,

    /// Create the tables and insert default users, questions and a period
    Seed,

    /// Print aggregated results for a period
    Results {
        #[arg(long)]
        period_id: u32,

        /// Only show this presenter
        #[arg(long)]
        presenter_id: Option<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the CSV export for a period
    Export {
        #[arg(long)]
        period_id: u32,

        /// Only export this judge's block
        #[arg(long)]
        judge_id: Option<u32>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Render one presenter's breakdown as indented text.
fn format_result(result: &ScoreResult) -> String {
    let mut out = format!(
        "{} (#{}): total average {}\n",
        result.presenter_name, result.presenter_id, result.total_average
    );
    for category in &result.categories {
        out.push_str(&format!(
            "  {}: category total {}\n",
            category.category_name, category.category_total
        ));
        for question in &category.scores {
            let judges = question
                .judge_scores
                .iter()
                .map(|js| {
                    if js.score > 0.0 {
                        format!("{} {:.1}", js.judge_name, js.score)
                    } else {
                        format!("{} -", js.judge_name)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "    {}: average {} [{}]\n",
                question.question_title, question.average_score, judges
            ));
        }
    }
    out
}

/// Load variables such as `DATABASE_URL` from a `.env` file.
/// Variables already set in the environment are kept. A missing file is fine.
fn load_env_file(path: Option<&Path>) {
    match path {
        Some(path) => dotenvy::from_path(path).ok(),
        None => dotenvy::dotenv().map(|_| ()).ok(),
    };
}

fn main() -> Result<()> {
    load_env_file(None);
    let cli = Cli::parse();
    init_logging(&cli);

    let mut conn = establish_connection(&cli.database_url)?;
    debug!("Connected to database");

    match cli.command {
        Command::Init => {
            init_schema(&mut conn)?;
        }
        Command::Seed => {
            init_schema(&mut conn)?;
            if seed_default_data(&mut conn)? {
                info!("Default data inserted");
            }
        }
        Command::Results {
            period_id,
            presenter_id,
            json,
        } => {
            let mut results = calculate_results(&mut conn, period_id)?;
            if let Some(presenter_id) = presenter_id {
                let result = results_for_presenter(results, presenter_id)
                    .ok_or_else(|| anyhow!("No presenter with id {presenter_id}"))?;
                results = vec![result];
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                info!("No presenters to report for period {period_id}");
            } else {
                for result in &results {
                    println!("{}", format_result(result));
                }
            }
        }
        Command::Export {
            period_id,
            judge_id,
            output,
        } => {
            let period = find_period(&mut conn, period_id)?
                .ok_or_else(|| anyhow!("No period with id {period_id}"))?;
            let mut judges = get_users(&mut conn, Some(UserRole::Judge), None)?;
            if let Some(judge_id) = judge_id {
                judges.retain(|j| j.user_id == judge_id);
                if judges.is_empty() {
                    return Err(anyhow!("No judge with id {judge_id}"));
                }
            }

            let results = calculate_results(&mut conn, period_id)?;
            let exported_at = Utc::now();
            let csv = export::render_csv(&period, &results, &judges, exported_at);

            match output {
                Some(path) => {
                    fs::write(&path, csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Wrote {}", path.display());
                }
                None => {
                    io::stdout().write_all(csv.as_bytes())?;
                    debug!(
                        "Suggested file name: {}",
                        export::export_filename(&period, exported_at)
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::{CategoryResult, JudgeScore, QuestionResult};

    #[test]
    fn test_cli_parses_results_command() {
        let cli = Cli::try_parse_from([
            "tally_admin",
            "--database-url",
            "postgres://localhost/tally",
            "results",
            "--period-id",
            "2",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Results {
                period_id,
                presenter_id,
                json,
            } => {
                assert_eq!(period_id, 2);
                assert_eq!(presenter_id, None);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_database_url_from_env_file() {
        let dir = std::env::temp_dir().join(format!("tally_admin_env_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        fs::write(&env_file, "DATABASE_URL=postgres://from-env-file/tally\n").unwrap();
        let expected = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://from-env-file/tally".to_string());

        load_env_file(Some(&env_file));
        let cli = Cli::try_parse_from(["tally_admin", "seed"]).unwrap();
        assert_eq!(cli.database_url, expected);
        assert!(matches!(cli.command, Command::Seed));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_format_result() {
        let result = ScoreResult {
            presenter_id: 5,
            presenter_name: "Pat".to_string(),
            categories: vec![CategoryResult {
                category_id: None,
                category_name: "Uncategorized".to_string(),
                scores: vec![QuestionResult {
                    question_id: 1,
                    question_title: "Clarity".to_string(),
                    average_score: 8.0,
                    judge_scores: vec![
                        JudgeScore {
                            judge_id: 1,
                            judge_name: "A".to_string(),
                            score: 8.0,
                        },
                        JudgeScore {
                            judge_id: 2,
                            judge_name: "B".to_string(),
                            score: 0.0,
                        },
                    ],
                }],
                category_total: 8.0,
            }],
            total_average: 8.0,
        };
        assert_eq!(
            format_result(&result),
            "Pat (#5): total average 8\n  Uncategorized: category total 8\n    Clarity: average 8 [A 8.0, B -]\n"
        );
    }
}
