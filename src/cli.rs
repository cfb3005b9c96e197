use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::{
    health::{
        export::detail_json,
        points::{dashboard, data_points},
        HealthMetricType, HealthSync, JsonFileSource, MetricKind, SourceAccess,
    },
    settings::AppSettings,
    AppState,
};

pub const DATA_DIR_ENV: &str = "AGGREGATOR_DATA_DIR";

#[derive(Parser, Debug)]
#[command(name = "aggregator")]
#[command(about = "Collect personal health metrics into a local day-by-day store", long_about = None)]
pub struct Cli {
    /// Directory holding the database, settings and session files
    #[arg(long, env = DATA_DIR_ENV, default_value = ".aggregator")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Sign in and store the account locally
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "AGGREGATOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Discard the session token
    Logout,
    /// Show the signed-in account and its groups
    Whoami,
    /// Drop a group membership from the stored account
    RemoveGroup { id: i64 },
    /// Ask the health source for read access
    Authorize {
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Fetch recent days from the health source and store them
    Refresh {
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// List stored days, or chart points for one metric
    Records {
        #[arg(long)]
        metric: Option<HealthMetricType>,
    },
    /// Latest value for every metric
    Dashboard,
    /// Print the stored sample JSON for one day and metric
    Detail { day: NaiveDate, metric: HealthMetricType },
    /// Show or change persisted settings
    Config {
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        history_days: Option<u32>,
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

pub async fn execute(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let account = state.auth.login(&username, &password).await?;
            println!(
                "Logged in as {} ({})",
                account.full_name(),
                account.account_type.as_str()
            );
            print_groups(&account.groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>());
        }
        Command::Logout => {
            state.auth.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => match state.auth.current_user().await? {
            Some(account) => {
                println!("{} ({})", account.full_name(), account.account_type.as_str());
                println!("Date of birth: {}", account.date_of_birth);
                println!("MRN: {}", account.mrn);
                let groups: Vec<String> = account
                    .groups
                    .iter()
                    .map(|g| format!("{} [{}]", g.name, g.id))
                    .collect();
                print_groups(&groups.iter().map(String::as_str).collect::<Vec<_>>());
            }
            None => println!("Not logged in."),
        },
        Command::RemoveGroup { id } => {
            if state.db.delete_group(id).await? {
                println!("Removed group {id}.");
            } else {
                println!("No group with id {id}.");
            }
        }
        Command::Authorize { source } => {
            let access = source_access(&state.settings.effective(), source)?;
            let status = access.request_authorization().await;
            println!("{}", status.message.unwrap_or_default());
            if !status.authorized {
                bail!("health data access not granted");
            }
        }
        Command::Refresh { days, source } => {
            if !state.auth.session().is_authenticated() {
                bail!("not logged in; run `aggregator login` first");
            }
            let settings = state.settings.effective();
            let days = days.unwrap_or(settings.history_days);
            let access = source_access(&settings, source)?;

            let sync = HealthSync::new(Arc::new(access), state.db.clone());
            let summary = sync.refresh(days, Utc::now()).await?;
            if !summary.fetched {
                let message = sync.access().status().message.unwrap_or_default();
                bail!("refresh skipped: {message}");
            }
            println!(
                "Stored {} day records for {} to {}.",
                summary.records_written, summary.first_day, summary.last_day
            );
        }
        Command::Records { metric } => {
            let records = state.db.list_health_records().await?;
            match metric {
                Some(metric) => {
                    for point in data_points(&records, metric) {
                        println!(
                            "{}  {} {}",
                            point.day,
                            metric.format_value(point.value),
                            metric.unit_label()
                        );
                    }
                }
                None => {
                    for record in &records {
                        let values: Vec<String> = MetricKind::ALL
                            .into_iter()
                            .filter_map(|kind| record.value(kind).map(|v| format!("{kind}={v}")))
                            .collect();
                        println!("{}  {}", record.day, values.join(" "));
                    }
                    println!("{} days stored.", state.db.count_health_records().await?);
                }
            }
        }
        Command::Dashboard => {
            let records = state.db.list_health_records().await?;
            for (metric, latest) in dashboard(&records) {
                match latest {
                    Some(latest) => println!(
                        "{:<18} {} {} ({})",
                        metric.display_name(),
                        latest.display_value(),
                        metric.unit_label(),
                        latest.day
                    ),
                    None => println!("{:<18} --", metric.display_name()),
                }
            }
        }
        Command::Detail { day, metric } => {
            let record = state
                .db
                .get_health_record(day)
                .await?
                .ok_or_else(|| anyhow!("no record stored for {day}"))?;
            println!("{}", detail_json(&record, metric)?);
        }
        Command::Config {
            api_url,
            history_days,
            source,
        } => {
            let stored = if api_url.is_some() || history_days.is_some() || source.is_some() {
                state.settings.update(|settings| {
                    if let Some(url) = api_url {
                        settings.api_base_url = url;
                    }
                    if let Some(days) = history_days {
                        settings.history_days = days;
                    }
                    if let Some(path) = source {
                        settings.source_path = Some(path);
                    }
                })?
            } else {
                state.settings.get()
            };
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
    }
    Ok(())
}

fn print_groups(names: &[&str]) {
    if names.is_empty() {
        println!("Groups: none");
    } else {
        println!("Groups: {}", names.join(", "));
    }
}

/// The `--source` flag wins over the configured path for this invocation.
fn source_access(settings: &AppSettings, flag: Option<PathBuf>) -> Result<SourceAccess> {
    let path = flag
        .or_else(|| settings.source_path.clone())
        .context("no health data source configured; pass --source or set it with `aggregator config --source`")?;
    Ok(SourceAccess::new(Arc::new(JsonFileSource::new(path))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_detail_arguments() {
        let cli = Cli::try_parse_from([
            "aggregator",
            "--data-dir",
            "/tmp/agg",
            "detail",
            "2025-01-01",
            "blood_pressure",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Detail {
                day: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                metric: HealthMetricType::BloodPressure,
            }
        );
        assert!(Cli::try_parse_from(["aggregator", "records", "--metric", "mood"]).is_err());
    }

    #[tokio::test]
    async fn refresh_requires_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();

        let err = execute(
            &state,
            Command::Refresh {
                days: Some(1),
                source: Some(dir.path().join("export.json")),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }

    #[tokio::test]
    async fn refresh_stores_recent_samples() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();
        state.auth.session().set_token("tok".into()).unwrap();

        let start = (Utc::now() - Duration::minutes(5)).to_rfc3339();
        let export = format!(
            r#"{{"samples": [{{"type": "heartRate", "start": "{start}", "value": 64, "unit": "count/min",
                 "source": {{"name": "Watch", "bundleIdentifier": "com.apple.health.watch"}}}}]}}"#
        );
        let export_path = dir.path().join("export.json");
        std::fs::write(&export_path, export).unwrap();

        execute(&state, Command::Config {
            api_url: None,
            history_days: Some(2),
            source: Some(export_path),
        })
        .await
        .unwrap();
        execute(&state, Command::Refresh { days: None, source: None })
            .await
            .unwrap();

        let records = state.db.list_health_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value(MetricKind::HeartRate), Some(64.0));
    }

    #[tokio::test]
    async fn authorize_fails_for_missing_export() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).unwrap();

        let result = execute(
            &state,
            Command::Authorize {
                source: Some(dir.path().join("missing.json")),
            },
        )
        .await;
        assert!(result.is_err());
    }
}
