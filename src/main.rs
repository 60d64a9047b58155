//! Operator CLI for the chitbook ledger. Every subcommand prints JSON.
//!
//! Usage:
//!   chitbook migrate
//!   chitbook bootstrap-admin <name> <email>
//!   chitbook backup
//!   chitbook sync-receivables
//!   chitbook gst-report <from YYYY-MM-DD> <to YYYY-MM-DD>
//!   chitbook fund-summary <fund-id>

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use serde::Serialize;

use chitbook_lib::db::LedgerDb;
use chitbook_lib::db_backup;
use chitbook_lib::queries::reports;
use chitbook_lib::services::{ledger, users};
use chitbook_lib::state::{database_path, load_config};

const USAGE: &str = "usage: chitbook <migrate | bootstrap-admin <name> <email> | backup | sync-receivables | gst-report <from> <to> | fund-summary <fund-id>>";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrateOutput {
    database: String,
    schema_version: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupOutput {
    backup: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncOutput {
    inserted: usize,
}

fn parse_date(arg: Option<&String>, name: &str) -> anyhow::Result<NaiveDate> {
    let raw = arg.ok_or_else(|| anyhow!("missing <{name}>\n{USAGE}"))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("<{name}> must be YYYY-MM-DD, got '{raw}'"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    let config = load_config().map_err(|e| anyhow!("failed to load config: {e}"))?;
    let path = database_path(&config).map_err(|e| anyhow!("{e}"))?;

    match command.as_str() {
        "migrate" => {
            let db = LedgerDb::open_at(path.clone())
                .with_context(|| format!("failed to open {}", path.display()))?;
            print_json(&MigrateOutput {
                database: path.display().to_string(),
                schema_version: db.schema_version()?,
            })
        }
        "bootstrap-admin" => {
            let name = args.get(1).ok_or_else(|| anyhow!("missing <name>\n{USAGE}"))?;
            let email = args.get(2).ok_or_else(|| anyhow!("missing <email>\n{USAGE}"))?;
            let db = LedgerDb::open_at(path.clone())
                .with_context(|| format!("failed to open {}", path.display()))?;
            print_json(&users::bootstrap_admin(&db, name, email)?)
        }
        "backup" => {
            let db = LedgerDb::open_at(path.clone())
                .with_context(|| format!("failed to open {}", path.display()))?;
            let backup = db_backup::backup_database(&db)?;
            print_json(&BackupOutput {
                backup: backup.display().to_string(),
            })
        }
        "sync-receivables" => {
            let db = LedgerDb::open_at(path.clone())
                .with_context(|| format!("failed to open {}", path.display()))?;
            let inserted = ledger::sync_receivables(&db)?;
            print_json(&SyncOutput { inserted })
        }
        "gst-report" => {
            let from = parse_date(args.get(1), "from")?;
            let to = parse_date(args.get(2), "to")?;
            let db = LedgerDb::open_readonly_at(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            print_json(&reports::gst_summary(&db, &config.gst, from, to)?)
        }
        "fund-summary" => {
            let fund_id = args
                .get(1)
                .ok_or_else(|| anyhow!("missing <fund-id>\n{USAGE}"))?;
            let db = LedgerDb::open_readonly_at(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            print_json(&reports::fund_summary(&db, fund_id)?)
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
}
