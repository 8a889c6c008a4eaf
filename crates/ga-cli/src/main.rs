use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::decide::{self, DecideAction};
use commands::reconcile::{reconcile_file, ReconcileArgs};
use commands::load_engine_config;

#[derive(Parser)]
#[command(name = "ga")]
#[command(about = "Guide audit reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a guide file (JSON or CSV) and print its pendencies
    Reconcile {
        /// Guide file; `.csv` is read as one row per procedure
        #[arg(long)]
        guide: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Contract list YAML (overrides /contracts/path)
        #[arg(long)]
        contracts: Option<String>,

        /// Reference tables YAML (overrides /reference/tables_path)
        #[arg(long)]
        reference: Option<String>,

        /// Contract evaluation date, YYYY-MM-DD (default: today)
        #[arg(long)]
        as_of: Option<String>,

        /// Print the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Export a guide's approved procedures from the database
    Export {
        #[arg(long)]
        guide_id: String,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Approve, reject or reset one procedure in the database
    Decide {
        #[command(subcommand)]
        cmd: DecideCmd,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,

        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Audit mirror utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(clap::Args)]
struct DecideCommon {
    #[arg(long)]
    procedure_id: String,

    /// Auditor identity recorded on the audit log entry
    #[arg(long)]
    actor: String,

    #[arg(long)]
    as_of: Option<String>,

    #[arg(long = "config")]
    config_paths: Vec<String>,
}

#[derive(Subcommand)]
enum DecideCmd {
    Approve {
        #[command(flatten)]
        common: DecideCommon,
    },
    Reject {
        #[command(flatten)]
        common: DecideCommon,

        /// Rejection category (e.g. VALUE_DIVERGENCE, INCORRECT_CODE)
        #[arg(long)]
        category: String,

        /// Justification, at least 10 characters
        #[arg(long)]
        reason: String,
    },
    Reset {
        #[command(flatten)]
        common: DecideCommon,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
    /// Store a guide file (JSON or CSV) with all procedures PENDING
    LoadGuide {
        #[arg(long)]
        file: String,
    },
    /// Store a contract list YAML
    LoadContracts {
        #[arg(long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit JSONL mirror
    Verify {
        #[arg(long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; silent when the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Reconcile {
            guide,
            config_paths,
            contracts,
            reference,
            as_of,
            json,
        } => reconcile_file(ReconcileArgs {
            guide,
            config_paths,
            contracts,
            reference,
            as_of,
            json,
        })?,

        Commands::Export {
            guide_id,
            out,
            config_paths,
        } => {
            let cfg = load_engine_config(&config_paths)?;
            decide::export(&cfg, &guide_id, out.as_deref()).await?;
        }

        Commands::Decide { cmd } => {
            let (common, action) = match cmd {
                DecideCmd::Approve { common } => (common, DecideAction::Approve),
                DecideCmd::Reject {
                    common,
                    category,
                    reason,
                } => (common, DecideAction::Reject { category, reason }),
                DecideCmd::Reset { common } => (common, DecideAction::Reset),
            };
            let cfg = load_engine_config(&common.config_paths)?;
            decide::decide(
                &cfg,
                &common.procedure_id,
                &common.actor,
                action,
                common.as_of.as_deref(),
            )
            .await?;
        }

        Commands::Db { cmd, config_paths } => {
            let cfg = load_engine_config(&config_paths)?;
            match cmd {
                DbCmd::Status => {
                    let pool = decide::connect(&cfg).await?;
                    let s = ga_db::status(&pool).await?;
                    println!("db_ok={} has_procedures_table={}", s.ok, s.has_procedures_table);
                }
                DbCmd::Migrate => {
                    let pool = decide::connect(&cfg).await?;
                    ga_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::LoadGuide { file } => decide::load_guide(&cfg, &file).await?,
                DbCmd::LoadContracts { file } => decide::load_contract_file(&cfg, &file).await?,
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = ga_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => match ga_audit::verify_hash_chain(&path)? {
                ga_audit::VerifyResult::Valid { lines } => {
                    println!("chain_valid=true lines={}", lines);
                }
                ga_audit::VerifyResult::Broken { line, reason } => {
                    println!("chain_valid=false line={} reason={}", line, reason);
                    anyhow::bail!("audit chain broken at line {line}: {reason}");
                }
            },
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
