use anyhow::anyhow;
use camino::Utf8PathBuf;
use caravel_cli::{commands, profiles, LoginArgs};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage profiles (saved host/path pairs)
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Print the parsed remote inventory
    List {
        #[arg(long, required_unless_present = "profile")]
        host: Option<String>,
        #[arg(short, long, help = "Use settings from a named profile")]
        profile: Option<String>,
        #[arg(long, help = "Emit the inventory as JSON")]
        json: bool,
        #[command(flatten)]
        login: LoginArgs,
    },
    /// Compare remote and local state without transferring anything
    Check {
        /// Local sync directory
        path: Option<Utf8PathBuf>,
        #[arg(long, required_unless_present = "profile")]
        host: Option<String>,
        #[arg(short, long, help = "Use settings from a named profile")]
        profile: Option<String>,
        #[command(flatten)]
        login: LoginArgs,
    },
    /// Download missing or size-mismatched files
    Sync {
        /// Local sync directory
        path: Option<Utf8PathBuf>,
        #[arg(long, required_unless_present = "profile")]
        host: Option<String>,
        #[arg(short, long, help = "Use settings from a named profile")]
        profile: Option<String>,
        #[arg(long, help = "Delete remote copies once replicated locally")]
        purge: bool,
        #[arg(long, help = "Re-scan after downloading and report residual mismatches")]
        verify: bool,
        #[arg(short, long, default_value_t = caravel_config::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        #[arg(long)]
        limit_mb: Option<u64>,
        #[command(flatten)]
        login: LoginArgs,
    },
    /// Delete remote files that already exist locally
    Purge {
        /// Local sync directory
        path: Option<Utf8PathBuf>,
        #[arg(long, required_unless_present = "profile")]
        host: Option<String>,
        #[arg(short, long, help = "Use settings from a named profile")]
        profile: Option<String>,
        #[command(flatten)]
        login: LoginArgs,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    List,
    Add {
        #[arg(long, help = "Unique slug ID for the profile")]
        id: String,
        name: String,
        host: String,
        path: Utf8PathBuf,
    },
    Remove {
        name: String,
    },
}

/// Resolve the effective host and sync directory: a named profile wins,
/// otherwise the explicit host plus the given or default path.
fn resolve_target(
    host: Option<String>,
    path: Option<Utf8PathBuf>,
    profile: Option<String>,
) -> anyhow::Result<(String, Utf8PathBuf)> {
    if let Some(name) = profile {
        let mgr = profiles::ProfileManager::new();
        let p = mgr.find(&name)?;
        return Ok((p.host, Utf8PathBuf::from(p.local_path)));
    }
    let host = host.ok_or_else(|| anyhow!("--host is required without --profile"))?;
    let path = path.unwrap_or_else(|| Utf8PathBuf::from(caravel_config::DEFAULT_SYNC_DIR));
    Ok((host, path))
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::List => profiles::handle_list()?,
            ProfileCommands::Add {
                id,
                name,
                host,
                path,
            } => profiles::handle_add(id, name, host, path)?,
            ProfileCommands::Remove { name } => profiles::handle_remove(name)?,
        },
        Commands::List {
            host,
            profile,
            json,
            login,
        } => {
            let (host, _path) = resolve_target(host, None, profile)?;
            commands::cmd_list(host, &login, json).await?;
        }
        Commands::Check {
            path,
            host,
            profile,
            login,
        } => {
            let (host, path) = resolve_target(host, path, profile)?;
            commands::cmd_check(host, path, &login).await?;
        }
        Commands::Sync {
            path,
            host,
            profile,
            purge,
            verify,
            concurrency,
            limit_mb,
            login,
        } => {
            let (host, path) = resolve_target(host, path, profile)?;
            commands::cmd_sync(host, path, &login, purge, verify, concurrency, limit_mb).await?;
        }
        Commands::Purge {
            path,
            host,
            profile,
            login,
        } => {
            let (host, path) = resolve_target(host, path, profile)?;
            commands::cmd_purge(host, path, &login).await?;
        }
    }

    Ok(())
}
