use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

mod command;
mod config;
mod error;
mod exec;
mod logging;
mod packages;
mod prompt;
mod runner;
mod secrets;
mod settings;
mod share;
mod user;

use command::ShareCommandBuilder;
use error::{Error, PackageFailure};
use exec::{CommandRunner, DryRunRunner, ShellRunner};
use prompt::{CredentialPrompt, Credentials, KeyringPrompt, TerminalPrompt};
use runner::{Mounter, ShareOutcome};
use settings::Settings;
use share::ShareRecord;
use user::HostUser;

#[derive(Parser)]
#[command(name = "mount-smb-shares", version)]
#[command(about = "Mount SMB/CIFS shares described in an INI file", long_about = None)]
struct Cli {
    /// Share file (default: ~/.pygmount.rc)
    #[arg(short, long, global = true, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Enables verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the commands instead of running them
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Settings file (default: ~/.config/mount-smb-shares/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Do not append to the log file
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount all configured shares (default)
    Mount {
        /// Only mount the named shares
        #[arg(long, value_name = "NAME")]
        only: Vec<String>,

        /// Do not check or install required packages
        #[arg(long)]
        skip_packages: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unmount all configured shares
    Unmount {
        /// Only unmount the named shares
        #[arg(long, value_name = "NAME")]
        only: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured shares
    List {
        /// Print shares as JSON (passwords omitted)
        #[arg(long)]
        json: bool,
    },

    /// Show the mount and umount commands for each share
    Show {
        /// Only show the named shares
        #[arg(long, value_name = "NAME")]
        only: Vec<String>,
    },

    /// Store domain credentials in the keyring
    StoreCredentials {
        /// Domain username (prompted if omitted)
        #[arg(long)]
        username: Option<String>,

        /// Keyring profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Remove domain credentials from the keyring
    ForgetCredentials {
        /// Keyring profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let code = match err.downcast_ref::<Error>() {
        Some(Error::ConfigNotFound(_)) => 5,
        Some(Error::EmptyUsername) => 2,
        Some(Error::EmptyPassword) => 3,
        Some(Error::PackageInstall {
            reason: PackageFailure::PermissionDenied,
            ..
        }) => 20,
        Some(Error::PackageInstall { .. }) => 21,
        _ => 1,
    };
    ExitCode::from(code)
}

struct RunContext {
    user: HostUser,
    home: PathBuf,
    settings: Settings,
    dry_run: bool,
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let user = HostUser::current()?;
    let home = user.home_dir()?;
    let settings = Settings::load(cli.settings.as_deref(), &home)?;

    let log_file = (settings.log_to_file && !cli.no_log_file).then(|| settings.log_file_path(&home));
    logging::init(cli.verbose, log_file.as_deref());

    info!(
        "Start run with '{}'{} at {}",
        user.name,
        if user.via_sudo { " (via sudo)" } else { "" },
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let config_path = cli
        .file
        .clone()
        .unwrap_or_else(|| settings.default_config_path(&home));
    debug!("Share file: {}", config_path.display());

    let ctx = RunContext {
        user,
        home,
        settings,
        dry_run: cli.dry_run,
    };

    match cli.command.unwrap_or(Commands::Mount {
        only: Vec::new(),
        skip_packages: false,
        json: false,
    }) {
        Commands::Mount {
            only,
            skip_packages,
            json,
        } => mount_shares(&ctx, &config_path, &only, skip_packages, json).await,
        Commands::Unmount { only, json } => unmount_shares(&ctx, &config_path, &only, json).await,
        Commands::List { json } => {
            list_shares(&ctx, &config_path, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { only } => {
            show_commands(&ctx, &config_path, &only)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::StoreCredentials { username, profile } => {
            store_credentials(&ctx, username, profile).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ForgetCredentials { profile } => {
            forget_credentials(&ctx, profile).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_shares(ctx: &RunContext, path: &Path, only: &[String]) -> Result<Vec<ShareRecord>> {
    let shares = config::read_shares(path, &ctx.home)
        .with_context(|| format!("Cannot read shares from {}", path.display()))?;

    if only.is_empty() {
        return Ok(shares);
    }

    for name in only {
        if !shares.iter().any(|s| &s.name == name) {
            anyhow::bail!("No share named '{}' in {}", name, path.display());
        }
    }
    Ok(shares
        .into_iter()
        .filter(|s| only.contains(&s.name))
        .collect())
}

fn command_runner(ctx: &RunContext) -> Box<dyn CommandRunner> {
    if ctx.dry_run {
        Box::new(DryRunRunner::new())
    } else {
        Box::new(ShellRunner::new(ctx.settings.command_timeout()))
    }
}

async fn ensure_packages(ctx: &RunContext) -> Result<()> {
    let runner = ShellRunner::new(ctx.settings.command_timeout());
    let installer = packages::PackageInstaller::new(&runner);

    for package in &ctx.settings.required_packages {
        match installer.ensure(package).await {
            Ok(()) => {}
            Err(Error::PackageInstall {
                reason: PackageFailure::NotAvailable,
                ..
            }) => {
                warn!("Package '{}' is not available in this distribution", package);
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Required package '{}' is missing; run as root or install it manually",
                    package
                ))
            }
        }
    }
    Ok(())
}

async fn domain_credentials(ctx: &RunContext) -> Result<Credentials> {
    let credentials = if ctx.settings.use_keyring {
        KeyringPrompt::new(ctx.settings.keyring_profile.clone(), TerminalPrompt)
            .domain_credentials(&ctx.user.name)
            .await?
    } else {
        TerminalPrompt.domain_credentials(&ctx.user.name).await?
    };
    Ok(credentials)
}

async fn mount_shares(
    ctx: &RunContext,
    config_path: &Path,
    only: &[String],
    skip_packages: bool,
    json: bool,
) -> Result<ExitCode> {
    let shares = load_shares(ctx, config_path, only)?;
    if shares.is_empty() {
        println!("No shares configured in {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if skip_packages || ctx.dry_run {
        debug!("Skipping required package check");
    } else {
        ensure_packages(ctx).await?;
    }

    if !ctx.dry_run && !user::is_root() {
        warn!("Not running as root; mount will most likely be refused");
    }

    let credentials = if shares.iter().all(ShareRecord::has_credentials) {
        None
    } else {
        Some(domain_credentials(ctx).await?)
    };

    let builder = ShareCommandBuilder::new()
        .credentials(credentials.as_ref())
        .host_user(Some(ctx.user.name.as_str()));
    let runner = command_runner(ctx);
    let outcomes = Mounter::new(runner.as_ref(), builder)
        .dry_run(ctx.dry_run)
        .settle(ctx.settings.unmount_settle())
        .mount_all(&shares)
        .await;

    report(&outcomes, json)
}

async fn unmount_shares(
    ctx: &RunContext,
    config_path: &Path,
    only: &[String],
    json: bool,
) -> Result<ExitCode> {
    let shares = load_shares(ctx, config_path, only)?;
    let runner = command_runner(ctx);
    let outcomes = Mounter::new(runner.as_ref(), ShareCommandBuilder::new())
        .dry_run(ctx.dry_run)
        .unmount_all(&shares)
        .await;

    report(&outcomes, json)
}

fn report(outcomes: &[ShareOutcome], json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
    } else {
        for outcome in outcomes {
            let mark = if outcome.success() { "✓" } else { "✗" };
            println!(
                "{} {} -> {} (exit code {})",
                mark,
                outcome.name,
                outcome.mountpoint.display(),
                outcome.code
            );
            if !outcome.success() {
                if let Some(detail) = outcome.error.as_deref().or(outcome.output.as_deref()) {
                    println!("    {}", detail.trim());
                }
            }
        }
    }

    let failures = outcomes.iter().filter(|o| !o.success()).count();
    if failures > 0 {
        warn!("{} of {} shares failed", failures, outcomes.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_shares(ctx: &RunContext, config_path: &Path, json: bool) -> Result<()> {
    let shares = load_shares(ctx, config_path, &[])?;

    if json {
        println!("{}", serde_json::to_string_pretty(&shares)?);
        return Ok(());
    }

    if shares.is_empty() {
        println!("No shares configured.");
        println!("\nAdd a section to {}:", config_path.display());
        println!("  [docs]");
        println!("  hostname = fileserver.example.com");
        println!("  share = documents");
        return Ok(());
    }

    println!("Configured shares:\n");
    for share in shares {
        println!("  {}", share.name);
        println!("    Service:     {}", command::service(&share.hostname, &share.share));
        println!("    Mount point: {}", share.mountpoint.display());
        if let Some(username) = &share.username {
            println!("    Username:    {}", username);
        }
        if !share.options.is_empty() {
            println!("    Options:     {}", share.options);
        }
        println!();
    }
    Ok(())
}

fn show_commands(ctx: &RunContext, config_path: &Path, only: &[String]) -> Result<()> {
    let shares = load_shares(ctx, config_path, only)?;
    let builder = ShareCommandBuilder::new().host_user(Some(ctx.user.name.as_str()));

    for share in &shares {
        let command = builder.build(share);
        println!("[{}]", share.name);
        println!("  {}", command.redacted());
        println!("  {}", command.umount);
    }
    Ok(())
}

async fn store_credentials(
    ctx: &RunContext,
    username: Option<String>,
    profile: Option<String>,
) -> Result<()> {
    let profile = profile.unwrap_or_else(|| ctx.settings.keyring_profile.clone());
    let default_user = username.unwrap_or_else(|| ctx.user.name.clone());

    let credentials = TerminalPrompt.domain_credentials(&default_user).await?;

    let store = secrets::SecretStore::new().await?;
    store.store_credentials(&profile, &credentials).await?;

    println!("\n✓ Credentials for '{}' stored in profile '{}'", credentials.username, profile);
    if !ctx.settings.use_keyring {
        println!("\nSet `use_keyring = true` in settings.toml to use them when mounting.");
    }
    Ok(())
}

async fn forget_credentials(ctx: &RunContext, profile: Option<String>) -> Result<()> {
    let profile = profile.unwrap_or_else(|| ctx.settings.keyring_profile.clone());

    let store = secrets::SecretStore::new().await?;
    let removed = store.clear_credentials(&profile).await?;

    if removed == 0 {
        println!("No credentials stored in profile '{}'", profile);
    } else {
        println!("✓ Removed credentials from profile '{}'", profile);
    }
    Ok(())
}
