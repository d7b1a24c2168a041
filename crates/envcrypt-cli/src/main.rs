//! envcrypt: end-to-end encrypted .env files shared across a team
//!
//! Commands:
//!   identity new|show            - register or inspect this user's key pair
//!   project new|grant|revoke|show - manage the project key and its members
//!   push --env-file <path>       - seal a .env file as a new version
//!   pull [--version N]           - print a decrypted version
//!   history                      - list versions of the environment
//!   diff <old> <new>             - show which keys changed between versions
//!   rollback <version>           - re-append an older version
//!   config show                  - display the active configuration
//!
//! Records live as JSON under `store.data_dir`; nothing leaves the machine
//! unencrypted.

mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use envcrypt_core::config::EnvcryptConfig;
use envcrypt_core::encoding;
use envcrypt_crypto::{grant, KdfParams, KeyPair, ProjectCreatePayload, ProjectMasterKey, UserIdentity};
use envcrypt_env::{
    diff_versions, parse, pull, pull_latest, push, rollback, Codec, SecretDocument, VersionStore,
};

use workspace::{Grant, ProjectFile, PublicIdentity, Workspace};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "envcrypt",
    version,
    about = "End-to-end encrypted environment files",
    long_about = "envcrypt: seal .env files under a per-project key that only granted members can unwrap"
)]
struct Cli {
    /// Path to envcrypt.toml configuration file
    #[arg(long, short = 'c', env = "ENVCRYPT_CONFIG", default_value = "envcrypt.toml")]
    config: PathBuf,

    /// Data directory (overrides store.data_dir)
    #[arg(long, env = "ENVCRYPT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Environment name (overrides store.env_name)
    #[arg(long, short = 'e', env = "ENVCRYPT_ENV")]
    env: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ENVCRYPT_LOG")]
    log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "ENVCRYPT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage this user's identity key pair
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Manage the project key and who can unwrap it
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Seal a .env file and append it as a new version
    Push {
        /// Path to the .env file
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,
        /// Also print the write payload JSON sent to a version store
        #[arg(long)]
        emit_payload: bool,
    },

    /// Decrypt a version and print it as KEY=VALUE lines
    Pull {
        /// Version to pull (default: latest)
        #[arg(long)]
        version: Option<u32>,
    },

    /// List versions of the environment
    History,

    /// Show which keys were added, removed or modified between two versions
    Diff { old: u32, new: u32 },

    /// Restore an earlier version by appending a copy of it
    Rollback { version: u32 },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityAction {
    /// Generate a key pair and protect the private key with a password
    New {
        #[arg(long)]
        email: String,
        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },
    /// Print the public identity (JSON, suitable for `project grant`)
    Show,
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    /// Create a project key owned by this identity
    New {
        #[arg(long)]
        name: String,
    },
    /// Wrap the project key for another user
    Grant {
        /// Public identity JSON file of the recipient (from `identity show`)
        #[arg(long)]
        recipient: PathBuf,
    },
    /// Remove a member's wrapped key
    Revoke {
        #[arg(long)]
        email: String,
    },
    /// Show project metadata and members
    Show,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EnvcryptConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "envcrypt starting"
    );

    let ws = Workspace::new(cli.data_dir.clone().unwrap_or_else(|| config.store.data_dir.clone()));
    let env_name = cli.env.clone().unwrap_or_else(|| config.store.env_name.clone());
    workspace::validate_env_name(&env_name)?;
    let ctx = Ctx {
        config: &config,
        ws: &ws,
        env_name: &env_name,
        codec: Codec::from(&config.codec),
    };

    match cli.command {
        Commands::Identity { action: IdentityAction::New { email, force } } => {
            cmd_identity_new(&ctx, &email, force)
        }
        Commands::Identity { action: IdentityAction::Show } => cmd_identity_show(&ctx),
        Commands::Project { action: ProjectAction::New { name } } => cmd_project_new(&ctx, &name),
        Commands::Project { action: ProjectAction::Grant { recipient } } => {
            cmd_project_grant(&ctx, &recipient)
        }
        Commands::Project { action: ProjectAction::Revoke { email } } => {
            cmd_project_revoke(&ctx, &email)
        }
        Commands::Project { action: ProjectAction::Show } => cmd_project_show(&ctx),
        Commands::Push { env_file, emit_payload } => cmd_push(&ctx, &env_file, emit_payload),
        Commands::Pull { version } => cmd_pull(&ctx, version),
        Commands::History => cmd_history(&ctx),
        Commands::Diff { old, new } => cmd_diff(&ctx, old, new),
        Commands::Rollback { version } => cmd_rollback(&ctx, version),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `pull` output can be redirected into a file
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

struct Ctx<'a> {
    config: &'a EnvcryptConfig,
    ws: &'a Workspace,
    env_name: &'a str,
    codec: Codec,
}

// ── Password + key access ─────────────────────────────────────────────────────

/// Read the password from ENVCRYPT_PASSWORD, falling back to a terminal prompt.
fn read_password(prompt: &str) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("ENVCRYPT_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    let pw = rpassword::prompt_password(prompt).context("reading password")?;
    Ok(SecretString::from(pw))
}

fn unlock_session(ctx: &Ctx) -> Result<(UserIdentity, KeyPair)> {
    let identity = ctx.ws.load_identity()?;
    let password = read_password(&format!("Password for {}: ", identity.email))?;
    let session = identity
        .unlock(&password)
        .context("unlocking identity (wrong password?)")?;
    Ok((identity, session))
}

/// Unlock this user's identity and run `f` with the project key.
fn with_project_key<T>(
    ctx: &Ctx,
    f: impl FnOnce(&ProjectFile, &ProjectMasterKey) -> Result<T>,
) -> Result<T> {
    let project = ctx.ws.load_project()?;
    let (identity, session) = unlock_session(ctx)?;
    let grant = project
        .grant_for(identity.id)
        .with_context(|| format!("{} has no access to project {}", identity.email, project.project_name))?;

    grant.record.with_pmk(session.secret(), |pmk| f(&project, pmk))
}

// ── `envcrypt identity` ───────────────────────────────────────────────────────

fn cmd_identity_new(ctx: &Ctx, email: &str, force: bool) -> Result<()> {
    if ctx.ws.has_identity() && !force {
        anyhow::bail!(
            "identity already exists in {}; pass --force to replace it",
            ctx.ws.root().display()
        );
    }

    let password = read_password("New password: ")?;
    let params = KdfParams::from(&ctx.config.crypto);
    let (identity, _session) = UserIdentity::create(email, &password, &params)
        .context("creating identity")?;
    ctx.ws.save_identity(&identity)?;

    info!(id = %identity.id, email, "identity registered");
    println!("id:         {}", identity.id);
    println!("email:      {}", identity.email);
    println!("public key: {}", encoding::encode(&identity.public_key));
    Ok(())
}

fn cmd_identity_show(ctx: &Ctx) -> Result<()> {
    let identity = ctx.ws.load_identity()?;
    let public = PublicIdentity::from(&identity);
    println!(
        "{}",
        serde_json::to_string_pretty(&public).context("serializing identity")?
    );
    Ok(())
}

// ── `envcrypt project` ────────────────────────────────────────────────────────

fn cmd_project_new(ctx: &Ctx, name: &str) -> Result<()> {
    if ctx.ws.has_project() {
        anyhow::bail!("a project already exists in {}", ctx.ws.root().display());
    }

    let identity = ctx.ws.load_identity()?;
    let (payload, _pmk) = ProjectCreatePayload::new(name, identity.id, &identity.public_key())
        .context("creating project key")?;

    let project = ProjectFile {
        project_id: Uuid::new_v4(),
        project_name: payload.project_name,
        owner_id: payload.owner_id,
        grants: vec![Grant {
            user_id: identity.id,
            email: identity.email.clone(),
            record: payload.wrapped,
        }],
    };
    ctx.ws.save_project(&project)?;

    info!(project = %project.project_id, name, "project created");
    println!("Created project {} ({})", project.project_name, project.project_id);
    Ok(())
}

fn cmd_project_grant(ctx: &Ctx, recipient_path: &Path) -> Result<()> {
    let recipient: PublicIdentity = workspace::read_json(recipient_path)?;
    let mut project = ctx.ws.load_project()?;
    let (identity, session) = unlock_session(ctx)?;

    let own = project
        .grant_for(identity.id)
        .with_context(|| format!("{} has no access to project {}", identity.email, project.project_name))?;
    let record = grant(&own.record, session.secret(), &recipient.public_key())
        .with_context(|| format!("granting access to {}", recipient.email))?;

    project.upsert_grant(Grant {
        user_id: recipient.id,
        email: recipient.email.clone(),
        record,
    });
    ctx.ws.save_project(&project)?;

    info!(recipient = %recipient.email, "access granted");
    println!("Granted {} access to {}", recipient.email, project.project_name);
    Ok(())
}

fn cmd_project_revoke(ctx: &Ctx, email: &str) -> Result<()> {
    let mut project = ctx.ws.load_project()?;
    let removed = project.revoke(email)?;
    ctx.ws.save_project(&project)?;

    info!(user = %removed.user_id, email, "access revoked");
    println!("Revoked {email}");
    println!("Note: {email} may still hold previously pulled plaintext.");
    Ok(())
}

fn cmd_project_show(ctx: &Ctx) -> Result<()> {
    let project = ctx.ws.load_project()?;
    println!("name:    {}", project.project_name);
    println!("id:      {}", project.project_id);
    println!("owner:   {}", project.owner_id);
    println!("members:");
    for g in &project.grants {
        let role = if g.user_id == project.owner_id { " (owner)" } else { "" };
        println!("  {} {}{role}", g.user_id, g.email);
    }
    Ok(())
}

// ── `envcrypt push` / `pull` / `history` / `diff` / `rollback` ────────────────

fn cmd_push(ctx: &Ctx, env_file: &Path, emit_payload: bool) -> Result<()> {
    let raw = std::fs::read(env_file)
        .with_context(|| format!("reading env file: {}", env_file.display()))?;
    let doc = parse(&raw).with_context(|| format!("parsing {}", env_file.display()))?;

    with_project_key(ctx, |project, pmk| {
        let mut store = ctx.ws.load_history(project, ctx.env_name)?;
        let version = push(&mut store, &ctx.codec, pmk, &doc).context("sealing document")?;
        ctx.ws.save_history(&store)?;

        println!("Pushed {} as version {version} ({} keys)", ctx.env_name, doc.len());
        if emit_payload {
            let payload = store.write_payload(version)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("serializing payload")?
            );
        }
        Ok(())
    })
}

fn print_document(doc: &SecretDocument) {
    for (key, value) in doc.iter() {
        println!("{key}={value}");
    }
}

fn cmd_pull(ctx: &Ctx, version: Option<u32>) -> Result<()> {
    with_project_key(ctx, |project, pmk| {
        let store = ctx.ws.load_history(project, ctx.env_name)?;
        let (version, doc) = match version {
            Some(v) => (v, pull(&store, &ctx.codec, pmk, v)?),
            None => pull_latest(&store, &ctx.codec, pmk)
                .with_context(|| format!("{} has no versions yet", ctx.env_name))?,
        };
        debug!(version, entries = doc.len(), "pulled");
        print_document(&doc);
        Ok(())
    })
}

fn cmd_history(ctx: &Ctx) -> Result<()> {
    let project = ctx.ws.load_project()?;
    let store = ctx.ws.load_history(&project, ctx.env_name)?;

    if store.records().is_empty() {
        println!("{}: no versions", ctx.env_name);
        return Ok(());
    }

    println!("{:<8}  {:<9}  BYTES", "VERSION", "TYPE");
    for record in store.records() {
        println!(
            "{:<8}  {:<9}  {}",
            record.version,
            record.metadata.kind,
            record.sealed.ciphertext.len()
        );
    }
    Ok(())
}

fn cmd_diff(ctx: &Ctx, old: u32, new: u32) -> Result<()> {
    with_project_key(ctx, |project, pmk| {
        let store = ctx.ws.load_history(project, ctx.env_name)?;
        let d = diff_versions(&store, &ctx.codec, pmk, old, new)?;

        println!("v{old} → v{new}: {}", d.summary());
        for key in &d.added {
            println!("+ {key}");
        }
        for key in &d.removed {
            println!("- {key}");
        }
        for key in &d.modified {
            println!("~ {key}");
        }
        Ok(())
    })
}

fn cmd_rollback(ctx: &Ctx, version: u32) -> Result<()> {
    with_project_key(ctx, |project, pmk| {
        let mut store = ctx.ws.load_history(project, ctx.env_name)?;
        let new_version = rollback(&mut store, &ctx.codec, pmk, version)?;
        ctx.ws.save_history(&store)?;
        println!("Restored version {version} as version {new_version}");
        Ok(())
    })
}

// ── `envcrypt config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &EnvcryptConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
