//! GOsa ACL command line
//!
//! Loads the configured rules and answers access queries against them.

use clap::{Parser, Subcommand};
use gosa_acl::{
    AclResolver,
    acl::Options,
    config::{LogFormat, load_config},
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// GOsa ACL engine - scoped, role-aware permission checks
#[derive(Parser, Debug)]
#[command(name = "gosa-acl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GOSA_ACL_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "GOSA_ACL_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a subject holds a permission on a topic
    Check {
        /// Subject (user name) to check
        #[arg(short, long)]
        subject: String,

        /// Topic, e.g. org.gosa.command.getSessionUser
        #[arg(short, long)]
        topic: String,

        /// Single permission character out of rwcdsxem
        #[arg(short, long)]
        perm: char,

        /// Resource path; defaults to the configured root
        #[arg(short, long)]
        base: Option<String>,

        /// Option value as key=value, may be repeated
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },

    /// Load and validate the configuration, then exit
    Validate,

    /// Print the configured ACL sets as JSON
    List {
        /// Only sets at or below this base
        #[arg(short, long)]
        base: Option<String>,

        /// Only entries whose actions (or roles) cover this topic
        #[arg(short, long)]
        topic: Option<String>,
    },
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("invalid option '{}': expected key=value", s))
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging is set up so its level can apply
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json) = match config.logging.format {
        LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting gosa-acl");

    let resolver = AclResolver::from_config(&config.acl)
        .inspect_err(|e| error!(error = %e, "Failed to build ACL resolver"))?;

    match args.command {
        Command::Check {
            subject,
            topic,
            perm,
            base,
            options,
        } => {
            let options: Options = options.into_iter().collect();
            let options = (!options.is_empty()).then_some(&options);

            let allowed = resolver.check(&subject, &topic, perm, options, base.as_deref())?;
            println!("{}", if allowed { "allowed" } else { "denied" });

            Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Validate => {
            println!(
                "configuration ok: {} ACL set(s), {} role(s), {} admin(s)",
                resolver.set_count(),
                resolver.role_count(),
                resolver.admins().len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::List { base, topic } => {
            let sets = resolver.get_acls(base.as_deref(), topic.as_deref());
            println!("{}", serde_json::to_string_pretty(&sets)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
