//! topicmesh CLI
//!
//! Resolves a spec document and prints its canonical topics or the access
//! bindings it implies, as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use topicmesh_core::{load_spec, AccessBinding, DomainCatalog, DomainId, DomainModel};
use tracing::{debug, Level};

#[derive(Parser, Debug)]
#[command(name = "topicmesh")]
#[command(about = "Declarative topic ownership for multi-tenant broker clusters")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: Level,

    /// Enable JSON log format
    #[arg(long, env = "LOG_JSON", default_value = "false", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Canonical topic of every channel, and whether the domain owns it
    Topics(SpecArgs),

    /// Access bindings derived from the document
    Acls(SpecArgs),
}

#[derive(clap::Args, Debug)]
struct SpecArgs {
    /// Spec document (YAML or JSON)
    #[arg(short, long)]
    spec: PathBuf,

    /// Other domain roots absolute channel names may refer to
    #[arg(short = 'k', long = "known-domain")]
    known_domains: Vec<String>,
}

impl SpecArgs {
    fn resolve(&self) -> Result<DomainModel> {
        let spec = load_spec(&self.spec)?;

        let catalog = self
            .known_domains
            .iter()
            .map(|raw| DomainId::parse(raw).with_context(|| format!("invalid --known-domain '{raw}'")))
            .collect::<Result<DomainCatalog>>()?;

        let model = DomainModel::resolve(&spec, &catalog)
            .with_context(|| format!("failed to resolve {}", self.spec.display()))?;
        debug!(domain = %model.domain(), channels = model.channels().len(), "Resolved spec");
        Ok(model)
    }
}

#[derive(Serialize)]
struct TopicEntry {
    channel: String,
    owned: bool,
}

#[derive(Serialize)]
struct TopicListing {
    domain: String,
    topics: BTreeMap<String, TopicEntry>,
}

#[derive(Serialize)]
struct AclListing<'a> {
    domain: String,
    bindings: Vec<&'a AccessBinding>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let output = match &cli.command {
        Commands::Topics(args) => {
            let model = args.resolve()?;
            let listing = TopicListing {
                domain: model.domain().to_string(),
                topics: model
                    .channels()
                    .iter()
                    .map(|(topic, channel)| {
                        (
                            topic.clone(),
                            TopicEntry {
                                channel: channel.name.clone(),
                                owned: channel.is_owned(model.domain()),
                            },
                        )
                    })
                    .collect(),
            };
            serde_json::to_string_pretty(&listing)?
        }
        Commands::Acls(args) => {
            let model = args.resolve()?;
            let listing = AclListing {
                domain: model.domain().to_string(),
                bindings: model.access_bindings().iter().collect(),
            };
            serde_json::to_string_pretty(&listing)?
        }
    };

    println!("{output}");
    Ok(())
}

fn init_logging(cli: &Cli) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
