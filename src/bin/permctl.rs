//! permctl
//!
//! Evaluate permission checks against a policy seed file from the command line

use clap::{Args, Parser, Subcommand};
use permission_engine::iam::{
    Action, AuthorizationEngine, GroupId, InMemoryGroupLookup, InMemoryPolicyStore,
    PredefinedRole, ProfileId, UserId,
};
use permission_engine::service::{CreatePolicyCmd, PolicyService};
use permission_engine::EngineConfig;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "permctl")]
#[command(about = "Evaluate permission policies for a profile")]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Custom policies to load (JSON array of create commands)
    #[arg(short = 'p', long)]
    policies: Option<PathBuf>,

    /// Group memberships (JSON object: user id -> [group id])
    #[arg(short = 'g', long)]
    groups: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide a single action
    Check {
        #[command(flatten)]
        principal: Principal,

        /// Action to authorize, e.g. service.create
        #[arg(short = 'a', long)]
        action: String,

        /// Resource id; omitted means any resource
        #[arg(long)]
        resource: Option<String>,
    },
    /// List every policy that applies to the principal
    Effective {
        #[command(flatten)]
        principal: Principal,
    },
    /// List allowed action patterns
    Allowed {
        #[command(flatten)]
        principal: Principal,
    },
    /// Print the predefined role table
    Roles,
}

#[derive(Args, Debug)]
struct Principal {
    #[arg(long)]
    profile: String,

    #[arg(short = 'u', long)]
    user: String,

    /// Role name, repeatable
    #[arg(short = 'r', long = "role")]
    roles: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleView {
    role: &'static str,
    description: &'static str,
    action_patterns: Vec<&'static str>,
}

fn load_groups(path: &PathBuf) -> Result<InMemoryGroupLookup, Box<dyn std::error::Error>> {
    let raw: HashMap<String, Vec<String>> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let memberships = raw
        .into_iter()
        .map(|(user, groups)| {
            let groups: BTreeSet<GroupId> = groups.into_iter().map(GroupId::from).collect();
            (UserId::from(user), groups)
        })
        .collect();
    Ok(InMemoryGroupLookup::from_map(memberships))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr, JSON results to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };

    let groups = match &cli.groups {
        Some(path) => {
            info!("Loading group memberships from {:?}", path);
            load_groups(path)?
        }
        None => InMemoryGroupLookup::new(),
    };

    let store = Arc::new(InMemoryPolicyStore::new());
    let engine = Arc::new(AuthorizationEngine::with_config(
        store.clone(),
        Arc::new(groups),
        &config,
    ));
    let service = PolicyService::new(store.clone(), engine.clone());

    if let Some(path) = &cli.policies {
        let seeds: Vec<CreatePolicyCmd> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        for seed in seeds {
            service.create_policy(seed)?;
        }
        info!("Loaded {} custom policies from {:?}", store.len(), path);
    }

    match cli.command {
        Command::Check {
            principal,
            action,
            resource,
        } => {
            let decision = engine.check_permission(
                &ProfileId::from(principal.profile),
                &UserId::from(principal.user),
                principal.roles.as_slice(),
                &Action::parse(action)?,
                resource.as_deref(),
            )?;
            print_json(&decision)?;
        }
        Command::Effective { principal } => {
            let policies = service.effective_permissions(
                &ProfileId::from(principal.profile),
                &UserId::from(principal.user),
                principal.roles.as_slice(),
            )?;
            print_json(&policies)?;
        }
        Command::Allowed { principal } => {
            let actions = engine.allowed_actions(
                &ProfileId::from(principal.profile),
                &UserId::from(principal.user),
                principal.roles.as_slice(),
            )?;
            print_json(&actions)?;
        }
        Command::Roles => {
            let roles: Vec<RoleView> = PredefinedRole::ALL
                .iter()
                .map(|role| RoleView {
                    role: role.name(),
                    description: role.description(),
                    action_patterns: role.grants().iter().map(|g| g.action).collect(),
                })
                .collect();
            print_json(&roles)?;
        }
    }

    Ok(())
}
