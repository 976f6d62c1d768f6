// DMS2
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! DMS2 authorization CLI
//!
//! Evaluates permission checks against a JSON fixture of users, groups,
//! memberships and documents.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dms_authz::models::{ResourceRef, UserId};
use dms_authz::store::MemoryStore;
use dms_authz::{AuthorizationService, AuthzConfig, Capability};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for a denied check
const EXIT_DENIED: i32 = 2;

#[derive(Parser)]
#[command(name = "dms-authz")]
#[command(about = "DMS2 authorization - permission evaluation CLI")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a user holds a capability, optionally on a resource
    Check {
        /// JSON fixture with users, groups, memberships and documents
        #[arg(long)]
        fixture: PathBuf,
        /// User ID
        #[arg(long)]
        user: UserId,
        /// Capability name, e.g. view_files
        #[arg(long)]
        capability: String,
        /// Resource as <type>:<id>, e.g. company:5 or document:100
        #[arg(long)]
        resource: Option<ResourceRef>,
    },
    /// Print the effective grants of a user as JSON
    Grants {
        /// JSON fixture with users, groups, memberships and documents
        #[arg(long)]
        fixture: PathBuf,
        /// User ID
        #[arg(long)]
        user: UserId,
    },
    /// Load configuration from the environment and report it
    ValidateConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config = match AuthzConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Check {
            fixture,
            user,
            capability,
            resource,
        } => match handle_check(config, &fixture, user, &capability, resource).await {
            Ok(true) => {
                println!("allow");
                Ok(())
            }
            Ok(false) => {
                println!("deny");
                process::exit(EXIT_DENIED);
            }
            Err(e) => Err(e),
        },
        Commands::Grants { fixture, user } => handle_grants(config, &fixture, user).await.map(|json| println!("{json}")),
        Commands::ValidateConfig => {
            println!("{}", describe_config(&config));
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn load_service(config: AuthzConfig, fixture: &Path) -> anyhow::Result<AuthorizationService> {
    let store = MemoryStore::from_json_file(fixture).with_context(|| format!("loading fixture {}", fixture.display()))?;
    Ok(AuthorizationService::new(config, Arc::new(store)))
}

async fn handle_check(config: AuthzConfig, fixture: &Path, user_id: UserId, capability: &str, resource: Option<ResourceRef>) -> anyhow::Result<bool> {
    let service = load_service(config, fixture)?;

    let allowed = match resource {
        None => service.authorizer().has_permission_named(user_id, capability).await?,
        Some(resource) => match capability.parse::<Capability>() {
            Ok(capability) => service.can_access_resource(user_id, capability, resource.resource_type, resource.id).await?,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Unknown capability requested, denying");
                false
            }
        },
    };

    info!(user_id = %user_id, capability = %capability, resource = ?resource, allowed = %allowed, "Check evaluated");
    Ok(allowed)
}

async fn handle_grants(config: AuthzConfig, fixture: &Path, user_id: UserId) -> anyhow::Result<String> {
    let service = load_service(config, fixture)?;
    let grants = service.effective_grants(user_id).await?;

    info!(user_id = %user_id, capabilities = grants.grants.len(), "Grants resolved");
    Ok(serde_json::to_string_pretty(&grants)?)
}

fn describe_config(config: &AuthzConfig) -> String {
    let capabilities: Vec<&str> = config.capabilities.iter().map(|capability| capability.as_str()).collect();

    format!(
        "permission_model: {}\ncapabilities: {}\ndeny_redirect: {}\naudit_max_events: {}\nslow_check_ms: {}",
        config.permission_model,
        capabilities.join(","),
        config.deny_redirect,
        config.audit_max_events,
        config.slow_check_threshold.as_millis()
    )
}
