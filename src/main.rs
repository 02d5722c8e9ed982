//! authguard command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use authguard::cli::{Cli, Command};
use authguard::config::Config;
use authguard::rbac::RbacEngine;
use authguard::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: Config) -> authguard::Result<()> {
    match command {
        Command::Validate => {
            RbacEngine::build(&config.rbac)?;
            info!(
                roles = config.rbac.roles.len(),
                policies = config.rbac.policies.len(),
                "configuration is valid"
            );
            Ok(())
        }
        Command::ResolveRole { role } => {
            let rbac = RbacEngine::build(&config.rbac)?;
            let permissions = rbac.resolve_permissions(std::slice::from_ref(&role));
            for permission in &permissions {
                println!("{permission}");
            }
            Ok(())
        }
        Command::CheckAccess { roles, resource, action } => {
            let rbac = RbacEngine::build(&config.rbac)?;
            let role_ids: Vec<String> = roles.split(',').map(str::trim).map(str::to_string).collect();
            let permissions = rbac.resolve_permissions(&role_ids);
            let allowed = RbacEngine::has_permission(&permissions, &resource, &action);
            println!("{}", if allowed { "allow" } else { "deny" });
            Ok(())
        }
    }
}
