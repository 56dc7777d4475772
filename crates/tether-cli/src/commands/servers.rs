use tether_config::{ClientConfig, ServerProfile, ServerStore, validate_profile};
use tether_core::Scheme;

use crate::cli::{OutputFormat, ServerAddArgs};
use crate::client::{CliError, CliResult};
use crate::output::render_servers;

pub(crate) fn handle_server_list(config: &ClientConfig, format: OutputFormat) -> CliResult<()> {
    render_servers(&config.servers, config.active_server.as_deref(), format)
}

pub(crate) async fn handle_server_add(
    store: &dyn ServerStore,
    args: ServerAddArgs,
) -> CliResult<()> {
    let activate = args.activate;
    let profile = profile_from_args(args)?;
    let name = profile.name.clone();
    let config = store.upsert(profile).await?;
    let config = if activate || config.servers.len() == 1 {
        store.set_active(Some(&name)).await?
    } else {
        config
    };
    let marker = if config.active_server.as_deref() == Some(name.as_str()) {
        " (active)"
    } else {
        ""
    };
    println!("Saved server '{name}'{marker}");
    Ok(())
}

pub(crate) async fn handle_server_remove(store: &dyn ServerStore, name: &str) -> CliResult<()> {
    store.remove(name).await?;
    println!("Removed server '{name}'");
    Ok(())
}

pub(crate) async fn handle_server_use(store: &dyn ServerStore, name: &str) -> CliResult<()> {
    store.set_active(Some(name)).await?;
    println!("Active server is now '{name}'");
    Ok(())
}

fn profile_from_args(args: ServerAddArgs) -> CliResult<ServerProfile> {
    let mut profile = ServerProfile::new(args.name.trim(), args.host.trim());
    if let Some(port) = args.port {
        profile.port = port;
    }
    if args.https {
        profile.scheme = Scheme::Https;
    }
    if let Some(path) = args.rpc_path {
        profile.rpc_path = path;
    }
    if args.password.is_some() && args.username.is_none() {
        return Err(CliError::validation("--password requires --username"));
    }
    profile.username = args.username;
    profile.password = args.password;
    validate_profile(&profile)?;
    Ok(profile)
}
