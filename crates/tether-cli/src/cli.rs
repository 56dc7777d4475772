//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tether_config::{ClientConfig, ConfigError, JsonServerStore, ServerStore, default_config_path};
use tether_core::{FilePriority, QueueMove, SortKey, StatusCategory, TorrentAction, TorrentId};
use tether_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::servers::{
    handle_server_add, handle_server_list, handle_server_remove, handle_server_use,
};
use crate::commands::session::{handle_session_get, handle_session_set};
use crate::commands::torrents::{
    handle_action, handle_add, handle_files, handle_labels, handle_limits, handle_list,
    handle_priority, handle_queue, handle_remove, handle_rename, handle_wanted,
};
use crate::commands::watch::handle_watch;

/// Parses CLI arguments, executes the requested command, and reports the
/// failure, if any, on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| CliError::from(ConfigError::NoConfigDir))?;
    let store = JsonServerStore::new(path);
    let config = store.load().await?;

    install_logging(&config);
    let _context = GlobalContextGuard::new("cli");

    let options = cli.session();
    match cli.command {
        Command::Servers(command) => match command {
            ServersCommand::List => handle_server_list(&config, cli.output),
            ServersCommand::Add(args) => handle_server_add(&store, args).await,
            ServersCommand::Remove { name } => handle_server_remove(&store, &name).await,
            ServersCommand::Use { name } => handle_server_use(&store, &name).await,
        },
        command => {
            let ctx = AppContext::connect(&config, &options).await?;
            dispatch_session(&ctx, command).await
        }
    }
}

async fn dispatch_session(ctx: &AppContext, command: Command) -> CliResult<()> {
    match command {
        Command::Ls(args) => handle_list(ctx, args).await,
        Command::Watch(args) => handle_watch(ctx, args).await,
        Command::Files(args) => handle_files(ctx, args).await,
        Command::Wanted(args) => handle_wanted(ctx, args).await,
        Command::Priority(args) => handle_priority(ctx, args).await,
        Command::Rename(args) => handle_rename(ctx, args).await,
        Command::Labels(args) => handle_labels(ctx, args).await,
        Command::Remove(args) => handle_remove(ctx, args).await,
        Command::Action(args) => handle_action(ctx, args).await,
        Command::Queue(args) => handle_queue(ctx, args).await,
        Command::Limits(args) => handle_limits(ctx, args).await,
        Command::Session(SessionCommand::Get) => handle_session_get(ctx).await,
        Command::Session(SessionCommand::Set(args)) => handle_session_set(ctx, args).await,
        Command::Add(args) => handle_add(ctx, args).await,
        Command::Servers(_) => Err(CliError::validation(
            "server profiles are managed without a daemon connection",
        )),
    }
}

fn install_logging(config: &ClientConfig) {
    let logging = LoggingConfig {
        level: &config.log_level,
        format: LogFormat::from_name(config.log_format.map(|format| format.as_str())),
        ..LoggingConfig::default()
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }
}

/// Connection overrides taken from flags and `TETHER_*` variables.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionOptions {
    pub(crate) server: Option<String>,
    pub(crate) interval_secs: Option<u64>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) output: OutputFormat,
}

#[derive(Parser)]
#[command(name = "tether", about = "Remote control for a Transmission daemon")]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "TETHER_CONFIG", help = "Path to tether.json")]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "TETHER_SERVER",
        help = "Server profile to use instead of the active one"
    )]
    pub(crate) server: Option<String>,
    #[arg(
        long,
        global = true,
        env = "TETHER_POLL_INTERVAL_SECS",
        help = "Seconds between polls (minimum 1)"
    )]
    pub(crate) interval: Option<u64>,
    #[arg(
        long,
        global = true,
        env = "TETHER_HTTP_TIMEOUT_SECS",
        help = "HTTP timeout per daemon call in seconds"
    )]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    fn session(&self) -> SessionOptions {
        SessionOptions {
            server: self.server.clone(),
            interval_secs: self.interval,
            timeout_secs: self.timeout,
            output: self.output,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage saved server profiles.
    #[command(subcommand)]
    Servers(ServersCommand),
    /// List torrents.
    Ls(ListArgs),
    /// Poll continuously and print each refresh.
    Watch(WatchArgs),
    /// Show the files of one torrent.
    Files(FilesArgs),
    /// Select or skip files.
    Wanted(WantedArgs),
    /// Set file priorities.
    Priority(PriorityArgs),
    /// Rename a torrent's root path.
    Rename(RenameArgs),
    /// Replace torrent labels.
    Labels(LabelsArgs),
    /// Remove torrents.
    Remove(RemoveArgs),
    /// Start, stop, verify, or reannounce torrents.
    Action(ActionArgs),
    /// Move torrents within the queue.
    Queue(QueueArgs),
    /// Change per-torrent bandwidth limits.
    Limits(LimitsArgs),
    /// Read or change daemon settings.
    #[command(subcommand)]
    Session(SessionCommand),
    /// Add torrents from magnet links, URLs, or .torrent files.
    Add(AddArgs),
}

#[derive(Subcommand)]
pub(crate) enum ServersCommand {
    /// List saved profiles.
    List,
    /// Add or replace a profile.
    Add(ServerAddArgs),
    /// Delete a profile.
    Remove {
        /// Profile name.
        name: String,
    },
    /// Make a profile the active one.
    Use {
        /// Profile name.
        name: String,
    },
}

#[derive(Args)]
pub(crate) struct ServerAddArgs {
    pub(crate) name: String,
    pub(crate) host: String,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long, help = "Connect over HTTPS")]
    pub(crate) https: bool,
    #[arg(long)]
    pub(crate) rpc_path: Option<String>,
    #[arg(long)]
    pub(crate) username: Option<String>,
    #[arg(long, env = "TETHER_SERVER_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(long, help = "Also make this the active profile")]
    pub(crate) activate: bool,
}

#[derive(Args, Default)]
pub(crate) struct ListArgs {
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    pub(crate) sort: SortArg,
    #[arg(long)]
    pub(crate) desc: bool,
    #[arg(long, value_enum)]
    pub(crate) category: Option<CategoryArg>,
    #[arg(long, help = "Case-insensitive name filter")]
    pub(crate) search: Option<String>,
}

#[derive(Args)]
pub(crate) struct WatchArgs {
    #[arg(long, default_value_t = 0, help = "Stop after this many refreshes (0 = forever)")]
    pub(crate) count: usize,
    #[command(flatten)]
    pub(crate) list: ListArgs,
}

#[derive(Args, Clone, Copy)]
pub(crate) struct FilesArgs {
    pub(crate) id: TorrentId,
}

#[derive(Args)]
pub(crate) struct WantedArgs {
    pub(crate) id: TorrentId,
    #[arg(required = true, help = "File indices")]
    pub(crate) indices: Vec<usize>,
    #[arg(long, help = "Skip the files instead of selecting them")]
    pub(crate) skip: bool,
}

#[derive(Args)]
pub(crate) struct PriorityArgs {
    pub(crate) id: TorrentId,
    #[arg(value_enum)]
    pub(crate) priority: PriorityArg,
    #[arg(required = true, help = "File indices")]
    pub(crate) indices: Vec<usize>,
}

#[derive(Args)]
pub(crate) struct RenameArgs {
    pub(crate) id: TorrentId,
    pub(crate) name: String,
}

#[derive(Args)]
pub(crate) struct LabelsArgs {
    #[arg(required = true)]
    pub(crate) ids: Vec<TorrentId>,
    #[arg(long = "label", help = "Label to set; omit to clear")]
    pub(crate) labels: Vec<String>,
}

#[derive(Args)]
pub(crate) struct RemoveArgs {
    #[arg(required = true)]
    pub(crate) ids: Vec<TorrentId>,
    #[arg(long, help = "Also delete downloaded data")]
    pub(crate) delete_data: bool,
}

#[derive(Args)]
pub(crate) struct ActionArgs {
    #[arg(value_enum)]
    pub(crate) action: ActionArg,
    #[arg(required = true)]
    pub(crate) ids: Vec<TorrentId>,
}

#[derive(Args)]
pub(crate) struct QueueArgs {
    #[arg(value_enum)]
    pub(crate) direction: QueueArg,
    #[arg(required = true)]
    pub(crate) ids: Vec<TorrentId>,
}

#[derive(Args)]
pub(crate) struct LimitsArgs {
    #[arg(required = true)]
    pub(crate) ids: Vec<TorrentId>,
    #[arg(long, help = "Download cap in KB/s")]
    pub(crate) down: Option<u64>,
    #[arg(long, help = "Upload cap in KB/s")]
    pub(crate) up: Option<u64>,
    #[arg(long, conflicts_with = "down")]
    pub(crate) no_down_limit: bool,
    #[arg(long, conflicts_with = "up")]
    pub(crate) no_up_limit: bool,
    #[arg(long, value_enum)]
    pub(crate) bandwidth_priority: Option<PriorityArg>,
}

#[derive(Subcommand)]
pub(crate) enum SessionCommand {
    /// Show daemon settings.
    Get,
    /// Change daemon settings.
    Set(SessionSetArgs),
}

#[derive(Args, Default)]
pub(crate) struct SessionSetArgs {
    #[arg(long)]
    pub(crate) download_dir: Option<String>,
    #[arg(long, help = "Global download cap in KB/s")]
    pub(crate) down_limit: Option<u64>,
    #[arg(long)]
    pub(crate) down_limit_enabled: Option<bool>,
    #[arg(long, help = "Global upload cap in KB/s")]
    pub(crate) up_limit: Option<u64>,
    #[arg(long)]
    pub(crate) up_limit_enabled: Option<bool>,
    #[arg(long)]
    pub(crate) alt_speed: Option<bool>,
    #[arg(long)]
    pub(crate) peer_limit: Option<u32>,
    #[arg(long)]
    pub(crate) peer_port: Option<u16>,
    #[arg(long)]
    pub(crate) seed_ratio: Option<f64>,
    #[arg(long)]
    pub(crate) seed_ratio_limited: Option<bool>,
    #[arg(long)]
    pub(crate) start_added: Option<bool>,
}

#[derive(Args)]
pub(crate) struct AddArgs {
    #[arg(required = true, help = "Magnet links, URLs, or .torrent paths")]
    pub(crate) sources: Vec<String>,
    #[arg(long)]
    pub(crate) download_dir: Option<String>,
    #[arg(long)]
    pub(crate) paused: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortArg {
    #[default]
    Name,
    Progress,
    Added,
    Queue,
    Down,
    Up,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => Self::Name,
            SortArg::Progress => Self::Progress,
            SortArg::Added => Self::AddedAt,
            SortArg::Queue => Self::QueuePosition,
            SortArg::Down => Self::DownloadRate,
            SortArg::Up => Self::UploadRate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CategoryArg {
    Paused,
    Verifying,
    Queued,
    Metadata,
    Downloading,
    Stalled,
    Seeding,
}

impl From<CategoryArg> for StatusCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Paused => Self::Paused,
            CategoryArg::Verifying => Self::Verifying,
            CategoryArg::Queued => Self::Queued,
            CategoryArg::Metadata => Self::Metadata,
            CategoryArg::Downloading => Self::Downloading,
            CategoryArg::Stalled => Self::Stalled,
            CategoryArg::Seeding => Self::Seeding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for FilePriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Normal => Self::Normal,
            PriorityArg::High => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ActionArg {
    Start,
    StartNow,
    Stop,
    Verify,
    Reannounce,
}

impl From<ActionArg> for TorrentAction {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::Start => Self::Start,
            ActionArg::StartNow => Self::StartNow,
            ActionArg::Stop => Self::Stop,
            ActionArg::Verify => Self::Verify,
            ActionArg::Reannounce => Self::Reannounce,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum QueueArg {
    Top,
    Up,
    Down,
    Bottom,
}

impl From<QueueArg> for QueueMove {
    fn from(value: QueueArg) -> Self {
        match value {
            QueueArg::Top => Self::Top,
            QueueArg::Up => Self::Up,
            QueueArg::Down => Self::Down,
            QueueArg::Bottom => Self::Bottom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "tether", "ls", "--sort", "progress", "--server", "seedbox", "--output", "json",
        ])
        .expect("arguments parse");
        assert_eq!(cli.server.as_deref(), Some("seedbox"));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Command::Ls(ListArgs {
                sort: SortArg::Progress,
                ..
            })
        ));
    }

    #[test]
    fn priority_arguments_map_to_domain_values() {
        let cli = Cli::try_parse_from(["tether", "priority", "10", "high", "0", "2"])
            .expect("arguments parse");
        let Command::Priority(args) = cli.command else {
            panic!("expected priority command");
        };
        assert_eq!(args.id, 10);
        assert_eq!(FilePriority::from(args.priority), FilePriority::High);
        assert_eq!(args.indices, [0, 2]);
    }

    #[test]
    fn limits_reject_conflicting_download_flags() {
        let result =
            Cli::try_parse_from(["tether", "limits", "1", "--down", "10", "--no-down-limit"]);
        assert!(result.is_err());
    }
}
