use std::path::Path;

use anyhow::anyhow;
use tether_core::{
    AddTorrent, AddTorrentSource, BandwidthLimits, FilePriority, TorrentAction, TorrentQuery,
};

use crate::cli::{
    ActionArgs, AddArgs, FilesArgs, LabelsArgs, LimitsArgs, ListArgs, PriorityArgs, QueueArgs,
    RemoveArgs, RenameArgs, WantedArgs,
};
use crate::client::{AppContext, CliError, CliResult, expect_success};
use crate::output::{render_batch, render_files, render_torrent_list};

pub(crate) fn query_from(args: ListArgs) -> TorrentQuery {
    TorrentQuery {
        sort: args.sort.into(),
        descending: args.desc,
        category: args.category.map(Into::into),
        search: args.search.filter(|needle| !needle.trim().is_empty()),
    }
}

pub(crate) async fn handle_list(ctx: &AppContext, args: ListArgs) -> CliResult<()> {
    ctx.refresh().await?;
    let cache = ctx.handle.snapshot().await?;
    let torrents = cache.view(&query_from(args));
    render_torrent_list(&torrents, cache.session_stats(), ctx.output)
}

pub(crate) async fn handle_files(ctx: &AppContext, args: FilesArgs) -> CliResult<()> {
    ctx.load_files(args.id).await?;
    let cache = ctx.handle.snapshot().await?;
    let files = cache.files(args.id).ok_or_else(|| {
        CliError::failure(anyhow!("file list of torrent {} was not stored", args.id))
    })?;
    render_files(args.id, files, ctx.output)
}

pub(crate) async fn handle_wanted(ctx: &AppContext, args: WantedArgs) -> CliResult<()> {
    ctx.load_files(args.id).await?;
    let count = args.indices.len();
    let outcome = ctx
        .handle
        .set_wanted(args.id, args.indices, !args.skip)
        .await?;
    expect_success("set wanted", outcome)?;
    let verb = if args.skip { "Skipped" } else { "Selected" };
    println!("{verb} {count} file(s) of torrent {}", args.id);
    Ok(())
}

pub(crate) async fn handle_priority(ctx: &AppContext, args: PriorityArgs) -> CliResult<()> {
    ctx.load_files(args.id).await?;
    let priority = FilePriority::from(args.priority);
    let count = args.indices.len();
    let outcome = ctx
        .handle
        .set_priority(args.id, args.indices, priority)
        .await?;
    expect_success("set priority", outcome)?;
    println!("Updated priority of {count} file(s) of torrent {}", args.id);
    Ok(())
}

pub(crate) async fn handle_rename(ctx: &AppContext, args: RenameArgs) -> CliResult<()> {
    let RenameArgs { id, name } = args;
    ctx.refresh().await?;
    let outcome = ctx.handle.rename(id, name.as_str()).await?;
    expect_success("rename", outcome)?;
    println!("Renamed torrent {id} to '{name}'");
    Ok(())
}

pub(crate) async fn handle_labels(ctx: &AppContext, args: LabelsArgs) -> CliResult<()> {
    let labels: Vec<String> = args
        .labels
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();
    ctx.refresh().await?;
    let count = args.ids.len();
    let outcome = ctx.handle.set_labels(args.ids, labels).await?;
    expect_success("set labels", outcome)?;
    println!("Updated labels of {count} torrent(s)");
    Ok(())
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: RemoveArgs) -> CliResult<()> {
    ctx.refresh().await?;
    let count = args.ids.len();
    let outcome = ctx.handle.remove(args.ids, args.delete_data).await?;
    expect_success("remove", outcome)?;
    let suffix = if args.delete_data { " and their data" } else { "" };
    println!("Removed {count} torrent(s){suffix}");
    Ok(())
}

pub(crate) async fn handle_action(ctx: &AppContext, args: ActionArgs) -> CliResult<()> {
    ctx.refresh().await?;
    let action = TorrentAction::from(args.action);
    let count = args.ids.len();
    let outcome = match action {
        TorrentAction::Start => ctx.handle.start(args.ids).await?,
        TorrentAction::StartNow => ctx.handle.start_now(args.ids).await?,
        TorrentAction::Stop => ctx.handle.stop(args.ids).await?,
        TorrentAction::Verify => ctx.handle.verify(args.ids).await?,
        TorrentAction::Reannounce => ctx.handle.reannounce(args.ids).await?,
    };
    expect_success(action_label(action), outcome)?;
    println!("{} requested for {count} torrent(s)", action_label(action));
    Ok(())
}

const fn action_label(action: TorrentAction) -> &'static str {
    match action {
        TorrentAction::Start => "start",
        TorrentAction::StartNow => "start-now",
        TorrentAction::Stop => "stop",
        TorrentAction::Verify => "verify",
        TorrentAction::Reannounce => "reannounce",
    }
}

pub(crate) async fn handle_queue(ctx: &AppContext, args: QueueArgs) -> CliResult<()> {
    ctx.refresh().await?;
    let count = args.ids.len();
    let outcome = ctx
        .handle
        .queue_move(args.ids, args.direction.into())
        .await?;
    expect_success("queue move", outcome)?;
    println!("Moved {count} torrent(s) in the queue");
    Ok(())
}

pub(crate) fn limits_from(args: &LimitsArgs) -> BandwidthLimits {
    BandwidthLimits {
        download_limit: args.down,
        download_limited: if args.no_down_limit {
            Some(false)
        } else {
            args.down.map(|_| true)
        },
        upload_limit: args.up,
        upload_limited: if args.no_up_limit {
            Some(false)
        } else {
            args.up.map(|_| true)
        },
        bandwidth_priority: args.bandwidth_priority.map(Into::into),
    }
}

pub(crate) async fn handle_limits(ctx: &AppContext, args: LimitsArgs) -> CliResult<()> {
    let limits = limits_from(&args);
    if limits.is_empty() {
        return Err(CliError::validation(
            "nothing to change (pass --down, --up, --no-down-limit, --no-up-limit or --bandwidth-priority)",
        ));
    }
    ctx.refresh().await?;
    let count = args.ids.len();
    let outcome = ctx.handle.set_bandwidth(args.ids, limits).await?;
    expect_success("set limits", outcome)?;
    println!("Updated limits of {count} torrent(s)");
    Ok(())
}

pub(crate) async fn handle_add(ctx: &AppContext, args: AddArgs) -> CliResult<()> {
    let mut requests = Vec::with_capacity(args.sources.len());
    for source in args.sources {
        let source = source.trim();
        if source.is_empty() {
            return Err(CliError::validation("source must not be empty"));
        }
        requests.push(AddTorrent {
            label: source.to_string(),
            source: read_source(source).await?,
            download_dir: args.download_dir.clone(),
            paused: args.paused,
        });
    }

    let summary = ctx.handle.add(requests).await?;
    render_batch(&summary, ctx.output)?;
    if summary.has_failures() {
        return Err(CliError::failure(anyhow!(
            "{} of {} torrent(s) could not be added",
            summary.failed(),
            summary.total()
        )));
    }
    Ok(())
}

fn is_link(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    ["magnet:", "http://", "https://"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

async fn read_source(source: &str) -> CliResult<AddTorrentSource> {
    if is_link(source) {
        return Ok(AddTorrentSource::Link {
            uri: source.to_string(),
        });
    }
    let path = Path::new(source);
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        CliError::validation(format!(
            "failed to read torrent file '{}': {err}",
            path.display()
        ))
    })?;
    Ok(AddTorrentSource::Metainfo { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::cli::{ActionArg, CategoryArg, PriorityArg, SortArg};
    use crate::commands::test_support::{
        context, mock_files, mock_method, mock_poll, mock_rejected, mock_success,
        sample_torrents,
    };

    #[tokio::test]
    async fn list_polls_once_and_renders() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let list = mock_poll(&server, sample_torrents());
        let ctx = context(&server).await;

        handle_list(
            &ctx,
            ListArgs {
                sort: SortArg::Progress,
                desc: true,
                category: Some(CategoryArg::Downloading),
                search: None,
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        list.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn list_reports_rejected_credentials() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST);
            then.status(401);
        });
        let ctx = context(&server).await;

        let err = handle_list(&ctx, ListArgs::default())
            .await
            .expect_err("daemon rejects credentials");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("credentials"));
        Ok(())
    }

    #[tokio::test]
    async fn wanted_loads_files_before_sending_the_change() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_poll(&server, sample_torrents());
        let files = mock_files(&server, 1, 3);
        let set = mock_success(&server, "torrent-set", &["\"files-unwanted\":[0,2]"]);
        let ctx = context(&server).await;

        handle_wanted(
            &ctx,
            WantedArgs {
                id: 1,
                indices: vec![0, 2],
                skip: true,
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        files.assert_calls(1);
        set.assert_calls(1);

        let cache = ctx.handle.snapshot().await?;
        let stats = cache.files(1).expect("files cached").stats();
        assert!(!stats[0].wanted);
        assert!(stats[1].wanted);
        assert!(!stats[2].wanted);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_priority_is_rejected_locally() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_poll(&server, sample_torrents());
        mock_files(&server, 1, 2);
        let set = mock_success(&server, "torrent-set", &[]);
        let ctx = context(&server).await;

        let err = handle_priority(
            &ctx,
            PriorityArgs {
                id: 1,
                priority: PriorityArg::High,
                indices: vec![5],
            },
        )
        .await
        .expect_err("index beyond file count");
        assert_eq!(err.exit_code(), 2);
        set.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn rename_of_unknown_torrent_makes_no_call() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_poll(&server, sample_torrents());
        let rename = mock_success(&server, "torrent-rename-path", &[]);
        let ctx = context(&server).await;

        let err = handle_rename(
            &ctx,
            RenameArgs {
                id: 99,
                name: "gamma".into(),
            },
        )
        .await
        .expect_err("torrent 99 is not cached");
        assert_eq!(err.display_message(), "no torrent with id 99");
        rename.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_labels_are_reverted() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_poll(&server, sample_torrents());
        mock_rejected(&server, "torrent-set");
        let ctx = context(&server).await;

        let err = handle_labels(
            &ctx,
            LabelsArgs {
                ids: vec![2],
                labels: vec!["iso".into(), "  ".into()],
            },
        )
        .await
        .expect_err("daemon rejects the change");
        assert_eq!(err.exit_code(), 2);

        let cache = ctx.handle.snapshot().await?;
        assert_eq!(cache.torrent(2).expect("cached").labels, ["linux"]);
        Ok(())
    }

    #[tokio::test]
    async fn stop_updates_status_after_success() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_poll(&server, sample_torrents());
        let stop = mock_success(&server, "torrent-stop", &["\"ids\":[1]"]);
        let ctx = context(&server).await;

        handle_action(
            &ctx,
            ActionArgs {
                action: ActionArg::Stop,
                ids: vec![1],
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        stop.assert_calls(1);
        let cache = ctx.handle.snapshot().await?;
        assert_eq!(
            cache.torrent(1).expect("cached").status,
            tether_core::TorrentStatus::Stopped
        );
        Ok(())
    }

    #[test]
    fn limit_flags_map_to_enforcement_toggles() {
        let limits = limits_from(&LimitsArgs {
            ids: vec![1],
            down: Some(500),
            up: None,
            no_down_limit: false,
            no_up_limit: true,
            bandwidth_priority: Some(PriorityArg::Low),
        });
        assert_eq!(limits.download_limit, Some(500));
        assert_eq!(limits.download_limited, Some(true));
        assert_eq!(limits.upload_limit, None);
        assert_eq!(limits.upload_limited, Some(false));
        assert_eq!(limits.bandwidth_priority, Some(FilePriority::Low));
    }

    #[tokio::test]
    async fn empty_limits_are_a_validation_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let ctx = context(&server).await;
        let err = handle_limits(
            &ctx,
            LimitsArgs {
                ids: vec![1],
                down: None,
                up: None,
                no_down_limit: false,
                no_up_limit: false,
                bandwidth_priority: None,
            },
        )
        .await
        .expect_err("no knob set");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn add_reports_partial_failures() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_method(
            &server,
            "torrent-add",
            &["magnet:?xt=urn:btih:good"],
            json!({
                "result": "success",
                "arguments": {"torrent-added": {"id": 9, "name": "good", "hashString": "abc"}}
            }),
        );
        mock_rejected(&server, "torrent-add");
        let ctx = context(&server).await;

        let err = handle_add(
            &ctx,
            AddArgs {
                sources: vec![
                    "magnet:?xt=urn:btih:good".into(),
                    "magnet:?xt=urn:btih:bad".into(),
                ],
                download_dir: None,
                paused: true,
            },
        )
        .await
        .expect_err("one add fails");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.display_message(),
            "1 of 2 torrent(s) could not be added"
        );
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_metainfo_is_rejected_before_dispatch() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let missing = dir.path().join("missing.torrent");
        let err = read_source(missing.to_str().expect("utf-8 path"))
            .await
            .expect_err("file does not exist");
        assert_eq!(err.exit_code(), 2);

        let present = dir.path().join("debian.torrent");
        std::fs::write(&present, b"d4:infod4:name6:debianee")?;
        let source = read_source(present.to_str().expect("utf-8 path"))
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(matches!(source, AddTorrentSource::Metainfo { ref bytes } if bytes.len() == 24));
        assert!(is_link("HTTPS://tracker.example/file.torrent"));
        Ok(())
    }
}
