use anyhow::anyhow;
use tether_events::Event;

use crate::cli::WatchArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::torrents::query_from;
use crate::output::{format_alert, render_torrent_list};

/// Poll until interrupted (or `--count` refreshes), printing the torrent list
/// after every refresh and alerts on stderr.
pub(crate) async fn handle_watch(ctx: &AppContext, args: WatchArgs) -> CliResult<()> {
    let query = query_from(args.list);
    let mut stream = ctx.handle.events().subscribe(None);
    let interval = ctx.handle.start_polling(ctx.poll_interval).await?;
    tracing::info!(interval_secs = interval.as_secs(), "watching daemon");

    let mut refreshes = 0usize;
    loop {
        let envelope = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|err| {
                    CliError::failure(anyhow!("failed to listen for ctrl-c: {err}"))
                })?;
                break;
            }
            envelope = stream.next() => envelope,
        };
        let Some(envelope) = envelope else {
            break;
        };
        if let Some(alert) = format_alert(&envelope) {
            eprintln!("{alert}");
        }
        if matches!(envelope.event, Event::TorrentsRefreshed { .. }) {
            let cache = ctx.handle.snapshot().await?;
            render_torrent_list(&cache.view(&query), cache.session_stats(), ctx.output)?;
            refreshes += 1;
            if args.count > 0 && refreshes >= args.count {
                break;
            }
        }
    }

    ctx.handle.stop_polling().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use httpmock::prelude::*;

    use crate::cli::ListArgs;
    use crate::commands::test_support::{context, mock_poll, sample_torrents};

    #[tokio::test]
    async fn watch_stops_after_requested_refreshes() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let list = mock_poll(&server, sample_torrents());
        let mut ctx = context(&server).await;
        ctx.poll_interval = Duration::from_secs(1);

        tokio::time::timeout(
            Duration::from_secs(10),
            handle_watch(
                &ctx,
                WatchArgs {
                    count: 2,
                    list: ListArgs::default(),
                },
            ),
        )
        .await?
        .map_err(|err| anyhow!(err.display_message()))?;
        assert!(list.calls() >= 2);
        Ok(())
    }
}
