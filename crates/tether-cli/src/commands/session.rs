use anyhow::anyhow;
use tether_core::SessionSettings;

use crate::cli::SessionSetArgs;
use crate::client::{AppContext, CliError, CliResult, expect_success};
use crate::output::render_settings;

async fn load_settings(ctx: &AppContext) -> CliResult<SessionSettings> {
    let outcome = ctx.handle.fetch_session_settings().await?;
    expect_success("fetch settings", outcome)?;
    ctx.handle
        .snapshot()
        .await?
        .session_settings()
        .cloned()
        .ok_or_else(|| CliError::failure(anyhow!("daemon settings were not stored")))
}

pub(crate) async fn handle_session_get(ctx: &AppContext) -> CliResult<()> {
    let settings = load_settings(ctx).await?;
    render_settings(&settings, ctx.output)
}

/// Overlay the flags that were passed onto `current`.
pub(crate) fn desired_settings(current: &SessionSettings, args: SessionSetArgs) -> SessionSettings {
    let mut desired = current.clone();
    if let Some(dir) = args.download_dir {
        desired.download_dir = dir;
    }
    if let Some(limit) = args.down_limit {
        desired.speed_limit_down = limit;
        desired.speed_limit_down_enabled = true;
    }
    if let Some(enabled) = args.down_limit_enabled {
        desired.speed_limit_down_enabled = enabled;
    }
    if let Some(limit) = args.up_limit {
        desired.speed_limit_up = limit;
        desired.speed_limit_up_enabled = true;
    }
    if let Some(enabled) = args.up_limit_enabled {
        desired.speed_limit_up_enabled = enabled;
    }
    if let Some(enabled) = args.alt_speed {
        desired.alt_speed_enabled = enabled;
    }
    if let Some(limit) = args.peer_limit {
        desired.peer_limit_global = limit;
    }
    if let Some(port) = args.peer_port {
        desired.peer_port = port;
    }
    if let Some(ratio) = args.seed_ratio {
        desired.seed_ratio_limit = ratio;
        desired.seed_ratio_limited = true;
    }
    if let Some(limited) = args.seed_ratio_limited {
        desired.seed_ratio_limited = limited;
    }
    if let Some(start) = args.start_added {
        desired.start_added_torrents = start;
    }
    desired
}

pub(crate) async fn handle_session_set(ctx: &AppContext, args: SessionSetArgs) -> CliResult<()> {
    if args.peer_port == Some(0) {
        return Err(CliError::validation("--peer-port must be between 1 and 65535"));
    }
    if args.seed_ratio.is_some_and(|ratio| !ratio.is_finite() || ratio < 0.0) {
        return Err(CliError::validation("--seed-ratio must be a non-negative number"));
    }
    let current = load_settings(ctx).await?;
    let desired = desired_settings(&current, args);
    if desired == current {
        println!("Settings unchanged");
        return Ok(());
    }
    let outcome = ctx.handle.update_session_settings(desired).await?;
    expect_success("update settings", outcome)?;
    println!("Settings updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tether_test_support::fixtures;

    use crate::commands::test_support::{context, mock_method, mock_rejected, mock_success};

    fn mock_session_get(server: &MockServer) -> httpmock::Mock<'_> {
        mock_method(
            server,
            "session-get",
            &[],
            json!({
                "result": "success",
                "arguments": {
                    "download-dir": "/downloads",
                    "speed-limit-down": 100,
                    "speed-limit-down-enabled": false,
                    "peer-port": 51413,
                    "version": "4.0.5",
                    "rpc-version": 17
                }
            }),
        )
    }

    #[test]
    fn rate_flags_enable_their_limits() {
        let current = fixtures::settings();
        let desired = desired_settings(
            &current,
            SessionSetArgs {
                down_limit: Some(750),
                seed_ratio: Some(2.0),
                ..SessionSetArgs::default()
            },
        );
        assert_eq!(desired.speed_limit_down, 750);
        assert!(desired.speed_limit_down_enabled);
        assert!(desired.seed_ratio_limited);
        assert_eq!(desired.peer_port, current.peer_port);
    }

    #[tokio::test]
    async fn get_fetches_settings() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let get = mock_session_get(&server);
        let ctx = context(&server).await;

        handle_session_get(&ctx)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        get.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn set_sends_only_changed_fields() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_session_get(&server);
        let set = mock_success(&server, "session-set", &["\"peer-port\":6881"]);
        let ctx = context(&server).await;

        handle_session_set(
            &ctx,
            SessionSetArgs {
                peer_port: Some(6881),
                ..SessionSetArgs::default()
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        set.assert_calls(1);
        let cache = ctx.handle.snapshot().await?;
        assert_eq!(cache.session_settings().expect("loaded").peer_port, 6881);
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_settings_make_no_call() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_session_get(&server);
        let set = mock_success(&server, "session-set", &[]);
        let ctx = context(&server).await;

        handle_session_set(
            &ctx,
            SessionSetArgs {
                download_dir: Some("/downloads".into()),
                ..SessionSetArgs::default()
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        set.assert_calls(0);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_settings_are_rolled_back() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_session_get(&server);
        mock_rejected(&server, "session-set");
        let ctx = context(&server).await;

        let err = handle_session_set(
            &ctx,
            SessionSetArgs {
                download_dir: Some("/mnt/elsewhere".into()),
                ..SessionSetArgs::default()
            },
        )
        .await
        .expect_err("daemon rejects the change");
        assert_eq!(err.exit_code(), 2);
        let cache = ctx.handle.snapshot().await?;
        assert_eq!(
            cache.session_settings().expect("loaded").download_dir,
            "/downloads"
        );
        Ok(())
    }
}
