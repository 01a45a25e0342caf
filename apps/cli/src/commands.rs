use std::path::Path;

use anyhow::{Context, bail};
use nimbus_config::Settings;
use nimbus_execution::{CallStatus, Caller, Invocation};
use nimbus_runtime::RuntimeError;

use crate::cli::{DirArgs, HashArgs, RunArgs, ServeArgs, ValidateArgs};
use crate::host::{Host, functions_dir};
use crate::schedules;

pub async fn validate(settings: &Settings, args: &ValidateArgs) -> anyhow::Result<()> {
    let content = read(&args.file).await?;
    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .context("file name is not valid UTF-8")?;

    let validated = nimbus_validator::validate(filename, &content, settings.validation.max_file_bytes)
        .with_context(|| format!("{} rejected", args.file.display()))?;

    if args.json {
        let report = serde_json::json!({
            "function_name": validated.function_name,
            "content_hash": nimbus_validator::content_hash(&content),
            "warnings": validated.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("ok: {}", validated.function_name);
    for warning in &validated.warnings {
        println!("  warning: line {}: {}", warning.line, warning.message);
    }
    Ok(())
}

pub async fn hash(args: &HashArgs) -> anyhow::Result<()> {
    for file in &args.files {
        let content = read(file).await?;
        println!(
            "{}  {:>8}  {}",
            nimbus_validator::content_hash(&content),
            content.len(),
            file.display()
        );
    }
    Ok(())
}

pub async fn load(settings: &Settings, args: &DirArgs) -> anyhow::Result<()> {
    let host = Host::build(settings)?;
    let dir = functions_dir(settings, args.dir.as_ref());
    let loaded = host.load(&dir).await?;

    for meta in host.registry.all() {
        let tags = if meta.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", meta.tags.join(", "))
        };
        println!(
            "{:<24} {:<13} {}{tags}",
            meta.name,
            meta.auth.as_str(),
            meta.file_path.display()
        );
    }
    println!("{loaded} function(s) loaded from {}", dir.display());
    Ok(())
}

pub async fn run(settings: &Settings, args: &RunArgs) -> anyhow::Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&args.payload).context("--payload is not valid JSON")?;

    let host = Host::build(settings)?;
    host.load(&functions_dir(settings, args.dir.dir.as_ref()))
        .await?;

    let caller = if args.anonymous {
        Caller::anonymous()
    } else {
        Caller::system()
    };
    let call = match host
        .engine
        .execute_by_name(&args.name, payload, &Invocation::manual(caller))
        .await
    {
        Ok(call) => call,
        Err(RuntimeError::FunctionNotFound { name }) => {
            let known = host.registry.names().join(", ");
            bail!("function `{name}` is not registered (known: {known})");
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&call)?);
    if call.status != CallStatus::Succeeded {
        bail!(
            "{} failed: {}",
            call.function_name,
            call.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn serve(settings: &Settings, args: &ServeArgs) -> anyhow::Result<()> {
    let host = Host::build(settings)?;
    let dir = functions_dir(settings, args.dir.dir.as_ref());
    let loaded = host.load(&dir).await?;
    tracing::info!(functions = loaded, dir = %dir.display(), "functions loaded");

    let watch = if args.no_watch {
        None
    } else {
        Some(host.loader.watch(&dir).await.context("failed to watch functions")?)
    };

    if let Some(path) = &args.schedules {
        for schedule in schedules::read(path).await? {
            let name = schedule.name.clone();
            if let Err(e) = host.scheduler.add(schedule).await {
                tracing::warn!(schedule = %name, error = %e, "schedule not installed");
            }
        }
    }

    host.pool.start_cleanup();
    if settings.scheduler.enabled {
        host.scheduler.start();
    }

    shutdown_signal().await;
    tracing::info!("signal received, shutting down");

    host.scheduler.stop().await;
    if let Some(watch) = watch {
        watch.stop();
    }
    host.pool.stop_cleanup().await;
    host.pool.clear();
    Ok(())
}

async fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
