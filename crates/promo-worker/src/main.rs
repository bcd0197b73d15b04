//! Render one promo video from a JSON request on stdin.

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use promo_worker::{ProgressReporter, RenderPipeline, RenderRequest, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("promo_worker=info".parse()?)
        .add_directive("promo_media=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let config = WorkerConfig::from_env();
    info!("Render config: {:?}", config);

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read render request from stdin")?;
    let request: RenderRequest =
        serde_json::from_str(&input).context("render request is not valid JSON")?;

    let (reporter, mut rx) = ProgressReporter::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            info!(
                step = update.step.as_str(),
                percent = update.percent,
                "{}", update.message
            );
        }
    });

    let pipeline = RenderPipeline::new(config);
    let result = pipeline.render(request, &reporter).await;
    drop(reporter);
    printer.await.ok();

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!("Render failed: {}", e);
            Err(e.into())
        }
    }
}
