use std::path::Path;

use tokio::process::Command;

use promo_media::command::resolve_tool;
use promo_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "render-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool(&config.ffmpeg_bin).await?;
    ensure_tool(&config.ffprobe_bin).await?;

    match &config.music_dir {
        Some(dir) if dir.is_dir() => println!("render-selfcheck: music library {}", dir.display()),
        Some(dir) => println!(
            "render-selfcheck: music dir {} missing, background music disabled",
            dir.display()
        ),
        None => println!("render-selfcheck: no music dir configured"),
    }

    println!("render-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

async fn ensure_tool(tool: &str) -> anyhow::Result<()> {
    let bin = resolve_tool(tool)?;
    let output = Command::new(&bin)
        .arg("-version")
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("{} not available: {}", tool, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", tool, output.status));
    }
    println!("render-selfcheck: found {}", bin.display());
    Ok(())
}
