use std::process::Command;

use camcut_director::DirectorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DirectorConfig::from_env();

    println!(
        "camcut-selfcheck: starting with temp_dir={} model={}",
        config.temp_dir.display(),
        config.model_path.display()
    );
    config.validate()?;
    tokio::fs::create_dir_all(&config.temp_dir).await?;
    ensure_tool("ffmpeg")?;
    ensure_tool("ffprobe")?;

    if !config.model_path.is_file() {
        return Err(anyhow::anyhow!(
            "model not found at {}",
            config.model_path.display()
        ));
    }

    println!("camcut-selfcheck: ok");
    Ok(())
}

fn ensure_tool(name: &str) -> anyhow::Result<()> {
    let output = Command::new(name)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("{} -version failed: {:?}", name, output.status));
    }
    Ok(())
}
