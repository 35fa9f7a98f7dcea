use clap::Parser;
use forge_core::ForgeConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Generates and builds Minecraft plugins over HTTP")]
struct ServerArgs {
    /// Config file. Defaults to `$FORGE_HOME/config.toml` when it exists.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Socket address to listen on, e.g. `0.0.0.0:8080`.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Directory holding one subdirectory per build.
    #[arg(long, value_name = "DIR")]
    plugins_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    // A missing `.env` is normal.
    let _ = dotenvy::dotenv();

    let mut config = ForgeConfig::load(args.config.as_deref())?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(plugins_dir) = args.plugins_dir {
        config.plugins_dir = plugins_dir;
    }

    forge_server::run_main(config).await
}
