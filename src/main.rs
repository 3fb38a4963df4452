use std::sync::Arc;

use anyhow::Context;

use msg_refine::config::RefineConfig;
use msg_refine::context::{RefineContext, Session};
use msg_refine::pipeline::{DirectoryDownloader, MessageChain, RefineEngine};

const USAGE: &str = "Usage: msg-refine <chain.json> <resource-dir>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(chain_path), Some(resource_dir)) = (args.next(), args.next()) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let account_id: i64 = std::env::var("MSG_REFINE_ACCOUNT_ID")
        .unwrap_or_else(|_| "0".to_string())
        .parse()
        .unwrap_or(0);

    let config = RefineConfig::from_env()?;
    eprintln!("msg-refine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Resources: {}", resource_dir);
    eprintln!("   Max depth: {}", config.max_depth);

    let raw = tokio::fs::read_to_string(&chain_path)
        .await
        .with_context(|| format!("failed to read {chain_path}"))?;
    let chain: MessageChain = serde_json::from_str(&raw)
        .with_context(|| format!("{chain_path} is not a message chain"))?;

    let engine = RefineEngine::new(Arc::new(DirectoryDownloader::new(resource_dir)), config);
    let resolved = engine
        .refine(&Session::new(account_id), chain, &RefineContext::default())
        .await?;

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
