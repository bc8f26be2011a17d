use std::path::Path;

use clap::Parser;
use sqlfirewall::cli::{Cli, Commands};
use sqlfirewall::config::AppConfig;
use sqlfirewall::coverage;
use sqlfirewall::detect::{self, patterns::PatternSet};
use sqlfirewall::dialect::DialectSet;
use sqlfirewall::proxy::ProxyServer;

const DEFAULT_CONFIG: &str = include_str!("../templates/default.toml");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => cmd_serve(&cli.config).await?,
        Commands::Check {
            corpus,
            dialects,
            output,
        } => cmd_check(&corpus, dialects, output.as_deref())?,
        Commands::Test { text, dialects } => cmd_test(&text, dialects),
        Commands::Patterns { dialects } => cmd_patterns(dialects),
        Commands::Init => cmd_init(&cli.config)?,
    }

    Ok(())
}

async fn cmd_serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    println!("sqlfirewall starting...");
    println!("Config:    {}", config_path.display());
    println!("Upstream:  {}", config.server.upstream);
    println!("Dialects:  {}", config.firewall.dialects);
    println!("Allow-list entries: {}", config.firewall.allow_urls.len());

    let server = ProxyServer::new(&config)?;
    let addr = server.start().await?;
    println!("Proxy running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    Ok(())
}

fn cmd_check(corpus: &Path, dialects: DialectSet, output: Option<&Path>) -> anyhow::Result<()> {
    let report = coverage::check_corpus(corpus, dialects)?;
    println!("Dialects: {}", dialects);
    println!("Files:    {}", report.files);
    println!("Payloads: {}", report.checked);
    println!("Detected: {}", report.detected());
    println!("Missed:   {}", report.missed.len());

    if let Some(path) = output {
        report.write_missed(path)?;
        println!("Missed payloads written to {}", path.display());
    }
    Ok(())
}

fn cmd_test(text: &str, dialects: DialectSet) {
    let patterns = PatternSet::shared(dialects);
    let hit = detect::normalize::normalized_forms(text)
        .iter()
        .find_map(|form| patterns.first_match(form));
    match hit {
        Some(index) => println!(
            "MATCH    pattern #{}: {}",
            index,
            patterns.iter().nth(index).unwrap_or_default()
        ),
        None => println!("CLEAN"),
    }
}

fn cmd_patterns(dialects: DialectSet) {
    let patterns = PatternSet::shared(dialects);
    println!("Pattern catalog for dialects: {} ({} patterns)", dialects, patterns.len());
    for (i, source) in patterns.iter().enumerate() {
        println!("{:>3}  {}", i, source);
    }
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
    } else {
        std::fs::write(config_path, DEFAULT_CONFIG)?;
        println!("Created config: {}", config_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Point [server].upstream at the application to protect");
    println!("  2. Start the proxy: sqlfirewall serve");
    Ok(())
}
