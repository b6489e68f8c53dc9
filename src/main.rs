use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use unearthtime::browser::EXPLORE_URL;
use unearthtime::dom::library::builtin;
use unearthtime::{
    ChromeDriver, Config, Driver, EarthTime, LookupKey, Registry, Response, SessionManager,
};

/// Look up EarthTime page elements by name.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in locators
    List {
        /// Only names containing this text
        #[arg(short, long)]
        search: Option<String>,

        /// Reverse alphabetical order
        #[arg(short, long)]
        reverse: bool,
    },
    /// Open a page and pull one named element
    Pull {
        /// Locator name, e.g. `LayerCheckbox` or `layer_checkbox`
        name: String,

        /// Arguments for parameterized locators
        args: Vec<String>,

        /// EarthTime page to open
        #[arg(short, long, default_value = EXPLORE_URL)]
        url: String,

        /// Skip the visibility filter
        #[arg(short, long)]
        forced: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Save a screenshot of the hit here
        #[arg(long, value_name = "FILE")]
        screenshot: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::List { search, reverse } => list(search.as_deref(), reverse),
        Commands::Pull {
            name,
            args,
            url,
            forced,
            headful,
            screenshot,
        } => {
            let mut config = config;
            if headful {
                config.browser.headless = false;
            }
            pull(config, &url, &name, &args, forced, screenshot).await
        }
    }
}

fn list(search: Option<&str>, reverse: bool) -> anyhow::Result<()> {
    let registry = Registry::with_entries(builtin());

    let mut names: Vec<&str> = match search {
        Some(pattern) => registry.search(pattern),
        None => registry.iter().map(|(name, _)| name).collect(),
    };
    if reverse {
        names.reverse();
    }

    for name in names {
        if let Some(locator) = registry.get(name) {
            println!("{}: {}", name, locator);
        }
    }

    Ok(())
}

async fn pull(
    config: Config,
    url: &str,
    name: &str,
    args: &[String],
    forced: bool,
    screenshot: Option<PathBuf>,
) -> anyhow::Result<()> {
    let driver: Arc<dyn Driver> = Arc::new(ChromeDriver::launch(&config.browser)?);
    let manager = SessionManager::new();
    let mut page = EarthTime::explore(driver, url, &manager, config).await?;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let key = LookupKey::call(name, &args);
    let response = if forced {
        page.pull_forced(key).await
    } else {
        page.pull(key).await
    };

    let outcome = match response {
        Ok(response) => report(&response, screenshot).await,
        Err(e) => Err(e.into()),
    };

    page.quit().await?;
    outcome
}

async fn report(response: &Response, screenshot: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{}", response);

    for hit in response.hits() {
        match hit.text().await {
            Ok(text) if !text.is_empty() => println!("  {}", text.trim()),
            Ok(_) => {}
            Err(e) => warn!("could not read text of {}: {}", hit, e),
        }
    }

    if let Some(path) = screenshot {
        match response.hits().first() {
            Some(hit) => {
                let png = hit.screenshot().await?;
                tokio::fs::write(&path, png)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Saved screenshot to {}", path.display());
            }
            None => warn!("Nothing to screenshot"),
        }
    }

    Ok(())
}
