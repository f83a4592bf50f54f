use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use s3_browser::backend::HttpBackend;
use s3_browser::config::Config;
use s3_browser::credentials::Credentials;
use s3_browser::listing::{format_size, EntryKind};
use s3_browser::navigator::FolderPath;
use s3_browser::{Action, Browser, Driver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "s3-browser")]
#[command(about = "Browse the buckets of an S3-compatible account through the s3-browser API", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long, help = "Base URL of the s3-browser API")]
    api_url: Option<String>,

    #[arg(short, long, help = "S3 endpoint URL")]
    endpoint: Option<String>,

    #[arg(short = 'k', long, help = "S3 access key")]
    access_key: Option<String>,

    #[arg(short = 's', long, help = "S3 secret key")]
    secret_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the buckets of the account
    Buckets,

    /// List a folder
    Ls {
        #[arg(short, long, help = "Bucket to browse")]
        bucket: Option<String>,

        #[arg(default_value = "", help = "Folder path, e.g. logs/2024/")]
        path: String,
    },

    /// Compute the total size of a folder
    Size {
        #[arg(short, long, help = "Bucket to browse")]
        bucket: Option<String>,

        #[arg(help = "Folder path, e.g. logs/2024/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_env()?
    };
    if let Some(api_url) = &cli.api_url {
        config.backend.url = api_url.clone();
        config.validate()?;
    }
    if let Some(credentials) = override_credentials(&cli, config.credentials.as_ref()) {
        config.credentials = Some(credentials);
    }

    let backend = HttpBackend::new(&config.backend.url, config.backend.timeout())
        .context("Failed to create API client")?;
    info!("Using API at {}", backend.base_url());

    let mut browser = Browser::new(config.credentials.clone());
    let mut driver = Driver::new(Arc::new(backend), tokio::runtime::Handle::current());

    open_session(&mut driver, &mut browser).await?;

    match cli.command {
        Commands::Buckets => {
            if browser.buckets().is_empty() {
                println!("No buckets found");
            }
            for bucket in browser.buckets() {
                let marker = if browser.bucket() == Some(bucket.as_str()) { "*" } else { " " };
                println!("{} {}", marker, bucket);
            }
        }

        Commands::Ls { bucket, path } => {
            use_bucket(&mut driver, &mut browser, bucket.as_deref()).await?;
            let folder = FolderPath::parse(&path)?;
            walk_to(&mut driver, &mut browser, &folder).await?;
            print_listing(&browser);
        }

        Commands::Size { bucket, path } => {
            use_bucket(&mut driver, &mut browser, bucket.as_deref()).await?;
            let folder = FolderPath::parse(&path)?;
            let name = folder
                .segments()
                .last()
                .map(|segment| format!("{}/", segment))
                .ok_or_else(|| anyhow!("A folder path is required"))?;
            walk_to(&mut driver, &mut browser, &folder.parent()).await?;

            driver.dispatch(&mut browser, Action::RequestFolderSize(name.clone()));
            driver.run_until_idle(&mut browser).await;

            match browser.rows().iter().find(|row| row.key == name).and_then(|row| row.size) {
                Some(size) => println!("{}\t{} ({} bytes)", folder, format_size(size), size),
                None => bail!("{}", last_notice(&browser)),
            }
        }
    }

    Ok(())
}

fn override_credentials(cli: &Cli, seeded: Option<&Credentials>) -> Option<Credentials> {
    if cli.endpoint.is_none() && cli.access_key.is_none() && cli.secret_key.is_none() {
        return None;
    }
    let base = seeded.cloned().unwrap_or_default();
    Some(Credentials::new(
        cli.endpoint.clone().unwrap_or(base.endpoint),
        cli.access_key.clone().unwrap_or(base.access_key),
        cli.secret_key.clone().unwrap_or(base.secret_key),
    ))
}

/// Resumes the API session, or connects with the configured credentials.
async fn open_session(driver: &mut Driver, browser: &mut Browser) -> Result<()> {
    driver.dispatch(browser, Action::Start);
    driver.run_until_idle(browser).await;

    let Some(prompt) = browser.prompt().cloned() else {
        return Ok(());
    };
    let credentials = browser.credentials().cloned().unwrap_or(prompt.prefill);
    if !credentials.is_complete() {
        bail!(
            "No session to resume and no credentials given (missing {})",
            credentials.missing_fields().join(", ")
        );
    }

    driver.dispatch(
        browser,
        Action::SubmitCredentials {
            endpoint: credentials.endpoint,
            access_key: credentials.access_key,
            secret_key: credentials.secret_key,
        },
    );
    driver.run_until_idle(browser).await;

    if let Some(prompt) = browser.prompt() {
        bail!(
            "{}",
            prompt.error.clone().unwrap_or_else(|| last_notice(browser))
        );
    }
    Ok(())
}

async fn use_bucket(driver: &mut Driver, browser: &mut Browser, bucket: Option<&str>) -> Result<()> {
    let wanted = match (bucket, browser.bucket(), browser.buckets()) {
        (Some(bucket), _, _) => bucket.to_string(),
        (None, Some(active), _) => active.to_string(),
        (None, None, [only]) => only.clone(),
        (None, None, _) => bail!("Several buckets available, choose one with --bucket"),
    };

    if browser.bucket() != Some(wanted.as_str()) {
        driver.dispatch(browser, Action::SelectBucket(wanted.clone()));
        driver.run_until_idle(browser).await;
        if browser.bucket() != Some(wanted.as_str()) {
            bail!("{}", last_notice(browser));
        }
    } else if !browser.is_listing_loaded() {
        driver.dispatch(browser, Action::Refresh);
        driver.run_until_idle(browser).await;
    }
    Ok(())
}

/// Descends from the bucket root to `target`, one folder at a time.
async fn walk_to(driver: &mut Driver, browser: &mut Browser, target: &FolderPath) -> Result<()> {
    let mut expected = FolderPath::root();
    for segment in target.segments() {
        expected = expected.join(segment)?;
        driver.dispatch(browser, Action::EnterFolder(segment.to_string()));
        driver.run_until_idle(browser).await;
        if browser.listing_folder() != &expected {
            bail!("{}", last_notice(browser));
        }
    }
    if !browser.is_listing_loaded() {
        bail!("{}", last_notice(browser));
    }
    Ok(())
}

fn print_listing(browser: &Browser) {
    println!(
        "{}:{}",
        browser.bucket().unwrap_or_default(),
        browser.listing_folder()
    );
    for row in browser.rows() {
        let size = match (row.kind, row.size) {
            (EntryKind::ParentLink, _) => String::new(),
            (_, Some(size)) => format_size(size),
            (EntryKind::Folder, None) => "-".to_string(),
            (_, None) => "?".to_string(),
        };
        let modified = row
            .last_modified
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("  {:<48} {:>12}  {}", row.key, size, modified);
    }
}

fn last_notice(browser: &Browser) -> String {
    browser
        .last_notice()
        .map(|notice| notice.message.clone())
        .unwrap_or_else(|| "Request failed".to_string())
}
