use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use site2pdf::pdf_merger::merge;
use site2pdf::{discover_and_order, ChromiumRenderer, HttpFetcher, Pipeline, SiteConfig};
use std::path::PathBuf;
use std::process;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "site2pdf")]
#[command(about = "CLI utility to turn a static documentation website into a single ordered PDF")]
#[command(version = "0.1.0")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct SiteArgs {
    /// Seed page of the documentation site
    seed: String,

    /// URL prefix bounding the crawl (defaults to the seed's directory)
    #[arg(short = 'b', long = "base")]
    base: Option<String>,

    /// JSON file with the section catalog and other site settings
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(short = 't', long = "timeout", value_parser = parse_timeout)]
    timeout: Option<f64>,

    /// Skip the navigation menu and order pages from a plain crawl
    #[arg(long = "crawl-only")]
    crawl_only: bool,

    /// Keep the discovery order instead of sorting by the section catalog
    #[arg(long = "keep-discovery-order")]
    keep_discovery_order: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the site, render every page and merge them into one PDF
    Build {
        #[command(flatten)]
        site: SiteArgs,

        /// Output file for the merged PDF
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Directory holding the per-page PDFs while the run is in progress
        #[arg(long = "temp-dir")]
        temp_dir: Option<PathBuf>,

        /// Preserve individual page PDFs (by default they are deleted after merging)
        #[arg(short = 'p', long = "preserve-pages")]
        preserve_pages: bool,

        /// Text printed at the top of every page
        #[arg(long = "header")]
        header: Option<String>,

        /// Text printed next to the page number at the bottom of every page
        #[arg(long = "footer")]
        footer: Option<String>,
    },
    /// Print the ordered list of pages without rendering anything
    List {
        #[command(flatten)]
        site: SiteArgs,
    },
    /// Merge existing PDF files into a single document
    Merge {
        /// Directory containing PDF files to merge
        #[arg(short = 'd', long = "dir", default_value = "temp_pdfs")]
        input_dir: String,

        /// Output file path for the merged PDF
        #[arg(short = 'o', long = "output", default_value = "merged.pdf")]
        output_file: String,
    },
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !value.is_finite() || value <= 0.0 {
        return Err("Must be a positive number.".to_string());
    }
    Ok(value)
}

fn site_config(site: &SiteArgs) -> Result<SiteConfig> {
    let mut config = match &site.config {
        Some(path) => SiteConfig::load(path)?,
        None => SiteConfig::default(),
    };

    config.seed_url = site.seed.clone();
    if let Some(base) = &site.base {
        config.base_domain = base.clone();
    }
    if let Some(timeout) = site.timeout {
        config.timeout_secs = timeout;
    }
    config.crawl_only |= site.crawl_only;
    config.keep_discovery_order |= site.keep_discovery_order;

    Ok(config.validate()?)
}

async fn build(config: SiteConfig) -> Result<()> {
    let fetcher = HttpFetcher::from_config(&config)?;
    let renderer = ChromiumRenderer::launch(&config.page).await?;

    let result = Pipeline::new(&config, &fetcher, &renderer).run().await;
    renderer.close().await;

    let summary = result?;
    info!(
        "Done: {} of {} pages in {}",
        summary.pages_rendered,
        summary.urls_found,
        summary.output.display().to_string().green()
    );
    if summary.pages_skipped > 0 {
        info!("{} pages were skipped, see warnings above", summary.pages_skipped);
    }
    Ok(())
}

async fn list(config: SiteConfig) -> Result<()> {
    let fetcher = HttpFetcher::from_config(&config)?;
    let urls = discover_and_order(&config, &fetcher).await;

    if urls.is_empty() {
        return Err(anyhow!("No URLs found from {}", config.seed_url));
    }

    info!("URLs found: {}", urls.len());
    for (i, url) in urls.iter().enumerate() {
        println!("{:>4}  {}", i + 1, url);
    }
    Ok(())
}

async fn merge_pdfs(input_dir: &str, output_file: &str) -> Result<()> {
    let input_path = PathBuf::from(input_dir);

    if !input_path.exists() {
        return Err(anyhow!("Input directory '{}' does not exist", input_dir));
    }

    info!("Scanning directory: {}", input_dir.green());

    let mut entries = fs::read_dir(&input_path).await?;
    let mut pdf_files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|extension| extension == "pdf") {
            pdf_files.push(path);
        }
    }

    if pdf_files.is_empty() {
        return Err(anyhow!("No PDF files found in '{}'", input_dir));
    }

    // page_2.pdf before page_10.pdf
    pdf_files.sort_by_key(|path| page_number(path));

    info!("Found {} PDF files to merge", pdf_files.len());
    let output_path = PathBuf::from(output_file);
    merge(&pdf_files, &output_path).await?;

    info!(
        "Successfully merged {} PDFs into: {}",
        pdf_files.len(),
        output_path.display().to_string().green()
    );

    Ok(())
}

fn page_number(path: &std::path::Path) -> (usize, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let number = stem
        .rsplit('_')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX);
    (number, stem)
}

#[tokio::main]
async fn main() {
    // Set up logging with chromiumoxide errors suppressed
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse().unwrap())
        .add_directive("chromiumoxide::handler=off".parse().unwrap())
        .add_directive("site2pdf=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Build {
            site,
            output,
            temp_dir,
            preserve_pages,
            header,
            footer,
        } => match site_config(&site) {
            Ok(mut config) => {
                if output.is_some() {
                    config.output = output;
                }
                if let Some(temp_dir) = temp_dir {
                    config.temp_dir = temp_dir;
                }
                config.preserve_pages |= preserve_pages;
                config.page.header_text = header.or(config.page.header_text);
                config.page.footer_text = footer.or(config.page.footer_text);
                build(config).await
            }
            Err(e) => Err(e),
        },
        Commands::List { site } => match site_config(&site) {
            Ok(config) => list(config).await,
            Err(e) => Err(e),
        },
        Commands::Merge {
            input_dir,
            output_file,
        } => merge_pdfs(&input_dir, &output_file).await,
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
