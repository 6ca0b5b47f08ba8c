use clap::{Parser, Subcommand};
use sitefreeze::config::{self, ConfigOverrides};
use sitefreeze::fetch::HttpFetcher;
use sitefreeze::output;
use sitefreeze::pipeline::{Pipeline, Stage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitefreeze")]
#[command(about = "Snapshot a dynamic blog into a static site and publish it")]
#[command(long_about = "\
Snapshot a dynamic blog into a static site and publish it

The source site is mirrored into the output directory, then every file is
cleaned up so it can be served by a plain static host from the destination
origin.

Stages:

   1  reset               empty the output directory
   2  mirror              crawl pages and their assets
   3  supplementary       404 page, feed, sitemaps
   4  audit               download images the crawl missed
   5  sanitize            strip query strings from filenames
   6  fixup               404/index.html → 404.html
   7  rewrite             source origin → destination origin
   8  cleanup             remove backend-only elements
   9  publish metadata    CNAME, .nojekyll
  10  publish             run the publish command

Commands run contiguous ranges: fetch (1-4), clean (5-8), build (1-9),
deploy (1-10), publish (9-10).

Run 'sitefreeze gen-config' to generate a documented sitefreeze.toml.")]
#[command(version)]
struct Cli {
    /// Config file (optional; missing file means stock defaults)
    #[arg(long, default_value = "sitefreeze.toml", global = true)]
    config: PathBuf,

    /// Origin of the live site to mirror
    #[arg(long, env = "SOURCE_URL", global = true)]
    source_url: Option<String>,

    /// Origin the snapshot is served from
    #[arg(long, env = "DESTINATION_URL", global = true)]
    destination_url: Option<String>,

    /// Output directory
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Never run the publish command
    #[arg(
        long,
        env = "BUILD_ONLY",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    build_only: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reset the output directory and fetch the site (stages 1-4)
    Fetch,
    /// Make a fetched directory servable (stages 5-8)
    Clean,
    /// Fetch and clean, then write publish metadata (stages 1-9)
    Build,
    /// Build and publish (stages 1-10)
    Deploy,
    /// Publish an already-built directory (stages 9-10)
    Publish,
    /// Print a stock sitefreeze.toml with all options documented
    GenConfig,
}

impl Command {
    fn stages(&self) -> &'static [Stage] {
        match self {
            Command::Fetch => Stage::FETCH,
            Command::Clean => Stage::CLEAN,
            Command::Build => Stage::BUILD,
            Command::Deploy => Stage::DEPLOY,
            Command::Publish => Stage::PUBLISH,
            Command::GenConfig => &[],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Fetch => "Fetch",
            Command::Clean => "Clean",
            Command::Build => "Build",
            Command::Deploy => "Deploy",
            Command::Publish => "Publish",
            Command::GenConfig => "Gen-config",
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "sitefreeze=info",
        1 => "sitefreeze=debug",
        _ => "sitefreeze=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    init_logging(cli.verbose);

    let overrides = ConfigOverrides {
        source_url: cli.source_url,
        destination_url: cli.destination_url,
        output_dir: cli.output,
        build_only: cli.build_only,
    };
    let site_config = config::load_config(&cli.config, &overrides)?;
    let fetcher = HttpFetcher::new(&site_config.mirror.user_agent)?;
    let pipeline = Pipeline::new(site_config, fetcher)?;
    let origins = pipeline.origins();
    tracing::info!(
        source = %origins.source_prefix(),
        destination = %origins.destination_prefix(),
        "origins resolved"
    );

    pipeline.run(cli.command.stages(), output::print_pipeline_event)?;
    output::print_completion(cli.command.name(), &pipeline.output_dir());

    Ok(())
}
