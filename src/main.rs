use clap::{Parser, Subcommand};
use linotype::{config, output, pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that regenerate artifacts.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Rewrite every post and listing page regardless of freshness
    #[arg(long)]
    force_html: bool,

    /// Regenerate every image derivative regardless of existing outputs
    #[arg(long)]
    force_images: bool,

    /// Rebuild a single item, as category/filename (e.g. journal/hello.md)
    #[arg(long, value_name = "CATEGORY/FILE")]
    only: Option<String>,

    /// Disable the text-blob cache for this run
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "linotype")]
#[command(about = "Incremental publishing engine for articles, photo posts, and pages")]
#[command(long_about = "\
Incremental publishing engine for articles, photo posts, and pages

One directory per category under the content root; the filename (minus
extension) is the slug. Articles carry a key: value metadata header,
photo posts are plain image files (metadata comes from the embedded
fields), pages are headerless documents.

Content structure:

  content/
  ├── config.toml                # Site config (optional)
  ├── files/                     # Images referenced by [img:...] shortcodes
  ├── journal/
  │   ├── hello-world.md         # Article (metadata header + body)
  │   └── colophon.md            # Page (no header)
  └── photos/
      └── dsc04512.jpg           # Photo post (EXIF/IPTC metadata)

A build writes rendered pages, image derivatives, tag/category listings,
a feed, redirect stubs, sitemap.txt, and a search index into the target
root, skipping anything whose inputs have not changed. A lock file keeps
builds single-flight; a second invocation fails fast.

Run 'linotype gen-config' to print a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "content", global = true)]
    source: PathBuf,

    /// Verbose (debug-level) logging
    #[arg(long, short = 'v', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: parse, merge, render, index
    Build(BuildArgs),
    /// Validate content and configuration without writing anything
    Check,
    /// Print a stock config.toml with all options
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build(args) => {
            let config = config::load_config(&cli.source)?;
            let flags = pipeline::BuildFlags {
                force_html: args.force_html,
                force_images: args.force_images,
                only: args.only,
                no_cache: args.no_cache,
            };
            let report = pipeline::build(&cli.source, &config, &flags)?;
            output::print_build_summary(&report);
        }
        Command::Check => {
            let config = config::load_config(&cli.source)?;
            let mut missing = 0;
            for category in &config.categories {
                let dir = cli.source.join(&category.name);
                if dir.is_dir() {
                    println!("ok      {}", category.name);
                } else {
                    println!("missing {}", category.name);
                    missing += 1;
                }
            }
            if missing == 0 {
                println!("Content is valid");
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(())
}
