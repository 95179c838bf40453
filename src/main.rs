//! `vcxproj-gen`: write a `.vcxproj` / `.vcxproj.filters` pair from a TOML
//! manifest.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use vcxproj_rs::{FiltersDocument, Manifest, ProjectDocument, check_correlation, generate};

#[derive(Debug, Parser)]
#[command(name = "vcxproj-gen", version, about)]
struct Cli {
    /// Manifest describing the project (`[project]` and optional `[settings]`).
    manifest: PathBuf,

    /// Write the project here instead of the manifest's `output`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read both documents back and check that they agree.
    #[arg(long)]
    verify: bool,

    /// More log output; repeat for trace level.  `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only report errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_logging(level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let mut manifest = Manifest::from_file(&cli.manifest)?;
    if let Some(output) = &cli.output {
        manifest.project.output = std::path::absolute(output)
            .with_context(|| format!("cannot resolve output path {}", output.display()))?;
    }

    let generated = generate(&manifest.project, &manifest.settings)
        .with_context(|| format!("failed to generate project '{}'", manifest.project.name))?;
    for header in &generated.external_headers {
        tracing::debug!(%header, "left out: no neighbouring source file");
    }
    println!("{}", generated.project_path.display());

    if cli.verify {
        let project = ProjectDocument::from_file(&generated.project_path)
            .with_context(|| format!("cannot read back {}", generated.project_path.display()))?;
        let filters = FiltersDocument::from_file(&generated.filters_path)
            .with_context(|| format!("cannot read back {}", generated.filters_path.display()))?;

        let unfiled: Vec<&str> = generated.build_script.as_deref().into_iter().collect();
        let issues = check_correlation(&project, &filters, &unfiled);
        for issue in &issues {
            tracing::error!("{issue}");
        }
        if !issues.is_empty() {
            bail!("{} inconsistencies between project and filters", issues.len());
        }
        tracing::info!(items = project.items.len(), "documents verified");
    }

    Ok(())
}
