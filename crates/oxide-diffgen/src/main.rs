//! oxide-diffgen CLI
//!
//! Generates reversible, versioned migration files from the difference
//! between a live (or snapshotted) schema and a target schema.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_diffgen::prelude::*;

/// Schema-diff driven migration generator.
#[derive(Parser)]
#[command(name = "oxide-diffgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database to introspect as the current schema.
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// JSON snapshot of the current schema (empty schema if omitted).
    #[arg(long, env = "DIFFGEN_CURRENT")]
    current: Option<PathBuf>,

    /// JSON snapshot of the target schema.
    #[arg(short, long, env = "DIFFGEN_TARGET")]
    target: Option<PathBuf>,

    /// Migrations directory.
    #[arg(short, long, env = "DIFFGEN_MIGRATIONS_DIR", default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Template name, absolute or relative to --template-dir.
    #[arg(long, env = "DIFFGEN_TEMPLATE")]
    template: Option<String>,

    /// Base directory for relative template names.
    #[arg(long, env = "DIFFGEN_TEMPLATE_DIR", default_value = ".")]
    template_dir: PathBuf,

    /// SQL dialect of the generated statements.
    #[arg(long, value_enum, env = "DIFFGEN_DIALECT", default_value = "postgres")]
    dialect: DialectKind,

    /// Only compare tables whose name matches this regular expression.
    #[arg(long)]
    filter_expression: Option<String>,

    /// File whose contents are injected at the template's custom section.
    #[arg(long)]
    custom_methods: Option<PathBuf>,

    /// Use this version instead of the current timestamp.
    #[arg(long)]
    version_number: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a migration from the schema difference.
    Diff {
        /// Do not drop tables, columns, indexes or foreign keys.
        #[arg(long)]
        no_drops: bool,

        /// Print the migration instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a blank migration.
    Generate {
        /// Print the migration instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the SQL the schema difference would produce.
    Sql {
        /// Show revert statements instead of apply statements.
        #[arg(short, long)]
        revert: bool,

        /// Do not drop tables, columns, indexes or foreign keys.
        #[arg(long)]
        no_drops: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    fn config(&self, no_drops: bool, dry_run: bool) -> anyhow::Result<GeneratorConfig> {
        Ok(GeneratorConfig {
            dialect: self.dialect,
            options: GeneratorOptions {
                suppress_destructive: no_drops,
            },
            migrations_dir: self.migrations_dir.clone(),
            template: self.template.clone(),
            template_dir: self.template_dir.clone(),
            custom_methods: read_custom_methods(self.custom_methods.as_deref())
                .context("Failed to read custom methods")?,
            dry_run,
        })
    }

    fn allocator(&self) -> anyhow::Result<Box<dyn VersionAllocator>> {
        match &self.version_number {
            Some(raw) => {
                let version = MigrationVersion::parse(raw)
                    .with_context(|| format!("Invalid version '{raw}', expected YYYYMMDDHHMMSS"))?;
                Ok(Box::new(FixedVersionAllocator::new(version)))
            }
            None => Ok(Box::new(TimestampAllocator::new())),
        }
    }

    /// Introspection is the only async step; it completes before the
    /// synchronous pipeline runs.
    async fn provider(&self) -> anyhow::Result<Box<dyn SchemaProvider>> {
        let target = self
            .target
            .clone()
            .context("A target schema is required (--target or DIFFGEN_TARGET)")?;

        let provider: Box<dyn SchemaProvider> = match &self.database {
            Some(url) => {
                if self.current.is_some() {
                    warn!("--current is ignored when --database is set");
                }
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(url)
                    .await
                    .map_err(|err| DiffgenError::snapshot(SchemaSide::Current, err))?;
                let current = introspect_sqlite(&pool)
                    .await
                    .map_err(|err| DiffgenError::snapshot(SchemaSide::Current, err))?;
                pool.close().await;

                let target = read_snapshot(&target)
                    .map_err(|err| DiffgenError::snapshot(SchemaSide::Target, err))?;
                Box::new(StubSchemaProvider::new(current, target))
            }
            None => Box::new(FileSchemaProvider::new(self.current.clone(), target)),
        };

        match &self.filter_expression {
            Some(expression) => Ok(Box::new(FilteredSchemaProvider::new(provider, expression)?)),
            None => Ok(provider),
        }
    }
}

fn report(artifact: &MigrationArtifact) {
    match &artifact.path {
        Some(path) => info!("Generated new migration {}", path.display()),
        None => {
            info!("Dry run: {} was not written", artifact.file_name());
            println!("{}", artifact.contents);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Diff { no_drops, dry_run } => {
            let provider = cli.provider().await?;
            let mut generator =
                MigrationGenerator::from_config(cli.config(*no_drops, *dry_run)?, cli.allocator()?)?;

            let diff = generator.planned_diff(provider.as_ref())?;
            if !diff.is_empty() {
                info!("Schema changes:\n{diff}");
            }

            match generator.generate_diff(diff)? {
                GenerationOutcome::NoChanges => {
                    info!("No changes detected in your mapping information.");
                }
                GenerationOutcome::Generated(artifact) => report(&artifact),
            }
        }

        Commands::Generate { dry_run } => {
            let mut generator =
                MigrationGenerator::from_config(cli.config(false, *dry_run)?, cli.allocator()?)?;
            report(&generator.generate_blank()?);
        }

        Commands::Sql {
            revert,
            no_drops,
            format,
        } => {
            let provider = cli.provider().await?;
            let generator =
                MigrationGenerator::from_config(cli.config(*no_drops, true)?, cli.allocator()?)?;
            let statements = generator.preview(provider.as_ref())?;

            match format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "apply": statements.apply,
                        "revert": statements.revert,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    let selected = if *revert {
                        &statements.revert
                    } else {
                        &statements.apply
                    };
                    if selected.is_empty() {
                        info!("No changes detected.");
                    }
                    for sql in selected {
                        println!("{sql};");
                    }
                }
            }
        }
    }

    Ok(())
}
