//! Media Catalog
//!
//! Command line front end for a local-first media catalog:
//! images, videos and a tree of user categories.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_catalog::catalog::MediaCatalog;
use media_catalog::config::{default_data_dir, Backend, CatalogConfig};
use media_catalog::media::{ImageProbe, LocalFiles};
use media_catalog::query::{MultiFilter, PrimaryFilter, Selection, SortDirection, SortKey};
use media_catalog::state::MediaRecord;

#[derive(Parser, Debug)]
#[command(name = "media-catalog", version, about = "Local-first media catalog")]
struct CliArgs {
    /// Directory holding the catalog and config.json
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Storage back end (overrides config.json)
    #[clap(long, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List records matching a query
    List {
        #[clap(long, value_enum, default_value_t = PrimaryFilter::All)]
        filter: PrimaryFilter,
        /// Only records filed under this category
        #[clap(long)]
        category: Option<String>,
        /// Tag search term (repeatable, all must match)
        #[clap(long = "tag")]
        tags: Vec<String>,
        #[clap(long = "color")]
        colors: Vec<String>,
        #[clap(long = "ratio")]
        ratios: Vec<String>,
        #[clap(long)]
        rating: Option<u8>,
        #[clap(long = "format")]
        formats: Vec<String>,
        #[clap(long)]
        precision: Option<f64>,
        #[clap(long, value_enum, default_value_t = SortKey::Name)]
        sort: SortKey,
        #[clap(long)]
        desc: bool,
    },
    /// Import a folder as a folder-bound category
    Import { folder: PathBuf },
    /// Add individual files
    Add {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the category tree
    Categories,
    /// Create, rename, delete or reorder categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// File records under one or more categories
    Assign {
        #[clap(long = "category", required = true)]
        categories: Vec<String>,
        #[clap(required = true)]
        images: Vec<String>,
    },
    /// Toggle the favorite flag of a record
    Favorite { id: String },
    /// Rate a record (0 - 5)
    Rate { id: String, rating: u8 },
    /// Replace the tags of a record
    Tag { id: String, tags: Vec<String> },
    /// Remove records from the catalog
    Delete {
        /// Also delete the files of folder-bound records
        #[clap(long)]
        hard: bool,
        #[clap(required = true)]
        ids: Vec<String>,
    },
    /// Fill in missing image dimensions
    Refresh,
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Add {
        name: String,
        #[clap(long)]
        parent: Option<String>,
    },
    Rename { id: String, name: String },
    Delete { id: String },
    /// Give the listed categories consecutive sibling positions
    Reorder {
        #[clap(required = true)]
        ids: Vec<String>,
    },
    /// Summarize the direct children of a category
    Children { id: String },
}

fn load_config(cli: &CliArgs) -> Result<CatalogConfig> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = data_dir.join(CatalogConfig::FILE_NAME);
    let mut config = CatalogConfig::load(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    if cli.data_dir.is_some() {
        config.data_dir = data_dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    Ok(config)
}

fn print_record(record: &MediaRecord) {
    let favorite = if record.favorite { "★" } else { " " };
    let ratio = record.ratio().unwrap_or_else(|| "-".to_string());
    println!(
        "{} {:<10} {:<30} {:>5} {:>10} bytes  rating {}  {}",
        favorite,
        record.id,
        record.name,
        ratio,
        record.size,
        record.rating,
        record.tags.iter().cloned().collect::<Vec<_>>().join(", ")
    );
}

fn print_tree(catalog: &MediaCatalog) {
    fn walk(catalog: &MediaCatalog, id: &str, depth: usize) {
        let Some(node) = catalog.tree().get(id) else { return };
        let folder = if node.is_import_from_folder { " 📁" } else { "" };
        println!("{}{} ({}) [{}]{}", "  ".repeat(depth), node.name, node.count, node.id, folder);
        for child in catalog.tree().children(id) {
            walk(catalog, &child.id, depth + 1);
        }
    }

    if catalog.tree().is_empty() {
        println!("No categories yet");
    }
    for root in catalog.tree().roots() {
        walk(catalog, &root.id, 0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = load_config(&cli)?;
    let mut catalog = MediaCatalog::open(config)
        .context("Could not open the catalog storage")?;

    match cli.command {
        Command::List {
            filter,
            category,
            tags,
            colors,
            ratios,
            rating,
            formats,
            precision,
            sort,
            desc,
        } => {
            let mut query = catalog.new_query();
            query.filter = filter;
            query.selection = match category {
                Some(id) => Selection::Category(id),
                None => Selection::Virtual(filter),
            };
            query.tags = tags;
            query.multi = MultiFilter {
                colors,
                ratio: ratios,
                rating,
                formats,
                precision,
            };
            query.sort = sort;
            query.direction = if desc { SortDirection::Desc } else { SortDirection::Asc };

            let results = catalog.query(&query);
            for record in &results {
                print_record(record);
            }
            println!("🔍 {} of {} records", results.len(), catalog.records().len());
        }
        Command::Import { folder } => {
            let folder = folder
                .canonicalize()
                .with_context(|| format!("Cannot open {}", folder.display()))?;
            let import = catalog.import_folder(folder, Arc::new(LocalFiles)).await?;
            println!(
                "✅ Import complete: {} new, {} rebound, category {}",
                import.added.len(),
                import.rebound.len(),
                import.category_id
            );
        }
        Command::Add { files } => {
            let files: Vec<PathBuf> = files
                .into_iter()
                .map(|file| file.canonicalize().unwrap_or(file))
                .collect();
            let (added, unreadable) = catalog.add_files(&files, &LocalFiles, &ImageProbe)?;
            for path in &unreadable {
                eprintln!("⚠️  Could not read {}", path.display());
            }
            println!("✅ Added {} records", added.len());
        }
        Command::Categories => print_tree(&catalog),
        Command::Category { action } => match action {
            CategoryAction::Add { name, parent } => {
                let id = catalog.add_category(&name, parent.as_deref())?;
                println!("✅ Created category {}", id);
            }
            CategoryAction::Rename { id, name } => {
                catalog.rename_category(&id, &name)?;
                println!("✅ Renamed {} to {}", id, name);
            }
            CategoryAction::Delete { id } => {
                let removed = catalog.delete_category(&id)?;
                println!("🗑️  Deleted {} categories", removed.len());
            }
            CategoryAction::Reorder { ids } => {
                for skipped in catalog.save_categories(&ids)? {
                    eprintln!("⚠️  {}", skipped);
                }
                print_tree(&catalog);
            }
            CategoryAction::Children { id } => {
                for child in catalog.subcategories(&id)? {
                    println!(
                        "{} ({}) [{}] {}",
                        child.name,
                        child.count,
                        child.id,
                        child.thumbnail.unwrap_or_default()
                    );
                }
            }
        },
        Command::Assign { categories, images } => {
            let outcome = catalog.add_to_category(&images, &categories)?;
            for skipped in &outcome.skipped {
                eprintln!("⚠️  {}", skipped);
            }
            println!("✅ Updated {} categories", outcome.touched.len());
        }
        Command::Favorite { id } => {
            let favorite = catalog.toggle_favorite(&id)?;
            println!("{} {}", if favorite { "★ Favorited" } else { "☆ Unfavorited" }, id);
        }
        Command::Rate { id, rating } => {
            let record = catalog.update_rating(&id, rating)?;
            print_record(&record);
        }
        Command::Tag { id, tags } => {
            catalog.update_tags(&id, &tags)?;
            if let Some(record) = catalog.get(&id) {
                print_record(record);
            }
        }
        Command::Delete { hard, ids } => {
            let outcome = if hard {
                catalog.bulk_delete_hard(&ids, &LocalFiles)?
            } else {
                catalog.bulk_delete_soft(&ids)?
            };
            for skipped in &outcome.skipped {
                eprintln!("⚠️  {}", skipped);
            }
            for failed in &outcome.file_errors {
                eprintln!("⚠️  {}", failed);
            }
            println!(
                "🗑️  Removed {} records, deleted {} files",
                outcome.removed.len(),
                outcome.files_deleted.len()
            );
        }
        Command::Refresh => {
            let updated = catalog.refresh_dimensions(&ImageProbe)?;
            println!("✅ Updated dimensions of {} records", updated);
        }
    }

    Ok(())
}
