use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use worldbank_pipeline::config::Config;
use worldbank_pipeline::db::{self, DestinationDb};
use worldbank_pipeline::infra::http_client::ReqwestHttp;
use worldbank_pipeline::logging;
use worldbank_pipeline::pipeline::Pipeline;
use worldbank_pipeline::storage::read_csv;

#[derive(Parser)]
#[command(name = "worldbank_pipeline")]
#[command(about = "World Bank health and economy indicators: extract, clean, load")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./config.toml, then built-in settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all indicators, merge, clean and write the CSV
    Extract {
        /// Output CSV path (overrides [output].csv_path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Insert the cleaned CSV into the destination table
    Load {
        /// CSV to load (defaults to [output].csv_path)
        #[arg(long)]
        input: Option<PathBuf>,
        /// SQLite database file (overrides WORLDBANK_DB_PATH and [database].path)
        #[arg(long)]
        database: Option<PathBuf>,
        /// Destination table (overrides [database].table)
        #[arg(long)]
        table: Option<String>,
    },
    /// Create the destination table for the columns of a cleaned CSV
    InitDb {
        /// CSV whose header defines the columns (defaults to [output].csv_path)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        database: Option<PathBuf>,
        #[arg(long)]
        table: Option<String>,
    },
    /// List configured countries and indicators
    Indicators,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { output } => {
            println!("🔄 Running extract pipeline...");
            let output = output.unwrap_or_else(|| config.output.csv_path.clone());

            match Pipeline::run_extract(&config, Box::new(ReqwestHttp::new()), &output) {
                Ok(result) => {
                    println!("\n📊 Extract results:");
                    println!("   Countries: {}", result.countries);
                    println!("   Indicators: {}", result.indicators);
                    println!("   Combined rows: {}", result.combined_rows);
                    println!("   Dropped rows with missing keys: {}", result.report.dropped_missing_keys);
                    println!("   Duplicate country-year rows: {}", result.report.duplicate_keys);
                    if !result.report.missing_by_column.is_empty() {
                        println!("\n   Missing values per column:");
                        for (column, count) in &result.report.missing_by_column {
                            println!("     {column:<35} {count}");
                        }
                    }
                    println!("\n✅ Clean dataset saved to {}", result.output_file.display());
                }
                Err(e) => {
                    error!("Extract failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Load { input, database, table } => {
            println!("📥 Running loader...");
            let input = input.unwrap_or_else(|| config.output.csv_path.clone());
            let db_path = config.database_path(database.as_deref())?;
            let table = table.unwrap_or_else(|| config.database.table.clone());
            let selection = config.column_selection()?;

            match db::load_csv(&input, &db_path, &table, &selection) {
                Ok(summary) => {
                    println!("   Table: {}", summary.table);
                    println!("   Columns: {}", summary.columns.len());
                    println!("   Rows inserted: {}", summary.rows_inserted);
                    if !summary.skipped_columns.is_empty() {
                        println!("   ⚠️  Not loaded: {}", summary.skipped_columns.join(", "));
                    }
                    println!("✅ Data loaded successfully!");
                }
                Err(e) => {
                    error!("Load failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::InitDb { input, database, table } => {
            let input = input.unwrap_or_else(|| config.output.csv_path.clone());
            let db_path = config.database_path(database.as_deref())?;
            let table = table.unwrap_or_else(|| config.database.table.clone());

            let data = read_csv(&input)?;
            let plan = db::plan_columns(&data, &config.column_selection()?)?;
            let db = DestinationDb::open(&db_path)?;
            db.create_table(&table, &plan.columns)?;
            info!(table = %table, db = %db_path.display(), "Initialised destination table");
            println!("✅ Table {} ready in {}", table, db_path.display());
        }
        Commands::Indicators => {
            println!("Countries:");
            for country in &config.countries {
                println!("   {}  {}", country.code, country.name);
            }
            println!("\nIndicators (merge order):");
            for (i, indicator) in config.indicators.iter().enumerate() {
                println!("   {:>2}. {:<20} {}", i + 1, indicator.code, indicator.name);
            }
        }
    }
    Ok(())
}
