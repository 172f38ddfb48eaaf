use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use merchant_categorizer::{
    init_tracing, parse_date, BatchIngestor, Categorizer, CategorizerConfig, NewTransaction,
    Transaction, TransactionFilter,
};

#[derive(Parser)]
#[command(name = "categorizer", version, about = "Categorize transactions by merchant")]
struct Cli {
    /// JSON config file (CATEGORIZER_* environment variables override it)
    #[arg(long, global = true, env = "CATEGORIZER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a CSV file (merchant, amount, date[, currency, description])
    Import {
        csv: PathBuf,
        #[arg(long)]
        user: i64,
    },

    /// Categorize and store a single transaction
    Categorize {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        merchant: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: Option<String>,
        /// YYYY-MM-DD, DD/MM/YYYY, MM/DD/YYYY or DD-MM-YYYY
        #[arg(long)]
        date: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Override the category of a stored transaction
    Correct {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        transaction: i64,
        #[arg(long)]
        category: i64,
        #[arg(long)]
        note: Option<String>,
    },

    /// List a user's transactions, newest first
    List {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<CategorizerConfig> {
    match path {
        Some(path) => {
            let mut config = CategorizerConfig::from_file(path)?;
            config.apply_env()?;
            config.validate()?;
            Ok(config)
        }
        None => CategorizerConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let categorizer = Arc::new(Categorizer::open(&config)?);

    match cli.command {
        Command::Import { csv, user } => {
            let file = File::open(&csv).with_context(|| format!("Failed to open {}", csv.display()))?;
            let ingestor = BatchIngestor::new(categorizer, &config);
            let summary = ingestor.ingest_csv(user, file).await?;

            println!(
                "✓ {} rows: {} imported, {} failed",
                summary.total_records, summary.success_count, summary.failure_count
            );
            for error in &summary.errors {
                println!("  row {} ({}): {}", error.row_number, error.merchant_name, error.error);
            }
        }

        Command::Categorize {
            user,
            merchant,
            amount,
            currency,
            date,
            description,
        } => {
            let tx = categorizer
                .categorize_and_persist(NewTransaction {
                    user_id: user,
                    merchant_name: merchant,
                    amount,
                    currency: currency.unwrap_or_else(|| config.default_currency.clone()),
                    transaction_date: parse_date(&date)?,
                    description,
                })
                .await?;
            print_transaction(&tx);
        }

        Command::Correct {
            user,
            transaction,
            category,
            note,
        } => {
            let tx = categorizer
                .apply_user_correction_with_note(transaction, user, category, note.as_deref())
                .await?;
            print_transaction(&tx);
        }

        Command::List {
            user,
            category,
            from,
            to,
            limit,
        } => {
            let filter = TransactionFilter {
                category_id: category,
                start_date: from,
                end_date: to,
                limit: Some(limit),
                offset: None,
            };
            for tx in categorizer.list_transactions(user, &filter)? {
                print_transaction(&tx);
            }
        }
    }

    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let category = tx
        .category_id
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "#{:<6} {} {:<30} {:>12} {} category={} confidence={:.2}{}",
        tx.id,
        tx.transaction_date,
        tx.merchant_name,
        tx.amount,
        tx.currency,
        category,
        tx.confidence_score,
        if tx.is_user_corrected { " (corrected)" } else { "" },
    );
}
