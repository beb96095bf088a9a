//! polyglot-db - Main entry point.
//!
//! Queries one collection of a PostgreSQL, MySQL, SQLite or MongoDB database
//! through the query builder and prints the records as JSON lines.

use clap::Parser;
use polyglot_db::config::Config;
use polyglot_db::db::ConnectionManager;
use polyglot_db::models::FieldValue;
use polyglot_db::orm::{QueryBuilder, SortDirection};
use serde_json::Value as JsonValue;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Command-line values are read as JSON when they parse, so `18` is a number
/// and `true` a boolean; anything else is text.
fn cli_value(raw: &str) -> FieldValue {
    serde_json::from_str::<JsonValue>(raw)
        .map(FieldValue::from)
        .unwrap_or_else(|_| FieldValue::from(raw))
}

fn build_query(
    config: &Config,
    mut query: QueryBuilder,
) -> Result<QueryBuilder, Box<dyn std::error::Error>> {
    for clause in &config.filters {
        let (field, operator, value) = Config::parse_filter(clause)?;
        query = query.where_(field, operator, cli_value(&value));
    }

    if let Some(order) = &config.order_by {
        let (field, direction) = Config::parse_order(order);
        query = query.order_by(field, direction.parse::<SortDirection>()?);
    }
    if let Some(limit) = config.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = config.offset {
        query = query.offset(offset);
    }

    Ok(query)
}

async fn run(config: &Config, manager: &ConnectionManager) -> Result<(), Box<dyn std::error::Error>> {
    let connection_config = config.connection_config()?;
    let connection = manager.connect(connection_config).await?;
    let query = build_query(config, QueryBuilder::new(connection, config.collection.clone()))?;

    if config.count {
        println!("{}", query.count().await?);
    } else {
        for record in query.find_all().await? {
            println!("{}", serde_json::to_string(&record)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        collection = %config.collection,
        "Starting polyglot-db v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = ConnectionManager::new();
    let result = run(&config, &manager).await;
    manager.disconnect().await;

    if let Err(e) = result {
        error!(error = %e, "Query failed");
        return Err(e);
    }

    Ok(())
}
