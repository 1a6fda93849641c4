use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repokit::entities::user::UserField;
use repokit::entities::{
    TransactionDraft, TransactionStatus, UserDraft, UserRepository, UserStatus,
};
use repokit::storage::InMemoryStore;
use repokit::{create_cache, Config, Repositories, TracingReporter};
use repokit_core::query::{PaginationRequest, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Repokit - layered, cached repositories over a document store
#[derive(Parser, Debug)]
#[command(name = "repokit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// Number of demo users to seed
    #[arg(long, default_value = "25", env = "DEMO_USERS")]
    users: u32,

    /// Page size for the demo query
    #[arg(long, default_value = "10")]
    limit: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "repokit=debug".into());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    let config = Config::from_env();
    let store = InMemoryStore::new();
    let cache = create_cache(&config).await?;
    let repos = Repositories::new(
        |name| store.collection(name),
        cache,
        Arc::new(TracingReporter::new()),
        &config,
    );

    seed(&repos, cli.users).await?;

    // Same query twice: the second one is answered by the cache.
    let pagination = PaginationRequest::new(cli.limit).with_sort(SortKey::asc("name"));
    let filters = UserRepository::query()
        .by_field(UserField::Status, UserStatus::Active.as_str())
        .build()
        .filters;
    for _ in 0..2 {
        let page = repos.users.find_with_pagination(&filters, &pagination).await?;
        tracing::info!(
            total = page.total,
            returned = page.data.len(),
            has_more = page.has_more,
            "Fetched active users"
        );
    }

    // A write purges the namespace; the next read sees it.
    let first = repos
        .users
        .find_one(&filters)
        .await?
        .context("no active user seeded")?;
    repos.users.suspend(&first.id).await?;
    let page = repos.users.find_with_pagination(&filters, &pagination).await?;
    tracing::info!(total = page.total, "Active users after suspending one");

    let stats = repos.transactions.stats(None).await?;
    for total in &stats.by_status {
        tracing::info!(
            status = total.status.as_str(),
            count = total.count,
            amount = total.amount,
            "Transaction totals"
        );
    }

    let cache_stats = repos.cache_stats();
    tracing::info!(%cache_stats, "Cache statistics");
    println!("{cache_stats}");

    Ok(())
}

async fn seed(repos: &Repositories, users: u32) -> Result<()> {
    let drafts = (0..users)
        .map(|i| {
            UserDraft::new(format!("User {i:02}"), format!("user{i}@example.com"))
                .with_age(18 + i % 50)
        })
        .collect();
    let created = repos.users.create_many(drafts).await?;

    let transactions = created
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let status = if i % 4 == 0 {
                TransactionStatus::Failed
            } else {
                TransactionStatus::Completed
            };
            TransactionDraft::new(user.id.clone(), 10.0 + i as f64, "EUR").with_status(status)
        })
        .collect();
    repos.transactions.create_many(transactions).await?;

    tracing::info!(users = created.len(), "Seeded demo data");
    Ok(())
}
