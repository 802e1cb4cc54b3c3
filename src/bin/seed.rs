use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Parser, Debug)]
#[command(author, version, about = "taskdeck demo-data seeder", long_about = None)]
struct Cli {
    /// Database to seed; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Wipe existing rows before seeding
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env` when the
    // binary runs from elsewhere (e.g. inside a container).
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("DATABASE_URL not set")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    if cli.fresh {
        taskdeck::seed::wipe(&pool).await?;
    }

    taskdeck::seed::seed(&pool).await?;

    Ok(())
}
