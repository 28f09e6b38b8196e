// Loads the demonstration program (and, with --with-ratings, sample ratings)

use conference_admin::{
    config::Config,
    data_seeder::{seed_sample_program, seed_sample_ratings},
    error::AppResult,
    infrastructure::open_document_store,
    services::{ProgramEditor, ProgramService},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let with_ratings = std::env::args().any(|arg| arg == "--with-ratings");
    let config = Config::from_env()?;
    println!("🚀 Seeding sample data into {}", config.database.url);

    run(&config, with_ratings).await?;
    Ok(())
}

async fn run(config: &Config, with_ratings: bool) -> AppResult<()> {
    let store = open_document_store(&config.database.url).await?;
    let mut editor = ProgramEditor::new(ProgramService::new(store.clone()));

    let program = seed_sample_program(&mut editor).await?;
    println!("✅ Program '{}' ({} talks)", program.title, program.conferences.len());

    if with_ratings {
        let written = seed_sample_ratings(&store, &program).await?;
        println!("✅ {} sample ratings", written);
    }
    Ok(())
}
