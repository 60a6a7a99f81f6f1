use learnpath_runtime::config::Config;
use learnpath_runtime::{Store, Workspace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Store::open(&config.data_dir).await?;
    let ws = Workspace::open(store).await?;

    for lp in ws.learning_paths() {
        let key = lp.key();
        tracing::info!(enrolled = ws.enrolled_students(&key).len(), "{}", lp.summary());
        for activity in lp.activities() {
            tracing::info!(
                path = %key,
                kind = %activity.activity_type(),
                mandatory = activity.is_mandatory(),
                minutes = activity.expected_duration(),
                "  {}",
                activity.title()
            );
        }
    }

    for progress in ws.progresses() {
        let Some(lp) = ws.learning_path(progress.learning_path()) else {
            tracing::warn!(key = %progress.key(), "progress refers to a missing learning path");
            continue;
        };
        let pct = progress.calculate_completion_percentage(lp)?;
        tracing::info!(
            student = %progress.student(),
            path = %lp.title(),
            completed = ?progress.completion_date(),
            "{pct:.2}% complete"
        );
    }

    Ok(())
}
