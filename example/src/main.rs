use tracing_cloudwatch_metric::{Error, TargetRegistry, TARGET_NAME};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

fn main() -> Result<(), Error> {
    let registry = TargetRegistry::with_defaults();

    // Credentials come from the environment unless both keys are set here
    let target = registry.create(
        TARGET_NAME,
        &serde_json::json!({
            "region": std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into()),
            "namespace": "MetricsExample",
            "metric_name": "Errors",
            "unit": "Count",
            "value": 1.0
        }),
    )?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .compact()
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(target.with_filter(LevelFilter::ERROR))
        .init();

    tracing::info!("not forwarded, below the target's level");
    tracing::error!(order = 42, "payment failed");

    Ok(())
}
