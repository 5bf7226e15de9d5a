//! Synthetic User Seeder
//!
//! Generates simulated users with churn behavior patterns and inserts them
//! into the feature store.
//!
//! Users with more than 5 support tickets or fewer than 10 clicks churn with
//! probability 0.85, everyone else with probability 0.15.

use churn_guard::config::AppConfig;
use churn_guard::store::{insert_in_batches, SupabaseStore};
use churn_guard::types::{FeatureVector, UserRecord};
use rand::Rng;
use tracing::{info, warn};

const HIGH_CHURN_RATE: f64 = 0.85;
const BASE_CHURN_RATE: f64 = 0.15;

/// Synthetic user generator
struct UserGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> UserGenerator<R> {
    fn new(rng: R) -> Self {
        Self { rng }
    }

    fn generate(&mut self) -> anyhow::Result<UserRecord> {
        let total_clicks: i64 = self.rng.gen_range(0..=500);
        let support_tickets: i64 = self.rng.gen_range(0..=15);

        // More clicks usually means longer sessions
        let base_session_time: f64 = self.rng.gen_range(0.5..30.0);
        let avg_session_time = if total_clicks > 100 {
            base_session_time * self.rng.gen_range(1.2..2.0)
        } else {
            base_session_time * self.rng.gen_range(0.5..1.0)
        };

        let days_since_signup: i64 = self.rng.gen_range(1..=365);

        let feature_usage_score = (total_clicks as f64 / 5.0 + avg_session_time * 2.0
            - support_tickets as f64 * 5.0
            + self.rng.gen_range(-10.0..10.0))
        .clamp(0.0, 100.0);

        let features = FeatureVector::new(
            total_clicks,
            round2(avg_session_time),
            support_tickets,
            days_since_signup,
            round2(feature_usage_score),
        )?;

        let churn_rate = if support_tickets > 5 || total_clicks < 10 {
            HIGH_CHURN_RATE
        } else {
            BASE_CHURN_RATE
        };
        let is_churned = self.rng.gen_bool(churn_rate);

        Ok(UserRecord::new(user_id(), &features).with_churned(is_churned))
    }
}

fn user_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("user_{}", &hex[..12])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_high_risk(user: &UserRecord) -> bool {
    user.support_tickets > 5 || user.total_clicks < 10
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("churn_seed=info".parse()?)
                .add_directive("churn_guard=info".parse()?),
        )
        .init();

    info!("Starting Synthetic User Seeder");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let count: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let config_path = args.get(2).map(|s| s.as_str()).unwrap_or("config/config.toml");

    let config = match AppConfig::load_from_path(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %config_path, error = %e, "Failed to load configuration, using defaults");
            AppConfig::default()
        }
    };

    info!(count = count, config_path = %config_path, "Generating synthetic users");

    let mut generator = UserGenerator::new(rand::thread_rng());
    let users = (0..count)
        .map(|_| generator.generate())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let churned = users.iter().filter(|u| u.is_churned == Some(true)).count();
    let high_risk = users.iter().filter(|u| is_high_risk(u)).count();
    let churn_pct = if users.is_empty() {
        0.0
    } else {
        churned as f64 / users.len() as f64 * 100.0
    };
    info!(
        total = users.len(),
        high_risk = high_risk,
        churned = churned,
        "Generated users ({:.1}% churned)",
        churn_pct
    );

    if !config.store.is_configured() {
        warn!("Feature store not configured. Running in dry-run mode.");
        return run_dry_mode(&users);
    }

    let store = SupabaseStore::new(&config.store)?;
    info!(
        table = %config.store.table,
        batch_size = config.store.insert_batch_size,
        "Inserting users"
    );

    let inserted = insert_in_batches(&store, &users, config.store.insert_batch_size).await;

    info!("Completed! Inserted {}/{} users", inserted, users.len());
    if inserted < users.len() {
        warn!(failed = users.len() - inserted, "Some users were not inserted");
    }

    Ok(())
}

fn run_dry_mode(users: &[UserRecord]) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no feature store)");

    for (i, user) in users.iter().enumerate() {
        if i == 0 || (i + 1) % 100 == 0 {
            info!("Sample user {}:\n{}", i + 1, serde_json::to_string_pretty(user)?);
        }
    }

    Ok(())
}
