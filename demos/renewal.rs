/// Example: Proactive Renewal
///
/// Adopts a bootstrap credential, registers the renewal job with a timer
/// scheduler, and shows where the job will run.
///
/// Run:
/// RUST_LOG=kitapi=debug cargo run --example renewal
use kitapi::prelude::*;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Proactive Renewal Example ===\n");

    let storage_dir = std::env::temp_dir().join("kitapi-renewal-example");
    let store = Arc::new(
        FileCredentialStore::with_dir(storage_dir.clone()).expect("Failed to create storage"),
    );
    let scheduler = Arc::new(
        TimerScheduler::persistent(storage_dir.join("jobs.json"))
            .expect("Failed to start scheduler"),
    );

    let config = ClientConfig::new("example-client", "ExamplePlugin", "1.0.0")
        .with_base_url("https://api.example.com");
    let client = Arc::new(
        ApiClient::new(config, store.clone(), scheduler.clone()).expect("Invalid configuration"),
    );
    scheduler.set_handler(ApiClient::renewal_handler(&client));

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    // Stand-in for the one-time authorization code exchange
    let bootstrap = TokenResponse {
        access_token: "example_access_token_12345".to_string(),
        refresh_token: "example_refresh_token_67890".to_string(),
        token_type: "Bearer".to_string(),
        created_at: Some(now),
        expires_in: Some(10_000),
        scope: Some("public".to_string()),
    };

    let credential = client.adopt(bootstrap).expect("Failed to store credential");
    println!("Stored credential");
    println!("  Expires at: {:?}", credential.expires_at);
    println!("  Renewal job: {}", client.renewal().job_id());
    println!("  Renewal runs at: {:?}\n", client.renewal().next_run());

    client.on_credentials_changed(Arc::new(|event: &CredentialEvent| {
        println!("Credential event: {:?}", event);
    }));

    println!("Deprovisioning cancels renewal but keeps the credential:");
    client.deprovision();
    println!("  Renewal armed: {}", client.renewal().is_armed());
    println!("  Authenticated: {}\n", client.is_authenticated());

    client.forget_credentials();
    println!("  Authenticated after forget: {}", client.is_authenticated());

    std::fs::remove_dir_all(storage_dir).ok();
}
