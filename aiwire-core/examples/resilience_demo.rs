//! Demo of the retry policy, error classification, and manager wiring
//!
//! The first two sections run entirely offline. The last section makes a
//! real provider call when `OPENAI_API_KEY` is set and is skipped otherwise.
//!
//! Run with: cargo run --example resilience_demo

use aiwire_core::{
    classify, CallOptions, Driver, Manager, ManagerConfig, ProviderKind, RetryPolicy,
    ServiceConfig,
};

#[tokio::main]
async fn main() {
    println!("\naiwire resilience demo");
    println!("======================\n");

    println!("Backoff schedule (base 1000ms, factor 2, cap 10s, jitter [0,1000)):");
    let policy = RetryPolicy::default();
    for attempt in 0..6 {
        let (floor, ceiling) = policy.delay_bounds(attempt);
        println!("  after attempt {attempt}: {floor}ms ..< {ceiling}ms");
    }
    println!();

    println!("Error classification:");
    for (message, status) in [
        ("Incorrect API key provided", Some(401)),
        ("Rate limit reached for gpt-4o-mini", Some(429)),
        ("upstream connect timeout", None),
        ("The model is overloaded (UNAVAILABLE)", Some(503)),
        ("something else entirely", None),
    ] {
        let error = classify("openai", message, status);
        println!(
            "  {:<40} -> {} (transient: {})",
            message,
            error.code(),
            error.is_transient()
        );
    }
    println!();

    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        println!("OPENAI_API_KEY not set; skipping the live call.");
        return;
    };

    let config = ManagerConfig::new("openai")
        .with_timeout_ms(30_000)
        .with_max_retries(2)
        .with_service(ServiceConfig::new("openai", ProviderKind::OpenAi, api_key));

    let manager = match Manager::new(config) {
        Ok(manager) => manager,
        Err(error) => {
            eprintln!("failed to build manager: {error}");
            return;
        }
    };

    println!("Probing providers: {:?}", manager.test_providers().await);

    let driver = manager.use_driver(None).expect("default driver");
    match driver
        .generate("Say hello in one short sentence.", &CallOptions::default())
        .await
    {
        Ok(response) => {
            println!("generate -> {}", response.text);
            println!(
                "  usage: {} tokens, finish reason: {:?}",
                response.usage.tokens, response.finish_reason
            );
        }
        Err(error) => eprintln!("generate failed: {error} (code {})", error.code()),
    }

    match driver
        .stream("Count from one to five.", &CallOptions::default())
        .await
    {
        Ok(mut response) => {
            print!("stream   -> ");
            while let Some(fragment) = response.stream.next().await {
                match fragment {
                    Ok(text) => print!("{text}"),
                    Err(error) => {
                        eprintln!("\nstream broke: {error}");
                        break;
                    }
                }
            }
            println!();
        }
        Err(error) => eprintln!("stream failed: {error}"),
    }
}
