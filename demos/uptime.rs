use std::error::Error;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing_subscriber::EnvFilter;
use yakapi::Client;

const BASE_URL: &str = "http://localhost:8080";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::new(BASE_URL)?;
    let started = Instant::now();

    loop {
        let uptime = started.elapsed().as_secs_f64();
        let event = client.publish("telemetry", json!({"uptime": uptime.to_string()}))?;
        println!("sent telemetry id={}", event.id().unwrap_or_default());
        std::thread::sleep(Duration::from_secs(1));
    }
}
