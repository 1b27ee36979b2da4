use std::error::Error;

use tracing_subscriber::EnvFilter;
use yakapi::{Client, Delivery, Payload};

const BASE_URL: &str = "http://localhost:8080";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut streams: Vec<String> = std::env::args().skip(1).collect();
    if streams.is_empty() {
        streams = ["ci", "ci:result", "motor_a", "motor_b", "telemetry"]
            .map(String::from)
            .to_vec();
    }

    let client = Client::new(BASE_URL)?;
    for delivery in client.subscribe(streams) {
        match delivery {
            Delivery::Event(event) => match event.payload() {
                Payload::Structured(value) => println!("{}: {value}", event.stream()),
                Payload::Text(text) => println!("{}: {text}", event.stream()),
            },
            Delivery::StreamTerminated { stream } => eprintln!("{stream}: gave up"),
            Delivery::Timeout { .. } => {}
        }
    }

    Ok(())
}
