use std::error::Error;
use std::io::BufRead;

use tracing::debug;
use tracing_subscriber::EnvFilter;
use yakapi::Client;

const BASE_URL: &str = "http://localhost:8080";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stream = std::env::args().nth(1).unwrap_or_else(|| "ci".to_string());
    let client = Client::new(BASE_URL)?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        client.publish(stream.as_str(), line.as_str())?;
        debug!(event = "line_published", stream = %stream, content = %line);
    }

    Ok(())
}
