#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: submit a personalized message to two recipients
//!
//! Connection settings come from `PMTA_SERVER`, `PMTA_PORT`,
//! `PMTA_USERNAME` and `PMTA_PASSWORD`, defaulting to 127.0.0.1:25 without
//! authentication.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=pmta_submit=debug cargo run --package pmta-submit --example submit_merge
//! ```

use pmta_submit::{Connection, ConnectionConfig, Message, Notify, Outcome, Recipient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ConnectionConfig::from_env()?;
    println!("Connecting to {}:{}...", config.host(), config.port());
    let connection = Connection::connect(config).await?;

    if let Some(info) = connection.server_info().await {
        println!("✓ Connected to {}", info.hostname);
    }

    let ann = Recipient::shared("ann@example.org")?;
    ann.define_variable("name", "Ann")?;
    ann.set_notify(Notify::FAILURE | Notify::DELAY)?;

    let bob = Recipient::shared("bob@example.org")?;
    bob.define_variable("name", "Bob")?;

    let mut message = Message::new("bounces@example.com")?;
    message.add_date_header()?;
    message.set_vmta("pool-default")?;
    message.set_job_id("welcome-2024")?;
    message.begin_part(1)?;
    message.add_data("From: news@example.com\r\nSubject: Welcome\r\n\r\n")?;
    message.add_merge_data("Hello {{name}},\r\n\r\nThanks for signing up.\r\n")?;
    message.add_recipient(ann)?;
    message.add_recipient(bob)?;

    match connection.submit_message(&mut message).await {
        Ok(report) => {
            for status in report.statuses() {
                match &status.outcome {
                    Outcome::Accepted => println!("✓ {}", status.address),
                    Outcome::Rejected { code, message } => {
                        println!("✗ {}: {} {}", status.address, code, message);
                    }
                }
            }
        }
        Err(e) => println!("✗ Submission failed: {}", e),
    }

    connection.close().await;
    Ok(())
}
