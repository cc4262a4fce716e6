//! Integration tests for tolva firmware.
//!
//! Run after flashing the firmware. Writes to characteristic B need an
//! encrypted link, so the host pairs with the device on first write.

mod ble_client;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::TolvaClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for tolva firmware")]
struct Args {
    /// BLE device name
    #[arg(long, default_value = "tolva")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Tolva Integration Tests".bold());
    println!("Scanning for \"{}\"...", args.name);

    let device = TolvaClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&device).await;
    print_results(&results);

    device.disconnect().await?;

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
