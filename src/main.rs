use anyhow::Result;

use holowatch::config::{HoloplusConfig, NotifyConfig, StorePaths};
use holowatch::holoplus::HoloplusClient;
use holowatch::notify::DiscordNotifier;
use holowatch::{harvest, store};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (stderr, so stdout stays clean for run summaries)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();

    match command.as_str() {
        "channels" => run_channels().await,
        "harvest" => {
            let all_threads = args.any(|arg| arg == "--all");
            run_harvest(all_threads).await
        }
        "notify" => run_notify().await,
        _ => {
            eprintln!("Usage: holowatch <channels | harvest [--all] | notify>");
            eprintln!();
            eprintln!("  channels  fetch the talent channel list into talent-channel.json");
            eprintln!("  harvest   fetch each channel's threads, diff against the last run");
            eprintln!("            (--all walks the full pagination cursor per channel)");
            eprintln!("  notify    send new.json entries to the Discord webhook");
            std::process::exit(2);
        }
    }
}

/// Fetch the channel list and overwrite the channel snapshot.
async fn run_channels() -> Result<()> {
    let config = HoloplusConfig::from_env()?;
    let paths = StorePaths::from_env();
    let client = HoloplusClient::new(&config)?;

    let channels = client.list_channels().await?;
    store::save_json(&paths.channels, &channels).await?;

    println!(
        "Saved {} channels to {}.",
        channels.len(),
        paths.channels.display()
    );
    Ok(())
}

/// Fetch every channel's threads, merge, diff against the previous run,
/// and overwrite both the full harvest and the new-items file.
async fn run_harvest(all_threads: bool) -> Result<()> {
    let config = HoloplusConfig::from_env()?;
    let paths = StorePaths::from_env();
    let client = HoloplusClient::new(&config)?;

    let channels = store::load_channels(&paths.channels).await?;
    // Known ids must come from the previous snapshot, before it is replaced.
    let known_ids = store::load_known_thread_ids(&paths.harvest).await;

    let merged = harvest::collect_all(&client, &channels, all_threads).await?;
    let fresh = harvest::new_entries(&merged, &known_ids);

    store::save_json(&paths.harvest, &merged).await?;
    store::save_json(&paths.new_items, &fresh).await?;

    println!(
        "Saved {} threads to {} ({}).",
        merged.len(),
        paths.harvest.display(),
        if all_threads { "all" } else { "latest per channel" }
    );
    println!(
        "Saved {} new threads to {}.",
        fresh.len(),
        paths.new_items.display()
    );
    Ok(())
}

/// Send one webhook message per new-items entry, in file order.
async fn run_notify() -> Result<()> {
    let config = NotifyConfig::from_env()?;
    let paths = StorePaths::from_env();

    let entries = store::load_entries(&paths.new_items).await?;
    if entries.is_empty() {
        println!(
            "No new threads in {}. Nothing to send.",
            paths.new_items.display()
        );
        return Ok(());
    }

    let notifier = DiscordNotifier::new(config)?;
    let sent = notifier.send_all(&entries).await?;
    println!("Sent {sent} messages to Discord webhook.");
    Ok(())
}
