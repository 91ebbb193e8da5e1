use std::{fs::File, io::Write, path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use loyalty_common::{
    config::VERSION, event::LoyaltyEvent, ids::AccountId, time::get_current_time_in_millis,
};
use loyalty_daemon::{
    config::{Command, Config},
    core::{
        notify::LogNotifier,
        service::LoyaltyService,
        settlement::{BookingSource, JsonBookingSource, MemoryBookingSource},
        storage::RocksStorage,
    },
    logger::setup_logger,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config: Config = Config::parse();
    let command = config.command.take();
    if let Some(path) = config.config_file.as_ref() {
        if config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {}", path);
                return Ok(());
            }

            let mut file = File::create(path).context("Error while creating config file")?;
            let json = serde_json::to_string_pretty(&config)
                .context("Error while serializing config file")?;
            file.write_all(json.as_bytes())
                .context("Error while writing config file")?;
            println!("Config file template generated at {}", path);
            return Ok(());
        }

        let file = File::open(path).context("Error while opening config file")?;
        config = serde_json::from_reader(file).context("Error while reading config file")?;
    } else if config.generate_config_template {
        eprintln!("Provided config file path is required to generate the template with --config-file");
        return Ok(());
    }

    let Some(command) = command else {
        eprintln!("No command provided, see --help");
        return Ok(());
    };

    setup_logger(&config.log)?;
    info!("Loyalty daemon v{}", VERSION);

    if let Err(e) = run(config, command).await {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run(config: Config, command: Command) -> Result<()> {
    let bookings: Arc<dyn BookingSource> = match &command {
        Command::Settle { bookings, .. } => {
            let source = JsonBookingSource::load(bookings)
                .await
                .with_context(|| format!("Error while loading bookings from {}", bookings))?;
            info!("Loaded {} bookings from {}", source.len(), bookings);
            Arc::new(source)
        }
        _ => Arc::new(MemoryBookingSource::new()),
    };

    let storage = RocksStorage::new(&config.dir_path, &config.rocksdb)?;
    let service = LoyaltyService::new(storage, config.policy, bookings, Arc::new(LogNotifier))?;

    match command {
        Command::Ingest { events, now } => {
            let file = File::open(&events)
                .with_context(|| format!("Error while opening events file {}", events))?;
            let events: Vec<LoyaltyEvent> =
                serde_json::from_reader(file).context("Error while reading events file")?;
            let now = now.unwrap_or_else(get_current_time_in_millis);
            for event in events {
                let kind = event.kind();
                match service.handle_event(event, now).await {
                    Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
                    Err(e) if e.is_transient() => {
                        error!("Transient failure on {} event, retry later: {}", kind, e)
                    }
                    Err(e) => error!("Rejected {} event: {}", kind, e),
                }
            }
        }
        Command::Settle { now, .. } => {
            let now = now.unwrap_or_else(get_current_time_in_millis);
            let report = service.run_settlement(now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Balance { account } => {
            let account = AccountId::new(account);
            let balance = service.get_balance(account).await?;
            let summary = json!({
                "account": account,
                "confirmed": balance.confirmed,
                "pending": balance.pending,
                "redeemable": balance.redeemable(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::ReferralsReport => {
            let flagged = service.flagged_referrers().await?;
            info!("{} referrers flagged for review", flagged.len());
            println!("{}", serde_json::to_string_pretty(&flagged)?);
        }
    }

    service.stop().await?;
    Ok(())
}
