#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod channex;
mod cli;
mod config;
mod db;
mod mapping;
mod parsers;
mod sync;
mod utils;
mod web;

use cli::{Cli, Commands};
use config::Config;
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::ValidateConfig) = cli.command {
        return match Config::load_from_file(&cli.config) {
            Ok(_) => {
                println!("configuration is valid");
                Ok(())
            }
            Err(err) => {
                eprintln!("configuration is invalid: {err}");
                std::process::exit(1);
            }
        };
    }

    let config = Arc::new(Config::load_from_file(&cli.config)?);
    utils::logging::init_tracing(&config.logging);
    info!("pms-channex-sync starting up");

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    let mappings = Arc::new(mapping::RoomMappingTable::from_config(&config.rooms));
    let client = Arc::new(channex::ChannexClient::new(&config.channex)?);

    let engine = Arc::new(sync::SyncEngine::new(
        db_manager.booking_store(),
        db_manager.webhook_log_store(),
        client.clone(),
        mappings.clone(),
        config.channex.property_id.clone(),
    ));

    match &cli.command {
        Some(Commands::Pull) => {
            let report = engine.reconcile_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        Some(Commands::FetchBooking { id }) => {
            use channex::ChannelManager;
            let resource = client.get_booking(id).await?;
            let raw = serde_json::to_value(&resource)?;
            let outcome = engine.ingest(&resource, raw).await?;
            println!("booking {id}: {outcome:?}");
            return Ok(());
        }
        Some(Commands::PushAvailability) => {
            let report = engine.push_availability().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        Some(Commands::Status) => {
            let bookings = db_manager.booking_store().count_bookings().await?;
            let log_store = db_manager.webhook_log_store();
            let events = log_store.count_events().await?;
            let unprocessed = log_store.count_unprocessed().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "bookings": bookings,
                    "webhook_events": events,
                    "webhook_events_unprocessed": unprocessed,
                }))?
            );
            return Ok(());
        }
        Some(Commands::ValidateConfig) | None => {}
    }

    let web_server = WebServer::new(config.clone(), db_manager.clone(), engine.clone()).await?;

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::pin!(web_handle);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, beginning shutdown");
        },
        _ = &mut web_handle => {
            info!("web server task exited, beginning shutdown");
        },
    }

    web_handle.abort();

    info!("pms-channex-sync shutting down");
    Ok(())
}
