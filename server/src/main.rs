//! MUD Game Server
//!
//! A tick-driven text game server: rooms, monsters with simple AI, timed
//! effects and telnet-style line sessions.

mod combat;
mod commands;
mod config;
mod entities;
mod error;
mod network;
mod persistence;
mod tasks;
mod world;

use std::sync::Arc;

use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::combat::RandDice;
use crate::config::GameConfig;
use crate::network::Server;
use crate::world::{run_heartbeat, Catalog, GameWorld, SharedWorld};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting MUD Server...");

    let config = GameConfig::load_or_default(&GameConfig::path_from_env());
    info!("Tick every {}s, listening on {}", config.tick_secs, config.listen_addr);

    let catalog = match Catalog::load_or_default(&config.catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let dice = Box::new(RandDice::seeded(config.seed));
    let config = Arc::new(config);
    let world = match GameWorld::new(Arc::new(catalog), config.clone(), dice) {
        Ok(world) => world,
        Err(e) => {
            error!("Failed to build the world: {}", e);
            std::process::exit(1);
        }
    };
    let world: SharedWorld = Arc::new(Mutex::new(world));

    // Initialize persistence
    let persistence = match persistence::init(&config.save_dir).await {
        Ok(p) => {
            info!("Persistence layer initialized");
            Some(p)
        }
        Err(e) => {
            error!("Failed to initialize persistence: {}", e);
            error!("Server will run without persistence (no saves)");
            None
        }
    };

    let server = match Server::bind(&config.listen_addr, world.clone(), persistence.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return;
        }
    };

    tokio::spawn(run_heartbeat(world.clone(), persistence.clone()));
    tokio::spawn(server.run());
    info!("Server started successfully!");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down...");

    if let Some(persistence) = persistence {
        let snapshots: Vec<_> = world.lock().await.players().map(|p| p.snapshot()).collect();
        let count = snapshots.len();
        let results = join_all(
            snapshots
                .into_iter()
                .map(|snapshot| persistence.save_player_now(snapshot)),
        )
        .await;
        for e in results.into_iter().filter_map(Result::err) {
            warn!("Final save failed: {}", e);
        }
        persistence.shutdown().await;
        info!("Saved {} players", count);
    }
}
