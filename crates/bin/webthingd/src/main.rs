//! # webthingd — Web Thing daemon
//!
//! Composition root that builds the Things and drives them.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialise logging
//! - Build the Things (from configuration, or the built-in lamp and sensor)
//!   and mount them in a registry
//! - Start background device updates
//! - Run a JSON-lines session on stdin/stdout until EOF or Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod devices;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use webthing_app::action_runner::ActionRunner;
use webthing_app::notification_bus::NotificationBus;
use webthing_app::registry::ThingRegistry;
use webthing_app::updater::spawn_property_updater;
use webthing_domain::{Notifier, ThingHandle};

use crate::config::Config;
use crate::devices::DeviceActions;
use crate::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    let bus = Arc::new(NotificationBus::new(config.notifier.capacity));
    let notifier: Arc<dyn Notifier> = bus.clone();

    let mut updaters = Vec::new();
    let registry = if config.things.is_empty() {
        let lamp = devices::lamp(Arc::clone(&notifier))?;
        let sensor = devices::humidity_sensor(notifier)?;
        updaters.push(spawn_property_updater(
            &sensor,
            "level",
            Duration::from_secs(3),
            devices::humidity_readings(),
        ));
        ThingRegistry::Multiple {
            things: vec![lamp, sensor],
            name: "LightAndTempDevice".to_string(),
        }
    } else {
        let mut things = config
            .things
            .iter()
            .map(|thing| devices::from_config(thing, Arc::clone(&notifier)))
            .collect::<Result<Vec<ThingHandle>, _>>()
            .context("invalid thing definition")?;
        if things.len() == 1 {
            ThingRegistry::Single(things.remove(0))
        } else {
            ThingRegistry::Multiple {
                things,
                name: config.registry.name.clone(),
            }
        }
    };
    registry.mount(&config.registry.base_path);

    for thing in registry.things() {
        tracing::info!(
            thing_id = %thing.id(),
            href = %thing.read().href(),
            "serving thing"
        );
    }
    tracing::info!(name = %registry.name(), "webthingd ready, reading requests from stdin");

    let mut session = Session::new(registry, ActionRunner::new(DeviceActions));
    let mut notifications = bus.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(err) = session.handle_line(&line) {
                    tracing::warn!(%err, "request refused");
                    write_message(&mut stdout, &err.to_message()).await?;
                }
            }
            notification = notifications.recv() => match notification {
                Ok(notification) => {
                    if let Some(message) = session.render(&notification) {
                        write_message(&mut stdout, &message).await?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session lagged, some notifications were dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl-C");
                break;
            }
        }
    }

    for updater in updaters {
        updater.abort();
    }
    tracing::info!("webthingd stopped");
    Ok(())
}

async fn write_message(
    stdout: &mut tokio::io::Stdout,
    message: &serde_json::Value,
) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}
