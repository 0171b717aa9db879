//! Boiler controller library
//! This is the main library for the boiler controller console application.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod presenter;
pub mod state;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{error, info};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::commands::Flow;
use crate::config::LinkConfig;
use crate::core::bluetooth::{
    link, BluestCentral, Link, PeripheralDiscoveryController, ServiceConnectionManager,
};
use crate::core::controller::BoilerControllerService;
use crate::core::gatt::UiDispatcher;
use crate::presenter::ConsolePresenter;
use crate::state::AppState;

/// Loads the configuration, wires the model to the link and runs the console
/// until `quit`, end of input, Ctrl-C or a fatal link error.
pub async fn run(config_path: PathBuf) -> Result<()> {
    let config = LinkConfig::load_config(&config_path).await?;
    logging::init(&config.log_level);
    info!(
        "Looking for service {} advertised as {}",
        config.service_uuid,
        config.advertised_uuid()
    );

    let (dispatcher, ui_queue) = UiDispatcher::channel();
    let (link_handle, events, receiver) = link::channel();

    let central = Arc::new(BluestCentral::new(events, config.link_poll_interval()).await?);
    let model = BoilerControllerService::new(config.service_uuid, dispatcher.clone())?;
    let services = ServiceConnectionManager::new(
        vec![model.service().clone()],
        central.clone(),
        Arc::new(link_handle.clone()),
    )?;
    let controller = PeripheralDiscoveryController::new(
        config.advertised_uuid(),
        central.clone(),
        services,
        dispatcher,
    );

    let presenter = ConsolePresenter::new(model.clone(), link_handle.clone(), &config);
    presenter.attach(&controller.observers());

    let shutdown = CancellationToken::new();
    let ui_task = tokio::spawn(ui_queue.run());
    let mut link_task = tokio::spawn(Link::new(controller, receiver).run(shutdown.clone()));

    let app_state = AppState::new(model, link_handle, presenter.clone(), config, config_path);
    presenter.print("type `help` for a list of commands");

    let mut lines = BufReader::new(stdin()).lines();
    let mut link_finished = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input.");
                    break;
                };
                let command = match commands::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        presenter.print(&format!("error: {}", e));
                        continue;
                    }
                };
                match commands::execute(command, &app_state).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => presenter.print(&format!("error: {}", e)),
                }
            }
            result = &mut link_task => {
                link_finished = true;
                match result {
                    Ok(Ok(())) => info!("Link stopped."),
                    Ok(Err(e)) => {
                        ui_task.abort();
                        return Err(anyhow!("link stopped: {}", e));
                    }
                    Err(e) => error!("Link task failed: {}", e),
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted.");
                break;
            }
        }
    }

    shutdown.cancel();
    if !link_finished {
        match link_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Link stopped with an error: {}", e),
            Err(e) => error!("Link task failed: {}", e),
        }
    }
    central.shutdown();
    ui_task.abort();
    info!("Shut down.");
    Ok(())
}
