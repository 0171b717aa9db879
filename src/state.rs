//! Application state management
//! This module defines the state shared by the console commands.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::LinkConfig;
use crate::core::bluetooth::LinkHandle;
use crate::core::controller::BoilerControllerService;
use crate::presenter::ConsolePresenter;

/// Application state
pub struct AppState {
    /// Typed view of the controller service
    pub model: BoilerControllerService,
    /// Command side of the link queue
    pub link: LinkHandle,
    pub presenter: Arc<ConsolePresenter>,
    pub config: Mutex<LinkConfig>,
    pub config_path: PathBuf,
}

impl AppState {
    pub fn new(
        model: BoilerControllerService,
        link: LinkHandle,
        presenter: Arc<ConsolePresenter>,
        config: LinkConfig,
        config_path: PathBuf,
    ) -> Self {
        Self {
            model,
            link,
            presenter,
            config: Mutex::new(config),
            config_path,
        }
    }
}
