use crate::api::config::ClientConfig;
use std::path::PathBuf;

/// Settings shared by every subcommand.
#[derive(Clone, Debug)]
pub struct GlobalArgs {
    pub config: ClientConfig,
    pub state_file: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(config: ClientConfig, state_file: impl Into<PathBuf>) -> Self {
        Self {
            config,
            state_file: state_file.into(),
        }
    }
}
