use greenlight_core::OrchestratorConfig;
use greenlight_routing::{generate, render};

use crate::certstore::active_bundle_path;

use super::open_store;

pub fn run(config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let states = store.list_teams()?;
    let plan = generate(&states, &active_bundle_path(&config.cert_dir));
    print!("{}", render(&plan));
    Ok(())
}
