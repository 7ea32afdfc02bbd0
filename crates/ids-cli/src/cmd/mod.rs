pub mod advise;
pub mod config;
pub mod gate;
pub mod health;
pub mod init;
pub mod registry;

use anyhow::Context;
use ids_core::config::IdsConfig;
use ids_core::engine::DecisionEngine;
use ids_core::governor::FrameworkGovernor;
use ids_core::healer::RegistryHealer;
use ids_core::loader::RegistryLoader;
use ids_core::updater::FileRegistryUpdater;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs, wired from `.ids/config.yaml`.
pub struct Services {
    pub config: IdsConfig,
    pub healer: Arc<RegistryHealer>,
    pub governor: FrameworkGovernor,
}

pub fn services(root: &Path) -> anyhow::Result<Services> {
    let config = IdsConfig::load(root).context("failed to load .ids/config.yaml")?;
    let loader = Arc::new(RegistryLoader::from_config(root, &config));
    let engine = Arc::new(DecisionEngine::new(Arc::clone(&loader), config.engine.clone()));
    let healer = Arc::new(RegistryHealer::from_config(Arc::clone(&loader), root, &config));
    let updater = Arc::new(FileRegistryUpdater::new(Arc::clone(&loader)));
    let governor = FrameworkGovernor::builder()
        .loader(loader)
        .engine(engine)
        .registry_updater(updater)
        .healer(Arc::clone(&healer))
        .config(&config)
        .build()?;
    Ok(Services {
        config,
        healer,
        governor,
    })
}

/// Drive one governor call to completion on a fresh runtime. Blocking work
/// a timed-out call left behind is abandoned, not waited for.
pub fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let out = rt.block_on(fut);
    rt.shutdown_background();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn block_on_does_not_wait_for_abandoned_work() {
        let start = Instant::now();
        let out = block_on(async {
            drop(tokio::task::spawn_blocking(|| {
                std::thread::sleep(Duration::from_secs(3))
            }));
            7
        })
        .unwrap();
        assert_eq!(out, 7);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
