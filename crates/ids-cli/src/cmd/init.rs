use anyhow::Context;
use ids_core::config::IdsConfig;
use ids_core::loader::RegistryLoader;
use ids_core::registry::Registry;
use ids_core::{io, paths};
use std::path::Path;

/// Create `.ids/` with a default config and an empty registry. Existing
/// files are left alone.
pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing IDS in: {}", root.display());

    let dir = paths::ids_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        IdsConfig::load(root).context("failed to load config.yaml")?
    } else {
        let cfg = IdsConfig::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let loader = RegistryLoader::from_config(root, &config);
    let registry_rel = config.paths.registry.as_str();
    if loader.path().exists() {
        println!("  exists:  {registry_rel}");
    } else {
        loader
            .write(&mut Registry::default())
            .context("failed to write the entity registry")?;
        println!("  created: {registry_rel}");
    }

    io::ensure_dir(&config.backup_dir(root)).context("failed to create the backup directory")?;
    Ok(())
}
