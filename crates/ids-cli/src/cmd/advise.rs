use crate::cmd::{block_on, services};
use crate::output::print_json;
use anyhow::anyhow;
use ids_core::governor::format::{format_impact, format_pre_check, format_registration};
use ids_core::updater::RegistrationMetadata;
use std::path::Path;

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

pub fn check(root: &Path, intent: &str, entity_type: Option<&str>, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let advisory = block_on(svc.governor.pre_check(intent, entity_type))??;
    if json {
        print_json(&advisory)?;
    } else {
        print!("{}", format_pre_check(&advisory));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// impact
// ---------------------------------------------------------------------------

pub fn impact(root: &Path, entity_id: &str, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let advisory = block_on(svc.governor.impact_analysis(entity_id))??;
    if json {
        print_json(&advisory)?;
    } else {
        print!("{}", format_impact(&advisory));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

pub fn register(
    root: &Path,
    file_path: &str,
    metadata: RegistrationMetadata,
    json: bool,
) -> anyhow::Result<()> {
    let svc = services(root)?;
    let advisory = block_on(svc.governor.post_register(file_path, metadata))??;
    if json {
        print_json(&advisory)?;
    } else {
        print!("{}", format_registration(&advisory));
    }
    if !advisory.value.registered {
        let reason = advisory.value.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("registration of '{file_path}' failed: {reason}"));
    }
    Ok(())
}
