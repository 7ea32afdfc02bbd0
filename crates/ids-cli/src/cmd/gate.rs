use crate::cmd::{block_on, services};
use crate::output::print_json;
use anyhow::anyhow;
use clap::ValueEnum;
use ids_core::gates::{self, gate_by_name, run_gate, GateContext, GateStatus};
use std::path::Path;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GateKind {
    /// Before creating an epic
    Epic,
    /// Before creating a story
    Story,
    /// Before accepting a story for development
    Validate,
    /// Before starting development
    Dev,
}

impl GateKind {
    fn gate_name(self) -> &'static str {
        match self {
            GateKind::Epic => gates::EPIC_CREATION,
            GateKind::Story => gates::STORY_CREATION,
            GateKind::Validate => gates::STORY_VALIDATION,
            GateKind::Dev => gates::DEV_CONTEXT,
        }
    }
}

/// Runs one gate. A failing gate exits non-zero; needs-review does not.
pub fn run(root: &Path, kind: GateKind, ctx: GateContext, json: bool) -> anyhow::Result<()> {
    let svc = services(root)?;
    let gate = gate_by_name(kind.gate_name())
        .ok_or_else(|| anyhow!("no gate named '{}'", kind.gate_name()))?;
    let result = block_on(run_gate(gate.as_ref(), &svc.governor, &ctx, &svc.config.gates))??;

    if json {
        print_json(&result)?;
    } else {
        println!("Gate {}: {} ({} ms)", result.gate, result.status, result.duration_ms);
        for m in &result.messages {
            println!("  {m}");
        }
        if !result.candidates.is_empty() {
            println!("  candidates: {}", result.candidates.join(", "));
        }
        if let Some(reason) = &result.degraded {
            println!("! degraded: {reason}");
        }
    }

    if result.status == GateStatus::Fail {
        return Err(anyhow!("gate '{}' failed", result.gate));
    }
    Ok(())
}
