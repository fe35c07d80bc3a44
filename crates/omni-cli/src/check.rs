//! # Check Subcommand
//!
//! Dry-run compile every format annotation in a set of CRDs, as the
//! webhook does when a CRD is submitted.

use anyhow::Result;
use clap::Args;

use crate::context::EngineArgs;

/// Arguments for `omni check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Execute the check subcommand. Prints one line per schema version.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let (state, crds) = args.engine.load()?;
    let mut failures = 0usize;
    for crd in &crds {
        for (gvk, root) in crd.schemas() {
            match state.validator.validate_program(root) {
                Ok(()) => println!("ok    {gvk}"),
                Err(e) => {
                    failures += 1;
                    println!("FAIL  {gvk}: {e}");
                }
            }
        }
    }
    if failures > 0 {
        tracing::warn!(failures, "schemas with annotations that do not compile");
        return Ok(1);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write, WIDGET_CRD};
    use omni_api::config::PluginConfig;

    fn args(path: std::path::PathBuf) -> CheckArgs {
        CheckArgs {
            engine: EngineArgs {
                crds: vec![path],
                plugins: PluginConfig::default(),
            },
        }
    }

    #[test]
    fn compiling_crd_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "widget.yaml", WIDGET_CRD);
        assert_eq!(run_check(&args(path)).unwrap(), 0);
    }

    #[test]
    fn broken_rule_fails() {
        let dir = tempfile::tempdir().unwrap();
        let broken = WIDGET_CRD.replace("rule:replicas >= 0", "rule:replicas >=");
        let path = write(dir.path(), "widget.yaml", &broken);
        assert_eq!(run_check(&args(path)).unwrap(), 1);
    }

    #[test]
    fn unknown_module_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = WIDGET_CRD.replace("rule:replicas >= 0", "wasm:missing:check");
        let path = write(dir.path(), "widget.yaml", &missing);
        assert_eq!(run_check(&args(path)).unwrap(), 1);
    }
}
