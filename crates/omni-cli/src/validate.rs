//! # Validate Subcommand
//!
//! Check objects on disk against the schemas of the given CRDs. Objects
//! whose kind has no registered schema are reported and skipped, the way
//! the webhook admits them.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use omni_core::GroupVersionKind;

use crate::context::{describe, read_objects, EngineArgs};

/// Arguments for `omni validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Object manifests (YAML or JSON, multi-document).
    #[arg(value_name = "OBJECT", required = true)]
    pub objects: Vec<PathBuf>,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let (state, _) = args.engine.load()?;
    let mut failures = 0usize;
    for path in &args.objects {
        for object in read_objects(path)? {
            let label = describe(&object);
            let Some(schema) = GroupVersionKind::of_object(&object)
                .and_then(|gvk| state.schemas.lookup(&gvk))
            else {
                println!("skip  {label}: no schema registered");
                continue;
            };
            match state.validator.validate(&schema.root, &object) {
                Ok(()) => println!("ok    {label}"),
                Err(e) => {
                    failures += 1;
                    println!("FAIL  {label}: {e}");
                }
            }
        }
    }
    Ok(u8::from(failures > 0))
}
