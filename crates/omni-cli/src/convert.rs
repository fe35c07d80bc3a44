//! # Convert Subcommand
//!
//! Convert objects on disk to another version of their CRD and print the
//! results as a JSON array. Same semantics as the webhook's `/convert`:
//! all objects convert or none are printed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use omni_api::review::ConversionRequest;
use omni_api::routes::convert::convert_objects;
use omni_core::Deadline;

use crate::context::{read_objects, EngineArgs};

/// Arguments for `omni convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Target `apiVersion`, e.g. `example.com/v2`.
    #[arg(long = "to", value_name = "API_VERSION")]
    pub to: String,

    /// Object manifests (YAML or JSON, multi-document).
    #[arg(value_name = "OBJECT", required = true)]
    pub objects: Vec<PathBuf>,
}

/// Execute the convert subcommand.
pub fn run_convert(args: &ConvertArgs) -> Result<u8> {
    let (state, _) = args.engine.load()?;
    let mut objects = Vec::new();
    for path in &args.objects {
        objects.extend(read_objects(path)?);
    }
    let request = ConversionRequest {
        uid: String::new(),
        desired_api_version: args.to.clone(),
        objects,
    };

    match convert_objects(&state, &request, Deadline::none()) {
        Ok(converted) => {
            let out = serde_json::to_string_pretty(&converted)
                .context("failed to encode converted objects")?;
            println!("{out}");
            Ok(0)
        }
        Err(failure) => {
            eprintln!("conversion failed: {failure}");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write, WIDGET_CRD};
    use omni_api::config::PluginConfig;

    fn run(to: &str, objects: &str) -> u8 {
        let dir = tempfile::tempdir().unwrap();
        let crd = write(dir.path(), "widget.yaml", WIDGET_CRD);
        let objects = write(dir.path(), "objects.yaml", objects);
        let args = ConvertArgs {
            engine: EngineArgs {
                crds: vec![crd],
                plugins: PluginConfig::default(),
            },
            to: to.to_string(),
            objects: vec![objects],
        };
        run_convert(&args).unwrap()
    }

    const WIDGET: &str = "\
apiVersion: example.com/v1
kind: Widget
metadata: { name: a }
spec: { replicas: 3, region: eu }
";

    #[test]
    fn registered_target_converts() {
        assert_eq!(run("example.com/v2", WIDGET), 0);
    }

    #[test]
    fn unregistered_target_fails() {
        assert_eq!(run("example.com/v9", WIDGET), 1);
    }
}
