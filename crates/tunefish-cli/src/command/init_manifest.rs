use std::{collections::BTreeMap, path::PathBuf};

use tunefish_params::{ParameterKind, ParameterManifest, ParameterSpec};

use crate::util::Output;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InitManifestArg {
    /// Output file path; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Starter manifest covering a typical search-parameter tuning session.
/// Names and bounds are examples; edit them to match the engine's option
/// table before tuning.
fn starter_manifest() -> ParameterManifest {
    let int = |default: f64, min: f64, max: f64, step: f64| ParameterSpec {
        default,
        min,
        max,
        step,
        kind: ParameterKind::Int,
    };
    ParameterManifest {
        parameters: BTreeMap::from([
            ("WhiteOptimism".to_owned(), int(20.0, 0.0, 40.0, 2.0)),
            ("BlackLossPessimism".to_owned(), int(-15.0, -40.0, 0.0, 2.0)),
            ("VolatilityThreshold".to_owned(), int(14.0, 5.0, 30.0, 1.0)),
            ("CodeRedLMR".to_owned(), int(65.0, 40.0, 95.0, 2.0)),
            ("BlackLMR".to_owned(), int(88.0, 70.0, 100.0, 2.0)),
        ]),
    }
}

pub(crate) fn run(arg: &InitManifestArg) -> anyhow::Result<()> {
    let manifest = starter_manifest();
    Output::save_json(&manifest, arg.output.clone())?;

    eprintln!(
        "Wrote starter manifest with {} parameter(s)",
        manifest.parameters.len()
    );
    if let Some(path) = &arg.output {
        eprintln!("  Path: {}", path.display());
    }
    Ok(())
}
