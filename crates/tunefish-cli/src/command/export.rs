use std::{collections::BTreeMap, path::PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tunefish_params::{ParameterKind, StateStore};

use crate::util::{self, Output};

/// Final export consumed by the parameter injector.
///
/// `parameters` is the name → tuned-value map; the envelope records when and
/// after how many iterations the values were produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunedExport {
    pub tuned_at: DateTime<Utc>,
    pub iteration: u64,
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ExportArg {
    /// Parameter manifest path
    #[arg(long)]
    manifest: PathBuf,
    /// Tuning state file to export from
    #[arg(long, default_value = "tuning_state.json")]
    state: PathBuf,
    /// Output file path; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ExportArg) -> anyhow::Result<()> {
    let manifest = util::read_manifest_file(&arg.manifest)?;

    let store = StateStore::new(&arg.state);
    let state = store.load()?.with_context(|| {
        format!(
            "no tuning state at {}; run `tunefish tune` first",
            arg.state.display()
        )
    })?;

    let parameters = manifest.parameter_set_with_values(&state.parameters)?;
    let export = TunedExport {
        tuned_at: Utc::now(),
        iteration: state.iteration,
        parameters: parameters
            .iter()
            .map(|(name, p)| {
                // integer options are exported as whole numbers; the injector
                // pastes values verbatim into the engine source
                let value = match p.kind {
                    ParameterKind::Int => p.value.round(),
                    ParameterKind::Float => p.value,
                };
                (name.to_owned(), value)
            })
            .collect(),
    };
    Output::save_json(&export, arg.output.clone())?;

    eprintln!(
        "Exported {} parameter(s) at iteration {}",
        export.parameters.len(),
        export.iteration
    );
    if let Some(path) = &arg.output {
        eprintln!("  Path: {}", path.display());
    }
    Ok(())
}
