// External identification engines and the commands used to invoke them

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::settings::{SearchSettings, SearchType};

/// Supported database search engines
///
/// Adding an engine means a new variant here plus its argument builder; the
/// job manager never looks at engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    XTandem,
    Omssa,
}

impl SearchEngine {
    /// Fan-out order used by `SearchTask`
    pub const ALL: [SearchEngine; 2] = [SearchEngine::XTandem, SearchEngine::Omssa];

    pub fn name(&self) -> &'static str {
        match self {
            SearchEngine::XTandem => "X!TANDEM",
            SearchEngine::Omssa => "OMSSA",
        }
    }

    /// Short lowercase tag used in file names and table rows
    pub fn tag(&self) -> &'static str {
        match self {
            SearchEngine::XTandem => "xtandem",
            SearchEngine::Omssa => "omssa",
        }
    }

    pub fn default_executable(&self) -> &'static str {
        match self {
            SearchEngine::XTandem => "tandem",
            SearchEngine::Omssa => "omssacl",
        }
    }

    /// `<output_dir>/<stem>_<engine>_<target|decoy>.tsv`
    pub fn output_path(
        &self,
        output_dir: &Path,
        spectrum_file: &Path,
        search_type: SearchType,
    ) -> PathBuf {
        let stem = spectrum_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "spectra".to_string());
        let suffix = match search_type {
            SearchType::Target => "target",
            SearchType::Decoy => "decoy",
        };
        output_dir.join(format!("{}_{}_{}.tsv", stem, self.tag(), suffix))
    }

    /// `<output_dir>/<stem>_<engine>_qvalues.tsv`
    pub fn score_output_path(&self, output_dir: &Path, spectrum_file: &Path) -> PathBuf {
        let stem = spectrum_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "spectra".to_string());
        output_dir.join(format!("{}_{}_qvalues.tsv", stem, self.tag()))
    }

    /// Engine command line derived from the settings snapshot
    pub fn build_args(
        &self,
        spectrum_file: &Path,
        output_file: &Path,
        settings: &SearchSettings,
    ) -> Vec<String> {
        let database = settings.database_path();
        let precursor = settings.precursor_tolerance;
        match self {
            SearchEngine::Omssa => {
                let mut args = vec![
                    "-fm".to_string(),
                    spectrum_file.display().to_string(),
                    "-d".to_string(),
                    database.display().to_string(),
                    "-oc".to_string(),
                    output_file.display().to_string(),
                    "-te".to_string(),
                    precursor.value().to_string(),
                ];
                if precursor.is_ppm() {
                    args.push("-teppm".to_string());
                }
                args.extend([
                    "-to".to_string(),
                    settings.fragment_tolerance.to_string(),
                    "-v".to_string(),
                    settings.missed_cleavages.to_string(),
                ]);
                args
            }
            SearchEngine::XTandem => vec![
                "-spectra".to_string(),
                spectrum_file.display().to_string(),
                "-database".to_string(),
                database.display().to_string(),
                "-output".to_string(),
                output_file.display().to_string(),
                "-precursor-tolerance".to_string(),
                precursor.value().to_string(),
                "-precursor-unit".to_string(),
                precursor.unit().to_string(),
                "-fragment-tolerance".to_string(),
                settings.fragment_tolerance.to_string(),
                "-missed-cleavages".to_string(),
                settings.missed_cleavages.to_string(),
            ],
        }
    }
}

impl std::fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Executable and extra arguments configured for one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub executable: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl EngineConfig {
    pub fn for_engine(engine: SearchEngine) -> Self {
        Self {
            executable: engine.default_executable().to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// A fully resolved process invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// File the engine is expected to write
    pub output_file: PathBuf,
}
