//! Peptide-spectrum match tables exchanged with the search engines

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::error::DomainError;
use crate::error::Result;

/// One row of an engine output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsmRecord {
    pub spectrum_title: String,
    pub peptide: String,
    pub accession: Option<String>,
    /// Lower is better
    pub evalue: f64,
}

/// PSM with its target/decoy q-value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPsm {
    pub spectrum_title: String,
    pub peptide: String,
    pub accession: Option<String>,
    pub evalue: f64,
    pub q_value: f64,
}

const TITLE_COLUMNS: [&str; 3] = ["filename/id", "title", "spectrum"];
const PEPTIDE_COLUMNS: [&str; 2] = ["peptide", "sequence"];
const EVALUE_COLUMNS: [&str; 2] = ["e-value", "evalue"];
const ACCESSION_COLUMNS: [&str; 2] = ["accession", "protein"];

fn column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Tab for `.tsv`/`.txt`, otherwise whichever of tab/comma shows up in the header
fn sniff_delimiter(path: &Path, content: &str) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => {
            let header = content.lines().next().unwrap_or_default();
            if header.contains('\t') {
                b'\t'
            } else {
                b','
            }
        }
    }
}

/// Parse a PSM table from already loaded content
pub fn parse_psm_table(content: &str, delimiter: u8) -> Result<Vec<PsmRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let missing = |what: &str| DomainError::MalformedInput {
        line: 1,
        message: format!("PSM table has no {} column", what),
    };
    let title_idx = column(&headers, &TITLE_COLUMNS).ok_or_else(|| missing("spectrum"))?;
    let peptide_idx = column(&headers, &PEPTIDE_COLUMNS).ok_or_else(|| missing("peptide"))?;
    let evalue_idx = column(&headers, &EVALUE_COLUMNS).ok_or_else(|| missing("e-value"))?;
    let accession_idx = column(&headers, &ACCESSION_COLUMNS);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = row + 2;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let evalue = field(evalue_idx)
            .parse::<f64>()
            .map_err(|_| DomainError::MalformedInput {
                line,
                message: format!("invalid e-value '{}'", field(evalue_idx)),
            })?;

        records.push(PsmRecord {
            spectrum_title: field(title_idx).to_string(),
            peptide: field(peptide_idx).to_string(),
            accession: accession_idx
                .map(field)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            evalue,
        });
    }
    Ok(records)
}

/// Read an engine output table from disk
pub fn read_psm_table(path: &Path) -> Result<Vec<PsmRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_psm_table(&content, sniff_delimiter(path, &content))
}

/// Write q-value annotated PSMs as a TSV
pub fn write_scored_table(path: &Path, psms: &[ScoredPsm]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    writer.write_record(["title", "peptide", "accession", "evalue", "q_value"])?;
    for psm in psms {
        let evalue = psm.evalue.to_string();
        let q_value = psm.q_value.to_string();
        writer.write_record([
            psm.spectrum_title.as_str(),
            psm.peptide.as_str(),
            psm.accession.as_deref().unwrap_or(""),
            evalue.as_str(),
            q_value.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
