//! Mascot Generic Format (MGF) peak-list reader

use std::path::Path;

use crate::domain::error::{DomainError, Result};
use crate::domain::spectrum::{Peak, Spectrum};

#[derive(Default)]
struct Block {
    start_line: usize,
    title: Option<String>,
    precursor_mz: Option<f64>,
    charge: Option<i32>,
    peaks: Vec<Peak>,
}

impl Block {
    fn finish(self, index: usize) -> Result<Spectrum> {
        let precursor_mz = self.precursor_mz.ok_or_else(|| DomainError::MalformedInput {
            line: self.start_line,
            message: "spectrum without PEPMASS".to_string(),
        })?;
        Ok(Spectrum {
            title: self
                .title
                .unwrap_or_else(|| format!("spectrum_{}", index + 1)),
            precursor_mz,
            precursor_charge: self.charge,
            peaks: self.peaks,
        })
    }
}

/// Parse every `BEGIN IONS` / `END IONS` block in `content`
pub fn parse_mgf(content: &str) -> Result<Vec<Spectrum>> {
    let mut spectra = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.eq_ignore_ascii_case("BEGIN IONS") {
            if current.is_some() {
                return Err(malformed(line_no, "nested BEGIN IONS"));
            }
            current = Some(Block {
                start_line: line_no,
                ..Block::default()
            });
            continue;
        }

        if line.eq_ignore_ascii_case("END IONS") {
            let block = current
                .take()
                .ok_or_else(|| malformed(line_no, "END IONS without BEGIN IONS"))?;
            spectra.push(block.finish(spectra.len())?);
            continue;
        }

        // Header lines outside of blocks (global parameters) are ignored
        let Some(block) = current.as_mut() else {
            continue;
        };

        if let Some((key, value)) = line.split_once('=') {
            match key.trim().to_ascii_uppercase().as_str() {
                "TITLE" => block.title = Some(value.trim().to_string()),
                "PEPMASS" => {
                    let mz = value
                        .split_whitespace()
                        .next()
                        .and_then(|v| v.parse::<f64>().ok())
                        .ok_or_else(|| malformed(line_no, "invalid PEPMASS"))?;
                    block.precursor_mz = Some(mz);
                }
                "CHARGE" => block.charge = parse_charge(value),
                _ => {}
            }
            continue;
        }

        let mut fields = line.split_whitespace();
        let mz = fields.next().and_then(|v| v.parse::<f64>().ok());
        let intensity = fields.next().and_then(|v| v.parse::<f64>().ok());
        match (mz, intensity) {
            (Some(mz), Some(intensity)) => block.peaks.push(Peak::new(mz, intensity)),
            _ => return Err(malformed(line_no, "expected '<m/z> <intensity>'")),
        }
    }

    if let Some(block) = current {
        return Err(malformed(block.start_line, "unterminated BEGIN IONS"));
    }
    Ok(spectra)
}

/// Read and parse an MGF file
pub fn read_mgf(path: &Path) -> crate::error::Result<Vec<Spectrum>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_mgf(&content)?)
}

/// `2+` -> 2, `3-` -> -3, `2+ and 3+` -> 2
fn parse_charge(value: &str) -> Option<i32> {
    let token = value.split_whitespace().next()?;
    let (digits, negative) = match token.strip_suffix('-') {
        Some(d) => (d, true),
        None => (token.trim_end_matches('+'), false),
    };
    let charge: i32 = digits.parse().ok()?;
    Some(if negative { -charge } else { charge })
}

fn malformed(line: usize, message: &str) -> DomainError {
    DomainError::MalformedInput {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MGF: &str = "\
COM=test file
BEGIN IONS
TITLE=Q1
PEPMASS=500.10 12345.6
CHARGE=2+
101.5 10
202.25 200.5
END IONS

BEGIN IONS
PEPMASS=500.12
RTINSECONDS=33.1
150.0\t7
END IONS
";

    #[test]
    fn test_parse_blocks() {
        let spectra = parse_mgf(MGF).unwrap();
        assert_eq!(spectra.len(), 2);

        assert_eq!(spectra[0].title, "Q1");
        assert_eq!(spectra[0].precursor_mz, 500.10);
        assert_eq!(spectra[0].precursor_charge, Some(2));
        assert_eq!(spectra[0].peaks, vec![Peak::new(101.5, 10.0), Peak::new(202.25, 200.5)]);

        assert_eq!(spectra[1].title, "spectrum_2");
        assert_eq!(spectra[1].precursor_charge, None);
        assert_eq!(spectra[1].peaks.len(), 1);
    }

    #[test]
    fn test_missing_pepmass_reports_block_line() {
        let err = parse_mgf("BEGIN IONS\nTITLE=x\n100 1\nEND IONS\n").unwrap_err();
        assert_eq!(
            err,
            DomainError::MalformedInput {
                line: 1,
                message: "spectrum without PEPMASS".to_string()
            }
        );
    }

    #[test]
    fn test_bad_peak_line() {
        let err = parse_mgf("BEGIN IONS\nPEPMASS=100\nabc def\nEND IONS\n").unwrap_err();
        assert!(matches!(err, DomainError::MalformedInput { line: 3, .. }));
    }

    #[test]
    fn test_unterminated_block() {
        assert!(parse_mgf("BEGIN IONS\nPEPMASS=100\n").is_err());
    }

    #[test]
    fn test_negative_charge() {
        assert_eq!(parse_charge("3-"), Some(-3));
        assert_eq!(parse_charge("2+ and 3+"), Some(2));
        assert_eq!(parse_charge("x"), None);
    }
}
