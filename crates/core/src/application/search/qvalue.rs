//! Target/decoy q-value estimation over separate searches

use std::collections::HashMap;

use crate::application::constants::MAX_Q_VALUE;
use crate::domain::{PsmRecord, ScoredPsm};

/// Lowest e-value PSM per spectrum, in first-seen spectrum order.
/// Ties keep the earlier row.
pub fn best_per_spectrum(records: &[PsmRecord]) -> Vec<PsmRecord> {
    let mut best: Vec<PsmRecord> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        match index.get(record.spectrum_title.as_str()) {
            Some(&i) => {
                if record.evalue < best[i].evalue {
                    best[i] = record.clone();
                }
            }
            None => {
                index.insert(record.spectrum_title.as_str(), best.len());
                best.push(record.clone());
            }
        }
    }
    best
}

/// q-values for `targets` given the decoy hits of the same engine
///
/// `FDR(e) = #decoys(<= e) / #targets(<= e)`, then the running minimum from
/// the worst e-value upwards so q is monotone in e. Output is sorted by
/// ascending e-value.
pub fn target_decoy_q_values(targets: &[PsmRecord], decoys: &[PsmRecord]) -> Vec<ScoredPsm> {
    let mut sorted_targets: Vec<&PsmRecord> = targets.iter().collect();
    sorted_targets.sort_by(|a, b| a.evalue.total_cmp(&b.evalue));

    let mut decoy_evalues: Vec<f64> = decoys.iter().map(|d| d.evalue).collect();
    decoy_evalues.sort_by(f64::total_cmp);

    let fdrs: Vec<f64> = sorted_targets
        .iter()
        .map(|psm| {
            let n_targets = sorted_targets.partition_point(|t| t.evalue <= psm.evalue);
            let n_decoys = decoy_evalues.partition_point(|&d| d <= psm.evalue);
            (n_decoys as f64 / n_targets as f64).min(MAX_Q_VALUE)
        })
        .collect();

    let mut q_values = vec![MAX_Q_VALUE; fdrs.len()];
    let mut running = MAX_Q_VALUE;
    for i in (0..fdrs.len()).rev() {
        running = running.min(fdrs[i]);
        q_values[i] = running;
    }

    sorted_targets
        .into_iter()
        .zip(q_values)
        .map(|(psm, q_value)| ScoredPsm {
            spectrum_title: psm.spectrum_title.clone(),
            peptide: psm.peptide.clone(),
            accession: psm.accession.clone(),
            evalue: psm.evalue,
            q_value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psm(title: &str, evalue: f64) -> PsmRecord {
        PsmRecord {
            spectrum_title: title.to_string(),
            peptide: "PEPTIDEK".to_string(),
            accession: None,
            evalue,
        }
    }

    #[test]
    fn test_best_per_spectrum_keeps_lowest_evalue() {
        let records = vec![psm("s1", 0.5), psm("s2", 0.1), psm("s1", 0.01), psm("s1", 0.2)];
        let best = best_per_spectrum(&records);
        assert_eq!(best, vec![psm("s1", 0.01), psm("s2", 0.1)]);
    }

    #[test]
    fn test_q_values_without_decoys_are_zero() {
        let scored = target_decoy_q_values(&[psm("a", 0.01), psm("b", 0.02)], &[]);
        assert!(scored.iter().all(|s| s.q_value == 0.0));
    }

    #[test]
    fn test_q_values_are_monotone() {
        let targets = vec![
            psm("t1", 0.001),
            psm("t2", 0.01),
            psm("t3", 0.1),
            psm("t4", 1.0),
        ];
        let decoys = vec![psm("d1", 0.05), psm("d2", 0.5), psm("d3", 2.0)];

        let scored = target_decoy_q_values(&targets, &decoys);

        let q: Vec<f64> = scored.iter().map(|s| s.q_value).collect();
        // FDRs: 0/1, 0/2, 1/3, 2/4
        assert_eq!(q[0], 0.0);
        assert_eq!(q[1], 0.0);
        assert!((q[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!((q[3] - 0.5).abs() < 1e-12);
        assert!(q.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_running_minimum_lowers_earlier_fdr() {
        // FDRs: 1/1, 1/2, 1/3 -> q: 1/3 everywhere
        let targets = vec![psm("t1", 0.1), psm("t2", 0.2), psm("t3", 0.3)];
        let decoys = vec![psm("d1", 0.05)];
        let scored = target_decoy_q_values(&targets, &decoys);
        assert!(scored.iter().all(|s| (s.q_value - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_q_value_capped_at_one() {
        let scored = target_decoy_q_values(&[psm("t1", 0.5)], &[psm("d1", 0.1), psm("d2", 0.2)]);
        assert_eq!(scored[0].q_value, 1.0);
    }
}
