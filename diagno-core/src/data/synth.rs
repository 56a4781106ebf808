//! Synthetic dataset generation from the knowledge base.

use crate::data::dataset::Dataset;
use crate::error::DiagnoError;
use crate::knowledge::{ExtendedAssociations, KnowledgeBase};
use rand::Rng;
use rand::seq::SliceRandom;

/// Rows generated per disease by default.
pub const DEFAULT_SAMPLES_PER_DISEASE: usize = 50;

/// Lower bound on core symptoms per synthetic row.
pub const MIN_CORE_PER_ROW: usize = 3;

/// Upper bound on core symptoms per synthetic row.
pub const MAX_CORE_PER_ROW: usize = 5;

/// Inclusive range of core symptoms a row of a disease with `core_count`
/// symptoms may carry. Both bounds are clipped to `core_count`.
pub fn core_draw_bounds(core_count: usize) -> (usize, usize) {
    (
        MIN_CORE_PER_ROW.min(core_count),
        MAX_CORE_PER_ROW.min(core_count),
    )
}

/// Expand the knowledge base into `samples_per_disease` rows per disease.
///
/// Each row sets a uniformly sized random subset of the disease's core
/// symptoms. Columns are the sorted union of all core symptom keys.
pub fn synthesize_base<R: Rng + ?Sized>(
    kb: &KnowledgeBase,
    samples_per_disease: usize,
    rng: &mut R,
) -> Result<Dataset, DiagnoError> {
    if kb.is_empty() {
        return Err(DiagnoError::config("knowledge base has no diseases"));
    }
    if samples_per_disease == 0 {
        return Err(DiagnoError::config("samples_per_disease must be at least 1"));
    }
    if let Some(empty) = kb.records().iter().find(|r| r.symptoms.is_empty()) {
        return Err(DiagnoError::config(format!(
            "disease '{}' has no core symptoms",
            empty.name
        )));
    }

    let mut dataset = Dataset::new(kb.symptom_keys().into_iter().collect())?;
    for record in kb.records() {
        let (lo, hi) = core_draw_bounds(record.symptoms.len());
        for _ in 0..samples_per_disease {
            let k = rng.gen_range(lo..=hi);
            let chosen: Vec<&String> = record.symptoms.choose_multiple(rng, k).collect();
            dataset.push_row(&record.name, &chosen)?;
        }
    }

    tracing::info!(
        diseases = kb.len(),
        rows = dataset.len(),
        symptoms = dataset.columns().len(),
        "Synthesized base dataset"
    );
    Ok(dataset)
}

/// Inject extended symptoms into an existing dataset.
///
/// New keys become zero columns appended after the existing ones. For every
/// row whose label has an entry in `table`, each listed symptom is set with an
/// independent Bernoulli draw at the listed probability. Injecting a key that
/// an earlier call already injected fails with `AlreadyAugmented`.
pub fn augment_with_extended<R: Rng + ?Sized>(
    mut dataset: Dataset,
    table: &ExtendedAssociations,
    rng: &mut R,
) -> Result<Dataset, DiagnoError> {
    let keys = table.symptom_keys();
    let repeated: Vec<String> = keys
        .iter()
        .filter(|k| dataset.injected_columns().contains(*k))
        .cloned()
        .collect();
    if !repeated.is_empty() {
        return Err(DiagnoError::AlreadyAugmented(repeated));
    }

    let before = dataset.columns().len();
    for key in &keys {
        dataset.add_column(key);
    }

    // Resolve each disease's weights to column indices once.
    let plan: Vec<(String, Vec<(usize, f64)>)> = table
        .iter()
        .map(|(disease, weights)| {
            let cols = weights
                .iter()
                .filter_map(|(key, &p)| dataset.column_index(key).map(|idx| (idx, p)))
                .collect();
            (disease.clone(), cols)
        })
        .collect();

    let mut flipped = 0usize;
    for row in dataset.rows_mut() {
        let Some((_, cols)) = plan.iter().find(|(d, _)| *d == row.label) else {
            continue;
        };
        for &(idx, p) in cols {
            if rng.gen_bool(p) {
                row.values[idx] = 1;
                flipped += 1;
            }
        }
    }
    dataset.mark_injected(keys);

    tracing::info!(
        new_columns = dataset.columns().len() - before,
        total_columns = dataset.columns().len(),
        flipped,
        "Injected extended symptoms"
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::DiseaseRecord;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn flu_cold() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            DiseaseRecord::new("Flu", &["fever", "cough", "fatigue", "body_ache", "headache"]),
            DiseaseRecord::new(
                "Cold",
                &["cough", "runny_nose", "sneezing", "sore_throat", "mild_fever"],
            ),
        ])
        .unwrap()
    }

    fn table(entries: &[(&str, &[(&str, f64)])]) -> ExtendedAssociations {
        let mut t = BTreeMap::new();
        for (disease, weights) in entries {
            let w: BTreeMap<String, f64> = weights.iter().map(|(k, p)| (k.to_string(), *p)).collect();
            t.insert(disease.to_string(), w);
        }
        ExtendedAssociations::new(t).unwrap()
    }

    #[test]
    fn test_core_draw_bounds() {
        assert_eq!(core_draw_bounds(5), (3, 5));
        assert_eq!(core_draw_bounds(8), (3, 5));
        assert_eq!(core_draw_bounds(4), (3, 4));
        assert_eq!(core_draw_bounds(2), (2, 2));
        assert_eq!(core_draw_bounds(1), (1, 1));
    }

    #[test]
    fn test_synthesize_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let ds = synthesize_base(&flu_cold(), 50, &mut rng).unwrap();
        assert_eq!(ds.len(), 100);
        assert_eq!(ds.columns().len(), 9);
        let mut sorted = ds.columns().to_vec();
        sorted.sort();
        assert_eq!(ds.columns(), sorted.as_slice());
        assert_eq!(ds.class_counts()["Flu"], 50);
    }

    #[test]
    fn test_rows_only_use_core_symptoms() {
        let kb = flu_cold();
        let mut rng = StdRng::seed_from_u64(11);
        let ds = synthesize_base(&kb, 50, &mut rng).unwrap();
        for (i, row) in ds.rows().iter().enumerate() {
            let core = &kb.get(&row.label).unwrap().symptoms;
            let active = ds.active_columns(i);
            assert!((3..=5).contains(&active.len()));
            assert!(active.iter().all(|k| core.iter().any(|c| c == k)));
        }
    }

    #[test]
    fn test_small_disease_draws_fewer() {
        let kb = KnowledgeBase::new(vec![DiseaseRecord::new("Tiny", &["itch", "rash"])]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let ds = synthesize_base(&kb, 10, &mut rng).unwrap();
        assert!((0..ds.len()).all(|i| ds.active_columns(i).len() == 2));
    }

    #[test]
    fn test_zero_core_symptoms_fails_fast() {
        let kb = KnowledgeBase::new(vec![
            DiseaseRecord::new("Flu", &["fever"]),
            DiseaseRecord::new("Ghost", &[]),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = synthesize_base(&kb, 5, &mut rng).unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let kb = flu_cold();
        let a = synthesize_base(&kb, 20, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = synthesize_base(&kb, 20, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_builtin_and_exported_knowledge_synthesize_alike() {
        let dir = tempfile::TempDir::new().unwrap();
        let builtin = KnowledgeBase::builtin().unwrap();
        builtin.export(dir.path()).unwrap();
        let exported = KnowledgeBase::load(
            &dir.path().join(crate::knowledge::DISEASE_INFO_FILE),
            Some(&dir.path().join(crate::knowledge::DISEASE_SYMPTOMS_FILE)),
        )
        .unwrap();

        let a = synthesize_base(&builtin, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = synthesize_base(&exported, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_augment_adds_columns_and_respects_labels() {
        let mut rng = StdRng::seed_from_u64(9);
        let base = synthesize_base(&flu_cold(), 50, &mut rng).unwrap();
        let ext = table(&[("Flu", &[("body_chills", 1.0), ("ear_pain", 0.0)])]);
        let ds = augment_with_extended(base, &ext, &mut rng).unwrap();

        assert_eq!(ds.columns().len(), 11);
        assert_eq!(ds.columns()[9], "body_chills");
        for (i, row) in ds.rows().iter().enumerate() {
            let chills = ds.value(i, "body_chills").unwrap();
            assert_eq!(chills, u8::from(row.label == "Flu"));
            assert_eq!(ds.value(i, "ear_pain"), Some(0));
        }
    }

    #[test]
    fn test_augment_can_target_core_columns() {
        let mut rng = StdRng::seed_from_u64(2);
        let base = synthesize_base(&flu_cold(), 10, &mut rng).unwrap();
        let ext = table(&[("Cold", &[("fever", 1.0)])]);
        let ds = augment_with_extended(base, &ext, &mut rng).unwrap();
        assert_eq!(ds.columns().len(), 9);
        for (i, row) in ds.rows().iter().enumerate() {
            if row.label == "Cold" {
                assert_eq!(ds.value(i, "fever"), Some(1));
            }
        }
    }

    #[test]
    fn test_reaugment_is_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let base = synthesize_base(&flu_cold(), 5, &mut rng).unwrap();
        let ext = table(&[("Flu", &[("body_chills", 0.5)])]);
        let once = augment_with_extended(base, &ext, &mut rng).unwrap();
        let err = augment_with_extended(once, &ext, &mut rng).unwrap_err();
        assert!(matches!(err, DiagnoError::AlreadyAugmented(keys) if keys == vec!["body_chills"]));
    }

    #[test]
    fn test_reaugment_after_csv_reload_is_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let base = synthesize_base(&flu_cold(), 50, &mut rng).unwrap();
        let ext = table(&[("Flu", &[("body_chills", 0.5)])]);
        let once = augment_with_extended(base, &ext, &mut rng).unwrap();

        let reloaded = Dataset::from_csv(&once.to_csv()).unwrap();
        assert_eq!(reloaded.rows(), once.rows());
        let err = augment_with_extended(reloaded, &ext, &mut rng).unwrap_err();
        assert!(matches!(err, DiagnoError::AlreadyAugmented(keys) if keys == vec!["body_chills"]));
    }

    #[test]
    fn test_disjoint_second_table_is_allowed() {
        let mut rng = StdRng::seed_from_u64(4);
        let base = synthesize_base(&flu_cold(), 5, &mut rng).unwrap();
        let first = table(&[("Flu", &[("body_chills", 0.5)])]);
        let second = table(&[("Cold", &[("watery_eyes", 0.5)])]);
        let ds = augment_with_extended(base, &first, &mut rng).unwrap();
        let ds = augment_with_extended(ds, &second, &mut rng).unwrap();
        assert_eq!(ds.injected_columns().len(), 2);
    }
}
