//! Property-based tests for encoding, synthesis and prediction using proptest.

use proptest::prelude::*;

use diagno_core::config::TrainingConfig;
use diagno_core::inference::DEFAULT_TOP_K;
use diagno_core::knowledge::ExtendedAssociations;
use diagno_core::{
    DiseaseRecord, FeatureSchema, KnowledgeBase, Predictor, augment_with_extended,
    synthesize_base, train,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

const VOCAB: [&str; 10] = [
    "fever",
    "cough",
    "fatigue",
    "body_ache",
    "headache",
    "runny_nose",
    "sneezing",
    "sore_throat",
    "mild_fever",
    "rash",
];

fn knowledge() -> KnowledgeBase {
    KnowledgeBase::new(vec![
        DiseaseRecord::new("Flu", &["fever", "cough", "fatigue", "body_ache", "headache"]),
        DiseaseRecord::new(
            "Cold",
            &["cough", "runny_nose", "sneezing", "sore_throat", "mild_fever"],
        ),
        DiseaseRecord::new("Measles", &["fever", "rash"]),
    ])
    .unwrap()
}

/// One trained predictor shared by every case.
fn predictor() -> &'static Predictor {
    static PREDICTOR: OnceLock<Predictor> = OnceLock::new();
    PREDICTOR.get_or_init(|| {
        let kb = knowledge();
        let ds = synthesize_base(&kb, 30, &mut StdRng::seed_from_u64(42)).unwrap();
        let outcome = train(&ds, &TrainingConfig::default()).unwrap();
        Predictor::new(outcome.model, Arc::new(kb), DEFAULT_TOP_K)
    })
}

fn symptom_subset() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(VOCAB.to_vec(), 1..=VOCAB.len())
}

// --- Encoding ---

proptest! {
    #[test]
    fn encode_ignores_key_order(keys in symptom_subset(), seed in any::<u64>()) {
        let schema = FeatureSchema::new(VOCAB);
        let mut shuffled = keys.clone();
        rand::seq::SliceRandom::shuffle(shuffled.as_mut_slice(), &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(schema.encode(&keys), schema.encode(&shuffled));
    }

    #[test]
    fn encode_ignores_unknown_keys(keys in symptom_subset(), noise in "[a-z]{3,8}_x") {
        let schema = FeatureSchema::new(VOCAB);
        let mut noisy: Vec<&str> = keys.clone();
        noisy.push(noise.as_str());
        prop_assert_eq!(schema.encode(&keys), schema.encode(&noisy));
        prop_assert_eq!(schema.symptom_count(), VOCAB.len());
    }
}

// --- Synthesis ---

proptest! {
    #[test]
    fn synthesis_respects_core_bounds(seed in any::<u64>(), samples in 1usize..20) {
        let kb = knowledge();
        let ds = synthesize_base(&kb, samples, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(ds.len(), samples * kb.len());
        for (i, row) in ds.rows().iter().enumerate() {
            let core = &kb.get(&row.label).unwrap().symptoms;
            let active = ds.active_columns(i);
            let lo = 3.min(core.len());
            let hi = 5.min(core.len());
            prop_assert!(active.len() >= lo && active.len() <= hi);
            prop_assert!(active.iter().all(|k| core.iter().any(|c| c == k)));
        }
    }

    #[test]
    fn augmentation_only_touches_listed_pairs(seed in any::<u64>(), p in 0.0f64..=1.0) {
        let kb = knowledge();
        let mut rng = StdRng::seed_from_u64(seed);
        let base = synthesize_base(&kb, 10, &mut rng).unwrap();
        let table = ExtendedAssociations::new(BTreeMap::from([(
            "Flu".to_string(),
            BTreeMap::from([("chills".to_string(), p)]),
        )]))
        .unwrap();
        let ds = augment_with_extended(base, &table, &mut rng).unwrap();
        for (i, row) in ds.rows().iter().enumerate() {
            if row.label != "Flu" {
                prop_assert_eq!(ds.value(i, "chills"), Some(0));
            }
        }
    }
}

// --- Prediction ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn predictions_form_a_distribution(keys in symptom_subset()) {
        let result = predictor().predict(&keys).unwrap();
        let total: f64 = result.all_predictions.values().sum();
        prop_assert!((total - 100.0).abs() < 0.05);
        prop_assert!(result.all_predictions.values().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn top_predictions_are_ranked(keys in symptom_subset()) {
        let result = predictor().predict(&keys).unwrap();
        prop_assert_eq!(result.top_predictions.len(), DEFAULT_TOP_K.min(result.all_predictions.len()));
        for pair in result.top_predictions.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
        }
        let best = result.all_predictions.values().copied().fold(f64::MIN, f64::max);
        prop_assert_eq!(result.primary_prediction.confidence, best);
        prop_assert_eq!(&result.top_predictions[0], &result.primary_prediction);
    }
}
