use criterion::{Criterion, black_box, criterion_group, criterion_main};
use diagno_core::config::TrainingConfig;
use diagno_core::inference::DEFAULT_TOP_K;
use diagno_core::{
    ExtendedAssociations, FeatureSchema, KnowledgeBase, Predictor, augment_with_extended,
    synthesize_base, train,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

fn bench_encode(c: &mut Criterion) {
    let kb = KnowledgeBase::builtin().unwrap();
    let schema = FeatureSchema::new(kb.symptom_keys());

    c.bench_function("encode_five_symptoms", |b| {
        b.iter(|| {
            schema.encode(black_box([
                "fever",
                "cough",
                "fatigue",
                "body_ache",
                "headache",
            ]))
        })
    });

    c.bench_function("encode_unknown_symptoms", |b| {
        b.iter(|| schema.encode(black_box(["not_a_real_symptom", "also_fake"])))
    });
}

fn bench_synthesis(c: &mut Criterion) {
    let kb = KnowledgeBase::builtin().unwrap();
    let ext = ExtendedAssociations::builtin().unwrap();

    c.bench_function("synthesize_builtin_50", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            let ds = synthesize_base(&kb, black_box(50), &mut rng).unwrap();
            augment_with_extended(ds, &ext, &mut rng).unwrap()
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let kb = KnowledgeBase::builtin().unwrap();
    let ext = ExtendedAssociations::builtin().unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let ds = synthesize_base(&kb, 50, &mut rng).unwrap();
    let ds = augment_with_extended(ds, &ext, &mut rng).unwrap();
    let outcome = train(&ds, &TrainingConfig::default()).unwrap();
    let predictor = Predictor::new(outcome.model, Arc::new(kb), DEFAULT_TOP_K);

    c.bench_function("predict_builtin", |b| {
        b.iter(|| predictor.predict(black_box(&["fever", "cough", "fatigue"])))
    });
}

criterion_group!(benches, bench_encode, bench_synthesis, bench_predict);
criterion_main!(benches);
