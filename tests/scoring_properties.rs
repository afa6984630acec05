use proptest::collection::vec;
use proptest::prelude::*;

use biometric_engine::face::FaceMatcher;
use biometric_engine::fingerprint::{identify, TemplateScorer};
use biometric_engine::{
    BackendRegistry, Capture, Engine, EngineConfig, EngineError, FaceEmbedding,
    FingerprintSettings,
};

fn feature_scorer(offset: usize) -> TemplateScorer {
    TemplateScorer::new(FingerprintSettings {
        biometric_offset: offset,
        ..FingerprintSettings::default()
    })
}

fn equal_pair(max: usize) -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (1..max).prop_flat_map(|len| (vec(any::<u8>(), len), vec(any::<u8>(), len)))
}

proptest! {
    #[test]
    fn identical_templates_score_full(t in vec(any::<u8>(), 1..256)) {
        let copy = t.clone();
        prop_assert_eq!(TemplateScorer::default().score(&t, &copy), 100);
        // same buffer through the feature-region path
        prop_assert_eq!(feature_scorer(0).score(&t, &copy), 100);
    }

    #[test]
    fn scores_are_symmetric((a, b) in equal_pair(128), offset in 0usize..64) {
        let whole = TemplateScorer::default();
        prop_assert_eq!(whole.score(&a, &b), whole.score(&b, &a));
        let feature = feature_scorer(offset);
        prop_assert_eq!(feature.score(&a, &b), feature.score(&b, &a));
    }

    #[test]
    fn mismatched_lengths_score_zero(
        a in vec(any::<u8>(), 1..128),
        extra in 1usize..64,
    ) {
        let mut b = a.clone();
        b.extend(std::iter::repeat(0u8).take(extra));
        prop_assert_eq!(TemplateScorer::default().score(&a, &b), 0);
        prop_assert_eq!(feature_scorer(0).score(&a, &b), 0);
    }

    #[test]
    fn feature_scores_are_zero_or_above_the_gate((a, b) in equal_pair(128)) {
        let score = feature_scorer(0).score(&a, &b);
        prop_assert!(score == 0 || score > 60);
    }

    #[test]
    fn empty_candidate_lists_never_identify(probe in vec(any::<u8>(), 1..64)) {
        let result = identify(&probe, &[], &mut TemplateScorer::default());
        prop_assert!(!result.found);
        prop_assert_eq!(result.best_score, None);

        let engine = Engine::new(EngineConfig::default(), BackendRegistry::new());
        let result = engine
            .identify_fingerprint(&Capture::fingerprint_template(probe), &[])
            .unwrap();
        prop_assert!(!result.found);
    }

    #[test]
    fn empty_galleries_never_verify(
        probe in vec(-1.0f32..1.0, 1..32),
        bytes in vec(any::<u8>(), 1..64),
    ) {
        let embedding = FaceEmbedding::new(probe);
        let result = FaceMatcher::default().verify_embeddings(&embedding, &[]);
        prop_assert!(!result.matched);

        let engine = Engine::new(EngineConfig::default(), BackendRegistry::new());
        let err = engine.verify_face(&Capture::face_image(bytes), &[]).unwrap_err();
        prop_assert!(matches!(err, EngineError::NotEnrolled));
    }
}
