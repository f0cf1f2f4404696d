use kcatalog::catalog::LoopDim;
use kcatalog::*;

fn selector(hw: char, precisions: [&str; 3], layouts: [&str; 3]) -> Selector {
    Selector::parse(hw, "gemm", precisions, layouts).unwrap()
}

fn sgemm_nn() -> Selector {
    selector('F', ["f32", "f32", "f32"], ["N", "N", "N"])
}

fn entry(strategy: &str, restrictions: Restrictions, unroll: u32, priority: f64) -> Entry {
    Entry::new(
        sgemm_nn(),
        restrictions,
        strategy,
        DriverInfo::new([unroll, unroll, 1], [4, 4, 1]),
        PerformanceModel::from_params(ModelId::Priority, &[priority]).unwrap(),
    )
}

fn query(m: u64, n: u64, k: u64) -> KernelQuery {
    KernelQuery::parse('F', "gemm", ["f32", "f32", ""], ["N", "N", ""], ProblemShape::new(m, n, k)).unwrap()
}

fn tagged(tags: &str) -> Restrictions {
    Restrictions::default().with_tags(tags).unwrap()
}

#[test]
fn test_exact_match_selects_only_entry() {
    let catalog = Catalog::new(vec![entry("sgemm_16x16", Restrictions::default(), 16, 0.0)]).unwrap();
    let sel = Evaluator::new(&catalog).select(&query(256, 256, 256)).unwrap();
    assert_eq!(sel.strategy(), "sgemm_16x16");
    assert_eq!(sel.path, SelectionPath::Scored);
    assert_eq!(sel.driver_info().unroll(LoopDim::M), 16);
    assert_eq!(sel.candidates, 1);
    assert!(sel.rejections.is_empty());
}

#[test]
fn test_empty_catalog() {
    let catalog = Catalog::new(Vec::new()).unwrap();
    let err = Evaluator::new(&catalog).select(&query(8, 8, 8)).unwrap_err();
    assert_eq!(err, SelectError::EmptyCatalog);
}

#[test]
fn test_no_selector_match() {
    let catalog = Catalog::new(vec![entry("sgemm", Restrictions::default(), 16, 0.0)]).unwrap();

    let q = KernelQuery::parse('G', "gemm", ["f32", "f32", ""], ["N", "N", ""], ProblemShape::new(8, 8, 8)).unwrap();
    let err = Evaluator::new(&catalog).select(&q).unwrap_err();
    assert!(matches!(err, SelectError::NoSelectorMatch { .. }));

    // Same key, different accumulator precision.
    let q = KernelQuery::parse('F', "gemm", ["f32", "f32", "f16"], ["N", "N", ""], ProblemShape::new(8, 8, 8)).unwrap();
    let err = Evaluator::new(&catalog).select(&q).unwrap_err();
    assert!(matches!(err, SelectError::NoSelectorMatch { .. }));
}

#[test]
fn test_invalid_query_is_reported_before_lookup() {
    let catalog = Catalog::new(Vec::new()).unwrap();
    let err = Evaluator::new(&catalog).select(&query(8, 0, 8)).unwrap_err();
    assert_eq!(err, SelectError::InvalidQuery(QueryError::ZeroDimension { dim: "n" }));
}

#[test]
fn test_stepping_rejection() {
    let r = Restrictions {
        stepping_min: Some(5),
        ..Restrictions::default()
    };
    let catalog = Catalog::new(vec![entry("new_stepping_only", r, 16, 0.0)]).unwrap();
    let evaluator = Evaluator::new(&catalog);

    match evaluator.select(&query(64, 64, 64).with_stepping(2)) {
        Err(SelectError::NoEligibleEntry { rejections, .. }) => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(rejections[0].strategy, "new_stepping_only");
            assert!(matches!(rejections[0].reason, RejectReason::Stepping { stepping: 2, .. }));
        }
        other => panic!("expected stepping rejection, got {other:?}"),
    }

    assert!(evaluator.select(&query(64, 64, 64).with_stepping(5)).is_ok());
}

#[test]
fn test_capability_tag_rejection() {
    let catalog = Catalog::new(vec![entry("block2d", tagged("A"), 16, 0.0)]).unwrap();
    let evaluator = Evaluator::new(&catalog);

    match evaluator.select(&query(64, 64, 64)) {
        Err(SelectError::NoEligibleEntry { rejections, .. }) => {
            assert_eq!(rejections[0].reason, RejectReason::MissingCapability(Capability::Block2dA));
        }
        other => panic!("expected capability rejection, got {other:?}"),
    }

    let caps: CapabilitySet = [Capability::Block2dA].into_iter().collect();
    let sel = evaluator.select(&query(64, 64, 64).with_capabilities(caps)).unwrap();
    assert_eq!(sel.strategy(), "block2d");
}

#[test]
fn test_forbidden_batch_tag() {
    let catalog = Catalog::new(vec![
        entry("no_batch", tagged("v"), 16, 0.0),
        entry("batched", tagged("V"), 16, 0.0),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);

    let plain = evaluator.select(&query(64, 64, 64)).unwrap();
    assert_eq!(plain.strategy(), "no_batch");

    let mut q = query(64, 64, 64);
    q.shape.batch = vec![8];
    let sel = evaluator.select(&q).unwrap();
    assert_eq!(sel.strategy(), "batched");
    assert_eq!(sel.rejections[0].reason, RejectReason::ForbiddenCapability(Capability::Batch));
}

#[test]
fn test_best_of_two_lower_cost_wins() {
    // 448 EUs x 8 threads: 32x32 fits one wave at 32*32*64 FMAs per thread,
    // 16x16 needs two waves at a quarter of the per-thread work.
    let catalog = Catalog::new(vec![
        entry("big_tile", Restrictions::default(), 32, 0.0),
        entry("small_tile", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);
    let q = query(1024, 1024, 64);

    let sel = evaluator.select(&q).unwrap();
    assert_eq!(sel.strategy(), "small_tile");
    assert_eq!(sel.score, Some(2.0 * 16.0 * 16.0 * 64.0));
    assert_eq!(evaluator.score(&catalog.entries()[0], &q), 32.0 * 32.0 * 64.0);
}

#[test]
fn test_priority_breaks_equal_shapes() {
    let catalog = Catalog::new(vec![
        entry("plain", Restrictions::default(), 16, 0.0),
        entry("preferred", Restrictions::default(), 16, 1.0),
    ])
    .unwrap();
    let sel = Evaluator::new(&catalog).select(&query(1024, 1024, 64)).unwrap();
    assert_eq!(sel.strategy(), "preferred");
}

#[test]
fn test_tie_keeps_catalog_order() {
    let catalog = Catalog::new(vec![
        entry("first", Restrictions::default(), 16, 0.0),
        entry("second", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    for _ in 0..4 {
        let sel = Evaluator::new(&catalog).select(&query(500, 700, 90)).unwrap();
        assert_eq!(sel.strategy(), "first");
        assert_eq!(sel.index, 0);
    }
}

#[test]
fn test_accept_range_short_circuits_scoring() {
    let mut small_k = Restrictions::default();
    small_k.accept_sizes[2] = SizeRange { min: None, max: Some(64) };
    let catalog = Catalog::new(vec![
        entry("small_k", small_k, 32, -4.0),
        entry("general", Restrictions::default(), 16, 4.0),
    ])
    .unwrap();

    let sel = Evaluator::new(&catalog).select(&query(1024, 1024, 64)).unwrap();
    assert_eq!(sel.strategy(), "small_k");
    assert_eq!(sel.path, SelectionPath::AcceptRange);
    assert_eq!(sel.score, None);

    // Outside the accept box the entry competes on cost and loses.
    let sel = Evaluator::new(&catalog).select(&query(1024, 1024, 65)).unwrap();
    assert_eq!(sel.strategy(), "general");

    let config = EvaluatorConfig {
        accept_short_circuit: false,
        ..EvaluatorConfig::default()
    };
    let sel = Evaluator::with_config(&catalog, config).select(&query(1024, 1024, 64)).unwrap();
    assert_eq!(sel.strategy(), "general");
    assert_eq!(sel.path, SelectionPath::Scored);
}

#[test]
fn test_accept_range_bypasses_tags_and_alignment() {
    let mut r = tagged("A");
    r.alignment = [8, 8, 8];
    r.accept_sizes = [SizeRange::new(1, 128); 3];
    let catalog = Catalog::new(vec![entry("tiny", r, 16, 0.0)]).unwrap();
    let evaluator = Evaluator::new(&catalog);

    assert_eq!(evaluator.select(&query(64, 64, 64)).unwrap().path, SelectionPath::AcceptRange);
    assert!(evaluator.select(&query(256, 64, 64)).is_err());
}

#[test]
fn test_allowed_range_is_a_hard_boundary() {
    let mut r = Restrictions::default();
    r.allowed_sizes[0] = SizeRange { min: None, max: Some(512) };
    let catalog = Catalog::new(vec![entry("m_le_512", r, 16, 0.0)]).unwrap();
    let evaluator = Evaluator::new(&catalog);

    assert!(evaluator.select(&query(512, 4096, 4096)).is_ok());
    match evaluator.select(&query(513, 64, 64)) {
        Err(SelectError::NoEligibleEntry { rejections, .. }) => assert!(matches!(
            rejections[0].reason,
            RejectReason::SizeNotAllowed { dim: 'm', size: 513, .. }
        )),
        other => panic!("expected size rejection, got {other:?}"),
    }
}

#[test]
fn test_alignment_fallback_pass() {
    let mut aligned = Restrictions::default();
    aligned.alignment = [4, 4, 4];
    let catalog = Catalog::new(vec![
        entry("aligned", aligned, 16, 0.0),
        // Cheaper, but only used when nothing regular fits.
        entry("unaligned", tagged("#"), 16, 8.0),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);

    let sel = evaluator.select(&query(64, 64, 64).with_alignment([4, 4, 4])).unwrap();
    assert_eq!(sel.strategy(), "aligned");
    assert_eq!(sel.path, SelectionPath::Scored);

    let sel = evaluator.select(&query(64, 64, 64).with_alignment([2, 4, 4])).unwrap();
    assert_eq!(sel.strategy(), "unaligned");
    assert_eq!(sel.path, SelectionPath::AlignFallback);
    assert!(matches!(sel.rejections[0].reason, RejectReason::Alignment { operand: 'A', .. }));

    let strict = EvaluatorConfig {
        align_fallback: false,
        ..EvaluatorConfig::default()
    };
    match Evaluator::with_config(&catalog, strict).select(&query(64, 64, 64).with_alignment([2, 4, 4])) {
        Err(SelectError::NoEligibleEntry { rejections, .. }) => {
            let reasons: Vec<_> = rejections.iter().map(|r| r.reason.clone()).collect();
            assert_eq!(reasons.len(), 2);
            assert_eq!(reasons[1], RejectReason::FallbackOnly);
        }
        other => panic!("expected no eligible entry, got {other:?}"),
    }
}

#[test]
fn test_disabled_entry_never_selected() {
    let catalog = Catalog::new(vec![
        entry("retired", tagged("@"), 16, 10.0),
        entry("current", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    let sel = Evaluator::new(&catalog).select(&query(128, 128, 128)).unwrap();
    assert_eq!(sel.strategy(), "current");
    assert_eq!(sel.rejections[0].reason, RejectReason::Disabled);
}

#[test]
fn test_record_rejections_off() {
    let catalog = Catalog::new(vec![
        entry("retired", tagged("@"), 16, 0.0),
        entry("current", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    let config = EvaluatorConfig::from_json(r#"{ "record_rejections": false }"#).unwrap();
    let sel = Evaluator::with_config(&catalog, config).select(&query(128, 128, 128)).unwrap();
    assert!(sel.rejections.is_empty());
}

#[test]
fn test_wildcard_layout_spans_key_range() {
    let mut entries = vec![entry("nn", Restrictions::default(), 32, 0.0)];
    let mut tn = entry("tn", Restrictions::default(), 16, 0.0);
    tn.selector = selector('F', ["f32", "f32", "f32"], ["T", "N", "N"]);
    entries.push(tn);
    let catalog = Catalog::new(entries).unwrap();

    let q = KernelQuery::parse('F', "gemm", ["f32", "f32", ""], ["", "", ""], ProblemShape::new(1024, 1024, 64)).unwrap();
    let sel = Evaluator::new(&catalog).select(&q).unwrap();
    assert_eq!(sel.candidates, 2);
    assert_eq!(sel.strategy(), "tn");
}

#[test]
fn test_batch_matches_sequential() {
    let catalog = Catalog::new(vec![
        entry("big_tile", Restrictions::default(), 32, 0.0),
        entry("small_tile", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);
    let queries: Vec<_> = [(8, 8, 8), (1024, 1024, 64), (4096, 16, 3), (100, 0, 1)]
        .iter()
        .map(|&(m, n, k)| query(m, n, k))
        .collect();

    let batch = evaluator.select_batch(&queries);
    let sequential: Vec<_> = queries.iter().map(|q| evaluator.select(q)).collect();
    assert_eq!(batch, sequential);
    assert!(batch[3].is_err());
}

#[test]
fn test_explain_and_list() {
    let catalog = Catalog::new(vec![
        entry("retired", tagged("@"), 16, 0.0),
        entry("current", Restrictions::default(), 16, 0.0),
    ])
    .unwrap();
    let outcome = plan_kernel(&catalog, &query(64, 64, 64));
    let text = explain_decision(&outcome);
    assert!(text.contains("current"));
    assert!(text.contains("retired: entry disabled"));

    assert_eq!(list_strategies(&catalog, "gemm"), ["retired", "current"]);
    assert!(list_strategies(&catalog, "conv").is_empty());
}

#[test]
fn test_json_round_trip() {
    let mut r = tagged("Ab#");
    r.stepping_min = Some(1);
    r.allowed_sizes[1] = SizeRange::new(16, 4096);
    r.alignment = [2, 2, 4];
    let standard = Entry::new(
        selector('G', ["f16", "f16", "f32"], ["N", "T", "N"]),
        r,
        "hgemm_sys",
        DriverInfo::new([32, 32, 16], [4, 8, 2]),
        PerformanceModel::from_params(
            ModelId::Standard,
            &[1.0, 2.0, 0.5, 0.75, 0.25, 0.5, 0.125, 0.125, 1.0, 0.5, 0.5, 0.25, 1.5, 1024.0, 4096.0],
        )
        .unwrap(),
    );
    let catalog = Catalog::new(vec![standard, entry("sgemm", Restrictions::default(), 16, 2.0)]).unwrap();

    let json = catalog.to_json().unwrap();
    let back = Catalog::from_json(&json).unwrap();
    assert_eq!(back.entries(), catalog.entries());
}

fn modelled(strategy: &str, driver: DriverInfo, id: ModelId, params: &[f64]) -> Entry {
    Entry::new(
        sgemm_nn(),
        Restrictions::default(),
        strategy,
        driver,
        PerformanceModel::from_params(id, params).unwrap(),
    )
}

// Cm0 Cm1 C00 C01 C10 C11 Ma Mb Ef Ep0 Ep1 Em Fp Fr0 Fr1
fn standard_params(ef: f64) -> [f64; 15] {
    [2.0, 3.0, 0.5, 0.75, 0.25, 0.5, 0.01, 0.01, ef, 0.8, 0.1, 0.5, 1.2, 1e6, 1e9]
}

// C0 C1 Ck0 Ck1 Cb0 Cb1 Ma Mb Mc Mcu Ef Ep0 Ep1 Em Fp Fr0 Fr1
fn extended_params(ck0: f64, cb0: f64) -> [f64; 17] {
    [1.0, 1.0, ck0, 0.5, cb0, 2.0, 0.01, 0.01, 0.02, 0.04, 1.0, 0.9, 0.1, 0.5, 1.2, 1e6, 1e9]
}

#[test]
fn test_exact_match_inside_accept_box() {
    let r = Restrictions {
        accept_sizes: [SizeRange::new(1, 1_000_000_000); 3],
        ..Restrictions::default()
    };
    let catalog = Catalog::new(vec![entry("sgemm_any", r, 16, 0.0)]).unwrap();
    let sel = Evaluator::new(&catalog).select(&query(256, 256, 256)).unwrap();
    assert_eq!(sel.strategy(), "sgemm_any");
    assert_eq!(sel.path, SelectionPath::AcceptRange);
    assert_eq!(sel.score, None);
}

#[test]
fn test_stepping_window_rejection() {
    let r = Restrictions {
        stepping_min: Some(5),
        stepping_max: Some(10),
        ..Restrictions::default()
    };
    let catalog = Catalog::new(vec![entry("stepping_5_to_10", r, 16, 0.0)]).unwrap();
    let evaluator = Evaluator::new(&catalog);

    for stepping in [3, 10] {
        match evaluator.select(&query(64, 64, 64).with_stepping(stepping)) {
            Err(SelectError::NoEligibleEntry { rejections, .. }) => assert_eq!(
                rejections[0].reason,
                RejectReason::Stepping {
                    stepping,
                    min: Some(5),
                    max: Some(10)
                }
            ),
            other => panic!("stepping {stepping}: expected rejection, got {other:?}"),
        }
    }
    assert!(evaluator.select(&query(64, 64, 64).with_stepping(7)).is_ok());
}

#[test]
fn test_standard_models_best_of_two() {
    // 8x8 tiles give four full waves, so the full-wave efficiency matters.
    let driver = DriverInfo::new([8, 8, 1], [4, 4, 1]);
    let catalog = Catalog::new(vec![
        modelled("low_efficiency", driver, ModelId::Standard, &standard_params(0.5)),
        modelled("high_efficiency", driver, ModelId::Standard, &standard_params(1.0)),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);
    let q = query(1024, 1024, 64);

    let sel = evaluator.select(&q).unwrap();
    assert_eq!(sel.strategy(), "high_efficiency");
    assert_eq!(sel.path, SelectionPath::Scored);
    assert_eq!(sel.score, Some(evaluator.score(sel.entry, &q)));
    assert!(evaluator.score(&catalog.entries()[0], &q) > sel.score.unwrap());
}

#[test]
fn test_extended_fused_beta_overhead() {
    let driver = DriverInfo {
        fused_beta: true,
        ..DriverInfo::new([16, 16, 1], [4, 4, 1])
    };
    let catalog = Catalog::new(vec![
        modelled("heavy_fusion", driver, ModelId::Extended, &extended_params(0.5, 50.0)),
        modelled("light_fusion", driver, ModelId::Extended, &extended_params(0.5, 1.0)),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);

    let sel = evaluator.select(&query(1024, 1024, 64).with_beta(true)).unwrap();
    assert_eq!(sel.strategy(), "light_fusion");

    // Without beta the fusion term drops out and the two tie.
    let sel = evaluator.select(&query(1024, 1024, 64)).unwrap();
    assert_eq!(sel.strategy(), "heavy_fusion");
    assert_eq!(sel.index, 0);
}

#[test]
fn test_extended_k_parallel_overhead() {
    let driver = DriverInfo {
        k_parallel: true,
        ..DriverInfo::new([16, 16, 1], [4, 4, 4])
    };
    let catalog = Catalog::new(vec![
        modelled("costly_k_split", driver, ModelId::Extended, &extended_params(10.0, 1.0)),
        modelled("cheap_k_split", driver, ModelId::Extended, &extended_params(0.1, 1.0)),
    ])
    .unwrap();
    let evaluator = Evaluator::new(&catalog);
    let q = query(1024, 1024, 64);

    let sel = evaluator.select(&q).unwrap();
    assert_eq!(sel.strategy(), "cheap_k_split");
    assert!(sel.score.unwrap() < evaluator.score(&catalog.entries()[0], &q));
}

#[test]
fn test_oversized_batch_is_rejected_not_panicking() {
    let catalog = Catalog::new(vec![entry("sgemm", tagged("V"), 16, 0.0)]).unwrap();
    let mut q = query(8, 8, 8);
    q.shape.batch = vec![1 << 32, 1 << 32];
    let err = Evaluator::new(&catalog).select(&q).unwrap_err();
    assert_eq!(err, SelectError::InvalidQuery(QueryError::BatchOverflow));
}

#[test]
fn test_accept_box_inside_fallback_pass() {
    let mut aligned = Restrictions::default();
    aligned.alignment = [8, 8, 8];
    let mut fallback = tagged("#");
    fallback.accept_sizes = [SizeRange::new(1, 128); 3];
    let catalog = Catalog::new(vec![entry("aligned", aligned, 16, 0.0), entry("small_unaligned", fallback, 16, 0.0)]).unwrap();

    let sel = Evaluator::new(&catalog).select(&query(64, 64, 64)).unwrap();
    assert_eq!(sel.strategy(), "small_unaligned");
    assert_eq!(sel.path, SelectionPath::AlignFallback);
    assert_eq!(sel.score, None);
}
