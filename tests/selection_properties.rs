use kcatalog::catalog::Verdict;
use kcatalog::*;
use proptest::prelude::*;

fn arb_entry() -> impl Strategy<Value = Entry> {
    (
        prop::sample::select(vec!['F', 'G']),
        prop::sample::select(vec!["f32", "f16", "bf16"]),
        prop::sample::select(vec!["N", "T"]),
        prop::sample::select(vec!["N", "T"]),
        prop::sample::select(vec![8u32, 16, 32]),
        prop::sample::select(vec![8u32, 16, 32]),
        -2.0f64..2.0,
        prop::option::of(1u64..2048),
        prop::option::of(1u64..256),
        prop::sample::select(vec!["", "A", "a", "@", "#"]),
        "[a-z]{3,6}",
    )
        .prop_map(|(hw, prec, la, lb, um, un, priority, allowed_m, accept_k, tags, name)| {
            let mut r = Restrictions::default().with_tags(tags).unwrap();
            r.allowed_sizes[0].max = allowed_m;
            r.accept_sizes[2].max = accept_k;
            Entry::new(
                Selector::parse(hw, "gemm", [prec, prec, "f32"], [la, lb, "N"]).unwrap(),
                r,
                name,
                DriverInfo::new([um, un, 1], [4, 4, 1]),
                PerformanceModel::from_params(ModelId::Priority, &[priority]).unwrap(),
            )
        })
}

fn arb_query() -> impl Strategy<Value = KernelQuery> {
    (
        prop::sample::select(vec!['F', 'G']),
        prop::sample::select(vec!["f32", "f16", "bf16", ""]),
        prop::sample::select(vec!["N", "T", ""]),
        prop::sample::select(vec!["N", "T", ""]),
        1u64..4096,
        1u64..4096,
        1u64..512,
        any::<bool>(),
    )
        .prop_map(|(hw, prec, la, lb, m, n, k, block2d)| {
            let caps: CapabilitySet = if block2d {
                [Capability::Block2dA].into_iter().collect()
            } else {
                CapabilitySet::empty()
            };
            KernelQuery::parse(hw, "gemm", [prec, prec, ""], [la, lb, ""], ProblemShape::new(m, n, k))
                .unwrap()
                .with_capabilities(caps)
        })
}

proptest! {
    #[test]
    fn test_catalog_is_key_ordered(entries in prop::collection::vec(arb_entry(), 0..24)) {
        let catalog = Catalog::new(entries).unwrap();
        for pair in catalog.entries().windows(2) {
            prop_assert!(pair[0].selector.key() <= pair[1].selector.key());
        }
    }

    #[test]
    fn test_range_holds_every_admitted_entry(
        entries in prop::collection::vec(arb_entry(), 0..24),
        q in arb_query(),
    ) {
        let catalog = Catalog::new(entries).unwrap();
        let range = catalog.range_indices(&q.selector);
        for (i, e) in catalog.entries().iter().enumerate() {
            if e.selector.admits(&q.selector) {
                prop_assert!(range.contains(&i));
            }
        }
    }

    #[test]
    fn test_selection_is_deterministic(
        entries in prop::collection::vec(arb_entry(), 0..24),
        q in arb_query(),
    ) {
        let catalog = Catalog::new(entries).unwrap();
        let evaluator = Evaluator::new(&catalog);
        prop_assert_eq!(evaluator.select(&q), evaluator.select(&q));
    }

    #[test]
    fn test_scored_pick_is_first_minimum(
        entries in prop::collection::vec(arb_entry(), 1..24),
        q in arb_query(),
    ) {
        let catalog = Catalog::new(entries).unwrap();
        let config = EvaluatorConfig { accept_short_circuit: false, ..EvaluatorConfig::default() };
        let evaluator = Evaluator::with_config(&catalog, config);

        if let Ok(sel) = evaluator.select(&q) {
            let fallback = sel.path == SelectionPath::AlignFallback;
            let ctx = q.match_context();
            let score = sel.score.unwrap();
            for (i, e) in catalog.entries().iter().enumerate() {
                let competing = e.selector.admits(&q.selector)
                    && e.restrictions.is_align_fallback() == fallback
                    && !matches!(e.restrictions.check(&ctx), Verdict::Reject(_));
                if !competing {
                    continue;
                }
                let other = evaluator.score(e, &q);
                prop_assert!(score <= other);
                if i < sel.index {
                    prop_assert!(score < other);
                }
            }
        }
    }

    #[test]
    fn test_selected_entry_passes_restrictions(
        entries in prop::collection::vec(arb_entry(), 1..24),
        q in arb_query(),
    ) {
        let catalog = Catalog::new(entries).unwrap();
        if let Ok(sel) = Evaluator::new(&catalog).select(&q) {
            prop_assert!(sel.entry.selector.admits(&q.selector));
            prop_assert!(!matches!(sel.entry.restrictions.check(&q.match_context()), Verdict::Reject(_)));
            if sel.path == SelectionPath::AcceptRange {
                prop_assert_eq!(sel.entry.restrictions.check(&q.match_context()), Verdict::Accept);
            }
        }
    }
}
