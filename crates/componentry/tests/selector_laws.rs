use componentry::attributes::AttributeSelector;
use proptest::prelude::*;

fn selector() -> impl Strategy<Value = AttributeSelector> {
    let leaf = any::<bool>().prop_map(AttributeSelector::Bool);
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop::collection::vec((prop::sample::select(vec!["a", "b", "c"]), inner), 0..3).prop_map(
            |entries| {
                AttributeSelector::Map(
                    entries
                        .into_iter()
                        .map(|(name, selector)| (name.to_string(), selector))
                        .collect(),
                )
            },
        )
    })
}

proptest! {
    #[test]
    fn merge_is_commutative(a in selector(), b in selector()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_is_associative(a in selector(), b in selector(), c in selector()) {
        prop_assert_eq!(a.merge(&b.merge(&c)), a.merge(&b).merge(&c));
    }

    #[test]
    fn merge_is_idempotent(a in selector()) {
        prop_assert_eq!(a.merge(&a), a.normalize());
    }

    #[test]
    fn intersect_is_commutative(a in selector(), b in selector()) {
        prop_assert_eq!(a.intersect(&b), b.intersect(&a));
    }

    #[test]
    fn intersect_is_associative(a in selector(), b in selector(), c in selector()) {
        prop_assert_eq!(a.intersect(&b.intersect(&c)), a.intersect(&b).intersect(&c));
    }

    #[test]
    fn intersect_is_idempotent(a in selector()) {
        prop_assert_eq!(a.intersect(&a), a.normalize());
    }

    #[test]
    fn true_absorbs_merge_and_false_absorbs_intersect(a in selector()) {
        prop_assert_eq!(AttributeSelector::all().merge(&a), AttributeSelector::all());
        prop_assert_eq!(AttributeSelector::none().intersect(&a), AttributeSelector::none());
    }

    #[test]
    fn identities(a in selector()) {
        prop_assert_eq!(AttributeSelector::none().merge(&a), a.normalize());
        prop_assert_eq!(AttributeSelector::all().intersect(&a), a.normalize());
    }

    #[test]
    fn merge_includes_both_sides(a in selector(), b in selector()) {
        let merged = a.merge(&b);
        prop_assert!(merged.includes(&a));
        prop_assert!(merged.includes(&b));
    }

    #[test]
    fn selectors_survive_value_conversion(a in selector()) {
        let value = a.to_value();
        prop_assert_eq!(AttributeSelector::from_value(&value).unwrap(), a.normalize());
    }
}
