use clinic_geo::core::matcher::DEFAULT_THRESHOLD;
use clinic_geo::{derive_keys, find_matches, normalize, AddressMatcher};
use std::collections::HashSet;

fn forward_cache() -> Vec<&'static str> {
    vec![
        "123 Main St, Santa Rosa, CA",
        "456 Oak Ave Apt 2, Petaluma, CA",
        "789 Pine Rd",
        "3697 Ross Road, Sebastopol, California 95472, United States",
        "5340 Skylane Boulevard, Santa Rosa, CA 95403",
        "1 Elm St",
        "  ",
        "100 N. Main Street #4, Cotati, CA 94931",
        "221 Baker St",
        "2210 Baker St",
    ]
}

fn reverse_cache() -> Vec<&'static str> {
    vec![
        "123 Main Street Santa Rosa CA",
        "456 Oak Avenue, Petaluma, CA",
        "987 Pine Rd",
        "3697 Ross Rd, Sebastopol, CA 95472, USA",
        "5340 Skylane Blvd, Santa Rosa, CA 95403, USA",
        "999 Completely Different Blvd",
        "",
        "100 North Main St, Cotati, CA 94931",
        "221 Baker Street",
        "221 Baker Street",
    ]
}

#[test]
fn test_normalize_is_idempotent_and_tidy() {
    for address in forward_cache().into_iter().chain(reverse_cache()) {
        let once = normalize(address);
        assert_eq!(normalize(&once), once, "not idempotent for {:?}", address);
        assert!(!once.contains("  "), "double space in {:?}", once);
        assert_eq!(once.trim(), once, "untrimmed output for {:?}", address);
    }
}

#[test]
fn test_exact_matches_are_normalized_equal() {
    let result = find_matches(&forward_cache(), &reverse_cache(), DEFAULT_THRESHOLD);

    assert!(!result.exact.is_empty());
    for m in &result.exact {
        assert_eq!(normalize(&m.address_a), normalize(&m.address_b));
        assert_eq!(m.normalized, normalize(&m.address_a));
    }
    for m in &result.fuzzy {
        assert_ne!(normalize(&m.address_a), normalize(&m.address_b));
    }
}

#[test]
fn test_every_address_matched_at_most_once() {
    let result = find_matches(&forward_cache(), &reverse_cache(), 0.5);

    let mut seen_a = HashSet::new();
    let mut seen_b = HashSet::new();
    let pairs = result
        .exact
        .iter()
        .map(|m| (&m.address_a, &m.address_b))
        .chain(result.fuzzy.iter().map(|m| (&m.address_a, &m.address_b)));
    for (a, b) in pairs {
        assert!(seen_a.insert(a.clone()), "{} matched twice", a);
        assert!(seen_b.insert(b.clone()), "{} matched twice", b);
    }
}

#[test]
fn test_fuzzy_scores_within_bounds_and_sorted() {
    for threshold in [0.5, DEFAULT_THRESHOLD, 0.9] {
        let result = find_matches(&forward_cache(), &reverse_cache(), threshold);
        for m in &result.fuzzy {
            assert!(m.score >= threshold && m.score < 1.0, "score {} out of range", m.score);
        }
        assert!(result.fuzzy.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn test_scenarios() {
    let result = find_matches(
        &["123 Main St, Santa Rosa, CA", "456 Oak Ave Apt 2, Petaluma, CA"],
        &["123 Main Street Santa Rosa CA", "456 Oak Avenue, Petaluma, CA"],
        DEFAULT_THRESHOLD,
    );
    assert_eq!(result.exact.len(), 2);
    assert!(result.fuzzy.is_empty());

    let result = find_matches(&["789 Pine Rd"], &["987 Pine Rd"], DEFAULT_THRESHOLD);
    assert!(result.exact.is_empty());
    assert_eq!(result.fuzzy.len(), 1);
    assert_eq!(result.fuzzy[0].formatted_score(), "0.8182");

    let result = find_matches(&["1 Elm St"], &["999 Completely Different Blvd"], 0.0);
    assert!(result.exact.is_empty());
    assert!(result.fuzzy.is_empty());
}

#[test]
fn test_duplicate_inputs_collapse() {
    let result = find_matches(&["221 Baker St"], &["221 Baker Street", "221 Baker Street"], DEFAULT_THRESHOLD);
    assert_eq!(result.total_b, 1);
    assert_eq!(result.exact.len(), 1);
    assert_eq!(result.summary().match_percentage, 100.0);
}

#[test]
fn test_matching_is_deterministic() {
    let matcher = AddressMatcher::new(0.5);
    let first = matcher.find_matches(forward_cache(), reverse_cache());

    let mut shuffled_a = forward_cache();
    shuffled_a.reverse();
    let mut shuffled_b = reverse_cache();
    shuffled_b.rotate_left(3);
    let second = matcher.find_matches(shuffled_a, shuffled_b);

    assert_eq!(first, second);
}

#[test]
fn test_keys_drive_candidate_buckets() {
    let keys_a = derive_keys(&normalize("789 Pine Rd"));
    let keys_b = derive_keys(&normalize("987 Pine Rd"));
    assert!(keys_a.intersection(&keys_b).next().is_some());

    let keys_c = derive_keys(&normalize("1 Elm St"));
    let keys_d = derive_keys(&normalize("999 Completely Different Blvd"));
    assert!(keys_c.intersection(&keys_d).next().is_none());
}
