//! Property and edge-case tests for the key/value vector codec.

use proptest::prelude::*;
use vigild::kvvec::{compare_pairs, KvVec};

fn build(pairs: &[(String, String)]) -> KvVec {
    let mut kvv = KvVec::new();
    for (k, v) in pairs {
        kvv.push_str(k, v);
    }
    kvv
}

proptest! {
    // decode(encode(S)) == S when no key or value contains a separator
    #[test]
    fn roundtrips_through_the_codec(
        pairs in prop::collection::vec(
            ("[a-z][a-z0-9_]{0,11}", "[a-z0-9 .,_-]{0,16}"),
            0..32,
        )
    ) {
        let kvv = build(&pairs);
        let buf = kvv.encode(b'=', b';', 0);
        let back = KvVec::from_buf(&buf, b'=', b';');
        prop_assert_eq!(back.pairs(), kvv.pairs());
    }

    // the canonical binary separators work just as well
    #[test]
    fn roundtrips_with_binary_separators(
        pairs in prop::collection::vec(
            ("[a-z][a-z0-9_]{0,11}", "[a-z0-9 .,_-]{0,16}"),
            1..16,
        )
    ) {
        let kvv = build(&pairs);
        let buf = kvv.encode(0x00, 0x01, 7);
        let back = KvVec::from_buf(&buf, 0x00, 0x01);
        prop_assert_eq!(back.pairs(), kvv.pairs());
    }

    // after sort, adjacent pairs are non-decreasing
    #[test]
    fn sort_establishes_total_order(
        pairs in prop::collection::vec(
            ("[a-z]{1,4}", "[a-z0-9]{0,8}"),
            0..32,
        )
    ) {
        let mut kvv = build(&pairs);
        kvv.sort();
        prop_assert!(kvv.is_sorted());
        for w in kvv.pairs().windows(2) {
            prop_assert_ne!(compare_pairs(&w[0], &w[1]), std::cmp::Ordering::Greater);
        }
    }

    // sorted lookup finds the first entry with the key; absent keys miss
    #[test]
    fn sorted_lookup_finds_first_entry(
        pairs in prop::collection::vec(
            ("[a-z]{1,3}", "[a-z0-9]{0,8}"),
            1..24,
        )
    ) {
        let mut kvv = build(&pairs);
        kvv.sort();
        let probe = pairs[0].0.clone();
        let hit = kvv.fetch(probe.as_bytes()).expect("present key must be found");
        // no earlier entry carries the same key
        let first_idx = kvv
            .pairs()
            .iter()
            .position(|kv| kv.key == probe.as_bytes())
            .unwrap();
        prop_assert_eq!(&kvv.pairs()[first_idx], hit);
        prop_assert!(kvv.fetch(b"zzzz_not_there").is_none());
    }
}

#[test]
fn zero_byte_key_terminates_and_trailing_pair_is_kept() {
    // a key starting with NUL acts as a hard terminator
    let kvv = KvVec::from_buf(b"one=1;two=2;\0three=3;", b'=', b';');
    assert_eq!(kvv.len(), 2);

    // the final pair may omit its pair separator
    let kvv = KvVec::from_buf(b"one=1;two=2", b'=', b';');
    assert_eq!(kvv.len(), 2);
    assert_eq!(kvv.fetch_str("two"), Some("2"));
}

#[test]
fn empty_values_survive_the_wire() {
    let mut kvv = KvVec::new();
    kvv.push_str("empty", "");
    kvv.push_str("full", "x");
    let buf = kvv.encode(b'=', b';', 0);
    let back = KvVec::from_buf(&buf, b'=', b';');
    assert_eq!(back.fetch_str("empty"), Some(""));
    assert_eq!(back.fetch_str("full"), Some("x"));
}

#[test]
fn duplicate_keys_keep_first_on_lookup() {
    let mut kvv = KvVec::new();
    kvv.push_str("k", "second");
    kvv.push_str("a", "x");
    kvv.push_str("k", "first-after-sort");
    kvv.sort();
    // ties sort by value, so "first-after-sort" precedes "second"
    assert_eq!(
        kvv.fetch(b"k").map(|kv| kv.value.as_slice()),
        Some(&b"first-after-sort"[..])
    );
}
