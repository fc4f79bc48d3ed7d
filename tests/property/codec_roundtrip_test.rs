//! Property-based tests for the datastore codec.
//!
//! Any collection the store can build encodes to bytes that decode back to an
//! equal collection, and any truncation or single-bit corruption of those
//! bytes is rejected instead of producing a partial collection.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use shaare_store::datastore::{decode, encode};
use shaare_store::types::bookmark::BookmarkDraft;
use shaare_store::types::collection::BookmarkCollection;

/// Strategy for drafts with free-form text, including non-ASCII and quotes.
fn arb_draft() -> impl Strategy<Value = BookmarkDraft> {
    (
        proptest::option::of("https://[a-z]{3,10}\\.(org|net)/[a-z0-9/]{0,12}"),
        "\\PC{0,40}",
        "\\PC{0,120}",
        proptest::collection::vec("[a-zA-Z.][a-zA-Z0-9_]{0,10}", 0..5),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(url, title, description, tags, private, sticky)| {
            BookmarkDraft::new(&url.unwrap_or_default(), &title)
                .with_description(&description)
                .with_tags(tags)
                .private(private)
                .sticky(sticky)
        })
}

/// Collections built by inserting drafts and deleting some of them again.
fn arb_collection() -> impl Strategy<Value = BookmarkCollection> {
    (
        proptest::collection::vec(arb_draft(), 0..15),
        proptest::collection::vec(any::<bool>(), 15),
    )
        .prop_map(|(drafts, deleted)| {
            let base = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
            let mut collection = BookmarkCollection::new();
            for (i, draft) in drafts.into_iter().enumerate() {
                collection.insert_draft(draft, base + Duration::minutes(i as i64 * 37));
            }
            for (id, gone) in (1u64..).zip(deleted) {
                if gone {
                    collection.remove(id);
                }
            }
            collection
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn encode_then_decode_is_identity(collection in arb_collection()) {
        let bytes = encode(&collection).expect("store-built collections always encode");
        let decoded = decode(&bytes).expect("encoded bytes always decode");
        prop_assert_eq!(&decoded, &collection);
        prop_assert_eq!(decoded.next_id, collection.next_id);
    }

    #[test]
    fn truncated_bytes_are_rejected(
        collection in arb_collection(),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = encode(&collection).unwrap();
        let keep = cut.index(bytes.len());
        prop_assert!(
            decode(&bytes[..keep]).is_err(),
            "prefix of {} out of {} bytes decoded",
            keep,
            bytes.len()
        );
    }

    #[test]
    fn flipped_bit_is_rejected(
        collection in arb_collection(),
        at in any::<prop::sample::Index>(),
    ) {
        let mut bytes = encode(&collection).unwrap();
        let pos = at.index(bytes.len());
        bytes[pos] ^= 0x01;
        prop_assert!(decode(&bytes).is_err(), "flip at byte {} went unnoticed", pos);
    }
}
