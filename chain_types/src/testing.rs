//! Builders for synthetic records, shared by the test suites of the fetch and reassembly crates.

use crate::{AGGREGATE_COMPLETE_TYPE, Fragment, FragmentEntry, RawRecord, RecordBody, RecordMeta, TRANSFER_TYPE};

/// Hex encode `content` behind a zero type tag, the way message payloads are stored.
pub fn encode_fragment(content: impl AsRef<[u8]>) -> String {
    format!("00{}", hex::encode_upper(content))
}

/// A deterministic, unique content hash for a synthetic record.
pub fn record_hash(seed: u64) -> String {
    format!("{:064X}", seed.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// A fixed-width record id, so lexical and numeric order agree.
pub fn record_id(seed: u64) -> String {
    format!("{seed:024X}")
}

pub fn transfer_fragment(message: Option<String>) -> Fragment {
    Fragment {
        fragment_type: Some(TRANSFER_TYPE),
        message,
    }
}

/// An aggregate holding the given fragments.
pub fn aggregate_with_fragments(seed: u64, fragments: Vec<Fragment>) -> RawRecord {
    RawRecord {
        id: Some(record_id(seed)),
        meta: RecordMeta {
            hash: Some(record_hash(seed)),
            height: Some(1000 + seed),
            timestamp: Some((seed * 15_000).to_string()),
        },
        transaction: RecordBody {
            record_type: Some(AGGREGATE_COMPLETE_TYPE),
            transactions: fragments.into_iter().map(|transaction| FragmentEntry { transaction }).collect(),
        },
    }
}

/// An aggregate whose first fragment carries `key` as decimal text, followed by one fragment per part.
pub fn aggregate_record(key: u64, parts: &[&str]) -> RawRecord {
    aggregate_with_seed(key, key, parts)
}

/// Like [`aggregate_record`], with the record identity taken from `seed` instead of the key.  Used to
/// build several records that claim the same key.
pub fn aggregate_with_seed(seed: u64, key: u64, parts: &[&str]) -> RawRecord {
    let fragments = std::iter::once(key.to_string().as_str())
        .chain(parts.iter().copied())
        .map(|text| transfer_fragment(Some(encode_fragment(text))))
        .collect::<Vec<_>>();

    aggregate_with_fragments(seed, fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(encode_fragment("1"), "0031");
        assert_ne!(record_hash(1), record_hash(2));
        assert!(record_id(9) < record_id(10));

        let record = aggregate_record(7, &["ab", "cd"]);
        assert_eq!(record.fragments().len(), 3);
        assert_eq!(record.fragments().next().unwrap().message.as_deref(), Some("0037"));
        assert!(record.contains_fragment_type(TRANSFER_TYPE));
    }
}
