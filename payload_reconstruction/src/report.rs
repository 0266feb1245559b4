use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    pub min: u64,
    pub max: u64,
}

/// Coverage of the sequence keys between the lowest and highest key seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub is_complete: bool,
    /// `present / (max - min + 1) * 100`, rounded to two decimals.
    pub completeness_percentage: f64,
    /// The absent keys in ascending order, truncated to the configured limit.
    pub missing_sequence_keys: Vec<u64>,
    pub missing_key_count: u64,
    pub sequence_range: SequenceRange,
}

impl GapAnalysis {
    /// Analyze a strictly ascending key sequence. Returns `None` for an empty one.
    pub fn from_sorted_keys(keys: &[u64], max_reported: usize) -> Option<Self> {
        let (&min, &max) = (keys.first()?, keys.last()?);

        let span = u128::from(max - min) + 1;
        let present = keys.len() as u128;
        let missing_key_count = u64::try_from(span - present).unwrap_or(u64::MAX);

        let mut missing_sequence_keys = Vec::new();
        'gaps: for pair in keys.windows(2) {
            for key in pair[0] + 1..pair[1] {
                if missing_sequence_keys.len() >= max_reported {
                    break 'gaps;
                }
                missing_sequence_keys.push(key);
            }
        }

        let percentage = present as f64 / span as f64 * 100.;

        Some(Self {
            is_complete: missing_key_count == 0,
            completeness_percentage: (percentage * 100.).round() / 100.,
            missing_sequence_keys,
            missing_key_count,
            sequence_range: SequenceRange { min, max },
        })
    }
}

/// A record whose sequence key was already taken by an earlier record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub key: u64,
    /// Position of the discarded record in the input.
    pub discarded_at: usize,
    pub content_hash: Option<String>,
    /// The first decoded characters of the discarded content.
    pub preview: String,
}

/// A record dropped before ordering, e.g. because its key is not a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub index: usize,
    pub content_hash: Option<String>,
    pub reason: String,
}

/// A fragment whose payload could not be decoded and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeFailure {
    pub record_index: usize,
    pub content_hash: Option<String>,
    pub position: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructionReport {
    pub records_received: usize,
    /// Records that carry payload fragments.
    pub aggregates_found: usize,
    /// Groups that made it into the payload.
    pub groups_used: usize,
    pub header_detected: bool,
    /// Present unless gap analysis was turned off.
    pub gap_analysis: Option<GapAnalysis>,
    pub duplicates_discarded: Vec<DuplicateRecord>,
    pub rejected_records: Vec<RejectedRecord>,
    pub decode_failures: Vec<DecodeFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_detection() {
        let gaps = GapAnalysis::from_sorted_keys(&[1, 2, 4, 5], 100).unwrap();
        assert_eq!(gaps.missing_sequence_keys, [3]);
        assert_eq!(gaps.missing_key_count, 1);
        assert_eq!(gaps.completeness_percentage, 80.);
        assert!(!gaps.is_complete);
        assert_eq!(gaps.sequence_range, SequenceRange { min: 1, max: 5 });
    }

    #[test]
    fn test_complete_and_single() {
        let gaps = GapAnalysis::from_sorted_keys(&[7, 8, 9], 100).unwrap();
        assert!(gaps.is_complete);
        assert_eq!(gaps.completeness_percentage, 100.);

        let gaps = GapAnalysis::from_sorted_keys(&[42], 100).unwrap();
        assert!(gaps.is_complete);
        assert_eq!(gaps.sequence_range, SequenceRange { min: 42, max: 42 });

        assert!(GapAnalysis::from_sorted_keys(&[], 100).is_none());
    }

    #[test]
    fn test_rounding_and_cap() {
        let gaps = GapAnalysis::from_sorted_keys(&[0, 2], 100).unwrap();
        assert_eq!(gaps.completeness_percentage, 66.67);

        let gaps = GapAnalysis::from_sorted_keys(&[0, 1_000_000, u64::MAX], 5).unwrap();
        assert_eq!(gaps.missing_sequence_keys, [1, 2, 3, 4, 5]);
        assert_eq!(gaps.missing_key_count, u64::MAX - 2);
        assert_eq!(gaps.completeness_percentage, 0.);
    }

    #[test]
    fn test_report_field_names() {
        let value = serde_json::to_value(GapAnalysis::from_sorted_keys(&[1, 3], 10).unwrap()).unwrap();
        assert_eq!(value["isComplete"], false);
        assert_eq!(value["missingSequenceKeys"], serde_json::json!([2]));
        assert_eq!(value["sequenceRange"]["max"], 3);
    }
}
