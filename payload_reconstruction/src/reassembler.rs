use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chain_config::{ReconstructionConfig, chain_config};
use chain_types::RawRecord;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ReconstructionError, Result};
use crate::fragment_decoder::try_decode_fragment;
use crate::header::{DATA_URL_POSITION, MIN_HEADER_FRAGMENTS, ReconstructedHeader};
use crate::report::{DecodeFailure, DuplicateRecord, GapAnalysis, ReconstructionReport, RejectedRecord};

lazy_static! {
    static ref DATA_URL_PREFIX: Regex = Regex::new(r"(?-u)^data:([^;]+);base64,(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembleOptions {
    /// Inner entry type that marks an aggregate as part of the payload.
    pub transfer_type: u16,
    pub analyze_gaps: bool,
    pub max_reported_missing_keys: usize,
    pub duplicate_preview_chars: usize,
    /// Log every group as it is placed.
    pub debug: bool,
}

impl ReassembleOptions {
    pub fn from_config(config: &ReconstructionConfig) -> Self {
        Self {
            transfer_type: config.transfer_type,
            analyze_gaps: config.analyze_gaps,
            max_reported_missing_keys: config.max_reported_missing_keys,
            duplicate_preview_chars: config.duplicate_preview_chars,
            debug: false,
        }
    }

    pub fn with_gap_analysis(mut self, analyze_gaps: bool) -> Self {
        self.analyze_gaps = analyze_gaps;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for ReassembleOptions {
    fn default() -> Self {
        Self::from_config(&chain_config().reconstruction)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedPayload {
    pub header: ReconstructedHeader,
    pub payload: Vec<u8>,
    pub report: ReconstructionReport,
    /// Offset of the base64 body within `payload`, for header-bearing content.
    body_start: Option<usize>,
}

impl ReconstructedPayload {
    /// For header-bearing content, the bytes after the `data:<mime>;base64,` prefix.
    pub fn data_url_body(&self) -> Option<&[u8]> {
        self.payload.get(self.body_start?..)
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// A record that carries payload fragments, with every fragment decoded.
struct ChunkGroup<'a> {
    index: usize,
    record: &'a RawRecord,
    decoded: Vec<Vec<u8>>,
}

impl ChunkGroup<'_> {
    fn sequence_key(&self) -> std::result::Result<u64, String> {
        let first = self.decoded.first().map(Vec::as_slice).unwrap_or_default();
        let text = String::from_utf8_lossy(first);
        text.trim()
            .parse()
            .map_err(|_| format!("non-numeric sequence key {:?}", text.as_ref()))
    }

    fn preview(&self, chars: usize) -> String {
        let content: Vec<u8> = self.decoded.iter().skip(1).flatten().copied().collect();
        String::from_utf8_lossy(&content).chars().take(chars).collect()
    }

    /// The mime type and the offset of the base64 body within the data URL fragment, if this group
    /// follows the header layout.
    fn data_url_prefix(&self) -> Option<(String, usize)> {
        if self.decoded.len() < MIN_HEADER_FRAGMENTS {
            return None;
        }
        let captures = DATA_URL_PREFIX.captures(&self.decoded[DATA_URL_POSITION])?;
        let mime_type = String::from_utf8_lossy(captures.get(1)?.as_bytes()).into_owned();
        Some((mime_type, captures.get(2)?.start()))
    }

    fn append_from(&self, position: usize, out: &mut Vec<u8>) {
        for bytes in self.decoded.iter().skip(position) {
            out.extend_from_slice(bytes);
        }
    }
}

/// Rebuilds a payload from the records it was split across.
///
/// Each aggregate that carries payload fragments is one group.  Its first fragment holds a decimal sequence
/// key, and groups are concatenated in ascending key order whatever order the records arrive in.  When two
/// groups claim the same key the first one seen is kept and the other is reported.  If the lowest keyed
/// group has a `data:<mime>;base64,` prefix at position 15, positions 1 to 14 of that group are header
/// fields and its content starts at position 15; otherwise every group contributes from position 1.
pub struct Reassembler {
    options: ReassembleOptions,
}

impl Reassembler {
    pub fn new(options: ReassembleOptions) -> Self {
        Self { options }
    }

    #[instrument(skip_all, name = "Reassembler::reassemble", fields(records = records.len()))]
    pub fn reassemble(&self, records: &[RawRecord]) -> Result<ReconstructedPayload> {
        let options = &self.options;
        let mut report = ReconstructionReport {
            records_received: records.len(),
            ..Default::default()
        };

        let mut groups: BTreeMap<u64, ChunkGroup> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            if !record.contains_fragment_type(options.transfer_type) {
                continue;
            }
            report.aggregates_found += 1;

            let group = self.decode_group(index, record, &mut report.decode_failures);

            let key = match group.sequence_key() {
                Ok(key) => key,
                Err(reason) => {
                    warn!(index, hash = ?record.content_hash(), "Discarding aggregate: {reason}");
                    report.rejected_records.push(RejectedRecord {
                        index,
                        content_hash: record.content_hash().map(str::to_owned),
                        reason,
                    });
                    continue;
                },
            };

            match groups.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(group);
                },
                Entry::Occupied(kept) => {
                    warn!(key, index, kept_index = kept.get().index, "Duplicate sequence key; keeping the first");
                    report.duplicates_discarded.push(DuplicateRecord {
                        key,
                        discarded_at: index,
                        content_hash: record.content_hash().map(str::to_owned),
                        preview: group.preview(options.duplicate_preview_chars),
                    });
                },
            }
        }

        let Some(first) = groups.values().next() else {
            return Err(ReconstructionError::EmptyInput { records: records.len() });
        };

        let prefix = first.data_url_prefix();
        report.header_detected = prefix.is_some();
        let (mut header, body_start) = match prefix {
            Some((mime_type, body_start)) => (ReconstructedHeader::from_slots(mime_type, &first.decoded), Some(body_start)),
            None => (ReconstructedHeader::plain_text(), None),
        };

        let mut payload = Vec::new();
        for (position, (key, group)) in groups.iter().enumerate() {
            let start = if position == 0 && report.header_detected {
                DATA_URL_POSITION
            } else {
                1
            };
            let before = payload.len();
            group.append_from(start, &mut payload);

            if options.debug {
                info!(key, index = group.index, hash = ?group.record.content_hash(), bytes = payload.len() - before, "Placed group");
            }
        }

        header.size = payload.len();
        report.groups_used = groups.len();

        if options.analyze_gaps {
            let keys: Vec<u64> = groups.keys().copied().collect();
            report.gap_analysis = GapAnalysis::from_sorted_keys(&keys, options.max_reported_missing_keys);
        }

        info!(
            groups = report.groups_used,
            bytes = header.size,
            mime_type = %header.mime_type,
            duplicates = report.duplicates_discarded.len(),
            rejected = report.rejected_records.len(),
            decode_failures = report.decode_failures.len(),
            "Reassembly complete"
        );

        Ok(ReconstructedPayload {
            header,
            payload,
            report,
            body_start,
        })
    }

    fn decode_group<'a>(&self, index: usize, record: &'a RawRecord, failures: &mut Vec<DecodeFailure>) -> ChunkGroup<'a> {
        let decoded = record
            .fragments()
            .enumerate()
            .map(|(position, fragment)| {
                let payload = fragment.message.as_deref().unwrap_or_default();
                try_decode_fragment(payload).unwrap_or_else(|e| {
                    debug!(index, position, "Fragment decodes to nothing: {e}");
                    failures.push(DecodeFailure {
                        record_index: index,
                        content_hash: record.content_hash().map(str::to_owned),
                        position,
                        error: e.to_string(),
                    });
                    Vec::new()
                })
            })
            .collect();

        ChunkGroup { index, record, decoded }
    }
}

/// Reassemble `records` with the given options.
pub fn reassemble(records: &[RawRecord], options: &ReassembleOptions) -> Result<ReconstructedPayload> {
    Reassembler::new(options.clone()).reassemble(records)
}
