use serde::{Deserialize, Deserializer, Serialize};

/// One page of the record index. A missing `data` field is an empty page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub data: Vec<RawRecord>,
}

/// The full body of a confirmed record as served by a replica.
///
/// Only the fields read by the fetch and reassembly path are modelled; everything else in the
/// upstream document is ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub transaction: RecordBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64", skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<FragmentEntry>,
}

/// One inner entry of an aggregate. Position within `RecordBody::transactions` is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentEntry {
    #[serde(default)]
    pub transaction: Fragment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fragment_type: Option<u16>,
    /// Hex encoded: a one byte type tag followed by the content bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RawRecord {
    pub fn content_hash(&self) -> Option<&str> {
        self.meta.hash.as_deref()
    }

    /// The ordered inner entries; empty for records that are not aggregates.
    pub fn fragments(&self) -> impl ExactSizeIterator<Item = &Fragment> {
        self.transaction.transactions.iter().map(|e| &e.transaction)
    }

    pub fn contains_fragment_type(&self, fragment_type: u16) -> bool {
        self.fragments().any(|f| f.fragment_type == Some(fragment_type))
    }

    /// The enumeration view of this record, if it carries a content hash.
    pub fn to_record_ref(&self) -> Option<RecordRef> {
        Some(RecordRef {
            content_hash: self.meta.hash.clone()?,
            record_id: self.id.clone(),
            height: self.meta.height,
            timestamp: self.meta.timestamp.clone(),
        })
    }
}

/// A record located by enumeration, uniquely identified by its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub content_hash: String,
    pub record_id: Option<String>,
    pub height: Option<u64>,
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn de_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<NumberOrString>::deserialize(deserializer)?.map(|v| match v {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{AGGREGATE_COMPLETE_TYPE, TRANSFER_TYPE};

    #[test]
    fn test_parse_upstream_aggregate() {
        let body = json!({
            "id": "66A1B2C3D4E5F60718293A4B",
            "meta": {"hash": "ABCD", "height": "1234567", "timestamp": "99887766", "index": 0},
            "transaction": {
                "type": 16705,
                "version": 2,
                "transactions": [
                    {"meta": {"index": 0}, "transaction": {"type": 16724, "message": "0031"}},
                    {"transaction": {"type": 16724}}
                ]
            }
        });

        let record: RawRecord = serde_json::from_value(body).unwrap();
        assert_eq!(record.content_hash(), Some("ABCD"));
        assert_eq!(record.meta.height, Some(1_234_567));
        assert_eq!(record.meta.timestamp.as_deref(), Some("99887766"));
        assert_eq!(record.transaction.record_type, Some(AGGREGATE_COMPLETE_TYPE));
        assert_eq!(record.fragments().len(), 2);
        assert!(record.contains_fragment_type(TRANSFER_TYPE));
        assert_eq!(record.fragments().nth(1).unwrap().message, None);

        let record_ref = record.to_record_ref().unwrap();
        assert_eq!(record_ref.record_id.as_deref(), Some("66A1B2C3D4E5F60718293A4B"));
    }

    #[test]
    fn test_numeric_height_and_missing_data() {
        let record: RawRecord = serde_json::from_value(json!({"meta": {"hash": "X", "height": 7, "timestamp": 8}})).unwrap();
        assert_eq!(record.meta.height, Some(7));
        assert_eq!(record.meta.timestamp.as_deref(), Some("8"));
        assert_eq!(record.fragments().len(), 0);

        let page: RecordPage = serde_json::from_value(json!({"pagination": {"pageNumber": 1}})).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_record_without_hash_has_no_ref() {
        assert!(RawRecord::default().to_record_ref().is_none());
    }
}
