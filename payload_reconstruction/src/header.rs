use serde::{Deserialize, Serialize};

/// Fragment position holding the `data:<mime>;base64,` prefix of a header-bearing group.
pub const DATA_URL_POSITION: usize = 15;

/// A group needs at least this many fragments to carry a header.
pub const MIN_HEADER_FRAGMENTS: usize = DATA_URL_POSITION + 1;

/// Mime type reported for content without a header.
pub const FALLBACK_MIME_TYPE: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Owner,
    Id,
    Serial,
    Message,
    /// Free extension slots, numbered from 1 to 10.
    Extension(u8),
}

/// Which fragment position fills which header field.
pub const HEADER_SLOTS: [(usize, HeaderField); 14] = [
    (1, HeaderField::Owner),
    (2, HeaderField::Id),
    (3, HeaderField::Serial),
    (4, HeaderField::Message),
    (5, HeaderField::Extension(1)),
    (6, HeaderField::Extension(2)),
    (7, HeaderField::Extension(3)),
    (8, HeaderField::Extension(4)),
    (9, HeaderField::Extension(5)),
    (10, HeaderField::Extension(6)),
    (11, HeaderField::Extension(7)),
    (12, HeaderField::Extension(8)),
    (13, HeaderField::Extension(9)),
    (14, HeaderField::Extension(10)),
];

/// The descriptive fields stored ahead of the content in the lowest keyed group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructedHeader {
    pub mime_type: String,
    pub owner: String,
    pub id: String,
    pub serial: String,
    pub message: String,
    #[serde(rename = "extension_1")]
    pub extension_1: String,
    #[serde(rename = "extension_2")]
    pub extension_2: String,
    #[serde(rename = "extension_3")]
    pub extension_3: String,
    #[serde(rename = "extension_4")]
    pub extension_4: String,
    #[serde(rename = "extension_5")]
    pub extension_5: String,
    #[serde(rename = "extension_6")]
    pub extension_6: String,
    #[serde(rename = "extension_7")]
    pub extension_7: String,
    #[serde(rename = "extension_8")]
    pub extension_8: String,
    #[serde(rename = "extension_9")]
    pub extension_9: String,
    #[serde(rename = "extension_10")]
    pub extension_10: String,
    /// Length of the reassembled payload in bytes.
    pub size: usize,
}

impl ReconstructedHeader {
    /// The header of content that does not follow the header layout.
    pub fn plain_text() -> Self {
        Self {
            mime_type: FALLBACK_MIME_TYPE.to_owned(),
            ..Default::default()
        }
    }

    /// Fill the header from the decoded fragments of a header-bearing group.
    ///
    /// Positions missing from `decoded` leave their field empty.
    pub fn from_slots(mime_type: impl Into<String>, decoded: &[Vec<u8>]) -> Self {
        let mut header = Self {
            mime_type: mime_type.into(),
            ..Default::default()
        };

        for (position, field) in HEADER_SLOTS {
            if let Some(bytes) = decoded.get(position) {
                *header.field_mut(field) = String::from_utf8_lossy(bytes).into_owned();
            }
        }
        header
    }

    pub fn field(&self, field: HeaderField) -> &str {
        match field {
            HeaderField::Owner => &self.owner,
            HeaderField::Id => &self.id,
            HeaderField::Serial => &self.serial,
            HeaderField::Message => &self.message,
            HeaderField::Extension(1) => &self.extension_1,
            HeaderField::Extension(2) => &self.extension_2,
            HeaderField::Extension(3) => &self.extension_3,
            HeaderField::Extension(4) => &self.extension_4,
            HeaderField::Extension(5) => &self.extension_5,
            HeaderField::Extension(6) => &self.extension_6,
            HeaderField::Extension(7) => &self.extension_7,
            HeaderField::Extension(8) => &self.extension_8,
            HeaderField::Extension(9) => &self.extension_9,
            HeaderField::Extension(_) => &self.extension_10,
        }
    }

    fn field_mut(&mut self, field: HeaderField) -> &mut String {
        match field {
            HeaderField::Owner => &mut self.owner,
            HeaderField::Id => &mut self.id,
            HeaderField::Serial => &mut self.serial,
            HeaderField::Message => &mut self.message,
            HeaderField::Extension(1) => &mut self.extension_1,
            HeaderField::Extension(2) => &mut self.extension_2,
            HeaderField::Extension(3) => &mut self.extension_3,
            HeaderField::Extension(4) => &mut self.extension_4,
            HeaderField::Extension(5) => &mut self.extension_5,
            HeaderField::Extension(6) => &mut self.extension_6,
            HeaderField::Extension(7) => &mut self.extension_7,
            HeaderField::Extension(8) => &mut self.extension_8,
            HeaderField::Extension(9) => &mut self.extension_9,
            HeaderField::Extension(_) => &mut self.extension_10,
        }
    }
}
