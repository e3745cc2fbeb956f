// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Record types.
//!
//! [`Record`] is what gets persisted. [`NewRecord`] and [`RecordPatch`] are the
//! only shapes callers can hand to the store; neither carries an `id`, so a
//! caller can never choose or overwrite one.

use crate::error::{Result, StoreError};
use crate::id::RecordId;
use serde::{Deserialize, Serialize};

/// One persisted person record.
///
/// Field order here is the key order of both on-disk encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub middlename: String,
    pub address: String,
    pub idnumber: String,
    /// Data URL, e.g. `data:image/png;base64,...`.
    #[serde(default)]
    pub photo: String,
}

impl Record {
    pub fn text_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("firstname", self.firstname.as_str()),
            ("lastname", self.lastname.as_str()),
            ("middlename", self.middlename.as_str()),
            ("address", self.address.as_str()),
            ("idnumber", self.idnumber.as_str()),
            ("photo", self.photo.as_str()),
        ]
    }

    pub fn from_new(id: RecordId, fields: NewRecord) -> Self {
        Self {
            id,
            firstname: fields.firstname,
            lastname: fields.lastname,
            middlename: fields.middlename.unwrap_or_default(),
            address: fields.address,
            idnumber: fields.idnumber,
            photo: fields.photo.unwrap_or_default(),
        }
    }

    /// Overwrite every field present in `patch`. `id` is untouched.
    pub fn apply(&mut self, patch: RecordPatch) {
        let RecordPatch {
            firstname,
            lastname,
            middlename,
            address,
            idnumber,
            photo,
        } = patch;

        if let Some(v) = firstname {
            self.firstname = v;
        }
        if let Some(v) = lastname {
            self.lastname = v;
        }
        if let Some(v) = middlename {
            self.middlename = v;
        }
        if let Some(v) = address {
            self.address = v;
        }
        if let Some(v) = idnumber {
            self.idnumber = v;
        }
        if let Some(v) = photo {
            self.photo = v;
        }
    }
}

/// Create payload. Unknown keys, including `id`, are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub firstname: String,
    pub lastname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middlename: Option<String>,
    pub address: String,
    pub idnumber: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Partial update. `None` leaves the stored value as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middlename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idnumber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl NewRecord {
    pub fn validate(&self) -> Result<()> {
        check_text("firstname", &self.firstname)?;
        check_text("lastname", &self.lastname)?;
        check_text("middlename", self.middlename.as_deref().unwrap_or_default())?;
        check_text("address", &self.address)?;
        check_text("idnumber", &self.idnumber)?;
        check_text("photo", self.photo.as_deref().unwrap_or_default())
    }
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("middlename", &self.middlename),
            ("address", &self.address),
            ("idnumber", &self.idnumber),
            ("photo", &self.photo),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                check_text(name, v)?;
            }
        }
        Ok(())
    }
}

/// Characters allowed in XML 1.0 documents.
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Reject text the tree encoding could not carry. JSON would accept it, so
/// the two encodings would stop describing the same collection.
pub fn check_text(field: &'static str, value: &str) -> Result<()> {
    match value.char_indices().find(|(_, c)| !is_xml_char(*c)) {
        Some((pos, c)) => Err(StoreError::InvalidField {
            field,
            reason: format!("character U+{:04X} at byte {} cannot be stored", c as u32, pos),
        }),
        None => Ok(()),
    }
}
