//! Composite identifiers
//!
//! Some resources have no single natural key on the remote side. Their
//! identifier is synthesized by joining the constituent fields with a fixed
//! delimiter, and must split back into exactly the same fields.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Delimiter used by bucket identifiers: `objectStorageId/bucketName`
pub const BUCKET_ID_DELIMITER: char = '/';

/// Delimiter used by tag assignment identifiers: `tagId_resourceType_resourceId`
pub const TAG_ASSIGNMENT_ID_DELIMITER: char = '_';

/// Join `parts` with `delimiter`.
///
/// Empty parts and parts containing the delimiter are rejected, since the
/// result could not be decoded unambiguously.
pub fn encode(parts: &[&str], delimiter: char) -> Result<String> {
    let joined = parts.join(&delimiter.to_string());
    for part in parts {
        if part.is_empty() {
            return Err(Error::InvalidCompositeId {
                id: joined,
                reason: "identifier parts must not be empty".to_string(),
            });
        }
        if part.contains(delimiter) {
            return Err(Error::InvalidCompositeId {
                id: joined,
                reason: format!("part {:?} contains the delimiter {:?}", part, delimiter),
            });
        }
    }
    Ok(joined)
}

/// Split `id` on `delimiter` into exactly `expected` non-empty parts.
pub fn decode(id: &str, delimiter: char, expected: usize) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split(delimiter).map(str::to_string).collect();
    if parts.len() != expected {
        return Err(Error::InvalidCompositeId {
            id: id.to_string(),
            reason: format!(
                "expected {} parts separated by {:?}, found {}",
                expected,
                delimiter,
                parts.len()
            ),
        });
    }
    if parts.iter().any(String::is_empty) {
        return Err(Error::InvalidCompositeId {
            id: id.to_string(),
            reason: "identifier parts must not be empty".to_string(),
        });
    }
    Ok(parts)
}

/// Identifier of an object storage bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketId {
    pub object_storage_id: String,
    pub name: String,
}

impl BucketId {
    pub fn new(object_storage_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_storage_id: object_storage_id.into(),
            name: name.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        encode(&[&self.object_storage_id, &self.name], BUCKET_ID_DELIMITER)
    }
}

impl FromStr for BucketId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = decode(s, BUCKET_ID_DELIMITER, 2)?.into_iter();
        match (parts.next(), parts.next()) {
            (Some(object_storage_id), Some(name)) => Ok(Self {
                object_storage_id,
                name,
            }),
            _ => unreachable!("decode returned the wrong number of parts"),
        }
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.object_storage_id, BUCKET_ID_DELIMITER, self.name)
    }
}

/// Identifier of a tag assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAssignmentId {
    pub tag_id: i64,
    pub resource_type: String,
    pub resource_id: String,
}

impl TagAssignmentId {
    pub fn new(tag_id: i64, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            tag_id,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        encode(
            &[
                &self.tag_id.to_string(),
                &self.resource_type,
                &self.resource_id,
            ],
            TAG_ASSIGNMENT_ID_DELIMITER,
        )
    }
}

impl FromStr for TagAssignmentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = decode(s, TAG_ASSIGNMENT_ID_DELIMITER, 3)?;
        let tag_id = parts[0].parse::<i64>().map_err(|e| Error::InvalidCompositeId {
            id: s.to_string(),
            reason: format!("tag id {:?} is not a number: {}", parts[0], e),
        })?;
        Ok(Self {
            tag_id,
            resource_type: parts[1].clone(),
            resource_id: parts[2].clone(),
        })
    }
}

impl fmt::Display for TagAssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.tag_id,
            self.resource_type,
            self.resource_id,
            d = TAG_ASSIGNMENT_ID_DELIMITER
        )
    }
}
