//! IMU telemetry records and the XML payload decoder
//!
//! The camera streams each IMU sample as a small XML document:
//!
//! ```text
//! <Function><Timestamp>1200345</Timestamp><GyroX>-12</GyroX>...</Function>
//! ```
//!
//! Every immediate child of the `<Function>` container is a named field
//! holding decimal integer text. Timestamps are microseconds since the
//! camera was switched on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

/// Root element that wraps the IMU fields
pub const CONTAINER_TAG: &str = "Function";

/// One decoded datagram: field name → value, iterated in lexicographic order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImuRecord(BTreeMap<String, i64>);

impl ImuRecord {
    pub fn get(&self, field: &str) -> Option<i64> {
        self.0.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, i64)> for ImuRecord {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ImuRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field, value)?;
        }
        Ok(())
    }
}

/// A non-empty record as it leaves the receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuSample {
    /// Datagram sender (informational, never used for filtering)
    pub source: SocketAddr,
    /// Local reception time
    pub received_at: DateTime<Utc>,
    pub fields: ImuRecord,
}

/// Decode one telemetry datagram.
///
/// Malformed XML and non-integer field text are errors. A well-formed
/// document without a `<Function>` root decodes to an empty record.
pub fn decode_payload(payload: &[u8]) -> anyhow::Result<ImuRecord> {
    let text = payload_text(payload);

    let doc = roxmltree::Document::parse(&text)
        .map_err(|e| anyhow::anyhow!("XML parse error: {}", e))?;

    let root = doc.root_element();
    if root.tag_name().name() != CONTAINER_TAG {
        return Ok(ImuRecord::default());
    }

    let mut fields = BTreeMap::new();
    for child in root.children().filter(|n| n.is_element()) {
        let Some(value) = child.text().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        let name = child.tag_name().name();
        let parsed = value
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("Field <{}> has non-integer value {:?}: {}", name, value, e))?;
        fields.insert(name.to_string(), parsed);
    }

    Ok(ImuRecord(fields))
}

/// Text up to the first NUL, lossily decoded and trimmed
fn payload_text(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_gyro_and_accel() {
        let record =
            decode_payload(b"<Function><Gyro>123</Gyro><Accel>456</Accel></Function>").unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Gyro"), Some(123));
        assert_eq!(record.get("Accel"), Some(456));
    }

    #[test]
    fn test_decode_full_sample() {
        let payload = br#"<?xml version="1.0" encoding="UTF-8"?>
            <Function>
                <Timestamp>9223372036854775807</Timestamp>
                <GyroX>-32768</GyroX>
                <GyroY>+17</GyroY>
                <AccelZ>  4096 </AccelZ>
            </Function>
        "#;

        let record = decode_payload(payload).unwrap();
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["AccelZ", "GyroX", "GyroY", "Timestamp"]);
        assert_eq!(record.get("Timestamp"), Some(i64::MAX));
        assert_eq!(record.get("GyroX"), Some(-32768));
        assert_eq!(record.get("GyroY"), Some(17));
        assert_eq!(record.get("AccelZ"), Some(4096));
    }

    #[test]
    fn test_empty_container_is_empty_record() {
        let record = decode_payload(b"<Function></Function>").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_other_root_is_empty_record() {
        let record = decode_payload(b"<Status><Gyro>1</Gyro></Status>").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_fields_without_text_are_skipped() {
        let record = decode_payload(b"<Function><Gyro/><Accel></Accel><Temp>21</Temp></Function>")
            .unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Temp"), Some(21));
    }

    #[test]
    fn test_duplicate_field_last_wins() {
        let record = decode_payload(b"<Function><Gyro>1</Gyro><Gyro>2</Gyro></Function>").unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Gyro"), Some(2));
    }

    #[test]
    fn test_not_xml_fails() {
        assert!(decode_payload(b"not xml").is_err());
        assert!(decode_payload(b"").is_err());
        assert!(decode_payload(b"<Function><Gyro>1</Gyro>").is_err());
    }

    #[test]
    fn test_non_integer_field_fails() {
        assert!(decode_payload(b"<Function><Gyro>1.5</Gyro></Function>").is_err());
        assert!(decode_payload(b"<Function><Gyro>12abc</Gyro></Function>").is_err());
        assert!(decode_payload(b"<Function><Gyro>99999999999999999999</Gyro></Function>").is_err());
    }

    #[test]
    fn test_trailing_nul_and_garbage_ignored() {
        let mut payload = b"<Function><Gyro>7</Gyro></Function>".to_vec();
        payload.push(0);
        payload.extend_from_slice(b"\xff\xfe leftover");

        let record = decode_payload(&payload).unwrap();
        assert_eq!(record.get("Gyro"), Some(7));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let full = b"<Function><Gyro>123</Gyro><Accel>456</Accel></Function>";
        assert!(decode_payload(&full[..30]).is_err());
    }

    #[test]
    fn test_display_is_ordered() {
        let record: ImuRecord = [("Gyro".to_string(), 123), ("Accel".to_string(), 456)]
            .into_iter()
            .collect();
        assert_eq!(record.to_string(), "Accel: 456, Gyro: 123");
    }
}
