//! Raw-data shrinking (spec §4.6, §9).
//!
//! The spec's size estimate subtracts a field's old serialized length and
//! adds `Buffer.byteLength("'TRUNCATED'")` (11, counting the literal
//! surrounding quote characters) while the value actually written is the
//! bare string `"TRUNCATED"`. Per §9's resolution of that discrepancy
//! ("follow the written value when assessing termination, treat the size
//! estimate as approximate"), termination here is judged by re-serializing
//! the batch after each truncation rather than trusting a running
//! estimate — correct and still guaranteed to terminate, since JSON's own
//! quoting happens to land on the same 11 bytes anyway.

use serde_json::Value;

use crate::error::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShrinkReport {
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub items_truncated: usize,
}

const TRUNCATED: &str = "TRUNCATED";

fn serialized_len<T: serde::Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Find the entity with the largest serialized form, then within it the
/// largest `_rawData` entry, then within that the largest `rawData` field
/// (spec §4.6, steps 1-3).
fn find_largest_field(batch: &[Value]) -> Option<(usize, usize, String)> {
    let mut best_entity: Option<(usize, usize)> = None;
    for (idx, entity) in batch.iter().enumerate() {
        let size = serialized_len(entity);
        if best_entity.map_or(true, |(_, best)| size > best) {
            best_entity = Some((idx, size));
        }
    }
    let (entity_idx, _) = best_entity?;

    let raw_data = batch[entity_idx].get("_rawData")?.as_array()?;
    let mut best_raw: Option<(usize, usize)> = None;
    for (idx, entry) in raw_data.iter().enumerate() {
        let size = serialized_len(entry);
        if best_raw.map_or(true, |(_, best)| size > best) {
            best_raw = Some((idx, size));
        }
    }
    let (raw_idx, _) = best_raw?;

    let raw_data_obj = raw_data[raw_idx].get("rawData")?.as_object()?;
    let mut best_field: Option<(String, usize)> = None;
    for (key, value) in raw_data_obj {
        let size = serialized_len(value);
        if best_field.as_ref().map_or(true, |(_, best)| size > *best) {
            best_field = Some((key.clone(), size));
        }
    }
    let (field_key, _) = best_field?;

    Some((entity_idx, raw_idx, field_key))
}

/// Shrink `batch` in place until its serialized size is at or below
/// `limit`. Each iteration must strictly reduce size; otherwise
/// `CANNOT_SHRINK` (spec §4.6).
pub fn shrink_batch(batch: &mut [Value], limit: usize) -> Result<ShrinkReport, UploadError> {
    let bytes_before = serialized_len(&batch);
    let mut current_len = bytes_before;
    let mut items_truncated = 0usize;

    while current_len > limit {
        let (entity_idx, raw_idx, field_key) =
            find_largest_field(batch).ok_or(UploadError::CannotShrink)?;

        let rawdata_obj = batch[entity_idx]["_rawData"][raw_idx]["rawData"]
            .as_object_mut()
            .ok_or(UploadError::CannotShrink)?;
        rawdata_obj.insert(field_key, Value::String(TRUNCATED.to_string()));

        let new_len = serialized_len(&batch);
        if new_len >= current_len {
            return Err(UploadError::CannotShrink);
        }
        current_len = new_len;
        items_truncated += 1;
    }

    Ok(ShrinkReport {
        bytes_before,
        bytes_after: current_len,
        items_truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shrinks_the_largest_field_of_the_largest_raw_data_entry() {
        let big_payload = "x".repeat(10 * 1024 * 1024);
        let mut batch = vec![json!({
            "_key": "host:1",
            "_type": "aws_host",
            "_rawData": [
                {"name": "small", "rawData": {"note": "tiny"}},
                {"name": "big", "rawData": {"payload": big_payload}},
            ],
        })];

        let report = shrink_batch(&mut batch, 1024).unwrap();
        assert!(report.bytes_after < report.bytes_before);
        assert_eq!(report.items_truncated, 1);
        assert_eq!(
            batch[0]["_rawData"][1]["rawData"]["payload"],
            Value::String(TRUNCATED.to_string())
        );
    }

    #[test]
    fn returns_cannot_shrink_when_no_raw_data_is_present() {
        let mut batch = vec![json!({"_key": "host:1", "_type": "aws_host"})];
        let err = shrink_batch(&mut batch, 1).unwrap_err();
        assert!(matches!(err, UploadError::CannotShrink));
    }
}
