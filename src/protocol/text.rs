//! Text-framed record parsing
//!
//! Datagrams carry batches of newline-terminated CSV records, but the batch
//! boundary is not aligned to the record boundary - a record may be split
//! across two datagrams. The parser keeps the trailing unterminated fragment
//! and prepends it to the next payload.

use super::TextSchema;
use crate::types::SensorSample;

/// Fragments longer than this cannot be a real record tail and are dropped
/// to bound memory if the stream desynchronizes.
const MAX_FRAGMENT_LEN: usize = 256;

/// Stateful parser for newline-terminated CSV record streams.
pub struct TextFrameParser {
    schema: TextSchema,
    fragment: String,
}

impl TextFrameParser {
    /// Create a parser accepting the given schema
    pub fn new(schema: TextSchema) -> Self {
        Self {
            schema,
            fragment: String::new(),
        }
    }

    /// Feed one datagram payload, returning every complete record in order.
    ///
    /// Malformed records (wrong field count, non-integer field) are dropped
    /// per record and never abort the batch.
    pub fn push(&mut self, payload: &[u8]) -> Vec<SensorSample> {
        self.fragment.push_str(&String::from_utf8_lossy(payload));

        let buffer = std::mem::take(&mut self.fragment);
        let mut rest = buffer.as_str();
        let mut samples = Vec::new();

        while let Some(pos) = rest.find('\n') {
            let (line, tail) = rest.split_at(pos);
            rest = &tail[1..];

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_record(line, self.schema) {
                Some(sample) => samples.push(sample),
                None => log::debug!("Dropped malformed record: {:?}", line),
            }
        }

        self.fragment = rest.to_string();
        if self.fragment.len() > MAX_FRAGMENT_LEN {
            log::warn!(
                "Discarding oversized record fragment ({} bytes)",
                self.fragment.len()
            );
            self.fragment.clear();
        }

        samples
    }

    /// The unterminated tail held over for the next datagram
    pub fn leftover(&self) -> &str {
        &self.fragment
    }
}

/// Parse one CSV line into a sample, `None` if it does not match an
/// accepted schema or any field fails to parse.
fn parse_record(line: &str, schema: TextSchema) -> Option<SensorSample> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !schema.accepts(fields.len()) {
        return None;
    }

    let int = |s: &str| s.parse::<i32>().ok();
    let gyro = [int(fields[0])?, int(fields[1])?, int(fields[2])?];

    match fields.len() {
        4 => Some(SensorSample::gyro_only(gyro, fields[3].parse().ok()?)),
        6 => {
            let accel = [int(fields[3])?, int(fields[4])?, int(fields[5])?];
            Some(SensorSample {
                gyro,
                accel: Some(accel),
                timestamp: None,
            })
        }
        7 => {
            let accel = [int(fields[3])?, int(fields[4])?, int(fields[5])?];
            Some(SensorSample::full(gyro, accel, fields[6].parse().ok()?))
        }
        _ => None,
    }
}

/// Re-serialize a sample to its original CSV field layout (no terminator).
///
/// Feeds the CSV export path; for any parsed record this reproduces the
/// source integers exactly.
pub fn format_record(sample: &SensorSample) -> String {
    let [gx, gy, gz] = sample.gyro;
    match (sample.accel, sample.timestamp) {
        (Some([ax, ay, az]), Some(ts)) => format!("{gx},{gy},{gz},{ax},{ay},{az},{ts}"),
        (Some([ax, ay, az]), None) => format!("{gx},{gy},{gz},{ax},{ay},{az}"),
        (None, Some(ts)) => format!("{gx},{gy},{gz},{ts}"),
        (None, None) => format!("{gx},{gy},{gz}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batched_datagram_parses_in_order() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(b"12,-5,300,1001\n8,-4,298,1002\n");

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], SensorSample::gyro_only([12, -5, 300], 1001));
        assert_eq!(samples[1], SensorSample::gyro_only([8, -4, 298], 1002));
        assert!(parser.leftover().is_empty());
    }

    #[test]
    fn test_record_split_across_datagrams() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);

        let first = parser.push(b"1,2,3,100\n4,5,");
        assert_eq!(first.len(), 1);
        assert_eq!(parser.leftover(), "4,5,");

        let second = parser.push(b"6,200\n");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0], SensorSample::gyro_only([4, 5, 6], 200));
        assert!(parser.leftover().is_empty());
    }

    #[test]
    fn test_malformed_records_dropped_silently() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(b"1,2,3,100\nnot,a,number,x\n1,2\n4,5,6,200\n");

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].gyro, [1, 2, 3]);
        assert_eq!(samples[1].gyro, [4, 5, 6]);
    }

    #[test]
    fn test_seven_field_schema() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(b"1,2,3,4,5,6,700\n");

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], SensorSample::full([1, 2, 3], [4, 5, 6], 700));
    }

    #[test]
    fn test_six_field_schema_has_no_timestamp() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(b"1,2,3,4,5,6\n");

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].accel, Some([4, 5, 6]));
        assert!(samples[0].timestamp.is_none());
    }

    #[test]
    fn test_pinned_schema_rejects_other_counts() {
        let mut parser = TextFrameParser::new(TextSchema::GyroTimestamp);
        let samples = parser.push(b"1,2,3,4,5,6,700\n1,2,3,100\n");

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], SensorSample::gyro_only([1, 2, 3], 100));
    }

    #[test]
    fn test_round_trip_four_field() {
        let line = "12,-5,300,1001";
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(format!("{line}\n").as_bytes());
        assert_eq!(format_record(&samples[0]), line);
    }

    #[test]
    fn test_round_trip_seven_field() {
        let line = "-32768,32767,0,-1,1,9999,4294967295";
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let samples = parser.push(format!("{line}\n").as_bytes());
        assert_eq!(format_record(&samples[0]), line);
    }

    #[test]
    fn test_oversized_fragment_discarded() {
        let mut parser = TextFrameParser::new(TextSchema::Auto);
        let garbage = vec![b'x'; 400];
        parser.push(&garbage);
        assert!(parser.leftover().is_empty());
    }
}
