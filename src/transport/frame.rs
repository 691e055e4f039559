//! BCI protocol frame decoding for BerryMed-class oximeters.
//!
//! The streaming characteristic notifies 20-byte packets holding four
//! 5-byte frames:
//!
//! ```text
//! [0] 0x80 sync | 0x40 pulse beep | 0x20 probe unplugged | 0x10 pulse search | signal strength
//! [1] plethysmogram amplitude
//! [2] 0x40 pulse-rate bit 7 | 0x10 no finger | bargraph
//! [3] pulse-rate bits 0..=6 (combined 255 = no reading)
//! [4] SpO2 percent (127 = no reading)
//! ```

use crate::sample::RawSample;

pub const FRAME_LEN: usize = 5;

const SYNC_BIT: u8 = 0x80;
const PROBE_UNPLUGGED_BIT: u8 = 0x20;
const NO_FINGER_BIT: u8 = 0x10;
const PULSE_RATE_HIGH_BIT: u8 = 0x40;

/// Decode a single 5-byte frame. Returns `None` unless the first byte
/// carries the sync bit.
pub fn parse_frame(frame: &[u8]) -> Option<RawSample> {
    if frame.len() != FRAME_LEN || frame[0] & SYNC_BIT == 0 {
        return None;
    }
    let pulse_rate = (frame[3] & 0x7f) | ((frame[2] & PULSE_RATE_HIGH_BIT) << 1);
    Some(RawSample {
        valid: frame[0] & PROBE_UNPLUGGED_BIT == 0,
        spo2: frame[4] & 0x7f,
        pulse_rate,
        plethysmogram: frame[1],
        finger_present: frame[2] & NO_FINGER_BIT == 0,
    })
}

/// Split a notification payload into frames and decode each one. Trailing
/// bytes that do not fill a frame, and frames without the sync bit, are
/// dropped.
pub fn parse_packet(payload: &[u8]) -> Vec<RawSample> {
    payload
        .chunks_exact(FRAME_LEN)
        .filter_map(parse_frame)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::PULSE_RATE_INVALID;

    #[test]
    fn decodes_clean_frame() {
        // Signal strength 4, finger on, PR 72, SpO2 98.
        let sample = parse_frame(&[0x84, 55, 0x03, 72, 98]).unwrap();
        assert!(sample.valid);
        assert!(sample.finger_present);
        assert_eq!(sample.pulse_rate, 72);
        assert_eq!(sample.spo2, 98);
        assert_eq!(sample.plethysmogram, 55);
        assert!(sample.is_valid());
    }

    #[test]
    fn requires_sync_bit() {
        assert_eq!(parse_frame(&[0x04, 55, 0x03, 72, 98]), None);
    }

    #[test]
    fn flags_unplugged_probe() {
        let sample = parse_frame(&[0x80 | 0x20, 0, 0x00, 72, 98]).unwrap();
        assert!(!sample.valid);
        assert!(!sample.is_valid());
    }

    #[test]
    fn flags_missing_finger() {
        let sample = parse_frame(&[0x84, 0, 0x10, 72, 98]).unwrap();
        assert!(!sample.finger_present);
        assert!(!sample.is_valid());
    }

    #[test]
    fn recombines_pulse_rate_high_bit() {
        // Bit 7 rides in byte 2; 0x7f | 0x80 is the no-reading sentinel.
        let sample = parse_frame(&[0x84, 0, 0x40, 0x7f, 98]).unwrap();
        assert_eq!(sample.pulse_rate, PULSE_RATE_INVALID);
        assert!(!sample.is_valid());

        let sample = parse_frame(&[0x84, 0, 0x40, 0x00, 98]).unwrap();
        assert_eq!(sample.pulse_rate, 128);
    }

    #[test]
    fn splits_packet_into_frames() {
        let mut payload = Vec::new();
        for pr in [70u8, 71, 72, 73] {
            payload.extend_from_slice(&[0x84, 50, 0x03, pr, 97]);
        }
        let samples = parse_packet(&payload);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3].pulse_rate, 73);
    }

    #[test]
    fn drops_partial_trailing_frame() {
        let payload = [0x84, 50, 0x03, 70, 97, 0x84, 50];
        assert_eq!(parse_packet(&payload).len(), 1);
    }
}
