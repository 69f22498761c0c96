//! Batch decoding: walking a contiguous region of frames by following each
//! frame's `offset_next` field (§4.1, §8 property 1).

use crate::constants::{LCS_FRAME_CMD, LCS_FRAME_ETH, LCS_FRAME_SNA};
use crate::error::WireError;
use crate::header::{LcsCommandHeader, LcsHeader, LCSCMDHDR_LEN, LCSHDR_LEN};

/// One decoded frame from a batch, borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFrame<'a> {
    Command {
        header: LcsCommandHeader,
        payload: &'a [u8],
    },
    Eth {
        header: LcsHeader,
        payload: &'a [u8],
    },
    Sna {
        header: LcsHeader,
        payload: &'a [u8],
    },
    /// A frame whose type byte is none of the three known values. The
    /// caller is responsible for turning this into an equipment-check abort
    /// (§4.7, §7); the codec itself just reports it rather than silently
    /// dropping it.
    Unknown {
        frame_type: u8,
        header: LcsHeader,
        payload: &'a [u8],
    },
}

impl<'a> BatchFrame<'a> {
    pub fn lcs_header(&self) -> LcsHeader {
        match self {
            BatchFrame::Command { header, .. } => header.lcs_hdr,
            BatchFrame::Eth { header, .. } => *header,
            BatchFrame::Sna { header, .. } => *header,
            BatchFrame::Unknown { header, .. } => *header,
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            BatchFrame::Command { payload, .. } => payload,
            BatchFrame::Eth { payload, .. } => payload,
            BatchFrame::Sna { payload, .. } => payload,
            BatchFrame::Unknown { payload, .. } => payload,
        }
    }
}

/// Iterator over the frames of a batch. Stops (returning `None`) once a
/// terminator (`offset_next == 0`) is reached; returns `Some(Err(_))` and
/// then stops permanently if the batch is malformed.
pub struct BatchIter<'a> {
    bytes: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = Result<BatchFrame<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self.step();
        if !matches!(step, Some(Ok(_))) {
            self.done = true;
        }
        step
    }
}

impl<'a> BatchIter<'a> {
    fn step(&mut self) -> Option<Result<BatchFrame<'a>, WireError>> {
        let cur = self.cursor;
        if cur + LCSHDR_LEN > self.bytes.len() {
            return Some(Err(WireError::Truncated));
        }
        let peek = match LcsHeader::decode(&self.bytes[cur..]) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };
        if peek.offset_next == 0 {
            return None;
        }
        let next = peek.offset_next as usize;
        if next <= cur || next > self.bytes.len() {
            return Some(Err(WireError::NonMonotonicOffset));
        }

        let frame = match peek.frame_type {
            LCS_FRAME_CMD => {
                if cur + LCSCMDHDR_LEN > next {
                    return Some(Err(WireError::Truncated));
                }
                let header = match LcsCommandHeader::decode(&self.bytes[cur..]) {
                    Ok(h) => h,
                    Err(e) => return Some(Err(e)),
                };
                let payload = &self.bytes[cur + LCSCMDHDR_LEN..next];
                BatchFrame::Command { header, payload }
            }
            LCS_FRAME_ETH => BatchFrame::Eth {
                header: peek,
                payload: &self.bytes[cur + LCSHDR_LEN..next],
            },
            LCS_FRAME_SNA => BatchFrame::Sna {
                header: peek,
                payload: &self.bytes[cur + LCSHDR_LEN..next],
            },
            other => BatchFrame::Unknown {
                frame_type: other,
                header: peek,
                payload: &self.bytes[cur + LCSHDR_LEN..next],
            },
        };

        self.cursor = next;
        Some(Ok(frame))
    }
}

/// Starts iterating the frames of `bytes`, a batch with no baffle envelope
/// (see [`crate::sna::baffle_detect`] to strip one first).
pub fn decode_batch(bytes: &[u8]) -> BatchIter<'_> {
    BatchIter {
        bytes,
        cursor: 0,
        done: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::LCSHDR_LEN as HL;

    fn eth_frame(offset_next: u16, slot: u8, payload: &[u8]) -> Vec<u8> {
        let hdr = LcsHeader {
            offset_next,
            frame_type: LCS_FRAME_ETH,
            slot,
        };
        let mut v = hdr.to_bytes().to_vec();
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn decodes_single_frame_then_terminator() {
        let mut batch = Vec::new();
        let p1 = b"hello".to_vec();
        let frame1_start = 0u16;
        let frame1_end = (HL + p1.len()) as u16;
        batch.extend(eth_frame(frame1_end, 0, &p1));
        // terminator
        batch.extend(
            LcsHeader {
                offset_next: 0,
                frame_type: 0,
                slot: 0,
            }
            .to_bytes(),
        );
        let frames: Vec<_> = decode_batch(&batch).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            BatchFrame::Eth { payload, .. } => assert_eq!(*payload, p1.as_slice()),
            _ => panic!("wrong variant"),
        }
        let _ = frame1_start;
    }

    #[test]
    fn rejects_non_monotonic_offset() {
        let hdr = LcsHeader {
            offset_next: 2, // smaller than header length itself => non-monotonic
            frame_type: LCS_FRAME_ETH,
            slot: 0,
        };
        let batch = hdr.to_bytes();
        let result: Result<Vec<_>, _> = decode_batch(&batch).collect();
        assert!(matches!(result, Err(WireError::NonMonotonicOffset)));
    }

    #[test]
    fn rejects_offset_past_end() {
        let hdr = LcsHeader {
            offset_next: 1000,
            frame_type: LCS_FRAME_ETH,
            slot: 0,
        };
        let batch = hdr.to_bytes();
        let result: Result<Vec<_>, _> = decode_batch(&batch).collect();
        assert!(matches!(result, Err(WireError::NonMonotonicOffset)));
    }

    #[test]
    fn empty_batch_is_just_a_terminator() {
        let batch = LcsHeader::default().to_bytes();
        let frames: Vec<_> = decode_batch(&batch).collect::<Result<_, _>>().unwrap();
        assert!(frames.is_empty());
    }
}
