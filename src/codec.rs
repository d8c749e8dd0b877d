//! Internal difference/run-length codec with an in-band NaN marker.
//!
//! The block decompression primitive itself is treated as an external
//! collaborator (§1); this module is the concrete stand-in that satisfies its
//! contract so the rest of the system — CRC gating, gap preservation,
//! resampling — has real compressed bytes to operate on. It is not meant to
//! resemble a production archive's compression and never appears in the
//! external IPC contract of §6.

use crate::error::{parse_error, unsupported_error};
use crate::Result;

/// In-band marker for a missing raw sample, carried through the decompressed
/// integer stream and translated to float32 NaN by the renderer.
pub const NAN_SENTINEL: i32 = i32::MIN;

const TAG_LITERAL: u8 = 0;
const TAG_DELTA: u8 = 1;
const TAG_NAN_RUN: u8 = 2;

/// Encodes `samples` (which may contain `NAN_SENTINEL` runs) into a
/// compressed payload. Only used by tests and fixture generation — there is
/// no write path to the archive in this system (§1 Non-goals).
pub fn encode(samples: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    let mut prev: Option<i32> = None;
    while i < samples.len() {
        let v = samples[i];
        if v == NAN_SENTINEL {
            let run_start = i;
            while i < samples.len() && samples[i] == NAN_SENTINEL {
                i += 1;
            }
            let run_len = (i - run_start) as u16;
            out.push(TAG_NAN_RUN);
            out.extend_from_slice(&run_len.to_le_bytes());
            prev = None;
            continue;
        }
        let delta = prev.and_then(|p| i64::from(v).checked_sub(i64::from(p)));
        match delta {
            Some(d) if (i8::MIN as i64..=i8::MAX as i64).contains(&d) => {
                out.push(TAG_DELTA);
                out.push(d as i8 as u8);
            }
            _ => {
                out.push(TAG_LITERAL);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        prev = Some(v);
        i += 1;
    }
    out
}

/// Decodes `payload` into exactly `number_of_samples` signed integers,
/// writing `NAN_SENTINEL` for every gap sample. Stops and returns an error
/// if the stream runs out of bytes or samples before `number_of_samples` is
/// reached — callers are expected to have already gated this call on
/// `validate` (§4.1), so a malformed payload here indicates the CRC gate
/// itself was bypassed.
pub fn decode(payload: &[u8], number_of_samples: u32) -> Result<Vec<i32>> {
    let want = number_of_samples as usize;
    let mut out = Vec::with_capacity(want);
    let mut prev: Option<i32> = None;
    let mut pos = 0usize;
    while out.len() < want {
        let tag = *payload
            .get(pos)
            .ok_or(crate::Error::ParseError("truncated codec stream"))?;
        pos += 1;
        match tag {
            TAG_LITERAL => {
                let bytes = payload
                    .get(pos..pos + 4)
                    .ok_or_else(|| crate::Error::ParseError("truncated literal"))?;
                let v = i32::from_le_bytes(bytes.try_into().unwrap());
                pos += 4;
                out.push(v);
                prev = Some(v);
            }
            TAG_DELTA => {
                let d = *payload
                    .get(pos)
                    .ok_or_else(|| crate::Error::ParseError("truncated delta"))?
                    as i8;
                pos += 1;
                let base = prev.ok_or_else(|| crate::Error::ParseError("delta with no base sample"))?;
                out.push(base + d as i32);
                prev = Some(base + d as i32);
            }
            TAG_NAN_RUN => {
                let bytes = payload
                    .get(pos..pos + 2)
                    .ok_or_else(|| crate::Error::ParseError("truncated NaN run"))?;
                let run_len = u16::from_le_bytes(bytes.try_into().unwrap()) as usize;
                pos += 2;
                if out.len() + run_len > want {
                    return parse_error("NaN run overruns number_of_samples");
                }
                out.resize(out.len() + run_len, NAN_SENTINEL);
                prev = None;
            }
            _ => return unsupported_error("unknown codec tag"),
        }
    }
    if out.len() != want {
        return parse_error("codec stream produced wrong sample count");
    }
    Ok(out)
}
