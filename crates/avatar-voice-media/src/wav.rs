//! Minimal WAV header parsing, used to time clips.

use std::ops::RangeInclusive;
use std::time::Duration;

const SAMPLE_RATES: RangeInclusive<u32> = 1_000..=768_000;
const CHANNELS: RangeInclusive<u16> = 1..=32;

/// Format details read from a RIFF/WAVE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Length of the `data` chunk in bytes.
    pub data_len: u32,
}

impl WavHeader {
    /// Bytes per second of audio, or `None` if the format fields overflow or yield zero.
    pub fn byte_rate(&self) -> Option<u32> {
        let bits_per_sec = u64::from(self.sample_rate)
            .checked_mul(u64::from(self.channels))?
            .checked_mul(u64::from(self.bits_per_sample))?;
        u32::try_from(bits_per_sec / 8).ok().filter(|rate| *rate > 0)
    }

    /// Whether the format describes audio a real encoder would produce.
    pub fn is_plausible(&self) -> bool {
        SAMPLE_RATES.contains(&self.sample_rate)
            && CHANNELS.contains(&self.channels)
            && matches!(self.bits_per_sample, 8 | 16 | 24 | 32)
    }

    /// Playback duration of the data chunk; zero when the rate is unusable.
    pub fn duration(&self) -> Duration {
        match self.byte_rate() {
            Some(rate) => Duration::from_secs_f64(f64::from(self.data_len) / f64::from(rate)),
            None => Duration::ZERO,
        }
    }
}

/// Parse the format and data length of a WAV file.
///
/// Streaming encoders often write a placeholder data size (0 or `u32::MAX`);
/// the size is clamped to the bytes actually present. Headers with an
/// implausible format (see [`WavHeader::is_plausible`]) are rejected, since
/// the bytes come from a remote server.
pub fn parse_header(bytes: &[u8]) -> Option<WavHeader> {
    if bytes.get(0..4)? != b"RIFF" || bytes.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut format: Option<(u16, u32, u16)> = None;
    let mut offset = 12usize;

    while let Some(id) = bytes.get(offset..offset.checked_add(4)?) {
        let size = u32_at(bytes, offset + 4)?;
        let body = offset + 8;

        match id {
            b"fmt " => {
                let channels = u16_at(bytes, body + 2)?;
                let sample_rate = u32_at(bytes, body + 4)?;
                let bits = u16_at(bytes, body + 14)?;
                format = Some((channels, sample_rate, bits));
            }
            b"data" => {
                let (channels, sample_rate, bits_per_sample) = format?;
                let available =
                    u32::try_from(bytes.len().saturating_sub(body)).unwrap_or(u32::MAX);
                let data_len = if size == 0 || size > available {
                    available
                } else {
                    size
                };
                let header = WavHeader {
                    sample_rate,
                    channels,
                    bits_per_sample,
                    data_len,
                };
                return header.is_plausible().then_some(header);
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        let padded = usize::try_from(size).ok()?.checked_add(size as usize & 1)?;
        offset = body.checked_add(padded)?;
    }

    None
}

fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let b = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Build a WAV file of silence for tests. Format fields are written as given,
/// without validation, so callers can craft broken headers.
#[cfg(test)]
pub(crate) fn silent_wav(
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    data_len: u32,
) -> Vec<u8> {
    fn chunk(out: &mut Vec<u8>, id: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
    }

    let block_align = channels.wrapping_mul(bits_per_sample) / 8;
    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.wrapping_mul(u32::from(block_align)).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits_per_sample.to_le_bytes());

    let mut body = b"WAVE".to_vec();
    chunk(&mut body, b"fmt ", &fmt);
    chunk(&mut body, b"data", &vec![0u8; data_len as usize]);

    let mut wav = b"RIFF".to_vec();
    wav.extend_from_slice(&(body.len() as u32).to_le_bytes());
    wav.extend_from_slice(&body);
    wav
}
