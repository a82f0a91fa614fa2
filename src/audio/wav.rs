//! # WAV Header Probe
//!
//! Reads the RIFF/WAVE header of a converted file so the pipeline can log what
//! ffmpeg actually produced (rate, channels, depth, duration) and flag output
//! that does not match the canonical format.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Largest header region we are willing to scan for the `fmt ` and `data` chunks.
const MAX_HEADER_BYTES: u64 = 64 * 1024;

/// Format description read from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_bytes: u32,
}

/// The single format the speech backend is fed: mono, 16 kHz, 16-bit signed PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub highpass_hz: u32,
    pub lowpass_hz: u32,
}

pub const CANONICAL: CanonicalFormat = CanonicalFormat {
    sample_rate: 16_000,
    channels: 1,
    bits_per_sample: 16,
    highpass_hz: 80,
    lowpass_hz: 8_000,
};

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

impl WavInfo {
    /// Parse a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let mut tag = [0u8; 4];
        cursor.read_exact(&mut tag)?;
        if &tag != b"RIFF" {
            return Err(invalid("missing RIFF tag"));
        }
        let _riff_size = cursor.read_u32::<LittleEndian>()?;
        cursor.read_exact(&mut tag)?;
        if &tag != b"WAVE" {
            return Err(invalid("missing WAVE tag"));
        }

        let mut format: Option<(u16, u16, u32, u16)> = None;
        loop {
            let mut chunk_id = [0u8; 4];
            cursor.read_exact(&mut chunk_id)?;
            let chunk_size = cursor.read_u32::<LittleEndian>()?;

            match &chunk_id {
                b"fmt " => {
                    let audio_format = cursor.read_u16::<LittleEndian>()?;
                    let channels = cursor.read_u16::<LittleEndian>()?;
                    let sample_rate = cursor.read_u32::<LittleEndian>()?;
                    let _byte_rate = cursor.read_u32::<LittleEndian>()?;
                    let _block_align = cursor.read_u16::<LittleEndian>()?;
                    let bits_per_sample = cursor.read_u16::<LittleEndian>()?;
                    format = Some((audio_format, channels, sample_rate, bits_per_sample));
                    skip(&mut cursor, u64::from(chunk_size).saturating_sub(16))?;
                }
                b"data" => {
                    let (audio_format, channels, sample_rate, bits_per_sample) =
                        format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                    return Ok(Self {
                        audio_format,
                        channels,
                        sample_rate,
                        bits_per_sample,
                        data_bytes: chunk_size,
                    });
                }
                _ => skip(&mut cursor, u64::from(chunk_size))?,
            }

            // Chunks are word aligned.
            if chunk_size % 2 == 1 {
                skip(&mut cursor, 1)?;
            }
        }
    }

    /// Read and parse the header of the file at `path`.
    pub async fn probe(path: &Path) -> io::Result<Self> {
        use tokio::io::AsyncReadExt;

        let file = tokio::fs::File::open(path).await?;
        let mut head = Vec::new();
        file.take(MAX_HEADER_BYTES).read_to_end(&mut head).await?;
        Self::parse(&head)
    }

    pub fn is_pcm(&self) -> bool {
        self.audio_format == WAVE_FORMAT_PCM || self.audio_format == WAVE_FORMAT_EXTENSIBLE
    }

    /// Playback length of the data chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        let bytes_per_second = u64::from(self.sample_rate)
            * u64::from(self.channels)
            * u64::from(self.bits_per_sample / 8);
        if bytes_per_second == 0 {
            return 0.0;
        }
        f64::from(self.data_bytes) / bytes_per_second as f64
    }

    pub fn matches(&self, format: &CanonicalFormat) -> bool {
        self.is_pcm()
            && self.sample_rate == format.sample_rate
            && self.channels == format.channels
            && self.bits_per_sample == format.bits_per_sample
    }
}

fn skip(cursor: &mut Cursor<&[u8]>, bytes: u64) -> io::Result<()> {
    let target = cursor.position() + bytes;
    if target > cursor.get_ref().len() as u64 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "chunk runs past header"));
    }
    cursor.seek(SeekFrom::Start(target))?;
    Ok(())
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Encode `samples` as a canonical-format WAV file. Used to fabricate fixtures.
#[cfg(test)]
pub fn encode_canonical(samples: &[i16]) -> Vec<u8> {
    use byteorder::WriteBytesExt;

    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.write_u32::<LittleEndian>(36 + data_len).unwrap();
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.write_u32::<LittleEndian>(16).unwrap();
    out.write_u16::<LittleEndian>(WAVE_FORMAT_PCM).unwrap();
    out.write_u16::<LittleEndian>(CANONICAL.channels).unwrap();
    out.write_u32::<LittleEndian>(CANONICAL.sample_rate).unwrap();
    out.write_u32::<LittleEndian>(CANONICAL.sample_rate * 2).unwrap();
    out.write_u16::<LittleEndian>(2).unwrap();
    out.write_u16::<LittleEndian>(CANONICAL.bits_per_sample).unwrap();
    out.extend_from_slice(b"data");
    out.write_u32::<LittleEndian>(data_len).unwrap();
    for &sample in samples {
        out.write_i16::<LittleEndian>(sample).unwrap();
    }
    out
}
