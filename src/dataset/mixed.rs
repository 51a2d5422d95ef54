//! Heterogeneous "real-world" corpus built from weighted 4 MiB blocks.
//!
//! Reproducibility contract: for a given seed and size the output is byte
//! identical. This holds only as long as the draws from the random source
//! happen in the same order, which is:
//!
//! 1. one kind draw per block, then that block's own draws;
//! 2. json: level, user id, message for each line;
//! 3. media: 56 header bytes, then the payload;
//! 4. random: the payload, chunk by chunk.
//!
//! Zero and text blocks draw nothing.

use super::{write_random, write_zeros};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::error::Result;

pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;
const ZERO_CHUNK: usize = 1024 * 1024;
const RANDOM_CHUNK: usize = 10 * 1024 * 1024;

const TEXT_LINE: &[u8] = b"The quick brown fox jumps over the lazy dog. \
lorem ipsum dolor sit amet, consectetur adipiscing elit. ";

const JSON_FIRST_TS: u64 = 1_700_000_000;
const JSON_LEVELS: [&str; 4] = ["INFO", "WARN", "ERROR", "DEBUG"];
const JSON_MESSAGES: [&str; 10] = [
    "connected",
    "disconnected",
    "timeout",
    "retrying",
    "ok",
    "downloaded",
    "uploaded",
    "cached",
    "evicted",
    "committed",
];
const JSON_MAX_USER: u32 = 10_000;

const MEDIA_MAGIC: &[u8] = b"\x89MEDIAHDR";
const MEDIA_HEADER_NOISE: usize = 56;
const MEDIA_HEADER_LEN: usize = 1024;

/// Content kind of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Zeros,
    Text,
    Json,
    Media,
    Random,
}

/// Kinds in draw order, paired positionally with [`BLOCK_WEIGHTS`].
pub const BLOCK_KINDS: [BlockKind; 5] = [
    BlockKind::Zeros,
    BlockKind::Text,
    BlockKind::Json,
    BlockKind::Media,
    BlockKind::Random,
];
pub const BLOCK_WEIGHTS: [u32; 5] = [25, 20, 20, 20, 15];

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Zeros => "zeros",
            BlockKind::Text => "text",
            BlockKind::Json => "json",
            BlockKind::Media => "media",
            BlockKind::Random => "random",
        }
    }

    /// Emits exactly `len` bytes of this kind.
    pub fn write<W, R>(self, out: &mut W, len: usize, rng: &mut R) -> io::Result<()>
    where
        W: Write + ?Sized,
        R: RngCore + ?Sized,
    {
        match self {
            BlockKind::Zeros => write_zeros(out, len as u64, ZERO_CHUNK),
            BlockKind::Text => write_text_block(out, len),
            BlockKind::Json => write_json_block(out, len, rng),
            BlockKind::Media => write_media_block(out, len, rng),
            BlockKind::Random => write_random(out, len as u64, RANDOM_CHUNK, rng),
        }
    }
}

pub struct MixedGenerator {
    block_size: usize,
    kinds: WeightedIndex<u32>,
}

impl MixedGenerator {
    pub fn new() -> Result<Self> {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// Smaller blocks keep tests fast while exercising the same code.
    pub fn with_block_size(block_size: usize) -> Result<Self> {
        Ok(MixedGenerator {
            block_size: block_size.max(1),
            kinds: WeightedIndex::new(BLOCK_WEIGHTS)?,
        })
    }

    pub fn pick_kind<R: RngCore + ?Sized>(&self, rng: &mut R) -> BlockKind {
        BLOCK_KINDS[self.kinds.sample(rng)]
    }

    /// Writes `total` bytes and returns the kind chosen for each block.
    pub fn write<W, R>(&self, out: &mut W, total: u64, rng: &mut R) -> io::Result<Vec<BlockKind>>
    where
        W: Write + ?Sized,
        R: RngCore + ?Sized,
    {
        let mut layout = Vec::with_capacity((total / self.block_size as u64 + 1) as usize);
        let mut written = 0u64;
        while written < total {
            let len = (total - written).min(self.block_size as u64) as usize;
            let kind = self.pick_kind(rng);
            kind.write(out, len, rng)?;
            layout.push(kind);
            written += len as u64;
        }
        Ok(layout)
    }
}

/// One-line "kind=count" summary of a block layout, for logs.
pub fn summarize(layout: &[BlockKind]) -> String {
    let mut summary = String::new();
    for kind in BLOCK_KINDS {
        let count = layout.iter().filter(|&&k| k == kind).count();
        if !summary.is_empty() {
            summary.push(' ');
        }
        let _ = write!(summary, "{}={}", kind.name(), count);
    }
    summary
}

fn write_text_block<W: Write + ?Sized>(out: &mut W, len: usize) -> io::Result<()> {
    let mut written = 0;
    while written + TEXT_LINE.len() + 1 <= len {
        out.write_all(TEXT_LINE)?;
        out.write_all(b"\n")?;
        written += TEXT_LINE.len() + 1;
    }
    // less than a full line plus newline is left
    out.write_all(&TEXT_LINE[..len - written])
}

fn write_json_block<W, R>(out: &mut W, len: usize, rng: &mut R) -> io::Result<()>
where
    W: Write + ?Sized,
    R: RngCore + ?Sized,
{
    let mut line = String::with_capacity(128);
    let mut written = 0;
    let mut i = 0u64;
    while written < len {
        let level = JSON_LEVELS.choose(rng).copied().unwrap_or("INFO");
        let user = rng.gen_range(1..=JSON_MAX_USER);
        let msg = JSON_MESSAGES.choose(rng).copied().unwrap_or("ok");

        line.clear();
        let _ = writeln!(
            line,
            r#"{{"ts":{},"level":"{}","user":{},"msg":"{}","ok":true}}"#,
            JSON_FIRST_TS + i,
            level,
            user,
            msg
        );

        let bytes = line.as_bytes();
        if written + bytes.len() > len {
            out.write_all(&bytes[..len - written])?;
            break;
        }
        out.write_all(bytes)?;
        written += bytes.len();
        i += 1;
    }
    Ok(())
}

fn write_media_block<W, R>(out: &mut W, len: usize, rng: &mut R) -> io::Result<()>
where
    W: Write + ?Sized,
    R: RngCore + ?Sized,
{
    let mut pattern = Vec::with_capacity(MEDIA_MAGIC.len() + MEDIA_HEADER_NOISE);
    pattern.extend_from_slice(MEDIA_MAGIC);
    pattern.resize(MEDIA_MAGIC.len() + MEDIA_HEADER_NOISE, 0);
    rng.fill_bytes(&mut pattern[MEDIA_MAGIC.len()..]);

    let header: Vec<u8> = pattern.iter().copied().cycle().take(MEDIA_HEADER_LEN.min(len)).collect();
    out.write_all(&header)?;
    write_random(out, (len - header.len()) as u64, RANDOM_CHUNK, rng)
}
