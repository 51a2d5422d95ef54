//! Sparse-file-like corpus: a random island, a long zero gap, another island.

use super::{write_random, write_zeros};
use rand::RngCore;
use std::io::{self, Write};

/// Share of the file taken by each random island.
pub const ISLAND_PERCENT: u64 = 20;
/// Chunk size used for both the zero gap and the random islands.
pub const CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Byte lengths of the three regions of a fragmented file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentedLayout {
    pub island: u64,
    pub gap: u64,
}

impl FragmentedLayout {
    pub fn for_size(total: u64) -> Self {
        let island = total * ISLAND_PERCENT / 100;
        FragmentedLayout {
            island,
            gap: total - 2 * island,
        }
    }

    pub fn total(&self) -> u64 {
        2 * self.island + self.gap
    }
}

/// Writes exactly `total` bytes: random island, zero gap, random island.
pub fn write_fragmented<W, R>(out: &mut W, total: u64, rng: &mut R) -> io::Result<()>
where
    W: Write + ?Sized,
    R: RngCore + ?Sized,
{
    let layout = FragmentedLayout::for_size(total);
    write_random(out, layout.island, CHUNK_SIZE, rng)?;
    write_zeros(out, layout.gap, CHUNK_SIZE)?;
    write_random(out, layout.island, CHUNK_SIZE, rng)?;
    Ok(())
}
