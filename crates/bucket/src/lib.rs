//! # Bucket - relocatable sorted string table
//!
//! A bucket is a self-contained table of unique, NUL-terminated strings that
//! lives inside a larger byte image (in practice, a playlist record inside a
//! memory-mapped library). Nothing in it is a pointer: every reference is an
//! offset relative to the bucket's own start, so the whole table can be moved
//! with a plain byte copy.
//!
//! ## Layout
//!
//! ```text
//! ┌────────────────────────┬──────────────────┬────────────┬──────────────┐
//! │ HEADER (16 bytes)      │ strings ──────▶  │ free space │  ◀── indexes │
//! │ magic | length         │ NUL-terminated,  │            │ u32 offsets  │
//! │ index_offs | str_bytes │ insertion order  │            │ sorted by    │
//! │                        │                  │            │ string value │
//! └────────────────────────┴──────────────────┴────────────┴──────────────┘
//! 0                        16          16+str_bytes     index_offs     length
//! ```
//!
//! All integers are big-endian (see [`codec`]). Index entries are offsets from
//! byte 16, the start of the string area. The index array always reads back
//! in strictly ascending byte order of the strings it points at, which is what
//! makes [`Bucket::contains`] a binary search.
//!
//! ## Growth
//!
//! When a new string does not fit in the free space, [`add`] asks its
//! [`BucketHost`] to open a gap of `quantum` bytes right before the index
//! array, then moves `index_offs` and `length` up by the same amount. The host
//! owns the surrounding storage and is responsible for shifting whatever lies
//! after the bucket.
//!
//! ## Example
//!
//! ```rust
//! use bucket::{add, Bucket, BucketMut};
//!
//! let mut image = vec![0u8; 32];
//! BucketMut::init(&mut image, 32).unwrap();
//!
//! add(&mut image, 0, "b.mp3", 32).unwrap();
//! add(&mut image, 0, "a.mp3", 32).unwrap();
//!
//! let bucket = Bucket::open(&image).unwrap();
//! assert_eq!(bucket.ordinal(0).unwrap(), Some("a.mp3"));
//! assert_eq!(bucket.contains("b.mp3").unwrap(), Some(1));
//! ```

use codec::{read_u32, write_u32, U32Field, U32_BYTES};
use std::cmp::Ordering;
use std::io;
use thiserror::Error;
use tracing::trace;

/// Magic number stamped at the start of every bucket.
pub const BUCKET_MAGIC: u32 = 0x1234_4321;

/// Size of the bucket header in bytes.
pub const HEADER_BYTES: usize = 16;

/// Size of one index slot in bytes.
pub const INDEX_ENTRY_BYTES: usize = U32_BYTES;

/// Default number of bytes a bucket grows by when it runs out of room.
pub const DEFAULT_GROWTH_QUANTUM: usize = 128;

const MAGIC: U32Field = U32Field::at(0);
const LENGTH: U32Field = U32Field::at(4);
const INDEX_OFFS: U32Field = U32Field::at(8);
const STR_BYTES: U32Field = U32Field::at(12);

/// Errors that can occur while reading or mutating a bucket.
#[derive(Debug, Error)]
pub enum BucketError {
    /// `init` was asked for a bucket smaller than its own header.
    #[error("bucket capacity {capacity} is smaller than the 16-byte header")]
    TooSmall {
        /// Requested capacity in bytes.
        capacity: usize,
    },

    /// The string is already stored in the bucket.
    #[error("string already present in bucket")]
    Duplicate,

    /// The string contains a NUL byte and cannot be stored NUL-terminated.
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// The growth quantum passed to [`add`] was zero.
    #[error("growth quantum must be non-zero")]
    ZeroQuantum,

    /// Growing the bucket would push a length past `u32::MAX`.
    #[error("bucket would exceed the 4 GiB addressing limit")]
    Overflow,

    /// The header or index array is inconsistent.
    #[error("corrupt bucket: {0}")]
    Corrupt(String),

    /// The host failed to open space for the bucket to grow into.
    #[error("failed to grow bucket: {0}")]
    Grow(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BucketError>;

fn corrupt(msg: impl Into<String>) -> BucketError {
    BucketError::Corrupt(msg.into())
}

/// Storage a bucket is embedded in.
///
/// `insert_space` must open a gap of `len` bytes at `offset` (relative to
/// [`bytes`](BucketHost::bytes)), moving every byte from `offset` onward up by
/// `len`. After it returns, `bytes()` may point at a different allocation, so
/// callers re-borrow instead of holding slices across the call.
pub trait BucketHost {
    /// The full byte image holding the bucket.
    fn bytes(&self) -> &[u8];

    /// Mutable view of the full byte image.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Opens a zeroed gap of `len` bytes at `offset`.
    fn insert_space(&mut self, offset: usize, len: usize) -> io::Result<()>;
}

/// In-memory host, mostly useful for standalone buckets and tests.
impl BucketHost for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self
    }

    fn insert_space(&mut self, offset: usize, len: usize) -> io::Result<()> {
        if offset > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("insert offset {} past end ({})", offset, self.len()),
            ));
        }
        self.splice(offset..offset, std::iter::repeat(0u8).take(len));
        Ok(())
    }
}

/// Snapshot of a bucket's geometry, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketStats {
    pub length: usize,
    pub index_offs: usize,
    pub str_bytes: usize,
    pub free_bytes: usize,
    pub entries: usize,
}

/// Read-only view over a validated bucket.
///
/// The view covers exactly `length` bytes; anything after the bucket in the
/// parent slice is ignored.
#[derive(Clone, Copy)]
pub struct Bucket<'a> {
    buf: &'a [u8],
}

impl<'a> Bucket<'a> {
    /// Validates the bucket header at the start of `buf` and returns a view.
    ///
    /// # Validation
    ///
    /// - magic must be [`BUCKET_MAGIC`]
    /// - `length` must fit in `buf`
    /// - `HEADER_BYTES + str_bytes <= index_offs <= length`
    /// - the index array must be a whole number of slots
    pub fn open(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_BYTES {
            return Err(corrupt(format!(
                "{} bytes is too small for a bucket header",
                buf.len()
            )));
        }
        let magic = MAGIC.get(buf);
        if magic != BUCKET_MAGIC {
            return Err(corrupt(format!("bad magic {:#010x}", magic)));
        }

        let length = LENGTH.get(buf) as usize;
        let index_offs = INDEX_OFFS.get(buf) as usize;
        let str_bytes = STR_BYTES.get(buf) as usize;

        if length > buf.len() {
            return Err(corrupt(format!(
                "length {} overruns the {} bytes available",
                length,
                buf.len()
            )));
        }
        if index_offs > length || HEADER_BYTES + str_bytes > index_offs {
            return Err(corrupt(format!(
                "index_offs {} inconsistent with length {} and str_bytes {}",
                index_offs, length, str_bytes
            )));
        }
        if (length - index_offs) % INDEX_ENTRY_BYTES != 0 {
            return Err(corrupt("index array is not a whole number of slots"));
        }

        Ok(Self {
            buf: &buf[..length],
        })
    }

    /// Total bytes occupied by the bucket, header included.
    #[must_use]
    pub fn len(&self) -> usize {
        LENGTH.get(self.buf) as usize
    }

    /// Returns `true` if the bucket holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_count() == 0
    }

    /// Offset of the index array from the bucket start.
    #[must_use]
    pub fn index_offs(&self) -> usize {
        INDEX_OFFS.get(self.buf) as usize
    }

    /// Bytes used by the string area, terminators included.
    #[must_use]
    pub fn str_bytes(&self) -> usize {
        STR_BYTES.get(self.buf) as usize
    }

    /// Number of strings stored.
    #[must_use]
    pub fn index_count(&self) -> usize {
        (self.len() - self.index_offs()) / INDEX_ENTRY_BYTES
    }

    /// Unused bytes between the string area and the index array.
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.index_offs() - HEADER_BYTES - self.str_bytes()
    }

    /// Returns `true` if `value` fits without growing: string, NUL, and one slot.
    #[must_use]
    pub fn has_room_for(&self, value: &[u8]) -> bool {
        self.free_space() >= value.len() + 1 + INDEX_ENTRY_BYTES
    }

    #[must_use]
    pub fn stats(&self) -> BucketStats {
        BucketStats {
            length: self.len(),
            index_offs: self.index_offs(),
            str_bytes: self.str_bytes(),
            free_bytes: self.free_space(),
            entries: self.index_count(),
        }
    }

    /// Raw string offset held by index slot `n`.
    fn index(&self, n: usize) -> u32 {
        read_u32(self.buf, self.index_offs() + n * INDEX_ENTRY_BYTES)
    }

    fn strings(&self) -> &'a [u8] {
        let end = HEADER_BYTES + STR_BYTES.get(self.buf) as usize;
        &self.buf[HEADER_BYTES..end]
    }

    fn raw_at(&self, offset: u32) -> Result<&'a [u8]> {
        let strings = self.strings();
        let start = offset as usize;
        let tail = strings
            .get(start..)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| corrupt(format!("string offset {} out of range", offset)))?;
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt(format!("string at {} is not terminated", offset)))?;
        Ok(&tail[..end])
    }

    /// Returns the string starting `offset` bytes into the string area.
    ///
    /// Offsets come from the index array; this is not meant for untrusted
    /// input beyond detecting corruption.
    pub fn string_at(&self, offset: u32) -> Result<&'a str> {
        let raw = self.raw_at(offset)?;
        std::str::from_utf8(raw)
            .map_err(|_| corrupt(format!("string at {} is not valid UTF-8", offset)))
    }

    /// Returns the `n`-th string in sorted order, or `None` past the end.
    pub fn ordinal(&self, n: usize) -> Result<Option<&'a str>> {
        if n >= self.index_count() {
            return Ok(None);
        }
        self.string_at(self.index(n)).map(Some)
    }

    /// Binary search over the index. `Ok(pos)` on a hit, `Err(insert_pos)` on a miss.
    fn search(&self, target: &[u8]) -> Result<std::result::Result<usize, usize>> {
        let mut lo = 0usize;
        let mut hi = self.index_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = self.raw_at(self.index(mid))?;
            match probe.cmp(target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    /// Looks up `value`, returning its sorted position if present.
    pub fn contains(&self, value: &str) -> Result<Option<usize>> {
        Ok(self.search(value.as_bytes())?.ok())
    }

    /// Iterates over the strings in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Result<&'a str>> + 'a {
        let bucket = *self;
        (0..bucket.index_count()).map(move |n| bucket.string_at(bucket.index(n)))
    }

    /// Checks that every index resolves and the strings are strictly ascending.
    pub fn validate_order(&self) -> Result<()> {
        let mut prev: Option<&[u8]> = None;
        for n in 0..self.index_count() {
            let cur = self.raw_at(self.index(n))?;
            if let Some(p) = prev {
                if p >= cur {
                    return Err(corrupt(format!("index out of order at slot {}", n)));
                }
            }
            prev = Some(cur);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Bucket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("length", &self.len())
            .field("index_offs", &self.index_offs())
            .field("str_bytes", &self.str_bytes())
            .field("entries", &self.index_count())
            .finish()
    }
}

/// Mutable view over a bucket.
#[derive(Debug)]
pub struct BucketMut<'a> {
    buf: &'a mut [u8],
}

impl<'a> BucketMut<'a> {
    /// Writes a fresh, empty bucket header into the first `capacity` bytes of `buf`.
    ///
    /// The span is expected to be zeroed already (freshly expanded file space).
    pub fn init(buf: &'a mut [u8], capacity: usize) -> Result<Self> {
        if capacity < HEADER_BYTES {
            return Err(BucketError::TooSmall { capacity });
        }
        if buf.len() < capacity {
            return Err(corrupt(format!(
                "buffer of {} bytes cannot hold a {}-byte bucket",
                buf.len(),
                capacity
            )));
        }
        let capacity_u32 = u32::try_from(capacity).map_err(|_| BucketError::Overflow)?;

        let buf = &mut buf[..capacity];
        MAGIC.set(buf, BUCKET_MAGIC);
        LENGTH.set(buf, capacity_u32);
        INDEX_OFFS.set(buf, capacity_u32);
        STR_BYTES.set(buf, 0);
        Ok(Self { buf })
    }

    /// Validates the bucket at the start of `buf` and returns a mutable view.
    pub fn open(buf: &'a mut [u8]) -> Result<Self> {
        let length = Bucket::open(buf)?.len();
        Ok(Self {
            buf: &mut buf[..length],
        })
    }

    /// Read-only view of the same bucket.
    #[must_use]
    pub fn as_bucket(&self) -> Bucket<'_> {
        Bucket { buf: &*self.buf }
    }

    /// Appends `value` to the string area and re-sorts the index.
    ///
    /// The caller must have checked [`Bucket::has_room_for`] and ruled out
    /// duplicates.
    fn push(&mut self, value: &[u8]) -> Result<()> {
        let view = self.as_bucket();
        if !view.has_room_for(value) {
            return Err(corrupt("push without enough free space"));
        }
        let str_bytes = view.str_bytes();
        let index_offs = view.index_offs();

        let dest = HEADER_BYTES + str_bytes;
        self.buf[dest..dest + value.len()].copy_from_slice(value);
        self.buf[dest + value.len()] = 0;

        let slot = index_offs - INDEX_ENTRY_BYTES;
        write_u32(self.buf, slot, str_bytes as u32);

        INDEX_OFFS.set(self.buf, slot as u32);
        STR_BYTES.set(self.buf, (str_bytes + value.len() + 1) as u32);

        self.sort_index();
        Ok(())
    }

    /// Re-sorts the whole index array by the strings it references.
    pub fn sort_index(&mut self) {
        let index_offs = INDEX_OFFS.get(self.buf) as usize;
        let str_end = HEADER_BYTES + STR_BYTES.get(self.buf) as usize;

        let (head, index) = self.buf.split_at_mut(index_offs);
        let strings = &head[HEADER_BYTES..str_end];

        let mut offsets: Vec<u32> = index
            .chunks_exact(INDEX_ENTRY_BYTES)
            .map(|slot| read_u32(slot, 0))
            .collect();
        offsets.sort_unstable_by(|&a, &b| c_str(strings, a).cmp(c_str(strings, b)));

        for (slot, offset) in index.chunks_exact_mut(INDEX_ENTRY_BYTES).zip(offsets) {
            write_u32(slot, 0, offset);
        }
        trace!(entries = index.len() / INDEX_ENTRY_BYTES, "sorted bucket index");
    }

    /// Removes `value` if present. Returns whether anything was removed.
    ///
    /// The string area is compacted and the index slot released; the bucket's
    /// total `length` does not change.
    pub fn remove(&mut self, value: &str) -> Result<bool> {
        let view = self.as_bucket();
        let pos = match view.search(value.as_bytes())? {
            Ok(pos) => pos,
            Err(_) => return Ok(false),
        };
        let count = view.index_count();
        let index_offs = view.index_offs();
        let str_bytes = view.str_bytes();
        let offset = view.index(pos) as usize;
        let removed = value.len() + 1;

        // close the gap in the string area
        let gap_start = HEADER_BYTES + offset;
        let area_end = HEADER_BYTES + str_bytes;
        self.buf.copy_within(gap_start + removed..area_end, gap_start);
        self.buf[area_end - removed..area_end].fill(0);

        // re-base every slot that pointed past the removed string
        for n in 0..count {
            let at = index_offs + n * INDEX_ENTRY_BYTES;
            let entry = read_u32(self.buf, at) as usize;
            if entry > offset {
                write_u32(self.buf, at, (entry - removed) as u32);
            }
        }

        // drop the slot by sliding the slots in front of it up by one
        let slot = index_offs + pos * INDEX_ENTRY_BYTES;
        self.buf
            .copy_within(index_offs..slot, index_offs + INDEX_ENTRY_BYTES);
        self.buf[index_offs..index_offs + INDEX_ENTRY_BYTES].fill(0);

        INDEX_OFFS.set(self.buf, (index_offs + INDEX_ENTRY_BYTES) as u32);
        STR_BYTES.set(self.buf, (str_bytes - removed) as u32);
        Ok(true)
    }
}

/// Bytes of the NUL-terminated string at `offset`, clamped to the area.
fn c_str(strings: &[u8], offset: u32) -> &[u8] {
    let tail = strings.get(offset as usize..).unwrap_or(&[]);
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    &tail[..end]
}

/// Inserts `value` into the bucket that starts `base` bytes into `host`.
///
/// Duplicates are rejected before anything is touched. If the free space is
/// too small the bucket grows by `quantum` bytes at a time via
/// [`BucketHost::insert_space`] until the string and its index slot fit.
///
/// # Errors
///
/// - [`BucketError::Duplicate`] if the string is already present.
/// - [`BucketError::Grow`] if the host could not open space. Growth steps that
///   already succeeded are not undone, so the bucket may be larger than
///   before even though the string was not inserted.
pub fn add<H>(host: &mut H, base: usize, value: &str, quantum: usize) -> Result<()>
where
    H: BucketHost + ?Sized,
{
    let bytes = value.as_bytes();
    if bytes.contains(&0) {
        return Err(BucketError::InteriorNul);
    }
    if quantum == 0 {
        return Err(BucketError::ZeroQuantum);
    }

    if bucket_at(host.bytes(), base)?.search(bytes)?.is_ok() {
        return Err(BucketError::Duplicate);
    }

    loop {
        let view = bucket_at(host.bytes(), base)?;
        if view.has_room_for(bytes) {
            break;
        }
        let length = view.len();
        let index_offs = view.index_offs();
        let new_length = length
            .checked_add(quantum)
            .filter(|&l| l <= u32::MAX as usize)
            .ok_or(BucketError::Overflow)?;

        host.insert_space(base + index_offs, quantum)?;

        let buf = &mut host.bytes_mut()[base..];
        LENGTH.set(buf, new_length as u32);
        INDEX_OFFS.set(buf, (index_offs + quantum) as u32);
        trace!(base, new_length, "grew bucket");
    }

    let buf = host
        .bytes_mut()
        .get_mut(base..)
        .ok_or_else(|| corrupt(format!("bucket base {} out of range", base)))?;
    BucketMut::open(buf)?.push(bytes)
}

fn bucket_at(image: &[u8], base: usize) -> Result<Bucket<'_>> {
    let buf = image
        .get(base..)
        .ok_or_else(|| corrupt(format!("bucket base {} out of range", base)))?;
    Bucket::open(buf)
}
