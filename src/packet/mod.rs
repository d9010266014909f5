//! Packet byte access for the filter machine
//!
//! A filter reads big-endian values out of a packet that is either one
//! contiguous buffer or a chain of discontiguous fragments. The [Packet]
//! trait hides the difference from the interpreter: every read is checked
//! against the buffered length and assembles its bytes across fragment
//! boundaries when it has to.

/// Read-only byte access into one packet
///
/// All reads are big-endian and bounds-checked: a read whose last byte falls
/// past the buffered bytes yields `None`. That is a normal outcome for
/// truncated captures, not an error.
pub trait Packet {
    /// The number of bytes actually buffered
    ///
    /// This may be less than the wire length of the packet.
    fn buffered_len(&self) -> usize;

    /// Reads the byte at `offset`
    fn read_u8(&self, offset: usize) -> Option<u8>;

    /// Reads a big-endian 16-bit value at `offset`
    fn read_u16(&self, offset: usize) -> Option<u16>;

    /// Reads a big-endian 32-bit value at `offset`
    fn read_u32(&self, offset: usize) -> Option<u32>;
}

impl Packet for [u8] {
    fn buffered_len(&self) -> usize {
        self.len()
    }

    fn read_u8(&self, offset: usize) -> Option<u8> {
        self.get(offset).copied()
    }

    fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.get(offset..offset.checked_add(2)?)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.get(offset..offset.checked_add(4)?)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A packet split over a chain of buffers
///
/// The fragments concatenated in order form the buffered packet bytes.
/// Empty fragments are allowed anywhere in the chain.
#[derive(Clone, Copy)]
pub struct FragmentChain<'a> {
    fragments: &'a [&'a [u8]],
}

impl<'a> FragmentChain<'a> {
    /// Wraps an ordered fragment list
    pub const fn new(fragments: &'a [&'a [u8]]) -> FragmentChain<'a> {
        FragmentChain { fragments }
    }

    /// Copies `out.len()` bytes starting at `offset` out of the chain
    ///
    /// Walks fragments until the one containing `offset` is found, then keeps
    /// taking bytes from successive fragments until `out` is full. `None` if
    /// the chain runs out first.
    fn fill(&self, mut offset: usize, out: &mut [u8]) -> Option<()> {
        let mut filled = 0;
        for fragment in self.fragments {
            if filled == 0 && offset >= fragment.len() {
                offset -= fragment.len();
                continue;
            }
            let take = (fragment.len() - offset).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&fragment[offset..offset + take]);
            filled += take;
            offset = 0;
            if filled == out.len() {
                return Some(());
            }
        }
        None
    }
}

impl Packet for FragmentChain<'_> {
    fn buffered_len(&self) -> usize {
        self.fragments.iter().map(|f| f.len()).sum()
    }

    fn read_u8(&self, offset: usize) -> Option<u8> {
        let mut bytes = [0; 1];
        self.fill(offset, &mut bytes)?;
        Some(bytes[0])
    }

    fn read_u16(&self, offset: usize) -> Option<u16> {
        let mut bytes = [0; 2];
        self.fill(offset, &mut bytes)?;
        Some(u16::from_be_bytes(bytes))
    }

    fn read_u32(&self, offset: usize) -> Option<u32> {
        let mut bytes = [0; 4];
        self.fill(offset, &mut bytes)?;
        Some(u32::from_be_bytes(bytes))
    }
}

#[test]
fn test_flat_reads() {
    let data: &[u8] = &[0xde, 0xad, 0xbe, 0xef, 0x01];
    assert_eq!(data.read_u32(0), Some(0xdeadbeef));
    assert_eq!(data.read_u16(3), Some(0xef01));
    assert_eq!(data.read_u8(4), Some(0x01));
    assert_eq!(data.read_u32(2), None);
    assert_eq!(data.read_u8(5), None);
    assert_eq!(data.read_u32(usize::MAX - 1), None);
}

#[test]
fn test_empty_fragments_skipped() {
    let chain = FragmentChain::new(&[&[], &[0xde], &[], &[0xad, 0xbe], &[0xef]]);
    assert_eq!(chain.buffered_len(), 4);
    assert_eq!(chain.read_u32(0), Some(0xdeadbeef));
    assert_eq!(chain.read_u16(3), None);
}
