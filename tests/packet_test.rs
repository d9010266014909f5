use cbpf_filter::packet::{FragmentChain, Packet};
use rand::{thread_rng, Rng};

#[test]
pub fn test_flat_buffer_reads() {
    let data: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
    assert_eq!(data.buffered_len(), 6);
    assert_eq!(data.read_u32(0), Some(0x01020304));
    assert_eq!(data.read_u32(2), Some(0x03040506));
    assert_eq!(data.read_u16(4), Some(0x0506));
    assert_eq!(data.read_u8(5), Some(0x06));

    // Reads past the buffered bytes fail, they do not wrap or panic
    assert_eq!(data.read_u32(3), None);
    assert_eq!(data.read_u16(5), None);
    assert_eq!(data.read_u8(6), None);
    assert_eq!(data.read_u32(usize::MAX), None);
}

#[test]
pub fn test_fragment_boundary_straddling() {
    // A 4-byte field split 2/2 across a fragment boundary
    let chain = FragmentChain::new(&[&[0x00, 0xde, 0xad], &[0xbe, 0xef, 0x00]]);
    assert_eq!(chain.read_u32(1), Some(0xdeadbeef));

    // Split 1/1/1/1 across four fragments
    let chain = FragmentChain::new(&[&[0xde], &[0xad], &[0xbe], &[0xef]]);
    assert_eq!(chain.read_u32(0), Some(0xdeadbeef));
    assert_eq!(chain.read_u16(1), Some(0xadbe));

    // Chain exhausted mid-read
    let chain = FragmentChain::new(&[&[0xde, 0xad], &[0xbe]]);
    assert_eq!(chain.read_u32(0), None);
    assert_eq!(chain.read_u16(2), None);
    assert_eq!(chain.read_u8(3), None);
}

#[test]
pub fn test_fragmented_reads_match_flat_reads() {
    let mut rng = thread_rng();
    let mut data = [0u8; 64];
    rng.fill(&mut data[..]);

    for _ in 0..100 {
        // Split the buffer at up to three random points
        let mut cuts: [usize; 3] = [
            rng.gen_range(0..=data.len()),
            rng.gen_range(0..=data.len()),
            rng.gen_range(0..=data.len()),
        ];
        cuts.sort_unstable();

        let fragments: [&[u8]; 4] = [
            &data[..cuts[0]],
            &data[cuts[0]..cuts[1]],
            &data[cuts[1]..cuts[2]],
            &data[cuts[2]..],
        ];
        let chain = FragmentChain::new(&fragments);
        assert_eq!(chain.buffered_len(), data.len());

        let flat: &[u8] = &data;
        for offset in 0..=data.len() {
            assert_eq!(chain.read_u8(offset), flat.read_u8(offset));
            assert_eq!(chain.read_u16(offset), flat.read_u16(offset));
            assert_eq!(chain.read_u32(offset), flat.read_u32(offset));
        }
    }
}
