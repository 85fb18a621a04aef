use super::*;
use test_log::test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    A,
    B,
}

#[test]
fn mirror_is_identity_below_size() {
    for size in [1, 3, 0x2000, 0x60000, 0x180000, 0x300000] {
        for address in (0..size).step_by(((size / 97) as usize).max(1)) {
            assert_eq!(mirror(address, size), address, "address {address:06X} size {size:06X}");
        }
    }
}

#[test]
fn mirror_is_idempotent_and_surjective() {
    for size in [1, 3, 5, 0x600, 0x2800, 0x3000] {
        let mut hit = vec![false; size as usize];
        for address in size..(size * 4).max(0x4000) {
            let mirrored = mirror(address, size);
            assert!(mirrored < size, "address {address:06X} size {size:06X} -> {mirrored:06X}");
            assert_eq!(mirror(mirrored, size), mirrored);
            hit[mirrored as usize] = true;
        }
        assert!(hit.iter().all(|&hit| hit), "size {size:06X} not covered");
    }
}

#[test]
fn mirror_non_power_of_two() {
    // 3 MiB ROM: the upper 1 MiB repeats to fill the second 2 MiB half
    assert_eq!(mirror(0x300000, 0x300000), 0x200000);
    assert_eq!(mirror(0x3FFFFF, 0x300000), 0x2FFFFF);
    assert_eq!(mirror(0x400000, 0x300000), 0x000000);
    assert_eq!(mirror(0x12345, 0), 0);
}

#[test]
fn mirror_folds_addresses_above_24_bits() {
    assert_eq!(mirror(0x0100_0000, 3), 0);
    assert_eq!(mirror(0x0100_0002, 3), 2);
    assert_eq!(mirror(0x0100_0000, 0x300000), 0x000000);
    assert_eq!(mirror(u32::MAX, 0x300000), 0x2FFFFF);

    for address in [0x0100_0000, 0x0123_4567, 0x8000_0000, u32::MAX] {
        for size in [1, 3, 0x2800, 0x300000] {
            assert!(mirror(address, size) < size, "address {address:08X} size {size:06X}");
        }
    }
}

#[test]
fn reduce_removes_mask_bits() {
    // LoROM: A15 removed, banks become contiguous 32 KiB chunks
    assert_eq!(reduce(0x008000, 0x8000), 0x000000);
    assert_eq!(reduce(0x018000, 0x8000), 0x008000);
    assert_eq!(reduce(0x01FFFF, 0x8000), 0x00FFFF);
    // HiROM SRAM: A13-A15 removed
    assert_eq!(reduce(0x216000, 0xE000), 0x042000);
    assert_eq!(reduce(0x1234, 0), 0x1234);
}

#[test]
fn lookup_applies_base_size_and_mask() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00-3f,80-bf:8000-ffff", 0, 0x60000, 0x8000).unwrap();
    bus.map(Handler::B, "7e-7f:0000-ffff", 0, 0x20000, 0).unwrap();

    assert_eq!(bus.lookup(0x008000), Some((Handler::A, 0x000000)));
    assert_eq!(bus.lookup(0x01FFFF), Some((Handler::A, 0x00FFFF)));
    // Bank $0C is past the end of a 384 KiB ROM
    assert_eq!(bus.lookup(0x0C8000), Some((Handler::A, 0x040000)));
    assert_eq!(bus.lookup(0x7F0010), Some((Handler::B, 0x010010)));
    assert_eq!(bus.lookup(0x002000), None);
    assert_eq!(bus.lookup(0x400000), None);
}

#[test]
fn split_pages_resolve_per_byte() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00:2100-213f", 0, 0, 0).unwrap();
    bus.map(Handler::B, "00:2140-217f", 0, 4, 0).unwrap();

    assert_eq!(bus.lookup(0x00213F), Some((Handler::A, 0x00213F)));
    assert_eq!(bus.lookup(0x002145), Some((Handler::B, 1)));
    assert_eq!(bus.lookup(0x002180), None);
}

#[test]
fn overlap_is_rejected_without_changes() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00-3f:8000-ffff", 0, 0, 0).unwrap();

    let err = bus.map(Handler::B, "30-4f:0000-8000", 0, 0, 0).unwrap_err();
    assert_eq!(err, BusError::Overlap { pattern: "30-4f:0000-8000".into(), address: 0x308000 });
    assert_eq!(bus.lookup(0x400000), None);
    assert_eq!(bus.mapping_count(), 1);
}

#[test]
fn unmap_frees_slots() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00:2800-2801", 0, 0, 0).unwrap();
    bus.map(Handler::B, "00:2802", 0, 0, 0).unwrap();

    bus.unmap("00:2800").unwrap();
    assert_eq!(bus.mapping_count(), 2);
    assert_eq!(bus.lookup(0x002800), None);
    assert_eq!(bus.lookup(0x002801), Some((Handler::A, 0x002801)));

    bus.unmap("00:2800-2801").unwrap();
    assert_eq!(bus.mapping_count(), 1);

    // The freed range can be mapped again
    bus.map(Handler::B, "00:2800-2801", 0, 0, 0).unwrap();
    assert_eq!(bus.lookup(0x002800), Some((Handler::B, 0x002800)));
}

#[test]
fn self_overlapping_pattern_counts_addresses_once() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00-01,01-02:0000", 0, 0, 0).unwrap();
    assert_eq!(bus.lookup(0x010000), Some((Handler::A, 0x010000)));

    bus.unmap("00-01,01-02:0000").unwrap();
    assert_eq!(bus.mapping_count(), 0);
    assert_eq!(bus.lookup(0x010000), None);
}

#[test]
fn slots_are_exhausted_at_255() {
    let mut bus = Bus::new();
    for i in 0..255 {
        bus.map(Handler::A, &format!("10:{i:04x}"), 0, 0, 0).unwrap();
    }
    assert_eq!(bus.map(Handler::A, "10:ffff", 0, 0, 0), Err(BusError::SlotsExhausted));
}

#[test]
fn state_encoding_skips_map() {
    let mut bus = Bus::new();
    bus.map(Handler::A, "00:0000-ffff", 0, 0, 0).unwrap();

    let config = bincode::config::standard();
    let bytes = bincode::encode_to_vec(&bus, config).unwrap();
    assert!(bytes.is_empty());
}
