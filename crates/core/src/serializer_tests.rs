// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn round_trips_fixed_width_values_little_endian() {
    let mut s = Serializer::new(Endianness::Little);
    s.write_u8(7).write_u16(1234).write_u32(0xdead_beef).write_u64(u64::MAX).write_i64(-1).write_bool(true);
    let bytes = s.into_bytes();

    let mut d = Deserializer::new(Endianness::Little, &bytes);
    assert_eq!(d.read_u8().unwrap(), 7);
    assert_eq!(d.read_u16().unwrap(), 1234);
    assert_eq!(d.read_u32().unwrap(), 0xdead_beef);
    assert_eq!(d.read_u64().unwrap(), u64::MAX);
    assert_eq!(d.read_i64().unwrap(), -1);
    assert!(d.read_bool().unwrap());
    assert_eq!(d.remaining(), 0);
}

#[test]
fn round_trips_fixed_width_values_big_endian() {
    let mut s = Serializer::new(Endianness::Big);
    s.write_u32(42);
    let bytes = s.into_bytes();
    assert_eq!(bytes, vec![0, 0, 0, 42]);
    let mut d = Deserializer::new(Endianness::Big, &bytes);
    assert_eq!(d.read_u32().unwrap(), 42);
}

#[test]
fn varint_round_trips_across_byte_boundaries() {
    for v in [0u64, 1, 127, 128, 300, 16384, u64::MAX] {
        let mut s = Serializer::new(Endianness::Little);
        s.write_varint(v);
        let bytes = s.into_bytes();
        let mut d = Deserializer::new(Endianness::Little, &bytes);
        assert_eq!(d.read_varint().unwrap(), v);
    }
}

#[test]
fn bytes_and_str_round_trip_with_length_prefix() {
    let mut s = Serializer::new(Endianness::Little);
    s.write_str("hello").write_bytes(&[1, 2, 3]);
    let bytes = s.into_bytes();
    let mut d = Deserializer::new(Endianness::Little, &bytes);
    assert_eq!(d.read_str().unwrap(), "hello");
    assert_eq!(d.read_bytes().unwrap(), &[1, 2, 3]);
}

#[test]
fn reading_past_the_end_is_an_error() {
    let bytes = [0u8; 2];
    let mut d = Deserializer::new(Endianness::Little, &bytes);
    assert!(d.read_u32().is_err());
}

#[test]
fn native_endianness_matches_target_cfg() {
    let expected = if cfg!(target_endian = "little") { Endianness::Little } else { Endianness::Big };
    assert_eq!(Endianness::native(), expected);
}
