//! Safety tests - basic validation of security mechanisms
//!
//! These tests verify that safety limits and checks are in place.
//! Comprehensive testing should be done with fuzzing (cargo-fuzz).

use jpeg_redaction::{
    test_utils::*,
    tiff::{Tiff, MAX_IFD_TAGS, MAX_TAG_DATA_LENGTH},
    ByteOrder, Error, Jpeg, LoadOptions, MAX_DESCRIPTOR_SIZE,
};
use std::io::Cursor;

/// Little-endian TIFF header followed by raw IFD bytes at offset 8
fn tiff_with_ifd(ifd: &[u8]) -> Vec<u8> {
    let mut data = b"II\x2a\0\x08\0\0\0".to_vec();
    data.extend_from_slice(ifd);
    data
}

fn le_entry(id: u16, field_type: u16, count: u32, value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&field_type.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out
}

#[test]
fn test_tag_data_limit_constant() {
    assert_eq!(MAX_TAG_DATA_LENGTH, 100_000_000);
    assert!(MAX_IFD_TAGS > 100, "Allow reasonable tag counts");
    assert!(MAX_IFD_TAGS < 10000, "Prevent excessive tag counts");
}

#[test]
fn test_huge_tag_count_rejected_without_allocating() {
    // 0x1000_0000 DOUBLEs = 2 GB
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x010F, 12, 0x1000_0000, 26));
    ifd.extend_from_slice(&[0; 4]);

    let result = Tiff::parse(&tiff_with_ifd(&ifd));
    assert!(matches!(
        result,
        Err(Error::MalformedTag { tag: 0x010F, .. })
    ));
}

#[test]
fn test_declared_length_past_end() {
    // ASCII x 1000 at offset 26, but the stream ends right after the IFD
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x010F, 2, 1000, 26));
    ifd.extend_from_slice(&[0; 4]);

    let result = Tiff::parse(&tiff_with_ifd(&ifd));
    assert!(matches!(
        result,
        Err(Error::TruncatedRead { offset: 26, expected: 1000 })
    ));
}

#[test]
fn test_sub_ifd_pointing_at_itself() {
    // EXIF pointer back to IFD0
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x8769, 4, 1, 8));
    ifd.extend_from_slice(&[0; 4]);

    let result = Tiff::parse(&tiff_with_ifd(&ifd));
    assert!(matches!(
        result,
        Err(Error::RecursionLimitExceeded { offset: 8, .. })
    ));
}

#[test]
fn test_duplicated_exif_pointers() {
    // Two EXIF pointers to the same empty IFD @38
    let mut ifd = 2u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x8769, 4, 1, 38));
    ifd.extend(le_entry(0x8769, 4, 1, 38));
    ifd.extend_from_slice(&[0; 4]);
    ifd.extend_from_slice(&[0; 6]);

    let result = Tiff::parse(&tiff_with_ifd(&ifd));
    assert!(matches!(
        result,
        Err(Error::RecursionLimitExceeded { offset: 38, .. })
    ));
}

#[test]
fn test_fan_out_is_not_unfolded() {
    // Each level holds `fan_out` EXIF pointers to the next level, which
    // would unfold into fan_out^levels directories if followed
    let (levels, fan_out) = (8u32, 16u32);
    let level_size = 2 + 12 * fan_out + 4;
    let level_offset = |level: u32| 8 + level * level_size;

    let mut body = Vec::new();
    for level in 0..levels {
        body.extend_from_slice(&(fan_out as u16).to_le_bytes());
        for _ in 0..fan_out {
            body.extend(le_entry(0x8769, 4, 1, level_offset(level + 1)));
        }
        body.extend_from_slice(&[0; 4]);
    }
    body.extend_from_slice(&[0; 6]);
    let data = tiff_with_ifd(&body);
    assert!(data.len() < 2048);

    let result = Tiff::parse(&data);
    assert!(matches!(
        result,
        Err(Error::RecursionLimitExceeded { .. })
    ));
}

#[test]
fn test_exif_pointer_into_thumbnail_ifd() {
    // IFD0 @8 chains to IFD1 @26, and its EXIF pointer also targets 26
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x8769, 4, 1, 26));
    ifd.extend_from_slice(&26u32.to_le_bytes());
    ifd.extend_from_slice(&[0; 6]);

    let data = build_jpeg(&[exif_segment(&tiff_with_ifd(&ifd))]);
    for options in [LoadOptions::default(), LoadOptions::new().lazy()] {
        let result = Jpeg::from_reader(&mut Cursor::new(&data), options).and_then(|mut jpeg| {
            jpeg.load_exif()?;
            Ok(jpeg)
        });
        assert!(matches!(
            result,
            Err(Error::RecursionLimitExceeded { offset: 26, .. })
        ));
    }
}

#[test]
fn test_next_ifd_cycle() {
    // IFD0 -> IFD @26 -> IFD0
    let mut data = tiff_with_ifd(&[0, 0, 26, 0, 0, 0]);
    data.extend_from_slice(&[0; 12]);
    data.extend_from_slice(&[0, 0, 8, 0, 0, 0]);

    let result = Tiff::parse(&data);
    assert!(matches!(
        result,
        Err(Error::RecursionLimitExceeded { offset: 8, .. })
    ));
}

#[test]
fn test_depth_limit_is_configurable() {
    let data = build_jpeg(&[exif_segment(&sample_exif_tiff(ByteOrder::LittleEndian))]);

    // IFD0 -> EXIF needs two levels
    let shallow = LoadOptions::new().max_ifd_depth(1);
    let result = Jpeg::from_reader(&mut Cursor::new(&data), shallow);
    assert!(matches!(result, Err(Error::RecursionLimitExceeded { .. })));

    let enough = LoadOptions::new().max_ifd_depth(2);
    assert!(Jpeg::from_reader(&mut Cursor::new(&data), enough).is_ok());
}

#[test]
fn test_too_many_ifd_entries() {
    let ifd = (MAX_IFD_TAGS + 1).to_le_bytes();
    assert!(matches!(
        Tiff::parse(&tiff_with_ifd(&ifd)),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_unknown_field_type() {
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x0100, 99, 1, 0));
    ifd.extend_from_slice(&[0; 4]);
    assert!(matches!(
        Tiff::parse(&tiff_with_ifd(&ifd)),
        Err(Error::MalformedTag { tag: 0x0100, .. })
    ));
}

#[test]
fn test_missing_next_pointer_tolerated() {
    // One inline SHORT and then EOF where the next-IFD offset would be
    let mut ifd = 1u16.to_le_bytes().to_vec();
    ifd.extend(le_entry(0x0112, 3, 1, 1));

    let tiff = Tiff::parse(&tiff_with_ifd(&ifd)).unwrap();
    assert_eq!(tiff.exif_info().orientation, Some(1));
    assert!(tiff.thumbnail_ifd().is_none());
}

#[test]
fn test_descriptor_limit() {
    let mut jpeg = Jpeg::from_reader(
        &mut Cursor::new(build_jpeg(&[])),
        LoadOptions::default(),
    )
    .unwrap();
    assert!(jpeg.set_descriptor(&vec![0; MAX_DESCRIPTOR_SIZE]).is_ok());
    assert!(matches!(
        jpeg.set_descriptor(&vec![0; MAX_DESCRIPTOR_SIZE + 1]),
        Err(Error::DescriptorTooLarge { .. })
    ));

    // The largest descriptor does not fit in one marker with its type tag
    assert!(matches!(
        jpeg.to_bytes(),
        Err(Error::MarkerTooLarge { max: 65533, .. })
    ));
}

#[test]
fn test_foreign_and_malformed_app_markers_survive() {
    let data = build_jpeg(&[
        app_segment(0xE7, b""),
        app_segment(0xE7, b"no-terminator"),
        app_segment(0xEB, b"JP\0\0garbage"),
        app_segment(0xE1, b"Exif"), // too short to be EXIF
    ]);
    let jpeg = Jpeg::from_reader(&mut Cursor::new(&data), LoadOptions::default()).unwrap();
    assert!(jpeg.descriptor().is_none());
    assert!(jpeg.exif().is_none());
    assert_eq!(jpeg.to_bytes().unwrap(), data);
}

#[test]
fn test_marker_length_below_two() {
    let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01];
    assert!(matches!(
        Jpeg::from_reader(&mut Cursor::new(&data[..]), LoadOptions::default()),
        Err(Error::MalformedMarker { marker: 0xFFE0, .. })
    ));
}

#[test]
fn test_garbage_between_markers() {
    let data = [0xFF, 0xD8, 0x00, 0xD9];
    assert!(matches!(
        Jpeg::from_reader(&mut Cursor::new(&data[..]), LoadOptions::default()),
        Err(Error::MalformedMarker { .. })
    ));
}

#[test]
fn test_bad_exif_header_is_fatal() {
    let data = build_jpeg(&[exif_segment(b"XX\0\x2a\0\0\0\x08")]);
    assert!(matches!(
        Jpeg::from_reader(&mut Cursor::new(&data), LoadOptions::default()),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_unsupported_sink() {
    struct AppendOnly(Vec<u8>);

    impl std::io::Write for AppendOnly {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl std::io::Seek for AppendOnly {
        fn seek(&mut self, _: std::io::SeekFrom) -> std::io::Result<u64> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "append-only",
            ))
        }
    }

    let tiff = Tiff::parse(&ACME_TIFF).unwrap();
    let mut sink = AppendOnly(Vec::new());
    assert!(matches!(tiff.write(&mut sink), Err(Error::UnsupportedSink)));
    assert!(sink.0.is_empty());
}
