// Integration tests using the test_utils module

#[cfg(test)]
mod fixture_tests {
    use jpeg_redaction::{
        test_utils::*, tiff::tags, ByteOrder, Jpeg, LoadOptions, Segment, ThumbnailFormat,
    };
    use std::io::Cursor;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sample_jpeg(order: ByteOrder) -> Vec<u8> {
        build_jpeg(&[
            app_segment(0xE0, b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0"),
            exif_segment(&sample_exif_tiff(order)),
            app_segment(0xE1, b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>"),
            app_segment(0xE2, b"ICC_PROFILE\0\x01\x01"),
        ])
    }

    fn load(data: &[u8]) -> Jpeg {
        Jpeg::from_reader(&mut Cursor::new(data), LoadOptions::default())
            .expect("Failed to parse JPEG")
    }

    #[test]
    fn test_read_camera_metadata() {
        init_logging();
        let jpeg = load(&sample_jpeg(ByteOrder::LittleEndian));
        let exif = jpeg.exif().expect("EXIF should be present");

        let info = exif.exif_info();
        assert_eq!(info.make.as_deref(), Some("Canon"));
        assert_eq!(info.date_time_original.as_deref(), Some("2012:08:23 10:00:00"));

        let thumbnail = exif.thumbnail().expect("thumbnail should be present");
        assert_eq!(thumbnail.format, ThumbnailFormat::Jpeg);
        assert_eq!(thumbnail.data, SAMPLE_THUMBNAIL.to_vec());

        let labels: Vec<_> = jpeg
            .markers()
            .iter()
            .map(|s| match s {
                Segment::Marker(m) => m.label(),
                Segment::Exif => "EXIF",
                Segment::Obscura => "OBSCURA",
                Segment::ImageData(_) => "IMAGE",
            })
            .collect();
        assert_eq!(labels, ["SOI", "APP0", "EXIF", "APP1", "APP2", "DQT", "IMAGE"]);
    }

    #[test]
    fn test_redaction_workflow() {
        init_logging();
        let mut jpeg = load(&sample_jpeg(ByteOrder::BigEndian));

        let exif = jpeg.exif_mut().unwrap();
        assert_eq!(exif.remove_tag(tags::GPS_IFD_POINTER), 1);
        assert_eq!(exif.remove_tag(tags::MAKE), 1);
        assert!(exif.remove_thumbnail());
        jpeg.set_descriptor(b"redacted-by-v1").unwrap();

        let output = jpeg.to_bytes().unwrap();
        let verify = load(&output);

        assert_eq!(verify.descriptor(), Some(&b"redacted-by-v1"[..]));
        let exif = verify.exif().unwrap();
        assert!(exif.gps_ifd().is_none());
        assert!(exif.thumbnail().is_none());
        assert!(exif.exif_info().make.is_none());
        assert_eq!(
            exif.exif_info().date_time_original.as_deref(),
            Some("2012:08:23 10:00:00")
        );

        // the descriptor lands after the APPn run, before DQT
        let position = verify
            .markers()
            .iter()
            .position(|s| *s == Segment::Obscura)
            .unwrap();
        assert_eq!(position, 5);

        // and the compressed image is untouched
        let original = sample_jpeg(ByteOrder::BigEndian);
        assert!(output.ends_with(&original[original.len() - 20..]));
    }

    #[test]
    fn test_round_trip_is_stable() {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let first = load(&sample_jpeg(order)).to_bytes().unwrap();
            let second = load(&first).to_bytes().unwrap();
            assert_eq!(first, second);

            let reloaded = load(&second);
            assert_eq!(
                reloaded.exif().unwrap().thumbnail().map(|t| t.data),
                Some(SAMPLE_THUMBNAIL.to_vec())
            );
        }
    }

    #[test]
    fn test_descriptor_replace_and_clear() {
        let data = build_jpeg(&[
            app_segment(0xE0, b"JFIF\0"),
            obscura_segment(b"DESCRIPTOR", b"first"),
        ]);
        let mut jpeg = load(&data);
        assert_eq!(jpeg.descriptor(), Some(&b"first"[..]));
        assert_eq!(jpeg.to_bytes().unwrap(), data);

        jpeg.set_descriptor(&[0xFF; 16]).unwrap();
        let replaced = load(&jpeg.to_bytes().unwrap());
        assert_eq!(replaced.descriptor(), Some(&[0xFF; 16][..]));

        jpeg.clear_descriptor();
        let cleared = load(&jpeg.to_bytes().unwrap());
        assert!(cleared.descriptor().is_none());
    }

    #[test]
    fn test_redaction_marker_is_dropped() {
        let data = build_jpeg(&[
            obscura_segment(b"REDACTION", &[1, 2, 3]),
            obscura_segment(b"DESCRIPTOR", b"kept"),
        ]);
        let jpeg = load(&data);
        assert_eq!(jpeg.descriptor(), Some(&b"kept"[..]));

        let expected = build_jpeg(&[obscura_segment(b"DESCRIPTOR", b"kept")]);
        assert_eq!(jpeg.to_bytes().unwrap(), expected);
    }

    #[test]
    fn test_file_round_trip() {
        init_logging();
        let dir = std::env::temp_dir();
        let input_path = dir.join("jpeg_redaction_integration_input.jpg");
        let output_path = dir.join("jpeg_redaction_integration_output.jpg");
        std::fs::write(&input_path, sample_jpeg(ByteOrder::LittleEndian)).unwrap();

        let mut jpeg = Jpeg::open(&input_path).expect("Failed to open");
        jpeg.strip_exif();
        jpeg.set_descriptor(b"stripped").unwrap();
        jpeg.write_to(&output_path).expect("Failed to write");

        let verify = Jpeg::open_with(&output_path, LoadOptions::new().lazy()).unwrap();
        assert!(verify.exif().is_none());
        assert_eq!(verify.descriptor(), Some(&b"stripped"[..]));

        // Cleanup
        std::fs::remove_file(&input_path).ok();
        std::fs::remove_file(&output_path).ok();
    }

    #[test]
    fn test_open_missing_file() {
        let result = Jpeg::open("/nonexistent/jpeg_redaction.jpg");
        assert!(matches!(result, Err(jpeg_redaction::Error::Io(_))));
    }
}
