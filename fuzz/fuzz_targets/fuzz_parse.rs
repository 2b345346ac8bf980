#![no_main]

use jpeg_redaction::{tiff::Tiff, Jpeg, LoadOptions};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Any input must produce a value or an error, never a panic
    if let Ok(jpeg) = Jpeg::from_reader(&mut Cursor::new(data), LoadOptions::default()) {
        let _ = jpeg.descriptor();
        let _ = jpeg.markers();
        if let Some(exif) = jpeg.exif() {
            let _ = exif.exif_info();
            let _ = exif.thumbnail();
            for tag in exif.ifd0().tags() {
                let _ = tag.to_string();
            }
        }
    }

    // The same bytes as a bare TIFF stream
    if let Ok(tiff) = Tiff::parse(data) {
        let _ = tiff.exif_info();
    }
});
