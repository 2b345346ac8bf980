#![no_main]

use jpeg_redaction::{tiff::tags, Jpeg, LoadOptions};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Parse, modify and write back
    let Ok(mut jpeg) = Jpeg::from_reader(&mut Cursor::new(data), LoadOptions::default()) else {
        return;
    };

    let _ = jpeg.to_bytes();

    if let Some(exif) = jpeg.exif_mut() {
        exif.remove_tag(tags::GPS_IFD_POINTER);
        exif.remove_thumbnail();
    }
    let _ = jpeg.set_descriptor(b"fuzz");
    if let Ok(output) = jpeg.to_bytes() {
        // Whatever we write, we must be able to read back
        let reread = Jpeg::from_reader(&mut Cursor::new(&output), LoadOptions::default());
        assert!(reread.is_ok(), "re-reading our own output failed: {:?}", reread.err());
    }

    jpeg.strip_exif();
    jpeg.clear_descriptor();
    let _ = jpeg.to_bytes();
});
