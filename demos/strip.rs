//! Example: Strip identifying metadata and record a descriptor
//!
//! Removes GPS, the thumbnail and camera identification from the EXIF
//! block, then writes the descriptor into the output.
//!
//! Run: `cargo run --example strip -- <input.jpg> <output.jpg> [descriptor]`

use jpeg_redaction::{tiff::tags, Jpeg};
use std::env;

fn main() -> jpeg_redaction::Result<()> {
    env_logger::try_init().ok();
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <input.jpg> <output.jpg> [descriptor]", args[0]);
        std::process::exit(1);
    }

    let mut jpeg = Jpeg::open(&args[1])?;

    if let Some(exif) = jpeg.exif_mut() {
        let mut removed = 0;
        for id in [
            tags::GPS_IFD_POINTER,
            tags::MAKE,
            tags::MODEL,
            tags::ARTIST,
            tags::MAKER_NOTE,
        ] {
            removed += exif.remove_tag(id);
        }
        if exif.remove_thumbnail() {
            println!("Removed thumbnail");
        }
        println!("Removed {removed} tag(s)");
    }

    let descriptor = args.get(3).map_or("redacted", String::as_str);
    jpeg.set_descriptor(descriptor.as_bytes())?;
    jpeg.write_to(&args[2])?;
    println!("Wrote {}", args[2]);

    Ok(())
}
