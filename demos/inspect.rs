//! Example: Inspect the EXIF metadata and Obscura descriptor of a JPEG
//!
//! Run: `cargo run --example inspect -- <file.jpg>`

use jpeg_redaction::{Jpeg, Segment};
use std::env;

fn main() -> jpeg_redaction::Result<()> {
    env_logger::try_init().ok();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <image_file>", args[0]);
        std::process::exit(1);
    }

    let filename = &args[1];
    println!("Parsing: {}", filename);

    let jpeg = Jpeg::open(filename)?;

    match jpeg.exif() {
        Some(exif) => {
            println!("\n✓ EXIF ({:?}): {}", exif.byte_order(), exif.exif_info());
            println!("\nIFD0:");
            for tag in exif.ifd0().tags() {
                println!("  {tag}");
            }
            for (name, ifd) in [("EXIF", exif.exif_ifd()), ("GPS", exif.gps_ifd())] {
                if let Some(ifd) = ifd {
                    println!("{name}:");
                    for tag in ifd.tags() {
                        println!("  {tag}");
                    }
                }
            }
            if let Some(thumb) = exif.thumbnail() {
                let dims = match (thumb.width, thumb.height) {
                    (Some(w), Some(h)) => format!("{}x{}", w, h),
                    _ => "unknown dimensions".to_string(),
                };
                println!("\n✓ Embedded {:?} thumbnail ({}, {} bytes)", thumb.format, dims, thumb.data.len());
            }
        }
        None => println!("\n✗ No EXIF metadata found"),
    }

    match jpeg.descriptor() {
        Some(descriptor) => {
            println!("\n✓ Descriptor ({} bytes)", descriptor.len());
            println!("  {}", String::from_utf8_lossy(descriptor));
        }
        None => println!("\n✗ No descriptor found"),
    }

    println!("\nSegment breakdown:");
    for (i, segment) in jpeg.markers().iter().enumerate() {
        match segment {
            Segment::Marker(m) => println!("  [{i}] {} ({} bytes)", m.label(), m.payload().len()),
            Segment::Exif => println!("  [{i}] EXIF"),
            Segment::Obscura => println!("  [{i}] Obscura"),
            Segment::ImageData(data) => println!("  [{i}] Image data ({} bytes)", data.len()),
        }
    }

    Ok(())
}
