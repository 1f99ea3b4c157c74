//! End-to-end decoding of printer captures.

use pocket_print_core::encoder::{encode_indexed, BackendKind, PngBackend, RgbaPng};
use pocket_print_core::protocol::{build_packet, rle, Command, Packet};
use pocket_print_core::raster::Palette;
use pocket_print_core::{
    decode_capture, ChecksumPolicy, Error, PngOptions, SessionConfig, SessionOutcome, Shades,
};
use std::io::Cursor;

fn init() -> Vec<u8> {
    Packet::new(Command::Init, 0, vec![]).to_bytes()
}

fn fill(tiles: &[u8]) -> Vec<u8> {
    Packet::new(Command::Fill, 0, tiles.to_vec()).to_bytes()
}

fn fill_compressed(tiles: &[u8]) -> Vec<u8> {
    Packet::new(Command::Fill, 1, rle::compress(tiles)).to_bytes()
}

fn print(palette: u8) -> Vec<u8> {
    Packet::new(Command::Print, 0, vec![0x01, 0x13, palette, 0x40]).to_bytes()
}

/// Decodes a PNG without transformations: indices for palette images.
fn decode_png(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>, Option<Vec<u8>>) {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());
    let palette = reader.info().palette.as_ref().map(|p| p.to_vec());
    (info, buf, palette)
}

async fn decode_image(capture: &[u8], config: &SessionConfig) -> pocket_print_core::PrintedImage {
    match decode_capture(capture, config).await {
        SessionOutcome::Image(image) => image,
        other => panic!("expected image, got {:?}", other),
    }
}

#[tokio::test]
async fn single_row_print_is_160_by_8() {
    let mut capture = init();
    capture.extend(fill(&[0x00; 40]));
    capture.extend(print(0b1110_0100));

    let image = decode_image(&capture, &SessionConfig::default()).await;
    assert_eq!(image.width(), 160);
    assert_eq!(image.height(), 8);

    let (info, pixels, palette) = decode_png(image.png());
    assert_eq!(info.width, 160);
    assert_eq!(info.height, 8);
    assert_eq!(info.color_type, png::ColorType::Indexed);
    let expected = Palette::new(0b1110_0100).map(0);
    assert!(pixels.iter().all(|&p| p == expected));
    assert_eq!(palette.unwrap(), Shades::grayscale().plte().to_vec());
}

#[tokio::test]
async fn checksum_example_from_protocol_notes() {
    assert_eq!(
        pocket_print_core::protocol::checksum(4, 0, &[0x01, 0x02, 0x03]),
        13
    );
}

#[tokio::test]
async fn corrupted_packet_policy() {
    let mut good = init();
    good.extend(fill(&[0x00; 320]));
    good.extend(print(0xE4));

    // Peer reports the corrupted packet as fine: session is abandoned.
    let mut capture = good.clone();
    capture.extend(build_packet(4, 0, &[0x01, 0x09, 0x03], 13, 0x01));
    assert!(matches!(
        decode_capture(&capture, &SessionConfig::default()).await,
        SessionOutcome::Failed(Error::ChecksumMismatch { .. })
    ));

    // Peer also flagged it: packet skipped, decode continues.
    let mut capture = build_packet(4, 0, &[0x01, 0x09, 0x03], 13, 0x00);
    capture.extend(good.clone());
    let image = decode_image(&capture, &SessionConfig::default()).await;
    assert_eq!(image.height(), 8);

    // Lenient policy skips both.
    let mut capture = build_packet(4, 0, &[0x01, 0x09, 0x03], 13, 0x01);
    capture.extend(good);
    let lenient = SessionConfig {
        checksum_policy: ChecksumPolicy::Lenient,
        ..SessionConfig::default()
    };
    let image = decode_image(&capture, &lenient).await;
    assert_eq!(image.height(), 8);
}

#[tokio::test]
async fn compressed_and_raw_fills_decode_identically() {
    let tiles: Vec<u8> = (0..640u32).map(|i| if i % 7 < 3 { 0xFF } else { i as u8 }).collect();

    let mut raw = init();
    raw.extend(fill(&tiles));
    raw.extend(print(0xE4));

    let mut packed = init();
    packed.extend(fill_compressed(&tiles[..320]));
    packed.extend(fill_compressed(&tiles[320..]));
    packed.extend(print(0xE4));

    let config = SessionConfig::default();
    let a = decode_image(&raw, &config).await;
    let b = decode_image(&packed, &config).await;
    assert_eq!(a.height(), 16);
    assert_eq!(decode_png(a.png()).1, decode_png(b.png()).1);
}

#[tokio::test]
async fn decoding_twice_is_identical() {
    let mut capture = init();
    capture.extend(fill(&[0x3C; 320]));
    capture.extend(print(0xD2));
    capture.extend(init());
    capture.extend(fill(&[0xA5; 640]));
    capture.extend(print(0xE4));

    let config = SessionConfig::default();
    let first = decode_image(&capture, &config).await;
    let second = decode_image(&capture, &config).await;
    assert_eq!(first.height(), 24);
    assert_eq!(first.png(), second.png());
}

#[tokio::test]
async fn rgba_backend_matches_palette_mapping() {
    let mut capture = init();
    // Every pixel has raw index 3.
    capture.extend(fill(&[0xFF; 320]));
    capture.extend(print(0xE4));

    let config = SessionConfig {
        png: PngOptions {
            backend: BackendKind::Rgba,
            ..PngOptions::default()
        },
        ..SessionConfig::default()
    };
    let image = decode_image(&capture, &config).await;
    let (info, pixels, _) = decode_png(image.png());
    assert_eq!(info.color_type, png::ColorType::Rgba);
    // Index 3 through 0xE4 is shade 0: opaque black.
    assert!(pixels.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn indexed_png_round_trips_through_decoder() {
    let pixels: Vec<u8> = (0..160 * 16).map(|i| (i % 4) as u8).collect();
    let shades = Shades::from_hex(&["#0F380F", "#306230", "#8BAC0F", "#9BBC0F"]).unwrap();
    let bytes = encode_indexed(&pixels, 160, 16, &shades, 9).unwrap();

    let (info, decoded, palette) = decode_png(&bytes);
    assert_eq!((info.width, info.height), (160, 16));
    assert_eq!(decoded, pixels);
    assert_eq!(palette.unwrap(), shades.plte().to_vec());

    let rgba = RgbaPng::new(shades).encode(&pixels, 160, 16).unwrap();
    let (_, decoded, _) = decode_png(&rgba);
    assert_eq!(&decoded[4..8], &[0x30, 0x62, 0x30, 0xFF]);
}

#[tokio::test]
async fn session_without_print_emits_nothing() {
    let mut capture = init();
    capture.extend(fill(&[0x00; 320]));
    assert!(matches!(
        decode_capture(&capture, &SessionConfig::default()).await,
        SessionOutcome::Empty
    ));
}

#[tokio::test]
async fn truncated_session_keeps_earlier_parts() {
    let mut capture = init();
    capture.extend(fill(&[0x00; 320]));
    capture.extend(print(0xE4));
    let next = fill(&[0x00; 320]);
    capture.extend_from_slice(&next[..100]);

    let image = decode_image(&capture, &SessionConfig::default()).await;
    assert_eq!(image.height(), 8);
}
