mod common;

use common::*;
use lopdf::{Document, Object};
use pdf_squeeze::{
    compress_pdf_bytes, CancellationToken, CompressOptions, CompressionLevel, ErrorKind,
    ImageOutcome, Pipeline, SkipReason, Stage,
};

#[test]
fn ten_page_document_with_large_rgb_image() {
    let mut pdf = PdfBuilder::new();
    let image_id = pdf.add_object(flate_rgb_image(3000, 2000, 7));
    for _ in 0..10 {
        pdf.add_page(&[image_id]);
    }
    let input = pdf.build();

    let options = CompressOptions {
        level: CompressionLevel::Balanced,
        verbose: false,
    };
    let (output, result) = compress_pdf_bytes(&input, &options).unwrap();

    assert!(output.len() < input.len());
    assert!(result.is_reduced());
    assert_eq!(result.output_size, output.len());
    assert_eq!(result.total_images, 1);
    assert_eq!(result.recompressed_images, 1);
    assert!(matches!(
        result.outcomes[0].1,
        ImageOutcome::Swapped { width: 1600, height: 1067, .. }
    ));

    let doc = Document::load_mem(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 10);

    let found = images(&doc);
    assert_eq!(found.len(), 1);
    let (_, stream) = found[0];
    assert_eq!(int(stream, b"Width"), 1600);
    assert_eq!(int(stream, b"Height"), 1067);
    assert_eq!(int(stream, b"BitsPerComponent"), 8);
    assert_eq!(filter_of(stream), b"DCTDecode".to_vec());
    assert_eq!(stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceRGB");
    assert_eq!(&stream.content[..2], &[0xFF, 0xD8]);
}

#[test]
fn strong_caps_the_longer_side_at_900() {
    let mut pdf = PdfBuilder::new();
    let image_id = pdf.add_object(flate_rgb_image(600, 1200, 3));
    pdf.add_page(&[image_id]);
    let input = pdf.build();

    let (_, result) = Pipeline::new(CompressionLevel::Strong).run(&input).unwrap();
    assert!(matches!(
        result.outcomes[0].1,
        ImageOutcome::Swapped { width: 450, height: 900, .. }
    ));
}

#[test]
fn every_supported_color_space_is_processed() {
    let (w, h) = (120u32, 80u32);
    let mut pdf = PdfBuilder::new();

    let gray = pdf.add_object(flate_gray_image(w, h, 1));
    let rgb = pdf.add_object(flate_rgb_image(w, h, 2));
    let cmyk = pdf.add_object(lopdf::Stream::new(
        image_dict(w, h, name("DeviceCMYK"), "FlateDecode"),
        deflate(&noisy_samples(w, h, 4, 3)),
    ));
    let palette: Vec<u8> = (0..=255u32).flat_map(|i| [i as u8, (255 - i) as u8, (i / 2) as u8]).collect();
    let indexed_cs = Object::Array(vec![
        name("Indexed"),
        name("DeviceRGB"),
        Object::Integer(255),
        Object::String(palette, lopdf::StringFormat::Hexadecimal),
    ]);
    let indexed = pdf.add_object(lopdf::Stream::new(
        image_dict(w, h, indexed_cs, "FlateDecode"),
        deflate(&noisy_samples(w, h, 1, 4)),
    ));
    pdf.add_page(&[gray, rgb, cmyk, indexed]);
    let input = pdf.build();

    let (output, result) = Pipeline::new(CompressionLevel::Strong).run(&input).unwrap();
    assert!(output.len() <= input.len());
    assert_eq!(result.total_images, 4);
    for (id, outcome) in &result.outcomes {
        assert!(
            matches!(
                outcome,
                ImageOutcome::Swapped { width: 120, height: 80, .. }
                    | ImageOutcome::Skipped(SkipReason::NotSmaller)
            ),
            "{:?}: {:?}",
            id,
            outcome
        );
    }
}

#[test]
fn lossless_keeps_images_and_pages() {
    let mut pdf = PdfBuilder::new();
    let image_id = pdf.add_object(flate_rgb_image(64, 64, 5));
    pdf.add_page(&[image_id]);
    pdf.add_page(&[image_id]);
    // Unreachable leftovers the cleanup pass can drop.
    for i in 0..50 {
        pdf.add_object(lopdf::Stream::new(lopdf::dictionary! {}, vec![i as u8; 2048]));
    }
    let input = pdf.build();

    let (output, result) = Pipeline::new(CompressionLevel::Lossless).run(&input).unwrap();
    assert!(output.len() < input.len());
    assert_eq!(result.recompressed_images, 0);
    assert_eq!(result.total_images, 1);

    let doc = Document::load_mem(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
    let found = images(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(filter_of(found[0].1), b"FlateDecode".to_vec());
    assert_eq!(int(found[0].1, b"Width"), 64);
}

#[test]
fn progress_reports_each_stage() {
    let mut pdf = PdfBuilder::new();
    let image_id = pdf.add_object(flate_rgb_image(400, 300, 9));
    pdf.add_page(&[image_id]);
    let input = pdf.build();

    let mut stages = Vec::new();
    Pipeline::new(CompressionLevel::Balanced)
        .on_progress(|p| stages.push(p.stage))
        .run(&input)
        .unwrap();

    assert_eq!(stages.first(), Some(&Stage::Loading));
    assert_eq!(stages.last(), Some(&Stage::Done));
    assert!(stages.contains(&Stage::Images));
    assert!(stages.contains(&Stage::Serializing));
    assert!(stages.contains(&Stage::Cleanup));
}

#[test]
fn cancelled_run_returns_nothing() {
    let mut pdf = PdfBuilder::new();
    let image_id = pdf.add_object(flate_rgb_image(64, 64, 1));
    pdf.add_page(&[image_id]);
    let input = pdf.build();

    let token = CancellationToken::new();
    token.cancel();
    let err = Pipeline::new(CompressionLevel::Balanced)
        .with_cancellation(token)
        .run(&input)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn cancelling_mid_run_stops_before_cleanup() {
    let mut pdf = PdfBuilder::new();
    let first = pdf.add_object(flate_rgb_image(200, 100, 1));
    let second = pdf.add_object(flate_rgb_image(200, 100, 2));
    pdf.add_page(&[first, second]);
    let input = pdf.build();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut cleanup_seen = false;
    let err = Pipeline::new(CompressionLevel::Balanced)
        .with_cancellation(token)
        .on_progress(|p| {
            if p.stage == Stage::Images && p.current == 1 {
                trigger.cancel();
            }
            if p.stage == Stage::Cleanup {
                cleanup_seen = true;
            }
        })
        .run(&input)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!cleanup_seen);
}
