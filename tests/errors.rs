mod common;

use common::*;
use image::{RgbImage, RgbaImage};
use lopdf::{dictionary, Document};
use pdf_squeeze::{
    CleanupDocument, CleanupOptions, CompressError, CompressionLevel, ErrorKind, ImageCodec,
    ImageOutcome, Pipeline, RasterCodec, SkipReason, StructuralCleanup,
};

/// Codec whose encoder always fails with `kind`
struct FailingEncoder(ErrorKind);

impl RasterCodec for FailingEncoder {
    fn decode_jpeg(&self, data: &[u8]) -> pdf_squeeze::Result<RgbaImage> {
        ImageCodec.decode_jpeg(data)
    }

    fn encode_jpeg(&self, _image: &RgbImage, _quality: f32) -> pdf_squeeze::Result<Vec<u8>> {
        Err(CompressError::new(self.0, "encoder unavailable"))
    }

    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> pdf_squeeze::Result<RgbaImage> {
        ImageCodec.resize(image, width, height)
    }
}

/// Cleanup engine that makes everything bigger
struct BloatingCleanup;

struct BloatedDocument(Vec<u8>);

impl StructuralCleanup for BloatingCleanup {
    fn open(&self, bytes: &[u8]) -> pdf_squeeze::Result<Box<dyn CleanupDocument>> {
        Ok(Box::new(BloatedDocument(bytes.to_vec())))
    }
}

impl CleanupDocument for BloatedDocument {
    fn save_to_buffer(&mut self, _options: &CleanupOptions) -> pdf_squeeze::Result<Vec<u8>> {
        let mut out = self.0.clone();
        out.extend(vec![b' '; 4 * 1024 * 1024]);
        Ok(out)
    }
}

/// Payload of the only image using `filter` in a serialized document
fn payload(bytes: &[u8], filter: &[u8]) -> Vec<u8> {
    let doc = Document::load_mem(bytes).unwrap();
    let found = images(&doc);
    let matching: Vec<_> = found.iter().filter(|(_, s)| filter_of(s) == filter.to_vec()).collect();
    assert_eq!(matching.len(), 1);
    matching[0].1.content.clone()
}

fn payload_len(bytes: &[u8], id: lopdf::ObjectId) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_object(id).unwrap().as_stream().unwrap().content.len()
}

fn single_image_pdf(width: u32, height: u32) -> (Vec<u8>, lopdf::ObjectId) {
    let mut pdf = PdfBuilder::new();
    let id = pdf.add_object(flate_rgb_image(width, height, 99));
    pdf.add_page(&[id]);
    (pdf.build(), id)
}

#[test]
fn tiff_predictor_skips_only_that_image() {
    let mut pdf = PdfBuilder::new();
    let mut predicted = flate_rgb_image(200, 100, 1);
    predicted.dict.set("DecodeParms", dictionary! { "Predictor" => 2, "Columns" => 200 });
    let predicted_id = pdf.add_object(predicted);
    let plain_id = pdf.add_object(flate_rgb_image(400, 300, 2));
    pdf.add_page(&[predicted_id, plain_id]);
    let input = pdf.build();

    let original_len = payload_len(&input, predicted_id);
    let (output, result) = Pipeline::new(CompressionLevel::Balanced).run(&input).unwrap();
    let outcome_of = |id| result.outcomes.iter().find(|(o, _)| *o == id).map(|(_, outcome)| *outcome);

    assert_eq!(
        outcome_of(predicted_id),
        Some(ImageOutcome::Skipped(SkipReason::Failed(ErrorKind::PredictorUnsupported)))
    );
    assert!(matches!(outcome_of(plain_id), Some(ImageOutcome::Swapped { .. })));
    assert!(output.len() < input.len());

    let doc = Document::load_mem(&output).unwrap();
    let found = images(&doc);
    let flate: Vec<_> = found.iter().filter(|(_, s)| filter_of(s) == b"FlateDecode".to_vec()).collect();
    assert_eq!(flate.len(), 1);
    let untouched = flate[0].1;
    assert_eq!(int(untouched, b"Width"), 200);
    let parms = untouched.dict.get(b"DecodeParms").unwrap().as_dict().unwrap();
    assert_eq!(parms.get(b"Predictor").unwrap().as_i64().unwrap(), 2);
    assert_eq!(untouched.content.len(), original_len);
}

#[test]
fn corrupt_stream_is_image_local() {
    let mut pdf = PdfBuilder::new();
    let broken = lopdf::Stream::new(
        image_dict(50, 50, name("DeviceRGB"), "FlateDecode"),
        b"this is not zlib data".to_vec(),
    );
    let broken_id = pdf.add_object(broken);
    pdf.add_page(&[broken_id]);
    let input = pdf.build();

    let (output, result) = Pipeline::new(CompressionLevel::Balanced).run(&input).unwrap();
    assert_eq!(
        result.outcomes[0].1,
        ImageOutcome::Skipped(SkipReason::Failed(ErrorKind::InflateError))
    );
    assert!(output.len() <= input.len());
    assert_eq!(payload(&output, b"FlateDecode"), b"this is not zlib data".to_vec());
}

#[test]
fn environment_failure_aborts_the_document() {
    let (input, _) = single_image_pdf(100, 100);
    for kind in [ErrorKind::CanvasError, ErrorKind::EnvError, ErrorKind::CanvasAllocFailed] {
        let err = Pipeline::new(CompressionLevel::Balanced)
            .with_codec(FailingEncoder(kind))
            .run(&input)
            .unwrap_err();
        assert_eq!(err.kind(), kind);
    }
}

#[test]
fn blob_failure_only_skips_the_image() {
    let (input, id) = single_image_pdf(100, 100);
    let (output, result) = Pipeline::new(CompressionLevel::Balanced)
        .with_codec(FailingEncoder(ErrorKind::BlobFailed))
        .run(&input)
        .unwrap();

    assert_eq!(result.outcomes, vec![(id, ImageOutcome::Skipped(SkipReason::Failed(ErrorKind::BlobFailed)))]);
    assert_eq!(result.recompressed_images, 0);
    assert!(output.len() <= input.len());
    assert_eq!(payload(&output, b"FlateDecode").len(), payload_len(&input, id));
}

#[test]
fn already_minimal_jpeg_is_kept_as_is() {
    let mut pdf = PdfBuilder::new();
    let mut stream = lopdf::Stream::new(
        image_dict(64, 64, name("DeviceRGB"), "DCTDecode"),
        jpeg_bytes(64, 64, 0.0),
    );
    stream.allows_compression = false;
    let id = pdf.add_object(stream);
    pdf.add_page(&[id]);
    let input = pdf.build();

    let (output, result) = Pipeline::new(CompressionLevel::Balanced).run(&input).unwrap();
    assert_eq!(result.outcomes, vec![(id, ImageOutcome::Skipped(SkipReason::NotSmaller))]);
    assert_eq!(result.output_size, output.len());
    assert!(output.len() <= input.len());
    assert_eq!(payload(&output, b"DCTDecode"), jpeg_bytes(64, 64, 0.0));
}

#[test]
fn unshrinkable_images_still_get_structural_cleanup() {
    let mut pdf = PdfBuilder::new();
    let mut stream = lopdf::Stream::new(
        image_dict(64, 64, name("DeviceRGB"), "DCTDecode"),
        jpeg_bytes(64, 64, 0.0),
    );
    stream.allows_compression = false;
    let id = pdf.add_object(stream);
    pdf.add_page(&[id]);
    for i in 0..50 {
        pdf.add_object(lopdf::Stream::new(dictionary! {}, vec![i as u8; 2048]));
    }
    let input = pdf.build();

    for level in [CompressionLevel::Balanced, CompressionLevel::Strong] {
        let (output, result) = Pipeline::new(level).run(&input).unwrap();
        assert_eq!(result.recompressed_images, 0, "{}", level);
        assert!(output.len() < input.len() / 10, "{}: {} bytes", level, output.len());
        assert!(result.is_reduced());

        let doc = Document::load_mem(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(payload(&output, b"DCTDecode"), jpeg_bytes(64, 64, 0.0));
    }
}

#[test]
fn larger_cleanup_output_returns_original_bytes() {
    let (input, _) = single_image_pdf(400, 300);
    let (output, result) = Pipeline::new(CompressionLevel::Balanced)
        .with_cleanup(BloatingCleanup)
        .run(&input)
        .unwrap();

    assert_eq!(result.recompressed_images, 1);
    assert_eq!(output, input);
    assert!(!result.is_reduced());
}

#[test]
fn encrypted_input_is_rejected_at_every_level() {
    let (mut input, _) = single_image_pdf(16, 16);
    input.extend_from_slice(b"\n% /Encrypt\n");
    for level in CompressionLevel::ALL {
        let err = Pipeline::new(level).run(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordProtected, "{}", level);
    }
    assert!(pdf_squeeze::needs_password(&input).unwrap());
}

#[test]
fn unparseable_input_is_document_fatal() {
    let err = Pipeline::new(CompressionLevel::Balanced)
        .run(b"%PDF-1.7\nthis is not a pdf body")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PdfParseFailed);
}
