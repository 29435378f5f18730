#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pdf_squeeze::RasterCodec;
use std::io::Write;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).expect("deflate");
    encoder.finish().expect("deflate finish")
}

/// Smooth gradient with low-amplitude noise: poor for Flate, fine for JPEG.
pub fn noisy_samples(width: u32, height: u32, channels: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let mut out = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (state >> 16) % 24;
                let base = (x * 97 / width.max(1) + y * 61 / height.max(1) + c * 40) % 200;
                out.push((base + noise) as u8);
            }
        }
    }
    out
}

pub fn image_dict(width: u32, height: u32, color_space: Object, filter: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => filter
    }
}

pub fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

/// A noisy DeviceRGB FlateDecode image stream
pub fn flate_rgb_image(width: u32, height: u32, seed: u32) -> Stream {
    Stream::new(
        image_dict(width, height, name("DeviceRGB"), "FlateDecode"),
        deflate(&noisy_samples(width, height, 3, seed)),
    )
}

pub fn flate_gray_image(width: u32, height: u32, seed: u32) -> Stream {
    Stream::new(
        image_dict(width, height, name("DeviceGray"), "FlateDecode"),
        deflate(&noisy_samples(width, height, 1, seed)),
    )
}

/// Baseline JPEG of a flat-ish image, `quality` in `[0, 1]`
pub fn jpeg_bytes(width: u32, height: u32, quality: f32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 120])
    });
    pdf_squeeze::ImageCodec
        .encode_jpeg(&img, quality)
        .expect("encode fixture jpeg")
}

/// In-memory PDF assembled page by page
pub struct PdfBuilder {
    pub doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Add a page drawing each XObject once
    pub fn add_page(&mut self, xobjects: &[ObjectId]) -> ObjectId {
        let mut names = Dictionary::new();
        let mut content = String::new();
        for (i, id) in xobjects.iter().enumerate() {
            let key = format!("Im{}", i);
            content.push_str(&format!("q 200 0 0 150 0 0 cm /{} Do Q\n", key));
            names.set(key, *id);
        }

        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => names }
        });
        self.page_ids.push(page_id);
        page_id
    }

    pub fn build(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()]
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("save fixture");
        bytes
    }
}

/// Image XObjects of a serialized document
pub fn images(doc: &Document) -> Vec<(ObjectId, &Stream)> {
    doc.objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) => match stream.dict.get(b"Subtype") {
                Ok(Object::Name(n)) if n == b"Image" => Some((*id, stream)),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

pub fn filter_of(stream: &Stream) -> Vec<u8> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => n.clone(),
        _ => Vec::new(),
    }
}

pub fn int(stream: &Stream, key: &[u8]) -> i64 {
    stream
        .dict
        .get(key)
        .and_then(|v| v.as_i64())
        .expect("integer entry")
}
