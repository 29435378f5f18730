//! Per-page listing of image XObjects and how the pipeline would treat them.

use crate::colorspace::ColorSpaceInfo;
use crate::error::Result;
use crate::object::{filter_chain, get, get_dict, get_integer, get_name, get_reference, name_to_string};
use crate::orchestrator::{collect_protected_masks, evaluate_candidate};
use crate::security::load_document;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;

/// Information about a single image in the PDF
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub object_id: ObjectId,
    /// `image` or `smask`
    pub role: &'static str,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
    pub bits_per_component: u32,
    /// Filter chain joined with `+`, or `raw`
    pub filter: String,
    pub size_bytes: usize,
    /// `eligible`, or why the image would be skipped
    pub verdict: String,
}

/// Images grouped by page
#[derive(Debug, Clone, PartialEq)]
pub struct PageImages {
    pub page_number: u32,
    pub images: Vec<ImageInfo>,
}

/// List the images reachable from each page, including soft masks.
///
/// Pages without images are left out.
pub fn extract_pdf_images_info(pdf_bytes: &[u8]) -> Result<Vec<PageImages>> {
    let doc = load_document(pdf_bytes)?;
    Ok(inventory(&doc))
}

pub(crate) fn inventory(doc: &Document) -> Vec<PageImages> {
    let protected = collect_protected_masks(doc);
    let mut result = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let mut images = Vec::new();
        for image_id in collect_page_images(doc, page_id) {
            let Ok(Object::Stream(stream)) = doc.get_object(image_id) else {
                continue;
            };
            images.push(describe(doc, image_id, stream, "image", &protected));

            if let Some(smask_id) = get_reference(&stream.dict, b"SMask") {
                if let Ok(Object::Stream(smask)) = doc.get_object(smask_id) {
                    images.push(describe(doc, smask_id, smask, "smask", &protected));
                }
            }
        }

        if !images.is_empty() {
            result.push(PageImages { page_number, images });
        }
    }

    result
}

/// Image object ids referenced from a page, in first-seen order
fn collect_page_images(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut images = Vec::new();
    let mut seen = HashSet::new();

    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return images;
    };
    if let Some(resources) = page_resources(doc, page_dict) {
        for child in xobject_ids(doc, resources) {
            collect_images_recursive(doc, child, &mut images, &mut seen);
        }
    }
    images
}

/// Descend through Form XObjects; `seen` breaks reference cycles.
fn collect_images_recursive(
    doc: &Document,
    obj_id: ObjectId,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    if !seen.insert(obj_id) {
        return;
    }
    let Ok(Object::Stream(stream)) = doc.get_object(obj_id) else {
        return;
    };

    match get_name(doc, &stream.dict, b"Subtype") {
        Some(b"Image") => images.push(obj_id),
        Some(b"Form") => {
            if let Some(resources) = get_dict(doc, &stream.dict, b"Resources") {
                for child in xobject_ids(doc, resources) {
                    collect_images_recursive(doc, child, images, seen);
                }
            }
        }
        _ => {}
    }
}

/// `Resources` of a page, inherited from the nearest ancestor that has one
fn page_resources<'a>(doc: &'a Document, page: &'a Dictionary) -> Option<&'a Dictionary> {
    let mut node = page;
    for _ in 0..32 {
        if let Some(resources) = get_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

fn xobject_ids(doc: &Document, resources: &Dictionary) -> Vec<ObjectId> {
    get_dict(doc, resources, b"XObject")
        .map(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(_, value)| match value {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn describe(
    doc: &Document,
    obj_id: ObjectId,
    stream: &Stream,
    role: &'static str,
    protected: &HashSet<ObjectId>,
) -> ImageInfo {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| get_integer(doc, dict, key).and_then(|n| u32::try_from(n).ok()).unwrap_or(0);

    let color_space = match get(doc, dict, b"ColorSpace") {
        Some(Object::Name(name)) => name_to_string(name),
        Some(Object::Array(_)) => ColorSpaceInfo::resolve(doc, dict).name().to_string(),
        _ => "Unknown".to_string(),
    };

    let filters = filter_chain(doc, dict);
    let filter = if filters.is_empty() {
        "raw".to_string()
    } else {
        filters.into_iter().map(name_to_string).collect::<Vec<_>>().join("+")
    };

    let verdict = match evaluate_candidate(doc, obj_id, protected) {
        Ok(_) => "eligible".to_string(),
        Err(reason) => reason.to_string(),
    };

    ImageInfo {
        object_id: obj_id,
        role,
        width: dimension(b"Width"),
        height: dimension(b"Height"),
        color_space,
        bits_per_component: get_integer(doc, dict, b"BitsPerComponent")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(8),
        filter,
        size_bytes: stream.content.len(),
        verdict,
    }
}
