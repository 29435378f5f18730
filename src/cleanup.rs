//! Structural cleanup pass run after image recompression.
//!
//! The pipeline only needs an engine that can open serialized bytes and
//! save them again with a small option set. [`LopdfCleanup`] is the
//! in-process engine; hosts with a native document engine implement
//! [`StructuralCleanup`] themselves.

use crate::error::{CompressError, ErrorKind, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, SaveOptions};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Option string the pipeline always requests
pub const CLEANUP_OPTIONS: &str = "garbage=3,compress,clean";

/// Parsed cleanup options.
///
/// Garbage levels: 1 drops unreachable objects, 2 also renumbers, 3 also
/// merges identical streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    pub garbage: u8,
    pub compress: bool,
    pub clean: bool,
}

impl FromStr for CleanupOptions {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        let mut options = CleanupOptions::default();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (token, None),
            };
            match (key, value) {
                ("garbage", None) => options.garbage = 1,
                ("garbage", Some("compact")) => options.garbage = 2,
                ("garbage", Some("deduplicate")) => options.garbage = 3,
                ("garbage", Some(n)) => {
                    options.garbage = n
                        .parse::<u8>()
                        .ok()
                        .filter(|n| *n <= 4)
                        .ok_or_else(|| invalid_option(token))?;
                }
                ("compress", None) => options.compress = true,
                ("clean", None) => options.clean = true,
                _ => return Err(invalid_option(token)),
            }
        }
        Ok(options)
    }
}

fn invalid_option(token: &str) -> CompressError {
    CompressError::new(
        ErrorKind::EngineOptimizeFailed,
        format!("Unknown cleanup option: {}", token),
    )
}

/// Opens serialized documents for a cleanup save
pub trait StructuralCleanup {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn CleanupDocument>>;
}

/// An open document handle. Dropping it releases the engine's resources.
pub trait CleanupDocument {
    fn save_to_buffer(&mut self, options: &CleanupOptions) -> Result<Vec<u8>>;
}

/// Cleanup engine backed by lopdf
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfCleanup;

impl StructuralCleanup for LopdfCleanup {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn CleanupDocument>> {
        let doc = Document::load_mem(bytes).map_err(|e| {
            CompressError::new(
                ErrorKind::EngineOpenFailed,
                format!("Failed to open document for cleanup: {}", e),
            )
        })?;
        Ok(Box::new(LopdfCleanupDocument { doc }))
    }
}

struct LopdfCleanupDocument {
    doc: Document,
}

impl CleanupDocument for LopdfCleanupDocument {
    fn save_to_buffer(&mut self, options: &CleanupOptions) -> Result<Vec<u8>> {
        let doc = &mut self.doc;

        if options.clean {
            let removed = strip_dangling_entries(doc);
            log::debug!("clean: removed {} null or dangling entries", removed);
        }
        if options.garbage >= 3 {
            let merged = merge_duplicate_streams(doc);
            log::debug!("garbage: merged {} duplicate streams", merged);
        }
        if options.garbage >= 1 {
            let pruned = doc.prune_objects();
            log::debug!("garbage: pruned {} unreachable objects", pruned.len());
        }
        if options.garbage >= 2 {
            doc.renumber_objects();
        }

        let mut buffer = Vec::new();
        let saved = if options.compress {
            doc.compress();
            let save_options = SaveOptions::builder()
                .use_object_streams(true)
                .use_xref_streams(true)
                .compression_level(9)
                .build();
            doc.save_with_options(&mut buffer, save_options)
        } else {
            doc.save_to(&mut buffer)
        };
        saved.map_err(|e| {
            CompressError::new(
                ErrorKind::EngineOptimizeFailed,
                format!("Cleanup save failed: {}", e),
            )
        })?;

        Ok(buffer)
    }
}

/// Remove dictionary entries that are `null` or reference a missing object.
fn strip_dangling_entries(doc: &mut Document) -> usize {
    let live: HashSet<ObjectId> = doc.objects.keys().copied().collect();
    let mut removed = 0;
    for object in doc.objects.values_mut() {
        removed += strip_object(object, &live);
    }
    removed
}

fn strip_object(object: &mut Object, live: &HashSet<ObjectId>) -> usize {
    match object {
        Object::Dictionary(dict) => strip_dict(dict, live),
        Object::Stream(stream) => strip_dict(&mut stream.dict, live),
        Object::Array(items) => items.iter_mut().map(|item| strip_object(item, live)).sum(),
        _ => 0,
    }
}

fn strip_dict(dict: &mut Dictionary, live: &HashSet<ObjectId>) -> usize {
    let stale: Vec<Vec<u8>> = dict
        .iter()
        .filter(|(_, value)| match value {
            Object::Null => true,
            Object::Reference(id) => !live.contains(id),
            _ => false,
        })
        .map(|(key, _)| key.clone())
        .collect();
    for key in &stale {
        dict.remove(key);
    }

    let mut removed = stale.len();
    for (_, value) in dict.iter_mut() {
        removed += strip_object(value, live);
    }
    removed
}

/// Point every reference at the first of a set of byte-identical streams.
fn merge_duplicate_streams(doc: &mut Document) -> usize {
    let mut first_seen: HashMap<(String, Vec<u8>), ObjectId> = HashMap::new();
    let mut remap: HashMap<ObjectId, ObjectId> = HashMap::new();

    for (id, object) in doc.objects.iter() {
        let Object::Stream(stream) = object else { continue };
        if matches!(stream.dict.get(b"Type"), Ok(Object::Name(t)) if t == b"XRef" || t == b"ObjStm") {
            continue;
        }
        let key = (format!("{:?}", stream.dict), stream.content.clone());
        match first_seen.get(&key) {
            Some(keep) => {
                remap.insert(*id, *keep);
            }
            None => {
                first_seen.insert(key, *id);
            }
        }
    }

    if remap.is_empty() {
        return 0;
    }
    for object in doc.objects.values_mut() {
        remap_references(object, &remap);
    }
    doc.trailer.iter_mut().for_each(|(_, v)| remap_references(v, &remap));
    for id in remap.keys() {
        doc.objects.remove(id);
    }
    remap.len()
}

fn remap_references(object: &mut Object, remap: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = remap.get(id) {
                *id = *target;
            }
        }
        Object::Array(items) => items.iter_mut().for_each(|item| remap_references(item, remap)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, v)| remap_references(v, remap)),
        Object::Stream(stream) => stream.dict.iter_mut().for_each(|(_, v)| remap_references(v, remap)),
        _ => {}
    }
}
