//! Typed read helpers over the lopdf object graph.
//!
//! Lookups follow at most one indirect reference. A value of the wrong type
//! is reported as absent rather than as an error.

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Follow a single reference hop
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.objects.get(id),
        _ => Some(obj),
    }
}

/// Resolve a dictionary entry
pub fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|value| resolve(doc, value))
}

pub fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match get(doc, dict, key)? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

pub fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    match get(doc, dict, key)? {
        Object::Integer(n) => Some(*n as f64),
        Object::Real(n) => Some(f64::from(*n)),
        _ => None,
    }
}

/// Resolve an entry as an integer. Reals with a fractional part are rejected.
pub fn get_integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    let value = get_number(doc, dict, key)?;
    if value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

pub fn get_bool(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<bool> {
    match get(doc, dict, key)? {
        Object::Boolean(b) => Some(*b),
        _ => None,
    }
}

pub fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub fn get_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [Object]> {
    match get(doc, dict, key)? {
        Object::Array(items) => Some(items.as_slice()),
        _ => None,
    }
}

/// `DecodeParms` as a dictionary, or the first dictionary of a parms array
pub fn get_decode_parms<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    match get(doc, dict, b"DecodeParms")? {
        Object::Dictionary(d) => Some(d),
        Object::Array(items) => match resolve(doc, items.first()?)? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

/// Names of the filter chain, in application order. Entries that are not
/// names are dropped.
pub fn filter_chain<'a>(doc: &'a Document, dict: &'a Dictionary) -> Vec<&'a [u8]> {
    match get(doc, dict, b"Filter") {
        Some(Object::Name(name)) => vec![name.as_slice()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match resolve(doc, item) {
                Some(Object::Name(name)) => Some(name.as_slice()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Reference target of an entry, without resolving it
pub fn get_reference(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    match dict.get(key).ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

/// Every indirect object that is a stream, in object-number order.
pub fn stream_object_ids(doc: &Document) -> Vec<ObjectId> {
    doc.objects
        .iter()
        .filter(|(_, object)| matches!(object, Object::Stream(_)))
        .map(|(id, _)| *id)
        .collect()
}

/// Lossy name rendering for logs and reports
pub fn name_to_string(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}
