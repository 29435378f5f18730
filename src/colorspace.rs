//! Colorspace classification for image XObjects.

use crate::decode::inflate;
use crate::object::{filter_chain, get, resolve};
use lopdf::{Dictionary, Document, Object};

/// Colorspace of an image, as far as recompression cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpaceInfo {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    /// `[/Indexed /DeviceRGB hival lookup]`; `lookup` holds packed RGB triples.
    Indexed { lookup: Vec<u8> },
    Unknown,
}

impl ColorSpaceInfo {
    /// Classify the `ColorSpace` entry of an image dictionary
    pub fn resolve(doc: &Document, dict: &Dictionary) -> Self {
        match get(doc, dict, b"ColorSpace") {
            Some(Object::Name(name)) => match name.as_slice() {
                b"DeviceGray" => ColorSpaceInfo::DeviceGray,
                b"DeviceRGB" => ColorSpaceInfo::DeviceRgb,
                b"DeviceCMYK" => ColorSpaceInfo::DeviceCmyk,
                _ => ColorSpaceInfo::Unknown,
            },
            Some(Object::Array(items)) => Self::resolve_indexed(doc, items),
            _ => ColorSpaceInfo::Unknown,
        }
    }

    fn resolve_indexed(doc: &Document, items: &[Object]) -> Self {
        if items.len() < 4 {
            return ColorSpaceInfo::Unknown;
        }
        let is_name = |obj: &Object, expected: &[u8]| {
            matches!(resolve(doc, obj), Some(Object::Name(n)) if n.as_slice() == expected)
        };
        if !is_name(&items[0], b"Indexed") || !is_name(&items[1], b"DeviceRGB") {
            return ColorSpaceInfo::Unknown;
        }

        let lookup = match resolve(doc, &items[3]) {
            Some(Object::String(bytes, _)) => Some(bytes.clone()),
            Some(Object::Stream(stream)) => {
                let filters = filter_chain(doc, &stream.dict);
                match filters.as_slice() {
                    [] => Some(stream.content.clone()),
                    [b"FlateDecode"] => inflate(&stream.content).ok(),
                    _ => None,
                }
            }
            _ => None,
        };

        match lookup {
            Some(lookup) => ColorSpaceInfo::Indexed { lookup },
            None => ColorSpaceInfo::Unknown,
        }
    }

    /// Bytes per pixel of the raw 8-bit samples, `None` for `Unknown`
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            ColorSpaceInfo::DeviceGray | ColorSpaceInfo::Indexed { .. } => Some(1),
            ColorSpaceInfo::DeviceRgb => Some(3),
            ColorSpaceInfo::DeviceCmyk => Some(4),
            ColorSpaceInfo::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ColorSpaceInfo::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorSpaceInfo::DeviceGray => "DeviceGray",
            ColorSpaceInfo::DeviceRgb => "DeviceRGB",
            ColorSpaceInfo::DeviceCmyk => "DeviceCMYK",
            ColorSpaceInfo::Indexed { .. } => "Indexed",
            ColorSpaceInfo::Unknown => "Unknown",
        }
    }
}
