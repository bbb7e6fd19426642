//! Embedded objects, slide images and content hashing.

use crate::package::{rel_types, resolve_target, PptxPackage};
use deck_core::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Directory holding embedded OLE objects and packages.
const EMBEDDINGS_DIR: &str = "ppt/embeddings/";

/// A part to be written to `attachments/` with its original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment<'a> {
    pub part_name: &'a str,
    /// Unique file name within the attachments directory.
    pub file_name: String,
    pub data: &'a [u8],
}

/// Hex SHA-256 digest of raw bytes.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Lowercase extension of a part name, with the leading dot; empty if none.
pub fn part_extension(part_name: &str) -> String {
    let file = part_name.rsplit('/').next().unwrap_or(part_name);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Final path segment of a part name.
pub fn part_file_name(part_name: &str) -> &str {
    part_name.rsplit('/').next().unwrap_or(part_name)
}

/// Slide-referenced images and embedded objects, each part once.
///
/// Slide references come first in slide order, then any embedding that no
/// slide points at.
pub fn collect_attachments(package: &PptxPackage) -> Result<Vec<Attachment<'_>>> {
    let mut ordered: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for slide in package.slide_parts()? {
        for rel in package.relationships(&slide)? {
            if rel.external {
                continue;
            }
            let wanted = rel.is_type(rel_types::IMAGE)
                || rel.is_type(rel_types::OLE_OBJECT)
                || rel.is_type(rel_types::PACKAGE);
            if !wanted {
                continue;
            }
            let part = resolve_target(&slide, &rel.target);
            if package.has_part(&part) && seen.insert(part.clone()) {
                ordered.push(part);
            }
        }
    }

    for part in package.part_names() {
        if part.starts_with(EMBEDDINGS_DIR) && seen.insert(part.to_string()) {
            ordered.push(part.to_string());
        }
    }

    let mut used_names: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(ordered.len());
    for part in ordered {
        let Some((part_name, data)) = package.parts().get_key_value(&part) else {
            continue;
        };
        let file_name = unique_name(part_file_name(part_name), &mut used_names);
        out.push(Attachment {
            part_name: part_name.as_str(),
            file_name,
            data: data.as_slice(),
        });
    }

    log::debug!("Collected {} attachment(s)", out.len());
    Ok(out)
}

fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_part_extension() {
        assert_eq!(part_extension("ppt/media/image1.PNG"), ".png");
        assert_eq!(part_extension("ppt/media/noext"), "");
        assert_eq!(part_extension("ppt/media/.hidden"), "");
        assert_eq!(part_file_name("ppt/embeddings/oleObject1.bin"), "oleObject1.bin");
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("image1.png", &mut used), "image1.png");
        assert_eq!(unique_name("image1.png", &mut used), "image1-2.png");
        assert_eq!(unique_name("image1.png", &mut used), "image1-3.png");
        assert_eq!(unique_name("blob", &mut used), "blob");
        assert_eq!(unique_name("blob", &mut used), "blob-2");
    }
}
