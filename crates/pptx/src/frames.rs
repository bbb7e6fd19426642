//! Shape-tree traversal and frame extraction.
//!
//! A frame is the bounding rectangle of one shape on a slide. Frames come out
//! in document (z-order) traversal order, not sorted by position.

use crate::package::PptxPackage;
use crate::xml::XmlElement;
use deck_core::{FrameRect, Result};
use std::collections::BTreeMap;

/// Shape elements that carry a transform.
const SHAPE_ELEMENTS: &[&str] = &["sp", "pic", "cxnSp", "graphicFrame", "grpSp", "contentPart"];

/// Affine mapping from a group's child space to slide space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    scale_x: f64,
    scale_y: f64,
    dx: f64,
    dy: f64,
}

impl Transform {
    const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    fn apply(&self, rect: FrameRect) -> FrameRect {
        FrameRect::new(
            (rect.x as f64 * self.scale_x + self.dx).round() as i64,
            (rect.y as f64 * self.scale_y + self.dy).round() as i64,
            (rect.cx as f64 * self.scale_x).round() as i64,
            (rect.cy as f64 * self.scale_y).round() as i64,
        )
    }

    /// `self` applied after `inner`.
    fn then(&self, inner: Transform) -> Transform {
        Transform {
            scale_x: self.scale_x * inner.scale_x,
            scale_y: self.scale_y * inner.scale_y,
            dx: self.scale_x * inner.dx + self.dx,
            dy: self.scale_y * inner.dy + self.dy,
        }
    }

    /// Child-space mapping declared by a group's `a:xfrm`.
    fn for_group(xfrm: &XmlElement) -> Transform {
        let off = read_point(xfrm.child("off"), "x", "y");
        let ext = read_point(xfrm.child("ext"), "cx", "cy");
        let ch_off = read_point(xfrm.child("chOff"), "x", "y").unwrap_or((0, 0));
        let ch_ext = read_point(xfrm.child("chExt"), "cx", "cy");

        let (Some((gx, gy)), Some((gcx, gcy))) = (off, ext) else {
            return Transform::IDENTITY;
        };
        let (ccx, ccy) = ch_ext.unwrap_or((gcx, gcy));

        let scale_x = if ccx > 0 { gcx as f64 / ccx as f64 } else { 1.0 };
        let scale_y = if ccy > 0 { gcy as f64 / ccy as f64 } else { 1.0 };

        Transform {
            scale_x,
            scale_y,
            dx: gx as f64 - ch_off.0 as f64 * scale_x,
            dy: gy as f64 - ch_off.1 as f64 * scale_y,
        }
    }
}

fn read_point(element: Option<&XmlElement>, a: &str, b: &str) -> Option<(i64, i64)> {
    let element = element?;
    Some((element.attr_i64(a)?, element.attr_i64(b)?))
}

/// The `xfrm` element of a shape, wherever its kind keeps it.
pub fn shape_xfrm(shape: &XmlElement) -> Option<&XmlElement> {
    match shape.name.as_str() {
        "graphicFrame" | "contentPart" => shape.child("xfrm"),
        "grpSp" => shape.path(&["grpSpPr", "xfrm"]),
        _ => shape.path(&["spPr", "xfrm"]),
    }
}

/// The raw (unmapped) rectangle of a shape, if it has offset and extent.
pub fn shape_rect(shape: &XmlElement) -> Option<FrameRect> {
    let xfrm = shape_xfrm(shape)?;
    let (x, y) = read_point(xfrm.child("off"), "x", "y")?;
    let (cx, cy) = read_point(xfrm.child("ext"), "cx", "cy")?;
    Some(FrameRect::new(x, y, cx, cy))
}

/// Visit every shape under a shape tree in document order.
///
/// The visitor receives the shape element and its rectangle mapped into
/// slide coordinates (`None` when the shape has no complete transform).
/// Group shapes are visited before their children.
pub fn for_each_shape<F>(sp_tree: &XmlElement, mut visit: F)
where
    F: FnMut(&XmlElement, Option<FrameRect>),
{
    walk(sp_tree, Transform::IDENTITY, &mut visit);
}

fn walk<F>(container: &XmlElement, transform: Transform, visit: &mut F)
where
    F: FnMut(&XmlElement, Option<FrameRect>),
{
    for child in container.elements() {
        match child.name.as_str() {
            "AlternateContent" => {
                // Prefer the fallback rendition; it's what older consumers see.
                if let Some(branch) = child.child("Fallback").or_else(|| child.child("Choice")) {
                    walk(branch, transform, visit);
                }
            }
            name if SHAPE_ELEMENTS.contains(&name) => {
                let rect = shape_rect(child).map(|r| transform.apply(r));
                visit(child, rect);

                if name == "grpSp" {
                    let inner = shape_xfrm(child)
                        .map(Transform::for_group)
                        .unwrap_or(Transform::IDENTITY);
                    walk(child, transform.then(inner), visit);
                }
            }
            _ => {}
        }
    }
}

/// Frames of one slide part, in traversal order.
pub fn slide_frames(slide: &XmlElement) -> Vec<FrameRect> {
    let Some(sp_tree) = slide.path(&["cSld", "spTree"]) else {
        return Vec::new();
    };

    let mut frames = Vec::new();
    for_each_shape(sp_tree, |_, rect| {
        if let Some(rect) = rect.filter(FrameRect::is_usable) {
            frames.push(rect);
        }
    });
    frames
}

/// Extracts frame rectangles for every slide of a package.
pub struct FrameExtractor;

impl FrameExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Frames keyed by 1-based slide index. Slides without usable frames are
    /// absent from the map.
    pub fn extract(&self, package: &PptxPackage) -> Result<BTreeMap<usize, Vec<FrameRect>>> {
        let mut out = BTreeMap::new();
        for (idx, part) in package.slide_parts()?.iter().enumerate() {
            let slide = package.part_xml(part)?;
            let frames = slide_frames(&slide);
            log::debug!("Slide {} ({}): {} frame(s)", idx + 1, part, frames.len());
            if !frames.is_empty() {
                out.insert(idx + 1, frames);
            }
        }
        Ok(out)
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}
