//! Geometric heuristics for HTML layout reconstruction.
//!
//! Every classifier is a pure predicate over a rectangle and the slide
//! canvas; none of them look at image content.

use crate::geometry::{FrameRect, SlideSize};
use crate::types::{HtmlImageBlock, HtmlParagraph, HtmlSlide, ListKind};
use std::collections::{HashMap, HashSet};

/// Width or height ratio at which an image counts as a background.
pub const BACKGROUND_SIDE_RATIO: f64 = 0.9;

/// Area ratio at which an image counts as a background.
pub const BACKGROUND_AREA_RATIO: f64 = 0.7;

/// Maximum width and height ratio of a logo.
pub const LOGO_MAX_RATIO: f64 = 0.25;

/// Maximum distance from an edge, as a fraction of the canvas, for a logo.
pub const LOGO_EDGE_RATIO: f64 = 0.1;

/// Number of distinct slides a logo must appear on to be hoisted.
pub const LOGO_MIN_SLIDES: usize = 2;

fn ratios(rect: FrameRect, canvas: SlideSize) -> Option<(f64, f64)> {
    if !canvas.is_known() {
        return None;
    }
    Some((
        rect.cx as f64 / canvas.width as f64,
        rect.cy as f64 / canvas.height as f64,
    ))
}

/// Whether an image covers enough of the canvas to sit behind the text.
pub fn is_background(rect: FrameRect, canvas: SlideSize) -> bool {
    match ratios(rect, canvas) {
        Some((w, h)) => {
            w >= BACKGROUND_SIDE_RATIO || h >= BACKGROUND_SIDE_RATIO || w * h >= BACKGROUND_AREA_RATIO
        }
        None => false,
    }
}

/// Whether an image is small and anchored near one vertical and one
/// horizontal edge of the canvas.
pub fn is_logo_candidate(rect: FrameRect, canvas: SlideSize) -> bool {
    let Some((w, h)) = ratios(rect, canvas) else {
        return false;
    };
    if w > LOGO_MAX_RATIO || h > LOGO_MAX_RATIO {
        return false;
    }

    let margin_x = canvas.width as f64 * LOGO_EDGE_RATIO;
    let margin_y = canvas.height as f64 * LOGO_EDGE_RATIO;

    let left = rect.x as f64;
    let right = canvas.width as f64 - (rect.x as f64 + rect.cx as f64);
    let top = rect.y as f64;
    let bottom = canvas.height as f64 - (rect.y as f64 + rect.cy as f64);

    let near_vertical_edge = left <= margin_x || right <= margin_x;
    let near_horizontal_edge = top <= margin_y || bottom <= margin_y;

    near_vertical_edge && near_horizontal_edge
}

/// Index in the reading-order block stream at which a flow image goes.
pub fn flow_insert_index(rect: FrameRect, canvas: SlideSize, block_count: usize) -> usize {
    if canvas.height <= 0 {
        return block_count;
    }
    let position = (rect.center_y() / canvas.height as f64) * block_count as f64;
    let index = position.round();
    if index <= 0.0 {
        0
    } else {
        (index as usize).min(block_count)
    }
}

/// Set the `background` and `logo_candidate` flags of every image.
pub fn classify_images(slide: &mut HtmlSlide) {
    let size = slide.size;
    for image in &mut slide.images {
        image.background = is_background(image.rect, size);
        image.logo_candidate = !image.background && is_logo_candidate(image.rect, size);
    }
}

/// Move logos that recur on several slides into a shared header.
///
/// A logo candidate whose hash appears as a candidate on at least
/// [`LOGO_MIN_SLIDES`] distinct slides is returned once (first occurrence)
/// and every candidate placement with that hash is removed from its slide.
/// Candidates seen on a single slide are left in place.
pub fn hoist_logos(slides: &mut [HtmlSlide]) -> Vec<HtmlImageBlock> {
    let mut seen_on: HashMap<&str, HashSet<usize>> = HashMap::new();
    for slide in slides.iter() {
        for image in slide.images.iter().filter(|i| i.logo_candidate) {
            seen_on
                .entry(image.hash.as_str())
                .or_default()
                .insert(slide.number);
        }
    }

    let recurring: HashSet<String> = seen_on
        .into_iter()
        .filter(|(_, slides)| slides.len() >= LOGO_MIN_SLIDES)
        .map(|(hash, _)| hash.to_string())
        .collect();

    if recurring.is_empty() {
        return Vec::new();
    }

    let mut header: Vec<HtmlImageBlock> = Vec::new();
    for slide in slides.iter_mut() {
        let (hoisted, kept): (Vec<_>, Vec<_>) = slide
            .images
            .drain(..)
            .partition(|i| i.logo_candidate && recurring.contains(&i.hash));
        slide.images = kept;

        for image in hoisted {
            if !header.iter().any(|h| h.hash == image.hash) {
                header.push(image);
            }
        }
    }

    log::debug!("Hoisted {} recurring logo(s) into the page header", header.len());
    header
}

/// A run of paragraphs rendered as one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParagraphGroup {
    /// A plain paragraph (index into the block's paragraphs).
    Plain(usize),
    /// Consecutive list items sharing one container.
    List { kind: ListKind, items: Vec<usize> },
}

/// Group paragraphs into list containers.
///
/// A bulleted paragraph opens or continues a list of its kind; a change of
/// kind, or a paragraph without a bullet, closes the open list.
pub fn group_paragraphs(paragraphs: &[HtmlParagraph]) -> Vec<ParagraphGroup> {
    let mut groups = Vec::new();
    let mut open: Option<(ListKind, Vec<usize>)> = None;

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        match paragraph.list_kind() {
            Some(kind) => match open.as_mut() {
                Some((open_kind, items)) if *open_kind == kind => items.push(idx),
                _ => {
                    if let Some((kind, items)) = open.take() {
                        groups.push(ParagraphGroup::List { kind, items });
                    }
                    open = Some((kind, vec![idx]));
                }
            },
            None => {
                if let Some((kind, items)) = open.take() {
                    groups.push(ParagraphGroup::List { kind, items });
                }
                groups.push(ParagraphGroup::Plain(idx));
            }
        }
    }

    if let Some((kind, items)) = open {
        groups.push(ParagraphGroup::List { kind, items });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bullet;

    const CANVAS: SlideSize = SlideSize {
        width: 10_000,
        height: 5_000,
    };

    fn image(rect: FrameRect, hash: &str) -> HtmlImageBlock {
        HtmlImageBlock::new(rect, hash, ".png")
    }

    #[test]
    fn test_background_by_width() {
        // 95% of the width, tiny height.
        assert!(is_background(FrameRect::new(0, 0, 9_500, 100), CANVAS));
    }

    #[test]
    fn test_background_by_height_or_area() {
        assert!(is_background(FrameRect::new(0, 0, 100, 4_600), CANVAS));
        // 0.85 * 0.85 = 0.7225
        assert!(is_background(FrameRect::new(0, 0, 8_500, 4_250), CANVAS));
        assert!(!is_background(FrameRect::new(0, 0, 5_000, 2_500), CANVAS));
        assert!(!is_background(FrameRect::new(0, 0, 9_500, 100), SlideSize::default()));
    }

    #[test]
    fn test_logo_candidate_corners() {
        // top-left
        assert!(is_logo_candidate(FrameRect::new(200, 100, 1_000, 500), CANVAS));
        // bottom-right
        assert!(is_logo_candidate(FrameRect::new(8_500, 4_300, 1_000, 500), CANVAS));
        // near the left edge but vertically centred
        assert!(!is_logo_candidate(FrameRect::new(0, 2_000, 1_000, 500), CANVAS));
        // too large
        assert!(!is_logo_candidate(FrameRect::new(0, 0, 3_000, 500), CANVAS));
    }

    #[test]
    fn test_logo_candidate_extreme_offsets() {
        let far = FrameRect::new(i64::MAX - 10, i64::MAX - 10, 1_000, 500);
        assert!(is_logo_candidate(far, CANVAS));
        let before = FrameRect::new(i64::MIN, 2_000, 1_000, 500);
        assert!(!is_logo_candidate(before, CANVAS));
    }

    #[test]
    fn test_flow_insert_index() {
        let rect = FrameRect::new(0, 2_000, 100, 1_000); // centre y = 2500
        assert_eq!(flow_insert_index(rect, CANVAS, 4), 2);
        assert_eq!(flow_insert_index(rect, CANVAS, 0), 0);

        let top = FrameRect::new(0, -3_000, 100, 1_000);
        assert_eq!(flow_insert_index(top, CANVAS, 4), 0);

        let below = FrameRect::new(0, 9_000, 100, 1_000);
        assert_eq!(flow_insert_index(below, CANVAS, 4), 4);
    }

    #[test]
    fn test_hoist_logos_across_three_slides() {
        let logo = FrameRect::new(100, 100, 800, 400);
        let mut slides: Vec<HtmlSlide> = (1..=3)
            .map(|n| {
                let mut s = HtmlSlide::new(n, CANVAS);
                s.images.push(image(logo, "logo"));
                s.images.push(image(FrameRect::new(3_000, 2_000, 2_000, 1_000), "photo"));
                classify_images(&mut s);
                s
            })
            .collect();

        let header = hoist_logos(&mut slides);
        assert_eq!(header.len(), 1);
        assert_eq!(header[0].hash, "logo");
        for slide in &slides {
            assert!(slide.images.iter().all(|i| i.hash != "logo"));
            assert_eq!(slide.images.len(), 1);
        }
    }

    #[test]
    fn test_single_slide_logo_stays() {
        let mut first = HtmlSlide::new(1, CANVAS);
        first.images.push(image(FrameRect::new(100, 100, 800, 400), "once"));
        classify_images(&mut first);
        let mut second = HtmlSlide::new(2, CANVAS);
        second.images.push(image(FrameRect::new(100, 100, 800, 400), "other"));
        classify_images(&mut second);

        let mut slides = vec![first, second];
        assert!(hoist_logos(&mut slides).is_empty());
        assert_eq!(slides[0].images.len(), 1);
        assert_eq!(slides[1].images.len(), 1);
    }

    #[test]
    fn test_repeat_on_same_slide_is_not_recurring() {
        let mut slide = HtmlSlide::new(1, CANVAS);
        slide.images.push(image(FrameRect::new(100, 100, 800, 400), "twice"));
        slide.images.push(image(FrameRect::new(9_000, 4_500, 800, 400), "twice"));
        classify_images(&mut slide);
        let mut slides = vec![slide];
        assert!(hoist_logos(&mut slides).is_empty());
        assert_eq!(slides[0].images.len(), 2);
    }

    fn paragraph(bullet: Option<Bullet>) -> HtmlParagraph {
        HtmlParagraph {
            bullet,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_paragraphs() {
        let paragraphs = vec![
            paragraph(None),
            paragraph(Some(Bullet::Symbol(Some("•".into())))),
            paragraph(Some(Bullet::Symbol(None))),
            paragraph(Some(Bullet::Numbered("arabicPeriod".into()))),
            paragraph(Some(Bullet::NoBullet)),
            paragraph(Some(Bullet::Numbered("arabicPeriod".into()))),
        ];
        let groups = group_paragraphs(&paragraphs);
        assert_eq!(
            groups,
            vec![
                ParagraphGroup::Plain(0),
                ParagraphGroup::List {
                    kind: ListKind::Unordered,
                    items: vec![1, 2]
                },
                ParagraphGroup::List {
                    kind: ListKind::Ordered,
                    items: vec![3]
                },
                ParagraphGroup::Plain(4),
                ParagraphGroup::List {
                    kind: ListKind::Ordered,
                    items: vec![5]
                },
            ]
        );
    }
}
