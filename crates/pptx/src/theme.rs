//! Theme colour scheme and colour resolution.

use crate::package::{rel_types, PptxPackage, PRESENTATION_PART};
use crate::xml::XmlElement;
use deck_core::Result;
use std::collections::HashMap;

/// Fallback theme location when relationships don't lead to one.
const DEFAULT_THEME_PART: &str = "ppt/theme/theme1.xml";

/// Colour slots of a theme's `a:clrScheme`.
const SCHEME_SLOTS: &[&str] = &[
    "dk1", "lt1", "dk2", "lt2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

/// Resolved theme colours keyed by slot name, values as `#RRGGBB`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeColors {
    slots: HashMap<String, String>,
}

impl ThemeColors {
    /// Load the colour scheme of the deck's first slide master theme.
    pub fn load(package: &PptxPackage) -> Result<Self> {
        let Some(theme_part) = locate_theme(package)? else {
            log::debug!("No theme part found; scheme colours fall back to black");
            return Ok(Self::default());
        };
        let theme = package.part_xml(&theme_part)?;
        Ok(Self::from_theme(&theme))
    }

    /// Read slots from a parsed `a:theme` element.
    pub fn from_theme(theme: &XmlElement) -> Self {
        let mut slots = HashMap::new();
        if let Some(scheme) = theme.find("clrScheme") {
            for slot in SCHEME_SLOTS {
                if let Some(color) = scheme.child(slot).and_then(literal_color) {
                    slots.insert(slot.to_string(), color);
                }
            }
        }
        Self { slots }
    }

    /// Build from explicit slot values (used by tests and callers with their own scheme).
    pub fn from_slots<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            slots: slots
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a symbolic scheme colour such as `accent1` or `tx1`.
    pub fn scheme(&self, name: &str) -> Option<&str> {
        let slot = match name {
            "tx1" => "dk1",
            "bg1" => "lt1",
            "tx2" => "dk2",
            "bg2" => "lt2",
            other => other,
        };
        self.slots.get(slot).map(String::as_str)
    }

    /// Resolve the colour held by a fill-like element (e.g. `a:solidFill`).
    ///
    /// Direct RGB wins; scheme references go through the theme.
    pub fn resolve(&self, fill: &XmlElement) -> Option<String> {
        if let Some(color) = literal_color(fill) {
            return Some(color);
        }
        fill.child("schemeClr")
            .and_then(|c| c.attr("val"))
            .and_then(|name| self.scheme(name))
            .map(str::to_string)
    }
}

/// A colour that doesn't need the theme: `srgbClr`, `sysClr` or `prstClr`.
fn literal_color(container: &XmlElement) -> Option<String> {
    if let Some(val) = container.child("srgbClr").and_then(|c| c.attr("val")) {
        return normalize_hex(val);
    }
    if let Some(sys) = container.child("sysClr") {
        if let Some(last) = sys.attr("lastClr") {
            return normalize_hex(last);
        }
        return match sys.attr("val") {
            Some("windowText") => Some("#000000".to_string()),
            Some("window") => Some("#FFFFFF".to_string()),
            _ => None,
        };
    }
    container
        .child("prstClr")
        .and_then(|c| c.attr("val"))
        .and_then(preset_color)
        .map(str::to_string)
}

fn normalize_hex(value: &str) -> Option<String> {
    let value = value.trim().trim_start_matches('#');
    if value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", value.to_ascii_uppercase()))
    } else {
        None
    }
}

fn preset_color(name: &str) -> Option<&'static str> {
    match name {
        "black" => Some("#000000"),
        "white" => Some("#FFFFFF"),
        "red" => Some("#FF0000"),
        "green" => Some("#008000"),
        "blue" => Some("#0000FF"),
        "yellow" => Some("#FFFF00"),
        "gray" | "grey" => Some("#808080"),
        _ => None,
    }
}

/// The theme part used by the first slide master.
pub fn locate_theme(package: &PptxPackage) -> Result<Option<String>> {
    if let Some(master) = package.related_part(PRESENTATION_PART, rel_types::SLIDE_MASTER)? {
        if let Some(theme) = package.related_part(&master, rel_types::THEME)? {
            if package.has_part(&theme) {
                return Ok(Some(theme));
            }
        }
    }
    if let Some(theme) = package.related_part(PRESENTATION_PART, rel_types::THEME)? {
        if package.has_part(&theme) {
            return Ok(Some(theme));
        }
    }
    Ok(package
        .has_part(DEFAULT_THEME_PART)
        .then(|| DEFAULT_THEME_PART.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME: &str = r#"<a:theme xmlns:a="a"><a:themeElements><a:clrScheme name="Office">
        <a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
        <a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
        <a:dk2><a:srgbClr val="1f497d"/></a:dk2>
        <a:lt2><a:srgbClr val="EEECE1"/></a:lt2>
        <a:accent1><a:srgbClr val="4F81BD"/></a:accent1>
    </a:clrScheme></a:themeElements></a:theme>"#;

    #[test]
    fn test_scheme_slots_and_aliases() {
        let theme = ThemeColors::from_theme(&XmlElement::parse(THEME).unwrap());
        assert_eq!(theme.scheme("accent1"), Some("#4F81BD"));
        assert_eq!(theme.scheme("tx2"), Some("#1F497D"));
        assert_eq!(theme.scheme("bg1"), Some("#FFFFFF"));
        assert_eq!(theme.scheme("accent6"), None);
    }

    #[test]
    fn test_resolve_fill() {
        let theme = ThemeColors::from_slots([("accent2", "#C0504D")]);
        let direct = XmlElement::parse(r#"<a:solidFill xmlns:a="a"><a:srgbClr val="00ff00"/></a:solidFill>"#).unwrap();
        assert_eq!(theme.resolve(&direct).as_deref(), Some("#00FF00"));

        let scheme = XmlElement::parse(r#"<a:solidFill xmlns:a="a"><a:schemeClr val="accent2"/></a:solidFill>"#).unwrap();
        assert_eq!(theme.resolve(&scheme).as_deref(), Some("#C0504D"));

        let unknown = XmlElement::parse(r#"<a:solidFill xmlns:a="a"><a:schemeClr val="accent5"/></a:solidFill>"#).unwrap();
        assert_eq!(theme.resolve(&unknown), None);
    }
}
