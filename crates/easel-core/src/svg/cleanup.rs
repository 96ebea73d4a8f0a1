//! Structural and textual repairs applied to incoming SVG markup.

use super::xml::{SVG_NS, XLINK_NS, XmlElement};
use crate::objects::DEFAULT_FONT_FAMILY;
use crate::path::format_number;
use regex::Regex;
use std::sync::LazyLock;
use svgtypes::{Length, LengthUnit, ViewBox};

/// Elements that get an explicit fill.
const SHAPE_ELEMENTS: [&str; 7] = [
    "path", "rect", "circle", "ellipse", "polygon", "polyline", "line",
];

static EXTERNAL_IMPORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)@import\s+(?:url\(\s*['"]?https?://[^)]*\)|['"]https?://[^'"]*['"])[^;{}]*;?"#,
    )
    .ok()
});
static ANY_IMPORT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)@import[^;{}]*;?").ok());
static DEFS_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<defs\b[^>]*/>|<defs\b.*?</defs\s*>").ok());
static STYLE_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*/>|<style\b.*?</style\s*>").ok());
static CLASS_ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"\s+class\s*=\s*(?:"[^"]*"|'[^']*')"#).ok());

fn replace_all(pattern: &Option<Regex>, text: &str) -> String {
    match pattern {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Parse an inline `style` attribute into lowercase property names and values.
pub(crate) fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

pub(crate) fn style_value<'a>(style: &'a [(String, String)], property: &str) -> Option<&'a str> {
    style
        .iter()
        .rev()
        .find(|(k, _)| k == property)
        .map(|(_, v)| v.as_str())
}

/// Parse a positive, finite length; percentages are unusable.
pub(crate) fn parse_length(value: &str) -> Option<f64> {
    let length: Length = value.trim().parse().ok()?;
    if length.unit == LengthUnit::Percent {
        return None;
    }
    (length.number.is_finite() && length.number > 0.0).then_some(length.number)
}

pub(crate) fn parse_viewbox(value: &str) -> Option<ViewBox> {
    let vb: ViewBox = value.parse().ok()?;
    let usable = [vb.x, vb.y, vb.w, vb.h].iter().all(|v| v.is_finite()) && vb.w > 0.0 && vb.h > 0.0;
    usable.then_some(vb)
}

/// Run every structural repair of the minimal pass.
pub(crate) fn clean_tree(root: &mut XmlElement, default_size: f64) {
    ensure_namespaces(root);
    ensure_viewbox(root, default_size);
    if !root.has_attr("preserveAspectRatio") {
        root.set_attr("preserveAspectRatio", "xMidYMid meet");
    }
    let scripts = root.remove_descendants(&|e: &XmlElement| e.local_name() == "script");
    if scripts > 0 {
        log::warn!("Removed {} script elements", scripts);
    }
    let has_sheet = root.any(&|e: &XmlElement| e.local_name() == "style");
    ensure_styles(root, Inherited::default(), has_sheet);
}

fn ensure_namespaces(root: &mut XmlElement) {
    if !root.has_attr("xmlns") && !root.name.contains(':') {
        root.set_attr("xmlns", SVG_NS);
    }
    let uses_xlink = root.any(&|e: &XmlElement| e.attributes.iter().any(|(k, _)| k.starts_with("xlink:")));
    let declares_xlink = root.any(&|e: &XmlElement| e.has_attr("xmlns:xlink"));
    if uses_xlink && !declares_xlink {
        root.set_attr("xmlns:xlink", XLINK_NS);
    }
    root.canonicalize_namespace_decls();
}

fn ensure_viewbox(root: &mut XmlElement, default_size: f64) {
    let (w, h) = match root.attr("viewBox").and_then(parse_viewbox) {
        Some(vb) => (vb.w, vb.h),
        None => {
            let w = root.attr("width").and_then(parse_length);
            let h = root.attr("height").and_then(parse_length);
            let (w, h) = match (w, h) {
                (Some(w), Some(h)) => (w, h),
                _ => (default_size, default_size),
            };
            if root.has_attr("viewBox") {
                log::warn!("Replacing unusable viewBox");
            }
            root.set_attr(
                "viewBox",
                format!("0 0 {} {}", format_number(w), format_number(h)),
            );
            (w, h)
        }
    };
    root.set_attr("width", format_number(w));
    root.set_attr("height", format_number(h));
}

#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    fill: bool,
    stroke: bool,
    font: bool,
}

struct OwnStyle {
    fill: bool,
    stroke: bool,
    stroke_width: bool,
    font: bool,
}

fn own_style(el: &XmlElement) -> OwnStyle {
    let style = el.attr("style").map(parse_inline_style).unwrap_or_default();
    let stroke = style_value(&style, "stroke")
        .or_else(|| el.attr("stroke"))
        .is_some_and(|v| !v.trim().eq_ignore_ascii_case("none"));
    OwnStyle {
        fill: el.has_attr("fill") || style_value(&style, "fill").is_some(),
        stroke,
        stroke_width: el.has_attr("stroke-width") || style_value(&style, "stroke-width").is_some(),
        font: el.has_attr("font-family") || style_value(&style, "font-family").is_some(),
    }
}

fn ensure_styles(el: &mut XmlElement, inherited: Inherited, has_sheet: bool) {
    let own = own_style(el);
    let class_styled = has_sheet && el.has_attr("class");
    let name = el.local_name().to_string();

    if SHAPE_ELEMENTS.contains(&name.as_str()) {
        if !(own.fill || inherited.fill || class_styled) {
            let stroked = own.stroke || inherited.stroke || name == "line";
            el.set_attr("fill", if stroked { "none" } else { "#000000" });
        }
        if own.stroke && !own.stroke_width {
            el.set_attr("stroke-width", "1");
        }
    }
    if name == "text" && !(own.font || inherited.font || class_styled) {
        el.set_attr("font-family", DEFAULT_FONT_FAMILY);
    }

    let own = own_style(el);
    let next = Inherited {
        fill: inherited.fill || own.fill,
        stroke: inherited.stroke || own.stroke,
        font: inherited.font || own.font,
    };
    for child in el.elements_mut() {
        ensure_styles(child, next, has_sheet);
    }
}

/// Remove definitions, stylesheets and class hooks from a parsed tree.
pub(crate) fn strip_for_degrade(root: &mut XmlElement) {
    let removed = root.remove_descendants(&|e: &XmlElement| {
        matches!(e.local_name(), "defs" | "style")
    });
    let mut classes = 0;
    root.visit_mut(&mut |e: &mut XmlElement| {
        if e.remove_attr("class").is_some() {
            classes += 1;
        }
        if let Some(style) = e.attr("style").filter(|s| s.contains("@import")) {
            let cleaned = replace_all(&ANY_IMPORT, style);
            e.set_attr("style", cleaned);
        }
    });
    log::debug!("Degrade removed {} elements and {} class attributes", removed, classes);
}

/// Textual version of [`strip_for_degrade`] for markup that does not parse.
pub(crate) fn strip_for_degrade_text(markup: &str) -> String {
    let text = replace_all(&DEFS_BLOCK, markup);
    let text = replace_all(&STYLE_BLOCK, &text);
    let text = replace_all(&CLASS_ATTR, &text);
    replace_all(&ANY_IMPORT, &text)
}

/// Drop `@import` rules that pull remote resources.
pub(crate) fn strip_external_imports(markup: &str) -> String {
    replace_all(&EXTERNAL_IMPORT, markup)
}

/// Slice out the `<svg>...</svg>` element, dropping surrounding junk such as
/// prose or code fences.
pub(crate) fn extract_svg_fragment(markup: &str) -> &str {
    let Some(start) = markup.find("<svg") else {
        return markup;
    };
    match markup.rfind("</svg>") {
        Some(end) if end > start => &markup[start..end + "</svg>".len()],
        _ => &markup[start..],
    }
}

fn is_entity_body(body: &str) -> bool {
    if matches!(body, "amp" | "lt" | "gt" | "quot" | "apos") {
        return true;
    }
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(dec) = body.strip_prefix('#') {
        return !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Escape every `&` that does not start a predefined or numeric entity.
pub(crate) fn escape_stray_ampersands(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    for (i, c) in markup.char_indices() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let rest = &markup[i + 1..];
        let valid = rest
            .find(';')
            .filter(|end| *end <= 10)
            .is_some_and(|end| is_entity_body(&rest[..end]));
        if valid {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
    }
    out
}

/// Insert the SVG and xlink namespace declarations into the opening tag.
pub(crate) fn ensure_namespace_text(markup: &str) -> String {
    let mut text = markup.to_string();
    if !text.contains("xmlns=") {
        text = text.replacen("<svg", &format!("<svg xmlns=\"{SVG_NS}\""), 1);
    }
    if text.contains("xlink:") && !text.contains("xmlns:xlink=") {
        text = text.replacen("<svg", &format!("<svg xmlns:xlink=\"{XLINK_NS}\""), 1);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::xml::{RoxmlPort, XmlPort};

    fn cleaned(markup: &str) -> XmlElement {
        let mut root = RoxmlPort.parse(markup).unwrap();
        clean_tree(&mut root, 1080.0);
        root
    }

    fn first<'a>(root: &'a XmlElement, name: &str) -> &'a XmlElement {
        fn find<'a>(e: &'a XmlElement, name: &str) -> Option<&'a XmlElement> {
            if e.local_name() == name {
                return Some(e);
            }
            e.elements().find_map(|c| find(c, name))
        }
        find(root, name).unwrap()
    }

    #[test]
    fn test_viewbox_from_dimensions() {
        let root = cleaned(r#"<svg width="200px" height="100"><rect/></svg>"#);
        assert_eq!(root.attr("viewBox"), Some("0 0 200 100"));
        assert_eq!(root.attr("width"), Some("200"));
        assert_eq!(root.attr("height"), Some("100"));
        assert_eq!(root.attr("xmlns"), Some(SVG_NS));
        assert_eq!(root.attr("preserveAspectRatio"), Some("xMidYMid meet"));
    }

    #[test]
    fn test_default_viewbox_for_percentages() {
        let root = cleaned(r#"<svg width="100%" height="100%"/>"#);
        assert_eq!(root.attr("viewBox"), Some("0 0 1080 1080"));
    }

    #[test]
    fn test_existing_viewbox_drives_size() {
        let root = cleaned(r#"<svg viewBox="10 10 50 25" width="999"/>"#);
        assert_eq!(root.attr("viewBox"), Some("10 10 50 25"));
        assert_eq!(root.attr("width"), Some("50"));
        assert_eq!(root.attr("height"), Some("25"));
    }

    #[test]
    fn test_unusable_viewbox_is_replaced() {
        let root = cleaned(r#"<svg viewBox="0 0 0 10" width="30" height="40"/>"#);
        assert_eq!(root.attr("viewBox"), Some("0 0 30 40"));
    }

    #[test]
    fn test_fill_rules() {
        let root = cleaned(
            r##"<svg><rect/><circle stroke="red"/><line/><g fill="blue"><path/></g><g stroke="#000"><ellipse/></g><polygon style="fill: green"/></svg>"##,
        );
        assert_eq!(first(&root, "rect").attr("fill"), Some("#000000"));
        let circle = first(&root, "circle");
        assert_eq!(circle.attr("fill"), Some("none"));
        assert_eq!(circle.attr("stroke-width"), Some("1"));
        assert_eq!(first(&root, "line").attr("fill"), Some("none"));
        assert_eq!(first(&root, "path").attr("fill"), None);
        assert_eq!(first(&root, "ellipse").attr("fill"), Some("none"));
        assert_eq!(first(&root, "polygon").attr("fill"), None);
    }

    #[test]
    fn test_class_styled_shapes_are_left_alone() {
        let root = cleaned(r#"<svg><style>.a{fill:red}</style><rect class="a"/></svg>"#);
        assert_eq!(first(&root, "rect").attr("fill"), None);
        let bare = cleaned(r#"<svg><rect class="a"/></svg>"#);
        assert_eq!(first(&bare, "rect").attr("fill"), Some("#000000"));
    }

    #[test]
    fn test_scripts_removed_and_text_font() {
        let root = cleaned(r#"<svg><script>alert(1)</script><text>Hi</text></svg>"#);
        assert!(!root.any(&|e: &XmlElement| e.local_name() == "script"));
        assert_eq!(first(&root, "text").attr("font-family"), Some(DEFAULT_FONT_FAMILY));
    }

    #[test]
    fn test_xlink_namespace_not_duplicated() {
        let root = cleaned(
            r##"<svg><g xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a"/></g></svg>"##,
        );
        assert_eq!(root.attr("xmlns:xlink"), None);
    }

    #[test]
    fn test_escape_stray_ampersands() {
        assert_eq!(
            escape_stray_ampersands("a & b &amp; &#38; &#x26; &nbsp; &"),
            "a &amp; b &amp; &#38; &#x26; &amp;nbsp; &amp;"
        );
    }

    #[test]
    fn test_strip_external_imports() {
        let css = "@import url('https://fonts.example/x.css'); .a{fill:red}";
        assert_eq!(strip_external_imports(css).trim(), ".a{fill:red}");
        let local = "@import url(local.css);";
        assert_eq!(strip_external_imports(local), local);
    }

    #[test]
    fn test_ensure_namespace_text() {
        let text = ensure_namespace_text(r##"<svg><use xlink:href="#a"/></svg>"##);
        assert!(text.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(text.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#));
    }

    #[test]
    fn test_extract_svg_fragment() {
        assert_eq!(
            extract_svg_fragment("```svg\n<svg></svg>\n```"),
            "<svg></svg>"
        );
        assert_eq!(extract_svg_fragment("no markup"), "no markup");
    }

    #[test]
    fn test_degrade_text() {
        let markup = r#"<svg><defs><linearGradient id="g"/></defs><style>.a{}</style><rect class="a"/></svg>"#;
        assert_eq!(strip_for_degrade_text(markup), "<svg><rect/></svg>");
    }

    #[test]
    fn test_degrade_tree() {
        let mut root = RoxmlPort
            .parse(r#"<svg><defs/><style>.a{}</style><rect class="a" style="@import url(x); fill: red"/></svg>"#)
            .unwrap();
        strip_for_degrade(&mut root);
        assert_eq!(RoxmlPort.serialize(&root), r#"<svg><rect style=" fill: red"/></svg>"#);
    }
}
