//! Markup normalization for the WeChat rich-text renderer.
//!
//! Generated HTML is rewritten by an ordered list of [`Rule`]s. Each rule is a
//! pure function over the whole string. The order is part of the contract:
//! later rules may see text that earlier rules produced (the injected image
//! and header styles contain no color keywords, so rule 1 never touches them).
//!
//! | # | Rule | Postcondition |
//! |---|------|---------------|
//! | 1 | [`hex_color_keywords`] | no whole-word `white/black/red/blue/green/gray/grey` left |
//! | 2 | [`collapse_list_whitespace`] | no whitespace between list container/item tag boundaries |
//! | 3 | [`collapse_table_whitespace`] | no whitespace between table/section/row/cell boundaries |
//! | 4 | [`default_image_style`] | every `<img>` carries a `style` attribute |
//! | 5 | [`header_cell_background`] | every `<th>` carries exactly one background declaration |
//!
//! Rules 2-5 are idempotent, and rule 1 is idempotent because hex codes never
//! match a keyword. Markup that matches no rule passes through unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A named rewrite step.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The normalization pass, in application order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "hex_color_keywords",
        apply: hex_color_keywords,
    },
    Rule {
        name: "collapse_list_whitespace",
        apply: collapse_list_whitespace,
    },
    Rule {
        name: "collapse_table_whitespace",
        apply: collapse_table_whitespace,
    },
    Rule {
        name: "default_image_style",
        apply: default_image_style,
    },
    Rule {
        name: "header_cell_background",
        apply: header_cell_background,
    },
];

/// Style given to images that have none.
pub const DEFAULT_IMAGE_STYLE: &str =
    "width: 100%; height: auto; border-radius: 8px; display: block; margin: 20px auto;";

/// Header cell background; the renderer ignores backgrounds set on `<tr>`.
pub const HEADER_BACKGROUND: &str = "background-color: #667eea;";

/// Apply every rule in [`RULES`] order.
///
/// # Arguments
///
/// * `html` - Generated or hand-written markup; need not be well formed
///
/// # Returns
///
/// The rewritten markup. Running it again returns the same string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize("<ul>\n<li>red</li>\n</ul>"), "<ul><li>#ff0000</li></ul>");
/// ```
pub fn normalize(html: &str) -> String {
    RULES
        .iter()
        .fold(html.to_string(), |acc, rule| (rule.apply)(&acc))
}

static COLOR_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)white|black|red|blue|green|gr[ae]y").unwrap());

fn color_hex(keyword: &str) -> Option<&'static str> {
    match keyword.to_ascii_lowercase().as_str() {
        "white" => Some("#ffffff"),
        "black" => Some("#000000"),
        "red" => Some("#ff0000"),
        "blue" => Some("#0000ff"),
        "green" => Some("#008000"),
        "gray" | "grey" => Some("#808080"),
        _ => None,
    }
}

/// Characters that extend an identifier; a keyword touching one is not a word.
fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Rule 1: replace bare color keywords with hex codes.
///
/// Pre: any text. Post: no case-insensitive `white`, `black`, `red`, `blue`,
/// `green`, `gray` or `grey` remains as a whole word. Occurrences inside a
/// longer identifier (`bored`, `btn-red`, `red_box`, `whitespace`) are kept.
pub fn hex_color_keywords(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in COLOR_KEYWORD.find_iter(html) {
        let before = html[..m.start()].chars().next_back();
        let after = html[m.end()..].chars().next();
        let whole_word = !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char);
        if !whole_word {
            continue;
        }
        if let Some(hex) = color_hex(m.as_str()) {
            out.push_str(&html[last..m.start()]);
            out.push_str(hex);
            last = m.end();
        }
    }
    out.push_str(&html[last..]);
    out
}

static LIST_OPEN_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(ul|ol)(\s[^>]*)?>\s+<li").unwrap());
static ITEM_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"</li>\s+<li").unwrap());
static ITEM_LIST_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</li>\s+</(ul|ol)>").unwrap());

/// Rule 2: drop whitespace between list tag boundaries.
///
/// Pre: any text. Post: no whitespace between `<ul>`/`<ol>` and the first
/// `<li`, between `</li>` and `<li`, or between `</li>` and `</ul>`/`</ol>`.
pub fn collapse_list_whitespace(html: &str) -> String {
    let html = LIST_OPEN_ITEM.replace_all(html, |c: &Captures| {
        format!("<{}{}><li", &c[1], c.get(2).map_or("", |m| m.as_str()))
    });
    let html = ITEM_ITEM.replace_all(&html, "</li><li");
    ITEM_LIST_CLOSE.replace_all(&html, "</li></$1>").into_owned()
}

static TABLE_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(table|thead|tbody|tr)(\s[^>]*)?>\s+").unwrap());
static TABLE_CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</(tr|thead|tbody)>\s+").unwrap());
static CELL_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"</(th|td)>\s+<(th|td)").unwrap());
static CELL_ROW_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</(th|td)>\s+</tr>").unwrap());

/// Rule 3: drop whitespace between table tag boundaries.
///
/// Pre: any text. Post: no whitespace directly after `<table>`, `<thead>`,
/// `<tbody>`, `<tr>`, `</tr>`, `</thead>`, `</tbody>`, between a closing
/// and the next opening header/data cell, nor between the last cell and `</tr>`.
pub fn collapse_table_whitespace(html: &str) -> String {
    let html = TABLE_OPEN_TAG.replace_all(html, |c: &Captures| {
        format!("<{}{}>", &c[1], c.get(2).map_or("", |m| m.as_str()))
    });
    let html = TABLE_CLOSE_TAG.replace_all(&html, "</$1>");
    let html = CELL_CELL.replace_all(&html, "</$1><$2");
    CELL_ROW_CLOSE.replace_all(&html, "</$1></tr>").into_owned()
}

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img\b[^>]*>").unwrap());
// `style` must start an attribute; `data-style` does not count.
static STYLE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\sstyle\s*=").unwrap());

/// Rule 4: give unstyled images the default style.
///
/// Pre: any text. Post: every `<img>` tag has a `style` attribute; tags that
/// already had one are untouched.
pub fn default_image_style(html: &str) -> String {
    IMG_TAG
        .replace_all(html, |c: &Captures| {
            let tag = &c[0];
            if STYLE_ATTR.is_match(tag) {
                tag.to_string()
            } else {
                format!("<img style=\"{DEFAULT_IMAGE_STYLE}\"{}", &tag[4..])
            }
        })
        .into_owned()
}

static TH_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<th(\s[^>]*)?>").unwrap());
static STYLE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s(style\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))"#).unwrap()
});

/// Rule 5: inject a background on header cells that lack one.
///
/// Pre: any text. Post: every `<th>` tag's `style` contains a `background`
/// declaration, and tags that already had one are untouched (never
/// duplicated). An existing `style` attribute is extended; otherwise one is
/// added. Other attributes, `data-style` included, are never read or edited.
///
/// # Arguments
///
/// * `html` - Markup that may contain header cells
///
/// # Returns
///
/// The markup with every `<th>` opening tag carrying a background.
pub fn header_cell_background(html: &str) -> String {
    TH_TAG
        .replace_all(html, |c: &Captures| {
            let tag = &c[0];
            let attrs = c.get(1).map_or("", |m| m.as_str());
            match STYLE_VALUE.captures(attrs) {
                Some(style) => {
                    let whole = style.get(1).map_or(0..0, |m| m.range());
                    let (value, quote) = match (style.get(2), style.get(3), style.get(4)) {
                        (Some(v), _, _) => (v.as_str(), '"'),
                        (None, Some(v), _) => (v.as_str(), '\''),
                        (None, None, Some(v)) => (v.as_str(), '"'),
                        _ => ("", '"'),
                    };
                    if value.to_ascii_lowercase().contains("background") {
                        return tag.to_string();
                    }
                    format!(
                        "<th{}style={quote}{HEADER_BACKGROUND} {}{quote}{}>",
                        &attrs[..whole.start],
                        value.trim_start(),
                        &attrs[whole.end..]
                    )
                }
                None => format!("<th style=\"{HEADER_BACKGROUND}\"{attrs}>"),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_become_hex() {
        let out = hex_color_keywords(r#"<p style="color: White; background: GREY">red and blue</p>"#);
        assert_eq!(
            out,
            r#"<p style="color: #ffffff; background: #808080">#ff0000 and #0000ff</p>"#
        );
    }

    #[test]
    fn colors_inside_identifiers_are_untouched() {
        let input = r#"<div class="btn-red bored red_box whitespace greenish" data-x="blackout">"#;
        assert_eq!(hex_color_keywords(input), input);
    }

    #[test]
    fn colors_adjacent_to_punctuation_are_words() {
        let out = hex_color_keywords("color:black;border:1px solid gray}");
        assert_eq!(out, "color:#000000;border:1px solid #808080}");
        assert!(!out.to_lowercase().contains("black"));
    }

    #[test]
    fn hex_codes_are_left_alone() {
        let input = "color: #ffffff; background: #0000ff";
        assert_eq!(hex_color_keywords(input), input);
    }

    #[test]
    fn list_whitespace_is_removed() {
        let input = "<ul style=\"margin:0\">\n  <li>a</li>\n\n  <li>b</li>\n</ul><ol>\t<li>c</li> </ol>";
        assert_eq!(
            collapse_list_whitespace(input),
            "<ul style=\"margin:0\"><li>a</li><li>b</li></ul><ol><li>c</li></ol>"
        );
    }

    #[test]
    fn list_item_text_whitespace_is_kept() {
        let input = "<ul><li>  spaced text  </li></ul>";
        assert_eq!(collapse_list_whitespace(input), input);
    }

    #[test]
    fn table_whitespace_is_removed() {
        let input = "<table style=\"width:100%\">\n<thead>\n<tr>\n<th>A</th>\n<th>B</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>1</td>  <td>2</td>\n</tr>\n</tbody></table>";
        assert_eq!(
            collapse_table_whitespace(input),
            "<table style=\"width:100%\"><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn last_cell_joins_row_close() {
        assert_eq!(
            collapse_table_whitespace("<tr><td>1</td>\n  </tr><tr><th>A</th> </tr>"),
            "<tr><td>1</td></tr><tr><th>A</th></tr>"
        );
        assert_eq!(
            collapse_table_whitespace("<td> padded </td></tr>"),
            "<td> padded </td></tr>"
        );
    }

    #[test]
    fn track_tag_is_not_a_row() {
        let input = "<track src=\"a.vtt\">  text";
        assert_eq!(collapse_table_whitespace(input), input);
    }

    #[test]
    fn images_get_default_style_once() {
        let out = default_image_style(r#"<img src="a.png"><img style="width:50%" src="b.png">"#);
        assert_eq!(
            out,
            format!(r#"<img style="{DEFAULT_IMAGE_STYLE}" src="a.png"><img style="width:50%" src="b.png">"#)
        );
        assert_eq!(default_image_style(&out), out);
    }

    #[test]
    fn data_style_does_not_count_as_style() {
        assert_eq!(
            default_image_style(r#"<img data-style="lazy" src="a.png">"#),
            format!(r#"<img style="{DEFAULT_IMAGE_STYLE}" data-style="lazy" src="a.png">"#)
        );
        assert_eq!(
            header_cell_background(r#"<th data-style="x" style="color:#fff">A</th>"#),
            format!(r#"<th data-style="x" style="{HEADER_BACKGROUND} color:#fff">A</th>"#)
        );
        assert_eq!(
            header_cell_background(r#"<th data-style="background: red">A</th>"#),
            format!(r#"<th style="{HEADER_BACKGROUND}" data-style="background: red">A</th>"#)
        );
    }

    #[test]
    fn background_outside_style_is_ignored() {
        assert_eq!(
            header_cell_background(r#"<th class="no-background">A</th>"#),
            format!(r#"<th style="{HEADER_BACKGROUND}" class="no-background">A</th>"#)
        );
    }

    #[test]
    fn unquoted_style_is_extended() {
        let out = header_cell_background("<th style=color:#fff>A</th>");
        assert_eq!(out, format!("<th style=\"{HEADER_BACKGROUND} color:#fff\">A</th>"));
        assert_eq!(out.matches("style=").count(), 1);
        assert_eq!(header_cell_background(&out), out);
    }

    #[test]
    fn header_cells_get_background() {
        assert_eq!(
            header_cell_background("<th>Rank</th>"),
            format!("<th style=\"{HEADER_BACKGROUND}\">Rank</th>")
        );
        assert_eq!(
            header_cell_background(r#"<th style="padding: 8px;" colspan="2">A</th>"#),
            format!(r#"<th style="{HEADER_BACKGROUND} padding: 8px;" colspan="2">A</th>"#)
        );
        assert_eq!(
            header_cell_background("<th class='x' style='color:#fff'>A</th>"),
            format!("<th class='x' style='{HEADER_BACKGROUND} color:#fff'>A</th>")
        );
    }

    #[test]
    fn header_background_is_never_duplicated() {
        let styled = r#"<th style="background: #333; color: #fff">A</th>"#;
        assert_eq!(header_cell_background(styled), styled);

        let once = header_cell_background("<th>A</th><thead><th style=\"padding:4px\">B</th>");
        assert_eq!(once.matches("background-color").count(), 2);
        assert_eq!(header_cell_background(&once), once);
        assert!(once.contains("<thead>"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = r#"<div style="color: white">
<ul>
  <li>One</li>
  <li>Two</li>
</ul>
<table>
  <thead>
    <tr style="background: #667eea">
      <th>Name</th>
      <th style="padding: 8px">Why</th>
    </tr>
  </thead>
  <tbody>
    <tr><td>Red Hat</td>  <td>blue-chip</td></tr>
  </tbody>
</table>
<img src="x.png">
</div>"#;
        let once = normalize(input);
        let twice = normalize(&once);
        assert_eq!(once, twice);
        assert!(once.contains("#ffffff"));
        assert!(once.contains("#ff0000 Hat"));
        assert!(once.contains("blue-chip"));
        assert!(once.contains("<ul><li>One</li><li>Two</li></ul>"));
        assert_eq!(once.matches(HEADER_BACKGROUND).count(), 2);
        assert!(once.contains(DEFAULT_IMAGE_STYLE));
    }

    #[test]
    fn malformed_markup_passes_through() {
        let input = "<div <<p>> unbalanced </span";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn rules_are_in_contract_order() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "hex_color_keywords",
                "collapse_list_whitespace",
                "collapse_table_whitespace",
                "default_image_style",
                "header_cell_background"
            ]
        );
    }
}
