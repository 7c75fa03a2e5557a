//! Terminal output to HTML. Only SGR colour/bold codes are kept; every other
//! escape sequence is dropped.

const FG: [&str; 8] = ["#000000", "#cd3131", "#0dbc79", "#e5e510", "#2472c8", "#bc3fbc", "#11a8cd", "#e5e5e5"];
const FG_BRIGHT: [&str; 8] = ["#666666", "#f14c4c", "#23d18b", "#f5f543", "#3b8eea", "#d670d6", "#29b8db", "#ffffff"];

#[derive(Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    bold: bool,
    fg: Option<&'static str>,
}

impl Style {
    fn apply(&mut self, code: u32) {
        match code {
            0 => *self = Style::default(),
            1 => self.bold = true,
            22 => self.bold = false,
            30..=37 => self.fg = Some(FG[(code - 30) as usize]),
            39 => self.fg = None,
            90..=97 => self.fg = Some(FG_BRIGHT[(code - 90) as usize]),
            _ => {}
        }
    }

    fn open_tag(&self) -> Option<String> {
        if *self == Style::default() {
            return None;
        }
        let mut css = String::new();
        if let Some(c) = self.fg {
            css.push_str(&format!("color:{c};"));
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        Some(format!("<span style=\"{css}\">"))
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Convert ANSI-coloured text into an HTML fragment.
pub fn ansi_to_html_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut style = Style::default();
    let mut span_open = false;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\r' => {}
                _ => out.push(ch),
            }
            continue;
        }
        if chars.peek() != Some(&'[') {
            continue;
        }
        chars.next();
        let mut params = String::new();
        let mut terminator = None;
        for c in chars.by_ref() {
            if c.is_ascii_alphabetic() {
                terminator = Some(c);
                break;
            }
            params.push(c);
        }
        if terminator != Some('m') {
            continue;
        }
        if params.is_empty() {
            style.apply(0);
        }
        for p in params.split(';') {
            if let Ok(code) = p.parse::<u32>() {
                style.apply(code);
            }
        }
        if span_open {
            out.push_str("</span>");
            span_open = false;
        }
        if let Some(tag) = style.open_tag() {
            out.push_str(&tag);
            span_open = true;
        }
    }
    if span_open {
        out.push_str("</span>");
    }
    out
}

/// Standalone HTML page showing `raw` as a dark terminal.
pub fn ansi_to_html(title: &str, raw: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
<style>body{{background:#1e1e1e;color:#d4d4d4;}}pre{{white-space:pre-wrap;font-family:monospace;}}</style>\n\
</head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
        escape_html(title),
        ansi_to_html_fragment(raw)
    )
}
