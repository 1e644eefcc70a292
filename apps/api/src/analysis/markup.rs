//! HTML rendering of rewrite highlights.
//!
//! Every byte of source text and every tooltip is escaped before any tag is added,
//! so hostile markup in the input renders as inert text. The only elements emitted
//! are `<mark>` elements with `class`, `data-change` and `title` attributes.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::analysis::rewriter::{ChangeType, Highlight};

/// Escapes text for use in HTML element content and quoted attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn class_for(kind: ChangeType) -> &'static str {
    match kind {
        ChangeType::Keyword => "change-keyword",
        ChangeType::Enhancement => "change-enhancement",
        ChangeType::Metric => "change-metric",
    }
}

/// Renders `text` with each highlight wrapped in a `<mark>`.
///
/// Overlapping highlights are split at every span boundary so the output always
/// nests correctly; a span crossing another becomes several adjacent marks.
/// Highlights that fall outside the text or off a char boundary are ignored.
///
/// Boundaries are swept once in order, so cost is linear in the output size plus
/// a log factor per highlight.
pub fn render_marked(text: &str, highlights: &[Highlight]) -> String {
    let valid: Vec<&Highlight> = highlights
        .iter()
        .filter(|h| {
            h.start < h.end
                && h.end <= text.len()
                && text.is_char_boundary(h.start)
                && text.is_char_boundary(h.end)
        })
        .collect();

    let mut cuts: Vec<usize> = vec![0, text.len()];
    for h in &valid {
        cuts.push(h.start);
        cuts.push(h.end);
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut by_start: Vec<usize> = (0..valid.len()).collect();
    by_start.sort_by_key(|&i| valid[i].start);
    let mut pending = by_start.into_iter().peekable();

    // Keyed by position in `valid` so marks open in caller order.
    let mut active: BTreeMap<usize, &Highlight> = BTreeMap::new();
    let mut ends: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();

    let mut out = String::with_capacity(text.len() * 2);
    for seg in cuts.windows(2) {
        let (a, b) = (seg[0], seg[1]);

        while let Some(&Reverse((end, i))) = ends.peek() {
            if end > a {
                break;
            }
            ends.pop();
            active.remove(&i);
        }
        while let Some(i) = pending.next_if(|&i| valid[i].start <= a) {
            active.insert(i, valid[i]);
            ends.push(Reverse((valid[i].end, i)));
        }

        for h in active.values() {
            out.push_str(&format!(
                "<mark class=\"{}\" data-change=\"{}\" title=\"{}\">",
                class_for(h.kind),
                h.change_index,
                escape_html(&h.tooltip)
            ));
        }
        out.push_str(&escape_html(&text[a..b]));
        for _ in 0..active.len() {
            out.push_str("</mark>");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hl(start: usize, end: usize, kind: ChangeType, idx: usize) -> Highlight {
        Highlight {
            start,
            end,
            kind,
            tooltip: format!("tip {idx}"),
            change_index: idx,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_plain_text_without_highlights() {
        assert_eq!(render_marked("plain", &[]), "plain");
        assert_eq!(render_marked("", &[]), "");
    }

    #[test]
    fn test_single_highlight() {
        let html = render_marked("Led a project.", &[hl(6, 13, ChangeType::Keyword, 0)]);
        assert_eq!(
            html,
            "Led a <mark class=\"change-keyword\" data-change=\"0\" title=\"tip 0\">project</mark>."
        );
    }

    #[test]
    fn test_hostile_input_is_neutralized() {
        let text = "<script>alert(1)</script> rust <img src=x onerror=alert(2)>";
        let start = text.find("rust").unwrap();
        let mut h = hl(start, start + 4, ChangeType::Keyword, 0);
        h.tooltip = "\"><script>alert(3)</script>".to_string();
        let html = render_marked(text, &[h]);
        assert!(!html.contains("<script"));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("title=\"&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_crossing_highlights_nest_correctly() {
        // "abcdef": [0,4) and [2,6) cross.
        let html = render_marked(
            "abcdef",
            &[hl(0, 4, ChangeType::Keyword, 0), hl(2, 6, ChangeType::Metric, 1)],
        );
        assert_eq!(html.matches("<mark").count(), html.matches("</mark>").count());
        let stripped: String = {
            let mut s = String::new();
            let mut in_tag = false;
            for c in html.chars() {
                match c {
                    '<' => in_tag = true,
                    '>' => in_tag = false,
                    _ if !in_tag => s.push(c),
                    _ => {}
                }
            }
            s
        };
        assert_eq!(stripped, "abcdef");
        // Middle segment "cd" is wrapped by both.
        assert!(html.contains("data-change=\"1\" title=\"tip 1\">cd</mark></mark>"));
    }

    #[test]
    fn test_duplicate_spans_wrap_twice() {
        let html = render_marked(
            "rust",
            &[hl(0, 4, ChangeType::Keyword, 0), hl(0, 4, ChangeType::Keyword, 1)],
        );
        assert_eq!(html.matches("<mark").count(), 2);
    }

    #[test]
    fn test_nested_and_adjacent_spans() {
        // [0,6) contains [2,4); [6,8) starts where the outer one ends.
        let html = render_marked(
            "abcdefgh",
            &[
                hl(0, 6, ChangeType::Keyword, 0),
                hl(2, 4, ChangeType::Enhancement, 1),
                hl(6, 8, ChangeType::Metric, 2),
            ],
        );
        assert_eq!(
            html,
            "<mark class=\"change-keyword\" data-change=\"0\" title=\"tip 0\">ab</mark>\
             <mark class=\"change-keyword\" data-change=\"0\" title=\"tip 0\">\
             <mark class=\"change-enhancement\" data-change=\"1\" title=\"tip 1\">cd</mark></mark>\
             <mark class=\"change-keyword\" data-change=\"0\" title=\"tip 0\">ef</mark>\
             <mark class=\"change-metric\" data-change=\"2\" title=\"tip 2\">gh</mark>"
        );
    }

    #[test]
    fn test_many_highlights_render_in_linear_time() {
        let n = 50_000;
        let text = "a ".repeat(n);
        let highlights: Vec<Highlight> = (0..n)
            .map(|i| hl(2 * i, 2 * i + 1, ChangeType::Keyword, i))
            .collect();

        let started = std::time::Instant::now();
        let html = render_marked(&text, &highlights);
        let elapsed = started.elapsed();

        assert_eq!(html.matches("<mark").count(), n);
        assert_eq!(html.matches("</mark>").count(), n);
        // A per-segment scan over all highlights takes minutes at this size.
        assert!(elapsed.as_secs() < 10, "render took {elapsed:?}");
    }

    #[test]
    fn test_out_of_range_highlight_ignored() {
        assert_eq!(render_marked("abc", &[hl(1, 10, ChangeType::Metric, 0)]), "abc");
    }
}
