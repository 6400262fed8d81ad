use once_cell::sync::Lazy;
use regex::Regex;

/// Block-level markup produced by [`format`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    /// One entry per bullet line.
    List(Vec<Vec<Inline>>),
    /// Triple-backtick fenced content, verbatim.
    Code(String),
}

/// Inline markup within a paragraph or list item. Links are rendered so
/// that activating them opens a fresh external browser context carrying no
/// referrer back to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Em(String),
    Code(String),
    Link { label: String, url: String },
    Break,
}

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[*\-]\s*(.*)$").expect("invalid bullet regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").expect("invalid link regex"));
static STRONG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("invalid strong regex"));
static EM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("invalid em regex"));
static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").expect("invalid code regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("invalid url regex"));

/// Convert semi-structured reply text into renderable markup.
///
/// One tokenizing pass per line, so a URL swallowed by the `[label](url)`
/// rule can never be linked a second time, and a bullet's leading `*` is
/// consumed by list detection before emphasis ever sees it. Fenced segments
/// are split off first and kept verbatim. Empty input produces no blocks,
/// and no input is an error.
pub fn format(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();

    // Alternating prose / fenced segments. An unmatched opening fence makes
    // the trailing segment a code block rather than an error.
    for (i, segment) in text.split("```").enumerate() {
        if i % 2 == 1 {
            if !segment.trim().is_empty() {
                blocks.push(Block::Code(segment.to_string()));
            }
        } else if !segment.is_empty() {
            format_prose(segment, &mut blocks);
        }
    }

    blocks
}

fn format_prose(segment: &str, blocks: &mut Vec<Block>) {
    let mut para: Vec<Inline> = Vec::new();
    let mut list: Vec<Vec<Inline>> = Vec::new();
    let mut prev_was_bullet = false;
    let mut first_line = true;

    for line in segment.lines() {
        // A newline becomes an explicit break unless it closed a bullet
        // line; that break is dropped so blank gaps don't open up between
        // a list and what follows it.
        if !first_line && !prev_was_bullet {
            para.push(Inline::Break);
        }
        first_line = false;

        if let Some(cap) = BULLET_RE.captures(line) {
            if !para.is_empty() {
                blocks.push(Block::Paragraph(std::mem::take(&mut para)));
            }
            list.push(parse_inlines(&cap[1]));
            prev_was_bullet = true;
        } else {
            if !list.is_empty() {
                blocks.push(Block::List(std::mem::take(&mut list)));
            }
            para.extend(parse_inlines(line));
            prev_was_bullet = false;
        }
    }

    if !list.is_empty() {
        blocks.push(Block::List(list));
    }
    if !para.is_empty() {
        blocks.push(Block::Paragraph(para));
    }
}

/// Scan one line for inline constructs, earliest match first. Ties at the
/// same position resolve in the order links, strong, em, code, bare URL.
fn parse_inlines(line: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        let candidates = [
            LINK_RE.captures(rest),
            STRONG_RE.captures(rest),
            EM_RE.captures(rest),
            CODE_RE.captures(rest),
            URL_RE.captures(rest),
        ];

        let Some((which, cap)) = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|c| (i, c)))
            .min_by_key(|(i, c)| (c.get(0).map(|m| m.start()).unwrap_or(0), *i))
        else {
            out.push(Inline::Text(rest.to_string()));
            break;
        };

        let Some(m) = cap.get(0) else { break };
        if m.start() > 0 {
            out.push(Inline::Text(rest[..m.start()].to_string()));
        }

        out.push(match which {
            0 => Inline::Link {
                label: cap[1].to_string(),
                url: cap[2].to_string(),
            },
            1 => Inline::Strong(cap[1].to_string()),
            2 => Inline::Em(cap[1].to_string()),
            3 => Inline::Code(cap[1].to_string()),
            _ => Inline::Link {
                label: m.as_str().to_string(),
                url: m.as_str().to_string(),
            },
        });

        rest = &rest[m.end()..];
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Vec<Block> {
        vec![Block::Paragraph(vec![Inline::Text(s.to_string())])]
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(format("").is_empty());
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(format("hello world"), plain("hello world"));
    }

    #[test]
    fn test_markdown_link() {
        let blocks = format("see [Reuters](https://reuters.com) today");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                Inline::Text("see ".to_string()),
                Inline::Link {
                    label: "Reuters".to_string(),
                    url: "https://reuters.com".to_string(),
                },
                Inline::Text(" today".to_string()),
            ])]
        );
    }

    #[test]
    fn test_link_url_is_not_relinked() {
        // The URL inside [..](..) must be consumed exactly once.
        let blocks = format("[a](https://a.example)");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(inlines.len(), 1);
        assert!(matches!(&inlines[0], Inline::Link { label, .. } if label == "a"));
    }

    #[test]
    fn test_bare_url_autolinks() {
        let blocks = format("go to https://example.com now");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[1],
            Inline::Link {
                label: "https://example.com".to_string(),
                url: "https://example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_bullet_star_is_not_emphasis() {
        let blocks = format("* first point\n* second point");
        assert_eq!(
            blocks,
            vec![Block::List(vec![
                vec![Inline::Text("first point".to_string())],
                vec![Inline::Text("second point".to_string())],
            ])]
        );
    }

    #[test]
    fn test_dash_and_indented_bullets() {
        let blocks = format("  - one\n\t* two");
        assert_eq!(
            blocks,
            vec![Block::List(vec![
                vec![Inline::Text("one".to_string())],
                vec![Inline::Text("two".to_string())],
            ])]
        );
    }

    #[test]
    fn test_emphasis_inside_bullet_content() {
        let blocks = format("- a **bold** word");
        assert_eq!(
            blocks,
            vec![Block::List(vec![vec![
                Inline::Text("a ".to_string()),
                Inline::Strong("bold".to_string()),
                Inline::Text(" word".to_string()),
            ]])]
        );
    }

    #[test]
    fn test_strong_beats_em_at_same_position() {
        let blocks = format("**bold** and *italic*");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                Inline::Strong("bold".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Em("italic".to_string()),
            ])]
        );
    }

    #[test]
    fn test_inline_code() {
        let blocks = format("run `cargo doc` once");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(inlines[1], Inline::Code("cargo doc".to_string()));
    }

    #[test]
    fn test_fenced_code_block_is_verbatim() {
        let blocks = format("before\n```\nlet x = **not bold**;\n```\nafter");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1], Block::Code("\nlet x = **not bold**;\n".to_string()));
    }

    #[test]
    fn test_unmatched_fence_does_not_panic() {
        let blocks = format("text\n```\ndangling code");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], Block::Code("\ndangling code".to_string()));
    }

    #[test]
    fn test_line_breaks_become_explicit() {
        let blocks = format("one\ntwo");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                Inline::Text("one".to_string()),
                Inline::Break,
                Inline::Text("two".to_string()),
            ])]
        );
    }

    #[test]
    fn test_break_after_list_is_suppressed() {
        // The newline that closes a bullet line never becomes a break, so
        // "- a\n\ntext" carries a single break into the paragraph.
        let blocks = format("- a\n\ntext");
        assert_eq!(
            blocks,
            vec![
                Block::List(vec![vec![Inline::Text("a".to_string())]]),
                Block::Paragraph(vec![Inline::Break, Inline::Text("text".to_string())]),
            ]
        );
    }

    #[test]
    fn test_never_panics_on_hostile_input() {
        for s in [
            "***",
            "``",
            "`",
            "[](http://x)",
            "[label](not-a-url)",
            "**unclosed",
            "*",
            "\n\n\n",
            "```",
            "`````",
            "- ",
            "[a](https://x.com) https://x.com",
        ] {
            let _ = format(s);
        }
    }
}
