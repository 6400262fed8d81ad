use once_cell::sync::Lazy;
use regex::Regex;

/// A cited name/URL pair pulled out of a reply's "Sources:" section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub url: String,
}

const SOURCES_HEADING: &str = "Sources:";

static SOURCE_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").expect("invalid source link regex")
});

/// Split a raw reply into its main body and the citations listed after the
/// first "Sources:" heading. Replies without the heading come back unchanged
/// with an empty source list. Entries that don't parse as `[name](url)` are
/// skipped, not errors.
pub fn split_sources(raw: &str) -> (String, Vec<Source>) {
    let Some(idx) = raw.find(SOURCES_HEADING) else {
        return (raw.to_string(), Vec::new());
    };

    let main_text = raw[..idx].trim().to_string();
    let tail = &raw[idx + SOURCES_HEADING.len()..];

    let sources = SOURCE_LINK_RE
        .captures_iter(tail)
        .map(|cap| Source {
            name: cap[1].to_string(),
            url: cap[2].to_string(),
        })
        .collect();

    (main_text, sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_heading_returns_input_unchanged() {
        let raw = "Oil prices rose 3% this quarter.";
        let (main_text, sources) = split_sources(raw);
        assert_eq!(main_text, raw);
        assert!(sources.is_empty());
    }

    #[test]
    fn test_sources_extracted_in_document_order() {
        let raw = "Prices are volatile.\n\nSources:\n- [Reuters](https://reuters.com/energy)\n- [Bloomberg](https://bloomberg.com/oil)\n- [Wikipedia](http://en.wikipedia.org/wiki/Oil)";
        let (main_text, sources) = split_sources(raw);
        assert_eq!(main_text, "Prices are volatile.");
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].name, "Reuters");
        assert_eq!(sources[0].url, "https://reuters.com/energy");
        assert_eq!(sources[1].name, "Bloomberg");
        assert_eq!(sources[2].url, "http://en.wikipedia.org/wiki/Oil");
    }

    #[test]
    fn test_main_text_is_trimmed() {
        let raw = "  The answer.  \n\nSources:\n- [A](https://a.example)";
        let (main_text, _) = split_sources(raw);
        assert_eq!(main_text, "The answer.");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let raw = "Body\n\nSources:\n- [Good](https://good.example)\n- Bad entry without a link\n- [NoScheme](ftp://nope.example)\n- [Spaced](https://bad example.com)";
        let (_, sources) = split_sources(raw);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Good");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let raw = "Body\n\nSources:\n- [Same](https://same.example)\n- [Same](https://same.example)";
        let (_, sources) = split_sources(raw);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], sources[1]);
    }

    #[test]
    fn test_heading_with_empty_tail() {
        let (main_text, sources) = split_sources("All I know.\n\nSources:");
        assert_eq!(main_text, "All I know.");
        assert!(sources.is_empty());
    }

    #[test]
    fn test_only_first_heading_splits() {
        let raw = "Intro\n\nSources:\n- [One](https://one.example)\nSources:\n- [Two](https://two.example)";
        let (main_text, sources) = split_sources(raw);
        assert_eq!(main_text, "Intro");
        // Everything after the first heading is scanned, including the second list.
        assert_eq!(sources.len(), 2);
    }
}
