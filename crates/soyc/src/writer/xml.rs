//! XML escaping for report text and attributes

use std::borrow::Cow;

/// Escape character data for use between tags
///
/// Carriage returns are written as character references so that parsers do
/// not fold line endings.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text, false)
}

/// Escape a value for use inside a double-quoted attribute
///
/// Tabs and line breaks are written as character references; written
/// literally, attribute value normalization turns them into spaces.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    escape(value, true)
}

fn needs_escape(ch: char, attr: bool) -> bool {
    matches!(ch, '&' | '<' | '>' | '"' | '\r')
        || (attr && matches!(ch, '\'' | '\n' | '\t'))
        || !is_xml_char(ch)
}

/// Characters XML 1.0 allows in a document
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r') || (ch >= '\u{20}' && ch != '\u{FFFE}' && ch != '\u{FFFF}')
}

fn escape(text: &str, attr: bool) -> Cow<'_, str> {
    let Some(first) = text.find(|ch: char| needs_escape(ch, attr)) else {
        return Cow::Borrowed(text);
    };

    let mut escaped = String::with_capacity(text.len() + 16);
    escaped.push_str(&text[..first]);
    for ch in text[first..].chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\r' => escaped.push_str("&#13;"),
            '\'' if attr => escaped.push_str("&apos;"),
            '\n' if attr => escaped.push_str("&#10;"),
            '\t' if attr => escaped.push_str("&#9;"),
            ch if !is_xml_char(ch) => escaped.push(char::REPLACEMENT_CHARACTER),
            ch => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Parse `value` back out of an attribute and out of element text
    fn reparse(value: &str) -> (String, String) {
        let xml = format!(
            "<r v=\"{}\">{}</r>",
            escape_attr(value),
            escape_text(value)
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        (
            root.attribute("v").unwrap().to_owned(),
            root.text().unwrap_or_default().to_owned(),
        )
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(escape_text("function foo(){}"), Cow::Borrowed(_)));
        assert!(matches!(escape_attr("java.lang.Object"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(
            escape_text(r#"if (a < b && c > "d") x='y';"#),
            "if (a &lt; b &amp;&amp; c &gt; &quot;d&quot;) x='y';"
        );
        assert_eq!(escape_attr("it's"), "it&apos;s");
    }

    #[test]
    fn test_escaping_round_trips() {
        for original in [
            "a & b",
            "<script>",
            r#"say "hi""#,
            "&amp; already escaped",
            "x<y>z&\"'",
            "line1\nline2\tx",
            "a\r\nb",
            "  padded \r ",
        ] {
            let (attr, text) = reparse(original);
            assert_eq!(attr, original);
            assert_eq!(text, original);
        }
    }

    #[test]
    fn test_whitespace_references() {
        assert_eq!(escape_attr("a\tb\nc\rd"), "a&#9;b&#10;c&#13;d");
        assert_eq!(escape_text("a\tb\nc\rd"), "a\tb\nc&#13;d");
    }

    #[test]
    fn test_disallowed_control_characters_are_replaced() {
        assert_eq!(escape_text("a\u{0}b\u{1B}c"), "a\u{FFFD}b\u{FFFD}c");
        assert_eq!(escape_text("tab\tand\nnewline\r"), "tab\tand\nnewline&#13;");
    }
}
