//! BSDL text preprocessing.
//!
//! Strips `--` comments, folds to upper case, and collapses tabs/newlines to
//! spaces so the section extractors in [`crate::bsdl::parser`] can work on a
//! single normalized buffer.

/// Normalize raw BSDL source into the buffer the section extractors expect.
///
/// Comments run from `--` to the end of the line; a newline always resets
/// comment state, matching the line-based `--` semantics of VHDL.
pub fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_comment = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\n' | '\r' => {
                in_comment = false;
                out.push(' ');
            }
            _ if in_comment => {}
            '\t' => out.push(' '),
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                in_comment = true;
            }
            _ => out.push(ch.to_ascii_uppercase()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let src = "ENTITY foo IS -- a comment\nend entity;";
        let norm = normalize(src);
        assert!(!norm.contains("COMMENT"));
        assert!(norm.contains("ENTITY FOO IS"));
    }

    #[test]
    fn folds_case_and_whitespace() {
        let src = "Port\t(a : in bit);";
        let norm = normalize(src);
        assert_eq!(norm, "PORT (A : IN BIT);");
    }
}
