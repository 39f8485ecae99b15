use memchr::memchr;
use std::collections::BTreeSet;

/// Maximum identifier length to store in the index.
/// Longer runs are likely base64, hex dumps, or other generated content.
const MAX_TOKEN_LENGTH: usize = 128;

/// Keywords after which the next identifier is a declaration
const DECLARING_KEYWORDS: &[&str] = &[
    "class", "const", "def", "enum", "fn", "func", "function", "interface", "let", "mod",
    "module", "record", "static", "struct", "trait", "type", "union", "val", "var",
];

/// Keywords that are neither declarations nor references. Modifiers among
/// them may sit between a declaring keyword and its name (`let mut x`).
const KEYWORDS: &[&str] = &[
    "abstract", "and", "as", "async", "await", "break", "case", "catch", "continue", "crate",
    "default", "defer", "do", "dyn", "elif", "else", "except", "export", "extends", "extern",
    "false", "final", "finally", "for", "from", "go", "if", "impl", "implements", "import",
    "in", "instanceof", "is", "loop", "match", "move", "mut", "new", "nil", "none", "None",
    "not", "null", "or", "override", "package", "pass", "private", "protected", "pub",
    "public", "raise", "ref", "return", "self", "Self", "super", "switch", "this", "throw",
    "throws", "true", "try", "unsafe", "use", "void", "where", "while", "with", "yield",
];

/// Identifiers of one document split by role
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SymbolSet {
    pub declarations: BTreeSet<String>,
    pub references: BTreeSet<String>,
}

/// Extract declared and referenced identifiers from source text.
///
/// A name is declared when it directly follows a declaring keyword (optionally
/// after modifiers such as `mut`); everything else is a reference. A name that
/// is declared is not also reported as a reference. `//` comments and
/// double-quoted strings are skipped. Only ASCII identifiers are recognised.
pub fn extract_symbols(content: &str) -> SymbolSet {
    let bytes = content.as_bytes();
    let mut symbols = SymbolSet::default();
    let mut declaring = false;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        if byte == b'/' && bytes.get(i + 1) == Some(&b'/') {
            i = memchr(b'\n', &bytes[i..]).map_or(bytes.len(), |p| i + p);
            continue;
        }

        if byte == b'"' {
            i = skip_string(bytes, i + 1);
            declaring = false;
            continue;
        }

        if is_ident_start(byte) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            // Identifier bytes are ASCII, so both ends are char boundaries
            let ident = &content[start..i];

            if DECLARING_KEYWORDS.contains(&ident) {
                declaring = true;
            } else if KEYWORDS.contains(&ident) {
                // modifiers keep a pending declaration
            } else {
                if (2..=MAX_TOKEN_LENGTH).contains(&ident.len()) {
                    if declaring {
                        symbols.declarations.insert(ident.to_string());
                    } else {
                        symbols.references.insert(ident.to_string());
                    }
                }
                declaring = false;
            }
            continue;
        }

        if byte.is_ascii_digit() {
            // Numeric literal, including suffixes like 10u32 or 0xFF
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            continue;
        }

        if !byte.is_ascii_whitespace() {
            declaring = false;
        }
        i += 1;
    }

    for declared in &symbols.declarations {
        symbols.references.remove(declared);
    }
    symbols
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Position after the closing quote of a string starting at `i`
fn skip_string(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_rust_declarations() {
        let symbols = extract_symbols(
            "pub fn getUserById(id: u32) -> User { let mut cache = Cache::new(); }",
        );
        assert_eq!(sorted(&symbols.declarations), vec!["cache", "getUserById"]);
        assert_eq!(sorted(&symbols.references), vec!["Cache", "User", "id", "u32"]);
    }

    #[test]
    fn test_other_languages() {
        let symbols = extract_symbols(
            "class Foo extends Bar {}\ndef helper(x):\n    return Foo()\nfunc Run() {}",
        );
        assert_eq!(sorted(&symbols.declarations), vec!["Foo", "Run", "helper"]);
        assert_eq!(sorted(&symbols.references), vec!["Bar"]);
    }

    #[test]
    fn test_comments_strings_and_numbers_are_skipped() {
        let symbols = extract_symbols(
            "// fn hidden\nlet text = \"fn quoted \\\" still\"; let num = 0xFF10u32;",
        );
        assert_eq!(sorted(&symbols.declarations), vec!["num", "text"]);
        assert!(symbols.references.is_empty());
    }

    #[test]
    fn test_punctuation_cancels_declaration() {
        let symbols = extract_symbols("let (left, right) = pair;");
        assert!(symbols.declarations.is_empty());
        assert_eq!(sorted(&symbols.references), vec!["left", "pair", "right"]);
    }

    #[test]
    fn test_non_ascii_splits_identifiers() {
        let symbols = extract_symbols("fn größe() { naïve }");
        assert!(symbols.declarations.contains("gr"));
        assert!(symbols.references.contains("ve"));
    }
}
