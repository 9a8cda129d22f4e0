use smallvec::SmallVec;

use super::catalog::PathCatalog;

/// Result of one extraction pass: the expression text with every path
/// token replaced by a `deps[i]` accessor, plus the catalog indices this
/// expression touches (in first-use order).
#[derive(Debug, Clone)]
pub struct Extraction {
    pub source: String,
    pub deps: SmallVec<[u32; 4]>,
}

/// Scan an expression once, registering every recognized path token in
/// the catalog and substituting it with an indexed accessor into the
/// dependency-values array.
///
/// Returns `None` when the substituted text is empty or whitespace-only,
/// which callers must treat as "no computed option".
pub fn extract(text: &str, catalog: &mut PathCatalog) -> Option<Extraction> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut deps: SmallVec<[u32; 4]> = SmallVec::new();
    // Last significant (non-whitespace) character emitted, used for the
    // flanking rule and the division/path disambiguation.
    let mut prev: Option<char> = None;
    // The identifier run ending at `prev`. A keyword like `return` or
    // `var` flanks a following token even though it ends in a letter.
    let mut word = String::new();
    let mut word_break = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // String literals are opaque: never extract paths from them.
        if c == '\'' || c == '"' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                let d = chars[i];
                out.push(d);
                i += 1;
                if d == c {
                    break;
                }
            }
            prev = Some(c);
            word.clear();
            word_break = false;
            continue;
        }

        if c.is_whitespace() {
            out.push(c);
            word_break = true;
            i += 1;
            continue;
        }

        // `.` never flanks: after `@` or another `.` it belongs to a
        // rejected `@`-relative run, elsewhere to member access.
        let keyword_flank = word_break && is_keyword(&word);
        let flanked = prev.map_or(true, |p| (!is_ident_char(p) && p != '.') || keyword_flank);
        if flanked {
            if let Some(len) = match_token(&chars[i..], prev, keyword_flank) {
                let token: String = chars[i..i + len].iter().collect();
                let index = catalog.set(&token);
                if !deps.contains(&index) {
                    deps.push(index);
                }
                out.push_str("deps[");
                out.push_str(&index.to_string());
                out.push(']');
                prev = Some(']');
                word.clear();
                word_break = false;
                i += len;
                continue;
            }
        }

        out.push(c);
        if is_ident_char(c) {
            if word_break {
                word.clear();
                word_break = false;
            }
            word.push(c);
        } else {
            word.clear();
            word_break = false;
        }
        prev = Some(c);
        i += 1;
    }

    let trimmed = out.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }
    Some(Extraction {
        source: trimmed.to_string(),
        deps,
    })
}

/// Identifier-ish characters for the flanking rule. `@` is included so
/// that a rejected `@../x` does not fall apart into `@` plus a parent
/// path token.
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '@'
}

/// Statement keywords that flank a following token despite ending in an
/// identifier character.
fn is_keyword(word: &str) -> bool {
    matches!(word, "var" | "let" | "const" | "return" | "if" | "else")
}

/// A `/` after one of these ends an operand, so it is division.
fn ends_operand(prev: Option<char>) -> bool {
    matches!(prev, Some(p) if is_ident_char(p) || matches!(p, ')' | ']' | '\'' | '"'))
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Try to match one path token at the start of `rest`. Returns its
/// length in chars.
fn match_token(rest: &[char], prev: Option<char>, keyword_flank: bool) -> Option<usize> {
    match rest[0] {
        '/' if keyword_flank || !ends_operand(prev) => scan_segments(rest, 0),
        '#' if rest.get(1) == Some(&'/') => scan_segments(rest, 1),
        '.' => {
            // Parent-relative: one or more `../` prefixes, then a body.
            let mut i = 0;
            while starts_with(rest, i, "../") {
                i += 3;
            }
            if i > 0 {
                return scan_body(rest, i);
            }
            // Current-relative: `./` then a body.
            if starts_with(rest, 0, "./") {
                return scan_body(rest, 2);
            }
            None
        }
        // `@` alone is a token; `@./…` / `@../…` is deliberately not.
        '@' => {
            if starts_with(rest, 1, "./") || starts_with(rest, 1, "../") {
                None
            } else {
                Some(1)
            }
        }
        _ => None,
    }
}

fn starts_with(rest: &[char], at: usize, prefix: &str) -> bool {
    prefix
        .chars()
        .enumerate()
        .all(|(k, p)| rest.get(at + k) == Some(&p))
}

/// Match `(/segment)+` starting at `from`. Requires at least one segment.
fn scan_segments(rest: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    let mut segments = 0;
    while rest.get(i) == Some(&'/') && rest.get(i + 1).is_some_and(|c| is_segment_char(*c)) {
        i += 2;
        while rest.get(i).is_some_and(|c| is_segment_char(*c)) {
            i += 1;
        }
        segments += 1;
    }
    (segments > 0).then_some(i)
}

/// Match `segment(/segment)*` starting at `from`. Requires at least one
/// segment (a bare `../` prefix is not a path).
fn scan_body(rest: &[char], from: usize) -> Option<usize> {
    if !rest.get(from).is_some_and(|c| is_segment_char(*c)) {
        return None;
    }
    let mut i = from + 1;
    while rest.get(i).is_some_and(|c| is_segment_char(*c)) {
        i += 1;
    }
    while rest.get(i) == Some(&'/') && rest.get(i + 1).is_some_and(|c| is_segment_char(*c)) {
        i += 2;
        while rest.get(i).is_some_and(|c| is_segment_char(*c)) {
            i += 1;
        }
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> (Option<String>, PathCatalog) {
        let mut catalog = PathCatalog::new();
        let source = extract(text, &mut catalog).map(|e| e.source);
        (source, catalog)
    }

    #[test]
    fn absolute_path() {
        let (source, catalog) = run("/a/b > 3");
        assert_eq!(source.as_deref(), Some("deps[0] > 3"));
        assert_eq!(catalog.get(0), Some("/a/b"));
    }

    #[test]
    fn root_fragment_and_parent_and_current() {
        let (source, catalog) = run("#/a/b === '../x' ? ../up/two : ./child");
        assert_eq!(
            source.as_deref(),
            Some("deps[0] === '../x' ? deps[1] : deps[2]")
        );
        assert_eq!(catalog.get(0), Some("#/a/b"));
        assert_eq!(catalog.get(1), Some("../up/two"));
        assert_eq!(catalog.get(2), Some("./child"));
    }

    #[test]
    fn multiple_parent_prefixes() {
        let (source, catalog) = run("../../price * 2");
        assert_eq!(source.as_deref(), Some("deps[0] * 2"));
        assert_eq!(catalog.get(0), Some("../../price"));
    }

    #[test]
    fn duplicate_tokens_share_index() {
        let (source, catalog) = run("/a + /a + /b");
        assert_eq!(source.as_deref(), Some("deps[0] + deps[0] + deps[1]"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn division_is_not_a_path() {
        let (source, _) = run("a / b");
        assert_eq!(source.as_deref(), Some("a / b"));
        let (source, _) = run("(1 + 2) / 4");
        assert_eq!(source.as_deref(), Some("(1 + 2) / 4"));
        let (source, catalog) = run("../x / 4");
        assert_eq!(source.as_deref(), Some("deps[0] / 4"));
        assert_eq!(catalog.get(0), Some("../x"));
    }

    #[test]
    fn path_in_operand_position_after_operator() {
        let (source, _) = run("2 * /price");
        assert_eq!(source.as_deref(), Some("2 * deps[0]"));
    }

    #[test]
    fn context_token_forms() {
        let (source, catalog) = run("@");
        assert_eq!(source.as_deref(), Some("deps[0]"));
        assert_eq!(catalog.get(0), Some("@"));

        // `@` followed by member access matches only `@`.
        let (source, _) = run("@.user.name === 'admin'");
        assert_eq!(source.as_deref(), Some("deps[0].user.name === 'admin'"));

        // `@` directly followed by a relative prefix is left unmatched.
        let (source, catalog) = run("@../x");
        assert_eq!(source.as_deref(), Some("@../x"));
        assert!(catalog.is_empty());
        let (source, catalog) = run("@./x");
        assert_eq!(source.as_deref(), Some("@./x"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn strings_are_opaque() {
        let (source, catalog) = run("'/not/a/dep' + /real");
        assert_eq!(source.as_deref(), Some("'/not/a/dep' + deps[0]"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0), Some("/real"));
    }

    #[test]
    fn member_access_stays_member_access() {
        let (source, _) = run("obj.prop + obj2 . prop");
        assert_eq!(source.as_deref(), Some("obj.prop + obj2 . prop"));
    }

    #[test]
    fn trailing_terminator_stripped() {
        let (source, _) = run("  ./x;  ");
        assert_eq!(source.as_deref(), Some("deps[0]"));
    }

    #[test]
    fn empty_means_no_option() {
        assert_eq!(run("").0, None);
        assert_eq!(run("   ").0, None);
        assert_eq!(run(" ; ").0, None);
    }

    #[test]
    fn keyword_flanks_a_path() {
        let (source, catalog) = run("{ var rate = /price > 100 ? 0.1 : 0; return /price * 2; }");
        assert_eq!(
            source.as_deref(),
            Some("{ var rate = deps[0] > 100 ? 0.1 : 0; return deps[0] * 2; }")
        );
        assert_eq!(catalog.len(), 1);

        let (source, _) = run("{ let x = ./a; return ./a; }");
        assert_eq!(source.as_deref(), Some("{ let x = deps[0]; return deps[0]; }"));
    }

    #[test]
    fn identifier_before_slash_stays_division() {
        // A plain identifier word is not a flank, even across whitespace.
        let (source, _) = run("{ var half = total / 2; return half; }");
        assert_eq!(source.as_deref(), Some("{ var half = total / 2; return half; }"));
    }

    #[test]
    fn path_then_member_access() {
        let (source, _) = run("/user/roles.length > 0");
        assert_eq!(source.as_deref(), Some("deps[0].length > 0"));
    }
}
