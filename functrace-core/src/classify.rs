//! Line classification for Swift sources
//!
//! Decides, one line at a time, whether a line is comment text, declares a
//! function, or marks the program entry point. Classification is lexical:
//! no AST is built and braces are not tracked.
//!
//! Global invariants enforced:
//! - Pure functions of their inputs (the only carried state is the block-comment flag)
//! - A line is only a declaration or entry point if it falls through every comment check
//! - Never fails; unterminated block comments mask the rest of the file

/// Line-comment prefix
const LINE_COMMENT: &str = "//";

/// Block-comment open token
const BLOCK_COMMENT_OPEN: &str = "/*";

/// Block-comment close token
const BLOCK_COMMENT_CLOSE: &str = "*/";

/// Function-declaration keyword (including the separating space)
const FUNC_KEYWORD: &str = "func ";

/// Program entry-point attribute
const ENTRY_POINT_ATTRIBUTE: &str = "@main";

/// Modifiers and attributes that may precede `func` on a declaration line
const MODIFIER_PREFIXES: &[&str] = &[
    "public",
    "private",
    "internal",
    "fileprivate",
    "open",
    "static",
    "class",
    "final",
    "override",
    "mutating",
    "nonmutating",
    "@objc",
    "@IBAction",
    "@discardableResult",
    "@MainActor",
    "@inlinable",
];

/// Return-type fragments that identify SwiftUI view builders
const VIEW_RETURN_MARKERS: &[&str] = &["-> some View", "-> View"];

/// Result of running the comment-state machine over one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentState {
    /// The line is comment text and must not be classified further
    pub is_comment_line: bool,
    /// Block-comment flag to carry into the next line
    pub inside_block_comment: bool,
}

/// Advance the block-comment state machine by one line
///
/// Precedence: open block comment first, then `//`, then `/*`. A line only
/// reaches declaration checks when all three fall through.
pub fn classify_comment_state(line: &str, inside_block_comment: bool) -> CommentState {
    let trimmed = line.trim();

    if inside_block_comment {
        return CommentState {
            is_comment_line: true,
            inside_block_comment: !trimmed.contains(BLOCK_COMMENT_CLOSE),
        };
    }

    if trimmed.starts_with(LINE_COMMENT) {
        return CommentState {
            is_comment_line: true,
            inside_block_comment: false,
        };
    }

    if trimmed.starts_with(BLOCK_COMMENT_OPEN) {
        return CommentState {
            is_comment_line: true,
            inside_block_comment: true,
        };
    }

    CommentState {
        is_comment_line: false,
        inside_block_comment: false,
    }
}

/// Strip one allow-listed modifier (and the whitespace after it) from the front of `line`
fn strip_modifier(line: &str) -> Option<&str> {
    MODIFIER_PREFIXES.iter().find_map(|modifier| {
        let rest = line.strip_prefix(modifier)?;
        let after = rest.trim_start();
        (after.len() < rest.len()).then_some(after)
    })
}

/// Check whether a line declares a SwiftUI view builder
pub fn is_view_builder(trimmed_line: &str) -> bool {
    VIEW_RETURN_MARKERS
        .iter()
        .any(|marker| trimmed_line.contains(marker))
}

/// Check whether a trimmed, non-comment line declares a function
///
/// View builders are excluded: injecting statements into a result-builder
/// body breaks the surrounding DSL.
pub fn is_function_declaration(trimmed_line: &str) -> bool {
    if is_view_builder(trimmed_line) {
        return false;
    }

    let mut rest = trimmed_line;
    while let Some(stripped) = strip_modifier(rest) {
        rest = stripped;
    }

    rest.starts_with(FUNC_KEYWORD)
}

/// Extract the declared name from a function-declaration line
///
/// Returns the last whitespace-delimited token before the first `(`, or an
/// empty string when the line has no `(` or nothing precedes it.
pub fn extract_function_name(trimmed_line: &str) -> String {
    let Some((head, _)) = trimmed_line.split_once('(') else {
        return String::new();
    };

    head.split_whitespace()
        .next_back()
        .map(str::to_string)
        .unwrap_or_default()
}

/// Check whether a trimmed, non-comment line carries the entry-point attribute
pub fn is_entry_point_marker(trimmed_line: &str) -> bool {
    trimmed_line.contains(ENTRY_POINT_ATTRIBUTE)
}

/// Line classification interface used by the tree instrumentor
///
/// The default implementation is the lexical [`SwiftLineClassifier`]; an
/// AST-backed classifier can be dropped in without touching the walk.
pub trait LineClassifier: Sync {
    /// Advance the comment-state machine by one line
    fn comment_state(&self, line: &str, inside_block_comment: bool) -> CommentState;

    /// Does this trimmed line declare an instrumentable function?
    fn is_function_declaration(&self, trimmed_line: &str) -> bool;

    /// Name declared on this trimmed line (empty when extraction fails)
    fn function_name(&self, trimmed_line: &str) -> String;

    /// Does this trimmed line mark the program entry point?
    fn is_entry_point(&self, trimmed_line: &str) -> bool;
}

/// Prefix-heuristic classifier for Swift source
#[derive(Debug, Clone, Copy, Default)]
pub struct SwiftLineClassifier;

impl LineClassifier for SwiftLineClassifier {
    fn comment_state(&self, line: &str, inside_block_comment: bool) -> CommentState {
        classify_comment_state(line, inside_block_comment)
    }

    fn is_function_declaration(&self, trimmed_line: &str) -> bool {
        is_function_declaration(trimmed_line)
    }

    fn function_name(&self, trimmed_line: &str) -> String {
        extract_function_name(trimmed_line)
    }

    fn is_entry_point(&self, trimmed_line: &str) -> bool {
        is_entry_point_marker(trimmed_line)
    }
}
