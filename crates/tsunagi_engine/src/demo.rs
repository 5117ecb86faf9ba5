//! In-process reference engine.
//!
//! Implements the document/lint surface of a real engine with a small
//! single-scope analysis over a C-like token stream: `let` declarations,
//! identifier uses, `//` line comments. The test harness and examples drive
//! the orchestrator against this engine; a production embedder swaps in an
//! out-of-process worker behind the same [`LintEngine`] trait.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::{
    Diagnostic, EngineDocId, EngineLauncher, LintEngine, Position, ProcessCrashed, Range, Severity,
    TextChange,
};

/// Diagnostic code for a second `let` of an already-declared variable.
const CODE_REDECLARATION: &str = "E0034";

/// Diagnostic code for a use of a never-declared variable.
const CODE_UNDECLARED: &str = "E0057";

/// An in-process lint engine holding one text buffer per document.
pub struct DemoEngine {
    documents: Mutex<HashMap<EngineDocId, String>>,
    next_doc: AtomicU64,
}

impl DemoEngine {
    /// Creates an engine with no documents.
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            next_doc: AtomicU64::new(1),
        }
    }

    /// Engine-side text of `doc`, if it exists. Test observability only.
    pub fn document_text(&self, doc: EngineDocId) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&doc)
            .cloned()
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LintEngine for DemoEngine {
    async fn create_document(&self, text: &str) -> Result<EngineDocId, ProcessCrashed> {
        let doc = EngineDocId::new(self.next_doc.fetch_add(1, Ordering::SeqCst));
        self.documents
            .lock()
            .map_err(|_| ProcessCrashed)?
            .insert(doc, text.to_string());
        Ok(doc)
    }

    async fn apply_change(
        &self,
        doc: EngineDocId,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed> {
        let mut documents = self.documents.lock().map_err(|_| ProcessCrashed)?;
        // A real worker dies on an unknown handle; report the same way.
        let text = documents.get_mut(&doc).ok_or(ProcessCrashed)?;
        let start = position_to_offset(text, change.range.start);
        let end = position_to_offset(text, change.range.end).max(start);
        text.replace_range(start..end, &change.text);
        Ok(())
    }

    async fn lint(&self, doc: EngineDocId) -> Result<Vec<Diagnostic>, ProcessCrashed> {
        let documents = self.documents.lock().map_err(|_| ProcessCrashed)?;
        let text = documents.get(&doc).ok_or(ProcessCrashed)?;
        Ok(analyze(text))
    }

    async fn destroy_document(&self, doc: EngineDocId) -> Result<(), ProcessCrashed> {
        self.documents
            .lock()
            .map_err(|_| ProcessCrashed)?
            .remove(&doc);
        Ok(())
    }
}

/// Launches a fresh [`DemoEngine`] per worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoEngineLauncher;

#[async_trait]
impl EngineLauncher for DemoEngineLauncher {
    async fn launch(&self) -> Result<Box<dyn LintEngine>, ProcessCrashed> {
        Ok(Box::new(DemoEngine::new()))
    }
}

/// Converts a line/character position to a byte offset.
///
/// Positions past the end of a line clamp to the line end; positions past
/// the last line clamp to the end of the text.
fn position_to_offset(text: &str, position: Position) -> usize {
    let mut line = 0u32;
    let mut character = 0u32;
    for (offset, ch) in text.char_indices() {
        if line == position.line {
            if character == position.character || ch == '\n' {
                return offset;
            }
            character += 1;
        } else if ch == '\n' {
            line += 1;
        }
    }
    text.len()
}

/// Converts a byte offset to a line/character position.
fn offset_to_position(text: &str, offset: usize) -> Position {
    let mut line = 0u32;
    let mut character = 0u32;
    for (current, ch) in text.char_indices() {
        if current >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += 1;
        }
    }
    Position::new(line, character)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    /// The `let` keyword.
    Let,
    /// Any other identifier.
    Ident,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Splits `text` into identifier tokens, skipping `//` line comments and
/// everything that is neither.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, ch)) = chars.peek() {
        if ch == '/' {
            chars.next();
            if matches!(chars.peek(), Some(&(_, '/'))) {
                while let Some(&(_, ch)) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
        } else if is_ident_start(ch) {
            let mut end = start + ch.len_utf8();
            chars.next();
            while let Some(&(offset, ch)) = chars.peek() {
                if !is_ident_continue(ch) {
                    break;
                }
                end = offset + ch.len_utf8();
                chars.next();
            }
            let kind = if &text[start..end] == "let" {
                TokenKind::Let
            } else {
                TokenKind::Ident
            };
            tokens.push(Token { kind, start, end });
        } else {
            chars.next();
        }
    }
    tokens
}

/// Single-scope declare/use analysis.
///
/// `let NAME` declares; a second `let` of the same name is a redeclaration
/// error on the repeated identifier. Any identifier used outside a `let`
/// that is declared nowhere in the text is an undeclared-variable warning.
/// Diagnostics come out in source order.
fn analyze(text: &str) -> Vec<Diagnostic> {
    let tokens = tokenize(text);

    let mut declared_anywhere: HashSet<&str> = HashSet::new();
    for pair in tokens.windows(2) {
        if pair[0].kind == TokenKind::Let && pair[1].kind == TokenKind::Ident {
            declared_anywhere.insert(&text[pair[1].start..pair[1].end]);
        }
    }

    let mut declared: HashSet<&str> = HashSet::new();
    let mut diagnostics = Vec::new();
    let mut index = 0;
    while index < tokens.len() {
        let token = tokens[index];
        if token.kind == TokenKind::Let
            && let Some(&name_token) = tokens.get(index + 1)
            && name_token.kind == TokenKind::Ident
        {
            let name = &text[name_token.start..name_token.end];
            if !declared.insert(name) {
                diagnostics.push(Diagnostic::new(
                    CODE_REDECLARATION,
                    format!("redeclaration of variable: {name}"),
                    token_range(text, name_token),
                ));
            }
            index += 2;
        } else if token.kind == TokenKind::Ident {
            let name = &text[token.start..token.end];
            if !declared_anywhere.contains(name) {
                diagnostics.push(
                    Diagnostic::new(
                        CODE_UNDECLARED,
                        format!("use of undeclared variable: {name}"),
                        token_range(text, token),
                    )
                    .with_severity(Severity::Warning),
                );
            }
            index += 1;
        } else {
            // A bare trailing `let` declares nothing.
            index += 1;
        }
    }
    diagnostics
}

fn token_range(text: &str, token: Token) -> Range {
    Range::new(
        offset_to_position(text, token.start),
        offset_to_position(text, token.end),
    )
}
