//! Indentation-tree parser for implementation source.
//!
//! Physical lines are first joined into logical lines (open brackets,
//! triple-quoted strings and trailing backslashes continue a line). Each
//! logical line is tokenized by the pest grammar in `source.pest`, and the
//! block tree is rebuilt from indentation: a line opened by a compound
//! keyword and closed by a top-level `:` owns the more-indented lines below
//! it.

use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser;

use crate::error::ParseError;

#[derive(Parser)]
#[grammar = "source.pest"]
struct LineLexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Operator,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    pub fn is_op(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == text
    }

    pub fn is_name(&self, text: &str) -> bool {
        self.kind == TokenKind::Name && self.text == text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Function,
    Class,
    /// `if`, `for`, `while`, `try`, `with`, `match` and their continuations.
    Control,
}

/// A compound statement: header tokens up to the `:` plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub keyword: String,
    pub header: Vec<Token>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Statement(Vec<Token>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramTree {
    pub nodes: Vec<Node>,
}

/// Depth-0 positions of `pred` in `tokens`, ignoring anything inside brackets.
pub(crate) fn top_level_positions(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Vec<usize> {
    let mut depth = 0usize;
    let mut hits = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => {
                    depth += 1;
                    continue;
                }
                ")" | "]" | "}" => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                _ => {}
            }
        }
        if depth == 0 && pred(token) {
            hits.push(idx);
        }
    }
    hits
}

impl Block {
    /// Function or class name following the keyword.
    pub fn name(&self) -> Option<&str> {
        let pos = self.header.iter().position(|t| t.is_name(&self.keyword))?;
        self.header
            .get(pos + 1)
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| t.text.as_str())
    }

    /// Parameter token groups of a function header, split at top-level commas.
    pub fn parameters(&self) -> Vec<&[Token]> {
        let Some(open) = self.header.iter().position(|t| t.is_punct("(")) else {
            return Vec::new();
        };
        let mut depth = 0usize;
        let mut close = None;
        for (idx, token) in self.header.iter().enumerate().skip(open) {
            if token.kind != TokenKind::Punct {
                continue;
            }
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Vec::new();
        };
        let inner = &self.header[open + 1..close];
        let mut groups = Vec::new();
        let mut start = 0;
        for comma in top_level_positions(inner, |t| t.is_punct(",")) {
            groups.push(&inner[start..comma]);
            start = comma + 1;
        }
        groups.push(&inner[start..]);
        groups.into_iter().filter(|g| !g.is_empty()).collect()
    }
}

/// Turns source text into a [`ProgramTree`].
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<ProgramTree, ParseError>;
}

/// Parser for indentation-structured (Python-like) source.
#[derive(Debug, Clone)]
pub struct IndentParser {
    tab_width: usize,
}

impl Default for IndentParser {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

impl IndentParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab_width(mut self, width: usize) -> Self {
        self.tab_width = width;
        self
    }
}

impl SourceParser for IndentParser {
    fn parse(&self, source: &str) -> Result<ProgramTree, ParseError> {
        let logical = split_logical_lines(source, self.tab_width)?;
        let mut lines = Vec::with_capacity(logical.len());
        for line in logical {
            let tokens = tokenize(&line)?;
            if !tokens.is_empty() {
                lines.push(TokenLine {
                    number: line.number,
                    indent: line.indent,
                    tokens,
                });
            }
        }
        let first_indent = match lines.first() {
            Some(line) => line.indent,
            None => return Err(ParseError::Empty),
        };
        let mut builder = TreeBuilder {
            lines: &lines,
            pos: 0,
        };
        let nodes = builder.block(first_indent)?;
        if let Some(stray) = lines.get(builder.pos) {
            return Err(ParseError::Indentation { line: stray.number });
        }
        Ok(ProgramTree { nodes })
    }
}

#[derive(Debug)]
struct LogicalLine {
    number: usize,
    indent: usize,
    text: String,
}

#[derive(Debug)]
struct TokenLine {
    number: usize,
    indent: usize,
    tokens: Vec<Token>,
}

fn indent_width(line: &str, tab_width: usize) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += tab_width,
            '\u{0C}' => {}
            _ => break,
        }
    }
    width
}

#[derive(Debug, Default)]
struct ScanState {
    brackets: Vec<(char, usize)>,
    triple: Option<char>,
}

impl ScanState {
    /// Scan one physical line; `Ok(true)` when the logical line continues.
    fn scan(&mut self, line: &str, number: usize) -> Result<bool, ParseError> {
        let chars: Vec<char> = line.chars().collect();
        let mut backslash = false;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = self.triple {
                if c == '\\' {
                    i += 2;
                } else if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                    self.triple = None;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' => {
                    if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                        self.triple = Some(c);
                        i += 3;
                        continue;
                    }
                    let mut j = i + 1;
                    loop {
                        match chars.get(j) {
                            None => {
                                return Err(ParseError::Syntax {
                                    line: number,
                                    message: "unterminated string literal".into(),
                                })
                            }
                            Some('\\') => j += 2,
                            Some(&d) if d == c => break,
                            Some(_) => j += 1,
                        }
                    }
                    i = j + 1;
                    continue;
                }
                '(' | '[' | '{' => self.brackets.push((c, number)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match self.brackets.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => return Err(ParseError::UnbalancedBrackets { line: number }),
                    }
                }
                '\\' if i + 1 == chars.len() => backslash = true,
                _ => {}
            }
            i += 1;
        }
        Ok(!self.brackets.is_empty() || self.triple.is_some() || backslash)
    }
}

fn split_logical_lines(source: &str, tab_width: usize) -> Result<Vec<LogicalLine>, ParseError> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    let mut state = ScanState::default();

    for (idx, physical) in source.lines().enumerate() {
        let number = idx + 1;
        match pending.as_mut() {
            Some(current) => current.text.push('\n'),
            None => {
                let trimmed = physical.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                pending = Some(LogicalLine {
                    number,
                    indent: indent_width(physical, tab_width),
                    text: String::new(),
                });
            }
        }
        if let Some(current) = pending.as_mut() {
            current.text.push_str(physical);
        }
        if !state.scan(physical, number)? {
            lines.extend(pending.take());
        }
    }

    if let Some(open) = pending {
        if let Some(&(_, line)) = state.brackets.first() {
            return Err(ParseError::UnbalancedBrackets { line });
        }
        if state.triple.is_some() {
            return Err(ParseError::Syntax {
                line: open.number,
                message: "unterminated triple-quoted string".into(),
            });
        }
        // A trailing backslash on the last line ends the logical line anyway.
        lines.push(open);
    }
    Ok(lines)
}

fn tokenize(line: &LogicalLine) -> Result<Vec<Token>, ParseError> {
    let pairs = LineLexer::parse(Rule::line, &line.text).map_err(|e| {
        let offset = match e.line_col {
            LineColLocation::Pos((l, _)) | LineColLocation::Span((l, _), _) => l,
        };
        ParseError::Syntax {
            line: line.number + offset.saturating_sub(1),
            message: e.variant.message().into_owned(),
        }
    })?;
    let mut tokens = Vec::new();
    for pair in pairs.flatten() {
        let kind = match pair.as_rule() {
            Rule::name => TokenKind::Name,
            Rule::number => TokenKind::Number,
            Rule::string => TokenKind::Str,
            Rule::operator => TokenKind::Operator,
            Rule::punct => TokenKind::Punct,
            _ => continue,
        };
        tokens.push(Token {
            kind,
            text: pair.as_str().to_string(),
        });
    }
    Ok(tokens)
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "match", "case",
];

fn block_keyword(tokens: &[Token]) -> Option<(BlockKind, String)> {
    let mut first = tokens.first().filter(|t| t.kind == TokenKind::Name)?;
    if first.text == "async" {
        first = tokens.get(1).filter(|t| t.kind == TokenKind::Name)?;
    }
    let kind = match first.text.as_str() {
        "def" => BlockKind::Function,
        "class" => BlockKind::Class,
        kw if CONTROL_KEYWORDS.contains(&kw) => BlockKind::Control,
        _ => return None,
    };
    Some((kind, first.text.clone()))
}

/// Split a run of simple statements at top-level `;`.
fn simple_statements(tokens: &[Token]) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut start = 0;
    let mut push = |part: &[Token]| {
        if !part.is_empty() {
            nodes.push(Node::Statement(part.to_vec()));
        }
    };
    for semi in top_level_positions(tokens, |t| t.is_punct(";")) {
        push(&tokens[start..semi]);
        start = semi + 1;
    }
    push(&tokens[start..]);
    nodes
}

struct TreeBuilder<'a> {
    lines: &'a [TokenLine],
    pos: usize,
}

impl<'a> TreeBuilder<'a> {
    fn block(&mut self, indent: usize) -> Result<Vec<Node>, ParseError> {
        let lines = self.lines;
        let mut nodes = Vec::new();
        while let Some(line) = lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ParseError::Indentation { line: line.number });
            }
            self.pos += 1;
            self.line(line, indent, &mut nodes)?;
        }
        Ok(nodes)
    }

    fn line(
        &mut self,
        line: &'a TokenLine,
        indent: usize,
        out: &mut Vec<Node>,
    ) -> Result<(), ParseError> {
        let lines = self.lines;
        let tokens = &line.tokens;
        let header_end = block_keyword(tokens).and_then(|(kind, keyword)| {
            top_level_positions(tokens, |t| t.is_punct(":"))
                .first()
                .map(|&colon| (kind, keyword, colon))
        });
        let Some((kind, keyword, colon)) = header_end else {
            out.extend(simple_statements(tokens));
            return Ok(());
        };

        let rest = &tokens[colon + 1..];
        let body = if rest.is_empty() {
            match lines.get(self.pos) {
                Some(next) if next.indent > indent => self.block(next.indent)?,
                _ => return Err(ParseError::Indentation { line: line.number }),
            }
        } else {
            simple_statements(rest)
        };
        out.push(Node::Block(Block {
            kind,
            keyword,
            header: tokens[..colon].to_vec(),
            body,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<ProgramTree, ParseError> {
        IndentParser::new().parse(source)
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn flat_function_becomes_one_block() {
        let tree = parse("def add(a, b):\n    total = a + b\n    return total\n").unwrap();
        assert_eq!(tree.nodes.len(), 1);
        let Node::Block(func) = &tree.nodes[0] else {
            panic!("expected block");
        };
        assert_eq!(func.kind, BlockKind::Function);
        assert_eq!(func.name(), Some("add"));
        assert_eq!(func.parameters().len(), 2);
        assert_eq!(func.body.len(), 2);
        let Node::Statement(first) = &func.body[0] else {
            panic!("expected statement");
        };
        assert_eq!(texts(first), vec!["total", "=", "a", "+", "b"]);
    }

    #[test]
    fn nested_control_flow_builds_a_tree() {
        let source = "\
def clamp(x):
    if x > 10:
        return 10
    elif x < 0:
        return 0
    else:
        return x
";
        let tree = parse(source).unwrap();
        let Node::Block(func) = &tree.nodes[0] else {
            panic!("expected block");
        };
        let keywords: Vec<_> = func
            .body
            .iter()
            .map(|n| match n {
                Node::Block(b) => b.keyword.as_str(),
                Node::Statement(_) => "stmt",
            })
            .collect();
        assert_eq!(keywords, vec!["if", "elif", "else"]);
    }

    #[test]
    fn bracket_continuation_and_comments_are_joined() {
        let source = "def f(a,\n      b):  # two params\n    return [a,\n            b]  # list\n";
        let tree = parse(source).unwrap();
        let Node::Block(func) = &tree.nodes[0] else {
            panic!("expected block");
        };
        assert_eq!(func.parameters().len(), 2);
        let Node::Statement(ret) = &func.body[0] else {
            panic!("expected statement");
        };
        assert_eq!(texts(ret), vec!["return", "[", "a", ",", "b", "]"]);
    }

    #[test]
    fn one_line_bodies_and_semicolons() {
        let tree = parse("def f(x): y = x; return y\n").unwrap();
        let Node::Block(func) = &tree.nodes[0] else {
            panic!("expected block");
        };
        assert_eq!(func.body.len(), 2);
    }

    #[test]
    fn strings_keep_hashes_and_quotes() {
        let tree = parse("x = \"# not a comment\" + 'it''s'\n").unwrap();
        let Node::Statement(tokens) = &tree.nodes[0] else {
            panic!("expected statement");
        };
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, "\"# not a comment\"");
    }

    #[test]
    fn docstring_spanning_lines_is_one_token() {
        let source = "def f():\n    \"\"\"Line one.\n\n    Line two.\n    \"\"\"\n    return 1\n";
        let tree = parse(source).unwrap();
        let Node::Block(func) = &tree.nodes[0] else {
            panic!("expected block");
        };
        assert_eq!(func.body.len(), 2);
    }

    #[test]
    fn soft_keywords_used_as_names_stay_statements() {
        let tree = parse("match = compile(pattern)\n").unwrap();
        assert!(matches!(tree.nodes[0], Node::Statement(_)));
    }

    #[test]
    fn tabs_count_as_four_columns() {
        let tree = parse("def f():\n\treturn 1\n").unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert!(parse("def f():\n\tx = 1\n    return x\n").is_ok());
    }

    #[test]
    fn unexpected_indent_is_rejected() {
        let err = parse("x = 1\n    y = 2\n").unwrap_err();
        assert_eq!(err, ParseError::Indentation { line: 2 });
    }

    #[test]
    fn inconsistent_dedent_is_rejected() {
        let err = parse("def f():\n        x = 1\n    return x\n").unwrap_err();
        assert_eq!(err, ParseError::Indentation { line: 3 });
    }

    #[test]
    fn missing_body_is_rejected() {
        let err = parse("def f():\nreturn 1\n").unwrap_err();
        assert_eq!(err, ParseError::Indentation { line: 1 });
    }

    #[test]
    fn unbalanced_brackets_are_rejected() {
        assert_eq!(
            parse("x = (1, 2\n").unwrap_err(),
            ParseError::UnbalancedBrackets { line: 1 }
        );
        assert_eq!(
            parse("x = 1)\n").unwrap_err(),
            ParseError::UnbalancedBrackets { line: 1 }
        );
    }

    #[test]
    fn untokenizable_text_is_a_syntax_error() {
        let err = parse("x = 1\ny = $z\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn blank_and_comment_only_source_is_empty() {
        assert_eq!(parse("\n# nothing\n   \n").unwrap_err(), ParseError::Empty);
        assert_eq!(parse("").unwrap_err(), ParseError::Empty);
    }
}
