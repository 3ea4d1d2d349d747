//! Parser for the validator expression language
//!
//! Source is tokenized up front so indentation can be turned into
//! `Indent`/`Dedent` tokens. Newlines inside open brackets are ignored and a
//! trailing backslash joins two lines.

use std::iter::Peekable;
use std::str::Chars;

use super::ast::{BinaryOp, CompareOp, Expression, Program, Statement};
use super::error::ParseError;

/// Token types for the expression parser
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),

    // Names
    Identifier(String),
    Path(Vec<String>), // {a.b}

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,

    // Comparison and assignment
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Assign,

    // Logical
    And,
    Or,
    Not,
    In,
    Is,

    // Keywords
    If,
    Elif,
    Else,
    For,
    Raise,
    Assert,
    Pass,
    Import,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

type Spanned = (Token, usize);

/// Tokenizer for breaking source into tokens
struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    bracket_depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Spanned>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            bracket_depth: 0,
            indents: vec![0],
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        while let Some(&ch) = self.chars.peek() {
            if self.at_line_start {
                self.at_line_start = false;
                if self.bracket_depth == 0 {
                    self.handle_indentation()?;
                    continue;
                }
            }

            match ch {
                '\n' => {
                    self.advance();
                    self.newline();
                }
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.advance();
                    if self.chars.peek() == Some(&'\r') {
                        self.advance();
                    }
                    if self.chars.peek() == Some(&'\n') {
                        self.advance();
                        self.line += 1;
                    } else {
                        return Err(ParseError::UnexpectedChar {
                            ch: '\\',
                            line: self.line,
                        });
                    }
                }
                _ => {
                    let token = self.next_token(ch)?;
                    self.push(token);
                }
            }
        }
        Ok(self.finish())
    }

    fn push(&mut self, token: Token) {
        self.tokens.push((token, self.line));
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn newline(&mut self) {
        if self.bracket_depth == 0 {
            if matches!(self.tokens.last(), Some((t, _)) if *t != Token::Newline) {
                self.push(Token::Newline);
            }
            self.at_line_start = true;
        }
        self.line += 1;
    }

    fn skip_comment(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn handle_indentation(&mut self) -> Result<(), ParseError> {
        let mut width = 0;
        while let Some(&ch) = self.chars.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width += 4,
                _ => break,
            }
            self.advance();
        }

        // Blank and comment-only lines never change the block structure
        match self.chars.peek() {
            None | Some('\n' | '\r' | '#') => return Ok(()),
            Some(_) => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Token::Indent);
        } else if width < current {
            while self.indents.last().is_some_and(|&top| width < top) {
                self.indents.pop();
                self.push(Token::Dedent);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(ParseError::InconsistentIndent { line: self.line });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<Spanned> {
        if matches!(self.tokens.last(), Some((t, _)) if *t != Token::Newline) {
            self.push(Token::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent);
        }
        self.push(Token::Eof);
        self.tokens
    }

    fn next_token(&mut self, ch: char) -> Result<Token, ParseError> {
        // Two-character operators peek after consuming the first character
        let token = match ch {
            '"' | '\'' => return self.read_string(false),
            '0'..='9' => return self.read_number(),
            '{' => {
                self.advance();
                return self.read_path();
            }
            c if c.is_alphabetic() || c == '_' => return self.read_word(),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '%' => Token::Percent,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '.' => Token::Dot,
            '(' | '[' => {
                self.bracket_depth += 1;
                if ch == '(' {
                    Token::LeftParen
                } else {
                    Token::LeftBracket
                }
            }
            ')' | ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                if ch == ')' {
                    Token::RightParen
                } else {
                    Token::RightBracket
                }
            }
            '/' => {
                self.advance();
                return Ok(self.followed_by('/', Token::DoubleSlash, Token::Slash));
            }
            '=' => {
                self.advance();
                return Ok(self.followed_by('=', Token::Equal, Token::Assign));
            }
            '!' => {
                self.advance();
                return Ok(self.followed_by('=', Token::NotEqual, Token::Not));
            }
            '<' => {
                self.advance();
                return Ok(self.followed_by('=', Token::LessEqual, Token::Less));
            }
            '>' => {
                self.advance();
                return Ok(self.followed_by('=', Token::GreaterEqual, Token::Greater));
            }
            '&' | '|' => {
                self.advance();
                if self.chars.peek() == Some(&ch) {
                    self.advance();
                    return Ok(if ch == '&' { Token::And } else { Token::Or });
                }
                return Err(ParseError::UnexpectedChar {
                    ch,
                    line: self.line,
                });
            }
            _ => {
                return Err(ParseError::UnexpectedChar {
                    ch,
                    line: self.line,
                });
            }
        };
        self.advance();
        Ok(token)
    }

    fn followed_by(&mut self, next: char, matched: Token, otherwise: Token) -> Token {
        if self.chars.peek() == Some(&next) {
            self.advance();
            matched
        } else {
            otherwise
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let mut text = String::new();
        let mut is_float = false;

        while let Some(&ch) = self.chars.peek() {
            match ch {
                '0'..='9' => text.push(ch),
                '_' => {}
                '.' if !is_float => {
                    is_float = true;
                    text.push(ch);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(ch);
                    self.advance();
                    if let Some(&sign) = self.chars.peek()
                        && matches!(sign, '+' | '-')
                    {
                        text.push(sign);
                        self.advance();
                    }
                    continue;
                }
                _ => break,
            }
            self.advance();
        }

        let invalid = || ParseError::InvalidNumber {
            value: text.clone(),
            line: self.line,
        };
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| invalid())
        } else {
            text.parse::<i64>().map(Token::Integer).map_err(|_| invalid())
        }
    }

    fn read_string(&mut self, raw: bool) -> Result<Token, ParseError> {
        let line = self.line;
        let Some(quote) = self.advance() else {
            return Err(ParseError::UnexpectedEof { line });
        };

        let mut string = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(Token::String(string)),
                Some('\n') | None => {
                    return Err(ParseError::InvalidString {
                        line,
                        reason: "Unterminated string".to_string(),
                    });
                }
                Some('\\') if !raw => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('0') => '\0',
                        Some(c @ ('\\' | '"' | '\'')) => c,
                        Some(c) => {
                            return Err(ParseError::InvalidString {
                                line,
                                reason: format!("Invalid escape sequence \\{c}"),
                            });
                        }
                        None => {
                            return Err(ParseError::InvalidString {
                                line,
                                reason: "Unterminated string".to_string(),
                            });
                        }
                    };
                    string.push(escaped);
                }
                Some(ch) => string.push(ch),
            }
        }
    }

    fn read_word(&mut self) -> Result<Token, ParseError> {
        let mut ident = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // String prefixes: f-strings are read as plain strings
        if matches!(self.chars.peek(), Some('"' | '\'')) {
            match ident.as_str() {
                "f" | "F" => return self.read_string(false),
                "r" | "R" => return self.read_string(true),
                _ => {}
            }
        }

        Ok(match ident.as_str() {
            "None" | "null" => Token::Null,
            "True" | "true" => Token::Boolean(true),
            "False" | "false" => Token::Boolean(false),
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "for" => Token::For,
            "raise" => Token::Raise,
            "assert" => Token::Assert,
            "pass" => Token::Pass,
            "import" => Token::Import,
            _ => Token::Identifier(ident),
        })
    }

    fn read_path(&mut self) -> Result<Token, ParseError> {
        let mut name = String::new();
        while let Some(ch) = self.advance() {
            if ch == '}' {
                let parts: Vec<String> = name.split('.').map(str::to_string).collect();
                let valid = parts.iter().all(|p| {
                    p.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
                        && p.chars().all(|c| c.is_alphanumeric() || c == '_')
                });
                if !valid {
                    return Err(ParseError::InvalidVariable {
                        name,
                        line: self.line,
                    });
                }
                return Ok(Token::Path(parts));
            }
            if ch == '\n' {
                break;
            }
            name.push(ch);
        }
        Err(ParseError::MissingDelimiter {
            delimiter: '}',
            line: self.line,
        })
    }
}

/// Validator source parser
#[derive(Debug, Clone)]
pub struct Parser {
    max_depth: usize,
    max_length: usize,
}

impl Parser {
    /// Create a new parser with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: 64,
            max_length: 16 * 1024,
        }
    }

    /// Create a parser with custom limits
    #[must_use]
    pub fn with_limits(max_depth: usize, max_length: usize) -> Self {
        Self {
            max_depth,
            max_length,
        }
    }

    /// Parse validator source into a program.
    ///
    /// Common leading indentation is removed first, so sources embedded in
    /// indented YAML blocks parse as written.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the source is too long, cannot be tokenized,
    /// or does not match the grammar.
    pub fn parse(&self, input: &str) -> Result<Program, ParseError> {
        let tokens = self.tokenize(&dedent(input))?;
        let mut state = ParserState::new(tokens, self.max_depth);
        state.parse_program()
    }

    /// Parse a single expression
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not exactly one expression.
    pub fn parse_expression(&self, input: &str) -> Result<Expression, ParseError> {
        let tokens = self.tokenize(input.trim())?;
        let mut state = ParserState::new(tokens, self.max_depth);
        let expr = state.parse_expression()?;
        state.skip_newlines();
        if state.current() != &Token::Eof {
            return Err(state.unexpected());
        }
        Ok(expr)
    }

    fn tokenize(&self, input: &str) -> Result<Vec<Spanned>, ParseError> {
        if input.len() > self.max_length {
            return Err(ParseError::TooLong {
                length: input.len(),
                max: self.max_length,
            });
        }
        Tokenizer::new(input).tokenize()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove the indentation shared by every non-blank line
pub(crate) fn dedent(source: &str) -> String {
    let common = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if common == 0 {
        return source.to_string();
    }
    source
        .lines()
        .map(|line| line.get(common..).unwrap_or("").trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Internal parser state
struct ParserState {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl ParserState {
    fn new(tokens: Vec<Spanned>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |(t, _)| t)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos + 1).map_or(&Token::Eof, |(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, l)| *l)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> ParseError {
        match self.current() {
            Token::Eof => ParseError::UnexpectedEof { line: self.line() },
            Token::Indent => ParseError::UnexpectedIndent { line: self.line() },
            other => ParseError::UnexpectedToken {
                token: format!("{other:?}"),
                line: self.line(),
            },
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.current() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.current() {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep {
                depth: self.depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn skip_newlines(&mut self) {
        while self.current() == &Token::Newline {
            self.advance();
        }
    }

    // Statements

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while self.current() != &Token::Eof {
            statements.extend(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Vec<Statement>, ParseError> {
        match self.current() {
            Token::If => Ok(vec![self.parse_if()?]),
            Token::For => Ok(vec![self.parse_for()?]),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = self.parse_simple()?;
        while self.current() == &Token::Semicolon {
            self.advance();
            if matches!(self.current(), Token::Newline | Token::Eof) {
                break;
            }
            statements.extend(self.parse_simple()?);
        }
        match self.current() {
            Token::Newline => {
                self.advance();
                Ok(statements)
            }
            Token::Eof | Token::Dedent => Ok(statements),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_suite(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(&Token::Colon)?;
        if self.current() != &Token::Newline {
            return self.parse_simple_line();
        }
        self.advance();
        self.expect(&Token::Indent)?;
        self.enter()?;
        let mut body = Vec::new();
        while !matches!(self.current(), Token::Dedent | Token::Eof) {
            body.extend(self.parse_statement()?);
            self.skip_newlines();
        }
        if self.current() == &Token::Dedent {
            self.advance();
        }
        self.leave();
        Ok(body)
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // 'if'
        let condition = self.parse_expression()?;
        let body = self.parse_suite()?;
        let mut branches = vec![(condition, body)];
        let mut otherwise = Vec::new();

        loop {
            match self.current() {
                Token::Elif => {
                    self.advance();
                    let condition = self.parse_expression()?;
                    let body = self.parse_suite()?;
                    branches.push((condition, body));
                }
                Token::Else => {
                    self.advance();
                    otherwise = self.parse_suite()?;
                    break;
                }
                _ => break,
            }
        }

        Ok(Statement::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // 'for'
        let variable = self.expect_identifier()?;
        self.expect(&Token::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_suite()?;
        Ok(Statement::For {
            variable,
            iterable,
            body,
        })
    }

    fn parse_simple(&mut self) -> Result<Vec<Statement>, ParseError> {
        match self.current() {
            Token::Pass => {
                self.advance();
                Ok(vec![Statement::Pass])
            }
            Token::Raise => {
                self.advance();
                Ok(vec![self.parse_raise()?])
            }
            Token::Assert => {
                self.advance();
                let condition = self.parse_expression()?;
                let message = if self.current() == &Token::Comma {
                    self.advance();
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Ok(vec![Statement::Assert { condition, message }])
            }
            Token::Import => {
                self.advance();
                let mut imports = vec![Statement::Import(self.parse_dotted_name()?)];
                while self.current() == &Token::Comma {
                    self.advance();
                    imports.push(Statement::Import(self.parse_dotted_name()?));
                }
                Ok(imports)
            }
            _ => {
                let line = self.line();
                let expr = self.parse_expression()?;
                if self.current() != &Token::Assign {
                    return Ok(vec![Statement::Expr(expr)]);
                }
                self.advance();
                let Expression::Variable(target) = expr else {
                    return Err(ParseError::InvalidAssignment { line });
                };
                let value = self.parse_expression()?;
                Ok(vec![Statement::Assign { target, value }])
            }
        }
    }

    fn parse_raise(&mut self) -> Result<Statement, ParseError> {
        if matches!(
            self.current(),
            Token::Newline | Token::Semicolon | Token::Eof | Token::Dedent
        ) {
            return Ok(Statement::Raise {
                kind: "RuntimeError".to_string(),
                message: None,
            });
        }
        let kind = self.expect_identifier()?;
        let mut message = None;
        if self.current() == &Token::LeftParen {
            self.advance();
            if self.current() != &Token::RightParen {
                message = Some(self.parse_expression()?);
                if self.current() == &Token::Comma {
                    self.advance();
                }
            }
            self.expect(&Token::RightParen)?;
        }
        Ok(Statement::Raise { kind, message })
    }

    fn parse_dotted_name(&mut self) -> Result<Vec<String>, ParseError> {
        let mut parts = vec![self.expect_identifier()?];
        while self.current() == &Token::Dot {
            self.advance();
            parts.push(self.expect_identifier()?);
        }
        Ok(parts)
    }

    // Expressions

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.enter()?;
        let expr = self.parse_ternary();
        self.leave();
        expr
    }

    fn parse_ternary(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_or()?;

        if self.current() != &Token::If {
            return Ok(expr);
        }
        self.advance();
        let condition = self.parse_or()?;
        self.expect(&Token::Else)?;
        let else_expr = self.parse_expression()?;

        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.current() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;
        while self.current() == &Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.current() != &Token::Not {
            return self.parse_comparison();
        }
        self.advance();
        self.enter()?;
        let expr = self.parse_not();
        self.leave();
        Ok(Expression::Not(Box::new(expr?)))
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();

        loop {
            let op = match (self.current(), self.peek()) {
                (Token::Equal, _) => CompareOp::Equal,
                (Token::NotEqual, _) => CompareOp::NotEqual,
                (Token::Less, _) => CompareOp::Less,
                (Token::Greater, _) => CompareOp::Greater,
                (Token::LessEqual, _) => CompareOp::LessOrEqual,
                (Token::GreaterEqual, _) => CompareOp::GreaterOrEqual,
                (Token::In, _) => CompareOp::In,
                (Token::Not, Token::In) => {
                    self.advance();
                    CompareOp::NotIn
                }
                (Token::Is, Token::Not) => {
                    self.advance();
                    CompareOp::IsNot
                }
                (Token::Is, _) => CompareOp::Is,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expression::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_sum(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::DoubleSlash => BinaryOp::FloorDivide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        match self.current() {
            Token::Minus | Token::Plus => {
                let negate = self.advance() == Token::Minus;
                self.enter()?;
                let expr = self.parse_unary();
                self.leave();
                let expr = expr?;
                Ok(if negate {
                    Expression::Negate(Box::new(expr))
                } else {
                    expr
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expression::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                Token::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&Token::RightBracket)?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::LeftParen => {
                    self.advance();
                    let args = self.parse_sequence(&Token::RightParen)?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to and including `close`
    fn parse_sequence(&mut self, close: &Token) -> Result<Vec<Expression>, ParseError> {
        let mut items = Vec::new();
        while self.current() != close {
            items.push(self.parse_expression()?);
            if self.current() == &Token::Comma {
                self.advance();
            } else if self.current() != close {
                return Err(self.unexpected());
            }
        }
        self.advance();
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let expr = match self.current().clone() {
            Token::Null => Expression::Null,
            Token::Boolean(b) => Expression::Boolean(b),
            Token::Integer(n) => Expression::Integer(n),
            Token::Float(n) => Expression::Float(n),
            Token::String(s) => {
                // Adjacent literals concatenate
                self.advance();
                let mut value = s;
                while let Token::String(next) = self.current() {
                    value.push_str(next);
                    self.advance();
                }
                return Ok(Expression::String(value));
            }
            Token::Identifier(name) => Expression::Variable(name),
            Token::Path(parts) => Expression::Path(parts),
            Token::LeftParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_parenthesised();
                self.leave();
                return inner;
            }
            Token::LeftBracket => {
                self.advance();
                self.enter()?;
                let items = self.parse_sequence(&Token::RightBracket);
                self.leave();
                return Ok(Expression::List(items?));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_parenthesised(&mut self) -> Result<Expression, ParseError> {
        if self.current() == &Token::RightParen {
            self.advance();
            return Ok(Expression::List(Vec::new()));
        }
        let first = self.parse_expression()?;
        match self.current() {
            Token::RightParen => {
                self.advance();
                Ok(first)
            }
            Token::Comma => {
                self.advance();
                let mut items = vec![first];
                items.extend(self.parse_sequence(&Token::RightParen)?);
                Ok(Expression::List(items))
            }
            _ => Err(ParseError::MissingDelimiter {
                delimiter: ')',
                line: self.line(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        Parser::new().parse(source).expect("Test operation failed")
    }

    #[test]
    fn test_parse_inline_if_raise() {
        let program = parse("if value < 18: raise ValueError('Age must be at least 18')");
        assert_eq!(program.statements.len(), 1);
        let Statement::If {
            branches,
            otherwise,
        } = &program.statements[0]
        else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 1);
        assert!(otherwise.is_empty());
        assert_eq!(
            branches[0].1,
            vec![Statement::Raise {
                kind: "ValueError".to_string(),
                message: Some(Expression::string("Age must be at least 18")),
            }]
        );
    }

    #[test]
    fn test_parse_blocks() {
        let source = "
total = 0
for item in value:
    if not item:
        raise ValueError('empty')
    elif item > 10:
        total = total + 1
    else:
        pass
assert total < 3, 'too many large items'
";
        let program = parse(source);
        assert_eq!(program.statements.len(), 3);
        let Statement::For { variable, body, .. } = &program.statements[1] else {
            panic!("expected for statement");
        };
        assert_eq!(variable, "item");
        let Statement::If {
            branches,
            otherwise,
        } = &body[0]
        else {
            panic!("expected if statement");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise, &vec![Statement::Pass]);
    }

    #[test]
    fn test_parse_indented_source_and_brackets() {
        let source = "    x = [1,\n      2,\n        3]\n    assert len(x) == 3";
        let program = parse(source);
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_parse_operators() {
        let parser = Parser::new();
        let expr = parser
            .parse_expression("0 <= value < 10 and name not in ['a', 'b'] or x is not None")
            .expect("Test operation failed");
        assert_eq!(
            expr.to_string(),
            "(((0 <= value < 10) and (name not in [\"a\", \"b\"])) or (x is not None))"
        );

        let expr = parser
            .parse_expression("a // 2 + -b * 3 % 4")
            .expect("Test operation failed");
        assert_eq!(expr.to_string(), "((a // 2) + ((-b * 3) % 4))");

        let expr = parser
            .parse_expression("'yes' if {info.field_name} == 'x' else f\"no\"")
            .expect("Test operation failed");
        assert_eq!(
            expr.to_string(),
            "(\"yes\" if ({info.field_name} == \"x\") else \"no\")"
        );
    }

    #[test]
    fn test_parse_postfix_chain() {
        let expr = Parser::new()
            .parse_expression("set(value).difference(string.ascii_letters + string.digits)[0]")
            .expect("Test operation failed");
        assert_eq!(
            expr.to_string(),
            "set(value).difference((string.ascii_letters + string.digits))[0]"
        );
    }

    #[test]
    fn test_parse_imports_and_semicolons() {
        let program = parse("import string, a.b; pass");
        assert_eq!(
            program.statements,
            vec![
                Statement::Import(vec!["string".to_string()]),
                Statement::Import(vec!["a".to_string(), "b".to_string()]),
                Statement::Pass,
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        let parser = Parser::new();
        assert!(matches!(
            parser.parse("if x:\n    a = 1\n  b = 2"),
            Err(ParseError::InconsistentIndent { .. })
        ));
        assert!(matches!(
            parser.parse("x = 1\n    y = 2"),
            Err(ParseError::UnexpectedIndent { .. })
        ));
        assert!(matches!(
            parser.parse("a.b = 1"),
            Err(ParseError::InvalidAssignment { .. })
        ));
        assert!(matches!(
            parser.parse("x = 'open"),
            Err(ParseError::InvalidString { .. })
        ));
        assert!(matches!(
            parser.parse("x = (1 + 2"),
            Err(ParseError::UnexpectedEof { .. } | ParseError::MissingDelimiter { .. })
        ));
        assert!(matches!(
            Parser::with_limits(64, 4).parse("value = 1"),
            Err(ParseError::TooLong { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            Parser::with_limits(16, 10_000).parse_expression(&deep),
            Err(ParseError::TooDeep { .. })
        ));
        assert!(Parser::with_limits(200, 10_000).parse_expression(&deep).is_ok());
    }
}
