use log::debug;
use thiserror::Error;

use crate::{
    ast::Expr,
    reporter::ErrorReporter,
    token::{Token, TokenType},
    types::Literal,
};

pub type ParseResult<T> = std::result::Result<T, ParseError>;

// Bounds on unary and grouping nesting, and on the height of the finished tree.
// Parsing and every tree walk recurse, so both keep the stack in check.
pub const MAX_DEPTH: usize = 64;
pub const MAX_HEIGHT: usize = 256;

/// Recursive descent parser for a single expression.
///
/// ```text
/// expression → equality
/// equality   → comparison ( ( "!=" | "==" ) comparison )*
/// comparison → term ( ( ">" | ">=" | "<" | "<=" ) term )*
/// term       → factor ( ( "-" | "+" ) factor )*
/// factor     → unary ( ( "/" | "*" ) unary )*
/// unary      → ( "!" | "-" ) unary | primary
/// primary    → NUMBER | STRING | "true" | "false" | "nil" | "(" expression ")"
/// ```
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    // Height of the expression parsed last
    height: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The cursor relies on the stream being closed by an Eof token
        if tokens.last().map(|token| token.token_type) != Some(TokenType::Eof) {
            let line = tokens.last().map_or(1, |token| token.line);
            tokens.push(Token::eof(line));
        }

        Parser {
            tokens,
            current: 0,
            depth: 0,
            height: 0,
        }
    }

    pub fn parse<R>(&mut self, reporter: &mut R) -> Option<Expr>
    where
        R: ErrorReporter + ?Sized,
    {
        debug!("parsing {} tokens", self.tokens.len());
        self.depth = 0;
        self.height = 0;

        match self.expression() {
            Ok(expression) => {
                debug!("parsed expression, stopped at token {}", self.current);
                Some(expression)
            }
            Err(err) => {
                err.report(reporter);
                None
            }
        }
    }

    // Stops right after a `;` or right before a statement keyword
    pub fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            if [
                TokenType::Class,
                TokenType::Fun,
                TokenType::Var,
                TokenType::For,
                TokenType::If,
                TokenType::While,
                TokenType::Print,
                TokenType::Return,
            ]
            .contains(&self.peek().token_type)
            {
                return;
            }

            self.advance();
        }
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.equality()
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expression = self.comparison()?;

        while self.matches(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let left_height = self.height;
            let operator = self.previous().clone();
            let right = self.comparison()?;
            self.nest(&operator, left_height.max(self.height))?;
            expression = Expr::binary(expression, operator, right);
        }

        Ok(expression)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expression = self.term()?;

        while self.matches(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let left_height = self.height;
            let operator = self.previous().clone();
            let right = self.term()?;
            self.nest(&operator, left_height.max(self.height))?;
            expression = Expr::binary(expression, operator, right);
        }

        Ok(expression)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expression = self.factor()?;

        while self.matches(&[TokenType::Minus, TokenType::Plus]) {
            let left_height = self.height;
            let operator = self.previous().clone();
            let right = self.factor()?;
            self.nest(&operator, left_height.max(self.height))?;
            expression = Expr::binary(expression, operator, right);
        }

        Ok(expression)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expression = self.unary()?;

        while self.matches(&[TokenType::Slash, TokenType::Star]) {
            let left_height = self.height;
            let operator = self.previous().clone();
            let right = self.unary()?;
            self.nest(&operator, left_height.max(self.height))?;
            expression = Expr::binary(expression, operator, right);
        }

        Ok(expression)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            self.enter(&operator)?;
            let right = self.unary()?;
            self.depth -= 1;
            self.nest(&operator, self.height)?;
            return Ok(Expr::unary(operator, right));
        }

        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        self.height = 1;

        if self.matches(&[TokenType::False]) {
            return Ok(Expr::literal(Literal::Boolean(false)));
        }
        if self.matches(&[TokenType::True]) {
            return Ok(Expr::literal(Literal::Boolean(true)));
        }
        if self.matches(&[TokenType::Nil]) {
            return Ok(Expr::literal(Literal::Nil));
        }

        if self.matches(&[TokenType::Number, TokenType::String]) {
            let token = self.previous();
            return match &token.literal {
                Some(literal) => Ok(Expr::literal(literal.clone())),
                None => Err(ParseError::new(
                    token.clone(),
                    ParseErrorKind::ExpectedExpression,
                )),
            };
        }

        if self.matches(&[TokenType::LeftParen]) {
            let paren = self.previous().clone();
            self.enter(&paren)?;
            let expression = self.expression()?;
            self.consume(TokenType::RightParen, ParseErrorKind::ExpectedRightParen)?;
            self.depth -= 1;
            self.nest(&paren, self.height)?;
            return Ok(Expr::grouping(expression));
        }

        Err(ParseError::new(
            self.peek().clone(),
            ParseErrorKind::ExpectedExpression,
        ))
    }

    fn enter(&mut self, token: &Token) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(token.clone(), ParseErrorKind::TooDeeplyNested));
        }

        Ok(())
    }

    fn nest(&mut self, token: &Token, child_height: usize) -> ParseResult<()> {
        self.height = child_height + 1;
        if self.height > MAX_HEIGHT {
            return Err(ParseError::new(token.clone(), ParseErrorKind::TooDeeplyNested));
        }

        Ok(())
    }

    fn matches(&mut self, token_types: &[TokenType]) -> bool {
        for &token_type in token_types.iter() {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == token_type
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, token_type: TokenType, error_kind: ParseErrorKind) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(ParseError::new(self.peek().clone(), error_kind))
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct ParseError {
    token: Token,
    kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(token: Token, kind: ParseErrorKind) -> Self {
        ParseError { token, kind }
    }

    fn location(&self) -> String {
        if self.token.token_type == TokenType::Eof {
            "at end".to_string()
        } else {
            format!("at '{}'", self.token.lexeme)
        }
    }

    pub fn report<R: ErrorReporter + ?Sized>(&self, reporter: &mut R) {
        reporter.report(self.token.line, &self.location(), &self.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("Expected expression.")]
    ExpectedExpression,
    #[error("Expect ')' after expression.")]
    ExpectedRightParen,
    #[error("Expression nested too deeply.")]
    TooDeeplyNested,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Binary, Grouping, Unary, Visitor},
        printers::AstPrinter,
        reporter::Diagnostics,
        scanner::Scanner,
    };

    fn parse(source: &str) -> (Option<Expr>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        assert!(diagnostics.is_empty(), "unexpected scan errors");

        let expression = Parser::new(tokens).parse(&mut diagnostics);
        (expression, diagnostics)
    }

    fn print(source: &str) -> String {
        let (expression, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics.messages());
        AstPrinter.print(&expression.expect("source should parse"))
    }

    #[test]
    fn binary_operators_are_left_associative() {
        assert_eq!(print("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(print("8 / 4 / 2"), "(/ (/ 8 4) 2)");
        assert_eq!(print("1 == 2 != 3"), "(!= (== 1 2) 3)");
        assert_eq!(print("1 < 2 >= 3"), "(>= (< 1 2) 3)");
    }

    #[test]
    fn unary_is_right_associative() {
        assert_eq!(print("- - 1"), "(- (- 1))");
        assert_eq!(print("!!true"), "(! (! true))");
        assert_eq!(print("-1 * 2"), "(* (- 1) 2)");
    }

    #[test]
    fn precedence() {
        assert_eq!(print("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(print("1 * 2 + 3"), "(+ (* 1 2) 3)");
        assert_eq!(print("1 + 2 < 4 == true"), "(== (< (+ 1 2) 4) true)");
    }

    #[test]
    fn grouping() {
        assert_eq!(print("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
        assert_eq!(print("((nil))"), "(group (group nil))");
    }

    #[test]
    fn literals() {
        assert_eq!(print("\"hi\""), "hi");
        assert_eq!(print("12.5"), "12.5");
        assert_eq!(print("false"), "false");

        let (expression, _) = parse("nil");
        assert_eq!(expression, Some(Expr::literal(Literal::Nil)));
    }

    #[test]
    fn missing_right_paren() {
        let (expression, diagnostics) = parse("(1 + 2");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at end: Expect ')' after expression."]
        );
    }

    #[test]
    fn lone_right_paren() {
        let (expression, diagnostics) = parse(")");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at ')': Expected expression."]
        );
    }

    #[test]
    fn missing_operand_reports_once() {
        let (expression, diagnostics) = parse("1 +\n* 2");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 2] Error at '*': Expected expression."]
        );
    }

    #[test]
    fn wrong_closing_token() {
        let (expression, diagnostics) = parse("(1 2)");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at '2': Expect ')' after expression."]
        );
    }

    #[test]
    fn empty_input_expects_expression() {
        let (expression, diagnostics) = parse("");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at end: Expected expression."]
        );
    }

    #[test]
    fn bare_equal_stops_the_expression() {
        let (expression, diagnostics) = parse("1 = 2");
        assert!(diagnostics.is_empty());
        assert_eq!(expression.map(|e| AstPrinter.print(&e)), Some("1".into()));

        let (expression, diagnostics) = parse("= 2");
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at '=': Expected expression."]
        );
    }

    // Keeps exactly the parentheses the tree has groupings for
    struct SourcePrinter;

    impl Visitor for SourcePrinter {
        type Result = String;

        fn visit_binary_expr(&mut self, binary: &Binary) -> String {
            format!(
                "{} {} {}",
                binary.left.accept(self),
                binary.operator.lexeme,
                binary.right.accept(self)
            )
        }

        fn visit_grouping_expr(&mut self, grouping: &Grouping) -> String {
            format!("({})", grouping.expr.accept(self))
        }

        fn visit_literal_expr(&mut self, literal: &Literal) -> String {
            literal.to_string()
        }

        fn visit_unary_expr(&mut self, unary: &Unary) -> String {
            format!("{} {}", unary.operator.lexeme, unary.right.accept(self))
        }
    }

    #[test]
    fn printing_is_idempotent() {
        for source in [
            "1 - 2 - 3",
            "-(1 + 2) * 3 <= 4 / -5",
            "!(1 == 2) != (3 > 4)",
            "- - 2.5 >= (nil)",
        ] {
            let (expression, _) = parse(source);
            let expression = expression.expect("source should parse");
            let regenerated = expression.accept(&mut SourcePrinter);

            let (reparsed, diagnostics) = parse(&regenerated);
            assert!(diagnostics.is_empty());
            let reparsed = reparsed.expect("regenerated source should parse");

            assert_eq!(AstPrinter.print(&reparsed), AstPrinter.print(&expression));
        }
    }

    #[test]
    fn nesting_at_the_limit_parses_and_prints() {
        let negations = format!("{}1", "-".repeat(MAX_DEPTH));
        assert_eq!(
            print(&negations),
            format!("{}1{}", "(- ".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH))
        );

        let groups = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(
            print(&groups),
            format!("{}1{}", "(group ".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH))
        );
    }

    #[test]
    fn nesting_past_the_limit_reports_once() {
        let (expression, diagnostics) = parse(&format!("{}1", "-".repeat(MAX_DEPTH + 1)));
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at '-': Expression nested too deeply."]
        );

        let groups = format!(
            "{}1{}",
            "(".repeat(MAX_DEPTH + 1),
            ")".repeat(MAX_DEPTH + 1)
        );
        let (expression, diagnostics) = parse(&groups);
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at '(': Expression nested too deeply."]
        );
    }

    #[test]
    fn operator_chain_at_the_height_limit() {
        let chain = vec!["1"; MAX_HEIGHT].join(" + ");
        let printed = print(&chain);
        assert!(printed.starts_with(&"(+ ".repeat(MAX_HEIGHT - 1)));
        assert!(printed.ends_with("(+ 1 1) 1) 1)"));

        let (expression, diagnostics) = parse(&vec!["1"; MAX_HEIGHT + 1].join(" * "));
        assert_eq!(expression, None);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 1] Error at '*': Expression nested too deeply."]
        );
    }

    #[test]
    fn nesting_counts_start_over_on_each_parse() {
        let source = format!("{}1; {}2", "-".repeat(MAX_DEPTH + 1), "-".repeat(MAX_DEPTH));
        let mut diagnostics = Diagnostics::default();
        let tokens = Scanner::new(&source).scan_tokens(&mut diagnostics);
        let mut parser = Parser::new(tokens);

        assert_eq!(parser.parse(&mut diagnostics), None);
        parser.synchronize();
        assert!(parser.parse(&mut diagnostics).is_some());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn error_displays_its_message() {
        let err = ParseError::new(Token::eof(2), ParseErrorKind::ExpectedRightParen);
        assert_eq!(err.to_string(), "Expect ')' after expression.");

        let mut diagnostics = Diagnostics::default();
        err.report(&mut diagnostics);
        assert_eq!(
            diagnostics.messages(),
            vec!["[line 2] Error at end: Expect ')' after expression."]
        );
    }

    #[test]
    fn parser_without_eof_gets_one() {
        let tokens = vec![Token::new(
            TokenType::Number,
            "1".to_string(),
            Some(Literal::Number(1.0)),
            3,
        )];
        let mut diagnostics = Diagnostics::default();
        let expression = Parser::new(tokens).parse(&mut diagnostics);
        assert_eq!(expression, Some(Expr::literal(Literal::Number(1.0))));
    }

    #[test]
    fn synchronize_stops_after_semicolon() {
        let mut diagnostics = Diagnostics::default();
        let tokens = Scanner::new("1 + + 2; 3").scan_tokens(&mut diagnostics);
        let mut parser = Parser::new(tokens);

        assert_eq!(parser.parse(&mut diagnostics), None);
        parser.synchronize();
        assert_eq!(parser.peek().lexeme, "3");

        let expression = parser.parse(&mut diagnostics);
        assert_eq!(expression, Some(Expr::literal(Literal::Number(3.0))));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn synchronize_stops_before_statement_keyword() {
        let mut diagnostics = Diagnostics::default();
        let tokens = Scanner::new(") ) print 1").scan_tokens(&mut diagnostics);
        let mut parser = Parser::new(tokens);

        parser.synchronize();
        assert_eq!(parser.peek().token_type, TokenType::Print);
    }

    #[test]
    fn synchronize_runs_to_end() {
        let mut diagnostics = Diagnostics::default();
        let tokens = Scanner::new("1 2 3").scan_tokens(&mut diagnostics);
        let mut parser = Parser::new(tokens);

        parser.synchronize();
        assert!(parser.is_at_end());
        parser.synchronize();
        assert!(parser.is_at_end());
    }
}
