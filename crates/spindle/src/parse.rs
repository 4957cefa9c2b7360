//! Recursive-descent parser for Core programs.
//!
//! Operator precedence, loosest first: `|`, `&`, comparisons, additive,
//! multiplicative, application. Binary operators associate to the left.
//! `let`, `letrec`, `case` and `\` bodies extend as far right as possible.

use num_traits::ToPrimitive;

use crate::{
    ast::{Alt, AltBinder, Binding, Def, Expr, Program, Var},
    error::ParseError,
    lexer::{Token, TokenKind, lex, line_col},
    value::BinaryOp,
};

/// Parses a whole program (a `;`-separated list of definitions).
pub(crate) fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    parser.program()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Number of binary-operator precedence levels, loosest (`|`) to tightest (`* /`).
const OPERATOR_LEVELS: usize = 5;

/// The binary operator a token denotes, if any.
fn token_operator(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Pipe => Some(BinaryOp::Or),
        TokenKind::Amp => Some(BinaryOp::And),
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::Ne),
        TokenKind::Le => Some(BinaryOp::Le),
        TokenKind::Ge => Some(BinaryOp::Ge),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        _ => None,
    }
}

/// Precedence level of an operator, loosest first.
fn operator_level(op: BinaryOp) -> usize {
    match op {
        BinaryOp::Or => 0,
        BinaryOp::And => 1,
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 2,
        BinaryOp::Add | BinaryOp::Sub => 3,
        BinaryOp::Mul | BinaryOp::Div => 4,
    }
}

impl Parser<'_> {
    fn program(&mut self) -> Result<Program, ParseError> {
        let mut defs = Vec::new();
        while !self.at_end() {
            defs.push(self.def()?);
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            if !self.at_end() {
                return Err(self.error_here("expected ';' between definitions"));
            }
        }
        Ok(Program { defs })
    }

    fn def(&mut self) -> Result<Def, ParseError> {
        let name = self.expect_ident("definition name")?;
        let mut params = Vec::new();
        while let Some(TokenKind::Ident(_)) = self.peek() {
            params.push(self.expect_ident("parameter")?);
        }
        self.expect(&TokenKind::Assign)?;
        let body = self.expr()?;
        Ok(Def { name, params, body })
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokenKind::Let) => self.let_expr(false),
            Some(TokenKind::LetRec) => self.let_expr(true),
            Some(TokenKind::Case) => self.case_expr(),
            Some(TokenKind::Backslash) => self.lambda(),
            _ => self.binop(0),
        }
    }

    fn let_expr(&mut self, recursive: bool) -> Result<Expr, ParseError> {
        self.advance();
        let mut bindings = Vec::new();
        loop {
            let name = self.expect_ident("binding name")?;
            self.expect(&TokenKind::Assign)?;
            let value = self.expr()?;
            bindings.push(Binding::new(name, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::In)?;
        let body = self.expr()?;
        Ok(Expr::Let {
            recursive,
            bindings,
            body: Box::new(body),
        })
    }

    fn case_expr(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        let scrutinee = self.expr()?;
        self.expect(&TokenKind::Of)?;
        let mut alts = Vec::new();
        loop {
            self.expect(&TokenKind::Lt)?;
            let tag = self.expect_tag()?;
            self.expect(&TokenKind::Gt)?;
            let mut binders = Vec::new();
            while let Some(TokenKind::Ident(_)) = self.peek() {
                binders.push(AltBinder::new(self.expect_ident("pattern binder")?));
            }
            self.expect(&TokenKind::Arrow)?;
            let body = self.expr()?;
            alts.push(Alt { tag, binders, body });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(Expr::Case {
            scrutinee: Box::new(scrutinee),
            alts,
        })
    }

    fn lambda(&mut self) -> Result<Expr, ParseError> {
        self.advance();
        let mut params = vec![self.expect_ident("lambda parameter")?];
        while let Some(TokenKind::Ident(_)) = self.peek() {
            params.push(self.expect_ident("lambda parameter")?);
        }
        self.expect(&TokenKind::Dot)?;
        let body = self.expr()?;
        Ok(Expr::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn binop(&mut self, level: usize) -> Result<Expr, ParseError> {
        if level >= OPERATOR_LEVELS {
            return self.application();
        }
        let mut lhs = self.binop(level + 1)?;
        while let Some(op) = self.peek_operator(level) {
            self.advance();
            let rhs = self.binop(level + 1)?;
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn peek_operator(&self, level: usize) -> Option<BinaryOp> {
        let op = token_operator(self.peek()?)?;
        (operator_level(op) == level).then_some(op)
    }

    fn application(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        while self.at_atom_start() {
            let arg = self.atom()?;
            expr = Expr::App(Box::new(expr), Box::new(arg));
        }
        Ok(expr)
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                TokenKind::Ident(_)
                    | TokenKind::Int(_)
                    | TokenKind::Decimal(_)
                    | TokenKind::CharLit(_)
                    | TokenKind::LParen
                    | TokenKind::Pack
            )
        )
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokenKind::Ident(_)) => {
                let name = self.expect_ident("expression")?;
                Ok(Expr::Var(Var::new(name)))
            }
            Some(TokenKind::Int(_)) => {
                let Some(TokenKind::Int(value)) = self.advance() else {
                    unreachable!("peeked integer")
                };
                Ok(Expr::Int(value))
            }
            Some(TokenKind::Decimal(_)) => {
                let Some(TokenKind::Decimal(value)) = self.advance() else {
                    unreachable!("peeked decimal")
                };
                Ok(Expr::Decimal(value))
            }
            Some(TokenKind::CharLit(_)) => {
                let Some(TokenKind::CharLit(value)) = self.advance() else {
                    unreachable!("peeked character")
                };
                Ok(Expr::Char(value))
            }
            Some(TokenKind::Pack) => {
                self.advance();
                self.expect(&TokenKind::LBrace)?;
                let tag = self.expect_tag()?;
                self.expect(&TokenKind::Comma)?;
                let arity = self.expect_tag()?;
                self.expect(&TokenKind::RBrace)?;
                Ok(Expr::Pack { tag, arity })
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::If) => {
                self.advance();
                let cond = self.atom()?;
                let then = self.atom()?;
                let otherwise = self.atom()?;
                Ok(Expr::If {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                })
            }
            _ => Err(self.error_here("expected an expression")),
        }
    }

    // --- token plumbing ---

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}", kind.describe())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(TokenKind::Ident(_)) => {
                let Some(TokenKind::Ident(name)) = self.advance() else {
                    unreachable!("peeked identifier")
                };
                Ok(name)
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn expect_tag(&mut self) -> Result<u32, ParseError> {
        match self.peek() {
            Some(TokenKind::Int(_)) => {
                let Some(TokenKind::Int(value)) = self.advance() else {
                    unreachable!("peeked integer")
                };
                value
                    .to_u32()
                    .ok_or_else(|| self.error_here("constructor tag or arity out of range"))
            }
            _ => Err(self.error_here("expected an integer")),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        match self.tokens.get(self.pos) {
            Some(token) => {
                let (line, column) = line_col(self.source, token.offset);
                ParseError::new(format!("{message}, found {}", token.kind.describe()), line, column)
            }
            None => {
                let (line, column) = line_col(self.source, self.source.len());
                ParseError::new(format!("{message}, found end of input"), line, column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_program(source).unwrap()
    }

    #[test]
    fn parses_multiple_definitions() {
        let program = parse("square x = x * x;\nmain = square 4");
        assert_eq!(program.defs.len(), 2);
        assert_eq!(program.defs[0].name, "square");
        assert_eq!(program.defs[0].params, vec!["x".to_owned()]);
        assert_eq!(program.defs[1].name, "main");
    }

    #[test]
    fn precedence_groups_multiplication_tighter() {
        let program = parse("main = 4+2*5+2-5");
        let Expr::BinOp { op, .. } = &program.defs[0].body else {
            panic!("expected top-level binop");
        };
        // Left-associated additive chain: ((4 + 2*5) + 2) - 5.
        assert_eq!(*op, BinaryOp::Sub);
    }

    #[test]
    fn application_binds_tighter_than_operators() {
        let program = parse("main = f 1 + g 2");
        let Expr::BinOp { op, lhs, .. } = &program.defs[0].body else {
            panic!("expected binop");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(lhs.as_ref(), Expr::App(_, _)));
    }

    #[test]
    fn parses_let_with_several_bindings() {
        let program = parse("main = let a = 1, b = 2 in a");
        let Expr::Let { recursive, bindings, .. } = &program.defs[0].body else {
            panic!("expected let");
        };
        assert!(!*recursive);
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn parses_case_alternatives_with_binders() {
        let program = parse("length xs = case xs of <1> -> 0, <2> y ys -> 1 + length ys");
        let Expr::Case { alts, .. } = &program.defs[0].body else {
            panic!("expected case");
        };
        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].tag, 1);
        assert!(alts[0].binders.is_empty());
        assert_eq!(alts[1].binders.len(), 2);
    }

    #[test]
    fn parses_lambda_and_pack() {
        let program = parse("f = \\x y. Pack{2,2} x y");
        let Expr::Lambda { params, .. } = &program.defs[0].body else {
            panic!("expected lambda");
        };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn parses_if_with_three_atoms() {
        let program = parse("main = if (5 == 5) 10 2");
        assert!(matches!(program.defs[0].body, Expr::If { .. }));
    }

    #[test]
    fn rejects_missing_semicolon() {
        assert!(parse_program("a = 1 b = 2").is_err());
    }
}
