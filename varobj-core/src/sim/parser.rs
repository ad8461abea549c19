//! Recursive-descent parser for the simulated expression language
//!
//! ```text
//! expr     := additive
//! additive := term (('+' | '-') term)*
//! term     := unary ('*' unary)*
//! unary    := ('-' | '*' | '&') unary | '(' type ')' unary | postfix
//! postfix  := primary ('.' IDENT | '->' IDENT | '[' expr ']')*
//! primary  := INT | CHAR | IDENT | type | '(' expr ')'
//! type     := ('struct' | 'union' | 'class')? IDENT+ ('*' | '&')*
//! ```
//!
//! Whether an identifier starts a type is decided by the caller's type table.
//! The C width and sign modifiers always start one, so `unsigned int` parses
//! without `unsigned` being registered on its own.

use super::ast::{BinOp, Expr, UnaryOp};
use super::lexer::{tokenize, Token};
use crate::error::EvalError;
use crate::types::{Type, TypeRef};

const TYPE_MODIFIERS: &[&str] = &["unsigned", "signed", "short", "long"];

/// Parse `input`, resolving type names with `lookup_type`.
pub fn parse_expr(
    input: &str,
    lookup_type: &dyn Fn(&str) -> Option<TypeRef>,
) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        lookup_type,
    };
    let expr = parser.parse_additive()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(EvalError::parse(format!(
            "A syntax error in expression, near `{:?}'.",
            token
        ))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    lookup_type: &'a dyn Fn(&str) -> Option<TypeRef>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(EvalError::parse(format!(
                "A syntax error in expression, expected {:?}.",
                expected
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String, EvalError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(EvalError::parse("A syntax error in expression, expected a name.")),
        }
    }

    /// Whether the tokens at `offset` start a type name.
    fn starts_type(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(Token::Struct | Token::Union | Token::Class) => true,
            Some(Token::Ident(name)) => {
                TYPE_MODIFIERS.contains(&name.as_str()) || (self.lookup_type)(name).is_some()
            }
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, EvalError> {
        let mut name = match self.next() {
            Some(Token::Struct) => format!("struct {}", self.expect_ident()?),
            Some(Token::Union) => format!("union {}", self.expect_ident()?),
            Some(Token::Class) => self.expect_ident()?,
            Some(Token::Ident(name)) => name,
            _ => return Err(EvalError::parse("A syntax error in expression, expected a type.")),
        };
        // Multi-word names such as `unsigned int`.
        while let Some(Token::Ident(word)) = self.peek() {
            let longer = format!("{} {}", name, word);
            if (self.lookup_type)(&longer).is_none() {
                break;
            }
            name = longer;
            self.pos += 1;
        }
        let Some(mut ty) = (self.lookup_type)(&name) else {
            return Err(EvalError::UnknownType { name });
        };
        loop {
            if self.eat(&Token::Star) {
                ty = Type::pointer_to(&ty);
            } else if self.eat(&Token::Amp) {
                ty = Type::reference_to(&ty);
            } else {
                return Ok(ty);
            }
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::Star) {
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinOp::Mul,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Star) => Some(UnaryOp::Deref),
            Some(Token::Amp) => Some(UnaryOp::Ref),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        if self.peek() == Some(&Token::LParen) && self.starts_type(1) {
            self.pos += 1;
            let ty = self.parse_type()?;
            self.expect(Token::RParen)?;
            let expr = self.parse_unary()?;
            return Ok(Expr::Cast {
                ty,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = self.expect_ident()?;
                expr = Expr::Member {
                    expr: Box::new(expr),
                    field,
                };
            } else if self.eat(&Token::Arrow) {
                let field = self.expect_ident()?;
                expr = Expr::Arrow {
                    expr: Box::new(expr),
                    field,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_additive()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index {
                    expr: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        if self.starts_type(0) {
            return Ok(Expr::Type(self.parse_type()?));
        }
        match self.next() {
            Some(Token::Int(value)) => Ok(Expr::Int(value)),
            Some(Token::Char(c)) => Ok(Expr::Char(c)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let expr = self.parse_additive()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(EvalError::parse(format!(
                "A syntax error in expression, near `{:?}'.",
                token
            ))),
            None => Err(EvalError::parse(
                "A syntax error in expression, near `'.",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(name: &str) -> Option<TypeRef> {
        match name {
            "int" | "unsigned int" => Some(Type::int(name, 4, name == "int")),
            "struct pair" => Some(Type::structure(name, 8, Default::default())),
            _ => None,
        }
    }

    #[test]
    fn test_parse_path() {
        let expr = parse_expr("(s).items[2]->next", &types).unwrap();
        let Expr::Arrow { expr, field } = expr else {
            panic!("expected an arrow access");
        };
        assert_eq!(field, "next");
        assert!(matches!(*expr, Expr::Index { .. }));
    }

    #[test]
    fn test_parse_casts() {
        let expr = parse_expr("((struct pair *) p)", &types).unwrap();
        let Expr::Cast { ty, .. } = expr else {
            panic!("expected a cast");
        };
        assert_eq!(ty.to_string(), "struct pair *");

        let expr = parse_expr("(unsigned int) -1", &types).unwrap();
        assert!(matches!(expr, Expr::Cast { .. }));
    }

    #[test]
    fn test_parse_type_name() {
        assert!(matches!(parse_expr("int", &types), Ok(Expr::Type(_))));
        assert!(matches!(parse_expr("struct pair", &types), Ok(Expr::Type(_))));
        let Ok(Expr::Type(ty)) = parse_expr("unsigned int", &types) else {
            panic!("expected a type expression");
        };
        assert_eq!(ty.to_string(), "unsigned int");
        assert!(matches!(
            parse_expr("unsigned", &types),
            Err(EvalError::UnknownType { .. })
        ));
        assert!(matches!(
            parse_expr("struct missing", &types),
            Err(EvalError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let expr = parse_expr("a + b * 2", &types).unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected a binary operation");
        };
        assert_eq!(op, BinOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_expr("a +", &types), Err(EvalError::ParseError { .. })));
        assert!(matches!(parse_expr("(a", &types), Err(EvalError::ParseError { .. })));
        assert!(matches!(parse_expr("a b", &types), Err(EvalError::ParseError { .. })));
    }
}
