//! Recursive-descent parser for deferred expressions.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, `== !=`, `< <= > >=`,
//! `+ -`, `* / %`, unary `- !`, then member access, indexing and calls.

use super::lexer::{tokenize, Spanned, Token};
use super::ExprError;
use crate::value::ConfigValue;

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ConfigValue),
    Array(Vec<Expr>),
    /// Free identifier with static or computed accessors, resolved against
    /// the evaluation scope as one path.
    Path {
        root: String,
        segments: Vec<Segment>,
    },
    /// Accessor applied to a computed value.
    Member {
        object: Box<Expr>,
        segment: Segment,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Parse a complete expression.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.peek() == &Token::Eof {
        return Err(ExprError::syntax(0, "empty expression"));
    }
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(ExprError::syntax(
            parser.offset(),
            format!("unexpected {}", describe(other)),
        )),
    }
}

/// Deepest nesting of sub-expressions and prefix operators accepted.
const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and advance never moves past it
        &self.tokens[self.pos].0
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if token != Token::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ExprError::syntax(
                self.offset(),
                format!("expected {}, found {}", describe(&expected), describe(self.peek())),
            ))
        }
    }

    /// Count one more level of tree depth, failing past [`MAX_NESTING`].
    fn deepen(&mut self) -> Result<(), ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::syntax(self.offset(), "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one level deeper; the depth is restored afterwards.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let outer = self.depth;
        self.deepen()?;
        let result = parse(self);
        self.depth = outer;
        result
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(Token::Colon)?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_level: u8) -> Result<Expr, ExprError> {
        let outer = self.depth;
        let result = self.binary_chain(min_level);
        self.depth = outer;
        result
    }

    /// Precedence climbing over the binary operator table. Each folded
    /// operator deepens the left spine of the tree.
    fn binary_chain(&mut self, min_level: u8) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        while let Some((op, level)) = binary_op(self.peek()) {
            if level < min_level {
                break;
            }
            self.advance();
            self.deepen()?;
            let right = self.binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            let segment = match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(name) => Segment::Field(name),
                        other => {
                            return Err(ExprError::syntax(
                                self.offset(),
                                format!("expected property name, found {}", describe(&other)),
                            ))
                        }
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Token::RBracket)?;
                    Segment::Index(Box::new(index))
                }
                Token::LParen => {
                    let offset = self.offset();
                    let name = match expr {
                        Expr::Path { root, segments } if segments.is_empty() => root,
                        _ => {
                            return Err(ExprError::syntax(offset, "only builtin functions can be called"))
                        }
                    };
                    self.advance();
                    let args = self.list(Token::RParen)?;
                    expr = Expr::Call { name, args };
                    continue;
                }
                _ => return Ok(expr),
            };

            expr = match expr {
                Expr::Path { root, mut segments } => {
                    segments.push(segment);
                    Expr::Path { root, segments }
                }
                object => {
                    self.deepen()?;
                    Expr::Member {
                        object: Box::new(object),
                        segment,
                    }
                }
            };
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Token::Number(n) => ConfigValue::from_f64(n)
                .map(Expr::Literal)
                .ok_or_else(|| ExprError::syntax(offset, "number out of range")),
            Token::Str(s) => Ok(Expr::Literal(ConfigValue::String(s))),
            Token::True => Ok(Expr::Literal(ConfigValue::Bool(true))),
            Token::False => Ok(Expr::Literal(ConfigValue::Bool(false))),
            Token::Null => Ok(Expr::Literal(ConfigValue::Null)),
            Token::Ident(name) => Ok(Expr::Path {
                root: name,
                segments: Vec::new(),
            }),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::Array(self.list(Token::RBracket)?)),
            other => Err(ExprError::syntax(offset, format!("unexpected {}", describe(&other)))),
        }
    }

    /// Comma-separated expressions up to `close`; the opener is consumed.
    fn list(&mut self, close: Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }
}

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    Some(match token {
        Token::OrOr => (BinaryOp::Or, 0),
        Token::AndAnd => (BinaryOp::And, 1),
        Token::EqEq => (BinaryOp::Eq, 2),
        Token::NotEq => (BinaryOp::NotEq, 2),
        Token::Lt => (BinaryOp::Lt, 3),
        Token::LtEq => (BinaryOp::LtEq, 3),
        Token::Gt => (BinaryOp::Gt, 3),
        Token::GtEq => (BinaryOp::GtEq, 3),
        Token::Plus => (BinaryOp::Add, 4),
        Token::Minus => (BinaryOp::Sub, 4),
        Token::Star => (BinaryOp::Mul, 5),
        Token::Slash => (BinaryOp::Div, 5),
        Token::Percent => (BinaryOp::Rem, 5),
        _ => return None,
    })
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Eof => "end of expression".to_string(),
        other => format!("'{}'", symbol(other)),
    }
}

fn symbol(token: &Token) -> &'static str {
    match token {
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::Question => "?",
        Token::Colon => ":",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::LtEq => "<=",
        Token::Gt => ">",
        Token::GtEq => ">=",
        Token::AndAnd => "&&",
        Token::OrOr => "||",
        Token::Number(_) | Token::Str(_) | Token::Ident(_) | Token::Eof => "",
    }
}
