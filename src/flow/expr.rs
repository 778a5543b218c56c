//! Rule expressions — the small language embedded in the step catalog.
//!
//! Branching rules, visibility predicates, dynamic numeric bounds, and
//! question-template interpolation slots are all written in this language
//! and parsed into an [`Expr`] AST once, when the catalog is built. At
//! runtime evaluation is a pure function of the AST and the answer set.
//!
//! The language is deliberately tiny and allow-listed: references to
//! prior answers (`answers.S5`), string/number/bool/list literals,
//! comparisons, `&&`/`||`/`!`, `+`/`-`, an `in` membership/containment
//! operator, a C-style ternary (`cond ? a : b`), and a fixed set of
//! functions: `int`, `len`, `any`, `all`, `count`, `selected`, `join`,
//! `nth`. There is no way to reach host capabilities from an expression.
//!
//! Missing answers evaluate to [`Value::Missing`], which compares unequal
//! to everything, is falsy, fails membership, and casts to 0 via `int`.

use super::answer::{Answer, AnswerSet};

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Num(i64),
    Bool(bool),
    List(Vec<String>),
    /// A reference to an answer that has not been given yet.
    Missing,
}

impl Value {
    /// Short type name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Missing => "missing",
        }
    }

    /// Rendered form used by interpolation slots.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items.join(", "),
            Value::Missing => String::new(),
        }
    }
}

impl From<&Answer> for Value {
    fn from(answer: &Answer) -> Self {
        match answer {
            Answer::Scalar(s) => Value::Str(s.clone()),
            Answer::Numeric(n) => Value::Num(*n),
            Answer::MultiSelect(opts) => Value::List(opts.clone()),
        }
    }
}

/// Evaluation failure. The resolver treats any of these as an
/// unresolvable branch and fails closed; the validator treats bound
/// expressions that fail as unbounded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("expected {expected}, got {got}")]
    Type {
        expected: &'static str,
        got: &'static str,
    },

    #[error("cannot interpret {0:?} as a number")]
    NotANumber(String),
}

/// Expression parse failure, reported at catalog build time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at token {position})")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

/// Allow-listed functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    /// Numeric cast; missing values cast to 0.
    Int,
    /// Length of a list or string; missing is 0.
    Len,
    /// `any(target, [..])` — any listed option selected by / contained in target.
    Any,
    /// `all(target, [..])` — every listed option selected by / contained in target.
    All,
    /// `count(target, [..])` — how many listed options match target.
    Count,
    /// `selected(target, [..])` — the listed options matching target, in list order.
    Selected,
    /// `join(list, sep)` — join a list value with a separator.
    Join,
    /// `nth(list, n)` — 1-based element access; missing when out of range.
    Nth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
}

/// Parsed expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(i64),
    Bool(bool),
    List(Vec<Expr>),
    /// `answers.<step_id>`
    Ref(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parse an expression from its source text.
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.ternary()?;
        if parser.pos != parser.tokens.len() {
            return Err(ParseError {
                message: format!("unexpected trailing input: {:?}", parser.tokens[parser.pos]),
                position: parser.pos,
            });
        }
        Ok(expr)
    }

    /// Evaluate against the accumulated answers. Pure.
    pub fn eval(&self, answers: &AnswerSet) -> Result<Value, EvalError> {
        match self {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.eval(answers)? {
                        Value::Str(s) => out.push(s),
                        other => {
                            return Err(EvalError::Type {
                                expected: "string list element",
                                got: other.kind(),
                            });
                        }
                    }
                }
                Ok(Value::List(out))
            }
            Expr::Ref(step_id) => Ok(answers
                .get(step_id)
                .map(Value::from)
                .unwrap_or(Value::Missing)),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(answers)?)?)),
            Expr::Neg(inner) => Ok(Value::Num(-to_number(&inner.eval(answers)?)?)),
            Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, answers),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&cond.eval(answers)?)? {
                    then.eval(answers)
                } else {
                    otherwise.eval(answers)
                }
            }
            Expr::Call { func, args } => eval_call(*func, args, answers),
        }
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, answers: &AnswerSet) -> Result<Value, EvalError> {
    // Short-circuit logical operators before evaluating the right side.
    match op {
        BinOp::And => {
            if !truthy(&lhs.eval(answers)?)? {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(truthy(&rhs.eval(answers)?)?));
        }
        BinOp::Or => {
            if truthy(&lhs.eval(answers)?)? {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(truthy(&rhs.eval(answers)?)?));
        }
        _ => {}
    }

    let left = lhs.eval(answers)?;
    let right = rhs.eval(answers)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinOp::Lt => Ok(Value::Bool(to_number(&left)? < to_number(&right)?)),
        BinOp::Le => Ok(Value::Bool(to_number(&left)? <= to_number(&right)?)),
        BinOp::Gt => Ok(Value::Bool(to_number(&left)? > to_number(&right)?)),
        BinOp::Ge => Ok(Value::Bool(to_number(&left)? >= to_number(&right)?)),
        BinOp::Add => Ok(Value::Num(to_number(&left)? + to_number(&right)?)),
        BinOp::Sub => Ok(Value::Num(to_number(&left)? - to_number(&right)?)),
        BinOp::In => Ok(Value::Bool(eval_in(&left, &right))),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(func: Func, args: &[Expr], answers: &AnswerSet) -> Result<Value, EvalError> {
    let arity = match func {
        Func::Int | Func::Len => 1,
        _ => 2,
    };
    if args.len() != arity {
        return Err(EvalError::Type {
            expected: "correct argument count",
            got: "wrong arity",
        });
    }

    match func {
        Func::Int => {
            let v = args[0].eval(answers)?;
            match v {
                Value::Num(n) => Ok(Value::Num(n)),
                Value::Str(s) => s
                    .trim()
                    .parse()
                    .map(Value::Num)
                    .map_err(|_| EvalError::NotANumber(s)),
                Value::Missing => Ok(Value::Num(0)),
                other => Err(EvalError::Type {
                    expected: "number or string",
                    got: other.kind(),
                }),
            }
        }
        Func::Len => {
            let v = args[0].eval(answers)?;
            match v {
                Value::List(items) => Ok(Value::Num(items.len() as i64)),
                Value::Str(s) => Ok(Value::Num(s.chars().count() as i64)),
                Value::Missing => Ok(Value::Num(0)),
                other => Err(EvalError::Type {
                    expected: "list or string",
                    got: other.kind(),
                }),
            }
        }
        Func::Any | Func::All | Func::Count | Func::Selected => {
            let target = args[0].eval(answers)?;
            let needles = match args[1].eval(answers)? {
                Value::List(items) => items,
                other => {
                    return Err(EvalError::Type {
                        expected: "list",
                        got: other.kind(),
                    });
                }
            };
            match func {
                Func::Any => Ok(Value::Bool(
                    needles.iter().any(|n| value_contains(&target, n)),
                )),
                Func::All => Ok(Value::Bool(
                    needles.iter().all(|n| value_contains(&target, n)),
                )),
                Func::Count => Ok(Value::Num(
                    needles.iter().filter(|n| value_contains(&target, n)).count() as i64,
                )),
                Func::Selected => Ok(Value::List(
                    needles
                        .into_iter()
                        .filter(|n| value_contains(&target, n))
                        .collect(),
                )),
                _ => unreachable!(),
            }
        }
        Func::Join => {
            let list = match args[0].eval(answers)? {
                Value::List(items) => items,
                Value::Missing => Vec::new(),
                other => {
                    return Err(EvalError::Type {
                        expected: "list",
                        got: other.kind(),
                    });
                }
            };
            let sep = match args[1].eval(answers)? {
                Value::Str(s) => s,
                other => {
                    return Err(EvalError::Type {
                        expected: "string separator",
                        got: other.kind(),
                    });
                }
            };
            Ok(Value::Str(list.join(&sep)))
        }
        Func::Nth => {
            let list = match args[0].eval(answers)? {
                Value::List(items) => items,
                Value::Missing => Vec::new(),
                other => {
                    return Err(EvalError::Type {
                        expected: "list",
                        got: other.kind(),
                    });
                }
            };
            let n = to_number(&args[1].eval(answers)?)?;
            if n >= 1 && (n as usize) <= list.len() {
                Ok(Value::Str(list[n as usize - 1].clone()))
            } else {
                Ok(Value::Missing)
            }
        }
    }
}

/// `needle in haystack` semantics shared by the `in` operator and the
/// aggregate functions: exact membership for multi-select values, substring
/// containment for strings, false for anything missing.
fn value_contains(haystack: &Value, needle: &str) -> bool {
    match haystack {
        Value::List(items) => items.iter().any(|i| i == needle),
        Value::Str(s) => s.contains(needle),
        _ => false,
    }
}

fn eval_in(left: &Value, right: &Value) -> bool {
    let needle = match left {
        Value::Str(s) => s.as_str(),
        // A number can be a member of a list of its rendered form.
        Value::Num(_) => return value_contains(right, &left.render()),
        _ => return false,
    };
    value_contains(right, needle)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Missing, _) | (_, Value::Missing) => false,
        (Value::Num(a), Value::Str(b)) | (Value::Str(b), Value::Num(a)) => {
            b.trim().parse::<i64>() == Ok(*a)
        }
        (a, b) => a == b,
    }
}

fn truthy(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Missing => Ok(false),
        other => Err(EvalError::Type {
            expected: "bool",
            got: other.kind(),
        }),
    }
}

fn to_number(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Num(n) => Ok(*n),
        Value::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| EvalError::NotANumber(s.clone())),
        other => Err(EvalError::Type {
            expected: "number",
            got: other.kind(),
        }),
    }
}

// ── Interpolation ───────────────────────────────────────────────────

/// Interpolate `{expr}` slots in a question template against the answers.
///
/// Slots that fail to parse or evaluate render as the empty string, so a
/// template never breaks the flow at runtime. Pure and idempotent for an
/// unchanged answer set.
pub fn interpolate(template: &str, answers: &AnswerSet) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let slot = &after[..close];
                match Expr::parse(slot) {
                    Ok(expr) => match expr.eval(answers) {
                        Ok(value) => out.push_str(&value.render()),
                        Err(_) => {}
                    },
                    Err(_) => {}
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unbalanced brace: emit the rest verbatim.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Lexer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Plus,
    Minus,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

fn lex(source: &str) -> Result<Vec<Tok>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    let err = |message: String, position: usize| ParseError { message, position };

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Tok::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Tok::Dot);
                i += 1;
            }
            '?' => {
                tokens.push(Tok::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Tok::Colon);
                i += 1;
            }
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Tok::AndAnd);
                    i += 2;
                } else {
                    return Err(err("expected '&&'".into(), i));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Tok::OrOr);
                    i += 2;
                } else {
                    return Err(err("expected '||'".into(), i));
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::EqEq);
                    i += 2;
                } else {
                    return Err(err("expected '=='".into(), i));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Ne);
                    i += 2;
                } else {
                    tokens.push(Tok::Bang);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Le);
                    i += 2;
                } else {
                    tokens.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Tok::Ge);
                    i += 2;
                } else {
                    tokens.push(Tok::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some(&escaped) => value.push(escaped),
                                None => return Err(err("unterminated escape".into(), i)),
                            }
                            i += 2;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                        None => return Err(err("unterminated string literal".into(), i)),
                    }
                }
                tokens.push(Tok::Str(value));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| err(format!("bad number {text:?}"), start))?;
                tokens.push(Tok::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(text));
            }
            other => return Err(err(format!("unexpected character {other:?}"), i)),
        }
    }
    Ok(tokens)
}

// ── Parser ──────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok, context: &str) -> Result<(), ParseError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?} {context}")))
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.or_expr()?;
        if self.eat(&Tok::Question) {
            let then = self.ternary()?;
            self.expect(Tok::Colon, "in ternary")?;
            let otherwise = self.ternary()?;
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            })
        } else {
            Ok(cond)
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.comparison()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => Some(BinOp::Eq),
            Some(Tok::Ne) => Some(BinOp::Ne),
            Some(Tok::Le) => Some(BinOp::Le),
            Some(Tok::Ge) => Some(BinOp::Ge),
            Some(Tok::Lt) => Some(BinOp::Lt),
            Some(Tok::Gt) => Some(BinOp::Gt),
            Some(Tok::Ident(name)) if name == "in" => Some(BinOp::In),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.additive()?;
                Ok(Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            None => Ok(lhs),
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Tok::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::LParen) => {
                let inner = self.ternary()?;
                self.expect(Tok::RParen, "to close group")?;
                Ok(inner)
            }
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat(&Tok::RBracket) {
                            break;
                        }
                        self.expect(Tok::Comma, "between list elements")?;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "answers" => {
                    self.expect(Tok::Dot, "after 'answers'")?;
                    match self.bump() {
                        Some(Tok::Ident(step_id)) => Ok(Expr::Ref(step_id)),
                        _ => Err(self.error("expected step id after 'answers.'".into())),
                    }
                }
                "int" | "len" | "any" | "all" | "count" | "selected" | "join" | "nth" => {
                    let func = match name.as_str() {
                        "int" => Func::Int,
                        "len" => Func::Len,
                        "any" => Func::Any,
                        "all" => Func::All,
                        "count" => Func::Count,
                        "selected" => Func::Selected,
                        "join" => Func::Join,
                        _ => Func::Nth,
                    };
                    self.expect(Tok::LParen, "to open argument list")?;
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.ternary()?);
                            if self.eat(&Tok::RParen) {
                                break;
                            }
                            self.expect(Tok::Comma, "between arguments")?;
                        }
                    }
                    Ok(Expr::Call { func, args })
                }
                other => Err(self.error(format!("unknown identifier {other:?}"))),
            },
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression".into())),
        }
    }
}
