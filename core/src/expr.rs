//! The per-node scripting sublanguage: semicolon-separated `target=expr`
//! clauses evaluated against a three-scope symbol table (token attributes,
//! scenario state, node aggregates). Evaluation failures are absorbed by
//! writing `false` to the clause target; the simulation never aborts here.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;
use tracing::{trace, warn};

use crate::dist::Dist;
use crate::state::{SimContext, TokenId, Value};
use crate::{AGGREGATE_PREFIX, SCENARIO_PREFIX};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unresolved variable `{0}`")]
    Unresolved(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("operator `{op}` not defined for {lhs} and {rhs}")]
    BadOperand {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("`{0}` is not callable")]
    NotCallable(String),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("clause failed to parse")]
    Broken,
}

// ---- lexer ----

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

pub(crate) fn lex(src: &str) -> Result<Vec<Tok>, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '%' => {
                toks.push(Tok::Percent);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Eq);
                    i += 2;
                } else {
                    toks.push(Tok::Assign);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ne);
                    i += 2;
                } else {
                    toks.push(Tok::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    toks.push(Tok::And);
                    i += 2;
                } else {
                    return Err(EvalError::Syntax("single `&`".into()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    toks.push(Tok::Or);
                    i += 2;
                } else {
                    return Err(EvalError::Syntax("single `|`".into()));
                }
            }
            '"' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '"' {
                    j += 1;
                }
                if j == chars.len() {
                    return Err(EvalError::Syntax("unterminated string".into()));
                }
                toks.push(Tok::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if chars.get(i) == Some(&'.')
                    && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit())
                {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let span: String = chars[start..i].iter().collect();
                let n = f64::from_str(&span)
                    .map_err(|_| EvalError::Syntax(format!("bad number `{span}`")))?;
                toks.push(Tok::Num(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let span: String = chars[start..i].iter().collect();
                toks.push(match span.as_str() {
                    "and" => Tok::And,
                    "or" => Tok::Or,
                    "not" => Tok::Not,
                    _ => Tok::Ident(span),
                });
            }
            _ => return Err(EvalError::Syntax(format!("unexpected character `{c}`"))),
        }
    }
    Ok(toks)
}

// ---- syntax tree ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Lit(Value),
    Var(String),
    List(Vec<Expr>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Dist, Vec<Expr>),
}

impl Expr {
    pub fn parse(src: &str) -> Result<Expr, EvalError> {
        parse_tokens(lex(src)?)
    }

    pub fn number(n: f64) -> Expr {
        Expr::Lit(Value::Num(n))
    }

    /// Constant-folds literal numbers (with optional leading minus); used
    /// for constructor arguments that must be plain numbers.
    pub fn const_num(&self) -> Option<f64> {
        match self {
            Expr::Lit(Value::Num(n)) => Some(*n),
            Expr::Unary(UnOp::Neg, e) => e.const_num().map(|v| -v),
            _ => None,
        }
    }
}

pub(crate) fn parse_tokens(toks: Vec<Tok>) -> Result<Expr, EvalError> {
    let mut p = Parser { toks, pos: 0 };
    let e = p.expr()?;
    match p.peek() {
        None => Ok(e),
        Some(t) => Err(EvalError::Syntax(format!("trailing `{t:?}`"))),
    }
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: Tok) -> Result<(), EvalError> {
        if self.eat(&want) {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "expected `{want:?}`, found `{:?}`",
                self.peek()
            )))
        }
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Tok::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.cmp_expr()?;
        while self.eat(&Tok::And) {
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.add_expr()?;
        let op = match self.peek() {
            Some(Tok::Eq) => BinOp::Eq,
            Some(Tok::Ne) => BinOp::Ne,
            Some(Tok::Lt) => BinOp::Lt,
            Some(Tok::Le) => BinOp::Le,
            Some(Tok::Gt) => BinOp::Gt,
            Some(Tok::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.add_expr()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn add_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn mul_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary_expr()?)));
        }
        if self.eat(&Tok::Not) {
            return Ok(Expr::Unary(UnOp::Not, Box::new(self.unary_expr()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Lit(Value::Num(n))),
            Some(Tok::Str(s)) => Ok(Expr::Lit(Value::Str(s))),
            Some(Tok::Ident(name)) => {
                if name == "true" {
                    return Ok(Expr::Lit(Value::Bool(true)));
                }
                if name == "false" {
                    return Ok(Expr::Lit(Value::Bool(false)));
                }
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    let args = self.args(Tok::RParen)?;
                    let dist =
                        Dist::from_name(&name).ok_or(EvalError::NotCallable(name))?;
                    return Ok(Expr::Call(dist, args));
                }
                Ok(Expr::Var(name))
            }
            Some(Tok::LParen) => {
                let e = self.expr()?;
                self.expect(Tok::RParen)?;
                Ok(e)
            }
            Some(Tok::LBracket) => {
                let items = self.args(Tok::RBracket)?;
                Ok(Expr::List(items))
            }
            other => Err(EvalError::Syntax(format!("unexpected `{other:?}`"))),
        }
    }

    fn args(&mut self, close: Tok) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }
}

// ---- evaluation ----

/// The three-scope symbol table an expression evaluates against: the current
/// token (if any), the run context (scenario + RNG) and the owning node's
/// aggregate map.
pub struct Scope<'a> {
    pub ctx: &'a mut SimContext,
    pub aggregates: &'a mut BTreeMap<String, Value>,
    pub token: Option<TokenId>,
}

impl<'a> Scope<'a> {
    pub fn new(
        ctx: &'a mut SimContext,
        aggregates: &'a mut BTreeMap<String, Value>,
        token: Option<TokenId>,
    ) -> Self {
        Self {
            ctx,
            aggregates,
            token,
        }
    }

    /// Resolution priority: token attributes, then scenario, then aggregates.
    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(t) = self.token {
            if let Some(v) = self.ctx.token(t).attrs.get(name) {
                return Ok(v.clone());
            }
        }
        if let Some(v) = self.ctx.scenario.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.aggregates.get(name) {
            return Ok(v.clone());
        }
        Err(EvalError::Unresolved(name.to_string()))
    }

    /// Write-back routing by target prefix; unprefixed names go to the
    /// current token. Without a token in scope the write is dropped.
    fn assign(&mut self, name: &str, value: Value) {
        if name.starts_with(SCENARIO_PREFIX) {
            self.ctx.scenario.insert(name.to_string(), value);
        } else if name.starts_with(AGGREGATE_PREFIX) {
            self.aggregates.insert(name.to_string(), value);
        } else if let Some(t) = self.token {
            self.ctx.token_mut(t).attrs.insert(name.to_string(), value);
        } else {
            trace!(target = name, "no token in scope; clause target dropped");
        }
    }
}

impl Expr {
    pub fn eval(&self, scope: &mut Scope<'_>) -> Result<Value, EvalError> {
        match self {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Var(name) => scope.lookup(name),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for e in items {
                    out.push(e.eval(scope)?);
                }
                Ok(Value::List(out))
            }
            Expr::Unary(UnOp::Neg, e) => {
                let v = e.eval(scope)?;
                let n = v.as_f64().ok_or(EvalError::BadOperand {
                    op: "-",
                    lhs: v.type_name(),
                    rhs: "nothing",
                })?;
                Ok(Value::Num(-n))
            }
            Expr::Unary(UnOp::Not, e) => Ok(Value::Bool(!e.eval(scope)?.truthy())),
            // `and`/`or` short-circuit and keep operand values, so the
            // conditional idiom `cond and x or y` works.
            Expr::Binary(BinOp::And, a, b) => {
                let va = a.eval(scope)?;
                if va.truthy() {
                    b.eval(scope)
                } else {
                    Ok(va)
                }
            }
            Expr::Binary(BinOp::Or, a, b) => {
                let va = a.eval(scope)?;
                if va.truthy() {
                    Ok(va)
                } else {
                    b.eval(scope)
                }
            }
            Expr::Binary(op, a, b) => {
                let va = a.eval(scope)?;
                let vb = b.eval(scope)?;
                binary(*op, va, vb)
            }
            Expr::Call(dist, args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.eval(scope)?);
                }
                if values.len() == 1 {
                    if let Value::List(items) = &values[0] {
                        values = items.clone();
                    }
                }
                let mut params = Vec::with_capacity(values.len());
                for v in &values {
                    params.push(v.as_f64().ok_or(EvalError::BadOperand {
                        op: dist.name(),
                        lhs: v.type_name(),
                        rhs: "parameter",
                    })?);
                }
                Ok(dist.sample(&mut scope.ctx.rng, &params))
            }
        }
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => match (&a, &b) {
            (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
            _ => {
                let (x, y) = nums("+", &a, &b)?;
                Ok(Value::Num(x + y))
            }
        },
        BinOp::Sub => {
            let (x, y) = nums("-", &a, &b)?;
            Ok(Value::Num(x - y))
        }
        BinOp::Mul => {
            let (x, y) = nums("*", &a, &b)?;
            Ok(Value::Num(x * y))
        }
        BinOp::Div => {
            let (x, y) = nums("/", &a, &b)?;
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Num(x / y))
        }
        BinOp::Mod => {
            let (x, y) = nums("%", &a, &b)?;
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // floored modulo: result takes the divisor's sign
            Ok(Value::Num(x - y * (x / y).floor()))
        }
        BinOp::Eq => Ok(Value::Bool(values_eq(&a, &b))),
        BinOp::Ne => Ok(Value::Bool(!values_eq(&a, &b))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &a, &b),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval"),
    }
}

fn nums(op: &'static str, a: &Value, b: &Value) -> Result<(f64, f64), EvalError> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(EvalError::BadOperand {
            op,
            lhs: a.type_name(),
            rhs: b.type_name(),
        }),
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(u, v)| values_eq(u, v))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let ord = match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                return Err(EvalError::BadOperand {
                    op: "comparison",
                    lhs: a.type_name(),
                    rhs: b.type_name(),
                })
            }
        },
    };
    // NaN compares false everywhere
    let b = match ord {
        None => false,
        Some(ord) => match op {
            BinOp::Lt => ord.is_lt(),
            BinOp::Le => ord.is_le(),
            BinOp::Gt => ord.is_gt(),
            BinOp::Ge => ord.is_ge(),
            _ => unreachable!(),
        },
    };
    Ok(Value::Bool(b))
}

// ---- scripts ----

/// One `target=expr` clause. A missing target means the implicit `value`
/// attribute; a clause whose expression failed to parse stays poisoned and
/// evaluates to an error (hence `false`) every time it runs.
#[derive(Debug, Clone)]
pub struct Clause {
    pub target: Option<String>,
    expr: Option<Expr>,
    raw: String,
}

pub const IMPLICIT_TARGET: &str = "value";

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub clauses: Vec<Clause>,
}

impl Script {
    /// Compiles a script. Never fails: clauses that do not parse are kept
    /// poisoned so the script still runs with best-effort semantics.
    pub fn parse(src: &str) -> Script {
        let mut clauses = Vec::new();
        for piece in src.split(';') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let (target, body) = split_target(piece);
            let expr = match Expr::parse(body) {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(clause = piece, %err, "script clause failed to parse; it will evaluate false");
                    None
                }
            };
            clauses.push(Clause {
                target,
                expr,
                raw: piece.to_string(),
            });
        }
        Script { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Runs every clause in order.
    pub fn run(&self, scope: &mut Scope<'_>) {
        self.run_slice(scope, 0, usize::MAX);
    }

    /// Runs only the first clause (condition polling).
    pub fn run_first(&self, scope: &mut Scope<'_>) {
        self.run_slice(scope, 0, 1);
    }

    /// Runs every clause after the first (condition release).
    pub fn run_rest(&self, scope: &mut Scope<'_>) {
        self.run_slice(scope, 1, usize::MAX);
    }

    fn run_slice(&self, scope: &mut Scope<'_>, start: usize, len: usize) {
        for clause in self.clauses.iter().skip(start).take(len) {
            let result = match &clause.expr {
                Some(e) => e.eval(scope),
                None => Err(EvalError::Broken),
            };
            let target = clause.target.as_deref().unwrap_or(IMPLICIT_TARGET);
            match result {
                Ok(v) => scope.assign(target, v),
                Err(err) => {
                    trace!(clause = %clause.raw, %err, "clause failed; target set false");
                    scope.assign(target, Value::Bool(false));
                }
            }
        }
    }
}

/// Splits `target = expr` at the first `=` that is not part of a comparison
/// operator. A missing or empty left side, or one that is not a plain
/// identifier, leaves the whole text as a bare expression.
fn split_target(piece: &str) -> (Option<String>, &str) {
    let bytes = piece.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'=' if bytes.get(i + 1) == Some(&b'=') => i += 2,
            b'=' if i > 0 && matches!(bytes[i - 1], b'<' | b'>' | b'!') => i += 1,
            b'=' => {
                let left = piece[..i].trim();
                let right = &piece[i + 1..];
                if left.is_empty() {
                    return (None, right);
                }
                if is_ident(left) {
                    return (Some(left.to_string()), right);
                }
                return (None, piece);
            }
            _ => i += 1,
        }
    }
    (None, piece)
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
