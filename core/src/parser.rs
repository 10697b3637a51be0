//! Model-text compiler. A model is a list of node-definition lines (`id
//! Type(args) # title`) followed by connection lines (`1->2;2->3`). Runtime
//! ids are 1-based declaration positions; the number written before the
//! type may be fractional and may carry `/x/y` presentation hints.

use tracing::info;

use crate::dist::{Dist, Sampler};
use crate::error::ModelError;
use crate::expr::{self, Expr, Script, Tok};
use crate::network::Network;
use crate::node::{Node, NodeId, NodeKind};

pub fn parse(src: &str) -> Result<Network, ModelError> {
    let mut net = Network::new();
    let mut edges: Vec<(usize, i64, i64)> = Vec::new();
    let mut next_id: NodeId = 1;
    for (idx, raw) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.len() < 2 {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('#') {
            if line_no == 1 {
                net.title = stripped.trim().to_string();
            }
            continue;
        }
        if line.contains("->") {
            let body = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            };
            for seg in body.split(';') {
                let seg = seg.trim();
                if seg.is_empty() {
                    continue;
                }
                let (a, b) = seg.split_once("->").ok_or_else(|| {
                    ModelError::MalformedConnection {
                        line: line_no,
                        text: seg.to_string(),
                    }
                })?;
                let bad = || ModelError::MalformedConnection {
                    line: line_no,
                    text: seg.to_string(),
                };
                let from: i64 = a.trim().parse().map_err(|_| bad())?;
                let to: i64 = b.trim().parse().map_err(|_| bad())?;
                edges.push((line_no, from, to));
            }
            continue;
        }
        let node = parse_node_line(line, line_no, next_id)?;
        net.push_node(node);
        next_id += 1;
    }
    if net.is_empty() {
        return Err(ModelError::EmptyModel);
    }
    for (line, from, to) in edges {
        // nonpositive endpoints are placeholders, the pair is a no-op
        if from < 1 || to < 1 {
            continue;
        }
        let (from, to) = (from as NodeId, to as NodeId);
        if !net.contains(from) {
            return Err(ModelError::DanglingConnection { line, id: from });
        }
        if !net.contains(to) {
            return Err(ModelError::DanglingConnection { line, id: to });
        }
        net.connect(from, to);
    }
    net.finalize();
    info!(nodes = net.len(), title = %net.title, "model compiled");
    Ok(net)
}

fn parse_node_line(line: &str, line_no: usize, id: NodeId) -> Result<Node, ModelError> {
    let (body, title) = split_title(line);
    let body = body.trim();
    let Some((label, ctor)) = body.split_once(char::is_whitespace) else {
        return Err(ModelError::MalformedNode {
            line: line_no,
            reason: "missing constructor".into(),
        });
    };
    let (declared_id, hint_x, hint_y) = parse_label(label, line_no)?;
    let mut node = build_node(ctor.trim(), line_no, id)?;
    node.declared_id = declared_id;
    node.hint_x = hint_x;
    node.hint_y = hint_y;
    node.title = title;
    Ok(node)
}

/// Splits a definition line at the first `#` outside string quotes; the
/// remainder becomes the node's display title.
fn split_title(line: &str) -> (&str, String) {
    let mut in_str = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '#' if !in_str => return (&line[..i], line[i + 1..].trim().to_string()),
            _ => {}
        }
    }
    (line, String::new())
}

/// Parses the `id[/x[/y]]` label field.
fn parse_label(
    label: &str,
    line: usize,
) -> Result<(f64, Option<f64>, Option<f64>), ModelError> {
    let mut parts = label.split('/');
    let id_txt = parts.next().unwrap_or(label);
    let declared: f64 = id_txt.parse().map_err(|_| ModelError::MalformedNode {
        line,
        reason: format!("bad node label `{label}`"),
    })?;
    let x = parts.next().and_then(|s| s.parse().ok());
    let y = parts.next().and_then(|s| s.parse().ok());
    Ok((declared, x, y))
}

/// One constructor argument, already token-classified. Positional meaning
/// depends on the node type.
enum Arg {
    Fun(Dist),
    List(Vec<Expr>),
    Expr(Expr),
    Code(String),
    Nothing,
}

impl Arg {
    fn as_fun(&self, line: usize) -> Result<Option<Dist>, ModelError> {
        match self {
            Arg::Fun(d) => Ok(Some(*d)),
            Arg::Nothing => Ok(None),
            _ => Err(ModelError::MalformedNode {
                line,
                reason: "expected a distribution name".into(),
            }),
        }
    }

    fn as_params(&self, line: usize) -> Result<Vec<Expr>, ModelError> {
        match self {
            Arg::List(items) => Ok(items.clone()),
            Arg::Expr(e) => Ok(vec![e.clone()]),
            Arg::Nothing => Ok(Vec::new()),
            _ => Err(ModelError::MalformedNode {
                line,
                reason: "expected a parameter list".into(),
            }),
        }
    }

    fn as_number(&self, line: usize) -> Result<f64, ModelError> {
        if let Arg::Expr(e) = self {
            if let Some(n) = e.const_num() {
                return Ok(n);
            }
        }
        Err(ModelError::MalformedNode {
            line,
            reason: "expected a number".into(),
        })
    }

    fn as_code(&self, line: usize) -> Result<Option<String>, ModelError> {
        match self {
            Arg::Code(s) => Ok(Some(s.clone())),
            Arg::Nothing => Ok(None),
            _ => Err(ModelError::MalformedNode {
                line,
                reason: "expected a script string".into(),
            }),
        }
    }
}

fn build_node(ctor: &str, line: usize, id: NodeId) -> Result<Node, ModelError> {
    let (name, args) = split_ctor(ctor, line)?;
    match name.as_str() {
        "Start" | "Generator" => start_node(id, &args, line),
        "Task" | "Service" => task_node(id, &args, line),
        "Timer" => timer_node(id, &args, line),
        "XorGate" => code_only_node(id, NodeKind::XorGate, &args, line),
        "AndGate" => code_only_node(id, NodeKind::AndGate, &args, line),
        "Condition" | "ConditionalEvent" => {
            code_only_node(id, NodeKind::Condition, &args, line)
        }
        "Script" => code_only_node(id, NodeKind::Script, &args, line),
        "End" | "Sink" => code_only_node(id, NodeKind::Sink, &args, line),
        "Terminate" => code_only_node(id, NodeKind::Terminate, &args, line),
        "Throw" => {
            check_arity(&args, 0, line)?;
            Ok(Node::new(id, NodeKind::Throw))
        }
        _ => Err(ModelError::UnknownNodeType { line, kind: name }),
    }
}

fn split_ctor(ctor: &str, line: usize) -> Result<(String, Vec<Arg>), ModelError> {
    let toks = expr::lex(ctor).map_err(|e| ModelError::MalformedNode {
        line,
        reason: e.to_string(),
    })?;
    let name = match toks.first() {
        Some(Tok::Ident(n)) => n.clone(),
        _ => {
            return Err(ModelError::MalformedNode {
                line,
                reason: "expected a node type".into(),
            })
        }
    };
    if toks.get(1) != Some(&Tok::LParen) || toks.last() != Some(&Tok::RParen) {
        return Err(ModelError::MalformedNode {
            line,
            reason: "expected `Type(...)`".into(),
        });
    }
    let inner = &toks[2..toks.len() - 1];
    let mut args = Vec::new();
    let mut cur: Vec<Tok> = Vec::new();
    let mut depth = 0i32;
    for t in inner {
        match t {
            Tok::LParen | Tok::LBracket => {
                depth += 1;
                cur.push(t.clone());
            }
            Tok::RParen | Tok::RBracket => {
                depth -= 1;
                cur.push(t.clone());
            }
            Tok::Comma if depth == 0 => {
                args.push(classify(std::mem::take(&mut cur), line)?);
            }
            _ => cur.push(t.clone()),
        }
    }
    if !cur.is_empty() {
        args.push(classify(cur, line)?);
    }
    Ok((name, args))
}

fn classify(toks: Vec<Tok>, line: usize) -> Result<Arg, ModelError> {
    if toks.is_empty() {
        return Err(ModelError::MalformedNode {
            line,
            reason: "empty constructor argument".into(),
        });
    }
    if let [Tok::Ident(n)] = toks.as_slice() {
        if n == "None" {
            return Ok(Arg::Nothing);
        }
        if let Some(d) = Dist::from_name(n) {
            return Ok(Arg::Fun(d));
        }
        return Err(ModelError::MalformedNode {
            line,
            reason: format!("unknown distribution `{n}`"),
        });
    }
    if let [Tok::Str(s)] = toks.as_slice() {
        return Ok(Arg::Code(s.clone()));
    }
    let starts_list = matches!(toks.first(), Some(Tok::LBracket));
    let e = expr::parse_tokens(toks).map_err(|e| ModelError::MalformedNode {
        line,
        reason: e.to_string(),
    })?;
    if starts_list {
        if let Expr::List(items) = e {
            return Ok(Arg::List(items));
        }
    }
    Ok(Arg::Expr(e))
}

fn check_arity(args: &[Arg], max: usize, line: usize) -> Result<(), ModelError> {
    if args.len() > max {
        return Err(ModelError::MalformedNode {
            line,
            reason: "too many constructor arguments".into(),
        });
    }
    Ok(())
}

fn compile_code(code: Option<String>) -> Option<Script> {
    let src = code?;
    if src.trim().is_empty() {
        return None;
    }
    Some(Script::parse(&src))
}

fn start_node(id: NodeId, args: &[Arg], line: usize) -> Result<Node, ModelError> {
    check_arity(args, 4, line)?;
    let mut dist = Some(Dist::Exponential);
    let mut params = vec![Expr::number(1.0)];
    let mut horizon = 50.0;
    let mut code = None;
    if let Some(a) = args.first() {
        dist = a.as_fun(line)?;
    }
    if let Some(a) = args.get(1) {
        params = a.as_params(line)?;
    }
    if let Some(a) = args.get(2) {
        horizon = a.as_number(line)?;
    }
    if let Some(a) = args.get(3) {
        code = a.as_code(line)?;
    }
    let mut node = Node::new(id, NodeKind::Generator)
        .with_sampler(Sampler::new(dist, params))
        .with_horizon(horizon);
    node.script = compile_code(code);
    Ok(node)
}

fn task_node(id: NodeId, args: &[Arg], line: usize) -> Result<Node, ModelError> {
    check_arity(args, 4, line)?;
    let mut dist = Some(Dist::Uniform);
    let mut params = vec![Expr::number(1.0), Expr::number(2.0)];
    let mut code = None;
    let mut servers = 1usize;
    if let Some(a) = args.first() {
        dist = a.as_fun(line)?;
    }
    if let Some(a) = args.get(1) {
        params = a.as_params(line)?;
    }
    if let Some(a) = args.get(2) {
        code = a.as_code(line)?;
    }
    if let Some(a) = args.get(3) {
        let m = a.as_number(line)?;
        servers = if m < 1.0 { 1 } else { m as usize };
    }
    let mut node = Node::new(id, NodeKind::Activity)
        .with_sampler(Sampler::new(dist, params))
        .with_servers(servers);
    node.script = compile_code(code);
    Ok(node)
}

fn timer_node(id: NodeId, args: &[Arg], line: usize) -> Result<Node, ModelError> {
    if args.is_empty() {
        return Ok(Node::new(id, NodeKind::Timer).with_sampler(Sampler::constant(1.0)));
    }
    // without a leading distribution the first argument is the delay itself
    // and the code argument shifts forward one position
    let (sampler, code_pos) = match &args[0] {
        Arg::Fun(d) => {
            let params = match args.get(1) {
                Some(a) => a.as_params(line)?,
                None => vec![Expr::number(1.0)],
            };
            (Sampler::new(Some(*d), params), 2)
        }
        Arg::List(items) => (Sampler::periodic(items.clone()), 1),
        Arg::Expr(e) => (Sampler::new(None, vec![e.clone()]), 1),
        Arg::Nothing => (Sampler::constant(1.0), 1),
        Arg::Code(_) => {
            return Err(ModelError::MalformedNode {
                line,
                reason: "timer delay cannot be a string".into(),
            })
        }
    };
    check_arity(args, code_pos + 1, line)?;
    let code = match args.get(code_pos) {
        Some(a) => a.as_code(line)?,
        None => None,
    };
    let mut node = Node::new(id, NodeKind::Timer).with_sampler(sampler);
    node.script = compile_code(code);
    Ok(node)
}

fn code_only_node(
    id: NodeId,
    kind: NodeKind,
    args: &[Arg],
    line: usize,
) -> Result<Node, ModelError> {
    check_arity(args, 1, line)?;
    let code = match args.first() {
        Some(a) => a.as_code(line)?,
        None => None,
    };
    let mut node = Node::new(id, kind);
    node.script = compile_code(code);
    Ok(node)
}
