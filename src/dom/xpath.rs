//! XPath 1.0 subset
//!
//! Enough of the language to evaluate every XPath the synthesizer emits and
//! the hand-written forms recorded scripts tend to contain:
//! - absolute and `//` location paths, `*`, name tests, `text()`, `node()`, `.`, `..`
//! - predicates with positions, `@attr`, `=`/`!=`, `and`/`or`
//! - `normalize-space`, `contains`, `starts-with`, `concat`, `not`, `count`,
//!   `position`, `last`, `name`
//! - filter expressions like `(//a)[2]`

use super::{normalize_space, Document, DomError, NodeId};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Eq,
    NotEq,
    Star,
    Dot,
    DotDot,
    Literal(String),
    Number(f64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    DescendantOrSelf,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
enum PathExpr {
    Location { absolute: bool, steps: Vec<Step> },
    Filter(Box<PathExpr>, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    NormalizeSpace,
    Contains,
    StartsWith,
    Concat,
    Not,
    Count,
    Position,
    Last,
    Name,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        right: Box<Expr>,
        negate: bool,
    },
    Literal(String),
    Number(f64),
    Attr(String),
    Path(PathExpr),
    Call(Func, Vec<Expr>),
}

enum Value {
    Nodes(Vec<NodeId>),
    Attr(Option<String>),
    Str(String),
    Num(f64),
    Bool(bool),
}

/// A parsed XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct XPathExpr {
    source: String,
    root: Expr,
}

impl XPathExpr {
    pub fn parse(expr: &str) -> Result<Self, DomError> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            source: expr,
        };
        let root = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self {
            source: expr.to_string(),
            root,
        })
    }

    /// Evaluate as a node-set, in document order
    pub fn select(&self, doc: &Document) -> Result<Vec<NodeId>, DomError> {
        let ctx = Context {
            node: doc.document_node(),
            position: 1,
            size: 1,
        };
        match eval(doc, &self.root, ctx) {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(DomError::InvalidXPath {
                expr: self.source.clone(),
                reason: "expression does not select nodes".to_string(),
            }),
        }
    }

    /// Evaluate a numeric expression (`count(...)`) or count a node-set
    pub fn count(&self, doc: &Document) -> Result<usize, DomError> {
        let ctx = Context {
            node: doc.document_node(),
            position: 1,
            size: 1,
        };
        match eval(doc, &self.root, ctx) {
            Value::Nodes(nodes) => Ok(nodes.len()),
            Value::Num(n) if n >= 0.0 => Ok(n as usize),
            _ => Err(DomError::InvalidXPath {
                expr: self.source.clone(),
                reason: "expression is not countable".to_string(),
            }),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, DomError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |reason: String| DomError::InvalidXPath {
        expr: expr.to_string(),
        reason,
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| err(format!("unterminated literal at {}", i)))?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse()
                    .map_err(|_| err(format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '-' | '_' | '.' | ':'))
                {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(err(format!("unexpected '{}' at {}", other, i))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> DomError {
        DomError::InvalidXPath {
            expr: self.source.to_string(),
            reason: format!("{} (token {})", reason, self.pos),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn expect(&mut self, token: Token) -> Result<(), DomError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", token)))
        }
    }

    fn peek_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == word)
    }

    fn or_expr(&mut self) -> Result<Expr, DomError> {
        let mut left = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, DomError> {
        let mut left = self.compare_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.compare_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn compare_expr(&mut self) -> Result<Expr, DomError> {
        let left = self.operand()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.operand()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            right: Box::new(right),
            negate,
        })
    }

    fn operand(&mut self) -> Result<Expr, DomError> {
        match self.peek().cloned() {
            Some(Token::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::At) => {
                self.pos += 1;
                match self.peek().cloned() {
                    Some(Token::Name(name)) => {
                        self.pos += 1;
                        Ok(Expr::Attr(name.to_lowercase()))
                    }
                    _ => Err(self.error("expected attribute name")),
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                let predicates = self.predicates()?;
                if predicates.is_empty() {
                    return Ok(inner);
                }
                match inner {
                    Expr::Path(path) => Ok(Expr::Path(PathExpr::Filter(Box::new(path), predicates))),
                    _ => Err(self.error("predicate applied to a non node-set")),
                }
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen) && name != "text" && name != "node" =>
            {
                self.function_call(&name)
            }
            Some(_) => Ok(Expr::Path(self.location_path()?)),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn function_call(&mut self, name: &str) -> Result<Expr, DomError> {
        let func = match name {
            "normalize-space" => Func::NormalizeSpace,
            "contains" => Func::Contains,
            "starts-with" => Func::StartsWith,
            "concat" => Func::Concat,
            "not" => Func::Not,
            "count" => Func::Count,
            "position" => Func::Position,
            "last" => Func::Last,
            "name" | "local-name" => Func::Name,
            other => return Err(self.error(&format!("unsupported function '{}'", other))),
        };
        self.pos += 1;
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.or_expr()?);
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                args.push(self.or_expr()?);
            }
        }
        self.expect(Token::RParen)?;

        let arity_ok = match func {
            Func::Contains | Func::StartsWith => args.len() == 2,
            Func::Concat => args.len() >= 2,
            Func::Not | Func::Count => args.len() == 1,
            Func::NormalizeSpace | Func::Name => args.len() <= 1,
            Func::Position | Func::Last => args.is_empty(),
        };
        if !arity_ok {
            return Err(self.error(&format!("wrong number of arguments to '{}'", name)));
        }

        Ok(Expr::Call(func, args))
    }

    fn location_path(&mut self) -> Result<PathExpr, DomError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.at_step_start() {
                    return Ok(PathExpr::Location {
                        absolute: true,
                        steps,
                    });
                }
                steps.push(self.step()?);
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self());
                steps.push(self.step()?);
                true
            }
            _ => {
                steps.push(self.step()?);
                false
            }
        };

        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(descendant_or_self());
                    steps.push(self.step()?);
                }
                _ => break,
            }
        }

        Ok(PathExpr::Location { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::Dot | Token::DotDot)
        )
    }

    fn step(&mut self) -> Result<Step, DomError> {
        let (axis, test) = match self.peek().cloned() {
            Some(Token::Dot) => {
                self.pos += 1;
                (Axis::SelfNode, NodeTest::AnyNode)
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                (Axis::Parent, NodeTest::AnyNode)
            }
            Some(Token::Star) => {
                self.pos += 1;
                (Axis::Child, NodeTest::AnyElement)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                match name.as_str() {
                    "text" => (Axis::Child, NodeTest::Text),
                    "node" => (Axis::Child, NodeTest::AnyNode),
                    other => return Err(self.error(&format!("unsupported node test '{}'", other))),
                }
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                (Axis::Child, NodeTest::Name(name.to_lowercase()))
            }
            _ => return Err(self.error("expected a location step")),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.predicates()?,
        })
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, DomError> {
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::AnyNode,
        predicates: Vec::new(),
    }
}

#[derive(Clone, Copy)]
struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

fn eval(doc: &Document, expr: &Expr, ctx: Context) -> Value {
    match expr {
        Expr::Literal(s) => Value::Str(s.clone()),
        Expr::Number(n) => Value::Num(*n),
        Expr::Attr(name) => Value::Attr(doc.attr(ctx.node, name).map(str::to_string)),
        Expr::Path(path) => Value::Nodes(eval_path(doc, path, ctx.node)),
        Expr::Or(a, b) => Value::Bool(truthy(&eval(doc, a, ctx)) || truthy(&eval(doc, b, ctx))),
        Expr::And(a, b) => Value::Bool(truthy(&eval(doc, a, ctx)) && truthy(&eval(doc, b, ctx))),
        Expr::Compare {
            left,
            right,
            negate,
        } => {
            let equal = compare(doc, &eval(doc, left, ctx), &eval(doc, right, ctx));
            Value::Bool(equal != *negate)
        }
        Expr::Call(func, args) => call(doc, *func, args, ctx),
    }
}

fn call(doc: &Document, func: Func, args: &[Expr], ctx: Context) -> Value {
    let arg_str = |i: usize| string_of(doc, &eval(doc, &args[i], ctx));
    match func {
        Func::NormalizeSpace => {
            let raw = if args.is_empty() {
                doc.text_content(ctx.node)
            } else {
                arg_str(0)
            };
            Value::Str(normalize_space(&raw))
        }
        Func::Contains => Value::Bool(arg_str(0).contains(&arg_str(1))),
        Func::StartsWith => Value::Bool(arg_str(0).starts_with(&arg_str(1))),
        Func::Concat => Value::Str((0..args.len()).map(arg_str).collect()),
        Func::Not => Value::Bool(!truthy(&eval(doc, &args[0], ctx))),
        Func::Count => match eval(doc, &args[0], ctx) {
            Value::Nodes(nodes) => Value::Num(nodes.len() as f64),
            _ => Value::Num(0.0),
        },
        Func::Position => Value::Num(ctx.position as f64),
        Func::Last => Value::Num(ctx.size as f64),
        Func::Name => {
            let node = if args.is_empty() {
                Some(ctx.node)
            } else {
                match eval(doc, &args[0], ctx) {
                    Value::Nodes(nodes) => nodes.first().copied(),
                    _ => None,
                }
            };
            Value::Str(node.map(|n| doc.tag(n).to_string()).unwrap_or_default())
        }
    }
}

fn eval_path(doc: &Document, path: &PathExpr, context: NodeId) -> Vec<NodeId> {
    match path {
        PathExpr::Location { absolute, steps } => {
            let mut set = vec![if *absolute {
                doc.document_node()
            } else {
                context
            }];
            for step in steps {
                set = apply_step(doc, step, &set);
            }
            set
        }
        PathExpr::Filter(inner, predicates) => {
            let mut set = eval_path(doc, inner, context);
            for predicate in predicates {
                set = filter(doc, set, predicate);
            }
            set
        }
    }
}

fn apply_step(doc: &Document, step: &Step, input: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    for ctx in input {
        let mut candidates: Vec<NodeId> = axis_nodes(doc, step.axis, *ctx)
            .into_iter()
            .filter(|n| node_test(doc, &step.test, *n))
            .collect();
        for predicate in &step.predicates {
            candidates = filter(doc, candidates, predicate);
        }
        out.extend(candidates);
    }
    out.sort();
    out.dedup();
    out
}

fn filter(doc: &Document, nodes: Vec<NodeId>, predicate: &Expr) -> Vec<NodeId> {
    let size = nodes.len();
    nodes
        .into_iter()
        .enumerate()
        .filter(|(i, node)| {
            let ctx = Context {
                node: *node,
                position: i + 1,
                size,
            };
            match eval(doc, predicate, ctx) {
                Value::Num(n) => (n - (i + 1) as f64).abs() < f64::EPSILON,
                other => truthy(&other),
            }
        })
        .map(|(_, node)| node)
        .collect()
}

fn axis_nodes(doc: &Document, axis: Axis, ctx: NodeId) -> Vec<NodeId> {
    match axis {
        Axis::Child => doc.children(ctx).to_vec(),
        Axis::SelfNode => vec![ctx],
        Axis::Parent => doc.raw_parent(ctx).into_iter().collect(),
        Axis::DescendantOrSelf => {
            let mut out = Vec::new();
            let mut stack = vec![ctx];
            while let Some(node) = stack.pop() {
                out.push(node);
                stack.extend(doc.children(node).iter().rev().copied());
            }
            out
        }
    }
}

fn node_test(doc: &Document, test: &NodeTest, node: NodeId) -> bool {
    match test {
        NodeTest::AnyNode => true,
        NodeTest::AnyElement => doc.is_element(node),
        NodeTest::Name(name) => doc.is_element(node) && doc.tag(node) == name,
        NodeTest::Text => !doc.is_element(node) && doc.raw_parent(node).is_some(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Attr(attr) => attr.is_some(),
        Value::Str(s) => !s.is_empty(),
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Bool(b) => *b,
    }
}

fn string_of(doc: &Document, value: &Value) -> String {
    match value {
        Value::Nodes(nodes) => nodes
            .first()
            .map(|n| doc.text_content(*n))
            .unwrap_or_default(),
        Value::Attr(attr) => attr.clone().unwrap_or_default(),
        Value::Str(s) => s.clone(),
        Value::Num(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        Value::Num(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

fn compare(doc: &Document, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Attr(None), _) | (_, Value::Attr(None)) => false,
        (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
            let sx = doc.text_content(*x);
            b.iter().any(|y| doc.text_content(*y) == sx)
        }),
        (Value::Nodes(nodes), other) | (other, Value::Nodes(nodes)) => {
            let target = string_of(doc, other);
            nodes.iter().any(|n| doc.text_content(*n) == target)
        }
        (Value::Num(n), other) | (other, Value::Num(n)) => {
            string_of(doc, other).trim().parse::<f64>().ok() == Some(*n)
        }
        (Value::Bool(b), other) | (other, Value::Bool(b)) => truthy(other) == *b,
        (a, b) => string_of(doc, a) == string_of(doc, b),
    }
}
