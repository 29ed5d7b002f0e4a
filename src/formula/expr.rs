//! Formula expression trees
//!
//! Terms are kept as structured expressions so that term kinds can be
//! recognised by shape rather than by matching serialized text. The
//! [`Display`](std::fmt::Display) impl renders the canonical label text.

use std::fmt;

/// Binary operators that may appear in a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`, shorthand for `a + b + a:b`
    Mul,
    /// `a / b`, nesting
    Div,
    /// `a ^ n`
    Power,
    /// `a:b`
    Interact,
    /// `lhs | group`
    Bar,
    /// `lhs || group`
    DoubleBar,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Bar | BinaryOp::DoubleBar => 1,
            BinaryOp::Add | BinaryOp::Sub => 2,
            BinaryOp::Mul | BinaryOp::Div => 3,
            BinaryOp::Interact => 6,
            BinaryOp::Power => 7,
        }
    }

    /// `^` groups to the right, everything else to the left
    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOp::Power)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Power => "^",
            BinaryOp::Interact => ":",
            BinaryOp::Bar => "|",
            BinaryOp::DoubleBar => "||",
        }
    }
}

/// Binding strength of unary minus
pub(crate) const NEGATE_PRECEDENCE: u8 = 4;

/// Binding strength of `%op%` operators such as `%in%`
pub(crate) const SPECIAL_PRECEDENCE: u8 = 5;

/// A call argument, optionally named
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

/// A formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Symbol(String),
    /// Numeric literal, kept as written
    Number(String),
    /// String literal, unescaped
    Str(String),
    Call { name: String, args: Vec<Arg> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs %op% rhs`; `op` includes the percent signs
    Special {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    Paren(Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The expression with any enclosing parentheses removed
    pub fn unparenthesized(&self) -> &Expr {
        match self {
            Expr::Paren(inner) => inner.unparenthesized(),
            other => other,
        }
    }

    /// Whether this is a call to the function `name`
    pub fn is_call_to(&self, name: &str) -> bool {
        matches!(self, Expr::Call { name: n, .. } if n == name)
    }

    /// Whether this is a top-level `|` or `||` expression
    pub fn is_bar(&self) -> bool {
        matches!(
            self.unparenthesized(),
            Expr::Binary {
                op: BinaryOp::Bar | BinaryOp::DoubleBar,
                ..
            }
        )
    }

    /// Whether a `|` or `||` occurs anywhere in the expression
    pub fn contains_bar(&self) -> bool {
        match self {
            Expr::Symbol(_) | Expr::Number(_) | Expr::Str(_) => false,
            Expr::Call { args, .. } => args.iter().any(|a| a.value.contains_bar()),
            Expr::Binary { op, lhs, rhs } => {
                matches!(op, BinaryOp::Bar | BinaryOp::DoubleBar)
                    || lhs.contains_bar()
                    || rhs.contains_bar()
            }
            Expr::Special { lhs, rhs, .. } => lhs.contains_bar() || rhs.contains_bar(),
            Expr::Negate(inner) | Expr::Paren(inner) => inner.contains_bar(),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Special { .. } => SPECIAL_PRECEDENCE,
            Expr::Negate(_) => NEGATE_PRECEDENCE,
            _ => u8::MAX,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Whether `name` can be written without backquotes
pub fn is_syntactic_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    let starts_ok = first.is_alphabetic()
        || (first == '.' && !name[1..].starts_with(|c: char| c.is_ascii_digit()));
    starts_ok && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Render a symbol name, backquoting it when needed
pub fn render_name(name: &str) -> String {
    if is_syntactic_name(name) {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}

fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(name) => write!(f, "{}", render_name(name)),
            Expr::Number(text) => write!(f, "{}", text),
            Expr::Str(text) => write!(f, "\"{}\"", escape_string(text)),
            Expr::Call { name, args } => {
                write!(f, "{}(", render_name(name))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(arg_name) = &arg.name {
                        write!(f, "{} = ", render_name(arg_name))?;
                    }
                    write!(f, "{}", arg.value)?;
                }
                write!(f, ")")
            }
            Expr::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                // The operand on the grouping side may bind equally, the other must bind tighter
                let (left, right) = if op.is_right_associative() {
                    (precedence + 1, precedence)
                } else {
                    (precedence, precedence + 1)
                };
                lhs.fmt_operand(f, left)?;
                match op {
                    BinaryOp::Interact | BinaryOp::Div | BinaryOp::Power => {
                        write!(f, "{}", op.as_str())?
                    }
                    other => write!(f, " {} ", other.as_str())?,
                }
                rhs.fmt_operand(f, right)
            }
            Expr::Special { op, lhs, rhs } => {
                lhs.fmt_operand(f, SPECIAL_PRECEDENCE)?;
                write!(f, " {} ", op)?;
                rhs.fmt_operand(f, SPECIAL_PRECEDENCE + 1)
            }
            Expr::Negate(inner) => {
                write!(f, "-")?;
                inner.fmt_operand(f, NEGATE_PRECEDENCE)
            }
            Expr::Paren(inner) => write!(f, "({})", inner),
        }
    }
}
