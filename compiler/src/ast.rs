// AST node types for the supported P4-14 subset.
//
// One struct per grammar rule; every node carries a `SimpleSpan` for error
// reporting in downstream phases.
//
// Preconditions: produced by the parser from a valid or partially-valid
//   token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use std::fmt;

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete P4 program: a sequence of top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub span: Span,
}

/// A top-level declaration with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    HeaderType(HeaderTypeDecl),
    Instance(InstanceDecl),
    Parser(ParserDecl),
    Action(ActionDecl),
    Table(TableDecl),
    Control(ControlDecl),
}

// ── header_type NAME { fields { f : width; ... } } ──

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderTypeDecl {
    pub name: Ident,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub width: u32,
    pub span: Span,
}

// ── header TYPE NAME; / metadata TYPE NAME; ──

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDecl {
    pub header_type: Ident,
    pub name: Ident,
    /// True for `metadata`, false for `header`.
    pub metadata: bool,
}

// ── parser STATE { statements... return ...; } ──

#[derive(Debug, Clone, PartialEq)]
pub struct ParserDecl {
    pub name: Ident,
    pub statements: Vec<ParserStmt>,
    pub ret: ParserReturn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserStmt {
    /// `extract(instance);`
    Extract(Ident),
    /// `set_metadata(dst, value);`
    SetMetadata { dst: FieldRef, value: ParserValue },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserValue {
    Literal(u64, Span),
    Field(FieldRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserReturn {
    /// `return target;` — next state or a control entry point.
    Direct(Ident),
    /// `return select(f, ...) { value : target; default : target; }`
    Select {
        fields: Vec<FieldRef>,
        cases: Vec<SelectCase>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCase {
    pub value: CaseValue,
    pub target: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseValue {
    Literal(u64, Span),
    Default(Span),
}

// ── action NAME(params) { prim(args); ... } ──

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub calls: Vec<PrimitiveCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveCall {
    pub name: Ident,
    pub args: Vec<ActionArg>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionArg {
    /// `instance.field`
    Field(FieldRef),
    /// Integer literal.
    Literal(u64, Span),
    /// Bare identifier: an action parameter or an opaque object name
    /// (register, counter). Disambiguated during resolution.
    Name(Ident),
}

// ── table NAME { reads {...} actions {...} size : N; } ──

#[derive(Debug, Clone, PartialEq)]
pub struct TableDecl {
    pub name: Ident,
    pub reads: Vec<TableKey>,
    pub actions: Vec<Ident>,
    pub size: Option<(u64, Span)>,
}

/// One `reads` entry: `target : match_kind;`. The target is an instance
/// name (for `valid` keys) optionally followed by `.field`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableKey {
    pub instance: Ident,
    pub field: Option<Ident>,
    pub match_kind: MatchKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Ternary,
    Lpm,
    Range,
    Valid,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::Ternary => "ternary",
            MatchKind::Lpm => "lpm",
            MatchKind::Range => "range",
            MatchKind::Valid => "valid",
        };
        write!(f, "{s}")
    }
}

// ── control NAME { apply(t); if (cond) { ... } else { ... } } ──

#[derive(Debug, Clone, PartialEq)]
pub struct ControlDecl {
    pub name: Ident,
    pub body: Vec<ControlStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlStmt {
    Apply(Ident, Span),
    If(IfStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: CondExpr,
    pub then_branch: Vec<ControlStmt>,
    pub else_branch: Vec<ControlStmt>,
    pub span: Span,
}

// ── Conditions ──

#[derive(Debug, Clone, PartialEq)]
pub struct CondExpr {
    pub kind: CondKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondKind {
    /// `valid(instance)`
    Valid(Ident),
    /// `instance.field OP operand`
    Compare {
        left: FieldRef,
        op: CompareOp,
        right: Operand,
    },
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(u64, Span),
    Field(FieldRef),
}

// ── Field reference: instance.field ──

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub instance: Ident,
    pub field: Ident,
    pub span: Span,
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Condition rendering ──
//
// Conditions are re-rendered from the AST for graph labels, so the label
// text stays stable under whitespace and comment changes in the source.

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.instance.name, self.field.name)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(n, _) => write!(f, "{n}"),
            Operand::Field(r) => write!(f, "{r}"),
        }
    }
}

impl fmt::Display for CondExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CondKind::Valid(inst) => write!(f, "valid({})", inst.name),
            CondKind::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            CondKind::Not(inner) => write!(f, "not ({inner})"),
            CondKind::And(a, b) => write!(f, "({a}) and ({b})"),
            CondKind::Or(a, b) => write!(f, "({a}) or ({b})"),
        }
    }
}
