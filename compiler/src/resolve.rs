// resolve.rs — Name resolution for the P4 AST
//
// Walks the parsed AST, resolves all name references against global symbol
// tables and the primitive registry, and reports diagnostics for unknown or
// duplicate names.
//
// Preconditions: `program` is a well-formed AST from the parser.
//                `primitives` holds the merged primitive registry.
// Postconditions: returns resolution tables plus all accumulated
//                 diagnostics. Resolution continues past errors.
// Failure modes: unknown names, duplicate definitions, and constraint
//                violations produce `Diagnostic` entries.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::diag::{codes, DiagCode, DiagLevel, Diagnostic};
use crate::primitives::Primitives;

// ── Public types ────────────────────────────────────────────────────────────

/// Result of name resolution.
#[derive(Debug)]
pub struct ResolveResult {
    pub resolved: ResolvedProgram,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolution tables produced by name resolution.
/// HLIR construction uses these alongside the original AST.
#[derive(Debug, Default)]
pub struct ResolvedProgram {
    pub header_types: HashMap<String, DeclEntry>,
    pub instances: HashMap<String, DeclEntry>,
    pub actions: HashMap<String, DeclEntry>,
    pub tables: HashMap<String, DeclEntry>,
    pub parser_states: HashMap<String, DeclEntry>,
    pub controls: HashMap<String, DeclEntry>,
    /// Table name → span of its (single) apply site.
    pub applies: HashMap<String, Span>,
}

/// A declaration's position in the program plus its name span.
#[derive(Debug, Clone)]
pub struct DeclEntry {
    pub decl_index: usize,
    pub name_span: Span,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Resolve all names in a program.
pub fn resolve(program: &Program, primitives: &Primitives) -> ResolveResult {
    let mut ctx = ResolveCtx {
        program,
        primitives,
        resolved: ResolvedProgram::default(),
        diagnostics: Vec::new(),
    };
    ctx.collect_declarations();
    ctx.check_references();
    ctx.check_unapplied_tables();

    ResolveResult {
        resolved: ctx.resolved,
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

struct ResolveCtx<'a> {
    program: &'a Program,
    primitives: &'a Primitives,
    resolved: ResolvedProgram,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ResolveCtx<'a> {
    fn error(&mut self, code: DiagCode, span: Span, message: String) {
        self.diagnostics
            .push(Diagnostic::new(DiagLevel::Error, span, message).with_code(code));
    }

    fn warning(&mut self, code: DiagCode, span: Span, message: String) {
        self.diagnostics
            .push(Diagnostic::new(DiagLevel::Warning, span, message).with_code(code));
    }

    // ── Pass 1: collect declarations, detect duplicates ─────────────────

    fn collect_declarations(&mut self) {
        for (index, decl) in self.program.declarations.iter().enumerate() {
            let (table, what, code, name) = match &decl.kind {
                DeclKind::HeaderType(ht) => (
                    &mut self.resolved.header_types,
                    "header type",
                    codes::E0200,
                    &ht.name,
                ),
                DeclKind::Instance(inst) => (
                    &mut self.resolved.instances,
                    "instance",
                    codes::E0201,
                    &inst.name,
                ),
                DeclKind::Action(a) => {
                    (&mut self.resolved.actions, "action", codes::E0202, &a.name)
                }
                DeclKind::Table(t) => (&mut self.resolved.tables, "table", codes::E0203, &t.name),
                DeclKind::Parser(p) => (
                    &mut self.resolved.parser_states,
                    "parser state",
                    codes::E0204,
                    &p.name,
                ),
                DeclKind::Control(c) => (
                    &mut self.resolved.controls,
                    "control",
                    codes::E0205,
                    &c.name,
                ),
            };
            declare(&mut self.diagnostics, table, what, code, name, index);
        }
    }

    // ── Pass 2: check references ────────────────────────────────────────

    fn check_references(&mut self) {
        for decl in &self.program.declarations {
            match &decl.kind {
                DeclKind::HeaderType(_) => {}
                DeclKind::Instance(inst) => self.check_instance(inst),
                DeclKind::Parser(p) => self.check_parser(p),
                DeclKind::Action(a) => self.check_action(a),
                DeclKind::Table(t) => self.check_table(t),
                DeclKind::Control(c) => self.check_control(c),
            }
        }
    }

    fn check_instance(&mut self, inst: &InstanceDecl) {
        if !self
            .resolved
            .header_types
            .contains_key(&inst.header_type.name)
        {
            self.error(
                codes::E0210,
                inst.header_type.span,
                format!("unknown header type '{}'", inst.header_type.name),
            );
        }
    }

    fn check_parser(&mut self, p: &ParserDecl) {
        for stmt in &p.statements {
            match stmt {
                ParserStmt::Extract(inst) => self.check_instance_ref(inst),
                ParserStmt::SetMetadata { dst, value } => {
                    self.check_field_ref(dst);
                    if let ParserValue::Field(src) = value {
                        self.check_field_ref(src);
                    }
                }
            }
        }
        match &p.ret {
            ParserReturn::Direct(target) => self.check_parser_target(target),
            ParserReturn::Select { fields, cases, .. } => {
                for field in fields {
                    self.check_field_ref(field);
                }
                for case in cases {
                    self.check_parser_target(&case.target);
                }
            }
        }
    }

    /// A parser return target is another parse state or a control entry.
    fn check_parser_target(&mut self, target: &Ident) {
        if !self.resolved.parser_states.contains_key(&target.name)
            && !self.resolved.controls.contains_key(&target.name)
        {
            self.error(
                codes::E0213,
                target.span,
                format!(
                    "unknown parser return target '{}' (not a parse state or control)",
                    target.name
                ),
            );
        }
    }

    fn check_action(&mut self, a: &ActionDecl) {
        for call in &a.calls {
            let def = match self.primitives.lookup(&call.name.name) {
                Some(d) => d.clone(),
                None => {
                    self.error(
                        codes::E0220,
                        call.name.span,
                        format!("unknown primitive '{}'", call.name.name),
                    );
                    continue;
                }
            };

            if call.args.len() > def.params.len() {
                self.error(
                    codes::E0221,
                    call.span,
                    format!(
                        "primitive '{}' takes at most {} argument(s), found {}",
                        def.name,
                        def.params.len(),
                        call.args.len()
                    ),
                );
                continue;
            }

            for (arg, prm) in call.args.iter().zip(def.params.iter()) {
                match arg {
                    ActionArg::Field(fr) => self.check_field_ref(fr),
                    ActionArg::Literal(_, span) => {
                        if prm.access.writes() {
                            self.error(
                                codes::E0222,
                                *span,
                                format!(
                                    "primitive '{}' writes its '{}' argument; a literal cannot be written",
                                    def.name, prm.name
                                ),
                            );
                        }
                    }
                    ActionArg::Name(name) => {
                        if prm.access.writes() {
                            self.error(
                                codes::E0222,
                                name.span,
                                format!(
                                    "primitive '{}' writes its '{}' argument; '{}' is not a field reference",
                                    def.name, prm.name, name.name
                                ),
                            );
                        }
                    }
                }
            }
        }
    }

    fn check_table(&mut self, t: &TableDecl) {
        for key in &t.reads {
            match (key.match_kind, &key.field) {
                (MatchKind::Valid, Some(_)) => {
                    self.error(
                        codes::E0231,
                        key.span,
                        format!(
                            "valid match on '{}' must name an instance, not a field",
                            key.instance.name
                        ),
                    );
                }
                (MatchKind::Valid, None) => self.check_instance_ref(&key.instance),
                (_, None) => {
                    self.error(
                        codes::E0232,
                        key.span,
                        format!(
                            "{} match on '{}' requires a field reference",
                            key.match_kind, key.instance.name
                        ),
                    );
                }
                (_, Some(field)) => {
                    let fr = FieldRef {
                        instance: key.instance.clone(),
                        field: field.clone(),
                        span: key.span,
                    };
                    self.check_field_ref(&fr);
                }
            }
        }
        for action in &t.actions {
            if !self.resolved.actions.contains_key(&action.name) {
                self.error(
                    codes::E0233,
                    action.span,
                    format!("unknown action '{}' in table '{}'", action.name, t.name.name),
                );
            }
        }
    }

    fn check_control(&mut self, c: &ControlDecl) {
        self.check_control_stmts(&c.body);
    }

    fn check_control_stmts(&mut self, stmts: &[ControlStmt]) {
        for stmt in stmts {
            match stmt {
                ControlStmt::Apply(table, span) => {
                    if !self.resolved.tables.contains_key(&table.name) {
                        self.error(
                            codes::E0240,
                            table.span,
                            format!("unknown table '{}' in apply", table.name),
                        );
                        continue;
                    }
                    if let Some(first) = self.resolved.applies.get(&table.name) {
                        let first = *first;
                        self.diagnostics.push(
                            Diagnostic::new(
                                DiagLevel::Error,
                                *span,
                                format!("table '{}' applied more than once", table.name),
                            )
                            .with_code(codes::E0241)
                            .with_related(first, "first applied here"),
                        );
                    } else {
                        self.resolved.applies.insert(table.name.clone(), *span);
                    }
                }
                ControlStmt::If(ifs) => {
                    self.check_condition(&ifs.condition);
                    self.check_control_stmts(&ifs.then_branch);
                    self.check_control_stmts(&ifs.else_branch);
                }
            }
        }
    }

    fn check_condition(&mut self, cond: &CondExpr) {
        match &cond.kind {
            CondKind::Valid(inst) => self.check_instance_ref(inst),
            CondKind::Compare { left, right, .. } => {
                self.check_field_ref(left);
                if let Operand::Field(fr) = right {
                    self.check_field_ref(fr);
                }
            }
            CondKind::Not(inner) => self.check_condition(inner),
            CondKind::And(a, b) | CondKind::Or(a, b) => {
                self.check_condition(a);
                self.check_condition(b);
            }
        }
    }

    // ── Reference helpers ───────────────────────────────────────────────

    fn check_instance_ref(&mut self, inst: &Ident) {
        if !self.resolved.instances.contains_key(&inst.name) {
            self.error(
                codes::E0211,
                inst.span,
                format!("unknown instance '{}'", inst.name),
            );
        }
    }

    fn check_field_ref(&mut self, fr: &FieldRef) {
        let entry = match self.resolved.instances.get(&fr.instance.name) {
            Some(e) => e.clone(),
            None => {
                self.error(
                    codes::E0211,
                    fr.instance.span,
                    format!("unknown instance '{}'", fr.instance.name),
                );
                return;
            }
        };

        // Instance → header type → declared field.
        let inst_decl = match &self.program.declarations[entry.decl_index].kind {
            DeclKind::Instance(i) => i,
            _ => return,
        };
        let ht_entry = match self.resolved.header_types.get(&inst_decl.header_type.name) {
            Some(e) => e,
            None => return, // already reported by check_instance
        };
        let ht = match &self.program.declarations[ht_entry.decl_index].kind {
            DeclKind::HeaderType(ht) => ht,
            _ => return,
        };
        if !ht.fields.iter().any(|f| f.name.name == fr.field.name) {
            self.error(
                codes::E0212,
                fr.field.span,
                format!(
                    "header type '{}' has no field '{}' (referenced as '{}')",
                    ht.name.name, fr.field.name, fr
                ),
            );
        }
    }

    // ── Post pass ───────────────────────────────────────────────────────

    fn check_unapplied_tables(&mut self) {
        let mut unapplied: Vec<(String, Span)> = self
            .resolved
            .tables
            .iter()
            .filter(|(name, _)| !self.resolved.applies.contains_key(*name))
            .map(|(name, entry)| (name.clone(), entry.name_span))
            .collect();
        unapplied.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, span) in unapplied {
            self.warning(
                codes::W0250,
                span,
                format!("table '{}' is never applied", name),
            );
        }
    }
}

// ── Free helpers ────────────────────────────────────────────────────────────

/// Record a declaration, reporting a duplicate if the name is taken.
fn declare(
    diagnostics: &mut Vec<Diagnostic>,
    table: &mut HashMap<String, DeclEntry>,
    what: &str,
    code: DiagCode,
    name: &Ident,
    decl_index: usize,
) {
    if let Some(first) = table.get(&name.name) {
        diagnostics.push(
            Diagnostic::new(
                DiagLevel::Error,
                name.span,
                format!("duplicate {} '{}'", what, name.name),
            )
            .with_code(code)
            .with_related(first.name_span, "first declared here"),
        );
        return;
    }
    table.insert(
        name.name.clone(),
        DeclEntry {
            decl_index,
            name_span: name.span,
        },
    );
}

// ── Tests ───────────────────────────────────────────────────────────────────
