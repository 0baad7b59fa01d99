// hlir.rs — High-level IR after resolve.
//
// Normalized representation consumed by the dependency analysis: ordered
// arenas of header types, instances, fields, actions, tables, conditionals
// and parse states, addressed by dense ids. Per-action read/write field
// sets are computed here, once, from the primitive registry; the control
// statements of every `control` block are flattened into an explicit
// successor relation over table/conditional nodes.
//
// Preconditions: produced from a resolved AST (resolve phase reported no
//   errors).
// Postconditions: all arenas are populated in declaration order; all field
//   sets are sorted and deduplicated; the control-flow relation has one
//   entry per control block and branches converge on the statement
//   following their conditional.
// Failure modes: none (defensively skips references resolve flagged).
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::ast;
use crate::ast::{ActionArg, ControlStmt, DeclKind, MatchKind};
use crate::id::{ActionId, CfNodeId, CondId, FieldId, HeaderTypeId, InstanceId, TableId};
use crate::primitives::Primitives;
use crate::resolve::ResolvedProgram;

// ── Arena entries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HlirHeaderType {
    pub name: String,
    /// Declared fields as (name, bit width), in declaration order.
    pub fields: Vec<(String, u32)>,
}

#[derive(Debug, Clone)]
pub struct HlirInstance {
    pub name: String,
    pub header_type: HeaderTypeId,
    pub metadata: bool,
    /// First entry of this instance's contiguous field range.
    pub first_field: FieldId,
    /// Number of data fields (excludes the validity field).
    pub field_count: u32,
    /// Synthesized 1-bit validity field, read by `valid(...)` forms.
    pub valid_field: FieldId,
}

#[derive(Debug, Clone)]
pub struct HlirField {
    pub instance: InstanceId,
    pub name: String,
    pub width: u32,
    /// Bit offset within the instance.
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct HlirAction {
    pub name: String,
    pub params: Vec<String>,
    /// Fields read by the action body. Sorted, deduplicated.
    pub reads: Vec<FieldId>,
    /// Fields written by the action body. Sorted, deduplicated.
    pub writes: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub struct HlirTableKey {
    pub field: FieldId,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone)]
pub struct HlirTable {
    pub name: String,
    pub keys: Vec<HlirTableKey>,
    pub actions: Vec<ActionId>,
    pub size: Option<u64>,
    /// Match-key field set. Sorted, deduplicated.
    pub key_reads: Vec<FieldId>,
    /// Union of the candidate actions' read sets.
    pub action_reads: Vec<FieldId>,
    /// Union of the candidate actions' write sets.
    pub action_writes: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub struct HlirConditional {
    /// Synthesized name (`_cond_0`, `_cond_1`, ...), globally unique.
    pub name: String,
    /// Re-rendered condition text for graph labels.
    pub source_text: String,
    /// Fields the boolean expression reads. Sorted, deduplicated.
    pub reads: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub struct ParseTransition {
    /// Select-case label (`0x800`, `default`); `None` for a direct return.
    pub label: Option<String>,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct HlirParseState {
    pub name: String,
    pub extracts: Vec<InstanceId>,
    pub transitions: Vec<ParseTransition>,
}

// ── Control flow ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfNodeKind {
    Table(TableId),
    Conditional(CondId),
}

/// A node in the program-order successor relation. Tables appear at most
/// once (resolve rejects re-apply); conditionals fan out to both branches.
#[derive(Debug, Clone)]
pub struct CfNode {
    pub kind: CfNodeKind,
    pub succs: Vec<CfNodeId>,
}

#[derive(Debug, Clone)]
pub struct HlirControl {
    pub name: String,
    pub entry: Option<CfNodeId>,
}

// ── Program ─────────────────────────────────────────────────────────────────

/// The immutable IR snapshot handed to the analysis core.
#[derive(Debug, Default)]
pub struct HlirProgram {
    pub header_types: Vec<HlirHeaderType>,
    pub instances: Vec<HlirInstance>,
    pub fields: Vec<HlirField>,
    pub actions: Vec<HlirAction>,
    pub tables: Vec<HlirTable>,
    pub conditionals: Vec<HlirConditional>,
    pub parse_states: Vec<HlirParseState>,
    pub controls: Vec<HlirControl>,
    pub cf_nodes: Vec<CfNode>,

    header_type_index: HashMap<String, HeaderTypeId>,
    instance_index: HashMap<String, InstanceId>,
    action_index: HashMap<String, ActionId>,
    table_index: HashMap<String, TableId>,
    field_ids: HashMap<(InstanceId, String), FieldId>,
}

impl HlirProgram {
    pub fn instance_id(&self, name: &str) -> Option<InstanceId> {
        self.instance_index.get(name).copied()
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.table_index.get(name).copied()
    }

    pub fn action_id(&self, name: &str) -> Option<ActionId> {
        self.action_index.get(name).copied()
    }

    pub fn field_id(&self, instance: &str, field: &str) -> Option<FieldId> {
        let inst = self.instance_id(instance)?;
        self.field_ids.get(&(inst, field.to_string())).copied()
    }

    pub fn field(&self, id: FieldId) -> &HlirField {
        &self.fields[id.index()]
    }

    /// Qualified `instance.field` name for labels.
    pub fn field_name(&self, id: FieldId) -> String {
        let field = self.field(id);
        let inst = &self.instances[field.instance.index()];
        format!("{}.{}", inst.name, field.name)
    }

    pub fn table(&self, id: TableId) -> &HlirTable {
        &self.tables[id.index()]
    }

    pub fn conditional(&self, id: CondId) -> &HlirConditional {
        &self.conditionals[id.index()]
    }

    pub fn cf_node(&self, id: CfNodeId) -> &CfNode {
        &self.cf_nodes[id.index()]
    }

    /// Total bit width of a table's match key.
    pub fn table_key_width(&self, id: TableId) -> u32 {
        self.table(id)
            .key_reads
            .iter()
            .map(|&f| self.field(f).width)
            .sum()
    }

    /// Total bit width of the fields a table's actions may write.
    pub fn table_action_width(&self, id: TableId) -> u32 {
        self.table(id)
            .action_writes
            .iter()
            .map(|&f| self.field(f).width)
            .sum()
    }
}

impl fmt::Display for HlirProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "HlirProgram ({} header types, {} instances, {} fields, {} actions, {} tables, {} conditionals)",
            self.header_types.len(),
            self.instances.len(),
            self.fields.len(),
            self.actions.len(),
            self.tables.len(),
            self.conditionals.len()
        )?;
        for table in &self.tables {
            writeln!(
                f,
                "  table '{}': {} key field(s), {} action(s)",
                table.name,
                table.key_reads.len(),
                table.actions.len()
            )?;
        }
        for control in &self.controls {
            writeln!(
                f,
                "  control '{}': entry {}",
                control.name,
                match control.entry {
                    Some(id) => format!("node {}", id.0),
                    None => "none".to_string(),
                }
            )?;
        }
        Ok(())
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the HLIR from a resolved program.
pub fn build_hlir(
    program: &ast::Program,
    resolved: &ResolvedProgram,
    primitives: &Primitives,
) -> HlirProgram {
    let mut builder = HlirBuilder {
        program,
        resolved,
        primitives,
        hlir: HlirProgram::default(),
    };
    builder.build_header_types();
    builder.build_instances();
    builder.build_actions();
    builder.build_tables();
    builder.build_controls();
    builder.build_parse_states();
    builder.hlir
}

// ── Internal builder ────────────────────────────────────────────────────────

struct HlirBuilder<'a> {
    program: &'a ast::Program,
    resolved: &'a ResolvedProgram,
    primitives: &'a Primitives,
    hlir: HlirProgram,
}

impl<'a> HlirBuilder<'a> {
    /// Resolution decides which declaration owns a name (the first one);
    /// HLIR construction follows that decision instead of re-deriving it.
    fn owns_name(
        resolved: &HashMap<String, crate::resolve::DeclEntry>,
        name: &str,
        decl_index: usize,
    ) -> bool {
        resolved.get(name).map(|e| e.decl_index) == Some(decl_index)
    }

    fn build_header_types(&mut self) {
        for (index, decl) in self.program.declarations.iter().enumerate() {
            if let DeclKind::HeaderType(ht) = &decl.kind {
                if !Self::owns_name(&self.resolved.header_types, &ht.name.name, index) {
                    continue; // duplicate, already diagnosed
                }
                let id = HeaderTypeId(self.hlir.header_types.len() as u32);
                self.hlir.header_type_index.insert(ht.name.name.clone(), id);
                self.hlir.header_types.push(HlirHeaderType {
                    name: ht.name.name.clone(),
                    fields: ht
                        .fields
                        .iter()
                        .map(|f| (f.name.name.clone(), f.width))
                        .collect(),
                });
            }
        }
    }

    fn build_instances(&mut self) {
        for (index, decl) in self.program.declarations.iter().enumerate() {
            if let DeclKind::Instance(inst) = &decl.kind {
                if !Self::owns_name(&self.resolved.instances, &inst.name.name, index) {
                    continue;
                }
                let ht_id = match self.hlir.header_type_index.get(&inst.header_type.name) {
                    Some(&id) => id,
                    None => continue,
                };
                let inst_id = InstanceId(self.hlir.instances.len() as u32);
                let first_field = FieldId(self.hlir.fields.len() as u32);

                let ht_fields = self.hlir.header_types[ht_id.index()].fields.clone();
                let mut offset = 0;
                for (name, width) in &ht_fields {
                    let fid = FieldId(self.hlir.fields.len() as u32);
                    self.hlir.field_ids.insert((inst_id, name.clone()), fid);
                    self.hlir.fields.push(HlirField {
                        instance: inst_id,
                        name: name.clone(),
                        width: *width,
                        offset,
                    });
                    offset += width;
                }

                let valid_field = FieldId(self.hlir.fields.len() as u32);
                self.hlir
                    .field_ids
                    .insert((inst_id, "$valid".to_string()), valid_field);
                self.hlir.fields.push(HlirField {
                    instance: inst_id,
                    name: "$valid".to_string(),
                    width: 1,
                    offset,
                });

                self.hlir.instance_index.insert(inst.name.name.clone(), inst_id);
                self.hlir.instances.push(HlirInstance {
                    name: inst.name.name.clone(),
                    header_type: ht_id,
                    metadata: inst.metadata,
                    first_field,
                    field_count: ht_fields.len() as u32,
                    valid_field,
                });
            }
        }
    }

    fn build_actions(&mut self) {
        for (index, decl) in self.program.declarations.iter().enumerate() {
            if let DeclKind::Action(a) = &decl.kind {
                if !Self::owns_name(&self.resolved.actions, &a.name.name, index) {
                    continue;
                }
                let mut reads = Vec::new();
                let mut writes = Vec::new();

                for call in &a.calls {
                    let def = match self.primitives.lookup(&call.name.name) {
                        Some(d) => d,
                        None => continue, // diagnosed during resolve
                    };
                    for (arg, prm) in call.args.iter().zip(def.params.iter()) {
                        let fid = match arg {
                            ActionArg::Field(fr) => {
                                self.hlir.field_id(&fr.instance.name, &fr.field.name)
                            }
                            _ => None,
                        };
                        if let Some(fid) = fid {
                            if prm.access.reads() {
                                reads.push(fid);
                            }
                            if prm.access.writes() {
                                writes.push(fid);
                            }
                        }
                    }
                }

                sort_dedup(&mut reads);
                sort_dedup(&mut writes);

                let id = ActionId(self.hlir.actions.len() as u32);
                self.hlir.action_index.insert(a.name.name.clone(), id);
                self.hlir.actions.push(HlirAction {
                    name: a.name.name.clone(),
                    params: a.params.iter().map(|p| p.name.clone()).collect(),
                    reads,
                    writes,
                });
            }
        }
    }

    fn build_tables(&mut self) {
        for (index, decl) in self.program.declarations.iter().enumerate() {
            if let DeclKind::Table(t) = &decl.kind {
                if !Self::owns_name(&self.resolved.tables, &t.name.name, index) {
                    continue;
                }
                let mut keys = Vec::new();
                for key in &t.reads {
                    let fid = match (&key.field, key.match_kind) {
                        (None, MatchKind::Valid) => self
                            .hlir
                            .instance_id(&key.instance.name)
                            .map(|i| self.hlir.instances[i.index()].valid_field),
                        (Some(field), _) => {
                            self.hlir.field_id(&key.instance.name, &field.name)
                        }
                        (None, _) => None,
                    };
                    if let Some(field) = fid {
                        keys.push(HlirTableKey {
                            field,
                            match_kind: key.match_kind,
                        });
                    }
                }

                let actions: Vec<ActionId> = t
                    .actions
                    .iter()
                    .filter_map(|a| self.hlir.action_id(&a.name))
                    .collect();

                let mut key_reads: Vec<FieldId> = keys.iter().map(|k| k.field).collect();
                sort_dedup(&mut key_reads);

                let mut action_reads = Vec::new();
                let mut action_writes = Vec::new();
                for &aid in &actions {
                    action_reads.extend_from_slice(&self.hlir.actions[aid.index()].reads);
                    action_writes.extend_from_slice(&self.hlir.actions[aid.index()].writes);
                }
                sort_dedup(&mut action_reads);
                sort_dedup(&mut action_writes);

                let id = TableId(self.hlir.tables.len() as u32);
                self.hlir.table_index.insert(t.name.name.clone(), id);
                self.hlir.tables.push(HlirTable {
                    name: t.name.name.clone(),
                    keys,
                    actions,
                    size: t.size.map(|(n, _)| n),
                    key_reads,
                    action_reads,
                    action_writes,
                });
            }
        }
    }

    fn build_controls(&mut self) {
        for decl in &self.program.declarations {
            if let DeclKind::Control(c) = &decl.kind {
                let (entry, _exits) = self.build_stmts(&c.body);
                self.hlir.controls.push(HlirControl {
                    name: c.name.name.clone(),
                    entry,
                });
            }
        }
    }

    /// Flatten a statement sequence into control-flow nodes.
    ///
    /// Returns the sequence's entry node and its exit set (the nodes whose
    /// successors must be linked to whatever follows the sequence).
    fn build_stmts(&mut self, stmts: &[ControlStmt]) -> (Option<CfNodeId>, Vec<CfNodeId>) {
        let mut entry = None;
        let mut exits: Vec<CfNodeId> = Vec::new();

        for stmt in stmts {
            match stmt {
                ControlStmt::Apply(table, _) => {
                    let table_id = match self.hlir.table_id(&table.name) {
                        Some(id) => id,
                        None => continue, // diagnosed during resolve
                    };
                    let node = self.add_cf_node(CfNodeKind::Table(table_id));
                    self.link(&exits, node);
                    if entry.is_none() {
                        entry = Some(node);
                    }
                    exits = vec![node];
                }
                ControlStmt::If(ifs) => {
                    let cond_id = CondId(self.hlir.conditionals.len() as u32);
                    let reads = self.condition_reads(&ifs.condition);
                    self.hlir.conditionals.push(HlirConditional {
                        name: format!("_cond_{}", cond_id.0),
                        source_text: format!("{}", ifs.condition),
                        reads,
                    });
                    let cond_node = self.add_cf_node(CfNodeKind::Conditional(cond_id));
                    self.link(&exits, cond_node);
                    if entry.is_none() {
                        entry = Some(cond_node);
                    }

                    let (then_entry, then_exits) = self.build_stmts(&ifs.then_branch);
                    let (else_entry, else_exits) = self.build_stmts(&ifs.else_branch);

                    let mut new_exits = Vec::new();
                    match then_entry {
                        Some(e) => {
                            self.hlir.cf_nodes[cond_node.index()].succs.push(e);
                            new_exits.extend(then_exits);
                        }
                        None => new_exits.push(cond_node),
                    }
                    match else_entry {
                        Some(e) => {
                            self.hlir.cf_nodes[cond_node.index()].succs.push(e);
                            new_exits.extend(else_exits);
                        }
                        None => new_exits.push(cond_node),
                    }
                    new_exits.sort();
                    new_exits.dedup();
                    exits = new_exits;
                }
            }
        }

        (entry, exits)
    }

    fn add_cf_node(&mut self, kind: CfNodeKind) -> CfNodeId {
        let id = CfNodeId(self.hlir.cf_nodes.len() as u32);
        self.hlir.cf_nodes.push(CfNode {
            kind,
            succs: Vec::new(),
        });
        id
    }

    fn link(&mut self, from: &[CfNodeId], to: CfNodeId) {
        for &node in from {
            self.hlir.cf_nodes[node.index()].succs.push(to);
        }
    }

    fn condition_reads(&self, cond: &ast::CondExpr) -> Vec<FieldId> {
        let mut reads = Vec::new();
        self.collect_condition_reads(cond, &mut reads);
        sort_dedup(&mut reads);
        reads
    }

    fn collect_condition_reads(&self, cond: &ast::CondExpr, out: &mut Vec<FieldId>) {
        match &cond.kind {
            ast::CondKind::Valid(inst) => {
                if let Some(id) = self.hlir.instance_id(&inst.name) {
                    out.push(self.hlir.instances[id.index()].valid_field);
                }
            }
            ast::CondKind::Compare { left, right, .. } => {
                if let Some(id) = self.hlir.field_id(&left.instance.name, &left.field.name) {
                    out.push(id);
                }
                if let ast::Operand::Field(fr) = right {
                    if let Some(id) = self.hlir.field_id(&fr.instance.name, &fr.field.name) {
                        out.push(id);
                    }
                }
            }
            ast::CondKind::Not(inner) => self.collect_condition_reads(inner, out),
            ast::CondKind::And(a, b) | ast::CondKind::Or(a, b) => {
                self.collect_condition_reads(a, out);
                self.collect_condition_reads(b, out);
            }
        }
    }

    fn build_parse_states(&mut self) {
        for decl in &self.program.declarations {
            if let DeclKind::Parser(p) = &decl.kind {
                let extracts: Vec<InstanceId> = p
                    .statements
                    .iter()
                    .filter_map(|s| match s {
                        ast::ParserStmt::Extract(inst) => self.hlir.instance_id(&inst.name),
                        _ => None,
                    })
                    .collect();

                let transitions = match &p.ret {
                    ast::ParserReturn::Direct(target) => vec![ParseTransition {
                        label: None,
                        target: target.name.clone(),
                    }],
                    ast::ParserReturn::Select { cases, .. } => cases
                        .iter()
                        .map(|case| ParseTransition {
                            label: Some(match &case.value {
                                ast::CaseValue::Literal(n, _) => format!("0x{n:x}"),
                                ast::CaseValue::Default(_) => "default".to_string(),
                            }),
                            target: case.target.name.clone(),
                        })
                        .collect(),
                };

                self.hlir.parse_states.push(HlirParseState {
                    name: p.name.name.clone(),
                    extracts,
                    transitions,
                });
            }
        }
    }
}

// ── Free helpers ────────────────────────────────────────────────────────────

fn sort_dedup(fields: &mut Vec<FieldId>) {
    fields.sort();
    fields.dedup();
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagLevel;

    fn hlir_from(source: &str) -> HlirProgram {
        let parse_result = crate::parser::parse(source);
        assert!(
            parse_result.errors.is_empty(),
            "parse errors: {:?}",
            parse_result.errors
        );
        let program = parse_result.program.expect("parse failed");
        let primitives = Primitives::standard();
        let resolve_result = crate::resolve::resolve(&program, &primitives);
        assert!(
            resolve_result
                .diagnostics
                .iter()
                .all(|d| d.level != DiagLevel::Error),
            "resolve errors: {:#?}",
            resolve_result.diagnostics
        );
        build_hlir(&program, &resolve_result.resolved, &primitives)
    }

    const TWO_TABLE_PROGRAM: &str = "\
header_type ipv4_t {
    fields {
        ttl : 8;
        dstAddr : 32;
    }
}
header ipv4_t ipv4;

action set_ttl(v) {
    modify_field(ipv4.ttl, v);
}
action route(addr) {
    modify_field(ipv4.dstAddr, addr);
}

table first {
    reads { ipv4.dstAddr : lpm; }
    actions { set_ttl; }
}
table second {
    reads { ipv4.ttl : exact; }
    actions { route; }
}

control ingress {
    apply(first);
    apply(second);
}
";

    #[test]
    fn fields_allocated_contiguously_with_validity() {
        let hlir = hlir_from(TWO_TABLE_PROGRAM);
        assert_eq!(hlir.instances.len(), 1);
        let inst = &hlir.instances[0];
        assert_eq!(inst.field_count, 2);
        // ttl, dstAddr, $valid
        assert_eq!(hlir.fields.len(), 3);
        assert_eq!(hlir.field(inst.valid_field).name, "$valid");
        assert_eq!(hlir.field(inst.valid_field).width, 1);
        assert_eq!(hlir.field_id("ipv4", "ttl"), Some(FieldId(0)));
        assert_eq!(hlir.field_name(FieldId(1)), "ipv4.dstAddr");
    }

    #[test]
    fn action_read_write_sets() {
        let hlir = hlir_from(TWO_TABLE_PROGRAM);
        let set_ttl = &hlir.actions[hlir.action_id("set_ttl").unwrap().index()];
        let ttl = hlir.field_id("ipv4", "ttl").unwrap();
        assert_eq!(set_ttl.writes, vec![ttl]);
        // `v` is an action parameter, not a field — no reads.
        assert!(set_ttl.reads.is_empty());
    }

    #[test]
    fn read_write_access_contributes_to_both_sets() {
        let hlir = hlir_from(
            "header_type h_t { fields { a : 8; } }\nheader h_t h;\naction bump() { add_to_field(h.a, 1); }\ntable t { actions { bump; } }\ncontrol ingress { apply(t); }",
        );
        let bump = &hlir.actions[0];
        let a = hlir.field_id("h", "a").unwrap();
        assert_eq!(bump.reads, vec![a]);
        assert_eq!(bump.writes, vec![a]);
    }

    #[test]
    fn table_aggregates_action_sets() {
        let hlir = hlir_from(TWO_TABLE_PROGRAM);
        let first = hlir.table(hlir.table_id("first").unwrap());
        let ttl = hlir.field_id("ipv4", "ttl").unwrap();
        let dst = hlir.field_id("ipv4", "dstAddr").unwrap();
        assert_eq!(first.key_reads, vec![dst]);
        assert_eq!(first.action_writes, vec![ttl]);
    }

    #[test]
    fn valid_key_reads_validity_field() {
        let hlir = hlir_from(
            "header_type h_t { fields { a : 8; } }\nheader h_t h;\naction n() { no_op(); }\ntable t { reads { h : valid; } actions { n; } }\ncontrol ingress { apply(t); }",
        );
        let t = hlir.table(hlir.table_id("t").unwrap());
        let valid = hlir.instances[0].valid_field;
        assert_eq!(t.key_reads, vec![valid]);
    }

    #[test]
    fn linear_control_flow() {
        let hlir = hlir_from(TWO_TABLE_PROGRAM);
        assert_eq!(hlir.controls.len(), 1);
        assert_eq!(hlir.cf_nodes.len(), 2);
        let entry = hlir.controls[0].entry.unwrap();
        let first_node = hlir.cf_node(entry);
        assert!(matches!(first_node.kind, CfNodeKind::Table(t) if hlir.table(t).name == "first"));
        assert_eq!(first_node.succs.len(), 1);
        let second_node = hlir.cf_node(first_node.succs[0]);
        assert!(matches!(second_node.kind, CfNodeKind::Table(t) if hlir.table(t).name == "second"));
        assert!(second_node.succs.is_empty());
    }

    #[test]
    fn conditional_branches_fan_out_and_converge() {
        let hlir = hlir_from(
            "header_type h_t { fields { a : 8; } }\nheader h_t h;\naction n() { no_op(); }\n\
             table t1 { actions { n; } }\ntable t2 { actions { n; } }\ntable t3 { actions { n; } }\n\
             control ingress {\n    if (h.a == 1) {\n        apply(t1);\n    } else {\n        apply(t2);\n    }\n    apply(t3);\n}",
        );
        // cond, t1, t2, t3
        assert_eq!(hlir.cf_nodes.len(), 4);
        assert_eq!(hlir.conditionals.len(), 1);
        let entry = hlir.controls[0].entry.unwrap();
        let cond = hlir.cf_node(entry);
        assert!(matches!(cond.kind, CfNodeKind::Conditional(_)));
        assert_eq!(cond.succs.len(), 2);
        // Both branches converge on t3.
        let t3 = hlir.table_id("t3").unwrap();
        for &branch in &cond.succs {
            let node = hlir.cf_node(branch);
            assert_eq!(node.succs.len(), 1);
            assert!(matches!(hlir.cf_node(node.succs[0]).kind,
                CfNodeKind::Table(t) if t == t3));
        }
    }

    #[test]
    fn empty_branch_exits_through_conditional() {
        let hlir = hlir_from(
            "header_type h_t { fields { a : 8; } }\nheader h_t h;\naction n() { no_op(); }\n\
             table t1 { actions { n; } }\ntable t2 { actions { n; } }\n\
             control ingress {\n    if (h.a == 1) {\n        apply(t1);\n    }\n    apply(t2);\n}",
        );
        let entry = hlir.controls[0].entry.unwrap();
        let cond = hlir.cf_node(entry);
        // Successors: t1 (then branch) and t2 (fallthrough for the empty else).
        assert_eq!(cond.succs.len(), 2);
        let t2 = hlir.table_id("t2").unwrap();
        assert!(cond
            .succs
            .iter()
            .any(|&s| matches!(hlir.cf_node(s).kind, CfNodeKind::Table(t) if t == t2)));
    }

    #[test]
    fn conditional_reads_validity_and_fields() {
        let hlir = hlir_from(
            "header_type h_t { fields { a : 8; } }\nheader h_t h;\naction n() { no_op(); }\n\
             table t1 { actions { n; } }\n\
             control ingress {\n    if (valid(h) and h.a > 3) {\n        apply(t1);\n    }\n}",
        );
        let cond = &hlir.conditionals[0];
        let a = hlir.field_id("h", "a").unwrap();
        let valid = hlir.instances[0].valid_field;
        assert_eq!(cond.reads, vec![a, valid]);
        assert!(cond.source_text.contains("valid(h)"));
    }

    #[test]
    fn parse_states_and_transitions() {
        let hlir = hlir_from(
            "header_type eth_t { fields { etherType : 16; } }\nheader eth_t eth;\n\
             parser start {\n    extract(eth);\n    return select(eth.etherType) {\n        0x800 : parse_more;\n        default : ingress;\n    }\n}\n\
             parser parse_more {\n    return ingress;\n}\n\
             control ingress { }",
        );
        assert_eq!(hlir.parse_states.len(), 2);
        let start = &hlir.parse_states[0];
        assert_eq!(start.extracts.len(), 1);
        assert_eq!(start.transitions.len(), 2);
        assert_eq!(start.transitions[0].label.as_deref(), Some("0x800"));
        assert_eq!(start.transitions[1].label.as_deref(), Some("default"));
        let more = &hlir.parse_states[1];
        assert_eq!(more.transitions[0].label, None);
        assert_eq!(more.transitions[0].target, "ingress");
    }

    #[test]
    fn key_width_sums_field_widths() {
        let hlir = hlir_from(TWO_TABLE_PROGRAM);
        assert_eq!(hlir.table_key_width(hlir.table_id("first").unwrap()), 32);
        assert_eq!(hlir.table_action_width(hlir.table_id("first").unwrap()), 8);
    }

    #[test]
    fn deterministic_construction() {
        let a = hlir_from(TWO_TABLE_PROGRAM);
        let b = hlir_from(TWO_TABLE_PROGRAM);
        assert_eq!(format!("{a}"), format!("{b}"));
        assert_eq!(a.fields.len(), b.fields.len());
        assert_eq!(a.cf_nodes.len(), b.cf_nodes.len());
    }
}
