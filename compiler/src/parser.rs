// Parser for P4 source files.
//
// Parses a token stream (from the lexer) into an AST covering the supported
// P4-14 subset. Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a P4 source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

/// Join two spans into one covering both.
fn join_spans(a: Span, b: Span) -> Span {
    (a.start()..b.end()).into()
}

// ── Main parser builder ──
//
// All grammar rules are built inside `program_parser` so that the `source`
// reference is captured once and shared by all combinators. This avoids
// complex lifetime annotations on per-rule helper functions.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Number ──

    let number = select! {
        Token::Number(n) = e => (n, e.span()),
    };

    // ── Field reference: IDENT '.' IDENT ──

    let field_ref = ident
        .clone()
        .then_ignore(just(Token::Dot))
        .then(ident.clone())
        .map_with(|(instance, field), e| FieldRef {
            instance,
            field,
            span: e.span(),
        });

    // ── header_type NAME { fields { f : w; ... } } ──

    let field_decl = ident
        .clone()
        .then_ignore(just(Token::Colon))
        .then(number.clone())
        .then_ignore(just(Token::Semi))
        .map_with(|(name, (width, _)), e| FieldDecl {
            name,
            width: width as u32,
            span: e.span(),
        });

    let header_type_decl = just(Token::HeaderType)
        .ignore_then(ident.clone())
        .then(
            just(Token::Fields)
                .ignore_then(
                    field_decl
                        .repeated()
                        .at_least(1)
                        .collect::<Vec<_>>()
                        .delimited_by(just(Token::LBrace), just(Token::RBrace)),
                )
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, fields)| DeclKind::HeaderType(HeaderTypeDecl { name, fields }));

    // ── header TYPE NAME; / metadata TYPE NAME; ──

    let instance_decl = just(Token::Header)
        .to(false)
        .or(just(Token::Metadata).to(true))
        .then(ident.clone())
        .then(ident.clone())
        .then_ignore(just(Token::Semi))
        .map(|((metadata, header_type), name)| {
            DeclKind::Instance(InstanceDecl {
                header_type,
                name,
                metadata,
            })
        });

    // ── parser STATE { ... } ──

    let parser_value = number
        .clone()
        .map(|(n, span)| ParserValue::Literal(n, span))
        .or(field_ref.clone().map(ParserValue::Field));

    let extract_stmt = just(Token::Extract)
        .ignore_then(
            ident
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(just(Token::Semi))
        .map(ParserStmt::Extract);

    let set_metadata_stmt = just(Token::SetMetadata)
        .ignore_then(
            field_ref
                .clone()
                .then_ignore(just(Token::Comma))
                .then(parser_value)
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(just(Token::Semi))
        .map(|(dst, value)| ParserStmt::SetMetadata { dst, value });

    let parser_stmt = extract_stmt.or(set_metadata_stmt);

    let select_case = number
        .clone()
        .map(|(n, span)| CaseValue::Literal(n, span))
        .or(just(Token::Default).map_with(|_, e| CaseValue::Default(e.span())))
        .then_ignore(just(Token::Colon))
        .then(ident.clone())
        .then_ignore(just(Token::Semi))
        .map_with(|(value, target), e| SelectCase {
            value,
            target,
            span: e.span(),
        });

    let select_return = just(Token::Select)
        .ignore_then(
            field_ref
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(
            select_case
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map_with(|(fields, cases), e| ParserReturn::Select {
            fields,
            cases,
            span: e.span(),
        });

    let parser_return = just(Token::Return).ignore_then(
        select_return.or(ident
            .clone()
            .then_ignore(just(Token::Semi))
            .map(ParserReturn::Direct)),
    );

    let parser_decl = just(Token::Parser)
        .ignore_then(ident.clone())
        .then(
            parser_stmt
                .repeated()
                .collect::<Vec<_>>()
                .then(parser_return)
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, (statements, ret))| {
            DeclKind::Parser(ParserDecl {
                name,
                statements,
                ret,
            })
        });

    // ── action NAME(params) { prim(args); ... } ──

    let action_arg = number
        .clone()
        .map(|(n, span)| ActionArg::Literal(n, span))
        .or(ident
            .clone()
            .then(just(Token::Dot).ignore_then(ident.clone()).or_not())
            .map_with(|(instance, field), e| match field {
                Some(field) => ActionArg::Field(FieldRef {
                    instance,
                    field,
                    span: e.span(),
                }),
                None => ActionArg::Name(instance),
            }));

    let primitive_call = ident
        .clone()
        .then(
            action_arg
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then_ignore(just(Token::Semi))
        .map_with(|(name, args), e| PrimitiveCall {
            name,
            args,
            span: e.span(),
        });

    let action_decl = just(Token::Action)
        .ignore_then(ident.clone())
        .then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(
            primitive_call
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|((name, params), calls)| {
            DeclKind::Action(ActionDecl {
                name,
                params,
                calls,
            })
        });

    // ── table NAME { reads {...} actions {...} size : N; } ──

    let match_kind = ident
        .clone()
        .try_map(|id, span| match id.name.as_str() {
            "exact" => Ok(MatchKind::Exact),
            "ternary" => Ok(MatchKind::Ternary),
            "lpm" => Ok(MatchKind::Lpm),
            "range" => Ok(MatchKind::Range),
            _ => Err(Rich::custom(
                span,
                format!(
                    "expected match kind (exact, ternary, lpm, range, valid), found '{}'",
                    id.name
                ),
            )),
        })
        .or(just(Token::Valid).to(MatchKind::Valid));

    let table_key = ident
        .clone()
        .then(just(Token::Dot).ignore_then(ident.clone()).or_not())
        .then_ignore(just(Token::Colon))
        .then(match_kind)
        .then_ignore(just(Token::Semi))
        .map_with(|((instance, field), match_kind), e| TableKey {
            instance,
            field,
            match_kind,
            span: e.span(),
        });

    let reads_block = just(Token::Reads).ignore_then(
        table_key
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace)),
    );

    let actions_block = just(Token::Actions).ignore_then(
        ident
            .clone()
            .then_ignore(just(Token::Semi))
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace)),
    );

    let size_entry = just(Token::Size)
        .ignore_then(just(Token::Colon))
        .ignore_then(number.clone())
        .then_ignore(just(Token::Semi));

    let table_decl = just(Token::Table)
        .ignore_then(ident.clone())
        .then(
            reads_block
                .or_not()
                .then(actions_block)
                .then(size_entry.or_not())
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, ((reads, actions), size))| {
            DeclKind::Table(TableDecl {
                name,
                reads: reads.unwrap_or_default(),
                actions,
                size,
            })
        });

    // ── Conditions ──

    let cond_expr = recursive(|cond| {
        let valid_cond = just(Token::Valid)
            .ignore_then(
                ident
                    .clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map_with(|inst, e| CondExpr {
                kind: CondKind::Valid(inst),
                span: e.span(),
            });

        let operand = number
            .clone()
            .map(|(n, span)| Operand::Literal(n, span))
            .or(field_ref.clone().map(Operand::Field));

        let cmp_op = choice((
            just(Token::EqEq).to(CompareOp::Eq),
            just(Token::NotEq).to(CompareOp::Ne),
            just(Token::Le).to(CompareOp::Le),
            just(Token::Ge).to(CompareOp::Ge),
            just(Token::Lt).to(CompareOp::Lt),
            just(Token::Gt).to(CompareOp::Gt),
        ));

        let compare = field_ref
            .clone()
            .then(cmp_op)
            .then(operand)
            .map_with(|((left, op), right), e| CondExpr {
                kind: CondKind::Compare { left, op, right },
                span: e.span(),
            });

        let parens = cond
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = valid_cond.or(compare).or(parens);

        let negated = just(Token::Not)
            .ignore_then(atom.clone())
            .map_with(|inner, e| CondExpr {
                kind: CondKind::Not(Box::new(inner)),
                span: e.span(),
            })
            .or(atom);

        let conjunction =
            negated
                .clone()
                .foldl(just(Token::And).ignore_then(negated).repeated(), |a, b| {
                    let span = join_spans(a.span, b.span);
                    CondExpr {
                        kind: CondKind::And(Box::new(a), Box::new(b)),
                        span,
                    }
                });

        conjunction.clone().foldl(
            just(Token::Or).ignore_then(conjunction).repeated(),
            |a, b| {
                let span = join_spans(a.span, b.span);
                CondExpr {
                    kind: CondKind::Or(Box::new(a), Box::new(b)),
                    span,
                }
            },
        )
    });

    // ── control NAME { apply(t); if (cond) {...} else {...} } ──

    let control_stmt = recursive(|stmt| {
        let apply_stmt = just(Token::Apply)
            .ignore_then(
                ident
                    .clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then_ignore(just(Token::Semi))
            .map_with(|table, e| ControlStmt::Apply(table, e.span()));

        let block = stmt
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        let if_stmt = just(Token::If)
            .ignore_then(
                cond_expr
                    .clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .then(just(Token::Else).ignore_then(block).or_not())
            .map_with(|((condition, then_branch), else_branch), e| {
                ControlStmt::If(IfStmt {
                    condition,
                    then_branch,
                    else_branch: else_branch.unwrap_or_default(),
                    span: e.span(),
                })
            });

        apply_stmt.or(if_stmt)
    });

    let control_decl = just(Token::Control)
        .ignore_then(ident.clone())
        .then(
            control_stmt
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map(|(name, body)| DeclKind::Control(ControlDecl { name, body }));

    // ── Declaration dispatch ──

    let declaration = choice((
        header_type_decl,
        instance_decl,
        parser_decl,
        action_decl,
        table_decl,
        control_decl,
    ))
    .map_with(|kind, e| Declaration {
        kind,
        span: e.span(),
    });

    // ── Program ──

    declaration
        .repeated()
        .collect::<Vec<_>>()
        .map_with(move |declarations, e| Program {
            declarations,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.program.expect("expected program")
    }

    #[test]
    fn header_type_with_fields() {
        let prog = parse_ok(
            "header_type ethernet_t {\n    fields {\n        dstAddr : 48;\n        srcAddr : 48;\n        etherType : 16;\n    }\n}",
        );
        assert_eq!(prog.declarations.len(), 1);
        match &prog.declarations[0].kind {
            DeclKind::HeaderType(ht) => {
                assert_eq!(ht.name.name, "ethernet_t");
                assert_eq!(ht.fields.len(), 3);
                assert_eq!(ht.fields[0].name.name, "dstAddr");
                assert_eq!(ht.fields[0].width, 48);
            }
            other => panic!("expected HeaderType, got {:?}", other),
        }
    }

    #[test]
    fn header_and_metadata_instances() {
        let prog = parse_ok("header ethernet_t ethernet;\nmetadata meta_t meta;");
        assert_eq!(prog.declarations.len(), 2);
        match (&prog.declarations[0].kind, &prog.declarations[1].kind) {
            (DeclKind::Instance(h), DeclKind::Instance(m)) => {
                assert!(!h.metadata);
                assert!(m.metadata);
                assert_eq!(h.header_type.name, "ethernet_t");
                assert_eq!(m.name.name, "meta");
            }
            other => panic!("expected two instances, got {:?}", other),
        }
    }

    #[test]
    fn parser_state_with_select() {
        let prog = parse_ok(
            "parser start {\n    extract(ethernet);\n    return select(ethernet.etherType) {\n        0x800 : parse_ipv4;\n        default : ingress;\n    }\n}",
        );
        match &prog.declarations[0].kind {
            DeclKind::Parser(p) => {
                assert_eq!(p.name.name, "start");
                assert_eq!(p.statements.len(), 1);
                match &p.ret {
                    ParserReturn::Select { fields, cases, .. } => {
                        assert_eq!(fields.len(), 1);
                        assert_eq!(cases.len(), 2);
                        assert!(matches!(cases[0].value, CaseValue::Literal(0x800, _)));
                        assert!(matches!(cases[1].value, CaseValue::Default(_)));
                        assert_eq!(cases[1].target.name, "ingress");
                    }
                    other => panic!("expected Select, got {:?}", other),
                }
            }
            other => panic!("expected Parser, got {:?}", other),
        }
    }

    #[test]
    fn parser_state_direct_return() {
        let prog = parse_ok("parser parse_ipv4 {\n    extract(ipv4);\n    return ingress;\n}");
        match &prog.declarations[0].kind {
            DeclKind::Parser(p) => {
                assert!(matches!(&p.ret, ParserReturn::Direct(t) if t.name == "ingress"));
            }
            other => panic!("expected Parser, got {:?}", other),
        }
    }

    #[test]
    fn action_with_params_and_calls() {
        let prog = parse_ok(
            "action set_port(port) {\n    modify_field(standard_metadata.egress_spec, port);\n    count(port_counter, 0);\n}",
        );
        match &prog.declarations[0].kind {
            DeclKind::Action(a) => {
                assert_eq!(a.name.name, "set_port");
                assert_eq!(a.params.len(), 1);
                assert_eq!(a.calls.len(), 2);
                assert_eq!(a.calls[0].name.name, "modify_field");
                assert!(matches!(&a.calls[0].args[0], ActionArg::Field(f)
                    if f.instance.name == "standard_metadata" && f.field.name == "egress_spec"));
                assert!(matches!(&a.calls[0].args[1], ActionArg::Name(n) if n.name == "port"));
                assert!(matches!(&a.calls[1].args[1], ActionArg::Literal(0, _)));
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn table_with_reads_actions_size() {
        let prog = parse_ok(
            "table forward {\n    reads {\n        ethernet.dstAddr : exact;\n        ipv4 : valid;\n    }\n    actions {\n        set_port;\n        drop_packet;\n    }\n    size : 1024;\n}",
        );
        match &prog.declarations[0].kind {
            DeclKind::Table(t) => {
                assert_eq!(t.name.name, "forward");
                assert_eq!(t.reads.len(), 2);
                assert_eq!(t.reads[0].match_kind, MatchKind::Exact);
                assert_eq!(t.reads[0].field.as_ref().unwrap().name, "dstAddr");
                assert_eq!(t.reads[1].match_kind, MatchKind::Valid);
                assert!(t.reads[1].field.is_none());
                assert_eq!(t.actions.len(), 2);
                assert_eq!(t.size.map(|(n, _)| n), Some(1024));
            }
            other => panic!("expected Table, got {:?}", other),
        }
    }

    #[test]
    fn table_without_reads() {
        let prog = parse_ok("table always {\n    actions {\n        nop;\n    }\n}");
        match &prog.declarations[0].kind {
            DeclKind::Table(t) => {
                assert!(t.reads.is_empty());
                assert!(t.size.is_none());
            }
            other => panic!("expected Table, got {:?}", other),
        }
    }

    #[test]
    fn control_with_nested_if() {
        let prog = parse_ok(
            "control ingress {\n    apply(first);\n    if (valid(ipv4) and ipv4.ttl > 1) {\n        apply(route);\n        if (meta.flag == 1) {\n            apply(extra);\n        }\n    } else {\n        apply(fallback);\n    }\n}",
        );
        match &prog.declarations[0].kind {
            DeclKind::Control(c) => {
                assert_eq!(c.body.len(), 2);
                assert!(matches!(&c.body[0], ControlStmt::Apply(t, _) if t.name == "first"));
                match &c.body[1] {
                    ControlStmt::If(ifs) => {
                        assert!(matches!(ifs.condition.kind, CondKind::And(_, _)));
                        assert_eq!(ifs.then_branch.len(), 2);
                        assert_eq!(ifs.else_branch.len(), 1);
                        assert!(matches!(&ifs.then_branch[1], ControlStmt::If(_)));
                    }
                    other => panic!("expected If, got {:?}", other),
                }
            }
            other => panic!("expected Control, got {:?}", other),
        }
    }

    #[test]
    fn condition_display_round_trip() {
        let prog = parse_ok(
            "control ingress {\n    if (not (valid(ipv4)) or ipv4.ttl == 0) {\n        apply(t);\n    }\n}",
        );
        match &prog.declarations[0].kind {
            DeclKind::Control(c) => match &c.body[0] {
                ControlStmt::If(ifs) => {
                    let rendered = format!("{}", ifs.condition);
                    assert!(rendered.contains("valid(ipv4)"), "rendered: {rendered}");
                    assert!(rendered.contains("ipv4.ttl == 0"), "rendered: {rendered}");
                }
                other => panic!("expected If, got {:?}", other),
            },
            other => panic!("expected Control, got {:?}", other),
        }
    }

    #[test]
    fn syntax_error_reported() {
        let result = parse("table { }");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn bad_match_kind_reported() {
        let result = parse(
            "table t {\n    reads { ethernet.dstAddr : fuzzy; }\n    actions { nop; }\n}",
        );
        assert!(!result.errors.is_empty());
        let msg = format!("{:?}", result.errors);
        assert!(msg.contains("match kind"), "errors: {msg}");
    }

    #[test]
    fn empty_program_parses() {
        let prog = parse_ok("");
        assert!(prog.declarations.is_empty());
    }
}
