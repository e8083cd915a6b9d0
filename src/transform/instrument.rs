//! Instrumentation pass: inserts recorder calls after statements and at
//! function entry.
//!
//! Positions are looked up from the node spans in the original source map,
//! so they survive any earlier rewrite (type stripping included) untouched.
//! Bindings are passed as an object of getters; a binding that is not yet
//! initialized at runtime throws inside its own getter only.

use serde::{Deserialize, Serialize};
use swc_core::common::{sync::Lrc, SourceMap, Span, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use crate::transform::scope::{binding_names, ScopeKind, ScopeStack};

/// Global entry point instrumented code calls for every step.
pub const RECORD_FN: &str = "__stepwiseRecord";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Function entry; captures parameters only.
    Entry,
    /// After an executed statement; captures everything in scope.
    Statement,
    /// Before an implicit-return arrow body evaluates.
    ImplicitReturn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSite {
    pub kind: ProbeKind,
    pub line: usize,
    pub column: usize,
    pub names: Vec<String>,
}

pub struct Instrumenter {
    cm: Lrc<SourceMap>,
    file_id: String,
    scopes: ScopeStack,
    probes: Vec<ProbeSite>,
}

impl Instrumenter {
    pub fn new(cm: Lrc<SourceMap>, file_id: impl Into<String>) -> Self {
        Self {
            cm,
            file_id: file_id.into(),
            scopes: ScopeStack::default(),
            probes: Vec::new(),
        }
    }

    pub fn into_probes(self) -> Vec<ProbeSite> {
        self.probes
    }

    /// Builds a recorder call for `span`, or `None` for synthesized nodes.
    fn probe(&mut self, kind: ProbeKind, span: Span, names: Vec<String>) -> Option<Expr> {
        if span.is_dummy() {
            return None;
        }
        let loc = self.cm.lookup_char_pos(span.lo);
        let (line, column) = (loc.line, loc.col.0);
        let call = record_call(
            line,
            column,
            &names,
            kind == ProbeKind::ImplicitReturn,
            &self.file_id,
        );
        self.probes.push(ProbeSite {
            kind,
            line,
            column,
            names,
        });
        Some(call)
    }

    fn statement_probe(&mut self, span: Span) -> Option<Stmt> {
        let names = self.scopes.visible();
        self.probe(ProbeKind::Statement, span, names)
            .map(expr_stmt)
    }

    fn declare_var_decl(&mut self, decl: &VarDecl) {
        for name in binding_names(decl) {
            match decl.kind {
                VarDeclKind::Var => self.scopes.declare_var(&name),
                VarDeclKind::Let | VarDeclKind::Const => self.scopes.declare(&name),
            }
        }
    }

    /// Registers the names a just-executed statement introduced and returns
    /// the probe that follows it, if the statement is a step point.
    fn after_stmt(&mut self, stmt: &Stmt) -> Option<Stmt> {
        match stmt {
            Stmt::Decl(Decl::Var(decl)) => {
                self.declare_var_decl(decl);
                if decl.declare {
                    return None;
                }
                self.statement_probe(decl.span)
            }
            Stmt::Expr(expr) if !is_string_literal(&expr.expr) => self.statement_probe(expr.span),
            _ => None,
        }
    }

    fn after_module_item(&mut self, item: &ModuleItem) -> Option<Stmt> {
        match item {
            ModuleItem::Stmt(stmt) => self.after_stmt(stmt),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
                span,
                decl: Decl::Var(decl),
            })) => {
                self.declare_var_decl(decl);
                self.statement_probe(*span)
            }
            _ => None,
        }
    }

    fn instrument_body(&mut self, fn_span: Span, params: Vec<String>, body: &mut BlockStmt) {
        let entry = self.probe(ProbeKind::Entry, fn_span, params);
        body.visit_mut_with(self);
        if let Some(entry) = entry {
            let at = directive_len(&body.stmts);
            body.stmts.insert(at, expr_stmt(entry));
        }
    }

    fn for_head_scope(&mut self, head: &ForHead) {
        if let ForHead::VarDecl(decl) = head {
            self.declare_var_decl(decl);
        }
    }
}

impl VisitMut for Instrumenter {
    fn visit_mut_module(&mut self, module: &mut Module) {
        self.scopes.push(ScopeKind::Function);
        let mut out = Vec::with_capacity(module.body.len() * 2 + 1);
        for mut item in module.body.drain(..) {
            item.visit_mut_with(self);
            let probe = self.after_module_item(&item);
            out.push(item);
            if let Some(probe) = probe {
                out.push(ModuleItem::Stmt(probe));
            }
        }
        self.scopes.pop();

        let at = out
            .iter()
            .take_while(|item| matches!(item, ModuleItem::Stmt(s) if is_directive(s)))
            .count();
        out.insert(at, ModuleItem::Stmt(fallback_header()));
        module.body = out;
    }

    fn visit_mut_script(&mut self, script: &mut Script) {
        self.scopes.push(ScopeKind::Function);
        script.body.visit_mut_with(self);
        self.scopes.pop();

        let at = directive_len(&script.body);
        script.body.insert(at, fallback_header());
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        let prologue = directive_len(stmts);
        let mut out = Vec::with_capacity(stmts.len() * 2);
        for (idx, mut stmt) in stmts.drain(..).enumerate() {
            stmt.visit_mut_with(self);
            let probe = if idx < prologue {
                None
            } else {
                self.after_stmt(&stmt)
            };
            out.push(stmt);
            if let Some(probe) = probe {
                out.push(probe);
            }
        }
        *stmts = out;
    }

    fn visit_mut_block_stmt(&mut self, block: &mut BlockStmt) {
        self.scopes.push(ScopeKind::Block);
        block.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_function(&mut self, function: &mut Function) {
        let params = binding_names(&function.params);
        self.scopes.push_function(&params);
        function.decorators.visit_mut_with(self);
        function.params.visit_mut_with(self);
        if let Some(body) = &mut function.body {
            self.instrument_body(function.span, params, body);
        }
        self.scopes.pop();
    }

    fn visit_mut_constructor(&mut self, ctor: &mut Constructor) {
        let params = binding_names(&ctor.params);
        self.scopes.push_function(&params);
        ctor.params.visit_mut_with(self);
        if let Some(body) = &mut ctor.body {
            self.instrument_body(ctor.span, params, body);
        }
        self.scopes.pop();
    }

    fn visit_mut_arrow_expr(&mut self, arrow: &mut ArrowExpr) {
        let params = binding_names(&arrow.params);
        self.scopes.push_function(&params);
        arrow.params.visit_mut_with(self);
        match &mut *arrow.body {
            BlockStmtOrExpr::BlockStmt(body) => self.instrument_body(arrow.span, params, body),
            BlockStmtOrExpr::Expr(expr) => {
                let call = self.probe(ProbeKind::ImplicitReturn, arrow.span, params);
                expr.visit_mut_with(self);
                if let Some(call) = call {
                    let original = std::mem::replace(expr, Box::new(Expr::Invalid(Invalid { span: DUMMY_SP })));
                    *expr = Box::new(Expr::Paren(ParenExpr {
                        span: DUMMY_SP,
                        expr: Box::new(Expr::Seq(SeqExpr {
                            span: DUMMY_SP,
                            exprs: vec![Box::new(call), original],
                        })),
                    }));
                }
            }
        }
        self.scopes.pop();
    }

    fn visit_mut_getter_prop(&mut self, getter: &mut GetterProp) {
        self.scopes.push(ScopeKind::Function);
        getter.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_setter_prop(&mut self, setter: &mut SetterProp) {
        let params = binding_names(&*setter.param);
        self.scopes.push_function(&params);
        setter.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_for_stmt(&mut self, n: &mut ForStmt) {
        self.scopes.push(ScopeKind::Block);
        if let Some(VarDeclOrExpr::VarDecl(decl)) = &n.init {
            self.declare_var_decl(decl);
        }
        n.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_for_in_stmt(&mut self, n: &mut ForInStmt) {
        self.scopes.push(ScopeKind::Block);
        self.for_head_scope(&n.left);
        n.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_for_of_stmt(&mut self, n: &mut ForOfStmt) {
        self.scopes.push(ScopeKind::Block);
        self.for_head_scope(&n.left);
        n.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_catch_clause(&mut self, n: &mut CatchClause) {
        self.scopes.push(ScopeKind::Block);
        if let Some(param) = &n.param {
            for name in binding_names(param) {
                self.scopes.declare(&name);
            }
        }
        n.visit_mut_children_with(self);
        self.scopes.pop();
    }

    fn visit_mut_switch_stmt(&mut self, n: &mut SwitchStmt) {
        n.discriminant.visit_mut_with(self);
        self.scopes.push(ScopeKind::Block);
        n.cases.visit_mut_with(self);
        self.scopes.pop();
    }
}

fn ident(name: &str) -> Ident {
    Ident::new(name.into(), DUMMY_SP, SyntaxContext::empty())
}

fn num(value: usize) -> Box<Expr> {
    Box::new(Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value: value as f64,
        raw: None,
    })))
}

fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

/// `{ get a() { return a; }, ... }`
fn bindings_object(names: &[String]) -> Expr {
    let props = names
        .iter()
        .map(|name| {
            PropOrSpread::Prop(Box::new(Prop::Getter(GetterProp {
                span: DUMMY_SP,
                key: PropName::Ident(IdentName::new(name.as_str().into(), DUMMY_SP)),
                type_ann: None,
                body: Some(BlockStmt {
                    span: DUMMY_SP,
                    ctxt: SyntaxContext::empty(),
                    stmts: vec![Stmt::Return(ReturnStmt {
                        span: DUMMY_SP,
                        arg: Some(Box::new(Expr::Ident(ident(name)))),
                    })],
                }),
            })))
        })
        .collect();
    Expr::Object(ObjectLit {
        span: DUMMY_SP,
        props,
    })
}

/// `__stepwiseRecord(line, column, { getters }, isReturnPosition, "file")`
fn record_call(line: usize, column: usize, names: &[String], return_position: bool, file_id: &str) -> Expr {
    let arg = |expr: Box<Expr>| ExprOrSpread { spread: None, expr };
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        callee: Callee::Expr(Box::new(Expr::Ident(ident(RECORD_FN)))),
        args: vec![
            arg(num(line)),
            arg(num(column)),
            arg(Box::new(bindings_object(names))),
            arg(Box::new(Expr::Lit(Lit::Bool(Bool {
                span: DUMMY_SP,
                value: return_position,
            })))),
            arg(Box::new(Expr::Lit(Lit::Str(Str {
                span: DUMMY_SP,
                value: file_id.into(),
                raw: None,
            })))),
        ],
        type_args: None,
    })
}

/// `var __stepwiseRecord = globalThis.__stepwiseRecord || function () {};`
///
/// Keeps an instrumented file runnable when the runtime prelude is absent.
fn fallback_header() -> Stmt {
    let noop = Expr::Fn(FnExpr {
        ident: None,
        function: Box::new(Function {
            params: Vec::new(),
            decorators: Vec::new(),
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            body: Some(BlockStmt {
                span: DUMMY_SP,
                ctxt: SyntaxContext::empty(),
                stmts: Vec::new(),
            }),
            is_generator: false,
            is_async: false,
            type_params: None,
            return_type: None,
        }),
    });
    let global = Expr::Member(MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(Expr::Ident(ident("globalThis"))),
        prop: MemberProp::Ident(IdentName::new(RECORD_FN.into(), DUMMY_SP)),
    });
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent {
                id: ident(RECORD_FN),
                type_ann: None,
            }),
            init: Some(Box::new(Expr::Bin(BinExpr {
                span: DUMMY_SP,
                op: BinaryOp::LogicalOr,
                left: Box::new(global),
                right: Box::new(noop),
            }))),
            definite: false,
        }],
    })))
}

fn is_string_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Lit(Lit::Str(_)))
}

fn is_directive(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(ExprStmt { expr, .. }) if is_string_literal(expr))
}

fn directive_len(stmts: &[Stmt]) -> usize {
    stmts.iter().take_while(|s| is_directive(s)).count()
}
