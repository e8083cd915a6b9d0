//! Control-flow normalizer: single-statement bodies become blocks.
//!
//! After this pass every statement the instrumenter cares about is a member
//! of a statement list, so probes are only ever appended inside blocks.

use swc_core::common::{Spanned, SyntaxContext};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

#[derive(Debug, Default)]
pub struct Normalizer;

impl VisitMut for Normalizer {
    fn visit_mut_if_stmt(&mut self, n: &mut IfStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.cons);
        if let Some(alt) = &mut n.alt {
            // `else if` chains keep their shape; the nested `if` is normalized on its own.
            if !matches!(**alt, Stmt::If(_)) {
                wrap_in_block(alt);
            }
        }
    }

    fn visit_mut_for_stmt(&mut self, n: &mut ForStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_for_in_stmt(&mut self, n: &mut ForInStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_for_of_stmt(&mut self, n: &mut ForOfStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_while_stmt(&mut self, n: &mut WhileStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_do_while_stmt(&mut self, n: &mut DoWhileStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_with_stmt(&mut self, n: &mut WithStmt) {
        n.visit_mut_children_with(self);
        wrap_in_block(&mut n.body);
    }

    fn visit_mut_labeled_stmt(&mut self, n: &mut LabeledStmt) {
        n.visit_mut_children_with(self);
        // `continue label` needs the loop to stay the direct body; labeled
        // function declarations keep their legacy scoping.
        let keep = matches!(
            *n.body,
            Stmt::Block(_)
                | Stmt::Labeled(_)
                | Stmt::For(_)
                | Stmt::ForIn(_)
                | Stmt::ForOf(_)
                | Stmt::While(_)
                | Stmt::DoWhile(_)
                | Stmt::Decl(_)
        );
        if !keep {
            wrap_in_block(&mut n.body);
        }
    }
}

fn wrap_in_block(body: &mut Stmt) {
    if matches!(body, Stmt::Block(_)) {
        return;
    }
    let span = body.span();
    let inner = std::mem::replace(body, Stmt::Empty(EmptyStmt { span }));
    let stmts = match inner {
        Stmt::Empty(_) => Vec::new(),
        other => vec![other],
    };
    *body = Stmt::Block(BlockStmt {
        span,
        ctxt: SyntaxContext::empty(),
        stmts,
    });
}
