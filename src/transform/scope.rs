//! Lexical scope tracking for the instrumenter.
//!
//! Names enter a scope only once the statement declaring them has been
//! passed, so a probe never reads a binding before it is definitely
//! assigned. `var` names go to the nearest function scope.

use swc_core::ecma::ast::Ident;
use swc_core::ecma::utils::find_pat_ids;
use swc_core::ecma::visit::VisitWith;

/// Implicit "all arguments" binding; never captured.
const ARGUMENTS: &str = "arguments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Block,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    names: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            names: Vec::new(),
        });
    }

    pub fn push_function(&mut self, params: &[String]) {
        self.push(ScopeKind::Function);
        for name in params {
            self.declare(name);
        }
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare a lexical (`let`/`const`/param/catch) name in the innermost scope.
    pub fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            insert_unique(&mut scope.names, name);
        }
    }

    /// Declare a `var` name in the nearest function scope.
    pub fn declare_var(&mut self, name: &str) {
        if let Some(scope) = self
            .scopes
            .iter_mut()
            .rev()
            .find(|s| s.kind == ScopeKind::Function)
        {
            insert_unique(&mut scope.names, name);
        }
    }

    /// Every binding currently visible, outermost scope first, in declaration order.
    pub fn visible(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for scope in &self.scopes {
            for name in &scope.names {
                insert_unique(&mut out, name);
            }
        }
        out
    }
}

fn insert_unique(names: &mut Vec<String>, name: &str) {
    if name == ARGUMENTS || names.iter().any(|n| n == name) {
        return;
    }
    names.push(name.to_string());
}

/// Binding names introduced by a pattern-bearing node (params, declarators,
/// destructuring), in source order. Default-value expressions are skipped.
pub fn binding_names<N>(node: &N) -> Vec<String>
where
    N: VisitWith<swc_core::ecma::utils::DestructuringFinder<Ident>>,
{
    find_pat_ids::<_, Ident>(node)
        .into_iter()
        .map(|id| id.sym.to_string())
        .filter(|name| name != ARGUMENTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_lands_in_function_scope_and_lexicals_in_block() {
        let mut scopes = ScopeStack::default();
        scopes.push_function(&["a".to_string()]);
        scopes.push(ScopeKind::Block);
        scopes.declare("inner");
        scopes.declare_var("hoisted");
        assert_eq!(scopes.visible(), vec!["a", "hoisted", "inner"]);
        scopes.pop();
        assert_eq!(scopes.visible(), vec!["a", "hoisted"]);
    }

    #[test]
    fn shadowed_names_are_reported_once() {
        let mut scopes = ScopeStack::default();
        scopes.push_function(&["x".to_string()]);
        scopes.push(ScopeKind::Block);
        scopes.declare("x");
        scopes.declare("y");
        assert_eq!(scopes.visible(), vec!["x", "y"]);
    }

    #[test]
    fn arguments_is_never_declared() {
        let mut scopes = ScopeStack::default();
        scopes.push_function(&["arguments".to_string(), "b".to_string()]);
        assert_eq!(scopes.visible(), vec!["b"]);
    }
}
