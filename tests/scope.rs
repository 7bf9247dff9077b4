//! Binding environment and delayed substitutions.

use cpsgraph::ast::DeclId;
use cpsgraph::ir::block::BlockId;
use cpsgraph::ir::types::Literal;
use cpsgraph::lower::{Attr, Binding, Continuation, Residual, Scope, Subst};

#[test]
fn test_enter_exit_and_lookup_by_position() {
    let mut scope = Scope::new();
    scope.enter(DeclId(0), Attr::literal(Literal::i32(3)));
    scope.enter_null(DeclId(1));
    assert_eq!(scope.len(), 2);
    assert!(!scope.is_null(0));
    assert!(scope.is_null(1), "function binders start opaque");
    assert_eq!(scope.var(1).and_then(|b| b.decl), Some(DeclId(1)));

    scope.exit();
    assert_eq!(scope.len(), 1);
    assert!(scope.var(1).is_none());
}

#[test]
fn test_rebind_keeps_declaration() {
    let mut scope = Scope::null(2);
    scope.enter_null(DeclId(5));
    scope.rebind(2, Attr::literal(Literal::bool(true)));

    let binding = scope.var(2).unwrap();
    assert_eq!(binding.decl, Some(DeclId(5)));
    assert_eq!(
        binding.attr.as_ref().and_then(|a| a.residual.clone()),
        Some(Residual::Literal(Literal::bool(true)))
    );
    assert!(scope.is_null(0));
}

#[test]
fn test_cloned_scope_is_independent() {
    let mut scope = Scope::new();
    scope.enter_null(DeclId(0));
    let snapshot = scope.clone();

    scope.rebind(0, Attr::poison());
    scope.enter_null(DeclId(1));

    assert!(snapshot.is_null(0), "snapshot must not observe later rebinding");
    assert_eq!(snapshot.len(), 1);
}

#[test]
fn test_substitution_counts_applied_arguments() {
    let mut scope = Scope::null(3);
    let mut subst = scope.substitution();
    assert_eq!(subst.len(), 3);
    assert_eq!(subst.num_subst_vars(), 0);

    subst.push(Binding {
        decl: Some(DeclId(9)),
        attr: Some(Attr::literal(Literal::i32(1))),
    });
    assert_eq!(subst.num_subst_vars(), 1);
    assert_eq!(subst.applied().count(), 1);
    assert_eq!(subst.applied().next().and_then(|b| b.decl), Some(DeclId(9)));

    // Forcing a type under a substitution starts from its bindings.
    let forced = Scope::from_subst(&subst);
    assert_eq!(forced.len(), 4);
    assert_eq!(forced.continuation(), None);

    scope.exit();
    assert_eq!(Subst::null(2).len(), scope.len());
}

#[test]
fn test_continuation_swap_returns_previous() {
    let mut scope = Scope::new();
    assert_eq!(scope.set_continuation(Some(Continuation::Return)), None);
    let prev = scope.set_continuation(Some(Continuation::Block(BlockId(4))));
    assert_eq!(prev, Some(Continuation::Return));
    assert_eq!(scope.continuation(), Some(Continuation::Block(BlockId(4))));
}
