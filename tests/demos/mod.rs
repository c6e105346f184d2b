use mcx::{
	common::Phase,
	ir::{diagnostic::DiagnosticKind, syntax::Term},
	op::{evaluate::Evaluate as _, unevaluate::Unevaluate as _},
};

use crate::common::{pass_frontend, pass_frontend_directory};

/// Ensures all demos are accepted by the elaborator.
#[test]
fn run_demos() { pass_frontend_directory("demos"); }

#[test]
fn compile_time_definitions_reduce() {
	let (elaborated, interner) = pass_frontend("demos/arithmetic.mcx".into());
	let sixteen = elaborated.module.get(interner.get("sixteen").unwrap()).unwrap();
	let value = sixteen.body.as_ref().unwrap().evaluate(Phase::Const);
	assert_eq!(value.unevaluate(Phase::Const), Term::IntOf(16));
}

#[test]
fn deprecated_references_only_warn() {
	let (elaborated, _) = pass_frontend("demos/annotations.mcx".into());
	assert!(elaborated.diagnostics.iter().any(|(_, diagnostic)| matches!(diagnostic.kind, DiagnosticKind::Deprecated(_))));
}
