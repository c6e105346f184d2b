use std::collections::BTreeMap;

use lasso::Rodeo;
use mcx::{
	common::{Level, Phase, Range},
	ir::{semantics::Value, syntax::Term},
	op::{evaluate::Evaluate as _, meta::Metacontext, unevaluate::Unevaluate as _},
};

use crate::common::elaborate_source;

const SOURCE: &str = "
builtin def int_add : func(a : Int, b : Int) -> Int;
const def twice : func(f : func(n : Int) -> Int, x : Int) -> Int = func(f, x) => f(f(x));
const def inc : func(n : Int) -> Int = func(n) => int_add(n, 1);
const def two : Int = twice(inc, 0);
const def pick : func(n : Int) -> Int = func(n) => match n { 0 => 1, m => int_add(m, m) };
const def point : Compound { x : Int, y : Int } = let p = { x: 1, y: 2 }; { x: p.y, y: p.x };
";

#[test]
fn normal_forms_are_stable() {
	let (elaborated, _) = elaborate_source(SOURCE, "semantics");
	assert!(elaborated.failed.is_empty());
	for definition in &elaborated.module.definitions {
		let Some(body) = &definition.body else { continue };
		let normal = body.evaluate(Phase::Const).unevaluate(Phase::Const);
		assert_eq!(normal.evaluate(Phase::Const).unevaluate(Phase::Const), normal);
	}
}

#[test]
fn compile_time_applications_reduce() {
	let (elaborated, interner) = elaborate_source(SOURCE, "semantics");
	let two = elaborated.module.get(interner.get("two").unwrap()).unwrap();
	assert_eq!(two.body.as_ref().unwrap().evaluate(Phase::Const).unevaluate(Phase::Const), Term::IntOf(2));
}

#[test]
fn zonking_is_idempotent() {
	let mut metas = Metacontext::new();
	let solved = metas.fresh_type_value(Level(0), Range::new(0, 1));
	let unsolved = metas.fresh_type_value(Level(0), Range::new(2, 3));
	assert!(metas.unify(Level(0), &solved, &Value::List(Value::Int.into())));

	let mut interner = Rodeo::new();
	let (a, b) = (interner.get_or_intern("a"), interner.get_or_intern("b"));
	let term = Term::Compound(vec![(a, solved.unevaluate(Phase::Const)), (b, unsolved.unevaluate(Phase::Const))]);
	let mut first = BTreeMap::new();
	let once = metas.zonk(Level(0), &term, &mut first);
	let mut second = BTreeMap::new();
	assert_eq!(metas.zonk(Level(0), &once, &mut second), once);
	assert_eq!(first, second);
	assert_eq!(first.values().copied().collect::<Vec<_>>(), [Range::new(2, 3)]);

	let Term::Compound(fields) = &once else { panic!("expected a compound type") };
	assert_eq!(fields[0].1, Term::List(Term::Int.into()));
	assert!(matches!(fields[1].1, Term::Meta { .. }));
}

#[test]
fn subtyping_is_reflexive() {
	let (elaborated, _) = elaborate_source(SOURCE, "semantics");
	let mut metas = Metacontext::new();
	for definition in &elaborated.module.definitions {
		let ty = definition.ty.evaluate(Phase::Const);
		assert!(metas.sub(Level(0), &ty, &ty));
	}
}
