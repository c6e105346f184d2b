use crate::{
	common::Builtin,
	ir::semantics::{Lazy, Value},
};

/// Reduces a built-in call whose arguments are all literals.
pub fn reduce(builtin: Builtin, args: &[Lazy]) -> Option<Value> {
	let args: Vec<&Value> = args.iter().map(Lazy::force).collect();
	Some(match (builtin, args.as_slice()) {
		(Builtin::IntAdd, [Value::IntOf(a), Value::IntOf(b)]) => Value::IntOf(a.wrapping_add(*b)),
		(Builtin::IntSub, [Value::IntOf(a), Value::IntOf(b)]) => Value::IntOf(a.wrapping_sub(*b)),
		(Builtin::IntMul, [Value::IntOf(a), Value::IntOf(b)]) => Value::IntOf(a.wrapping_mul(*b)),
		(Builtin::IntDiv, [Value::IntOf(a), Value::IntOf(b)]) => Value::IntOf(a.checked_div(*b)?),
		(Builtin::IntMod, [Value::IntOf(a), Value::IntOf(b)]) => Value::IntOf(a.checked_rem(*b)?),
		(Builtin::IntEq, [Value::IntOf(a), Value::IntOf(b)]) => Value::BoolOf(a == b),
		(Builtin::IntLt, [Value::IntOf(a), Value::IntOf(b)]) => Value::BoolOf(a < b),
		(Builtin::BoolNot, [Value::BoolOf(a)]) => Value::BoolOf(!a),
		(Builtin::StringConcat, [Value::StringOf(a), Value::StringOf(b)]) => Value::StringOf(format!("{a}{b}").into()),
		_ => return None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reduces_literal_arguments() {
		let args = [Value::IntOf(40).into(), Value::IntOf(2).into()];
		assert!(matches!(reduce(Builtin::IntAdd, &args), Some(Value::IntOf(42))));
		assert!(matches!(reduce(Builtin::IntLt, &args), Some(Value::BoolOf(false))));
	}

	#[test]
	fn division_by_zero_is_stuck() {
		let args = [Value::IntOf(1).into(), Value::IntOf(0).into()];
		assert!(reduce(Builtin::IntDiv, &args).is_none());
		assert!(reduce(Builtin::IntMod, &args).is_none());
	}

	#[test]
	fn neutral_arguments_are_stuck() {
		let args = [Value::Hole.into(), Value::IntOf(0).into()];
		assert!(reduce(Builtin::IntAdd, &args).is_none());
	}
}
