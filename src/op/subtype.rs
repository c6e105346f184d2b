use crate::{
	common::Level,
	ir::semantics::Value,
	op::{evaluate::Telescope, meta::Metacontext},
};

impl Metacontext {
	/// Decides whether `left` is a subtype of `right`, solving metavariables along the way.
	pub fn sub(&mut self, level: Level, left: &Value, right: &Value) -> bool {
		use Value as V;
		let left = self.force(left);
		let right = self.force(right);
		match (&left, &right) {
			(V::Meta { .. }, _) | (_, V::Meta { .. }) => self.unify(level, &left, &right),
			(V::Hole, _) | (_, V::Hole) => true,

			(V::List(l), V::List(r)) => self.sub(level, l.force(), r.force()),

			// Width and depth subtyping: extra keys on the left are forgotten.
			(V::Compound(l), V::Compound(r)) => r.iter().all(|(name, r)| match l.iter().find(|(key, _)| key == name) {
				Some((_, l)) => self.sub(level, l.force(), r.force()),
				None => false,
			}),

			(V::Point(..), V::Point(..)) => self.unify(level, &left, &right),
			(V::Union(elements, _), _) => elements.iter().all(|element| self.sub(level, element.force(), &right)),
			(_, V::Union(elements, _)) => elements.iter().any(|element| self.sub(level, &left, element.force())),
			(V::Point(_, element_ty), _) => self.sub(level, element_ty.force(), &right),

			(V::Func { open: lo, params: lp, result: lr }, V::Func { open: ro, params: rp, result: rr }) => {
				if lo != ro || lp.len() != rp.len() {
					return false;
				}
				let mut left = Telescope::new(lp, lr);
				let mut right = Telescope::new(rp, rr);
				let mut level = level;
				while let (Some(l), Some(r)) = (left.next_type(), right.next_type()) {
					let binders = |telescope: &Telescope| telescope.binder().map(|binder| binder.binders());
					if binders(&left) != binders(&right) || !self.sub(level, &r, &l) {
						return false;
					}
					let mut right_level = level;
					right.open(&mut right_level);
					left.open(&mut level);
				}
				self.sub(level, &left.result(), &right.result())
			}

			(V::Code(l), V::Code(r)) | (V::Path(l), V::Path(r)) => self.sub(level, l.force(), r.force()),

			_ => self.unify(level, &left, &right),
		}
	}
}

#[cfg(test)]
mod tests {
	use lasso::Rodeo;

	use super::*;
	use crate::{
		common::Repr,
		ir::semantics::{Lazy, Value as V},
	};

	#[test]
	fn compound_with_extra_keys_is_a_subtype() {
		let mut interner = Rodeo::new();
		let (a, b) = (interner.get_or_intern("a"), interner.get_or_intern("b"));
		let wide = V::Compound([(a, Lazy::from(V::Int)), (b, Lazy::from(V::String))].into());
		let narrow = V::Compound([(a, Lazy::from(V::Int))].into());
		let mut metas = Metacontext::new();
		assert!(metas.sub(Level(0), &wide, &narrow));
		assert!(!metas.sub(Level(0), &narrow, &wide));
	}

	#[test]
	fn point_is_a_subtype_of_its_element_type() {
		let point = V::Point(V::IntOf(3).into(), V::Int.into());
		let mut metas = Metacontext::new();
		assert!(metas.sub(Level(0), &point, &V::Int));
		assert!(!metas.sub(Level(0), &V::Int, &point));
	}

	#[test]
	fn union_members_are_subtypes() {
		let union = V::Union([Lazy::from(V::Int), Lazy::from(V::String)].into(), V::tag(Repr::Int).into());
		let mut metas = Metacontext::new();
		assert!(metas.sub(Level(0), &V::Int, &union));
		assert!(!metas.sub(Level(0), &union, &V::Int));
	}

	#[test]
	fn metavariables_are_solved_by_unification() {
		let mut metas = Metacontext::new();
		let meta = metas.fresh_type_value(Level(0), Default::default());
		assert!(metas.sub(Level(0), &V::Int, &meta));
		assert!(matches!(metas.force(&meta), V::Int));
	}
}
