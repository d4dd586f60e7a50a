//! Expression values as access chains.
//!
//! An [`Expr`] describes how to reach a value rather than the value itself:
//! a base id (usually an `OpVariable` pointer or an already-computed
//! composite) plus an ordered path of member, index, swizzle and cast
//! operations. The chain is only materialized into instructions when a
//! value is required ([`Frontend::access_chain_load`]) or assigned
//! ([`Frontend::access_chain_store`]); until then member accesses, swizzles
//! and casts on constants fold without emitting anything.

use super::token::SourceLocation;
use super::Frontend;
use crate::back::spv::{Instruction, Section};
use crate::{BaseType, Constant, Qualifiers, Type};
use arrayvec::ArrayVec;
use spirv::{Op, StorageClass, Word};

/// One step along an access chain. Every step records the type it produces
/// so materialization never has to re-derive intermediate types.
#[derive(Clone, Debug)]
pub(crate) enum ChainOp {
    Member { index: u32, to: Type },
    StaticIndex { index: u32, to: Type },
    DynamicIndex { id: Word, to: Type },
    Swizzle {
        offsets: ArrayVec<u8, 4>,
        from: Type,
        to: Type,
    },
    Cast { from: Type, to: Type },
}

impl ChainOp {
    const fn to(&self) -> &Type {
        match *self {
            ChainOp::Member { ref to, .. }
            | ChainOp::StaticIndex { ref to, .. }
            | ChainOp::DynamicIndex { ref to, .. }
            | ChainOp::Swizzle { ref to, .. }
            | ChainOp::Cast { ref to, .. } => to,
        }
    }
}

/// An in-flight expression.
#[derive(Clone, Debug)]
pub(crate) struct Expr {
    pub base: Word,
    /// Type of `base` itself, before any chain operation applies.
    pub base_ty: Type,
    /// Type after all chain operations, i.e. what loading would produce.
    pub ty: Type,
    pub location: SourceLocation,
    pub is_lvalue: bool,
    pub is_constant: bool,
    pub constant: Constant,
    /// Storage class of the base pointer when `is_lvalue`.
    pub class: StorageClass,
    pub chain: Vec<ChainOp>,
}

impl Default for Expr {
    fn default() -> Self {
        Expr {
            base: 0,
            base_ty: Type::VOID,
            ty: Type::VOID,
            location: SourceLocation::default(),
            is_lvalue: false,
            is_constant: false,
            constant: Constant::default(),
            class: StorageClass::Function,
            chain: vec![],
        }
    }
}

impl Expr {
    pub fn reset_to_lvalue(&mut self, id: Word, ty: Type, location: SourceLocation, class: StorageClass) {
        *self = Expr {
            base: id,
            base_ty: ty,
            ty,
            location,
            is_lvalue: true,
            class,
            ..Expr::default()
        };
    }

    pub fn reset_to_rvalue(&mut self, id: Word, ty: Type, location: SourceLocation) {
        *self = Expr {
            base: id,
            base_ty: ty,
            ty,
            location,
            ..Expr::default()
        };
    }

    pub fn reset_to_rvalue_constant(&mut self, ty: Type, location: SourceLocation, constant: Constant) {
        *self = Expr {
            base_ty: ty,
            ty,
            location,
            is_constant: true,
            constant,
            ..Expr::default()
        };
    }

    /// Step into a struct member.
    pub fn add_member_access(&mut self, index: u32, ty: Type) {
        if self.is_constant {
            self.constant = self
                .constant
                .elements
                .get(index as usize)
                .cloned()
                .unwrap_or_default();
        } else {
            self.chain.push(ChainOp::Member { index, to: ty });
        }
        self.ty = ty;
    }

    /// Step into an array element, matrix column or vector lane with a
    /// constant index.
    pub fn add_static_index_access(&mut self, index: u32) {
        let to = element_after_index(&self.ty);
        if self.is_constant {
            if self.ty.is_array() {
                self.constant = self
                    .constant
                    .elements
                    .get(index as usize)
                    .cloned()
                    .unwrap_or_default();
            } else if self.ty.is_matrix() {
                let mut folded = Constant::default();
                for row in 0..self.ty.rows {
                    folded.data[row as usize] =
                        self.constant.data[(index * self.ty.rows + row) as usize];
                }
                self.constant = folded;
            } else {
                self.constant = Constant::from_uint(self.constant.data[index as usize]);
            }
            self.ty = to;
            return;
        }
        // Indexing the result of a swizzle selects from the swizzle itself.
        if let Some(ChainOp::Swizzle { offsets, to: swizzle_to, .. }) = self.chain.last_mut() {
            if swizzle_to.is_vector() {
                let offset = offsets[index as usize];
                offsets.clear();
                offsets.push(offset);
                *swizzle_to = Type::scalar(swizzle_to.base);
                self.ty = *swizzle_to;
                return;
            }
        }
        self.chain.push(ChainOp::StaticIndex { index, to });
        self.ty = to;
    }

    /// Step into an element with an index computed at runtime. Constant
    /// bases must be materialized into rvalues before calling this.
    pub fn add_dynamic_index_access(&mut self, id: Word) {
        let to = element_after_index(&self.ty);
        self.chain.push(ChainOp::DynamicIndex { id, to });
        self.ty = to;
    }

    /// Append a swizzle. Swizzling a swizzle composes the offset tables;
    /// matrix swizzles encode each component as `row * 4 + col`.
    pub fn add_swizzle_access(&mut self, offsets: &[u8]) {
        let from = self.ty;
        let to = Type {
            base: from.base,
            rows: offsets.len() as u32,
            cols: 1,
            ..Type::default()
        };
        if self.is_constant {
            let mut folded = Constant::default();
            for (lane, &offset) in offsets.iter().enumerate() {
                let source = if from.is_matrix() {
                    (offset as u32 / 4) * from.rows + offset as u32 % 4
                } else {
                    offset as u32
                };
                folded.data[lane] = self.constant.data[source as usize];
            }
            self.constant = folded;
            self.ty = to;
            return;
        }
        if let Some(ChainOp::Swizzle {
            offsets: previous,
            to: previous_to,
            from: _,
        }) = self.chain.last_mut()
        {
            if previous_to.is_vector() || previous_to.is_scalar() {
                let composed: ArrayVec<u8, 4> = offsets
                    .iter()
                    .map(|&offset| previous[offset as usize])
                    .collect();
                *previous = composed;
                *previous_to = to;
                self.ty = to;
                return;
            }
        }
        self.chain.push(ChainOp::Swizzle {
            offsets: offsets.iter().copied().collect(),
            from,
            to,
        });
        self.ty = to;
    }

    /// Append a pending cast, folding immediately on constants. Only the
    /// last chain operation may be a cast; consecutive casts merge.
    pub fn add_cast_operation(&mut self, target: Type) {
        if self.ty.base == target.base
            && self.ty.rows == target.rows
            && self.ty.cols == target.cols
            && self.ty.array_length == target.array_length
        {
            let qualifiers = self.ty.qualifiers | target.qualifiers;
            self.ty = target.with_qualifiers(qualifiers);
            return;
        }
        if self.is_constant {
            if self.ty.is_array() || target.is_array() {
                let element_target = target.element_type();
                for element in &mut self.constant.elements {
                    // Array casts convert each element in place.
                    *element = cast_constant(element, &self.ty.element_type(), &element_target);
                }
            } else {
                self.constant = cast_constant(&self.constant, &self.ty, &target);
            }
            let qualifiers = self.ty.qualifiers | target.qualifiers;
            self.ty = target.with_qualifiers(qualifiers);
            return;
        }
        let from = match self.chain.last() {
            Some(&ChainOp::Cast { from, .. }) => {
                self.chain.pop();
                from
            }
            _ => self.ty,
        };
        let qualifiers = self.ty.qualifiers | target.qualifiers;
        if from.base != target.base
            || from.rows != target.rows
            || from.cols != target.cols
        {
            self.chain.push(ChainOp::Cast { from, to: target });
        }
        self.ty = target.with_qualifiers(qualifiers);
    }

    /// Whether the chain ends in a pending cast, which rules out stores.
    pub fn has_cast(&self) -> bool {
        matches!(self.chain.last(), Some(&ChainOp::Cast { .. }))
    }
}

const fn element_after_index(ty: &Type) -> Type {
    if ty.is_array() {
        let mut element = *ty;
        element.array_length = 0;
        element.qualifiers = Qualifiers::empty();
        element
    } else if ty.cols > 1 {
        Type::vector(ty.base, ty.rows)
    } else {
        Type::scalar(ty.base)
    }
}

/// Convert a constant between numeric types: per-lane base conversion plus
/// scalar broadcast or lane truncation.
fn cast_constant(constant: &Constant, from: &Type, to: &Type) -> Constant {
    let mut result = Constant::default();
    for lane in 0..to.components() as usize {
        let source = if from.is_scalar() { 0 } else { lane };
        let bits = constant.data[source];
        result.data[lane] = match (from.base, to.base) {
            (BaseType::Int, BaseType::Float) => (bits as i32 as f32).to_bits(),
            (BaseType::Uint, BaseType::Float) => (bits as f32).to_bits(),
            (BaseType::Bool, BaseType::Float) => {
                if bits != 0 { 1.0f32.to_bits() } else { 0 }
            }
            (BaseType::Float, BaseType::Int) => f32::from_bits(bits) as i32 as u32,
            (BaseType::Float, BaseType::Uint) => f32::from_bits(bits) as u32,
            (BaseType::Float, BaseType::Bool) => (f32::from_bits(bits) != 0.0) as u32,
            (BaseType::Int | BaseType::Uint, BaseType::Bool) => (bits != 0) as u32,
            (BaseType::Bool, BaseType::Int | BaseType::Uint) => (bits != 0) as u32,
            _ => bits,
        };
    }
    result
}

impl Frontend {
    /// Type of the value reached after the first `count` chain operations.
    fn type_after(exp: &Expr, count: usize) -> Type {
        match count {
            0 => exp.base_ty,
            n => *exp.chain[n - 1].to(),
        }
    }

    /// Length of the leading chain prefix that an `OpAccessChain` can
    /// express, and the collected index operands.
    fn pointer_prefix(&mut self, exp: &Expr) -> (usize, Vec<Word>) {
        let mut indices = vec![];
        let mut count = 0;
        for op in &exp.chain {
            match *op {
                ChainOp::Member { index, .. } | ChainOp::StaticIndex { index, .. } => {
                    indices.push(self.writer.get_index_constant(index));
                }
                ChainOp::DynamicIndex { id, .. } => indices.push(id),
                _ => break,
            }
            count += 1;
        }
        (count, indices)
    }

    /// Materialize the chain into a value id.
    ///
    /// Constants short-circuit to an interned constant. For lvalues the
    /// member/index prefix becomes one `OpAccessChain` plus `OpLoad`; any
    /// remaining swizzles and casts apply to the loaded value.
    pub(crate) fn access_chain_load(&mut self, section: &mut Section, exp: &Expr) -> Word {
        if exp.is_constant {
            return self.writer.get_constant(&exp.ty, &exp.constant);
        }

        let mut consumed = 0;
        let mut current_ty;
        let mut value;
        if exp.is_lvalue {
            let (count, indices) = self.pointer_prefix(exp);
            consumed = count;
            current_ty = Self::type_after(exp, consumed);
            let mut pointer = exp.base;
            if !indices.is_empty() {
                let pointer_type_id = self.writer.get_pointer_type_id(&current_ty, exp.class);
                let id = self.writer.make_id();
                section.push(Instruction::access_chain(
                    pointer_type_id,
                    id,
                    exp.base,
                    &indices,
                ));
                pointer = id;
            }
            let type_id = self.writer.get_type_id(&current_ty);
            let id = self.writer.make_id();
            section.push(Instruction::load(type_id, id, pointer));
            value = id;
        } else {
            current_ty = exp.base_ty;
            value = exp.base;
        }

        for op in &exp.chain[consumed..] {
            match *op {
                ChainOp::Member { index, ref to } | ChainOp::StaticIndex { index, ref to } => {
                    let type_id = self.writer.get_type_id(to);
                    let id = self.writer.make_id();
                    section.push(Instruction::composite_extract(type_id, id, value, &[index]));
                    value = id;
                    current_ty = *to;
                }
                ChainOp::DynamicIndex { id: index_id, ref to } => {
                    if current_ty.is_vector() {
                        let type_id = self.writer.get_type_id(to);
                        let id = self.writer.make_id();
                        section.push(Instruction::vector_extract_dynamic(
                            type_id, id, value, index_id,
                        ));
                        value = id;
                    } else {
                        // Arrays and matrices cannot be indexed dynamically
                        // by value; spill into a temporary variable first.
                        let function = match self.current_function {
                            Some(function) => function,
                            None => return value,
                        };
                        let variable =
                            self.writer.define_local_variable(function, &current_ty, None);
                        section.push(Instruction::store(variable, value));
                        let pointer_type_id = self
                            .writer
                            .get_pointer_type_id(to, StorageClass::Function);
                        let pointer = self.writer.make_id();
                        section.push(Instruction::access_chain(
                            pointer_type_id,
                            pointer,
                            variable,
                            &[index_id],
                        ));
                        let type_id = self.writer.get_type_id(to);
                        let id = self.writer.make_id();
                        section.push(Instruction::load(type_id, id, pointer));
                        value = id;
                    }
                    current_ty = *to;
                }
                ChainOp::Swizzle {
                    ref offsets,
                    ref from,
                    ref to,
                } => {
                    value = self.load_swizzle(section, value, offsets, from, to);
                    current_ty = *to;
                }
                ChainOp::Cast { ref from, ref to } => {
                    value = self.apply_cast(section, value, from, to);
                    current_ty = *to;
                }
            }
        }
        value
    }

    fn load_swizzle(
        &mut self,
        section: &mut Section,
        value: Word,
        offsets: &[u8],
        from: &Type,
        to: &Type,
    ) -> Word {
        let scalar = Type::scalar(from.base);
        if from.is_matrix() {
            let scalar_type_id = self.writer.get_type_id(&scalar);
            let mut lanes = ArrayVec::<Word, 4>::new();
            for &offset in offsets {
                let id = self.writer.make_id();
                section.push(Instruction::composite_extract(
                    scalar_type_id,
                    id,
                    value,
                    &[offset as u32 / 4, offset as u32 % 4],
                ));
                lanes.push(id);
            }
            if lanes.len() == 1 {
                return lanes[0];
            }
            let type_id = self.writer.get_type_id(to);
            let id = self.writer.make_id();
            section.push(Instruction::composite_construct(type_id, id, &lanes));
            id
        } else if offsets.len() == 1 {
            let type_id = self.writer.get_type_id(&scalar);
            let id = self.writer.make_id();
            section.push(Instruction::composite_extract(
                type_id,
                id,
                value,
                &[offsets[0] as u32],
            ));
            id
        } else {
            let components: Vec<Word> = offsets.iter().map(|&offset| offset as u32).collect();
            let type_id = self.writer.get_type_id(to);
            let id = self.writer.make_id();
            section.push(Instruction::vector_shuffle(
                type_id, id, value, value, &components,
            ));
            id
        }
    }

    /// Store `value` through the chain. The caller has already verified the
    /// target is a mutable lvalue without a pending cast, and has cast
    /// `value` to the chain's result type.
    pub(crate) fn access_chain_store(
        &mut self,
        section: &mut Section,
        exp: &Expr,
        value: Word,
        _value_ty: &Type,
    ) {
        let (consumed, indices) = self.pointer_prefix(exp);
        let pointed_ty = Self::type_after(exp, consumed);
        let mut pointer = exp.base;
        if !indices.is_empty() {
            let pointer_type_id = self.writer.get_pointer_type_id(&pointed_ty, exp.class);
            let id = self.writer.make_id();
            section.push(Instruction::access_chain(
                pointer_type_id,
                id,
                exp.base,
                &indices,
            ));
            pointer = id;
        }

        match &exp.chain[consumed..] {
            [] => section.push(Instruction::store(pointer, value)),
            [ChainOp::Swizzle { offsets, from, .. }] => {
                let scalar = Type::scalar(from.base);
                if from.is_matrix() {
                    let scalar_type_id = self.writer.get_type_id(&scalar);
                    let pointer_type_id =
                        self.writer.get_pointer_type_id(&scalar, exp.class);
                    for (lane, &offset) in offsets.iter().enumerate() {
                        let component = if offsets.len() > 1 {
                            let id = self.writer.make_id();
                            section.push(Instruction::composite_extract(
                                scalar_type_id,
                                id,
                                value,
                                &[lane as u32],
                            ));
                            id
                        } else {
                            value
                        };
                        let column = self.writer.get_index_constant(offset as u32 / 4);
                        let row = self.writer.get_index_constant(offset as u32 % 4);
                        let id = self.writer.make_id();
                        section.push(Instruction::access_chain(
                            pointer_type_id,
                            id,
                            pointer,
                            &[column, row],
                        ));
                        section.push(Instruction::store(id, component));
                    }
                } else if offsets.len() == 1 {
                    let pointer_type_id =
                        self.writer.get_pointer_type_id(&scalar, exp.class);
                    let index = self.writer.get_index_constant(offsets[0] as u32);
                    let id = self.writer.make_id();
                    section.push(Instruction::access_chain(
                        pointer_type_id,
                        id,
                        pointer,
                        &[index],
                    ));
                    section.push(Instruction::store(id, value));
                } else {
                    // Rewrite only the written lanes, preserving the rest.
                    let vector_type_id = self.writer.get_type_id(from);
                    let old = self.writer.make_id();
                    section.push(Instruction::load(vector_type_id, old, pointer));
                    let components: Vec<Word> = (0..from.rows)
                        .map(|lane| {
                            match offsets.iter().position(|&offset| offset as u32 == lane) {
                                Some(written) => from.rows + written as u32,
                                None => lane,
                            }
                        })
                        .collect();
                    let shuffled = self.writer.make_id();
                    section.push(Instruction::vector_shuffle(
                        vector_type_id,
                        shuffled,
                        old,
                        value,
                        &components,
                    ));
                    section.push(Instruction::store(pointer, shuffled));
                }
            }
            _ => {
                debug_assert!(false, "store through an unsupported chain suffix");
                section.push(Instruction::store(pointer, value));
            }
        }
    }

    /// Emit the conversion of `value` from one numeric type to another.
    pub(crate) fn apply_cast(
        &mut self,
        section: &mut Section,
        value: Word,
        from: &Type,
        to: &Type,
    ) -> Word {
        if from.base == to.base && from.rows == to.rows && from.cols == to.cols {
            return value;
        }

        if from.is_matrix() || to.is_matrix() {
            return self.apply_matrix_cast(section, value, from, to);
        }

        let mut value = value;
        let mut rows = from.rows.max(1);

        // Truncate before converting so fewer lanes change representation.
        if from.rows > to.rows {
            let truncated = Type::new(from.base, to.rows, 1);
            let type_id = self.writer.get_type_id(&truncated);
            let id = self.writer.make_id();
            if to.rows == 1 {
                section.push(Instruction::composite_extract(type_id, id, value, &[0]));
            } else {
                let components: Vec<Word> = (0..to.rows).collect();
                section.push(Instruction::vector_shuffle(
                    type_id, id, value, value, &components,
                ));
            }
            value = id;
            rows = to.rows;
        }

        if from.base != to.base {
            value = self.convert_base(section, value, from.base, to.base, rows);
        }

        if rows < to.rows {
            // Scalar broadcast.
            let type_id = self.writer.get_type_id(&Type::new(to.base, to.rows, 1));
            let parts: Vec<Word> = (0..to.rows).map(|_| value).collect();
            let id = self.writer.make_id();
            section.push(Instruction::composite_construct(type_id, id, &parts));
            value = id;
        }
        value
    }

    fn apply_matrix_cast(
        &mut self,
        section: &mut Section,
        value: Word,
        from: &Type,
        to: &Type,
    ) -> Word {
        let to_column = Type::vector(to.base, to.rows);
        let to_column_id = self.writer.get_type_id(&to_column);
        let mut columns = ArrayVec::<Word, 4>::new();

        if from.is_scalar() {
            let scalar = self.convert_base(section, value, from.base, to.base, 1);
            let parts: Vec<Word> = (0..to.rows).map(|_| scalar).collect();
            let column = self.writer.make_id();
            section.push(Instruction::composite_construct(to_column_id, column, &parts));
            for _ in 0..to.cols {
                columns.push(column);
            }
        } else {
            let from_column = Type::vector(from.base, from.rows);
            let from_column_id = self.writer.get_type_id(&from_column);
            for col in 0..to.cols {
                let extracted = self.writer.make_id();
                section.push(Instruction::composite_extract(
                    from_column_id,
                    extracted,
                    value,
                    &[col],
                ));
                let column = self.apply_cast(
                    section,
                    extracted,
                    &from_column,
                    &to_column,
                );
                columns.push(column);
            }
        }

        let type_id = self.writer.get_type_id(to);
        let id = self.writer.make_id();
        section.push(Instruction::composite_construct(type_id, id, &columns));
        id
    }

    fn convert_base(
        &mut self,
        section: &mut Section,
        value: Word,
        from: BaseType,
        to: BaseType,
        rows: u32,
    ) -> Word {
        let result_ty = Type::new(to, rows, 1);
        let result_type_id = self.writer.get_type_id(&result_ty);

        let op = match (from, to) {
            (BaseType::Int, BaseType::Float) => Op::ConvertSToF,
            (BaseType::Uint, BaseType::Float) => Op::ConvertUToF,
            (BaseType::Float, BaseType::Int) => Op::ConvertFToS,
            (BaseType::Float, BaseType::Uint) => Op::ConvertFToU,
            (BaseType::Int, BaseType::Uint) | (BaseType::Uint, BaseType::Int) => Op::Bitcast,
            (BaseType::Bool, _) => {
                // Booleans select between one and zero of the target type.
                let one = self.splat_constant(to, rows, |base| match base {
                    BaseType::Float => 1.0f32.to_bits(),
                    _ => 1,
                });
                let zero = self.splat_constant(to, rows, |_| 0);
                let id = self.writer.make_id();
                section.push(Instruction::select(result_type_id, id, value, one, zero));
                return id;
            }
            (_, BaseType::Bool) => {
                let zero = self.splat_constant(from, rows, |_| 0);
                let op = if let BaseType::Float = from {
                    Op::FOrdNotEqual
                } else {
                    Op::INotEqual
                };
                let id = self.writer.make_id();
                section.push(Instruction::binary(op, result_type_id, id, value, zero));
                return id;
            }
            _ => return value,
        };
        let id = self.writer.make_id();
        section.push(Instruction::unary(op, result_type_id, id, value));
        id
    }

    /// An interned constant with every lane set to `bits(base)`.
    pub(crate) fn splat_constant(
        &mut self,
        base: BaseType,
        rows: u32,
        bits: impl Fn(BaseType) -> u32,
    ) -> Word {
        let ty = Type::new(base, rows, 1);
        let mut constant = Constant::default();
        for lane in 0..rows as usize {
            constant.data[lane] = bits(base);
        }
        self.writer.get_constant(&ty, &constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_swizzles_fold_without_instructions() {
        let mut exp = Expr::default();
        let mut constant = Constant::default();
        for lane in 0..4 {
            constant.set_float(lane, lane as f32);
        }
        exp.reset_to_rvalue_constant(
            Type::vector(BaseType::Float, 4),
            SourceLocation::default(),
            constant,
        );
        exp.add_swizzle_access(&[2, 0]);
        assert!(exp.is_constant);
        assert_eq!(exp.ty.rows, 2);
        assert_eq!(exp.constant.as_float(0), 2.0);
        assert_eq!(exp.constant.as_float(1), 0.0);
    }

    #[test]
    fn swizzle_of_swizzle_composes_offsets() {
        let mut exp = Expr::default();
        exp.reset_to_lvalue(
            5,
            Type::vector(BaseType::Float, 4),
            SourceLocation::default(),
            StorageClass::Function,
        );
        exp.add_swizzle_access(&[3, 1, 0]);
        exp.add_swizzle_access(&[2, 0]);
        match exp.chain.as_slice() {
            [ChainOp::Swizzle { offsets, .. }] => {
                assert_eq!(offsets.as_slice(), &[0, 3]);
            }
            other => panic!("expected a single composed swizzle, got {other:?}"),
        }
    }

    #[test]
    fn constant_casts_fold_per_lane() {
        let mut exp = Expr::default();
        exp.reset_to_rvalue_constant(
            Type::FLOAT,
            SourceLocation::default(),
            Constant::from_float(1.5),
        );
        exp.add_cast_operation(Type::INT);
        assert_eq!(exp.constant.as_int(0), 1);

        // Scalar broadcast into a vector.
        let mut exp = Expr::default();
        exp.reset_to_rvalue_constant(
            Type::INT,
            SourceLocation::default(),
            Constant::from_int(2),
        );
        exp.add_cast_operation(Type::vector(BaseType::Float, 3));
        for lane in 0..3 {
            assert_eq!(exp.constant.as_float(lane), 2.0);
        }
    }

    #[test]
    fn consecutive_casts_merge() {
        let mut exp = Expr::default();
        exp.reset_to_lvalue(
            9,
            Type::FLOAT,
            SourceLocation::default(),
            StorageClass::Function,
        );
        exp.add_cast_operation(Type::INT);
        exp.add_cast_operation(Type::UINT);
        assert_eq!(exp.chain.len(), 1);
        match exp.chain.as_slice() {
            [ChainOp::Cast { from, to }] => {
                assert_eq!(from.base, BaseType::Float);
                assert_eq!(to.base, BaseType::Uint);
            }
            other => panic!("expected one merged cast, got {other:?}"),
        }
    }
}
