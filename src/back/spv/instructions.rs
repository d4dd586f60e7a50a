use super::helpers;
use spirv::{Op, Word};

/// A single SPIR-V instruction under construction.
///
/// The word count is tracked incrementally so serialization is a plain
/// copy; `to_words` never has to re-measure operands.
#[derive(Clone, Debug)]
pub(crate) struct Instruction {
    op: Op,
    wc: u32,
    type_id: Option<Word>,
    result_id: Option<Word>,
    operands: Vec<Word>,
}

impl Instruction {
    pub(crate) fn new(op: Op) -> Self {
        Instruction {
            op,
            wc: 1,
            type_id: None,
            result_id: None,
            operands: vec![],
        }
    }

    pub(crate) const fn op(&self) -> Op {
        self.op
    }

    fn set_type(&mut self, id: Word) {
        debug_assert!(self.type_id.is_none(), "type can only be set once");
        self.type_id = Some(id);
        self.wc += 1;
    }

    fn set_result(&mut self, id: Word) {
        debug_assert!(self.result_id.is_none(), "result can only be set once");
        self.result_id = Some(id);
        self.wc += 1;
    }

    pub(crate) fn add_operand(&mut self, operand: Word) {
        self.operands.push(operand);
        self.wc += 1;
    }

    fn add_operands(&mut self, operands: impl IntoIterator<Item = Word>) {
        for operand in operands {
            self.add_operand(operand);
        }
    }

    fn add_string(&mut self, value: &str) {
        self.add_operands(helpers::string_to_words(value));
    }

    //
    // Mode-setting and debug instructions
    //

    pub(crate) fn capability(capability: spirv::Capability) -> Self {
        let mut instruction = Self::new(Op::Capability);
        instruction.add_operand(capability as u32);
        instruction
    }

    pub(crate) fn extension(name: &str) -> Self {
        let mut instruction = Self::new(Op::Extension);
        instruction.add_string(name);
        instruction
    }

    pub(crate) fn ext_inst_import(id: Word, name: &str) -> Self {
        let mut instruction = Self::new(Op::ExtInstImport);
        instruction.set_result(id);
        instruction.add_string(name);
        instruction
    }

    pub(crate) fn memory_model(
        addressing_model: spirv::AddressingModel,
        memory_model: spirv::MemoryModel,
    ) -> Self {
        let mut instruction = Self::new(Op::MemoryModel);
        instruction.add_operand(addressing_model as u32);
        instruction.add_operand(memory_model as u32);
        instruction
    }

    pub(crate) fn entry_point(
        execution_model: spirv::ExecutionModel,
        entry_point_id: Word,
        name: &str,
        interface_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::EntryPoint);
        instruction.add_operand(execution_model as u32);
        instruction.add_operand(entry_point_id);
        instruction.add_string(name);
        instruction.add_operands(interface_ids.iter().copied());
        instruction
    }

    pub(crate) fn execution_mode(
        entry_point_id: Word,
        execution_mode: spirv::ExecutionMode,
    ) -> Self {
        let mut instruction = Self::new(Op::ExecutionMode);
        instruction.add_operand(entry_point_id);
        instruction.add_operand(execution_mode as u32);
        instruction
    }

    pub(crate) fn name(target_id: Word, name: &str) -> Self {
        let mut instruction = Self::new(Op::Name);
        instruction.add_operand(target_id);
        instruction.add_string(name);
        instruction
    }

    pub(crate) fn member_name(target_id: Word, member: Word, name: &str) -> Self {
        let mut instruction = Self::new(Op::MemberName);
        instruction.add_operand(target_id);
        instruction.add_operand(member);
        instruction.add_string(name);
        instruction
    }

    //
    // Annotation instructions
    //

    pub(crate) fn decorate(
        target_id: Word,
        decoration: spirv::Decoration,
        operands: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::Decorate);
        instruction.add_operand(target_id);
        instruction.add_operand(decoration as u32);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    pub(crate) fn decorate_string(
        target_id: Word,
        decoration: spirv::Decoration,
        value: &str,
    ) -> Self {
        let mut instruction = Self::new(Op::DecorateString);
        instruction.add_operand(target_id);
        instruction.add_operand(decoration as u32);
        instruction.add_string(value);
        instruction
    }

    pub(crate) fn member_decorate(
        target_id: Word,
        member_index: Word,
        decoration: spirv::Decoration,
        operands: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::MemberDecorate);
        instruction.add_operand(target_id);
        instruction.add_operand(member_index);
        instruction.add_operand(decoration as u32);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    //
    // Type declaration instructions
    //

    pub(crate) fn type_void(id: Word) -> Self {
        let mut instruction = Self::new(Op::TypeVoid);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn type_bool(id: Word) -> Self {
        let mut instruction = Self::new(Op::TypeBool);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn type_int(id: Word, width: Word, signedness: Word) -> Self {
        let mut instruction = Self::new(Op::TypeInt);
        instruction.set_result(id);
        instruction.add_operand(width);
        instruction.add_operand(signedness);
        instruction
    }

    pub(crate) fn type_float(id: Word, width: Word) -> Self {
        let mut instruction = Self::new(Op::TypeFloat);
        instruction.set_result(id);
        instruction.add_operand(width);
        instruction
    }

    pub(crate) fn type_vector(id: Word, component_type_id: Word, component_count: Word) -> Self {
        let mut instruction = Self::new(Op::TypeVector);
        instruction.set_result(id);
        instruction.add_operand(component_type_id);
        instruction.add_operand(component_count);
        instruction
    }

    pub(crate) fn type_matrix(id: Word, column_type_id: Word, column_count: Word) -> Self {
        let mut instruction = Self::new(Op::TypeMatrix);
        instruction.set_result(id);
        instruction.add_operand(column_type_id);
        instruction.add_operand(column_count);
        instruction
    }

    pub(crate) fn type_image(id: Word, sampled_type_id: Word, dim: spirv::Dim) -> Self {
        let mut instruction = Self::new(Op::TypeImage);
        instruction.set_result(id);
        instruction.add_operand(sampled_type_id);
        instruction.add_operand(dim as u32);
        instruction.add_operand(0); // not a depth image
        instruction.add_operand(0); // not arrayed
        instruction.add_operand(0); // single sampled
        instruction.add_operand(1); // used with a sampler
        instruction.add_operand(spirv::ImageFormat::Unknown as u32);
        instruction
    }

    pub(crate) fn type_sampled_image(id: Word, image_type_id: Word) -> Self {
        let mut instruction = Self::new(Op::TypeSampledImage);
        instruction.set_result(id);
        instruction.add_operand(image_type_id);
        instruction
    }

    pub(crate) fn type_array(id: Word, element_type_id: Word, length_id: Word) -> Self {
        let mut instruction = Self::new(Op::TypeArray);
        instruction.set_result(id);
        instruction.add_operand(element_type_id);
        instruction.add_operand(length_id);
        instruction
    }

    pub(crate) fn type_runtime_array(id: Word, element_type_id: Word) -> Self {
        let mut instruction = Self::new(Op::TypeRuntimeArray);
        instruction.set_result(id);
        instruction.add_operand(element_type_id);
        instruction
    }

    pub(crate) fn type_struct(id: Word, member_ids: &[Word]) -> Self {
        let mut instruction = Self::new(Op::TypeStruct);
        instruction.set_result(id);
        instruction.add_operands(member_ids.iter().copied());
        instruction
    }

    pub(crate) fn type_pointer(
        id: Word,
        storage_class: spirv::StorageClass,
        base_type_id: Word,
    ) -> Self {
        let mut instruction = Self::new(Op::TypePointer);
        instruction.set_result(id);
        instruction.add_operand(storage_class as u32);
        instruction.add_operand(base_type_id);
        instruction
    }

    pub(crate) fn type_function(id: Word, return_type_id: Word, parameter_ids: &[Word]) -> Self {
        let mut instruction = Self::new(Op::TypeFunction);
        instruction.set_result(id);
        instruction.add_operand(return_type_id);
        instruction.add_operands(parameter_ids.iter().copied());
        instruction
    }

    //
    // Constant instructions
    //

    pub(crate) fn constant_true(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Self::new(Op::ConstantTrue);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn constant_false(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Self::new(Op::ConstantFalse);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn constant_32bit(result_type_id: Word, id: Word, value: Word) -> Self {
        let mut instruction = Self::new(Op::Constant);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(value);
        instruction
    }

    pub(crate) fn constant_composite(
        result_type_id: Word,
        id: Word,
        constituent_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::ConstantComposite);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(constituent_ids.iter().copied());
        instruction
    }

    //
    // Memory instructions
    //

    pub(crate) fn variable(
        result_type_id: Word,
        id: Word,
        storage_class: spirv::StorageClass,
        initializer_id: Option<Word>,
    ) -> Self {
        let mut instruction = Self::new(Op::Variable);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(storage_class as u32);
        if let Some(initializer_id) = initializer_id {
            instruction.add_operand(initializer_id);
        }
        instruction
    }

    pub(crate) fn load(result_type_id: Word, id: Word, pointer_id: Word) -> Self {
        let mut instruction = Self::new(Op::Load);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(pointer_id);
        instruction
    }

    pub(crate) fn store(pointer_id: Word, value_id: Word) -> Self {
        let mut instruction = Self::new(Op::Store);
        instruction.add_operand(pointer_id);
        instruction.add_operand(value_id);
        instruction
    }

    pub(crate) fn access_chain(
        result_type_id: Word,
        id: Word,
        base_id: Word,
        index_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::AccessChain);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(base_id);
        instruction.add_operands(index_ids.iter().copied());
        instruction
    }

    //
    // Function instructions
    //

    pub(crate) fn function(
        return_type_id: Word,
        id: Word,
        function_control: spirv::FunctionControl,
        function_type_id: Word,
    ) -> Self {
        let mut instruction = Self::new(Op::Function);
        instruction.set_type(return_type_id);
        instruction.set_result(id);
        instruction.add_operand(function_control.bits());
        instruction.add_operand(function_type_id);
        instruction
    }

    pub(crate) fn function_parameter(result_type_id: Word, id: Word) -> Self {
        let mut instruction = Self::new(Op::FunctionParameter);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn function_end() -> Self {
        Self::new(Op::FunctionEnd)
    }

    pub(crate) fn function_call(
        result_type_id: Word,
        id: Word,
        function_id: Word,
        argument_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::FunctionCall);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(function_id);
        instruction.add_operands(argument_ids.iter().copied());
        instruction
    }

    //
    // Composite instructions
    //

    pub(crate) fn composite_construct(
        result_type_id: Word,
        id: Word,
        constituent_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::CompositeConstruct);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(constituent_ids.iter().copied());
        instruction
    }

    pub(crate) fn composite_extract(
        result_type_id: Word,
        id: Word,
        composite_id: Word,
        indices: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::CompositeExtract);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(composite_id);
        instruction.add_operands(indices.iter().copied());
        instruction
    }

    pub(crate) fn vector_shuffle(
        result_type_id: Word,
        id: Word,
        vector_1_id: Word,
        vector_2_id: Word,
        components: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::VectorShuffle);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(vector_1_id);
        instruction.add_operand(vector_2_id);
        instruction.add_operands(components.iter().copied());
        instruction
    }

    pub(crate) fn vector_extract_dynamic(
        result_type_id: Word,
        id: Word,
        vector_id: Word,
        index_id: Word,
    ) -> Self {
        let mut instruction = Self::new(Op::VectorExtractDynamic);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(vector_id);
        instruction.add_operand(index_id);
        instruction
    }

    //
    // Arithmetic, logic and conversion instructions
    //

    pub(crate) fn unary(op: Op, result_type_id: Word, id: Word, value_id: Word) -> Self {
        let mut instruction = Self::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(value_id);
        instruction
    }

    pub(crate) fn binary(
        op: Op,
        result_type_id: Word,
        id: Word,
        operand_1: Word,
        operand_2: Word,
    ) -> Self {
        let mut instruction = Self::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(operand_1);
        instruction.add_operand(operand_2);
        instruction
    }

    pub(crate) fn select(
        result_type_id: Word,
        id: Word,
        condition_id: Word,
        accept_id: Word,
        reject_id: Word,
    ) -> Self {
        let mut instruction = Self::new(Op::Select);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(condition_id);
        instruction.add_operand(accept_id);
        instruction.add_operand(reject_id);
        instruction
    }

    pub(crate) fn ext_inst(
        set_id: Word,
        op: spirv::GLOp,
        result_type_id: Word,
        id: Word,
        operands: &[Word],
    ) -> Self {
        let mut instruction = Self::new(Op::ExtInst);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(set_id);
        instruction.add_operand(op as u32);
        instruction.add_operands(operands.iter().copied());
        instruction
    }

    pub(crate) fn image_sample(
        op: Op,
        result_type_id: Word,
        id: Word,
        sampled_image_id: Word,
        coordinate_id: Word,
        image_operands: spirv::ImageOperands,
        operand_ids: &[Word],
    ) -> Self {
        let mut instruction = Self::new(op);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operand(sampled_image_id);
        instruction.add_operand(coordinate_id);
        instruction.add_operand(image_operands.bits());
        instruction.add_operands(operand_ids.iter().copied());
        instruction
    }

    //
    // Control flow instructions
    //

    pub(crate) fn label(id: Word) -> Self {
        let mut instruction = Self::new(Op::Label);
        instruction.set_result(id);
        instruction
    }

    pub(crate) fn branch(target_id: Word) -> Self {
        let mut instruction = Self::new(Op::Branch);
        instruction.add_operand(target_id);
        instruction
    }

    pub(crate) fn branch_conditional(
        condition_id: Word,
        true_label_id: Word,
        false_label_id: Word,
    ) -> Self {
        let mut instruction = Self::new(Op::BranchConditional);
        instruction.add_operand(condition_id);
        instruction.add_operand(true_label_id);
        instruction.add_operand(false_label_id);
        instruction
    }

    pub(crate) fn selection_merge(
        merge_id: Word,
        selection_control: spirv::SelectionControl,
    ) -> Self {
        let mut instruction = Self::new(Op::SelectionMerge);
        instruction.add_operand(merge_id);
        instruction.add_operand(selection_control.bits());
        instruction
    }

    pub(crate) fn loop_merge(
        merge_id: Word,
        continuing_id: Word,
        loop_control: spirv::LoopControl,
    ) -> Self {
        let mut instruction = Self::new(Op::LoopMerge);
        instruction.add_operand(merge_id);
        instruction.add_operand(continuing_id);
        instruction.add_operand(loop_control.bits());
        instruction
    }

    /// An `OpSwitch` header with no case labels yet; `(literal, label)`
    /// pairs are patched in with [`Instruction::add_operand`] once the body
    /// has been parsed.
    pub(crate) fn switch(selector_id: Word, default_id: Word) -> Self {
        let mut instruction = Self::new(Op::Switch);
        instruction.add_operand(selector_id);
        instruction.add_operand(default_id);
        instruction
    }

    pub(crate) fn phi(result_type_id: Word, id: Word, variable_parent_pairs: &[Word]) -> Self {
        let mut instruction = Self::new(Op::Phi);
        instruction.set_type(result_type_id);
        instruction.set_result(id);
        instruction.add_operands(variable_parent_pairs.iter().copied());
        instruction
    }

    pub(crate) fn return_void() -> Self {
        Self::new(Op::Return)
    }

    pub(crate) fn return_value(value_id: Word) -> Self {
        let mut instruction = Self::new(Op::ReturnValue);
        instruction.add_operand(value_id);
        instruction
    }

    pub(crate) fn kill() -> Self {
        Self::new(Op::Kill)
    }

    /// Serialize into the module word stream.
    pub(crate) fn to_words(&self, sink: &mut Vec<Word>) {
        sink.push(self.wc << 16 | self.op as u32);
        if let Some(id) = self.type_id {
            sink.push(id);
        }
        if let Some(id) = self.result_id {
            sink.push(id);
        }
        sink.extend_from_slice(&self.operands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_matches_serialized_length() {
        let cases = [
            Instruction::type_void(1),
            Instruction::type_int(2, 32, 1),
            Instruction::constant_32bit(2, 3, 42),
            Instruction::store(4, 5),
            Instruction::entry_point(spirv::ExecutionModel::Fragment, 6, "main", &[7, 8]),
        ];
        for instruction in cases {
            let mut words = vec![];
            instruction.to_words(&mut words);
            assert_eq!(words.len() as u32, words[0] >> 16);
            assert_eq!(words[0] & 0xFFFF, instruction.op() as u32);
        }
    }

    #[test]
    fn switch_headers_accept_patched_cases() {
        let mut switch = Instruction::switch(1, 2);
        switch.add_operand(0);
        switch.add_operand(3);
        let mut words = vec![];
        switch.to_words(&mut words);
        assert_eq!(words, &[(5 << 16) | Op::Switch as u32, 1, 2, 0, 3]);
    }
}
