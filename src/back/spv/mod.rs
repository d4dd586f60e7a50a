/*!
SPIR-V module builder.

The front end drives this writer directly while it parses: ids are handed
out monotonically, types and constants are interned on first use, and
instructions are pushed into [`Section`]s (plain instruction streams in
which labels and terminators appear inline). [`Writer::write`] assembles the
streams into a binary module in the layout the SPIR-V specification
mandates: capabilities, extensions, imports, memory model, entry points,
execution modes, debug names, annotations, declarations, functions.
*/

mod helpers;
mod instructions;

pub(crate) use instructions::Instruction;

use crate::{BaseType, Constant, FastHashMap, FastIndexSet, ShaderStage, Type};
use spirv::{Capability, StorageClass, Word};

/// A stream of instructions under construction.
///
/// Unlike a single basic block, a section may hold any number of labelled
/// blocks; the statement compiler parses loop continue expressions and
/// switch bodies into side sections and splices them into place afterwards.
#[derive(Default)]
pub(crate) struct Section {
    pub instructions: Vec<Instruction>,
}

impl Section {
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Move all instructions of `other` to the end of this section.
    pub fn append(&mut self, other: &mut Section) {
        self.instructions.append(&mut other.instructions);
    }
}

/// A function being assembled: its signature, the entry block holding all
/// function-scope `OpVariable`s, and the remaining body.
#[derive(Default)]
pub(crate) struct Function {
    function_id: Word,
    return_type_id: Word,
    signature: Option<Instruction>,
    parameters: Vec<Instruction>,
    parameter_type_ids: Vec<Word>,
    pub variables: Section,
    pub definition: Section,
}

#[derive(Default)]
struct IdGenerator(Word);

impl IdGenerator {
    fn next(&mut self) -> Word {
        self.0 += 1;
        self.0
    }
}

/// Key for the type interning table. SPIR-V requires scalar, vector and
/// matrix type declarations to be unique within a module, so equal keys must
/// map to one `OpType...` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum LookupType {
    Void,
    Bool,
    Int,
    Uint,
    Float,
    Vector { base: BaseType, rows: u32 },
    Matrix { base: BaseType, rows: u32, cols: u32 },
    Image,
    SampledImage,
    Array { base: Word, length: u32 },
    RuntimeArray { base: Word },
    Pointer { base: Word, class: StorageClass },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum CachedConstant {
    Bool(bool),
    Scalar { base: BaseType, bits: u32 },
    Composite { type_id: Word, parts: Vec<Word> },
}

pub(crate) struct Writer {
    id_gen: IdGenerator,
    capabilities_used: FastIndexSet<Capability>,
    extensions_used: FastIndexSet<&'static str>,
    gl450_ext_inst_id: Word,
    debugs: Vec<Instruction>,
    annotations: Vec<Instruction>,
    declarations: Vec<Instruction>,
    entry_points: Vec<Instruction>,
    execution_modes: Vec<Instruction>,
    lookup_type: FastHashMap<LookupType, Word>,
    lookup_function_type: FastHashMap<(Word, Vec<Word>), Word>,
    cached_constants: FastHashMap<CachedConstant, Word>,
    functions: Vec<Function>,
}

impl Writer {
    pub fn new() -> Self {
        let mut id_gen = IdGenerator::default();
        let gl450_ext_inst_id = id_gen.next();
        let mut capabilities_used = FastIndexSet::default();
        capabilities_used.insert(Capability::Shader);
        Writer {
            id_gen,
            capabilities_used,
            extensions_used: FastIndexSet::default(),
            gl450_ext_inst_id,
            debugs: vec![],
            annotations: vec![],
            declarations: vec![],
            entry_points: vec![],
            execution_modes: vec![],
            lookup_type: FastHashMap::default(),
            lookup_function_type: FastHashMap::default(),
            cached_constants: FastHashMap::default(),
            functions: vec![],
        }
    }

    pub fn make_id(&mut self) -> Word {
        self.id_gen.next()
    }

    pub const fn gl450_ext_inst_id(&self) -> Word {
        self.gl450_ext_inst_id
    }

    //
    // Types
    //

    fn write_type_declaration(&mut self, lookup: LookupType) -> Word {
        if let Some(&id) = self.lookup_type.get(&lookup) {
            return id;
        }
        let id = self.id_gen.next();
        let instruction = match lookup {
            LookupType::Void => Instruction::type_void(id),
            LookupType::Bool => Instruction::type_bool(id),
            LookupType::Int => Instruction::type_int(id, 32, 1),
            LookupType::Uint => Instruction::type_int(id, 32, 0),
            LookupType::Float => Instruction::type_float(id, 32),
            LookupType::Vector { base, rows } => {
                let scalar_id = self.get_type_id(&Type::scalar(base));
                Instruction::type_vector(id, scalar_id, rows)
            }
            LookupType::Matrix { base, rows, cols } => {
                let column_id = self.get_type_id(&Type::vector(base, rows));
                Instruction::type_matrix(id, column_id, cols)
            }
            LookupType::Image => {
                let float_id = self.get_type_id(&Type::FLOAT);
                Instruction::type_image(id, float_id, spirv::Dim::Dim2D)
            }
            LookupType::SampledImage => {
                let image_id = self.write_type_declaration(LookupType::Image);
                Instruction::type_sampled_image(id, image_id)
            }
            LookupType::Array { base, length } => {
                let length_id = self.get_constant_scalar(BaseType::Uint, length);
                Instruction::type_array(id, base, length_id)
            }
            LookupType::RuntimeArray { base } => Instruction::type_runtime_array(id, base),
            LookupType::Pointer { base, class } => Instruction::type_pointer(id, class, base),
        };
        self.declarations.push(instruction);
        self.lookup_type.insert(lookup, id);
        id
    }

    /// Id of the value type corresponding to `ty`, interning the
    /// declaration on first use.
    pub fn get_type_id(&mut self, ty: &Type) -> Word {
        if ty.array_length != 0 {
            let element_id = self.get_type_id(&ty.element_type());
            return if ty.array_length < 0 {
                self.write_type_declaration(LookupType::RuntimeArray { base: element_id })
            } else {
                self.write_type_declaration(LookupType::Array {
                    base: element_id,
                    length: ty.array_length as u32,
                })
            };
        }
        match ty.base {
            BaseType::Void => self.write_type_declaration(LookupType::Void),
            BaseType::Bool | BaseType::Int | BaseType::Uint | BaseType::Float => {
                let lookup = if ty.cols > 1 {
                    LookupType::Matrix {
                        base: ty.base,
                        rows: ty.rows,
                        cols: ty.cols,
                    }
                } else if ty.rows > 1 {
                    LookupType::Vector {
                        base: ty.base,
                        rows: ty.rows,
                    }
                } else {
                    match ty.base {
                        BaseType::Bool => LookupType::Bool,
                        BaseType::Int => LookupType::Int,
                        BaseType::Uint => LookupType::Uint,
                        _ => LookupType::Float,
                    }
                };
                self.write_type_declaration(lookup)
            }
            BaseType::Texture => self.write_type_declaration(LookupType::Image),
            BaseType::Sampler => self.write_type_declaration(LookupType::SampledImage),
            BaseType::Struct => ty.definition,
            BaseType::String | BaseType::Function => {
                unreachable!("type has no SPIR-V representation: {:?}", ty.base)
            }
        }
    }

    /// Id of a pointer to `ty` in the given storage class.
    pub fn get_pointer_type_id(&mut self, ty: &Type, class: StorageClass) -> Word {
        let base = self.get_type_id(ty);
        self.write_type_declaration(LookupType::Pointer { base, class })
    }

    fn get_function_type_id(&mut self, return_type_id: Word, parameter_ids: &[Word]) -> Word {
        let key = (return_type_id, parameter_ids.to_vec());
        if let Some(&id) = self.lookup_function_type.get(&key) {
            return id;
        }
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::type_function(id, return_type_id, parameter_ids));
        self.lookup_function_type.insert(key, id);
        id
    }

    /// Emit the `OpTypeStruct` for a struct whose id was reserved earlier
    /// with [`Writer::make_id`].
    pub fn declare_struct(&mut self, id: Word, member_type_ids: &[Word]) {
        self.declarations
            .push(Instruction::type_struct(id, member_type_ids));
    }

    //
    // Constants
    //

    pub fn get_constant_scalar(&mut self, base: BaseType, bits: u32) -> Word {
        let key = if let BaseType::Bool = base {
            CachedConstant::Bool(bits != 0)
        } else {
            CachedConstant::Scalar { base, bits }
        };
        if let Some(&id) = self.cached_constants.get(&key) {
            return id;
        }
        let type_id = self.get_type_id(&Type::scalar(base));
        let id = self.id_gen.next();
        let instruction = match key {
            CachedConstant::Bool(true) => Instruction::constant_true(type_id, id),
            CachedConstant::Bool(false) => Instruction::constant_false(type_id, id),
            _ => Instruction::constant_32bit(type_id, id, bits),
        };
        self.declarations.push(instruction);
        self.cached_constants.insert(key, id);
        id
    }

    /// Id of an unsigned integer constant, as used for access chain indices.
    pub fn get_index_constant(&mut self, index: u32) -> Word {
        self.get_constant_scalar(BaseType::Uint, index)
    }

    fn get_constant_composite(&mut self, type_id: Word, parts: &[Word]) -> Word {
        let key = CachedConstant::Composite {
            type_id,
            parts: parts.to_vec(),
        };
        if let Some(&id) = self.cached_constants.get(&key) {
            return id;
        }
        let id = self.id_gen.next();
        self.declarations
            .push(Instruction::constant_composite(type_id, id, parts));
        self.cached_constants.insert(key, id);
        id
    }

    /// Intern the constant `value` of type `ty`.
    ///
    /// Vectors become composites of their scalar lanes; matrices become
    /// composites of column vector constants (lanes are packed
    /// column-major); arrays recurse into their elements.
    pub fn get_constant(&mut self, ty: &Type, value: &Constant) -> Word {
        if ty.is_array() {
            let element_type = ty.element_type();
            let length = ty.array_length.max(0) as usize;
            let parts: Vec<Word> = (0..length.max(value.elements.len()))
                .map(|index| {
                    // Missing elements zero-fill, as in `float a[4] = {};`.
                    let element = value.elements.get(index).cloned().unwrap_or_default();
                    self.get_constant(&element_type, &element)
                })
                .collect();
            let type_id = self.get_type_id(ty);
            return self.get_constant_composite(type_id, &parts);
        }
        if ty.cols > 1 {
            let column_type = Type::vector(ty.base, ty.rows);
            let mut columns = Vec::with_capacity(ty.cols as usize);
            for col in 0..ty.cols {
                let mut column = Constant::default();
                for row in 0..ty.rows {
                    column.data[row as usize] = value.data[(col * ty.rows + row) as usize];
                }
                columns.push(self.get_constant(&column_type, &column));
            }
            let type_id = self.get_type_id(ty);
            return self.get_constant_composite(type_id, &columns);
        }
        if ty.rows > 1 {
            let parts: Vec<Word> = (0..ty.rows)
                .map(|row| self.get_constant_scalar(ty.base, value.data[row as usize]))
                .collect();
            let type_id = self.get_type_id(ty);
            return self.get_constant_composite(type_id, &parts);
        }
        self.get_constant_scalar(ty.base, value.data[0])
    }

    //
    // Debug names and decorations
    //

    pub fn set_name(&mut self, id: Word, name: &str) {
        self.debugs.push(Instruction::name(id, name));
    }

    pub fn set_member_name(&mut self, struct_id: Word, member: u32, name: &str) {
        self.debugs
            .push(Instruction::member_name(struct_id, member, name));
    }

    pub fn decorate(&mut self, id: Word, decoration: spirv::Decoration, operands: &[Word]) {
        self.annotations
            .push(Instruction::decorate(id, decoration, operands));
    }

    pub fn decorate_string(&mut self, id: Word, decoration: spirv::Decoration, value: &str) {
        self.extensions_used
            .insert("SPV_GOOGLE_hlsl_functionality1");
        self.annotations
            .push(Instruction::decorate_string(id, decoration, value));
    }

    pub fn decorate_member(
        &mut self,
        struct_id: Word,
        member: u32,
        decoration: spirv::Decoration,
        operands: &[Word],
    ) {
        self.annotations
            .push(Instruction::member_decorate(struct_id, member, decoration, operands));
    }

    pub fn decorate_builtin(&mut self, id: Word, built_in: spirv::BuiltIn) {
        self.decorate(id, spirv::Decoration::BuiltIn, &[built_in as u32]);
    }

    //
    // Variables
    //

    /// Emit a module-scope `OpVariable` with a previously reserved id.
    pub fn define_global_variable(
        &mut self,
        id: Word,
        ty: &Type,
        class: StorageClass,
        initializer: Option<Word>,
    ) {
        let pointer_type_id = self.get_pointer_type_id(ty, class);
        self.declarations
            .push(Instruction::variable(pointer_type_id, id, class, initializer));
    }

    /// Emit a function-scope `OpVariable` into the entry block of the given
    /// function and return its id.
    pub fn define_local_variable(
        &mut self,
        function: usize,
        ty: &Type,
        initializer: Option<Word>,
    ) -> Word {
        let pointer_type_id = self.get_pointer_type_id(ty, StorageClass::Function);
        let id = self.id_gen.next();
        self.functions[function].variables.push(Instruction::variable(
            pointer_type_id,
            id,
            StorageClass::Function,
            initializer,
        ));
        id
    }

    //
    // Functions
    //

    /// Start a new function record. The signature is sealed separately once
    /// all parameters are known.
    pub fn begin_function(&mut self, function_id: Word, return_type: &Type) -> usize {
        let return_type_id = self.get_type_id(return_type);
        self.functions.push(Function {
            function_id,
            return_type_id,
            ..Function::default()
        });
        self.functions.len() - 1
    }

    pub fn add_function_parameter(&mut self, function: usize, pointer_type_id: Word) -> Word {
        let id = self.id_gen.next();
        let function = &mut self.functions[function];
        function
            .parameters
            .push(Instruction::function_parameter(pointer_type_id, id));
        function.parameter_type_ids.push(pointer_type_id);
        id
    }

    /// Build the `OpFunction` header now that the parameter list is final.
    pub fn seal_function_signature(&mut self, function: usize) {
        let return_type_id = self.functions[function].return_type_id;
        let parameter_type_ids = self.functions[function].parameter_type_ids.clone();
        let function_type_id = self.get_function_type_id(return_type_id, &parameter_type_ids);
        let function = &mut self.functions[function];
        function.signature = Some(Instruction::function(
            function.return_type_id,
            function.function_id,
            spirv::FunctionControl::NONE,
            function_type_id,
        ));
    }

    pub fn function_mut(&mut self, function: usize) -> &mut Function {
        &mut self.functions[function]
    }

    //
    // Entry points and serialization
    //

    pub fn add_entry_point(
        &mut self,
        stage: ShaderStage,
        function_id: Word,
        name: &str,
        interface_ids: &[Word],
    ) {
        let execution_model = match stage {
            ShaderStage::Vertex => spirv::ExecutionModel::Vertex,
            ShaderStage::Fragment => spirv::ExecutionModel::Fragment,
        };
        self.entry_points.push(Instruction::entry_point(
            execution_model,
            function_id,
            name,
            interface_ids,
        ));
        if let ShaderStage::Fragment = stage {
            self.execution_modes.push(Instruction::execution_mode(
                function_id,
                spirv::ExecutionMode::OriginUpperLeft,
            ));
        }
    }

    /// Serialize the module into a little-endian word stream with the
    /// standard `(magic, version, generator, bound, 0)` header.
    pub fn write(&self) -> Vec<Word> {
        let mut words = vec![
            spirv::MAGIC_NUMBER,
            0x0001_0000, // SPIR-V 1.0
            0,           // anonymous generator
            self.id_gen.0 + 1,
            0,
        ];
        for &capability in &self.capabilities_used {
            Instruction::capability(capability).to_words(&mut words);
        }
        for &extension in &self.extensions_used {
            Instruction::extension(extension).to_words(&mut words);
        }
        Instruction::ext_inst_import(self.gl450_ext_inst_id, "GLSL.std.450").to_words(&mut words);
        Instruction::memory_model(
            spirv::AddressingModel::Logical,
            spirv::MemoryModel::GLSL450,
        )
        .to_words(&mut words);
        for stream in [
            &self.entry_points,
            &self.execution_modes,
            &self.debugs,
            &self.annotations,
            &self.declarations,
        ] {
            for instruction in stream {
                instruction.to_words(&mut words);
            }
        }
        for function in &self.functions {
            if let Some(ref signature) = function.signature {
                signature.to_words(&mut words);
            }
            for parameter in &function.parameters {
                parameter.to_words(&mut words);
            }
            for instruction in &function.variables.instructions {
                instruction.to_words(&mut words);
            }
            for instruction in &function.definition.instructions {
                instruction.to_words(&mut words);
            }
            Instruction::function_end().to_words(&mut words);
        }
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_and_constants_are_interned() {
        let mut writer = Writer::new();
        let a = writer.get_type_id(&Type::FLOAT);
        let b = writer.get_type_id(&Type::FLOAT);
        assert_eq!(a, b);

        let v1 = writer.get_type_id(&Type::vector(BaseType::Float, 4));
        let v2 = writer.get_type_id(&Type::vector(BaseType::Float, 4));
        assert_eq!(v1, v2);
        assert_ne!(a, v1);

        let c1 = writer.get_constant_scalar(BaseType::Float, 1.0f32.to_bits());
        let c2 = writer.get_constant_scalar(BaseType::Float, 1.0f32.to_bits());
        let c3 = writer.get_constant_scalar(BaseType::Uint, 1.0f32.to_bits());
        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
    }

    #[test]
    fn module_header_is_well_formed() {
        let mut writer = Writer::new();
        let float_id = writer.get_type_id(&Type::FLOAT);
        let words = writer.write();
        assert_eq!(words[0], spirv::MAGIC_NUMBER);
        assert_eq!(words[1], 0x0001_0000);
        assert_eq!(words[4], 0);
        // Bound exceeds every id handed out.
        assert!(words[3] > float_id);
        assert!(words[3] > writer.gl450_ext_inst_id());
    }

    #[test]
    fn matrix_constants_compose_column_major() {
        let mut writer = Writer::new();
        let ty = Type::matrix(BaseType::Float, 2, 2);
        let mut value = Constant::default();
        for lane in 0..4 {
            value.set_float(lane, lane as f32);
        }
        let id = writer.get_constant(&ty, &value);
        assert_ne!(id, 0);
        // Interning: same value yields the same id.
        assert_eq!(writer.get_constant(&ty, &value), id);
    }
}
