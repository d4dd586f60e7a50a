//! Declaration parsing: structs, functions, variables with their property
//! blocks, techniques and passes, and the synthesis of stage entry points.

use super::builtins::semantic_to_builtin;
use super::chain::Expr;
use super::symbols::Symbol;
use super::token::TokenValue;
use super::{Frontend, FunctionInfo, StructInfo, StructMember};
use crate::back::spv::{Instruction, Section};
use crate::{
    BaseType, PassInfo, Qualifiers, SamplerInfo, ShaderStage, TechniqueInfo, TextureInfo, Type,
    UniformInfo,
};
use spirv::{Op, StorageClass, Word};

/// Sentinel id for symbols inserted during error recovery, so later
/// references resolve without producing cascading diagnostics.
const DUMMY_ID: Word = 0xFFFF_FFFF;

fn align(offset: u32, alignment: u32) -> u32 {
    match offset % alignment {
        0 => offset,
        rest => offset + alignment - rest,
    }
}

/// All properties a texture or sampler block can assign. One struct covers
/// both kinds; the declaration decides which fields are meaningful.
struct VariableProperties {
    texture: Word,
    width: u32,
    height: u32,
    levels: u32,
    format: u32,
    srgb: bool,
    address_u: u32,
    address_v: u32,
    address_w: u32,
    filter: u32,
    min_lod: f32,
    max_lod: f32,
    lod_bias: f32,
}

impl Default for VariableProperties {
    fn default() -> Self {
        VariableProperties {
            texture: 0,
            width: 1,
            height: 1,
            levels: 1,
            format: 8, // RGBA8
            srgb: false,
            address_u: 3, // clamp
            address_v: 3,
            address_w: 3,
            filter: 0x15, // trilinear
            min_lod: f32::MIN,
            max_lod: f32::MAX,
            lod_bias: 0.0,
        }
    }
}

impl Frontend {
    pub(crate) fn parse_top_level(&mut self) -> bool {
        if self.accept(TokenValue::Namespace) {
            // Anonymous namespaces are not supported.
            let name = match self.expect_identifier() {
                Some(name) => name,
                None => return false,
            };
            if !self.expect(TokenValue::LeftBrace) {
                return false;
            }

            self.symbols.enter_namespace(&name);
            let mut success = true;
            while !self.peek(TokenValue::RightBrace) && !self.peek(TokenValue::End) {
                if !self.parse_top_level() {
                    success = false;
                }
            }
            self.symbols.leave_namespace();

            return self.expect(TokenValue::RightBrace) && success;
        }

        if self.accept(TokenValue::Struct) {
            return self.parse_struct() && self.expect(TokenValue::Semicolon);
        }

        if self.accept(TokenValue::Technique) {
            return self.parse_technique();
        }

        let mut ty = Type::default();
        if self.parse_type(&mut ty) {
            let name = match self.expect_identifier() {
                Some(name) => name,
                None => return false,
            };

            if self.peek(TokenValue::LeftParen) {
                if !self.parse_function(ty, name.clone()) {
                    // Insert a dummy so later references still resolve.
                    self.symbols
                        .insert_symbol(&name, Symbol::function(DUMMY_ID, None), true);
                    return false;
                }
                return true;
            }

            // Global initializers must be constant, so any instructions an
            // erroneous one produces are discarded with this section.
            let mut section = Section::default();
            let mut count = 0;
            let mut name = name;
            loop {
                if count > 0 {
                    if !self.expect(TokenValue::Comma) {
                        return false;
                    }
                    name = match self.expect_identifier() {
                        Some(name) => name,
                        None => return false,
                    };
                }
                count += 1;
                if !self.parse_variable(ty, name.clone(), &mut section, true) {
                    self.symbols.insert_symbol(
                        &name,
                        Symbol::variable(DUMMY_ID, ty, StorageClass::Private),
                        true,
                    );
                    self.consume_until(TokenValue::Semicolon);
                    return false;
                }
                if self.peek(TokenValue::Semicolon) {
                    break;
                }
            }
            return self.expect(TokenValue::Semicolon);
        }

        // Stray semicolons are allowed between declarations.
        if !self.accept(TokenValue::Semicolon) {
            self.consume();
            let location = self.location();
            let found = self.token.value.clone();
            self.error(&location, 3000, format!("syntax error: unexpected '{found}'"));
            return false;
        }

        true
    }

    pub(crate) fn parse_struct(&mut self) -> bool {
        let location = self.location();

        let name = self.accept_identifier().unwrap_or_else(|| {
            format!("__anonymous_struct_{}_{}", location.line, location.column)
        });
        let unique_name = self.decorated_name('S', &name);

        if !self.expect(TokenValue::LeftBrace) {
            return false;
        }

        let definition = self.writer.make_id();
        let mut members: Vec<StructMember> = vec![];
        let mut member_type_ids: Vec<Word> = vec![];

        while !self.peek(TokenValue::RightBrace) {
            let mut ty = Type::default();
            if !self.parse_type(&mut ty) {
                let next_location = self.next_location();
                let found = self.next_token.value.clone();
                self.error(
                    &next_location,
                    3000,
                    format!("syntax error: unexpected '{found}', expected struct member type"),
                );
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
            if ty.is_void() {
                let next_location = self.next_location();
                self.error(&next_location, 3038, "struct members cannot be void");
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
            if ty.has(Qualifiers::IN) || ty.has(Qualifiers::OUT) {
                let next_location = self.next_location();
                self.error(
                    &next_location,
                    3055,
                    "struct members cannot be declared 'in' or 'out'",
                );
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
            if ty.is_struct() {
                let next_location = self.next_location();
                self.error(&next_location, 3090, "nested struct members are not supported");
                self.consume_until(TokenValue::RightBrace);
                return false;
            }

            let mut count = 0;
            loop {
                if count > 0 && !self.expect(TokenValue::Comma) {
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
                count += 1;
                let member_name = match self.expect_identifier() {
                    Some(member_name) => member_name,
                    None => {
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                };

                let mut member = StructMember {
                    name: member_name,
                    ty,
                    builtin: None,
                    semantic_index: 0,
                };
                if !self.parse_array_size(&mut member.ty) {
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }

                if self.accept(TokenValue::Colon) {
                    match self.expect_identifier() {
                        Some(semantic) => {
                            let (builtin, index) = semantic_to_builtin(&semantic);
                            member.builtin = builtin;
                            member.semantic_index = index;
                        }
                        None => {
                            self.consume_until(TokenValue::RightBrace);
                            return false;
                        }
                    }
                }

                member_type_ids.push(self.writer.get_type_id(&member.ty));
                members.push(member);

                if self.peek(TokenValue::Semicolon) {
                    break;
                }
            }
            if !self.expect(TokenValue::Semicolon) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
        }

        if members.is_empty() {
            self.warning(&location, 5001, "struct has no members");
        }

        self.writer.declare_struct(definition, &member_type_ids);
        self.writer.set_name(definition, &unique_name);
        for (index, member) in members.iter().enumerate() {
            self.writer
                .set_member_name(definition, index as u32, &member.name);
        }

        self.structs.insert(
            definition,
            StructInfo {
                name: name.clone(),
                definition,
                members,
            },
        );

        if !self.symbols.insert_symbol(&name, Symbol::structure(definition), true) {
            self.error(&location, 3003, format!("redefinition of '{name}'"));
            return false;
        }

        self.expect(TokenValue::RightBrace)
    }

    pub(crate) fn parse_function(&mut self, ty: Type, name: String) -> bool {
        let location = self.location();

        if !self.expect(TokenValue::LeftParen) {
            return false;
        }
        if !ty.qualifiers.is_empty() {
            self.error(&location, 3047, "function return type cannot have any qualifiers");
            return false;
        }

        let definition = self.writer.make_id();
        let unique_name = self.decorated_name('F', &name);
        let index = self.functions.len();
        let writer_index = self.writer.begin_function(definition, &ty);
        debug_assert_eq!(index, writer_index);
        self.writer.set_name(definition, &unique_name);

        self.functions.push(FunctionInfo {
            name: name.clone(),
            unique_name,
            return_type: ty,
            return_builtin: None,
            return_semantic_index: 0,
            parameters: vec![],
            definition,
            entry_point: 0,
        });

        self.symbols.enter_scope();
        self.current_function = Some(index);
        let success = self.parse_function_inner(index, ty, &name, location);
        self.current_function = None;
        self.current_block = 0;
        self.symbols.leave_scope();
        success
    }

    fn parse_function_inner(
        &mut self,
        index: usize,
        return_type: Type,
        name: &str,
        location: super::token::SourceLocation,
    ) -> bool {
        while !self.peek(TokenValue::RightParen) {
            if !self.functions[index].parameters.is_empty() && !self.expect(TokenValue::Comma) {
                return false;
            }

            let mut param_type = Type::default();
            if !self.parse_type(&mut param_type) {
                let next_location = self.next_location();
                let found = self.next_token.value.clone();
                self.error(
                    &next_location,
                    3000,
                    format!("syntax error: unexpected '{found}', expected parameter type"),
                );
                return false;
            }

            let param_name = match self.expect_identifier() {
                Some(param_name) => param_name,
                None => return false,
            };
            let param_location = self.location();

            if param_type.is_void() {
                self.error(&param_location, 3038, "function parameters cannot be void");
                return false;
            }
            if param_type.has(Qualifiers::EXTERN) {
                self.error(&param_location, 3006, "function parameters cannot be declared 'extern'");
                return false;
            }
            if param_type.has(Qualifiers::STATIC) {
                self.error(&param_location, 3007, "function parameters cannot be declared 'static'");
                return false;
            }
            if param_type.has(Qualifiers::UNIFORM) {
                self.error(
                    &param_location,
                    3047,
                    "function parameters cannot be declared 'uniform', consider placing in global scope instead",
                );
                return false;
            }

            if param_type.has(Qualifiers::OUT) {
                if param_type.has(Qualifiers::CONST) {
                    self.error(&param_location, 3046, "output parameters cannot be declared 'const'");
                    return false;
                }
            } else {
                // Parameters are implicitly `in` unless marked `out`.
                param_type.qualifiers |= Qualifiers::IN;
            }

            if !self.parse_array_size(&mut param_type) {
                return false;
            }

            let mut param = StructMember {
                name: param_name.clone(),
                ty: param_type,
                builtin: None,
                semantic_index: 0,
            };
            if self.accept(TokenValue::Colon) {
                match self.expect_identifier() {
                    Some(semantic) => {
                        let (builtin, semantic_index) = semantic_to_builtin(&semantic);
                        param.builtin = builtin;
                        param.semantic_index = semantic_index;
                    }
                    None => return false,
                }
            }

            param.ty.is_pointer = true;

            let pointer_type_id = self
                .writer
                .get_pointer_type_id(&param.ty.element_type(), StorageClass::Function);
            let param_id = self.writer.add_function_parameter(index, pointer_type_id);
            self.writer.set_name(param_id, &param_name);

            if !self.symbols.insert_symbol(
                &param_name,
                Symbol::variable(param_id, param.ty, StorageClass::Function),
                false,
            ) {
                self.error(&param_location, 3003, format!("redefinition of '{param_name}'"));
                return false;
            }

            self.functions[index].parameters.push(param);
        }

        if !self.expect(TokenValue::RightParen) {
            return false;
        }

        // Return value semantic.
        if self.accept(TokenValue::Colon) {
            match self.expect_identifier() {
                Some(semantic) => {
                    if return_type.is_void() {
                        let semantic_location = self.location();
                        self.error(&semantic_location, 3076, "void function cannot have a semantic");
                        return false;
                    }
                    let (builtin, semantic_index) = semantic_to_builtin(&semantic);
                    self.functions[index].return_builtin = builtin;
                    self.functions[index].return_semantic_index = semantic_index;
                }
                None => return false,
            }
        }

        self.writer.seal_function_signature(index);

        // Insert the symbol before the body parses, so calls to the
        // function inside its own body resolve and the recursion check can
        // reject them.
        if !self
            .symbols
            .insert_symbol(name, Symbol::function(self.functions[index].definition, Some(index)), true)
        {
            self.error(&location, 3003, format!("redefinition of '{name}'"));
            return false;
        }

        // Functions start with a block that also collects every local
        // variable declared anywhere in the body.
        let entry_label = self.writer.make_id();
        self.writer
            .function_mut(index)
            .variables
            .push(Instruction::label(entry_label));
        self.current_block = entry_label;

        let mut body = Section::default();
        let success = self.parse_statement_block(&mut body, false);

        // Fall off the end of the function.
        if self.current_block != 0 {
            self.leave_block_and_return(&mut body, None);
        }
        self.writer.function_mut(index).definition.append(&mut body);

        success
    }

    pub(crate) fn parse_variable(
        &mut self,
        mut ty: Type,
        name: String,
        section: &mut Section,
        global: bool,
    ) -> bool {
        let location = self.location();

        if ty.is_void() {
            self.error(&location, 3038, "variables cannot be void");
            return false;
        }
        if ty.has(Qualifiers::IN) || ty.has(Qualifiers::OUT) {
            self.error(&location, 3055, "variables cannot be declared 'in' or 'out'");
            return false;
        }

        if global {
            if ty.has(Qualifiers::STATIC) {
                if ty.has(Qualifiers::UNIFORM) {
                    self.error(
                        &location,
                        3007,
                        "uniform global variables cannot be declared 'static'",
                    );
                    return false;
                }
            } else {
                if !ty.has(Qualifiers::UNIFORM) && !(ty.is_texture() || ty.is_sampler()) {
                    self.warning(
                        &location,
                        5000,
                        "global variables are considered 'uniform' by default",
                    );
                }
                if ty.has(Qualifiers::CONST) {
                    self.error(
                        &location,
                        3035,
                        "variables which are 'uniform' cannot be declared 'const'",
                    );
                    return false;
                }
                // Non-static globals are always extern uniform.
                ty.qualifiers |= Qualifiers::EXTERN | Qualifiers::UNIFORM;
            }
        } else {
            if ty.has(Qualifiers::EXTERN) {
                self.error(&location, 3006, "local variables cannot be declared 'extern'");
                return false;
            }
            if ty.has(Qualifiers::UNIFORM) {
                self.error(&location, 3047, "local variables cannot be declared 'uniform'");
                return false;
            }
            if ty.is_texture() || ty.is_sampler() {
                self.error(&location, 3038, "local variables cannot be textures or samplers");
                return false;
            }
        }

        if !self.parse_array_size(&mut ty) {
            return false;
        }

        let unique_name = if global {
            let prefix = if ty.has(Qualifiers::UNIFORM) { 'U' } else { 'V' };
            self.decorated_name(prefix, &name)
        } else {
            name.clone()
        };

        let mut semantic = String::new();
        let mut annotations = crate::Annotations::default();
        let mut properties = VariableProperties::default();
        let mut initializer = Expr::default();

        if self.accept(TokenValue::Colon) {
            let identifier = match self.expect_identifier() {
                Some(identifier) => identifier,
                None => return false,
            };
            if !global {
                let semantic_location = self.location();
                self.error(&semantic_location, 3043, "local variables cannot have semantics");
                return false;
            }
            semantic = identifier.to_ascii_uppercase();
        } else {
            if global && !self.parse_annotations(&mut annotations) {
                return false;
            }

            if self.accept(TokenValue::Assign) {
                if !self.parse_expression_assignment(section, &mut initializer) {
                    return false;
                }

                if global && !initializer.is_constant {
                    self.error(
                        &initializer.location,
                        3011,
                        "initial value must be a literal expression",
                    );
                    return false;
                }

                if (ty.array_length >= 0 && initializer.ty.array_length != ty.array_length)
                    || Type::rank(&initializer.ty, &ty) == 0
                {
                    self.error(
                        &initializer.location,
                        3017,
                        "initial value does not match variable type",
                    );
                    return false;
                }
                if (initializer.ty.rows < ty.rows || initializer.ty.cols < ty.cols)
                    && !initializer.ty.is_scalar()
                {
                    self.error(
                        &initializer.location,
                        3017,
                        "cannot implicitly convert these vector types",
                    );
                    return false;
                }
                if initializer.ty.components() > ty.components() {
                    self.warning(
                        &initializer.location,
                        3206,
                        "implicit truncation of vector type",
                    );
                } else if initializer.ty.is_floating_point() && ty.is_integral() {
                    // Demoting the base type loses information just like
                    // dropping lanes does.
                    self.warning(
                        &initializer.location,
                        3206,
                        "implicit truncation of vector type",
                    );
                }

                // Unsized arrays take their length from the initializer.
                if initializer.ty.is_array() {
                    ty.array_length = initializer.ty.array_length;
                }

                initializer.add_cast_operation(ty);
            } else if ty.is_numeric() {
                if ty.has(Qualifiers::CONST) {
                    self.error(&location, 3012, format!("missing initial value for '{name}'"));
                    return false;
                }
                if !ty.has(Qualifiers::UNIFORM) {
                    // Non-uniform numeric variables are zero initialized.
                    initializer.reset_to_rvalue_constant(ty, location.clone(), Default::default());
                }
            } else if self.peek(TokenValue::LeftBrace) {
                if !self.parse_variable_properties(&mut properties) {
                    return false;
                }
            }
        }

        let symbol;
        if ty.is_numeric() && ty.has(Qualifiers::CONST) && initializer.is_constant {
            // Constant-initialized constants become named constants and
            // never materialize as variables.
            symbol = Symbol::constant(ty, initializer.constant.clone());
        } else if ty.is_texture() {
            let id = self.writer.make_id();
            symbol = Symbol::variable(id, ty, StorageClass::UniformConstant);
            self.texture_semantics.insert(id, semantic.clone());
            self.textures.push(TextureInfo {
                id,
                name: name.clone(),
                unique_name,
                semantic,
                annotations,
                width: properties.width,
                height: properties.height,
                levels: properties.levels,
                format: properties.format,
                srgb: properties.srgb,
            });
        } else if ty.is_sampler() {
            if properties.texture == 0 {
                self.error(&location, 3012, format!("missing 'Texture' property for '{name}'"));
                return false;
            }
            let semantic = self
                .texture_semantics
                .get(&properties.texture)
                .cloned()
                .unwrap_or_default();

            ty.is_pointer = true;
            let id = self.writer.make_id();
            let class = if global {
                StorageClass::UniformConstant
            } else {
                StorageClass::Function
            };
            self.writer
                .define_global_variable(id, &ty.element_type(), class, None);
            self.writer.set_name(id, &unique_name);

            if !semantic.is_empty() {
                // Records which texture the combined sampler reads, for
                // the host to bind.
                self.writer.decorate_string(
                    id,
                    spirv::Decoration::HlslSemanticGOOGLE,
                    &semantic,
                );
            }

            symbol = Symbol::variable(id, ty, class);
            self.samplers.push(SamplerInfo {
                id,
                name: name.clone(),
                unique_name,
                texture: properties.texture,
                annotations,
                address_u: properties.address_u,
                address_v: properties.address_v,
                address_w: properties.address_w,
                filter: properties.filter,
                min_lod: properties.min_lod,
                max_lod: properties.max_lod,
                lod_bias: properties.lod_bias,
                srgb: properties.srgb,
            });
        } else if ty.has(Qualifiers::UNIFORM) {
            let (ubo_type, ubo_variable) = self.global_ubo_ids();

            // Boolean uniforms widen to uint so they have a defined size.
            if ty.is_boolean() {
                ty.base = BaseType::Uint;
            }

            let member_index = self.uniforms.len() as u32;
            self.writer.set_member_name(ubo_type, member_index, &name);

            // std140: alignment equals the rounded-up member size, with
            // three-component vectors padded to four slots.
            let size = 4
                * (if ty.rows == 3 { 4 } else { ty.rows })
                * ty.cols
                * (ty.array_length.max(1) as u32);
            let offset = align(self.global_ubo_offset, size);
            self.writer.decorate_member(
                ubo_type,
                member_index,
                spirv::Decoration::Offset,
                &[offset],
            );
            self.global_ubo_offset = offset + size;

            self.uniforms.push(UniformInfo {
                name: name.clone(),
                ty,
                offset,
                size,
                annotations,
            });

            symbol = Symbol {
                op: Op::Variable,
                id: ubo_variable,
                ty,
                member_index: Some(member_index),
                class: StorageClass::Uniform,
                ..Symbol::default()
            };
        } else {
            ty.is_pointer = true;
            let has_initializer = !initializer.ty.is_void();

            let id;
            if initializer.is_constant || !has_initializer {
                // `OpVariable` initializers must be constants; variables
                // without one stay undefined until first written.
                let constant = if has_initializer {
                    Some(
                        self.writer
                            .get_constant(&initializer.ty, &initializer.constant),
                    )
                } else {
                    None
                };
                if global {
                    id = self.writer.make_id();
                    self.writer.define_global_variable(
                        id,
                        &ty.element_type(),
                        StorageClass::Private,
                        constant,
                    );
                } else {
                    let function = self.current_function.unwrap();
                    id = self
                        .writer
                        .define_local_variable(function, &ty.element_type(), constant);
                }
                self.writer.set_name(id, &unique_name);
            } else {
                // Non-constant initializers store explicitly at the
                // declaration point.
                let value = self.access_chain_load(section, &initializer);
                let function = self.current_function.unwrap();
                id = self
                    .writer
                    .define_local_variable(function, &ty.element_type(), None);
                self.writer.set_name(id, &unique_name);

                let mut variable = Expr::default();
                variable.reset_to_lvalue(id, ty, location.clone(), StorageClass::Function);
                let value_ty = initializer.ty;
                self.access_chain_store(section, &variable, value, &value_ty);
            }

            let class = if global {
                StorageClass::Private
            } else {
                StorageClass::Function
            };
            symbol = Symbol::variable(id, ty, class);
        }

        if !self.symbols.insert_symbol(&name, symbol, global) {
            self.error(&location, 3003, format!("redefinition of '{name}'"));
            return false;
        }

        true
    }

    fn parse_variable_properties(&mut self, properties: &mut VariableProperties) -> bool {
        if !self.expect(TokenValue::LeftBrace) {
            return false;
        }

        while !self.peek(TokenValue::RightBrace) {
            let name = match self.expect_identifier() {
                Some(name) => name,
                None => {
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
            };
            let location = self.location();

            if !self.expect(TokenValue::Assign) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }

            let snapshot = self.backup();
            let mut expression = Expr::default();

            // Property values may be special enumeration names, compared
            // case-insensitively.
            if let Some(identifier) = self.accept_identifier() {
                let upper = identifier.to_ascii_uppercase();
                const VALUES: &[(&str, u32)] = &[
                    ("NONE", 0),
                    ("POINT", 0),
                    ("LINEAR", 1),
                    ("ANISOTROPIC", 3),
                    ("WRAP", 1),
                    ("REPEAT", 1),
                    ("MIRROR", 2),
                    ("CLAMP", 3),
                    ("BORDER", 4),
                    ("R8", 1),
                    ("R16F", 2),
                    ("R32F", 3),
                    ("RG8", 4),
                    ("R8G8", 4),
                    ("RG16", 5),
                    ("R16G16", 5),
                    ("RG16F", 6),
                    ("R16G16F", 6),
                    ("RG32F", 7),
                    ("R32G32F", 7),
                    ("RGBA8", 8),
                    ("R8G8B8A8", 8),
                    ("RGBA16", 9),
                    ("R16G16B16A16", 9),
                    ("RGBA16F", 10),
                    ("R16G16B16A16F", 10),
                    ("RGBA32F", 11),
                    ("R32G32B32A32F", 11),
                    ("DXT1", 12),
                    ("DXT3", 13),
                    ("DXT4", 14),
                    ("LATC1", 15),
                    ("LATC2", 16),
                ];
                match VALUES.iter().find(|&&(name, _)| name == upper) {
                    Some(&(_, value)) => {
                        expression.reset_to_rvalue_constant(
                            Type::UINT,
                            self.location(),
                            crate::Constant::from_uint(value),
                        );
                    }
                    None => self.restore(snapshot),
                }
            }

            if !expression.is_constant {
                let mut section = Section::default();
                if !self.parse_expression_multary(&mut section, &mut expression, 0) {
                    let next_location = self.next_location();
                    let found = self.next_token.value.clone();
                    self.error(
                        &next_location,
                        3000,
                        format!("syntax error: unexpected '{found}', expected expression"),
                    );
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
            }

            if name == "Texture" {
                if !expression.ty.is_texture() {
                    self.error(&location, 3020, "type mismatch, expected texture name");
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
                properties.texture = expression.base;
            } else {
                if !expression.is_constant || !expression.ty.is_scalar() {
                    self.error(
                        &expression.location,
                        3011,
                        "value must be a literal scalar expression",
                    );
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
                expression.add_cast_operation(Type::UINT);
                let value = expression.constant.as_uint(0);

                match name.as_str() {
                    "Width" => properties.width = value.max(1),
                    "Height" => properties.height = value.max(1),
                    "MipLevels" => properties.levels = value.max(1),
                    "Format" => properties.format = value,
                    "SRGBTexture" | "SRGBReadEnable" => properties.srgb = value != 0,
                    "AddressU" => properties.address_u = value,
                    "AddressV" => properties.address_v = value,
                    "AddressW" => properties.address_w = value,
                    "MinFilter" => {
                        properties.filter = (properties.filter & 0x0F) | ((value << 4) & 0x30)
                    }
                    "MagFilter" => {
                        properties.filter = (properties.filter & 0x33) | ((value << 2) & 0x0C)
                    }
                    "MipFilter" => properties.filter = (properties.filter & 0x3C) | (value & 0x03),
                    "MinLOD" | "MaxMipLevel" => properties.min_lod = value as f32,
                    "MaxLOD" => properties.max_lod = value as f32,
                    "MipLODBias" | "MipMapLodBias" => properties.lod_bias = value as f32,
                    _ => {
                        self.error(&location, 3004, format!("unrecognized property '{name}'"));
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                }
            }

            if !self.expect(TokenValue::Semicolon) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
        }

        self.expect(TokenValue::RightBrace)
    }

    pub(crate) fn parse_technique(&mut self) -> bool {
        let name = match self.expect_identifier() {
            Some(name) => name,
            None => return false,
        };

        let mut info = TechniqueInfo {
            name: name.clone(),
            unique_name: self.decorated_name('T', &name),
            ..TechniqueInfo::default()
        };

        if !self.parse_annotations(&mut info.annotations) || !self.expect(TokenValue::LeftBrace) {
            return false;
        }

        while !self.peek(TokenValue::RightBrace) && !self.peek(TokenValue::End) {
            let mut pass = PassInfo::default();
            if self.parse_technique_pass(&mut pass) {
                info.passes.push(pass);
            } else if !self.peek(TokenValue::Pass) {
                // Unless another pass follows the error, give up on the
                // whole technique.
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
        }

        self.techniques.push(info);
        self.expect(TokenValue::RightBrace)
    }

    fn parse_technique_pass(&mut self, info: &mut PassInfo) -> bool {
        if !self.expect(TokenValue::Pass) {
            return false;
        }

        // Passes may carry an optional name.
        if let Some(name) = self.accept_identifier() {
            info.name = name;
        }

        if !self.expect(TokenValue::LeftBrace) {
            return false;
        }

        while !self.peek(TokenValue::RightBrace) {
            let state = match self.expect_identifier() {
                Some(state) => state,
                None => {
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
            };
            let mut location = self.location();

            if !self.expect(TokenValue::Assign) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }

            let is_shader_state = state == "VertexShader" || state == "PixelShader";
            let is_texture_state = state.as_bytes().starts_with(b"RenderTarget")
                && (state.len() == 12 || matches!(state.as_bytes()[12], b'0'..=b'7'));

            if is_shader_state || is_texture_state {
                // These states name symbols rather than scalar values.
                let exclusive = self.accept(TokenValue::ColonColon);
                let mut identifier = match self.expect_identifier() {
                    Some(identifier) => identifier,
                    None => {
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                };
                while self.accept(TokenValue::ColonColon) {
                    match self.expect_identifier() {
                        Some(part) => {
                            identifier.push_str("::");
                            identifier.push_str(&part);
                        }
                        None => {
                            self.consume_until(TokenValue::RightBrace);
                            return false;
                        }
                    }
                }
                location = self.location();

                let scope = if exclusive {
                    super::symbols::Scope::global()
                } else {
                    self.symbols.current_scope().clone()
                };
                let symbol = self.symbols.find_symbol(&identifier, &scope, exclusive);

                if is_shader_state {
                    let symbol = match symbol {
                        Some(symbol) => symbol,
                        None => {
                            self.error(
                                &location,
                                3004,
                                format!("undeclared identifier '{identifier}', expected function name"),
                            );
                            self.consume_until(TokenValue::RightBrace);
                            return false;
                        }
                    };
                    if !symbol.ty.is_function() {
                        self.error(&location, 3020, "type mismatch, expected function name");
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                    // Skip over dummies inserted during error recovery.
                    let index = match symbol.function {
                        Some(index) if symbol.id != DUMMY_ID => index,
                        _ => {
                            self.consume_until(TokenValue::RightBrace);
                            return false;
                        }
                    };

                    let stage = if state.starts_with('V') {
                        ShaderStage::Vertex
                    } else {
                        ShaderStage::Fragment
                    };
                    if self.functions[index].entry_point == 0 {
                        self.synthesize_entry_point(index, stage);
                    }
                    match stage {
                        ShaderStage::Vertex => {
                            info.vs_entry_point = self.functions[index].name.clone()
                        }
                        ShaderStage::Fragment => {
                            info.ps_entry_point = self.functions[index].name.clone()
                        }
                    }
                } else {
                    let symbol = match symbol {
                        Some(symbol) => symbol,
                        None => {
                            self.error(
                                &location,
                                3004,
                                format!("undeclared identifier '{identifier}', expected texture name"),
                            );
                            self.consume_until(TokenValue::RightBrace);
                            return false;
                        }
                    };
                    if !symbol.ty.is_texture() {
                        self.error(&location, 3020, "type mismatch, expected texture name");
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                    let target_index = if state.len() > 12 {
                        (state.as_bytes()[12] - b'0') as usize
                    } else {
                        0
                    };
                    info.render_targets[target_index] = symbol.id;
                }
            } else {
                let snapshot = self.backup();
                let mut expression = Expr::default();

                if let Some(identifier) = self.accept_identifier() {
                    let upper = identifier.to_ascii_uppercase();
                    const ENUM_VALUES: &[(&str, u32)] = &[
                        ("NONE", 0),
                        ("ZERO", 0),
                        ("ONE", 1),
                        ("SRCCOLOR", 2),
                        ("SRCALPHA", 3),
                        ("INVSRCCOLOR", 4),
                        ("INVSRCALPHA", 5),
                        ("DESTCOLOR", 8),
                        ("DESTALPHA", 6),
                        ("INVDESTCOLOR", 9),
                        ("INVDESTALPHA", 7),
                        ("ADD", 1),
                        ("SUBTRACT", 2),
                        ("REVSUBTRACT", 3),
                        ("MIN", 4),
                        ("MAX", 5),
                        ("KEEP", 1),
                        ("REPLACE", 3),
                        ("INVERT", 6),
                        ("INCR", 7),
                        ("INCRSAT", 4),
                        ("DECR", 8),
                        ("DECRSAT", 5),
                        ("NEVER", 1),
                        ("ALWAYS", 8),
                        ("LESS", 2),
                        ("GREATER", 5),
                        ("LEQUAL", 4),
                        ("LESSEQUAL", 4),
                        ("GEQUAL", 7),
                        ("GREATEREQUAL", 7),
                        ("EQUAL", 3),
                        ("NEQUAL", 6),
                        ("NOTEQUAL", 6),
                    ];
                    match ENUM_VALUES.iter().find(|&&(name, _)| name == upper) {
                        Some(&(_, value)) => {
                            expression.reset_to_rvalue_constant(
                                Type::UINT,
                                self.location(),
                                crate::Constant::from_uint(value),
                            );
                        }
                        None => self.restore(snapshot),
                    }
                }

                if !expression.is_constant {
                    let mut section = Section::default();
                    if !self.parse_expression_multary(&mut section, &mut expression, 0) {
                        let next_location = self.next_location();
                        let found = self.next_token.value.clone();
                        self.error(
                            &next_location,
                            3000,
                            format!("syntax error: unexpected '{found}', expected expression"),
                        );
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                }
                if !expression.is_constant || !expression.ty.is_scalar() {
                    self.error(
                        &expression.location,
                        3011,
                        "pass state value must be a literal scalar expression",
                    );
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }

                expression.add_cast_operation(Type::UINT);
                let value = expression.constant.as_uint(0);

                match state.as_str() {
                    "SRGBWriteEnable" => info.srgb_write_enable = value != 0,
                    "BlendEnable" => info.blend_enable = value != 0,
                    "StencilEnable" => info.stencil_enable = value != 0,
                    "ClearRenderTargets" => info.clear_render_targets = value != 0,
                    "RenderTargetWriteMask" | "ColorWriteMask" => {
                        info.color_write_mask = value & 0xFF
                    }
                    "StencilReadMask" | "StencilMask" => info.stencil_read_mask = value & 0xFF,
                    "StencilWriteMask" => info.stencil_write_mask = value & 0xFF,
                    "BlendOp" => info.blend_op = value,
                    "BlendOpAlpha" => info.blend_op_alpha = value,
                    "SrcBlend" => info.src_blend = value,
                    "SrcBlendAlpha" => info.src_blend_alpha = value,
                    "DestBlend" => info.dest_blend = value,
                    "DestBlendAlpha" => info.dest_blend_alpha = value,
                    "StencilFunc" => info.stencil_comparison_func = value,
                    "StencilRef" => info.stencil_reference_value = value,
                    "StencilPass" | "StencilPassOp" => info.stencil_op_pass = value,
                    "StencilFail" | "StencilFailOp" => info.stencil_op_fail = value,
                    "StencilZFail" | "StencilDepthFail" | "StencilDepthFailOp" => {
                        info.stencil_op_depth_fail = value
                    }
                    _ => {
                        self.error(&location, 3004, format!("unrecognized pass state '{state}'"));
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                }
            }

            if !self.expect(TokenValue::Semicolon) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
        }

        self.expect(TokenValue::RightBrace)
    }

    /// Add one Input or Output interface variable for `member`, decorated
    /// with its built-in role or location plus any interpolation
    /// qualifiers.
    fn add_interface_variable(
        &mut self,
        member: &StructMember,
        output: bool,
        is_ps: bool,
        interface: &mut Vec<Word>,
    ) -> Word {
        let class = if output {
            StorageClass::Output
        } else {
            StorageClass::Input
        };
        let mut ty = member.ty;
        ty.is_pointer = true;
        ty.is_input = !output;
        ty.is_output = output;

        let id = self.writer.make_id();
        self.writer
            .define_global_variable(id, &ty.element_type(), class, None);

        match member.builtin {
            // Fragment shaders read the rasterized position.
            Some(spirv::BuiltIn::Position) if is_ps && !output => {
                self.writer.decorate_builtin(id, spirv::BuiltIn::FragCoord)
            }
            Some(builtin) => self.writer.decorate_builtin(id, builtin),
            None => self.writer.decorate(
                id,
                spirv::Decoration::Location,
                &[member.semantic_index],
            ),
        }

        if member.ty.has(Qualifiers::NOPERSPECTIVE) {
            self.writer.decorate(id, spirv::Decoration::NoPerspective, &[]);
        }
        if member.ty.has(Qualifiers::CENTROID) {
            self.writer.decorate(id, spirv::Decoration::Centroid, &[]);
        }
        if member.ty.has(Qualifiers::NOINTERPOLATION) {
            self.writer.decorate(id, spirv::Decoration::Flat, &[]);
        }

        interface.push(id);
        id
    }

    /// Wrap a user function in a `void()` entry point that shuttles values
    /// between flat Input/Output interface variables and the function's
    /// typed parameters.
    fn synthesize_entry_point(&mut self, index: usize, stage: ShaderStage) {
        let function = self.functions[index].clone();
        let is_ps = stage == ShaderStage::Fragment;

        let entry_id = self.writer.make_id();
        self.functions[index].entry_point = entry_id;

        let wrapper_index = self.writer.begin_function(entry_id, &Type::VOID);
        self.functions.push(FunctionInfo {
            name: String::new(),
            unique_name: String::new(),
            return_type: Type::VOID,
            return_builtin: None,
            return_semantic_index: 0,
            parameters: vec![],
            definition: entry_id,
            entry_point: 0,
        });
        self.writer.seal_function_signature(wrapper_index);

        let saved_function = self.current_function;
        let saved_block = self.current_block;
        self.current_function = Some(wrapper_index);

        let entry_label = self.writer.make_id();
        self.writer
            .function_mut(wrapper_index)
            .variables
            .push(Instruction::label(entry_label));
        self.current_block = entry_label;

        let mut section = Section::default();
        let mut interface: Vec<Word> = vec![];
        let mut call_params: Vec<Word> = vec![];

        // Inputs: one interface variable per parameter, or per member for
        // struct parameters, reassembled into the callee's argument.
        for param in &function.parameters {
            let value_ty = {
                let mut ty = param.ty;
                ty.is_pointer = false;
                ty
            };
            let variable = self
                .writer
                .define_local_variable(wrapper_index, &value_ty, None);
            call_params.push(variable);

            if param.ty.has(Qualifiers::OUT) {
                if param.ty.is_struct() {
                    let members = self.structs[&param.ty.definition].members.clone();
                    for member in &members {
                        self.add_interface_variable(member, true, is_ps, &mut interface);
                    }
                } else {
                    self.add_interface_variable(param, true, is_ps, &mut interface);
                }
            } else if param.ty.is_struct() {
                let members = self.structs[&param.ty.definition].members.clone();
                let mut elements = vec![];
                for member in &members {
                    let input = self.add_interface_variable(member, false, is_ps, &mut interface);
                    let type_id = self.writer.get_type_id(&member.ty);
                    let value = self.writer.make_id();
                    section.push(Instruction::load(type_id, value, input));
                    elements.push(value);
                }
                let struct_type_id = self.writer.get_type_id(&value_ty);
                let composite = self.writer.make_id();
                section.push(Instruction::composite_construct(
                    struct_type_id,
                    composite,
                    &elements,
                ));
                section.push(Instruction::store(variable, composite));
            } else {
                let input = self.add_interface_variable(param, false, is_ps, &mut interface);
                let type_id = self.writer.get_type_id(&value_ty);
                let value = self.writer.make_id();
                section.push(Instruction::load(type_id, value, input));
                section.push(Instruction::store(variable, value));
            }
        }

        let return_type_id = self.writer.get_type_id(&function.return_type);
        let call_result = self.writer.make_id();
        section.push(Instruction::function_call(
            return_type_id,
            call_result,
            function.definition,
            &call_params,
        ));

        // Outputs: copy `out` parameters back into their interface
        // variables, flattening structs member by member.
        let mut interface_index = 0;
        for (param_index, param) in function.parameters.iter().enumerate() {
            if param.ty.has(Qualifiers::OUT) {
                let value_ty = {
                    let mut ty = param.ty;
                    ty.is_pointer = false;
                    ty
                };
                let type_id = self.writer.get_type_id(&value_ty);
                let value = self.writer.make_id();
                section.push(Instruction::load(type_id, value, call_params[param_index]));

                if param.ty.is_struct() {
                    let members = self.structs[&param.ty.definition].members.clone();
                    for (member_index, member) in members.iter().enumerate() {
                        let member_type_id = self.writer.get_type_id(&member.ty);
                        let member_value = self.writer.make_id();
                        section.push(Instruction::composite_extract(
                            member_type_id,
                            member_value,
                            value,
                            &[member_index as u32],
                        ));
                        section.push(Instruction::store(interface[interface_index], member_value));
                        interface_index += 1;
                    }
                } else {
                    section.push(Instruction::store(interface[interface_index], value));
                    interface_index += 1;
                }
            } else if param.ty.is_struct() {
                interface_index += self.structs[&param.ty.definition].members.len();
            } else {
                interface_index += 1;
            }
        }

        // The return value becomes one more output, or several for struct
        // returns.
        if function.return_type.is_struct() {
            let members = self.structs[&function.return_type.definition].members.clone();
            for (member_index, member) in members.iter().enumerate() {
                let output = self.add_interface_variable(member, true, is_ps, &mut interface);
                let member_type_id = self.writer.get_type_id(&member.ty);
                let member_value = self.writer.make_id();
                section.push(Instruction::composite_extract(
                    member_type_id,
                    member_value,
                    call_result,
                    &[member_index as u32],
                ));
                section.push(Instruction::store(output, member_value));
            }
        } else if !function.return_type.is_void() {
            let result_member = StructMember {
                name: String::new(),
                ty: function.return_type,
                builtin: function.return_builtin,
                semantic_index: function.return_semantic_index,
            };
            let output = self.add_interface_variable(&result_member, true, is_ps, &mut interface);
            section.push(Instruction::store(output, call_result));
        }

        self.leave_block_and_return(&mut section, None);
        self.writer
            .function_mut(wrapper_index)
            .definition
            .append(&mut section);

        self.current_function = saved_function;
        self.current_block = saved_block;

        self.writer
            .add_entry_point(stage, entry_id, &function.name, &interface);
    }
}
