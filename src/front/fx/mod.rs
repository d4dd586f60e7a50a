/*!
Front end for the Effect FX language.

[`Frontend::compile`] drives the whole pipeline: a recursive-descent parser
that type-checks and emits SPIR-V in a single pass over the token stream,
with no intermediate AST. Statements lower into structured control flow
(every loop and selection carries its merge annotations), declarations
populate the symbol table and the pipeline-state bundle, and the global
uniform block is sealed with std140 offsets once the stream is exhausted.

Errors are reported and recovered from: the parser resynchronizes on `;`,
`}` or `>` and keeps going so one mistake does not hide the next. A
compilation succeeds only if no error-severity diagnostic was produced.
*/

mod builtins;
mod chain;
mod declarations;
mod expressions;
mod statements;
mod symbols;
pub mod token;

use crate::back::spv::{Instruction, Section, Writer};
use crate::{
    Annotations, FastHashMap, Module, Qualifiers, SamplerInfo, TechniqueInfo, TextureInfo, Type,
    UniformInfo,
};
use builtins::IntrinsicTable;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use symbols::SymbolTable;
use termcolor::{NoColor, WriteColor};
use thiserror::Error as ThisError;
use token::{SourceLocation, Token, TokenStream, TokenValue};

use spirv::Word;

/// Front end configuration.
#[derive(Clone, Debug)]
pub struct Options {
    /// Lower `&&`, `||` and `?:` as branching constructs that only evaluate
    /// the right hand side when needed. When disabled both sides are always
    /// evaluated and combined with a logical instruction or `OpSelect`.
    pub short_circuit: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            short_circuit: true,
        }
    }
}

/// A single diagnostic with an HLSL-compatible error code.
#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub location: SourceLocation,
    pub code: u32,
    pub message: String,
}

/// Every error produced during a failed compilation, plus the full
/// formatted diagnostic buffer (errors and warnings interleaved in source
/// order) that hosts surface to the user.
#[derive(Clone, Debug, Default)]
pub struct ParseErrors {
    pub errors: Vec<Error>,
    pub log: String,
}

impl ParseErrors {
    /// Pretty-print through `codespan-reporting`, one diagnostic per error.
    pub fn emit_to_writer(&self, writer: &mut impl WriteColor, source_name: &str) {
        let files = SimpleFile::new(source_name.to_owned(), String::new());
        let config = term::Config::default();
        for error in &self.errors {
            let diagnostic = Diagnostic::error()
                .with_message(error.message.clone())
                .with_notes(vec![format!(
                    "{}({}, {})",
                    error.location.source, error.location.line, error.location.column
                )]);
            let _ = term::emit(writer, &config, &files, &diagnostic);
        }
    }

    pub fn emit_to_string(&self, source_name: &str) -> String {
        let mut writer = NoColor::new(Vec::new());
        self.emit_to_writer(&mut writer, source_name);
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.log)
    }
}

impl std::error::Error for ParseErrors {}

/// One member of a struct, or one function parameter (they share a shape).
#[derive(Clone, Debug)]
pub(crate) struct StructMember {
    pub name: String,
    pub ty: Type,
    pub builtin: Option<spirv::BuiltIn>,
    pub semantic_index: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct StructInfo {
    pub name: String,
    pub definition: Word,
    pub members: Vec<StructMember>,
}

#[derive(Clone, Debug)]
pub(crate) struct FunctionInfo {
    pub name: String,
    pub unique_name: String,
    pub return_type: Type,
    pub return_builtin: Option<spirv::BuiltIn>,
    pub return_semantic_index: u32,
    pub parameters: Vec<StructMember>,
    /// Id of the `OpFunction`.
    pub definition: Word,
    /// Id of the synthesized stage wrapper, zero until one is needed.
    pub entry_point: Word,
}

/// Snapshot of the token cursor for one level of speculative parsing.
pub(crate) struct Backup {
    position: usize,
    token: Token,
    next_token: Token,
}

/// The Effect FX compiler.
pub struct Frontend {
    options: Options,
    pub(crate) writer: Writer,
    stream: TokenStream,
    token: Token,
    next_token: Token,
    log: String,
    error_list: Vec<Error>,

    pub(crate) symbols: SymbolTable,
    pub(crate) intrinsics: IntrinsicTable,
    pub(crate) structs: FastHashMap<Word, StructInfo>,
    pub(crate) functions: Vec<FunctionInfo>,
    pub(crate) current_function: Option<usize>,
    pub(crate) current_block: Word,
    pub(crate) loop_break_targets: Vec<Word>,
    pub(crate) loop_continue_targets: Vec<Word>,

    pub(crate) techniques: Vec<TechniqueInfo>,
    pub(crate) textures: Vec<TextureInfo>,
    pub(crate) samplers: Vec<SamplerInfo>,
    pub(crate) uniforms: Vec<UniformInfo>,
    pub(crate) texture_semantics: FastHashMap<Word, String>,
    pub(crate) global_ubo_type: Word,
    pub(crate) global_ubo_variable: Word,
    pub(crate) global_ubo_offset: u32,
}

impl Frontend {
    pub fn new(options: &Options) -> Self {
        let end = Token::new(TokenValue::End, SourceLocation::default());
        Frontend {
            options: options.clone(),
            writer: Writer::new(),
            stream: TokenStream::new(vec![]),
            token: end.clone(),
            next_token: end,
            log: String::new(),
            error_list: vec![],
            symbols: SymbolTable::new(),
            intrinsics: IntrinsicTable::new(),
            structs: FastHashMap::default(),
            functions: vec![],
            current_function: None,
            current_block: 0,
            loop_break_targets: vec![],
            loop_continue_targets: vec![],
            techniques: vec![],
            textures: vec![],
            samplers: vec![],
            uniforms: vec![],
            texture_semantics: FastHashMap::default(),
            global_ubo_type: 0,
            global_ubo_variable: 0,
            global_ubo_offset: 0,
        }
    }

    /// Compile a token stream into a module.
    ///
    /// On failure the returned [`ParseErrors`] carries every diagnostic;
    /// the parser recovers and keeps going after errors, so several may
    /// accumulate from a single compilation.
    pub fn compile(mut self, tokens: Vec<Token>) -> Result<Module, ParseErrors> {
        self.stream = TokenStream::new(tokens);
        self.next_token = self.stream.next();

        while !self.peek(TokenValue::End) {
            self.parse_top_level();
        }

        self.seal_global_uniforms();

        if !self.error_list.is_empty() {
            log::debug!(
                "compilation failed with {} error(s)",
                self.error_list.len()
            );
            return Err(ParseErrors {
                errors: self.error_list,
                log: self.log,
            });
        }

        Ok(Module {
            spirv: self.writer.write(),
            techniques: self.techniques,
            textures: self.textures,
            samplers: self.samplers,
            uniforms: self.uniforms,
            diagnostics: self.log,
        })
    }

    //
    // Diagnostics
    //

    pub(crate) fn error(&mut self, location: &SourceLocation, code: u32, message: impl Into<String>) {
        let message = message.into();
        self.log.push_str(&format!(
            "{}({}, {}): ",
            location.source, location.line, location.column
        ));
        if code == 0 {
            self.log.push_str("error: ");
        } else {
            self.log.push_str(&format!("error X{code}: "));
        }
        self.log.push_str(&message);
        self.log.push('\n');
        self.error_list.push(Error {
            location: location.clone(),
            code,
            message,
        });
    }

    pub(crate) fn warning(
        &mut self,
        location: &SourceLocation,
        code: u32,
        message: impl Into<String>,
    ) {
        self.log.push_str(&format!(
            "{}({}, {}): ",
            location.source, location.line, location.column
        ));
        if code == 0 {
            self.log.push_str("warning: ");
        } else {
            self.log.push_str(&format!("warning X{code}: "));
        }
        self.log.push_str(&message.into());
        self.log.push('\n');
    }

    //
    // Token management
    //

    pub(crate) fn peek(&self, value: TokenValue) -> bool {
        self.next_token.value == value
    }

    pub(crate) fn consume(&mut self) {
        self.token = std::mem::replace(&mut self.next_token, self.stream.next());
    }

    pub(crate) fn accept(&mut self, value: TokenValue) -> bool {
        if self.peek(value) {
            self.consume();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, value: TokenValue) -> bool {
        if self.accept(value.clone()) {
            true
        } else {
            let location = self.next_token.location.clone();
            let found = self.next_token.value.clone();
            self.error(
                &location,
                3000,
                format!("syntax error: unexpected '{found}', expected '{value}'"),
            );
            false
        }
    }

    pub(crate) fn accept_identifier(&mut self) -> Option<String> {
        if let TokenValue::Identifier(ref name) = self.next_token.value {
            let name = name.clone();
            self.consume();
            Some(name)
        } else {
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<String> {
        match self.accept_identifier() {
            Some(name) => Some(name),
            None => {
                let location = self.next_token.location.clone();
                let found = self.next_token.value.clone();
                self.error(
                    &location,
                    3000,
                    format!("syntax error: unexpected '{found}', expected identifier"),
                );
                None
            }
        }
    }

    /// Skip ahead until `value` has been consumed, for error recovery.
    pub(crate) fn consume_until(&mut self, value: TokenValue) {
        while !self.accept(value.clone()) && !self.peek(TokenValue::End) {
            self.consume();
        }
    }

    /// Snapshot the cursor. [`Frontend::restore`] replays every token
    /// consumed since, including the lookahead window.
    pub(crate) fn backup(&self) -> Backup {
        Backup {
            position: self.stream.position(),
            token: self.token.clone(),
            next_token: self.next_token.clone(),
        }
    }

    pub(crate) fn restore(&mut self, backup: Backup) {
        self.stream.set_position(backup.position);
        self.token = backup.token;
        self.next_token = backup.next_token;
    }

    pub(crate) fn location(&self) -> SourceLocation {
        self.token.location.clone()
    }

    pub(crate) fn next_location(&self) -> SourceLocation {
        self.next_token.location.clone()
    }

    //
    // Type parsing
    //

    /// Accept a type keyword, generic `vector`/`matrix` form or struct
    /// name, writing the class into `ty` without touching its qualifiers.
    pub(crate) fn accept_type_class(&mut self, ty: &mut Type) -> bool {
        ty.rows = 0;
        ty.cols = 0;
        ty.definition = 0;

        if let TokenValue::Identifier(ref name) = self.next_token.value {
            let name = name.clone();
            let scope = self.symbols.current_scope().clone();
            match self.symbols.find_symbol(&name, &scope, false) {
                Some(symbol) if symbol.op == spirv::Op::TypeStruct => {
                    ty.base = crate::BaseType::Struct;
                    ty.definition = symbol.id;
                    self.consume();
                    return true;
                }
                _ => return false,
            }
        }

        if self.accept(TokenValue::Vector) {
            ty.base = crate::BaseType::Float;
            ty.rows = 4;
            ty.cols = 1;
            if self.accept(TokenValue::LeftAngle) {
                let mut element = Type::default();
                if !self.accept_type_class(&mut element) {
                    let location = self.next_location();
                    let found = self.next_token.value.clone();
                    self.error(
                        &location,
                        3000,
                        format!("syntax error: unexpected '{found}', expected vector element type"),
                    );
                    return false;
                }
                if !element.is_scalar() {
                    let location = self.location();
                    self.error(&location, 3122, "vector element type must be a scalar type");
                    return false;
                }
                ty.base = element.base;
                if !self.expect(TokenValue::Comma) {
                    return false;
                }
                let rows = match self.expect_int_literal() {
                    Some(rows) => rows,
                    None => return false,
                };
                if !(1..=4).contains(&rows) {
                    let location = self.location();
                    self.error(&location, 3052, "vector dimension must be between 1 and 4");
                    return false;
                }
                ty.rows = rows as u32;
                if !self.expect(TokenValue::RightAngle) {
                    return false;
                }
            }
            return true;
        }

        if self.accept(TokenValue::Matrix) {
            ty.base = crate::BaseType::Float;
            ty.rows = 4;
            ty.cols = 4;
            if self.accept(TokenValue::LeftAngle) {
                let mut element = Type::default();
                if !self.accept_type_class(&mut element) {
                    let location = self.next_location();
                    let found = self.next_token.value.clone();
                    self.error(
                        &location,
                        3000,
                        format!("syntax error: unexpected '{found}', expected matrix element type"),
                    );
                    return false;
                }
                if !element.is_scalar() {
                    let location = self.location();
                    self.error(&location, 3123, "matrix element type must be a scalar type");
                    return false;
                }
                ty.base = element.base;
                for dimension in [&mut ty.rows, &mut ty.cols] {
                    if !self.expect(TokenValue::Comma) {
                        return false;
                    }
                    let value = match self.expect_int_literal() {
                        Some(value) => value,
                        None => return false,
                    };
                    if !(1..=4).contains(&value) {
                        let location = self.location();
                        self.error(
                            &location,
                            3053,
                            "matrix dimensions must be between 1 and 4",
                        );
                        return false;
                    }
                    *dimension = value as u32;
                }
                if !self.expect(TokenValue::RightAngle) {
                    return false;
                }
            }
            return true;
        }

        if let TokenValue::TypeName(keyword) = self.next_token.value {
            ty.base = keyword.base;
            ty.rows = keyword.rows;
            ty.cols = keyword.cols;
            self.consume();
            return true;
        }

        false
    }

    fn expect_int_literal(&mut self) -> Option<i32> {
        if let TokenValue::IntConstant(value) = self.next_token.value {
            self.consume();
            Some(value)
        } else {
            let location = self.next_location();
            let found = self.next_token.value.clone();
            self.error(
                &location,
                3000,
                format!("syntax error: unexpected '{found}', expected 'integer literal'"),
            );
            None
        }
    }

    /// Accept any run of qualifier keywords, warning on duplicates.
    pub(crate) fn accept_type_qualifiers(&mut self, ty: &mut Type) -> bool {
        let mut qualifiers = Qualifiers::empty();

        // Storage
        if self.accept(TokenValue::Extern) {
            qualifiers |= Qualifiers::EXTERN;
        }
        if self.accept(TokenValue::Static) {
            qualifiers |= Qualifiers::STATIC;
        }
        if self.accept(TokenValue::Uniform) {
            qualifiers |= Qualifiers::UNIFORM;
        }
        if self.accept(TokenValue::Volatile) {
            qualifiers |= Qualifiers::VOLATILE;
        }
        if self.accept(TokenValue::Precise) {
            qualifiers |= Qualifiers::PRECISE;
        }

        if self.accept(TokenValue::In) {
            qualifiers |= Qualifiers::IN;
        }
        if self.accept(TokenValue::Out) {
            qualifiers |= Qualifiers::OUT;
        }
        if self.accept(TokenValue::InOut) {
            qualifiers |= Qualifiers::INOUT;
        }

        // Modifiers
        if self.accept(TokenValue::Const) {
            qualifiers |= Qualifiers::CONST;
        }

        // Interpolation
        if self.accept(TokenValue::Linear) {
            qualifiers |= Qualifiers::LINEAR;
        }
        if self.accept(TokenValue::NoPerspective) {
            qualifiers |= Qualifiers::NOPERSPECTIVE;
        }
        if self.accept(TokenValue::Centroid) {
            qualifiers |= Qualifiers::CENTROID;
        }
        if self.accept(TokenValue::NoInterpolation) {
            qualifiers |= Qualifiers::NOINTERPOLATION;
        }

        if qualifiers.is_empty() {
            return false;
        }
        if ty.qualifiers.contains(qualifiers) {
            let location = self.location();
            self.warning(&location, 3048, "duplicate usages specified");
        }
        ty.qualifiers |= qualifiers;

        // Keep accepting until no further qualifiers follow.
        self.accept_type_qualifiers(ty);
        true
    }

    pub(crate) fn parse_type(&mut self, ty: &mut Type) -> bool {
        ty.qualifiers = Qualifiers::empty();
        self.accept_type_qualifiers(ty);

        let location = self.next_location();
        if !self.accept_type_class(ty) {
            return false;
        }

        if ty.is_integral()
            && (ty.has(Qualifiers::CENTROID) || ty.has(Qualifiers::NOPERSPECTIVE))
        {
            self.error(
                &location,
                4576,
                "signature specifies invalid interpolation mode for integer component type",
            );
            return false;
        }
        if ty.has(Qualifiers::CENTROID) && !ty.has(Qualifiers::NOPERSPECTIVE) {
            ty.qualifiers |= Qualifiers::LINEAR;
        }
        true
    }

    /// Parse an optional `[n]` suffix. The length expression must fold to a
    /// scalar integer between 1 and 65536; a bare `[]` is an unsized array.
    pub(crate) fn parse_array_size(&mut self, ty: &mut Type) -> bool {
        ty.array_length = 0;

        if self.accept(TokenValue::LeftBracket) {
            if self.accept(TokenValue::RightBracket) {
                ty.array_length = -1;
                return true;
            }
            // The length is constant-folded, so emitted instructions go
            // nowhere.
            let mut section = Section::default();
            let mut expression = chain::Expr::default();
            if self.parse_expression(&mut section, &mut expression)
                && self.expect(TokenValue::RightBracket)
            {
                if !expression.is_constant
                    || !(expression.ty.is_scalar() && expression.ty.is_integral())
                {
                    self.error(
                        &expression.location,
                        3058,
                        "array dimensions must be literal scalar expressions",
                    );
                    return false;
                }
                let length = expression.constant.as_uint(0);
                if !(1..=65536).contains(&length) {
                    self.error(
                        &expression.location,
                        3059,
                        "array dimension must be between 1 and 65536",
                    );
                    return false;
                }
                ty.array_length = length as i32;
            } else {
                return false;
            }
        }
        true
    }

    //
    // Basic block management
    //

    pub(crate) fn enter_block(&mut self, section: &mut Section, label: Word) {
        debug_assert_eq!(self.current_block, 0, "previous block was not terminated");
        self.current_block = label;
        section.push(Instruction::label(label));
    }

    pub(crate) fn leave_block_and_branch(&mut self, section: &mut Section, target: Word) {
        if self.current_block == 0 {
            return;
        }
        section.push(Instruction::branch(target));
        self.current_block = 0;
    }

    pub(crate) fn leave_block_and_branch_conditional(
        &mut self,
        section: &mut Section,
        condition: Word,
        true_label: Word,
        false_label: Word,
    ) {
        if self.current_block == 0 {
            return;
        }
        section.push(Instruction::branch_conditional(
            condition,
            true_label,
            false_label,
        ));
        self.current_block = 0;
    }

    pub(crate) fn leave_block_and_return(&mut self, section: &mut Section, value: Option<Word>) {
        if self.current_block == 0 {
            return;
        }
        section.push(match value {
            Some(value) => Instruction::return_value(value),
            None => Instruction::return_void(),
        });
        self.current_block = 0;
    }

    pub(crate) fn leave_block_and_kill(&mut self, section: &mut Section) {
        if self.current_block == 0 {
            return;
        }
        section.push(Instruction::kill());
        self.current_block = 0;
    }

    //
    // Global uniform buffer
    //

    /// Reserve the `$Globals` ids on first use.
    pub(crate) fn global_ubo_ids(&mut self) -> (Word, Word) {
        if self.global_ubo_type == 0 {
            self.global_ubo_type = self.writer.make_id();
            self.global_ubo_variable = self.writer.make_id();
        }
        (self.global_ubo_type, self.global_ubo_variable)
    }

    /// Emit the `$Globals` uniform block once every declaration has been
    /// seen. Member offsets were assigned as the uniforms were parsed.
    fn seal_global_uniforms(&mut self) {
        if self.global_ubo_type == 0 {
            return;
        }
        let member_types: Vec<Type> = self.uniforms.iter().map(|uniform| uniform.ty).collect();
        let member_type_ids: Vec<Word> = member_types
            .iter()
            .map(|ty| self.writer.get_type_id(ty))
            .collect();
        self.writer
            .declare_struct(self.global_ubo_type, &member_type_ids);
        self.writer.set_name(self.global_ubo_type, "$Globals");
        self.writer
            .decorate(self.global_ubo_type, spirv::Decoration::Block, &[]);
        self.writer.decorate(
            self.global_ubo_variable,
            spirv::Decoration::DescriptorSet,
            &[0],
        );

        let block_type = Type {
            base: crate::BaseType::Struct,
            definition: self.global_ubo_type,
            qualifiers: Qualifiers::UNIFORM,
            ..Type::default()
        };
        self.writer.define_global_variable(
            self.global_ubo_variable,
            &block_type,
            spirv::StorageClass::Uniform,
            None,
        );
        self.writer.set_name(self.global_ubo_variable, "$Globals");
    }

    //
    // Shared helpers
    //

    /// Parse an annotation block `< name = constant; ... >` if present.
    pub(crate) fn parse_annotations(&mut self, annotations: &mut Annotations) -> bool {
        if !self.accept(TokenValue::LeftAngle) {
            return true;
        }

        let mut success = true;
        while !self.peek(TokenValue::RightAngle) {
            let mut ty = Type::default();
            if self.accept_type_class(&mut ty) {
                let location = self.location();
                self.warning(
                    &location,
                    4717,
                    "type prefixes for annotations are deprecated and ignored",
                );
            }

            let name = match self.expect_identifier() {
                Some(name) => name,
                None => return false,
            };

            let mut section = Section::default();
            let mut expression = chain::Expr::default();
            if !self.expect(TokenValue::Assign)
                || !self.parse_expression_unary(&mut section, &mut expression)
                || !self.expect(TokenValue::Semicolon)
            {
                return false;
            }

            if !expression.is_constant {
                self.error(
                    &expression.location,
                    3011,
                    "value must be a literal expression",
                );
                // The syntax is still fine, keep parsing annotations.
                success = false;
                continue;
            }

            annotations.insert(name, expression.constant);
        }

        self.expect(TokenValue::RightAngle) && success
    }

    /// Unique names prefix the scope path and flatten `:` characters, so
    /// `S::ns::Light` becomes `S__ns__Light`.
    pub(crate) fn decorated_name(&self, prefix: char, name: &str) -> String {
        let scoped = format!("{}{}{}", prefix, self.symbols.current_scope().name, name);
        scoped.replace(':', "_")
    }
}
