//! Expression parsing and lowering.
//!
//! Recursive descent with precedence climbing for binary operators.
//! Expressions stay symbolic as long as possible: constants fold without
//! emitting instructions, lvalues accumulate access-chain operations, and
//! values only materialize at rvalue sinks.

use super::builtins::Lowering;
use super::chain::Expr;
use super::symbols::{CallError, ResolvedCall, Scope};
use super::token::TokenValue;
use super::Frontend;
use crate::back::spv::{Instruction, Section};
use crate::{BaseType, Constant, Qualifiers, Type};
use spirv::{Op, StorageClass, Word};

impl Frontend {
    fn accept_unary_op(&mut self) -> Option<Op> {
        let op = match self.next_token.value {
            TokenValue::Bang => Op::LogicalNot,
            TokenValue::Plus => Op::Nop,
            TokenValue::Dash => Op::FNegate,
            TokenValue::Tilde => Op::Not,
            TokenValue::Increment => Op::FAdd,
            TokenValue::Decrement => Op::FSub,
            _ => return None,
        };
        self.consume();
        Some(op)
    }

    fn accept_postfix_op(&mut self, ty: &Type) -> Option<Op> {
        let op = match self.next_token.value {
            TokenValue::Increment => {
                if ty.is_integral() {
                    Op::IAdd
                } else {
                    Op::FAdd
                }
            }
            TokenValue::Decrement => {
                if ty.is_integral() {
                    Op::ISub
                } else {
                    Op::FSub
                }
            }
            _ => return None,
        };
        self.consume();
        Some(op)
    }

    /// Binary and ternary operators with their precedence, highest binds
    /// tightest. The token is left unconsumed so lower-precedence callers
    /// can leave it for their parent.
    fn peek_multary_op(&self) -> Option<(Op, u32)> {
        Some(match self.next_token.value {
            TokenValue::Percent => (Op::FRem, 11),
            TokenValue::Star => (Op::FMul, 11),
            TokenValue::Slash => (Op::FDiv, 11),
            TokenValue::Plus => (Op::FAdd, 10),
            TokenValue::Dash => (Op::FSub, 10),
            TokenValue::LeftShift => (Op::ShiftLeftLogical, 9),
            TokenValue::RightShift => (Op::ShiftRightLogical, 9),
            TokenValue::LeftAngle => (Op::FOrdLessThan, 8),
            TokenValue::RightAngle => (Op::FOrdGreaterThan, 8),
            TokenValue::LessEqual => (Op::FOrdLessThanEqual, 8),
            TokenValue::GreaterEqual => (Op::FOrdGreaterThanEqual, 8),
            TokenValue::Equal => (Op::LogicalEqual, 7),
            TokenValue::NotEqual => (Op::LogicalNotEqual, 7),
            TokenValue::Ampersand => (Op::BitwiseAnd, 6),
            TokenValue::Caret => (Op::BitwiseXor, 5),
            TokenValue::VerticalBar => (Op::BitwiseOr, 4),
            TokenValue::LogicalAnd => (Op::LogicalAnd, 3),
            TokenValue::LogicalOr => (Op::LogicalOr, 2),
            TokenValue::Question => (Op::Select, 1),
            _ => return None,
        })
    }

    fn accept_assignment_op(&mut self, ty: &Type) -> Option<Op> {
        let signed = ty.is_signed();
        let integral = ty.is_integral();
        let op = match self.next_token.value {
            TokenValue::Assign => Op::Nop,
            TokenValue::ModAssign => {
                if integral {
                    if signed {
                        Op::SRem
                    } else {
                        Op::UMod
                    }
                } else {
                    Op::FRem
                }
            }
            TokenValue::AndAssign => Op::BitwiseAnd,
            TokenValue::MulAssign => {
                if integral {
                    Op::IMul
                } else {
                    Op::FMul
                }
            }
            TokenValue::AddAssign => {
                if integral {
                    Op::IAdd
                } else {
                    Op::FAdd
                }
            }
            TokenValue::SubAssign => {
                if integral {
                    Op::ISub
                } else {
                    Op::FSub
                }
            }
            TokenValue::DivAssign => {
                if integral {
                    if signed {
                        Op::SDiv
                    } else {
                        Op::UDiv
                    }
                } else {
                    Op::FDiv
                }
            }
            TokenValue::LeftShiftAssign => Op::ShiftLeftLogical,
            TokenValue::RightShiftAssign => {
                if signed {
                    Op::ShiftRightArithmetic
                } else {
                    Op::ShiftRightLogical
                }
            }
            TokenValue::XorAssign => Op::BitwiseXor,
            TokenValue::OrAssign => Op::BitwiseOr,
            _ => return None,
        };
        self.consume();
        Some(op)
    }

    /// Parse a full expression, including comma sequences; the last element
    /// of the sequence is the result.
    pub(crate) fn parse_expression(&mut self, section: &mut Section, exp: &mut Expr) -> bool {
        if !self.parse_expression_assignment(section, exp) {
            return false;
        }
        while self.accept(TokenValue::Comma) {
            if !self.parse_expression_assignment(section, exp) {
                return false;
            }
        }
        true
    }

    pub(crate) fn parse_expression_unary(&mut self, section: &mut Section, exp: &mut Expr) -> bool {
        let location = self.next_location();

        // -- Prefix --
        if let Some(mut op) = self.accept_unary_op() {
            if !self.parse_expression_unary(section, exp) {
                return false;
            }
            if !exp.ty.is_scalar() && !exp.ty.is_vector() && !exp.ty.is_matrix() {
                self.error(&exp.location, 3022, "scalar, vector, or matrix expected");
                return false;
            }
            // Unary plus does not do anything.
            if op == Op::Nop {
                return self.parse_postfix(section, exp);
            }

            if op == Op::Not && !exp.ty.is_integral() {
                self.error(&exp.location, 3082, "int or unsigned int type required");
                return false;
            }
            if exp.ty.is_integral() {
                op = match op {
                    Op::FNegate => Op::SNegate,
                    Op::FAdd => Op::IAdd,
                    Op::FSub => Op::ISub,
                    other => other,
                };
            }

            if let Op::FAdd | Op::FSub | Op::IAdd | Op::ISub = op {
                // Pre-increment and pre-decrement modify their operand.
                if exp.ty.has(Qualifiers::CONST)
                    || exp.ty.has(Qualifiers::UNIFORM)
                    || !exp.is_lvalue
                    || exp.has_cast()
                {
                    self.error(&location, 3025, "l-value specifies const object");
                    return false;
                }
                let value = self.access_chain_load(section, exp);
                let one = self.one_constant(&exp.ty);
                let type_id = self.writer.get_type_id(&exp.ty);
                let id = self.writer.make_id();
                section.push(Instruction::binary(op, type_id, id, value, one));
                let ty = exp.ty;
                self.access_chain_store(section, exp, id, &ty);
                exp.reset_to_rvalue(id, ty, location);
            } else if exp.is_constant {
                if op == Op::LogicalNot && !exp.ty.is_boolean() {
                    exp.add_cast_operation(Type::new(BaseType::Bool, exp.ty.rows, exp.ty.cols));
                }
                for lane in 0..exp.ty.components() as usize {
                    match op {
                        Op::LogicalNot => {
                            exp.constant.data[lane] = (exp.constant.data[lane] == 0) as u32
                        }
                        Op::FNegate => {
                            let value = -exp.constant.as_float(lane);
                            exp.constant.set_float(lane, value);
                        }
                        Op::SNegate => {
                            let value = exp.constant.as_int(lane).wrapping_neg();
                            exp.constant.set_int(lane, value);
                        }
                        Op::Not => exp.constant.data[lane] = !exp.constant.data[lane],
                        _ => {}
                    }
                }
                let ty = exp.ty;
                let constant = exp.constant.clone();
                exp.reset_to_rvalue_constant(ty, location, constant);
            } else {
                if op == Op::LogicalNot && !exp.ty.is_boolean() {
                    exp.add_cast_operation(Type::new(BaseType::Bool, exp.ty.rows, exp.ty.cols));
                }
                let value = self.access_chain_load(section, exp);
                let type_id = self.writer.get_type_id(&exp.ty);
                let id = self.writer.make_id();
                section.push(Instruction::unary(op, type_id, id, value));
                let ty = exp.ty;
                exp.reset_to_rvalue(id, ty, location);
            }
        } else if self.accept(TokenValue::LeftParen) {
            let snapshot = self.backup();

            // Disambiguate a C-style cast from a parenthesized expression.
            let mut cast_type = Type::default();
            if self.accept_type_class(&mut cast_type) {
                if self.peek(TokenValue::LeftParen) {
                    // Constructor call, not a cast; rewind and reparse.
                    self.restore(snapshot);
                } else if self.expect(TokenValue::RightParen) {
                    if !self.parse_expression_unary(section, exp) {
                        return false;
                    }
                    if exp.ty.base == cast_type.base
                        && exp.ty.rows == cast_type.rows
                        && exp.ty.cols == cast_type.cols
                        && !(exp.ty.is_array() || cast_type.is_array())
                    {
                        return self.parse_postfix(section, exp);
                    }
                    if exp.ty.is_numeric() && cast_type.is_numeric() {
                        if exp.ty.components() < cast_type.components() && !exp.ty.is_scalar() {
                            self.error(&location, 3017, "cannot convert these vector types");
                            return false;
                        }
                        exp.add_cast_operation(cast_type);
                        return self.parse_postfix(section, exp);
                    }
                    self.error(&location, 3017, "cannot convert non-numeric types");
                    return false;
                } else {
                    return false;
                }
            }

            if !self.parse_expression(section, exp) || !self.expect(TokenValue::RightParen) {
                return false;
            }
        } else if self.accept(TokenValue::LeftBrace) {
            if !self.parse_initializer_list(section, exp, location.clone()) {
                return false;
            }
        } else if let TokenValue::BoolConstant(value) = self.next_token.value {
            self.consume();
            exp.reset_to_rvalue_constant(
                Type::BOOL.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_bool(value),
            );
        } else if let TokenValue::IntConstant(value) = self.next_token.value {
            self.consume();
            exp.reset_to_rvalue_constant(
                Type::INT.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_int(value),
            );
        } else if let TokenValue::UintConstant(value) = self.next_token.value {
            self.consume();
            exp.reset_to_rvalue_constant(
                Type::UINT.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_uint(value),
            );
        } else if let TokenValue::FloatConstant(value) = self.next_token.value {
            self.consume();
            exp.reset_to_rvalue_constant(
                Type::FLOAT.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_float(value),
            );
        } else if let TokenValue::DoubleConstant(value) = self.next_token.value {
            self.consume();
            self.warning(&location, 5000, "double literal truncated to float literal");
            exp.reset_to_rvalue_constant(
                Type::FLOAT.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_float(value as f32),
            );
        } else if let TokenValue::StringConstant(ref value) = self.next_token.value {
            let mut value = value.clone();
            self.consume();
            // Adjacent string literals concatenate.
            while let TokenValue::StringConstant(ref more) = self.next_token.value {
                value.push_str(more);
                self.consume();
            }
            exp.reset_to_rvalue_constant(
                Type::STRING.with_qualifiers(Qualifiers::CONST),
                location.clone(),
                Constant::from_string(value),
            );
        } else {
            let mut constructor_type = Type::default();
            if self.accept_type_class(&mut constructor_type) {
                if !self.parse_constructor(section, exp, constructor_type, location.clone()) {
                    return false;
                }
            } else if !self.parse_call_or_reference(section, exp, location.clone()) {
                return false;
            }
        }

        // -- Postfix --
        self.parse_postfix(section, exp)
    }

    /// `{ a, b, ... }` builds an array whose element type is the merge of
    /// all elements.
    fn parse_initializer_list(
        &mut self,
        section: &mut Section,
        exp: &mut Expr,
        location: super::token::SourceLocation,
    ) -> bool {
        let mut elements: Vec<Expr> = vec![];
        let mut constant = true;
        let mut composite_type = Type::VOID;
        composite_type.rows = 1;
        composite_type.cols = 1;

        while !self.peek(TokenValue::RightBrace) {
            if !elements.is_empty() && !self.expect(TokenValue::Comma) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
            // A trailing comma before the closing brace is allowed.
            if self.peek(TokenValue::RightBrace) {
                break;
            }
            let mut element = Expr::default();
            if !self.parse_expression_assignment(section, &mut element) {
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
            constant &= element.is_constant;
            composite_type = Type::merge(&composite_type, &element.ty);
            elements.push(element);
        }

        if constant {
            let mut data = Constant::default();
            for mut element in elements.drain(..) {
                element.add_cast_operation(composite_type);
                data.elements.push(element.constant);
            }
            composite_type.array_length = data.elements.len() as i32;
            exp.reset_to_rvalue_constant(composite_type, location, data);
        } else {
            let mut ids = vec![];
            for mut element in elements.drain(..) {
                element.add_cast_operation(composite_type);
                ids.push(self.access_chain_load(section, &element));
            }
            composite_type.array_length = ids.len() as i32;
            let type_id = self.writer.get_type_id(&composite_type);
            let id = self.writer.make_id();
            section.push(Instruction::composite_construct(type_id, id, &ids));
            exp.reset_to_rvalue(id, composite_type, location);
        }

        self.expect(TokenValue::RightBrace)
    }

    /// `float4(...)` style constructor for numeric types.
    fn parse_constructor(
        &mut self,
        section: &mut Section,
        exp: &mut Expr,
        ty: Type,
        location: super::token::SourceLocation,
    ) -> bool {
        if !self.expect(TokenValue::LeftParen) {
            return false;
        }
        if !ty.is_numeric() {
            self.error(&location, 3037, "constructors only defined for numeric base types");
            return false;
        }
        if self.accept(TokenValue::RightParen) {
            self.error(
                &location,
                3014,
                "incorrect number of arguments to numeric-type constructor",
            );
            return false;
        }

        let mut arguments: Vec<Expr> = vec![];
        let mut constant = true;
        let mut num_components = 0;
        while !self.peek(TokenValue::RightParen) {
            if !arguments.is_empty() && !self.expect(TokenValue::Comma) {
                return false;
            }
            let mut argument = Expr::default();
            if !self.parse_expression_assignment(section, &mut argument) {
                return false;
            }
            if !argument.ty.is_numeric() {
                self.error(&argument.location, 3017, "cannot convert non-numeric types");
                return false;
            }
            constant &= argument.is_constant;
            num_components += argument.ty.components();
            arguments.push(argument);
        }
        if !self.expect(TokenValue::RightParen) {
            return false;
        }
        if num_components != ty.components() {
            self.error(
                &location,
                3014,
                "incorrect number of arguments to numeric-type constructor",
            );
            return false;
        }

        if constant {
            let mut data = Constant::default();
            let mut lane = 0;
            for mut argument in arguments.drain(..) {
                let mut target = argument.ty;
                target.base = ty.base;
                argument.add_cast_operation(target);
                for component in 0..argument.ty.components() as usize {
                    data.data[lane] = argument.constant.data[component];
                    lane += 1;
                }
            }
            exp.reset_to_rvalue_constant(ty, location, data);
        } else if arguments.len() > 1 {
            if ty.is_matrix() {
                // Flatten all arguments into scalars, group them into
                // column vectors, then construct the matrix.
                let mut scalars = vec![];
                for mut argument in arguments.drain(..) {
                    if argument.ty.is_scalar() {
                        let mut target = argument.ty;
                        target.base = ty.base;
                        argument.add_cast_operation(target);
                        scalars.push(self.access_chain_load(section, &argument));
                    } else {
                        for index in 0..argument.ty.components() {
                            let mut scalar = argument.clone();
                            if scalar.ty.is_matrix() {
                                let rows = scalar.ty.rows;
                                scalar.add_static_index_access(index / rows);
                                scalar.add_static_index_access(index % rows);
                            } else {
                                scalar.add_static_index_access(index);
                            }
                            let mut target = scalar.ty;
                            target.base = ty.base;
                            scalar.add_cast_operation(target);
                            scalars.push(self.access_chain_load(section, &scalar));
                        }
                    }
                }
                let column_type = Type::vector(ty.base, ty.rows);
                let column_type_id = self.writer.get_type_id(&column_type);
                let mut columns = vec![];
                for column in scalars.chunks(ty.rows as usize) {
                    let id = self.writer.make_id();
                    section.push(Instruction::composite_construct(column_type_id, id, column));
                    columns.push(id);
                }
                let type_id = self.writer.get_type_id(&ty);
                let id = self.writer.make_id();
                section.push(Instruction::composite_construct(type_id, id, &columns));
                exp.reset_to_rvalue(id, ty, location);
            } else {
                // Vector constructors accept a mix of scalars and vectors.
                let mut ids = vec![];
                for mut argument in arguments.drain(..) {
                    let mut target = argument.ty;
                    target.base = ty.base;
                    argument.add_cast_operation(target);
                    ids.push(self.access_chain_load(section, &argument));
                }
                let type_id = self.writer.get_type_id(&ty);
                let id = self.writer.make_id();
                section.push(Instruction::composite_construct(type_id, id, &ids));
                exp.reset_to_rvalue(id, ty, location);
            }
        } else {
            // A single-argument constructor is just a cast.
            *exp = arguments.remove(0);
            if exp.ty.components() < ty.components() && !exp.ty.is_scalar() {
                self.error(&location, 3017, "cannot convert these vector types");
                return false;
            }
            exp.add_cast_operation(ty);
        }
        true
    }

    /// An identifier, `::`-qualified path, variable reference or call.
    fn parse_call_or_reference(
        &mut self,
        section: &mut Section,
        exp: &mut Expr,
        location: super::token::SourceLocation,
    ) -> bool {
        // A leading '::' restricts the symbol search to the global
        // namespace.
        let exclusive = self.accept(TokenValue::ColonColon);

        let mut identifier = if exclusive {
            match self.expect_identifier() {
                Some(name) => name,
                None => return false,
            }
        } else {
            match self.accept_identifier() {
                Some(name) => name,
                None => return false,
            }
        };
        while self.accept(TokenValue::ColonColon) {
            match self.expect_identifier() {
                Some(name) => {
                    identifier.push_str("::");
                    identifier.push_str(&name);
                }
                None => return false,
            }
        }

        let scope = if exclusive {
            Scope::global()
        } else {
            self.symbols.current_scope().clone()
        };
        let symbol = self.symbols.find_symbol(&identifier, &scope, exclusive);

        if self.accept(TokenValue::LeftParen) {
            if let Some(ref symbol) = symbol {
                if symbol.op != Op::Function {
                    self.error(
                        &location,
                        3005,
                        format!("identifier '{identifier}' represents a variable, not a function"),
                    );
                    return false;
                }
            }

            let mut arguments: Vec<Expr> = vec![];
            while !self.peek(TokenValue::RightParen) {
                if !arguments.is_empty() && !self.expect(TokenValue::Comma) {
                    return false;
                }
                let mut argument = Expr::default();
                if !self.parse_expression_assignment(section, &mut argument) {
                    return false;
                }
                arguments.push(argument);
            }
            if !self.expect(TokenValue::RightParen) {
                return false;
            }

            let argument_types: Vec<Type> = arguments.iter().map(|argument| argument.ty).collect();
            let resolved = match self.symbols.resolve_function_call(
                &identifier,
                &argument_types,
                &scope,
                exclusive,
                &self.functions,
                &self.intrinsics,
            ) {
                Ok(resolved) => resolved,
                Err(CallError::Undeclared) => {
                    self.error(&location, 3004, format!("undeclared identifier '{identifier}'"));
                    return false;
                }
                Err(CallError::Ambiguous) => {
                    self.error(
                        &location,
                        3067,
                        format!("ambiguous function call to '{identifier}'"),
                    );
                    return false;
                }
                Err(CallError::NoOverload) => {
                    self.error(
                        &location,
                        3013,
                        format!("no matching function overload for '{identifier}'"),
                    );
                    return false;
                }
            };

            return self.lower_call(section, exp, resolved, arguments, location);
        }

        // Plain reference.
        let symbol = match symbol {
            Some(symbol) => symbol,
            None => {
                self.error(&location, 3004, format!("undeclared identifier '{identifier}'"));
                return false;
            }
        };
        match symbol.op {
            Op::Variable => {
                if let Some(member_index) = symbol.member_index {
                    // A member of the global uniform block.
                    let block_type = Type {
                        base: BaseType::Struct,
                        definition: self.global_ubo_type,
                        qualifiers: Qualifiers::UNIFORM,
                        ..Type::default()
                    };
                    exp.reset_to_lvalue(symbol.id, block_type, location, StorageClass::Uniform);
                    exp.add_member_access(member_index, symbol.ty);
                } else {
                    exp.reset_to_lvalue(symbol.id, symbol.ty, location, symbol.class);
                }
                true
            }
            Op::Constant => {
                exp.reset_to_rvalue_constant(symbol.ty, location, symbol.constant);
                true
            }
            _ => {
                self.error(
                    &location,
                    3005,
                    format!("identifier '{identifier}' represents a function, not a variable"),
                );
                false
            }
        }
    }

    /// Prepare arguments, emit the call or intrinsic expansion, and copy
    /// `out` parameters back.
    fn lower_call(
        &mut self,
        section: &mut Section,
        exp: &mut Expr,
        resolved: ResolvedCall,
        mut arguments: Vec<Expr>,
        location: super::token::SourceLocation,
    ) -> bool {
        let (parameter_types, return_type): (Vec<Type>, Type) = match resolved {
            ResolvedCall::Function { index, .. } => (
                self.functions[index]
                    .parameters
                    .iter()
                    .map(|parameter| parameter.ty)
                    .collect(),
                self.functions[index].return_type,
            ),
            ResolvedCall::Intrinsic(ref intrinsic) => {
                (intrinsic.parameters.clone(), intrinsic.return_type)
            }
        };

        // Keep the uncast argument chains around so out parameters can be
        // written back through them.
        let original_arguments = arguments.clone();
        let mut parameters: Vec<Expr> = Vec::with_capacity(arguments.len());
        for (argument, parameter_type) in arguments.iter_mut().zip(&parameter_types) {
            if argument.ty.components() > parameter_type.components() {
                self.warning(
                    &argument.location,
                    3206,
                    "implicit truncation of vector type",
                );
            }
            let mut value_type = *parameter_type;
            value_type.is_pointer = false;
            argument.add_cast_operation(value_type);

            let mut parameter = Expr::default();
            if parameter_type.is_pointer {
                match self.current_function {
                    Some(function) => {
                        let variable =
                            self.writer.define_local_variable(function, &value_type, None);
                        parameter.reset_to_lvalue(
                            variable,
                            *parameter_type,
                            argument.location.clone(),
                            StorageClass::Function,
                        );
                    }
                    None => {
                        // Outside of a function there is nowhere to put the
                        // temporary; an error has been reported upstream.
                        let value = self.access_chain_load(section, argument);
                        parameter.reset_to_rvalue(value, value_type, argument.location.clone());
                    }
                }
            } else {
                let value = self.access_chain_load(section, argument);
                parameter.reset_to_rvalue(value, value_type, argument.location.clone());
            }
            parameters.push(parameter);
        }

        // Copy `in` values into the pointer parameters.
        for (argument, parameter) in arguments.iter().zip(&parameters) {
            if parameter.is_lvalue && parameter.ty.has(Qualifiers::IN) {
                let value = self.access_chain_load(section, argument);
                let parameter = parameter.clone();
                let ty = argument.ty;
                self.access_chain_store(section, &parameter, value, &ty);
            }
        }

        match resolved {
            ResolvedCall::Function { index, id } => {
                if self.current_function == Some(index) {
                    self.error(&location, 3500, "recursive function calls are not allowed");
                    return false;
                }
                let argument_ids: Vec<Word> =
                    parameters.iter().map(|parameter| parameter.base).collect();
                let type_id = self.writer.get_type_id(&return_type);
                let result = self.writer.make_id();
                section.push(Instruction::function_call(type_id, result, id, &argument_ids));
                exp.reset_to_rvalue(result, return_type, location.clone());
            }
            ResolvedCall::Intrinsic(intrinsic) => {
                self.lower_intrinsic(
                    section,
                    exp,
                    intrinsic.lowering,
                    return_type,
                    &parameters,
                    location.clone(),
                );
            }
        }

        // Copy `out` parameters back into the original argument chains.
        for (index, parameter) in parameters.iter().enumerate() {
            if parameter.is_lvalue && parameter.ty.has(Qualifiers::OUT) {
                let original = &original_arguments[index];
                if !original.is_lvalue
                    || original.ty.has(Qualifiers::CONST)
                    || original.ty.has(Qualifiers::UNIFORM)
                {
                    self.error(
                        &original.location,
                        3025,
                        "output argument must be a modifiable l-value",
                    );
                    continue;
                }
                let mut written = parameter.clone();
                written.add_cast_operation(original.ty);
                let value = self.access_chain_load(section, &written);
                let original = original.clone();
                let ty = original.ty;
                self.access_chain_store(section, &original, value, &ty);
            }
        }
        true
    }

    fn lower_intrinsic(
        &mut self,
        section: &mut Section,
        exp: &mut Expr,
        lowering: Lowering,
        return_type: Type,
        parameters: &[Expr],
        location: super::token::SourceLocation,
    ) {
        let operand_ids: Vec<Word> = parameters.iter().map(|parameter| parameter.base).collect();
        match lowering {
            Lowering::Core(op) => {
                let type_id = self.writer.get_type_id(&return_type);
                let id = self.writer.make_id();
                let instruction = match operand_ids.as_slice() {
                    [value] => Instruction::unary(op, type_id, id, *value),
                    [a, b] => Instruction::binary(op, type_id, id, *a, *b),
                    _ => unreachable!("core intrinsics take one or two operands"),
                };
                section.push(instruction);
                exp.reset_to_rvalue(id, return_type, location);
            }
            Lowering::Ext(op) => {
                let type_id = self.writer.get_type_id(&return_type);
                let id = self.writer.make_id();
                let set = self.writer.gl450_ext_inst_id();
                section.push(Instruction::ext_inst(set, op, type_id, id, &operand_ids));
                exp.reset_to_rvalue(id, return_type, location);
            }
            Lowering::Rcp => {
                let ty = parameters[0].ty;
                let one = self.one_constant(&ty);
                let op = if ty.is_integral() {
                    if ty.is_signed() {
                        Op::SDiv
                    } else {
                        Op::UDiv
                    }
                } else {
                    Op::FDiv
                };
                let type_id = self.writer.get_type_id(&ty);
                let id = self.writer.make_id();
                section.push(Instruction::binary(op, type_id, id, one, operand_ids[0]));
                exp.reset_to_rvalue(id, return_type, location);
            }
            Lowering::Saturate => {
                // Clamp between zero and one, with the constants built in
                // the operand's own type.
                let ty = parameters[0].ty;
                let zero = self.splat_constant(ty.base, ty.rows.max(1), |_| 0);
                let one = self.one_constant(&ty);
                let op = if ty.is_integral() {
                    if ty.is_signed() {
                        spirv::GLOp::SClamp
                    } else {
                        spirv::GLOp::UClamp
                    }
                } else {
                    spirv::GLOp::FClamp
                };
                let type_id = self.writer.get_type_id(&ty);
                let id = self.writer.make_id();
                let set = self.writer.gl450_ext_inst_id();
                section.push(Instruction::ext_inst(
                    set,
                    op,
                    type_id,
                    id,
                    &[operand_ids[0], zero, one],
                ));
                exp.reset_to_rvalue(id, return_type, location);
            }
            Lowering::SinCos => {
                let ty = parameters[0].ty;
                let type_id = self.writer.get_type_id(&ty);
                let set = self.writer.gl450_ext_inst_id();
                let sin = self.writer.make_id();
                section.push(Instruction::ext_inst(
                    set,
                    spirv::GLOp::Sin,
                    type_id,
                    sin,
                    &[operand_ids[0]],
                ));
                let cos = self.writer.make_id();
                section.push(Instruction::ext_inst(
                    set,
                    spirv::GLOp::Cos,
                    type_id,
                    cos,
                    &[operand_ids[0]],
                ));
                section.push(Instruction::store(operand_ids[1], sin));
                section.push(Instruction::store(operand_ids[2], cos));
                exp.reset_to_rvalue(0, Type::VOID, location);
            }
            Lowering::Sample => {
                let type_id = self.writer.get_type_id(&return_type);
                let id = self.writer.make_id();
                section.push(Instruction::image_sample(
                    Op::ImageSampleImplicitLod,
                    type_id,
                    id,
                    operand_ids[0],
                    operand_ids[1],
                    spirv::ImageOperands::NONE,
                    &[],
                ));
                exp.reset_to_rvalue(id, return_type, location);
            }
            Lowering::SampleLevel => {
                // The level of detail rides in the w component of the
                // float4 coordinate argument.
                let float2 = Type::vector(BaseType::Float, 2);
                let float2_id = self.writer.get_type_id(&float2);
                let coordinate = self.writer.make_id();
                section.push(Instruction::vector_shuffle(
                    float2_id,
                    coordinate,
                    operand_ids[1],
                    operand_ids[1],
                    &[0, 1],
                ));
                let float_id = self.writer.get_type_id(&Type::FLOAT);
                let level = self.writer.make_id();
                section.push(Instruction::composite_extract(
                    float_id,
                    level,
                    operand_ids[1],
                    &[3],
                ));
                let type_id = self.writer.get_type_id(&return_type);
                let id = self.writer.make_id();
                section.push(Instruction::image_sample(
                    Op::ImageSampleExplicitLod,
                    type_id,
                    id,
                    operand_ids[0],
                    coordinate,
                    spirv::ImageOperands::LOD,
                    &[level],
                ));
                exp.reset_to_rvalue(id, return_type, location);
            }
        }
    }

    /// A constant of `ty`'s shape with every lane set to one.
    pub(crate) fn one_constant(&mut self, ty: &Type) -> Word {
        let bits = if ty.is_floating_point() {
            1.0f32.to_bits()
        } else {
            1
        };
        let mut constant = Constant::default();
        for lane in 0..ty.components().max(1) as usize {
            constant.data[lane] = bits;
        }
        let value_ty = Type::new(ty.base, ty.rows.max(1), ty.cols.max(1));
        self.writer.get_constant(&value_ty, &constant)
    }

    /// Postfix operators: `++`, `--`, member/swizzle access and indexing.
    fn parse_postfix(&mut self, section: &mut Section, exp: &mut Expr) -> bool {
        while !self.peek(TokenValue::End) {
            let location = self.next_location();

            if let Some(op) = self.accept_postfix_op(&exp.ty) {
                if !exp.ty.is_scalar() && !exp.ty.is_vector() && !exp.ty.is_matrix() {
                    self.error(&exp.location, 3022, "scalar, vector, or matrix expected");
                    return false;
                }
                if exp.ty.has(Qualifiers::CONST)
                    || exp.ty.has(Qualifiers::UNIFORM)
                    || !exp.is_lvalue
                    || exp.has_cast()
                {
                    self.error(&exp.location, 3025, "l-value specifies const object");
                    return false;
                }
                let value = self.access_chain_load(section, exp);
                let one = self.one_constant(&exp.ty);
                let type_id = self.writer.get_type_id(&exp.ty);
                let id = self.writer.make_id();
                section.push(Instruction::binary(op, type_id, id, value, one));
                let ty = exp.ty;
                self.access_chain_store(section, exp, id, &ty);
                // Postfix operators return the value before modification.
                exp.reset_to_rvalue(value, ty, location);
            } else if self.accept(TokenValue::Dot) {
                let subscript = match self.expect_identifier() {
                    Some(subscript) => subscript,
                    None => return false,
                };
                let location = self.location();

                if self.accept(TokenValue::LeftParen) {
                    // No method calls on any type.
                    if !exp.ty.is_struct() || exp.ty.is_array() {
                        self.error(&location, 3087, "object does not have methods");
                    } else {
                        self.error(&location, 3088, "structures do not have methods");
                    }
                    return false;
                }
                if exp.ty.is_array() {
                    self.error(&location, 3018, "invalid subscript on array");
                    return false;
                }

                if exp.ty.is_vector() {
                    if !self.parse_vector_swizzle(exp, &subscript, &location) {
                        return false;
                    }
                } else if exp.ty.is_matrix() {
                    if !self.parse_matrix_swizzle(exp, &subscript, &location) {
                        return false;
                    }
                } else if exp.ty.is_struct() {
                    let members = match self.structs.get(&exp.ty.definition) {
                        Some(info) => &info.members,
                        None => {
                            self.error(&location, 3018, format!("invalid subscript '{subscript}'"));
                            return false;
                        }
                    };
                    let member = members
                        .iter()
                        .enumerate()
                        .find(|(_, member)| member.name == subscript)
                        .map(|(index, member)| (index as u32, member.ty));
                    match member {
                        Some((index, member_type)) => {
                            let was_uniform = exp.ty.has(Qualifiers::UNIFORM);
                            exp.add_member_access(index, member_type);
                            if was_uniform {
                                exp.ty.qualifiers =
                                    (exp.ty.qualifiers | Qualifiers::CONST) - Qualifiers::UNIFORM;
                            }
                        }
                        None => {
                            self.error(&location, 3018, format!("invalid subscript '{subscript}'"));
                            return false;
                        }
                    }
                } else if exp.ty.is_scalar() {
                    // Scalar swizzles like `x.xxx` promote to a vector.
                    if subscript.len() > 4
                        || !subscript
                            .bytes()
                            .all(|c| c == b'x' || c == b'r' || c == b's')
                    {
                        self.error(&location, 3018, format!("invalid subscript '{subscript}'"));
                        return false;
                    }
                    let mut target = exp.ty;
                    target.rows = subscript.len() as u32;
                    target.qualifiers |= Qualifiers::CONST;
                    exp.add_cast_operation(target);
                } else {
                    self.error(&location, 3018, format!("invalid subscript '{subscript}'"));
                    return false;
                }
            } else if self.accept(TokenValue::LeftBracket) {
                if !exp.ty.is_array() && !exp.ty.is_vector() && !exp.ty.is_matrix() {
                    self.error(
                        &self.location().clone(),
                        3121,
                        "array, matrix, vector, or indexable object type expected in index expression",
                    );
                    return false;
                }
                let mut index = Expr::default();
                if !self.parse_expression(section, &mut index)
                    || !self.expect(TokenValue::RightBracket)
                {
                    return false;
                }
                if !index.ty.is_scalar() || !index.ty.is_integral() {
                    self.error(
                        &index.location,
                        3120,
                        "invalid type for index - index must be a scalar",
                    );
                    return false;
                }
                if index.is_constant {
                    exp.add_static_index_access(index.constant.as_uint(0));
                } else {
                    if exp.is_constant {
                        // A runtime index forces the constant into an
                        // actual composite first.
                        let id = self.writer.get_constant(&exp.ty, &exp.constant);
                        let ty = exp.ty;
                        let location = exp.location.clone();
                        exp.reset_to_rvalue(id, ty, location);
                    }
                    let value = self.access_chain_load(section, &index);
                    exp.add_dynamic_index_access(value);
                }
            } else {
                break;
            }
        }
        true
    }

    fn parse_vector_swizzle(
        &mut self,
        exp: &mut Expr,
        subscript: &str,
        location: &super::token::SourceLocation,
    ) -> bool {
        if subscript.len() > 4 {
            self.error(
                location,
                3018,
                format!("invalid subscript '{subscript}', swizzle too long"),
            );
            return false;
        }

        #[derive(PartialEq, Clone, Copy)]
        enum Set {
            Xyzw,
            Rgba,
            Stpq,
        }
        let mut offsets = [0u8; 4];
        let mut sets = [Set::Xyzw; 4];
        let mut repeated = false;
        for (i, c) in subscript.bytes().enumerate() {
            let (offset, set) = match c {
                b'x' => (0, Set::Xyzw),
                b'y' => (1, Set::Xyzw),
                b'z' => (2, Set::Xyzw),
                b'w' => (3, Set::Xyzw),
                b'r' => (0, Set::Rgba),
                b'g' => (1, Set::Rgba),
                b'b' => (2, Set::Rgba),
                b'a' => (3, Set::Rgba),
                b's' => (0, Set::Stpq),
                b't' => (1, Set::Stpq),
                b'p' => (2, Set::Stpq),
                b'q' => (3, Set::Stpq),
                _ => {
                    self.error(location, 3018, format!("invalid subscript '{subscript}'"));
                    return false;
                }
            };
            offsets[i] = offset;
            sets[i] = set;
            if i > 0 && sets[i] != sets[i - 1] {
                self.error(
                    location,
                    3018,
                    format!("invalid subscript '{subscript}', mixed swizzle sets"),
                );
                return false;
            }
            if offset as u32 >= exp.ty.rows {
                self.error(
                    location,
                    3018,
                    format!("invalid subscript '{subscript}', swizzle out of range"),
                );
                return false;
            }
            // Repeating a component makes the result read-only.
            repeated |= offsets[..i].contains(&offset);
        }

        let was_uniform = exp.ty.has(Qualifiers::UNIFORM);
        exp.add_swizzle_access(&offsets[..subscript.len()]);
        if repeated || was_uniform {
            exp.ty.qualifiers = (exp.ty.qualifiers | Qualifiers::CONST) - Qualifiers::UNIFORM;
        }
        true
    }

    /// Matrix swizzles: `._11._23` (one-based) or `._m00._m12` (zero-based),
    /// up to four components, one consistent style.
    fn parse_matrix_swizzle(
        &mut self,
        exp: &mut Expr,
        subscript: &str,
        location: &super::token::SourceLocation,
    ) -> bool {
        let s = subscript.as_bytes();
        if s.len() < 3 {
            self.error(location, 3018, format!("invalid subscript '{subscript}'"));
            return false;
        }
        let zero_based = s[1] == b'm';
        let stride = if zero_based { 4 } else { 3 };
        let first_digit = if zero_based { b'0' } else { b'1' };

        let mut offsets = [0u8; 4];
        let mut count = 0;
        let mut repeated = false;
        let mut i = 0;
        while i < s.len() {
            if count >= 4 || i + stride > s.len() {
                self.error(
                    location,
                    3018,
                    format!("invalid subscript '{subscript}', swizzle out of range"),
                );
                return false;
            }
            let digits = if zero_based { &s[i + 2..i + 4] } else { &s[i + 1..i + 3] };
            if s[i] != b'_'
                || (zero_based && s[i + 1] != b'm')
                || digits.iter().any(|&d| d < first_digit || d > first_digit + 3)
            {
                let code = if zero_based && s[i] == b'_' && s[i + 1] != b'm' {
                    "mixed swizzle sets"
                } else {
                    "invalid"
                };
                self.error(
                    location,
                    3018,
                    format!("invalid subscript '{subscript}', {code}"),
                );
                return false;
            }
            let row = (digits[0] - first_digit) as u32;
            let col = (digits[1] - first_digit) as u32;
            if row >= exp.ty.rows || col >= exp.ty.cols {
                self.error(
                    location,
                    3018,
                    format!("invalid subscript '{subscript}', swizzle out of range"),
                );
                return false;
            }
            let offset = (row * 4 + col) as u8;
            repeated |= offsets[..count].contains(&offset);
            offsets[count] = offset;
            count += 1;
            i += stride;
        }

        let was_uniform = exp.ty.has(Qualifiers::UNIFORM);
        exp.add_swizzle_access(&offsets[..count]);
        if repeated || was_uniform {
            exp.ty.qualifiers = (exp.ty.qualifiers | Qualifiers::CONST) - Qualifiers::UNIFORM;
        }
        true
    }

    pub(super) fn parse_expression_multary(
        &mut self,
        section: &mut Section,
        lhs: &mut Expr,
        left_precedence: u32,
    ) -> bool {
        if !self.parse_expression_unary(section, lhs) {
            return false;
        }

        while let Some((mut op, right_precedence)) = self.peek_multary_op() {
            if right_precedence <= left_precedence {
                break;
            }
            self.consume();

            if op != Op::Select {
                // Branching `&&`/`||` evaluate the right hand side inside
                // its own block, so it parses straight into the live
                // section after the branch; everything else parses into a
                // side section spliced in below.
                let branching = matches!(op, Op::LogicalAnd | Op::LogicalOr)
                    && self.options.short_circuit
                    && lhs.ty.is_scalar()
                    && !lhs.is_constant;
                if branching {
                    if !self.lower_short_circuit(section, lhs, op, right_precedence) {
                        return false;
                    }
                    continue;
                }

                let mut rhs = Expr::default();
                let mut rhs_section = Section::default();
                let saved_block = self.current_block;
                if !self.parse_expression_multary(&mut rhs_section, &mut rhs, right_precedence) {
                    return false;
                }
                let resumed_block = self.current_block;
                self.current_block = saved_block;

                let mut ty = Type::merge(&lhs.ty, &rhs.ty);
                let mut boolean_result = false;

                if let Op::LogicalEqual | Op::LogicalNotEqual = op {
                    if ty.is_integral() || ty.is_floating_point() {
                        op = match (op, ty.is_integral()) {
                            (Op::LogicalEqual, true) => Op::IEqual,
                            (Op::LogicalEqual, false) => Op::FOrdEqual,
                            (Op::LogicalNotEqual, true) => Op::INotEqual,
                            _ => Op::FOrdNotEqual,
                        };
                    }
                    boolean_result = true;
                    if lhs.ty.is_array()
                        || rhs.ty.is_array()
                        || lhs.ty.definition != rhs.ty.definition
                    {
                        self.error(&rhs.location, 3020, "type mismatch");
                        return false;
                    }
                } else if let Op::BitwiseAnd | Op::BitwiseOr | Op::BitwiseXor = op {
                    if !lhs.ty.is_integral() {
                        self.error(&lhs.location, 3082, "int or unsigned int type required");
                        return false;
                    }
                    if !rhs.ty.is_integral() {
                        self.error(&rhs.location, 3082, "int or unsigned int type required");
                        return false;
                    }
                } else {
                    if let Op::LogicalAnd | Op::LogicalOr = op {
                        ty.base = BaseType::Bool;
                    }
                    if let Op::FOrdLessThan
                    | Op::FOrdGreaterThan
                    | Op::FOrdLessThanEqual
                    | Op::FOrdGreaterThanEqual = op
                    {
                        boolean_result = true;
                    }
                    if ty.is_integral() {
                        op = match op {
                            Op::FRem => {
                                if ty.is_signed() {
                                    Op::SRem
                                } else {
                                    Op::UMod
                                }
                            }
                            Op::FMul => Op::IMul,
                            Op::FAdd => Op::IAdd,
                            Op::FSub => Op::ISub,
                            Op::FDiv => {
                                if ty.is_signed() {
                                    Op::SDiv
                                } else {
                                    Op::UDiv
                                }
                            }
                            Op::FOrdLessThan => {
                                if ty.is_signed() {
                                    Op::SLessThan
                                } else {
                                    Op::ULessThan
                                }
                            }
                            Op::FOrdGreaterThan => {
                                if ty.is_signed() {
                                    Op::SGreaterThan
                                } else {
                                    Op::UGreaterThan
                                }
                            }
                            Op::FOrdLessThanEqual => {
                                if ty.is_signed() {
                                    Op::SLessThanEqual
                                } else {
                                    Op::ULessThanEqual
                                }
                            }
                            Op::FOrdGreaterThanEqual => {
                                if ty.is_signed() {
                                    Op::SGreaterThanEqual
                                } else {
                                    Op::UGreaterThanEqual
                                }
                            }
                            Op::ShiftRightLogical => {
                                if ty.is_signed() {
                                    Op::ShiftRightArithmetic
                                } else {
                                    Op::ShiftRightLogical
                                }
                            }
                            other => other,
                        };
                    }
                    if !lhs.ty.is_scalar() && !lhs.ty.is_vector() && !lhs.ty.is_matrix() {
                        self.error(&lhs.location, 3022, "scalar, vector, or matrix expected");
                        return false;
                    }
                    if !rhs.ty.is_scalar() && !rhs.ty.is_vector() && !rhs.ty.is_matrix() {
                        self.error(&rhs.location, 3022, "scalar, vector, or matrix expected");
                        return false;
                    }
                }

                if lhs.ty.components() > ty.components() {
                    self.warning(&lhs.location, 3206, "implicit truncation of vector type");
                }
                if rhs.ty.components() > ty.components() {
                    self.warning(&rhs.location, 3206, "implicit truncation of vector type");
                }

                if lhs.is_constant && rhs.is_constant {
                    lhs.add_cast_operation(ty);
                    rhs.add_cast_operation(ty);
                    let folded = fold_binary(op, &ty, &lhs.constant, &rhs.constant);
                    let mut result_type = ty;
                    if boolean_result {
                        result_type = Type::new(BaseType::Bool, ty.rows, ty.cols);
                    }
                    let location = lhs.location.clone();
                    lhs.reset_to_rvalue_constant(result_type, location, folded);
                } else {
                    lhs.add_cast_operation(ty);
                    let lhs_value = self.access_chain_load(section, lhs);

                    section.append(&mut rhs_section);
                    self.current_block = resumed_block;
                    rhs.add_cast_operation(ty);
                    let rhs_value = self.access_chain_load(section, &rhs);

                    let mut result_type = ty;
                    if boolean_result {
                        result_type = Type::new(BaseType::Bool, ty.rows, ty.cols);
                    }
                    let type_id = self.writer.get_type_id(&result_type);
                    let result = self.writer.make_id();
                    section.push(Instruction::binary(op, type_id, result, lhs_value, rhs_value));
                    let location = lhs.location.clone();
                    lhs.reset_to_rvalue(result, result_type, location);
                }
            } else if !self.parse_ternary(section, lhs) {
                return false;
            }
        }
        true
    }

    /// Branching lowering for scalar `&&` and `||`: evaluate the right
    /// hand side only when it can still affect the result, and merge the
    /// two paths with a phi.
    fn lower_short_circuit(
        &mut self,
        section: &mut Section,
        lhs: &mut Expr,
        op: Op,
        right_precedence: u32,
    ) -> bool {
        lhs.add_cast_operation(Type::BOOL);
        let lhs_value = self.access_chain_load(section, lhs);

        let merge_label = self.writer.make_id();
        let rhs_label = self.writer.make_id();
        let parent_label = self.current_block;
        let bool_id = self.writer.get_type_id(&Type::BOOL);

        if op == Op::LogicalAnd {
            self.leave_block_and_branch_conditional(section, lhs_value, rhs_label, merge_label);
        } else {
            let negated = self.writer.make_id();
            section.push(Instruction::unary(Op::LogicalNot, bool_id, negated, lhs_value));
            self.leave_block_and_branch_conditional(section, negated, rhs_label, merge_label);
        }

        self.enter_block(section, rhs_label);
        let mut rhs = Expr::default();
        if !self.parse_expression_multary(section, &mut rhs, right_precedence) {
            return false;
        }
        if !rhs.ty.is_scalar() && !rhs.ty.is_vector() && !rhs.ty.is_matrix() {
            self.error(&rhs.location, 3022, "scalar, vector, or matrix expected");
            return false;
        }
        if rhs.ty.components() > 1 {
            self.warning(&rhs.location, 3206, "implicit truncation of vector type");
        }
        rhs.add_cast_operation(Type::BOOL);
        let rhs_value = self.access_chain_load(section, &rhs);
        let rhs_parent = self.current_block;
        self.leave_block_and_branch(section, merge_label);

        self.enter_block(section, merge_label);
        let result = self.writer.make_id();
        section.push(Instruction::phi(
            bool_id,
            result,
            &[lhs_value, parent_label, rhs_value, rhs_parent],
        ));
        let location = lhs.location.clone();
        lhs.reset_to_rvalue(result, Type::BOOL, location);
        true
    }

    fn parse_ternary(&mut self, section: &mut Section, lhs: &mut Expr) -> bool {
        if !lhs.ty.is_scalar() && !lhs.ty.is_vector() {
            self.error(&lhs.location, 3022, "boolean or vector expression expected");
            return false;
        }

        // Both arms parse into side sections; the open block is restored
        // afterwards since an arm may contain block-forming expressions.
        let saved_block = self.current_block;
        let mut true_exp = Expr::default();
        let mut true_section = Section::default();
        if !self.parse_expression(&mut true_section, &mut true_exp) {
            return false;
        }
        if !self.expect(TokenValue::Colon) {
            return false;
        }
        let mut false_exp = Expr::default();
        let mut false_section = Section::default();
        if !self.parse_expression_assignment(&mut false_section, &mut false_exp) {
            return false;
        }
        self.current_block = saved_block;

        if lhs.ty.is_vector()
            && lhs.ty.rows != true_exp.ty.rows
            && lhs.ty.cols != true_exp.ty.cols
        {
            self.error(
                &lhs.location,
                3020,
                "dimension of conditional does not match value",
            );
            return false;
        }
        if true_exp.ty.array_length != false_exp.ty.array_length
            || true_exp.ty.definition != false_exp.ty.definition
        {
            self.error(
                &false_exp.location,
                3020,
                "type mismatch between conditional values",
            );
            return false;
        }

        let ty = Type::merge(&true_exp.ty, &false_exp.ty);
        if true_exp.ty.components() > ty.components() {
            self.warning(&true_exp.location, 3206, "implicit truncation of vector type");
        }
        if false_exp.ty.components() > ty.components() {
            self.warning(&false_exp.location, 3206, "implicit truncation of vector type");
        }

        if self.options.short_circuit && lhs.ty.is_scalar() {
            let true_label = self.writer.make_id();
            let false_label = self.writer.make_id();
            let merge_label = self.writer.make_id();

            lhs.add_cast_operation(Type::BOOL);
            let condition = self.access_chain_load(section, lhs);

            section.push(Instruction::selection_merge(
                merge_label,
                spirv::SelectionControl::NONE,
            ));
            self.leave_block_and_branch_conditional(section, condition, true_label, false_label);

            self.enter_block(section, true_label);
            section.append(&mut true_section);
            true_exp.add_cast_operation(ty);
            let true_value = self.access_chain_load(section, &true_exp);
            let true_parent = self.current_block;
            self.leave_block_and_branch(section, merge_label);

            self.enter_block(section, false_label);
            section.append(&mut false_section);
            false_exp.add_cast_operation(ty);
            let false_value = self.access_chain_load(section, &false_exp);
            let false_parent = self.current_block;
            self.leave_block_and_branch(section, merge_label);

            self.enter_block(section, merge_label);
            let type_id = self.writer.get_type_id(&ty);
            let result = self.writer.make_id();
            section.push(Instruction::phi(
                type_id,
                result,
                &[true_value, true_parent, false_value, false_parent],
            ));
            let location = lhs.location.clone();
            lhs.reset_to_rvalue(result, ty, location);
        } else {
            section.append(&mut true_section);
            section.append(&mut false_section);

            lhs.add_cast_operation(Type::new(BaseType::Bool, ty.rows, 1));
            let condition = self.access_chain_load(section, lhs);
            true_exp.add_cast_operation(ty);
            let true_value = self.access_chain_load(section, &true_exp);
            false_exp.add_cast_operation(ty);
            let false_value = self.access_chain_load(section, &false_exp);

            let type_id = self.writer.get_type_id(&ty);
            let result = self.writer.make_id();
            section.push(Instruction::select(
                type_id,
                result,
                condition,
                true_value,
                false_value,
            ));
            let location = lhs.location.clone();
            lhs.reset_to_rvalue(result, ty, location);
        }
        true
    }

    pub(crate) fn parse_expression_assignment(
        &mut self,
        section: &mut Section,
        lhs: &mut Expr,
    ) -> bool {
        if !self.parse_expression_multary(section, lhs, 0) {
            return false;
        }

        if let Some(op) = self.accept_assignment_op(&lhs.ty) {
            let mut rhs = Expr::default();
            if !self.parse_expression_multary(section, &mut rhs, 0) {
                return false;
            }

            if lhs.ty.has(Qualifiers::CONST)
                || lhs.ty.has(Qualifiers::UNIFORM)
                || !lhs.is_lvalue
                || lhs.has_cast()
            {
                self.error(&lhs.location, 3025, "l-value specifies const object");
                return false;
            }
            if lhs.ty.array_length != rhs.ty.array_length || Type::rank(&rhs.ty, &lhs.ty) == 0 {
                self.error(&rhs.location, 3020, "cannot convert these types");
                return false;
            }
            if rhs.ty.components() > lhs.ty.components() {
                self.warning(&rhs.location, 3206, "implicit truncation of vector type");
            }

            let target = lhs.ty;
            rhs.add_cast_operation(target);
            let mut rhs_value = self.access_chain_load(section, &rhs);

            if op != Op::Nop {
                let lhs_value = self.access_chain_load(section, lhs);
                let type_id = self.writer.get_type_id(&lhs.ty);
                let result = self.writer.make_id();
                section.push(Instruction::binary(op, type_id, result, lhs_value, rhs_value));
                rhs_value = result;
            }

            self.access_chain_store(section, lhs, rhs_value, &target);

            // Assignments are expressions themselves.
            let location = lhs.location.clone();
            lhs.reset_to_rvalue(rhs_value, target, location);
        }
        true
    }
}

/// Apply a binary operator to two constants of the merged type `ty`,
/// componentwise. Results of comparisons land in the integer lanes as
/// zero or one.
fn fold_binary(op: Op, ty: &Type, lhs: &Constant, rhs: &Constant) -> Constant {
    let mut result = lhs.clone();
    for i in 0..ty.components() as usize {
        let (a, b) = (lhs.data[i], rhs.data[i]);
        let (fa, fb) = (f32::from_bits(a), f32::from_bits(b));
        let (ia, ib) = (a as i32, b as i32);
        result.data[i] = match op {
            Op::FRem => (fa % fb).to_bits(),
            Op::SRem => ia.checked_rem(ib).unwrap_or(0) as u32,
            Op::UMod => a.checked_rem(b).unwrap_or(0),
            Op::FMul => (fa * fb).to_bits(),
            Op::IMul => a.wrapping_mul(b),
            Op::FAdd => (fa + fb).to_bits(),
            Op::IAdd => a.wrapping_add(b),
            Op::FSub => (fa - fb).to_bits(),
            Op::ISub => a.wrapping_sub(b),
            Op::FDiv => (fa / fb).to_bits(),
            Op::SDiv => ia.checked_div(ib).unwrap_or(0) as u32,
            Op::UDiv => a.checked_div(b).unwrap_or(0),
            Op::LogicalAnd | Op::BitwiseAnd => a & b,
            Op::LogicalOr | Op::BitwiseOr => a | b,
            Op::BitwiseXor => a ^ b,
            Op::FOrdLessThan => (fa < fb) as u32,
            Op::SLessThan => (ia < ib) as u32,
            Op::ULessThan => (a < b) as u32,
            Op::FOrdLessThanEqual => (fa <= fb) as u32,
            Op::SLessThanEqual => (ia <= ib) as u32,
            Op::ULessThanEqual => (a <= b) as u32,
            Op::FOrdGreaterThan => (fa > fb) as u32,
            Op::SGreaterThan => (ia > ib) as u32,
            Op::UGreaterThan => (a > b) as u32,
            Op::FOrdGreaterThanEqual => (fa >= fb) as u32,
            Op::SGreaterThanEqual => (ia >= ib) as u32,
            Op::UGreaterThanEqual => (a >= b) as u32,
            Op::FOrdEqual => (fa == fb) as u32,
            Op::IEqual | Op::LogicalEqual => (a == b) as u32,
            Op::FOrdNotEqual => (fa != fb) as u32,
            Op::INotEqual | Op::LogicalNotEqual => (a != b) as u32,
            Op::ShiftLeftLogical => a.wrapping_shl(b),
            Op::ShiftRightArithmetic => (ia.wrapping_shr(b)) as u32,
            Op::ShiftRightLogical => a.wrapping_shr(b),
            _ => a,
        };
    }
    result
}
