//! Statement parsing and structured control-flow lowering.
//!
//! Every construct follows the same discipline: labels are fresh ids, a
//! block is left through exactly one terminator, and merge instructions
//! (`OpSelectionMerge`/`OpLoopMerge`) are emitted in the block that
//! branches into the construct. Loop bodies emit their blocks in
//! header/condition/body/continue/merge order; switch bodies are parsed
//! into a side section so the `OpSwitch` header can be finalized with the
//! complete case list first.

use super::chain::Expr;
use super::token::TokenValue;
use super::Frontend;
use crate::back::spv::{Instruction, Section};
use crate::Type;
use spirv::Word;

impl Frontend {
    pub(crate) fn parse_statement(&mut self, section: &mut Section, scoped: bool) -> bool {
        if self.current_block == 0 {
            let location = self.next_location();
            self.error(&location, 3000, "statements are valid only inside a code block");
            return false;
        }

        let mut loop_control = spirv::LoopControl::NONE;
        let mut selection_control = spirv::SelectionControl::NONE;

        // Attributes (`[unroll]`, `[branch]`, ...) apply to the construct
        // that follows.
        while self.accept(TokenValue::LeftBracket) {
            let attribute = match self.expect_identifier() {
                Some(attribute) => attribute,
                None => return false,
            };
            if !self.expect(TokenValue::RightBracket) {
                return false;
            }
            match attribute.as_str() {
                "unroll" => loop_control |= spirv::LoopControl::UNROLL,
                "loop" => loop_control |= spirv::LoopControl::DONT_UNROLL,
                "branch" => selection_control |= spirv::SelectionControl::DONT_FLATTEN,
                "flatten" => selection_control |= spirv::SelectionControl::FLATTEN,
                _ => {
                    let location = self.location();
                    self.warning(&location, 0, "unknown attribute");
                }
            }
        }

        if self.peek(TokenValue::LeftBrace) {
            return self.parse_statement_block(section, scoped);
        }
        if self.accept(TokenValue::Semicolon) {
            return true;
        }

        // Everything except declarations requires a surrounding function.
        if self.current_function.is_some() {
            let location = self.next_location();

            if self.accept(TokenValue::If) {
                let true_label = self.writer.make_id();
                let false_label = self.writer.make_id();
                let merge_label = self.writer.make_id();

                let mut condition = Expr::default();
                if !self.expect(TokenValue::LeftParen)
                    || !self.parse_expression(section, &mut condition)
                    || !self.expect(TokenValue::RightParen)
                {
                    return false;
                }
                if !condition.ty.is_scalar() {
                    self.error(
                        &condition.location,
                        3019,
                        "if statement conditional expressions must evaluate to a scalar",
                    );
                    return false;
                }
                condition.add_cast_operation(Type::BOOL);
                let condition_value = self.access_chain_load(section, &condition);

                section.push(Instruction::selection_merge(merge_label, selection_control));
                self.leave_block_and_branch_conditional(
                    section,
                    condition_value,
                    true_label,
                    false_label,
                );

                self.enter_block(section, true_label);
                if !self.parse_statement(section, true) {
                    return false;
                }
                self.leave_block_and_branch(section, merge_label);

                self.enter_block(section, false_label);
                if self.accept(TokenValue::Else) && !self.parse_statement(section, true) {
                    return false;
                }
                self.leave_block_and_branch(section, merge_label);

                self.enter_block(section, merge_label);
                return true;
            }

            if self.accept(TokenValue::Switch) {
                return self.parse_switch(section, selection_control, location);
            }

            if self.accept(TokenValue::For) {
                if !self.expect(TokenValue::LeftParen) {
                    return false;
                }
                self.symbols.enter_scope();
                let ok = self.parse_for(section, loop_control);
                self.symbols.leave_scope();
                return ok;
            }

            if self.accept(TokenValue::While) {
                self.symbols.enter_scope();
                let ok = self.parse_while(section, loop_control);
                self.symbols.leave_scope();
                return ok;
            }

            if self.accept(TokenValue::Do) {
                return self.parse_do_while(section, loop_control);
            }

            if self.accept(TokenValue::Break) {
                match self.loop_break_targets.last().copied() {
                    Some(target) => self.leave_block_and_branch(section, target),
                    None => {
                        self.error(&location, 3518, "break must be inside loop");
                        return false;
                    }
                }
                return self.expect(TokenValue::Semicolon);
            }

            if self.accept(TokenValue::Continue) {
                match self.loop_continue_targets.last().copied() {
                    Some(target) => self.leave_block_and_branch(section, target),
                    None => {
                        self.error(&location, 3519, "continue must be inside loop");
                        return false;
                    }
                }
                return self.expect(TokenValue::Semicolon);
            }

            if self.accept(TokenValue::Return) {
                let return_type = self.functions[self.current_function.unwrap()].return_type;

                if !self.peek(TokenValue::Semicolon) {
                    let mut value = Expr::default();
                    if !self.parse_expression(section, &mut value) {
                        self.consume_until(TokenValue::Semicolon);
                        return false;
                    }
                    if return_type.is_void() {
                        self.error(&location, 3079, "void functions cannot return a value");
                        // Consume the terminator so parsing can continue.
                        self.accept(TokenValue::Semicolon);
                        return false;
                    }
                    if value.ty.is_array() || Type::rank(&value.ty, &return_type) == 0 {
                        self.error(
                            &location,
                            3017,
                            "expression does not match function return type",
                        );
                        self.accept(TokenValue::Semicolon);
                        return false;
                    }
                    if value.ty.components() > return_type.components() {
                        self.warning(
                            &value.location,
                            3206,
                            "implicit truncation of vector type",
                        );
                    }
                    value.add_cast_operation(return_type);
                    let return_value = self.access_chain_load(section, &value);
                    self.leave_block_and_return(section, Some(return_value));
                } else if !return_type.is_void() {
                    self.error(&location, 3080, "function must return a value");
                    self.accept(TokenValue::Semicolon);
                    return false;
                } else {
                    self.leave_block_and_return(section, None);
                }
                return self.expect(TokenValue::Semicolon);
            }

            if self.accept(TokenValue::Discard) {
                self.leave_block_and_kill(section);
                return self.expect(TokenValue::Semicolon);
            }
        }

        // Local variable declarations.
        let mut ty = Type::default();
        if self.parse_type(&mut ty) {
            let mut count = 0;
            loop {
                if count > 0 && !self.expect(TokenValue::Comma) {
                    self.consume_until(TokenValue::Semicolon);
                    return false;
                }
                count += 1;
                let name = match self.expect_identifier() {
                    Some(name) => name,
                    None => {
                        self.consume_until(TokenValue::Semicolon);
                        return false;
                    }
                };
                if !self.parse_variable(ty, name, section, false) {
                    self.consume_until(TokenValue::Semicolon);
                    return false;
                }
                if self.peek(TokenValue::Semicolon) {
                    break;
                }
            }
            return self.expect(TokenValue::Semicolon);
        }

        // Expression statements.
        let mut expression = Expr::default();
        if self.parse_expression(section, &mut expression) {
            return self.expect(TokenValue::Semicolon);
        }

        let location = self.next_location();
        let found = self.next_token.value.clone();
        self.error(&location, 3000, format!("syntax error: unexpected '{found}'"));
        self.consume_until(TokenValue::Semicolon);
        false
    }

    fn parse_switch(
        &mut self,
        section: &mut Section,
        selection_control: spirv::SelectionControl,
        location: super::token::SourceLocation,
    ) -> bool {
        let merge_label = self.writer.make_id();
        let mut default_label = merge_label;

        let mut selector = Expr::default();
        if !self.expect(TokenValue::LeftParen)
            || !self.parse_expression(section, &mut selector)
            || !self.expect(TokenValue::RightParen)
        {
            return false;
        }
        if !selector.ty.is_scalar() {
            self.error(
                &selector.location,
                3019,
                "switch statement expression must evaluate to a scalar",
            );
            return false;
        }
        selector.add_cast_operation(Type::INT);
        let selector_value = self.access_chain_load(section, &selector);

        // The switch terminates the current block.
        self.current_block = 0;
        section.push(Instruction::selection_merge(merge_label, selection_control));

        if !self.expect(TokenValue::LeftBrace) {
            return false;
        }

        self.loop_break_targets.push(merge_label);

        let mut current_case = 0;
        let mut num_case_labels = 0u32;
        let mut case_pairs: Vec<(Word, Word)> = vec![];
        let mut body = Section::default();

        while !self.peek(TokenValue::RightBrace) && !self.peek(TokenValue::End) {
            if self.peek(TokenValue::Case) || self.peek(TokenValue::Default) {
                let next_case = self.writer.make_id();
                // A case label without a preceding terminator falls
                // through from the statements above it.
                if num_case_labels != 0 {
                    self.leave_block_and_branch(&mut body, next_case);
                }
                self.enter_block(&mut body, next_case);
                current_case = next_case;
            }
            while self.accept(TokenValue::Case) || self.accept(TokenValue::Default) {
                if self.token.value == TokenValue::Case {
                    let mut case_label = Expr::default();
                    if !self.parse_expression(&mut body, &mut case_label) {
                        self.loop_break_targets.pop();
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                    if !case_label.ty.is_scalar() || !case_label.is_constant {
                        self.error(
                            &case_label.location,
                            3020,
                            "non-numeric case expression",
                        );
                        self.loop_break_targets.pop();
                        self.consume_until(TokenValue::RightBrace);
                        return false;
                    }
                    // The literal travels through the integer lane even
                    // for floating point case expressions.
                    case_pairs.push((case_label.constant.as_uint(0), current_case));
                } else {
                    default_label = current_case;
                }
                if !self.expect(TokenValue::Colon) {
                    self.loop_break_targets.pop();
                    self.consume_until(TokenValue::RightBrace);
                    return false;
                }
                num_case_labels += 1;
            }
            if !self.parse_statement(&mut body, true) {
                self.loop_break_targets.pop();
                self.consume_until(TokenValue::RightBrace);
                return false;
            }
        }
        self.loop_break_targets.pop();

        // A final case without a break falls off the end of the switch.
        self.leave_block_and_branch(&mut body, merge_label);

        if num_case_labels == 0 {
            self.warning(
                &location,
                5002,
                "switch statement contains no 'case' or 'default' labels",
            );
        }

        let mut switch = Instruction::switch(selector_value, default_label);
        for (literal, label) in case_pairs {
            switch.add_operand(literal);
            switch.add_operand(label);
        }
        section.push(switch);
        section.append(&mut body);

        self.enter_block(section, merge_label);
        self.expect(TokenValue::RightBrace)
    }

    fn parse_for(&mut self, section: &mut Section, loop_control: spirv::LoopControl) -> bool {
        // The initializer is either a declaration list or an expression,
        // and may be missing entirely.
        let mut ty = Type::default();
        if self.parse_type(&mut ty) {
            let mut count = 0;
            loop {
                if count > 0 && !self.expect(TokenValue::Comma) {
                    return false;
                }
                count += 1;
                let name = match self.expect_identifier() {
                    Some(name) => name,
                    None => return false,
                };
                if !self.parse_variable(ty, name, section, false) {
                    return false;
                }
                if self.peek(TokenValue::Semicolon) {
                    break;
                }
            }
        } else {
            let mut initializer = Expr::default();
            let _ = self.parse_expression(section, &mut initializer);
        }
        if !self.expect(TokenValue::Semicolon) {
            return false;
        }

        let header_label = self.writer.make_id();
        let loop_label = self.writer.make_id();
        let merge_label = self.writer.make_id();
        let continue_label = self.writer.make_id();
        let condition_label = self.writer.make_id();

        self.leave_block_and_branch(section, header_label);

        self.enter_block(section, header_label);
        section.push(Instruction::loop_merge(merge_label, continue_label, loop_control));
        self.leave_block_and_branch(section, condition_label);

        {
            self.enter_block(section, condition_label);
            let mut condition = Expr::default();
            if self.parse_expression(section, &mut condition) {
                if !condition.ty.is_scalar() {
                    self.error(&condition.location, 3019, "scalar value expected");
                    return false;
                }
                condition.add_cast_operation(Type::BOOL);
                let condition_value = self.access_chain_load(section, &condition);
                self.leave_block_and_branch_conditional(
                    section,
                    condition_value,
                    loop_label,
                    merge_label,
                );
            } else {
                // No condition expression makes the loop unconditional.
                self.leave_block_and_branch(section, loop_label);
            }
            if !self.expect(TokenValue::Semicolon) {
                return false;
            }
        }

        // The continue expression runs after the body, so it parses into
        // its own section that is appended later.
        let mut continue_section = Section::default();
        {
            self.enter_block(&mut continue_section, continue_label);
            let mut continue_exp = Expr::default();
            let _ = self.parse_expression(&mut continue_section, &mut continue_exp);
            if !self.expect(TokenValue::RightParen) {
                return false;
            }
            self.leave_block_and_branch(&mut continue_section, header_label);
        }

        {
            self.enter_block(section, loop_label);
            self.loop_break_targets.push(merge_label);
            self.loop_continue_targets.push(continue_label);
            let ok = self.parse_statement(section, false);
            self.loop_break_targets.pop();
            self.loop_continue_targets.pop();
            if !ok {
                return false;
            }
            self.leave_block_and_branch(section, continue_label);
        }

        section.append(&mut continue_section);
        self.enter_block(section, merge_label);
        true
    }

    fn parse_while(&mut self, section: &mut Section, loop_control: spirv::LoopControl) -> bool {
        let header_label = self.writer.make_id();
        let loop_label = self.writer.make_id();
        let merge_label = self.writer.make_id();
        let continue_label = self.writer.make_id();
        let condition_label = self.writer.make_id();

        self.leave_block_and_branch(section, header_label);

        self.enter_block(section, header_label);
        section.push(Instruction::loop_merge(merge_label, continue_label, loop_control));
        self.leave_block_and_branch(section, condition_label);

        {
            self.enter_block(section, condition_label);
            let mut condition = Expr::default();
            if !self.expect(TokenValue::LeftParen)
                || !self.parse_expression(section, &mut condition)
                || !self.expect(TokenValue::RightParen)
            {
                return false;
            }
            if !condition.ty.is_scalar() {
                self.error(&condition.location, 3019, "scalar value expected");
                return false;
            }
            condition.add_cast_operation(Type::BOOL);
            let condition_value = self.access_chain_load(section, &condition);
            self.leave_block_and_branch_conditional(
                section,
                condition_value,
                loop_label,
                merge_label,
            );
        }

        {
            self.enter_block(section, loop_label);
            self.loop_break_targets.push(merge_label);
            self.loop_continue_targets.push(continue_label);
            let ok = self.parse_statement(section, false);
            self.loop_break_targets.pop();
            self.loop_continue_targets.pop();
            if !ok {
                return false;
            }
            self.leave_block_and_branch(section, continue_label);
        }

        // Empty continue block branching back to the header.
        self.enter_block(section, continue_label);
        self.leave_block_and_branch(section, header_label);

        self.enter_block(section, merge_label);
        true
    }

    fn parse_do_while(&mut self, section: &mut Section, loop_control: spirv::LoopControl) -> bool {
        let header_label = self.writer.make_id();
        let loop_label = self.writer.make_id();
        let merge_label = self.writer.make_id();
        let continue_label = self.writer.make_id();

        self.leave_block_and_branch(section, header_label);

        self.enter_block(section, header_label);
        section.push(Instruction::loop_merge(merge_label, continue_label, loop_control));
        self.leave_block_and_branch(section, loop_label);

        {
            self.enter_block(section, loop_label);
            self.loop_break_targets.push(merge_label);
            self.loop_continue_targets.push(continue_label);
            let ok = self.parse_statement(section, true);
            self.loop_break_targets.pop();
            self.loop_continue_targets.pop();
            if !ok {
                return false;
            }
            self.leave_block_and_branch(section, continue_label);
        }

        {
            // The condition is evaluated in the continue block.
            self.enter_block(section, continue_label);
            let mut condition = Expr::default();
            if !self.expect(TokenValue::While)
                || !self.expect(TokenValue::LeftParen)
                || !self.parse_expression(section, &mut condition)
                || !self.expect(TokenValue::RightParen)
                || !self.expect(TokenValue::Semicolon)
            {
                return false;
            }
            if !condition.ty.is_scalar() {
                self.error(&condition.location, 3019, "scalar value expected");
                return false;
            }
            condition.add_cast_operation(Type::BOOL);
            let condition_value = self.access_chain_load(section, &condition);
            self.leave_block_and_branch_conditional(
                section,
                condition_value,
                header_label,
                merge_label,
            );
        }

        self.enter_block(section, merge_label);
        true
    }

    pub(crate) fn parse_statement_block(&mut self, section: &mut Section, scoped: bool) -> bool {
        if !self.expect(TokenValue::LeftBrace) {
            return false;
        }
        if scoped {
            self.symbols.enter_scope();
        }

        while !self.peek(TokenValue::RightBrace) && !self.peek(TokenValue::End) {
            if !self.parse_statement(section, true) {
                if scoped {
                    self.symbols.leave_scope();
                }
                // Skip to the end of this block, minding nested braces.
                let mut level = 0u32;
                while !self.peek(TokenValue::End) {
                    if self.accept(TokenValue::LeftBrace) {
                        level += 1;
                    } else if self.accept(TokenValue::RightBrace) {
                        if level == 0 {
                            break;
                        }
                        level -= 1;
                    } else {
                        self.consume();
                    }
                }
                return false;
            }
        }

        if scoped {
            self.symbols.leave_scope();
        }
        self.expect(TokenValue::RightBrace)
    }
}
