//! Folded expression parsing.
//!
//! Every expression is a parenthesised form whose head keyword selects the
//! instruction. Typed instructions (`i32.add`, `i64.load8_u`,
//! `i64.extend_u/i32`) are split on the `.` and dispatched on the suffix.

use crate::parser::Parser;
use wast_meter_lexer::TokenKind;
use wast_meter_types::ast::*;
use wast_meter_types::ErrorCode;

impl<'src> Parser<'src> {
    /// A run of sibling expressions, up to the enclosing `)`.
    ///
    /// Each failing sibling is skipped on its own, so one bad instruction
    /// does not hide errors in the rest of the body.
    pub(crate) fn parse_expr_list(&mut self) -> Option<Vec<Expr>> {
        let mut body = Vec::new();
        let mut ok = true;
        while self.check(&TokenKind::LParen) && !self.too_many_errors() {
            match self.parse_expr() {
                Some(expr) => body.push(expr),
                None => ok = false,
            }
        }
        ok.then_some(body)
    }

    /// One folded expression `( <instr> immediates* operands* )`.
    pub(crate) fn parse_expr(&mut self) -> Option<Expr> {
        self.expect(&TokenKind::LParen)?;
        self.within_form(|p| {
            let expr = p.parse_instr()?;
            p.expect(&TokenKind::RParen)?;
            Some(expr)
        })
    }

    fn parse_instr(&mut self) -> Option<Expr> {
        let Some(keyword) = self.peek_kind().keyword().map(str::to_string) else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected instruction, got '{}'", self.peek_kind()),
            );
            return None;
        };
        let head = self.current_span();
        self.advance();

        let expr = match keyword.as_str() {
            "nop" => Expr::Nop,
            "unreachable" => Expr::Unreachable,
            "current_memory" => Expr::CurrentMemory,
            "block" => {
                let (label, result, body) = self.parse_block_tail()?;
                Expr::Block {
                    label,
                    result,
                    body,
                }
            }
            "loop" => {
                let (label, result, body) = self.parse_block_tail()?;
                Expr::Loop {
                    label,
                    result,
                    body,
                }
            }
            "if" => self.parse_if()?,
            "br" => {
                let label = self.expect_var()?;
                let value = self.parse_optional_operand()?;
                Expr::Br { label, value }
            }
            "br_if" => {
                let label = self.expect_var()?;
                let first = self.parse_expr()?;
                // `(br_if l value test)` or `(br_if l test)`
                let (value, test) = match self.parse_optional_operand()? {
                    Some(test) => (Some(Box::new(first)), test),
                    None => (None, Box::new(first)),
                };
                Expr::BrIf { label, value, test }
            }
            "return" => Expr::Return {
                value: self.parse_optional_operand()?,
            },
            "call" => Expr::Call {
                func: self.expect_var()?,
                args: self.parse_expr_list()?,
            },
            "call_import" => Expr::CallImport {
                import: self.expect_var()?,
                args: self.parse_expr_list()?,
            },
            "get_local" => Expr::GetLocal {
                local: self.expect_var()?,
            },
            "set_local" => Expr::SetLocal {
                local: self.expect_var()?,
                value: self.parse_operand()?,
            },
            "tee_local" => Expr::TeeLocal {
                local: self.expect_var()?,
                value: self.parse_operand()?,
            },
            "select" => Expr::Select {
                first: self.parse_operand()?,
                second: self.parse_operand()?,
                test: self.parse_operand()?,
            },
            "drop" => Expr::Drop {
                value: self.parse_operand()?,
            },
            "grow_memory" => Expr::GrowMemory {
                delta: self.parse_operand()?,
            },
            typed => match typed.split_once('.') {
                Some((prefix, op)) => {
                    let Some(ty) = ValueType::from_name(prefix) else {
                        self.error_at(
                            ErrorCode::UNKNOWN_TYPE,
                            format!("unknown value type '{prefix}' in '{typed}'"),
                            head,
                        );
                        return None;
                    };
                    self.parse_typed(ty, op, typed, head)?
                }
                None => return self.unknown_instruction(typed, head),
            },
        };
        Some(expr)
    }

    /// `$label? (result t)? expr*`
    fn parse_block_tail(&mut self) -> Option<(Option<String>, Option<ValueType>, Vec<Expr>)> {
        let label = self.eat_id();
        let result = if self.at_form("result") {
            Some(self.parse_result_type()?)
        } else {
            None
        };
        let body = self.parse_expr_list()?;
        Some((label, result, body))
    }

    /// `(result t)? test then else?`
    fn parse_if(&mut self) -> Option<Expr> {
        let result = if self.at_form("result") {
            Some(self.parse_result_type()?)
        } else {
            None
        };
        let test = self.parse_operand()?;
        let then_arm = match self.parse_arm("then")? {
            Some(arm) => arm,
            None => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected 'then' arm, got '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        let else_arm = self.parse_arm("else")?;
        Some(Expr::If {
            result,
            test,
            then_arm,
            else_arm,
        })
    }

    /// `(then expr*)`, `(else expr*)` or one bare expression. `Some(None)`
    /// when no arm follows.
    fn parse_arm(&mut self, keyword: &str) -> Option<Option<Box<Expr>>> {
        if self.at_form(keyword) {
            self.advance();
            let body = self.within_form(|p| {
                p.advance(); // `then` / `else`
                let body = p.parse_expr_list()?;
                p.expect(&TokenKind::RParen)?;
                Some(body)
            })?;
            let arm = if keyword == "then" {
                Expr::Then { body }
            } else {
                Expr::Else { body }
            };
            return Some(Some(Box::new(arm)));
        }
        self.parse_optional_operand()
    }

    fn parse_operand(&mut self) -> Option<Box<Expr>> {
        self.parse_expr().map(Box::new)
    }

    /// An operand if another form follows. The outer `Option` reports failure.
    fn parse_optional_operand(&mut self) -> Option<Option<Box<Expr>>> {
        if self.check(&TokenKind::LParen) {
            self.parse_operand().map(Some)
        } else {
            Some(None)
        }
    }

    fn unknown_instruction<T>(&mut self, name: &str, span: wast_meter_types::Span) -> Option<T> {
        self.error_at(
            ErrorCode::UNKNOWN_INSTRUCTION,
            format!("unknown instruction '{name}'"),
            span,
        );
        None
    }

    // ── Typed Instructions ────────────────────────────────────────────────────

    fn parse_typed(
        &mut self,
        ty: ValueType,
        op: &str,
        full: &str,
        head: wast_meter_types::Span,
    ) -> Option<Expr> {
        if op == "const" {
            return self.parse_const(ty);
        }
        if let Some((op, from)) = op.split_once('/') {
            let (Some(op), Some(from)) = (ConvertOp::from_name(op), ValueType::from_name(from))
            else {
                return self.unknown_instruction(full, head);
            };
            return Some(Expr::Cvtop {
                ty,
                op,
                from,
                operand: self.parse_operand()?,
            });
        }
        if let Some(suffix) = op.strip_prefix("load") {
            let Some((size, signed)) = access_width(ty, suffix, true) else {
                return self.unknown_instruction(full, head);
            };
            let (offset, align) = self.parse_memarg()?;
            return Some(Expr::Load {
                ty,
                size,
                signed,
                offset,
                align,
                addr: self.parse_operand()?,
            });
        }
        if let Some(suffix) = op.strip_prefix("store") {
            let Some((size, _)) = access_width(ty, suffix, false) else {
                return self.unknown_instruction(full, head);
            };
            let (offset, align) = self.parse_memarg()?;
            return Some(Expr::Store {
                ty,
                size,
                signed: false,
                offset,
                align,
                addr: self.parse_operand()?,
                value: self.parse_operand()?,
            });
        }
        if let Some(op) = UnaryOp::from_name(op) {
            return Some(Expr::Unop {
                ty,
                op,
                operand: self.parse_operand()?,
            });
        }
        if let Some(op) = BinaryOp::from_name(op) {
            return Some(Expr::Binop {
                ty,
                op,
                lhs: self.parse_operand()?,
                rhs: self.parse_operand()?,
            });
        }
        if let Some(op) = RelOp::from_name(op) {
            return Some(Expr::Relop {
                ty,
                op,
                lhs: self.parse_operand()?,
                rhs: self.parse_operand()?,
            });
        }
        self.unknown_instruction(full, head)
    }

    /// The literal of `<t>.const`, range-checked against `ty`.
    fn parse_const(&mut self, ty: ValueType) -> Option<Expr> {
        let value = match (self.peek_kind(), ty) {
            (&TokenKind::Integer(value), ValueType::I32) => {
                if !(i32::MIN as i128..=u32::MAX as i128).contains(&value) {
                    return self.literal_out_of_range(value, ty);
                }
                Literal::Int(value as i32 as i64)
            }
            (&TokenKind::Integer(value), ValueType::I64) => {
                if !(i64::MIN as i128..=u64::MAX as i128).contains(&value) {
                    return self.literal_out_of_range(value, ty);
                }
                Literal::Int(value as i64)
            }
            (&TokenKind::Integer(value), _) => Literal::Float(value as f64),
            (&TokenKind::Float(value), ValueType::F32 | ValueType::F64) => Literal::Float(value),
            _ => {
                self.error_at_current(
                    ErrorCode::INVALID_LITERAL,
                    format!("invalid {ty} literal '{}'", self.peek_kind()),
                );
                return None;
            }
        };
        self.advance();
        Some(Expr::Const { ty, value })
    }

    fn literal_out_of_range<T>(&mut self, value: i128, ty: ValueType) -> Option<T> {
        self.error_at_current(
            ErrorCode::INVALID_LITERAL,
            format!("constant {value} is out of range for {ty}"),
        );
        None
    }

    /// `offset=N? align=N?`
    fn parse_memarg(&mut self) -> Option<(u32, Option<u32>)> {
        let mut offset = 0;
        let mut align = None;
        loop {
            let keyword = match self.peek_kind().keyword() {
                Some(keyword) => keyword.to_string(),
                None => break,
            };
            let (slot, digits) = if let Some(digits) = keyword.strip_prefix("offset=") {
                (&mut offset, digits)
            } else if let Some(digits) = keyword.strip_prefix("align=") {
                (align.insert(0), digits)
            } else {
                break;
            };
            match parse_memarg_value(digits) {
                Some(value) => *slot = value,
                None => {
                    self.error_at_current(
                        ErrorCode::INVALID_LITERAL,
                        format!("invalid memory immediate '{keyword}'"),
                    );
                    return None;
                }
            }
            self.advance();
        }
        Some((offset, align))
    }
}

/// Width and signedness of a `load`/`store` suffix: `""`, `"8_s"`, `"16"`.
/// `None` for a suffix that does not fit `ty`.
fn access_width(ty: ValueType, suffix: &str, is_load: bool) -> Option<(Option<u32>, bool)> {
    if suffix.is_empty() {
        return Some((None, false));
    }
    if ty.is_float() {
        return None;
    }
    let (bits, signed) = if is_load {
        match suffix.split_once('_')? {
            (bits, "s") => (bits, true),
            (bits, "u") => (bits, false),
            _ => return None,
        }
    } else {
        (suffix, false)
    };
    let bits: u32 = bits.parse().ok()?;
    matches!(bits, 8 | 16 | 32)
        .then_some(bits)
        .filter(|&bits| bits < ty.bit_width())
        .map(|bits| (Some(bits), signed))
}

fn parse_memarg_value(digits: &str) -> Option<u32> {
    match digits.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}
