//! Script, module and module-field parsing.

use crate::parser::Parser;
use wast_meter_lexer::TokenKind;
use wast_meter_types::ast::*;
use wast_meter_types::ErrorCode;

const FIELD_KEYWORDS: &[&str] = &["import", "func", "export", "memory", "start"];

impl<'src> Parser<'src> {
    /// `(module ...)*`, or bare fields forming one implicit module.
    pub(crate) fn parse_script(&mut self) -> Script {
        let mut script = Script::default();
        let mut implicit: Option<Module> = None;

        while !self.at_end() && !self.too_many_errors() {
            if self.at_form("module") {
                if let Some(module) = self.parse_module() {
                    script.modules.push(module);
                }
            } else if self.form_keyword().is_some_and(|kw| FIELD_KEYWORDS.contains(&kw)) {
                let start = self.current_span();
                let field = self.parse_field();
                let module = implicit.get_or_insert_with(|| Module {
                    span: start,
                    ..Module::default()
                });
                module.fields.extend(field);
            } else {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected '(module' or a module field, got '{}'", self.peek_kind()),
                );
                self.skip_top_level();
            }
        }

        if let Some(mut module) = implicit {
            module.span = module.span.to(self.previous_span());
            script.modules.push(module);
        }
        script
    }

    /// Skip one stray top-level token or form.
    fn skip_top_level(&mut self) {
        if self.eat(&TokenKind::LParen) {
            self.skip_form_rest();
        } else {
            self.advance();
        }
    }

    /// `(module $id? field*)`
    fn parse_module(&mut self) -> Option<Module> {
        let open = self.expect(&TokenKind::LParen)?.span;
        self.within_form(|p| {
            p.expect_keyword("module")?;
            let id = p.eat_id();
            let mut fields = Vec::new();
            while p.check(&TokenKind::LParen) && !p.too_many_errors() {
                if let Some(field) = p.parse_field() {
                    fields.push(field);
                }
            }
            p.expect(&TokenKind::RParen)?;
            Some(Module {
                id,
                fields,
                span: open.to(p.previous_span()),
            })
        })
    }

    /// One `(<field> ...)` form. Unknown fields are reported and skipped.
    pub(crate) fn parse_field(&mut self) -> Option<ModuleField> {
        let open = self.expect(&TokenKind::LParen)?.span;
        self.within_form(|p| {
            let keyword = p.peek_kind().keyword().map(str::to_string);
            let field = match keyword.as_deref() {
                Some("import") => ModuleField::Import(p.parse_import()?),
                Some("func") => ModuleField::Func(p.parse_func()?),
                Some("export") => ModuleField::Export(p.parse_export()?),
                Some("memory") => ModuleField::Memory(p.parse_memory()?),
                Some("start") => ModuleField::Start(p.parse_start()?),
                _ => {
                    p.error_at_current(
                        ErrorCode::UNKNOWN_FIELD,
                        format!("unknown module field '{}'", p.peek_kind()),
                    );
                    return None;
                }
            };
            p.expect(&TokenKind::RParen)?;
            Some(set_field_span(field, open.to(p.previous_span())))
        })
    }

    /// `import $id? "module" "field" sig` or with a `(func $id? sig)` descriptor.
    fn parse_import(&mut self) -> Option<Import> {
        self.expect_keyword("import")?;
        let mut id = self.eat_id();
        let module = self.expect_string()?;
        let field = self.expect_string()?;
        let signature = if self.at_form("func") {
            self.advance();
            self.within_form(|p| {
                p.advance(); // `func`
                if let Some(inner) = p.eat_id() {
                    id = Some(inner);
                }
                let signature = p.parse_signature()?;
                p.expect(&TokenKind::RParen)?;
                Some(signature)
            })?
        } else {
            self.parse_signature()?
        };
        Some(Import {
            id,
            module,
            field,
            signature,
            span: Default::default(),
        })
    }

    /// `func $id? (export "n")? sig (local ..)* expr*`
    fn parse_func(&mut self) -> Option<Func> {
        self.expect_keyword("func")?;
        let id = self.eat_id();
        let export = if self.at_form("export") {
            self.advance();
            self.within_form(|p| {
                p.advance(); // `export`
                let name = p.expect_string()?;
                p.expect(&TokenKind::RParen)?;
                Some(name)
            })
        } else {
            None
        };
        let signature = self.parse_signature()?;
        let mut locals = Vec::new();
        while self.at_form("local") {
            self.advance();
            let group = self.within_form(|p| {
                p.advance(); // `local`
                let group = p.parse_value_list()?;
                p.expect(&TokenKind::RParen)?;
                Some(group)
            })?;
            locals.extend(group);
        }
        let body = self.parse_expr_list()?;
        Some(Func {
            id,
            export,
            signature,
            locals,
            body,
            span: Default::default(),
        })
    }

    /// `(param ..)* (result t)?`
    fn parse_signature(&mut self) -> Option<FuncSig> {
        let mut signature = FuncSig::default();
        while self.at_form("param") {
            self.advance();
            let group = self.within_form(|p| {
                p.advance(); // `param`
                let group = p.parse_value_list()?;
                p.expect(&TokenKind::RParen)?;
                Some(group)
            })?;
            signature.params.extend(group);
        }
        if self.at_form("result") {
            signature.result = Some(self.parse_result_type()?);
        }
        Some(signature)
    }

    /// `(result t)`
    pub(crate) fn parse_result_type(&mut self) -> Option<ValueType> {
        self.expect(&TokenKind::LParen)?;
        self.within_form(|p| {
            p.expect_keyword("result")?;
            let ty = p.expect_value_type()?;
            p.expect(&TokenKind::RParen)?;
            Some(ty)
        })
    }

    /// `$id t` or `t*` inside a `param`/`local` form.
    fn parse_value_list(&mut self) -> Option<Vec<Local>> {
        if let Some(id) = self.eat_id() {
            let ty = self.expect_value_type()?;
            return Some(vec![Local::named(id, ty)]);
        }
        let mut group = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_end() {
            group.push(Local::new(self.expect_value_type()?));
        }
        Some(group)
    }

    /// `export "name" var` or `export "name" (func var)`
    fn parse_export(&mut self) -> Option<Export> {
        self.expect_keyword("export")?;
        let name = self.expect_string()?;
        let func = if self.at_form("func") {
            self.advance();
            self.within_form(|p| {
                p.advance(); // `func`
                let var = p.expect_var()?;
                p.expect(&TokenKind::RParen)?;
                Some(var)
            })?
        } else {
            self.expect_var()?
        };
        Some(Export {
            name,
            func,
            span: Default::default(),
        })
    }

    /// `memory initial maximum?`
    fn parse_memory(&mut self) -> Option<Memory> {
        self.expect_keyword("memory")?;
        let initial = self.expect_u32()?;
        let maximum = match self.peek_kind() {
            TokenKind::Integer(_) => Some(self.expect_u32()?),
            _ => None,
        };
        if maximum.is_some_and(|max| max < initial) {
            self.error_at(
                ErrorCode::MALFORMED_MODULE,
                "memory maximum is smaller than its initial size",
                self.previous_span(),
            );
            return None;
        }
        Some(Memory {
            initial,
            maximum,
            span: Default::default(),
        })
    }

    /// `start var`
    fn parse_start(&mut self) -> Option<Start> {
        self.expect_keyword("start")?;
        let func = self.expect_var()?;
        Some(Start {
            func,
            span: Default::default(),
        })
    }
}

fn set_field_span(mut field: ModuleField, span: wast_meter_types::Span) -> ModuleField {
    match &mut field {
        ModuleField::Import(import) => import.span = span,
        ModuleField::Func(func) => func.span = span,
        ModuleField::Export(export) => export.span = span,
        ModuleField::Memory(memory) => memory.span = span,
        ModuleField::Start(start) => start.span = span,
    }
    field
}
