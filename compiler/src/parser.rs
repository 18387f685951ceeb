use crate::{
    error::{Location, SdlError},
    tokenizer::{Token, TokenKind},
    types::{
        ConstraintArg, ConstraintCall, Declaration, EnumDecl, Field, ImportDecl, NumericKind,
        Primitive, TypeDecl, TypeExpr, ValidationBlock, ValidationRule,
    },
    utils::{quote, syntax_error},
};

const DECLARATION_START: &str = "\"import\", \"enum\", \"type\", \"agent\" or \"validate\"";

/// Parses a token stream (as produced by `tokenize`) into declarations.
/// Stops at the first syntax error; no partial result is returned.
pub fn parse_module(tokens: &[Token], module: &str) -> Result<Vec<Declaration>, SdlError> {
    let mut parser = Parser::new(tokens, module)?;
    let mut declarations = Vec::new();

    while parser.current().kind != TokenKind::Eof {
        let tok = parser.current();
        let decl = if tok.is_keyword("import") {
            Declaration::Import(parser.parse_import()?)
        } else if tok.is_keyword("enum") {
            Declaration::Enum(parser.parse_enum()?)
        } else if tok.is_keyword("type") {
            Declaration::Type(parser.parse_record()?)
        } else if tok.is_keyword("agent") || tok.is_keyword("entry") {
            Declaration::Entry(parser.parse_record()?)
        } else if tok.is_keyword("validate") {
            Declaration::Validation(parser.parse_validation()?)
        } else {
            return Err(parser.unexpected_token(DECLARATION_START));
        };
        declarations.push(decl);
    }

    Ok(declarations)
}

struct Parser<'a> {
    tokens: &'a [Token],
    index:  usize,
    module: &'a str,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], module: &'a str) -> Result<Self, SdlError> {
        match tokens.last() {
            Some(last) if last.kind == TokenKind::Eof => Ok(Parser { tokens, index: 0, module }),
            _ => Err(SdlError::Internal("token stream is not terminated by EOF".to_string())),
        }
    }

    fn current(&self) -> &'a Token {
        self.peek(0)
    }

    /// Looks ahead without consuming; clamps to the trailing EOF token.
    fn peek(&self, offset: usize) -> &'a Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)]
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.current();
        if tok.kind != TokenKind::Eof {
            self.index += 1;
        }
        tok
    }

    fn location(&self, tok: &Token) -> Location {
        Location::new(self.module, tok.line, tok.column)
    }

    fn eat(&mut self, symbol: &str) -> bool {
        if self.current().is_symbol(symbol) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, symbol: &str) -> Result<&'a Token, SdlError> {
        if self.current().is_symbol(symbol) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(&quote(symbol)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<&'a Token, SdlError> {
        if self.current().kind == TokenKind::Identifier {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(what))
        }
    }

    fn unexpected_token(&self, expected: &str) -> SdlError {
        syntax_error(self.current(), expected, self.module)
    }

    fn parse_import(&mut self) -> Result<ImportDecl, SdlError> {
        let keyword = self.advance();
        let path_tok = self.current();
        if path_tok.kind != TokenKind::String {
            return Err(self.unexpected_token("module path string"));
        }
        self.advance();
        if path_tok.text.is_empty() {
            return Err(syntax_error(path_tok, "non-empty module path", self.module));
        }

        let alias = if self.current().is_keyword("as") {
            self.advance();
            Some(self.expect_identifier("import alias")?.text.clone())
        } else {
            None
        };

        Ok(ImportDecl {
            path: path_tok.text.clone(),
            alias,
            location: self.location(keyword),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, SdlError> {
        self.advance();
        let name_tok = self.expect_identifier("enum name")?;
        self.expect("{")?;

        let mut members: Vec<String> = Vec::new();
        while !self.current().is_symbol("}") {
            let member = self.expect_identifier("enum member or \"}\"")?;
            if members.contains(&member.text) {
                return Err(syntax_error(member, "a member name not already used in this enum", self.module));
            }
            members.push(member.text.clone());
            self.eat(",");
        }
        if members.is_empty() {
            return Err(self.unexpected_token("at least one enum member"));
        }
        self.expect("}")?;

        Ok(EnumDecl {
            name: name_tok.text.clone(),
            members,
            location: self.location(name_tok),
        })
    }

    /// `type Name { ... }` and `agent Name { ... }` share one grammar.
    fn parse_record(&mut self) -> Result<TypeDecl, SdlError> {
        self.advance();
        let name_tok = self.expect_identifier("type name")?;
        self.expect("{")?;

        let mut fields: Vec<Field> = Vec::new();
        while !self.eat("}") {
            let field = self.parse_field()?;
            if fields.iter().any(|f| f.name == field.name) {
                return Err(SdlError::SyntaxError {
                    found:    quote(&field.name),
                    expected: "a field name not already used in this type".to_string(),
                    location: field.location,
                });
            }
            fields.push(field);
        }

        Ok(TypeDecl {
            name: name_tok.text.clone(),
            fields,
            location: self.location(name_tok),
        })
    }

    fn parse_field(&mut self) -> Result<Field, SdlError> {
        let name_tok = self.expect_identifier("field name or \"}\"")?;
        let mut optional = self.eat("?");
        self.expect(":")?;
        let mut type_ = self.parse_type_expr()?;

        if self.eat("?") {
            if optional {
                return Err(syntax_error(self.peek_back(), "a single optional marker", self.module));
            }
            optional = true;
        }
        if optional && (self.current().is_symbol("|") || self.current().is_symbol("[")) {
            return Err(self.unexpected_token("end of field (\"?\" is only allowed on the field itself)"));
        }
        self.eat(",");

        if optional {
            type_ = TypeExpr::Optional(Box::new(type_));
        }
        Ok(Field {
            name: name_tok.text.clone(),
            type_,
            location: self.location(name_tok),
        })
    }

    fn peek_back(&self) -> &'a Token {
        &self.tokens[self.index.saturating_sub(1)]
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, SdlError> {
        let first = self.parse_postfix()?;
        if !self.current().is_symbol("|") {
            return Ok(first);
        }
        let mut arms = vec![first];
        while self.eat("|") {
            arms.push(self.parse_postfix()?);
        }
        Ok(TypeExpr::Union(arms))
    }

    fn parse_postfix(&mut self) -> Result<TypeExpr, SdlError> {
        let mut type_ = self.parse_atom()?;
        while self.eat("[") {
            self.expect("]")?;
            type_ = TypeExpr::ArrayOf(Box::new(type_));
        }
        Ok(type_)
    }

    fn parse_atom(&mut self) -> Result<TypeExpr, SdlError> {
        let tok = self.expect_identifier("type")?;

        if let Some(primitive) = Primitive::from_keyword(&tok.text) {
            if !self.current().is_symbol("(") {
                return Ok(TypeExpr::Primitive(primitive));
            }
            let Some(kind) = primitive.numeric_kind() else {
                return Err(self.unexpected_token("a type without range bounds (ranges apply to integer and number)"));
            };
            return self.parse_range(kind);
        }

        let mut name = tok.text.clone();
        while self.current().is_symbol(".") && self.peek(1).kind == TokenKind::Identifier {
            self.advance();
            name.push('.');
            name.push_str(&self.advance().text);
        }
        Ok(TypeExpr::Reference(name))
    }

    fn parse_range(&mut self, kind: NumericKind) -> Result<TypeExpr, SdlError> {
        self.expect("(")?;
        let min = self.parse_bound(kind)?;
        self.expect(".")?;
        self.expect(".")?;
        let max = self.parse_bound(kind)?;
        let close = self.expect(")")?;

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(syntax_error(close, "a range whose minimum does not exceed its maximum", self.module));
            }
        }
        Ok(TypeExpr::Range { kind, min, max })
    }

    fn parse_bound(&mut self, kind: NumericKind) -> Result<Option<f64>, SdlError> {
        let tok = self.current();
        if tok.kind != TokenKind::Number {
            return Ok(None);
        }
        let value = self.parse_number(tok)?;
        if kind == NumericKind::Integer && value.fract() != 0.0 {
            return Err(syntax_error(tok, "a whole number bound for an integer range", self.module));
        }
        self.advance();
        Ok(Some(value))
    }

    fn parse_number(&self, tok: &Token) -> Result<f64, SdlError> {
        tok.text
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| syntax_error(tok, "a finite number", self.module))
    }

    fn parse_validation(&mut self) -> Result<ValidationBlock, SdlError> {
        let keyword = self.advance();
        let target = if self.current().kind == TokenKind::Identifier {
            Some(self.advance().text.clone())
        } else {
            None
        };
        self.expect("{")?;

        let mut rules = Vec::new();
        while !self.eat("}") {
            let key = self.expect_identifier("field name, \"self\" or \"}\"")?;
            self.expect(":")?;
            let mut calls = vec![self.parse_call()?];
            // A comma either continues this rule or ends it before the next `key:`.
            while self.current().is_symbol(",") {
                let starts_rule = self.peek(1).kind == TokenKind::Identifier && self.peek(2).is_symbol(":");
                self.advance();
                if starts_rule || self.current().is_symbol("}") {
                    break;
                }
                calls.push(self.parse_call()?);
            }
            rules.push(ValidationRule {
                key: key.text.clone(),
                calls,
                location: self.location(key),
            });
        }

        Ok(ValidationBlock {
            target,
            rules,
            location: self.location(keyword),
        })
    }

    fn parse_call(&mut self) -> Result<ConstraintCall, SdlError> {
        let name = self.expect_identifier("constraint")?;
        let mut args = Vec::new();
        if self.eat("(") {
            while !self.eat(")") {
                if !args.is_empty() {
                    self.expect(",")?;
                }
                let tok = self.current();
                let arg = match tok.kind {
                    TokenKind::String => ConstraintArg::String(tok.text.clone()),
                    TokenKind::Number => ConstraintArg::Number(self.parse_number(tok)?),
                    TokenKind::Identifier => ConstraintArg::Ident(tok.text.clone()),
                    _ => return Err(self.unexpected_token("constraint argument or \")\"")),
                };
                self.advance();
                args.push(arg);
            }
        }
        Ok(ConstraintCall {
            name: name.text.clone(),
            args,
            location: self.location(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn parse(text: &str) -> Result<Vec<Declaration>, SdlError> {
        let tokens = tokenize(text, "test.sdl")?;
        parse_module(&tokens, "test.sdl")
    }

    fn record(decl: &Declaration) -> &TypeDecl {
        match decl {
            Declaration::Type(t) | Declaration::Entry(t) => t,
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_person() {
        let decls = parse("type Person { name: string\n age: integer\n email?: string }").unwrap();
        assert_eq!(decls.len(), 1);
        let person = record(&decls[0]);
        assert_eq!(person.name, "Person");
        let names: Vec<&str> = person.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "email"]);
        assert!(!person.fields[0].is_optional());
        assert_eq!(
            person.fields[2].type_,
            TypeExpr::Optional(Box::new(TypeExpr::Primitive(Primitive::String)))
        );
    }

    #[test]
    fn test_parse_enum_members_in_order() {
        let decls = parse("enum Status { active, inactive\n archived }").unwrap();
        match &decls[0] {
            Declaration::Enum(e) => {
                assert_eq!(e.name, "Status");
                assert_eq!(e.members, vec!["active", "inactive", "archived"]);
            }
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_enum_fails() {
        assert!(matches!(parse("enum Empty { }"), Err(SdlError::SyntaxError { .. })));
    }

    #[test]
    fn test_parse_imports() {
        let decls = parse("import \"./common.sdl\" as common\nimport \"@/shared\"").unwrap();
        assert_eq!(
            decls[0],
            Declaration::Import(ImportDecl {
                path:     "./common.sdl".into(),
                alias:    Some("common".into()),
                location: Location::new("test.sdl", 1, 1),
            })
        );
        match &decls[1] {
            Declaration::Import(i) => assert!(i.alias.is_none()),
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_import_without_path_fails() {
        let err = parse("import as common").unwrap_err();
        match err {
            SdlError::SyntaxError { found, expected, .. } => {
                assert_eq!(found, "\"as\"");
                assert_eq!(expected, "module path string");
            }
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_type_expressions() {
        let decls = parse(
            "agent Bot {\n\
               tags: string[][]\n\
               contact: string | common.Address | Ref[]\n\
               temperature: number(0..2)\n\
               retries: integer(..5)?\n\
             }",
        )
        .unwrap();
        assert!(matches!(decls[0], Declaration::Entry(_)));
        let bot = record(&decls[0]);
        assert_eq!(
            bot.fields[0].type_,
            TypeExpr::ArrayOf(Box::new(TypeExpr::ArrayOf(Box::new(TypeExpr::Primitive(Primitive::String)))))
        );
        assert_eq!(
            bot.fields[1].type_,
            TypeExpr::Union(vec![
                TypeExpr::Primitive(Primitive::String),
                TypeExpr::Reference("common.Address".into()),
                TypeExpr::ArrayOf(Box::new(TypeExpr::Reference("Ref".into()))),
            ])
        );
        assert_eq!(
            bot.fields[2].type_,
            TypeExpr::Range { kind: NumericKind::Number, min: Some(0.0), max: Some(2.0) }
        );
        assert_eq!(
            bot.fields[3].type_,
            TypeExpr::Optional(Box::new(TypeExpr::Range { kind: NumericKind::Integer, min: None, max: Some(5.0) }))
        );
    }

    #[test]
    fn test_optional_inside_union_or_array_fails() {
        assert!(matches!(parse("type X { a: string? | integer }"), Err(SdlError::SyntaxError { .. })));
        assert!(matches!(parse("type X { a: string?[] }"), Err(SdlError::SyntaxError { .. })));
    }

    #[test]
    fn test_range_only_on_numbers() {
        assert!(matches!(parse("type X { a: string(0..1) }"), Err(SdlError::SyntaxError { .. })));
        assert!(matches!(parse("type X { a: integer(0.5..1) }"), Err(SdlError::SyntaxError { .. })));
        assert!(matches!(parse("type X { a: integer(9..1) }"), Err(SdlError::SyntaxError { .. })));
    }

    #[test]
    fn test_duplicate_field_fails() {
        let err = parse("type X {\n a: string\n a: integer\n}").unwrap_err();
        match err {
            SdlError::SyntaxError { location, .. } => assert_eq!(location.line, 3),
            other => panic!("expected SyntaxError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_validation_block() {
        let decls = parse(
            "type User { name: string\n email: string }\n\
             validate {\n\
               name: min_length(1), max_length(64),\n\
               email: pattern(\"^.+@.+$\")\n\
               self: required(name, email)\n\
             }",
        )
        .unwrap();
        let block = match &decls[1] {
            Declaration::Validation(v) => v,
            other => panic!("expected validation block, got {:?}", other),
        };
        assert!(block.target.is_none());
        assert_eq!(block.rules.len(), 3);
        assert_eq!(block.rules[0].key, "name");
        assert_eq!(block.rules[0].calls.len(), 2);
        assert_eq!(block.rules[0].calls[1].args, vec![ConstraintArg::Number(64.0)]);
        assert_eq!(block.rules[1].calls[0].args, vec![ConstraintArg::String("^.+@.+$".into())]);
        assert_eq!(
            block.rules[2].calls[0].args,
            vec![ConstraintArg::Ident("name".into()), ConstraintArg::Ident("email".into())]
        );
    }

    #[test]
    fn test_unknown_declaration_fails() {
        let err = parse("struct Foo {}").unwrap_err();
        assert!(err.to_string().contains("test.sdl:1:1"), "{}", err);
    }
}
