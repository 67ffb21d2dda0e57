//! Drives a parse query end to end: file text goes in through the setters,
//! a toy parser feeds the builder, and re-parses across revisions are only
//! performed for files whose text actually changed.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rillc_ast::{
    builder::{BuildResult, Builder},
    node::{
        Comment, Decl, Expr, Literal, LiteralValue, Module, ModuleKind,
        Symbol, Variable, VariableKind, Visibility,
    },
    ContextIdExt,
};
use rillc_base::{diagnostic::Diagnostic, location::Location};
use rillc_intern::InternedStr;
use rillc_query::{Context, Executor, Key};

// A deliberately tiny parser, just enough grammar to exercise the pipeline:
//
//   file   := item*
//   item   := "module" IDENT "{" item* "}"
//           | ("var" | "const") IDENT ["=" INT] ";"
//           | line comment

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Punct(char),
    Comment(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' | '}' | '=' | ';' => {
                tokens.push(Token::Punct(c));
                chars.next();
            }
            '/' => {
                let comment: String =
                    chars.by_ref().take_while(|&c| c != '\n').collect();
                tokens.push(Token::Comment(comment));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                tokens.push(Token::Int(digits.parse().unwrap()));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if !(d.is_alphanumeric() || d == '_') {
                        break;
                    }
                    word.push(d);
                    chars.next();
                }
                tokens.push(Token::Ident(word));
            }
            other => {
                tokens.push(Token::Punct(other));
                chars.next();
            }
        }
    }

    tokens
}

struct Parser<'a> {
    context: &'a Context,
    location: Location,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat_punct(&mut self, expected: char, builder: &mut Builder) -> bool {
        match self.next() {
            Some(Token::Punct(c)) if c == expected => true,
            other => {
                builder.add_error(Diagnostic::error(
                    self.location,
                    format!("expected `{expected}`, found {other:?}"),
                ));
                false
            }
        }
    }

    fn parse_item(&mut self, builder: &mut Builder) -> Option<Expr> {
        match self.next()? {
            Token::Comment(text) => {
                Some(Expr::Comment(Comment::new(self.location, text)))
            }
            Token::Ident(word) if word == "module" => {
                let name = self.parse_name(builder)?;
                self.eat_punct('{', builder);
                let mut body = Vec::new();
                while !matches!(
                    self.tokens.get(self.position),
                    None | Some(Token::Punct('}'))
                ) {
                    if let Some(item) = self.parse_item(builder) {
                        body.push(item);
                    }
                }
                self.eat_punct('}', builder);
                Some(Expr::Decl(Decl::new(
                    self.location,
                    Symbol::Module(Module::new(
                        self.location,
                        name,
                        Visibility::Default,
                        ModuleKind::Declared,
                        body,
                    )),
                )))
            }
            Token::Ident(word) if word == "var" || word == "const" => {
                let kind = if word == "var" {
                    VariableKind::Var
                } else {
                    VariableKind::Const
                };
                let name = self.parse_name(builder)?;
                let init = if matches!(
                    self.tokens.get(self.position),
                    Some(Token::Punct('='))
                ) {
                    self.position += 1;
                    match self.next() {
                        Some(Token::Int(value)) => {
                            Some(Box::new(Expr::Literal(Literal::new(
                                self.location,
                                LiteralValue::Int(value),
                            ))))
                        }
                        other => {
                            builder.add_error(Diagnostic::error(
                                self.location,
                                format!(
                                    "expected an integer initializer, found \
                                     {other:?}"
                                ),
                            ));
                            None
                        }
                    }
                } else {
                    None
                };
                self.eat_punct(';', builder);
                Some(Expr::Decl(Decl::new(
                    self.location,
                    Symbol::Variable(Variable::new(
                        self.location,
                        name,
                        Visibility::Default,
                        kind,
                        None,
                        init,
                    )),
                )))
            }
            other => {
                builder.add_error(Diagnostic::error(
                    self.location,
                    format!("unexpected token {other:?}"),
                ));
                None
            }
        }
    }

    fn parse_name(&mut self, builder: &mut Builder) -> Option<InternedStr> {
        match self.next() {
            Some(Token::Ident(name)) => {
                Some(self.context.unique_string(&name))
            }
            other => {
                builder.add_error(Diagnostic::error(
                    self.location,
                    format!("expected a name, found {other:?}"),
                ));
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Parse(InternedStr);

impl Key for Parse {
    type Value = BuildResult;
}

#[derive(Debug, Default)]
struct ParseExecutor {
    call_count: AtomicUsize,
}

impl Executor<Parse> for ParseExecutor {
    fn execute(&self, context: &Context, key: Parse) -> BuildResult {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let text = context.file_text(key.0);
        let mut builder = Builder::new(context, key.0.as_str());
        let mut parser = Parser {
            context,
            location: Location::whole_file(key.0),
            tokens: tokenize(&text),
            position: 0,
        };
        while parser.position < parser.tokens.len() {
            if let Some(item) = parser.parse_item(&mut builder) {
                builder.add_top_level(item);
            }
        }
        let result = builder.finish();
        for error in &result.errors {
            context.note_error(error.clone());
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TopLevelSymbolNames(InternedStr);

impl Key for TopLevelSymbolNames {
    type Value = Vec<String>;
}

#[derive(Debug, Default)]
struct TopLevelSymbolNamesExecutor {
    call_count: AtomicUsize,
}

impl Executor<TopLevelSymbolNames> for TopLevelSymbolNamesExecutor {
    fn execute(
        &self,
        context: &Context,
        key: TopLevelSymbolNames,
    ) -> Vec<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        context
            .query(&Parse(key.0))
            .top_level
            .iter()
            .filter_map(|expr| expr.as_decl())
            .map(|decl| decl.symbol.name().as_str().to_owned())
            .collect()
    }
}

fn fresh_context() -> (Context, Arc<ParseExecutor>) {
    let mut context = Context::new();
    let parse = Arc::new(ParseExecutor::default());
    context.register_executor(parse.clone());
    (context, parse)
}

#[test]
fn unchanged_files_are_not_reparsed() {
    let (mut context, parse) = fresh_context();

    let a = context.unique_string("a.rill");
    let b = context.unique_string("b.rill");
    context.set_file_text(a, "module A { var x = 1; }");
    context.set_file_text(b, "module B { var y = 2; }");
    context.advance_to_next_revision(false);

    let parsed_a = context.query(&Parse(a));
    let parsed_b = context.query(&Parse(b));
    assert_eq!(parse.call_count.load(Ordering::SeqCst), 2);
    assert!(parsed_a.errors.is_empty());
    assert!(parsed_b.errors.is_empty());

    // nothing changed: the next revision reuses both results untouched
    context.advance_to_next_revision(false);
    let reused_a = context.query(&Parse(a));
    let reused_b = context.query(&Parse(b));

    assert_eq!(parse.call_count.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&parsed_a.top_level[0], &reused_a.top_level[0]));
    assert!(Arc::ptr_eq(&parsed_b.top_level[0], &reused_b.top_level[0]));
    assert!(reused_a.errors.is_empty() && reused_b.errors.is_empty());
}

#[test]
fn only_the_changed_file_is_reparsed() {
    let (mut context, parse) = fresh_context();

    let a = context.unique_string("a.rill");
    let b = context.unique_string("b.rill");
    context.set_file_text(a, "module A { var x = 1; }");
    context.set_file_text(b, "module B { var y = 2; }");
    context.advance_to_next_revision(false);

    let parsed_a = context.query(&Parse(a));
    let _ = context.query(&Parse(b));
    assert_eq!(parse.call_count.load(Ordering::SeqCst), 2);

    // edit only b
    context.advance_to_next_revision(false);
    context.set_file_text(b, "module B { var y = 3; }");

    let reused_a = context.query(&Parse(a));
    let reparsed_b = context.query(&Parse(b));

    assert_eq!(parse.call_count.load(Ordering::SeqCst), 3);
    assert!(Arc::ptr_eq(&parsed_a.top_level[0], &reused_a.top_level[0]));

    let module_b = reparsed_b.top_level[0]
        .as_decl()
        .unwrap()
        .symbol
        .as_module()
        .unwrap();
    let y = module_b.body[0].as_decl().unwrap().symbol.as_variable().unwrap();
    assert_eq!(
        y.init.as_ref().unwrap().as_literal().unwrap().value,
        LiteralValue::Int(3)
    );
}

#[test]
fn loose_statements_are_wrapped_and_named_after_the_file() {
    let (mut context, _) = fresh_context();

    let path = context.unique_string("scratch.rill");
    context.set_file_text(path, "var x = 1; // a stray comment\nvar y = 2;");
    context.advance_to_next_revision(false);

    let parsed = context.query(&Parse(path));

    assert_eq!(parsed.top_level.len(), 1);
    let module =
        parsed.top_level[0].as_decl().unwrap().symbol.as_module().unwrap();
    assert_eq!(module.name.as_str(), "scratch");
    assert_eq!(module.kind, ModuleKind::Implicit);

    let x = &module.body[0].as_decl().unwrap().symbol;
    assert_eq!(x.id().symbol_path().as_str(), "scratch.x");
}

#[test]
fn parse_errors_reach_consuming_queries() {
    let (mut context, _) = fresh_context();
    let names = Arc::new(TopLevelSymbolNamesExecutor::default());
    context.register_executor(names.clone());

    let path = context.unique_string("broken.rill");
    context.set_file_text(path, "module M { var = 1; }");
    context.advance_to_next_revision(false);

    let symbols = context.query(&TopLevelSymbolNames(path));
    assert_eq!(symbols, vec!["M".to_owned()]);

    // the parse query stored its diagnostics...
    let parse_errors = context.saved_errors(&Parse(path)).unwrap();
    assert!(!parse_errors.is_empty());

    // ...and the consuming query accumulated them transitively
    let consumer_errors =
        context.saved_errors(&TopLevelSymbolNames(path)).unwrap();
    assert_eq!(consumer_errors, parse_errors);
}

#[test]
fn module_names_resolve_back_to_file_paths() {
    let (mut context, _) = fresh_context();

    let path = context.unique_string("lib/geo.rill");
    context.set_file_text(path, "module Geo { var pi = 3; }");
    context.advance_to_next_revision(false);

    let parsed = context.query(&Parse(path));
    let module =
        parsed.top_level[0].as_decl().unwrap().symbol.as_module().unwrap();

    let module_name = context.module_name_for_id(module.id());
    assert_eq!(module_name.as_str(), "Geo");

    context.set_file_path_for_module_name(module_name, path);

    let pi = &module.body[0].as_decl().unwrap().symbol;
    assert_eq!(context.module_name_for_id(pi.id()).as_str(), "Geo");
    assert_eq!(context.file_path_for_id(pi.id()), path);
}

#[test]
fn reparse_with_equivalent_content_keeps_the_tree_pointer() {
    let (mut context, parse) = fresh_context();

    let path = context.unique_string("same.rill");
    context.set_file_text(path, "module S { var v = 1; }");
    context.advance_to_next_revision(false);
    let first = context.query(&Parse(path));
    let stamps = context.saved_stamps(&Parse(path)).unwrap();

    // a whitespace-only edit changes the text, so the parse runs again, but
    // the merged result keeps the previous tree and does not count as a
    // change
    context.advance_to_next_revision(false);
    assert!(context.set_file_text(path, "module S {  var v = 1; }"));
    let second = context.query(&Parse(path));

    assert_eq!(parse.call_count.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&first.top_level[0], &second.top_level[0]));

    let reparsed_stamps = context.saved_stamps(&Parse(path)).unwrap();
    assert_eq!(reparsed_stamps.changed_at, stamps.changed_at);
    assert!(reparsed_stamps.computed_at > stamps.computed_at);
}
