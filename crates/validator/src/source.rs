//! TypeScript source analysis.
//!
//! Parses the module once and walks it with a single visitor that records
//! SDK imports, `register(...)` calls and denylisted constructs.

use serde::{Deserialize, Serialize};
use swc_common::{FileName, SourceMap, Span, Spanned, sync::Lrc};
use swc_ecma_ast::*;
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax, error::SyntaxError, lexer::Lexer};
use swc_ecma_visit::{Visit, VisitWith};

use crate::SDK_MODULE;
use crate::error::ValidationError;

/// Modules that spawn processes or evaluate code.
const DENIED_MODULES: &[&str] = &[
    "child_process",
    "vm",
    "worker_threads",
    "cluster",
    "module",
    "inspector",
];

/// Functions that start a subprocess when called by name.
const SPAWN_FUNCTIONS: &[&str] = &[
    "exec",
    "execSync",
    "execFile",
    "execFileSync",
    "spawn",
    "spawnSync",
    "fork",
];

/// Category of an advisory finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Import or `require` of a denylisted module.
    DangerousImport,
    /// `eval(...)`, `Function(...)` or `new Function(...)`.
    DynamicEval,
    /// `exec*` / `spawn*` / `fork` call.
    ProcessSpawn,
    /// `Deno.run(...)` or `Deno.Command`.
    DenoSubprocess,
}

/// An advisory finding. Never causes rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Category.
    pub kind: WarningKind,
    /// 1-based line.
    pub line: usize,
    /// Human-readable description.
    pub message: String,
}

/// One `register(...)` call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// 1-based line of the call.
    pub line: usize,
    /// The literal name, or why it could not be read.
    pub name: Result<String, String>,
}

/// Everything the pipeline needs from one parse.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// At least one value import from the SDK module.
    pub imports_sdk: bool,
    /// Every `register(...)` call, in source order.
    pub registrations: Vec<Registration>,
    /// Denylist findings, in source order.
    pub warnings: Vec<Warning>,
}

/// Parse `text` as a TypeScript module and analyse it.
pub fn analyze(file_path: &str, text: &str) -> Result<Analysis, ValidationError> {
    let cm: Lrc<SourceMap> = Default::default();
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: false,
        decorators: false,
        dts: false,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: true,
    });

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let fm = cm.new_source_file(
        FileName::Custom(file_path.to_string()).into(),
        text.to_string(),
    );
    let lexer = Lexer::new(syntax, EsVersion::Es2022, StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|e| syntax_error(&cm, &e))?;
    if let Some(e) = parser.take_errors().first() {
        return Err(syntax_error(&cm, e));
    }

    let mut visitor = Analyzer {
        cm: &cm,
        out: Analysis::default(),
    };
    module.visit_with(&mut visitor);
    Ok(visitor.out)
}

fn syntax_error(cm: &SourceMap, err: &swc_ecma_parser::error::Error) -> ValidationError {
    let (line, column) = position(cm, err.span());
    let message = match err.kind() {
        SyntaxError::Eof => "unexpected end of file".to_owned(),
        SyntaxError::UnterminatedStrLit => "unterminated string literal".to_owned(),
        SyntaxError::UnterminatedTpl => "unterminated template literal".to_owned(),
        SyntaxError::Unexpected { got, expected } => {
            format!("unexpected token {got}, expected {expected}")
        }
        other => format!("{other:?}"),
    };
    ValidationError::Syntax {
        line,
        column,
        message,
    }
}

fn position(cm: &SourceMap, span: Span) -> (usize, usize) {
    let loc = cm.lookup_char_pos(span.lo);
    (loc.line, loc.col.0 + 1)
}

fn is_sdk_module(specifier: &str) -> bool {
    specifier == SDK_MODULE
        || specifier
            .strip_prefix(SDK_MODULE)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_denied_module(specifier: &str) -> bool {
    let bare = specifier.strip_prefix("node:").unwrap_or(specifier);
    DENIED_MODULES.contains(&bare)
}

fn str_value(s: &Str) -> String {
    s.value.to_string_lossy().into_owned()
}

/// Peel parentheses and type assertions off an expression.
fn unwrap_expr(mut expr: &Expr) -> &Expr {
    loop {
        expr = match expr {
            Expr::Paren(p) => &p.expr,
            Expr::TsAs(a) => &a.expr,
            Expr::TsConstAssertion(c) => &c.expr,
            Expr::TsSatisfies(s) => &s.expr,
            Expr::TsNonNull(n) => &n.expr,
            other => return other,
        };
    }
}

fn prop_name_to_string(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => Some(str_value(s)),
        _ => None,
    }
}

fn member_prop_name(prop: &MemberProp) -> Option<String> {
    match prop {
        MemberProp::Ident(ident) => Some(ident.sym.to_string()),
        MemberProp::Computed(c) => match unwrap_expr(&c.expr) {
            Expr::Lit(Lit::Str(s)) => Some(str_value(s)),
            _ => None,
        },
        MemberProp::PrivateName(_) => None,
    }
}

/// Name a callee resolves to: `foo` for `foo(...)`, `foo` for `x.foo(...)`.
fn callee_name(expr: &Expr) -> Option<String> {
    match unwrap_expr(expr) {
        Expr::Ident(ident) => Some(ident.sym.to_string()),
        Expr::Member(member) => member_prop_name(&member.prop),
        _ => None,
    }
}

/// `Deno.<prop>`
fn is_deno_member(expr: &Expr, prop: &str) -> bool {
    match unwrap_expr(expr) {
        Expr::Member(member) => {
            matches!(&*member.obj, Expr::Ident(obj) if obj.sym == *"Deno")
                && member_prop_name(&member.prop).as_deref() == Some(prop)
        }
        _ => false,
    }
}

/// Read the `name` property of the first `register` argument.
fn registration_name(args: &[ExprOrSpread]) -> Result<String, String> {
    let first = args
        .first()
        .ok_or_else(|| "missing options argument".to_owned())?;
    if first.spread.is_some() {
        return Err("options must be an object literal, not a spread".to_owned());
    }
    let Expr::Object(obj) = unwrap_expr(&first.expr) else {
        return Err("first argument must be an object literal".to_owned());
    };

    for prop in &obj.props {
        let PropOrSpread::Prop(prop) = prop else {
            continue;
        };
        if let Prop::KeyValue(kv) = &**prop {
            if prop_name_to_string(&kv.key).as_deref() == Some("name") {
                return match unwrap_expr(&kv.value) {
                    Expr::Lit(Lit::Str(s)) => Ok(str_value(s)),
                    _ => Err("'name' must be a string literal".to_owned()),
                };
            }
        } else if let Prop::Shorthand(ident) = &**prop {
            if ident.sym == *"name" {
                return Err("'name' must be a string literal".to_owned());
            }
        }
    }
    Err("options object has no 'name' property".to_owned())
}

struct Analyzer<'a> {
    cm: &'a SourceMap,
    out: Analysis,
}

impl Analyzer<'_> {
    fn line(&self, span: Span) -> usize {
        position(self.cm, span).0
    }

    fn warn(&mut self, kind: WarningKind, span: Span, message: String) {
        let line = self.line(span);
        self.out.warnings.push(Warning {
            kind,
            line,
            message,
        });
    }

    fn check_module_specifier(&mut self, specifier: &str, span: Span, how: &str) {
        if is_denied_module(specifier) {
            self.warn(
                WarningKind::DangerousImport,
                span,
                format!("{how} of '{specifier}' can spawn processes or evaluate code"),
            );
        }
    }
}

impl Visit for Analyzer<'_> {
    fn visit_import_decl(&mut self, n: &ImportDecl) {
        let specifier = str_value(&n.src);
        if is_sdk_module(&specifier) && !n.type_only {
            self.out.imports_sdk = true;
        }
        self.check_module_specifier(&specifier, n.src.span, "import");
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        match &n.callee {
            Callee::Expr(expr) => {
                let name = callee_name(expr);
                match name.as_deref() {
                    Some("register") => {
                        let line = self.line(n.span);
                        self.out.registrations.push(Registration {
                            line,
                            name: registration_name(&n.args),
                        });
                    }
                    Some("eval") if matches!(unwrap_expr(expr), Expr::Ident(_)) => {
                        self.warn(
                            WarningKind::DynamicEval,
                            n.span,
                            "eval(...) evaluates arbitrary code".to_owned(),
                        );
                    }
                    Some("Function") if matches!(unwrap_expr(expr), Expr::Ident(_)) => {
                        self.warn(
                            WarningKind::DynamicEval,
                            n.span,
                            "Function(...) compiles arbitrary code".to_owned(),
                        );
                    }
                    Some("require") => {
                        if let Some(Expr::Lit(Lit::Str(s))) =
                            n.args.first().map(|a| unwrap_expr(&a.expr))
                        {
                            self.check_module_specifier(&str_value(s), s.span, "require");
                        }
                    }
                    Some("run") if is_deno_member(expr, "run") => {
                        self.warn(
                            WarningKind::DenoSubprocess,
                            n.span,
                            "Deno.run(...) starts a subprocess".to_owned(),
                        );
                    }
                    Some("Command") if is_deno_member(expr, "Command") => {
                        self.warn(
                            WarningKind::DenoSubprocess,
                            n.span,
                            "Deno.Command starts a subprocess".to_owned(),
                        );
                    }
                    Some(other) if SPAWN_FUNCTIONS.contains(&other) => {
                        self.warn(
                            WarningKind::ProcessSpawn,
                            n.span,
                            format!("{other}(...) may start a subprocess"),
                        );
                    }
                    _ => {}
                }
            }
            Callee::Import(_) => {
                if let Some(Expr::Lit(Lit::Str(s))) = n.args.first().map(|a| unwrap_expr(&a.expr))
                {
                    self.check_module_specifier(&str_value(s), s.span, "dynamic import");
                }
            }
            Callee::Super(_) => {}
        }
        n.visit_children_with(self);
    }

    fn visit_new_expr(&mut self, n: &NewExpr) {
        let callee = unwrap_expr(&n.callee);
        if matches!(callee, Expr::Ident(ident) if ident.sym == *"Function") {
            self.warn(
                WarningKind::DynamicEval,
                n.span,
                "new Function(...) compiles arbitrary code".to_owned(),
            );
        } else if is_deno_member(callee, "Command") {
            self.warn(
                WarningKind::DenoSubprocess,
                n.span,
                "new Deno.Command(...) starts a subprocess".to_owned(),
            );
        }
        n.visit_children_with(self);
    }
}
