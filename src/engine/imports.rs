//! Built-in engine: parses each file with swc and checks that every module
//! reference resolves through the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use swc_common::{FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::{
    BlockStmtOrExpr, Callee, Decl, EsVersion, Expr, Lit, Module, ModuleDecl, ModuleItem, Prop,
    PropOrSpread, Stmt, Str, TsModuleRef,
};
use swc_ecma_parser::{EsSyntax, Syntax, TsSyntax, parse_file_as_module};
use tracing::{debug, trace};

use super::{Engine, EngineFactory};
use crate::diagnostic::{Category, Diagnostic};
use crate::error::Error;
use crate::host::LanguageServiceHost;
use crate::package;
use crate::resolver::{self, ModuleKind};

pub const SYNTAX_ERROR: u32 = 1005;
pub const CANNOT_FIND_MODULE: u32 = 2307;
pub const LIB_NOT_FOUND: u32 = 6053;
pub const NO_DECLARATION_FILE: u32 = 7016;

/// A string-literal module reference and the byte range of the literal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportRef {
    specifier: String,
    start: u32,
    length: u32,
}

struct SyntaxProblem {
    start: u32,
    length: u32,
    message: String,
}

#[derive(Default)]
struct Parsed {
    imports: Vec<ImportRef>,
    problems: Vec<SyntaxProblem>,
}

fn syntax_for(kind: ModuleKind) -> Option<Syntax> {
    let syntax = match kind {
        ModuleKind::TypeScript => Syntax::Typescript(TsSyntax {
            decorators: true,
            ..Default::default()
        }),
        ModuleKind::Tsx => Syntax::Typescript(TsSyntax {
            tsx: true,
            decorators: true,
            ..Default::default()
        }),
        ModuleKind::Declaration => Syntax::Typescript(TsSyntax {
            dts: true,
            ..Default::default()
        }),
        ModuleKind::JavaScript => Syntax::Es(EsSyntax::default()),
        ModuleKind::Jsx => Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
        ModuleKind::Json => return None,
    };
    Some(syntax)
}

/// Byte range of `span` relative to the start of its file. Empty spans are
/// widened to one byte so they can still be located.
fn local_range(span: Span, base: u32) -> (u32, u32) {
    let start = span.lo.0.saturating_sub(base);
    let end = span.hi.0.saturating_sub(base);
    (start, end.saturating_sub(start).max(1))
}

fn parse_source(path: &Path, kind: ModuleKind, text: &str) -> Parsed {
    let Some(syntax) = syntax_for(kind) else {
        return Parsed::default();
    };
    let cm = Arc::<SourceMap>::default();
    let fm = cm.new_source_file(
        FileName::Custom(path.display().to_string()).into(),
        text.to_string(),
    );
    let base = fm.start_pos.0;
    let mut recovered = vec![];
    let result = parse_file_as_module(&fm, syntax, EsVersion::EsNext, None, &mut recovered);

    let mut parsed = Parsed::default();
    let fatal = match result {
        Ok(module) => {
            let mut collector = Collector {
                base,
                found: Vec::new(),
            };
            collector.module(&module);
            parsed.imports = collector.found;
            None
        }
        Err(e) => Some(e),
    };
    for error in recovered.into_iter().chain(fatal) {
        let (start, length) = local_range(error.span(), base);
        parsed.problems.push(SyntaxProblem {
            start,
            length,
            message: error.kind().msg().into_owned(),
        });
    }
    parsed
}

/// Walks a module collecting every literal module reference.
struct Collector {
    base: u32,
    found: Vec<ImportRef>,
}

impl Collector {
    fn push(&mut self, literal: &Str) {
        let (start, length) = local_range(literal.span, self.base);
        self.found.push(ImportRef {
            specifier: literal.value.to_string(),
            start,
            length,
        });
    }

    fn module(&mut self, module: &Module) {
        for item in &module.body {
            match item {
                ModuleItem::ModuleDecl(decl) => self.module_decl(decl),
                ModuleItem::Stmt(stmt) => self.stmt(stmt),
            }
        }
    }

    fn module_decl(&mut self, decl: &ModuleDecl) {
        match decl {
            ModuleDecl::Import(import) => self.push(&import.src),
            ModuleDecl::ExportAll(export) => self.push(&export.src),
            ModuleDecl::ExportNamed(named) => {
                if let Some(src) = &named.src {
                    self.push(src);
                }
            }
            // import x = require("y")
            ModuleDecl::TsImportEquals(import) => {
                if let TsModuleRef::TsExternalModuleRef(external) = &import.module_ref {
                    self.push(&external.expr);
                }
            }
            ModuleDecl::ExportDecl(export) => self.decl(&export.decl),
            ModuleDecl::ExportDefaultExpr(export) => self.expr(&export.expr),
            _ => {}
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.expr(&expr.expr),
            Stmt::Decl(decl) => self.decl(decl),
            Stmt::Block(block) => self.stmts(&block.stmts),
            Stmt::If(if_stmt) => {
                self.expr(&if_stmt.test);
                self.stmt(&if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.stmt(alt);
                }
            }
            Stmt::Switch(switch) => {
                self.expr(&switch.discriminant);
                for case in &switch.cases {
                    self.stmts(&case.cons);
                }
            }
            Stmt::Try(try_stmt) => {
                self.stmts(&try_stmt.block.stmts);
                if let Some(handler) = &try_stmt.handler {
                    self.stmts(&handler.body.stmts);
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    self.stmts(&finalizer.stmts);
                }
            }
            Stmt::While(while_stmt) => self.stmt(&while_stmt.body),
            Stmt::DoWhile(do_while) => self.stmt(&do_while.body),
            Stmt::For(for_stmt) => self.stmt(&for_stmt.body),
            Stmt::ForIn(for_in) => self.stmt(&for_in.body),
            Stmt::ForOf(for_of) => self.stmt(&for_of.body),
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.expr(arg);
                }
            }
            Stmt::Labeled(labeled) => self.stmt(&labeled.body),
            _ => {}
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(var) => {
                for declarator in &var.decls {
                    if let Some(init) = &declarator.init {
                        self.expr(init);
                    }
                }
            }
            Decl::Fn(func) => {
                if let Some(body) = &func.function.body {
                    self.stmts(&body.stmts);
                }
            }
            _ => {}
        }
    }

    /// First argument of a call, when it is a plain string literal.
    fn literal_arg(args: &[swc_ecma_ast::ExprOrSpread]) -> Option<&Str> {
        match args.first().map(|arg| &*arg.expr) {
            Some(Expr::Lit(Lit::Str(s))) => Some(s),
            _ => None,
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(call) => {
                match &call.callee {
                    // import("y")
                    Callee::Import(_) => {
                        if let Some(s) = Self::literal_arg(&call.args) {
                            self.push(s);
                        }
                        return;
                    }
                    // require("y")
                    Callee::Expr(callee) => {
                        if let Expr::Ident(ident) = &**callee
                            && &*ident.sym == "require"
                        {
                            if let Some(s) = Self::literal_arg(&call.args) {
                                self.push(s);
                            }
                            return;
                        }
                        self.expr(callee);
                    }
                    Callee::Super(_) => {}
                }
                for arg in &call.args {
                    self.expr(&arg.expr);
                }
            }
            Expr::Arrow(arrow) => match &*arrow.body {
                BlockStmtOrExpr::BlockStmt(block) => self.stmts(&block.stmts),
                BlockStmtOrExpr::Expr(body) => self.expr(body),
            },
            Expr::Fn(func) => {
                if let Some(body) = &func.function.body {
                    self.stmts(&body.stmts);
                }
            }
            Expr::Assign(assign) => self.expr(&assign.right),
            Expr::Seq(seq) => {
                for e in &seq.exprs {
                    self.expr(e);
                }
            }
            Expr::Paren(paren) => self.expr(&paren.expr),
            Expr::Await(await_expr) => self.expr(&await_expr.arg),
            Expr::Cond(cond) => {
                self.expr(&cond.test);
                self.expr(&cond.cons);
                self.expr(&cond.alt);
            }
            Expr::Bin(bin) => {
                self.expr(&bin.left);
                self.expr(&bin.right);
            }
            Expr::Unary(unary) => self.expr(&unary.arg),
            Expr::Member(member) => self.expr(&member.obj),
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.expr(&elem.expr);
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Prop(p) => {
                            if let Prop::KeyValue(kv) = &**p {
                                self.expr(&kv.value);
                            }
                        }
                        PropOrSpread::Spread(spread) => self.expr(&spread.expr),
                    }
                }
            }
            Expr::Tpl(tpl) => {
                for e in &tpl.exprs {
                    self.expr(e);
                }
            }
            Expr::TsAs(as_expr) => self.expr(&as_expr.expr),
            Expr::TsNonNull(non_null) => self.expr(&non_null.expr),
            _ => {}
        }
    }
}

/// Checks syntax and module references of each file it is asked about.
pub struct ImportCheckEngine {
    host: Arc<dyn LanguageServiceHost>,
    lib_checked: AtomicBool,
}

impl ImportCheckEngine {
    pub fn new(host: Arc<dyn LanguageServiceHost>) -> Self {
        Self {
            host,
            lib_checked: AtomicBool::new(false),
        }
    }

    /// The default library check completes once per session. A check that
    /// fails with an I/O error does not count and runs again next time.
    fn missing_default_lib(&self) -> Result<Option<Diagnostic>, Error> {
        if self.lib_checked.load(Ordering::Acquire) {
            return Ok(None);
        }
        let settings = self.host.compilation_settings();
        let lib = match self.host.default_library_file_name(settings) {
            Some(lib) if !settings.no_lib => lib,
            _ => {
                self.lib_checked.store(true, Ordering::Release);
                return Ok(None);
            }
        };
        let present = self.host.file_exists(&lib)?;
        // Only the thread that flips the flag gets to report.
        if self.lib_checked.swap(true, Ordering::AcqRel) || present {
            return Ok(None);
        }
        debug!(lib = %lib.display(), "default library not found");
        Ok(Some(Diagnostic::global(
            Category::Error,
            LIB_NOT_FOUND,
            format!("File '{}' not found.", lib.display()),
        )))
    }
}

impl Engine for ImportCheckEngine {
    fn diagnostics(&self, file: &Path) -> Result<Vec<Diagnostic>, Error> {
        let snapshot = self.host.script_snapshot(file)?.ok_or_else(|| {
            Error::FileRead(file.to_path_buf(), std::io::ErrorKind::NotFound.into())
        })?;
        let path = snapshot.path();
        let text = snapshot.text()?;
        let mut out: Vec<Diagnostic> = self.missing_default_lib()?.into_iter().collect();

        let Some(kind) = ModuleKind::from_path(path) else {
            return Ok(out);
        };
        let parsed = parse_source(path, kind, &text);
        trace!(
            file = %path.display(),
            imports = parsed.imports.len(),
            syntax_errors = parsed.problems.len(),
            "parsed"
        );
        for problem in parsed.problems {
            out.push(Diagnostic::at(
                Category::Error,
                SYNTAX_ERROR,
                problem.message,
                path,
                problem.start,
                problem.length,
            ));
        }

        let imports: Vec<ImportRef> = parsed
            .imports
            .into_iter()
            .filter(|i| resolver::is_path_specifier(&i.specifier) || !package::is_node_builtin(&i.specifier))
            .collect();
        let specifiers: Vec<String> = imports.iter().map(|i| i.specifier.clone()).collect();
        let settings = self.host.compilation_settings();
        let resolved = self
            .host
            .resolve_module_names(&specifiers, path, settings)?;

        for (import, module) in imports.iter().zip(resolved) {
            let problem = match module {
                None => Some((
                    CANNOT_FIND_MODULE,
                    format!(
                        "Cannot find module '{}' or its corresponding type declarations.",
                        import.specifier
                    ),
                )),
                Some(m)
                    if settings.strict
                        && m.is_external
                        && matches!(m.kind, ModuleKind::JavaScript | ModuleKind::Jsx) =>
                {
                    Some((
                        NO_DECLARATION_FILE,
                        format!(
                            "Could not find a declaration file for module '{}'.",
                            import.specifier
                        ),
                    ))
                }
                Some(_) => None,
            };
            if let Some((code, message)) = problem {
                out.push(Diagnostic::at(
                    Category::Error,
                    code,
                    message,
                    path,
                    import.start,
                    import.length,
                ));
            }
        }
        Ok(out)
    }
}

/// Builds an [`ImportCheckEngine`] per session.
#[derive(Debug, Default, Clone)]
pub struct ImportCheckFactory {
    lib_dir: Option<PathBuf>,
}

impl ImportCheckFactory {
    pub fn new(lib_dir: Option<PathBuf>) -> Self {
        Self { lib_dir }
    }
}

impl EngineFactory for ImportCheckFactory {
    fn create(&self, host: Arc<dyn LanguageServiceHost>) -> Result<Box<dyn Engine>, Error> {
        Ok(Box::new(ImportCheckEngine::new(host)))
    }

    fn bundled_lib_dir(&self) -> Option<PathBuf> {
        self.lib_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::host::SessionHost;
    use crate::vfs::MemoryVfs;

    fn imports_of(source: &str) -> Vec<ImportRef> {
        parse_source(Path::new("/p/test.ts"), ModuleKind::TypeScript, source).imports
    }

    fn engine(vfs: MemoryVfs, config: &str, lib_dir: Option<&str>) -> ImportCheckEngine {
        shared_engine(Arc::new(vfs), config, lib_dir)
    }

    fn shared_engine(vfs: Arc<MemoryVfs>, config: &str, lib_dir: Option<&str>) -> ImportCheckEngine {
        let config = ProjectConfig::parse(Path::new("/p/tsconfig.json"), config).unwrap();
        let host = SessionHost::new(
            config,
            Path::new("/p"),
            vfs,
            vec![],
            lib_dir.map(PathBuf::from),
        );
        ImportCheckEngine::new(Arc::new(host))
    }

    fn codes(diags: &[Diagnostic]) -> Vec<u32> {
        diags.iter().map(|d| d.code).collect()
    }

    #[test]
    fn collects_every_reference_form() {
        let imports = imports_of(
            r#"
            import { a } from "./a";
            import type { T } from "./types";
            export * from "./star";
            export { b } from "./b";
            import fs = require("./legacy");
            const c = require("./c");
            const d = () => import("./d");
            import("./e").then((m) => m);
            if (x) { require("./f"); }
            "#,
        );
        let specs: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(
            specs,
            ["./a", "./types", "./star", "./b", "./legacy", "./c", "./d", "./e", "./f"]
        );
    }

    #[test]
    fn non_literal_require_is_skipped() {
        assert!(imports_of("const m = require(name);").is_empty());
    }

    #[test]
    fn reference_span_covers_the_literal() {
        let source = r#"import x from "./b";"#;
        let imports = imports_of(source);
        let i = &imports[0];
        let literal = &source[i.start as usize..(i.start + i.length) as usize];
        assert_eq!(literal, r#""./b""#);
    }

    #[test]
    fn unresolved_import_is_reported() {
        let e = engine(
            MemoryVfs::new().with_file("/p/a.ts", "import { x } from './missing';\n"),
            "{}",
            None,
        );
        let diags = e.diagnostics(Path::new("/p/a.ts")).unwrap();
        assert_eq!(codes(&diags), vec![CANNOT_FIND_MODULE]);
        assert_eq!(diags[0].start, Some(18));
        assert!(diags[0].message.contains("'./missing'"));
    }

    #[test]
    fn resolved_declaration_and_builtins_are_clean() {
        let e = engine(
            MemoryVfs::new()
                .with_file("/p/a.ts", "import {x} from './b';\nimport fs from 'node:fs';\n")
                .with_file("/p/b.d.ts", "export declare const x: number;"),
            "{}",
            None,
        );
        assert!(e.diagnostics(Path::new("/p/a.ts")).unwrap().is_empty());
    }

    #[test]
    fn script_only_package_needs_strict_for_7016() {
        let files = || {
            MemoryVfs::new()
                .with_file("/p/a.ts", "import lib from 'lib';\n")
                .with_file("/p/node_modules/lib/index.js", "module.exports = 1;")
        };
        let loose = engine(files(), "{}", None);
        assert!(loose.diagnostics(Path::new("/p/a.ts")).unwrap().is_empty());

        let strict = engine(files(), r#"{ "compilerOptions": { "strict": true } }"#, None);
        let diags = strict.diagnostics(Path::new("/p/a.ts")).unwrap();
        assert_eq!(codes(&diags), vec![NO_DECLARATION_FILE]);
    }

    #[test]
    fn syntax_error_is_reported() {
        let e = engine(MemoryVfs::new().with_file("/p/a.ts", "const = ;"), "{}", None);
        let diags = e.diagnostics(Path::new("/p/a.ts")).unwrap();
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|d| d.code == SYNTAX_ERROR));
        assert!(diags[0].length.unwrap() >= 1);
    }

    #[test]
    fn missing_default_lib_reported_once() {
        let e = engine(
            MemoryVfs::new()
                .with_file("/p/a.ts", "")
                .with_file("/p/b.ts", ""),
            "{}",
            Some("/lib"),
        );
        let first = e.diagnostics(Path::new("/p/a.ts")).unwrap();
        assert_eq!(codes(&first), vec![LIB_NOT_FOUND]);
        assert!(first[0].file.is_none());
        assert!(first[0].message.contains("lib.d.ts"));
        assert!(e.diagnostics(Path::new("/p/b.ts")).unwrap().is_empty());
    }

    #[test]
    fn failed_default_lib_check_runs_again() {
        let vfs = Arc::new(
            MemoryVfs::new()
                .with_file("/p/a.ts", "")
                .with_failure("/lib/lib.d.ts", std::io::ErrorKind::PermissionDenied),
        );
        let e = shared_engine(Arc::clone(&vfs), "{}", Some("/lib"));
        let a = Path::new("/p/a.ts");
        assert!(matches!(e.diagnostics(a).unwrap_err(), Error::Stat(..)));

        vfs.clear_failure("/lib/lib.d.ts");
        assert_eq!(codes(&e.diagnostics(a).unwrap()), vec![LIB_NOT_FOUND]);
        assert!(e.diagnostics(a).unwrap().is_empty());
    }

    #[test]
    fn present_lib_or_no_lib_is_clean() {
        let present = engine(
            MemoryVfs::new()
                .with_file("/p/a.ts", "")
                .with_file("/lib/lib.es6.d.ts", ""),
            r#"{ "compilerOptions": { "target": "ES6" } }"#,
            Some("/lib"),
        );
        assert!(present.diagnostics(Path::new("/p/a.ts")).unwrap().is_empty());

        let no_lib = engine(
            MemoryVfs::new().with_file("/p/a.ts", ""),
            r#"{ "compilerOptions": { "noLib": true } }"#,
            Some("/lib"),
        );
        assert!(no_lib.diagnostics(Path::new("/p/a.ts")).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let e = engine(MemoryVfs::new(), "{}", None);
        let err = e.diagnostics(Path::new("/p/gone.ts")).unwrap_err();
        assert!(matches!(err, Error::FileRead(..)));
    }
}
