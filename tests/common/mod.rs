#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// A self-contained TypeScript project for integration tests.
///
/// Structure:
///   tsconfig.json               -> commented, `include: ["src"]`
///   src/clean.ts                -> imports ./b only
///   src/broken.ts               -> imports ./b, lib, typed, ./missing
///   src/b.d.ts                  -> declaration
///   node_modules/lib/           -> package.json `types` -> types/index.d.ts
///   node_modules/@types/typed/  -> ambient declaration
///   node_modules/plain/         -> script-only package
///
/// Properties:
///   - clean.ts has no diagnostics
///   - broken.ts has exactly one unresolved import (./missing, line 4)
pub struct TestProject {
    pub dir: tempfile::TempDir,
    pub root: PathBuf,
    pub clean: PathBuf,
    pub broken: PathBuf,
}

pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

impl TestProject {
    /// Create the fixture. Caller must keep the returned value alive
    /// (dropping `TempDir` deletes the files).
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();

        write(
            &root,
            "tsconfig.json",
            concat!(
                "{\n",
                "  // comments are allowed\n",
                "  \"compilerOptions\": { \"target\": \"es2015\", },\n",
                "  \"include\": [\"src\"],\n",
                "}\n",
            ),
        );
        let clean = write(
            &root,
            "src/clean.ts",
            "import { b } from './b';\nexport const c = b;\n",
        );
        let broken = write(
            &root,
            "src/broken.ts",
            concat!(
                "import { b } from './b';\n",
                "import lib from 'lib';\n",
                "import typed from 'typed';\n",
                "import { gone } from './missing';\n",
            ),
        );
        write(&root, "src/b.d.ts", "export declare const b: number;\n");

        write(
            &root,
            "node_modules/lib/package.json",
            r#"{"name":"lib","types":"types/index.d.ts","main":"index.js"}"#,
        );
        write(&root, "node_modules/lib/types/index.d.ts", "export default 1;\n");
        write(&root, "node_modules/lib/index.js", "module.exports = 1;\n");
        write(
            &root,
            "node_modules/@types/typed/index.d.ts",
            "declare const t: number;\nexport default t;\n",
        );
        write(&root, "node_modules/plain/index.js", "module.exports = 2;\n");

        Self {
            dir,
            root,
            clean,
            broken,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}
