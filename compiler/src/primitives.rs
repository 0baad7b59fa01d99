// primitives.rs — Action primitive registry
//
// Holds the signatures of action primitives: each parameter carries an
// access direction that drives the read/write set computation in HLIR
// construction. A built-in standard set is always present; supplementary
// JSON documents are merged in before analysis.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Data types ──────────────────────────────────────────────────────────────

/// How a primitive accesses the object bound to a parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn reads(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// A single primitive parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveParam {
    pub name: String,
    pub access: Access,
}

/// Signature of one action primitive.
///
/// Calls may pass fewer arguments than declared parameters — trailing
/// parameters (e.g. `modify_field`'s mask) are optional in P4-14.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveDef {
    pub name: String,
    pub params: Vec<PrimitiveParam>,
}

/// On-disk document shape for `--primitives` files.
#[derive(Debug, Deserialize)]
struct PrimitiveDocument {
    primitives: Vec<PrimitiveDef>,
}

/// Errors that can occur during registry loading.
#[derive(Debug)]
pub enum PrimitivesError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    DuplicatePrimitive {
        name: String,
        first: String,
        second: PathBuf,
    },
}

impl fmt::Display for PrimitivesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitivesError::Io { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            PrimitivesError::Parse { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            PrimitivesError::DuplicatePrimitive {
                name,
                first,
                second,
            } => {
                write!(
                    f,
                    "duplicate primitive '{}': first defined in {}, redefined in {}",
                    name,
                    first,
                    second.display()
                )
            }
        }
    }
}

impl std::error::Error for PrimitivesError {}

// ── Registry ────────────────────────────────────────────────────────────────

/// Primitive registry: the built-in standard set plus any merged documents.
pub struct Primitives {
    defs: Vec<PrimitiveDef>,
    index: HashMap<String, usize>,
    /// Where each primitive came from ("builtin" or a document path).
    origins: HashMap<String, String>,
}

impl Default for Primitives {
    fn default() -> Self {
        Self::standard()
    }
}

impl Primitives {
    /// An empty registry (tests only use this to exercise merging).
    pub fn empty() -> Self {
        Primitives {
            defs: Vec::new(),
            index: HashMap::new(),
            origins: HashMap::new(),
        }
    }

    /// The built-in P4-14 primitive set.
    pub fn standard() -> Self {
        let mut reg = Primitives::empty();
        for def in standard_defs() {
            reg.insert(def, "builtin")
                .expect("builtin primitive set contains duplicates");
        }
        reg
    }

    /// Merge a JSON primitive document. Returns the number of primitives
    /// added. Redefining an existing primitive is an error.
    pub fn load_json(&mut self, path: &Path) -> Result<usize, PrimitivesError> {
        let text = std::fs::read_to_string(path).map_err(|e| PrimitivesError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc: PrimitiveDocument =
            serde_json::from_str(&text).map_err(|e| PrimitivesError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        let count = doc.primitives.len();
        for def in doc.primitives {
            if let Some(first) = self.origins.get(&def.name) {
                return Err(PrimitivesError::DuplicatePrimitive {
                    name: def.name.clone(),
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }
            self.insert(def, &path.display().to_string())
                .expect("duplicate checked above");
        }
        Ok(count)
    }

    fn insert(&mut self, def: PrimitiveDef, origin: &str) -> Result<(), String> {
        if self.index.contains_key(&def.name) {
            return Err(def.name);
        }
        self.index.insert(def.name.clone(), self.defs.len());
        self.origins.insert(def.name.clone(), origin.to_string());
        self.defs.push(def);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&PrimitiveDef> {
        self.index.get(name).map(|&i| &self.defs[i])
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Canonical compact-JSON form for provenance fingerprints: primitives
    /// sorted by name, no whitespace. Stable across merge order.
    pub fn canonical_json(&self) -> String {
        let mut sorted: Vec<&PrimitiveDef> = self.defs.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        serde_json::to_string(&sorted).expect("primitive defs serialize")
    }
}

// ── Standard set ────────────────────────────────────────────────────────────

fn param(name: &str, access: Access) -> PrimitiveParam {
    PrimitiveParam {
        name: name.to_string(),
        access,
    }
}

fn def(name: &str, params: Vec<PrimitiveParam>) -> PrimitiveDef {
    PrimitiveDef {
        name: name.to_string(),
        params,
    }
}

fn standard_defs() -> Vec<PrimitiveDef> {
    use Access::*;
    vec![
        def(
            "modify_field",
            vec![param("dst", Write), param("src", Read), param("mask", Read)],
        ),
        def(
            "add_to_field",
            vec![param("dst", ReadWrite), param("value", Read)],
        ),
        def(
            "subtract_from_field",
            vec![param("dst", ReadWrite), param("value", Read)],
        ),
        def(
            "add",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "subtract",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "bit_and",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "bit_or",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "bit_xor",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "shift_left",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "shift_right",
            vec![param("dst", Write), param("a", Read), param("b", Read)],
        ),
        def(
            "register_read",
            vec![
                param("dst", Write),
                param("register", Read),
                param("index", Read),
            ],
        ),
        def(
            "register_write",
            vec![
                param("register", Read),
                param("index", Read),
                param("value", Read),
            ],
        ),
        def("count", vec![param("counter", Read), param("index", Read)]),
        def("drop", vec![]),
        def("no_op", vec![]),
    ]
}
