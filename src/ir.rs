// Strongly-typed declaration model handed over by the C front-end.
// The generator only walks this tree; it never re-parses C text.

use serde::Deserialize;

/// One top-level declaration from the header, in source order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Struct(StructDecl),
    Enum(EnumDecl),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructDecl {
    /// Absent for anonymous structs; only tagged structs get their own
    /// dump function.
    #[serde(default)]
    pub tag: Option<String>,
    /// Absent for forward declarations without a body.
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumDecl {
    pub tag: String,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
    /// Explicit `= n` initializer, when the header has one.
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    /// Absent only for anonymous splice points and declarator-less
    /// struct definitions.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Outermost dimension first: `x[2][3]` carries `[2, 3]`.
    #[serde(default)]
    pub array_dims: Vec<DimExpr>,
}

/// Closed set of member type shapes. Adding a variant here must break
/// every dispatch site until it is handled.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// Plain keyword type (`int`, `char`, `unsigned long`, ...).
    Primitive { keyword: String },
    /// Pre-classified `u?int<N>_t`.
    FixedWidthInt { signed: bool, bits: u16 },
    /// Struct definition written at the point of use (tagged or not).
    StructInline { decl: StructDecl },
    /// Reference to a struct defined elsewhere in the model.
    StructRef { tag: String },
    EnumRef { tag: String },
}

/// One array dimension bound. Bounds are reproduced verbatim in the
/// generated loops, never evaluated.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimExpr {
    Constant { value: u64 },
    Identifier { name: String },
    BinaryOp {
        op: String,
        left: Box<DimExpr>,
        right: Box<DimExpr>,
    },
    /// Variable-length array; the bound is not known at generation time.
    Unknown,
}

impl EnumDecl {
    /// Assign numeric values the way the compiler does: an unset value is
    /// previous + 1, the very first unset value is 0, and an explicit
    /// initializer resets the counter for everything after it.
    pub fn resolved_values(&self) -> Vec<(&str, i64)> {
        let mut out = Vec::with_capacity(self.values.len());
        let mut next = 0i64;
        for v in &self.values {
            let n = v.value.unwrap_or(next);
            next = n + 1;
            out.push((v.name.as_str(), n));
        }
        out
    }
}
