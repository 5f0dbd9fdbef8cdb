//! Generated-C emission: one name-lookup function per enum, one JSON dump
//! function per tagged struct, in resolver order.
//!
//! Two counters thread through the walk and must never be conflated:
//! - the CodeSink indent, which only shapes the generated file's layout;
//! - the runtime JSON depth, baked into each `i_printf(indent_level + d, ...)`
//!   call so the produced JSON is indented at run time.
//! A loop implementing an array dimension bumps the first, recursing into a
//! nested object bumps both.

use std::io::Write;

use thiserror::Error;

use crate::fmt::{fixed_width_format, fixed_width_parts, primitive_format};
use crate::ir::{Declaration, DimExpr, EnumDecl, Field, StructDecl, TypeRef};
use crate::resolve::{self, StructIndex};

/// Unsupported-construct failures. Any of these aborts the whole run;
/// partially generated serializer code is worse than none.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("unknown primitive type: {0}")]
    UnknownPrimitive(String),
    #[error("unsupported array bound operator: {0}")]
    UnsupportedDimOp(String),
    #[error("reference to struct {0} with no definition")]
    UndefinedStruct(String),
    #[error("unsupported declaration shape: {0}")]
    UnsupportedShape(String),
}

/// Accumulates generated C text with 4-space indentation tracking. This
/// indent is the generated file's own layout, nothing more.
pub struct CodeSink {
    buf: String,
    indent: usize,
}

impl CodeSink {
    pub fn new() -> Self {
        Self { buf: String::new(), indent: 0 }
    }
    pub fn line(&mut self, s: &str) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(s);
        self.buf.push('\n');
    }
    pub fn empty(&mut self) {
        self.buf.push('\n');
    }
    pub fn push(&mut self) {
        self.indent += 1;
    }
    pub fn pop(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }
    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Run the whole pipeline over an immutable model. Returns the complete
/// generated translation unit, or the first unsupported-construct error
/// with no partial text.
pub fn generate(decls: &[Declaration], trace: &mut dyn Write) -> Result<String, GenError> {
    let index = StructIndex::build(decls);
    let order = resolve::emission_order(decls, &index, trace)?;
    let enums = resolve::enums(decls);

    let mut cg = Codegen { sink: CodeSink::new(), index: &index, trace };
    for e in &enums {
        cg.emit_enum_to_str(e);
        cg.sink.empty();
    }
    for s in &order {
        cg.emit_struct_dump(s)?;
        cg.sink.empty();
    }
    Ok(cg.sink.into_string())
}

struct Codegen<'a> {
    sink: CodeSink,
    index: &'a StructIndex<'a>,
    trace: &'a mut dyn Write,
}

impl<'a> Codegen<'a> {
    /// One `i_printf` statement: runtime depth, C format-string body
    /// (already escaped for a C string literal), value arguments.
    fn stmt_print(&mut self, depth: u32, body: &str, args: &[String]) {
        let mut stmt = format!("i_printf(indent_level + {depth}, \"{body}\"");
        for a in args {
            stmt.push_str(", ");
            stmt.push_str(a);
        }
        stmt.push_str(");");
        self.sink.line(&stmt);
    }

    fn emit_enum_to_str(&mut self, e: &EnumDecl) {
        let _ = writeln!(self.trace, "codegen: enum {} ({} values)", e.tag, e.values.len());
        self.sink
            .line(&format!("const char *enum_{}_to_str(enum {} e)", e.tag, e.tag));
        self.sink.line("{");
        self.sink.push();
        self.sink.line("switch (e) {");
        for (name, value) in e.resolved_values() {
            let _ = writeln!(self.trace, "codegen:   enumerator {name} = {value}");
            self.sink.line(&format!("case {name}:"));
            self.sink.push();
            self.sink.line(&format!("return \"{name}\";"));
            self.sink.pop();
        }
        self.sink.line("default:");
        self.sink.push();
        self.sink.line("return \"unknown\";");
        self.sink.pop();
        self.sink.line("}");
        self.sink.pop();
        self.sink.line("}");
    }

    fn emit_struct_dump(&mut self, s: &StructDecl) -> Result<(), GenError> {
        // the resolver only schedules tagged structs with bodies
        let (Some(tag), Some(fields)) = (s.tag.as_deref(), s.fields.as_deref()) else {
            return Ok(());
        };
        let _ = writeln!(self.trace, "codegen: struct {tag} ({} fields)", fields.len());
        self.sink.line(&format!(
            "void dump_json_struct_{tag}(uint32_t indent_level, struct {tag} *s)"
        ));
        self.sink.line("{");
        self.sink.push();
        self.stmt_print(0, "{\\n", &[]);
        self.emit_fields(fields, "s->", 1, false)?;
        self.stmt_print(0, "}", &[]);
        self.sink.pop();
        self.sink.line("}");
        Ok(())
    }

    /// Emit every member of one brace level. `path` is the C member-access
    /// prefix (`s->`, `s->inner.`), `depth` the runtime JSON depth of the
    /// members, `force_comma` true when a splicing caller still has members
    /// after this level.
    fn emit_fields(
        &mut self,
        fields: &[Field],
        path: &str,
        depth: u32,
        force_comma: bool,
    ) -> Result<(), GenError> {
        let count = fields.len();
        for (idx, field) in fields.iter().enumerate() {
            let last = idx + 1 == count;
            self.emit_field(field, path, depth, force_comma || !last)?;
        }
        Ok(())
    }

    fn emit_field(
        &mut self,
        field: &Field,
        path: &str,
        depth: u32,
        sep: bool,
    ) -> Result<(), GenError> {
        let line_end = if sep { "," } else { "" };

        if !field.array_dims.is_empty() {
            return self.emit_array_field(field, path, depth, line_end);
        }

        match &field.ty {
            TypeRef::Primitive { keyword } => {
                let name = member_name(field)?;
                let fmt = self.scalar_format(keyword)?;
                self.stmt_print(
                    depth,
                    &format!("\\\"{name}\\\": {fmt}{line_end}\\n"),
                    &[format!("{path}{name}")],
                );
            }
            TypeRef::FixedWidthInt { signed, bits } => {
                let name = member_name(field)?;
                let fmt = fixed_width_format(*signed, *bits);
                self.stmt_print(
                    depth,
                    &format!("\\\"{name}\\\": {fmt}{line_end}\\n"),
                    &[format!("{path}{name}")],
                );
            }
            TypeRef::EnumRef { tag } => {
                let name = member_name(field)?;
                self.stmt_print(
                    depth,
                    &format!("\\\"{name}\\\": \\\"%s\\\"{line_end}\\n"),
                    &[format!("enum_{tag}_to_str({path}{name})")],
                );
            }
            TypeRef::StructRef { tag } => {
                let name = member_name(field)?;
                self.index.get(tag)?;
                self.stmt_print(depth, &format!("\\\"{name}\\\": "), &[]);
                self.sink
                    .line(&format!("dump_json_struct_{tag}(indent_level + {depth}, &{path}{name});"));
                self.stmt_print(depth, &format!("{line_end}\\n"), &[]);
            }
            TypeRef::StructInline { decl } => {
                self.emit_inline_struct(field, decl, path, depth, sep)?;
            }
        }
        Ok(())
    }

    fn emit_inline_struct(
        &mut self,
        field: &Field,
        decl: &StructDecl,
        path: &str,
        depth: u32,
        sep: bool,
    ) -> Result<(), GenError> {
        let line_end = if sep { "," } else { "" };
        match (field.name.as_deref(), decl.tag.as_deref()) {
            (None, None) => {
                // anonymous struct: splice its members into the current
                // object at this position, inheriting our separator duty
                let fields = decl.fields.as_deref().unwrap_or_default();
                let _ = writeln!(
                    self.trace,
                    "codegen: splicing anonymous struct ({} fields)",
                    fields.len()
                );
                self.emit_fields(fields, path, depth, sep)
            }
            (None, Some(tag)) => {
                // tagged definition with no declarator: nothing printable
                // here, its own dump function is emitted separately
                self.sink
                    .line(&format!("// skipped definition without declaration (type: struct {tag})"));
                Ok(())
            }
            (Some(name), Some(tag)) => {
                self.stmt_print(depth, &format!("\\\"{name}\\\": "), &[]);
                self.sink
                    .line(&format!("dump_json_struct_{tag}(indent_level + {depth}, &{path}{name});"));
                self.stmt_print(depth, &format!("{line_end}\\n"), &[]);
                Ok(())
            }
            (Some(name), None) => {
                // named but untagged: no function exists to call, so the
                // object is expanded in place one level deeper
                let fields = decl.fields.as_deref().unwrap_or_default();
                self.stmt_print(depth, &format!("\\\"{name}\\\": {{\\n"), &[]);
                self.emit_fields(fields, &format!("{path}{name}."), depth + 1, false)?;
                self.stmt_print(depth, "}", &[]);
                self.stmt_print(depth, &format!("{line_end}\\n"), &[]);
                Ok(())
            }
        }
    }

    fn emit_array_field(
        &mut self,
        field: &Field,
        path: &str,
        depth: u32,
        line_end: &str,
    ) -> Result<(), GenError> {
        let dims = &field.array_dims;
        let name = member_name(field)?;

        if dims.iter().any(|d| matches!(d, DimExpr::Unknown)) {
            let _ = writeln!(self.trace, "codegen: skipping variable length array {path}{name}");
            self.sink.line(&format!(
                "// skipped variable length array named {name} of type {}",
                type_display(&field.ty)
            ));
            return Ok(());
        }

        let mut suffix = String::new();
        if dims.len() > 1 {
            self.stmt_print(depth, &format!("\\\"{name}\\\": "), &[]);
            for (idx, dim) in dims.iter().enumerate() {
                let var = format!("a{idx}");
                let bound = dim_bound(dim)?;
                let innermost = idx + 1 == dims.len();
                suffix.push_str(&format!("[{var}]"));
                self.stmt_print(depth, "[", &[]);
                self.sink
                    .line(&format!("for (int {var} = 0; {var} < {bound}; ++{var}) {{"));
                self.sink.push();
                self.sink.line(&format!("if ({var} != 0) {{"));
                self.sink.push();
                // inner dimensions separate elements, outer ones sub-arrays
                self.stmt_print(depth, if innermost { ", " } else { ",\\n" }, &[]);
                self.sink.pop();
                self.sink.line("}");
            }
        } else {
            let bound = dim_bound(&dims[0])?;
            suffix.push_str("[i]");
            self.stmt_print(depth, &format!("\\\"{name}\\\": ["), &[]);
            self.sink.line(&format!("for (int i = 0; i < {bound}; ++i) {{"));
            self.sink.push();
            self.sink.line("if (i != 0) {");
            self.sink.push();
            self.stmt_print(depth, ", ", &[]);
            self.sink.pop();
            self.sink.line("}");
        }

        // one element per innermost iteration
        let elem = format!("{path}{name}{suffix}");
        match &field.ty {
            TypeRef::Primitive { keyword } => {
                let fmt = self.scalar_format(keyword)?;
                self.stmt_print(depth, &fmt, &[elem]);
            }
            TypeRef::FixedWidthInt { signed, bits } => {
                self.stmt_print(depth, &fixed_width_format(*signed, *bits), &[elem]);
            }
            TypeRef::EnumRef { tag } => {
                self.stmt_print(depth, "\\\"%s\\\"", &[format!("enum_{tag}_to_str({elem})")]);
            }
            TypeRef::StructRef { tag } => {
                self.index.get(tag)?;
                self.sink
                    .line(&format!("dump_json_struct_{tag}(indent_level + {depth}, &{elem});"));
            }
            TypeRef::StructInline { decl } => match decl.tag.as_deref() {
                Some(tag) => {
                    self.sink
                        .line(&format!("dump_json_struct_{tag}(indent_level + {depth}, &{elem});"));
                }
                None => {
                    return Err(GenError::UnsupportedShape(format!(
                        "array of untagged structs: {name}"
                    )));
                }
            },
        }

        // close one loop and one bracket per dimension, innermost first
        for idx in (0..dims.len()).rev() {
            self.sink.pop();
            self.sink.line("}");
            if idx == 0 {
                self.stmt_print(depth, &format!("]{line_end}\\n"), &[]);
            } else {
                self.stmt_print(depth, "]", &[]);
            }
        }
        Ok(())
    }

    fn scalar_format(&mut self, keyword: &str) -> Result<String, GenError> {
        if let Some((signed, bits)) = fixed_width_parts(keyword) {
            return Ok(fixed_width_format(signed, bits));
        }
        match primitive_format(keyword) {
            Some((spec, true)) => Ok(format!("\\\"{spec}\\\"")),
            Some((spec, false)) => Ok(spec.to_string()),
            None => {
                let _ = writeln!(self.trace, "error: unknown type: {keyword}");
                Err(GenError::UnknownPrimitive(keyword.to_string()))
            }
        }
    }
}

fn member_name(field: &Field) -> Result<&str, GenError> {
    field.name.as_deref().ok_or_else(|| {
        GenError::UnsupportedShape(format!(
            "field of type {} has no declarator",
            type_display(&field.ty)
        ))
    })
}

fn type_display(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive { keyword } => keyword.clone(),
        TypeRef::FixedWidthInt { signed, bits } => {
            format!("{}int{bits}_t", if *signed { "" } else { "u" })
        }
        TypeRef::StructRef { tag } => format!("struct {tag}"),
        TypeRef::StructInline { decl } => match decl.tag.as_deref() {
            Some(tag) => format!("struct {tag}"),
            None => "struct".to_string(),
        },
        TypeRef::EnumRef { tag } => format!("enum {tag}"),
    }
}

/// Render one dimension bound verbatim. Only `+ - * /` survive inside
/// bound expressions; anything else is fatal.
fn dim_bound(dim: &DimExpr) -> Result<String, GenError> {
    match dim {
        DimExpr::Constant { value } => Ok(value.to_string()),
        DimExpr::Identifier { name } => Ok(name.clone()),
        DimExpr::BinaryOp { op, left, right } => {
            match op.as_str() {
                "+" | "-" | "*" | "/" => {}
                other => return Err(GenError::UnsupportedDimOp(other.to_string())),
            }
            Ok(format!("({} {} {})", dim_bound(left)?, op, dim_bound(right)?))
        }
        DimExpr::Unknown => Err(GenError::UnsupportedShape("unbounded array dimension".into())),
    }
}
