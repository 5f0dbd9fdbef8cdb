//! Emission-order resolver: every tagged struct is scheduled after all
//! tagged structs it (transitively) contains, exactly once.

use std::collections::HashMap;
use std::io::Write;

use indexmap::IndexSet;

use crate::codegen::GenError;
use crate::ir::{Declaration, EnumDecl, StructDecl, TypeRef};

/// Tag → struct body lookup over every definition in the model, including
/// tagged definitions written inline inside other structs.
pub struct StructIndex<'a> {
    by_tag: HashMap<&'a str, &'a StructDecl>,
}

impl<'a> StructIndex<'a> {
    pub fn build(decls: &'a [Declaration]) -> Self {
        let mut by_tag = HashMap::new();
        for d in decls {
            if let Declaration::Struct(s) = d {
                collect_definitions(s, &mut by_tag);
            }
        }
        Self { by_tag }
    }

    pub fn get(&self, tag: &str) -> Result<&'a StructDecl, GenError> {
        self.by_tag
            .get(tag)
            .copied()
            .ok_or_else(|| GenError::UndefinedStruct(tag.to_string()))
    }
}

fn collect_definitions<'a>(s: &'a StructDecl, by_tag: &mut HashMap<&'a str, &'a StructDecl>) {
    if let (Some(tag), Some(_)) = (s.tag.as_deref(), s.fields.as_ref()) {
        // first definition wins; the resolver dedups emission anyway
        by_tag.entry(tag).or_insert(s);
    }
    for f in s.fields.iter().flatten() {
        if let TypeRef::StructInline { decl } = &f.ty {
            collect_definitions(decl, by_tag);
        }
    }
}

/// Post-order walk from each top-level struct. Already-visited tags are
/// skipped, untagged structs are never scheduled (they are inlined at the
/// point of use), and body-less forward declarations are passed over.
pub fn emission_order<'a>(
    decls: &'a [Declaration],
    index: &StructIndex<'a>,
    trace: &mut dyn Write,
) -> Result<Vec<&'a StructDecl>, GenError> {
    let mut seen: IndexSet<&'a str> = IndexSet::new();
    let mut order: Vec<&'a StructDecl> = Vec::new();
    for d in decls {
        if let Declaration::Struct(s) = d {
            visit(s, index, &mut seen, &mut order, trace)?;
        }
    }
    Ok(order)
}

fn visit<'a>(
    s: &'a StructDecl,
    index: &StructIndex<'a>,
    seen: &mut IndexSet<&'a str>,
    order: &mut Vec<&'a StructDecl>,
    trace: &mut dyn Write,
) -> Result<(), GenError> {
    let Some(fields) = s.fields.as_deref() else {
        if let Some(tag) = s.tag.as_deref() {
            let _ = writeln!(trace, "resolve: skipping forward declaration of struct {tag}");
        }
        return Ok(());
    };
    if let Some(tag) = s.tag.as_deref() {
        if !seen.insert(tag) {
            return Ok(());
        }
    }
    for f in fields {
        match &f.ty {
            TypeRef::StructInline { decl } => visit(decl, index, seen, order, trace)?,
            TypeRef::StructRef { tag } => visit(index.get(tag)?, index, seen, order, trace)?,
            TypeRef::Primitive { .. } | TypeRef::FixedWidthInt { .. } | TypeRef::EnumRef { .. } => {}
        }
    }
    if let Some(tag) = s.tag.as_deref() {
        let _ = writeln!(trace, "resolve: scheduling struct {tag}");
        order.push(s);
    }
    Ok(())
}

/// Top-level enums, in declaration order.
pub fn enums(decls: &[Declaration]) -> Vec<&EnumDecl> {
    decls
        .iter()
        .filter_map(|d| match d {
            Declaration::Enum(e) => Some(e),
            Declaration::Struct(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Field;

    fn int_field(name: &str) -> Field {
        Field {
            name: Some(name.into()),
            ty: TypeRef::Primitive { keyword: "int".into() },
            array_dims: Vec::new(),
        }
    }

    fn struct_decl(tag: Option<&str>, fields: Option<Vec<Field>>) -> StructDecl {
        StructDecl { tag: tag.map(Into::into), fields }
    }

    fn ref_field(name: &str, tag: &str) -> Field {
        Field {
            name: Some(name.into()),
            ty: TypeRef::StructRef { tag: tag.into() },
            array_dims: Vec::new(),
        }
    }

    fn order_tags(decls: &[Declaration]) -> Vec<String> {
        let index = StructIndex::build(decls);
        let mut trace = Vec::new();
        emission_order(decls, &index, &mut trace)
            .unwrap()
            .iter()
            .map(|s| s.tag.clone().unwrap())
            .collect()
    }

    #[test]
    fn contained_structs_come_first() {
        let decls = vec![
            Declaration::Struct(struct_decl(
                Some("outer"),
                Some(vec![int_field("a"), ref_field("in", "inner")]),
            )),
            Declaration::Struct(struct_decl(Some("inner"), Some(vec![int_field("b")]))),
        ];
        assert_eq!(order_tags(&decls), vec!["inner", "outer"]);
    }

    #[test]
    fn shared_dependency_is_scheduled_once() {
        let decls = vec![
            Declaration::Struct(struct_decl(Some("shared"), Some(vec![int_field("v")]))),
            Declaration::Struct(struct_decl(Some("a"), Some(vec![ref_field("s", "shared")]))),
            Declaration::Struct(struct_decl(Some("b"), Some(vec![ref_field("s", "shared")]))),
        ];
        assert_eq!(order_tags(&decls), vec!["shared", "a", "b"]);
    }

    #[test]
    fn inline_tagged_definition_precedes_its_parent() {
        let inline = Field {
            name: Some("nested".into()),
            ty: TypeRef::StructInline {
                decl: struct_decl(Some("nested_tag"), Some(vec![int_field("x")])),
            },
            array_dims: Vec::new(),
        };
        let decls = vec![Declaration::Struct(struct_decl(Some("top"), Some(vec![inline])))];
        assert_eq!(order_tags(&decls), vec!["nested_tag", "top"]);
    }

    #[test]
    fn anonymous_structs_are_never_scheduled() {
        let splice = Field {
            name: None,
            ty: TypeRef::StructInline { decl: struct_decl(None, Some(vec![int_field("x")])) },
            array_dims: Vec::new(),
        };
        let decls = vec![Declaration::Struct(struct_decl(Some("top"), Some(vec![splice])))];
        assert_eq!(order_tags(&decls), vec!["top"]);
    }

    #[test]
    fn forward_declarations_are_silently_skipped() {
        let decls = vec![
            Declaration::Struct(struct_decl(Some("fwd"), None)),
            Declaration::Struct(struct_decl(Some("fwd"), Some(vec![int_field("x")]))),
        ];
        assert_eq!(order_tags(&decls), vec!["fwd"]);
    }

    #[test]
    fn reference_to_undefined_tag_is_fatal() {
        let decls = vec![Declaration::Struct(struct_decl(
            Some("top"),
            Some(vec![ref_field("m", "missing")]),
        ))];
        let index = StructIndex::build(&decls);
        let mut trace = Vec::new();
        let err = emission_order(&decls, &index, &mut trace).unwrap_err();
        assert!(matches!(err, GenError::UndefinedStruct(tag) if tag == "missing"));
    }
}
