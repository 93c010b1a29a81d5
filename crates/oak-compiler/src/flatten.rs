//! Data-type flattening.
//!
//! Each `type Name[a] = Opt(T) | ...` contributes an alias naming the sum
//! type and one constructor definition per option. The declarations stay in
//! [`Module::data_types`] so the option table can be built afterwards.

use oak_core::{DataOptionIdentifier, FullIdentifier, Identifier, QualifiedIdentifier};
use oak_parser::{
    Alias, DefinitionFlags, Expr, ExprKind, Module, Pattern, PatternKind, Type,
};

/// Add the synthesized aliases and constructor definitions to `module`.
pub fn flatten_data_types(module: &mut Module) {
    let mut aliases = Vec::new();
    let mut definitions = Vec::new();

    for data in &module.data_types {
        let full = FullIdentifier::from_parts(&module.name, &data.name);
        aliases.push(Alias {
            name: data.name.clone(),
            params: data.params.clone(),
            ty: Type::Data {
                name: full.clone(),
                args: data
                    .params
                    .iter()
                    .map(|p| Type::Parameter {
                        name: p.clone(),
                        location: data.location.clone(),
                    })
                    .collect(),
                options: data.options.clone(),
                location: data.location.clone(),
            },
            hidden: data.hidden,
            location: data.location.clone(),
        });

        for option in &data.options {
            let location = option.location.clone();
            let names: Vec<Identifier> = (0..option.values.len())
                .map(|i| Identifier::new(format!("_v{i}")))
                .collect();
            let params = names
                .iter()
                .map(|name| Pattern::new(PatternKind::Named(name.clone()), location.clone()))
                .collect();
            let args = names
                .iter()
                .map(|name| {
                    Expr::new(
                        ExprKind::Var(QualifiedIdentifier::new(name.as_str())),
                        location.clone(),
                    )
                })
                .collect();

            let mut flags = DefinitionFlags::CONSTRUCTOR;
            if data.hidden || option.hidden {
                flags |= DefinitionFlags::HIDDEN;
            }
            definitions.push(oak_parser::Definition {
                name: option.name.clone(),
                params,
                return_type: None,
                body: Expr::new(
                    ExprKind::Constructor {
                        option: DataOptionIdentifier::from_parts(&full, &option.name),
                        args,
                    },
                    location.clone(),
                ),
                flags,
                location,
            });
        }
    }

    tracing::trace!(
        module = %module.name,
        aliases = aliases.len(),
        constructors = definitions.len(),
        "flattened data types"
    );
    module.aliases.extend(aliases);
    module.definitions.extend(definitions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use oak_core::{PackageIdentifier, SourceFile};

    #[test]
    fn options_become_constructors() {
        let file = SourceFile::new(
            "M.oak",
            "module M\ntype hidden Shape = Circle(Float) | hidden Square(Float, Float) | Dot\n",
        );
        let mut module = oak_parser::parse_module(&file, PackageIdentifier::new("p")).unwrap();
        flatten_data_types(&mut module);

        let alias = module.alias("Shape").unwrap();
        assert!(alias.hidden);
        assert!(matches!(&alias.ty, Type::Data { name, .. } if name.as_str() == "M.Shape"));

        let circle = module.definition("Circle").unwrap();
        assert_eq!(circle.params.len(), 1);
        assert!(circle.flags.contains(DefinitionFlags::CONSTRUCTOR));
        assert!(circle.is_hidden());
        match &circle.body.kind {
            ExprKind::Constructor { option, args } => {
                assert_eq!(option.as_str(), "M.Shape#Circle");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let dot = module.definition("Dot").unwrap();
        assert!(!dot.is_function());
        assert_eq!(module.definition("Square").unwrap().params.len(), 2);
    }

    #[test]
    fn visible_options_stay_visible() {
        let file = SourceFile::new("M.oak", "module M\ntype Color = Red | hidden Secret\n");
        let mut module = oak_parser::parse_module(&file, PackageIdentifier::new("p")).unwrap();
        flatten_data_types(&mut module);
        assert!(!module.definition("Red").unwrap().is_hidden());
        assert!(module.definition("Secret").unwrap().is_hidden());
    }
}
