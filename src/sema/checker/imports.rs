// src/sema/checker/imports.rs
//
// Import binding: selected symbols from previously compiled modules enter
// the current module's globals, with rename, glob, and self re-export
// support.

use super::Checker;

use crate::ast::{Import, ImportTarget, Span};
use crate::errors::TypeErrorKind;
use crate::sema::type_arena::TypeId;

impl Checker<'_> {
    pub(super) fn check_import(&mut self, import: &Import, span: Span) {
        let qualified = import.qualified_name();
        self.module.imports.push(qualified.clone());

        let Some(source) = self.modules.get(&qualified) else {
            // The coordinator compiles imports first; a missing module
            // means none of its symbols can resolve.
            self.error(
                TypeErrorKind::ImportUndefinedSymbol {
                    name: import.default_binding().to_string(),
                    module: qualified,
                    span: span.into(),
                },
                span,
            );
            return;
        };

        if import.targets.is_empty() {
            let binding = import.default_binding().to_string();
            let source_type = source.type_id;
            self.bind_import(&binding, source_type, span);
            return;
        }

        for target in &import.targets {
            match target {
                ImportTarget::Symbol { name, alias, span } => {
                    let found = self
                        .modules
                        .get(&qualified)
                        .and_then(|source| source.global(name))
                        .map(|symbol| symbol.value_type)
                        .or_else(|| {
                            let source = self.modules.get(&qualified)?;
                            self.db
                                .lookup_attribute(source.type_id, name)
                                .map(|symbol| symbol.value_type)
                        });

                    match found {
                        Some(value_type) => {
                            let binding = alias.clone().unwrap_or_else(|| name.clone());
                            self.bind_import(&binding, value_type, *span);
                        }
                        None => {
                            self.error(
                                TypeErrorKind::ImportUndefinedSymbol {
                                    name: name.clone(),
                                    module: qualified.clone(),
                                    span: (*span).into(),
                                },
                                *span,
                            );
                        }
                    }
                }
                ImportTarget::SelfModule { alias, span } => {
                    let binding = alias
                        .clone()
                        .unwrap_or_else(|| import.default_binding().to_string());
                    let source_type = self
                        .modules
                        .get(&qualified)
                        .map(|source| source.type_id)
                        .unwrap_or(self.db.dynamic_type);
                    self.bind_import(&binding, source_type, *span);
                }
                ImportTarget::Glob { span } => {
                    let symbols: Vec<(String, TypeId)> = self
                        .modules
                        .get(&qualified)
                        .map(|source| {
                            source
                                .globals
                                .iter()
                                .map(|symbol| (symbol.name.clone(), symbol.value_type))
                                .collect()
                        })
                        .unwrap_or_default();

                    for (name, value_type) in symbols {
                        self.bind_import(&name, value_type, *span);
                    }
                }
            }
        }
    }

    /// Importing an already-bound name is an error and leaves the previous
    /// binding intact.
    fn bind_import(&mut self, name: &str, value_type: TypeId, span: Span) {
        if self.module.globals.contains(name) {
            self.error(
                TypeErrorKind::ImportExistingSymbol {
                    name: name.to_string(),
                    span: span.into(),
                },
                span,
            );
            return;
        }

        self.module.define_global(name, value_type, false);
    }
}
