use std::collections::HashMap;
use std::fmt::Display;

// Globals whose names start with this survive only until the end of the
// compilation unit that defined them.
pub const PRIVATE_MARKER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Constant {
        value: u16,
    },
    Variable {
        address: u16,
    },
    Procedure {
        entry: u16,
        parameter_base: u16,
        parameter_count: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: Scope,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn constant(name: &str, value: u16) -> Symbol {
        Symbol {
            name: name.to_lowercase(),
            scope: Scope::Global,
            kind: SymbolKind::Constant { value },
        }
    }

    pub fn variable(name: &str, address: u16, scope: Scope) -> Symbol {
        Symbol {
            name: name.to_lowercase(),
            scope,
            kind: SymbolKind::Variable { address },
        }
    }

    pub fn procedure(
        name: &str,
        entry: u16,
        parameter_base: u16,
        parameter_count: u16,
    ) -> Symbol {
        Symbol {
            name: name.to_lowercase(),
            scope: Scope::Global,
            kind: SymbolKind::Procedure {
                entry,
                parameter_base,
                parameter_count,
            },
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = match self.scope {
            Scope::Global => "global",
            Scope::Local => "local",
        };
        match self.kind {
            SymbolKind::Constant { value } => {
                write!(f, "{} = ${:04x} {} constant", self.name, value, scope)
            }
            SymbolKind::Variable { address } => {
                write!(f, "{} @ ${:04x} {} variable", self.name, address, scope)
            }
            SymbolKind::Procedure {
                entry,
                parameter_base,
                parameter_count,
            } => {
                write!(
                    f,
                    "{} @ ${:04x} {} procedure ({} params @ ${:04x})",
                    self.name, entry, scope, parameter_count, parameter_base
                )
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DuplicateIdentifier(pub String);

impl Display for DuplicateIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Duplicate identifier '{}'", self.0)
    }
}

impl std::error::Error for DuplicateIdentifier {}

#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: HashMap<String, Symbol>,
    locals: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn add(&mut self, symbol: Symbol) -> Result<(), DuplicateIdentifier> {
        let tier = match symbol.scope {
            Scope::Global => &mut self.globals,
            Scope::Local => &mut self.locals,
        };
        if tier.contains_key(&symbol.name) {
            return Err(DuplicateIdentifier(symbol.name));
        }
        tier.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    // Locals take priority over globals; absence is for the caller to judge.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        let name = name.to_lowercase();
        self.locals.get(&name).or_else(|| self.globals.get(&name))
    }

    pub fn purge_local(&mut self) {
        self.locals.clear();
    }

    pub fn purge_module(&mut self) {
        self.purge_local();
        self.globals
            .retain(|name, _| !name.starts_with(PRIVATE_MARKER));
    }

    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.globals.values()
    }
}
