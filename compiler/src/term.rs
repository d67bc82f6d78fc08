use crate::{
    codegen::CodeGenerator,
    compiler::Compiler,
    error::CompileError,
    symbol::SymbolKind,
    token::Token,
};

/// A parsed operand: either a value to use directly, or the address of a
/// storage slot to load and store through. Only address-backed terms are
/// legal assignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Immediate(u16),
    Address(u16),
}

impl Term {
    pub fn value(self) -> u16 {
        match self {
            Term::Immediate(value) | Term::Address(value) => value,
        }
    }

    pub fn is_address(self) -> bool {
        matches!(self, Term::Address(_))
    }
}

// Inline allocations must stay below this many words.
const ALLOCATION_LIMIT: u16 = 8192;

impl<'a, G: CodeGenerator> Compiler<'a, G> {
    // The failing variant: call sites that require an operand.
    pub(crate) fn term(&mut self) -> Result<Term, CompileError> {
        match self.try_term()? {
            Some(term) => Ok(term),
            None => Err(self.syntax("Missing term")),
        }
    }

    // The optional variant: if the next token cannot start a term it is
    // pushed back and `None` is returned, so the caller can treat it as a
    // statement terminator instead.
    pub(crate) fn try_term(&mut self) -> Result<Option<Term>, CompileError> {
        let token = self.stream.next()?;
        let term = match token {
            Token::Punct('-') => {
                let operand = self.term()?;
                match operand {
                    Term::Immediate(value) => Term::Immediate(value.wrapping_neg()),
                    Term::Address(_) => {
                        return Err(self.semantic("Can only apply unary minus to constants"))
                    }
                }
            }
            Token::Number(value) => Term::Immediate(value),
            Token::Identifier(name) => match self.symbols.find(&name) {
                Some(symbol) => match symbol.kind {
                    SymbolKind::Constant { value } => Term::Immediate(value),
                    SymbolKind::Variable { address } => Term::Address(address),
                    SymbolKind::Procedure { .. } => {
                        return Err(
                            self.semantic(format!("Cannot use '{}' in an expression", name))
                        )
                    }
                },
                None => return Err(self.semantic(format!("Unknown identifier '{}'", name))),
            },
            Token::Punct('@') => self.address_of()?,
            Token::Str(text) => Term::Immediate(self.generator.intern_string(&text)),
            Token::Punct('[') => self.allocation()?,
            token => {
                self.stream.put_back(token);
                return Ok(None);
            }
        };
        Ok(Some(term))
    }

    // `@name` passes a variable's address by value.
    fn address_of(&mut self) -> Result<Term, CompileError> {
        let name = match self.stream.next()? {
            Token::Identifier(name) => name,
            token => {
                return Err(
                    self.syntax(format!("Expected an identifier after '@' but found '{}'", token))
                )
            }
        };
        match self.symbols.find(&name) {
            Some(symbol) => match symbol.kind {
                SymbolKind::Variable { address } => Ok(Term::Immediate(address)),
                _ => Err(self.semantic(format!("Cannot use '@' on '{}'", name))),
            },
            None => Err(self.semantic(format!("Unknown identifier '{}'", name))),
        }
    }

    fn allocation(&mut self) -> Result<Term, CompileError> {
        let size = match self.term()? {
            Term::Immediate(size) => size,
            Term::Address(_) => return Err(self.semantic("Memory size must be constant")),
        };
        if size == 0 || size >= ALLOCATION_LIMIT {
            return Err(self.semantic("Bad memory allocation size"));
        }
        self.stream.expect(&Token::Punct(']'))?;
        Ok(Term::Immediate(self.generator.allocate_storage(size)))
    }
}
