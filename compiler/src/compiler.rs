use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::debug;

use crate::{
    codegen::{CodeGenerator, Condition},
    error::{CompileError, ErrorKind},
    lexer::TokenStream,
    symbol::{Scope, Symbol, SymbolKind, SymbolTable},
    term::Term,
    token::Token,
};

const OPERATORS: &str = "+-*/%&|^!?";

lazy_static! {
    // The source spells the condition under which the body runs; the emitted
    // jump skips the body, so each test maps to its logical negation.
    static ref SKIP_CONDITIONS: HashMap<char, Condition> = {
        let mut conditions = HashMap::new();
        conditions.insert('=', Condition::NonZero);
        conditions.insert('<', Condition::Positive);
        conditions.insert('#', Condition::Zero);
        conditions
    };
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StatementEnd {
    Completed,
    Terminator(char),
    EndOfInput,
}

pub struct Compiler<'a, G: CodeGenerator> {
    pub(crate) stream: TokenStream<'a>,
    pub(crate) symbols: &'a mut SymbolTable,
    pub(crate) generator: &'a mut G,
}

impl<'a, G: CodeGenerator> Compiler<'a, G> {
    pub fn new(
        unit: &str,
        source: &'a str,
        symbols: &'a mut SymbolTable,
        generator: &'a mut G,
    ) -> Compiler<'a, G> {
        Compiler {
            stream: TokenStream::new(unit, source),
            symbols,
            generator,
        }
    }

    pub fn run(&mut self) -> Result<(), CompileError> {
        loop {
            match self.statement()? {
                StatementEnd::Completed => {}
                StatementEnd::Terminator(c) => {
                    return Err(self.syntax(format!("Unexpected '{}'", c)))
                }
                StatementEnd::EndOfInput => return Ok(()),
            }
        }
    }

    fn statement(&mut self) -> Result<StatementEnd, CompileError> {
        let token = self.stream.next()?;
        match token {
            Token::Eof => Ok(StatementEnd::EndOfInput),
            Token::Punct('{') => self.group(),
            Token::Punct('>') => self.assignment(),
            Token::Punct(op) if OPERATORS.contains(op) => {
                let term = self.term()?;
                self.generator.binary_op(op, term);
                Ok(StatementEnd::Completed)
            }
            Token::Identifier(name) => match name.as_str() {
                "global" => self.declare_variable(Scope::Global),
                "local" => self.declare_variable(Scope::Local),
                "proc" => self.define_procedure(),
                "if" => self.if_while(false),
                "while" => self.if_while(true),
                "for" => self.for_loop(),
                _ => {
                    if let Some(symbol) = self.symbols.find(&name) {
                        if let SymbolKind::Procedure {
                            entry,
                            parameter_base,
                            parameter_count,
                        } = symbol.kind
                        {
                            return self.call_procedure(entry, parameter_base, parameter_count);
                        }
                    }
                    self.leading_term(Token::Identifier(name))
                }
            },
            token => self.leading_term(token),
        }
    }

    // Compiles statements until one of them refuses a token; that token is
    // the sequence's terminator.
    fn sequence(&mut self) -> Result<StatementEnd, CompileError> {
        loop {
            match self.statement()? {
                StatementEnd::Completed => {}
                end => return Ok(end),
            }
        }
    }

    // A body is exactly one statement; a stray terminator here is a hole in
    // the source, not something to hand back to the caller.
    fn body(&mut self) -> Result<(), CompileError> {
        match self.statement()? {
            StatementEnd::Completed => Ok(()),
            StatementEnd::Terminator(c) => Err(self.syntax(format!("Unexpected '{}'", c))),
            StatementEnd::EndOfInput => Err(self.syntax("Unexpected end of input")),
        }
    }

    // No statement keyword matched: anything that reads as a term loads the
    // accumulator, anything else terminates the enclosing sequence.
    fn leading_term(&mut self, token: Token) -> Result<StatementEnd, CompileError> {
        self.stream.put_back(token);
        match self.try_term()? {
            Some(term) => {
                self.generator.load_accumulator(term);
                Ok(StatementEnd::Completed)
            }
            None => match self.stream.next()? {
                Token::Punct(c) => Ok(StatementEnd::Terminator(c)),
                Token::Eof => Ok(StatementEnd::EndOfInput),
                token => Err(self.syntax(format!("Unrecognized statement '{}'", token))),
            },
        }
    }

    fn group(&mut self) -> Result<StatementEnd, CompileError> {
        match self.sequence()? {
            StatementEnd::Terminator('}') => Ok(StatementEnd::Completed),
            StatementEnd::Terminator(c) => {
                Err(self.syntax(format!("Expected '}}' but found '{}'", c)))
            }
            StatementEnd::EndOfInput => Err(self.syntax("Missing '}'")),
            StatementEnd::Completed => unreachable!("sequence only stops at a terminator"),
        }
    }

    fn declare_variable(&mut self, scope: Scope) -> Result<StatementEnd, CompileError> {
        let name = self.identifier("variable name")?;
        let address = self.generator.allocate_storage(1);
        self.define(Symbol::variable(&name, address, scope))?;
        Ok(StatementEnd::Completed)
    }

    fn define_procedure(&mut self) -> Result<StatementEnd, CompileError> {
        let name = self.identifier("procedure name")?;
        self.stream.expect(&Token::Punct('('))?;

        let mut parameters: Vec<String> = Vec::new();
        let mut next = self.stream.next()?;
        while next != Token::Punct(')') {
            match next {
                Token::Identifier(parameter) => parameters.push(parameter),
                token => {
                    return Err(
                        self.syntax(format!("Expected a parameter name but found '{}'", token))
                    )
                }
            }
            next = self.stream.next()?;
            if next == Token::Punct(',') {
                next = self.stream.next()?;
            }
        }

        let parameter_count = parameters.len() as u16;
        let parameter_base = self.generator.allocate_storage(parameter_count);
        let entry = self.generator.current_address();
        debug!(
            "defining procedure '{}' at ${:04x} ({} params)",
            name, entry, parameter_count
        );
        self.define(Symbol::procedure(&name, entry, parameter_base, parameter_count))?;
        for (slot, parameter) in parameters.iter().enumerate() {
            let address = parameter_base.wrapping_add(slot as u16 * 2);
            self.define(Symbol::variable(parameter, address, Scope::Local))?;
        }

        self.body()?;
        self.generator.emit_return();
        self.symbols.purge_local();
        Ok(StatementEnd::Completed)
    }

    // Arguments are evaluated left to right; each lands in its parameter's
    // fixed slot before the call itself is emitted.
    fn call_procedure(
        &mut self,
        entry: u16,
        parameter_base: u16,
        parameter_count: u16,
    ) -> Result<StatementEnd, CompileError> {
        self.stream.expect(&Token::Punct('('))?;
        if parameter_count == 0 {
            self.stream.expect(&Token::Punct(')'))?;
        } else {
            let mut address = parameter_base;
            for remaining in (1..=parameter_count).rev() {
                let closer = if remaining == 1 { ')' } else { ',' };
                match self.sequence()? {
                    StatementEnd::Terminator(c) if c == closer => {}
                    _ => return Err(self.syntax("Badly formed parameters")),
                }
                self.generator.store_direct(address);
                address = address.wrapping_add(2);
            }
        }
        self.generator.emit_call(entry);
        Ok(StatementEnd::Completed)
    }

    fn if_while(&mut self, is_while: bool) -> Result<StatementEnd, CompileError> {
        let loop_top = self.generator.current_address();
        self.stream.expect(&Token::Punct('('))?;
        let condition = match self.sequence()? {
            // A bare `)` means "run while nonzero": skip on zero.
            StatementEnd::Terminator(')') => Condition::Zero,
            StatementEnd::Terminator(c) => {
                let condition = match SKIP_CONDITIONS.get(&c) {
                    Some(condition) => *condition,
                    None => return Err(self.syntax("Bad condition")),
                };
                self.stream.expect(&Token::Number(0))?;
                self.stream.expect(&Token::Punct(')'))?;
                condition
            }
            StatementEnd::EndOfInput => {
                return Err(self.syntax("Unexpected end of input in condition"))
            }
            StatementEnd::Completed => unreachable!("sequence only stops at a terminator"),
        };

        let skip = self.generator.emit_conditional_jump(condition);
        self.body()?;
        if is_while {
            let back = self.generator.emit_conditional_jump(Condition::Always);
            self.generator.patch_jump(back, loop_top);
        }
        let after = self.generator.current_address();
        self.generator.patch_jump(skip, after);
        Ok(StatementEnd::Completed)
    }

    fn for_loop(&mut self) -> Result<StatementEnd, CompileError> {
        self.stream.expect(&Token::Punct('('))?;
        match self.sequence()? {
            StatementEnd::Terminator(')') => {}
            _ => return Err(self.syntax("Missing ')' in for")),
        }
        // A variable named `index` receives the countdown value each pass;
        // records of any other kind under that name are ignored.
        let index = match self.symbols.find("index") {
            Some(symbol) => match symbol.kind {
                SymbolKind::Variable { address } => Some(address),
                _ => None,
            },
            None => None,
        };
        let loop_top = self.generator.emit_for_loop_top(index);
        self.body()?;
        self.generator.emit_for_loop_bottom(loop_top);
        Ok(StatementEnd::Completed)
    }

    fn assignment(&mut self) -> Result<StatementEnd, CompileError> {
        let destination = self.term()?;
        let address = match destination {
            Term::Address(address) => address,
            Term::Immediate(_) => return Err(self.semantic("Can only assign to an address")),
        };
        match self.stream.next()? {
            Token::Punct(op @ ('!' | '?')) => {
                // Indexed store: the destination holds a base pointer, the
                // right-hand term the offset. The accumulator is parked in
                // the temp register while the address forms.
                let offset = self.term()?;
                self.generator.copy_accumulator_to_temp();
                self.generator.load_accumulator(destination);
                self.generator.binary_op('+', offset);
                self.generator.store_temp_indirect(op == '?');
            }
            token => {
                self.generator.store_direct(address);
                self.stream.put_back(token);
            }
        }
        Ok(StatementEnd::Completed)
    }

    fn identifier(&mut self, what: &str) -> Result<String, CompileError> {
        match self.stream.next()? {
            Token::Identifier(name) => Ok(name),
            token => Err(self.syntax(format!("Expected a {} but found '{}'", what, token))),
        }
    }

    fn define(&mut self, symbol: Symbol) -> Result<(), CompileError> {
        let result = self.symbols.add(symbol);
        result.map_err(|err| self.semantic(err.to_string()))
    }

    pub(crate) fn syntax(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(
            ErrorKind::Syntax,
            message,
            self.stream.unit(),
            self.stream.line(),
        )
    }

    pub(crate) fn semantic(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(
            ErrorKind::Semantic,
            message,
            self.stream.unit(),
            self.stream.line(),
        )
    }
}
