//! Symbol table with lexically nested scopes and namespaces.
//!
//! Scopes carry a dotted name (`::outer::inner::`). Local symbols are keyed
//! by their bare name and die with their scope; global symbols are keyed by
//! their fully qualified path and survive, which is what makes
//! `ns::function` references work after the namespace block has closed.

use super::builtins::{Intrinsic, IntrinsicTable};
use super::FunctionInfo;
use crate::{Constant, FastHashMap, Type};
use spirv::{Op, StorageClass, Word};

/// A point in the scope stack.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Scope {
    pub name: String,
    pub level: u32,
    pub namespace_level: u32,
}

impl Scope {
    pub fn global() -> Self {
        Scope {
            name: "::".into(),
            level: 0,
            namespace_level: 0,
        }
    }
}

/// What a name resolves to.
///
/// `op` discriminates the symbol kind the way the defining instruction
/// would: `OpFunction` for functions, `OpVariable` for variables,
/// `OpConstant` for named constants and `OpTypeStruct` for types.
#[derive(Clone, Debug)]
pub(crate) struct Symbol {
    pub op: Op,
    pub id: Word,
    pub ty: Type,
    pub function: Option<usize>,
    pub constant: Constant,
    pub member_index: Option<u32>,
    pub class: StorageClass,
}

impl Symbol {
    pub fn variable(id: Word, ty: Type, class: StorageClass) -> Self {
        Symbol {
            op: Op::Variable,
            id,
            ty,
            class,
            ..Symbol::default()
        }
    }

    pub fn constant(ty: Type, constant: Constant) -> Self {
        Symbol {
            op: Op::Constant,
            ty,
            constant,
            ..Symbol::default()
        }
    }

    pub fn structure(definition: Word) -> Self {
        Symbol {
            op: Op::TypeStruct,
            id: definition,
            ..Symbol::default()
        }
    }

    pub fn function(id: Word, index: Option<usize>) -> Self {
        Symbol {
            op: Op::Function,
            id,
            ty: Type::FUNCTION,
            function: index,
            ..Symbol::default()
        }
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol {
            op: Op::Nop,
            id: 0,
            ty: Type::VOID,
            function: None,
            constant: Constant::default(),
            member_index: None,
            class: StorageClass::Private,
        }
    }
}

#[derive(Clone, Debug)]
struct ScopedSymbol {
    scope: Scope,
    symbol: Symbol,
}

/// Result of overload resolution.
pub(crate) enum ResolvedCall {
    Function { index: usize, id: Word },
    Intrinsic(Intrinsic),
}

pub(crate) enum CallError {
    Undeclared,
    NoOverload,
    Ambiguous,
}

pub(crate) struct SymbolTable {
    stack: FastHashMap<String, Vec<ScopedSymbol>>,
    current: Scope,
    parents: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            stack: FastHashMap::default(),
            current: Scope::global(),
            parents: vec![],
        }
    }

    pub fn current_scope(&self) -> &Scope {
        &self.current
    }

    pub fn enter_scope(&mut self) {
        self.current.level += 1;
    }

    pub fn leave_scope(&mut self) {
        let level = self.current.level;
        self.stack.retain(|_, candidates| {
            candidates.retain(|candidate| candidate.scope.level < level);
            !candidates.is_empty()
        });
        self.current.level -= 1;
    }

    pub fn enter_namespace(&mut self, name: &str) {
        self.parents.push(self.current.clone());
        self.current.name.push_str(name);
        self.current.name.push_str("::");
        self.current.level += 1;
        self.current.namespace_level += 1;
    }

    pub fn leave_namespace(&mut self) {
        let level = self.current.level;
        self.stack.retain(|_, candidates| {
            // Globals are recorded at level zero and survive the namespace.
            candidates.retain(|candidate| candidate.scope.level < level);
            !candidates.is_empty()
        });
        self.current = self.parents.pop().unwrap_or_else(Scope::global);
    }

    /// Insert a symbol under the current scope. Global symbols are keyed by
    /// their full `::`-qualified path. Returns `false` on redefinition;
    /// functions are exempt since they form overload sets.
    pub fn insert_symbol(&mut self, name: &str, symbol: Symbol, global: bool) -> bool {
        let (key, scope) = if global {
            (
                format!("{}{}", self.current.name, name),
                Scope {
                    name: self.current.name.clone(),
                    level: 0,
                    namespace_level: self.current.namespace_level,
                },
            )
        } else {
            (name.to_owned(), self.current.clone())
        };

        if symbol.op != Op::Function {
            if let Some(candidates) = self.stack.get(&key) {
                let redefined = candidates.iter().any(|candidate| {
                    candidate.scope.name == scope.name && candidate.scope.level == scope.level
                });
                if redefined {
                    return false;
                }
            }
        }

        self.stack
            .entry(key)
            .or_default()
            .push(ScopedSymbol { scope, symbol });
        true
    }

    fn visible<'a>(
        candidates: &'a [ScopedSymbol],
        scope: &Scope,
    ) -> impl Iterator<Item = &'a ScopedSymbol> {
        let scope_name = scope.name.clone();
        let scope_level = scope.level;
        candidates.iter().filter(move |candidate| {
            candidate.scope.level <= scope_level && scope_name.starts_with(&candidate.scope.name)
        })
    }

    /// Prefixes of a scope name from innermost to outermost:
    /// `::a::b::` yields `::a::b::`, `::a::`, `::`.
    fn scope_prefixes(scope_name: &str) -> impl Iterator<Item = &str> {
        let mut ends: Vec<usize> = scope_name
            .char_indices()
            .filter(|&(i, c)| c == ':' && scope_name.as_bytes().get(i + 1) == Some(&b':'))
            .map(|(i, _)| i + 2)
            .collect();
        ends.dedup();
        ends.into_iter().rev().map(move |end| &scope_name[..end])
    }

    /// Look up `name` starting in `scope` and walking outward. `exclusive`
    /// restricts the search to the global namespace (a `::`-prefixed
    /// identifier).
    pub fn find_symbol(&self, name: &str, scope: &Scope, exclusive: bool) -> Option<Symbol> {
        if !exclusive {
            // Locals shadow any global of the same name.
            if let Some(candidates) = self.stack.get(name) {
                if let Some(found) = Self::visible(candidates, scope).last() {
                    return Some(found.symbol.clone());
                }
            }
            for prefix in Self::scope_prefixes(&scope.name) {
                let key = format!("{prefix}{name}");
                if let Some(candidates) = self.stack.get(&key) {
                    if let Some(found) = candidates.last() {
                        return Some(found.symbol.clone());
                    }
                }
            }
            None
        } else {
            let key = format!("::{name}");
            self.stack
                .get(&key)
                .and_then(|candidates| candidates.last())
                .map(|found| found.symbol.clone())
        }
    }

    fn collect_functions(&self, name: &str, scope: &Scope, exclusive: bool) -> Vec<Symbol> {
        let mut found = vec![];
        if exclusive {
            if let Some(candidates) = self.stack.get(&format!("::{name}")) {
                found.extend(
                    candidates
                        .iter()
                        .filter(|candidate| candidate.symbol.op == Op::Function)
                        .map(|candidate| candidate.symbol.clone()),
                );
            }
            return found;
        }
        for prefix in Self::scope_prefixes(&scope.name) {
            let key = format!("{prefix}{name}");
            if let Some(candidates) = self.stack.get(&key) {
                found.extend(
                    candidates
                        .iter()
                        .filter(|candidate| candidate.symbol.op == Op::Function)
                        .map(|candidate| candidate.symbol.clone()),
                );
            }
        }
        found
    }

    /// Resolve a call by searching user functions and intrinsics reachable
    /// under `name`, picking the candidate with the lowest summed
    /// conversion cost across all arguments.
    pub fn resolve_function_call(
        &self,
        name: &str,
        arguments: &[Type],
        scope: &Scope,
        exclusive: bool,
        functions: &[FunctionInfo],
        intrinsics: &IntrinsicTable,
    ) -> Result<ResolvedCall, CallError> {
        let mut best: Option<(u32, ResolvedCall)> = None;
        let mut ambiguous = false;
        let mut seen_any = false;

        let mut consider = |cost: Option<u32>, call: ResolvedCall| {
            let cost = match cost {
                Some(cost) => cost,
                None => return,
            };
            match best.as_ref().map(|&(best_cost, _)| best_cost) {
                Some(best_cost) if cost > best_cost => {}
                Some(best_cost) if cost == best_cost => ambiguous = true,
                _ => {
                    ambiguous = false;
                    best = Some((cost, call));
                }
            }
        };

        for symbol in self.collect_functions(name, scope, exclusive) {
            seen_any = true;
            let index = match symbol.function {
                Some(index) => index,
                None => continue, // dummy symbol from error recovery
            };
            let parameters = &functions[index].parameters;
            let cost = overload_cost(
                arguments,
                parameters.iter().map(|parameter| &parameter.ty),
                parameters.len(),
            );
            consider(
                cost,
                ResolvedCall::Function {
                    index,
                    id: symbol.id,
                },
            );
        }

        if !exclusive && !name.contains("::") {
            if let Some(overloads) = intrinsics.overloads(name) {
                for intrinsic in overloads {
                    seen_any = true;
                    let cost = overload_cost(
                        arguments,
                        intrinsic.parameters.iter(),
                        intrinsic.parameters.len(),
                    );
                    consider(cost, ResolvedCall::Intrinsic(intrinsic.clone()));
                }
            }
        }

        match best {
            Some(_) if ambiguous => Err(CallError::Ambiguous),
            Some((_, call)) => Ok(call),
            None if seen_any => Err(CallError::NoOverload),
            None => Err(CallError::Undeclared),
        }
    }
}

/// Summed conversion cost of passing `arguments` to a parameter list, or
/// `None` when any argument cannot convert. Parameter pointer-ness is a
/// calling convention detail and is ignored for matching.
fn overload_cost<'a>(
    arguments: &[Type],
    parameters: impl Iterator<Item = &'a Type>,
    parameter_count: usize,
) -> Option<u32> {
    if arguments.len() != parameter_count {
        return None;
    }
    let mut total = 0;
    for (argument, parameter) in arguments.iter().zip(parameters) {
        let mut value_type = *parameter;
        value_type.is_pointer = false;
        let rank = Type::rank(argument, &value_type);
        if rank == 0 {
            return None;
        }
        total += rank;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_and_expire() {
        let mut table = SymbolTable::new();
        let outer = Symbol::variable(1, Type::FLOAT, StorageClass::Private);
        assert!(table.insert_symbol("x", outer, true));

        table.enter_scope();
        let inner = Symbol::variable(2, Type::INT, StorageClass::Function);
        assert!(table.insert_symbol("x", inner, false));
        let scope = table.current_scope().clone();
        assert_eq!(table.find_symbol("x", &scope, false).unwrap().id, 2);
        table.leave_scope();

        let scope = table.current_scope().clone();
        assert_eq!(table.find_symbol("x", &scope, false).unwrap().id, 1);
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        assert!(table.insert_symbol(
            "x",
            Symbol::variable(1, Type::FLOAT, StorageClass::Private),
            true
        ));
        assert!(!table.insert_symbol(
            "x",
            Symbol::variable(2, Type::FLOAT, StorageClass::Private),
            true
        ));
    }

    #[test]
    fn namespace_symbols_resolve_qualified_and_unqualified() {
        let mut table = SymbolTable::new();
        table.enter_namespace("ns");
        let inside = table.current_scope().clone();
        assert!(table.insert_symbol(
            "f",
            Symbol::variable(7, Type::FLOAT, StorageClass::Private),
            true
        ));
        // Unqualified from inside the namespace.
        assert_eq!(table.find_symbol("f", &inside, false).unwrap().id, 7);
        table.leave_namespace();

        // Qualified from the outside; bare name no longer resolves.
        let outside = table.current_scope().clone();
        assert_eq!(table.find_symbol("ns::f", &outside, false).unwrap().id, 7);
        assert!(table.find_symbol("f", &outside, false).is_none());
        assert!(table.find_symbol("ns::f", &outside, true).is_some());
    }

    #[test]
    fn exclusive_lookup_skips_inner_namespaces() {
        let mut table = SymbolTable::new();
        assert!(table.insert_symbol(
            "g",
            Symbol::variable(1, Type::FLOAT, StorageClass::Private),
            true
        ));
        table.enter_namespace("ns");
        assert!(table.insert_symbol(
            "g",
            Symbol::variable(2, Type::FLOAT, StorageClass::Private),
            true
        ));
        let inside = table.current_scope().clone();
        assert_eq!(table.find_symbol("g", &inside, false).unwrap().id, 2);
        assert_eq!(table.find_symbol("g", &inside, true).unwrap().id, 1);
        table.leave_namespace();
    }
}
