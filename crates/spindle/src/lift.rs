//! Lambda and case lifting.
//!
//! The lambda lifter removes every `Lambda` node by inventing a fresh top-level
//! definition whose parameters are the abstraction's sorted free variables
//! followed by its own parameters, and replacing the lambda site with the new
//! global applied to those free variables.
//!
//! The case lifter then moves every `case` sitting in a lazy context out to a
//! fresh definition applied to its free variables, so `case` only ever remains
//! where the code generator compiles strictly: definition bodies, scrutinees,
//! `if` arms, and primitive operands.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};

use crate::ast::{Binding, Def, Expr, Program, Var};

/// Counters for fresh lifted-definition names, persisted across loads so a
/// later program cannot collide with an earlier lifted global.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct FreshNames {
    lambdas: u32,
    cases: u32,
}

impl FreshNames {
    fn lambda(&mut self) -> String {
        let n = self.lambdas;
        self.lambdas += 1;
        format!("$lam{n}")
    }

    fn case(&mut self) -> String {
        let n = self.cases;
        self.cases += 1;
        format!("$case{n}")
    }
}

/// Collects the free variables of `expr` that are not globals, in sorted order.
fn free_vars(expr: &Expr, globals: &AHashSet<String>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut bound = AHashMap::new();
    collect_free(expr, globals, &mut bound, &mut out);
    out
}

/// Scope-counted free-variable walk; `bound` maps names to nesting counts.
fn collect_free(
    expr: &Expr,
    globals: &AHashSet<String>,
    bound: &mut AHashMap<String, usize>,
    out: &mut BTreeSet<String>,
) {
    match expr {
        Expr::Var(Var { name, .. }) => {
            if !bound.contains_key(name) && !globals.contains(name) {
                out.insert(name.clone());
            }
        }
        Expr::Int(_) | Expr::Decimal(_) | Expr::Char(_) | Expr::Pack { .. } => {}
        Expr::App(f, x) => {
            collect_free(f, globals, bound, out);
            collect_free(x, globals, bound, out);
        }
        Expr::BinOp { lhs, rhs, .. } => {
            collect_free(lhs, globals, bound, out);
            collect_free(rhs, globals, bound, out);
        }
        Expr::If { cond, then, otherwise } => {
            collect_free(cond, globals, bound, out);
            collect_free(then, globals, bound, out);
            collect_free(otherwise, globals, bound, out);
        }
        Expr::Lambda { params, body } => {
            enter(bound, params.iter().map(String::as_str));
            collect_free(body, globals, bound, out);
            leave(bound, params.iter().map(String::as_str));
        }
        Expr::Let {
            recursive,
            bindings,
            body,
        } => {
            if *recursive {
                enter(bound, bindings.iter().map(|b| b.name.as_str()));
                for binding in bindings {
                    collect_free(&binding.expr, globals, bound, out);
                }
            } else {
                for binding in bindings {
                    collect_free(&binding.expr, globals, bound, out);
                }
                enter(bound, bindings.iter().map(|b| b.name.as_str()));
            }
            collect_free(body, globals, bound, out);
            leave(bound, bindings.iter().map(|b| b.name.as_str()));
        }
        Expr::Case { scrutinee, alts } => {
            collect_free(scrutinee, globals, bound, out);
            for alt in alts {
                enter(bound, alt.binders.iter().map(|b| b.name.as_str()));
                collect_free(&alt.body, globals, bound, out);
                leave(bound, alt.binders.iter().map(|b| b.name.as_str()));
            }
        }
    }
}

fn enter<'a>(bound: &mut AHashMap<String, usize>, names: impl Iterator<Item = &'a str>) {
    for name in names {
        *bound.entry(name.to_owned()).or_insert(0) += 1;
    }
}

fn leave<'a>(bound: &mut AHashMap<String, usize>, names: impl Iterator<Item = &'a str>) {
    for name in names {
        if let Some(count) = bound.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                bound.remove(name);
            }
        }
    }
}

/// Rewrites every lambda in `program` into a fresh top-level definition.
///
/// `known_globals` holds the names visible as globals: everything already in
/// the symbol table plus this program's own definitions.
pub(crate) fn lift_lambdas(program: &mut Program, known_globals: &AHashSet<String>, fresh: &mut FreshNames) {
    let mut lifter = LambdaLifter {
        globals: known_globals,
        fresh,
        new_defs: Vec::new(),
    };
    for def in &mut program.defs {
        let body = std::mem::replace(&mut def.body, Expr::Pack { tag: 0, arity: 0 });
        def.body = lifter.rewrite(body);
    }
    program.defs.append(&mut lifter.new_defs);
}

struct LambdaLifter<'a> {
    globals: &'a AHashSet<String>,
    fresh: &'a mut FreshNames,
    new_defs: Vec<Def>,
}

impl LambdaLifter<'_> {
    /// Bottom-up rewrite: children first, so an abstraction's body is already
    /// lambda-free when its free variables are computed.
    fn rewrite(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Lambda { params, body } => {
                let body = self.rewrite(*body);
                let mut fvs = free_vars(&body, self.globals);
                for param in &params {
                    fvs.remove(param);
                }
                let name = self.fresh.lambda();
                let mut lifted_params: Vec<String> = fvs.iter().cloned().collect();
                lifted_params.extend(params);
                self.new_defs.push(Def {
                    name: name.clone(),
                    params: lifted_params,
                    body,
                });
                Expr::apply(Expr::Var(Var::new(name)), fvs.into_iter().map(|v| Expr::Var(Var::new(v))))
            }
            Expr::App(f, x) => Expr::App(Box::new(self.rewrite(*f)), Box::new(self.rewrite(*x))),
            Expr::BinOp { op, lhs, rhs } => Expr::BinOp {
                op,
                lhs: Box::new(self.rewrite(*lhs)),
                rhs: Box::new(self.rewrite(*rhs)),
            },
            Expr::If { cond, then, otherwise } => Expr::If {
                cond: Box::new(self.rewrite(*cond)),
                then: Box::new(self.rewrite(*then)),
                otherwise: Box::new(self.rewrite(*otherwise)),
            },
            Expr::Let {
                recursive,
                bindings,
                body,
            } => Expr::Let {
                recursive,
                bindings: bindings
                    .into_iter()
                    .map(|b| Binding {
                        name: b.name,
                        slot: b.slot,
                        expr: self.rewrite(b.expr),
                    })
                    .collect(),
                body: Box::new(self.rewrite(*body)),
            },
            Expr::Case { scrutinee, alts } => Expr::Case {
                scrutinee: Box::new(self.rewrite(*scrutinee)),
                alts: alts
                    .into_iter()
                    .map(|mut alt| {
                        alt.body = self.rewrite(alt.body);
                        alt
                    })
                    .collect(),
            },
            leaf @ (Expr::Var(_) | Expr::Int(_) | Expr::Decimal(_) | Expr::Char(_) | Expr::Pack { .. }) => leaf,
        }
    }
}

/// Moves every lazily-placed `case` into a fresh top-level definition.
pub(crate) fn lift_cases(program: &mut Program, known_globals: &AHashSet<String>, fresh: &mut FreshNames) {
    let mut lifter = CaseLifter {
        globals: known_globals,
        fresh,
        new_defs: Vec::new(),
    };
    for def in &mut program.defs {
        let body = std::mem::replace(&mut def.body, Expr::Pack { tag: 0, arity: 0 });
        def.body = lifter.strict(body);
    }
    program.defs.append(&mut lifter.new_defs);
}

struct CaseLifter<'a> {
    globals: &'a AHashSet<String>,
    fresh: &'a mut FreshNames,
    new_defs: Vec<Def>,
}

impl CaseLifter<'_> {
    /// Rewrites an expression sitting in a strict position: a `case` here may
    /// stay, and its scrutinee and bodies are strict in turn.
    fn strict(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Case { scrutinee, alts } => Expr::Case {
                scrutinee: Box::new(self.strict(*scrutinee)),
                alts: alts
                    .into_iter()
                    .map(|mut alt| {
                        alt.body = self.strict(alt.body);
                        alt
                    })
                    .collect(),
            },
            Expr::If { cond, then, otherwise } => Expr::If {
                cond: Box::new(self.strict(*cond)),
                then: Box::new(self.strict(*then)),
                otherwise: Box::new(self.strict(*otherwise)),
            },
            Expr::BinOp { op, lhs, rhs } => Expr::BinOp {
                op,
                lhs: Box::new(self.strict(*lhs)),
                rhs: Box::new(self.strict(*rhs)),
            },
            Expr::Let {
                recursive,
                bindings,
                body,
            } => Expr::Let {
                recursive,
                bindings: bindings
                    .into_iter()
                    .map(|b| Binding {
                        name: b.name,
                        slot: b.slot,
                        expr: self.lazy(b.expr),
                    })
                    .collect(),
                body: Box::new(self.strict(*body)),
            },
            Expr::App(f, x) => Expr::App(Box::new(self.lazy(*f)), Box::new(self.lazy(*x))),
            Expr::Lambda { params, body } => Expr::Lambda {
                params,
                body: Box::new(self.lazy(*body)),
            },
            leaf @ (Expr::Var(_) | Expr::Int(_) | Expr::Decimal(_) | Expr::Char(_) | Expr::Pack { .. }) => leaf,
        }
    }

    /// Rewrites an expression whose graph is built without evaluation: a `case`
    /// here is replaced by a call to a fresh definition.
    fn lazy(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Case { scrutinee, alts } => {
                let lifted = Expr::Case {
                    scrutinee: Box::new(self.strict(*scrutinee)),
                    alts: alts
                        .into_iter()
                        .map(|mut alt| {
                            alt.body = self.strict(alt.body);
                            alt
                        })
                        .collect(),
                };
                let fvs = free_vars(&lifted, self.globals);
                let name = self.fresh.case();
                self.new_defs.push(Def {
                    name: name.clone(),
                    params: fvs.iter().cloned().collect(),
                    body: lifted,
                });
                Expr::apply(Expr::Var(Var::new(name)), fvs.into_iter().map(|v| Expr::Var(Var::new(v))))
            }
            Expr::If { cond, then, otherwise } => Expr::If {
                cond: Box::new(self.lazy(*cond)),
                then: Box::new(self.lazy(*then)),
                otherwise: Box::new(self.lazy(*otherwise)),
            },
            Expr::BinOp { op, lhs, rhs } => Expr::BinOp {
                op,
                lhs: Box::new(self.lazy(*lhs)),
                rhs: Box::new(self.lazy(*rhs)),
            },
            Expr::Let {
                recursive,
                bindings,
                body,
            } => Expr::Let {
                recursive,
                bindings: bindings
                    .into_iter()
                    .map(|b| Binding {
                        name: b.name,
                        slot: b.slot,
                        expr: self.lazy(b.expr),
                    })
                    .collect(),
                body: Box::new(self.lazy(*body)),
            },
            Expr::App(f, x) => Expr::App(Box::new(self.lazy(*f)), Box::new(self.lazy(*x))),
            Expr::Lambda { params, body } => Expr::Lambda {
                params,
                body: Box::new(self.lazy(*body)),
            },
            leaf @ (Expr::Var(_) | Expr::Int(_) | Expr::Decimal(_) | Expr::Char(_) | Expr::Pack { .. }) => leaf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;

    fn globals_of(program: &Program, extra: &[&str]) -> AHashSet<String> {
        program
            .defs
            .iter()
            .map(|d| d.name.clone())
            .chain(extra.iter().map(|&s| s.to_owned()))
            .collect()
    }

    #[test]
    fn lambda_lift_captures_free_variables_first() {
        let mut program = parse_program("f x = let g = \\y. x * x + y in g 3 + g 4").unwrap();
        let globals = globals_of(&program, &[]);
        let mut fresh = FreshNames::default();
        lift_lambdas(&mut program, &globals, &mut fresh);

        assert_eq!(program.defs.len(), 2);
        let lifted = &program.defs[1];
        assert_eq!(lifted.name, "$lam0");
        assert_eq!(lifted.params, vec!["x".to_owned(), "y".to_owned()]);
        // The binding site became `$lam0 x`.
        let Expr::Let { bindings, .. } = &program.defs[0].body else {
            panic!("expected let");
        };
        let Expr::App(head, arg) = &bindings[0].expr else {
            panic!("expected application of the lifted global");
        };
        assert!(matches!(head.as_ref(), Expr::Var(v) if v.name == "$lam0"));
        assert!(matches!(arg.as_ref(), Expr::Var(v) if v.name == "x"));
    }

    #[test]
    fn nested_lambdas_lift_bottom_up() {
        let mut program = parse_program("f x = \\y. \\z. x + y + z").unwrap();
        let globals = globals_of(&program, &[]);
        let mut fresh = FreshNames::default();
        lift_lambdas(&mut program, &globals, &mut fresh);
        // Inner lambda lifts first, then the outer one.
        assert_eq!(program.defs.len(), 3);
        assert!(program.defs.iter().any(|d| d.name == "$lam0"));
        assert!(program.defs.iter().any(|d| d.name == "$lam1"));
    }

    #[test]
    fn globals_are_not_captured() {
        let mut program = parse_program("g y = y; f x = \\y. g (x + y)").unwrap();
        let globals = globals_of(&program, &[]);
        let mut fresh = FreshNames::default();
        lift_lambdas(&mut program, &globals, &mut fresh);
        let lifted = program.defs.iter().find(|d| d.name == "$lam0").unwrap();
        assert_eq!(lifted.params, vec!["x".to_owned(), "y".to_owned()]);
    }

    #[test]
    fn case_in_argument_position_is_lifted() {
        let mut program = parse_program("f x = K (1 + (case x of <3> -> 1, <4> -> 2)) 1").unwrap();
        let globals = globals_of(&program, &["K"]);
        let mut fresh = FreshNames::default();
        lift_cases(&mut program, &globals, &mut fresh);

        assert_eq!(program.defs.len(), 2);
        let lifted = &program.defs[1];
        assert_eq!(lifted.name, "$case0");
        assert_eq!(lifted.params, vec!["x".to_owned()]);
        assert!(matches!(lifted.body, Expr::Case { .. }));
    }

    #[test]
    fn case_in_definition_body_stays() {
        let mut program = parse_program("length xs = case xs of <1> -> 0, <2> y ys -> 1 + length ys").unwrap();
        let globals = globals_of(&program, &[]);
        let mut fresh = FreshNames::default();
        lift_cases(&mut program, &globals, &mut fresh);
        assert_eq!(program.defs.len(), 1);
        assert!(matches!(program.defs[0].body, Expr::Case { .. }));
    }

    #[test]
    fn case_under_if_branch_in_body_stays() {
        let mut program =
            parse_program("take n xs = if (n == 0) nil (case xs of <1> -> nil, <2> p ps -> p)").unwrap();
        let globals = globals_of(&program, &["nil"]);
        let mut fresh = FreshNames::default();
        lift_cases(&mut program, &globals, &mut fresh);
        assert_eq!(program.defs.len(), 1);
    }
}
