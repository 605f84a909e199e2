//! Conjunction of boolean conditions in disjunctive normal form.
//!
//! A condition is a list of clauses, and a clause a list of atoms: `[[a, b], [c]]` reads
//! `(a AND b) OR c`. Both `[]` and `[[]]` mean "always true", which is the convention used by
//! scope-like directive arguments: an element without requirements is always accessible.

/// Computes the conjunction (`AND`) of all `operands`.
///
/// The result is canonical: atoms are sorted within clauses, clauses are sorted, and no clause
/// is a strict superset of another one (`A OR (A AND B)` is `A`). As a consequence the result
/// does not depend on the order of the operands.
pub fn dnf_conjunction<T: Ord + Clone>(operands: &[Vec<Vec<T>>]) -> Vec<Vec<T>> {
    let mut canonical_operands: Vec<Vec<Vec<T>>> = Vec::with_capacity(operands.len());
    for operand in operands {
        let operand = canonicalize(operand.clone());
        if !canonical_operands.contains(&operand) {
            canonical_operands.push(operand);
        }
    }

    let mut operands = canonical_operands.into_iter();
    let Some(first) = operands.next() else {
        return vec![Vec::new()];
    };
    let result = operands.fold(remove_subsumed(first), |accumulator, operand| {
        remove_subsumed(conjunction(&accumulator, &operand))
    });
    canonicalize(result)
}

/// Sorts and deduplicates atoms and clauses, normalizing `[]` to `[[]]`.
fn canonicalize<T: Ord>(mut condition: Vec<Vec<T>>) -> Vec<Vec<T>> {
    if condition.is_empty() {
        return vec![Vec::new()];
    }
    for clause in &mut condition {
        clause.sort();
        clause.dedup();
    }
    condition.sort();
    condition.dedup();
    condition
}

/// Distributes `AND` over the clauses of both sides.
fn conjunction<T: Ord + Clone>(left: &[Vec<T>], right: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut result: Vec<Vec<T>> = Vec::with_capacity(left.len() * right.len());
    for left_clause in left {
        for right_clause in right {
            let mut clause = left_clause.clone();
            for atom in right_clause {
                if !clause.contains(atom) {
                    clause.push(atom.clone());
                }
            }
            clause.sort();
            if !result.contains(&clause) {
                result.push(clause);
            }
        }
    }
    result
}

/// Drops every clause that is a strict superset of another clause.
fn remove_subsumed<T: Ord>(mut clauses: Vec<Vec<T>>) -> Vec<Vec<T>> {
    clauses.sort_by_key(|clause| clause.len());
    let mut kept: Vec<Vec<T>> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let is_subsumed = kept
            .iter()
            .any(|shorter| shorter.iter().all(|atom| clause.contains(atom)));
        if !is_subsumed {
            kept.push(clause);
        }
    }
    kept
}
