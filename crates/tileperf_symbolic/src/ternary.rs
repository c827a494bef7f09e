use rustc_hash::{FxHashMap, FxHashSet};

use crate::{Expr, ExprKind, Result, SymbolicError};

/// The definition behind a placeholder: `if cond then then_branch else else_branch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TernaryOp {
    pub cond: Expr,
    pub then_branch: Expr,
    pub else_branch: Expr,
}

impl TernaryOp {
    /// Inline form of this definition, without resolving nested placeholders
    pub fn to_expr(&self) -> Result<Expr> {
        Expr::ternary(&self.cond, &self.then_branch, &self.else_branch)
    }

    fn rename_placeholders(&self, renames: &FxHashMap<Expr, Expr>) -> Result<TernaryOp> {
        Ok(TernaryOp {
            cond: self.cond.rename_placeholders(renames)?,
            then_branch: self.then_branch.rename_placeholders(renames)?,
            else_branch: self.else_branch.rename_placeholders(renames)?,
        })
    }
}

impl std::fmt::Display for TernaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TenaryOp({}, {}, {})",
            self.cond, self.then_branch, self.else_branch
        )
    }
}

/// Side table of deferred branches built up during one cost query.
///
/// Entries are keyed by their placeholder expression. Registering a
/// definition that is structurally identical to an existing one hands back
/// the existing placeholder. Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct TernaryRegistry {
    prefix: String,
    entries: Vec<(Expr, TernaryOp)>,
    index: FxHashMap<Expr, usize>,
    dedup: FxHashMap<TernaryOp, Expr>,
}

impl TernaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated placeholder names start with `prefix`, keeping tables from
    /// different nodes mergeable.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, placeholder: &Expr) -> Option<&TernaryOp> {
        self.index.get(placeholder).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, placeholder: &Expr) -> bool {
        self.index.contains_key(placeholder)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Expr, &TernaryOp)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Expr> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Build a branch, deferring it through the table.
    ///
    /// A decided condition (or equal branches) returns the chosen branch and
    /// registers nothing. Otherwise the ternary is stored and a placeholder
    /// referencing it is returned.
    pub fn make_ternary(
        &mut self,
        cond: impl Into<Expr>,
        then_branch: impl Into<Expr>,
        else_branch: impl Into<Expr>,
    ) -> Result<Expr> {
        let built = Expr::ternary(cond, then_branch, else_branch)?;
        let ExprKind::Ternary(cond, then_branch, else_branch) = built.kind() else {
            return Ok(built);
        };
        let op = TernaryOp {
            cond: cond.clone(),
            then_branch: then_branch.clone(),
            else_branch: else_branch.clone(),
        };
        if let Some(existing) = self.dedup.get(&op) {
            return Ok(existing.clone());
        }
        let name = if self.prefix.is_empty() {
            format!("tenary_op_{}", self.entries.len())
        } else {
            format!("{}_tenary_op_{}", self.prefix, self.entries.len())
        };
        let placeholder = Expr::placeholder(&name);
        self.insert(placeholder.clone(), op);
        Ok(placeholder)
    }

    /// Register a definition under an explicit name, replacing any previous
    /// definition of that name. The condition is checked but not folded; it
    /// is decided when the placeholder is resolved.
    pub fn define(
        &mut self,
        name: impl AsRef<str>,
        cond: impl Into<Expr>,
        then_branch: impl Into<Expr>,
        else_branch: impl Into<Expr>,
    ) -> Result<Expr> {
        let cond = cond.into();
        if !cond.is_literal() && !cond.is_boolean_shaped() {
            return Err(SymbolicError::InvalidCondition {
                cond: cond.to_string(),
            });
        }
        let placeholder = Expr::placeholder(name);
        self.insert(
            placeholder.clone(),
            TernaryOp {
                cond,
                then_branch: then_branch.into(),
                else_branch: else_branch.into(),
            },
        );
        Ok(placeholder)
    }

    fn insert(&mut self, placeholder: Expr, op: TernaryOp) {
        tracing::trace!(%placeholder, definition = %op, "registering ternary");
        self.dedup.insert(op.clone(), placeholder.clone());
        match self.index.get(&placeholder) {
            Some(&i) => {
                let old = std::mem::replace(&mut self.entries[i].1, op);
                if old != self.entries[i].1 && self.dedup.get(&old) == Some(&placeholder) {
                    self.dedup.remove(&old);
                }
            }
            None => {
                self.index.insert(placeholder.clone(), self.entries.len());
                self.entries.push((placeholder, op));
            }
        }
    }

    /// Absorb another table.
    ///
    /// A placeholder of `other` whose name is already bound here to a
    /// different definition is moved to a fresh name, and so is anything in
    /// `other` that refers to it. The returned map sends each moved
    /// placeholder to its new name; expressions built against `other` must
    /// go through [`Expr::rename_placeholders`] with it.
    pub fn merge(&mut self, other: TernaryRegistry) -> Result<FxHashMap<Expr, Expr>> {
        let mut renames = FxHashMap::default();
        let mut taken: FxHashSet<Expr> =
            self.index.keys().chain(other.index.keys()).cloned().collect();
        // Renaming a reference can make an identical definition differ, so
        // repeat until no new clash shows up
        let entries = loop {
            let mut entries = Vec::with_capacity(other.entries.len());
            for (placeholder, op) in &other.entries {
                entries.push((placeholder.clone(), op.rename_placeholders(&renames)?));
            }
            let mut clashed = false;
            for (placeholder, op) in &entries {
                if renames.contains_key(placeholder) {
                    continue;
                }
                if self.get(placeholder).is_some_and(|existing| existing != op) {
                    let fresh = fresh_name(placeholder, &taken);
                    tracing::debug!(%placeholder, renamed = %fresh, "placeholder clash on merge");
                    taken.insert(fresh.clone());
                    renames.insert(placeholder.clone(), fresh);
                    clashed = true;
                }
            }
            if !clashed {
                break entries;
            }
        };
        for (placeholder, op) in entries {
            let placeholder = renames.get(&placeholder).cloned().unwrap_or(placeholder);
            self.insert(placeholder, op);
        }
        Ok(renames)
    }

    /// Substitute into every stored definition. Keys are kept, so
    /// placeholders in already-built expressions still find their entry.
    pub fn substitute_all(&self, values: &FxHashMap<String, Expr>) -> Result<TernaryRegistry> {
        let mut out = TernaryRegistry::with_prefix(self.prefix.clone());
        for (placeholder, op) in &self.entries {
            let op = TernaryOp {
                cond: op.cond.substitute_all(values)?,
                then_branch: op.then_branch.substitute_all(values)?,
                else_branch: op.else_branch.substitute_all(values)?,
            };
            out.insert(placeholder.clone(), op);
        }
        Ok(out)
    }

    pub fn substitute(&self, var: &str, value: &Expr) -> Result<TernaryRegistry> {
        let mut values = FxHashMap::default();
        values.insert(var.to_string(), value.clone());
        self.substitute_all(&values)
    }

    /// Flatten one expression: every placeholder is replaced by its
    /// definition, recursively, until none remain.
    pub fn resolve(&self, expr: &Expr) -> Result<Expr> {
        Resolver::new(self).resolve_expr(expr)
    }

    /// Flatten several roots sharing one memo table.
    pub fn resolve_all<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a Expr>,
    ) -> Result<FxHashMap<Expr, Expr>> {
        let mut resolver = Resolver::new(self);
        let mut out = FxHashMap::default();
        for root in roots {
            let resolved = resolver.resolve_expr(root)?;
            out.insert(root.clone(), resolved);
        }
        Ok(out)
    }

    /// Every placeholder paired with its fully inlined definition, in
    /// registration order.
    pub fn resolved_definitions(&self) -> Result<Vec<(Expr, Expr)>> {
        let mut resolver = Resolver::new(self);
        self.entries
            .iter()
            .map(|(placeholder, _)| {
                resolver
                    .resolve_placeholder(placeholder)
                    .map(|flat| (placeholder.clone(), flat))
            })
            .collect()
    }
}

// `{name}_1`, `{name}_2`, ... until one is free
fn fresh_name(placeholder: &Expr, taken: &FxHashSet<Expr>) -> Expr {
    (1..)
        .map(|k| Expr::placeholder(format!("{placeholder}_{k}")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| placeholder.clone())
}

/// Flatten every root against `registry`, mapping each root to its
/// self-contained replacement.
pub fn resolve_all_branches<'a>(
    roots: impl IntoIterator<Item = &'a Expr>,
    registry: &TernaryRegistry,
) -> Result<FxHashMap<Expr, Expr>> {
    registry.resolve_all(roots)
}

struct Resolver<'r> {
    registry: &'r TernaryRegistry,
    resolved: FxHashMap<Expr, Expr>,
    in_progress: FxHashSet<Expr>,
}

impl<'r> Resolver<'r> {
    fn new(registry: &'r TernaryRegistry) -> Self {
        Self {
            registry,
            resolved: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<Expr> {
        if !expr.has_placeholder() {
            return Ok(expr.clone());
        }
        expr.rewrite(
            &mut |node: &Expr| match node.kind() {
                ExprKind::Placeholder(_) => self.resolve_placeholder(node).map(Some),
                _ => Ok(None),
            },
            &mut FxHashMap::default(),
        )
    }

    fn resolve_placeholder(&mut self, placeholder: &Expr) -> Result<Expr> {
        if let Some(done) = self.resolved.get(placeholder) {
            return Ok(done.clone());
        }
        let registry = self.registry;
        let Some(op) = registry.get(placeholder) else {
            return Err(SymbolicError::UnregisteredPlaceholder {
                placeholder: placeholder.to_string(),
            });
        };
        if !self.in_progress.insert(placeholder.clone()) {
            return Err(SymbolicError::UnresolvableCycle {
                placeholder: placeholder.to_string(),
            });
        }
        let cond = self.resolve_expr(&op.cond)?;
        let then_branch = self.resolve_expr(&op.then_branch)?;
        let else_branch = self.resolve_expr(&op.else_branch)?;
        let flattened = Expr::ternary(cond, then_branch, else_branch)?;
        self.in_progress.remove(placeholder);
        tracing::trace!(%placeholder, %flattened, "resolved placeholder");
        self.resolved.insert(placeholder.clone(), flattened.clone());
        Ok(flattened)
    }
}
