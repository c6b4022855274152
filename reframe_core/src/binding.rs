//! Argument binding.
//!
//! Binding maps a call's positional and keyword arguments onto a
//! [`Signature`]. It is a pure function of the signature and the
//! arguments, independent of how routines are represented.
//!
//! # Binding Algorithm
//!
//! 1. Bind positional arguments to positional parameters, in order
//! 2. Collect excess positional arguments into `*args` (if declared)
//! 3. Bind keyword arguments to parameters with a matching name
//! 4. Collect unmatched keyword arguments into `**kwargs` (if declared)
//! 5. Fill missing parameters with their default values
//! 6. Error on missing required arguments

use crate::signature::{ParamKind, Signature};
use crate::value::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// The arguments supplied to a call cannot satisfy the callee's signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Too many positional arguments and no `*args` to absorb them.
    #[error("{func_name}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        func_name: Arc<str>,
        expected: usize,
        given: usize,
    },
    /// Same parameter supplied twice.
    #[error("{func_name}() got multiple values for argument '{param_name}'")]
    DuplicateArgument {
        func_name: Arc<str>,
        param_name: Arc<str>,
    },
    /// Keyword with no matching parameter and no `**kwargs`.
    #[error("{func_name}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword {
        func_name: Arc<str>,
        keyword: Arc<str>,
    },
    #[error("{func_name}() missing required positional argument: '{param_name}'")]
    MissingPositional {
        func_name: Arc<str>,
        param_name: Arc<str>,
    },
    #[error("{func_name}() missing required keyword-only argument: '{param_name}'")]
    MissingKeywordOnly {
        func_name: Arc<str>,
        param_name: Arc<str>,
    },
}

// =============================================================================
// Bound Arguments
// =============================================================================

/// One value per declared parameter, in declaration order.
///
/// A `*args` parameter holds a [`Value::Tuple`] and a `**kwargs`
/// parameter a [`Value::Dict`], both possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    slots: SmallVec<[(Arc<str>, Value); 8]>,
}

impl BoundArguments {
    /// Value bound to a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.slots.iter().map(|(n, v)| (n, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.slots.iter().map(|(_, v)| v)
    }

    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.slots.into_iter().map(|(_, v)| v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// =============================================================================
// Binding Engine
// =============================================================================

/// Binds call arguments to signatures.
pub struct ArgumentBinder;

impl ArgumentBinder {
    /// Bind positional and keyword arguments to `signature`.
    ///
    /// `func_name` is only used in error messages.
    pub fn bind<P, K>(
        func_name: &str,
        signature: &Signature,
        positional_args: P,
        keyword_args: K,
    ) -> Result<BoundArguments, BindingError>
    where
        P: IntoIterator<Item = Value>,
        K: IntoIterator<Item = (Arc<str>, Value)>,
    {
        let params = signature.params();
        let mut values: SmallVec<[Option<Value>; 8]> = SmallVec::from_elem(None, params.len());

        // =====================================================================
        // Phase 1: Bind positional arguments
        // =====================================================================

        let positional_slots: SmallVec<[usize; 8]> = params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind.accepts_positional())
            .map(|(i, _)| i)
            .collect();
        let has_varargs = signature.var_positional().is_some();

        let mut excess_positional: Vec<Value> = Vec::new();
        let mut given = 0usize;
        for arg in positional_args {
            match positional_slots.get(given) {
                Some(&slot) => values[slot] = Some(arg),
                None => excess_positional.push(arg),
            }
            given += 1;
        }
        if !has_varargs && !excess_positional.is_empty() {
            return Err(BindingError::TooManyPositional {
                func_name: func_name.into(),
                expected: positional_slots.len(),
                given,
            });
        }

        // =====================================================================
        // Phase 2: Bind keyword arguments
        // =====================================================================

        let has_varkw = signature.var_keyword().is_some();
        let mut extra_kwargs: Vec<(Arc<str>, Value)> = Vec::new();

        for (name, value) in keyword_args {
            if let Some(idx) = signature.find_keyword(&name) {
                if values[idx].is_some() {
                    return Err(BindingError::DuplicateArgument {
                        func_name: func_name.into(),
                        param_name: name,
                    });
                }
                values[idx] = Some(value);
            } else if has_varkw {
                // Positional-only names are free to appear in **kwargs.
                if extra_kwargs.iter().any(|(n, _)| *n == name) {
                    return Err(BindingError::DuplicateArgument {
                        func_name: func_name.into(),
                        param_name: name,
                    });
                }
                extra_kwargs.push((name, value));
            } else {
                return Err(BindingError::UnexpectedKeyword {
                    func_name: func_name.into(),
                    keyword: name,
                });
            }
        }

        // =====================================================================
        // Phase 3: Collect variadics and fill defaults
        // =====================================================================

        let mut excess_positional = Some(excess_positional);
        let mut extra_kwargs = Some(extra_kwargs);
        let mut slots = SmallVec::with_capacity(params.len());

        for (param, bound) in params.iter().zip(values) {
            let value = match (param.kind, bound) {
                (ParamKind::VarPositional, _) => {
                    Value::tuple(excess_positional.take().unwrap_or_default())
                }
                (ParamKind::VarKeyword, _) => {
                    Value::Dict(extra_kwargs.take().unwrap_or_default().into())
                }
                (_, Some(value)) => value,
                (kind, None) => match &param.default {
                    Some(default) => default.clone(),
                    None if kind == ParamKind::KeywordOnly => {
                        return Err(BindingError::MissingKeywordOnly {
                            func_name: func_name.into(),
                            param_name: Arc::clone(&param.name),
                        });
                    }
                    None => {
                        return Err(BindingError::MissingPositional {
                            func_name: func_name.into(),
                            param_name: Arc::clone(&param.name),
                        });
                    }
                },
            };
            slots.push((Arc::clone(&param.name), value));
        }

        Ok(BoundArguments { slots })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::int).collect()
    }

    fn kw(pairs: &[(&str, i64)]) -> Vec<(Arc<str>, Value)> {
        pairs
            .iter()
            .map(|(n, v)| (Arc::from(*n), Value::int(*v)))
            .collect()
    }

    // =========================================================================
    // Basic Positional Argument Tests
    // =========================================================================

    #[test]
    fn test_bind_exact_positional_args() {
        let sig = Signature::positional(&["a", "b"]);
        let bound = ArgumentBinder::bind("f", &sig, ints(&[1, 2]), kw(&[])).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound.get("a"), Some(&Value::int(1)));
        assert_eq!(bound.get("b"), Some(&Value::int(2)));
    }

    #[test]
    fn test_bind_too_many_positional_args_error() {
        let sig = Signature::positional(&["a", "b"]);
        let err = ArgumentBinder::bind("f", &sig, ints(&[1, 2, 3]), kw(&[])).unwrap_err();
        assert_eq!(
            err,
            BindingError::TooManyPositional {
                func_name: "f".into(),
                expected: 2,
                given: 3,
            }
        );
        assert_eq!(
            err.to_string(),
            "f() takes 2 positional arguments but 3 were given"
        );
    }

    #[test]
    fn test_bind_missing_positional_error() {
        let sig = Signature::positional(&["a", "b"]);
        let err = ArgumentBinder::bind("f", &sig, ints(&[1]), kw(&[])).unwrap_err();
        assert!(matches!(
            err,
            BindingError::MissingPositional { ref param_name, .. } if param_name.as_ref() == "b"
        ));
    }

    // =========================================================================
    // Varargs / Varkw Tests
    // =========================================================================

    #[test]
    fn test_bind_with_varargs_collects_excess() {
        let sig = Signature::builder()
            .param("a")
            .var_positional("args")
            .build()
            .unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[1, 2, 3]), kw(&[])).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::int(1)));
        assert_eq!(bound.get("args"), Some(&Value::tuple(ints(&[2, 3]))));
    }

    #[test]
    fn test_bind_with_varargs_empty() {
        let sig = Signature::builder().var_positional("args").build().unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[]), kw(&[])).unwrap();
        assert_eq!(bound.get("args"), Some(&Value::tuple([])));
    }

    #[test]
    fn test_bind_with_varkw_collects_unknown_keywords() {
        let sig = Signature::builder()
            .param("a")
            .var_keyword("kwargs")
            .build()
            .unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[]), kw(&[("a", 1), ("d", 4)])).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::int(1)));
        assert_eq!(
            bound.get("kwargs"),
            Some(&Value::dict([("d", Value::int(4))]))
        );
    }

    #[test]
    fn test_bind_unexpected_keyword_error() {
        let sig = Signature::positional(&["a"]);
        let err = ArgumentBinder::bind("f", &sig, ints(&[1]), kw(&[("z", 0)])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "f() got an unexpected keyword argument 'z'"
        );
    }

    #[test]
    fn test_bind_duplicate_argument_error() {
        let sig = Signature::positional(&["a"]);
        let err = ArgumentBinder::bind("f", &sig, ints(&[1]), kw(&[("a", 2)])).unwrap_err();
        assert!(matches!(err, BindingError::DuplicateArgument { .. }));
    }

    #[test]
    fn test_positional_only_name_lands_in_varkw() {
        let sig = Signature::builder()
            .positional_only("a")
            .var_keyword("kwargs")
            .build()
            .unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[1]), kw(&[("a", 2)])).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::int(1)));
        assert_eq!(
            bound.get("kwargs"),
            Some(&Value::dict([("a", Value::int(2))]))
        );
    }

    // =========================================================================
    // Keyword-only and Defaults
    // =========================================================================

    #[test]
    fn test_star_then_keyword_only() {
        let sig = Signature::builder()
            .var_positional("args")
            .param("key")
            .build()
            .unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[1, 2]), kw(&[("key", 9)])).unwrap();
        assert_eq!(bound.get("args"), Some(&Value::tuple(ints(&[1, 2]))));
        assert_eq!(bound.get("key"), Some(&Value::int(9)));

        let err = ArgumentBinder::bind("f", &sig, ints(&[1]), kw(&[])).unwrap_err();
        assert!(matches!(err, BindingError::MissingKeywordOnly { .. }));
    }

    #[test]
    fn test_defaults_fill_unbound_parameters() {
        let sig = Signature::builder()
            .param_with_default("a", Value::int(1))
            .param_with_default("b", Value::int(2))
            .param_with_default("c", Value::int(3))
            .build()
            .unwrap();
        let bound = ArgumentBinder::bind("f", &sig, ints(&[]), kw(&[("b", 5), ("c", 6)])).unwrap();
        let values: Vec<_> = bound.into_values().collect();
        assert_eq!(values, ints(&[1, 5, 6]));
    }
}
